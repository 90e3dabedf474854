//! Name resolution and assignment checks.

use std::collections::{HashMap, HashSet};

use super::parser::{Expr, Module, Name, Stmt, VarKind};
use crate::diagnostic::Diagnostic;
use crate::host::SourceFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Mutable,
    Constant,
    Import,
    Ambient,
}

/// Names a module declares at top level, in source order.
pub fn declared_names(module: &Module) -> impl Iterator<Item = &Name> {
    module.statements.iter().filter_map(|stmt| match stmt {
        Stmt::Import { binding, .. } => Some(binding),
        Stmt::Declare { name } | Stmt::Variable { name, .. } => Some(name),
        _ => None,
    })
}

/// Check one module against its own declarations and the program globals.
pub fn check_module(file: &SourceFile, module: &Module, globals: &HashSet<String>) -> Vec<Diagnostic> {
    let mut checker = Checker {
        file,
        globals,
        bindings: HashMap::new(),
        diagnostics: Vec::new(),
    };
    checker.declare_all(module);
    for stmt in &module.statements {
        checker.statement(stmt);
    }
    checker.diagnostics
}

struct Checker<'a> {
    file: &'a SourceFile,
    globals: &'a HashSet<String>,
    bindings: HashMap<&'a str, Binding>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Checker<'a> {
    fn declare_all(&mut self, module: &'a Module) {
        for stmt in &module.statements {
            let (name, binding) = match stmt {
                Stmt::Import { binding, .. } => (binding, Binding::Import),
                Stmt::Declare { name } => (name, Binding::Ambient),
                Stmt::Variable {
                    kind: VarKind::Const,
                    name,
                    ..
                } => (name, Binding::Constant),
                Stmt::Variable { name, .. } => (name, Binding::Mutable),
                _ => continue,
            };
            if self.bindings.insert(&name.text, binding).is_some() {
                self.error(
                    name,
                    "TS2300",
                    format!("Duplicate identifier '{}'.", name.text),
                );
            }
        }
    }

    fn statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Import { .. } | Stmt::Declare { .. } => {}
            Stmt::Variable { init, .. } => {
                if let Some(init) = init {
                    self.expr(init);
                }
            }
            Stmt::Assign { target, value, .. } => {
                match self.lookup(target) {
                    Some(Binding::Constant) => self.error(
                        target,
                        "TS2588",
                        format!("Cannot assign to '{}' because it is a constant.", target.text),
                    ),
                    Some(Binding::Import) => self.error(
                        target,
                        "TS2632",
                        format!("Cannot assign to '{}' because it is an import.", target.text),
                    ),
                    _ => {}
                }
                self.expr(value);
            }
            Stmt::Expr(expr) => self.expr(expr),
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Number(_) | Expr::Str(_) => {}
            Expr::Name(name) => {
                self.lookup(name);
            }
            Expr::Neg(inner) | Expr::Paren(inner) => self.expr(inner),
            Expr::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            Expr::Call { callee, args } => {
                self.lookup(callee);
                for arg in args {
                    self.expr(arg);
                }
            }
        }
    }

    /// Resolve a name, reporting it when nothing declares it.
    fn lookup(&mut self, name: &Name) -> Option<Binding> {
        if let Some(binding) = self.bindings.get(name.text.as_str()) {
            return Some(*binding);
        }
        if self.globals.contains(&name.text) {
            return Some(Binding::Ambient);
        }
        self.error(name, "TS2304", format!("Cannot find name '{}'.", name.text));
        None
    }

    fn error(&mut self, name: &Name, code: &str, message: String) {
        self.diagnostics
            .push(Diagnostic::error(code, message).at(self.file, name.offset));
    }
}
