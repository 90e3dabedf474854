//! Script emit for checked modules.
//!
//! Imports become `require` calls and exports become assignments to
//! `exports`. Block-scoped declarations are kept for targets that have
//! them and lowered to `var` otherwise.

use super::parser::{Expr, Module, Stmt, VarKind};
use crate::host::LanguageTarget;

/// Output path for a source path: the last extension is replaced by `.js`.
pub fn output_path(path: &str) -> String {
    let file_start = path.rfind('/').map_or(0, |i| i + 1);
    let stem = match path[file_start..].rfind('.') {
        Some(0) | None => path,
        Some(dot) => &path[..file_start + dot],
    };
    format!("{stem}.js")
}

/// Render a module as script text, one statement per line.
pub fn emit_module(module: &Module, target: LanguageTarget, new_line: &str) -> String {
    let mut out = String::new();
    for stmt in &module.statements {
        match stmt {
            Stmt::Declare { .. } => continue,
            Stmt::Import {
                binding, specifier, ..
            } => {
                out.push_str(&format!(
                    "var {} = require({});",
                    binding.text,
                    quote(specifier)
                ));
            }
            Stmt::Variable {
                exported,
                kind,
                name,
                init,
            } => {
                let keyword = match kind {
                    VarKind::Let if target.has_block_scoping() => "let",
                    VarKind::Const if target.has_block_scoping() => "const",
                    _ => "var",
                };
                out.push_str(keyword);
                out.push(' ');
                out.push_str(&name.text);
                if let Some(init) = init {
                    out.push_str(" = ");
                    expr(&mut out, init);
                }
                out.push(';');
                if *exported {
                    out.push_str(new_line);
                    out.push_str(&format!("exports.{0} = {0};", name.text));
                }
            }
            Stmt::Assign { target, op, value } => {
                out.push_str(&target.text);
                out.push(' ');
                out.push_str(op.as_str());
                out.push(' ');
                expr(&mut out, value);
                out.push(';');
            }
            Stmt::Expr(e) => {
                expr(&mut out, e);
                out.push(';');
            }
        }
        out.push_str(new_line);
    }
    out
}

fn expr(out: &mut String, e: &Expr) {
    match e {
        Expr::Number(n) => out.push_str(n),
        Expr::Str(s) => out.push_str(&quote(s)),
        Expr::Name(name) => out.push_str(&name.text),
        Expr::Neg(inner) => {
            out.push('-');
            expr(out, inner);
        }
        Expr::Binary { op, lhs, rhs } => {
            expr(out, lhs);
            out.push(' ');
            out.push_str(op.as_str());
            out.push(' ');
            expr(out, rhs);
        }
        Expr::Call { callee, args } => {
            out.push_str(&callee.text);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                expr(out, arg);
            }
            out.push(')');
        }
        Expr::Paren(inner) => {
            out.push('(');
            expr(out, inner);
            out.push(')');
        }
    }
}

fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\0' => quoted.push_str("\\0"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::parser::parse;
    use insta::assert_snapshot;

    fn emit(text: &str, target: LanguageTarget) -> String {
        let (module, errors) = parse(text);
        assert!(errors.is_empty());
        emit_module(&module, target, "\n")
    }

    #[test]
    fn test_output_path() {
        assert_eq!(output_path("a.ts"), "a.js");
        assert_eq!(output_path("src/b.src"), "src/b.js");
        assert_eq!(output_path("dir.v2/noext"), "dir.v2/noext.js");
        assert_eq!(output_path(".hidden"), ".hidden.js");
        assert_eq!(output_path("b.min.ts"), "b.min.js");
    }

    #[test]
    fn test_emit_es5() {
        let source = "import b from './b'\nexport x = 1\nconst y = -(x + b) * 2\ndeclare log\nlog('it\\'s', y)\n";
        assert_snapshot!(emit(source, LanguageTarget::Es5), @r#"
        var b = require("./b");
        var x = 1;
        exports.x = x;
        var y = -(x + b) * 2;
        log("it's", y);
        "#);
    }

    #[test]
    fn test_emit_keeps_block_scoping() {
        assert_eq!(
            emit("let a = 1\nconst b = 2\na += b", LanguageTarget::Es2015),
            "let a = 1;\nconst b = 2;\na += b;\n"
        );
    }

    #[test]
    fn test_emit_newline_style() {
        let (module, _) = parse("export let a = 1");
        assert_eq!(
            emit_module(&module, LanguageTarget::Es5, "\r\n"),
            "var a = 1;\r\nexports.a = a;\r\n"
        );
    }
}
