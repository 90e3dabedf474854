//! Program construction for the reference toolchain.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::checker::{check_module, declared_names};
use super::emitter::{emit_module, output_path};
use super::parser::{parse, Module};
use super::{CompilerOptions, EmitResult, Program, Toolchain};
use crate::bridge::BridgeResult;
use crate::diagnostic::Diagnostic;
use crate::host::{CompilerHost, SourceFile};

/// Toolchain for the reference module language.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceToolchain;

impl Toolchain for ReferenceToolchain {
    type Program = ReferenceProgram;

    fn name(&self) -> &str {
        "reference"
    }

    fn create_program(
        &self,
        root: &str,
        options: &CompilerOptions,
        host: &mut dyn CompilerHost,
    ) -> BridgeResult<ReferenceProgram> {
        let mut loader = Loader {
            host,
            options,
            loaded: HashMap::new(),
            units: Vec::new(),
        };
        let mut global = Vec::new();

        if !options.no_default_lib {
            let lib = loader.host.default_library_path();
            if !loader.load(&lib)? {
                global.push(file_not_found(&lib));
            }
        }

        let cwd = loader.host.current_directory();
        let root = if cwd.is_empty() || root.starts_with('/') {
            root.to_string()
        } else {
            join(&cwd, root)
        };
        if !loader.load(&root)? {
            global.push(file_not_found(&root));
        }

        debug!(root = %root, files = loader.units.len(), "program created");
        Ok(ReferenceProgram {
            root,
            options: *options,
            units: loader.units,
            global,
        })
    }
}

/// One loaded file.
#[derive(Debug)]
struct Unit {
    file: SourceFile,
    module: Module,
    syntax: Vec<Diagnostic>,
    /// Imports that resolved to nothing.
    unresolved: Vec<Diagnostic>,
}

/// A loaded program: the default library, the root, and every file
/// reachable through imports.
#[derive(Debug)]
pub struct ReferenceProgram {
    root: String,
    options: CompilerOptions,
    /// Dependencies before dependents.
    units: Vec<Unit>,
    global: Vec<Diagnostic>,
}

impl ReferenceProgram {
    /// Names declared by declaration files; visible in every module.
    fn globals(&self) -> HashSet<String> {
        self.units
            .iter()
            .filter(|u| u.file.is_declaration())
            .flat_map(|u| declared_names(&u.module))
            .map(|name| name.text.clone())
            .collect()
    }
}

impl Program for ReferenceProgram {
    fn root(&self) -> &str {
        &self.root
    }

    fn source_paths(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.file.path()).collect()
    }

    fn syntactic_diagnostics(&self) -> Vec<Diagnostic> {
        self.units.iter().flat_map(|u| u.syntax.clone()).collect()
    }

    fn global_diagnostics(&self) -> Vec<Diagnostic> {
        self.global.clone()
    }

    fn semantic_diagnostics(&self) -> Vec<Diagnostic> {
        let globals = self.globals();
        let mut diagnostics = Vec::new();
        for unit in &self.units {
            diagnostics.extend(unit.unresolved.iter().cloned());
            if !unit.file.is_declaration() {
                diagnostics.extend(check_module(&unit.file, &unit.module, &globals));
            }
        }
        diagnostics
    }

    fn emit(&self, host: &mut dyn CompilerHost) -> EmitResult {
        let mut result = EmitResult::default();
        let mut written: HashSet<String> = HashSet::new();
        let new_line = host.new_line().to_string();

        for unit in self.units.iter().filter(|u| !u.file.is_declaration()) {
            let out = output_path(unit.file.path());
            if !written.insert(host.canonical_name(&out)) {
                result.diagnostics.push(Diagnostic::error(
                    "TS5056",
                    format!(
                        "Cannot write file '{out}' because it would be overwritten by multiple input files."
                    ),
                ));
                continue;
            }
            let text = emit_module(&unit.module, self.options.target, &new_line);
            host.write_file(&out, &text);
            result.emitted_files.push(out);
        }
        result
    }
}

struct Loader<'h, 'o> {
    host: &'h mut dyn CompilerHost,
    options: &'o CompilerOptions,
    /// Canonical path to whether the file exists. Files being loaded count
    /// as present so import cycles terminate.
    loaded: HashMap<String, bool>,
    units: Vec<Unit>,
}

impl Loader<'_, '_> {
    /// Load a file and its imports. Returns whether the file exists.
    fn load(&mut self, path: &str) -> BridgeResult<bool> {
        let key = self.host.canonical_name(path);
        if let Some(&exists) = self.loaded.get(&key) {
            return Ok(exists);
        }
        self.loaded.insert(key.clone(), true);

        let Some(file) = self.host.get_source_file(path, self.options.target)? else {
            self.loaded.insert(key, false);
            return Ok(false);
        };

        let (module, errors) = parse(file.text());
        let syntax = errors
            .into_iter()
            .map(|e| Diagnostic::error(e.code, e.message).at(&file, e.offset))
            .collect();

        let mut unresolved = Vec::new();
        for (specifier, offset) in module.imports() {
            let found = match self.resolve(file.path(), specifier)? {
                Some(target) => self.load(&target)?,
                None => false,
            };
            if !found {
                unresolved.push(
                    Diagnostic::error("TS2307", format!("Cannot find module '{specifier}'."))
                        .at(&file, offset),
                );
            }
        }

        self.units.push(Unit {
            file,
            module,
            syntax,
            unresolved,
        });
        Ok(true)
    }

    /// Map an import specifier to a candidate path.
    ///
    /// Relative specifiers are joined to the importing file's directory.
    /// A specifier with an extension names its file exactly; without one,
    /// `.ts` and then `.d.ts` are probed.
    fn resolve(&mut self, importer: &str, specifier: &str) -> BridgeResult<Option<String>> {
        let base = if specifier.starts_with("./") || specifier.starts_with("../") {
            join(parent_dir(importer), specifier)
        } else {
            specifier.to_string()
        };

        if has_extension(&base) {
            return Ok(Some(base));
        }
        for candidate in [format!("{base}.ts"), format!("{base}.d.ts")] {
            if self.host.file_exists(&candidate)? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

fn file_not_found(path: &str) -> Diagnostic {
    Diagnostic::error("TS6053", format!("File '{path}' not found."))
}

fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |i| &path[..i])
}

fn has_extension(path: &str) -> bool {
    let name = &path[path.rfind('/').map_or(0, |i| i + 1)..];
    name.rfind('.').is_some_and(|dot| dot > 0)
}

/// Join `path` onto `dir`, folding `.` and `..` segments.
fn join(dir: &str, path: &str) -> String {
    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !dir.starts_with('/') {
                    segments.push("..");
                }
            }
            s => segments.push(s),
        }
    }
    let joined = segments.join("/");
    if dir.starts_with('/') {
        format!("/{joined}")
    } else {
        joined
    }
}
