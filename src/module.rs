//! Module manager: turns a set of source files into the `Vec<RuntimeModule>`
//! the VM runs.
//!
//! `examples/original_source/include/nyx/Module/Module.hpp` resolves
//! imports by walking the dependency graph depth-first and assigning each
//! module a stable index once all of its dependencies have one; this
//! rewrite does the same thing with a plain post-order traversal plus a
//! cycle check, rather than the original's `shared_ptr` graph of
//! `Module` nodes.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::ast::Ast;
use crate::diagnostics::Diagnostics;
use crate::emitter::{Emitter, RuntimeModule};
use crate::natives::NativeRegistry;
use crate::parser::Parser;
use crate::resolver::{ModuleExports, Resolver};
use crate::scanner::Scanner;
use crate::strings::StringCache;

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("cannot read module '{0}': {1}")]
    Io(PathBuf, std::io::Error),
    #[error("import cycle detected at '{0}'")]
    Cycle(String),
    #[error("unresolved import '{0}' from '{1}'")]
    MissingImport(String, String),
    #[error("compilation failed with errors, see diagnostics")]
    CompileFailed,
}

struct LoadedSource {
    path: PathBuf,
    name: String,
    ast: Ast,
    top_level: Vec<crate::ast::StmtId>,
    classes: crate::ast::ClassTable,
    functions: crate::ast::FunctionTable,
    imports: Vec<String>,
}

/// Resolves an `import` path written in one module's source to the file it
/// names: a bare name is looked up next to the importing file with a
/// `.nyx` extension appended, same as the original's module search rule.
fn resolve_import_path(base_dir: &Path, importer: &str, import: &str) -> PathBuf {
    let mut candidate = base_dir.join(import);
    if candidate.extension().is_none() {
        candidate.set_extension("nyx");
    }
    if !candidate.exists() {
        log::warn!("module '{}' imports '{}', which does not exist on disk", importer, import);
    }
    candidate
}

fn module_name(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("module").to_string()
}

/// Reads and parses `entry_path` plus every module it (transitively)
/// imports, in depth-first order, failing on cycles. Every import path is
/// resolved against the entry module's own directory, not the importing
/// module's — the module graph has one search root, not one per file.
fn load_all(entry_path: &Path, diagnostics: &mut Diagnostics) -> Result<Vec<LoadedSource>, ModuleError> {
    let mut loaded: Vec<LoadedSource> = Vec::new();
    let mut loaded_by_path: HashMap<PathBuf, usize> = HashMap::new();
    let mut in_progress: HashSet<PathBuf> = HashSet::new();
    let root_dir = entry_path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

    fn visit(
        path: &Path,
        root_dir: &Path,
        loaded: &mut Vec<LoadedSource>,
        loaded_by_path: &mut HashMap<PathBuf, usize>,
        in_progress: &mut HashSet<PathBuf>,
        diagnostics: &mut Diagnostics,
    ) -> Result<usize, ModuleError> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if let Some(&idx) = loaded_by_path.get(&canonical) {
            return Ok(idx);
        }
        if in_progress.contains(&canonical) {
            return Err(ModuleError::Cycle(path.display().to_string()));
        }
        in_progress.insert(canonical.clone());

        let source = std::fs::read_to_string(path).map_err(|e| ModuleError::Io(path.to_path_buf(), e))?;
        let tokens = Scanner::new(&source).scan(diagnostics);
        let mut ast = Ast::new();
        let parsed = Parser::new(tokens, &mut ast, diagnostics).parse_module();

        let name = module_name(path);
        for import in &parsed.imports {
            let import_path = resolve_import_path(root_dir, &name, import);
            visit(&import_path, root_dir, loaded, loaded_by_path, in_progress, diagnostics)?;
        }

        in_progress.remove(&canonical);
        let index = loaded.len();
        loaded.push(LoadedSource {
            path: path.to_path_buf(),
            name,
            ast,
            top_level: parsed.top_level,
            classes: parsed.classes,
            functions: parsed.functions,
            imports: parsed.imports,
        });
        loaded_by_path.insert(canonical, index);
        Ok(index)
    }

    visit(entry_path, &root_dir, &mut loaded, &mut loaded_by_path, &mut in_progress, diagnostics)?;
    Ok(loaded)
}

/// A resolved module kept around only for `--dump-ast`: the VM never
/// touches the AST once `RuntimeModule`s exist.
pub struct ResolvedModule {
    pub name: String,
    pub ast: Ast,
    pub top_level: Vec<crate::ast::StmtId>,
}

pub struct CompiledProgram {
    pub modules: Vec<RuntimeModule>,
    pub main_index: usize,
    pub resolved: Vec<ResolvedModule>,
}

/// Compiles `entry_path` and every module it imports into a module list
/// the VM can run, plus the (module-local) index of `entry_path` within
/// that list to pass as `VirtualMachine::run`'s `main_module`.
pub fn compile_program(
    entry_path: &Path,
    natives: &NativeRegistry,
    strings: &mut StringCache,
    diagnostics: &mut Diagnostics,
) -> Result<CompiledProgram, ModuleError> {
    let mut sources = load_all(entry_path, diagnostics)?;

    // `load_all` appends a module only after its dependencies, so exports
    // for every name a later module imports are already resolvable by the
    // time that module is resolved.
    let name_to_index: HashMap<String, usize> =
        sources.iter().enumerate().map(|(i, s)| (s.name.clone(), i)).collect();

    let entry_index = sources
        .iter()
        .position(|s| s.path.canonicalize().unwrap_or_else(|_| s.path.clone()) == entry_path.canonicalize().unwrap_or_else(|_| entry_path.to_path_buf()))
        .unwrap_or(0);

    let mut exports_by_index: HashMap<usize, ModuleExports> = HashMap::new();
    let mut runtime_modules: Vec<Option<RuntimeModule>> = (0..sources.len()).map(|_| None).collect();

    for index in 0..sources.len() {
        let imports: HashMap<String, ModuleExports> = sources[index]
            .imports
            .iter()
            .filter_map(|name| {
                let stem = module_name(Path::new(name));
                let dep_index = *name_to_index.get(&stem)?;
                let exports = exports_by_index.get(&dep_index)?;
                Some((
                    stem,
                    ModuleExports { index: exports.index, classes: exports.classes.clone(), functions: exports.functions.clone() },
                ))
            })
            .collect();

        for name in &sources[index].imports {
            let stem = module_name(Path::new(name));
            if !name_to_index.contains_key(&stem) {
                return Err(ModuleError::MissingImport(name.clone(), sources[index].name.clone()));
            }
        }

        let top_level = sources[index].top_level.clone();
        let classes = sources[index].classes.clone();
        let functions = sources[index].functions.clone();

        {
            let src = &mut sources[index];
            let mut resolver = Resolver::new(&mut src.ast, diagnostics, natives, &classes, &functions, &imports, index);
            resolver.synthesize_class_scaffolding();
            resolver.resolve_program(&top_level);
        }

        exports_by_index.insert(index, ModuleExports { index, classes: classes.clone(), functions: functions.clone() });

        let emitter = Emitter::new(&sources[index].ast, strings, index);
        let runtime_module = emitter
            .emit_module(&sources[index].name, &sources[index].path.display().to_string(), &top_level, &classes)
            .map_err(|e| {
                diagnostics.runtime_error(format!("codegen failed for '{}': {}", sources[index].name, e), 0);
                e
            })
            .map_err(|_| ModuleError::CompileFailed)?;
        runtime_modules[index] = Some(runtime_module);
    }

    if diagnostics.had_error() {
        return Err(ModuleError::CompileFailed);
    }

    let modules = runtime_modules.into_iter().map(|m| m.expect("every module index emitted")).collect();
    let resolved = sources
        .into_iter()
        .map(|s| ResolvedModule { name: s.name, ast: s.ast, top_level: s.top_level })
        .collect();
    Ok(CompiledProgram { modules, main_index: entry_index, resolved })
}
