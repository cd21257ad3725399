use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use hs_core::{HostScriptError, SourceLocation, SourceSpan};
use rhai::{Dynamic, Engine, Map, ParseError, Position, Scope, AST};

mod prepare;
mod source;

pub use prepare::{prepare_source, strip_bom, strip_shebang};
pub use source::{FsSourceLoader, MemorySourceLoader, SourceLoader, SCRIPT_EXTENSION};

pub const BINDING_EXPORTS: &str = "exports";
pub const BINDING_MODULE: &str = "__module";
pub const BINDING_FILENAME: &str = "__filename";
pub const BINDING_DIRNAME: &str = "__dirname";
pub const BINDING_ARGS: &str = "__args";

/// Key in `exports` holding the function invoked after the body has run.
pub const DEFAULT_EXPORT: &str = "default";

/// Names every script may read without declaring them.
pub const SCRIPT_BINDINGS: [&str; 5] = [
    BINDING_EXPORTS,
    BINDING_MODULE,
    BINDING_FILENAME,
    BINDING_DIRNAME,
    BINDING_ARGS,
];

/// Immutable compiled form of one script file.
#[derive(Debug)]
pub struct CompiledUnit {
    filename: PathBuf,
    dirname: PathBuf,
    source: String,
    digest: u64,
    ast: AST,
}

impl CompiledUnit {
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn dirname(&self) -> &Path {
        &self.dirname
    }

    /// Prepared source text: BOM and shebang already stripped.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn digest(&self) -> u64 {
        self.digest
    }

    pub fn ast(&self) -> &AST {
        &self.ast
    }
}

pub fn source_digest(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

pub fn span_from_position(position: Position) -> Option<SourceSpan> {
    let line = position.line()?;
    let column = position.position().unwrap_or(1);
    Some(SourceSpan::at(SourceLocation { line, column }))
}

fn map_parse_error(filename: &Path, error: ParseError) -> HostScriptError {
    let message = format!("{}: {}", filename.display(), error);
    match span_from_position(error.position()) {
        Some(span) => HostScriptError::with_span("COMPILE_SYNTAX", message, span),
        None => HostScriptError::new("COMPILE_SYNTAX", message),
    }
}

fn absolute_filename(filename: &Path) -> Result<PathBuf, HostScriptError> {
    if filename.is_absolute() {
        return Ok(filename.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(filename))
        .map_err(|error| HostScriptError::new("SOURCE_PATH", error.to_string()))
}

/// Declares the script-visible bindings so strict-variable checks pass for them.
fn binding_scope() -> Scope<'static> {
    let mut scope = Scope::new();
    scope.push(BINDING_EXPORTS, Map::new());
    scope.push_dynamic(BINDING_MODULE, Dynamic::UNIT);
    scope.push(BINDING_FILENAME, String::new());
    scope.push(BINDING_DIRNAME, String::new());
    scope.push(BINDING_ARGS, rhai::Array::new());
    scope
}

pub struct ScriptCompiler {
    engine: Engine,
}

impl Default for ScriptCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptCompiler {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_strict_variables(true);
        Self { engine }
    }

    pub fn compile(
        &self,
        source: &str,
        filename: impl AsRef<Path>,
    ) -> Result<CompiledUnit, HostScriptError> {
        let filename = absolute_filename(filename.as_ref())?;
        let prepared = prepare_source(source);
        let ast = self
            .engine
            .compile_with_scope(&binding_scope(), prepared)
            .map_err(|error| map_parse_error(&filename, error))?;

        let dirname = filename
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));
        tracing::debug!(filename = %filename.display(), "compiled script unit");

        Ok(CompiledUnit {
            dirname,
            digest: source_digest(prepared),
            source: prepared.to_string(),
            filename,
            ast,
        })
    }

    pub fn compile_file(
        &self,
        loader: &dyn SourceLoader,
        path: &Path,
    ) -> Result<CompiledUnit, HostScriptError> {
        let source = loader.read(path)?;
        self.compile(&source, path)
    }
}
