use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use hs_core::HostScriptError;

pub const SCRIPT_EXTENSION: &str = "rhai";

/// Source-loading hook handed to the bridge at configuration time.
pub trait SourceLoader: Send + Sync {
    /// Turns a load or `require` request into an absolute path. Relative requests
    /// are resolved against `base`, or the loader root when there is no base.
    fn resolve(&self, request: &str, base: Option<&Path>) -> Result<PathBuf, HostScriptError>;

    fn read(&self, path: &Path) -> Result<String, HostScriptError>;
}

fn candidates(request: &str, base: &Path) -> Vec<PathBuf> {
    let requested = PathBuf::from(request);
    let joined = if requested.is_absolute() {
        requested
    } else {
        base.join(requested)
    };

    let mut out = vec![joined.clone()];
    if joined.extension().is_none() {
        out.push(joined.with_extension(SCRIPT_EXTENSION));
    }
    out
}

fn not_found(request: &str, base: &Path) -> HostScriptError {
    HostScriptError::new(
        "SOURCE_NOT_FOUND",
        format!(
            "Cannot resolve \"{}\" from {}.",
            request,
            base.display()
        ),
    )
}

#[derive(Debug, Clone)]
pub struct FsSourceLoader {
    root: PathBuf,
}

impl FsSourceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, HostScriptError> {
        let root = root.into();
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()
                .map_err(|error| HostScriptError::new("SOURCE_PATH", error.to_string()))?
                .join(root)
        };
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SourceLoader for FsSourceLoader {
    fn resolve(&self, request: &str, base: Option<&Path>) -> Result<PathBuf, HostScriptError> {
        let base = base.unwrap_or(&self.root);
        candidates(request, base)
            .into_iter()
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| not_found(request, base))
    }

    fn read(&self, path: &Path) -> Result<String, HostScriptError> {
        fs::read_to_string(path).map_err(|error| {
            HostScriptError::new(
                "SOURCE_READ",
                format!("Failed to read {}: {}", path.display(), error),
            )
        })
    }
}

/// In-memory sources keyed by absolute path, for embedding hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySourceLoader {
    root: PathBuf,
    files: BTreeMap<PathBuf, String>,
}

impl MemorySourceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: BTreeMap::new(),
        }
    }

    /// Adds a file; relative paths are placed under the loader root.
    pub fn with_file(mut self, path: impl AsRef<Path>, source: impl Into<String>) -> Self {
        let path = self.root.join(path);
        self.files.insert(path, source.into());
        self
    }
}

impl SourceLoader for MemorySourceLoader {
    fn resolve(&self, request: &str, base: Option<&Path>) -> Result<PathBuf, HostScriptError> {
        let base = base.unwrap_or(&self.root);
        candidates(request, base)
            .into_iter()
            .find(|candidate| self.files.contains_key(candidate))
            .ok_or_else(|| not_found(request, base))
    }

    fn read(&self, path: &Path) -> Result<String, HostScriptError> {
        self.files.get(path).cloned().ok_or_else(|| {
            HostScriptError::new(
                "SOURCE_READ",
                format!("No in-memory source for {}.", path.display()),
            )
        })
    }
}

#[cfg(test)]
mod source_tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("hostscript-rs-{}-{}", name, nanos));
        fs::create_dir_all(&dir).expect("temp dir should be created");
        dir
    }

    #[test]
    fn fs_loader_resolves_with_and_without_extension() {
        let root = temp_dir("fs-loader");
        fs::write(root.join("main.rhai"), "let a = 1;").expect("write main");
        fs::create_dir_all(root.join("lib")).expect("lib dir");
        fs::write(root.join("lib").join("util.rhai"), "let b = 2;").expect("write util");

        let loader = FsSourceLoader::new(&root).expect("loader");
        let main = loader.resolve("main.rhai", None).expect("explicit extension");
        assert_eq!(main, root.join("main.rhai"));
        let util = loader
            .resolve("util", Some(&root.join("lib")))
            .expect("implicit extension");
        assert_eq!(util, root.join("lib").join("util.rhai"));
        assert_eq!(loader.read(&util).expect("read util"), "let b = 2;");

        let missing = loader.resolve("missing", None).expect_err("missing");
        assert_eq!(missing.code, "SOURCE_NOT_FOUND");
        let unreadable = loader.read(&root.join("nope.rhai")).expect_err("unreadable");
        assert_eq!(unreadable.code, "SOURCE_READ");
    }

    #[test]
    fn memory_loader_places_relative_files_under_root() {
        let loader = MemorySourceLoader::new("/scripts")
            .with_file("main.rhai", "let a = 1;")
            .with_file("/abs/other.rhai", "let b = 2;");
        assert_eq!(
            loader.resolve("main", None).expect("main"),
            PathBuf::from("/scripts/main.rhai")
        );
        assert_eq!(
            loader.resolve("/abs/other.rhai", None).expect("absolute"),
            PathBuf::from("/abs/other.rhai")
        );
        assert_eq!(
            loader
                .read(Path::new("/scripts/main.rhai"))
                .expect("read main"),
            "let a = 1;"
        );
        assert_eq!(
            loader.resolve("gone", None).expect_err("gone").code,
            "SOURCE_NOT_FOUND"
        );
    }
}
