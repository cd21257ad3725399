use std::path::{Path, PathBuf};

use hs_compiler::SCRIPT_EXTENSION;
use hs_core::{HostArg, HostScriptError, HostValue};
use walkdir::WalkDir;

use crate::{map_cli_args_invalid, map_cli_source_path, map_cli_source_scan};

pub(crate) fn resolve_scripts_dir(scripts_dir: &str) -> Result<PathBuf, HostScriptError> {
    let path = PathBuf::from(scripts_dir);
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map_err(map_cli_source_path)?
            .join(path)
    };

    if !absolute.exists() {
        return Err(HostScriptError::new(
            "CLI_SOURCE_NOT_FOUND",
            format!("scripts-dir does not exist: {}", absolute.display()),
        ));
    }

    if !absolute.is_dir() {
        return Err(HostScriptError::new(
            "CLI_SOURCE_NOT_DIR",
            format!("scripts-dir is not a directory: {}", absolute.display()),
        ));
    }

    Ok(absolute)
}

/// Top-level script files of `scripts_dir`, sorted. Subdirectories hold
/// files meant for `require` and are not entries.
pub(crate) fn discover_entries(scripts_dir: &Path) -> Result<Vec<String>, HostScriptError> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(scripts_dir)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|extension| extension.to_str()) != Some(SCRIPT_EXTENSION) {
            continue;
        }

        let relative = path
            .strip_prefix(scripts_dir)
            .map_err(map_cli_source_scan)?
            .to_string_lossy()
            .replace('\\', "/");
        entries.push(relative);
    }

    if entries.is_empty() {
        return Err(HostScriptError::new(
            "CLI_SOURCE_EMPTY",
            format!("No .{} files under {}", SCRIPT_EXTENSION, scripts_dir.display()),
        ));
    }

    Ok(entries)
}

pub(crate) fn parse_entry_args(raw: Option<&str>) -> Result<Vec<HostArg>, HostScriptError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let values = serde_json::from_str::<Vec<HostValue>>(raw).map_err(map_cli_args_invalid)?;
    Ok(values.into_iter().map(HostArg::Value).collect())
}
