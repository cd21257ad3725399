use std::ffi::OsString;
use std::sync::Arc;

use clap::Parser;
use hs_bridge::{dispatch_call, Capabilities, HostBridge, HostCall, HostReply};
use hs_compiler::FsSourceLoader;
use hs_core::{HostScriptError, HostValue, Pid};

mod cli_args;
mod error_map;
mod host_modules;
mod logging;
mod source_loader;

#[cfg(test)]
mod cli_test_support;

pub(crate) use cli_args::Cli;
pub(crate) use error_map::{
    emit_error, map_cli_args_invalid, map_cli_log_level, map_cli_source_path, map_cli_source_scan,
};
pub(crate) use host_modules::builtin_modules;
pub(crate) use logging::init_tracing;
pub(crate) use source_loader::{discover_entries, parse_entry_args, resolve_scripts_dir};

struct EntryResult {
    entry: String,
    pid: Pid,
    value: HostValue,
}

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn run(cli: Cli) -> Result<i32, HostScriptError> {
    init_tracing(&cli.log_level)?;
    let scripts_root = resolve_scripts_dir(&cli.scripts_dir)?;
    let entries = if cli.entries.is_empty() {
        discover_entries(&scripts_root)?
    } else {
        cli.entries.clone()
    };
    let args = parse_entry_args(cli.args.as_deref())?;

    let loader = FsSourceLoader::new(scripts_root)?;
    let mut bridge = HostBridge::new();
    if !bridge.configure(Capabilities::new(Arc::new(loader), Arc::new(builtin_modules))) {
        return Err(HostScriptError::new(
            "CLI_BRIDGE_CONFIGURE",
            "Host bridge rejected the capability table.",
        ));
    }
    if !bridge.start(dispatch_call, cli.queue_size) {
        return Err(HostScriptError::new(
            "CLI_BRIDGE_START",
            "Host bridge failed to start its channel.",
        ));
    }
    let channel = bridge.channel().ok_or_else(|| {
        HostScriptError::new("CLI_BRIDGE_START", "Host bridge has no channel.")
    })?;

    let mut results = Vec::with_capacity(entries.len());
    for entry in entries {
        let reply = channel.request(HostCall::LoadAndRun {
            request: entry.clone(),
            args: args.clone(),
        })?;
        let HostReply::Ran { pid, value } = reply else {
            return Err(HostScriptError::new(
                "CLI_BRIDGE_REPLY",
                format!("Unexpected reply for {}: {:?}", entry, reply),
            ));
        };
        results.push(EntryResult { entry, pid, value });
    }

    bridge.stop()?;
    emit_results(&results);
    Ok(0)
}

fn emit_results(results: &[EntryResult]) {
    println!("RESULT:OK");
    for result in results {
        println!(
            "ENTRY:{}|{}|{}",
            result.entry,
            result.pid,
            serde_json::to_string(&result.value).unwrap_or_else(|_| "null".to_string())
        );
    }
}
