use std::str::FromStr;

use hs_core::HostScriptError;
use tracing::Level;

use crate::map_cli_log_level;

/// Installs the stderr fmt subscriber; stdout is reserved for result lines.
pub(crate) fn init_tracing(level: &str) -> Result<(), HostScriptError> {
    let level = Level::from_str(level).map_err(map_cli_log_level)?;
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod logging_tests {
    use super::*;

    #[test]
    fn rejects_unknown_levels() {
        let error = init_tracing("chatty").expect_err("unknown level");
        assert_eq!(error.code, "CLI_LOG_LEVEL");
        init_tracing("debug").expect("debug level");
        init_tracing("warn").expect("second install is tolerated");
    }
}
