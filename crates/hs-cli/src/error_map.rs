use hs_core::HostScriptError;
use std::fmt::Display;

fn map_error(code: &'static str, error: impl Display) -> HostScriptError {
    HostScriptError::new(code, error.to_string())
}

pub(crate) fn emit_error(error: HostScriptError) -> i32 {
    println!("RESULT:ERROR");
    println!("ERROR_CODE:{}", error.code);
    println!(
        "ERROR_MSG_JSON:{}",
        serde_json::to_string(&error.message).unwrap_or_else(|_| "\"Unknown error\"".to_string())
    );
    if let Some(line) = error.line() {
        println!("ERROR_LINE:{}", line);
    }
    1
}

pub(crate) fn map_cli_source_path(error: std::io::Error) -> HostScriptError {
    map_error("CLI_SOURCE_PATH", error)
}

pub(crate) fn map_cli_source_scan(error: std::path::StripPrefixError) -> HostScriptError {
    map_error("CLI_SOURCE_SCAN", error)
}

pub(crate) fn map_cli_args_invalid(error: serde_json::Error) -> HostScriptError {
    map_error("CLI_ARGS_INVALID", error)
}

pub(crate) fn map_cli_log_level(error: impl Display) -> HostScriptError {
    map_error("CLI_LOG_LEVEL", error)
}

#[cfg(test)]
mod error_map_tests {
    use super::*;

    #[test]
    fn emit_error_returns_non_zero_exit_code() {
        let code = emit_error(HostScriptError::new("ERR", "failed"));
        assert_eq!(code, 1);
    }

    #[test]
    fn mapping_helpers_keep_error_codes() {
        assert_eq!(
            map_cli_source_path(std::io::Error::other("path")).code,
            "CLI_SOURCE_PATH"
        );

        let strip_error = std::path::Path::new("/a")
            .strip_prefix("/b")
            .expect_err("strip prefix");
        assert_eq!(map_cli_source_scan(strip_error).code, "CLI_SOURCE_SCAN");

        let invalid = serde_json::from_str::<serde_json::Value>("[").expect_err("invalid json");
        assert_eq!(map_cli_args_invalid(invalid).code, "CLI_ARGS_INVALID");
        assert_eq!(map_cli_log_level("loud").code, "CLI_LOG_LEVEL");
    }
}
