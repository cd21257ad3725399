const BYTE_ORDER_MARK: char = '\u{feff}';

pub fn strip_bom(source: &str) -> &str {
    source.strip_prefix(BYTE_ORDER_MARK).unwrap_or(source)
}

/// Drops a leading `#!` line but keeps its line terminator, so line numbers
/// reported for the rest of the file stay the same.
pub fn strip_shebang(source: &str) -> &str {
    if !source.starts_with("#!") {
        return source;
    }

    let Some(offset) = source[2..].find('\n') else {
        return "";
    };
    let mut index = offset + 2;
    if source.as_bytes()[index - 1] == b'\r' {
        index -= 1;
    }
    &source[index..]
}

pub fn prepare_source(source: &str) -> &str {
    strip_shebang(strip_bom(source))
}
