/// Quotes a single shell argument so it survives copy-paste into a POSIX shell.
///
/// Plain words are left untouched; anything else is wrapped in single quotes.
pub fn shell_quote(arg: &str) -> String {
    let is_plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | ',' | '=' | '@' | '+' | '%'));

    if is_plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Short random token used to keep ids unique across repeated fetches.
pub fn generate_freshness_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Splits the contents of a batch file into trimmed, non-blank lines.
pub fn non_blank_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
