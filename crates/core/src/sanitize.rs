use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

const DOT_LEADER_PATTERN: &str = r"\.{3,}";

fn dot_leaders() -> Result<&'static Regex, regex::Error> {
    static DOT_LEADERS: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    DOT_LEADERS
        .get_or_init(|| Regex::new(DOT_LEADER_PATTERN))
        .as_ref()
        .map_err(Clone::clone)
}

/// Removes every run of three or more `.` characters.
fn strip_dot_leaders(text: &str) -> String {
    match dot_leaders() {
        Ok(pattern) => pattern.replace_all(text, "").into_owned(),
        Err(error) => {
            warn!(error = %error, "dot leader pattern unavailable, text kept as is");
            text.to_string()
        }
    }
}

/// Collapses any whitespace run, non-breaking spaces included, into one space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleans free text before it is stored: drops dot leaders (`...`), collapses
/// whitespace and swaps `"` for `'`.
pub fn sanitize_text(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    normalize_whitespace(&strip_dot_leaders(raw)).replace('"', "'")
}

pub fn sanitize_optional(raw: Option<&str>) -> String {
    raw.map(sanitize_text).unwrap_or_default()
}
