//! Output sanitizer
//!
//! Turns one raw line of container output into text fit for a log, or into
//! an empty string when the line is framing noise.

use regex::Regex;
use std::sync::LazyLock;

/// Size of the multiplexed log frame header
const FRAME_HEADER_LEN: usize = 8;

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").unwrap());

// Colour codes whose escape byte was already lost, e.g. "[0m", "[m" or "[K".
// The parameterless forms must end at a word boundary so "[INFO]" and
// "[mysql]" survive.
static BARE_COLOR_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(?:[0-9;]+[a-zA-Z]|[mK]\b)").unwrap());

/// Cleans one raw log line
///
/// # Arguments
/// * `raw` - Line bytes as read from the engine, possibly still framed
///
/// # Returns
/// The cleaned line, or an empty string if nothing worth showing remains
pub fn clean(raw: &[u8]) -> String {
    let payload = strip_frame_header(raw);
    let text = String::from_utf8_lossy(payload);
    clean_text(&text)
}

/// Same as [`clean`] for text that carries no frame header
pub fn clean_text(text: &str) -> String {
    let text = ANSI_ESCAPE.replace_all(text, "");
    let text = BARE_COLOR_CODE.replace_all(&text, "");

    let text: String = text
        .chars()
        .filter(|c| !matches!(c, '\u{0}'..='\u{3}'))
        .collect();
    let text = text.trim();

    if text.is_empty() || !mostly_printable(text) {
        return String::new();
    }

    text.to_string()
}

/// Drops the stdout/stderr frame header if the line starts with one
fn strip_frame_header(raw: &[u8]) -> &[u8] {
    match raw.first() {
        Some(1) | Some(2) if raw.len() >= FRAME_HEADER_LEN => &raw[FRAME_HEADER_LEN..],
        _ => raw,
    }
}

/// At least half the characters are printable ASCII
fn mostly_printable(text: &str) -> bool {
    let (printable, total) = text.chars().fold((0usize, 0usize), |(p, t), c| {
        (p + usize::from(matches!(c, ' '..='~')), t + 1)
    });
    printable * 2 >= total
}
