use std::borrow::Cow;

const TRUNCATION_MARKER: &str = "...(truncated)";

/// Squash an error or response text onto one bounded line for diagnostics.
///
/// Anything after a `Stack backtrace:` marker is dropped, and so is the raw body that transport
/// errors append after ` text: `.
pub fn compact_error_message(message: &str, max_len: usize) -> String {
    let head = message
        .split("Stack backtrace:")
        .next()
        .unwrap_or(message);
    let head = match head.split_once(" text: ") {
        Some((prefix, _)) => Cow::Owned(format!("{prefix} text=<omitted>")),
        None => Cow::Borrowed(head),
    };

    let single_line = head.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.len() <= max_len {
        return single_line;
    }
    let cut = (0..=max_len)
        .rev()
        .find(|idx| single_line.is_char_boundary(*idx))
        .unwrap_or(0);
    format!("{}{}", single_line[..cut].trim_end(), TRUNCATION_MARKER)
}
