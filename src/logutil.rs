//! Keep user-supplied strings (command lines, chain descriptions, typed input)
//! on a single log line.

const MAX_PREVIEW: usize = 240;

/// Escape control characters and cap the length of a string destined for the log.
///
/// Newline, carriage return and tab become `\n`, `\r`, `\t`; a literal backslash is
/// doubled; any other control character is written as `\xNN`. Strings longer than
/// the preview limit end in an ellipsis.
pub fn escape_log(s: &str) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count == MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}
