use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Display width of a string in terminal columns (CJK and emoji count as 2).
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncates a title or overview to `max_width` columns, appending "..." when cut.
///
/// Widths of three columns or less leave no room for an ellipsis, so the text is
/// cut to whatever characters fit. Text that already fits is returned borrowed.
///
/// ```
/// use fakeflix::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Stranger Things", 10), "Strange...");
/// assert_eq!(truncate_to_width("Dune", 10), "Dune");
/// assert_eq!(truncate_to_width("Dune", 2), "Du");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }
    if max_width <= ELLIPSIS_WIDTH {
        return Cow::Owned(take_columns(s, max_width).to_string());
    }
    let head = take_columns(s, max_width - ELLIPSIS_WIDTH);
    Cow::Owned(format!("{}{}", head, ELLIPSIS))
}

/// Longest prefix of `s` occupying at most `columns` display columns.
fn take_columns(s: &str, columns: usize) -> &str {
    let mut used = 0;
    let mut end = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > columns {
            break;
        }
        used += w;
        end = idx + c.len_utf8();
    }
    &s[..end]
}

/// Uppercases the first character, leaving the rest untouched.
///
/// Genre keys double as route segments ("action", "scifi"); this turns them
/// into headings when no descriptor title is at hand.
pub fn capitalize_first(text: &str) -> Cow<'_, str> {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if !first.is_uppercase() => {
            Cow::Owned(first.to_uppercase().chain(chars).collect())
        }
        _ => Cow::Borrowed(text),
    }
}

/// Year portion of a `YYYY-MM-DD` date as returned by the catalog API.
///
/// Returns `None` for empty or too-short dates (unreleased titles come back
/// with `""`).
pub fn year_only(date: &str) -> Option<&str> {
    let year = date.get(..4)?;
    year.bytes().all(|b| b.is_ascii_digit()).then_some(year)
}

/// Strips terminal control characters and ANSI escape sequences.
///
/// Titles and overviews come from a third-party API and are printed straight to
/// the terminal. Tab, newline and carriage return are kept.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_control =
        |c: char| c == '\x1b' || c == '\x7f' || (c < ' ' && !matches!(c, '\t' | '\n' | '\r'));

    if !s.chars().any(is_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            match chars.peek() {
                // CSI: parameters until a final byte in 0x40..=0x7e
                Some('[') => {
                    chars.next();
                    for n in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&n) {
                            break;
                        }
                    }
                }
                // OSC: until BEL or ESC \
                Some(']') => {
                    chars.next();
                    while let Some(n) = chars.next() {
                        if n == '\x07' {
                            break;
                        }
                        if n == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            }
        } else if !is_control(c) {
            out.push(c);
        }
    }
    Cow::Owned(out)
}
