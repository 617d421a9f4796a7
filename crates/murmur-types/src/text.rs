//! Character-offset helpers. Every offset in the composition engine counts
//! Unicode scalar values, so these convert to and from byte offsets.

/// Number of characters in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte offset of character `idx`, or `text.len()` when `idx` is past the end.
pub fn byte_offset(text: &str, idx: usize) -> usize {
    text.char_indices()
        .nth(idx)
        .map(|(b, _)| b)
        .unwrap_or(text.len())
}

/// Character offset of byte offset `byte`. `byte` must be a char boundary.
pub fn char_offset(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

/// Slice `text` by character range `[start, end)`.
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let s = byte_offset(text, start);
    let e = byte_offset(text, end);
    &text[s..e]
}

/// Replace character range `[start, end)` with `replacement`.
pub fn splice(text: &str, start: usize, end: usize, replacement: &str) -> String {
    let s = byte_offset(text, start);
    let e = byte_offset(text, end);
    let mut out = String::with_capacity(text.len() - (e - s) + replacement.len());
    out.push_str(&text[..s]);
    out.push_str(replacement);
    out.push_str(&text[e..]);
    out
}
