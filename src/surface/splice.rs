use thiserror::Error;

use super::markup::char_to_byte;

/// A splice range that does not satisfy `start <= end <= len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid range {start}..{end} for text of length {len}")]
pub struct InvalidRange {
    pub start: usize,
    pub end: usize,
    pub len: usize,
}

/// Replace the characters in `start..end` of `current` with `insertion`.
///
/// Offsets count Unicode scalar values. A collapsed range inserts.
///
/// # Errors
/// Returns [`InvalidRange`] when the range is inverted or extends past the
/// end of `current`. Callers clamp before splicing.
pub fn insert_at(
    current: &str,
    insertion: &str,
    start: usize,
    end: usize,
) -> Result<String, InvalidRange> {
    let len = current.chars().count();
    if start > end || end > len {
        return Err(InvalidRange { start, end, len });
    }
    let start_byte = char_to_byte(current, start);
    let end_byte = char_to_byte(current, end);

    let mut out = String::with_capacity(current.len() - (end_byte - start_byte) + insertion.len());
    out.push_str(&current[..start_byte]);
    out.push_str(insertion);
    out.push_str(&current[end_byte..]);
    Ok(out)
}

/// Clamp a possibly stale range to `text`, keeping it ordered.
pub fn clamp_range(text: &str, start: usize, end: usize) -> (usize, usize) {
    let len = text.chars().count();
    let start = start.min(len);
    (start, end.clamp(start, len))
}
