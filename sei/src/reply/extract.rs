//! Embedded JSON object extraction

/// Return the span from the first `{` to the last `}` in `text`
///
/// This is a greedy scan, not a brace matcher. It is exact when the text
/// holds at most one JSON object. With several objects, or stray braces in
/// the surrounding prose, the span over-matches and the caller's decode will
/// usually fail (the reply then degrades to plain text).
///
/// Returns `None` when there is no `{`, or no `}` after it.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
