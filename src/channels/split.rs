//! Outbound message chunking.

/// Appended to every chunk except the last.
pub const CONTINUATION_SUFFIX: &str = "...";

/// Split `text` into chunks of at most `max_chars` characters each, cut at
/// fixed offsets. Every non-final chunk gets [`CONTINUATION_SUFFIX`] on top
/// of its payload.
///
/// Offsets count characters, not bytes, so multi-byte text is never cut
/// inside a code point. An empty message yields no chunks.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    let mut chunks: Vec<String> = chars
        .chunks(max_chars)
        .map(|payload| payload.iter().collect())
        .collect();

    let last = chunks.len().saturating_sub(1);
    for chunk in chunks.iter_mut().take(last) {
        chunk.push_str(CONTINUATION_SUFFIX);
    }
    chunks
}
