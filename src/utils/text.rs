//! Diagnostic text trimming.
//!
//! Subprocess output and HTTP bodies end up in step diagnostics and the
//! persisted report, so they are cut to a bounded number of characters.

/// Maximum characters kept from external output in a diagnostic
pub const DEFAULT_EXCERPT_CHARS: usize = 400;

/// First `max_chars` characters of `text`, trimmed, with an ellipsis when cut
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let kept: String = trimmed.chars().take(max_chars).collect();
    format!("{kept}...")
}

/// Last `max_chars` characters of `text`
///
/// Command failures usually print the useful line last.
pub fn tail_excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= max_chars {
        return trimmed.to_string();
    }
    let kept: String = trimmed.chars().skip(count - max_chars).collect();
    format!("...{kept}")
}
