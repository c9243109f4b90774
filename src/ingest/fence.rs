//! Markdown code-fence stripping
//!
//! Model output often arrives wrapped as
//! ````text
//! ```json
//! [ ... ]
//! ```
//! ````
//! even when the prompt asks for bare JSON. This is a purely textual pass;
//! nothing here looks at JSON syntax.

const FENCE: &str = "```";
const LANGUAGE_TAG: &str = "json";

/// Remove an optional outer code fence and `json` language tag.
///
/// Unfenced input is returned unchanged, untrimmed.
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with(FENCE) {
        return text;
    }

    let mut segments = trimmed.split(FENCE);
    // The opening fence leaves an empty leading segment
    segments.next();
    let Some(content) = segments.next() else {
        return text;
    };

    let content = content.trim();
    match content.get(..LANGUAGE_TAG.len()) {
        Some(tag) if tag.eq_ignore_ascii_case(LANGUAGE_TAG) => {
            content[LANGUAGE_TAG.len()..].trim()
        }
        _ => content,
    }
}
