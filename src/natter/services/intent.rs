use lazy_static::lazy_static;
use regex::Regex;

/// Closed set of recognized submission intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Conversation,
    GenerateImage,
}

/// Classifier signature: `(trimmed text, has_attachment) -> Intent`.
/// The orchestrator depends only on [`Intent`], so alternative classifiers
/// can be swapped in without touching orchestration.
pub type IntentClassifier = fn(&str, bool) -> Intent;

lazy_static! {
    // Matches phrasing like "generate an image of a cat".
    static ref IMAGE_REQUEST_REGEX: Regex = Regex::new(
        r"(?i)\b(generate|create)\b.*\bimage(s)?\b.*\bof\b"
    ).expect("IMAGE_REQUEST_REGEX pattern is valid");
}

/// Default keyword classifier. Attachment submissions are always
/// conversational; an attached file routes through vision or extraction,
/// never through image generation.
pub fn classify_default(text: &str, has_attachment: bool) -> Intent {
    if has_attachment {
        return Intent::Conversation;
    }
    if IMAGE_REQUEST_REGEX.is_match(text.trim()) {
        Intent::GenerateImage
    } else {
        Intent::Conversation
    }
}
