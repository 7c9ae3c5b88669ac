//! Plain-text transcript rendering for the terminal front end.

use lazy_static::lazy_static;
use regex::Regex;

use crate::natter::models::{Message, Role};

lazy_static! {
    // Matches assistant replies that are nothing but an image URL, so the
    // generation branch's output gets a labeled link line.
    static ref IMAGE_URL_REGEX: Regex = Regex::new(
        r"(?i)^https?://.*\.(png|jpg|jpeg|gif|webp|svg|bmp|tiff|ico|avif|apng)(\?.*)?$"
    )
    .expect("IMAGE_URL_REGEX pattern is valid");
}

fn label(role: Role) -> &'static str {
    match role {
        Role::User => "you>",
        Role::Assistant => "assistant>",
        Role::System => "system>",
    }
}

/// True when the text is nothing but an image URL.
pub fn is_image_url(text: &str) -> bool {
    IMAGE_URL_REGEX.is_match(text)
}

/// True when an assistant reply is a bare image URL.
pub fn is_image_reply(message: &Message) -> bool {
    message.role == Role::Assistant && is_image_url(&message.content)
}

/// Human-readable byte count: `1536` becomes `"1.5 KB"`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let mut rendered = format!("{:.2}", value);
    while rendered.ends_with('0') {
        rendered.pop();
    }
    if rendered.ends_with('.') {
        rendered.pop();
    }
    format!("{} {}", rendered, UNITS[exponent])
}

/// One message as terminal lines: a role label, the content, and an
/// attachment line when the message carries a file record.
pub fn render_message(message: &Message) -> String {
    let mut lines = Vec::new();
    if is_image_reply(message) {
        lines.push(format!("{} [image] {}", label(message.role), message.content));
    } else {
        lines.push(format!("{} {}", label(message.role), message.content));
    }
    if let Some(attachment) = &message.attachment {
        lines.push(format!(
            "  [file] {} ({})",
            attachment.name,
            format_file_size(attachment.size_bytes)
        ));
    }
    lines.join("\n")
}

/// The whole transcript, one rendered message per block.
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(render_message)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::natter::models::FileAttachment;

    #[test]
    fn test_labels_user_and_assistant() {
        let rendered = render_transcript(&[
            Message::user("hello"),
            Message::assistant("hi back"),
        ]);
        assert_eq!(rendered, "you> hello\nassistant> hi back");
    }

    #[test]
    fn test_bare_image_reply_renders_as_labeled_link() {
        let message = Message::assistant("https://img.example/cat.PNG?sig=abc");
        assert!(is_image_reply(&message));
        assert_eq!(
            render_message(&message),
            "assistant> [image] https://img.example/cat.PNG?sig=abc"
        );
    }

    #[test]
    fn test_image_url_inside_prose_stays_plain() {
        let message = Message::assistant("see https://img.example/cat.png for the result");
        assert!(!is_image_reply(&message));
    }

    #[test]
    fn test_user_image_url_is_not_a_link_line() {
        let message = Message::user("https://img.example/cat.png");
        assert!(!is_image_reply(&message));
        assert_eq!(render_message(&message), "you> https://img.example/cat.png");
    }

    #[test]
    fn test_attachment_line_shows_name_and_size() {
        let message = Message::user("Attached file (notes.txt)\nsummarize")
            .with_attachment(FileAttachment::new(
                "notes.txt",
                "text/plain",
                1536,
                "https://files.example/notes.txt",
            ));
        assert_eq!(
            render_message(&message),
            "you> Attached file (notes.txt)\nsummarize\n  [file] notes.txt (1.5 KB)"
        );
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(10_485_760), "10 MB");
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let messages = vec![
            Message::user("question"),
            Message::assistant("https://img.example/out.png"),
        ];
        let first = render_transcript(&messages);
        let second = render_transcript(&messages);
        assert_eq!(first, second);
    }
}
