use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity of a transcript entry.
///
/// Provisional ids are assigned client-side for optimistic rendering and are
/// discarded once the store acknowledges the turn; durable ids come from the
/// store and are the only ids that survive a transcript refetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    Provisional(Uuid),
    Durable(String),
}

impl MessageId {
    pub fn provisional() -> Self {
        Self::Provisional(Uuid::new_v4())
    }

    pub fn durable(id: impl Into<String>) -> Self {
        Self::Durable(id.into())
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, Self::Provisional(_))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provisional(id) => write!(f, "provisional:{}", id),
            Self::Durable(id) => write!(f, "{}", id),
        }
    }
}

/// Message author role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Distinguishes plain text turns from file-backed ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    File,
}

/// File metadata carried by a message, serialized with the store's wire
/// field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub name: String,
    #[serde(rename = "type")]
    pub media_type: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(rename = "url")]
    pub retrieval_url: String,
}

impl FileAttachment {
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        size_bytes: u64,
        retrieval_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size_bytes,
            retrieval_url: retrieval_url.into(),
        }
    }
}

/// One turn in a conversation.
///
/// `content` is what the terminal renders; `extracted_text` is document text
/// transmitted to the assistant but never rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub kind: MessageKind,
    pub attachment: Option<FileAttachment>,
    pub extracted_text: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a provisional user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::provisional(),
            role: Role::User,
            content: content.into(),
            kind: MessageKind::Text,
            attachment: None,
            extracted_text: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a provisional assistant message, typically empty and filled in
    /// as streamed tokens arrive.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::provisional(),
            role: Role::Assistant,
            content: content.into(),
            kind: MessageKind::Text,
            attachment: None,
            extracted_text: None,
            timestamp: Utc::now(),
        }
    }

    /// Reconstruct a message from a durable store row.
    pub fn durable(
        id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        attachment: Option<FileAttachment>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let kind = if attachment.is_some() {
            MessageKind::File
        } else {
            MessageKind::Text
        };
        Self {
            id: MessageId::durable(id),
            role,
            content: content.into(),
            kind,
            attachment,
            extracted_text: None,
            timestamp,
        }
    }

    pub fn with_attachment(mut self, attachment: FileAttachment) -> Self {
        self.kind = MessageKind::File;
        self.attachment = Some(attachment);
        self
    }

    pub fn with_extracted_text(mut self, text: impl Into<String>) -> Self {
        self.extracted_text = Some(text.into());
        self
    }

    pub fn is_provisional(&self) -> bool {
        self.id.is_provisional()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_wire_names() {
        for role in [Role::User, Role::Assistant, Role::System] {
            let parsed: Role = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
        assert!("moderator".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn test_attachment_uses_store_field_names() {
        let attachment = FileAttachment::new("report.xlsx", "application/vnd.ms-excel", 1024, "https://files.example/report.xlsx");
        let json = serde_json::to_value(&attachment).unwrap();
        assert_eq!(json["name"], "report.xlsx");
        assert_eq!(json["type"], "application/vnd.ms-excel");
        assert_eq!(json["size"], 1024);
        assert_eq!(json["url"], "https://files.example/report.xlsx");
    }

    #[test]
    fn test_new_messages_are_provisional() {
        assert!(Message::user("hello").is_provisional());
        assert!(Message::assistant("").is_provisional());
    }

    #[test]
    fn test_durable_message_infers_kind_from_attachment() {
        let plain = Message::durable("m1", Role::User, "hi", None, Utc::now());
        assert_eq!(plain.kind, MessageKind::Text);
        assert!(!plain.is_provisional());

        let attachment = FileAttachment::new("a.txt", "text/plain", 3, "https://files.example/a.txt");
        let with_file = Message::durable("m2", Role::User, "hi", Some(attachment), Utc::now());
        assert_eq!(with_file.kind, MessageKind::File);
    }

    #[test]
    fn test_with_attachment_marks_kind_file() {
        let attachment = FileAttachment::new("a.txt", "text/plain", 3, "https://files.example/a.txt");
        let message = Message::user("Attached file (a.txt)").with_attachment(attachment);
        assert_eq!(message.kind, MessageKind::File);
        assert!(message.attachment.is_some());
    }
}
