use super::message::{Message, MessageId, Role};

/// In-memory view of the active thread's messages.
///
/// Mutation is limited to four transitions: append a provisional entry,
/// patch a provisional entry by id, drop a provisional entry, and replace
/// the whole list from the store. Everything else is read-only.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Committed history: every entry the store has acknowledged.
    pub fn committed(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|message| !message.is_provisional())
            .cloned()
            .collect()
    }

    pub fn push_provisional(&mut self, message: Message) {
        debug_assert!(message.is_provisional());
        self.messages.push(message);
    }

    /// Replace the content of the provisional entry matching `id`.
    ///
    /// Only assistant-role provisional entries are patched; a stream never
    /// rewrites what the user typed.
    pub fn patch_provisional(&mut self, id: &MessageId, content: &str) {
        for message in &mut self.messages {
            if message.id == *id
                && message.is_provisional()
                && message.role != Role::User
            {
                message.content = content.to_string();
            }
        }
    }

    pub fn drop_provisional(&mut self, id: &MessageId) {
        self.messages
            .retain(|message| !(message.is_provisional() && message.id == *id));
    }

    /// Replace the whole transcript with the store's canonical list.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_patch_updates_matching_assistant_entry() {
        let mut transcript = Transcript::new();
        let assistant = Message::assistant("");
        let id = assistant.id.clone();
        transcript.push_provisional(assistant);

        transcript.patch_provisional(&id, "Hello");
        transcript.patch_provisional(&id, "Hello world");

        assert_eq!(transcript.messages()[0].content, "Hello world");
    }

    #[test]
    fn test_patch_never_touches_user_entries() {
        let mut transcript = Transcript::new();
        let user = Message::user("original question");
        let id = user.id.clone();
        transcript.push_provisional(user);

        transcript.patch_provisional(&id, "overwritten");

        assert_eq!(transcript.messages()[0].content, "original question");
    }

    #[test]
    fn test_drop_removes_only_the_matching_provisional() {
        let mut transcript = Transcript::new();
        let keep = Message::assistant("kept");
        let drop = Message::assistant("partial");
        let drop_id = drop.id.clone();
        transcript.push_provisional(keep);
        transcript.push_provisional(drop);

        transcript.drop_provisional(&drop_id);

        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.messages()[0].content, "kept");
    }

    #[test]
    fn test_committed_filters_provisional_entries() {
        let mut transcript = Transcript::new();
        transcript.replace_all(vec![Message::durable(
            "m1",
            Role::User,
            "hi",
            None,
            Utc::now(),
        )]);
        transcript.push_provisional(Message::assistant("partial"));

        let committed = transcript.committed();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].content, "hi");
    }

    #[test]
    fn test_replace_all_discards_previous_state() {
        let mut transcript = Transcript::new();
        transcript.push_provisional(Message::user("pending"));

        transcript.replace_all(vec![
            Message::durable("m1", Role::User, "hi", None, Utc::now()),
            Message::durable("m2", Role::Assistant, "hello", None, Utc::now()),
        ]);

        assert_eq!(transcript.len(), 2);
        assert!(transcript.messages().iter().all(|m| !m.is_provisional()));
    }
}
