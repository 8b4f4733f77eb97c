use tandem_core::{ChatMessage, ParticipantIdentity};

/// Session-scoped, append-only chat history.
#[derive(Debug, Default)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and appends an outgoing message. Blank content yields `None`
    /// and leaves the log untouched.
    pub fn compose(&mut self, sender: &ParticipantIdentity, content: &str) -> Option<ChatMessage> {
        if content.trim().is_empty() {
            return None;
        }
        let message = ChatMessage::new(sender.clone(), content);
        self.messages.push(message.clone());
        Some(message)
    }

    /// Appends a received message as-is. No deduplication.
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
