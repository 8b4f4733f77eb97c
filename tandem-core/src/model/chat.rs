use crate::model::participant::ParticipantIdentity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: ParticipantIdentity,
    pub content: String,
}

impl ChatMessage {
    pub fn new(sender: ParticipantIdentity, content: impl Into<String>) -> Self {
        Self {
            sender,
            content: content.into(),
        }
    }
}
