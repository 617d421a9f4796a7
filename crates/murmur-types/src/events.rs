use serde::{Deserialize, Serialize};

use crate::models::{MessageId, Reply, UserId};

/// Reaction and thread mutations exchanged with the rest of the client.
/// Outgoing events are produced by local toggles; incoming ones are applied
/// to the local views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SocialEvent {
    /// A reaction was added to a message
    ReactionAdd {
        message_id: MessageId,
        user_id: UserId,
        emoji: String,
    },

    /// A reaction was removed from a message
    ReactionRemove {
        message_id: MessageId,
        user_id: UserId,
        emoji: String,
    },

    /// A reply was posted under a parent message
    ThreadReply { parent_id: MessageId, reply: Reply },
}

impl SocialEvent {
    /// The message whose derived view changes when this event is applied.
    pub fn message_id(&self) -> MessageId {
        match self {
            Self::ReactionAdd { message_id, .. } | Self::ReactionRemove { message_id, .. } => *message_id,
            Self::ThreadReply { parent_id, .. } => *parent_id,
        }
    }
}
