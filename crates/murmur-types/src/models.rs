use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type MessageId = Uuid;
pub type AttachmentId = Uuid;

// -- Selection --

/// A selection inside the composition buffer, in character offsets.
/// A collapsed selection (`start == end`) is a plain cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    pub fn cursor(pos: usize) -> Self {
        Self { start: pos, end: pos }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Clamp both bounds to a text of `len` characters.
    pub fn clamped(self, len: usize) -> Self {
        Self::new(self.start.min(len), self.end.min(len))
    }
}

// -- Formatting --

/// Inline formatting styles. Each maps to the sigil that wraps the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleTag {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
}

impl StyleTag {
    pub const ALL: [StyleTag; 5] = [
        StyleTag::Bold,
        StyleTag::Italic,
        StyleTag::Underline,
        StyleTag::Strikethrough,
        StyleTag::Code,
    ];

    pub fn wrapper(self) -> &'static str {
        match self {
            Self::Bold => "**",
            Self::Italic => "*",
            Self::Underline => "__",
            Self::Strikethrough => "~~",
            Self::Code => "`",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "bold" => Some(Self::Bold),
            "italic" => Some(Self::Italic),
            "underline" => Some(Self::Underline),
            "strikethrough" | "strike" => Some(Self::Strikethrough),
            "code" => Some(Self::Code),
            _ => None,
        }
    }
}

impl fmt::Display for StyleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bold => "bold",
            Self::Italic => "italic",
            Self::Underline => "underline",
            Self::Strikethrough => "strikethrough",
            Self::Code => "code",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListStyle {
    Bullet,
    Numbered,
}

// -- Directory --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: UserId,
    pub name: String,
    pub handle: String,
}

// -- Attachments --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    File,
    Voice,
}

/// A file picked by the user, before it is staged.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl RawFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// Opaque preview resource (an object URL or similar) that must be released
/// exactly once. Deliberately not `Clone`.
#[derive(Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreviewHandle(String);

impl PreviewHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub kind: AttachmentKind,
    #[serde(skip)]
    pub raw_data: Bytes,
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub preview_handle: Option<PreviewHandle>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration_seconds: Option<u32>,
}

impl Attachment {
    pub fn from_file(file: RawFile) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: AttachmentKind::File,
            size_bytes: file.data.len() as u64,
            raw_data: file.data,
            name: file.name,
            mime_type: file.mime_type,
            preview_handle: None,
            duration_seconds: None,
        }
    }

    pub fn voice(name: String, mime_type: String, data: Bytes, duration_seconds: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: AttachmentKind::Voice,
            size_bytes: data.len() as u64,
            raw_data: data,
            name,
            mime_type,
            preview_handle: None,
            duration_seconds: Some(duration_seconds),
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Copy of this attachment without its preview handle. The copy shares
    /// the underlying buffer; the handle stays with the original owner.
    pub fn detached(&self) -> Self {
        Self {
            id: self.id,
            kind: self.kind,
            raw_data: self.raw_data.clone(),
            name: self.name.clone(),
            size_bytes: self.size_bytes,
            mime_type: self.mime_type.clone(),
            preview_handle: None,
            duration_seconds: self.duration_seconds,
        }
    }
}

// -- Messages --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub user_id: UserId,
    pub display_token: String,
    pub position: usize,
    pub length: usize,
}

/// The unit handed to the transport. Built once at send time and never
/// mutated afterwards.
#[derive(Debug, Serialize, Deserialize)]
pub struct FinalizedMessagePayload {
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub mentions: Vec<Mention>,
    pub reply_to: Option<MessageId>,
}

// -- Reactions --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub id: Uuid,
    pub message_id: MessageId,
    pub emoji: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Per-emoji view of a message's reactions, derived on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionGroup {
    pub emoji: String,
    pub count: usize,
    /// Reacting users in the order they reacted; never contains duplicates.
    pub user_ids: Vec<UserId>,
    pub current_user_reacted: bool,
}

// -- Threads --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadEntry {
    pub reply_id: MessageId,
    pub parent_id: MessageId,
    pub thread_id: MessageId,
}

/// A reply message as delivered to the thread store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: MessageId,
    pub author_id: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyEntry {
    pub entry: ThreadEntry,
    pub author_id: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_normalizes_and_clamps() {
        let sel = Selection::new(7, 3);
        assert_eq!(sel, Selection { start: 3, end: 7 });
        assert_eq!(sel.clamped(5), Selection { start: 3, end: 5 });
        assert!(Selection::cursor(4).is_collapsed());
    }

    #[test]
    fn detached_attachment_drops_preview() {
        let mut attachment = Attachment::from_file(RawFile::new("a.png", "image/png", vec![1u8, 2, 3]));
        attachment.preview_handle = Some(PreviewHandle::new("blob:1"));

        let copy = attachment.detached();
        assert_eq!(copy.id, attachment.id);
        assert_eq!(copy.size_bytes, 3);
        assert!(copy.preview_handle.is_none());
        assert!(attachment.preview_handle.is_some());
    }

    #[test]
    fn style_names_round_trip_through_parse() {
        for style in StyleTag::ALL {
            assert_eq!(StyleTag::parse(&style.to_string()), Some(style));
        }
        assert_eq!(StyleTag::parse("blink"), None);
    }
}
