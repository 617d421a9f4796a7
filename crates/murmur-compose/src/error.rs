use murmur_types::models::StyleTag;
use thiserror::Error;

/// Failures surfaced by composer operations. None of them are fatal: the
/// buffer is left exactly as it was before the rejected operation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("nothing to send: message is blank and has no attachments")]
    EmptyMessage,

    #[error("edit rejected: {len} characters exceeds the limit of {max}")]
    TooLong { len: usize, max: usize },

    #[error("style {0} is disabled")]
    StyleDisabled(StyleTag),

    #[error("mentions are disabled")]
    MentionsDisabled,

    #[error("no mention is being completed")]
    NoMentionOpen,

    #[error("voice messages are disabled")]
    VoiceDisabled,

    #[error("microphone access was denied")]
    PermissionDenied,

    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("no recording in progress")]
    NotRecording,

    #[error("microphone unavailable: {0}")]
    Microphone(String),
}

impl ComposeError {
    /// Validation failures are silent no-ops the UI only flashes.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::EmptyMessage | Self::TooLong { .. })
    }
}
