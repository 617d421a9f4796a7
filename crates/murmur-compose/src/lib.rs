//! Murmur compose: the message composition engine.
//!
//! - Inline formatting toggles over arbitrary selections
//! - @mention detection, filtering, insertion and resolution
//! - Staged file and voice attachments with owned preview handles
//! - A controller that ties them to one text buffer and produces payloads

pub mod attachments;
pub mod controller;
pub mod error;
pub mod format;
pub mod keys;
pub mod mention;
pub mod sink;
pub mod voice;

pub use attachments::{AttachmentStaging, ObjectUrlRegistry, PreviewError, PreviewProvider};
pub use controller::{CompositionController, CompositionState};
pub use error::ComposeError;
pub use format::{FormatEdit, FormatToggler};
pub use keys::{ComposerKey, KeyOutcome};
pub use mention::{MentionPicker, MentionQuery, UserDirectory};
pub use sink::{ChannelSink, MessageSink};
pub use voice::{AudioStream, Microphone, MicrophoneError, VoiceCapture};
