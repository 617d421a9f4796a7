use std::sync::Arc;

use murmur_store::{KeyValueStore, RecentEmojiStore};
use murmur_types::config::ComposerConfig;
use murmur_types::models::{
    Attachment, AttachmentId, DirectoryUser, FinalizedMessagePayload, ListStyle, MessageId, RawFile, Selection,
    StyleTag,
};
use murmur_types::text;
use tracing::{debug, info, warn};

use crate::attachments::{AttachmentStaging, PreviewProvider};
use crate::error::ComposeError;
use crate::format::{FormatEdit, FormatToggler};
use crate::keys::{ComposerKey, KeyOutcome};
use crate::mention::{self, MentionPicker, MentionQuery, UserDirectory};
use crate::sink::MessageSink;
use crate::voice::{Microphone, VoiceCapture};

/// The in-progress message. Attachments live in the controller's staging area.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositionState {
    pub text: String,
    pub selection: Selection,
    pub reply_to: Option<MessageId>,
}

struct OpenMention {
    query: MentionQuery,
    picker: MentionPicker,
}

/// Owns one composition buffer and routes every edit, toolbar action,
/// mention, attachment and send through the engine components.
pub struct CompositionController<M> {
    config: ComposerConfig,
    toggler: FormatToggler,
    state: CompositionState,
    mention: Option<OpenMention>,
    attachments: AttachmentStaging,
    voice: VoiceCapture<M>,
    recent: RecentEmojiStore,
    directory: Arc<dyn UserDirectory>,
    sink: Arc<dyn MessageSink>,
}

impl<M: Microphone> CompositionController<M> {
    pub fn new(
        config: ComposerConfig,
        directory: Arc<dyn UserDirectory>,
        sink: Arc<dyn MessageSink>,
        previews: Arc<dyn PreviewProvider>,
        microphone: M,
        emoji_backend: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            toggler: FormatToggler::from_config(&config),
            recent: RecentEmojiStore::new(emoji_backend, config.max_recent),
            state: CompositionState::default(),
            mention: None,
            attachments: AttachmentStaging::new(previews),
            voice: VoiceCapture::new(microphone),
            directory,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    pub fn state(&self) -> &CompositionState {
        &self.state
    }

    pub fn text(&self) -> &str {
        &self.state.text
    }

    pub fn selection(&self) -> Selection {
        self.state.selection
    }

    // -- Typing --

    /// Replace the buffer with what the input control now holds.
    pub fn on_text_change(&mut self, text: impl Into<String>, cursor: usize) -> Result<(), ComposeError> {
        let text = text.into();
        let len = text::char_len(&text);
        self.check_length(len)?;

        self.state.text = text;
        self.state.selection = Selection::cursor(cursor.min(len));
        self.refresh_mention();
        Ok(())
    }

    pub fn on_selection_change(&mut self, start: usize, end: usize) {
        self.state.selection = Selection::new(start, end).clamped(text::char_len(&self.state.text));
        self.refresh_mention();
    }

    // -- Toolbar --

    pub fn on_toolbar_action(&mut self, style: StyleTag) -> Result<(), ComposeError> {
        if !self.config.style_enabled(style) {
            return Err(ComposeError::StyleDisabled(style));
        }
        let edit = self.toggler.apply(&self.state.text, self.state.selection, style)?;
        self.apply_edit(edit);
        Ok(())
    }

    pub fn on_list_action(&mut self, style: ListStyle) -> Result<(), ComposeError> {
        let edit = self.toggler.apply_list(&self.state.text, self.state.selection, style)?;
        self.apply_edit(edit);
        Ok(())
    }

    // -- Emoji --

    /// Replace the selection with `emoji` and remember it as recently used.
    pub fn insert_emoji(&mut self, emoji: &str) -> Result<(), ComposeError> {
        if emoji.trim().is_empty() {
            debug!("Ignoring blank emoji");
            return Ok(());
        }
        let Selection { start, end } = self.state.selection;
        let emoji_len = text::char_len(emoji);
        self.check_length(text::char_len(&self.state.text) - (end - start) + emoji_len)?;

        let edit = FormatEdit {
            text: text::splice(&self.state.text, start, end, emoji),
            selection: Selection::cursor(start + emoji_len),
        };
        self.apply_edit(edit);

        if let Err(e) = self.recent.record(emoji) {
            warn!("Failed to persist recent emoji: {:#}", e);
        }
        Ok(())
    }

    /// Load the persisted recent list so the picker can show it.
    pub fn load_recent_emojis(&mut self) -> anyhow::Result<&[String]> {
        self.recent.load()?;
        Ok(self.recent.list())
    }

    pub fn recent_emojis(&self) -> &[String] {
        self.recent.list()
    }

    // -- Mentions --

    pub fn is_mention_open(&self) -> bool {
        self.mention.is_some()
    }

    pub fn mention_query(&self) -> Option<&MentionQuery> {
        self.mention.as_ref().map(|m| &m.query)
    }

    pub fn mention_candidates(&self) -> &[DirectoryUser] {
        self.mention.as_ref().map(|m| m.picker.candidates()).unwrap_or(&[])
    }

    pub fn mention_selected_index(&self) -> Option<usize> {
        self.mention.as_ref().map(|m| m.picker.selected_index())
    }

    pub fn next_mention(&mut self) -> bool {
        self.mention.as_mut().map(|m| m.picker.next()).is_some()
    }

    pub fn prev_mention(&mut self) -> bool {
        self.mention.as_mut().map(|m| m.picker.prev()).is_some()
    }

    pub fn dismiss_mention(&mut self) -> bool {
        self.mention.take().is_some()
    }

    /// Insert the highlighted candidate as `@handle `.
    pub fn accept_mention(&mut self) -> Result<(), ComposeError> {
        if !self.config.enable_mentions {
            return Err(ComposeError::MentionsDisabled);
        }
        let open = self.mention.as_ref().ok_or(ComposeError::NoMentionOpen)?;
        let user = open.picker.selected().ok_or(ComposeError::NoMentionOpen)?;
        let edit = mention::insert(&self.state.text, &open.query, self.state.selection.end, &user.handle);
        self.check_length(text::char_len(&edit.text))?;

        debug!("Completed mention @{}", user.handle);
        self.mention = None;
        self.apply_edit(edit);
        Ok(())
    }

    // -- Keyboard --

    /// Route a key press. An open mention dropdown claims its navigation keys
    /// first, then the send combination, then formatting shortcuts.
    pub fn on_key(&mut self, key: ComposerKey) -> Result<KeyOutcome, ComposeError> {
        if self.is_mention_open() {
            match key {
                ComposerKey::Up => {
                    self.prev_mention();
                    return Ok(KeyOutcome::MentionNavigated);
                }
                ComposerKey::Down => {
                    self.next_mention();
                    return Ok(KeyOutcome::MentionNavigated);
                }
                ComposerKey::Accept => {
                    self.accept_mention()?;
                    return Ok(KeyOutcome::MentionAccepted);
                }
                ComposerKey::Dismiss => {
                    self.dismiss_mention();
                    return Ok(KeyOutcome::MentionDismissed);
                }
                _ => {}
            }
        }

        match key {
            ComposerKey::Send => {
                self.mention = None;
                self.on_send()?;
                Ok(KeyOutcome::Sent)
            }
            ComposerKey::Format(style) => {
                self.on_toolbar_action(style)?;
                Ok(KeyOutcome::Formatted)
            }
            _ => Ok(KeyOutcome::Ignored),
        }
    }

    // -- Attachments --

    pub fn add_attachments(&mut self, files: impl IntoIterator<Item = RawFile>) -> Vec<AttachmentId> {
        self.attachments.add(files)
    }

    pub fn remove_attachment(&mut self, id: AttachmentId) -> bool {
        self.attachments.remove(id)
    }

    pub fn attachments(&self) -> &[Attachment] {
        self.attachments.pending()
    }

    /// Attach image previews that finished loading in the background.
    pub fn poll_previews(&mut self) -> usize {
        self.attachments.poll_previews()
    }

    /// Wait until every pending preview has loaded or failed.
    pub async fn settle_previews(&mut self) {
        self.attachments.settle().await;
    }

    pub fn is_preview_loading(&self, id: AttachmentId) -> bool {
        self.attachments.is_preview_loading(id)
    }

    pub async fn start_voice(&mut self) -> Result<(), ComposeError> {
        if !self.config.enable_voice {
            return Err(ComposeError::VoiceDisabled);
        }
        self.voice.start().await
    }

    /// Stop recording and stage the result.
    pub fn stop_voice(&mut self) -> Result<AttachmentId, ComposeError> {
        let attachment = self.voice.stop()?;
        Ok(self.attachments.stage(attachment))
    }

    pub fn cancel_voice(&mut self) -> bool {
        self.voice.cancel()
    }

    pub fn is_recording(&self) -> bool {
        self.voice.is_recording()
    }

    // -- Send --

    pub fn set_reply_to(&mut self, reply_to: Option<MessageId>) {
        self.state.reply_to = reply_to;
    }

    /// Finalize the buffer into a payload, hand it to the transport and reset.
    pub fn on_send(&mut self) -> Result<(), ComposeError> {
        if self.state.text.trim().is_empty() && self.attachments.is_empty() {
            debug!("Send rejected: nothing to send");
            return Err(ComposeError::EmptyMessage);
        }

        let mentions = if self.config.enable_mentions {
            mention::resolve(&self.state.text, self.directory.list_users())
        } else {
            Vec::new()
        };

        let payload = FinalizedMessagePayload {
            text: std::mem::take(&mut self.state.text),
            attachments: self.attachments.snapshot(),
            mentions,
            reply_to: self.state.reply_to,
        };

        info!(
            "Sending message: {} chars, {} attachments, {} mentions",
            text::char_len(&payload.text),
            payload.attachments.len(),
            payload.mentions.len()
        );
        self.sink.send_message(payload);
        self.reset();
        Ok(())
    }

    /// Throw the draft away without sending.
    pub fn discard(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.state = CompositionState::default();
        self.mention = None;
        self.attachments.clear();
        if self.voice.cancel() {
            info!("Discarded in-progress recording on reset");
        }
    }

    fn check_length(&self, len: usize) -> Result<(), ComposeError> {
        if len > self.config.max_length {
            debug!("Edit rejected: {} > {} chars", len, self.config.max_length);
            return Err(ComposeError::TooLong {
                len,
                max: self.config.max_length,
            });
        }
        Ok(())
    }

    fn apply_edit(&mut self, edit: FormatEdit) {
        self.state.text = edit.text;
        self.state.selection = edit.selection;
        self.refresh_mention();
    }

    /// Re-run detection at the cursor. The dropdown stays open (and keeps its
    /// highlighted row) only while the same query is still live.
    fn refresh_mention(&mut self) {
        if !self.config.enable_mentions || !self.state.selection.is_collapsed() {
            self.mention = None;
            return;
        }
        let Some(query) = mention::detect(&self.state.text, self.state.selection.end) else {
            self.mention = None;
            return;
        };
        if self.mention.as_ref().is_some_and(|open| open.query == query) {
            return;
        }

        let candidates: Vec<DirectoryUser> = mention::filter(&query.query, self.directory.list_users())
            .into_iter()
            .cloned()
            .collect();
        self.mention = if candidates.is_empty() {
            None
        } else {
            Some(OpenMention {
                query,
                picker: MentionPicker::new(candidates),
            })
        };
    }
}
