use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use murmur_compose::{ChannelSink, CompositionController, Microphone, PreviewProvider, UserDirectory};
use murmur_social::{ReactionAggregator, ThreadStore};
use murmur_store::KeyValueStore;
use murmur_types::config::ComposerConfig;
use murmur_types::models::{FinalizedMessagePayload, MessageId, RawFile, Reply, UserId};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::command::{Command, HELP, MessageRef};

/// One user's composer plus the reactions and threads of what they sent.
pub struct Session<M> {
    composer: CompositionController<M>,
    outbox: mpsc::UnboundedReceiver<FinalizedMessagePayload>,
    reactions: ReactionAggregator,
    threads: ThreadStore,
    user_id: UserId,
    last_sent: Option<MessageId>,
}

impl<M: Microphone> Session<M> {
    pub fn new(
        config: ComposerConfig,
        user_id: UserId,
        directory: Arc<dyn UserDirectory>,
        previews: Arc<dyn PreviewProvider>,
        microphone: M,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let (sink, outbox) = ChannelSink::new();
        Self {
            composer: CompositionController::new(config, directory, Arc::new(sink), previews, microphone, store),
            outbox,
            reactions: ReactionAggregator::new(user_id),
            threads: ThreadStore::new(),
            user_id,
            last_sent: None,
        }
    }

    /// Run one command and describe its result as JSON.
    pub async fn execute(&mut self, command: Command) -> Result<Value> {
        self.composer.poll_previews();
        let out = match command {
            Command::Text(text) => {
                let cursor = text.chars().count();
                self.composer.on_text_change(text, cursor)?;
                self.state()
            }
            Command::Cursor(at) => {
                self.composer.on_selection_change(at, at);
                self.state()
            }
            Command::Select(start, end) => {
                self.composer.on_selection_change(start, end);
                self.state()
            }
            Command::Format(style) => {
                self.composer.on_toolbar_action(style)?;
                self.state()
            }
            Command::List(style) => {
                self.composer.on_list_action(style)?;
                self.state()
            }
            Command::Emoji(emoji) => {
                self.composer.insert_emoji(&emoji)?;
                self.state()
            }
            Command::Recent => json!({ "recent": self.composer.load_recent_emojis()? }),
            Command::Key(key) => {
                let outcome = self.composer.on_key(key)?;
                let mut out = self.state();
                out["key"] = json!(format!("{:?}", outcome));
                out["sent"] = self.drain_outbox();
                out
            }
            Command::Attach(path) => {
                let file = read_file(&path).await?;
                let ids = self.composer.add_attachments([file]);
                json!({ "attached": ids, "attachments": self.composer.attachments() })
            }
            Command::Detach(id) => {
                let removed = self.composer.remove_attachment(id);
                json!({ "detached": removed, "attachments": self.composer.attachments() })
            }
            Command::Voice => {
                self.composer.start_voice().await?;
                json!({ "recording": self.composer.is_recording() })
            }
            Command::StopVoice => {
                let id = self.composer.stop_voice()?;
                json!({ "attached": [id], "attachments": self.composer.attachments() })
            }
            Command::CancelVoice => json!({ "cancelled": self.composer.cancel_voice() }),
            Command::Reply(target) => {
                let parent = target.map(|t| self.resolve(t)).transpose()?;
                self.composer.set_reply_to(parent);
                self.state()
            }
            Command::Send => {
                self.composer.on_send()?;
                json!({ "sent": self.drain_outbox() })
            }
            Command::Discard => {
                self.composer.discard();
                self.state()
            }
            Command::React(target, emoji) => {
                let message_id = self.resolve(target)?;
                let event = self.reactions.toggle(message_id, &emoji);
                json!({ "event": event, "reactions": self.reactions.view(message_id) })
            }
            Command::Reactions(target) => {
                let message_id = self.resolve(target)?;
                json!({ "message_id": message_id, "reactions": self.reactions.view(message_id) })
            }
            Command::Thread(target) => {
                let message_id = self.resolve(target)?;
                json!({ "thread": self.threads.start_thread(message_id) })
            }
            Command::Replies(target) => {
                let thread_id = self.resolve(target)?;
                json!({ "thread": thread_id, "replies": self.threads.replies_of(thread_id) })
            }
            Command::State => self.state(),
            Command::Help => json!({ "help": HELP }),
            Command::Quit => json!({ "bye": true }),
        };
        Ok(out)
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    fn resolve(&self, target: MessageRef) -> Result<MessageId> {
        match target {
            MessageRef::Id(id) => Ok(id),
            MessageRef::Last => self.last_sent.context("no message sent yet"),
        }
    }

    /// Assign ids to payloads the composer handed off and file replies under
    /// their threads.
    fn drain_outbox(&mut self) -> Value {
        let mut sent = Vec::new();
        while let Ok(payload) = self.outbox.try_recv() {
            let id = Uuid::new_v4();
            if let Some(parent) = payload.reply_to {
                let entry = self.threads.add_reply(
                    parent,
                    Reply {
                        id,
                        author_id: self.user_id,
                        text: payload.text.clone(),
                        created_at: Utc::now(),
                    },
                );
                debug!("Filed {} under thread {}", id, entry.thread_id);
            }
            self.last_sent = Some(id);
            sent.push(json!({ "id": id, "payload": payload }));
        }
        Value::Array(sent)
    }

    fn state(&self) -> Value {
        let mention = self.composer.mention_query().map(|q| {
            json!({
                "query": q.query,
                "anchor": q.anchor,
                "candidates": self.composer.mention_candidates(),
                "selected": self.composer.mention_selected_index(),
            })
        });
        let state = self.composer.state();
        json!({
            "state": {
                "text": state.text,
                "selection": state.selection,
                "reply_to": state.reply_to,
            },
            "mention": mention,
            "attachments": self.composer.attachments(),
            "recording": self.composer.is_recording(),
        })
    }
}

async fn read_file(path: &Path) -> Result<RawFile> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".into());
    Ok(RawFile::new(name, mime_for(path), data))
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "txt" | "md" => "text/plain",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "webm" => "audio/webm",
        "ogg" => "audio/ogg",
        "mp4" | "m4a" => "audio/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::microphone::NoMicrophone;
    use murmur_compose::ObjectUrlRegistry;
    use murmur_store::MemoryStore;
    use murmur_types::models::DirectoryUser;

    fn session() -> Session<NoMicrophone> {
        let jane = DirectoryUser {
            id: Uuid::from_u128(2),
            name: "Jane Smith".into(),
            handle: "janesmith".into(),
        };
        Session::new(
            ComposerConfig::default(),
            Uuid::from_u128(1),
            Arc::new(vec![jane]),
            Arc::new(ObjectUrlRegistry::default()),
            NoMicrophone,
            Arc::new(MemoryStore::new()),
        )
    }

    async fn run(session: &mut Session<NoMicrophone>, line: &str) -> Result<Value> {
        session.execute(Command::parse(line)?).await
    }

    #[tokio::test]
    async fn send_reports_payload_and_resets() {
        let mut s = session();
        run(&mut s, "text hi @janesmith").await.unwrap();
        let out = run(&mut s, "send").await.unwrap();

        let sent = &out["sent"][0];
        assert_eq!(sent["payload"]["text"], "hi @janesmith");
        assert_eq!(sent["payload"]["mentions"][0]["position"], 3);

        let state = run(&mut s, "state").await.unwrap();
        assert_eq!(state["state"]["text"], "");
    }

    #[tokio::test]
    async fn empty_send_is_an_error() {
        let mut s = session();
        assert!(run(&mut s, "send").await.is_err());
    }

    #[tokio::test]
    async fn mention_dropdown_opens_and_accepts() {
        let mut s = session();
        let out = run(&mut s, "text hey @ja").await.unwrap();
        assert_eq!(out["mention"]["query"], "ja");
        assert_eq!(out["mention"]["candidates"][0]["handle"], "janesmith");

        let out = run(&mut s, "key accept").await.unwrap();
        assert_eq!(out["state"]["text"], "hey @janesmith ");
        assert!(out["mention"].is_null());
    }

    #[tokio::test]
    async fn replies_land_in_the_thread() {
        let mut s = session();
        run(&mut s, "text root").await.unwrap();
        let root = run(&mut s, "send").await.unwrap()["sent"][0]["id"].clone();

        run(&mut s, "reply last").await.unwrap();
        run(&mut s, "text first reply").await.unwrap();
        run(&mut s, "send").await.unwrap();

        let out = run(&mut s, &format!("replies {}", root.as_str().unwrap())).await.unwrap();
        assert_eq!(out["replies"][0]["text"], "first reply");

        // The reply cannot root a thread of its own.
        let out = run(&mut s, "thread last").await.unwrap();
        assert!(out["thread"].is_null());
    }

    #[tokio::test]
    async fn react_toggles() {
        let mut s = session();
        run(&mut s, "text hello").await.unwrap();
        run(&mut s, "send").await.unwrap();

        let out = run(&mut s, "react last 👍").await.unwrap();
        assert_eq!(out["event"]["type"], "ReactionAdd");
        assert_eq!(out["reactions"][0]["count"], 1);

        let out = run(&mut s, "react last 👍").await.unwrap();
        assert_eq!(out["event"]["type"], "ReactionRemove");
        assert_eq!(out["reactions"], json!([]));
    }

    #[tokio::test]
    async fn voice_reports_missing_device() {
        let mut s = session();
        let err = run(&mut s, "voice").await.unwrap_err();
        assert!(err.to_string().contains("microphone unavailable"));
    }

    #[tokio::test]
    async fn attach_reads_file_and_guesses_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        std::fs::write(&path, [0u8; 16]).unwrap();

        let mut s = session();
        let out = run(&mut s, &format!("attach {}", path.display())).await.unwrap();
        assert_eq!(out["attachments"][0]["name"], "shot.png");
        assert_eq!(out["attachments"][0]["mime_type"], "image/png");
        assert_eq!(out["attachments"][0]["size_bytes"], 16);
    }
}
