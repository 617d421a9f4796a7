use std::collections::HashMap;

use murmur_types::events::SocialEvent;
use murmur_types::models::{MessageId, Reply, ReplyEntry, ThreadEntry};
use tracing::debug;

/// Reply messages grouped under their thread root.
///
/// Threads are one level deep: a reply to a reply joins the root's thread.
#[derive(Default)]
pub struct ThreadStore {
    /// reply id -> where it lives
    entries: HashMap<MessageId, ThreadEntry>,
    /// thread id -> replies in send order
    threads: HashMap<MessageId, Vec<ReplyEntry>>,
}

impl ThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// File `reply` under `parent_id`'s thread. A reply id seen before is
    /// ignored and its existing entry returned.
    pub fn add_reply(&mut self, parent_id: MessageId, reply: Reply) -> ThreadEntry {
        if let Some(existing) = self.entries.get(&reply.id) {
            debug!("Reply {} already threaded under {}", reply.id, existing.thread_id);
            return *existing;
        }

        let thread_id = self.thread_of(parent_id).unwrap_or(parent_id);
        let entry = ThreadEntry {
            reply_id: reply.id,
            parent_id,
            thread_id,
        };

        self.entries.insert(reply.id, entry);
        // Replies that arrived before this one rooted a thread at it; they
        // move under the new root so threads stay one level deep.
        let adopted = self.threads.remove(&reply.id).unwrap_or_default();

        let thread = self.threads.entry(thread_id).or_default();
        thread.push(ReplyEntry {
            entry,
            author_id: reply.author_id,
            text: reply.text,
            created_at: reply.created_at,
        });

        if !adopted.is_empty() {
            debug!("Moving {} replies from {} into thread {}", adopted.len(), reply.id, thread_id);
        }
        for mut moved in adopted {
            moved.entry.thread_id = thread_id;
            if let Some(e) = self.entries.get_mut(&moved.entry.reply_id) {
                e.thread_id = thread_id;
            }
            thread.push(moved);
        }
        entry
    }

    /// Replies in the order they were added.
    pub fn replies_of(&self, thread_id: MessageId) -> &[ReplyEntry] {
        self.threads.get(&thread_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn reply_count(&self, thread_id: MessageId) -> usize {
        self.replies_of(thread_id).len()
    }

    /// The thread a reply belongs to; `None` for top-level messages.
    pub fn thread_of(&self, message_id: MessageId) -> Option<MessageId> {
        self.entries.get(&message_id).map(|e| e.thread_id)
    }

    pub fn is_reply(&self, message_id: MessageId) -> bool {
        self.entries.contains_key(&message_id)
    }

    pub fn has_thread(&self, message_id: MessageId) -> bool {
        self.threads.contains_key(&message_id)
    }

    /// Open a thread rooted at `message_id`. Replies cannot root a thread of
    /// their own, so this is a no-op returning `None` for them.
    pub fn start_thread(&mut self, message_id: MessageId) -> Option<MessageId> {
        if self.is_reply(message_id) {
            debug!("Ignoring thread start on reply {}", message_id);
            return None;
        }
        self.threads.entry(message_id).or_default();
        Some(message_id)
    }

    /// Apply a reply received from elsewhere. Returns whether it was new.
    pub fn apply(&mut self, event: &SocialEvent) -> bool {
        match event {
            SocialEvent::ThreadReply { parent_id, reply } => {
                if self.is_reply(reply.id) {
                    return false;
                }
                self.add_reply(*parent_id, reply.clone());
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    const P1: Uuid = Uuid::from_u128(1);

    fn reply(n: u128, text: &str) -> Reply {
        Reply {
            id: Uuid::from_u128(n),
            author_id: Uuid::from_u128(500),
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn replies_append_in_send_order() {
        let mut threads = ThreadStore::new();
        threads.add_reply(P1, reply(10, "first"));
        threads.add_reply(P1, reply(11, "second"));

        let texts: Vec<_> = threads.replies_of(P1).iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
        assert_eq!(threads.reply_count(P1), 2);
    }

    #[test]
    fn reply_to_reply_joins_root_thread() {
        let mut threads = ThreadStore::new();
        threads.add_reply(P1, reply(10, "r1"));
        let nested = threads.add_reply(Uuid::from_u128(10), reply(11, "r2"));

        assert_eq!(nested.parent_id, Uuid::from_u128(10));
        assert_eq!(nested.thread_id, P1);
        assert_eq!(threads.reply_count(P1), 2);
        assert!(threads.replies_of(Uuid::from_u128(10)).is_empty());
    }

    #[test]
    fn starting_thread_on_reply_is_noop() {
        let mut threads = ThreadStore::new();
        let r1 = threads.add_reply(P1, reply(10, "r1")).reply_id;

        assert_eq!(threads.start_thread(r1), None);
        assert!(!threads.has_thread(r1));
        assert!(threads.replies_of(r1).is_empty());

        assert_eq!(threads.start_thread(P1), Some(P1));
        assert_eq!(threads.start_thread(Uuid::from_u128(2)), Some(Uuid::from_u128(2)));
        assert!(threads.has_thread(Uuid::from_u128(2)));
    }

    #[test]
    fn out_of_order_replies_collapse_into_root_thread() {
        let r1 = Uuid::from_u128(10);
        let r2 = Uuid::from_u128(11);
        let mut threads = ThreadStore::new();

        threads.apply(&SocialEvent::ThreadReply {
            parent_id: r1,
            reply: reply(11, "r2"),
        });
        assert_eq!(threads.thread_of(r2), Some(r1));

        threads.apply(&SocialEvent::ThreadReply {
            parent_id: P1,
            reply: reply(10, "r1"),
        });

        let texts: Vec<_> = threads.replies_of(P1).iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["r1", "r2"]);
        assert!(threads.replies_of(P1).iter().all(|r| r.entry.thread_id == P1));
        assert_eq!(threads.replies_of(P1)[1].entry.parent_id, r1);
        assert_eq!(threads.thread_of(r2), Some(P1));
        assert!(!threads.has_thread(r1));
        assert!(threads.replies_of(r1).is_empty());
    }

    #[test]
    fn started_thread_folds_in_when_root_becomes_reply() {
        let x = Uuid::from_u128(20);
        let mut threads = ThreadStore::new();
        assert_eq!(threads.start_thread(x), Some(x));
        threads.add_reply(P1, reply(20, "x"));

        assert!(!threads.has_thread(x));
        assert_eq!(threads.thread_of(x), Some(P1));
        assert_eq!(threads.reply_count(P1), 1);
    }

    #[test]
    fn duplicate_reply_is_ignored() {
        let mut threads = ThreadStore::new();
        threads.add_reply(P1, reply(10, "once"));
        let again = threads.add_reply(Uuid::from_u128(2), reply(10, "twice"));

        assert_eq!(again.thread_id, P1);
        assert_eq!(threads.reply_count(P1), 1);
        assert_eq!(threads.reply_count(Uuid::from_u128(2)), 0);
    }

    #[test]
    fn applies_remote_replies() {
        let mut threads = ThreadStore::new();
        let event = SocialEvent::ThreadReply {
            parent_id: P1,
            reply: reply(10, "remote"),
        };
        assert!(threads.apply(&event));
        assert!(!threads.apply(&event));
        assert_eq!(threads.thread_of(Uuid::from_u128(10)), Some(P1));
        assert!(threads.is_reply(Uuid::from_u128(10)));
    }
}
