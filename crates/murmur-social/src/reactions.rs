use std::collections::HashMap;

use chrono::Utc;
use murmur_types::events::SocialEvent;
use murmur_types::models::{MessageId, ReactionEvent, ReactionGroup, UserId};
use tracing::debug;
use uuid::Uuid;

/// Reaction events per message, folded into per-emoji groups on read.
///
/// The event list is the only source of truth. At most one event exists per
/// (message, emoji, user) triple.
pub struct ReactionAggregator {
    current_user: UserId,
    events: HashMap<MessageId, Vec<ReactionEvent>>,
}

impl ReactionAggregator {
    pub fn new(current_user: UserId) -> Self {
        Self {
            current_user,
            events: HashMap::new(),
        }
    }

    pub fn current_user(&self) -> UserId {
        self.current_user
    }

    /// Record a reaction. Returns false if the same user already reacted to
    /// the message with this emoji.
    pub fn add(&mut self, message_id: MessageId, emoji: &str, user_id: UserId) -> bool {
        self.push(ReactionEvent {
            id: Uuid::new_v4(),
            message_id,
            emoji: emoji.to_string(),
            user_id,
            created_at: Utc::now(),
        })
    }

    /// Delete the user's reaction. Returns whether anything was removed.
    pub fn remove(&mut self, message_id: MessageId, emoji: &str, user_id: UserId) -> bool {
        let Some(events) = self.events.get_mut(&message_id) else {
            return false;
        };
        let before = events.len();
        events.retain(|e| !(e.emoji == emoji && e.user_id == user_id));
        let removed = events.len() != before;
        if events.is_empty() {
            self.events.remove(&message_id);
        }
        removed
    }

    /// Seed from history, e.g. reactions loaded alongside a page of messages.
    /// Returns how many events were new.
    pub fn ingest(&mut self, events: impl IntoIterator<Item = ReactionEvent>) -> usize {
        let mut added = 0;
        for event in events {
            if self.push(event) {
                added += 1;
            }
        }
        debug!("Ingested {} reaction events", added);
        added
    }

    pub fn has_reacted(&self, message_id: MessageId, emoji: &str, user_id: UserId) -> bool {
        self.events
            .get(&message_id)
            .is_some_and(|events| events.iter().any(|e| e.emoji == emoji && e.user_id == user_id))
    }

    /// Flip the current user's reaction and return the mutation to publish.
    pub fn toggle(&mut self, message_id: MessageId, emoji: &str) -> SocialEvent {
        let user_id = self.current_user;
        if self.has_reacted(message_id, emoji, user_id) {
            self.remove(message_id, emoji, user_id);
            SocialEvent::ReactionRemove {
                message_id,
                user_id,
                emoji: emoji.to_string(),
            }
        } else {
            self.add(message_id, emoji, user_id);
            SocialEvent::ReactionAdd {
                message_id,
                user_id,
                emoji: emoji.to_string(),
            }
        }
    }

    /// Apply a mutation received from elsewhere. Returns whether the view changed.
    pub fn apply(&mut self, event: &SocialEvent) -> bool {
        match event {
            SocialEvent::ReactionAdd {
                message_id,
                user_id,
                emoji,
            } => self.add(*message_id, emoji, *user_id),
            SocialEvent::ReactionRemove {
                message_id,
                user_id,
                emoji,
            } => self.remove(*message_id, emoji, *user_id),
            SocialEvent::ThreadReply { .. } => false,
        }
    }

    /// Group the message's reactions by emoji, in the order each emoji was
    /// first used.
    pub fn view(&self, message_id: MessageId) -> Vec<ReactionGroup> {
        let mut groups: Vec<ReactionGroup> = Vec::new();
        for event in self.events.get(&message_id).into_iter().flatten() {
            let idx = match groups.iter().position(|g| g.emoji == event.emoji) {
                Some(idx) => idx,
                None => {
                    groups.push(ReactionGroup {
                        emoji: event.emoji.clone(),
                        count: 0,
                        user_ids: Vec::new(),
                        current_user_reacted: false,
                    });
                    groups.len() - 1
                }
            };
            let group = &mut groups[idx];
            group.count += 1;
            group.user_ids.push(event.user_id);
            group.current_user_reacted |= event.user_id == self.current_user;
        }
        groups
    }

    /// Forget every reaction on a message, e.g. when it is deleted.
    pub fn clear_message(&mut self, message_id: MessageId) {
        self.events.remove(&message_id);
    }

    fn push(&mut self, event: ReactionEvent) -> bool {
        let events = self.events.entry(event.message_id).or_default();
        if events.iter().any(|e| e.emoji == event.emoji && e.user_id == event.user_id) {
            return false;
        }
        events.push(event);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ME: Uuid = Uuid::from_u128(1);
    const YOU: Uuid = Uuid::from_u128(2);
    const MSG: Uuid = Uuid::from_u128(100);

    #[test]
    fn duplicate_add_counts_once() {
        let mut reactions = ReactionAggregator::new(ME);
        assert!(reactions.add(MSG, "👍", ME));
        assert!(!reactions.add(MSG, "👍", ME));

        let view = reactions.view(MSG);
        assert_eq!(
            view,
            vec![ReactionGroup {
                emoji: "👍".into(),
                count: 1,
                user_ids: vec![ME],
                current_user_reacted: true,
            }]
        );

        assert!(reactions.remove(MSG, "👍", ME));
        assert!(reactions.view(MSG).is_empty());
        assert!(!reactions.remove(MSG, "👍", ME));
    }

    #[test]
    fn groups_in_first_seen_order() {
        let mut reactions = ReactionAggregator::new(ME);
        reactions.add(MSG, "🎉", YOU);
        reactions.add(MSG, "👍", ME);
        reactions.add(MSG, "🎉", ME);
        reactions.add(MSG, "❤️", YOU);

        let view = reactions.view(MSG);
        let order: Vec<_> = view.iter().map(|g| g.emoji.as_str()).collect();
        assert_eq!(order, ["🎉", "👍", "❤️"]);
        assert_eq!(view[0].count, 2);
        assert_eq!(view[0].user_ids, vec![YOU, ME]);
        assert!(view[0].current_user_reacted);
        assert!(!view[2].current_user_reacted);
    }

    #[test]
    fn removing_one_user_keeps_others() {
        let mut reactions = ReactionAggregator::new(ME);
        reactions.add(MSG, "👍", ME);
        reactions.add(MSG, "👍", YOU);
        reactions.remove(MSG, "👍", ME);

        let view = reactions.view(MSG);
        assert_eq!(view[0].count, 1);
        assert!(!view[0].current_user_reacted);
    }

    #[test]
    fn toggle_emits_add_then_remove() {
        let mut reactions = ReactionAggregator::new(ME);
        assert_eq!(
            reactions.toggle(MSG, "🔥"),
            SocialEvent::ReactionAdd {
                message_id: MSG,
                user_id: ME,
                emoji: "🔥".into(),
            }
        );
        assert!(reactions.has_reacted(MSG, "🔥", ME));
        assert!(matches!(reactions.toggle(MSG, "🔥"), SocialEvent::ReactionRemove { .. }));
        assert!(reactions.view(MSG).is_empty());
    }

    #[test]
    fn applies_remote_events() {
        let mut reactions = ReactionAggregator::new(ME);
        let add = SocialEvent::ReactionAdd {
            message_id: MSG,
            user_id: YOU,
            emoji: "👀".into(),
        };
        assert!(reactions.apply(&add));
        assert!(!reactions.apply(&add));
        assert_eq!(reactions.view(MSG)[0].user_ids, vec![YOU]);

        let remove = SocialEvent::ReactionRemove {
            message_id: MSG,
            user_id: YOU,
            emoji: "👀".into(),
        };
        assert!(reactions.apply(&remove));
        assert!(reactions.view(MSG).is_empty());
    }

    #[test]
    fn ingest_skips_duplicates() {
        let mut reactions = ReactionAggregator::new(ME);
        let event = ReactionEvent {
            id: Uuid::new_v4(),
            message_id: MSG,
            emoji: "👍".into(),
            user_id: YOU,
            created_at: Utc::now(),
        };
        let again = ReactionEvent {
            id: Uuid::new_v4(),
            ..event.clone()
        };
        assert_eq!(reactions.ingest([event, again]), 1);
        assert_eq!(reactions.view(MSG)[0].count, 1);

        reactions.clear_message(MSG);
        assert!(reactions.view(MSG).is_empty());
    }
}
