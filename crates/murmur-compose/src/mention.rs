use std::sync::LazyLock;

use murmur_types::models::{DirectoryUser, Mention, Selection};
use murmur_types::text;
use regex::Regex;

use crate::format::FormatEdit;

/// An in-progress `@token` ending at the cursor.
static OPEN_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@(\w*)$").expect("valid regex"));

/// A finished `@token` anywhere in the text.
static MENTION_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@(\w+)").expect("valid regex"));

/// Read access to the preloaded user directory.
pub trait UserDirectory: Send + Sync {
    fn list_users(&self) -> &[DirectoryUser];
}

impl UserDirectory for Vec<DirectoryUser> {
    fn list_users(&self) -> &[DirectoryUser] {
        self
    }
}

/// The live `@query` the user is typing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionQuery {
    pub query: String,
    /// Character offset of the `@`.
    pub anchor: usize,
}

/// Find the `@token` run that ends exactly at `cursor`, if any.
pub fn detect(text: &str, cursor: usize) -> Option<MentionQuery> {
    let prefix = &text[..text::byte_offset(text, cursor)];
    let caps = OPEN_MENTION.captures(prefix)?;
    let whole = caps.get(0)?;
    Some(MentionQuery {
        query: caps[1].to_string(),
        anchor: text::char_offset(prefix, whole.start()),
    })
}

/// Users whose name or handle contains `query`, case-insensitively, in
/// directory order.
pub fn filter<'a>(query: &str, directory: &'a [DirectoryUser]) -> Vec<&'a DirectoryUser> {
    let needle = query.to_lowercase();
    directory
        .iter()
        .filter(|u| u.name.to_lowercase().contains(&needle) || u.handle.to_lowercase().contains(&needle))
        .collect()
}

/// Replace the `@query` span ending at `cursor` with `@handle `.
pub fn insert(text: &str, query: &MentionQuery, cursor: usize, handle: &str) -> FormatEdit {
    let inserted = format!("@{handle} ");
    let end = cursor.max(query.anchor);
    FormatEdit {
        text: text::splice(text, query.anchor, end, &inserted),
        selection: Selection::cursor(query.anchor + text::char_len(&inserted)),
    }
}

/// Resolve every `@token` in the final text against the directory.
///
/// Handles are tried first, then display names with whitespace removed, both
/// case-insensitively. Tokens that match nobody stay plain text.
pub fn resolve(text: &str, directory: &[DirectoryUser]) -> Vec<Mention> {
    MENTION_TOKEN
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let token = &caps[1];
            let user = lookup(token, directory)?;
            Some(Mention {
                user_id: user.id,
                display_token: token.to_string(),
                position: text::char_offset(text, whole.start()),
                length: text::char_len(whole.as_str()),
            })
        })
        .collect()
}

fn lookup<'a>(token: &str, directory: &'a [DirectoryUser]) -> Option<&'a DirectoryUser> {
    let token = token.to_lowercase();
    directory
        .iter()
        .find(|u| u.handle.to_lowercase() == token)
        .or_else(|| {
            directory.iter().find(|u| {
                let squashed: String = u.name.chars().filter(|c| !c.is_whitespace()).collect();
                squashed.to_lowercase() == token
            })
        })
}

/// Dropdown state for an open mention: the filtered candidates and the
/// highlighted row, which wraps around at both ends.
#[derive(Debug, Clone, Default)]
pub struct MentionPicker {
    candidates: Vec<DirectoryUser>,
    selected: usize,
}

impl MentionPicker {
    pub fn new(candidates: Vec<DirectoryUser>) -> Self {
        Self {
            candidates,
            selected: 0,
        }
    }

    pub fn candidates(&self) -> &[DirectoryUser] {
        &self.candidates
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> Option<&DirectoryUser> {
        self.candidates.get(self.selected)
    }

    pub fn next(&mut self) {
        if !self.candidates.is_empty() {
            self.selected = (self.selected + 1) % self.candidates.len();
        }
    }

    pub fn prev(&mut self) {
        if !self.candidates.is_empty() {
            self.selected = (self.selected + self.candidates.len() - 1) % self.candidates.len();
        }
    }
}
