use murmur_types::models::StyleTag;

/// Keyboard input as the composer sees it. The physical key bindings belong
/// to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerKey {
    Up,
    Down,
    /// Confirm the highlighted mention candidate.
    Accept,
    /// Close the mention dropdown.
    Dismiss,
    /// The dedicated send combination.
    Send,
    /// A formatting shortcut.
    Format(StyleTag),
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    MentionNavigated,
    MentionAccepted,
    MentionDismissed,
    Sent,
    Formatted,
    Ignored,
}
