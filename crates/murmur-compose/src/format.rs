use murmur_types::config::ComposerConfig;
use murmur_types::models::{ListStyle, Selection, StyleTag};
use murmur_types::text;
use tracing::debug;

use crate::error::ComposeError;

/// Result of a formatting transform: the new buffer and selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatEdit {
    pub text: String,
    pub selection: Selection,
}

/// Toggles inline sigils around a selection.
///
/// Pure text-in, text-out: the caller owns the buffer and applies the
/// returned [`FormatEdit`]. An edit whose result would exceed `max_length`
/// is rejected with [`ComposeError::TooLong`].
#[derive(Debug, Clone)]
pub struct FormatToggler {
    max_length: usize,
    placeholder: String,
}

impl FormatToggler {
    pub fn new(max_length: usize, placeholder: impl Into<String>) -> Self {
        Self {
            max_length,
            placeholder: placeholder.into(),
        }
    }

    pub fn from_config(config: &ComposerConfig) -> Self {
        Self::new(config.max_length, config.placeholder.clone())
    }

    pub fn apply(&self, text: &str, selection: Selection, style: StyleTag) -> Result<FormatEdit, ComposeError> {
        let chars: Vec<char> = text.chars().collect();
        let Selection { start, end } = selection.clamped(chars.len());
        let wrapper = style.wrapper();
        let wl = wrapper.chars().count();

        if is_wrapped(&chars, start, end, style) {
            let mut out = String::with_capacity(text.len());
            out.extend(&chars[..start - wl]);
            out.extend(&chars[start..end]);
            out.extend(&chars[end + wl..]);
            return Ok(FormatEdit {
                text: out,
                selection: Selection::new(start - wl, end - wl),
            });
        }

        let selected: String = chars[start..end].iter().collect();
        let inner = if selected.is_empty() { self.placeholder.as_str() } else { selected.as_str() };
        let inserted = format!("{wrapper}{inner}{wrapper}");

        let new_len = chars.len() - (end - start) + text::char_len(&inserted);
        if new_len > self.max_length {
            debug!("Rejected {} toggle: {} > {} chars", style, new_len, self.max_length);
            return Err(ComposeError::TooLong {
                len: new_len,
                max: self.max_length,
            });
        }

        let selection = if selected.is_empty() {
            Selection::cursor(start + wl)
        } else {
            Selection::new(start + wl, end + wl)
        };

        Ok(FormatEdit {
            text: text::splice(text, start, end, &inserted),
            selection,
        })
    }

    /// Prefix every non-blank line of the selection with a bullet or a
    /// number. Numbering restarts at 1 for each transformed block.
    pub fn apply_list(&self, text: &str, selection: Selection, style: ListStyle) -> Result<FormatEdit, ComposeError> {
        let Selection { start, end } = selection.clamped(text::char_len(text));
        let block = text::char_slice(text, start, end);

        let mut n = 0;
        let replaced = block
            .split('\n')
            .map(|line| {
                if line.trim().is_empty() {
                    return line.to_string();
                }
                n += 1;
                match style {
                    ListStyle::Bullet => format!("• {line}"),
                    ListStyle::Numbered => format!("{n}. {line}"),
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        let replaced_len = text::char_len(&replaced);
        let new_len = text::char_len(text) - (end - start) + replaced_len;
        if new_len > self.max_length {
            debug!("Rejected list transform: {} > {} chars", new_len, self.max_length);
            return Err(ComposeError::TooLong {
                len: new_len,
                max: self.max_length,
            });
        }

        Ok(FormatEdit {
            text: text::splice(text, start, end, &replaced),
            selection: Selection::new(start, start + replaced_len),
        })
    }
}

fn is_wrapped(chars: &[char], start: usize, end: usize, style: StyleTag) -> bool {
    let wrapper: Vec<char> = style.wrapper().chars().collect();
    let wl = wrapper.len();

    if start < wl || end + wl > chars.len() {
        return false;
    }
    if chars[start - wl..start] != wrapper[..] || chars[end..end + wl] != wrapper[..] {
        return false;
    }

    // `**` right before the selection is a bold run, not an italic wrapper.
    if style == StyleTag::Italic && start >= 2 && chars[start - 2] == '*' && chars[start - 1] == '*' {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toggler() -> FormatToggler {
        FormatToggler::new(2000, "")
    }

    #[test]
    fn wraps_selection_and_keeps_it_selected() {
        let edit = toggler().apply("say hi", Selection::new(4, 6), StyleTag::Bold).unwrap();
        assert_eq!(edit.text, "say **hi**");
        assert_eq!(edit.selection, Selection::new(6, 8));
    }

    #[test]
    fn unwraps_already_wrapped_selection() {
        let edit = toggler().apply("say **hi**", Selection::new(6, 8), StyleTag::Bold).unwrap();
        assert_eq!(edit.text, "say hi");
        assert_eq!(edit.selection, Selection::new(4, 6));
    }

    #[test]
    fn toggle_twice_restores_original() {
        let cases = [
            ("hello world", Selection::new(0, 5)),
            ("hello world", Selection::new(6, 11)),
            ("hello world", Selection::cursor(5)),
            ("", Selection::cursor(0)),
            ("héllo 👍 wörld", Selection::new(6, 7)),
            ("**bold** word", Selection::new(9, 13)),
            ("x*", Selection::new(0, 1)),
        ];
        let t = toggler();
        for style in StyleTag::ALL {
            for (text, sel) in cases {
                let on = t.apply(text, sel, style).unwrap();
                let off = t.apply(&on.text, on.selection, style).unwrap();
                assert_eq!((off.text.as_str(), off.selection), (text, sel), "{style} on {text:?}");
            }
        }
    }

    #[test]
    fn italic_next_to_bold_keeps_bold() {
        let t = toggler();
        let edit = t.apply("**bold** word", Selection::new(9, 13), StyleTag::Italic).unwrap();
        assert_eq!(edit.text, "**bold** *word*");
        assert_eq!(edit.selection, Selection::new(10, 14));
    }

    #[test]
    fn italic_inside_bold_wraps_instead_of_stripping() {
        let edit = toggler().apply("**word**", Selection::new(2, 6), StyleTag::Italic).unwrap();
        assert_eq!(edit.text, "***word***");
        assert_eq!(edit.selection, Selection::new(3, 7));
    }

    #[test]
    fn italic_unwraps_before_trailing_star() {
        let t = toggler();
        let on = t.apply("x*", Selection::new(0, 1), StyleTag::Italic).unwrap();
        assert_eq!(on.text, "*x**");
        assert_eq!(on.selection, Selection::new(1, 2));

        let off = t.apply(&on.text, on.selection, StyleTag::Italic).unwrap();
        assert_eq!(off.text, "x*");
        assert_eq!(off.selection, Selection::new(0, 1));
    }

    #[test]
    fn bold_toggle_off_inside_bold() {
        let edit = toggler().apply("a **b** c", Selection::new(4, 5), StyleTag::Bold).unwrap();
        assert_eq!(edit.text, "a b c");
    }

    #[test]
    fn collapsed_cursor_lands_inside_wrappers() {
        let edit = toggler().apply("ab", Selection::cursor(1), StyleTag::Code).unwrap();
        assert_eq!(edit.text, "a``b");
        assert_eq!(edit.selection, Selection::cursor(2));

        let edit = FormatToggler::new(100, "text")
            .apply("", Selection::cursor(0), StyleTag::Strikethrough)
            .unwrap();
        assert_eq!(edit.text, "~~text~~");
        assert_eq!(edit.selection, Selection::cursor(2));
    }

    #[test]
    fn rejects_when_over_max_length() {
        let t = FormatToggler::new(8, "");
        assert_eq!(
            t.apply("hello", Selection::new(0, 5), StyleTag::Bold),
            Err(ComposeError::TooLong { len: 9, max: 8 })
        );
        assert!(t.apply("hello", Selection::new(0, 5), StyleTag::Italic).is_ok());
        // Unwrapping always shrinks.
        assert!(FormatToggler::new(9, "").apply("**hello**", Selection::new(2, 7), StyleTag::Bold).is_ok());
    }

    #[test]
    fn reversed_and_out_of_range_selection_is_normalized() {
        let edit = toggler().apply("hey", Selection { start: 99, end: 1 }, StyleTag::Underline).unwrap();
        assert_eq!(edit.text, "h__ey__");
        assert_eq!(edit.selection, Selection::new(3, 5));
    }

    #[test]
    fn numbered_list_counts_per_block_and_skips_blanks() {
        let text = "intro\na\n\nb\nc";
        let edit = toggler().apply_list(text, Selection::new(6, 12), ListStyle::Numbered).unwrap();
        assert_eq!(edit.text, "intro\n1. a\n\n2. b\n3. c");
        assert_eq!(edit.selection, Selection::new(6, 21));
    }

    #[test]
    fn bullet_list_prefixes_lines() {
        let edit = toggler().apply_list("x\n  \ny", Selection::new(0, 6), ListStyle::Bullet).unwrap();
        assert_eq!(edit.text, "• x\n  \n• y");
    }

    #[test]
    fn list_respects_max_length() {
        let t = FormatToggler::new(5, "");
        assert_eq!(
            t.apply_list("a\nb", Selection::new(0, 3), ListStyle::Bullet),
            Err(ComposeError::TooLong { len: 7, max: 5 })
        );
    }
}
