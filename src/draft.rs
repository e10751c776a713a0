//! Client-local draft of one outgoing message.
//!
//! A draft is an ordered list of committed fragments. `append` commits one
//! fragment (truncated to the per-call limit), `undo` removes only the most
//! recent fragment, and `take` empties the draft returning its concatenated
//! text. Lengths are counted in characters, not bytes.

use serde::{Deserialize, Serialize};

/// Result of committing a fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AppendStatus {
    /// The whole text was stored.
    Full,
    /// Only the first `max_fragment_length` characters were stored.
    Truncated {
        /// Trailing content of the draft, ending at the truncation point.
        preview: String,
        /// Characters dropped from this call's text.
        dropped: usize,
    },
}

/// Result of an undo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UndoStatus {
    /// The last fragment was removed; `preview` shows the remaining tail.
    Removed { preview: String },
    /// The draft was already empty.
    NothingToUndo,
}

/// Ordered fragments of a not-yet-sent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    fragments: Vec<String>,
    max_fragment_length: usize,
    preview_length: usize,
}

impl Draft {
    pub fn new(max_fragment_length: usize, preview_length: usize) -> Self {
        Self {
            fragments: Vec::new(),
            max_fragment_length: max_fragment_length.max(1),
            preview_length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn max_fragment_length(&self) -> usize {
        self.max_fragment_length
    }

    /// The full draft text, fragments joined in commit order.
    pub fn text(&self) -> String {
        self.fragments.concat()
    }

    /// The last `preview_length` characters of the draft.
    pub fn preview(&self) -> String {
        let text = self.text();
        let count = text.chars().count();
        text.chars()
            .skip(count.saturating_sub(self.preview_length))
            .collect()
    }

    /// Commit `text` as a new fragment, keeping at most
    /// `max_fragment_length` characters of it.
    pub fn append(&mut self, text: &str) -> AppendStatus {
        match text.char_indices().nth(self.max_fragment_length) {
            None => {
                self.fragments.push(text.to_string());
                AppendStatus::Full
            }
            Some((cut, _)) => {
                let dropped = text[cut..].chars().count();
                self.fragments.push(text[..cut].to_string());
                AppendStatus::Truncated {
                    preview: self.preview(),
                    dropped,
                }
            }
        }
    }

    /// Remove the single most recent fragment.
    pub fn undo(&mut self) -> UndoStatus {
        match self.fragments.pop() {
            Some(_) => UndoStatus::Removed {
                preview: self.preview(),
            },
            None => UndoStatus::NothingToUndo,
        }
    }

    /// Empty the draft, returning the concatenated text if it had any
    /// fragments.
    pub fn take(&mut self) -> Option<String> {
        if self.fragments.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.fragments).concat())
    }

    pub fn clear(&mut self) {
        self.fragments.clear();
    }
}
