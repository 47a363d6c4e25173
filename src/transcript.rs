//! Chat transcript model
//!
//! An ordered sequence of user/assistant entries bound to one session.
//! Insertion order is the only order; entries are immutable once appended.
//! The transcript is cleared in full whenever its session stops.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notice appended in place of a reply when a send fails in transit
///
/// The user must always see a terminal state for a sent message.
pub const SEND_FAILURE_NOTICE: &str =
    "Sorry, there was an error processing your message. Please try again.";

/// Who authored a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

impl Role {
    /// Parses a backend role string; unknown roles map to assistant
    ///
    /// History entries arrive with free-form role strings, and anything the
    /// engine emits that is not the human is rendered on the agent side.
    pub fn parse_lossy(s: &str) -> Self {
        match s {
            "user" => Self::User,
            _ => Self::Assistant,
        }
    }
}

/// One immutable transcript entry
///
/// Backend history entries carry no id of their own, so every entry is
/// tagged with a locally-generated unique id on append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    /// Locally-generated unique id
    pub id: String,
    /// Who authored the entry
    pub role: Role,
    /// Entry text
    pub content: String,
    /// Local append time, for display only
    pub created_at: DateTime<Utc>,
}

impl ChatEntry {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Creates a user entry
    ///
    /// # Examples
    ///
    /// ```
    /// use playpen::transcript::{ChatEntry, Role};
    ///
    /// let entry = ChatEntry::user("Hello!");
    /// assert_eq!(entry.role, Role::User);
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant entry
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// The ordered transcript for one session
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<ChatEntry>,
}

impl Transcript {
    /// Creates an empty transcript
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry at the end
    pub fn push(&mut self, entry: ChatEntry) {
        self.entries.push(entry);
    }

    /// All entries, in insertion order
    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the transcript holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
