use serde::{Deserialize, Serialize};

use crate::llm::{ChatMessage, Role};

/// Prefix of the synthesized system turn carrying the rolling summary
pub const SUMMARY_LABEL: &str = "[Summary of the earlier conversation]";
/// Prefix of the synthesized system turn carrying the important points
pub const POINTS_LABEL: &str = "[Important things to remember]";

/// Whether a memory stream belongs to one person or to a group chat
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Individual,
    Group,
}

/// Identifies one memory stream; also the storage key
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ConversationId {
    pub subject: i64,
    pub kind: ConversationKind,
}

impl ConversationId {
    pub fn individual(subject: i64) -> Self {
        Self {
            subject,
            kind: ConversationKind::Individual,
        }
    }

    pub fn group(subject: i64) -> Self {
        Self {
            subject,
            kind: ConversationKind::Group,
        }
    }

    /// Stable key used for file names and database rows (`user_42`, `group_7`)
    pub fn storage_key(&self) -> String {
        match self.kind {
            ConversationKind::Individual => format!("user_{}", self.subject),
            ConversationKind::Group => format!("group_{}", self.subject),
        }
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// One role-tagged message. `timestamp` is seconds since the epoch, 0 for
/// synthesized entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub timestamp: f64,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>, timestamp: f64) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }

    pub fn user(content: impl Into<String>, timestamp: f64) -> Self {
        Self::new(Role::User, content, timestamp)
    }

    pub fn assistant(content: impl Into<String>, timestamp: f64) -> Self {
        Self::new(Role::Assistant, content, timestamp)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content, 0.0)
    }

    pub fn to_message(&self) -> ChatMessage {
        ChatMessage::new(self.role, self.content.clone())
    }
}

/// Output of the compaction engine; always folded into a [`StructuredMemory`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompactionResult {
    pub summary: String,
    pub important_points: Vec<String>,
}

/// Compacted on-disk form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredMemory {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub important_points: Vec<String>,
    pub recent_messages: Vec<Turn>,
    #[serde(default)]
    pub last_summary_turn: usize,
}

impl StructuredMemory {
    /// The system turns that stand in for `summary` and `important_points`
    /// when the record is read back as a flat sequence.
    pub fn synthesized_turns(&self) -> Vec<Turn> {
        let mut turns = Vec::with_capacity(2);

        if !self.summary.is_empty() {
            turns.push(Turn::system(format!("{} {}", SUMMARY_LABEL, self.summary)));
        }

        if !self.important_points.is_empty() {
            turns.push(Turn::system(format!(
                "{}\n{}",
                POINTS_LABEL,
                render_points(&self.important_points)
            )));
        }

        turns
    }
}

/// Bullet list, one point per line
pub fn render_points(points: &[String]) -> String {
    points
        .iter()
        .map(|p| format!("- {}", p))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The two shapes a stored record may take.
///
/// Legacy records are a bare list of turns; compacted ones are a mapping
/// that always carries `recent_messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredMemory {
    Flat(Vec<Turn>),
    Structured(StructuredMemory),
}

impl StoredMemory {
    pub fn format_name(&self) -> &'static str {
        match self {
            StoredMemory::Flat(_) => "flat",
            StoredMemory::Structured(_) => "structured",
        }
    }
}

/// A stored record normalized to one ordered sequence of turns.
///
/// Structured records keep their summary fields so a later save can stay in
/// structured form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryRecord {
    turns: Vec<Turn>,
    structured: Option<StructuredMemory>,
}

impl MemoryRecord {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The structured fields this record was loaded from, if any
    pub fn structured(&self) -> Option<&StructuredMemory> {
        self.structured.as_ref()
    }

    /// Number of leading synthesized system turns
    pub fn synthesized_len(&self) -> usize {
        self.structured
            .as_ref()
            .map(|s| s.synthesized_turns().len())
            .unwrap_or(0)
    }
}

impl From<StoredMemory> for MemoryRecord {
    fn from(stored: StoredMemory) -> Self {
        match stored {
            StoredMemory::Flat(turns) => Self {
                turns,
                structured: None,
            },
            StoredMemory::Structured(structured) => {
                let mut turns = structured.synthesized_turns();
                turns.extend(structured.recent_messages.iter().cloned());
                Self {
                    turns,
                    structured: Some(structured),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key() {
        assert_eq!(ConversationId::individual(42).storage_key(), "user_42");
        assert_eq!(ConversationId::group(7).storage_key(), "group_7");
    }

    #[test]
    fn test_parse_flat_record() {
        let json = r#"[
            {"role": "user", "content": "hi", "timestamp": 1700000000.5},
            {"role": "assistant", "content": "hello"}
        ]"#;
        let stored: StoredMemory = serde_json::from_str(json).unwrap();

        let StoredMemory::Flat(turns) = stored else {
            panic!("expected flat record");
        };
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].timestamp, 1700000000.5);
        assert_eq!(turns[1].timestamp, 0.0);
    }

    #[test]
    fn test_parse_structured_record() {
        let json = r#"{
            "summary": "talked about cats",
            "important_points": ["has a cat named Pixel"],
            "recent_messages": [{"role": "user", "content": "hi", "timestamp": 5}],
            "last_summary_turn": 21
        }"#;
        let stored: StoredMemory = serde_json::from_str(json).unwrap();

        assert_eq!(stored.format_name(), "structured");
        let record = MemoryRecord::from(stored);
        let turns = record.turns();

        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, Role::System);
        assert_eq!(turns[0].timestamp, 0.0);
        assert!(turns[0].content.contains("talked about cats"));
        assert!(turns[1].content.ends_with("- has a cat named Pixel"));
        assert_eq!(turns[2], Turn::user("hi", 5.0));
        assert_eq!(record.synthesized_len(), 2);
    }

    #[test]
    fn test_structured_without_summary_synthesizes_nothing() {
        let stored = StoredMemory::Structured(StructuredMemory {
            summary: String::new(),
            important_points: Vec::new(),
            recent_messages: vec![Turn::user("a", 1.0)],
            last_summary_turn: 21,
        });

        let record = MemoryRecord::from(stored);
        assert_eq!(record.turns(), &[Turn::user("a", 1.0)]);
        assert_eq!(record.synthesized_len(), 0);
        assert!(record.structured().is_some());
    }

    #[test]
    fn test_mapping_without_recent_messages_is_rejected() {
        let result = serde_json::from_str::<StoredMemory>(r#"{"summary": "x"}"#);
        assert!(result.is_err());
    }
}
