use std::sync::Arc;

use super::summarization::CompactionEngine;
use super::types::Turn;
use crate::llm::Role;

/// Turns split into the verbatim recent window and the compaction candidates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub recent: Vec<Turn>,
    pub older: Vec<Turn>,
}

/// Context handed to prompt assembly
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextWindow {
    pub recent: Vec<Turn>,
    pub summary: String,
    pub important_points: Vec<String>,
}

/// Split `turns` into the last `recent_turns` user/assistant exchanges and
/// everything else.
///
/// An exchange pairs the n-th user turn from the end with the n-th assistant
/// turn from the end. While there are at most `recent_turns` exchanges all
/// turns are recent. Otherwise `recent` is interleaved
/// `[user_-k, assistant_-k, ..., user_-1, assistant_-1]` and `older` holds
/// every other turn in original order, system turns included.
pub fn partition(turns: &[Turn], recent_turns: usize) -> Partition {
    let users: Vec<usize> = indices_with_role(turns, Role::User);
    let assistants: Vec<usize> = indices_with_role(turns, Role::Assistant);
    let total_turns = users.len().min(assistants.len());

    if total_turns <= recent_turns {
        return Partition {
            recent: turns.to_vec(),
            older: Vec::new(),
        };
    }

    let mut selected = Vec::with_capacity(recent_turns * 2);
    for back in (1..=recent_turns).rev() {
        selected.push(users[users.len() - back]);
        selected.push(assistants[assistants.len() - back]);
    }

    let recent = selected.iter().map(|&i| turns[i].clone()).collect();
    let older = turns
        .iter()
        .enumerate()
        .filter(|(i, _)| !selected.contains(i))
        .map(|(_, t)| t.clone())
        .collect();

    Partition { recent, older }
}

fn indices_with_role(turns: &[Turn], role: Role) -> Vec<usize> {
    turns
        .iter()
        .enumerate()
        .filter(|(_, t)| t.role == role)
        .map(|(i, _)| i)
        .collect()
}

/// Context builder: recent window verbatim, older turns compacted
pub struct ContextBuilder {
    engine: Arc<CompactionEngine>,
    recent_turns: usize,
}

impl ContextBuilder {
    pub fn new(engine: Arc<CompactionEngine>, recent_turns: usize) -> Self {
        Self {
            engine,
            recent_turns,
        }
    }

    /// Build the context for `turns`. Re-derived on every call; the recent
    /// partition is deterministic, summary and points may vary between calls.
    pub async fn build(&self, turns: &[Turn]) -> ContextWindow {
        let Partition { recent, older } = partition(turns, self.recent_turns);

        if older.is_empty() {
            return ContextWindow {
                recent,
                ..ContextWindow::default()
            };
        }

        tracing::debug!(
            "Context: {} recent turns, compacting {} older turns",
            recent.len(),
            older.len()
        );

        let compaction = self.engine.compact(&older).await;

        ContextWindow {
            recent,
            summary: compaction.summary,
            important_points: compaction.important_points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedCompletion;

    fn dialogue(pairs: usize) -> Vec<Turn> {
        (0..pairs)
            .flat_map(|i| {
                [
                    Turn::user(format!("u{}", i), i as f64),
                    Turn::assistant(format!("a{}", i), i as f64),
                ]
            })
            .collect()
    }

    fn contents(turns: &[Turn]) -> Vec<&str> {
        turns.iter().map(|t| t.content.as_str()).collect()
    }

    #[test]
    fn test_partition_short_history_is_all_recent() {
        let mut turns = vec![Turn::system("summary")];
        turns.extend(dialogue(4));

        let p = partition(&turns, 4);
        assert_eq!(p.recent, turns);
        assert!(p.older.is_empty());
    }

    #[test]
    fn test_partition_keeps_last_pairs() {
        let p = partition(&dialogue(6), 4);

        assert_eq!(
            contents(&p.recent),
            vec!["u2", "a2", "u3", "a3", "u4", "a4", "u5", "a5"]
        );
        assert_eq!(contents(&p.older), vec!["u0", "a0", "u1", "a1"]);
    }

    #[test]
    fn test_partition_older_includes_system_turns() {
        let mut turns = vec![Turn::system("summary"), Turn::system("points")];
        turns.extend(dialogue(5));

        let p = partition(&turns, 4);
        assert_eq!(p.recent.len(), 8);
        assert_eq!(contents(&p.older), vec!["summary", "points", "u0", "a0"]);
    }

    #[test]
    fn test_partition_is_idempotent() {
        let turns = dialogue(9);
        assert_eq!(partition(&turns, 4), partition(&turns, 4));
    }

    #[tokio::test]
    async fn test_build_without_older_skips_compaction() {
        let client = Arc::new(ScriptedCompletion::new());
        let engine = Arc::new(CompactionEngine::new(client.clone(), "m", 30, 20));
        let builder = ContextBuilder::new(engine, 4);

        let window = builder.build(&dialogue(3)).await;

        assert_eq!(window.recent.len(), 6);
        assert!(window.summary.is_empty());
        assert!(window.important_points.is_empty());
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn test_build_compacts_older() {
        let client = Arc::new(
            ScriptedCompletion::new()
                .reply("Early small talk.")
                .reply("- Name is Ada"),
        );
        let engine = Arc::new(CompactionEngine::new(client.clone(), "m", 30, 20));
        let builder = ContextBuilder::new(engine, 4);

        let window = builder.build(&dialogue(7)).await;

        assert_eq!(window.recent.len(), 8);
        assert_eq!(window.summary, "Early small talk.");
        assert_eq!(window.important_points, vec!["Name is Ada"]);
        assert_eq!(client.request_count(), 2);
    }
}
