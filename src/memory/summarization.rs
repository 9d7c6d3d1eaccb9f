//! Compaction engine: folds older turns into a short narrative summary and a
//! list of discrete important points.
//!
//! Two prompts are used on purpose. The summary is narrative and lossy, the
//! points are atomic facts (promises, identity facts) that a narrative tends
//! to drop. Both operations degrade to a safe value instead of failing.

use regex::Regex;
use std::sync::{Arc, LazyLock};

use super::types::{CompactionResult, Turn};
use crate::error::{Error, Result};
use crate::llm::{CompletionRequest, CompletionService, Role};

/// Returned by [`CompactionEngine::summarize`] when the service fails
pub const SUMMARY_UNAVAILABLE: &str = "(summary unavailable)";

const COMPACTION_TEMPERATURE: f64 = 0.3;
const COMPACTION_MAX_TOKENS: u64 = 200;

/// Leading "[...]" annotation, e.g. the time prefix added to chat messages
static BRACKET_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[[^\]]*\]\s*").expect("valid regex"));

/// Remove a leading "[...]" annotation from message content
pub fn strip_annotation(content: &str) -> &str {
    match BRACKET_PREFIX.find(content) {
        Some(m) => &content[m.end()..],
        None => content,
    }
}

/// Parse a bulleted completion into trimmed, first-occurrence-deduplicated points
pub fn parse_points(text: &str) -> Vec<String> {
    let mut points: Vec<String> = Vec::new();

    for line in text.lines() {
        let point = line
            .trim()
            .trim_start_matches(['-', '*', '•'])
            .trim();

        if !point.is_empty() && !points.iter().any(|p| p == point) {
            points.push(point.to_string());
        }
    }

    points
}

/// Append `extra` to `base`, skipping points already present, then keep
/// only the newest `max_points`
pub fn merge_points(base: &[String], extra: Vec<String>, max_points: usize) -> Vec<String> {
    let mut merged = base.to_vec();
    for point in extra {
        if !merged.contains(&point) {
            merged.push(point);
        }
    }

    if merged.len() > max_points {
        let dropped = merged.len() - max_points;
        merged.drain(..dropped);
        tracing::debug!("Dropped {} oldest important points over the {} cap", dropped, max_points);
    }

    merged
}

/// Compaction engine bound to an injected completion client
pub struct CompactionEngine {
    client: Arc<dyn CompletionService>,
    model: String,
    summary_window: usize,
    points_window: usize,
}

impl CompactionEngine {
    /// `summary_window` / `points_window` bound how many trailing entries
    /// each prompt considers.
    pub fn new(
        client: Arc<dyn CompletionService>,
        model: impl Into<String>,
        summary_window: usize,
        points_window: usize,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            summary_window,
            points_window,
        }
    }

    /// Summary plus important points for `older`. Empty input compacts to nothing.
    pub async fn compact(&self, older: &[Turn]) -> CompactionResult {
        if older.is_empty() {
            return CompactionResult::default();
        }

        let (summary, important_points) = tokio::join!(
            self.summarize(older),
            self.extract_important_points(older)
        );

        tracing::info!(
            "Compacted {} turns into a {}-char summary and {} important points",
            older.len(),
            summary.chars().count(),
            important_points.len()
        );

        CompactionResult {
            summary,
            important_points,
        }
    }

    /// Narrative summary of `turns`; [`SUMMARY_UNAVAILABLE`] on failure.
    pub async fn summarize(&self, turns: &[Turn]) -> String {
        match self.try_summarize(turns).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!("Failed to generate summary: {}", e);
                SUMMARY_UNAVAILABLE.to_string()
            }
        }
    }

    /// Important facts stated by the user in `turns`; empty on failure.
    pub async fn extract_important_points(&self, turns: &[Turn]) -> Vec<String> {
        match self.try_extract_important_points(turns).await {
            Ok(points) => points,
            Err(e) => {
                tracing::warn!("Failed to extract important points: {}", e);
                Vec::new()
            }
        }
    }

    /// At most `summary_window` entries are serialized. System turns (an
    /// earlier summary, earlier points) take their slots first so
    /// re-compaction folds them in; the rest go to the newest dialogue.
    pub async fn try_summarize(&self, turns: &[Turn]) -> Result<String> {
        let (mut context, exchanges): (Vec<&Turn>, Vec<&Turn>) =
            turns.iter().partition(|t| t.role == Role::System);
        context.truncate(self.summary_window);
        let dialogue_slots = self.summary_window - context.len();
        let start = exchanges.len().saturating_sub(dialogue_slots);

        let dialogue = context
            .into_iter()
            .chain(exchanges[start..].iter().copied())
            .map(|t| format!("{}: {}", t.role, strip_annotation(&t.content)))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            r#"Compress the following conversation into a concise summary that keeps the key information (important matters, promises, preferences, tasks).

The summary should cover:
- topics discussed and their conclusions
- the user's important requests and preferences
- open tasks or promises
- anything else worth remembering long term

Conversation:
{dialogue}

Reply with the summary only (50-150 characters), no extra explanation:"#
        );

        let summary = self.complete(prompt).await?.trim().to_string();
        if summary.is_empty() {
            return Err(Error::MalformedCompletionOutput(
                "empty summary".to_string(),
            ));
        }

        Ok(summary)
    }

    pub async fn try_extract_important_points(&self, turns: &[Turn]) -> Result<Vec<String>> {
        let start = turns.len().saturating_sub(self.points_window);
        let statements: Vec<&str> = turns[start..]
            .iter()
            .filter(|t| t.role == Role::User)
            .map(|t| strip_annotation(&t.content))
            .collect();

        if statements.is_empty() {
            return Ok(Vec::new());
        }

        let numbered = statements
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            r#"From the user messages below, extract the things that must be remembered long term. Summarize each one in a single sentence.

Messages:
{numbered}

Format (one per line):
- important matter or promise

Only extract what truly matters; ordinary small talk does not need to be extracted:"#
        );

        Ok(parse_points(&self.complete(prompt).await?))
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let request = CompletionRequest::prompt(&self.model, prompt)
            .temperature(COMPACTION_TEMPERATURE)
            .max_tokens(COMPACTION_MAX_TOKENS);

        self.client.complete(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedCompletion;

    fn engine(client: Arc<ScriptedCompletion>) -> CompactionEngine {
        CompactionEngine::new(client, "test-model", 30, 20)
    }

    fn dialogue(pairs: usize) -> Vec<Turn> {
        (0..pairs)
            .flat_map(|i| {
                [
                    Turn::user(format!("[2024-01-01 10:00] question {}", i), i as f64),
                    Turn::assistant(format!("answer {}", i), i as f64),
                ]
            })
            .collect()
    }

    #[test]
    fn test_strip_annotation() {
        assert_eq!(strip_annotation("[yesterday 10:00] hello"), "hello");
        assert_eq!(strip_annotation("hello [not a prefix]"), "hello [not a prefix]");
        assert_eq!(strip_annotation("[a] [b] c"), "[b] c");
    }

    #[test]
    fn test_parse_points() {
        let text = "- Birthday is March 3\n\n* Promised to call mom\n  - Birthday is March 3  \n• Has a cat\n";
        assert_eq!(
            parse_points(text),
            vec!["Birthday is March 3", "Promised to call mom", "Has a cat"]
        );
        assert!(parse_points("  \n - \n").is_empty());
    }

    #[test]
    fn test_merge_points() {
        let merged = merge_points(
            &["a".to_string(), "b".to_string()],
            vec!["b".to_string(), "c".to_string()],
            10,
        );
        assert_eq!(merged, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_points_keeps_newest_within_cap() {
        let merged = merge_points(
            &["a".to_string(), "b".to_string(), "c".to_string()],
            vec!["d".to_string(), "e".to_string()],
            3,
        );
        assert_eq!(merged, vec!["c", "d", "e"]);

        let fresh = merge_points(&[], vec!["x".to_string(), "y".to_string()], 1);
        assert_eq!(fresh, vec!["y"]);
    }

    #[tokio::test]
    async fn test_summarize_uses_last_entries_without_annotations() {
        let client = Arc::new(ScriptedCompletion::new().reply("  Talked about questions.  "));
        let summary = engine(client.clone()).summarize(&dialogue(20)).await;

        assert_eq!(summary, "Talked about questions.");

        let requests = client.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.max_tokens, Some(200));

        let prompt = &request.messages[0].content;
        assert!(prompt.contains("user: question 19"));
        assert!(prompt.contains("assistant: answer 5"));
        // 40 entries, only the last 30 are serialized
        assert!(!prompt.contains("answer 4\n"));
        assert!(!prompt.contains("[2024-01-01"));
    }

    #[tokio::test]
    async fn test_summarize_system_turns_share_the_window() {
        let client = Arc::new(ScriptedCompletion::new().reply("Folded."));
        let mut turns = vec![
            Turn::system("[Summary of the earlier conversation] met in Oslo"),
            Turn::system("[Important things to remember]\n- Likes jazz"),
        ];
        turns.extend(dialogue(20));

        engine(client.clone()).summarize(&turns).await;

        let requests = client.requests.lock().unwrap();
        let prompt = &requests[0].messages[0].content;
        let lines = prompt
            .lines()
            .filter(|l| l.starts_with("user: ") || l.starts_with("assistant: ") || l.starts_with("system: "))
            .count();
        assert_eq!(lines, 30);
        assert!(prompt.contains("system: met in Oslo"));
        // 2 system slots leave 28 for the dialogue: questions 6..=19
        assert!(prompt.contains("user: question 6\n"));
        assert!(!prompt.contains("answer 5\n"));
    }

    #[tokio::test]
    async fn test_summarize_failure_returns_placeholder() {
        let client = Arc::new(ScriptedCompletion::new().fail("rate limited"));
        let summary = engine(client).summarize(&dialogue(3)).await;
        assert_eq!(summary, SUMMARY_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_summarize_empty_reply_returns_placeholder() {
        let client = Arc::new(ScriptedCompletion::new().reply("   "));
        let summary = engine(client).summarize(&dialogue(3)).await;
        assert_eq!(summary, SUMMARY_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_extract_points_only_from_user_turns() {
        let client = Arc::new(ScriptedCompletion::new().reply("- Likes tea\n- Likes tea\n- Lives in Hangzhou"));
        let points = engine(client.clone())
            .extract_important_points(&dialogue(15))
            .await;

        assert_eq!(points, vec!["Likes tea", "Lives in Hangzhou"]);

        let requests = client.requests.lock().unwrap();
        let prompt = &requests[0].messages[0].content;
        // Last 20 of 30 entries: questions 5..=14, numbered from 1
        assert!(prompt.contains("1. question 5"));
        assert!(prompt.contains("10. question 14"));
        assert!(!prompt.contains("answer"));
    }

    #[tokio::test]
    async fn test_extract_points_without_user_turns_skips_service() {
        let client = Arc::new(ScriptedCompletion::new());
        let points = engine(client.clone())
            .extract_important_points(&[Turn::assistant("hi", 1.0)])
            .await;

        assert!(points.is_empty());
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn test_extract_points_failure_is_empty() {
        let client = Arc::new(ScriptedCompletion::new().fail("timeout"));
        let points = engine(client).extract_important_points(&dialogue(2)).await;
        assert!(points.is_empty());
    }

    #[tokio::test]
    async fn test_compact_empty_input() {
        let client = Arc::new(ScriptedCompletion::new());
        let result = engine(client.clone()).compact(&[]).await;

        assert_eq!(result, CompactionResult::default());
        assert_eq!(client.request_count(), 0);
    }
}
