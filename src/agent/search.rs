//! Search-intent analysis and web search for a chat turn.
//!
//! The LLM decides whether a message needs fresh information; its JSON
//! answer is parsed defensively and any failure means "no search".

use async_trait::async_trait;
use chrono::FixedOffset;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::llm::{CompletionRequest, CompletionService};
use crate::memory::Turn;
use crate::utils::json::parse_embedded_json;
use crate::utils::time::{current_time_str, relative_time};

const DUCKDUCKGO_API: &str = "https://api.duckduckgo.com/";

/// Decision returned by the search-intent prompt
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchIntent {
    #[serde(default)]
    pub need_search: bool,
    #[serde(default)]
    pub search_query: String,
    #[serde(default)]
    pub reason: String,
}

impl SearchIntent {
    fn no_search(reason: &str) -> Self {
        Self {
            need_search: false,
            search_query: String::new(),
            reason: reason.to_string(),
        }
    }
}

/// Ask the completion service whether `user_message` needs a web search.
/// Failures and unparseable answers resolve to no search.
pub async fn analyze_search_intent(
    client: &dyn CompletionService,
    model: &str,
    user_message: &str,
    memory: &[Turn],
    offset: FixedOffset,
) -> SearchIntent {
    match try_analyze_search_intent(client, model, user_message, memory, offset).await {
        Ok(intent) => intent,
        Err(e) => {
            tracing::warn!("Failed to analyze search intent: {}", e);
            SearchIntent::no_search("analysis failed, not searching")
        }
    }
}

async fn try_analyze_search_intent(
    client: &dyn CompletionService,
    model: &str,
    user_message: &str,
    memory: &[Turn],
    offset: FixedOffset,
) -> Result<SearchIntent> {
    let mut context = format!("Current time: {}\n", current_time_str(offset));
    if !memory.is_empty() {
        context.push_str(&format!("Conversation history: {} exchanges\n", memory.len() / 2));
        let start = memory.len().saturating_sub(8);
        for turn in memory[start..].iter().filter(|t| t.timestamp != 0.0) {
            let preview: String = turn.content.chars().take(50).collect();
            context.push_str(&format!(
                "[{}] {}: {}...\n",
                relative_time(turn.timestamp, offset),
                turn.role,
                preview
            ));
        }
    }

    let prompt = format!(
        r#"{context}
Latest user message: {user_message}

Decide whether this message needs a web search.

Guidelines:
- search: weather, news, stock prices, trending events, precise figures, locations, encyclopedic facts about people, recent events, prices
- no search: small talk, emotional support, reminiscing, opinions, creative writing, general knowledge

Reply with JSON only, nothing else:
{{
    "need_search": true or false,
    "search_query": "concise search keywords if a search is needed",
    "reason": "short reason"
}}

Output:"#
    );

    let request = CompletionRequest::prompt(model, prompt)
        .temperature(0.3)
        .max_tokens(200);
    let reply = client.complete(request).await?;

    let mut intent: SearchIntent = parse_embedded_json(&reply)?;
    if intent.need_search && intent.search_query.trim().is_empty() {
        intent.search_query = user_message.to_string();
    }

    tracing::debug!(
        "Search intent: need_search={}, query={:?}, reason={}",
        intent.need_search,
        intent.search_query,
        intent.reason
    );

    Ok(intent)
}

/// Web search backend
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Formatted, numbered results for `query`
    async fn search(&self, query: &str) -> Result<String>;
}

/// DuckDuckGo Instant Answer API
pub struct DuckDuckGoSearch {
    http: reqwest::Client,
    max_results: usize,
}

impl DuckDuckGoSearch {
    pub fn new(max_results: usize) -> Self {
        Self {
            http: reqwest::Client::new(),
            max_results,
        }
    }
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::new(5)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InstantAnswer {
    #[serde(rename = "Heading")]
    heading: String,
    #[serde(rename = "AbstractText")]
    abstract_text: String,
    #[serde(rename = "AbstractURL")]
    abstract_url: String,
    #[serde(rename = "RelatedTopics")]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RelatedTopic {
    #[serde(rename = "Text")]
    text: String,
    #[serde(rename = "FirstURL")]
    first_url: String,
    /// Present on category groups instead of text
    #[serde(rename = "Topics")]
    topics: Vec<RelatedTopic>,
}

struct SearchHit<'a> {
    title: &'a str,
    body: &'a str,
    url: &'a str,
}

fn collect_hits<'a>(topics: &'a [RelatedTopic], hits: &mut Vec<SearchHit<'a>>) {
    for topic in topics {
        if !topic.text.is_empty() {
            let title = topic.text.split(" - ").next().unwrap_or(&topic.text);
            hits.push(SearchHit {
                title,
                body: &topic.text,
                url: &topic.first_url,
            });
        }
        collect_hits(&topic.topics, hits);
    }
}

fn format_results(answer: &InstantAnswer, max_results: usize) -> Option<String> {
    let mut hits = Vec::new();
    if !answer.abstract_text.is_empty() {
        hits.push(SearchHit {
            title: &answer.heading,
            body: &answer.abstract_text,
            url: &answer.abstract_url,
        });
    }
    collect_hits(&answer.related_topics, &mut hits);

    if hits.is_empty() {
        return None;
    }

    let formatted = hits
        .iter()
        .take(max_results)
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "{}. {}\n   {}\n   Source: {}",
                i + 1,
                hit.title,
                hit.body,
                hit.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    Some(formatted)
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<String> {
        let url = reqwest::Url::parse_with_params(
            DUCKDUCKGO_API,
            &[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ],
        )
        .map_err(|e| Error::Search(e.to_string()))?;

        let answer: InstantAnswer = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Search(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        let results = format_results(&answer, self.max_results)
            .unwrap_or_else(|| "No relevant search results were found.".to_string());

        tracing::info!("Web search for {:?} returned {} chars", query, results.len());

        Ok(results)
    }
}
