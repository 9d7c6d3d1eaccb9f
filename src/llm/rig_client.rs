use anyhow::Result;
use async_trait::async_trait;
use rig::client::{CompletionClient, Nothing};
use rig::completion::Prompt;
use rig::message::Message as RigMessage;
use rig::providers::{anthropic, ollama, openai};

use super::{CompletionRequest, CompletionService, LLMProvider, Role};
use crate::error::Error;

/// Anthropic rejects requests without an explicit output budget
const ANTHROPIC_DEFAULT_MAX_TOKENS: u64 = 1024;

/// Build a one-shot agent for `$request` on `$client` and prompt it.
macro_rules! run_prompt {
    ($client:expr, $request:expr, $preamble:expr, $prompt:expr, $history:expr) => {{
        let mut builder = $client.agent(&$request.model);
        if !$preamble.is_empty() {
            builder = builder.preamble(&$preamble);
        }
        if let Some(temperature) = $request.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(max_tokens) = $request.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        let agent = builder.build();
        agent.prompt($prompt.as_str()).with_history(&mut $history).await
    }};
}

/// Provider-specific client wrapper.
enum ProviderClient {
    Anthropic(anthropic::Client),
    OpenAI(openai::Client),
    Ollama(ollama::Client),
}

/// [`CompletionService`] backed by rig-core provider clients.
///
/// System messages become the agent preamble, user/assistant messages
/// become chat history, and the final message is the prompt.
pub struct RigCompletionService {
    client: ProviderClient,
}

impl RigCompletionService {
    /// Create a client for `provider`. `api_base_url` points OpenAI at a
    /// compatible endpoint or Ollama at a non-default host.
    pub fn new(provider: LLMProvider, api_key: &str, api_base_url: Option<&str>) -> Result<Self> {
        let client = match provider {
            LLMProvider::Anthropic => {
                let client = match api_base_url {
                    Some(url) => anthropic::Client::builder()
                        .api_key(api_key)
                        .base_url(url)
                        .build()?,
                    None => anthropic::Client::builder().api_key(api_key).build()?,
                };
                ProviderClient::Anthropic(client)
            }

            LLMProvider::OpenAI => {
                let client = match api_base_url {
                    Some(url) => openai::Client::builder()
                        .api_key(api_key)
                        .base_url(url)
                        .build()?,
                    None => openai::Client::builder().api_key(api_key).build()?,
                };
                ProviderClient::OpenAI(client)
            }

            LLMProvider::Ollama => {
                let client = match api_base_url {
                    Some(url) => ollama::Client::builder()
                        .api_key(Nothing)
                        .base_url(url)
                        .build()?,
                    None => ollama::Client::new(Nothing)?,
                };
                ProviderClient::Ollama(client)
            }
        };

        tracing::info!("Initialized {} completion client", provider);

        Ok(Self { client })
    }
}

/// Split a request into (preamble, history, prompt).
fn split_request(
    request: &CompletionRequest,
) -> std::result::Result<(String, Vec<RigMessage>, String), Error> {
    let preamble = request
        .messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut dialogue: Vec<_> = request
        .messages
        .iter()
        .filter(|m| m.role != Role::System)
        .collect();

    let prompt = dialogue
        .pop()
        .ok_or_else(|| Error::CompletionService("request has no prompt message".to_string()))?
        .content
        .clone();

    let history = dialogue
        .into_iter()
        .map(|m| {
            if m.role == Role::User {
                RigMessage::user(&m.content)
            } else {
                RigMessage::assistant(&m.content)
            }
        })
        .collect();

    Ok((preamble, history, prompt))
}

#[async_trait]
impl CompletionService for RigCompletionService {
    async fn complete(&self, request: CompletionRequest) -> crate::error::Result<String> {
        let (preamble, mut history, prompt) = split_request(&request)?;

        tracing::debug!(
            "Completion request: model={}, history={}, preamble_chars={}",
            request.model,
            history.len(),
            preamble.chars().count()
        );

        let response = match &self.client {
            ProviderClient::Anthropic(client) => {
                let request = CompletionRequest {
                    max_tokens: request.max_tokens.or(Some(ANTHROPIC_DEFAULT_MAX_TOKENS)),
                    ..request
                };
                run_prompt!(client, request, preamble, prompt, history)
            }
            ProviderClient::OpenAI(client) => {
                run_prompt!(
                    client.clone().completions_api(),
                    request,
                    preamble,
                    prompt,
                    history
                )
            }
            ProviderClient::Ollama(client) => {
                run_prompt!(client, request, preamble, prompt, history)
            }
        };

        response.map_err(|e| Error::CompletionService(e.to_string()))
    }
}
