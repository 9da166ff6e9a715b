// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::usage::CompletionUsage;
use crate::config::LlmSettings;
use crate::errors::{CorpusError, Result};

/// A completed chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Answer text, already combined with any reasoning
    pub text: String,
    pub usage: Option<CompletionUsage>,
}

/// A chat-completion endpoint.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, system: &str, user: &str) -> Result<Completion>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatTemplateKwargs {
    enable_thinking: bool,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chat_template_kwargs: Option<ChatTemplateKwargs>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatResponseMessage {
    content: Option<String>,
    reasoning_content: Option<String>,
}

/// OpenAI-style chat completions over HTTP.
#[derive(Debug, Clone)]
pub struct HttpLlmClient {
    http: Client,
    settings: LlmSettings,
    api_key: String,
}

impl HttpLlmClient {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| CorpusError::Network(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_key: settings.resolved_api_key(),
            settings: settings.clone(),
        })
    }

    fn request<'a>(&'a self, system: &'a str, user: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.settings.model_name,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.settings.temperature,
            top_p: self.settings.top_p,
            top_k: self.settings.top_k,
            chat_template_kwargs: self
                .settings
                .enable_thinking
                .map(|enable_thinking| ChatTemplateKwargs { enable_thinking }),
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    fn model(&self) -> &str {
        &self.settings.model_name
    }

    async fn complete(&self, system: &str, user: &str) -> Result<Completion> {
        let response = self
            .http
            .post(&self.settings.base_url)
            .bearer_auth(&self.api_key)
            .json(&self.request(system, user))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CorpusError::Network(format!(
                "{} returned {}: {}",
                self.settings.base_url, status, body
            )));
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                transport_error(e)
            } else {
                CorpusError::Data(format!("malformed completion response: {}", e))
            }
        })?;
        let message = body.choices.into_iter().next().map(|c| c.message).unwrap_or_default();
        Ok(Completion {
            text: format_response(
                message.content.as_deref().unwrap_or_default(),
                message.reasoning_content.as_deref().unwrap_or_default(),
            ),
            usage: body.usage,
        })
    }
}

fn transport_error(e: reqwest::Error) -> CorpusError {
    if e.is_timeout() {
        CorpusError::Timeout(format!("completion request: {}", e))
    } else {
        CorpusError::Network(format!("completion request: {}", e))
    }
}

/// Combine answer and reasoning into the stored text.
///
/// Content already shaped as `<think>..</think>..<answer>..</answer>` is kept.
/// Otherwise content with reasoning is wrapped in that shape, content alone
/// is returned as is, and reasoning alone is the fallback.
pub fn format_response(content: &str, reasoning: &str) -> String {
    if has_think_answer_shape(content) {
        return content.to_string();
    }
    match (content.is_empty(), reasoning.is_empty()) {
        (false, false) => format!("<think>{}</think>\n<answer>{}</answer>", reasoning, content),
        (false, true) => content.to_string(),
        (true, _) => reasoning.to_string(),
    }
}

fn has_think_answer_shape(content: &str) -> bool {
    let mut rest = content;
    for tag in ["<think>", "</think>", "<answer>", "</answer>"] {
        match rest.find(tag) {
            Some(at) => rest = &rest[at + tag.len()..],
            None => return false,
        }
    }
    true
}
