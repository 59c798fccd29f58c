//! OpenAI-compatible chat completion wire types and content extraction.

use infer_broker::{ComputeError, FALLBACK_RESPONSE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest<'a> {
    pub messages: Vec<WireMessage<'a>>,
    pub model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub function: Option<ToolFunction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolFunction {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

/// How to treat a well-formed response with no primary text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentPolicy {
    /// Missing content is an error.
    Strict,
    /// Fall back to tool calls, then reasoning, then a fixed apology.
    Lenient,
}

impl CompletionResponse {
    fn first_message(&self) -> Option<&ResponseMessage> {
        self.choices.first().and_then(|c| c.message.as_ref())
    }

    pub fn total_tokens(&self) -> Option<u64> {
        self.usage.and_then(|u| u.total_tokens)
    }

    /// Text to hand back to the caller.
    pub fn extract_content(&self, policy: ContentPolicy) -> Result<String, ComputeError> {
        let message = self.first_message();

        if let Some(content) = message.and_then(|m| non_empty(m.content.as_deref())) {
            return Ok(content.to_string());
        }

        match policy {
            ContentPolicy::Strict => Err(ComputeError::network(
                "invalid response: no message content in completion",
            )),
            ContentPolicy::Lenient => Ok(message
                .and_then(fallback_content)
                .unwrap_or_else(|| FALLBACK_RESPONSE.to_string())),
        }
    }
}

fn fallback_content(message: &ResponseMessage) -> Option<String> {
    if let Some(calls) = message.tool_calls.as_ref().filter(|c| !c.is_empty()) {
        let names: Vec<&str> = calls
            .iter()
            .filter_map(|c| c.function.as_ref())
            .map(|f| f.name.as_str())
            .filter(|n| !n.is_empty())
            .collect();
        let described = if names.is_empty() {
            "unnamed".to_string()
        } else {
            names.join(", ")
        };
        return Some(format!(
            "[The model requested {} tool call(s): {}]",
            calls.len(),
            described
        ));
    }
    non_empty(message.reasoning_content.as_deref()).map(str::to_string)
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}
