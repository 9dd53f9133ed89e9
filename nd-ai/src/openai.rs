use crate::error::{AiError, Result};
use serde::{Deserialize, Serialize};

const OPENAI_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// One chat completion call: system + user message, no tools, no streaming.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChatParams<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
    pub json_output: bool,
}

#[derive(Clone)]
pub(crate) struct OpenAiChat {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(http: reqwest::Client, api_key: &str, model: &str) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn complete(&self, params: ChatParams<'_>) -> Result<String> {
        let req = ChatRequest::new(&self.model, params);

        let response = self
            .http
            .post(OPENAI_CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AiError::Http(format!(
                "openai chat status={status} body={body}"
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(AiError::ResponseFormat(
                "openai response has no message content".to_string(),
            ));
        }
        Ok(content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatRequestMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatRequestMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

impl ChatRequest {
    fn new(model: &str, params: ChatParams<'_>) -> Self {
        let mut messages = Vec::with_capacity(2);
        if !params.system.is_empty() {
            messages.push(ChatRequestMessage {
                role: "system".to_string(),
                content: params.system.to_string(),
            });
        }
        messages.push(ChatRequestMessage {
            role: "user".to_string(),
            content: params.user.to_string(),
        });

        Self {
            model: model.to_string(),
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            response_format: params.json_output.then(|| ResponseFormat {
                r#type: "json_object".to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_mode_sets_response_format_and_plain_mode_omits_it() {
        let json_req = ChatRequest::new(
            "gpt-4o-mini",
            ChatParams {
                system: "sys",
                user: "hello",
                temperature: 0.9,
                max_tokens: 2000,
                json_output: true,
            },
        );
        let body = serde_json::to_value(&json_req).expect("serialize request");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");

        let plain_req = ChatRequest::new(
            "gpt-4o-mini",
            ChatParams {
                system: "",
                user: "hello",
                temperature: 0.3,
                max_tokens: 10,
                json_output: false,
            },
        );
        let body = serde_json::to_value(&plain_req).expect("serialize request");
        assert!(body.get("response_format").is_none());
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn response_without_content_is_rejected_by_caller_checks() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{}}]}"#).expect("parse response");
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        assert!(content.is_empty());
    }
}
