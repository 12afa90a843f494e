use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const ERROR_BODY_LIMIT: usize = 500;

/// OpenAI 互換の chat-completions エンドポイントへのクライアント。
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

/// 補完呼び出しの失敗種別。
///
/// サマリーパイプラインはこの型をそのまま結果に保持し、
/// 文字列化はレポートのシリアライズ境界まで遅延させる。
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("completion endpoint returned error status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("completion response contained no message content")]
    MalformedResponse,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl CompletionClient {
    /// 新しいクライアントを作成する。
    ///
    /// # Errors
    /// HTTP クライアントの構築に失敗した場合はエラーを返す。
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("failed to build completion HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// 単一の chat completion を実行し、トリム済みの本文テキストを返す。
    ///
    /// # Errors
    /// 送信失敗、エラーステータス、本文の欠落は [`CompletionError`] を返す。
    pub async fn complete(
        &self,
        system: Option<&str>,
        user: &str,
        temperature: f64,
        max_tokens: Option<u32>,
    ) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user,
        });

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature,
            max_tokens,
        };

        debug!(
            model = %self.model,
            temperature,
            prompt_chars = user.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status,
                body: truncate_error_body(&body),
            });
        }

        let payload: ChatResponse = response.json().await?;
        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::MalformedResponse)?;

        Ok(content.trim().to_string())
    }
}

/// エラーレスポンス本文を切り詰める。巨大な HTML エラーページ等をログや
/// レポートへそのまま流さないための措置。
fn truncate_error_body(body: &str) -> String {
    if body.chars().count() <= ERROR_BODY_LIMIT {
        return body.to_string();
    }
    let truncated: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    format!("{truncated}... (truncated)")
}
