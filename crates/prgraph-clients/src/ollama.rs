//! [`Completion`] over a local Ollama server's `/api/generate` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use prgraph_extract::{Completion, CompletionError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
  /// When `false` the server runs keyword-only extraction.
  pub enabled:      bool,
  pub base_url:     String,
  pub model:        String,
  /// A second model that reviews the first one's relationship extractions.
  pub critic_model: Option<String>,
  pub timeout_secs: u64,
}

impl Default for OllamaSettings {
  fn default() -> Self {
    Self {
      enabled:      true,
      base_url:     "http://localhost:11434".into(),
      model:        "llama3.2:1b".into(),
      critic_model: None,
      timeout_secs: 30,
    }
  }
}

pub struct OllamaClient {
  client:   Client,
  base_url: String,
  model:    String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
  model:   &'a str,
  prompt:  &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  system:  Option<&'a str>,
  stream:  bool,
  options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
  temperature: f64,
  top_p:       f64,
  num_predict: u32,
}

impl Default for GenerateOptions {
  fn default() -> Self { Self { temperature: 0.1, top_p: 0.9, num_predict: 1024 } }
}

#[derive(Deserialize)]
struct GenerateResponse {
  #[serde(default)]
  response: String,
}

impl OllamaClient {
  pub fn new(settings: &OllamaSettings) -> Result<Self, CompletionError> {
    let client = Client::builder()
      .timeout(Duration::from_secs(settings.timeout_secs))
      .build()
      .map_err(|e| CompletionError::Network(e.to_string()))?;
    Ok(Self {
      client,
      base_url: settings.base_url.trim_end_matches('/').to_owned(),
      model: settings.model.clone(),
    })
  }

  pub fn model(&self) -> &str { &self.model }
}

#[async_trait]
impl Completion for OllamaClient {
  fn name(&self) -> &str { "ollama" }

  async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String, CompletionError> {
    let url = format!("{}/api/generate", self.base_url);
    let body = GenerateRequest {
      model: &self.model,
      prompt,
      system,
      stream: false,
      options: GenerateOptions::default(),
    };

    debug!(model = %self.model, "calling Ollama");

    let resp = self
      .client
      .post(&url)
      .json(&body)
      .send()
      .await
      .map_err(|e| CompletionError::Network(e.to_string()))?;

    if !resp.status().is_success() {
      let status = resp.status().as_u16();
      let body = resp.text().await.unwrap_or_default();
      return Err(CompletionError::Api { status, body });
    }

    let result: GenerateResponse = resp
      .json()
      .await
      .map_err(|e| CompletionError::Parse(e.to_string()))?;
    Ok(result.response)
  }
}

#[cfg(test)]
mod tests {
  use axum::{Json, Router, http::StatusCode, routing::post};
  use serde_json::{Value, json};

  use super::*;
  use crate::mock;

  fn client(base_url: String) -> OllamaClient {
    OllamaClient::new(&OllamaSettings { base_url, ..OllamaSettings::default() }).unwrap()
  }

  #[test]
  fn request_body_omits_missing_system() {
    let body = GenerateRequest {
      model:   "m",
      prompt:  "p",
      system:  None,
      stream:  false,
      options: GenerateOptions::default(),
    };
    let json = serde_json::to_value(&body).unwrap();
    assert!(json.get("system").is_none());
    assert_eq!(json["stream"], false);
    assert_eq!(json["options"]["num_predict"], 1024);
  }

  #[tokio::test]
  async fn returns_generated_text() {
    let app = Router::new().route(
      "/api/generate",
      post(|Json(req): Json<Value>| async move {
        Json(json!({ "response": format!("{} / {}", req["prompt"], req["system"]) }))
      }),
    );
    let base = mock::serve(app).await;

    let text = client(base).complete("hi", Some("sys")).await.unwrap();
    assert_eq!(text, "\"hi\" / \"sys\"");
  }

  #[tokio::test]
  async fn server_errors_map_to_api_error() {
    let app = Router::new().route(
      "/api/generate",
      post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model not loaded") }),
    );
    let base = mock::serve(app).await;

    let err = client(base).complete("hi", None).await.unwrap_err();
    match err {
      CompletionError::Api { status, body } => {
        assert_eq!(status, 500);
        assert_eq!(body, "model not loaded");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn non_json_body_is_a_parse_error() {
    let app = Router::new().route("/api/generate", post(|| async { "plain text" }));
    let base = mock::serve(app).await;

    let err = client(base).complete("hi", None).await.unwrap_err();
    assert!(matches!(err, CompletionError::Parse(_)));
  }
}
