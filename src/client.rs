use async_trait::async_trait;
use futures::StreamExt;
use log::debug;
use reqwest::Client as HttpClient;

use crate::llm::chat::ChatError;
use crate::models::chat::Message;
use crate::models::relay::{ RelayRequest, WireMessage };
use crate::session::Responder;

/// Talks to a relay over HTTP, the way the browser UI does.
#[derive(Clone)]
pub struct RelayClient {
    http: HttpClient,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[async_trait]
impl Responder for RelayClient {
    async fn respond(
        &self,
        provider: &str,
        model: &str,
        messages: &[Message]
    ) -> Result<String, ChatError> {
        let request = RelayRequest {
            messages: messages.iter().map(WireMessage::from).collect(),
            provider: provider.to_string(),
            model: model.to_string(),
        };

        let resp = self.http.post(self.chat_url()).json(&request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("Relay answered {}: {}", status, body).into());
        }

        let mut reply = Vec::new();
        let mut bytes = resp.bytes_stream();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            debug!("Relay chunk: {} bytes", chunk.len());
            reply.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8(reply)?)
    }
}
