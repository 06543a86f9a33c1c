use async_trait::async_trait;
use futures::StreamExt;
use log::{ debug, info, warn };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::Serialize;

use super::sse::{ parse_line, LineBuffer, SseEvent };
use super::{ create_streaming_response, ChatClient, ChatError, TextStream };
use crate::llm::{ Provider, ProviderConfig };
use crate::models::relay::WireMessage;

/// Client for any upstream exposing the OpenAI chat-completions API.
pub struct OpenAICompatClient {
    http: HttpClient,
    provider: Provider,
    base_url: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [WireMessage],
    stream: bool,
}

impl OpenAICompatClient {
    pub fn new(
        provider: Provider,
        api_key: &str,
        base_url: &str
    ) -> Result<Self, ChatError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
            format!("Invalid API key format: {}", e)
        )?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Box::new(e) as ChatError)?;

        Ok(Self {
            http,
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, ChatError> {
        let api_key = config.api_key
            .as_deref()
            .ok_or_else(|| format!("{} API key is required", config.provider))?;

        Self::new(config.provider, api_key, &config.base_url)
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatClient for OpenAICompatClient {
    async fn stream_chat(
        &self,
        model: &str,
        messages: &[WireMessage]
    ) -> Result<TextStream, ChatError> {
        let url = self.endpoint();
        let req = ChatCompletionRequest {
            model,
            messages,
            stream: true,
        };

        info!("Calling {} at {} with model {}", self.provider, url, model);
        let resp = self.http.post(&url).json(&req).send().await?.error_for_status()?;

        let provider = self.provider;
        Ok(
            create_streaming_response(move |tx| async move {
                let mut bytes = resp.bytes_stream();
                let mut lines = LineBuffer::new();

                while let Some(chunk) = bytes.next().await {
                    let chunk = match chunk {
                        Ok(c) => c,
                        Err(e) => {
                            let _ = tx.send(Err(Box::new(e) as ChatError)).await;
                            return;
                        }
                    };
                    for line in lines.push(&chunk) {
                        match parse_line(&line) {
                            SseEvent::Token(token) => {
                                if tx.send(Ok(token)).await.is_err() {
                                    debug!("{} stream receiver dropped", provider);
                                    return;
                                }
                            }
                            SseEvent::Finished(last) => {
                                if let Some(token) = last {
                                    let _ = tx.send(Ok(token)).await;
                                }
                                return;
                            }
                            SseEvent::Done => {
                                return;
                            }
                            SseEvent::Error(message) => {
                                warn!("{} reported a stream error: {}", provider, message);
                                let _ = tx.send(Err(message.into())).await;
                                return;
                            }
                            SseEvent::Skip => {}
                        }
                    }
                }

                if let Some(line) = lines.finish() {
                    match parse_line(&line) {
                        SseEvent::Token(token) | SseEvent::Finished(Some(token)) => {
                            let _ = tx.send(Ok(token)).await;
                        }
                        SseEvent::Error(message) => {
                            warn!("{} reported a stream error: {}", provider, message);
                            let _ = tx.send(Err(message.into())).await;
                        }
                        _ => {}
                    }
                }
            })
        )
    }

    fn provider(&self) -> Provider {
        self.provider
    }
}
