pub mod error;

use chrono::{ Local, NaiveDate };
use futures::{ stream, StreamExt };
use log::{ error, info, warn };
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{ timeout_at, Instant };

use crate::config::RelayConfig;
use crate::llm::chat::{ ChatClient, ChatError, ProviderRegistry, TextStream };
use crate::llm::Provider;
use crate::models::chat::Role;
use crate::models::relay::{ RelayRequest, WireMessage };

pub use self::error::RelayError;

/// Forwards a conversation to an upstream provider and streams the reply.
pub struct Relay {
    config: RelayConfig,
    /// One client per provider that has an API key, built up front. A
    /// failed build is kept so requests for that provider report it.
    clients: HashMap<Provider, Result<Arc<dyn ChatClient>, String>>,
}

impl Relay {
    pub fn new(config: RelayConfig, registry: ProviderRegistry) -> Self {
        let mut clients = HashMap::new();
        for provider in config.configured_providers() {
            let Some(provider_config) = config.provider(provider) else {
                continue;
            };
            let client = registry.new_client(provider_config).map_err(|e| {
                error!("Failed to build {} client: {}", provider, e);
                e.to_string()
            });
            if let Ok(client) = &client {
                info!("Upstream client ready for {}", client.provider());
            }
            clients.insert(provider, client);
        }
        Self { config, clients }
    }

    pub fn system_message(&self, date: NaiveDate) -> WireMessage {
        WireMessage {
            role: Role::System,
            content: self.config.prompts.render_system_prompt(date),
        }
    }

    /// The system instruction followed by `messages` in their original order.
    pub fn build_messages(&self, messages: &[WireMessage], date: NaiveDate) -> Vec<WireMessage> {
        let mut full = Vec::with_capacity(messages.len() + 1);
        full.push(self.system_message(date));
        full.extend(messages.iter().cloned());
        full
    }

    /// Resolves the provider, starts the upstream call and waits for its
    /// first chunk.
    ///
    /// Every failure up to and including the first chunk is returned as an
    /// `Err`, so callers can still answer with an error status. Later
    /// failures, including hitting the duration ceiling, end the stream with
    /// an error item.
    pub async fn stream(&self, request: RelayRequest) -> Result<TextStream, RelayError> {
        let provider: Provider = request.provider.parse().map_err(|_| {
            warn!("Rejected relay request for unknown provider '{}'", request.provider);
            RelayError::InvalidProvider(request.provider.clone())
        })?;

        info!(
            "Relay request: provider={}, model={}, messages={}",
            provider,
            request.model,
            request.messages.len()
        );

        let client = match self.clients.get(&provider) {
            Some(Ok(client)) => Arc::clone(client),
            Some(Err(e)) => {
                return Err(RelayError::Upstream(e.clone()));
            }
            None => {
                error!("Provider {} requested but no API key is configured", provider);
                return Err(RelayError::MissingApiKey(provider));
            }
        };

        let messages = self.build_messages(&request.messages, Local::now().date_naive());
        let max_duration = self.config.max_duration;
        let deadline = Instant::now() + max_duration;

        let mut upstream = match timeout_at(deadline, client.stream_chat(&request.model, &messages)).await {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => {
                error!("{} call failed: {}", provider, e);
                return Err(RelayError::Upstream(e.to_string()));
            }
            Err(_) => {
                error!("{} call timed out after {:?}", provider, max_duration);
                return Err(RelayError::Timeout(max_duration));
            }
        };

        let first = match timeout_at(deadline, upstream.next()).await {
            Ok(Some(Ok(chunk))) => Some(chunk),
            Ok(Some(Err(e))) => {
                error!("{} stream failed before first chunk: {}", provider, e);
                return Err(RelayError::Upstream(e.to_string()));
            }
            Ok(None) => {
                warn!("{} returned an empty completion", provider);
                None
            }
            Err(_) => {
                error!("{} produced no output within {:?}", provider, max_duration);
                return Err(RelayError::Timeout(max_duration));
            }
        };

        let rest = bounded(upstream, deadline, max_duration).inspect(move |item| {
            if let Err(e) = item {
                error!("{} stream aborted: {}", provider, e);
            }
        });

        Ok(Box::pin(stream::iter(first.map(Ok)).chain(rest)))
    }
}

/// Yields from `upstream` until it ends, fails, or `deadline` passes.
fn bounded(upstream: TextStream, deadline: Instant, max_duration: std::time::Duration) -> TextStream {
    Box::pin(
        stream::unfold(Some(upstream), move |state| async move {
            let mut upstream = match state {
                Some(upstream) => upstream,
                None => {
                    return None;
                }
            };
            match timeout_at(deadline, upstream.next()).await {
                Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(upstream))),
                Ok(Some(Err(e))) => Some((Err(e), None)),
                Ok(None) => None,
                Err(_) => {
                    let err: ChatError = Box::new(RelayError::Timeout(max_duration));
                    Some((Err(err), None))
                }
            }
        })
    )
}


#[cfg(test)]
mod tests {
    use super::testing::{ config_with_keys, FakeUpstream, Script };
    use super::*;
    use crate::config::prompt::PromptConfig;
    use crate::llm::ProviderConfig;
    use std::time::Duration;

    fn request(provider: &str, messages: Vec<WireMessage>) -> RelayRequest {
        RelayRequest {
            messages,
            provider: provider.to_string(),
            model: "m1".to_string(),
        }
    }

    fn user(content: &str) -> WireMessage {
        WireMessage { role: Role::User, content: content.to_string() }
    }

    async fn collect(stream: TextStream) -> (String, Option<String>) {
        let mut text = String::new();
        let mut stream = stream;
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => text.push_str(&chunk),
                Err(e) => {
                    return (text, Some(e.to_string()));
                }
            }
        }
        (text, None)
    }

    #[tokio::test]
    async fn unknown_provider_is_rejected_without_upstream_call() {
        let fake = FakeUpstream::new(Script::Tokens(vec!["never"]));
        let relay = Relay::new(config_with_keys(Duration::from_secs(5)), fake.registry());

        for name in ["bogus", "", "Together", "openai"] {
            let err = relay.stream(request(name, vec![user("hi")])).await.err().expect("rejected");
            assert!(matches!(err, RelayError::InvalidProvider(_)));
            assert_eq!(err.public_message(), "Invalid provider");
        }
        assert!(fake.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn prepends_system_message_and_keeps_order() {
        let fake = FakeUpstream::new(Script::Tokens(vec!["Hello", "!"]));
        let relay = Relay::new(config_with_keys(Duration::from_secs(5)), fake.registry());
        let history = vec![
            user("first"),
            WireMessage { role: Role::Assistant, content: "reply".into() },
            user("second")
        ];

        let stream = relay.stream(request("openrouter", history.clone())).await.expect("stream");
        let (text, err) = collect(stream).await;
        assert_eq!(text, "Hello!");
        assert!(err.is_none());

        let calls = fake.calls.lock().unwrap();
        let (model, sent) = &calls[0];
        assert_eq!(model, "m1");
        assert_eq!(sent.len(), history.len() + 1);
        assert_eq!(sent[0].role, Role::System);
        assert!(sent[0].content.contains("The current date is"));
        assert_eq!(&sent[1..], &history[..]);
    }

    #[tokio::test]
    async fn together_scenario_streams_non_empty_text() {
        let fake = FakeUpstream::new(Script::Tokens(vec!["Hi", " there"]));
        let relay = Relay::new(config_with_keys(Duration::from_secs(5)), fake.registry());
        let stream = relay.stream(request("together", vec![user("hi")])).await.expect("stream");
        let (text, _) = collect(stream).await;
        assert!(!text.is_empty());
        assert_eq!(fake.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clients_are_built_once_at_construction() {
        let fake = FakeUpstream::new(Script::Tokens(vec!["ok"]));
        let relay = Relay::new(config_with_keys(Duration::from_secs(5)), fake.registry());
        assert_eq!(fake.builds(), 2);

        for name in ["together", "openrouter", "together", "together"] {
            let stream = relay.stream(request(name, vec![user("hi")])).await.expect("stream");
            assert_eq!(collect(stream).await, ("ok".to_string(), None));
        }
        assert_eq!(fake.builds(), 2);
        assert_eq!(fake.calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn failed_client_build_is_reported_per_request() {
        let config = RelayConfig::new(
            vec![ProviderConfig::new(Provider::Together, Some("bad\nkey".into()), None)],
            PromptConfig::default(),
            Duration::from_secs(5)
        ).unwrap();
        let relay = Relay::new(config, ProviderRegistry::standard());
        let err = relay.stream(request("together", vec![user("hi")])).await.err().expect("error");
        assert!(matches!(err, RelayError::Upstream(ref m) if m.contains("Invalid API key format")));
        assert_eq!(err.public_message(), "Error");
    }

    #[tokio::test]
    async fn error_event_from_real_upstream_is_server_error() {
        use axum::{ routing::post, Router };

        let body = "data: {\"error\":{\"message\":\"Rate limit exceeded\",\"code\":429}}\n\n";
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move || async move { ([("content-type", "text/event-stream")], body) })
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let base_url = format!("http://{}/v1", addr);
        let config = RelayConfig::new(
            vec![ProviderConfig::new(Provider::OpenRouter, Some("k".into()), Some(base_url))],
            PromptConfig::default(),
            Duration::from_secs(5)
        ).unwrap();
        let relay = Relay::new(config, ProviderRegistry::standard());

        let err = relay.stream(request("openrouter", vec![user("hi")])).await.err().expect("error");
        assert!(matches!(err, RelayError::Upstream(ref m) if m == "Rate limit exceeded (code 429)"));
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn upstream_failure_before_streaming_is_server_error() {
        let fake = FakeUpstream::new(Script::FailOnCall);
        let relay = Relay::new(config_with_keys(Duration::from_secs(5)), fake.registry());
        let err = relay.stream(request("together", vec![user("hi")])).await.err().expect("error");
        assert!(matches!(err, RelayError::Upstream(_)));
        assert_eq!(err.public_message(), "Error");
    }

    #[tokio::test]
    async fn failure_on_first_chunk_is_server_error() {
        let fake = FakeUpstream::new(Script::FailAfter(vec![]));
        let relay = Relay::new(config_with_keys(Duration::from_secs(5)), fake.registry());
        let err = relay.stream(request("together", vec![user("hi")])).await.err().expect("error");
        assert!(matches!(err, RelayError::Upstream(_)));
    }

    #[tokio::test]
    async fn failure_mid_stream_ends_the_stream_with_error() {
        let fake = FakeUpstream::new(Script::FailAfter(vec!["partial"]));
        let relay = Relay::new(config_with_keys(Duration::from_secs(5)), fake.registry());
        let stream = relay.stream(request("together", vec![user("hi")])).await.expect("stream");
        let (text, err) = collect(stream).await;
        assert_eq!(text, "partial");
        assert_eq!(err.as_deref(), Some("connection reset"));
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_building_client() {
        let fake = FakeUpstream::new(Script::Tokens(vec!["x"]));
        let config = RelayConfig::new(
            vec![ProviderConfig::new(Provider::Together, None, None)],
            PromptConfig::default(),
            Duration::from_secs(5)
        ).unwrap();
        let relay = Relay::new(config, fake.registry());

        for name in ["together", "openrouter"] {
            let err = relay.stream(request(name, vec![user("hi")])).await.err().expect("error");
            assert!(matches!(err, RelayError::MissingApiKey(_)));
            assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        }
        assert_eq!(fake.builds(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_upstream_hits_duration_ceiling() {
        let fake = FakeUpstream::new(Script::Stall);
        let relay = Relay::new(config_with_keys(Duration::from_secs(30)), fake.registry());
        let err = relay.stream(request("together", vec![user("hi")])).await.err().expect("error");
        assert!(matches!(err, RelayError::Timeout(d) if d == Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn stall_after_first_chunk_ends_stream_with_timeout() {
        let fake = FakeUpstream::new(Script::TokenThenStall("partial"));
        let relay = Relay::new(config_with_keys(Duration::from_secs(30)), fake.registry());
        let stream = relay.stream(request("together", vec![user("hi")])).await.expect("stream");
        let (text, err) = collect(stream).await;
        assert_eq!(text, "partial");
        assert_eq!(err, Some(RelayError::Timeout(Duration::from_secs(30)).to_string()));
    }

    #[test]
    fn build_messages_with_empty_history_is_just_system() {
        let fake = FakeUpstream::new(Script::Tokens(vec![]));
        let relay = Relay::new(config_with_keys(Duration::from_secs(5)), fake.registry());
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let built = relay.build_messages(&[], date);
        assert_eq!(built.len(), 1);
        assert!(built[0].content.ends_with("The current date is 10/19/2026."));
    }
}
