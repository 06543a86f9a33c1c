pub mod openai;
pub mod sse;

use async_trait::async_trait;
use futures::{ Future, Stream };
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use super::{ Provider, ProviderConfig };
use self::openai::OpenAICompatClient;
use crate::models::relay::WireMessage;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub type ChatError = Box<dyn StdError + Send + Sync>;

/// Incrementally delivered completion text.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Starts a streaming completion of `messages` on `model`.
    ///
    /// An `Err` means nothing was streamed; errors after the upstream accepted
    /// the request arrive as items of the returned stream.
    async fn stream_chat(
        &self,
        model: &str,
        messages: &[WireMessage]
    ) -> Result<TextStream, ChatError>;

    fn provider(&self) -> Provider;
}

pub fn create_streaming_response<F, Fut>(response_fn: F) -> TextStream
    where
        F: FnOnce(mpsc::Sender<Result<String, ChatError>>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

pub type ClientFactory = Arc<
    dyn Fn(&ProviderConfig) -> Result<Arc<dyn ChatClient>, ChatError> + Send + Sync
>;

/// Maps each provider name to the constructor of its upstream client.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: HashMap<Provider, ClientFactory>,
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Both providers speak the OpenAI chat-completions protocol.
    pub fn standard() -> Self {
        Self::empty()
            .register(Provider::Together, Arc::new(openai_compat_factory))
            .register(Provider::OpenRouter, Arc::new(openai_compat_factory))
    }

    pub fn register(mut self, provider: Provider, factory: ClientFactory) -> Self {
        self.factories.insert(provider, factory);
        self
    }

    pub fn new_client(&self, config: &ProviderConfig) -> Result<Arc<dyn ChatClient>, ChatError> {
        let factory = self.factories
            .get(&config.provider)
            .ok_or_else(|| format!("No client registered for provider '{}'", config.provider))?;
        factory(config)
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut providers: Vec<_> = self.factories.keys().map(Provider::as_str).collect();
        providers.sort_unstable();
        f.debug_struct("ProviderRegistry").field("providers", &providers).finish()
    }
}

fn openai_compat_factory(config: &ProviderConfig) -> Result<Arc<dyn ChatClient>, ChatError> {
    let client = OpenAICompatClient::from_config(config)?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn standard_registry_covers_every_provider() {
        let registry = ProviderRegistry::standard();
        for provider in Provider::ALL {
            let config = ProviderConfig::new(provider, Some("key".into()), None);
            let client = registry.new_client(&config).expect("client");
            assert_eq!(client.provider(), provider);
        }
    }

    #[test]
    fn empty_registry_refuses_to_build() {
        let registry = ProviderRegistry::empty();
        let config = ProviderConfig::new(Provider::Together, Some("key".into()), None);
        let err = registry.new_client(&config).err().expect("should fail");
        assert!(err.to_string().contains("together"));
    }

    #[tokio::test]
    async fn streaming_response_forwards_items_in_order() {
        let stream = create_streaming_response(|tx| async move {
            for part in ["a", "b", "c"] {
                let _ = tx.send(Ok(part.to_string())).await;
            }
        });
        let parts: Vec<String> = stream.map(|item| item.expect("ok")).collect().await;
        assert_eq!(parts, vec!["a", "b", "c"]);
    }
}
