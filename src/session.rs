use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use log::{ error, info };

use crate::llm::chat::ChatError;
use crate::models::chat::{ Conversation, Message };
use crate::models::relay::{ RelayRequest, WireMessage };
use crate::relay::Relay;
use crate::store::{ ChatState, ChatStore };

pub const ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// Produces the assistant reply for a conversation.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(
        &self,
        provider: &str,
        model: &str,
        messages: &[Message]
    ) -> Result<String, ChatError>;
}

#[async_trait]
impl Responder for Relay {
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
        let mut stream = self.stream(request).await?;
        let mut reply = String::new();
        while let Some(chunk) = stream.next().await {
            reply.push_str(&chunk?);
        }
        Ok(reply)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Replied,
    /// The reply failed and a synthetic error message was appended instead.
    Failed,
    /// Blank input or a reply already pending; nothing changed.
    Ignored,
}

/// UI-side controller: each public method is one user action.
pub struct ChatSession<R> {
    store: ChatStore,
    responder: R,
    provider: String,
}

impl<R: Responder> ChatSession<R> {
    pub fn new(responder: R, provider: impl Into<String>) -> Self {
        Self::with_state(responder, provider, ChatState::default())
    }

    pub fn with_state(responder: R, provider: impl Into<String>, state: ChatState) -> Self {
        Self {
            store: ChatStore::new(state),
            responder,
            provider: provider.into(),
        }
    }

    pub fn state(&self) -> &ChatState {
        self.store.state()
    }

    pub fn new_conversation(&mut self) {
        self.store.new_conversation();
    }

    /// Returns `false` when no conversation has that id.
    pub fn select_conversation(&mut self, id: &str) -> bool {
        match self.store.state().find_conversation(id).cloned() {
            Some(conversation) => {
                self.store.set_current(Some(conversation));
                true
            }
            None => false,
        }
    }

    pub fn switch_model(&mut self, model: impl Into<String>) {
        self.store.set_selected_model(model);
    }

    pub fn toggle_sidebar(&mut self) {
        self.store.toggle_sidebar();
    }

    /// Appends the user's text, asks the responder, and appends its reply.
    ///
    /// The thread stays consistent on failure: a failed reply still leaves an
    /// assistant message behind.
    pub async fn send_message(&mut self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() || self.store.state().is_typing {
            return SendOutcome::Ignored;
        }

        if self.store.state().current_conversation.is_none() {
            self.store.new_conversation();
        }

        self.store.add_message(Message::user(text).at(Utc::now()));
        self.store.set_typing(true);

        let model = self.store.state().selected_model.clone();
        let history = self.current_messages();
        info!("Sending {} message(s) to {} via {}", history.len(), model, self.provider);

        let result = self.responder.respond(&self.provider, &model, &history).await;
        let outcome = match result {
            Ok(reply) => {
                self.store.add_message(
                    Message::assistant(reply).with_model(model.clone()).at(Utc::now())
                );
                SendOutcome::Replied
            }
            Err(e) => {
                error!("Reply from {} failed: {}", model, e);
                self.store.add_message(
                    Message::assistant(ERROR_REPLY).with_model(model.clone()).at(Utc::now())
                );
                SendOutcome::Failed
            }
        };

        self.store.set_typing(false);
        outcome
    }

    fn current_messages(&self) -> Vec<Message> {
        self.store
            .state()
            .current_conversation.as_ref()
            .map(|c: &Conversation| c.messages.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;
    use crate::relay::testing::{ config_with_keys, FakeUpstream, Script };
    use std::sync::{ Arc, Mutex };
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Scripted {
        fail: bool,
        seen: Arc<Mutex<Vec<(String, String, Vec<Message>)>>>,
    }

    #[async_trait]
    impl Responder for Scripted {
        async fn respond(
            &self,
            provider: &str,
            model: &str,
            messages: &[Message]
        ) -> Result<String, ChatError> {
            self.seen.lock().unwrap().push((provider.into(), model.into(), messages.to_vec()));
            if self.fail {
                Err("offline".into())
            } else {
                Ok(format!("echo: {}", messages.last().map(|m| m.content.as_str()).unwrap_or("")))
            }
        }
    }

    #[tokio::test]
    async fn send_creates_conversation_and_appends_reply() {
        let responder = Scripted::default();
        let mut session = ChatSession::new(responder.clone(), "together");

        assert_eq!(session.send_message("  hello  ").await, SendOutcome::Replied);

        let state = session.state();
        assert!(!state.is_typing);
        let current = state.current_conversation.as_ref().unwrap();
        assert_eq!(current.messages.len(), 2);
        assert_eq!(current.messages[0].role, Role::User);
        assert_eq!(current.messages[0].content, "hello");
        assert_eq!(current.messages[1].role, Role::Assistant);
        assert_eq!(current.messages[1].content, "echo: hello");
        assert_eq!(current.messages[1].model.as_deref(), Some("deepseek-r1"));
        assert_eq!(state.conversations.len(), 1);

        let seen = responder.seen.lock().unwrap();
        assert_eq!(seen[0].0, "together");
        assert_eq!(seen[0].1, "deepseek-r1");
        assert_eq!(seen[0].2.len(), 1);
    }

    #[tokio::test]
    async fn failure_becomes_synthetic_assistant_message() {
        let mut session = ChatSession::new(Scripted { fail: true, ..Default::default() }, "together");
        assert_eq!(session.send_message("hi").await, SendOutcome::Failed);

        let current = session.state().current_conversation.clone().unwrap();
        assert_eq!(current.messages.len(), 2);
        assert_eq!(current.messages[1].role, Role::Assistant);
        assert_eq!(current.messages[1].content, ERROR_REPLY);
        assert!(!session.state().is_typing);
    }

    #[tokio::test]
    async fn ignores_blank_input_and_pending_replies() {
        let responder = Scripted::default();
        let mut session = ChatSession::new(responder.clone(), "together");
        assert_eq!(session.send_message("   ").await, SendOutcome::Ignored);
        assert!(session.state().current_conversation.is_none());

        let mut state = ChatState::default();
        state.is_typing = true;
        let mut busy = ChatSession::with_state(responder.clone(), "together", state);
        assert_eq!(busy.send_message("hi").await, SendOutcome::Ignored);
        assert!(responder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn actions_map_to_store_operations() {
        let mut session = ChatSession::new(Scripted::default(), "openrouter");
        session.switch_model("llama-3.3");
        session.new_conversation();
        let first = session.state().current_conversation.clone().unwrap();
        assert_eq!(first.model, "llama-3.3");

        session.send_message("hi").await;
        session.new_conversation();
        assert!(session.state().current_conversation.as_ref().unwrap().messages.is_empty());

        assert!(session.select_conversation(&first.id));
        assert_eq!(session.state().current_conversation.as_ref().unwrap().messages.len(), 2);
        assert!(!session.select_conversation("missing"));

        session.toggle_sidebar();
        assert!(!session.state().sidebar_open);
    }

    #[tokio::test]
    async fn relay_responder_collects_streamed_text() {
        let fake = FakeUpstream::new(Script::Tokens(vec!["Hi", " there"]));
        let relay = Relay::new(config_with_keys(Duration::from_secs(5)), fake.registry());
        let mut session = ChatSession::new(relay, "together");

        assert_eq!(session.send_message("hi").await, SendOutcome::Replied);
        let current = session.state().current_conversation.clone().unwrap();
        assert_eq!(current.messages[1].content, "Hi there");

        let calls = fake.calls.lock().unwrap();
        assert_eq!(calls[0].0, "deepseek-r1");
        assert_eq!(calls[0].1[0].role, Role::System);
        assert_eq!(calls[0].1[1].content, "hi");
    }

    #[tokio::test]
    async fn relay_rejection_surfaces_as_error_reply() {
        let fake = FakeUpstream::new(Script::Tokens(vec!["never"]));
        let relay = Relay::new(config_with_keys(Duration::from_secs(5)), fake.registry());
        let mut session = ChatSession::new(relay, "bogus");

        assert_eq!(session.send_message("hi").await, SendOutcome::Failed);
        assert!(fake.calls.lock().unwrap().is_empty());
    }
}
