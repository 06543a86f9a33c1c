pub mod grouping;

use chrono::{ DateTime, Utc };

use crate::models::chat::{ default_models, Conversation, Message, ModelInfo, DEFAULT_MODEL };

/// Client-side chat state. Transitions never mutate a state in place; see
/// [`reduce`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChatState {
    pub conversations: Vec<Conversation>,
    pub current_conversation: Option<Conversation>,
    pub selected_model: String,
    pub is_typing: bool,
    pub sidebar_open: bool,
    pub models: Vec<ModelInfo>,
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            conversations: Vec::new(),
            current_conversation: None,
            selected_model: DEFAULT_MODEL.to_string(),
            is_typing: false,
            sidebar_open: true,
            models: default_models(),
        }
    }
}

impl ChatState {
    pub fn find_conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn current_model_info(&self) -> Option<&ModelInfo> {
        self.models.iter().find(|m| m.id == self.selected_model)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetConversations(Vec<Conversation>),
    SetCurrentConversation(Option<Conversation>),
    AddMessage(Message),
    SetSelectedModel(String),
    SetTyping(bool),
    ToggleSidebar,
    NewConversation,
}

/// Applies `action` to `state`, with `now` as the clock for timestamps.
pub fn reduce(state: &ChatState, action: Action, now: DateTime<Utc>) -> ChatState {
    match action {
        Action::SetConversations(conversations) =>
            ChatState { conversations, ..state.clone() },
        Action::SetCurrentConversation(current_conversation) =>
            ChatState { current_conversation, ..state.clone() },
        Action::AddMessage(message) => {
            let Some(current) = &state.current_conversation else {
                return state.clone();
            };
            let mut updated = current.clone();
            updated.messages.push(message);
            updated.last_message_at = updated.last_message_at.max(now);

            let conversations = state.conversations
                .iter()
                .map(|c| if c.id == updated.id { updated.clone() } else { c.clone() })
                .collect();
            ChatState {
                conversations,
                current_conversation: Some(updated),
                ..state.clone()
            }
        }
        Action::SetSelectedModel(selected_model) => ChatState { selected_model, ..state.clone() },
        Action::SetTyping(is_typing) => ChatState { is_typing, ..state.clone() },
        Action::ToggleSidebar => ChatState { sidebar_open: !state.sidebar_open, ..state.clone() },
        Action::NewConversation => {
            let conversation = Conversation::new(state.selected_model.clone(), now);
            let mut conversations = Vec::with_capacity(state.conversations.len() + 1);
            conversations.push(conversation.clone());
            conversations.extend(state.conversations.iter().cloned());
            ChatState {
                conversations,
                current_conversation: Some(conversation),
                ..state.clone()
            }
        }
    }
}

/// Owns the current [`ChatState`] and applies actions to it.
#[derive(Debug, Default)]
pub struct ChatStore {
    state: ChatState,
}

impl ChatStore {
    pub fn new(state: ChatState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn dispatch(&mut self, action: Action) {
        self.dispatch_at(action, Utc::now());
    }

    pub fn dispatch_at(&mut self, action: Action, now: DateTime<Utc>) {
        self.state = reduce(&self.state, action, now);
    }

    pub fn set_conversations(&mut self, conversations: Vec<Conversation>) {
        self.dispatch(Action::SetConversations(conversations));
    }

    pub fn set_current(&mut self, conversation: Option<Conversation>) {
        self.dispatch(Action::SetCurrentConversation(conversation));
    }

    pub fn add_message(&mut self, message: Message) {
        self.dispatch(Action::AddMessage(message));
    }

    pub fn set_selected_model(&mut self, model: impl Into<String>) {
        self.dispatch(Action::SetSelectedModel(model.into()));
    }

    pub fn set_typing(&mut self, typing: bool) {
        self.dispatch(Action::SetTyping(typing));
    }

    pub fn toggle_sidebar(&mut self) {
        self.dispatch(Action::ToggleSidebar);
    }

    pub fn new_conversation(&mut self) {
        self.dispatch(Action::NewConversation);
    }
}
