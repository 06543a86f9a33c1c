use serde::{ Deserialize, Serialize };

use super::chat::{ Message, Role };

/// Role/content pair as it travels on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

impl From<WireMessage> for Message {
    fn from(message: WireMessage) -> Self {
        Message::new(message.role, message.content)
    }
}

/// Body of `POST /api/chat`.
///
/// `provider` stays a plain string so an unknown name can be answered with a
/// client error instead of a deserialization failure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayRequest {
    pub messages: Vec<WireMessage>,
    pub provider: String,
    pub model: String,
}
