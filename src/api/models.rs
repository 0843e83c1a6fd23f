use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateInstance {
    #[serde(default)]
    pub state_instance: String,
}

impl StateInstance {
    pub const AUTHORIZED: &'static str = "authorized";

    pub fn is_authorized(&self) -> bool {
        self.state_instance == Self::AUTHORIZED
    }
}

/// Result of `getContactInfo`. Unknown fields are kept in `extra` so a
/// response without a chat id can still be reported verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ContactInfo {
    /// The chat id, if the gateway returned a non-empty one.
    pub fn resolved_chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// The gateway hands out receipt ids as numbers, older deployments as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReceiptId {
    Number(u64),
    Text(String),
}

impl fmt::Display for ReceiptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiptId::Number(n) => write!(f, "{n}"),
            ReceiptId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default)]
    pub receipt_id: Option<ReceiptId>,
    #[serde(default)]
    pub body: Option<NotificationBody>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationBody {
    #[serde(default)]
    pub type_webhook: Option<String>,
    #[serde(default)]
    pub id_message: Option<String>,
    #[serde(default)]
    pub sender_data: Option<SenderData>,
    #[serde(default)]
    pub message_data: Option<MessageData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderData {
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    #[serde(default)]
    pub type_message: Option<String>,
    #[serde(default)]
    pub text_message_data: Option<TextMessageData>,
    #[serde(default)]
    pub extended_text_message_data: Option<ExtendedTextMessageData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMessageData {
    #[serde(default)]
    pub text_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtendedTextMessageData {
    #[serde(default)]
    pub text: Option<String>,
}

impl Notification {
    /// Never fails. The receipt is read on its own; a body that does not
    /// decode is dropped and the notification then carries no text.
    pub fn from_value(mut value: Value) -> Self {
        let receipt_id = value
            .get("receiptId")
            .cloned()
            .and_then(|r| serde_json::from_value::<ReceiptId>(r).ok());
        let body = match value.get_mut("body").map(Value::take) {
            None | Some(Value::Null) => None,
            Some(raw) => match serde_json::from_value::<NotificationBody>(raw) {
                Ok(body) => Some(body),
                Err(e) => {
                    warn!("dropping undecodable notification body: {e}");
                    None
                }
            },
        };
        Self { receipt_id, body }
    }

    /// Plain text body if present and non-empty, otherwise the extended text body.
    pub fn text(&self) -> Option<&str> {
        let data = self.body.as_ref()?.message_data.as_ref()?;
        let plain = data
            .text_message_data
            .as_ref()
            .and_then(|t| t.text_message.as_deref())
            .filter(|t| !t.is_empty());
        plain.or_else(|| {
            data.extended_text_message_data
                .as_ref()
                .and_then(|t| t.text.as_deref())
                .filter(|t| !t.is_empty())
        })
    }

    /// Builds a transcript entry when the notification carries a text body.
    pub fn to_entry(&self) -> Option<TranscriptEntry> {
        let text = self.text()?;
        let body = self.body.as_ref()?;
        Some(TranscriptEntry {
            id: body.id_message.clone().unwrap_or_default(),
            sender: body
                .sender_data
                .as_ref()
                .and_then(|s| s.sender.clone())
                .unwrap_or_default(),
            text: text.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: String,
    pub sender: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAck {
    #[serde(default)]
    pub id_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteAck {
    #[serde(default)]
    pub result: bool,
}
