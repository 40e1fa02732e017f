//! Wire shapes shared by the duplex channel and the HTTP API.
//!
//! Reply payloads are deliberately loose: every field is optional and absent
//! fields deserialize to their empty form, because the backend composes
//! replies field-by-field (text, sources, an action, a generated document)
//! and none of them excludes the others.

use serde::{Deserialize, Serialize};

// -- Commands ---------------------------------------------------------------

/// A single user command, as carried by both transports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCommand {
    pub text: String,
}

impl UserCommand {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

// -- Replies ------------------------------------------------------------------

/// A labeled source link attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLink {
    pub label: String,
    pub url: String,
}

/// Client-side action requested by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyAction {
    OpenUrl,
}

/// A structured reply from the backend, via either transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DracoReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ReplyAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources_labeled: Vec<SourceLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Error detail, only ever set by the HTTP fallback path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DracoReply {
    /// Wrap an unparsable payload as a plain-text reply.
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

// -- Duplex frames ------------------------------------------------------------

/// Frames emitted by the client over the duplex channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientFrame {
    UserCommand { text: String },
}

/// Frames received from the backend over the duplex channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerFrame {
    DracoResponse {
        #[serde(flatten)]
        reply: DracoReply,
    },
}

/// Parse an inbound duplex frame.
///
/// Anything that is not a recognized frame degrades to a plain-text reply
/// carrying the raw payload, so a misbehaving backend still produces a
/// visible line instead of a swallowed message.
pub fn parse_inbound(payload: &str) -> DracoReply {
    match serde_json::from_str::<ServerFrame>(payload) {
        Ok(ServerFrame::DracoResponse { reply }) => reply,
        Err(_) => DracoReply::raw(payload),
    }
}

// -- HTTP API envelopes ---------------------------------------------------------

/// One line of backend-side chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryItem {
    pub who: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    pub ok: bool,
    #[serde(default)]
    pub items: Vec<HistoryItem>,
}

/// One entry of the backend's chat list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatsResponse {
    pub ok: bool,
    #[serde(default)]
    pub chats: Vec<ChatInfo>,
}

#[derive(Debug, Serialize)]
pub struct SelectChatRequest {
    pub chat_id: String,
}

/// Long-term user preferences held by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    pub ok: bool,
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

/// Result of a document-processing upload.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadOutcome {
    pub ok: bool,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Generic `{ ok }` acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct AckResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}
