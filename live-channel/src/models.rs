use crate::cache::QueryKey;
use serde_json::{Map, Value};

/// State of the live connection. Never persisted; always starts disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Error type for the live channel. None of these reach the UI; they are logged.
#[derive(Debug)]
pub enum ChannelError {
    /// Frame was not valid JSON or not a `{type, ...}` object
    Parse(String),
    /// Socket could not be opened or broke while open
    Connection(String),
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ChannelError::Connection(msg) => write!(f, "Connection error: {}", msg),
        }
    }
}

impl std::error::Error for ChannelError {}

/// Server push message, decoded once at the socket boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMessage {
    EntityCreated { kind: String, id: Option<String> },
    EntityUpdated { kind: String, id: Option<String> },
    Unknown { message_type: String },
}

impl ChannelMessage {
    /// Decodes one text frame shaped `{type: string, ...payload}`.
    ///
    /// `"<kind>:created"` and `"<kind>:new"` are creations, `"<kind>:updated"`
    /// is an update, and the backend's `VALUATION_COMPLETED` is an update of
    /// the `valuation` entity. Anything else decodes to `Unknown`.
    pub fn decode(text: &str) -> Result<Self, ChannelError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ChannelError::Parse(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| ChannelError::Parse("frame is not a JSON object".to_string()))?;
        let message_type = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::Parse("frame has no string `type`".to_string()))?;

        if message_type == "VALUATION_COMPLETED" {
            return Ok(ChannelMessage::EntityUpdated {
                kind: "valuation".to_string(),
                id: entity_id(object, "valuation"),
            });
        }

        let message = match message_type.split_once(':') {
            Some((kind, "created" | "new")) if !kind.is_empty() => ChannelMessage::EntityCreated {
                kind: kind.to_string(),
                id: entity_id(object, kind),
            },
            Some((kind, "updated")) if !kind.is_empty() => ChannelMessage::EntityUpdated {
                kind: kind.to_string(),
                id: entity_id(object, kind),
            },
            _ => ChannelMessage::Unknown {
                message_type: message_type.to_string(),
            },
        };
        Ok(message)
    }

    /// Cache keys that become stale because of this message
    pub fn invalidation_keys(&self) -> Vec<QueryKey> {
        match self {
            ChannelMessage::EntityCreated { kind, .. } => vec![QueryKey::collection(kind)],
            ChannelMessage::EntityUpdated { kind, id: Some(id) } => {
                vec![QueryKey::collection(kind), QueryKey::entity(kind, id)]
            }
            ChannelMessage::EntityUpdated { kind, id: None } => vec![QueryKey::collection(kind)],
            ChannelMessage::Unknown { .. } => Vec::new(),
        }
    }
}

/// Looks for the entity id in `id`, `data.id`, then `<kind>_id`
fn entity_id(object: &Map<String, Value>, kind: &str) -> Option<String> {
    object
        .get("id")
        .and_then(id_string)
        .or_else(|| {
            object
                .get("data")
                .and_then(|d| d.get("id"))
                .and_then(id_string)
        })
        .or_else(|| object.get(&format!("{}_id", kind)).and_then(id_string))
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
