use serde::{Deserialize, Serialize};
use std::fmt;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Short hex id attached to outgoing requests for log correlation.
pub fn new_request_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    format!(
        "{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3]
    )
}

/// Opaque key scoping one independent conversation history.
///
/// Hosts usually hand us their own identifier; when they don't,
/// [`ConversationId::new`] mints a fresh one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new() -> Self {
        Self(new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_is_valid_uuid() {
        let id = new_id();
        let parsed = uuid::Uuid::parse_str(&id);
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap().get_version_num(), 4);
    }

    #[test]
    fn request_id_is_short_hex() {
        let rid = new_request_id();
        assert_eq!(rid.len(), 8);
        assert!(rid.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn conversation_id_new_is_uuid() {
        let cid = ConversationId::new();
        assert!(uuid::Uuid::parse_str(cid.as_str()).is_ok());
    }

    #[test]
    fn conversation_id_from_host_string() {
        let cid = ConversationId::from("kitchen-satellite");
        assert_eq!(cid.as_str(), "kitchen-satellite");
        assert_eq!(cid.to_string(), "kitchen-satellite");
    }

    #[test]
    fn conversation_id_equality_and_hash() {
        use std::collections::HashSet;
        let a = ConversationId::from("a");
        let mut set = HashSet::new();
        set.insert(a.clone());
        set.insert(ConversationId::from(String::from("a")));
        set.insert(ConversationId::new());
        assert_eq!(set.len(), 2);
        assert!(set.contains(&a));
    }

    #[test]
    fn conversation_id_serialization() {
        let cid = ConversationId::new();
        let json = serde_json::to_string(&cid).unwrap();
        let back: ConversationId = serde_json::from_str(&json).unwrap();
        assert_eq!(cid, back);
    }
}
