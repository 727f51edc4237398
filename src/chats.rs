//! Chat snapshot model and the index cache.
//!
//! `ChatEntry` mirrors the JSON the bridge produces for each WhatsApp chat or
//! group. The core never mutates entries; it only displays them and resolves
//! `#n` index references against the most recent snapshot.

use serde::{Deserialize, Serialize};

/// One member of a group chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Contact user identifier (the digits part of the JID).
    pub id: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_super_admin: bool,
}

/// One WhatsApp chat or group as reported by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    /// Contact user identifier (the digits part of the JID).
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub is_group: bool,
    /// Number of members; zero for non-group chats.
    #[serde(default)]
    pub group_size: u32,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

/// The most recent chat listing fetched from the client.
///
/// Replaced wholesale by every `chats`/`groups` fetch. `#n` references are
/// resolved against whatever snapshot is current, so an index typed from an
/// older listing may point at a different chat after a refresh.
#[derive(Debug, Default)]
pub struct ChatCache {
    entries: Option<Vec<ChatEntry>>,
}

impl ChatCache {
    /// Replace the snapshot with a freshly fetched listing.
    pub fn replace(&mut self, chats: Vec<ChatEntry>) {
        self.entries = Some(chats);
    }

    /// All cached entries, or `None` if no listing has been fetched yet.
    pub fn entries(&self) -> Option<&[ChatEntry]> {
        self.entries.as_deref()
    }

    /// Entry at `index` in the current snapshot.
    pub fn get(&self, index: usize) -> Option<&ChatEntry> {
        self.entries.as_ref().and_then(|e| e.get(index))
    }

    /// Whether a snapshot has been fetched (it may still hold zero chats).
    pub fn is_populated(&self) -> bool {
        self.entries.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(id: &str, is_group: bool) -> ChatEntry {
        ChatEntry {
            id: id.to_string(),
            name: format!("chat-{id}"),
            unread_count: 0,
            is_group,
            group_size: 0,
            participants: vec![],
        }
    }

    #[test]
    fn test_empty_cache_resolves_nothing() {
        let cache = ChatCache::default();
        assert!(!cache.is_populated());
        assert!(cache.get(0).is_none());
        assert!(cache.entries().is_none());
    }

    #[test]
    fn test_replace_swaps_snapshot_wholesale() {
        let mut cache = ChatCache::default();
        cache.replace(vec![chat("1", false), chat("2", true)]);
        assert_eq!(cache.get(1).unwrap().id, "2");

        cache.replace(vec![chat("9", false)]);
        assert_eq!(cache.get(0).unwrap().id, "9");
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn test_deserialize_bridge_shape() {
        let json = r#"{
            "id": "50499990000",
            "name": "Ops",
            "unreadCount": 3,
            "isGroup": true,
            "groupSize": 2,
            "participants": [
                {"id": "50499990001", "isAdmin": true, "isSuperAdmin": false},
                {"id": "50499990002"}
            ]
        }"#;
        let entry: ChatEntry = serde_json::from_str(json).unwrap();
        assert!(entry.is_group);
        assert_eq!(entry.unread_count, 3);
        assert_eq!(entry.participants.len(), 2);
        assert!(entry.participants[0].is_admin);
        assert!(!entry.participants[1].is_super_admin);
    }

    #[test]
    fn test_deserialize_minimal_chat() {
        // Non-group chats omit group fields entirely.
        let entry: ChatEntry =
            serde_json::from_str(r#"{"id": "50488887777", "name": "Ana"}"#).unwrap();
        assert!(!entry.is_group);
        assert_eq!(entry.group_size, 0);
        assert!(entry.participants.is_empty());
    }
}
