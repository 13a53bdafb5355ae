// Pseudonym generation
//
// Deterministic one-way mapping from origin identifiers to short opaque
// tokens. Unsalted on purpose: the same origin id must yield the same
// pseudonym on every run over this dataset so users, conversations and
// messages keep joining up without the origin id ever being exported.
// Irreversibility comes from SHA-256 plus truncation; nothing in the
// output allows recovery of the input.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::types::{ConversationType, IdentityLink};

/// Hex characters kept from the digest. 48 bits is far beyond collision
/// range for a single workspace while staying short enough to eyeball.
const HEX_PREFIX_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Conversation(ConversationType),
}

impl EntityKind {
    fn marker(&self) -> char {
        match self {
            EntityKind::User => 'E',
            EntityKind::Conversation(ConversationType::Dm) => 'D',
            EntityKind::Conversation(ConversationType::Channel) => 'C',
        }
    }

    /// Domain-separation prefix fed into the hash so a user id and a
    /// conversation that happens to share the same string never collide.
    fn scope(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Conversation(_) => "conv",
        }
    }
}

/// Derive the pseudonym for one origin identifier.
pub fn pseudonymize(kind: EntityKind, origin_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.scope().as_bytes());
    hasher.update(b":");
    hasher.update(origin_id.as_bytes());
    let digest = hasher.finalize();

    let mut token = String::with_capacity(1 + HEX_PREFIX_LEN);
    token.push(kind.marker());
    for byte in digest.iter().take(HEX_PREFIX_LEN / 2) {
        token.push_str(&format!("{:02x}", byte));
    }
    token
}

/// In-memory origin-id -> pseudonym table for one run. This is the only
/// place the two ever sit side by side; it is never serialized.
#[derive(Debug, Default)]
pub struct PseudonymMap {
    users: HashMap<String, String>,
}

impl PseudonymMap {
    /// Build the user mapping from the resolved identity set.
    pub fn from_links(links: &[IdentityLink]) -> Self {
        let users = links
            .iter()
            .map(|link| (link.origin_id.clone(), link.clarity_id.clone()))
            .collect();
        Self { users }
    }

    /// Pseudonym for a resolved human, or None for bots / unknowns.
    pub fn user(&self, origin_id: &str) -> Option<&str> {
        self.users.get(origin_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_pseudonym_is_deterministic() {
        let a = pseudonymize(EntityKind::User, "U12345");
        let b = pseudonymize(EntityKind::User, "U12345");
        assert_eq!(a, b);
        assert!(a.starts_with('E'));
        assert_eq!(a.len(), 1 + HEX_PREFIX_LEN);
    }

    #[test]
    fn test_distinct_ids_get_distinct_pseudonyms() {
        let a = pseudonymize(EntityKind::User, "U1");
        let b = pseudonymize(EntityKind::User, "U2");
        assert_ne!(a, b);
    }

    #[test]
    fn test_kind_scoping_separates_user_and_conversation() {
        let user = pseudonymize(EntityKind::User, "X1");
        let conv = pseudonymize(EntityKind::Conversation(ConversationType::Channel), "X1");
        // Same origin string, different scope: the hex parts must differ,
        // not just the marker.
        assert_ne!(user[1..], conv[1..]);
    }

    #[test]
    fn test_conversation_markers() {
        let dm = pseudonymize(EntityKind::Conversation(ConversationType::Dm), "D123");
        let ch = pseudonymize(EntityKind::Conversation(ConversationType::Channel), "general");
        assert!(dm.starts_with('D'));
        assert!(ch.starts_with('C'));
    }

    #[test]
    fn test_pseudonym_is_lowercase_hex() {
        let token = pseudonymize(EntityKind::User, "U999");
        assert!(token[1..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_map_resolves_only_known_users() {
        let link = IdentityLink {
            origin_id: "U1".to_string(),
            clarity_id: pseudonymize(EntityKind::User, "U1"),
            role: "Engineer".to_string(),
            team: "Core".to_string(),
            location: "Others".to_string(),
            employment_status: "Others".to_string(),
            employment_type: "Others".to_string(),
            tenure_band: "1-2yr".to_string(),
            timezone: "America/New_York".to_string(),
        };
        let map = PseudonymMap::from_links(std::slice::from_ref(&link));
        assert_eq!(map.user("U1"), Some(link.clarity_id.as_str()));
        assert_eq!(map.user("U2"), None);
        assert_eq!(map.len(), 1);
    }
}
