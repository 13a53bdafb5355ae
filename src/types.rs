// Shared data model for the anonymization pipeline.
//
// Input shapes (RosterRecord, WorkspaceIdentity) are immutable once
// ingested. IdentityLink is created exactly once per run by the resolver
// and only the disclosure controller rewrites its attributes, before
// anything downstream reads them. Output shapes carry pseudonyms only;
// no struct that serializes into the export may hold an origin id.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One row of the HR roster, keyed by work email.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterRecord {
    pub email: String,
    pub role: Option<String>,
    pub team: Option<String>,
    pub location: Option<String>,
    pub employment_status: Option<String>,
    pub employment_type: Option<String>,
    pub hire_date: Option<String>,
    /// Columns we don't recognize travel along untouched; they never
    /// reach the export but downstream scrubbing may want them.
    pub passthrough: BTreeMap<String, String>,
}

/// One user record from the workspace export.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceIdentity {
    pub origin_id: String,
    pub email: Option<String>,
    pub timezone: Option<String>,
    pub is_bot: bool,
}

/// The resolved, authoritative record for one human: origin id plus the
/// disclosure-controlled attribute projection. The origin id never leaves
/// the process; only `clarity_id` is exported.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityLink {
    pub origin_id: String,
    pub clarity_id: String,
    pub role: String,
    pub team: String,
    pub location: String,
    pub employment_status: String,
    pub employment_type: String,
    pub tenure_band: String,
    pub timezone: String,
}

/// Origin ids of bot/system accounts. Disjoint from resolved humans;
/// nothing in this set gets a pseudonym or appears in the output.
#[derive(Debug, Clone, Default)]
pub struct BotSet {
    ids: HashSet<String>,
}

impl BotSet {
    pub fn insert(&mut self, origin_id: String) {
        self.ids.insert(origin_id);
    }

    pub fn contains(&self, origin_id: &str) -> bool {
        self.ids.contains(origin_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Output of the resolver: the whole identity picture for one run.
/// Passed downstream by shared reference, never mutated after the
/// disclosure controller finishes.
#[derive(Debug, Clone)]
pub struct ResolvedIdentities {
    pub links: Vec<IdentityLink>,
    pub bots: BotSet,
}

/// Exported user record. Everything here is either a pseudonym or a
/// k-anonymized category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymizedUser {
    pub clarity_id: String,
    pub role: String,
    pub team: String,
    pub location: String,
    pub employment_status: String,
    pub employment_type: String,
    pub tenure_band: String,
    pub timezone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    Dm,
    Channel,
}

/// One anonymized conversation. Optional source fields are omitted from
/// the serialized form when absent, never emitted as null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMeta {
    pub id: String,
    #[serde(rename = "type")]
    pub conversation_type: ConversationType,
    pub participants: Vec<String>,
    pub member_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
}

/// Edit marker on a message: who (pseudonym) and when (rounded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditedMark {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

/// One thread reply stub: author pseudonym + rounded timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub user: String,
    pub ts: String,
}

/// An anonymized reaction: the surviving author list and its length.
/// The reaction type/emoji is never carried over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub count: usize,
    pub users: Vec<String>,
}

/// One anonymized message. Free-text content is dropped at ingestion and
/// has no field here by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub conversation: String,
    pub date: String,
    pub user: String,
    pub ts: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited: Option<EditedMark>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_users_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_users: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<ReplyRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reactions: Option<Vec<Reaction>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_read: Option<String>,
}

impl Message {
    /// Bare message with only the four required fields set.
    pub fn new(conversation: &str, date: &str, user: &str, ts: &str) -> Self {
        Self {
            conversation: conversation.to_string(),
            date: date.to_string(),
            user: user.to_string(),
            ts: ts.to_string(),
            edited: None,
            thread_ts: None,
            latest_reply: None,
            reply_count: None,
            reply_users_count: None,
            reply_users: None,
            replies: None,
            reactions: None,
            last_read: None,
        }
    }
}

/// Two-level ordered map: conversation pseudonym -> date label -> messages
/// in source order. BTreeMap keeps serialization deterministic.
pub type MessageTree = BTreeMap<String, BTreeMap<String, Vec<Message>>>;

/// The sole externally visible artifact of the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymizedExport {
    pub users: Vec<AnonymizedUser>,
    pub conversations: Vec<ConversationMeta>,
    pub messages: MessageTree,
}

impl AnonymizedExport {
    pub fn message_count(&self) -> usize {
        self.messages
            .values()
            .flat_map(|dates| dates.values())
            .map(|msgs| msgs.len())
            .sum()
    }
}
