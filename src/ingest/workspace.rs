// Workspace export ingestion
//
// Reads a Slack-style export, either an unpacked directory tree or a
// .zip archive: a users listing and a channels listing at the root,
// optional groups/dms/mpims listings, and one folder per conversation
// holding date-labeled message-batch files.
//
// Raw shapes deserialize with serde defaults and ignore unknown keys;
// message text is not even deserialized, so free-text content is gone
// the moment a partition is parsed. A partition that fails to parse is
// carried forward as Skipped so the transformer can count it without
// the run dying.

use std::fs;
use std::io::{Read, Seek};
use std::path::Path;

use log::{info, warn};
use serde::Deserialize;
use walkdir::WalkDir;

use crate::error::{PipelineError, Result};

/// The literal system-broadcast account present in every workspace.
pub const SYSTEM_ACCOUNT_ID: &str = "USLACKBOT";

const USERS_FILE: &str = "users.json";
const CHANNELS_FILE: &str = "channels.json";
const OPTIONAL_LISTINGS: [&str; 3] = ["groups.json", "dms.json", "mpims.json"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProfile {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    pub id: String,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub tz: Option<String>,
    #[serde(default)]
    pub profile: RawProfile,
}

impl RawUser {
    /// Bot classification: explicit flag, a bot-account marker on the
    /// profile, or the hardwired system account.
    pub fn is_bot_account(&self) -> bool {
        self.is_bot || self.profile.bot_id.is_some() || self.id == SYSTEM_ACCOUNT_ID
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawConversation {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created: Option<u64>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub is_archived: Option<bool>,
    #[serde(default)]
    pub is_im: bool,
    #[serde(default)]
    pub is_mpim: bool,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEdited {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawReplyRef {
    pub user: String,
    pub ts: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawReaction {
    #[serde(default)]
    pub users: Vec<String>,
}

/// One raw message. Note the absence of any `text` field: the body is
/// never materialized.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub edited: Option<RawEdited>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub latest_reply: Option<String>,
    #[serde(default)]
    pub reply_count: Option<u64>,
    #[serde(default)]
    pub reply_users_count: Option<u64>,
    #[serde(default)]
    pub reply_users: Option<Vec<String>>,
    #[serde(default)]
    pub replies: Option<Vec<RawReplyRef>>,
    #[serde(default)]
    pub reactions: Option<Vec<RawReaction>>,
    #[serde(default)]
    pub last_read: Option<String>,
}

/// Per-(conversation folder, date) unit result. Skipped partitions keep
/// a coarse reason; never the path.
#[derive(Debug, Clone)]
pub enum PartitionData {
    Parsed(Vec<RawMessage>),
    Skipped(&'static str),
}

#[derive(Debug, Clone)]
pub struct MessagePartition {
    /// Conversation folder name as it appears in the export.
    pub folder: String,
    /// Date label taken from the file stem, e.g. "2024-01-15".
    pub date: String,
    pub data: PartitionData,
}

/// Fully materialized workspace export, ready for the pipeline.
#[derive(Debug, Clone)]
pub struct WorkspaceExport {
    pub users: Vec<RawUser>,
    pub conversations: Vec<RawConversation>,
    pub partitions: Vec<MessagePartition>,
}

// Folder names are channel names and count as raw identifiers, so the
// warning carries the date label only.
fn parse_partition(bytes: &[u8], date: &str) -> PartitionData {
    match serde_json::from_slice::<Vec<RawMessage>>(bytes) {
        Ok(messages) => PartitionData::Parsed(messages),
        Err(_) => {
            warn!("skipping unparseable message batch dated {}", date);
            PartitionData::Skipped("unparseable message batch")
        }
    }
}

fn parse_conversations(bytes: &[u8]) -> Option<Vec<RawConversation>> {
    serde_json::from_slice(bytes).ok()
}

/// Load an export from an unpacked directory tree.
pub fn load_from_dir(root: &Path) -> Result<WorkspaceExport> {
    let users_bytes = fs::read(root.join(USERS_FILE))
        .map_err(|_| PipelineError::MissingSource("users listing"))?;
    let users: Vec<RawUser> = serde_json::from_slice(&users_bytes)
        .map_err(|_| PipelineError::InvalidSource("users listing"))?;

    let channels_bytes = fs::read(root.join(CHANNELS_FILE))
        .map_err(|_| PipelineError::MissingSource("channels listing"))?;
    let mut conversations: Vec<RawConversation> = serde_json::from_slice(&channels_bytes)
        .map_err(|_| PipelineError::InvalidSource("channels listing"))?;

    for listing in OPTIONAL_LISTINGS {
        if let Ok(bytes) = fs::read(root.join(listing)) {
            match parse_conversations(&bytes) {
                Some(more) => conversations.extend(more),
                None => warn!("skipping unparseable optional listing"),
            }
        }
    }

    // Partition files live exactly one folder deep; sorted traversal
    // keeps partition order stable across filesystems.
    let mut partitions = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }
        let folder = match path.parent().and_then(|p| p.file_name()) {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };
        let date = match path.file_stem() {
            Some(stem) => stem.to_string_lossy().to_string(),
            None => continue,
        };
        let data = match fs::read(path) {
            Ok(bytes) => parse_partition(&bytes, &date),
            Err(_) => PartitionData::Skipped("unreadable message batch"),
        };
        partitions.push(MessagePartition { folder, date, data });
    }

    info!(
        "workspace export loaded: {} users, {} conversations, {} partitions",
        users.len(),
        conversations.len(),
        partitions.len()
    );
    Ok(WorkspaceExport { users, conversations, partitions })
}

/// Load an export from a .zip archive.
pub fn load_from_zip<R: Read + Seek>(reader: R) -> Result<WorkspaceExport> {
    let mut archive = zip::ZipArchive::new(reader)
        .map_err(|_| PipelineError::InvalidSource("export archive"))?;

    let mut users: Option<Vec<RawUser>> = None;
    let mut channels: Option<Vec<RawConversation>> = None;
    let mut extra_conversations: Vec<RawConversation> = Vec::new();
    let mut partitions = Vec::new();

    // Entry names sorted first so partition order is stable regardless of
    // how the archive was written.
    let mut names: Vec<String> = (0..archive.len())
        .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_string()))
        .collect();
    names.sort();

    for name in names {
        if name.ends_with('/') {
            continue;
        }
        let mut bytes = Vec::new();
        {
            let mut file = match archive.by_name(&name) {
                Ok(file) => file,
                Err(_) => continue,
            };
            if file.read_to_end(&mut bytes).is_err() {
                continue;
            }
        }

        match name.as_str() {
            USERS_FILE => {
                users = Some(
                    serde_json::from_slice(&bytes)
                        .map_err(|_| PipelineError::InvalidSource("users listing"))?,
                );
            }
            CHANNELS_FILE => {
                channels = Some(
                    serde_json::from_slice(&bytes)
                        .map_err(|_| PipelineError::InvalidSource("channels listing"))?,
                );
            }
            listing if OPTIONAL_LISTINGS.contains(&listing) => {
                match parse_conversations(&bytes) {
                    Some(more) => extra_conversations.extend(more),
                    None => warn!("skipping unparseable optional listing"),
                }
            }
            nested => {
                let (folder, file_name) = match nested.split_once('/') {
                    Some(parts) => parts,
                    None => continue,
                };
                let date = match file_name.strip_suffix(".json") {
                    Some(stem) => stem,
                    None => continue,
                };
                let data = parse_partition(&bytes, date);
                partitions.push(MessagePartition {
                    folder: folder.to_string(),
                    date: date.to_string(),
                    data,
                });
            }
        }
    }

    let users = users.ok_or(PipelineError::MissingSource("users listing"))?;
    let mut conversations = channels.ok_or(PipelineError::MissingSource("channels listing"))?;
    conversations.extend(extra_conversations);

    info!(
        "workspace export loaded: {} users, {} conversations, {} partitions",
        users.len(),
        conversations.len(),
        partitions.len()
    );
    Ok(WorkspaceExport { users, conversations, partitions })
}

/// Dispatch on path shape: a .zip file or an unpacked directory.
pub fn load(path: &Path) -> Result<WorkspaceExport> {
    if path.is_dir() {
        load_from_dir(path)
    } else {
        let file = fs::File::open(path)
            .map_err(|e| PipelineError::Io("opening the export archive", e))?;
        load_from_zip(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;

    fn build_zip(entries: &[(&str, &str)]) -> Cursor<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options: FileOptions = FileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);
            for (name, body) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(body.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.set_position(0);
        cursor
    }

    const USERS: &str = r#"[
        {"id":"U1","tz":"America/New_York","profile":{"email":"alice@corp.com"}},
        {"id":"B1","profile":{"bot_id":"BOT"}}
    ]"#;
    const CHANNELS: &str = r#"[
        {"id":"C1","name":"general","creator":"U1","created":1700000000,"members":["U1","B1"]}
    ]"#;

    #[test]
    fn test_zip_roundtrip() {
        let zip = build_zip(&[
            ("users.json", USERS),
            ("channels.json", CHANNELS),
            ("general/2024-01-15.json", r#"[{"user":"U1","ts":"1700000090.000200"}]"#),
        ]);
        let export = load_from_zip(zip).unwrap();
        assert_eq!(export.users.len(), 2);
        assert_eq!(export.conversations.len(), 1);
        assert_eq!(export.partitions.len(), 1);
        let part = &export.partitions[0];
        assert_eq!(part.folder, "general");
        assert_eq!(part.date, "2024-01-15");
        assert!(matches!(part.data, PartitionData::Parsed(ref msgs) if msgs.len() == 1));
    }

    #[test]
    fn test_missing_users_listing_is_fatal() {
        let zip = build_zip(&[("channels.json", CHANNELS)]);
        let err = load_from_zip(zip).unwrap_err();
        assert!(matches!(err, PipelineError::MissingSource("users listing")));
    }

    #[test]
    fn test_corrupt_partition_is_skipped_not_fatal() {
        let zip = build_zip(&[
            ("users.json", USERS),
            ("channels.json", CHANNELS),
            ("general/2024-01-15.json", "{ not valid json"),
        ]);
        let export = load_from_zip(zip).unwrap();
        assert!(matches!(
            export.partitions[0].data,
            PartitionData::Skipped("unparseable message batch")
        ));
    }

    #[test]
    fn test_bot_classification() {
        let zip = build_zip(&[("users.json", USERS), ("channels.json", CHANNELS)]);
        let export = load_from_zip(zip).unwrap();
        assert!(!export.users[0].is_bot_account());
        assert!(export.users[1].is_bot_account());
        let system = RawUser {
            id: SYSTEM_ACCOUNT_ID.to_string(),
            is_bot: false,
            tz: None,
            profile: RawProfile::default(),
        };
        assert!(system.is_bot_account());
    }

    #[test]
    fn test_optional_listings_merge() {
        let zip = build_zip(&[
            ("users.json", USERS),
            ("channels.json", CHANNELS),
            ("dms.json", r#"[{"id":"D1","is_im":true,"members":["U1","U2"]}]"#),
        ]);
        let export = load_from_zip(zip).unwrap();
        assert_eq!(export.conversations.len(), 2);
        assert!(export.conversations.iter().any(|c| c.is_im));
    }

    #[test]
    fn test_message_body_never_materialized() {
        let raw: RawMessage = serde_json::from_str(
            r#"{"user":"U1","ts":"1700000000.0","text":"extremely secret"}"#,
        )
        .unwrap();
        // The text key is dropped at deserialization; the struct has no
        // field that could hold it.
        assert_eq!(raw.user.as_deref(), Some("U1"));
    }
}
