// Graph transformation
//
// Walks conversations and their date-partitioned message batches and
// rewrites every embedded identity through the pseudonym map. Reads the
// identity set and pseudonym map by shared reference only; by the time
// this runs they are frozen.
//
// Drop policy (silent, by design, not errors): bot and system traffic,
// sub-references whose author cannot be resolved, and conversations
// with no human members. Placeholders are never emitted in their stead.

use std::collections::{BTreeMap, HashMap};

use log::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::ingest::workspace::{
    MessagePartition, PartitionData, RawConversation, RawMessage, WorkspaceExport,
};
use crate::pseudonym::{pseudonymize, EntityKind, PseudonymMap};
use crate::types::{
    AnonymizedExport, AnonymizedUser, ConversationMeta, ConversationType, EditedMark, Message,
    MessageTree, Reaction, ReplyRef, ResolvedIdentities,
};

/// A direct message is small by definition; anything larger that isn't
/// explicitly flagged as an im/mpim is a channel.
const DM_MEMBER_CEILING: usize = 3;

/// Aggregated per-unit outcomes for one transform run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformReport {
    pub partitions_processed: usize,
    pub partitions_skipped: usize,
    pub messages_emitted: usize,
    pub messages_dropped: usize,
    pub conversations_discarded: usize,
}

/// Round an epoch-seconds timestamp string down to the configured
/// granularity. The fractional part is discarded entirely: sub-minute
/// timing is a correlation channel, not data. Returns None when the
/// string isn't a timestamp at all.
pub fn round_ts(raw: &str, granularity_secs: u64) -> Option<String> {
    let granularity = granularity_secs.max(1);
    let whole = raw.split('.').next().unwrap_or(raw);
    let seconds: u64 = whole.trim().parse().ok()?;
    Some((seconds - seconds % granularity).to_string())
}

fn classify(conv: &RawConversation, human_count: usize) -> ConversationType {
    if conv.is_im || conv.is_mpim || human_count <= DM_MEMBER_CEILING {
        ConversationType::Dm
    } else {
        ConversationType::Channel
    }
}

/// Pseudonymize a member list, dropping bots and unknowns, deduplicating
/// while preserving source order.
fn human_members(members: &[String], map: &PseudonymMap) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for member in members {
        if let Some(pseudonym) = map.user(member) {
            if !out.iter().any(|existing| existing == pseudonym) {
                out.push(pseudonym.to_string());
            }
        }
    }
    out
}

fn project_conversation(
    conv: &RawConversation,
    map: &PseudonymMap,
    config: &PipelineConfig,
) -> Option<ConversationMeta> {
    let participants = human_members(&conv.members, map);
    if participants.is_empty() {
        return None;
    }
    let conversation_type = classify(conv, participants.len());
    let member_count = participants.len();
    Some(ConversationMeta {
        id: pseudonymize(EntityKind::Conversation(conversation_type), &conv.id),
        conversation_type,
        member_count,
        participants,
        creator: conv.creator.as_deref().and_then(|c| map.user(c)).map(String::from),
        created: conv
            .created
            .and_then(|ts| round_ts(&ts.to_string(), config.rounding_granularity_secs)),
        is_archived: conv.is_archived,
    })
}

/// Project one raw message. None means the message is dropped whole
/// (bot/system/unresolvable actor, or no usable timestamp).
fn project_message(
    raw: &RawMessage,
    conversation_id: &str,
    date: &str,
    identities: &ResolvedIdentities,
    map: &PseudonymMap,
    granularity: u64,
) -> Option<Message> {
    if raw.bot_id.is_some() {
        return None;
    }
    let actor = raw.user.as_deref()?;
    if identities.bots.contains(actor) {
        return None;
    }
    let user = map.user(actor)?;
    let ts = round_ts(raw.ts.as_deref()?, granularity)?;

    let round = |value: &Option<String>| -> Option<String> {
        value.as_deref().and_then(|v| round_ts(v, granularity))
    };
    let resolve = |id: &str| -> Option<String> { map.user(id).map(String::from) };

    let mut msg = Message::new(conversation_id, date, user, &ts);

    if let Some(edited) = &raw.edited {
        let mark = EditedMark {
            user: edited.user.as_deref().and_then(resolve),
            ts: round(&edited.ts),
        };
        if mark.user.is_some() || mark.ts.is_some() {
            msg.edited = Some(mark);
        }
    }

    msg.thread_ts = round(&raw.thread_ts);
    msg.latest_reply = round(&raw.latest_reply);
    msg.last_read = round(&raw.last_read);
    msg.reply_count = raw.reply_count;
    msg.reply_users_count = raw.reply_users_count;

    if let Some(reply_users) = &raw.reply_users {
        let resolved: Vec<String> = reply_users.iter().filter_map(|u| resolve(u)).collect();
        if !resolved.is_empty() {
            msg.reply_users = Some(resolved);
        }
    }

    if let Some(replies) = &raw.replies {
        let resolved: Vec<ReplyRef> = replies
            .iter()
            .filter_map(|reply| {
                let user = resolve(&reply.user)?;
                let ts = round_ts(&reply.ts, granularity)?;
                Some(ReplyRef { user, ts })
            })
            .collect();
        if !resolved.is_empty() {
            msg.replies = Some(resolved);
        }
    }

    if let Some(reactions) = &raw.reactions {
        // Only the anonymized author list survives; the count is
        // recomputed from it, never copied from the source.
        let resolved: Vec<Reaction> = reactions
            .iter()
            .filter_map(|reaction| {
                let users: Vec<String> =
                    reaction.users.iter().filter_map(|u| resolve(u)).collect();
                if users.is_empty() {
                    return None;
                }
                Some(Reaction { count: users.len(), users })
            })
            .collect();
        if !resolved.is_empty() {
            msg.reactions = Some(resolved);
        }
    }

    Some(msg)
}

/// Run the full graph rewrite.
pub fn transform(
    export: &WorkspaceExport,
    identities: &ResolvedIdentities,
    map: &PseudonymMap,
    config: &PipelineConfig,
) -> Result<(AnonymizedExport, TransformReport)> {
    let mut report = TransformReport::default();
    let granularity = config.rounding_granularity_secs;

    let mut users: Vec<AnonymizedUser> = identities
        .links
        .iter()
        .map(|link| AnonymizedUser {
            clarity_id: link.clarity_id.clone(),
            role: link.role.clone(),
            team: link.team.clone(),
            location: link.location.clone(),
            employment_status: link.employment_status.clone(),
            employment_type: link.employment_type.clone(),
            tenure_band: link.tenure_band.clone(),
            timezone: link.timezone.clone(),
        })
        .collect();
    users.sort_by(|a, b| a.clarity_id.cmp(&b.clarity_id));

    // Conversation projections, addressable by source name and id so
    // folders can be matched back to their listing entry.
    let mut projected: HashMap<&str, Option<ConversationMeta>> = HashMap::new();
    let mut by_name: HashMap<&str, &str> = HashMap::new();
    let mut conversations: Vec<ConversationMeta> = Vec::new();

    for conv in &export.conversations {
        if projected.contains_key(conv.id.as_str()) {
            continue;
        }
        let projection = project_conversation(conv, map, config);
        match &projection {
            Some(p) => conversations.push(p.clone()),
            None => report.conversations_discarded += 1,
        }
        if let Some(name) = conv.name.as_deref() {
            by_name.entry(name).or_insert(conv.id.as_str());
        }
        projected.insert(conv.id.as_str(), projection);
    }
    conversations.sort_by(|a, b| a.id.cmp(&b.id));

    // Group partitions by folder, preserving date order within each.
    let mut by_folder: BTreeMap<&str, Vec<&MessagePartition>> = BTreeMap::new();
    for partition in &export.partitions {
        by_folder.entry(partition.folder.as_str()).or_default().push(partition);
    }

    let mut messages: MessageTree = BTreeMap::new();
    let mut orphan_folders = 0usize;

    for (folder, partitions) in by_folder {
        let conv_id = by_name
            .get(folder)
            .copied()
            .or_else(|| projected.contains_key(folder).then_some(folder));

        let target = match conv_id {
            Some(id) => projected.get(id).and_then(|p| p.as_ref()),
            None => {
                // Folder without a listing entry. The listing is the
                // membership authority; without it we cannot classify or
                // emit the conversation, so its batches are dropped.
                orphan_folders += 1;
                None
            }
        };

        for partition in partitions {
            let batch = match &partition.data {
                PartitionData::Parsed(batch) => batch,
                PartitionData::Skipped(_) => {
                    report.partitions_skipped += 1;
                    continue;
                }
            };
            report.partitions_processed += 1;

            let target = match target {
                Some(target) => target,
                None => {
                    report.messages_dropped += batch.len();
                    continue;
                }
            };

            for raw in batch {
                match project_message(
                    raw,
                    &target.id,
                    &partition.date,
                    identities,
                    map,
                    granularity,
                ) {
                    Some(msg) => {
                        messages
                            .entry(target.id.clone())
                            .or_default()
                            .entry(partition.date.clone())
                            .or_default()
                            .push(msg);
                        report.messages_emitted += 1;
                    }
                    None => report.messages_dropped += 1,
                }
            }
        }
    }

    if orphan_folders > 0 {
        warn!("{} conversation folders had no listing entry; their batches were dropped", orphan_folders);
    }

    if report.messages_emitted == 0 {
        return Err(PipelineError::EmptyExport);
    }

    info!(
        "transform complete: {} messages emitted, {} dropped, {} partitions skipped, {} conversations discarded",
        report.messages_emitted,
        report.messages_dropped,
        report.partitions_skipped,
        report.conversations_discarded
    );

    Ok((
        AnonymizedExport { users, conversations, messages },
        report,
    ))
}
