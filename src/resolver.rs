// Identity resolution
//
// Outer join of the HR roster against the workspace user listing on
// normalized email. The two sides fail differently on purpose:
// a workspace human the roster doesn't know is fatal (the output would
// otherwise contain someone we cannot pseudonymize or describe), while
// a roster row with no workspace account is just someone who never got
// a chat login, logged and excluded.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use log::{info, warn};

use crate::error::{PipelineError, Result, MAX_SAMPLE_EMAILS};
use crate::ingest::roster::tenure_band;
use crate::ingest::workspace::RawUser;
use crate::pseudonym::{pseudonymize, EntityKind};
use crate::types::{BotSet, IdentityLink, ResolvedIdentities, RosterRecord};

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Join roster and workspace users into the run's identity set.
/// `as_of` anchors tenure-band derivation so a rerun over the same
/// inputs reproduces the same links.
pub fn resolve(
    roster: &[RosterRecord],
    workspace_users: &[RawUser],
    as_of: NaiveDate,
) -> Result<ResolvedIdentities> {
    let mut by_email: HashMap<String, &RosterRecord> = HashMap::new();
    let mut duplicate_emails = 0usize;
    for record in roster {
        let key = normalize_email(&record.email);
        if by_email.insert(key, record).is_some() {
            duplicate_emails += 1;
        }
    }
    if duplicate_emails > 0 {
        warn!("roster contains {} duplicate email rows; later rows win", duplicate_emails);
    }

    let mut links = Vec::new();
    let mut bots = BotSet::default();
    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut matched_emails: HashSet<String> = HashSet::new();
    let mut unmapped: Vec<String> = Vec::new();

    for user in workspace_users {
        if !seen_ids.insert(user.id.as_str()) {
            continue;
        }
        if user.is_bot_account() {
            bots.insert(user.id.clone());
            continue;
        }

        let email = user.profile.email.clone();
        let record = email
            .as_deref()
            .map(normalize_email)
            .and_then(|key| by_email.get(key.as_str()).copied());

        let record = match record {
            Some(record) => record,
            None => {
                unmapped.push(email.unwrap_or_else(|| "(no email on record)".to_string()));
                continue;
            }
        };
        matched_emails.insert(normalize_email(&record.email));

        let attr = |value: &Option<String>| value.clone().unwrap_or_default();
        links.push(IdentityLink {
            origin_id: user.id.clone(),
            clarity_id: pseudonymize(EntityKind::User, &user.id),
            role: attr(&record.role),
            team: attr(&record.team),
            location: attr(&record.location),
            employment_status: attr(&record.employment_status),
            employment_type: attr(&record.employment_type),
            tenure_band: tenure_band(record.hire_date.as_deref(), as_of),
            timezone: user.tz.clone().unwrap_or_default(),
        });
    }

    if !unmapped.is_empty() {
        // Sorted so the sample is stable across runs; bounded so the
        // error text doesn't become a roster dump of its own.
        unmapped.sort();
        let count = unmapped.len();
        unmapped.truncate(MAX_SAMPLE_EMAILS);
        return Err(PipelineError::UnmappedIdentities { count, samples: unmapped });
    }

    let roster_only = roster
        .iter()
        .filter(|r| !matched_emails.contains(&normalize_email(&r.email)))
        .count();
    if roster_only > 0 {
        warn!(
            "{} roster rows have no workspace account and were excluded",
            roster_only
        );
    }

    if links.is_empty() {
        return Err(PipelineError::NoIdentities);
    }

    info!(
        "identity resolution complete: {} humans, {} bot/system accounts",
        links.len(),
        bots.len()
    );
    Ok(ResolvedIdentities { links, bots })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::workspace::{RawProfile, SYSTEM_ACCOUNT_ID};
    use std::collections::BTreeMap;

    fn roster_row(email: &str, team: &str) -> RosterRecord {
        RosterRecord {
            email: email.to_string(),
            role: Some("Engineer".to_string()),
            team: Some(team.to_string()),
            location: None,
            employment_status: None,
            employment_type: None,
            hire_date: Some("2021-06-01".to_string()),
            passthrough: BTreeMap::new(),
        }
    }

    fn human(id: &str, email: &str) -> RawUser {
        RawUser {
            id: id.to_string(),
            is_bot: false,
            tz: Some("America/New_York".to_string()),
            profile: RawProfile {
                email: Some(email.to_string()),
                bot_id: None,
            },
        }
    }

    fn bot(id: &str) -> RawUser {
        RawUser {
            id: id.to_string(),
            is_bot: true,
            tz: None,
            profile: RawProfile::default(),
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_resolves_matched_humans() {
        let roster = vec![roster_row("Alice@Corp.com", "Eng")];
        let users = vec![human("U1", "alice@corp.com"), bot("B1")];
        let resolved = resolve(&roster, &users, as_of()).unwrap();
        assert_eq!(resolved.links.len(), 1);
        let link = &resolved.links[0];
        assert_eq!(link.origin_id, "U1");
        assert!(link.clarity_id.starts_with('E'));
        assert_eq!(link.team, "Eng");
        assert_eq!(link.tenure_band, "2-5yr");
        assert!(resolved.bots.contains("B1"));
    }

    #[test]
    fn test_unmapped_human_aborts_with_sample() {
        let roster = vec![roster_row("alice@corp.com", "Eng")];
        let users = vec![human("U1", "alice@corp.com"), human("U2", "stranger@corp.com")];
        let err = resolve(&roster, &users, as_of()).unwrap_err();
        match err {
            PipelineError::UnmappedIdentities { count, samples } => {
                assert_eq!(count, 1);
                assert_eq!(samples, vec!["stranger@corp.com".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unmapped_sample_is_bounded_and_sorted() {
        let roster = vec![roster_row("alice@corp.com", "Eng")];
        let users: Vec<RawUser> = (0..8)
            .map(|i| human(&format!("U{i}"), &format!("u{i}@corp.com")))
            .collect();
        let err = resolve(&roster, &users, as_of()).unwrap_err();
        match err {
            PipelineError::UnmappedIdentities { count, samples } => {
                assert_eq!(count, 8);
                assert_eq!(samples.len(), MAX_SAMPLE_EMAILS);
                let mut sorted = samples.clone();
                sorted.sort();
                assert_eq!(samples, sorted);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_roster_only_rows_are_soft_excluded() {
        let roster = vec![
            roster_row("alice@corp.com", "Eng"),
            roster_row("ghost@corp.com", "Sales"),
        ];
        let users = vec![human("U1", "alice@corp.com")];
        let resolved = resolve(&roster, &users, as_of()).unwrap();
        assert_eq!(resolved.links.len(), 1);
    }

    #[test]
    fn test_bots_bypass_roster_matching() {
        let roster = vec![roster_row("alice@corp.com", "Eng")];
        let mut system = bot(SYSTEM_ACCOUNT_ID);
        system.is_bot = false;
        let users = vec![human("U1", "alice@corp.com"), bot("B1"), system];
        let resolved = resolve(&roster, &users, as_of()).unwrap();
        assert_eq!(resolved.bots.len(), 2);
        assert!(resolved.bots.contains(SYSTEM_ACCOUNT_ID));
        // Bots never receive links.
        assert!(resolved.links.iter().all(|l| !resolved.bots.contains(&l.origin_id)));
    }

    #[test]
    fn test_zero_humans_is_fatal() {
        let roster = vec![roster_row("alice@corp.com", "Eng")];
        let users = vec![bot("B1")];
        let err = resolve(&roster, &users, as_of()).unwrap_err();
        assert!(matches!(err, PipelineError::NoIdentities));
    }

    #[test]
    fn test_determinism_across_runs() {
        let roster = vec![roster_row("alice@corp.com", "Eng")];
        let users = vec![human("U1", "alice@corp.com")];
        let first = resolve(&roster, &users, as_of()).unwrap();
        let second = resolve(&roster, &users, as_of()).unwrap();
        assert_eq!(first.links, second.links);
    }
}
