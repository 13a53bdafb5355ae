// Disclosure control: k-anonymity suppression
//
// Each quasi-identifying attribute is processed independently: rare
// values collapse into the sentinel "Others", and if the Others bucket
// itself cannot reach k the whole attribute is wiped to the constant.
// A field that cannot reach k-anonymity via suppression alone must not
// be left partially identifying.

use std::collections::HashMap;

use log::info;

use crate::config::{PipelineConfig, QuasiIdentifier};
use crate::types::IdentityLink;

pub const OTHERS: &str = "Others";

fn field(link: &IdentityLink, attr: QuasiIdentifier) -> &str {
    match attr {
        QuasiIdentifier::Role => &link.role,
        QuasiIdentifier::Team => &link.team,
        QuasiIdentifier::Location => &link.location,
        QuasiIdentifier::EmploymentStatus => &link.employment_status,
        QuasiIdentifier::EmploymentType => &link.employment_type,
        QuasiIdentifier::TenureBand => &link.tenure_band,
    }
}

fn field_mut(link: &mut IdentityLink, attr: QuasiIdentifier) -> &mut String {
    match attr {
        QuasiIdentifier::Role => &mut link.role,
        QuasiIdentifier::Team => &mut link.team,
        QuasiIdentifier::Location => &mut link.location,
        QuasiIdentifier::EmploymentStatus => &mut link.employment_status,
        QuasiIdentifier::EmploymentType => &mut link.employment_type,
        QuasiIdentifier::TenureBand => &mut link.tenure_band,
    }
}

/// Apply suppression to every configured attribute, in place.
pub fn suppress(links: &mut [IdentityLink], config: &PipelineConfig) {
    for attr in &config.suppressed_attributes {
        let collapsed = suppress_attribute(links, *attr, config.k_threshold);
        if collapsed {
            info!("attribute {} collapsed wholesale to {}", attr.as_str(), OTHERS);
        }
    }
}

/// One attribute, one pass. Returns true when the attribute collapsed
/// wholesale.
fn suppress_attribute(links: &mut [IdentityLink], attr: QuasiIdentifier, k: usize) -> bool {
    // Missing and empty values are the Others category from the start.
    for link in links.iter_mut() {
        let value = field_mut(link, attr);
        if value.trim().is_empty() {
            *value = OTHERS.to_string();
        }
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for link in links.iter() {
        *counts.entry(field(link, attr)).or_insert(0) += 1;
    }
    let rare: Vec<String> = counts
        .iter()
        .filter(|&(&value, &count)| count < k && value != OTHERS)
        .map(|(value, _)| value.to_string())
        .collect();

    let mut others_count = counts.get(OTHERS).copied().unwrap_or(0);
    for link in links.iter_mut() {
        let value = field_mut(link, attr);
        if rare.iter().any(|r| r.as_str() == value.as_str()) {
            *value = OTHERS.to_string();
            others_count += 1;
        }
    }

    // A sub-threshold Others bucket still singles people out, so the
    // attribute as a whole goes dark.
    if others_count > 0 && others_count < k {
        for link in links.iter_mut() {
            *field_mut(link, attr) = OTHERS.to_string();
        }
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn link(team: &str, role: &str) -> IdentityLink {
        IdentityLink {
            origin_id: String::new(),
            clarity_id: String::new(),
            role: role.to_string(),
            team: team.to_string(),
            location: String::new(),
            employment_status: String::new(),
            employment_type: String::new(),
            tenure_band: String::new(),
            timezone: String::new(),
        }
    }

    fn teams(links: &[IdentityLink]) -> Vec<&str> {
        links.iter().map(|l| l.team.as_str()).collect()
    }

    #[test]
    fn test_sub_threshold_values_collapse() {
        // 3 Eng + 2 Sales with k=5: both rare, everyone lands in Others.
        let mut links: Vec<_> = (0..3)
            .map(|_| link("Eng", "X"))
            .chain((0..2).map(|_| link("Sales", "X")))
            .collect();
        suppress_attribute(&mut links, QuasiIdentifier::Team, 5);
        assert!(teams(&links).iter().all(|t| *t == OTHERS));
    }

    #[test]
    fn test_growing_group_still_below_k_collapses() {
        // 4 Eng + 2 Sales, k=5: both still rare.
        let mut links: Vec<_> = (0..4)
            .map(|_| link("Eng", "X"))
            .chain((0..2).map(|_| link("Sales", "X")))
            .collect();
        suppress_attribute(&mut links, QuasiIdentifier::Team, 5);
        assert!(teams(&links).iter().all(|t| *t == OTHERS));
    }

    #[test]
    fn test_values_meeting_k_survive() {
        let mut links: Vec<_> = (0..5)
            .map(|_| link("Eng", "X"))
            .chain((0..5).map(|_| link("Sales", "X")))
            .collect();
        suppress_attribute(&mut links, QuasiIdentifier::Team, 5);
        assert_eq!(teams(&links).iter().filter(|t| **t == "Eng").count(), 5);
        assert_eq!(teams(&links).iter().filter(|t| **t == "Sales").count(), 5);
    }

    #[test]
    fn test_sub_threshold_others_bucket_collapses_attribute_wholesale() {
        // 5 Eng survive on their own, but the single Sales member would
        // sit in an Others bucket of one. Everything goes to Others.
        let mut links: Vec<_> = (0..5)
            .map(|_| link("Eng", "X"))
            .chain(std::iter::once(link("Sales", "X")))
            .collect();
        let collapsed = suppress_attribute(&mut links, QuasiIdentifier::Team, 5);
        assert!(collapsed);
        assert!(teams(&links).iter().all(|t| *t == OTHERS));
    }

    #[test]
    fn test_empty_values_count_toward_others() {
        let mut links: Vec<_> = (0..5)
            .map(|_| link("Eng", "X"))
            .chain((0..5).map(|_| link("", "X")))
            .collect();
        suppress_attribute(&mut links, QuasiIdentifier::Team, 5);
        assert_eq!(teams(&links).iter().filter(|t| **t == "Eng").count(), 5);
        assert_eq!(teams(&links).iter().filter(|t| **t == OTHERS).count(), 5);
    }

    #[test]
    fn test_attributes_are_processed_independently() {
        // Team reaches k; role does not. Only role collapses.
        let mut links: Vec<_> = (0..5)
            .map(|i| link("Eng", if i == 0 { "Lead" } else { "IC" }))
            .collect();
        let config = PipelineConfig::default();
        suppress(&mut links, &config);
        assert!(links.iter().all(|l| l.team == "Eng"));
        assert!(links.iter().all(|l| l.role == OTHERS));
    }

    #[test]
    fn test_emitted_values_satisfy_k() {
        // Property check over a mixed population: every surviving value
        // must appear at least k times, except the collapsed constant.
        let mut links: Vec<_> = (0..7)
            .map(|_| link("Eng", "X"))
            .chain((0..5).map(|_| link("Sales", "X")))
            .chain((0..2).map(|_| link("Legal", "X")))
            .collect();
        let k = 5;
        suppress_attribute(&mut links, QuasiIdentifier::Team, k);
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for t in teams(&links) {
            *counts.entry(t).or_insert(0) += 1;
        }
        for (value, count) in counts {
            if value != OTHERS {
                assert!(count >= k, "value {value} appears only {count} times");
            }
        }
    }
}
