// Clarity anonymizer: re-identify then de-identify a workplace chat export.
//
// Phase order is load-bearing: resolution must complete (and fail fast)
// before pseudonyms exist, suppression must finish before anything reads
// attributes, and the transformer consumes the frozen identity map
// read-only. A fatal error at any phase discards everything built so far.

pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod kanon;
pub mod pseudonym;
pub mod resolver;
pub mod scrub;
pub mod transform;
pub mod types;

pub use config::{PipelineConfig, QuasiIdentifier};
pub use error::{PipelineError, Result};
pub use transform::TransformReport;
pub use types::AnonymizedExport;

use chrono::NaiveDate;
use log::info;

use crate::ingest::workspace::WorkspaceExport;
use crate::pseudonym::PseudonymMap;
use crate::types::RosterRecord;

/// Run the core pipeline over fully materialized inputs.
///
/// `as_of` anchors tenure-band derivation; pass the same date to
/// reproduce a previous run byte for byte.
pub fn anonymize(
    roster: &[RosterRecord],
    export: &WorkspaceExport,
    config: &PipelineConfig,
    as_of: NaiveDate,
) -> Result<(AnonymizedExport, TransformReport)> {
    let mut identities = resolver::resolve(roster, &export.users, as_of)?;
    kanon::suppress(&mut identities.links, config);
    let identities = identities;

    let map = PseudonymMap::from_links(&identities.links);
    info!("pseudonym map built for {} identities", map.len());

    transform::transform(export, &identities, &map, config)
}
