// Ingestion layer: roster CSV and workspace export tree.
//
// Both sources are fully materialized here before any transformation
// starts; the pipeline proper never touches the filesystem.

pub mod roster;
pub mod workspace;

pub use roster::{parse_roster, tenure_band};
pub use workspace::{load as load_workspace, WorkspaceExport};
