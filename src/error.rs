// Pipeline error taxonomy
//
// Fatal errors abort the run and discard any partially built output.
// Recoverable conditions (a corrupt date partition, a roster-only row)
// are not errors at all: they are logged and counted in the report.
//
// Error text is user-facing and must never contain filesystem paths or
// raw identifiers. The one sanctioned exception is a bounded sample of
// unmapped emails, which the operator needs in order to fix the roster.

use thiserror::Error;

/// Cap on how many offending emails a fatal resolution error may list.
pub const MAX_SAMPLE_EMAILS: usize = 5;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required source file is absent from the export (e.g. the users listing).
    #[error("required source missing from export: {0}")]
    MissingSource(&'static str),

    /// A required source file exists but cannot be parsed in any supported way.
    #[error("source could not be parsed: {0}")]
    InvalidSource(&'static str),

    /// The roster is structurally unusable (message names columns, never values).
    #[error("roster schema error: {0}")]
    RosterSchema(String),

    /// Non-bot workspace identities with no roster counterpart. The run
    /// refuses to continue: an incomplete roster would silently leak
    /// un-pseudonymized humans into the output.
    #[error("{count} workspace identity(ies) could not be matched to the roster (sample: {})",
            .samples.join(", "))]
    UnmappedIdentities { count: usize, samples: Vec<String> },

    /// Resolution finished with zero human identities.
    #[error("no human identities resolved; nothing to anonymize")]
    NoIdentities,

    /// The transform produced zero messages across the whole export.
    #[error("anonymized export contains zero messages; refusing to emit an empty artifact")]
    EmptyExport,

    /// IO failure while reading the export or writing the artifact.
    /// Wrapped without the path to keep error text free of local detail.
    #[error("io failure while {0}")]
    Io(&'static str, #[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
