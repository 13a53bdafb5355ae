// Pipeline configuration
//
// Plain value passed into the pipeline; no global state.

use serde::{Deserialize, Serialize};

/// Roster attributes eligible for k-anonymity suppression.
///
/// Timezone is carried on the identity record but is deliberately not
/// in this set: it is already coarse (a region label shared by whole
/// offices) and suppressing it would gut the data's analytical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuasiIdentifier {
    Role,
    Team,
    Location,
    EmploymentStatus,
    EmploymentType,
    TenureBand,
}

impl QuasiIdentifier {
    pub const ALL: [QuasiIdentifier; 6] = [
        QuasiIdentifier::Role,
        QuasiIdentifier::Team,
        QuasiIdentifier::Location,
        QuasiIdentifier::EmploymentStatus,
        QuasiIdentifier::EmploymentType,
        QuasiIdentifier::TenureBand,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuasiIdentifier::Role => "role",
            QuasiIdentifier::Team => "team",
            QuasiIdentifier::Location => "location",
            QuasiIdentifier::EmploymentStatus => "employment_status",
            QuasiIdentifier::EmploymentType => "employment_type",
            QuasiIdentifier::TenureBand => "tenure_band",
        }
    }
}

/// Knobs the core consumes. Everything else (paths, output packaging)
/// belongs to the CLI layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum group size for any released quasi-identifier value.
    pub k_threshold: usize,
    /// Which attributes get suppressed. Defaults to all of them.
    pub suppressed_attributes: Vec<QuasiIdentifier>,
    /// Timestamp coarsening granularity in seconds.
    pub rounding_granularity_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            k_threshold: 5,
            suppressed_attributes: QuasiIdentifier::ALL.to_vec(),
            rounding_granularity_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.k_threshold, 5);
        assert_eq!(config.rounding_granularity_secs, 60);
        assert_eq!(config.suppressed_attributes.len(), 6);
    }
}
