use async_trait::async_trait;
use thiserror::Error;

use crate::approval::ApprovalError;
use crate::models::{
    LevyDefinition, NewLevyDefinition, RateChangeRecord, RateChangeRequest, RateDecision,
    RateTableOutcome,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid record: {0}")]
    Invalid(String),

    #[error(transparent)]
    Workflow(#[from] ApprovalError),
}

/// The rate-configuration store.
///
/// Implementations must serialize rate-change transitions per levy: at most
/// one proposal may be pending for a levy, and a decision must apply to the
/// proposal it was made against.
#[async_trait]
pub trait LevyRepository: Send + Sync {
    // Levy definitions
    async fn list_levies(&self) -> Result<Vec<LevyDefinition>, RepositoryError>;
    async fn get_levy(&self, id: i64) -> Result<LevyDefinition, RepositoryError>;
    async fn create_levy(&self, levy: NewLevyDefinition) -> Result<LevyDefinition, RepositoryError>;

    /// Applies a whole rate table in one transaction, matching levies by name.
    ///
    /// New names are created active. For an existing levy the calculation
    /// order is updated in place, but a different rate is only submitted as a
    /// proposal by `submitted_by` and stays inactive until a checker decides
    /// it. A row that would change a levy's category fails the load with
    /// [`RepositoryError::Conflict`]. Any failure leaves the store untouched.
    async fn load_rate_table(
        &self,
        levies: &[NewLevyDefinition],
        submitted_by: &str,
    ) -> Result<Vec<RateTableOutcome>, RepositoryError>;

    async fn delete_levy(&self, id: i64) -> Result<(), RepositoryError>;

    // Maker/checker workflow
    async fn submit_rate_change(
        &self,
        request: &RateChangeRequest,
    ) -> Result<LevyDefinition, RepositoryError>;

    async fn decide_rate_change(
        &self,
        decision: &RateDecision,
    ) -> Result<LevyDefinition, RepositoryError>;

    async fn list_rate_changes(
        &self,
        levy_id: i64,
    ) -> Result<Vec<RateChangeRecord>, RepositoryError>;
}
