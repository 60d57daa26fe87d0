pub mod approval;
pub mod calculations;
pub mod currency;
pub mod db;
pub mod models;

pub use approval::ApprovalError;
pub use calculations::{
    ConfigurationError, InvalidInputError, LevyCascadeCalculator, LevyCascadeError,
    LevyCascadeResult, LevyLine, compute_levy_cascade,
};
pub use db::repository::{LevyRepository, RepositoryError};
pub use models::*;
