mod levy_definition;
mod rate_change;
mod wire;

pub use levy_definition::{
    LevyCategory, LevyDefinition, LevyStatus, NewLevyDefinition, RateState, RateTableAction,
    RateTableOutcome,
};
pub use rate_change::{
    DecisionAction, RateChangeOutcome, RateChangeRecord, RateChangeRequest, RateDecision,
};
pub use wire::{LevyRateRecord, RecordConversionError, category_for_levy_type};
