//! CSV ingestion: levy rate tables and PSP sales feeds.

mod decimal;
mod loader;
mod sales;

pub use loader::{LevyRateCsvRecord, LevyRateLoader, LevyRateLoaderError};
pub use sales::{MerchantLiability, SalesFeed, SalesFeedError, SalesRecord, assess_liabilities};
