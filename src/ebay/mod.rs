pub mod auth;
pub mod config;
pub mod publisher;

pub use auth::{EbayAuthError, TokenPair, authorization_url, exchange_code};
pub use config::EbayEndpoints;
pub use publisher::{DraftInputs, DraftReceipt, EbayPublishError, Publisher};
