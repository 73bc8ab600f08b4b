//! Validated value types.

mod account;
mod record_id;

pub use account::AccountId;
pub use record_id::RecordId;
