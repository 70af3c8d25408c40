//! Data Transfer Objects for REST request/response serialization.
//!
//! Price and balance maps are serialized as objects keyed by upper-case
//! asset symbol.

pub mod common_dto;
pub mod ledger_dto;
pub mod rates_dto;
pub mod user_dto;

pub use common_dto::*;
pub use ledger_dto::*;
pub use rates_dto::*;
pub use user_dto::*;
