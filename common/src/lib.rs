//! RampPay Common Types
//!
//! Shared types used across the RampPay settlement service, including
//! identifiers, monetary types, the quote lifecycle and error definitions.

pub mod error;
pub mod identifiers;
pub mod monetary;
pub mod quote;
pub mod time;

pub use error::*;
pub use identifiers::*;
pub use monetary::*;
pub use quote::*;
pub use time::*;
