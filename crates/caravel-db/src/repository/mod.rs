//! # Repository Implementations
//!
//! One repository per aggregate. The cross-aggregate protocols (dispatch,
//! checkout, reconciliation) compose the `pub(crate)` `*_on` helpers of
//! their collaborators into a single transaction.

pub mod catalog;
pub mod count;
pub mod ledger;
pub mod location;
pub mod sale;
pub mod stock;
pub mod transfer;
