//! Dividend tables kept in sync by engine rules.
//!
//! The chain is `trading day -> securities -> status -> reestry/<ticker>`:
//! a new trading day refreshes the securities list, a new securities list
//! refreshes the expected dividend dates, and every ticker with an expected
//! date gets its dividend history re-checked. Gateways are supplied by the
//! caller.

pub mod fixture;
pub mod ids;
pub mod replay;
pub mod rows;
pub mod rules;
pub mod selectors;
pub mod validators;

pub use rows::{Currency, CurrencyDiv, DivStatus, Security};
pub use rules::{reestry_rule, securities_rule, status_rule};
pub use selectors::{StatusSelector, TriggerSelector};
