//! Event-driven table update engine.
//!
//! A [`Rule`] reads events, asks its [`Selector`] which tables are affected,
//! then for each one loads the stored table, fetches fresh rows through a
//! [`Gateway`], checks them with a [`Validator`] and commits through the
//! [`Repository`]. Every outcome other than "nothing new" leaves the rule as
//! an event, so rules chain into a graph. The [`Bus`] wires that graph.

pub mod bus;
pub mod context;
pub mod persist;
pub mod rule;
pub mod traits;
pub mod validators;

pub use bus::{Bus, BusHandle};
pub use context::{timeout_factory, ContextFactory, EventContext};
pub use persist::MemoryRepository;
pub use rule::Rule;
pub use traits::{Gateway, Repository, Selector, Validator};
pub use validators::{AppendContinuity, UniqueKeys};
