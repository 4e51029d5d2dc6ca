//! Rule assembly for the dividend chain.
//!
//! Each constructor fixes the selector, validator and commit policy of one
//! link; the caller supplies storage, the gateway and the context factory.

use std::sync::Arc;

use tablesync_engine::{ContextFactory, Gateway, Repository, Rule, UniqueKeys};

use crate::ids::{securities_id, status_id, trading_day_id};
use crate::rows::{CurrencyDiv, DivStatus, Security};
use crate::selectors::{StatusSelector, TriggerSelector};
use crate::validators::validate_dividends;

/// Refreshes the securities list after every trading day.
pub fn securities_rule(
    repository: Arc<dyn Repository<Security>>,
    gateway: impl Gateway<Security> + 'static,
    context_factory: ContextFactory,
) -> Rule<Security> {
    Rule::new(
        "SecuritiesRule",
        repository,
        TriggerSelector::new(trading_day_id(), vec![securities_id()]),
        gateway,
        UniqueKeys,
        false,
        context_factory,
    )
}

/// Reloads expected dividend dates whenever the securities list changes.
pub fn status_rule(
    repository: Arc<dyn Repository<DivStatus>>,
    gateway: impl Gateway<DivStatus> + 'static,
    context_factory: ContextFactory,
) -> Rule<DivStatus> {
    Rule::new(
        "DivStatusRule",
        repository,
        TriggerSelector::new(securities_id(), vec![status_id()]),
        gateway,
        UniqueKeys,
        false,
        context_factory,
    )
}

/// Re-checks registry dividends for every ticker with an expected date.
pub fn reestry_rule(
    repository: Arc<dyn Repository<CurrencyDiv>>,
    status: Arc<dyn Repository<DivStatus>>,
    gateway: impl Gateway<CurrencyDiv> + 'static,
    context_factory: ContextFactory,
) -> Rule<CurrencyDiv> {
    Rule::new(
        "CheckCloseReestryDivRule",
        repository,
        StatusSelector::new(status),
        gateway,
        validate_dividends,
        false,
        context_factory,
    )
}
