//! Table identifiers of the dividend chain.

use tablesync_common::QualifiedId;

pub const TRADING_GROUP: &str = "trading";
pub const SECURITIES_GROUP: &str = "securities";
pub const STATUS_GROUP: &str = "status";
pub const REESTRY_GROUP: &str = "reestry";

/// Published by the external scheduler when a trading day ends.
pub fn trading_day_id() -> QualifiedId {
    QualifiedId::new(TRADING_GROUP, "day")
}

pub fn securities_id() -> QualifiedId {
    QualifiedId::new(SECURITIES_GROUP, SECURITIES_GROUP)
}

pub fn status_id() -> QualifiedId {
    QualifiedId::new(STATUS_GROUP, STATUS_GROUP)
}

/// Dividends of one ticker as published by the registry closing site.
pub fn reestry_id(ticker: &str) -> QualifiedId {
    QualifiedId::new(REESTRY_GROUP, ticker)
}
