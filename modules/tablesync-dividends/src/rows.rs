use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tablesync_common::Row;

const FOREIGN_SUFFIX: &str = "-RM";

// --- Securities ---

/// A listed security as traded on the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    pub ticker: String,
    pub board: String,
    /// Tracked by the portfolio; only selected securities get dividend checks.
    pub selected: bool,
    pub lot: u32,
    pub instrument: String,
}

impl Security {
    /// Preferred shares carry a trailing `P` on a four-letter base (`SBERP`).
    pub fn is_preferred(&self) -> bool {
        self.ticker.len() == 5 && self.ticker.ends_with('P')
    }

    /// Foreign shares trade with a `-RM` suffix.
    pub fn is_foreign(&self) -> bool {
        self.ticker.ends_with(FOREIGN_SUFFIX)
    }

    /// Ticker of the common share the security belongs to.
    pub fn base_ticker(&self) -> &str {
        if self.is_foreign() {
            self.ticker.trim_end_matches(FOREIGN_SUFFIX)
        } else if self.is_preferred() {
            self.ticker.get(..4).unwrap_or(&self.ticker)
        } else {
            &self.ticker
        }
    }
}

impl Row for Security {
    type Key = String;

    fn sort_key(&self) -> String {
        self.ticker.clone()
    }
}

// --- Dividend status ---

/// An expected registry closing date for a ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivStatus {
    pub ticker: String,
    pub base_ticker: String,
    pub preferred: bool,
    pub foreign: bool,
    pub date: DateTime<Utc>,
}

impl DivStatus {
    pub fn for_security(security: &Security, date: DateTime<Utc>) -> Self {
        Self {
            ticker: security.ticker.clone(),
            base_ticker: security.base_ticker().to_string(),
            preferred: security.is_preferred(),
            foreign: security.is_foreign(),
            date,
        }
    }
}

impl Row for DivStatus {
    type Key = (String, DateTime<Utc>);

    fn sort_key(&self) -> Self::Key {
        (self.ticker.clone(), self.date)
    }
}

// --- Dividends ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Rur,
    Usd,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Rur => write!(f, "RUR"),
            Currency::Usd => write!(f, "USD"),
        }
    }
}

/// One dividend payment in its original currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyDiv {
    pub date: DateTime<Utc>,
    pub value: f64,
    pub currency: Currency,
}

impl Row for CurrencyDiv {
    type Key = DateTime<Utc>;

    fn sort_key(&self) -> DateTime<Utc> {
        self.date
    }
}
