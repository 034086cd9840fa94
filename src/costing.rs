//! Cost defaults and unit-price resolution
//!
//! Defaults are typed once by the user as raw strings and reused across every
//! additional-item row, so they travel as an explicit value object rather
//! than ambient state. Resolution is lenient while the caller is still
//! editing and strict at save time.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::catalog::CostMaster;
use crate::error::QuoteError;
use crate::quote::AdditionalItemInput;

/// The manually-priced cost type: unit price is entered per row.
pub const FIXED: &str = "FIXED";
/// The ordinary man-day rate.
pub const MAN_DAYS: &str = "MAN_DAYS";
/// The stay surcharge rate. A stay day is priced at MAN_DAYS + STAY_MAN_DAYS,
/// re-derived on every resolution and never stored as its own default.
pub const STAY_MAN_DAYS: &str = "STAY_MAN_DAYS";

/// How strictly unresolved defaults are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolve {
    /// Live editing: missing or non-numeric values resolve to 0.
    Preview,
    /// Save time: missing or non-numeric values are errors.
    Strict,
}

/// User-entered default unit costs, keyed by cost code. Values are kept as
/// raw strings because the caller types them incrementally; parsing happens
/// at resolution time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CostDefaults {
    values: BTreeMap<String, String>,
}

impl CostDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, code: &str, raw: &str) {
        self.values.insert(code.to_owned(), raw.to_owned());
    }

    pub fn with(mut self, code: &str, raw: &str) -> Self {
        self.set(code, raw);
        self
    }

    pub fn raw(&self, code: &str) -> Option<&str> {
        self.values.get(code).map(String::as_str)
    }

    /// The value for `code`, if present and numeric.
    pub fn parsed(&self, code: &str) -> Option<Decimal> {
        self.raw(code).and_then(|raw| parse_decimal(raw))
    }

    /// Lenient lookup: absent or unparseable values come back as 0.
    pub fn numeric_or_zero(&self, code: &str) -> Decimal {
        self.parsed(code).unwrap_or(Decimal::ZERO)
    }

    /// Strict lookup for save paths.
    pub fn require(&self, code: &str) -> Result<Decimal, QuoteError> {
        self.parsed(code)
            .ok_or_else(|| QuoteError::UnresolvedDefault(code.to_owned()))
    }
}

/// Parse a user-entered numeric string. Surrounding whitespace is tolerated,
/// empty strings are not a number.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed).ok()
}

/// Resolve the effective unit price for one additional-item row.
///
/// FIXED rows carry their own price; STAY_MAN_DAYS is the one
/// cross-referencing rule (man-day rate plus stay surcharge); every other
/// code is a direct default lookup. Unknown codes fail in both modes.
pub fn resolve_unit_price(
    item: &AdditionalItemInput,
    defaults: &CostDefaults,
    master: &CostMaster,
    mode: Resolve,
) -> Result<Decimal, QuoteError> {
    let entry = master
        .entry(&item.code)
        .ok_or_else(|| QuoteError::InvalidCostCode(item.code.clone()))?;

    if entry.is_fixed() {
        // Per-row price, never taken from the defaults. A blank price is
        // tolerated here even at save time; the >0 requirement for
        // submission is the state machine's check.
        return Ok(parse_decimal(&item.unit_price).unwrap_or(Decimal::ZERO));
    }

    match mode {
        Resolve::Preview => {
            if item.code == STAY_MAN_DAYS {
                Ok(defaults.numeric_or_zero(MAN_DAYS) + defaults.numeric_or_zero(STAY_MAN_DAYS))
            } else {
                Ok(defaults.numeric_or_zero(&item.code))
            }
        }
        Resolve::Strict => {
            if item.code == STAY_MAN_DAYS {
                Ok(defaults.require(MAN_DAYS)? + defaults.require(STAY_MAN_DAYS)?)
            } else {
                defaults.require(&item.code)
            }
        }
    }
}
