//! Read-only catalog data consumed by the engine
//!
//! Companies, products and the additional-cost master list are maintained
//! elsewhere; the engine only ever looks them up. `Catalog` is a plain
//! in-memory snapshot handed in by the caller.

use rust_decimal::Decimal;

use crate::costing::{FIXED, MAN_DAYS, STAY_MAN_DAYS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Non-negative base price, quoted at quantity 1 on every saved version.
    pub base_price: Decimal,
}

/// How a cost-master entry is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pricing {
    /// Unit price entered per row by the user (the FIXED code).
    Fixed,
    /// Unit price resolved from the cost defaults (possibly cross-referenced).
    Derived,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostMasterEntry {
    pub code: String,
    pub label: String,
    pub pricing: Pricing,
}

impl CostMasterEntry {
    pub fn is_fixed(&self) -> bool {
        self.pricing == Pricing::Fixed
    }
}

/// The additional-cost master list.
#[derive(Debug, Clone, Default)]
pub struct CostMaster {
    entries: Vec<CostMasterEntry>,
}

impl CostMaster {
    pub fn new(entries: Vec<CostMasterEntry>) -> Self {
        Self { entries }
    }

    /// The master list the product ships with: one manually-priced type and
    /// the two man-day rates.
    pub fn standard() -> Self {
        Self::new(vec![
            CostMasterEntry {
                code: FIXED.into(),
                label: "Fixed cost".into(),
                pricing: Pricing::Fixed,
            },
            CostMasterEntry {
                code: MAN_DAYS.into(),
                label: "Man days".into(),
                pricing: Pricing::Derived,
            },
            CostMasterEntry {
                code: STAY_MAN_DAYS.into(),
                label: "Stay man days".into(),
                pricing: Pricing::Derived,
            },
        ])
    }

    pub fn entries(&self) -> &[CostMasterEntry] {
        &self.entries
    }

    pub fn entry(&self, code: &str) -> Option<&CostMasterEntry> {
        self.entries.iter().find(|e| e.code == code)
    }

    /// Codes whose default must be set before any additional item can be
    /// priced (everything except the per-row FIXED type).
    pub fn required_default_codes(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.is_fixed())
            .map(|e| e.code.as_str())
    }

    /// The explicit creation-contract default: a freshly added row is of the
    /// FIXED type. Returns None when the master has no fixed-priced entry.
    pub fn default_new_row_entry(&self) -> Option<&CostMasterEntry> {
        self.entries.iter().find(|e| e.is_fixed())
    }
}

/// In-memory catalog snapshot: companies, products and the cost master.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    companies: Vec<Company>,
    products: Vec<Product>,
    cost_master: CostMaster,
}

impl Catalog {
    pub fn new(companies: Vec<Company>, products: Vec<Product>, cost_master: CostMaster) -> Self {
        Self {
            companies,
            products,
            cost_master,
        }
    }

    pub fn companies(&self) -> &[Company] {
        &self.companies
    }
    pub fn products(&self) -> &[Product] {
        &self.products
    }
    pub fn cost_master(&self) -> &CostMaster {
        &self.cost_master
    }

    pub fn company(&self, id: &str) -> Option<&Company> {
        self.companies.iter().find(|c| c.id == id)
    }
    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }
}
