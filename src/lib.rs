//! Quote versioning, pricing calculation and approval workflow engine.
//!
//! Quotes live as append-only version chains per group: exactly one latest
//! version per group, gapless version numbers, and no mutation once a
//! version is approved. Pricing is pure calculation over a product, a set of
//! additional cost rows and user-entered cost defaults; persistence and
//! status transitions go through [`store::QuoteStore`] behind the guards in
//! [`validate`].

pub mod calc;
pub mod catalog;
pub mod costing;
pub mod error;
pub mod quote;
pub mod service;
pub mod store;
pub mod utils;
pub mod validate;
