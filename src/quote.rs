//! Core quote records, statuses and user input types

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn now() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    /// Calendar date only, as used in version labels.
    pub fn date_string(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// Decimal fields are persisted as their canonical string form; the parse on
/// the way back is exact, so amounts survive storage without drift.
pub(crate) mod dec {
    use rust_decimal::Decimal;
    use std::str::FromStr;

    pub fn encode<Ctx, W: minicbor::encode::Write>(
        v: &Decimal,
        e: &mut minicbor::Encoder<W>,
        _: &mut Ctx,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.str(&v.to_string())?.ok()
    }

    pub fn decode<'b, Ctx>(
        d: &mut minicbor::Decoder<'b>,
        _: &mut Ctx,
    ) -> Result<Decimal, minicbor::decode::Error> {
        Decimal::from_str(d.str()?)
            .map_err(|_| minicbor::decode::Error::message("invalid decimal string"))
    }
}

pub(crate) mod dec_opt {
    use rust_decimal::Decimal;
    use std::str::FromStr;

    pub fn encode<Ctx, W: minicbor::encode::Write>(
        v: &Option<Decimal>,
        e: &mut minicbor::Encoder<W>,
        _: &mut Ctx,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match v {
            Some(d) => e.str(&d.to_string())?.ok(),
            None => e.null()?.ok(),
        }
    }

    pub fn decode<'b, Ctx>(
        d: &mut minicbor::Decoder<'b>,
        _: &mut Ctx,
    ) -> Result<Option<Decimal>, minicbor::decode::Error> {
        if d.datatype()? == minicbor::data::Type::Null {
            d.null()?;
            return Ok(None);
        }
        Decimal::from_str(d.str()?)
            .map(Some)
            .map_err(|_| minicbor::decode::Error::message("invalid decimal string"))
    }
}

/// Lifecycle status of one quote version.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStatus {
    #[n(0)]
    Draft,
    #[n(1)]
    PendingApproval,
    #[n(2)]
    Approved,
    #[n(3)]
    Rejected,
}

impl QuoteStatus {
    pub fn code(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "DRAFT",
            QuoteStatus::PendingApproval => "PENDING_APPROVAL",
            QuoteStatus::Approved => "APPROVED",
            QuoteStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "DRAFT" => Some(QuoteStatus::Draft),
            "PENDING_APPROVAL" => Some(QuoteStatus::PendingApproval),
            "APPROVED" => Some(QuoteStatus::Approved),
            "REJECTED" => Some(QuoteStatus::Rejected),
            _ => None,
        }
    }

    /// Terminal with respect to financial content. REJECTED may still be the
    /// source of a new version; APPROVED may not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, QuoteStatus::Approved | QuoteStatus::Rejected)
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Sort-order-0 marker for the product base line.
pub const PRODUCT_BASE: &str = "PRODUCT_BASE";

/// One priced line of a quote version. `line_total` is always
/// `quantity * unit_price` at the time the line was computed; it is never
/// edited independently.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct LineItem {
    #[n(0)]
    pub item_type: String,
    #[n(1)]
    pub label: String,
    #[n(2)]
    pub description: Option<String>,
    #[n(3)]
    #[cbor(with = "dec")]
    pub quantity: Decimal,
    #[n(4)]
    #[cbor(with = "dec")]
    pub unit_price: Decimal,
    #[n(5)]
    #[cbor(with = "dec")]
    pub line_total: Decimal,
    #[n(6)]
    pub sort_order: u32,
}

/// One immutable version in a quote group's chain.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Quote {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub quote_group_id: String,
    #[n(2)]
    pub version_number: u32,
    #[n(3)]
    pub version_label: String,
    #[n(4)]
    pub is_latest: bool,
    #[n(5)]
    pub status: QuoteStatus,
    #[n(6)]
    pub company_id: String,
    #[n(7)]
    pub product_id: String,
    #[n(8)]
    #[cbor(with = "dec")]
    pub discount_percent: Decimal,
    #[n(9)]
    #[cbor(with = "dec")]
    pub subtotal: Decimal,
    #[n(10)]
    #[cbor(with = "dec")]
    pub net_total: Decimal,
    #[n(11)]
    #[cbor(with = "dec_opt")]
    pub fixed_cost: Option<Decimal>,
    #[n(12)]
    #[cbor(with = "dec")]
    pub man_days_cost: Decimal,
    #[n(13)]
    #[cbor(with = "dec")]
    pub stay_man_days_cost: Decimal,
    #[n(14)]
    pub created_at: TimeStamp<Utc>,
    #[n(15)]
    pub updated_at: TimeStamp<Utc>,
    #[n(16)]
    pub created_by: String,
}

/// Presentational label for a version: number plus creation date. The store
/// derives it at creation time and never reads it back for anything.
pub fn version_label(version_number: u32, created_at: &TimeStamp<Utc>) -> String {
    format!("V{}/{}", version_number, created_at.date_string())
}

/// One additional-cost row as entered by the user. Quantity and unit price
/// are raw strings; they stay unvalidated until a save is attempted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdditionalItemInput {
    pub code: String,
    pub description: String,
    pub quantity: String,
    pub unit_price: String,
}

impl AdditionalItemInput {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }
}

/// Everything the caller supplies for one save: catalog selections, the
/// additional-cost rows and the typed-in defaults. Company and product stay
/// optional so a live preview can exist before either is picked.
#[derive(Debug, Clone, Default)]
pub struct QuoteDraft {
    pub company_id: Option<String>,
    pub product_id: Option<String>,
    pub discount_percent: String,
    pub items: Vec<AdditionalItemInput>,
    pub defaults: crate::costing::CostDefaults,
}

/// Capability snapshot for the acting user, supplied by the identity
/// collaborator. Only the approval guard consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub can_approve: bool,
}

impl Actor {
    pub fn approver(id: &str) -> Self {
        Self {
            id: id.into(),
            can_approve: true,
        }
    }
    pub fn requester(id: &str) -> Self {
        Self {
            id: id.into(),
            can_approve: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::now();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn status_codes_roundtrip() {
        for status in [
            QuoteStatus::Draft,
            QuoteStatus::PendingApproval,
            QuoteStatus::Approved,
            QuoteStatus::Rejected,
        ] {
            assert_eq!(QuoteStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(QuoteStatus::from_code("CANCELLED"), None);
    }

    #[test]
    fn version_label_uses_calendar_date() {
        let ts = TimeStamp::new_with(2025, 3, 9, 14, 30, 0);
        assert_eq!(version_label(3, &ts), "V3/2025-03-09");
    }

    #[test]
    fn line_item_encoding() {
        let line = LineItem {
            item_type: PRODUCT_BASE.into(),
            label: "ERP Suite".into(),
            description: None,
            quantity: dec!(1),
            unit_price: dec!(50000),
            line_total: dec!(50000),
            sort_order: 0,
        };

        let encoded = minicbor::to_vec(&line).unwrap();
        let decoded: LineItem = minicbor::decode(&encoded).unwrap();

        assert_eq!(line, decoded);
    }

    #[test]
    fn quote_encoding_preserves_optional_fixed_cost() {
        let now = TimeStamp::now();
        let mut quote = Quote {
            id: "quote_x".into(),
            quote_group_id: "qgrp_x".into(),
            version_number: 0,
            version_label: version_label(0, &now),
            is_latest: true,
            status: QuoteStatus::Draft,
            company_id: "company_x".into(),
            product_id: "product_x".into(),
            discount_percent: dec!(10),
            subtotal: dec!(52000),
            net_total: dec!(46800),
            fixed_cost: None,
            man_days_cost: dec!(1000),
            stay_man_days_cost: dec!(500),
            created_at: now.clone(),
            updated_at: now,
            created_by: "user_x".into(),
        };

        let decoded: Quote = minicbor::decode(&minicbor::to_vec(&quote).unwrap()).unwrap();
        assert_eq!(quote, decoded);

        quote.fixed_cost = Some(dec!(1000));
        let decoded: Quote = minicbor::decode(&minicbor::to_vec(&quote).unwrap()).unwrap();
        assert_eq!(decoded.fixed_cost, Some(dec!(1000)));
    }
}
