use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

use crate::config::TransformationConfig;
use crate::constants::{title_case, MAX_QUANTITY};
use crate::domain::{
    DerivedColumns, DiscountTier, PriceTier, RawTransaction, TimeOfDay, Transaction, TransformedDataset,
};
use crate::error::TransformationError;
use crate::observability::metrics;

/// Why a raw row was removed during cleaning
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DropReason {
    /// transaction_id or customer_id missing; the row cannot be reconciled
    MissingIdentifier,
    /// timestamp missing or unparseable
    InvalidTimestamp,
    /// quantity missing, non-integral, not positive or above `MAX_QUANTITY`
    InvalidQuantity,
    NegativePrice,
    /// discount outside [0, 1]
    InvalidDiscount,
    NegativeTotal,
    /// repeats an earlier transaction id (only when deduplication is on)
    DuplicateId,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MissingIdentifier => "missing_identifier",
            DropReason::InvalidTimestamp => "invalid_timestamp",
            DropReason::InvalidQuantity => "invalid_quantity",
            DropReason::NegativePrice => "negative_price",
            DropReason::InvalidDiscount => "invalid_discount",
            DropReason::NegativeTotal => "negative_total",
            DropReason::DuplicateId => "duplicate_id",
        }
    }
}

/// Per-reason counts of dropped rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropReport {
    pub counts: BTreeMap<DropReason, usize>,
}

impl DropReport {
    fn record(&mut self, reason: DropReason) {
        *self.counts.entry(reason).or_insert(0) += 1;
    }

    pub fn count(&self, reason: DropReason) -> usize {
        self.counts.get(&reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Cleaned dataset plus the accounting of what was removed
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub records: TransformedDataset,
    pub drops: DropReport,
}

/// Trait for turning the raw dataset into the typed, enriched dataset
pub trait Transformer {
    /// Clean, coerce and enrich; deterministic for identical input
    fn transform(&self, raw: &[RawTransaction]) -> Result<TransformOutput, TransformationError>;
}

/// Default transformer applying the column-specific missing-value policy
pub struct DefaultTransformer {
    pub config: TransformationConfig,
}

impl DefaultTransformer {
    /// Sentinels are normalized so a second pass over the output keeps them as they are
    pub fn new(mut config: TransformationConfig) -> Self {
        config.unknown_label = title_case(&config.unknown_label);
        config.unknown_product_id = config.unknown_product_id.trim().to_string();
        Self { config }
    }

    /// Clean one row: `Ok(Err(reason))` means the row is dropped
    fn clean_row(&self, raw: &RawTransaction) -> Result<Result<Transaction, DropReason>, TransformationError> {
        let (Some(transaction_id), Some(customer_id)) = (text(&raw.transaction_id), text(&raw.customer_id)) else {
            return Ok(Err(DropReason::MissingIdentifier));
        };

        let Some(timestamp) = raw.timestamp.as_deref().and_then(parse_timestamp) else {
            return Ok(Err(DropReason::InvalidTimestamp));
        };

        let quantity = match raw.quantity.as_deref().and_then(parse_quantity) {
            Some(q) if (1..=MAX_QUANTITY).contains(&q) => q,
            _ => return Ok(Err(DropReason::InvalidQuantity)),
        };

        let discount = raw.discount_applied.as_deref().and_then(parse_number).unwrap_or(0.0);
        if !(0.0..=1.0).contains(&discount) {
            return Ok(Err(DropReason::InvalidDiscount));
        }

        let given_total = raw.total_amount.as_deref().and_then(parse_number);
        let unit_price = match raw.unit_price.as_deref().and_then(parse_number) {
            Some(price) => price,
            None => {
                // Recover the price from the total when the discount leaves something to divide by
                let denominator = quantity as f64 * (1.0 - discount);
                match given_total {
                    Some(total) if denominator > 0.0 => total / denominator,
                    _ => 0.0,
                }
            }
        };
        if unit_price < 0.0 {
            return Ok(Err(DropReason::NegativePrice));
        }

        let total_amount =
            given_total.unwrap_or_else(|| round_cents(quantity as f64 * unit_price * (1.0 - discount)));
        if total_amount < 0.0 {
            return Ok(Err(DropReason::NegativeTotal));
        }

        let unit_cost = raw.unit_cost.as_deref().and_then(parse_number);
        let derived = derive_columns(&transaction_id, timestamp, quantity, unit_price, total_amount, discount, unit_cost)?;

        Ok(Ok(Transaction {
            transaction_id,
            timestamp,
            customer_id,
            product_id: text(&raw.product_id).unwrap_or_else(|| self.config.unknown_product_id.clone()),
            product_category: self.label(&raw.product_category),
            quantity,
            unit_price,
            total_amount,
            region: self.label(&raw.region),
            payment_method: self.label(&raw.payment_method),
            discount_applied: discount,
            unit_cost,
            derived,
        }))
    }

    /// Trimmed, title-cased category label or the unknown sentinel
    fn label(&self, value: &Option<String>) -> String {
        text(value)
            .map(|v| title_case(&v))
            .unwrap_or_else(|| self.config.unknown_label.clone())
    }
}

impl Default for DefaultTransformer {
    fn default() -> Self {
        Self::new(TransformationConfig::default())
    }
}

impl Transformer for DefaultTransformer {
    fn transform(&self, raw: &[RawTransaction]) -> Result<TransformOutput, TransformationError> {
        info!("🧹 Starting data transformation of {} raw records", raw.len());

        let mut records = Vec::with_capacity(raw.len());
        let mut drops = DropReport::default();
        let mut seen_ids = HashSet::new();

        for row in raw {
            match self.clean_row(row)? {
                Ok(record) => {
                    if self.config.deduplicate && !seen_ids.insert(record.transaction_id.clone()) {
                        drops.record(DropReason::DuplicateId);
                        continue;
                    }
                    records.push(record);
                }
                Err(reason) => drops.record(reason),
            }
        }

        for (reason, count) in &drops.counts {
            info!("Dropped {} rows: {}", count, reason.as_str());
            metrics::transformation::rows_dropped(reason.as_str(), *count);
        }
        info!(
            "Transformation complete: {} records ({} dropped)",
            records.len(),
            drops.total()
        );

        Ok(TransformOutput { records, drops })
    }
}

fn derive_columns(
    transaction_id: &str,
    timestamp: NaiveDateTime,
    quantity: i64,
    unit_price: f64,
    total_amount: f64,
    discount: f64,
    unit_cost: Option<f64>,
) -> Result<DerivedColumns, TransformationError> {
    let finite = |column: &'static str, value: f64| {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(TransformationError::NonFinite {
                transaction_id: transaction_id.to_string(),
                column,
            })
        }
    };

    let gross_revenue = finite("gross_revenue", quantity as f64 * unit_price)?;
    let discount_amount = finite("discount_amount", gross_revenue * discount)?;
    let net_revenue = finite("net_revenue", gross_revenue - discount_amount)?;
    let revenue = total_amount;

    let profit = match unit_cost {
        Some(cost) => Some(finite("profit", revenue - quantity as f64 * cost)?),
        None => None,
    };
    let profit_margin = profit.filter(|_| revenue > 0.0).map(|p| p / revenue);

    let weekday = timestamp.weekday();
    let hour = timestamp.hour();

    Ok(DerivedColumns {
        date: timestamp.date(),
        year: timestamp.year(),
        month: timestamp.month(),
        day: timestamp.day(),
        hour,
        day_of_week: weekday_name(weekday).to_string(),
        week_of_year: timestamp.iso_week().week(),
        is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
        time_of_day: TimeOfDay::from_hour(hour),
        gross_revenue,
        discount_amount,
        net_revenue,
        revenue,
        has_discount: discount > 0.0,
        discount_tier: DiscountTier::from_fraction(discount),
        price_tier: PriceTier::from_price(unit_price),
        profit,
        profit_margin,
    })
}

/// Trimmed, non-blank text
fn text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Finite number; anything else counts as missing
pub fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Integral quantity; "3" and "3.0" are accepted, "3.5" is not
pub fn parse_quantity(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if let Ok(q) = trimmed.parse::<i64>() {
        return Some(q);
    }
    parse_number(trimmed)
        .filter(|v| v.fract() == 0.0 && v.abs() < 9.0e15)
        .map(|v| v as i64)
}

/// Accepts `YYYY-MM-DD HH:MM:SS[.f]`, the `T`-separated form, RFC 3339
/// (normalized to UTC) and a bare date (midnight)
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{UNKNOWN_LABEL, UNKNOWN_PRODUCT_ID};

    fn create_test_raw(id: &str) -> RawTransaction {
        RawTransaction {
            transaction_id: Some(id.to_string()),
            timestamp: Some("2023-01-07 14:30:00".to_string()),
            customer_id: Some("CUST-0001".to_string()),
            product_id: Some("PROD-001".to_string()),
            product_category: Some("electronics".to_string()),
            quantity: Some("2".to_string()),
            unit_price: Some("100.00".to_string()),
            total_amount: Some("180.00".to_string()),
            region: Some(" north ".to_string()),
            payment_method: Some("credit card".to_string()),
            discount_applied: Some("0.1".to_string()),
            unit_cost: None,
        }
    }

    fn run(raw: &[RawTransaction]) -> TransformOutput {
        DefaultTransformer::default().transform(raw).unwrap()
    }

    #[test]
    fn test_clean_row_is_typed_and_enriched() {
        let out = run(&[create_test_raw("TXN-1")]);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.drops.total(), 0);

        let t = &out.records[0];
        assert_eq!(t.quantity, 2);
        assert_eq!(t.product_category, "Electronics");
        assert_eq!(t.region, "North");
        assert_eq!(t.payment_method, "Credit Card");

        let d = &t.derived;
        assert_eq!(d.date, NaiveDate::from_ymd_opt(2023, 1, 7).unwrap());
        assert_eq!(d.hour, 14);
        assert_eq!(d.day_of_week, "Saturday");
        assert!(d.is_weekend);
        assert_eq!(d.time_of_day, TimeOfDay::Afternoon);
        assert_eq!(d.gross_revenue, 200.0);
        assert!((d.discount_amount - 20.0).abs() < 1e-9);
        assert!((d.net_revenue - 180.0).abs() < 1e-9);
        assert_eq!(d.revenue, 180.0);
        assert!(d.has_discount);
        assert_eq!(d.discount_tier, DiscountTier::Medium);
        assert_eq!(d.price_tier, PriceTier::Standard);
        assert_eq!(d.profit, None);
    }

    #[test]
    fn test_rows_missing_identifiers_are_dropped() {
        let mut no_customer = create_test_raw("TXN-2");
        no_customer.customer_id = None;
        let mut blank_id = create_test_raw("TXN-3");
        blank_id.transaction_id = Some("   ".to_string());

        let out = run(&[create_test_raw("TXN-1"), no_customer, blank_id]);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.drops.count(DropReason::MissingIdentifier), 2);
    }

    #[test]
    fn test_each_invalid_value_counts_under_its_reason() {
        let mut bad_ts = create_test_raw("A");
        bad_ts.timestamp = Some("not a date".to_string());
        let mut zero_qty = create_test_raw("B");
        zero_qty.quantity = Some("0".to_string());
        let mut text_qty = create_test_raw("C");
        text_qty.quantity = Some("two".to_string());
        let mut neg_price = create_test_raw("D");
        neg_price.unit_price = Some("-5".to_string());
        let mut big_discount = create_test_raw("E");
        big_discount.discount_applied = Some("15".to_string());
        let mut neg_total = create_test_raw("F");
        neg_total.total_amount = Some("-1".to_string());

        let out = run(&[bad_ts, zero_qty, text_qty, neg_price, big_discount, neg_total]);
        assert!(out.records.is_empty());
        assert_eq!(out.drops.count(DropReason::InvalidTimestamp), 1);
        assert_eq!(out.drops.count(DropReason::InvalidQuantity), 2);
        assert_eq!(out.drops.count(DropReason::NegativePrice), 1);
        assert_eq!(out.drops.count(DropReason::InvalidDiscount), 1);
        assert_eq!(out.drops.count(DropReason::NegativeTotal), 1);
        assert_eq!(out.drops.total(), 6);
    }

    #[test]
    fn test_missing_values_are_imputed_per_column() {
        let mut raw = create_test_raw("TXN-1");
        raw.total_amount = None;
        raw.discount_applied = None;
        raw.product_id = None;
        raw.product_category = None;
        raw.region = Some("".to_string());
        raw.payment_method = None;

        let t = &run(&[raw]).records[0];
        assert_eq!(t.total_amount, 200.0);
        assert_eq!(t.discount_applied, 0.0);
        assert_eq!(t.product_id, UNKNOWN_PRODUCT_ID);
        assert_eq!(t.product_category, UNKNOWN_LABEL);
        assert_eq!(t.region, UNKNOWN_LABEL);
        assert_eq!(t.payment_method, UNKNOWN_LABEL);
    }

    #[test]
    fn test_missing_price_is_recovered_from_total() {
        let mut raw = create_test_raw("TXN-1");
        raw.unit_price = Some("n/a".to_string());

        let t = &run(&[raw]).records[0];
        assert!((t.unit_price - 100.0).abs() < 1e-9);

        let mut neither = create_test_raw("TXN-2");
        neither.unit_price = None;
        neither.total_amount = None;
        let t = &run(&[neither]).records[0];
        assert_eq!(t.unit_price, 0.0);
        assert_eq!(t.total_amount, 0.0);
    }

    #[test]
    fn test_profit_columns_use_unit_cost_when_present() {
        let mut raw = create_test_raw("TXN-1");
        raw.unit_cost = Some("60".to_string());

        let t = &run(&[raw]).records[0];
        assert_eq!(t.derived.profit, Some(60.0));
        assert!((t.derived.profit_margin.unwrap() - 60.0 / 180.0).abs() < 1e-12);
    }

    #[test]
    fn test_quantity_above_ceiling_is_dropped() {
        let mut huge = create_test_raw("A");
        huge.quantity = Some(i64::MAX.to_string());
        let mut over = create_test_raw("B");
        over.quantity = Some((MAX_QUANTITY + 1).to_string());
        let mut ceiling = create_test_raw("C");
        ceiling.quantity = Some(MAX_QUANTITY.to_string());
        ceiling.total_amount = None;
        ceiling.unit_price = Some("1".to_string());

        let out = run(&[huge, over, ceiling]);
        assert_eq!(out.drops.count(DropReason::InvalidQuantity), 2);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].quantity, MAX_QUANTITY);
    }

    #[test]
    fn test_configured_sentinels_survive_a_second_pass() {
        let transformer = DefaultTransformer::new(TransformationConfig {
            unknown_label: "NOT GIVEN".to_string(),
            unknown_product_id: " N/A ".to_string(),
            ..TransformationConfig::default()
        });
        let mut raw = create_test_raw("TXN-1");
        raw.region = None;
        raw.product_id = None;

        let once = transformer.transform(&[raw]).unwrap().records;
        assert_eq!(once[0].region, "Not Given");
        assert_eq!(once[0].product_id, "N/A");

        let again: Vec<RawTransaction> = once.iter().map(RawTransaction::from).collect();
        let twice = transformer.transform(&again).unwrap().records;
        assert_eq!(twice[0].region, once[0].region);
        assert_eq!(twice[0].product_id, once[0].product_id);
    }

    #[test]
    fn test_overflowing_values_are_transformation_errors() {
        let mut raw = create_test_raw("TXN-1");
        raw.quantity = Some("1000000".to_string());
        raw.unit_price = Some("1e305".to_string());

        let err = DefaultTransformer::default().transform(&[raw]).unwrap_err();
        assert!(matches!(err, TransformationError::NonFinite { column: "gross_revenue", .. }));
    }

    #[test]
    fn test_deduplicate_keeps_first_occurrence() {
        let transformer = DefaultTransformer::new(TransformationConfig {
            deduplicate: true,
            ..TransformationConfig::default()
        });
        let mut second = create_test_raw("TXN-1");
        second.customer_id = Some("CUST-0002".to_string());

        let out = transformer.transform(&[create_test_raw("TXN-1"), second]).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].customer_id, "CUST-0001");
        assert_eq!(out.drops.count(DropReason::DuplicateId), 1);

        // Off by default: both rows survive for validation to report
        let mut second = create_test_raw("TXN-1");
        second.customer_id = Some("CUST-0002".to_string());
        assert_eq!(run(&[create_test_raw("TXN-1"), second]).records.len(), 2);
    }

    #[test]
    fn test_transform_is_idempotent_on_its_output() {
        let mut imputed = create_test_raw("TXN-2");
        imputed.unit_price = None;
        imputed.total_amount = Some("99.99".to_string());
        imputed.discount_applied = Some("0.15".to_string());
        imputed.quantity = Some("3.0".to_string());
        let mut fractional = create_test_raw("TXN-3");
        fractional.timestamp = Some("2023-02-01T08:15:30.125Z".to_string());
        fractional.unit_cost = Some("12.345".to_string());

        let first = run(&[create_test_raw("TXN-1"), imputed, fractional]).records;
        let reraw: Vec<RawTransaction> = first.iter().map(RawTransaction::from).collect();
        let second = run(&reraw);

        assert_eq!(second.drops.total(), 0);
        assert_eq!(second.records, first);
    }

    #[test]
    fn test_transform_never_increases_row_count() {
        let generated = crate::pipeline::ingestion::generate(&crate::config::IngestionConfig {
            synthetic_records: 1_000,
            invalid_quantity_rate: 0.02,
            ..Default::default()
        });
        let out = run(&generated.records);
        assert!(out.records.len() <= generated.records.len());
        assert_eq!(out.records.len() + out.drops.total(), generated.records.len());
        assert!(out
            .records
            .iter()
            .all(|t| !t.transaction_id.is_empty() && !t.customer_id.is_empty()));
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_quantity("3"), Some(3));
        assert_eq!(parse_quantity(" 3.0 "), Some(3));
        assert_eq!(parse_quantity("3.5"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number(" 12.5 "), Some(12.5));
        assert!(parse_timestamp("2023-01-01").is_some());
        assert!(parse_timestamp("2023-01-01T10:00:00+02:00").is_some());
        assert_eq!(
            parse_timestamp("2023-01-01T10:00:00+02:00").unwrap().hour(),
            8
        );
        assert!(parse_timestamp("01/02/2023").is_none());
    }
}
