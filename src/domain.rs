use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::constants::TIMESTAMP_FORMAT;

/// A transaction row exactly as loaded or generated.
///
/// Every field is kept as optional text so missing values, unconvertible
/// numbers and out-of-range values reach the transformation stage intact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub transaction_id: Option<String>,
    pub timestamp: Option<String>,
    pub customer_id: Option<String>,
    pub product_id: Option<String>,
    pub product_category: Option<String>,
    pub quantity: Option<String>,
    pub unit_price: Option<String>,
    pub total_amount: Option<String>,
    pub region: Option<String>,
    pub payment_method: Option<String>,
    pub discount_applied: Option<String>,
    /// Optional input column; absent from most sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<String>,
}

/// Raw dataset in load order
pub type RawDataset = Vec<RawTransaction>;

/// A cleaned, typed and enriched transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub transaction_id: String,
    pub timestamp: NaiveDateTime,
    pub customer_id: String,
    pub product_id: String,
    pub product_category: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub total_amount: f64,
    pub region: String,
    pub payment_method: String,
    /// Discount as a fraction in [0, 1]
    pub discount_applied: f64,
    pub unit_cost: Option<f64>,
    pub derived: DerivedColumns,
}

/// Columns computed from the base fields during transformation
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedColumns {
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub day_of_week: String,
    pub week_of_year: u32,
    pub is_weekend: bool,
    pub time_of_day: TimeOfDay,
    pub gross_revenue: f64,
    pub discount_amount: f64,
    pub net_revenue: f64,
    pub revenue: f64,
    pub has_discount: bool,
    pub discount_tier: DiscountTier,
    pub price_tier: PriceTier,
    /// revenue minus quantity x unit cost, when cost is known
    pub profit: Option<f64>,
    /// profit / revenue, when cost is known and revenue is positive
    pub profit_margin: Option<f64>,
}

/// Transformed dataset in load order
pub type TransformedDataset = Vec<Transaction>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Night,
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=5 => TimeOfDay::Night,
            6..=11 => TimeOfDay::Morning,
            12..=17 => TimeOfDay::Afternoon,
            _ => TimeOfDay::Evening,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Night => "Night",
            TimeOfDay::Morning => "Morning",
            TimeOfDay::Afternoon => "Afternoon",
            TimeOfDay::Evening => "Evening",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountTier {
    None,
    Low,
    Medium,
    High,
}

impl DiscountTier {
    /// Buckets: 0 | (0, 5%] | (5%, 10%] | above 10%
    pub fn from_fraction(discount: f64) -> Self {
        if discount <= 0.0 {
            DiscountTier::None
        } else if discount <= 0.05 {
            DiscountTier::Low
        } else if discount <= 0.10 {
            DiscountTier::Medium
        } else {
            DiscountTier::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountTier::None => "None",
            DiscountTier::Low => "Low",
            DiscountTier::Medium => "Medium",
            DiscountTier::High => "High",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceTier {
    Budget,
    Standard,
    Premium,
    Luxury,
}

impl PriceTier {
    /// Buckets: up to 50 | up to 100 | up to 200 | above
    pub fn from_price(unit_price: f64) -> Self {
        if unit_price <= 50.0 {
            PriceTier::Budget
        } else if unit_price <= 100.0 {
            PriceTier::Standard
        } else if unit_price <= 200.0 {
            PriceTier::Premium
        } else {
            PriceTier::Luxury
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceTier::Budget => "Budget",
            PriceTier::Standard => "Standard",
            PriceTier::Premium => "Premium",
            PriceTier::Luxury => "Luxury",
        }
    }
}

impl From<&Transaction> for RawTransaction {
    /// Render a cleaned row back into raw text; transforming it again yields the same row
    fn from(t: &Transaction) -> Self {
        Self {
            transaction_id: Some(t.transaction_id.clone()),
            timestamp: Some(format_timestamp(&t.timestamp)),
            customer_id: Some(t.customer_id.clone()),
            product_id: Some(t.product_id.clone()),
            product_category: Some(t.product_category.clone()),
            quantity: Some(t.quantity.to_string()),
            unit_price: Some(t.unit_price.to_string()),
            total_amount: Some(t.total_amount.to_string()),
            region: Some(t.region.clone()),
            payment_method: Some(t.payment_method.clone()),
            discount_applied: Some(t.discount_applied.to_string()),
            unit_cost: t.unit_cost.map(|c| c.to_string()),
        }
    }
}

/// Seconds precision unless the value carries a fraction
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    format!("{}{}", ts.format(TIMESTAMP_FORMAT), ts.format("%.f"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_of_day_buckets() {
        assert_eq!(TimeOfDay::from_hour(0), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(6), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(23), TimeOfDay::Evening);
    }

    #[test]
    fn test_discount_and_price_tiers() {
        assert_eq!(DiscountTier::from_fraction(0.0), DiscountTier::None);
        assert_eq!(DiscountTier::from_fraction(0.05), DiscountTier::Low);
        assert_eq!(DiscountTier::from_fraction(0.10), DiscountTier::Medium);
        assert_eq!(DiscountTier::from_fraction(0.20), DiscountTier::High);

        assert_eq!(PriceTier::from_price(10.0), PriceTier::Budget);
        assert_eq!(PriceTier::from_price(75.5), PriceTier::Standard);
        assert_eq!(PriceTier::from_price(150.0), PriceTier::Premium);
        assert_eq!(PriceTier::from_price(499.99), PriceTier::Luxury);
    }

    #[test]
    fn test_format_timestamp_keeps_fraction_only_when_present() {
        let whole = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(13, 5, 0).unwrap();
        assert_eq!(format_timestamp(&whole), "2023-01-01 13:05:00");

        let fractional = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_milli_opt(13, 5, 0, 250)
            .unwrap();
        assert_eq!(format_timestamp(&fractional), "2023-01-01 13:05:00.250");
    }
}
