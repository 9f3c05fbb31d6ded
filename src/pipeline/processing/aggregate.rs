//! Aggregation views over the transformed dataset.
//!
//! Every view groups through a `BTreeMap`, so output order is deterministic:
//! key order by default, or a metric order with ties broken by key.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

use crate::constants::{VIEW_CUSTOMER, VIEW_DAILY, VIEW_HOURLY, VIEW_PRODUCT, VIEW_REGIONAL};
use crate::domain::{format_timestamp, Transaction};
use crate::observability::metrics;
use crate::table::{Cell, Table, Tabular};

/// Spend thresholds separating Bronze, Silver, Gold and Platinum customers
pub const SEGMENT_THRESHOLDS: [f64; 3] = [1_000.0, 5_000.0, 10_000.0];

#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub transaction_count: usize,
    pub total_revenue: f64,
    pub avg_order_value: f64,
    pub median_transaction: f64,
    pub total_quantity: i64,
    pub total_discounts: f64,
    pub unique_customers: usize,
    pub avg_items_per_transaction: f64,
    /// Discounts as a percentage of revenue
    pub discount_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductSummary {
    pub product_id: String,
    pub category: String,
    pub transaction_count: usize,
    pub units_sold: i64,
    pub total_revenue: f64,
    pub avg_unit_price: f64,
    pub avg_discount: f64,
    pub unique_customers: usize,
    /// Percentage of all revenue
    pub revenue_share: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerSegment {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl CustomerSegment {
    pub fn from_spend(total_spent: f64) -> Self {
        let [silver, gold, platinum] = SEGMENT_THRESHOLDS;
        if total_spent < silver {
            CustomerSegment::Bronze
        } else if total_spent < gold {
            CustomerSegment::Silver
        } else if total_spent < platinum {
            CustomerSegment::Gold
        } else {
            CustomerSegment::Platinum
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerSegment::Bronze => "Bronze",
            CustomerSegment::Silver => "Silver",
            CustomerSegment::Gold => "Gold",
            CustomerSegment::Platinum => "Platinum",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerSummary {
    pub customer_id: String,
    pub transaction_count: usize,
    pub total_spent: f64,
    pub avg_transaction_value: f64,
    pub total_items: i64,
    pub first_purchase: NaiveDateTime,
    pub last_purchase: NaiveDateTime,
    pub days_active: i64,
    pub segment: CustomerSegment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionalSummary {
    pub region: String,
    pub transaction_count: usize,
    pub total_revenue: f64,
    pub avg_order_value: f64,
    pub total_quantity: i64,
    pub customer_count: usize,
    pub avg_discount: f64,
    pub revenue_per_customer: f64,
    pub transactions_per_customer: f64,
    pub revenue_share: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyPattern {
    pub hour: u32,
    pub transaction_count: usize,
    pub total_revenue: f64,
    pub avg_order_value: f64,
    pub total_quantity: i64,
    /// Percentage of all transactions
    pub transaction_share: f64,
}

/// The five views produced by one aggregation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationViews {
    pub daily: Vec<DailySummary>,
    pub products: Vec<ProductSummary>,
    pub customers: Vec<CustomerSummary>,
    pub regions: Vec<RegionalSummary>,
    pub hourly: Vec<HourlyPattern>,
}

impl AggregationViews {
    /// Views as named tables, in artifact order
    pub fn tables(&self) -> Vec<Table> {
        vec![
            Table::from_rows(VIEW_DAILY, &self.daily),
            Table::from_rows(VIEW_PRODUCT, &self.products),
            Table::from_rows(VIEW_CUSTOMER, &self.customers),
            Table::from_rows(VIEW_REGIONAL, &self.regions),
            Table::from_rows(VIEW_HOURLY, &self.hourly),
        ]
    }
}

/// Trait for the aggregation stage
pub trait Aggregator {
    fn aggregate(&self, data: &[Transaction]) -> AggregationViews;
}

/// Computes every view independently from the same borrowed dataset
#[derive(Debug, Default)]
pub struct DefaultAggregator;

impl Aggregator for DefaultAggregator {
    fn aggregate(&self, data: &[Transaction]) -> AggregationViews {
        info!("📊 Creating aggregation views from {} records", data.len());

        let views = AggregationViews {
            daily: daily(data),
            products: by_product(data),
            customers: by_customer(data),
            regions: by_region(data),
            hourly: by_hour(data),
        };

        for (name, rows) in [
            (VIEW_DAILY, views.daily.len()),
            (VIEW_PRODUCT, views.products.len()),
            (VIEW_CUSTOMER, views.customers.len()),
            (VIEW_REGIONAL, views.regions.len()),
            (VIEW_HOURLY, views.hourly.len()),
        ] {
            info!("{}: {} rows", name, rows);
            metrics::aggregation::view_rows(name, rows);
        }

        views
    }
}

fn group_by<'a, K: Ord>(
    data: &'a [Transaction],
    key: impl Fn(&'a Transaction) -> K,
) -> BTreeMap<K, Vec<&'a Transaction>> {
    let mut groups: BTreeMap<K, Vec<&Transaction>> = BTreeMap::new();
    for t in data {
        groups.entry(key(t)).or_default().push(t);
    }
    groups
}

fn revenue(rows: &[&Transaction]) -> f64 {
    rows.iter().map(|t| t.derived.revenue).sum()
}

/// Saturates at `i64::MAX` rather than wrapping
fn quantity(rows: &[&Transaction]) -> i64 {
    rows.iter().fold(0i64, |acc, t| acc.saturating_add(t.quantity))
}

fn distinct_customers(rows: &[&Transaction]) -> usize {
    rows.iter().map(|t| t.customer_id.as_str()).collect::<HashSet<_>>().len()
}

fn mean(sum: f64, count: usize) -> f64 {
    ratio(sum, count as f64)
}

/// Division that yields 0 for an empty denominator
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

pub fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn daily(data: &[Transaction]) -> Vec<DailySummary> {
    group_by(data, |t| t.derived.date)
        .into_iter()
        .map(|(date, rows)| {
            let total_revenue = revenue(&rows);
            let total_quantity = quantity(&rows);
            let total_discounts: f64 = rows.iter().map(|t| t.derived.discount_amount).sum();
            let mut amounts: Vec<f64> = rows.iter().map(|t| t.derived.revenue).collect();
            DailySummary {
                date,
                transaction_count: rows.len(),
                total_revenue,
                avg_order_value: mean(total_revenue, rows.len()),
                median_transaction: median(&mut amounts),
                total_quantity,
                total_discounts,
                unique_customers: distinct_customers(&rows),
                avg_items_per_transaction: mean(total_quantity as f64, rows.len()),
                discount_rate: ratio(total_discounts, total_revenue) * 100.0,
            }
        })
        .collect()
}

fn by_product(data: &[Transaction]) -> Vec<ProductSummary> {
    let grand_total: f64 = data.iter().map(|t| t.derived.revenue).sum();
    let mut products: Vec<ProductSummary> = group_by(data, |t| (t.product_id.as_str(), t.product_category.as_str()))
        .into_iter()
        .map(|((product_id, category), rows)| {
            let total_revenue = revenue(&rows);
            ProductSummary {
                product_id: product_id.to_string(),
                category: category.to_string(),
                transaction_count: rows.len(),
                units_sold: quantity(&rows),
                total_revenue,
                avg_unit_price: mean(rows.iter().map(|t| t.unit_price).sum(), rows.len()),
                avg_discount: mean(rows.iter().map(|t| t.discount_applied).sum(), rows.len()),
                unique_customers: distinct_customers(&rows),
                revenue_share: ratio(total_revenue, grand_total) * 100.0,
            }
        })
        .collect();
    // Stable sort keeps key order among equal revenues
    products.sort_by(|a, b| b.total_revenue.total_cmp(&a.total_revenue));
    products
}

fn by_customer(data: &[Transaction]) -> Vec<CustomerSummary> {
    let mut customers: Vec<CustomerSummary> = group_by(data, |t| t.customer_id.as_str())
        .into_iter()
        .filter_map(|(customer_id, rows)| {
            let first_purchase = rows.iter().map(|t| t.timestamp).min()?;
            let last_purchase = rows.iter().map(|t| t.timestamp).max()?;
            let total_spent = revenue(&rows);
            Some(CustomerSummary {
                customer_id: customer_id.to_string(),
                transaction_count: rows.len(),
                total_spent,
                avg_transaction_value: mean(total_spent, rows.len()),
                total_items: quantity(&rows),
                first_purchase,
                last_purchase,
                days_active: (last_purchase - first_purchase).num_days(),
                segment: CustomerSegment::from_spend(total_spent),
            })
        })
        .collect();
    customers.sort_by(|a, b| b.total_spent.total_cmp(&a.total_spent));
    customers
}

fn by_region(data: &[Transaction]) -> Vec<RegionalSummary> {
    let grand_total: f64 = data.iter().map(|t| t.derived.revenue).sum();
    let mut regions: Vec<RegionalSummary> = group_by(data, |t| t.region.as_str())
        .into_iter()
        .map(|(region, rows)| {
            let total_revenue = revenue(&rows);
            let customer_count = distinct_customers(&rows);
            RegionalSummary {
                region: region.to_string(),
                transaction_count: rows.len(),
                total_revenue,
                avg_order_value: mean(total_revenue, rows.len()),
                total_quantity: quantity(&rows),
                customer_count,
                avg_discount: mean(rows.iter().map(|t| t.discount_applied).sum(), rows.len()),
                revenue_per_customer: mean(total_revenue, customer_count),
                transactions_per_customer: mean(rows.len() as f64, customer_count),
                revenue_share: ratio(total_revenue, grand_total) * 100.0,
            }
        })
        .collect();
    regions.sort_by(|a, b| b.total_revenue.total_cmp(&a.total_revenue));
    regions
}

fn by_hour(data: &[Transaction]) -> Vec<HourlyPattern> {
    group_by(data, |t| t.derived.hour)
        .into_iter()
        .map(|(hour, rows)| {
            let total_revenue = revenue(&rows);
            HourlyPattern {
                hour,
                transaction_count: rows.len(),
                total_revenue,
                avg_order_value: mean(total_revenue, rows.len()),
                total_quantity: quantity(&rows),
                transaction_share: mean(rows.len() as f64 * 100.0, data.len()),
            }
        })
        .collect()
}

// ============================================================================
// Table layouts
// ============================================================================

impl Tabular for DailySummary {
    fn headers() -> Vec<&'static str> {
        vec![
            "date",
            "transaction_count",
            "total_revenue",
            "avg_order_value",
            "median_transaction",
            "total_quantity",
            "total_discounts",
            "unique_customers",
            "avg_items_per_transaction",
            "discount_rate",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.date.to_string()),
            Cell::Int(self.transaction_count as i64),
            Cell::Number(self.total_revenue),
            Cell::Number(self.avg_order_value),
            Cell::Number(self.median_transaction),
            Cell::Int(self.total_quantity),
            Cell::Number(self.total_discounts),
            Cell::Int(self.unique_customers as i64),
            Cell::Number(self.avg_items_per_transaction),
            Cell::Number(self.discount_rate),
        ]
    }
}

impl Tabular for ProductSummary {
    fn headers() -> Vec<&'static str> {
        vec![
            "product_id",
            "category",
            "transaction_count",
            "units_sold",
            "total_revenue",
            "avg_unit_price",
            "avg_discount",
            "unique_customers",
            "revenue_share",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.product_id.clone()),
            Cell::Text(self.category.clone()),
            Cell::Int(self.transaction_count as i64),
            Cell::Int(self.units_sold),
            Cell::Number(self.total_revenue),
            Cell::Number(self.avg_unit_price),
            Cell::Number(self.avg_discount),
            Cell::Int(self.unique_customers as i64),
            Cell::Number(self.revenue_share),
        ]
    }
}

impl Tabular for CustomerSummary {
    fn headers() -> Vec<&'static str> {
        vec![
            "customer_id",
            "transaction_count",
            "total_spent",
            "avg_transaction_value",
            "total_items",
            "first_purchase",
            "last_purchase",
            "days_active",
            "segment",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.customer_id.clone()),
            Cell::Int(self.transaction_count as i64),
            Cell::Number(self.total_spent),
            Cell::Number(self.avg_transaction_value),
            Cell::Int(self.total_items),
            Cell::Text(format_timestamp(&self.first_purchase)),
            Cell::Text(format_timestamp(&self.last_purchase)),
            Cell::Int(self.days_active),
            Cell::Text(self.segment.as_str().to_string()),
        ]
    }
}

impl Tabular for RegionalSummary {
    fn headers() -> Vec<&'static str> {
        vec![
            "region",
            "transaction_count",
            "total_revenue",
            "avg_order_value",
            "total_quantity",
            "customer_count",
            "avg_discount",
            "revenue_per_customer",
            "transactions_per_customer",
            "revenue_share",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.region.clone()),
            Cell::Int(self.transaction_count as i64),
            Cell::Number(self.total_revenue),
            Cell::Number(self.avg_order_value),
            Cell::Int(self.total_quantity),
            Cell::Int(self.customer_count as i64),
            Cell::Number(self.avg_discount),
            Cell::Number(self.revenue_per_customer),
            Cell::Number(self.transactions_per_customer),
            Cell::Number(self.revenue_share),
        ]
    }
}

impl Tabular for HourlyPattern {
    fn headers() -> Vec<&'static str> {
        vec![
            "hour",
            "transaction_count",
            "total_revenue",
            "avg_order_value",
            "total_quantity",
            "transaction_share",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Int(self.hour as i64),
            Cell::Int(self.transaction_count as i64),
            Cell::Number(self.total_revenue),
            Cell::Number(self.avg_order_value),
            Cell::Int(self.total_quantity),
            Cell::Number(self.transaction_share),
        ]
    }
}
