use chrono::{DateTime, NaiveDateTime, Utc};
use serde::ser::Serializer;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

use crate::config::ValidationConfig;
use crate::constants::REQUIRED_COLUMNS;
use crate::domain::Transaction;
use crate::observability::metrics;
use crate::table::{Cell, Table, Tabular};

pub const CHECK_COMPLETENESS: &str = "completeness";
pub const CHECK_UNIQUENESS: &str = "uniqueness";
pub const CHECK_CONSISTENCY: &str = "consistency";
pub const CHECK_ACCURACY: &str = "accuracy";

/// Outcome of one quality check
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckResult {
    /// Check name; used as the key in the report
    #[serde(skip)]
    pub name: &'static str,
    pub passed: bool,
    /// Human-readable summary of what was measured
    pub detail: String,
    /// Headline number for the check (fraction, count)
    pub metric: Option<f64>,
    /// Named breakdown behind the metric
    pub counts: BTreeMap<String, f64>,
}

/// Everything a check may need besides the data itself
#[derive(Debug, Clone)]
pub struct CheckContext {
    /// Validation clock; timestamps after it are inconsistent
    pub now: NaiveDateTime,
    pub config: ValidationConfig,
}

/// A single independent data quality check
pub trait QualityCheck {
    fn name(&self) -> &'static str;
    fn run(&self, data: &[Transaction], ctx: &CheckContext) -> CheckResult;
}

/// Immutable verdict of the validation stage
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    #[serde(serialize_with = "serialize_checks")]
    checks: Vec<CheckResult>,
    total_records: usize,
    generated_at: DateTime<Utc>,
    overall_passed: bool,
    overall_status: &'static str,
}

impl ValidationReport {
    fn new(checks: Vec<CheckResult>, total_records: usize, generated_at: DateTime<Utc>) -> Self {
        let overall_passed = checks.iter().all(|c| c.passed);
        Self {
            checks,
            total_records,
            generated_at,
            overall_passed,
            overall_status: if overall_passed { "PASSED" } else { "FAILED" },
        }
    }

    /// Checks in execution order
    pub fn checks(&self) -> &[CheckResult] {
        &self.checks
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn total_records(&self) -> usize {
        self.total_records
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn overall_passed(&self) -> bool {
        self.overall_passed
    }

    pub fn overall_status(&self) -> &'static str {
        self.overall_status
    }
}

/// Checks serialize as a map keyed by check name, in execution order
fn serialize_checks<S: Serializer>(checks: &[CheckResult], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(checks.iter().map(|c| (c.name, c)))
}

/// Trait for the validation stage
pub trait Validator {
    /// Run every check against the dataset; never fails and never short-circuits
    fn validate(&self, data: &[Transaction]) -> ValidationReport;
}

/// Validator running the four standard checks
pub struct DataValidator {
    pub config: ValidationConfig,
    checks: Vec<Box<dyn QualityCheck>>,
}

impl DataValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            checks: vec![
                Box::new(CompletenessCheck),
                Box::new(UniquenessCheck),
                Box::new(ConsistencyCheck),
                Box::new(AccuracyCheck),
            ],
        }
    }

    /// Validate against an explicit clock
    pub fn validate_at(&self, data: &[Transaction], now: DateTime<Utc>) -> ValidationReport {
        info!("🔍 Running {} data quality checks on {} records", self.checks.len(), data.len());
        let ctx = CheckContext {
            now: now.naive_utc(),
            config: self.config.clone(),
        };

        let results: Vec<CheckResult> = self
            .checks
            .iter()
            .map(|check| {
                let result = check.run(data, &ctx);
                if result.passed {
                    info!("✅ {}: PASSED - {}", result.name, result.detail);
                } else {
                    warn!("❌ {}: FAILED - {}", result.name, result.detail);
                }
                metrics::validation::check_outcome(result.name, result.passed);
                result
            })
            .collect();

        let report = ValidationReport::new(results, data.len(), now);
        info!("Overall validation status: {}", report.overall_status());
        report
    }
}

impl Default for DataValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

impl Validator for DataValidator {
    fn validate(&self, data: &[Transaction]) -> ValidationReport {
        self.validate_at(data, Utc::now())
    }
}

// ============================================================================
// Checks
// ============================================================================

/// Per required column missing fraction against a tolerance
pub struct CompletenessCheck;

impl QualityCheck for CompletenessCheck {
    fn name(&self) -> &'static str {
        CHECK_COMPLETENESS
    }

    fn run(&self, data: &[Transaction], ctx: &CheckContext) -> CheckResult {
        let headers = Transaction::headers();
        let required: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| REQUIRED_COLUMNS.contains(h))
            .map(|(i, _)| i)
            .collect();

        let mut missing = vec![0usize; required.len()];
        for record in data {
            let cells = record.cells();
            for (slot, &col) in required.iter().enumerate() {
                if cells.get(col).map_or(true, is_missing) {
                    missing[slot] += 1;
                }
            }
        }

        let total = data.len();
        let fraction = |count: usize| if total == 0 { 0.0 } else { count as f64 / total as f64 };
        let max_fraction = missing.iter().map(|&m| fraction(m)).fold(0.0, f64::max);

        let counts = required
            .iter()
            .zip(&missing)
            .map(|(&col, &m)| (headers[col].to_string(), m as f64))
            .collect();

        let tolerance = ctx.config.completeness_tolerance;
        CheckResult {
            name: self.name(),
            passed: max_fraction <= tolerance,
            detail: format!(
                "max missing fraction {:.4} across {} required columns (tolerance {:.4})",
                max_fraction,
                required.len(),
                tolerance
            ),
            metric: Some(max_fraction),
            counts,
        }
    }
}

/// Transaction ids must be unique
pub struct UniquenessCheck;

impl QualityCheck for UniquenessCheck {
    fn name(&self) -> &'static str {
        CHECK_UNIQUENESS
    }

    fn run(&self, data: &[Transaction], _ctx: &CheckContext) -> CheckResult {
        let distinct: HashSet<&str> = data.iter().map(|t| t.transaction_id.as_str()).collect();
        let duplicates = data.len() - distinct.len();
        let percentage = if data.is_empty() {
            0.0
        } else {
            duplicates as f64 / data.len() as f64 * 100.0
        };

        CheckResult {
            name: self.name(),
            passed: duplicates == 0,
            detail: format!("{} duplicate transaction ids ({:.2}%)", duplicates, percentage),
            metric: Some(duplicates as f64),
            counts: BTreeMap::from([
                ("duplicate_ids".to_string(), duplicates as f64),
                ("duplicate_percentage".to_string(), percentage),
            ]),
        }
    }
}

/// Totals must agree with quantity, price and discount; no future or negative values
pub struct ConsistencyCheck;

impl ConsistencyCheck {
    fn amount_mismatch(t: &Transaction, ctx: &CheckContext) -> bool {
        let expected = t.quantity as f64 * t.unit_price * (1.0 - t.discount_applied);
        let tolerance = ctx
            .config
            .consistency_abs_tolerance
            .max(ctx.config.consistency_rel_tolerance * expected.abs());
        !((t.total_amount - expected).abs() <= tolerance)
    }
}

impl QualityCheck for ConsistencyCheck {
    fn name(&self) -> &'static str {
        CHECK_CONSISTENCY
    }

    fn run(&self, data: &[Transaction], ctx: &CheckContext) -> CheckResult {
        let mismatches = data.iter().filter(|t| Self::amount_mismatch(t, ctx)).count();
        let future = data.iter().filter(|t| t.timestamp > ctx.now).count();
        let negative = data
            .iter()
            .filter(|t| t.quantity < 0 || t.unit_price < 0.0 || t.total_amount < 0.0)
            .count();

        CheckResult {
            name: self.name(),
            passed: mismatches == 0 && future == 0 && negative == 0,
            detail: format!(
                "{} amount mismatches, {} future timestamps, {} negative values",
                mismatches, future, negative
            ),
            metric: Some(mismatches as f64),
            counts: BTreeMap::from([
                ("amount_mismatches".to_string(), mismatches as f64),
                ("future_timestamps".to_string(), future as f64),
                ("negative_values".to_string(), negative as f64),
            ]),
        }
    }
}

/// Values must fall inside plausible business ranges
pub struct AccuracyCheck;

impl QualityCheck for AccuracyCheck {
    fn name(&self) -> &'static str {
        CHECK_ACCURACY
    }

    fn run(&self, data: &[Transaction], ctx: &CheckContext) -> CheckResult {
        let max_quantity = ctx.config.max_quantity;
        let max_price = ctx.config.max_unit_price;

        let quantity = data
            .iter()
            .filter(|t| t.quantity <= 0 || t.quantity > max_quantity)
            .count();
        let price = data
            .iter()
            .filter(|t| !(0.0..=max_price).contains(&t.unit_price))
            .count();
        let discount = data
            .iter()
            .filter(|t| !(0.0..=1.0).contains(&t.discount_applied))
            .count();
        let total = quantity + price + discount;

        CheckResult {
            name: self.name(),
            passed: total == 0,
            detail: format!(
                "{} quantity, {} unit_price, {} discount values out of range",
                quantity, price, discount
            ),
            metric: Some(total as f64),
            counts: BTreeMap::from([
                ("quantity".to_string(), quantity as f64),
                ("unit_price".to_string(), price as f64),
                ("discount_applied".to_string(), discount as f64),
            ]),
        }
    }
}

fn is_missing(cell: &Cell) -> bool {
    match cell {
        Cell::Empty => true,
        Cell::Text(s) => s.trim().is_empty(),
        Cell::Number(v) => !v.is_finite(),
        Cell::Int(_) | Cell::Bool(_) => false,
    }
}

// ============================================================================
// Profile
// ============================================================================

/// Per-column summary of the transformed dataset
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    pub column: String,
    pub missing: usize,
    pub unique: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

/// Column profile over every processed column
pub fn profile(data: &[Transaction]) -> Vec<ColumnProfile> {
    let table = Table::from_rows("processed_transactions", data);
    table
        .headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            let mut missing = 0;
            let mut unique = HashSet::new();
            let mut numbers = Vec::new();
            for row in &table.rows {
                let Some(cell) = row.get(col) else { continue };
                if is_missing(cell) {
                    missing += 1;
                    continue;
                }
                unique.insert(cell.render());
                if let Some(v) = cell.as_f64() {
                    numbers.push(v);
                }
            }

            let (min, max, mean) = if numbers.is_empty() {
                (None, None, None)
            } else {
                let sum: f64 = numbers.iter().sum();
                (
                    Some(numbers.iter().copied().fold(f64::INFINITY, f64::min)),
                    Some(numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
                    Some(sum / numbers.len() as f64),
                )
            };

            ColumnProfile {
                column: header.clone(),
                missing,
                unique: unique.len(),
                min,
                max,
                mean,
            }
        })
        .collect()
}
