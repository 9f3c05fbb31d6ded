use chrono::Duration;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::IngestionConfig;
use crate::constants::{CATEGORIES, DISCOUNT_LEVELS, PAYMENT_METHODS, REGIONS};
use crate::domain::{format_timestamp, RawDataset, RawTransaction};

/// Counts of deliberately injected defects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectionSummary {
    pub missing_customer_ids: usize,
    pub duplicate_ids: usize,
    pub invalid_quantities: usize,
}

#[derive(Debug, Clone)]
pub struct GeneratedDataset {
    pub records: RawDataset,
    pub injected: InjectionSummary,
}

/// Synthesize a seeded transaction dataset with a known share of defects.
///
/// Rows with a removed customer id, rows reusing another transaction id, rows
/// with a negative quantity, and the rows whose ids get reused are disjoint
/// sets, so downstream drop and duplicate counts match the injected counts.
pub fn generate(config: &IngestionConfig) -> GeneratedDataset {
    let n = config.synthetic_records;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut records: RawDataset = (0..n)
        .map(|i| {
            let quantity: i64 = rng.gen_range(1..10);
            let unit_price = round_cents(rng.gen_range(10.0..500.0));
            let discount = *DISCOUNT_LEVELS.choose(&mut rng).unwrap_or(&0.0);
            let total = round_cents(quantity as f64 * unit_price * (1.0 - discount));
            let timestamp = config.start_timestamp + Duration::hours(i as i64);

            RawTransaction {
                transaction_id: Some(format!("TXN-{:06}", i + 1)),
                timestamp: Some(format_timestamp(&timestamp)),
                customer_id: Some(format!("CUST-{:04}", rng.gen_range(1..1000))),
                product_id: Some(format!("PROD-{:03}", rng.gen_range(1..50))),
                product_category: pick(&CATEGORIES, &mut rng),
                quantity: Some(quantity.to_string()),
                unit_price: Some(format!("{:.2}", unit_price)),
                total_amount: Some(format!("{:.2}", total)),
                region: pick(&REGIONS, &mut rng),
                payment_method: pick(&PAYMENT_METHODS, &mut rng),
                discount_applied: Some(discount.to_string()),
                unit_cost: None,
            }
        })
        .collect();

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);

    let missing = share(n, config.missing_rate);
    let duplicates = share(n, config.duplicate_rate);
    let invalid = share(n, config.invalid_quantity_rate);

    let (missing_idx, rest) = indices.split_at(missing.min(indices.len()));
    let (duplicate_idx, rest) = rest.split_at(duplicates.min(rest.len()));
    let (invalid_idx, clean_idx) = rest.split_at(invalid.min(rest.len()));

    for &i in missing_idx {
        records[i].customer_id = None;
    }

    let mut injected_duplicates = 0;
    if !clean_idx.is_empty() {
        for &i in duplicate_idx {
            let source = clean_idx[rng.gen_range(0..clean_idx.len())];
            records[i].transaction_id = records[source].transaction_id.clone();
            injected_duplicates += 1;
        }
    }

    for &i in invalid_idx {
        records[i].quantity = Some("-1".to_string());
    }

    GeneratedDataset {
        records,
        injected: InjectionSummary {
            missing_customer_ids: missing_idx.len(),
            duplicate_ids: injected_duplicates,
            invalid_quantities: invalid_idx.len(),
        },
    }
}

fn pick(options: &[&str], rng: &mut StdRng) -> Option<String> {
    options.choose(rng).map(|s| s.to_string())
}

fn share(n: usize, rate: f64) -> usize {
    (n as f64 * rate).round() as usize
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
