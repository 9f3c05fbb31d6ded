/// Column names and fixed vocabularies shared across the pipeline stages

// Input schema columns
pub const COL_TRANSACTION_ID: &str = "transaction_id";
pub const COL_TIMESTAMP: &str = "timestamp";
pub const COL_CUSTOMER_ID: &str = "customer_id";
pub const COL_PRODUCT_ID: &str = "product_id";
pub const COL_PRODUCT_CATEGORY: &str = "product_category";
pub const COL_QUANTITY: &str = "quantity";
pub const COL_UNIT_PRICE: &str = "unit_price";
pub const COL_TOTAL_AMOUNT: &str = "total_amount";
pub const COL_REGION: &str = "region";
pub const COL_PAYMENT_METHOD: &str = "payment_method";
pub const COL_DISCOUNT_APPLIED: &str = "discount_applied";

// Optional input column; enables profit columns when present
pub const COL_UNIT_COST: &str = "unit_cost";

/// Columns every input file must carry
pub const REQUIRED_COLUMNS: [&str; 11] = [
    COL_TRANSACTION_ID,
    COL_TIMESTAMP,
    COL_CUSTOMER_ID,
    COL_PRODUCT_ID,
    COL_PRODUCT_CATEGORY,
    COL_QUANTITY,
    COL_UNIT_PRICE,
    COL_TOTAL_AMOUNT,
    COL_REGION,
    COL_PAYMENT_METHOD,
    COL_DISCOUNT_APPLIED,
];

// Vocabularies used by the synthetic generator
pub const CATEGORIES: [&str; 4] = ["Electronics", "Clothing", "Food", "Home"];
pub const REGIONS: [&str; 4] = ["North", "South", "East", "West"];
pub const PAYMENT_METHODS: [&str; 4] = ["Credit Card", "Debit Card", "Cash", "Mobile"];
pub const DISCOUNT_LEVELS: [f64; 5] = [0.0, 0.05, 0.10, 0.15, 0.20];

// Sentinels for missing non-critical values
pub const UNKNOWN_PRODUCT_ID: &str = "UNKNOWN";
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Largest accepted quantity (2^53, exact in f64 arithmetic)
pub const MAX_QUANTITY: i64 = 1 << 53;

// Timestamp format used when writing datasets back out
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Run stamp suffix appended to every artifact
pub const RUN_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// Aggregation view names (also artifact file stems)
pub const VIEW_DAILY: &str = "daily_summary";
pub const VIEW_PRODUCT: &str = "product_summary";
pub const VIEW_CUSTOMER: &str = "customer_summary";
pub const VIEW_REGIONAL: &str = "regional_summary";
pub const VIEW_HOURLY: &str = "hourly_patterns";

/// Excel sheet names are limited to 31 characters
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Workbook sheet name for an aggregation view ("daily_summary" -> "Daily_Summary")
pub fn sheet_name(view: &str) -> String {
    let name = view
        .split('_')
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join("_");
    name.chars().take(MAX_SHEET_NAME_LEN).collect()
}

/// Trim and title-case free text ("  credit CARD " -> "Credit Card")
pub fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => std::iter::once(upper_single(first))
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Uppercase form of `c` when it is one char ("ß" would become "SS", so it stays)
fn upper_single(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}
