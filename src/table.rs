//! Materialized tables shared by the CSV, workbook and statistics writers.

use crate::domain::{format_timestamp, Transaction};

/// A typed cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
    Number(f64),
    Bool(bool),
    Empty,
}

impl Cell {
    /// Numeric view used by summary statistics; text, flags and blanks are not numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Cell::Int(_) | Cell::Number(_))
    }

    /// Text rendering for CSV; non-finite numbers become blanks
    pub fn render(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Int(v) => v.to_string(),
            Cell::Number(v) if v.is_finite() => v.to_string(),
            Cell::Number(_) | Cell::Empty => String::new(),
            Cell::Bool(b) => b.to_string(),
        }
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map(Cell::Number).unwrap_or(Cell::Empty)
    }
}

/// Row types that can be laid out as a header plus typed cells
pub trait Tabular {
    fn headers() -> Vec<&'static str>;
    fn cells(&self) -> Vec<Cell>;
}

/// A named table ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn from_rows<T: Tabular>(name: &str, rows: &[T]) -> Self {
        Self {
            name: name.to_string(),
            headers: T::headers().into_iter().map(String::from).collect(),
            rows: rows.iter().map(Tabular::cells).collect(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Indices of columns whose non-blank cells are all numeric (and at least
    /// one exists, or the table is empty and the column is numeric by type)
    pub fn numeric_columns(&self, typed_hint: &[bool]) -> Vec<usize> {
        (0..self.headers.len())
            .filter(|&col| {
                let mut seen_numeric = false;
                for row in &self.rows {
                    match row.get(col) {
                        Some(Cell::Empty) | None => {}
                        Some(cell) if cell.is_numeric() => seen_numeric = true,
                        Some(_) => return false,
                    }
                }
                seen_numeric || typed_hint.get(col).copied().unwrap_or(false)
            })
            .collect()
    }
}

impl Tabular for Transaction {
    fn headers() -> Vec<&'static str> {
        vec![
            "transaction_id",
            "timestamp",
            "customer_id",
            "product_id",
            "product_category",
            "quantity",
            "unit_price",
            "total_amount",
            "region",
            "payment_method",
            "discount_applied",
            "unit_cost",
            "date",
            "year",
            "month",
            "day",
            "hour",
            "day_of_week",
            "week_of_year",
            "is_weekend",
            "time_of_day",
            "gross_revenue",
            "discount_amount",
            "net_revenue",
            "revenue",
            "has_discount",
            "discount_tier",
            "price_tier",
            "profit",
            "profit_margin",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        let d = &self.derived;
        vec![
            Cell::Text(self.transaction_id.clone()),
            Cell::Text(format_timestamp(&self.timestamp)),
            Cell::Text(self.customer_id.clone()),
            Cell::Text(self.product_id.clone()),
            Cell::Text(self.product_category.clone()),
            Cell::Int(self.quantity),
            Cell::Number(self.unit_price),
            Cell::Number(self.total_amount),
            Cell::Text(self.region.clone()),
            Cell::Text(self.payment_method.clone()),
            Cell::Number(self.discount_applied),
            Cell::from(self.unit_cost),
            Cell::Text(d.date.to_string()),
            Cell::Int(d.year as i64),
            Cell::Int(d.month as i64),
            Cell::Int(d.day as i64),
            Cell::Int(d.hour as i64),
            Cell::Text(d.day_of_week.clone()),
            Cell::Int(d.week_of_year as i64),
            Cell::Bool(d.is_weekend),
            Cell::Text(d.time_of_day.as_str().to_string()),
            Cell::Number(d.gross_revenue),
            Cell::Number(d.discount_amount),
            Cell::Number(d.net_revenue),
            Cell::Number(d.revenue),
            Cell::Bool(d.has_discount),
            Cell::Text(d.discount_tier.as_str().to_string()),
            Cell::Text(d.price_tier.as_str().to_string()),
            Cell::from(d.profit),
            Cell::from(d.profit_margin),
        ]
    }
}

/// Columns of the processed dataset that are numeric by type
pub fn transaction_numeric_hint() -> Vec<bool> {
    const NUMERIC: [&str; 16] = [
        "quantity",
        "unit_price",
        "total_amount",
        "discount_applied",
        "unit_cost",
        "year",
        "month",
        "day",
        "hour",
        "week_of_year",
        "gross_revenue",
        "discount_amount",
        "net_revenue",
        "revenue",
        "profit",
        "profit_margin",
    ];
    Transaction::headers()
        .iter()
        .map(|h| NUMERIC.contains(h))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_blanks_non_finite_numbers() {
        assert_eq!(Cell::Number(f64::NAN).render(), "");
        assert_eq!(Cell::Number(1.5).render(), "1.5");
        assert_eq!(Cell::Int(3).render(), "3");
        assert_eq!(Cell::Bool(true).render(), "true");
        assert_eq!(Cell::Empty.render(), "");
    }

    #[test]
    fn test_numeric_columns_skip_text_and_respect_hint_on_empty_tables() {
        let table = Table {
            name: "t".to_string(),
            headers: vec!["id".to_string(), "amount".to_string(), "cost".to_string()],
            rows: vec![
                vec![Cell::Text("a".into()), Cell::Number(1.0), Cell::Empty],
                vec![Cell::Text("b".into()), Cell::Int(2), Cell::Empty],
            ],
        };
        assert_eq!(table.numeric_columns(&[]), vec![1]);
        assert_eq!(table.numeric_columns(&[false, true, true]), vec![1, 2]);

        let empty = Table { rows: Vec::new(), ..table };
        assert_eq!(empty.numeric_columns(&[false, true, true]), vec![1, 2]);
        assert!(empty.numeric_columns(&[]).is_empty());
    }

    #[test]
    fn test_transaction_headers_match_cells_and_hint() {
        assert_eq!(Transaction::headers().len(), transaction_numeric_hint().len());
    }
}
