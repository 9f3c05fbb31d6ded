//! Describe-style summary statistics over the numeric columns of a table.

use crate::table::{Cell, Table};

pub const SUMMARY_STATS: &str = "summary_stats";

/// Row labels of the statistics table, in order
pub const STATISTICS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

/// One column's statistics; `None` where the value is undefined
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1 denominator)
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub q3: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnStats {
    pub fn from_values(mut values: Vec<f64>) -> Self {
        values.sort_by(f64::total_cmp);
        let n = values.len();
        let mean = (n > 0).then(|| values.iter().sum::<f64>() / n as f64);
        let std = match mean {
            Some(m) if n > 1 => {
                let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
                Some((ss / (n - 1) as f64).sqrt())
            }
            _ => None,
        };

        Self {
            count: n,
            mean,
            std,
            min: values.first().copied(),
            q1: quantile(&values, 0.25),
            median: quantile(&values, 0.50),
            q3: quantile(&values, 0.75),
            max: values.last().copied(),
        }
    }

    fn cells(&self) -> [Cell; 8] {
        [
            Cell::Int(self.count as i64),
            Cell::from(self.mean),
            Cell::from(self.std),
            Cell::from(self.min),
            Cell::from(self.q1),
            Cell::from(self.median),
            Cell::from(self.q3),
            Cell::from(self.max),
        ]
    }
}

/// Linear interpolation between closest ranks over sorted values
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Statistics table: one row per statistic, one column per numeric column
pub fn describe(table: &Table, numeric_hint: &[bool]) -> Table {
    let columns = table.numeric_columns(numeric_hint);
    let stats: Vec<ColumnStats> = columns
        .iter()
        .map(|&col| {
            let values = table
                .rows
                .iter()
                .filter_map(|row| row.get(col).and_then(Cell::as_f64))
                .collect();
            ColumnStats::from_values(values)
        })
        .collect();

    let mut headers = vec!["statistic".to_string()];
    headers.extend(columns.iter().map(|&col| table.headers[col].clone()));

    let per_column: Vec<[Cell; 8]> = stats.iter().map(ColumnStats::cells).collect();
    let rows = STATISTICS
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let mut row = vec![Cell::Text(label.to_string())];
            row.extend(per_column.iter().map(|cells| cells[i].clone()));
            row
        })
        .collect();

    Table {
        name: SUMMARY_STATS.to_string(),
        headers,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_stats_match_describe_conventions() {
        let stats = ColumnStats::from_values(vec![4.0, 1.0, 3.0, 2.0]);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean, Some(2.5));
        assert!((stats.std.unwrap() - 1.2909944487358056).abs() < 1e-12);
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.q1, Some(1.75));
        assert_eq!(stats.median, Some(2.5));
        assert_eq!(stats.q3, Some(3.25));
        assert_eq!(stats.max, Some(4.0));
    }

    #[test]
    fn test_single_value_has_no_std() {
        let stats = ColumnStats::from_values(vec![7.0]);
        assert_eq!(stats.std, None);
        assert_eq!(stats.median, Some(7.0));
    }

    #[test]
    fn test_describe_skips_text_and_keeps_typed_empty_columns() {
        let table = Table {
            name: "t".to_string(),
            headers: vec!["id".to_string(), "amount".to_string()],
            rows: vec![
                vec![Cell::Text("a".into()), Cell::Number(10.0)],
                vec![Cell::Text("b".into()), Cell::Int(20)],
            ],
        };
        let described = describe(&table, &[]);
        assert_eq!(described.headers, vec!["statistic", "amount"]);
        assert_eq!(described.rows.len(), STATISTICS.len());
        assert_eq!(described.rows[1][1], Cell::Number(15.0));

        let empty = Table { rows: Vec::new(), ..table };
        let described = describe(&empty, &[false, true]);
        assert_eq!(described.rows[0][1], Cell::Int(0));
        assert_eq!(described.rows[1][1], Cell::Empty);
    }
}
