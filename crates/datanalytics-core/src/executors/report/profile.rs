//! Univariate column profiling (no pairwise analysis).

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::ports::Table;

/// Cell values read as missing.
const MISSING_MARKERS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// Most frequent values listed for categorical columns.
const TOP_VALUES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetProfile {
    pub rows: usize,
    pub columns: Vec<ColumnProfile>,
}

impl DatasetProfile {
    pub fn missing_cells(&self) -> usize {
        self.columns.iter().map(|c| c.missing).sum()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    /// Non-missing values.
    pub present: usize,
    pub missing: usize,
    pub distinct: usize,
    pub summary: ColumnSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSummary {
    Numeric(NumericSummary),
    Categorical { top: Vec<ValueCount> },
    /// Every cell is missing.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; absent below two values.
    pub std_dev: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

fn is_missing(cell: &str) -> bool {
    MISSING_MARKERS.contains(&cell.trim())
}

pub fn profile_table(table: &Table) -> DatasetProfile {
    let columns = table
        .columns
        .iter()
        .enumerate()
        .map(|(index, name)| profile_column(name, table.column(index)))
        .collect();

    DatasetProfile {
        rows: table.row_count(),
        columns,
    }
}

fn profile_column<'a>(name: &str, cells: impl Iterator<Item = &'a str>) -> ColumnProfile {
    let mut missing = 0;
    let mut values = Vec::new();
    for cell in cells {
        if is_missing(cell) {
            missing += 1;
        } else {
            values.push(cell.trim());
        }
    }
    let distinct = values.iter().collect::<HashSet<_>>().len();

    let summary = if values.is_empty() {
        ColumnSummary::Empty
    } else {
        let numbers: Option<Vec<f64>> = values.iter().map(|v| v.parse::<f64>().ok()).collect();
        match numbers {
            Some(numbers) => ColumnSummary::Numeric(summarize_numbers(numbers)),
            None => ColumnSummary::Categorical {
                top: top_values(&values),
            },
        }
    };

    ColumnProfile {
        name: name.to_string(),
        present: values.len(),
        missing,
        distinct,
        summary,
    }
}

fn summarize_numbers(mut numbers: Vec<f64>) -> NumericSummary {
    numbers.sort_by(f64::total_cmp);
    let n = numbers.len();
    let mean = numbers.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 1 {
        numbers[n / 2]
    } else {
        (numbers[n / 2 - 1] + numbers[n / 2]) / 2.0
    };
    let std_dev = (n >= 2).then(|| {
        let var = numbers.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        var.sqrt()
    });

    NumericSummary {
        min: numbers[0],
        max: numbers[n - 1],
        mean,
        median,
        std_dev,
    }
}

fn top_values(values: &[&str]) -> Vec<ValueCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(*value).or_default() += 1;
    }
    let mut counts: Vec<ValueCount> = counts
        .into_iter()
        .map(|(value, count)| ValueCount {
            value: value.to_string(),
            count,
        })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    counts.truncate(TOP_VALUES);
    counts
}
