use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use polars::prelude::*;
use thiserror::Error;
use tracing::{info, warn};

pub const PROVINCE_COLUMN: &str = "Province/State";
pub const COUNTRY_COLUMN: &str = "Country/Region";
pub const LAT_COLUMN: &str = "Lat";
pub const LONG_COLUMN: &str = "Long";

const METADATA_COLUMNS: [&str; 4] = [PROVINCE_COLUMN, COUNTRY_COLUMN, LAT_COLUMN, LONG_COLUMN];
const TOTAL_ALIAS: &str = "__total";
const INFER_SCHEMA_ROWS: usize = 1000;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("expected column {0:?} is missing")]
    MissingColumn(String),
    #[error("latest column {0:?} is not a case count column")]
    NotAValueColumn(String),
    #[error("failed to process CSV data: {0}")]
    Polars(#[from] PolarsError),
}

/// 被求和的列
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueColumn {
    Named(String),
    /// 最后一列，即时间序列里最新的日期
    Latest,
}

impl ValueColumn {
    /// 在表头中找到实际的列名
    pub fn resolve<'a>(&'a self, columns: &[&'a str]) -> Result<&'a str, AggregateError> {
        match self {
            ValueColumn::Named(name) => columns
                .iter()
                .find(|c| **c == *name)
                .copied()
                .ok_or_else(|| AggregateError::MissingColumn(name.clone())),
            ValueColumn::Latest => {
                let last = columns
                    .last()
                    .copied()
                    .ok_or_else(|| AggregateError::MissingColumn("<latest>".to_string()))?;
                if METADATA_COLUMNS.contains(&last) {
                    return Err(AggregateError::NotAValueColumn(last.to_string()));
                }
                Ok(last)
            }
        }
    }
}

impl FromStr for ValueColumn {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("latest") {
            Ok(ValueColumn::Latest)
        } else {
            Ok(ValueColumn::Named(s.to_string()))
        }
    }
}

impl fmt::Display for ValueColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueColumn::Named(name) => f.write_str(name),
            ValueColumn::Latest => f.write_str("latest"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryTotal {
    pub country: String,
    pub total: u64,
}

/// 按国家汇总后的结果，总数降序，相同总数按国家名升序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    value_column: String,
    entries: Vec<CountryTotal>,
}

impl Aggregate {
    pub fn new(value_column: impl Into<String>, mut entries: Vec<CountryTotal>) -> Self {
        entries.sort_by(rank);
        Self {
            value_column: value_column.into(),
            entries,
        }
    }

    pub fn value_column(&self) -> &str {
        &self.value_column
    }

    pub fn entries(&self) -> &[CountryTotal] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn grand_total(&self) -> u64 {
        self.entries.iter().map(|e| e.total).sum()
    }

    pub fn get(&self, country: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| e.country == country)
            .map(|e| e.total)
    }

    /// 取前 n 个，`None` 表示不限制
    pub fn top(&self, n: Option<usize>) -> &[CountryTotal] {
        let n = n.unwrap_or(self.entries.len()).min(self.entries.len());
        &self.entries[..n]
    }
}

fn rank(a: &CountryTotal, b: &CountryTotal) -> Ordering {
    b.total
        .cmp(&a.total)
        .then_with(|| a.country.cmp(&b.country))
}

fn has_data_rows(csv_text: &str) -> bool {
    csv_text.lines().filter(|l| !l.trim().is_empty()).nth(1).is_some()
}

/// 解析 CSV，按 `Country/Region` 分组，对 value 列求和
pub fn aggregate_by_country(
    csv_text: &str,
    value_column: &ValueColumn,
) -> Result<Aggregate, AggregateError> {
    if !has_data_rows(csv_text) {
        warn!("CSV data has no rows, nothing to aggregate");
        return Ok(Aggregate::default());
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .into_reader_with_file_handle(Cursor::new(csv_text.as_bytes()))
        .finish()?;

    info!("DataFrame shape: {:?}", df.shape());

    let columns = df.get_column_names();
    if !columns.contains(&COUNTRY_COLUMN) {
        return Err(AggregateError::MissingColumn(COUNTRY_COLUMN.to_string()));
    }
    let value_name = value_column.resolve(&columns)?.to_string();
    info!("aggregating column {:?} by {:?}", value_name, COUNTRY_COLUMN);

    // NaN、inf 和缺失值都按 0 计入，逐行处理后再求和
    let value = col(&value_name).cast(DataType::Float64);
    let grouped = df
        .lazy()
        .group_by([col(COUNTRY_COLUMN).cast(DataType::String)])
        .agg([when(value.clone().is_finite())
            .then(value)
            .otherwise(lit(0.0))
            .sum()
            .alias(TOTAL_ALIAS)])
        .collect()?;

    let countries = grouped.column(COUNTRY_COLUMN)?.str()?;
    let totals = grouped.column(TOTAL_ALIAS)?.f64()?;

    let mut merged: HashMap<String, u64> = HashMap::with_capacity(grouped.height());
    let mut skipped = 0usize;
    for (country, total) in countries.into_iter().zip(totals.into_iter()) {
        match country {
            Some(country) => {
                *merged.entry(country.to_string()).or_default() += coerce_count(total);
            }
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("skipped {} group(s) without a {:?} value", skipped, COUNTRY_COLUMN);
    }

    let entries = merged
        .into_iter()
        .map(|(country, total)| CountryTotal { country, total })
        .collect();
    let aggregate = Aggregate::new(value_name, entries);

    info!("Data cleaned and analyzed: {} countries.", aggregate.len());
    Ok(aggregate)
}

fn coerce_count(value: Option<f64>) -> u64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v.round() as u64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = "\
Province/State,Country/Region,Lat,Long,Confirmed
,US,40.0,-100.0,10
NY,US,42.0,-75.0,20
,France,46.0,2.0,5
";

    const TIME_SERIES: &str = "\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20
,Italy,41.9,12.6,1,3
,Spain,40.5,-3.7,2,7
Hubei,China,30.9,112.3,4,4
Beijing,China,40.2,116.4,0,1
";

    fn named(name: &str) -> ValueColumn {
        ValueColumn::Named(name.to_string())
    }

    #[test]
    fn provinces_are_summed_per_country() {
        let agg = aggregate_by_country(SNAPSHOT, &named("Confirmed")).unwrap();
        let order: Vec<_> = agg.entries().iter().map(|e| e.country.as_str()).collect();
        assert_eq!(order, ["US", "France"]);
        assert_eq!(agg.get("US"), Some(30));
        assert_eq!(agg.get("France"), Some(5));
        assert_eq!(agg.grand_total(), 35);
        assert_eq!(agg.value_column(), "Confirmed");
    }

    #[test]
    fn latest_picks_last_date_column() {
        let agg = aggregate_by_country(TIME_SERIES, &ValueColumn::Latest).unwrap();
        assert_eq!(agg.value_column(), "1/23/20");
        assert_eq!(agg.get("Spain"), Some(7));
        assert_eq!(agg.get("China"), Some(5));
        assert_eq!(agg.get("Italy"), Some(3));
        assert!(agg
            .entries()
            .windows(2)
            .all(|w| w[0].total >= w[1].total));
    }

    #[test]
    fn missing_value_counts_as_zero() {
        let csv = "\
Province/State,Country/Region,Lat,Long,Confirmed
,US,0,0,10
NY,US,0,0,
,Chad,0,0,
,Chile,0,0,4
Magallanes,Chile,0,0,NaN
";
        let agg = aggregate_by_country(csv, &named("Confirmed")).unwrap();
        assert_eq!(agg.get("US"), Some(10));
        assert_eq!(agg.get("Chad"), Some(0));
        assert_eq!(agg.get("Chile"), Some(4));
    }

    #[test]
    fn infinite_cell_does_not_erase_country_total() {
        let csv = "\
Country/Region,Confirmed
US,10
US,inf
Peru,-inf
Peru,3
";
        let agg = aggregate_by_country(csv, &named("Confirmed")).unwrap();
        assert_eq!(agg.get("US"), Some(10));
        assert_eq!(agg.get("Peru"), Some(3));
        assert_eq!(agg.grand_total(), 13);
    }

    #[test]
    fn equal_totals_are_ordered_by_name() {
        let csv = "\
Country/Region,Confirmed
Peru,4
Chile,4
Zambia,9
Angola,4
";
        let agg = aggregate_by_country(csv, &named("Confirmed")).unwrap();
        let order: Vec<_> = agg.entries().iter().map(|e| e.country.as_str()).collect();
        assert_eq!(order, ["Zambia", "Angola", "Chile", "Peru"]);
    }

    #[test]
    fn header_only_yields_empty_aggregate() {
        let csv = "Province/State,Country/Region,Lat,Long,Confirmed\n";
        let agg = aggregate_by_country(csv, &named("Confirmed")).unwrap();
        assert!(agg.is_empty());
        assert!(aggregate_by_country("", &ValueColumn::Latest).unwrap().is_empty());
    }

    #[test]
    fn absent_value_column_is_an_error() {
        let err = aggregate_by_country(SNAPSHOT, &named("Deaths")).unwrap_err();
        assert!(matches!(err, AggregateError::MissingColumn(ref c) if c == "Deaths"));
    }

    #[test]
    fn absent_country_column_is_an_error() {
        let csv = "Region,Confirmed\nUS,1\n";
        let err = aggregate_by_country(csv, &named("Confirmed")).unwrap_err();
        assert!(matches!(err, AggregateError::MissingColumn(ref c) if c == COUNTRY_COLUMN));
    }

    #[test]
    fn latest_rejects_metadata_column() {
        let csv = "Confirmed,Country/Region\n1,US\n";
        let err = aggregate_by_country(csv, &ValueColumn::Latest).unwrap_err();
        assert!(matches!(err, AggregateError::NotAValueColumn(_)));
    }

    #[test]
    fn top_is_clamped() {
        let agg = aggregate_by_country(SNAPSHOT, &named("Confirmed")).unwrap();
        assert_eq!(agg.top(Some(1)).len(), 1);
        assert_eq!(agg.top(Some(50)).len(), 2);
        assert_eq!(agg.top(None).len(), 2);
        assert_eq!(agg.top(Some(1))[0].country, "US");
    }

    #[test]
    fn value_column_parses_latest_keyword() {
        assert_eq!("LATEST".parse::<ValueColumn>().unwrap(), ValueColumn::Latest);
        assert_eq!("Confirmed".parse::<ValueColumn>().unwrap(), named("Confirmed"));
    }
}
