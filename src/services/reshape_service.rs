//! Wide-to-long reshaping of exported indicator reports
//!
//! A report row is one company: four identifier columns followed by one
//! column per indicator and period. Each indicator header packs several
//! lines: the indicator name, a period (`2024-03-31` or `Q1-2024`) and an
//! optional `Đơn vị: <unit>` line.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::models::table::{Cell, Table};
use crate::utils::errors::ReshapeError;

const ID_COLUMNS: [&str; 4] = ["ticker", "company_name", "exchange", "industry"];
const UNIT_MARKER: &str = "Đơn vị:";
const NO_PERIOD: &str = "N/A";

lazy_static! {
    static ref DATE_RE: Regex = Regex::new(r"(\d{4}-\d{2}-\d{2})").unwrap();
    static ref QUARTER_RE: Regex = Regex::new(r"(Q\d-\d{4})").unwrap();
}

/// Scale applied to a source unit and the unit it becomes
struct UnitRule {
    unit: &'static str,
    multiplier: f64,
    new_unit: &'static str,
}

const UNIT_RULES: [UnitRule; 2] = [
    UnitRule { unit: "Nghìn VND", multiplier: 1_000.0, new_unit: "VND" },
    UnitRule { unit: "Tỷ VND", multiplier: 1_000_000_000.0, new_unit: "VND" },
];

/// Reporting period parsed from an indicator header
#[derive(Debug, Clone, PartialEq)]
pub enum Period {
    Date(NaiveDate),
    Quarter(String),
    NotAvailable,
}

impl From<&Period> for Cell {
    fn from(period: &Period) -> Self {
        match period {
            Period::Date(d) => Cell::Date(*d),
            Period::Quarter(q) => Cell::Text(q.clone()),
            Period::NotAvailable => Cell::Text(NO_PERIOD.to_string()),
        }
    }
}

/// Parsed multi-line indicator header
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorHeader {
    pub name: String,
    pub period: Period,
    pub unit: Option<String>,
}

/// One value in long format
#[derive(Debug, Clone, PartialEq)]
pub struct LongRecord {
    pub ticker: Cell,
    pub industry: Cell,
    pub name: String,
    pub period: Period,
    pub unit: Option<String>,
    pub value: f64,
}

/// Split a packed header into name, period and unit
pub fn parse_indicator_header(header: &str) -> IndicatorHeader {
    let lines: Vec<&str> = header.trim().split('\n').collect();
    let name = lines.first().map(|l| l.to_string()).unwrap_or_default();

    let rest = lines.get(1..).unwrap_or_default().join(" ");
    let period = if let Some(m) = DATE_RE.captures(&rest).and_then(|c| c.get(1)) {
        match NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d") {
            Ok(date) => Period::Date(date),
            Err(_) => Period::NotAvailable,
        }
    } else if let Some(m) = QUARTER_RE.captures(&rest).and_then(|c| c.get(1)) {
        Period::Quarter(m.as_str().to_string())
    } else {
        Period::NotAvailable
    };

    let unit = lines
        .last()
        .filter(|l| l.contains(UNIT_MARKER))
        .map(|l| l.replace(UNIT_MARKER, "").trim().to_string());

    IndicatorHeader { name, period, unit }
}

/// Convert a value to the base unit when a rule exists for its unit
pub fn normalize_unit(value: f64, unit: Option<&str>) -> (f64, Option<String>) {
    match unit {
        Some(u) => match UNIT_RULES.iter().find(|r| r.unit == u) {
            Some(rule) => (value * rule.multiplier, Some(rule.new_unit.to_string())),
            None => (value, Some(u.to_string())),
        },
        None => (value, None),
    }
}

/// Melt a wide report into one record per non-empty indicator value
///
/// The first four columns identify the company; every other column is an
/// indicator. Missing values are dropped and known units are normalized.
pub fn transform_to_long_format(table: &Table) -> Result<Vec<LongRecord>, ReshapeError> {
    if table.columns.len() < ID_COLUMNS.len() {
        return Err(ReshapeError::MissingIdentifierColumns {
            expected: ID_COLUMNS.len(),
            found: table.columns.len(),
        });
    }

    let headers: Vec<IndicatorHeader> = table.columns[ID_COLUMNS.len()..]
        .iter()
        .map(|h| parse_indicator_header(h))
        .collect();

    let mut records = Vec::new();
    for (col_offset, header) in headers.iter().enumerate() {
        let col = ID_COLUMNS.len() + col_offset;
        for row in &table.rows {
            let Some(raw) = row[col].as_f64() else {
                continue;
            };
            let (value, unit) = normalize_unit(raw, header.unit.as_deref());
            records.push(LongRecord {
                ticker: row[0].clone(),
                industry: row[3].clone(),
                name: header.name.clone(),
                period: header.period.clone(),
                unit,
                value,
            });
        }
    }

    tracing::debug!(
        "Reshaped {} rows x {} indicators into {} records",
        table.len(),
        headers.len(),
        records.len()
    );
    Ok(records)
}

/// Long records as a `(ticker, industry, name, period, unit, value)` table
pub fn records_to_table(records: &[LongRecord]) -> Table {
    let mut table = Table::new(["ticker", "industry", "name", "period", "unit", "value"]);
    for r in records {
        table.push_row(vec![
            r.ticker.clone(),
            r.industry.clone(),
            Cell::Text(r.name.clone()),
            Cell::from(&r.period),
            r.unit.clone().into(),
            Cell::Number(r.value),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> Table {
        let mut table = Table::new([
            "Mã CK",
            "Tên công ty",
            "Sàn",
            "Ngành",
            "Doanh thu thuần\nQ1-2024\nĐơn vị: Tỷ VND",
            "Giá đóng cửa\n2024-03-29\nĐơn vị: Nghìn VND",
            "P/E\nHợp nhất",
        ]);
        table.push_row(vec![
            "FPT".into(),
            "FPT Corp".into(),
            "HOSE".into(),
            "Công nghệ".into(),
            Cell::Number(12.5),
            Cell::Number(105.3),
            Cell::Null,
        ]);
        table.push_row(vec![
            "VNM".into(),
            "Vinamilk".into(),
            "HOSE".into(),
            "Thực phẩm".into(),
            Cell::Null,
            "n/a".into(),
            Cell::Number(15.1),
        ]);
        table
    }

    #[test]
    fn test_parse_header_with_quarter_and_unit() {
        let header = parse_indicator_header("Doanh thu thuần\nQ1-2024\nĐơn vị: Tỷ VND");
        assert_eq!(header.name, "Doanh thu thuần");
        assert_eq!(header.period, Period::Quarter("Q1-2024".to_string()));
        assert_eq!(header.unit.as_deref(), Some("Tỷ VND"));
    }

    #[test]
    fn test_parse_header_date_wins_over_quarter() {
        let header = parse_indicator_header("Giá\nQ4-2023 2024-01-02");
        assert_eq!(header.period, Period::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()));
        assert_eq!(header.unit, None);
    }

    #[test]
    fn test_parse_header_without_period() {
        let header = parse_indicator_header("  P/E\nHợp nhất  ");
        assert_eq!(header.name, "P/E");
        assert_eq!(header.period, Period::NotAvailable);
    }

    #[test]
    fn test_normalize_unit() {
        assert_eq!(normalize_unit(2.0, Some("Tỷ VND")), (2_000_000_000.0, Some("VND".to_string())));
        assert_eq!(normalize_unit(2.5, Some("Nghìn VND")), (2_500.0, Some("VND".to_string())));
        assert_eq!(normalize_unit(3.0, Some("%")), (3.0, Some("%".to_string())));
        assert_eq!(normalize_unit(3.0, None), (3.0, None));
    }

    #[test]
    fn test_transform_drops_nulls_and_scales_values() {
        let records = transform_to_long_format(&report()).unwrap();

        // FPT revenue, FPT close, VNM P/E; VNM revenue is empty and its close unreadable
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].ticker, Cell::Text("FPT".to_string()));
        assert_eq!(records[0].industry, Cell::Text("Công nghệ".to_string()));
        assert_eq!(records[0].value, 12_500_000_000.0);
        assert_eq!(records[0].unit.as_deref(), Some("VND"));

        assert!((records[1].value - 105_300.0).abs() < 1e-6);
        assert_eq!(records[1].period, Period::Date(NaiveDate::from_ymd_opt(2024, 3, 29).unwrap()));

        assert_eq!(records[2].name, "P/E");
        assert_eq!(records[2].value, 15.1);
        assert_eq!(records[2].unit, None);
    }

    #[test]
    fn test_transform_requires_identifier_columns() {
        let table = Table::new(["ticker", "name"]);
        let err = transform_to_long_format(&table).unwrap_err();
        assert!(matches!(err, ReshapeError::MissingIdentifierColumns { expected: 4, found: 2 }));
    }

    #[test]
    fn test_records_to_table() {
        let records = transform_to_long_format(&report()).unwrap();
        let table = records_to_table(&records);

        assert_eq!(table.columns, vec!["ticker", "industry", "name", "period", "unit", "value"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[0][3], Cell::Text("Q1-2024".to_string()));
        assert_eq!(table.rows[2][3], Cell::Text("N/A".to_string()));
        assert_eq!(table.rows[2][4], Cell::Null);
    }
}
