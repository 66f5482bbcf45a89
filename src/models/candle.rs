//! OHLCV candles and the indicator-annotated price frame fed to the chart

use chrono::NaiveDate;

use crate::models::table::{Cell, Table};
use crate::utils::errors::ReshapeError;

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

/// A named indicator series aligned index-for-index with the candles
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl IndicatorColumn {
    /// Index and value of the last non-missing point
    pub fn last_valid(&self) -> Option<(usize, f64)> {
        self.values
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, v)| v.map(|v| (i, v)))
    }

    pub fn is_all_missing(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Min and max over the present values
    pub fn bounds(&self) -> Option<(f64, f64)> {
        self.values.iter().flatten().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// Candles in date order plus their indicator columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceFrame {
    pub candles: Vec<Candle>,
    pub columns: Vec<IndicatorColumn>,
}

const PRICE_COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

impl PriceFrame {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self { candles, columns: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn column(&self, name: &str) -> Option<&IndicatorColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// Add or replace an indicator column; values are padded or cut to the candle count
    pub fn set_column(&mut self, name: impl Into<String>, mut values: Vec<Option<f64>>) {
        let name = name.into();
        values.resize(self.candles.len(), None);
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(IndicatorColumn { name, values }),
        }
    }

    /// `max(high) - min(low)` over all candles
    pub fn price_range(&self) -> f64 {
        let high = self.candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let low = self.candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        if high.is_finite() && low.is_finite() {
            high - low
        } else {
            0.0
        }
    }

    pub fn max_volume(&self) -> f64 {
        self.candles.iter().map(|c| c.volume).fold(0.0, f64::max)
    }

    /// Build a frame from a fetched table
    ///
    /// Requires `date`, `open`, `high`, `low`, `close` and `volume` columns.
    /// Rows whose date or prices cannot be read are skipped; a missing volume
    /// counts as zero. Every other column with at least one numeric value is
    /// kept as an indicator column. Rows are ordered by date.
    pub fn from_table(table: &Table) -> Result<Self, ReshapeError> {
        let mut price_idx = [0usize; 6];
        for (slot, name) in price_idx.iter_mut().zip(PRICE_COLUMNS) {
            *slot = table
                .column_index(name)
                .ok_or_else(|| ReshapeError::MissingColumn(name.to_string()))?;
        }

        let extra: Vec<(usize, &String)> = table
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| !price_idx.contains(i))
            .collect();

        let mut rows: Vec<(Candle, Vec<Option<f64>>)> = Vec::with_capacity(table.len());
        let mut skipped = 0usize;
        for row in &table.rows {
            match candle_from_row(row, &price_idx) {
                Some(candle) => {
                    let values = extra.iter().map(|(i, _)| row[*i].as_f64()).collect();
                    rows.push((candle, values));
                }
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::warn!("Skipped {} rows with unreadable date or prices", skipped);
        }

        rows.sort_by_key(|(candle, _)| candle.date);

        let mut frame = PriceFrame::default();
        let mut columns: Vec<IndicatorColumn> = extra
            .iter()
            .map(|(_, name)| IndicatorColumn {
                name: (*name).clone(),
                values: Vec::with_capacity(rows.len()),
            })
            .collect();

        for (candle, values) in rows {
            frame.candles.push(candle);
            for (column, value) in columns.iter_mut().zip(values) {
                column.values.push(value);
            }
        }

        columns.retain(|c| !c.is_all_missing());
        frame.columns = columns;
        Ok(frame)
    }
}

fn candle_from_row(row: &[Cell], idx: &[usize; 6]) -> Option<Candle> {
    let [date_i, open_i, high_i, low_i, close_i, volume_i] = *idx;
    Some(Candle {
        date: row[date_i].as_date()?,
        open: row[open_i].as_f64()?,
        high: row[high_i].as_f64()?,
        low: row[low_i].as_f64()?,
        close: row[close_i].as_f64()?,
        volume: row[volume_i].as_f64().unwrap_or(0.0),
    })
}
