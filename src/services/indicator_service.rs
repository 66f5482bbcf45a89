//! Indicator columns computed from closing prices with the `ta` crate

use ta::indicators::{RelativeStrengthIndex, SimpleMovingAverage};
use ta::Next;

use crate::models::candle::PriceFrame;

pub const SMA_SHORT_PERIOD: usize = 20;
pub const SMA_LONG_PERIOD: usize = 60;
pub const RSI_PERIOD: usize = 14;

/// Simple moving average; `None` until `period` values have been seen
pub fn calculate_sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let Ok(mut sma) = SimpleMovingAverage::new(period) else {
        return vec![None; values.len()];
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let out = sma.next(v);
            (i + 1 >= period).then_some(out)
        })
        .collect()
}

/// Relative strength index; `None` until `period + 1` values have been seen
pub fn calculate_rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let Ok(mut rsi) = RelativeStrengthIndex::new(period) else {
        return vec![None; values.len()];
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let out = rsi.next(v);
            (i >= period).then_some(out)
        })
        .collect()
}

/// Add `SMA_20`, `SMA_60` and `RSI_14` computed from the closes
pub fn with_standard_indicators(mut frame: PriceFrame) -> PriceFrame {
    let closes = frame.closes();

    frame.set_column(format!("SMA_{}", SMA_SHORT_PERIOD), calculate_sma(&closes, SMA_SHORT_PERIOD));
    frame.set_column(format!("SMA_{}", SMA_LONG_PERIOD), calculate_sma(&closes, SMA_LONG_PERIOD));
    frame.set_column(format!("RSI_{}", RSI_PERIOD), calculate_rsi(&closes, RSI_PERIOD));

    tracing::debug!("Computed standard indicators over {} candles", closes.len());
    frame
}
