//! Data models shared by the chart pipeline and the storage helpers

pub mod candle;
pub mod table;
pub mod tag;

// Re-export commonly used types for convenience
pub use candle::{Candle, IndicatorColumn, PriceFrame};
pub use table::{Cell, Table};
pub use tag::{BoundaryPositions, ResolvedTag, Tag};
