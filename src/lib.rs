//! Annotated candlestick charts with collision-free value tags, plus the
//! storage and reshaping helpers that feed them.

pub mod config;
pub mod db;
pub mod models;
pub mod render;
pub mod services;
pub mod utils;

pub use config::{AppConfig, ChartConfig};
pub use models::{Cell, PriceFrame, ResolvedTag, Table, Tag};
pub use services::label_layout::{resolve_boundary_tags, resolve_positions};
