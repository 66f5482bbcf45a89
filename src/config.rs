//! Application and chart configuration
//!
//! `AppConfig` is read from the environment (optionally seeded by a `.env`
//! file). `ChartConfig` holds every styling and layout knob of the chart
//! renderer; any field missing from a JSON config file keeps its default.

use dotenv::dotenv;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::render::style::{Color, Dash, LineStyle};
use crate::utils::errors::ConfigError;

/// Runtime settings of the batch chart job
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub source_table: String,
    pub symbol: String,
    pub time_frame: String,
    pub output_dir: PathBuf,
    pub width: u32,
    pub height: u32,
    pub scale: u32,
    pub chart_config_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        Ok(AppConfig {
            database_url: required_var("DATABASE_URL")?,
            source_table: std::env::var("CHART_SOURCE_TABLE")
                .unwrap_or_else(|_| "stock_prices".to_string()),
            symbol: required_var("CHART_SYMBOL")?.to_uppercase(),
            time_frame: std::env::var("CHART_TIME_FRAME").unwrap_or_else(|_| "1D".to_string()),
            output_dir: std::env::var("CHART_OUTPUT_DIR")
                .unwrap_or_else(|_| "./charts".to_string())
                .into(),
            width: parsed_var("CHART_WIDTH", 1200)?,
            height: parsed_var("CHART_HEIGHT", 800)?,
            scale: parsed_var("CHART_SCALE", 2)?,
            chart_config_path: std::env::var("CHART_CONFIG").ok().map(PathBuf::from),
        })
    }

    /// Chart config from `CHART_CONFIG`, or the defaults when unset
    pub fn load_chart_config(&self) -> Result<ChartConfig, ConfigError> {
        match &self.chart_config_path {
            Some(path) => ChartConfig::from_file(path),
            None => Ok(ChartConfig::default()),
        }
    }
}

fn required_var(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
}

fn parsed_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

/// Font sizes in points
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FontSizes {
    pub title: f64,
    pub subplot_title: f64,
    pub axis: f64,
    pub tag: f64,
    pub price_tag: f64,
}

impl Default for FontSizes {
    fn default() -> Self {
        Self {
            title: 16.0,
            subplot_title: 16.0,
            axis: 12.0,
            tag: 12.0,
            price_tag: 13.0,
        }
    }
}

/// Outer margins in pixels. `right` also hosts the trailing value tags.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Margin {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl Default for Margin {
    fn default() -> Self {
        Self { left: 10, right: 80, top: 40, bottom: 20 }
    }
}

/// Style applied to every indicator column whose name contains `pattern`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LineStyleRule {
    pub pattern: String,
    pub style: LineStyle,
}

impl LineStyleRule {
    fn new(pattern: &str, style: LineStyle) -> Self {
        Self { pattern: pattern.to_string(), style }
    }
}

/// Styling and layout of a rendered financial chart
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub font_family: String,
    pub font_sizes: FontSizes,

    pub color_up: Color,
    pub color_down: Color,
    pub tick_color: Color,
    pub grid_color: Color,
    pub plot_bgcolor: Color,
    pub paper_bgcolor: Color,
    pub tag_bgcolor: Color,

    pub color_rsi_line: Color,
    pub color_rsi_bound_line: Color,
    pub color_rsi_bound_fill: Color,
    pub color_rsi_bound_tag: Color,

    /// Horizontal tag anchor as a fraction of the plot width (> 1 is right of the plot)
    pub label_x_position: f64,
    /// Minimum gap between price-pane tags as a fraction of the visible price range
    pub label_min_spacing_ratio: f64,
    pub rsi_label_min_spacing_ratio: f64,
    pub volume_yaxis_range_multiplier: f64,
    pub rsi_upper_bound: f64,
    pub rsi_lower_bound: f64,
    pub rsi_column: String,
    pub margin: Margin,
    /// Draw a vertical grid line every N candles
    pub grid_every: usize,
    /// Share of the body height given to the price pane
    pub price_pane_ratio: f64,
    pub line_styles: Vec<LineStyleRule>,
    pub default_line_style: LineStyle,
}

impl Default for ChartConfig {
    fn default() -> Self {
        let fibo = Color::rgb(0xDF, 0xBD, 0x01);
        let pivot = Color::rgb(0xE6, 0x13, 0x00);

        Self {
            font_family: "Calibri".to_string(),
            font_sizes: FontSizes::default(),

            color_up: Color::rgb(0x00, 0xA0, 0x40),
            color_down: Color::rgb(0xE5, 0x39, 0x35),
            tick_color: Color::rgb(0x5E, 0x5E, 0x5E),
            grid_color: Color::rgba(230, 230, 230, 0.8),
            plot_bgcolor: Color::WHITE,
            paper_bgcolor: Color::WHITE,
            tag_bgcolor: Color::rgba(255, 255, 255, 0.85),

            color_rsi_line: Color::rgb(0x8C, 0x68, 0xC8),
            color_rsi_bound_line: Color::rgb(0xC3, 0xC5, 0xCA),
            color_rsi_bound_fill: Color::rgb(0xF2, 0xEE, 0xF9),
            color_rsi_bound_tag: Color::rgb(0x7F, 0x7F, 0x7F),

            label_x_position: 1.02,
            label_min_spacing_ratio: 0.04,
            rsi_label_min_spacing_ratio: 0.04,
            volume_yaxis_range_multiplier: 4.0,
            rsi_upper_bound: 70.0,
            rsi_lower_bound: 30.0,
            rsi_column: "RSI_14".to_string(),
            margin: Margin::default(),
            grid_every: 10,
            price_pane_ratio: 0.8,
            line_styles: vec![
                LineStyleRule::new("SMA_20", LineStyle::solid(Color::rgb(0x00, 0xB1, 0xEC), 2.0)),
                LineStyleRule::new("SMA_60", LineStyle::solid(Color::rgb(0x00, 0x60, 0x80), 2.0)),
                LineStyleRule::new("open", LineStyle::stepped(Color::rgb(0xC7, 0x15, 0x85), Dash::Dash, 1.5)),
                LineStyleRule::new("prev", LineStyle::stepped(Color::rgb(0x80, 0x80, 0x80), Dash::Dash, 1.5)),
                LineStyleRule::new("MFIBO", LineStyle::stepped(fibo, Dash::Dot, 1.5)),
                LineStyleRule::new("YFIBO", LineStyle::stepped(fibo, Dash::Dot, 1.5)),
                LineStyleRule::new("MPIVOT", LineStyle::stepped(pivot, Dash::Dot, 1.5)),
                LineStyleRule::new("YPIVOT", LineStyle::stepped(pivot, Dash::Dot, 1.5)),
            ],
            default_line_style: LineStyle::solid(Color::BLACK, 1.2),
        }
    }
}

impl ChartConfig {
    /// Load a JSON config file; absent fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: ChartConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, ratio) in [
            ("label_min_spacing_ratio", self.label_min_spacing_ratio),
            ("rsi_label_min_spacing_ratio", self.rsi_label_min_spacing_ratio),
        ] {
            if !(ratio > 0.0 && ratio < 1.0) {
                return Err(ConfigError::InvalidChartConfig(format!(
                    "{} must be in (0, 1), got {}",
                    name, ratio
                )));
            }
        }

        if self.rsi_lower_bound >= self.rsi_upper_bound {
            return Err(ConfigError::InvalidChartConfig(format!(
                "rsi_lower_bound ({}) must be below rsi_upper_bound ({})",
                self.rsi_lower_bound, self.rsi_upper_bound
            )));
        }

        if !(self.price_pane_ratio > 0.0 && self.price_pane_ratio < 1.0) {
            return Err(ConfigError::InvalidChartConfig(format!(
                "price_pane_ratio must be in (0, 1), got {}",
                self.price_pane_ratio
            )));
        }

        if self.volume_yaxis_range_multiplier <= 0.0 {
            return Err(ConfigError::InvalidChartConfig(
                "volume_yaxis_range_multiplier must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Line style for an indicator column (first matching pattern wins)
    pub fn style_for_column(&self, column: &str) -> &LineStyle {
        self.line_styles
            .iter()
            .find(|rule| column.contains(&rule.pattern))
            .map(|rule| &rule.style)
            .unwrap_or(&self.default_line_style)
    }
}
