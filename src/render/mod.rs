//! Rendering surface and the in-memory figure it records into
//!
//! Chart assembly talks to a [`RenderSurface`]. [`Figure`] implements it by
//! recording every mark, which keeps chart assembly inspectable and lets the
//! same figure be rasterized on demand.

pub mod bitmap;
pub mod style;

use crate::models::candle::Candle;
use crate::utils::errors::ChartError;
use style::{AnnotationStyle, Color, LineStyle, RuleStyle, TextRun};

/// Sub-plot a mark belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pane {
    /// Candles, indicator lines and the secondary volume axis
    Price,
    /// Bounded indicator such as RSI
    Oscillator,
}

/// Value axis of a pane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Primary,
    /// Volume axis of the price pane
    Secondary,
}

/// One volume bar at a candle index
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub x: usize,
    pub height: f64,
    pub color: Color,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    pub candles: Vec<Candle>,
    pub color_up: Color,
    pub color_down: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineMark {
    pub name: String,
    pub values: Vec<Option<f64>>,
    pub style: LineStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleMark {
    pub value: f64,
    pub style: RuleStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BandMark {
    pub low: f64,
    pub high: f64,
    pub color: Color,
}

/// Text box pinned to a value on the pane's primary axis
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Horizontal anchor as a fraction of the plot width
    pub x_anchor: f64,
    pub y: f64,
    pub text: String,
    pub style: AnnotationStyle,
}

/// Caption in the top-left corner of a pane
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub runs: Vec<TextRun>,
    pub font_size: f64,
}

/// Everything drawn on one pane
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaneMarks {
    pub candles: Option<CandleSeries>,
    pub bars: Vec<Bar>,
    pub lines: Vec<LineMark>,
    pub rules: Vec<RuleMark>,
    pub bands: Vec<BandMark>,
    pub annotations: Vec<Annotation>,
    pub caption: Option<Caption>,
    pub y_range: Option<(f64, f64)>,
    pub secondary_range: Option<(f64, f64)>,
}

impl PaneMarks {
    pub fn is_empty(&self) -> bool {
        self.candles.is_none()
            && self.bars.is_empty()
            && self.lines.is_empty()
            && self.rules.is_empty()
            && self.bands.is_empty()
            && self.annotations.is_empty()
    }
}

/// Page-level layout shared by both panes
#[derive(Debug, Clone, PartialEq)]
pub struct FigureLayout {
    pub font_family: String,
    pub title_font_size: f64,
    pub axis_font_size: f64,
    pub tick_color: Color,
    pub grid_color: Color,
    pub plot_bgcolor: Color,
    pub paper_bgcolor: Color,
    pub margin: crate::config::Margin,
    pub price_pane_ratio: f64,
}

impl Default for FigureLayout {
    fn default() -> Self {
        Self {
            font_family: "sans-serif".to_string(),
            title_font_size: 16.0,
            axis_font_size: 12.0,
            tick_color: Color::BLACK,
            grid_color: Color::rgba(230, 230, 230, 0.8),
            plot_bgcolor: Color::WHITE,
            paper_bgcolor: Color::WHITE,
            margin: crate::config::Margin::default(),
            price_pane_ratio: 0.8,
        }
    }
}

/// Drawing primitives used by chart assembly
pub trait RenderSurface {
    fn draw_candlestick(&mut self, pane: Pane, candles: &[Candle], color_up: Color, color_down: Color);
    fn draw_bar(&mut self, pane: Pane, bars: Vec<Bar>);
    fn draw_line(&mut self, pane: Pane, name: &str, values: &[Option<f64>], style: &LineStyle);
    fn draw_horizontal_rule(&mut self, pane: Pane, value: f64, style: RuleStyle);
    fn draw_band(&mut self, pane: Pane, low: f64, high: f64, color: Color);
    /// Vertical rule at a candle index spanning every pane
    fn draw_vertical_rule(&mut self, x: usize, color: Color);
    fn place_annotation(&mut self, pane: Pane, x_anchor: f64, y: f64, text: &str, style: &AnnotationStyle);
    fn set_caption(&mut self, pane: Pane, runs: Vec<TextRun>, font_size: f64);
    fn set_title(&mut self, runs: Vec<TextRun>);
    /// Category labels along the shared x axis, one per candle (empty = no tick)
    fn set_x_ticks(&mut self, labels: Vec<String>);
    fn set_y_range(&mut self, pane: Pane, axis: Axis, low: f64, high: f64);
    /// Encode the surface as a PNG of `width * scale` by `height * scale` pixels
    fn export_raster(&self, width: u32, height: u32, scale: u32) -> Result<Vec<u8>, ChartError>;
}

/// Recorded chart: title, shared x axis and two panes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Figure {
    pub layout: FigureLayout,
    pub title: Vec<TextRun>,
    pub x_ticks: Vec<String>,
    pub vertical_rules: Vec<(usize, Color)>,
    pub price: PaneMarks,
    pub oscillator: PaneMarks,
}

impl Figure {
    pub fn new(layout: FigureLayout) -> Self {
        Self { layout, ..Self::default() }
    }

    /// A figure with nothing drawn, returned for empty inputs
    pub fn is_empty(&self) -> bool {
        self.price.is_empty() && self.oscillator.is_empty()
    }

    pub fn pane(&self, pane: Pane) -> &PaneMarks {
        match pane {
            Pane::Price => &self.price,
            Pane::Oscillator => &self.oscillator,
        }
    }

    fn pane_mut(&mut self, pane: Pane) -> &mut PaneMarks {
        match pane {
            Pane::Price => &mut self.price,
            Pane::Oscillator => &mut self.oscillator,
        }
    }

    /// Number of candle slots on the shared x axis
    pub fn x_len(&self) -> usize {
        let candles = self.price.candles.as_ref().map_or(0, |c| c.candles.len());
        let lines = [&self.price, &self.oscillator]
            .iter()
            .flat_map(|p| p.lines.iter().map(|l| l.values.len()))
            .max()
            .unwrap_or(0);
        candles.max(lines).max(self.x_ticks.len())
    }
}

impl RenderSurface for Figure {
    fn draw_candlestick(&mut self, pane: Pane, candles: &[Candle], color_up: Color, color_down: Color) {
        self.pane_mut(pane).candles = Some(CandleSeries {
            candles: candles.to_vec(),
            color_up,
            color_down,
        });
    }

    fn draw_bar(&mut self, pane: Pane, bars: Vec<Bar>) {
        self.pane_mut(pane).bars.extend(bars);
    }

    fn draw_line(&mut self, pane: Pane, name: &str, values: &[Option<f64>], style: &LineStyle) {
        self.pane_mut(pane).lines.push(LineMark {
            name: name.to_string(),
            values: values.to_vec(),
            style: style.clone(),
        });
    }

    fn draw_horizontal_rule(&mut self, pane: Pane, value: f64, style: RuleStyle) {
        self.pane_mut(pane).rules.push(RuleMark { value, style });
    }

    fn draw_band(&mut self, pane: Pane, low: f64, high: f64, color: Color) {
        self.pane_mut(pane).bands.push(BandMark { low, high, color });
    }

    fn draw_vertical_rule(&mut self, x: usize, color: Color) {
        self.vertical_rules.push((x, color));
    }

    fn place_annotation(&mut self, pane: Pane, x_anchor: f64, y: f64, text: &str, style: &AnnotationStyle) {
        self.pane_mut(pane).annotations.push(Annotation {
            x_anchor,
            y,
            text: text.to_string(),
            style: style.clone(),
        });
    }

    fn set_caption(&mut self, pane: Pane, runs: Vec<TextRun>, font_size: f64) {
        self.pane_mut(pane).caption = Some(Caption { runs, font_size });
    }

    fn set_title(&mut self, runs: Vec<TextRun>) {
        self.title = runs;
    }

    fn set_x_ticks(&mut self, labels: Vec<String>) {
        self.x_ticks = labels;
    }

    fn set_y_range(&mut self, pane: Pane, axis: Axis, low: f64, high: f64) {
        let marks = self.pane_mut(pane);
        match axis {
            Axis::Primary => marks.y_range = Some((low, high)),
            Axis::Secondary => marks.secondary_range = Some((low, high)),
        }
    }

    fn export_raster(&self, width: u32, height: u32, scale: u32) -> Result<Vec<u8>, ChartError> {
        bitmap::rasterize(self, width, height, scale)
    }
}
