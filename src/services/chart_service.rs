use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::ChartConfig;
use crate::models::candle::PriceFrame;
use crate::models::tag::Tag;
use crate::render::style::{AnnotationStyle, Color, Dash, LineStyle, RuleStyle, TextRun};
use crate::render::{Axis, Bar, Figure, FigureLayout, Pane, RenderSurface};
use crate::services::label_layout;
use crate::utils::errors::ChartError;

/// Used when the oscillator series is flat
const RSI_FALLBACK_RANGE: f64 = 20.0;

/// Share of the price range left above and below the candles
const PRICE_AXIS_PADDING: f64 = 0.05;

/// Where to write the rendered PNG
#[derive(Debug, Clone)]
pub struct OutputTarget {
    pub dir: PathBuf,
    pub file_name: String,
}

impl OutputTarget {
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

/// What to draw
#[derive(Debug, Clone)]
pub struct ChartRequest {
    pub symbol: String,
    pub time_frame: String,
    pub width: u32,
    pub height: u32,
    pub scale: u32,
    /// Indicator columns drawn on the price pane, in order
    pub line_columns: Vec<String>,
    /// Display names for tags, keyed by column
    pub line_names: HashMap<String, String>,
    pub output: Option<OutputTarget>,
}

impl ChartRequest {
    pub fn new(symbol: impl Into<String>, time_frame: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            time_frame: time_frame.into(),
            width: 1200,
            height: 800,
            scale: 2,
            line_columns: Vec::new(),
            line_names: HashMap::new(),
            output: None,
        }
    }

    fn display_name<'a>(&'a self, column: &'a str) -> &'a str {
        self.line_names.get(column).map(String::as_str).unwrap_or(column)
    }
}

/// A rendered chart: the recorded figure and its PNG encoding
#[derive(Debug, Clone, Default)]
pub struct ChartOutput {
    pub figure: Figure,
    pub png: Vec<u8>,
}

impl ChartOutput {
    /// Whether this is the placeholder returned for empty input
    pub fn is_placeholder(&self) -> bool {
        self.figure.is_empty() && self.png.is_empty()
    }
}

/// Build, rasterize and optionally save a financial chart
///
/// An empty frame is not an error: it is logged and a placeholder output is
/// returned. The PNG bytes are rendered once and reused for the file.
pub fn create_financial_chart(
    frame: &PriceFrame,
    request: &ChartRequest,
    config: &ChartConfig,
) -> Result<ChartOutput, ChartError> {
    if frame.is_empty() {
        warn!("Price frame for {} is empty. Cannot create chart.", request.symbol);
        return Ok(ChartOutput::default());
    }

    let figure = build_financial_chart(frame, request, config);
    let png = figure.export_raster(request.width, request.height, request.scale)?;

    if let Some(target) = &request.output {
        fs::create_dir_all(&target.dir)?;
        let path = target.path();
        fs::write(&path, &png)?;
        info!("🖼️ Chart for {} written to {}", request.symbol, path.display());
    }

    Ok(ChartOutput { figure, png })
}

/// Record every mark of the chart on a fresh figure
pub fn build_financial_chart(frame: &PriceFrame, request: &ChartRequest, config: &ChartConfig) -> Figure {
    let mut figure = Figure::new(figure_layout(config));
    draw_chart(&mut figure, frame, request, config);
    figure
}

/// Draw a complete chart onto any surface
pub fn draw_chart<S: RenderSurface>(surface: &mut S, frame: &PriceFrame, request: &ChartRequest, config: &ChartConfig) {
    if frame.is_empty() {
        return;
    }
    add_candlestick_chart(surface, frame, config);
    add_volume_chart(surface, frame, config);
    let mut tags = add_technical_lines(surface, frame, request, config);
    add_rsi_chart(surface, frame, config);
    add_price_annotations(surface, frame, &mut tags, &request.symbol, config);
    configure_layout_and_axes(surface, frame, request, config);
}

fn figure_layout(config: &ChartConfig) -> FigureLayout {
    FigureLayout {
        font_family: config.font_family.clone(),
        title_font_size: config.font_sizes.title,
        axis_font_size: config.font_sizes.axis,
        tick_color: config.tick_color,
        grid_color: config.grid_color,
        plot_bgcolor: config.plot_bgcolor,
        paper_bgcolor: config.paper_bgcolor,
        margin: config.margin,
        price_pane_ratio: config.price_pane_ratio,
    }
}

fn trend_color(close: f64, open: f64, config: &ChartConfig) -> Color {
    if close >= open {
        config.color_up
    } else {
        config.color_down
    }
}

fn add_candlestick_chart<S: RenderSurface>(surface: &mut S, frame: &PriceFrame, config: &ChartConfig) {
    surface.draw_candlestick(Pane::Price, &frame.candles, config.color_up, config.color_down);
}

fn add_volume_chart<S: RenderSurface>(surface: &mut S, frame: &PriceFrame, config: &ChartConfig) {
    let bars = frame
        .candles
        .iter()
        .enumerate()
        .map(|(x, c)| Bar {
            x,
            height: c.volume,
            color: trend_color(c.close, c.open, config),
            opacity: 0.3,
        })
        .collect();
    surface.draw_bar(Pane::Price, bars);

    let max_volume = frame.max_volume();
    let top = if max_volume > 0.0 { max_volume * config.volume_yaxis_range_multiplier } else { 1.0 };
    surface.set_y_range(Pane::Price, Axis::Secondary, 0.0, top);
}

/// Draw requested indicator lines; returns one tag per line at its last value
fn add_technical_lines<S: RenderSurface>(
    surface: &mut S,
    frame: &PriceFrame,
    request: &ChartRequest,
    config: &ChartConfig,
) -> Vec<Tag> {
    let mut tags = Vec::new();

    for name in &request.line_columns {
        let Some(column) = frame.column(name).filter(|c| !c.is_all_missing()) else {
            debug!("Skipping indicator column '{}': missing or empty", name);
            continue;
        };

        let style = config.style_for_column(name);
        surface.draw_line(Pane::Price, name, &column.values, style);

        if let Some((_, last_value)) = column.last_valid() {
            tags.push(Tag::new(
                last_value,
                format!("{}: {:.2}", request.display_name(name), last_value),
                style.color,
            ));
        }
    }

    tags
}

fn add_rsi_chart<S: RenderSurface>(surface: &mut S, frame: &PriceFrame, config: &ChartConfig) {
    let Some(rsi) = frame.column(&config.rsi_column) else {
        return;
    };
    let Some((_, last_rsi)) = rsi.last_valid() else {
        return;
    };

    let pane = Pane::Oscillator;
    let bound_rule = RuleStyle {
        color: config.color_rsi_bound_line,
        dash: Dash::Dash,
        width: 1.5,
    };

    surface.draw_band(pane, config.rsi_lower_bound, config.rsi_upper_bound, config.color_rsi_bound_fill);
    surface.draw_line(
        pane,
        &config.rsi_column,
        &rsi.values,
        &LineStyle::solid(config.color_rsi_line, 1.5),
    );
    surface.draw_horizontal_rule(pane, config.rsi_upper_bound, bound_rule.clone());
    surface.draw_horizontal_rule(pane, config.rsi_lower_bound, bound_rule);

    surface.set_caption(
        pane,
        vec![
            TextRun::plain("RSI 14: ", Color::BLACK),
            TextRun::bold(format!("{:.2}", last_rsi), config.color_rsi_line),
        ],
        config.font_sizes.subplot_title,
    );

    let (lo, hi) = rsi.bounds().unwrap_or((last_rsi, last_rsi));
    let mut visible_range = hi - lo;
    if visible_range == 0.0 {
        visible_range = RSI_FALLBACK_RANGE;
    }
    let min_spacing = label_layout::min_spacing(visible_range, config.rsi_label_min_spacing_ratio, last_rsi);
    let positions = label_layout::resolve_boundary_tags(last_rsi, config.rsi_upper_bound, config.rsi_lower_bound, min_spacing);

    let bound_style = AnnotationStyle {
        font_family: config.font_family.clone(),
        font_size: config.font_sizes.tag,
        font_color: config.color_rsi_bound_tag,
        background: config.tag_bgcolor,
        border: config.color_rsi_bound_tag,
        border_width: 1.0,
        bold: true,
    };
    let live_style = AnnotationStyle {
        font_color: Color::WHITE,
        background: config.color_rsi_line,
        border: config.color_rsi_line,
        ..bound_style.clone()
    };

    let x = config.label_x_position;
    surface.place_annotation(pane, x, positions.upper, &format!("RSI {:.2}", config.rsi_upper_bound), &bound_style);
    surface.place_annotation(pane, x, positions.lower, &format!("RSI {:.2}", config.rsi_lower_bound), &bound_style);
    surface.place_annotation(pane, x, positions.live, &format!("RSI {:.2}", last_rsi), &live_style);

    // Keep the bound tags inside the pane
    let y_lo = lo.min(config.rsi_lower_bound).min(positions.lower) - min_spacing;
    let y_hi = hi.max(config.rsi_upper_bound).max(positions.upper) + min_spacing;
    surface.set_y_range(pane, Axis::Primary, y_lo, y_hi);
}

/// Add the price tag, resolve all price-pane tags and place them
fn add_price_annotations<S: RenderSurface>(
    surface: &mut S,
    frame: &PriceFrame,
    tags: &mut Vec<Tag>,
    symbol: &str,
    config: &ChartConfig,
) {
    let (Some(first), Some(last)) = (frame.candles.first(), frame.last()) else {
        return;
    };
    let price_color = trend_color(last.close, last.open, config);

    tags.push(Tag::primary(last.close, format!("{}: {:.2}", symbol, last.close), price_color));

    surface.draw_horizontal_rule(
        Pane::Price,
        last.close,
        RuleStyle { color: price_color, dash: Dash::Dash, width: 1.0 },
    );

    let mut visible_range = frame.price_range();
    if visible_range == 0.0 {
        visible_range = first.close * 0.1;
    }

    let resolved = label_layout::resolve_positions(tags, visible_range, config.label_min_spacing_ratio);

    for r in &resolved {
        let style = if r.tag.is_primary {
            AnnotationStyle {
                font_family: config.font_family.clone(),
                font_size: config.font_sizes.price_tag,
                font_color: Color::WHITE,
                background: r.tag.color_hint,
                border: r.tag.color_hint,
                border_width: 1.0,
                bold: true,
            }
        } else {
            AnnotationStyle {
                font_family: config.font_family.clone(),
                font_size: config.font_sizes.tag,
                font_color: r.tag.color_hint,
                background: config.tag_bgcolor,
                border: r.tag.color_hint,
                border_width: 1.0,
                bold: true,
            }
        };
        surface.place_annotation(Pane::Price, config.label_x_position, r.resolved_y, &r.tag.display_text, &style);
    }
}

fn configure_layout_and_axes<S: RenderSurface>(
    surface: &mut S,
    frame: &PriceFrame,
    request: &ChartRequest,
    config: &ChartConfig,
) {
    surface.set_title(title_runs(frame, request, config));

    let dates: Vec<NaiveDate> = frame.candles.iter().map(|c| c.date).collect();
    surface.set_x_ticks(x_axis_ticks(&dates));

    let high = frame.candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let low = frame.candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let range = label_layout::effective_range(high - low, frame.candles.first().map_or(0.0, |c| c.close));
    let pad = range * PRICE_AXIS_PADDING;
    surface.set_y_range(Pane::Price, Axis::Primary, low - pad, high + pad);

    if config.grid_every > 0 {
        for x in (config.grid_every..frame.len()).step_by(config.grid_every) {
            surface.draw_vertical_rule(x, config.grid_color);
        }
    }
}

/// `SYMBOL TF   O:.. H:.. L:.. C:..  +diff (+pct%)`, values colored by trend
pub fn title_runs(frame: &PriceFrame, request: &ChartRequest, config: &ChartConfig) -> Vec<TextRun> {
    let Some(last) = frame.last() else {
        return Vec::new();
    };

    let prev_close = frame
        .candles
        .len()
        .checked_sub(2)
        .map(|i| frame.candles[i].close);
    let diff = prev_close.map_or(0.0, |p| last.close - p);
    let pct_change = match prev_close {
        Some(p) if p != 0.0 => diff / p,
        _ => 0.0,
    };

    let value_color = trend_color(last.close, last.open, config);
    let sign = if diff >= 0.0 { "+" } else { "" };

    let mut runs = vec![TextRun::plain(format!("{} {}   ", request.symbol, request.time_frame), Color::BLACK)];
    for (label, value) in [("O:", last.open), ("H:", last.high), ("L:", last.low), ("C:", last.close)] {
        runs.push(TextRun::plain(label, Color::BLACK));
        runs.push(TextRun::bold(format!("{:.2} ", value), value_color));
    }
    runs.push(TextRun::bold(
        format!(" {}{:.2} ({}{:.2}%)", sign, diff, sign, pct_change * 100.0),
        value_color,
    ));
    runs
}

/// Category tick labels, one slot per candle
///
/// The first candle of a month is labelled with the month name when it falls
/// in the month's first week. Inside each month 1, 2 or 3 evenly spaced
/// candles get their day number, depending on how many candles the month has.
pub fn x_axis_ticks(dates: &[NaiveDate]) -> Vec<String> {
    let mut labels = vec![String::new(); dates.len()];
    let mut month_indices: Vec<usize> = Vec::new();
    let mut current_month: Option<(i32, u32)> = None;

    for (i, date) in dates.iter().enumerate() {
        let month = (date.year(), date.month());
        if current_month != Some(month) {
            add_day_labels(&month_indices, dates, &mut labels);
            current_month = Some(month);
            month_indices = vec![i];
            if date.day() < 8 {
                labels[i] = date.format("%b").to_string();
            }
        } else {
            month_indices.push(i);
        }
    }
    add_day_labels(&month_indices, dates, &mut labels);

    labels
}

fn add_day_labels(day_indices: &[usize], dates: &[NaiveDate], labels: &mut [String]) {
    let n = day_indices.len();
    let num = match n {
        15.. => 3,
        8..=14 => 2,
        4..=7 => 1,
        _ => return,
    };

    for j in 0..num {
        let p = n * (j + 1) / (num + 1);
        if let Some(&idx) = day_indices.get(p) {
            labels[idx] = dates[idx].day().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::candle::Candle;
    use chrono::Duration;

    fn candle(date: NaiveDate, open: f64, close: f64) -> Candle {
        Candle {
            date,
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            volume: 1000.0,
        }
    }

    fn frame(closes: &[f64]) -> PriceFrame {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| candle(start + Duration::days(i as i64), c - 0.5, c))
            .collect();
        PriceFrame::new(candles)
    }

    fn request() -> ChartRequest {
        let mut request = ChartRequest::new("FPT", "1D");
        request.line_columns = vec!["SMA_20".to_string(), "SMA_60".to_string(), "MISSING".to_string()];
        request.line_names.insert("SMA_20".to_string(), "MA20".to_string());
        request
    }

    #[test]
    fn test_empty_frame_returns_placeholder() {
        let output = create_financial_chart(&PriceFrame::default(), &request(), &ChartConfig::default()).unwrap();
        assert!(output.is_placeholder());
    }

    #[test]
    fn test_chart_written_as_png_and_returned() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let frame = crate::services::indicator_service::with_standard_indicators(frame(&closes));

        let dir = std::env::temp_dir().join(format!("candle_tags_out_{}", uuid::Uuid::new_v4()));
        let mut request = request();
        request.width = 600;
        request.height = 400;
        request.scale = 1;
        request.output = Some(OutputTarget {
            dir: dir.clone(),
            file_name: "FPT_1D.png".to_string(),
        });

        let output = create_financial_chart(&frame, &request, &ChartConfig::default()).unwrap();

        assert!(!output.is_placeholder());
        assert!(output.png.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]));
        let path = dir.join("FPT_1D.png");
        assert!(path.exists());
        assert_eq!(fs::read(&path).unwrap(), output.png);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_price_and_indicator_tags_are_spaced() {
        // Range: high 101 - low 97.5 = 3.5; spacing 0.04 * 3.5 = 0.14
        let mut frame = frame(&[99.0, 100.0]);
        frame.set_column("SMA_20", vec![None, Some(99.99)]);
        frame.set_column("SMA_60", vec![Some(99.95), Some(99.98)]);

        let figure = build_financial_chart(&frame, &request(), &ChartConfig::default());
        let annotations = &figure.pane(Pane::Price).annotations;
        assert_eq!(annotations.len(), 3);

        let find = |prefix: &str| annotations.iter().find(|a| a.text.starts_with(prefix)).unwrap();
        let price = find("FPT:");
        let ma20 = find("MA20:");
        let ma60 = find("SMA_60:");

        assert_eq!(price.text, "FPT: 100.00");
        assert_eq!(ma20.text, "MA20: 99.99");
        assert!((price.y - 100.0).abs() < 1e-9);
        assert!((ma20.y - 99.86).abs() < 1e-9);
        assert!((ma60.y - 99.72).abs() < 1e-9);
        assert_eq!(price.style.background, ChartConfig::default().color_up);
        assert_eq!(ma20.style.background, ChartConfig::default().tag_bgcolor);
    }

    #[test]
    fn test_skips_missing_and_empty_columns() {
        let mut frame = frame(&[10.0, 11.0]);
        frame.set_column("SMA_60", vec![None, None]);

        let figure = build_financial_chart(&frame, &request(), &ChartConfig::default());

        assert!(figure.pane(Pane::Price).lines.is_empty());
        assert_eq!(figure.pane(Pane::Price).annotations.len(), 1);
        assert!(figure.pane(Pane::Oscillator).is_empty());
    }

    #[test]
    fn test_rsi_bound_tag_moves_away_from_live_value() {
        // RSI range 68 - 18 = 50; spacing 0.1 * 50 = 5
        let mut frame = frame(&[10.0, 11.0, 12.0]);
        frame.set_column("RSI_14", vec![None, Some(18.0), Some(68.0)]);
        let config = ChartConfig { rsi_label_min_spacing_ratio: 0.1, ..ChartConfig::default() };

        let figure = build_financial_chart(&frame, &request(), &config);
        let osc = figure.pane(Pane::Oscillator);

        let texts: Vec<(&str, f64)> = osc.annotations.iter().map(|a| (a.text.as_str(), a.y)).collect();
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[0].0, "RSI 70.00");
        assert!((texts[0].1 - 73.0).abs() < 1e-9);
        assert_eq!(texts[1], ("RSI 30.00", 30.0));
        assert_eq!(texts[2], ("RSI 68.00", 68.0));
        assert_eq!(osc.rules.len(), 2);
        assert_eq!(osc.bands.len(), 1);
        assert!(osc.caption.is_some());
    }

    #[test]
    fn test_flat_rsi_uses_fallback_range() {
        let mut frame = frame(&[10.0, 11.0]);
        frame.set_column("RSI_14", vec![Some(69.5), Some(69.5)]);

        let figure = build_financial_chart(&frame, &request(), &ChartConfig::default());
        let upper = &figure.pane(Pane::Oscillator).annotations[0];

        // spacing 0.04 * 20 = 0.8, bound 70 is within 0.8 of 69.5
        assert_eq!(upper.text, "RSI 70.00");
        assert!((upper.y - 70.3).abs() < 1e-9);
    }

    #[test]
    fn test_flat_price_chart_still_separates_tags() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let flat = Candle { date: start, open: 50.0, high: 50.0, low: 50.0, close: 50.0, volume: 0.0 };
        let mut frame = PriceFrame::new(vec![flat]);
        frame.set_column("SMA_20", vec![Some(50.0)]);

        let figure = build_financial_chart(&frame, &request(), &ChartConfig::default());
        let ys: Vec<f64> = figure.pane(Pane::Price).annotations.iter().map(|a| a.y).collect();

        // range falls back to 5.0, spacing 0.2; the price tag wins the tie
        assert_eq!(ys.len(), 2);
        assert!((ys[0] - 49.8).abs() < 1e-9);
        assert!((ys[1] - 50.0).abs() < 1e-9);
        assert_eq!(figure.price.secondary_range, Some((0.0, 1.0)));
    }

    #[test]
    fn test_volume_bars_follow_candle_direction() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let frame = PriceFrame::new(vec![candle(start, 10.0, 12.0), candle(start + Duration::days(1), 12.0, 11.0)]);
        let config = ChartConfig::default();

        let figure = build_financial_chart(&frame, &request(), &config);
        let bars = &figure.pane(Pane::Price).bars;

        assert_eq!(bars[0].color, config.color_up);
        assert_eq!(bars[1].color, config.color_down);
        assert_eq!(figure.price.secondary_range, Some((0.0, 4000.0)));
    }

    #[test]
    fn test_title_shows_change_from_previous_close() {
        let frame = frame(&[100.0, 95.0]);
        let runs = title_runs(&frame, &request(), &ChartConfig::default());
        let text: String = runs.iter().map(|r| r.text.as_str()).collect();

        assert!(text.starts_with("FPT 1D   O:94.50 H:96.00 L:93.50 C:95.00"));
        assert!(text.ends_with("-5.00 (-5.00%)"));
    }

    #[test]
    fn test_grid_lines_every_ten_candles() {
        let closes: Vec<f64> = (0..25).map(|i| 10.0 + i as f64).collect();
        let figure = build_financial_chart(&frame(&closes), &request(), &ChartConfig::default());
        let xs: Vec<usize> = figure.vertical_rules.iter().map(|(x, _)| *x).collect();
        assert_eq!(xs, vec![10, 20]);
    }

    #[test]
    fn test_x_axis_ticks_label_months_and_days() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        // Every day from Jan 1 to Feb 10
        let dates: Vec<NaiveDate> = (0..41).map(|i| start + Duration::days(i)).collect();
        let ticks = x_axis_ticks(&dates);

        assert_eq!(ticks[0], "Jan");
        // January has 31 candles: labels at 31*1/4=7, 31*2/4=15, 31*3/4=23
        assert_eq!(ticks[7], "8");
        assert_eq!(ticks[15], "16");
        assert_eq!(ticks[23], "24");
        assert_eq!(ticks[31], "Feb");
        // February has 10 candles: 10/3=3, 20/3=6
        assert_eq!(ticks[34], "4");
        assert_eq!(ticks[37], "7");
        assert_eq!(ticks.iter().filter(|t| !t.is_empty()).count(), 7);
    }

    #[test]
    fn test_x_axis_ticks_skip_late_month_start() {
        let dates = vec![
            NaiveDate::from_ymd_opt(2024, 4, 20).unwrap(),
            NaiveDate::from_ymd_opt(2024, 4, 22).unwrap(),
        ];
        assert_eq!(x_axis_ticks(&dates), vec![String::new(), String::new()]);
    }
}
