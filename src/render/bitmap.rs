//! PNG rasterization of a recorded [`Figure`] with plotters

use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::fs;
use std::path::Path;
use uuid::Uuid;

use super::style::{self as fig, Dash, TextRun};
use super::{Annotation, Caption, Figure, PaneMarks};
use crate::utils::errors::ChartError;

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
type PlotChart<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Share of a candle slot covered by the candle body / volume bar
const BODY_FILL: f64 = 0.7;

/// Padding added above and below the data when a pane has no explicit range
const AUTO_RANGE_PADDING: f64 = 0.05;

fn render_err<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::Render(e.to_string())
}

fn rgba(c: fig::Color) -> RGBAColor {
    RGBAColor(c.r, c.g, c.b, c.a)
}

/// Requested family, or the generic sans-serif face when it is not installed
fn installed_family(requested: &str) -> &str {
    let probe = FontDesc::new(FontFamily::Name(requested), 12.0, FontStyle::Normal);
    if probe.box_size("0").is_ok() {
        requested
    } else {
        "sans-serif"
    }
}

fn text_style<'a>(family: &'a str, size: f64, color: fig::Color, bold: bool) -> TextStyle<'a> {
    let font = (installed_family(family), size).into_font();
    let font = if bold { font.style(FontStyle::Bold) } else { font };
    font.color(&rgba(color))
}

/// Render a figure to PNG bytes
///
/// The image is `width * scale` by `height * scale` pixels; fonts and
/// strokes grow with `scale`.
pub fn rasterize(figure: &Figure, width: u32, height: u32, scale: u32) -> Result<Vec<u8>, ChartError> {
    let scale = scale.max(1);
    let size = (width * scale, height * scale);

    // BitMapBackend encodes PNG only when writing to a path
    with_temp_png(|path| {
        {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw_figure(&root, figure, scale as f64)?;
            root.present().map_err(render_err)?;
        }
        Ok(fs::read(path)?)
    })
}

/// Run `render` against a fresh temp file path; the file is removed
/// afterwards whether or not rendering succeeded
fn with_temp_png<F>(render: F) -> Result<Vec<u8>, ChartError>
where
    F: FnOnce(&Path) -> Result<Vec<u8>, ChartError>,
{
    let temp_file = std::env::temp_dir().join(format!("candle_tags_{}.png", Uuid::new_v4()));
    let result = render(&temp_file);
    let _ = fs::remove_file(&temp_file);
    result
}

fn draw_figure(root: &Area<'_>, figure: &Figure, s: f64) -> Result<(), ChartError> {
    let layout = &figure.layout;
    let family = layout.font_family.as_str();
    root.fill(&rgba(layout.paper_bgcolor)).map_err(render_err)?;

    let m = layout.margin;
    let px = |v: u32| (v as f64 * s) as u32;
    let page = root.margin(px(m.top), px(m.bottom), px(m.left), 0);

    let title_h = (layout.title_font_size * 2.0 * s) as u32;
    let (title_area, body) = page.split_vertically(title_h);
    draw_runs(
        &title_area,
        &figure.title,
        family,
        layout.title_font_size * s,
        (0, (title_h / 2) as i32),
    )?;

    let n = figure.x_len().max(1);
    let gutter = px(m.right);

    if figure.oscillator.is_empty() {
        draw_price_pane(root, &body, figure, n, gutter, true, s)?;
    } else {
        let body_h = body.dim_in_pixel().1;
        let split = (body_h as f64 * layout.price_pane_ratio) as u32;
        let (upper, lower) = body.split_vertically(split);
        draw_price_pane(root, &upper, figure, n, gutter, false, s)?;
        draw_oscillator_pane(root, &lower, figure, n, gutter, s)?;
    }

    Ok(())
}

/// Draw colored runs left to right starting at `origin`, vertically centered
fn draw_runs(area: &Area<'_>, runs: &[TextRun], family: &str, size: f64, origin: (i32, i32)) -> Result<(), ChartError> {
    let (mut x, y) = origin;
    for run in runs {
        let style = text_style(family, size, run.color, run.bold).pos(Pos::new(HPos::Left, VPos::Center));
        area.draw_text(&run.text, &style, (x, y)).map_err(render_err)?;
        let (w, _) = area.estimate_text_size(&run.text, &style).map_err(render_err)?;
        x += w as i32;
    }
    Ok(())
}

fn auto_range(marks: &PaneMarks) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    let mut take = |v: f64| {
        if v.is_finite() {
            lo = lo.min(v);
            hi = hi.max(v);
        }
    };

    if let Some(series) = &marks.candles {
        for c in &series.candles {
            take(c.low);
            take(c.high);
        }
    }
    for line in &marks.lines {
        line.values.iter().flatten().for_each(|&v| take(v));
    }
    for rule in &marks.rules {
        take(rule.value);
    }
    for band in &marks.bands {
        take(band.low);
        take(band.high);
    }

    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * AUTO_RANGE_PADDING).max(hi.abs() * 1e-3).max(1e-8);
    (lo - pad, hi + pad)
}

fn y_axis_style<'a>(figure: &'a Figure, s: f64) -> TextStyle<'a> {
    let layout = &figure.layout;
    text_style(&layout.font_family, layout.axis_font_size * s, layout.tick_color, false)
}

fn draw_price_pane(
    root: &Area<'_>,
    area: &Area<'_>,
    figure: &Figure,
    n: usize,
    gutter: u32,
    with_x_ticks: bool,
    s: f64,
) -> Result<(), ChartError> {
    let layout = &figure.layout;
    let marks = &figure.price;
    let x_range = -0.5..(n as f64 - 0.5);
    let (y_lo, y_hi) = marks.y_range.unwrap_or_else(|| auto_range(marks));
    let (v_lo, v_hi) = marks.secondary_range.unwrap_or((0.0, 1.0));
    let tick_area = if with_x_ticks { (layout.axis_font_size * 2.0 * s) as u32 } else { 0 };

    area.fill(&rgba(layout.plot_bgcolor)).map_err(render_err)?;

    let mut chart = ChartBuilder::on(area)
        .margin_right(gutter)
        .y_label_area_size((layout.axis_font_size * 5.0 * s) as u32)
        .x_label_area_size(tick_area)
        .build_cartesian_2d(x_range.clone(), y_lo..y_hi)
        .map_err(render_err)?
        .set_secondary_coord(x_range.clone(), v_lo..v_hi);

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(0)
        .y_labels(8)
        .bold_line_style(&rgba(layout.grid_color))
        .light_line_style(&TRANSPARENT)
        .axis_style(&rgba(layout.tick_color))
        .y_label_style(y_axis_style(figure, s))
        .draw()
        .map_err(render_err)?;

    let (px_range, _) = chart.plotting_area().get_pixel_range();
    let slot = (px_range.end - px_range.start) as f64 / n as f64;

    // Volume sits behind the candles
    if !marks.bars.is_empty() {
        let half = BODY_FILL / 2.0;
        chart
            .draw_secondary_series(marks.bars.iter().map(|b| {
                let x = b.x as f64;
                Rectangle::new(
                    [(x - half, 0.0), (x + half, b.height)],
                    rgba(b.color).mix(b.opacity).filled(),
                )
            }))
            .map_err(render_err)?;
    }

    draw_vertical_rules(&mut chart, figure, (y_lo, y_hi), s)?;
    draw_common_marks(&mut chart, marks, n, s)?;

    if let Some(series) = &marks.candles {
        let body_width = ((slot * BODY_FILL) as u32).max(1);
        let up = rgba(series.color_up);
        let down = rgba(series.color_down);
        chart
            .draw_series(series.candles.iter().enumerate().map(|(i, c)| {
                CandleStick::new(i as f64, c.open, c.high, c.low, c.close, up.filled(), down.filled(), body_width)
            }))
            .map_err(render_err)?;
    }

    if with_x_ticks {
        draw_x_ticks(root, &chart, figure, y_lo, s)?;
    }
    draw_annotations(root, &chart, &marks.annotations, &layout.font_family, s)?;
    if let Some(caption) = &marks.caption {
        draw_caption(root, &chart, caption, &layout.font_family, s)?;
    }

    Ok(())
}

fn draw_oscillator_pane(
    root: &Area<'_>,
    area: &Area<'_>,
    figure: &Figure,
    n: usize,
    gutter: u32,
    s: f64,
) -> Result<(), ChartError> {
    let layout = &figure.layout;
    let marks = &figure.oscillator;
    let (y_lo, y_hi) = marks.y_range.unwrap_or_else(|| auto_range(marks));
    let caption_h = marks
        .caption
        .as_ref()
        .map_or(0, |c| (c.font_size * 1.6 * s) as u32);

    area.fill(&rgba(layout.plot_bgcolor)).map_err(render_err)?;

    let mut chart = ChartBuilder::on(area)
        .margin_right(gutter)
        .margin_top(caption_h)
        .y_label_area_size((layout.axis_font_size * 5.0 * s) as u32)
        .x_label_area_size((layout.axis_font_size * 2.0 * s) as u32)
        .build_cartesian_2d(-0.5..(n as f64 - 0.5), y_lo..y_hi)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(0)
        .y_labels(4)
        .bold_line_style(&rgba(layout.grid_color))
        .light_line_style(&TRANSPARENT)
        .axis_style(&rgba(layout.tick_color))
        .y_label_style(y_axis_style(figure, s))
        .draw()
        .map_err(render_err)?;

    draw_vertical_rules(&mut chart, figure, (y_lo, y_hi), s)?;
    draw_common_marks(&mut chart, marks, n, s)?;
    draw_x_ticks(root, &chart, figure, y_lo, s)?;
    draw_annotations(root, &chart, &marks.annotations, &layout.font_family, s)?;
    if let Some(caption) = &marks.caption {
        draw_caption(root, &chart, caption, &layout.font_family, s)?;
    }

    Ok(())
}

fn draw_vertical_rules(chart: &mut PlotChart<'_, '_>, figure: &Figure, (y_lo, y_hi): (f64, f64), s: f64) -> Result<(), ChartError> {
    for &(x, color) in &figure.vertical_rules {
        let x = x as f64;
        chart
            .draw_series(LineSeries::new(
                vec![(x, y_lo), (x, y_hi)],
                rgba(color).stroke_width(s.max(1.0) as u32),
            ))
            .map_err(render_err)?;
    }
    Ok(())
}

/// Bands, reference rules and indicator lines, in that order
fn draw_common_marks(chart: &mut PlotChart<'_, '_>, marks: &PaneMarks, n: usize, s: f64) -> Result<(), ChartError> {
    let (x0, x1) = (-0.5, n as f64 - 0.5);

    for band in &marks.bands {
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(x0, band.low), (x1, band.high)],
                rgba(band.color).filled(),
            )))
            .map_err(render_err)?;
    }

    for rule in &marks.rules {
        let style = rgba(rule.style.color).stroke_width(stroke(rule.style.width, s));
        draw_path(chart, vec![(x0, rule.value), (x1, rule.value)], rule.style.dash, style, s)?;
    }

    for line in &marks.lines {
        let style = rgba(line.style.color).stroke_width(stroke(line.style.width, s));
        for segment in line_segments(&line.values, line.style.step) {
            draw_path(chart, segment, line.style.dash, style, s)?;
        }
    }

    Ok(())
}

fn stroke(width: f64, s: f64) -> u32 {
    (width * s).round().max(1.0) as u32
}

fn draw_path(
    chart: &mut PlotChart<'_, '_>,
    points: Vec<(f64, f64)>,
    dash: Dash,
    style: ShapeStyle,
    s: f64,
) -> Result<(), ChartError> {
    let unit = s.max(1.0);
    let px = |v: f64| (v * unit).round().max(1.0) as u32;
    match dash {
        Dash::Solid => {
            chart.draw_series(LineSeries::new(points, style)).map_err(render_err)?;
        }
        Dash::Dash => {
            chart
                .draw_series(DashedLineSeries::new(points, px(6.0), px(4.0), style))
                .map_err(render_err)?;
        }
        Dash::Dot => {
            chart
                .draw_series(DashedLineSeries::new(points, px(1.5), px(3.0), style))
                .map_err(render_err)?;
        }
    }
    Ok(())
}

/// Split a gappy series into drawable runs of points
///
/// Step lines hold each value until the next index, then jump.
fn line_segments(values: &[Option<f64>], step: bool) -> Vec<Vec<(f64, f64)>> {
    let mut segments = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();

    for (i, value) in values.iter().enumerate() {
        let x = i as f64;
        match value {
            Some(y) => {
                if step {
                    if let Some(&(_, prev_y)) = current.last() {
                        current.push((x, prev_y));
                    }
                }
                current.push((x, *y));
            }
            None => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

fn draw_x_ticks(root: &Area<'_>, chart: &PlotChart<'_, '_>, figure: &Figure, y_lo: f64, s: f64) -> Result<(), ChartError> {
    let layout = &figure.layout;
    let style = text_style(&layout.font_family, layout.axis_font_size * s, layout.tick_color, false)
        .pos(Pos::new(HPos::Center, VPos::Top));

    for (i, label) in figure.x_ticks.iter().enumerate() {
        if label.is_empty() {
            continue;
        }
        let (x, y) = chart.backend_coord(&(i as f64, y_lo));
        root.draw_text(label, &style, (x, y + (4.0 * s) as i32))
            .map_err(render_err)?;
    }
    Ok(())
}

/// Tag boxes anchored right of the plot at their resolved values
fn draw_annotations(
    root: &Area<'_>,
    chart: &PlotChart<'_, '_>,
    annotations: &[Annotation],
    default_family: &str,
    s: f64,
) -> Result<(), ChartError> {
    let (px_range, _) = chart.plotting_area().get_pixel_range();
    let plot_w = (px_range.end - px_range.start) as f64;
    let x_origin = chart.x_range().start;

    for ann in annotations {
        let family = if ann.style.font_family.is_empty() { default_family } else { ann.style.font_family.as_str() };
        let style = text_style(family, ann.style.font_size * s, ann.style.font_color, ann.style.bold)
            .pos(Pos::new(HPos::Left, VPos::Center));
        let (text_w, text_h) = root.estimate_text_size(&ann.text, &style).map_err(render_err)?;

        let pad = (3.0 * s) as i32;
        let x = px_range.start + (plot_w * ann.x_anchor) as i32;
        let (_, y) = chart.backend_coord(&(x_origin, ann.y));
        let half_h = text_h as i32 / 2 + pad;

        let corners = [(x, y - half_h), (x + text_w as i32 + 2 * pad, y + half_h)];
        root.draw(&Rectangle::new(corners, rgba(ann.style.background).filled()))
            .map_err(render_err)?;
        root.draw(&Rectangle::new(
            corners,
            rgba(ann.style.border).stroke_width(stroke(ann.style.border_width, s)),
        ))
        .map_err(render_err)?;
        root.draw_text(&ann.text, &style, (x + pad, y)).map_err(render_err)?;
    }
    Ok(())
}

fn draw_caption(root: &Area<'_>, chart: &PlotChart<'_, '_>, caption: &Caption, family: &str, s: f64) -> Result<(), ChartError> {
    let (px_range, py_range) = chart.plotting_area().get_pixel_range();
    let size = caption.font_size * s;
    let origin = (px_range.start + (4.0 * s) as i32, py_range.start - (size * 0.8) as i32);
    draw_runs(root, &caption.runs, family, size, origin)
}
