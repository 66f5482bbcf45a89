//! Collision-free vertical placement of value tags
//!
//! Tags are laid out top to bottom in descending value order. Each tag starts
//! at its own value and is pushed down whenever it would sit closer than the
//! minimum spacing to the tag placed above it, so tags never cross and
//! neighbours are always at least `min_spacing` apart.

use std::cmp::Ordering;

use crate::models::tag::{BoundaryPositions, ResolvedTag, Tag};

/// Share of the top tag's magnitude used as the range of a flat chart
const FALLBACK_RANGE_FRACTION: f64 = 0.1;

/// Range used when the chart is flat at zero
const FALLBACK_RANGE_FLOOR: f64 = 1.0;

/// Visible range with flat-chart fallback
///
/// A zero (or unusable) range is replaced by a tenth of `scale_hint`'s
/// magnitude, or by `1.0` when that is zero as well. The result is always
/// strictly positive.
pub fn effective_range(visible_range: f64, scale_hint: f64) -> f64 {
    if visible_range.is_finite() && visible_range > 0.0 {
        return visible_range;
    }

    let fallback = scale_hint.abs() * FALLBACK_RANGE_FRACTION;
    if fallback.is_finite() && fallback > 0.0 {
        fallback
    } else {
        FALLBACK_RANGE_FLOOR
    }
}

/// Minimum distance between adjacent tags for a visible range
pub fn min_spacing(visible_range: f64, min_spacing_ratio: f64, scale_hint: f64) -> f64 {
    min_spacing_ratio * effective_range(visible_range, scale_hint)
}

/// Order in which tags are stacked: highest value first. Equal values put
/// the primary tag on top, then keep input order.
fn stacking_order(a: &(usize, &Tag), b: &(usize, &Tag)) -> Ordering {
    b.1.value
        .total_cmp(&a.1.value)
        .then_with(|| b.1.is_primary.cmp(&a.1.is_primary))
        .then_with(|| a.0.cmp(&b.0))
}

/// Resolve non-overlapping vertical positions for a set of tags
///
/// `visible_range` is the value span of the axis; `min_spacing_ratio` turns
/// it into the minimum gap between neighbours. When the range is zero the
/// topmost tag's value provides the scale (see [`effective_range`]). That tag
/// never moves, so resolving the output again gives the same positions.
///
/// The result corresponds index-for-index with `tags`.
pub fn resolve_positions(tags: &[Tag], visible_range: f64, min_spacing_ratio: f64) -> Vec<ResolvedTag> {
    let mut order: Vec<(usize, &Tag)> = tags.iter().enumerate().collect();
    order.sort_by(stacking_order);

    let Some(&(_, top)) = order.first() else {
        return Vec::new();
    };
    let spacing = min_spacing(visible_range, min_spacing_ratio, top.value);

    let mut positions = vec![0.0; tags.len()];
    let mut last_placed_y: Option<f64> = None;

    for (idx, tag) in order {
        let mut y_pos = tag.value;

        // Too close to the tag right above: push down to keep the gap
        if let Some(last) = last_placed_y {
            if y_pos > last - spacing {
                y_pos = last - spacing;
            }
        }

        last_placed_y = Some(y_pos);
        positions[idx] = y_pos;
    }

    tags.iter()
        .cloned()
        .zip(positions)
        .map(|(tag, resolved_y)| ResolvedTag { tag, resolved_y })
        .collect()
}

/// Place the two oscillator bound tags around the live-value tag
///
/// A bound closer than `min_spacing` to the live value moves away from it:
/// the upper bound to `live + min_spacing`, the lower bound to
/// `live - min_spacing`. The live tag never moves.
pub fn resolve_boundary_tags(live: f64, upper_bound: f64, lower_bound: f64, min_spacing: f64) -> BoundaryPositions {
    let mut upper = upper_bound;
    let mut lower = lower_bound;

    if (live - upper).abs() < min_spacing {
        upper = live + min_spacing;
    }
    if (live - lower).abs() < min_spacing {
        lower = live - min_spacing;
    }

    BoundaryPositions { upper, lower, live }
}
