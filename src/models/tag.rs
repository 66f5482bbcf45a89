//! Value tag models

use crate::render::style::Color;

/// A request to label one point on a chart's value axis
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    /// Axis position the tag belongs to (last close, last SMA value, ...)
    pub value: f64,
    pub display_text: String,
    /// The single price tag of a chart; styled distinctly and wins ties
    pub is_primary: bool,
    pub color_hint: Color,
}

impl Tag {
    pub fn new(value: f64, display_text: impl Into<String>, color_hint: Color) -> Self {
        Self {
            value,
            display_text: display_text.into(),
            is_primary: false,
            color_hint,
        }
    }

    pub fn primary(value: f64, display_text: impl Into<String>, color_hint: Color) -> Self {
        Self {
            is_primary: true,
            ..Self::new(value, display_text, color_hint)
        }
    }
}

/// A tag with its collision-free vertical position
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTag {
    pub tag: Tag,
    pub resolved_y: f64,
}

/// Final positions of the oscillator pane's boundary and live tags
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryPositions {
    pub upper: f64,
    pub lower: f64,
    pub live: f64,
}
