//! Stamp overlay rendering
//!
//! Pure geometry: computes where a label lands on a page and emits the
//! PDF content operations that draw it. No document access happens here.

use lopdf::content::Operation;
use lopdf::Object;

use super::config::{RgbColor, StampConfig, StampPosition};
use super::error::{Result, StampError};

/// Approximate advance width of one Helvetica-Bold glyph, in em units.
/// Good enough for corner placement without embedding font metrics.
pub const CHAR_WIDTH_RATIO: f32 = 0.6;

/// Estimated width of `text` at `font_size` points
pub fn text_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * CHAR_WIDTH_RATIO
}

/// A stamp positioned on one page
///
/// `x`/`y` are the bottom-left corner of the text box, in page units
/// relative to a zero origin. Ephemeral: built per page, merged, dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub width: f32,
    pub height: f32,
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub font_size: f32,
    pub color: RgbColor,
}

/// Compute the overlay for one label on one page
///
/// # Arguments
/// * `label` - Rendered label text
/// * `page_width` / `page_height` - Effective page dimensions in points
/// * `config` - Run configuration (position, margin, size, color)
///
/// # Returns
/// The positioned overlay, or a `Render` error for degenerate dimensions
pub fn render_stamp(
    label: &str,
    page_width: f32,
    page_height: f32,
    config: &StampConfig,
) -> Result<Overlay> {
    if !page_width.is_finite() || !page_height.is_finite() || page_width <= 0.0 || page_height <= 0.0 {
        return Err(StampError::Render(format!(
            "page has non-positive dimensions {}x{}",
            page_width, page_height
        )));
    }

    let tw = text_width(label, config.font_size);
    let th = config.font_size;
    let margin = config.margin;

    let (x, y) = match config.position {
        StampPosition::BottomRight => (page_width - margin - tw, margin),
        StampPosition::BottomLeft => (margin, margin),
        StampPosition::TopRight => (page_width - margin - tw, page_height - margin - th),
        StampPosition::TopLeft => (margin, page_height - margin - th),
        StampPosition::Center => (page_width / 2.0 - tw / 2.0, page_height / 2.0 - th / 2.0),
    };

    Ok(Overlay {
        width: page_width,
        height: page_height,
        x,
        y,
        text: label.to_string(),
        font_size: config.font_size,
        color: config.color,
    })
}

impl Overlay {
    /// Content operations drawing this stamp
    ///
    /// `font_name` is the resource name the merger registered for
    /// Helvetica-Bold on this page. `origin` is the page's media box
    /// origin; coordinates are shifted by it so stamps land correctly on
    /// pages whose box does not start at (0, 0). The drawing is wrapped
    /// in `q`/`Q` so it leaves the graphics state untouched.
    pub fn content_ops(&self, font_name: &str, origin: (f32, f32)) -> Vec<Operation> {
        let (r, g, b) = self.color.to_unit();
        vec![
            Operation::new("q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![font_name.into(), Object::Real(self.font_size)],
            ),
            Operation::new(
                "rg",
                vec![Object::Real(r), Object::Real(g), Object::Real(b)],
            ),
            Operation::new(
                "Td",
                vec![
                    Object::Real(self.x + origin.0),
                    Object::Real(self.y + origin.1),
                ],
            ),
            Operation::new("Tj", vec![Object::string_literal(self.text.as_str())]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ]
    }
}
