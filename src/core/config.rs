//! Run configuration and validation

use clap::ValueEnum;
use serde::Serialize;
use std::fmt;

use super::error::{Result, StampError};

/// Page corner (or center) the stamp is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StampPosition {
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
    Center,
}

impl fmt::Display for StampPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StampPosition::BottomRight => "bottom-right",
            StampPosition::BottomLeft => "bottom-left",
            StampPosition::TopRight => "top-right",
            StampPosition::TopLeft => "top-left",
            StampPosition::Center => "center",
        };
        write!(f, "{}", name)
    }
}

/// Stamp color, parsed from a `#RRGGBB` string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const BLACK: RgbColor = RgbColor { r: 0, g: 0, b: 0 };

    /// Parse a hex color of the exact form `#RRGGBB`
    ///
    /// # Arguments
    /// * `input` - Color string from the command line
    ///
    /// # Returns
    /// The parsed color, or a `Config` error describing what was wrong
    pub fn parse(input: &str) -> Result<RgbColor> {
        let trimmed = input.trim();
        if !trimmed.starts_with('#') || trimmed.len() != 7 || !trimmed.is_ascii() {
            return Err(StampError::Config(format!(
                "color must be in #RRGGBB format, got '{}'",
                input
            )));
        }

        let channel = |range: std::ops::Range<usize>| -> Result<u8> {
            u8::from_str_radix(&trimmed[range], 16).map_err(|_| {
                StampError::Config(format!(
                    "color must be in #RRGGBB format, got '{}'",
                    input
                ))
            })
        };

        Ok(RgbColor {
            r: channel(1..3)?,
            g: channel(3..5)?,
            b: channel(5..7)?,
        })
    }

    /// Channels scaled to the 0.0-1.0 range PDF `rg` operators use
    pub fn to_unit(self) -> (f32, f32, f32) {
        (
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        )
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Immutable configuration for one stamping run
///
/// Built once in `main` from the command line, validated before any
/// filesystem work starts.
#[derive(Debug, Clone)]
pub struct StampConfig {
    /// Text prepended to every label (e.g. "BATES-")
    pub prefix: String,
    /// First counter value issued
    pub start: u64,
    /// Where on the page the stamp lands
    pub position: StampPosition,
    /// Stamp text color
    pub color: RgbColor,
    /// Distance from the page edges, in points
    pub margin: f32,
    /// Stamp font size, in points
    pub font_size: f32,
    /// Flatten each input before stamping
    pub flatten_input: bool,
    /// Flatten each stamped output
    pub flatten_output: bool,
}

impl Default for StampConfig {
    fn default() -> Self {
        StampConfig {
            prefix: "BATES-".to_string(),
            start: 1,
            position: StampPosition::BottomRight,
            color: RgbColor::BLACK,
            margin: 10.0,
            font_size: 12.0,
            flatten_input: false,
            flatten_output: false,
        }
    }
}

impl StampConfig {
    /// Check numeric fields for values the renderer cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(StampError::Config(format!(
                "margin must be a non-negative number of points, got {}",
                self.margin
            )));
        }
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(StampError::Config(format!(
                "font size must be positive, got {}",
                self.font_size
            )));
        }
        Ok(())
    }
}
