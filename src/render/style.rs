//! Render configuration. Built once, then passed by reference to every plot.

use crate::Result;
use crate::view::View;
use anyhow::{Context, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Points per inch; font sizes and marker areas are given in points.
const POINTS_PER_INCH: f64 = 72.0;

const PALETTE_START_HUE: f64 = 0.01;
const PALETTE_SATURATION: f64 = 0.9;
const PALETTE_LIGHTNESS: f64 = 0.65;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Every key is optional in the TOML file; missing keys keep the default.
///
/// ```toml
/// dpi = 150
/// font_path = "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc"
/// timeline_title = "进程执行时间图"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderStyle {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
    /// Marker area in square points.
    pub marker_area: f64,
    pub font_family: String,
    /// Font file to load; when unset a few well-known system fonts are tried.
    pub font_path: Option<PathBuf>,
    pub title_font_pt: f64,
    pub label_font_pt: f64,
    /// Number of distinct series colours before the cycle repeats.
    pub palette_size: usize,
    pub legend_prefix: String,
    pub x_label: String,
    pub timeline_title: String,
    pub timeline_y_label: String,
    pub progress_title: String,
    pub progress_y_label: String,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            width_in: 15.0,
            height_in: 8.0,
            dpi: 300,
            marker_area: 10.0,
            font_family: "sans-serif".to_string(),
            font_path: None,
            title_font_pt: 12.0,
            label_font_pt: 10.0,
            palette_size: 6,
            legend_prefix: "Process".to_string(),
            x_label: "Relative time (s)".to_string(),
            timeline_title: "Process Execution Timeline".to_string(),
            timeline_y_label: "Process index".to_string(),
            progress_title: "Process Progress".to_string(),
            progress_y_label: "Progress".to_string(),
        }
    }
}

impl RenderStyle {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read style file {}", path.display()))?;
        let style: Self = toml::from_str(&text)
            .with_context(|| format!("parse style file {}", path.display()))?;
        style.check()?;
        Ok(style)
    }

    fn check(&self) -> Result<()> {
        if !(self.width_in.is_finite() && self.width_in > 0.0)
            || !(self.height_in.is_finite() && self.height_in > 0.0)
        {
            bail!(
                "figure size must be positive, got {} x {} in",
                self.width_in,
                self.height_in
            );
        }
        if self.dpi == 0 {
            bail!("dpi must be positive");
        }
        if !(self.marker_area.is_finite() && self.marker_area >= 0.0) {
            bail!("marker_area must be non-negative, got {}", self.marker_area);
        }
        if self.palette_size == 0 {
            bail!("palette_size must be at least 1");
        }
        Ok(())
    }

    /// Canvas size in pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        let dpi = self.dpi as f64;
        (
            (self.width_in * dpi).round().max(1.0) as u32,
            (self.height_in * dpi).round().max(1.0) as u32,
        )
    }

    pub fn points_to_px(&self, points: f64) -> f64 {
        points * self.dpi as f64 / POINTS_PER_INCH
    }

    pub fn marker_radius(&self) -> u32 {
        let diameter_pt = self.marker_area.sqrt();
        self.points_to_px(diameter_pt / 2.0).round().max(1.0) as u32
    }

    pub fn title(&self, view: View) -> &str {
        match view {
            View::Timeline => &self.timeline_title,
            View::Progress => &self.progress_title,
        }
    }

    pub fn y_label(&self, view: View) -> &str {
        match view {
            View::Timeline => &self.timeline_y_label,
            View::Progress => &self.progress_y_label,
        }
    }

    /// Colour of the `n`th series (0-based). Positional, cycling every
    /// `palette_size` series.
    pub fn color(&self, n: usize) -> Rgb {
        let size = self.palette_size.max(1);
        let hue = PALETTE_START_HUE + (n % size) as f64 / size as f64;
        hsl_to_rgb(hue, PALETTE_SATURATION, PALETTE_LIGHTNESS)
    }
}

fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> Rgb {
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let sector = hue.rem_euclid(1.0) * 6.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = lightness - chroma / 2.0;
    let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgb(channel(r), channel(g), channel(b))
}
