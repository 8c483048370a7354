use crate::Result;
use crate::render::style::RenderStyle;
use anyhow::{Context, anyhow};
use plotters::style::{FontStyle, register_font};
use std::fs;
use std::path::Path;

/// Tried in order when no `font_path` is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Register the style's font under its family name. Call once, before
/// rendering.
///
/// A configured `font_path` must load. Without one, the first readable
/// system font wins; if none exists the plots are drawn without text and
/// `Ok(false)` is returned.
pub fn install_font(style: &RenderStyle) -> Result<bool> {
    if let Some(path) = &style.font_path {
        register(style, path)?;
        return Ok(true);
    }

    for candidate in SYSTEM_FONTS.iter().map(Path::new) {
        if !candidate.is_file() {
            continue;
        }
        match register(style, candidate) {
            Ok(()) => return Ok(true),
            Err(err) => log::debug!("skipping font {}: {:#}", candidate.display(), err),
        }
    }

    log::warn!("no usable font found; set font_path in the style file to draw labels");
    Ok(false)
}

fn register(style: &RenderStyle, path: &Path) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("read font file {}", path.display()))?;
    // The font registry holds `'static` data for the life of the process.
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    register_font(&style.font_family, FontStyle::Normal, bytes)
        .map_err(|_| anyhow!("invalid font data in {}", path.display()))?;
    log::debug!(
        "font {} registered as {:?}",
        path.display(),
        style.font_family
    );
    Ok(())
}
