//! Grouped scatter rendering to PNG.

pub mod backend;
pub mod font;
pub mod scatter;
pub mod style;

pub use font::install_font;
pub use scatter::{ScatterPlot, render_png};
pub use style::RenderStyle;
