use crate::Result;
use crate::model::Table;
use crate::render::backend::{TextSafeBackend, approx_text_width};
use crate::render::style::{RenderStyle, Rgb};
use crate::view::View;
use anyhow::{Context, bail};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters_backend::text_anchor::{HPos, Pos, VPos};
use std::ops::Range;
use std::path::Path;

/// Fraction of the configured canvas width given to the legend panel.
const LEGEND_FRACTION: f64 = 0.12;
/// Axis padding as a fraction of the data span.
const RANGE_PADDING: f64 = 0.05;

impl From<Rgb> for RGBColor {
    fn from(Rgb(r, g, b): Rgb) -> Self {
        RGBColor(r, g, b)
    }
}

/// One process's samples in one view.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterSeries {
    pub process_index: i64,
    pub label: String,
    pub color: Rgb,
    /// (relative seconds, y); non-finite points are left out.
    pub points: Vec<(f64, f64)>,
}

/// Everything needed to draw one view, laid out before any pixel is touched.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPlot {
    pub view: View,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// One series per distinct process index, in first-appearance order.
    pub series: Vec<ScatterSeries>,
}

/// Pixel geometry of one image: chart on the left, legend panel on the right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub canvas: (u32, u32),
    pub plot_width: u32,
    pub legend: LegendLayout,
}

/// Legend entries run top to bottom and wrap into further columns when the
/// panel is full. Coordinates are relative to the legend panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegendLayout {
    pub top: i32,
    pub left: i32,
    pub row_height: i32,
    pub rows_per_column: usize,
    pub column_width: i32,
    pub marker_radius: u32,
    pub text_gap: i32,
    /// Text size in pixels.
    pub text_px: f64,
}

impl LegendLayout {
    /// Centre of the marker for entry `n`.
    pub fn marker(&self, n: usize) -> (i32, i32) {
        let column = (n / self.rows_per_column) as i32;
        let row = (n % self.rows_per_column) as i32;
        (
            self.left + column * self.column_width + self.marker_radius as i32,
            self.top + row * self.row_height,
        )
    }

    /// Left-centre anchor of the label for entry `n`.
    pub fn text(&self, n: usize) -> (i32, i32) {
        let (x, y) = self.marker(n);
        (x + self.marker_radius as i32 + self.text_gap, y)
    }
}

impl ScatterPlot {
    pub fn build(table: &Table, view: View, style: &RenderStyle) -> Self {
        let series = table
            .groups()
            .into_iter()
            .enumerate()
            .map(|(n, group)| ScatterSeries {
                process_index: group.process_index,
                label: format!("{} {}", style.legend_prefix, group.process_index),
                color: style.color(n),
                points: group
                    .rows
                    .iter()
                    .map(|row| (row.relative_seconds(), view.y_value(row)))
                    .filter(|(x, y)| x.is_finite() && y.is_finite())
                    .collect(),
            })
            .collect();

        Self {
            view,
            title: style.title(view).to_string(),
            x_label: style.x_label.clone(),
            y_label: style.y_label(view).to_string(),
            series,
        }
    }

    fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.series.iter().flat_map(|s| s.points.iter().copied())
    }

    pub fn x_range(&self) -> Result<Range<f64>> {
        padded(self.points().map(|(x, _)| x), 1.0).context("x axis")
    }

    pub fn y_range(&self) -> Result<Range<f64>> {
        padded(self.points().map(|(_, y)| y), self.view.flat_pad()).context("y axis")
    }

    /// Canvas and legend geometry. The canvas keeps the configured height and
    /// grows to the right when the legend needs more room than its panel.
    pub fn layout(&self, style: &RenderStyle) -> Layout {
        let (base_width, height) = style.pixel_size();
        let base_legend = (base_width as f64 * LEGEND_FRACTION).round() as u32;
        let plot_width = base_width.saturating_sub(base_legend).max(1);

        let text_px = style.points_to_px(style.label_font_pt);
        let margin = text_px.round() as i32;
        let radius = style.marker_radius();
        let row_height = ((text_px * 1.8).round() as i32).max(2 * radius as i32 + 1);
        let top = (style.points_to_px(style.title_font_pt) * 2.0).round() as i32 + margin;
        let left = (text_px * 0.5).round() as i32;

        let usable = height as i32 - top - margin;
        let rows_per_column = (usable / row_height).max(1) as usize;
        let columns = self.series.len().div_ceil(rows_per_column).max(1);
        let text_width = self
            .series
            .iter()
            .map(|s| approx_text_width(&s.label, text_px))
            .fold(0.0, f64::max)
            .ceil() as i32;
        let column_width = 2 * radius as i32 + margin + text_width + margin;
        let needed = (left + columns as i32 * column_width).max(0) as u32;
        let legend_width = base_legend.max(needed);

        Layout {
            canvas: (plot_width + legend_width, height),
            plot_width,
            legend: LegendLayout {
                top,
                left,
                row_height,
                rows_per_column,
                column_width,
                marker_radius: radius,
                text_gap: margin,
                text_px,
            },
        }
    }
}

/// Data span plus padding. An empty span maps to `0..1`; a single value is
/// widened by `flat_pad` (or 5% of its magnitude, if larger) on each side.
///
/// The span `end - start` must stay finite. Ends are clamped to the finite
/// `f64` range and the padding is dropped when it would overflow; data whose
/// own span overflows is an error.
fn padded(values: impl Iterator<Item = f64>, flat_pad: f64) -> Result<Range<f64>> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if min > max {
        return Ok(0.0..1.0);
    }
    let pad = if min == max {
        flat_pad.max(min.abs() * RANGE_PADDING)
    } else {
        (max - min) * RANGE_PADDING
    };
    let range = (min - pad).max(f64::MIN)..(max + pad).min(f64::MAX);
    if (range.end - range.start).is_finite() {
        return Ok(range);
    }
    if (max - min).is_finite() {
        return Ok(min..max);
    }
    bail!("values from {} to {} span too wide a range to plot", min, max)
}

/// Draw `plot` to a PNG at `path`. The parent directory must already exist.
pub fn render_png(plot: &ScatterPlot, style: &RenderStyle, path: &Path) -> Result<()> {
    // Checked before the backend exists: a dropped BitMapBackend still saves.
    let ranges = (plot.x_range()?, plot.y_range()?);
    let layout = plot.layout(style);
    let backend = TextSafeBackend::new(BitMapBackend::new(path, layout.canvas));
    draw(backend.into_drawing_area(), plot, style, &layout, ranges)
        .with_context(|| format!("render {}", path.display()))
}

fn draw<DB>(
    root: DrawingArea<DB, Shift>,
    plot: &ScatterPlot,
    style: &RenderStyle,
    layout: &Layout,
    (x_range, y_range): (Range<f64>, Range<f64>),
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let font = |points: f64| {
        FontDesc::new(
            FontFamily::from(style.font_family.as_str()),
            style.points_to_px(points),
            FontStyle::Normal,
        )
    };
    let label_px = style.points_to_px(style.label_font_pt);
    let (plot_area, legend_area) = root.split_horizontally(layout.plot_width);

    let mut chart = ChartBuilder::on(&plot_area)
        .caption(&plot.title, font(style.title_font_pt))
        .margin(label_px.round() as u32)
        .x_label_area_size((label_px * 3.5).round() as u32)
        .y_label_area_size((label_px * 6.0).round() as u32)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc(plot.x_label.as_str())
        .y_desc(plot.y_label.as_str())
        .label_style(font(style.label_font_pt))
        .axis_desc_style(font(style.label_font_pt))
        .draw()?;

    let radius = style.marker_radius();
    for series in &plot.series {
        let color = RGBColor::from(series.color);
        chart.draw_series(
            series
                .points
                .iter()
                .map(|&point| Circle::new(point, radius, color.filled())),
        )?;
    }

    let legend = &layout.legend;
    let legend_font = FontDesc::new(
        FontFamily::from(style.font_family.as_str()),
        legend.text_px,
        FontStyle::Normal,
    )
    .color(&BLACK)
        .pos(Pos::new(HPos::Left, VPos::Center));
    for (n, series) in plot.series.iter().enumerate() {
        let color = RGBColor::from(series.color);
        legend_area.draw(&Circle::new(
            legend.marker(n),
            legend.marker_radius,
            color.filled(),
        ))?;
        legend_area.draw(&Text::new(
            series.label.clone(),
            legend.text(n),
            legend_font.clone(),
        ))?;
    }

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logfile::parse::records;
    use crate::model::build_table;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;
    use std::fs;

    const SCENARIO: &str = "\
1 pidA 10.5 10% 2024-01-01T00:00:00
2 pidB 20.0 20% 2024-01-01T00:00:05
malformed line
";

    fn small_style() -> RenderStyle {
        RenderStyle {
            dpi: 40,
            ..RenderStyle::default()
        }
    }

    fn table(text: &str) -> Table {
        build_table(records(text)).unwrap()
    }

    #[test]
    fn one_series_per_process_in_each_view() {
        let style = RenderStyle::default();
        let t = table(SCENARIO);

        let timeline = ScatterPlot::build(&t, View::Timeline, &style);
        assert_eq!(
            timeline.series,
            vec![
                ScatterSeries {
                    process_index: 1,
                    label: "Process 1".to_string(),
                    color: style.color(0),
                    points: vec![(0.0, 1.0)],
                },
                ScatterSeries {
                    process_index: 2,
                    label: "Process 2".to_string(),
                    color: style.color(1),
                    points: vec![(5.0, 2.0)],
                },
            ]
        );
        assert_eq!(timeline.title, "Process Execution Timeline");

        let progress = ScatterPlot::build(&t, View::Progress, &style);
        let points: Vec<_> = progress.series.iter().map(|s| s.points.clone()).collect();
        assert_eq!(points, vec![vec![(0.0, 10.5)], vec![(5.0, 20.0)]]);
        assert_eq!(progress.y_label, "Progress");
    }

    #[test]
    fn series_set_equals_process_set() {
        let t = table(
            "4 a 1 1% 2024-01-01T00:00:01\n\
             9 b 2 2% 2024-01-01T00:00:02\n\
             4 a 3 3% 2024-01-01T00:00:03\n\
             0 c 4 4% 2024-01-01T00:00:04\n",
        );
        let expected: BTreeSet<i64> = t.rows().iter().map(|r| r.sample.process_index).collect();
        for view in View::ALL {
            let plot = ScatterPlot::build(&t, view, &RenderStyle::default());
            let drawn: BTreeSet<i64> = plot.series.iter().map(|s| s.process_index).collect();
            assert_eq!(drawn, expected);
            assert_eq!(plot.series.len(), expected.len());
        }
    }

    #[test]
    fn non_finite_progress_is_not_drawn() {
        let t = table("1 a NaN 0% 2024-01-01T00:00:00\n1 a 5 5% 2024-01-01T00:00:01\n");
        let plot = ScatterPlot::build(&t, View::Progress, &RenderStyle::default());
        assert_eq!(plot.series.len(), 1);
        assert_eq!(plot.series[0].points, vec![(1.0, 5.0)]);
    }

    #[test]
    fn ranges_are_padded() {
        let t = table(SCENARIO);
        let plot = ScatterPlot::build(&t, View::Progress, &RenderStyle::default());
        let x = plot.x_range().unwrap();
        assert!((x.start + 0.25).abs() < 1e-9, "{:?}", x);
        assert!((x.end - 5.25).abs() < 1e-9, "{:?}", x);
        let y = plot.y_range().unwrap();
        assert!((y.start - 10.025).abs() < 1e-9, "{:?}", y);
        assert!((y.end - 20.475).abs() < 1e-9, "{:?}", y);
    }

    #[test]
    fn flat_and_empty_ranges() {
        let one = table("3 a 7 7% 2024-01-01T00:00:00\n");
        let timeline = ScatterPlot::build(&one, View::Timeline, &RenderStyle::default());
        assert_eq!(timeline.x_range().unwrap(), -1.0..1.0);
        assert_eq!(timeline.y_range().unwrap(), 2.5..3.5);

        let empty = ScatterPlot::build(&Table::default(), View::Progress, &RenderStyle::default());
        assert!(empty.series.is_empty());
        assert_eq!(empty.x_range().unwrap(), 0.0..1.0);
        assert_eq!(empty.y_range().unwrap(), 0.0..1.0);
    }

    #[test]
    fn extreme_values_keep_a_finite_span_or_fail() {
        let edge = table("1 a -1.79e308 0% 2024-01-01T00:00:00\n2 b 0 0% 2024-01-01T00:00:01\n");
        let y = ScatterPlot::build(&edge, View::Progress, &RenderStyle::default())
            .y_range()
            .unwrap();
        assert_eq!(y, -1.79e308..0.0);

        let huge = table("1 a 1e20 0% 2024-01-01T00:00:00\n");
        let y = ScatterPlot::build(&huge, View::Progress, &RenderStyle::default())
            .y_range()
            .unwrap();
        assert!(y.start < 1e20 && y.end > 1e20, "{:?}", y);

        let wide = table("1 a -1e308 0% 2024-01-01T00:00:00\n2 b 1e308 0% 2024-01-01T00:00:01\n");
        let plot = ScatterPlot::build(&wide, View::Progress, &small_style());
        let err = plot.y_range().unwrap_err();
        assert!(format!("{:#}", err).contains("too wide"), "{:#}", err);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        assert!(render_png(&plot, &small_style(), &path).is_err());
        assert!(!path.exists());
    }

    fn many_processes(count: i64) -> Table {
        let text: String = (0..count)
            .map(|i| format!("{i} p{i} {i} {i}% 2024-01-01T00:00:{:02}\n", i % 60))
            .collect();
        table(&text)
    }

    #[test]
    fn every_legend_entry_fits_its_panel() {
        let style = RenderStyle::default();
        let plot = ScatterPlot::build(&many_processes(40), View::Timeline, &style);
        let layout = plot.layout(&style);
        let legend = &layout.legend;
        let (width, height) = layout.canvas;
        let panel_width = (width - layout.plot_width) as i32;
        let half_row = legend.row_height / 2;

        assert!(legend.rows_per_column < 40, "{:?}", legend);
        for (n, series) in plot.series.iter().enumerate() {
            let (mx, my) = legend.marker(n);
            let (tx, ty) = legend.text(n);
            assert!(mx - legend.marker_radius as i32 >= 0, "entry {n}");
            assert!(my - half_row >= 0, "entry {n}");
            assert!(ty + half_row <= height as i32, "entry {n} at y {ty}");
            let text_end = tx + approx_text_width(&series.label, legend.text_px).ceil() as i32;
            assert!(text_end <= panel_width, "entry {n} ends at x {text_end}");
        }
        // Wrapping into a second column widens the canvas, never the height.
        assert!(width > 4500);
        assert_eq!(height, 2400);
    }

    #[test]
    fn few_processes_keep_the_configured_canvas() {
        let style = RenderStyle::default();
        let plot = ScatterPlot::build(&table(SCENARIO), View::Timeline, &style);
        assert_eq!(plot.layout(&style).canvas, style.pixel_size());
    }

    #[test]
    fn wrapped_legend_is_rendered_on_the_wider_canvas() {
        let dir = tempfile::tempdir().unwrap();
        let style = small_style();
        let plot = ScatterPlot::build(&many_processes(40), View::Progress, &style);
        let path = dir.path().join("legend.png");
        render_png(&plot, &style, &path).unwrap();

        // IHDR width, big-endian, right after the signature and chunk header.
        let bytes = fs::read(&path).unwrap();
        let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        assert_eq!(width, plot.layout(&style).canvas.0);
        assert!(width > style.pixel_size().0);
    }

    #[test]
    fn writes_a_png() {
        let dir = tempfile::tempdir().unwrap();
        let style = small_style();
        let t = table(SCENARIO);
        for view in View::ALL {
            let path = view.output_path(dir.path(), Some("7"));
            render_png(&ScatterPlot::build(&t, view, &style), &style, &path).unwrap();
            let bytes = fs::read(&path).unwrap();
            assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        }
    }

    #[test]
    fn empty_table_still_writes_a_png() {
        let dir = tempfile::tempdir().unwrap();
        let style = small_style();
        let path = dir.path().join("empty.png");
        let plot = ScatterPlot::build(&Table::default(), View::Timeline, &style);
        render_png(&plot, &style, &path).unwrap();
        assert!(fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn missing_output_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let style = small_style();
        let path = dir.path().join("no-such-dir").join("plot.png");
        let plot = ScatterPlot::build(&table(SCENARIO), View::Timeline, &style);
        let err = render_png(&plot, &style, &path).unwrap_err();
        assert!(format!("{:#}", err).contains("render"));
    }
}
