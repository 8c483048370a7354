use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

mod logfile;
mod model;
mod render;
mod view;

use render::{RenderStyle, ScatterPlot};
use view::View;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "progress-plot", version)]
#[command(about = "Scatter plots of per-process progress samples", long_about = None)]
struct Cli {
    #[command(flatten)]
    opts: Options,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Args)]
struct Options {
    /// Directory the images are written to (must already exist).
    #[arg(long, global = true, default_value = "img")]
    img_dir: PathBuf,

    /// Read samples from this file instead of the default for the command.
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// TOML file overriding figure size, dpi, fonts, palette and labels.
    #[arg(long, global = true)]
    style: Option<PathBuf>,

    /// Also write the normalized sample table as JSON.
    #[arg(long, global = true)]
    dump_table: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Plot res.txt into img/process_timeline.png and img/process_progress.png.
    Plot,
    /// Plot res<SUFFIX>.txt into img/process_timeline<SUFFIX>.png and img/process_progress<SUFFIX>.png.
    Run {
        /// Numeric run suffix, e.g. 3 for res3.txt.
        #[arg(value_parser = parse_suffix)]
        suffix: String,
    },
}

fn parse_suffix(s: &str) -> std::result::Result<String, String> {
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        Ok(s.to_string())
    } else {
        Err(format!("suffix must be a number, got {:?}", s))
    }
}

/// Input and output locations for one invocation.
struct Job {
    input: PathBuf,
    suffix: Option<String>,
}

impl Job {
    fn new(cmd: Commands, input: Option<PathBuf>) -> Self {
        let suffix = match cmd {
            Commands::Plot => None,
            Commands::Run { suffix } => Some(suffix),
        };
        let input = input.unwrap_or_else(|| {
            PathBuf::from(format!("res{}.txt", suffix.as_deref().unwrap_or("")))
        });
        Self { input, suffix }
    }

    fn output(&self, img_dir: &Path, view: View) -> PathBuf {
        view.output_path(img_dir, self.suffix.as_deref())
    }
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Usage errors exit with 1, not clap's default of 2.
        Err(err) if err.use_stderr() => {
            eprint!("{err}");
            std::process::exit(1);
        }
        // --help / --version
        Err(err) => err.exit(),
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let Cli { opts, cmd } = cli;
    let job = Job::new(cmd, opts.input);

    let style = match &opts.style {
        Some(path) => RenderStyle::load(path)?,
        None => RenderStyle::default(),
    };

    // 1) Filter lines.
    let samples = logfile::LogFile::open(&job.input)?;
    log::debug!("reading samples from {}", samples.path().display());

    // 2) Cast + derive relative time.
    let table = model::build_table(samples.records())
        .with_context(|| format!("parse samples in {}", samples.path().display()))?;
    log::debug!(
        "{} of {} lines retained, {} processes, start {:?}",
        table.len(),
        samples.line_count(),
        table.process_indices().len(),
        table.start().map(|ts| ts.to_string())
    );
    if table.is_empty() {
        log::warn!(
            "no samples in {}; drawing empty charts",
            samples.path().display()
        );
    }

    if let Some(path) = &opts.dump_table {
        let json = serde_json::to_string_pretty(&table)?;
        std::fs::write(path, json)
            .with_context(|| format!("write table to {}", path.display()))?;
        log::debug!("table written to {}", path.display());
    }

    // 3) Lay out both views; an unplottable range fails before any image is written.
    let plots = View::ALL.map(|view| ScatterPlot::build(&table, view, &style));
    for plot in &plots {
        let stem = plot.view.file_stem();
        plot.x_range().with_context(|| format!("lay out {stem}"))?;
        plot.y_range().with_context(|| format!("lay out {stem}"))?;
    }

    // 4) Render.
    render::install_font(&style)?;
    let written = View::ALL.map(|view| job.output(&opts.img_dir, view));
    for (plot, path) in plots.iter().zip(&written) {
        render::render_png(plot, &style, path)?;
        log::debug!(
            "{} written, series for processes {:?}",
            path.display(),
            plot.series.iter().map(|s| s.process_index).collect::<Vec<_>>()
        );
    }

    let [timeline, progress] = &written;
    println!(
        "Generated charts: {} and {}",
        timeline.display(),
        progress.display()
    );
    Ok(())
}
