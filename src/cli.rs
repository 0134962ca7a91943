use crate::config::load_config;
use crate::ir::DiagramInput;
use crate::layout::compute_layout;
use crate::layout_dump::{LayoutDump, write_layout_dump};
use crate::text_metrics::{ApproximateMetrics, FontMetrics, TextMeasure};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "rxnlayout",
    version,
    about = "Lay out a single biochemical reaction diagram"
)]
pub struct Args {
    /// Input file (JSON/JSON5 reaction description) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file for the layout JSON. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config JSON5 file overriding layout constants
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Measure text with built-in width tables instead of system fonts
    #[arg(long = "approximate-metrics")]
    pub approximate_metrics: bool,
}

pub fn run() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    let source = read_input(args.input.as_deref())?;
    let input: DiagramInput = json5::from_str(&source).context("parsing reaction description")?;
    let mut diagram = input.into_diagram()?;

    let measure: Box<dyn TextMeasure> = if args.approximate_metrics {
        Box::new(ApproximateMetrics::from_config(&config))
    } else {
        Box::new(FontMetrics::from_config(&config))
    };
    compute_layout(&mut diagram, measure.as_ref(), &config);

    match args.output.as_deref() {
        Some(path) => write_layout_dump(path, &diagram)
            .with_context(|| format!("writing {}", path.display()))?,
        None => {
            let dump = LayoutDump::from_diagram(&diagram);
            println!("{}", serde_json::to_string_pretty(&dump)?);
        }
    }
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()));
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_flags() {
        let args = Args::parse_from([
            "rxnlayout",
            "-i",
            "reaction.json",
            "--configFile",
            "layout.json5",
            "--approximate-metrics",
        ]);
        assert_eq!(args.input, Some(PathBuf::from("reaction.json")));
        assert_eq!(args.config, Some(PathBuf::from("layout.json5")));
        assert!(args.output.is_none());
        assert!(args.approximate_metrics);
    }

    #[test]
    fn reads_input_files() {
        let path = std::env::temp_dir().join("rxnlayout-read-input.json");
        std::fs::write(&path, "{}").unwrap();
        assert_eq!(read_input(Some(&path)).unwrap(), "{}");
        std::fs::remove_file(&path).unwrap();
    }
}
