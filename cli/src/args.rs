//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use shotslice_core::{ExportFormat, SliceIndex};

/// Split long screenshots into fixed-height slices and export them as ZIP or PDF
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Config file path (default: platform config directory)
    #[arg(long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Interface language (en, zh)
    #[arg(long, global = true)]
    pub lang: Option<String>,

    /// Increase console log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Directory for rolling log files
    #[arg(long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show image dimensions and the planned slices
    Info {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        image: PathBuf,

        /// Slice height in pixels
        #[arg(long)]
        height: Option<u32>,
    },

    /// Slice an image and export the selected slices in one go
    #[command(visible_alias = "x")]
    Export {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        image: PathBuf,

        #[arg(short, long, value_enum, default_value_t = FormatArg::Zip)]
        format: FormatArg,

        /// Slice height in pixels
        #[arg(long)]
        height: Option<u32>,

        /// Slices to export, 1-based: `1,3-5` or `all`
        #[arg(short, long, default_value = "all")]
        select: String,

        /// Output file name; the extension is added when missing
        #[arg(short, long)]
        name: Option<String>,

        /// Directory receiving the exported file
        #[arg(short, long, default_value = ".", value_hint = clap::ValueHint::DirPath)]
        out_dir: PathBuf,
    },

    /// Load an image and drive a session from stdin
    #[command(visible_alias = "i")]
    Interactive {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        image: Option<PathBuf>,

        /// Directory receiving exported files
        #[arg(short, long, default_value = ".", value_hint = clap::ValueHint::DirPath)]
        out_dir: PathBuf,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Zip,
    Pdf,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Zip => ExportFormat::Zip,
            FormatArg::Pdf => ExportFormat::Pdf,
        }
    }
}

/// Parse `zip` or `pdf`, case-insensitively.
pub fn parse_format(value: &str) -> Option<ExportFormat> {
    match value.trim().to_ascii_lowercase().as_str() {
        "zip" => Some(ExportFormat::Zip),
        "pdf" => Some(ExportFormat::Pdf),
        _ => None,
    }
}

/// Resolve a 1-based selection such as `1,3-5` or `all` against `count` slices.
///
/// Returns 0-based indices in ascending order without duplicates.
pub fn parse_selection(spec: &str, count: u32) -> Result<Vec<SliceIndex>> {
    let spec = spec.trim();
    if spec.eq_ignore_ascii_case("all") {
        return Ok((0..count).map(SliceIndex).collect());
    }

    let mut picked = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (parse_number(start)?, parse_number(end)?),
            None => {
                let number = parse_number(part)?;
                (number, number)
            }
        };
        if start > end {
            bail!("range `{part}` is reversed");
        }
        if end > count {
            bail!("slice {end} does not exist; there are {count} slices");
        }
        picked.extend((start..=end).map(|number| SliceIndex(number - 1)));
    }

    if picked.is_empty() {
        bail!("selection `{spec}` names no slices");
    }
    picked.sort_unstable();
    picked.dedup();
    Ok(picked)
}

fn parse_number(text: &str) -> Result<u32> {
    match text.trim().parse::<u32>() {
        Ok(0) => bail!("slice numbers start at 1"),
        Ok(number) => Ok(number),
        Err(_) => bail!("`{}` is not a slice number", text.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(indices: Vec<SliceIndex>) -> Vec<u32> {
        indices.into_iter().map(|index| index.0).collect()
    }

    #[test]
    fn parses_lists_and_ranges() {
        assert_eq!(numbers(parse_selection("1,3-5", 6).unwrap()), vec![0, 2, 3, 4]);
        assert_eq!(numbers(parse_selection(" 4 , 2 ,2", 6).unwrap()), vec![1, 3]);
    }

    #[test]
    fn all_selects_every_slice() {
        assert_eq!(numbers(parse_selection("ALL", 3).unwrap()), vec![0, 1, 2]);
    }

    #[test]
    fn rejects_invalid_selections() {
        assert!(parse_selection("0", 3).is_err());
        assert!(parse_selection("4", 3).is_err());
        assert!(parse_selection("3-1", 3).is_err());
        assert!(parse_selection("x", 3).is_err());
        assert!(parse_selection(" , ", 3).is_err());
    }

    #[test]
    fn parses_formats() {
        assert_eq!(parse_format("PDF"), Some(ExportFormat::Pdf));
        assert_eq!(parse_format("zip"), Some(ExportFormat::Zip));
        assert_eq!(parse_format("tar"), None);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn export_arguments_parse() {
        let cli = Cli::try_parse_from([
            "shotslice", "-vv", "export", "page.png", "--format", "pdf", "--select", "2-3", "--height", "900",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Export { format, select, height, .. } => {
                assert_eq!(format, FormatArg::Pdf);
                assert_eq!(select, "2-3");
                assert_eq!(height, Some(900));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
