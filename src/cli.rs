use crate::tools::caller::CallerThresholds;
use crate::tools::retrieval::RetrievalFilters;
use crate::utils::RunContext;
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

type ParseResult<T> = std::result::Result<T, String>;

/// All available cores minus one, leaving headroom for the system.
pub static DEFAULT_THREADS: Lazy<usize> = Lazy::new(|| {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1).max(1))
        .unwrap_or(4)
});

#[derive(Parser)]
#[command(name="lassensus",
          version,
          about = "Lassa virus consensus sequence builder",
          long_about = None,
          disable_help_subcommand = true,
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Select the best-matching reference per sample and segment")]
    Select(SelectArgs),
    #[clap(about = "Build and polish consensus sequences from selected references")]
    Consensus(ConsensusArgs),
    #[clap(about = "Run reference selection followed by consensus generation")]
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct IoArgs {
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input-dir")]
    #[clap(help = "Directory containing input FASTQ files (<sample>.fastq.gz)")]
    #[clap(value_name = "INPUT_DIR")]
    #[arg(value_parser = check_dir_exists)]
    pub input_dir: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-dir")]
    #[clap(help = "Directory for pipeline output")]
    #[clap(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of worker threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value_t = *DEFAULT_THREADS)]
    #[arg(value_parser = threads_in_range)]
    pub threads: usize,

    #[clap(long = "stage-timeout")]
    #[clap(help = "Maximum seconds for a single external tool invocation")]
    #[clap(value_name = "SECONDS")]
    #[clap(default_value = "3600")]
    #[arg(value_parser = positive_u64)]
    pub stage_timeout: u64,
}

impl IoArgs {
    pub fn context(&self) -> RunContext {
        RunContext::new(self.input_dir.clone(), self.output_dir.clone(), self.threads)
    }
}

#[derive(Args, Debug, Clone)]
pub struct SelectionOpts {
    #[clap(long = "subsample-size")]
    #[clap(help = "Number of reads to subsample per sample for reference comparison")]
    #[clap(value_name = "READS")]
    #[clap(default_value = "10000")]
    #[arg(value_parser = positive_u64)]
    pub subsample_size: u64,

    #[clap(help_heading("Reference retrieval"))]
    #[clap(long = "genome")]
    #[clap(help = "Genome completeness filter (1=complete, 2=partial, 3=no filter)")]
    #[clap(value_name = "CLASS")]
    #[clap(default_value = "2")]
    #[arg(value_parser = class_1_3)]
    pub genome: u8,

    #[clap(help_heading("Reference retrieval"))]
    #[clap(long = "completeness")]
    #[clap(help = "Minimum sequence completeness percent (used when --genome 2)")]
    #[clap(value_name = "PERC")]
    #[clap(default_value = "90")]
    #[arg(value_parser = percent_1_100)]
    pub completeness: u8,

    #[clap(help_heading("Reference retrieval"))]
    #[clap(long = "host")]
    #[clap(help = "Host filter (1=human, 2=rodent, 3=both, 4=no filter)")]
    #[clap(value_name = "CLASS")]
    #[clap(default_value = "4")]
    #[arg(value_parser = class_1_4)]
    pub host: u8,

    #[clap(help_heading("Reference retrieval"))]
    #[clap(long = "metadata")]
    #[clap(help = "Metadata filter (1=known location, 2=known date, 3=both, 4=no filter)")]
    #[clap(value_name = "CLASS")]
    #[clap(default_value = "4")]
    #[arg(value_parser = class_1_4)]
    pub metadata: u8,
}

impl SelectionOpts {
    pub fn filters(&self) -> RetrievalFilters {
        RetrievalFilters {
            genome: self.genome,
            min_completeness: self.completeness,
            host: self.host,
            metadata: self.metadata,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ConsensusOpts {
    #[clap(long = "min-depth")]
    #[clap(help = "Minimum depth for consensus calling")]
    #[clap(value_name = "DEPTH")]
    #[clap(default_value = "50")]
    #[arg(value_parser = positive_u32)]
    pub min_depth: u32,

    #[clap(long = "min-quality")]
    #[clap(help = "Minimum base quality for consensus calling")]
    #[clap(value_name = "QUAL")]
    #[clap(default_value = "30")]
    pub min_quality: u32,

    #[clap(long = "majority-threshold")]
    #[clap(help = "Majority rule threshold for consensus calling")]
    #[clap(value_name = "FRAC")]
    #[clap(default_value = "0.7")]
    #[arg(value_parser = ensure_unit_float)]
    pub majority_threshold: f64,
}

impl ConsensusOpts {
    pub fn thresholds(&self) -> CallerThresholds {
        CallerThresholds {
            min_depth: self.min_depth,
            min_quality: self.min_quality,
            majority_threshold: self.majority_threshold,
        }
    }
}

#[derive(Parser, Debug)]
#[command(arg_required_else_help(true))]
pub struct SelectArgs {
    #[clap(flatten)]
    pub io: IoArgs,
    #[clap(flatten)]
    pub selection: SelectionOpts,
}

#[derive(Parser, Debug)]
#[command(arg_required_else_help(true))]
pub struct ConsensusArgs {
    #[clap(flatten)]
    pub io: IoArgs,
    #[clap(flatten)]
    pub consensus: ConsensusOpts,
}

#[derive(Parser, Debug)]
#[command(arg_required_else_help(true))]
pub struct RunArgs {
    #[clap(flatten)]
    pub io: IoArgs,
    #[clap(flatten)]
    pub selection: SelectionOpts,
    #[clap(flatten)]
    pub consensus: ConsensusOpts,
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_dir_exists(s: &str) -> ParseResult<PathBuf> {
    let path = Path::new(s);
    if !path.is_dir() {
        Err(format!("Directory does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn threads_in_range(s: &str) -> ParseResult<usize> {
    let thread: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid thread number", s))?;
    if thread >= 1 {
        Ok(thread)
    } else {
        Err("Number of threads must be at least 1".into())
    }
}

fn ensure_unit_float(s: &str) -> ParseResult<f64> {
    let value = s
        .parse::<f64>()
        .map_err(|e| format!("Could not parse float: {}", e))?;
    if !(0.0..=1.0).contains(&value) {
        Err(format!(
            "The value must be between 0.0 and 1.0, got: {}",
            value
        ))
    } else {
        Ok(value)
    }
}

fn positive_u64(s: &str) -> ParseResult<u64> {
    let value: u64 = s.parse().map_err(|e| format!("Could not parse: {}", e))?;
    if value == 0 {
        Err("The value must be at least 1".to_string())
    } else {
        Ok(value)
    }
}

fn positive_u32(s: &str) -> ParseResult<u32> {
    let value: u32 = s.parse().map_err(|e| format!("Could not parse: {}", e))?;
    if value == 0 {
        Err("The value must be at least 1".to_string())
    } else {
        Ok(value)
    }
}

fn class_in_range(s: &str, max: u8) -> ParseResult<u8> {
    let value: u8 = s.parse().map_err(|e| format!("Could not parse: {}", e))?;
    if (1..=max).contains(&value) {
        Ok(value)
    } else {
        Err(format!(
            "The value must be between 1 and {}, got: {}",
            max, value
        ))
    }
}

fn class_1_3(s: &str) -> ParseResult<u8> {
    class_in_range(s, 3)
}

fn class_1_4(s: &str) -> ParseResult<u8> {
    class_in_range(s, 4)
}

fn percent_1_100(s: &str) -> ParseResult<u8> {
    class_in_range(s, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_validators() {
        assert!(ensure_unit_float("0.7").is_ok());
        assert!(ensure_unit_float("1.5").is_err());
        assert!(positive_u64("0").is_err());
        assert!(positive_u64("50").is_ok());
        assert_eq!(positive_u32("50"), Ok(50));
        assert!(positive_u32("0").is_err());
        assert!(positive_u32("4294967297").is_err());
        assert!(class_1_3("3").is_ok());
        assert!(class_1_3("4").is_err());
        assert!(percent_1_100("100").is_ok());
        assert!(percent_1_100("0").is_err());
    }

    #[test]
    fn test_run_args_parse_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().to_str().unwrap();
        let args =
            RunArgs::try_parse_from(["run", "-i", input, "-o", "/tmp/out", "-t", "2"]).unwrap();
        assert_eq!(args.selection.subsample_size, 10000);
        assert_eq!(args.selection.genome, 2);
        assert_eq!(args.consensus.min_depth, 50);
        assert_eq!(args.consensus.majority_threshold, 0.7);
        assert_eq!(args.io.stage_timeout, 3600);
        assert_eq!(args.io.threads, 2);
    }

    #[test]
    fn test_invalid_filter_class_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().to_str().unwrap();
        assert!(SelectArgs::try_parse_from([
            "select", "-i", input, "-o", "/tmp/out", "--genome", "5"
        ])
        .is_err());
    }
}
