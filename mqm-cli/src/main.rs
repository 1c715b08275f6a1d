use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use std::path::PathBuf;

use mqm_core::SpanMode;
use mqm_core::load_or_initialize_config;

mod commands;

const APP_NAME: &str = "mqm";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliSpanMode {
    None,
    Tag,
    Seg,
}

impl From<CliSpanMode> for SpanMode {
    fn from(mode: CliSpanMode) -> Self {
        match mode {
            CliSpanMode::None => SpanMode::None,
            CliSpanMode::Tag => SpanMode::Tag,
            CliSpanMode::Seg => SpanMode::Seg,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliSplit {
    Train,
    Validation,
}

#[derive(Parser)]
#[command(name = "mqm-cli")]
#[command(about = "Format MQM annotation corpora into chat training data", long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    #[arg(long, short, global = true, help = "Show verbose output")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show configuration and dataset information")]
    Info,

    #[command(about = "Format both splits into chat-style JSONL files")]
    Format {
        #[arg(long, help = "Override the configured train split path")]
        train: Option<PathBuf>,

        #[arg(long, help = "Override the configured validation split path")]
        validation: Option<PathBuf>,

        #[arg(long, value_enum, help = "Span handling mode (default from config)")]
        span_mode: Option<CliSpanMode>,

        #[arg(long, short, help = "Output directory (default: <state dir>/formatted)")]
        output: Option<PathBuf>,
    },

    #[command(about = "Show per-split record and error-severity statistics")]
    Stats {
        #[arg(long, help = "Override the configured train split path")]
        train: Option<PathBuf>,

        #[arg(long, help = "Override the configured validation split path")]
        validation: Option<PathBuf>,
    },

    #[command(about = "Pretty-print the first formatted records of a split")]
    Preview {
        #[arg(value_enum, help = "Which split to preview")]
        split: CliSplit,

        #[arg(long, short = 'n', default_value_t = 3, help = "Number of records to show")]
        count: usize,

        #[arg(long, value_enum, help = "Span handling mode (default from config)")]
        span_mode: Option<CliSpanMode>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let bundle = load_or_initialize_config(APP_NAME)?;

    match cli.command {
        Commands::Info => commands::handle_info(&bundle),
        Commands::Format {
            train,
            validation,
            span_mode,
            output,
        } => commands::handle_format(
            &bundle,
            train,
            validation,
            span_mode.map(SpanMode::from),
            output,
            cli.verbose,
        ),
        Commands::Stats { train, validation } => {
            commands::handle_stats(&bundle, train, validation, cli.verbose)
        }
        Commands::Preview {
            split,
            count,
            span_mode,
        } => {
            let split = match split {
                CliSplit::Train => commands::Split::Train,
                CliSplit::Validation => commands::Split::Validation,
            };
            commands::handle_preview(&bundle, split, count, span_mode.map(SpanMode::from))
        }
    }
}
