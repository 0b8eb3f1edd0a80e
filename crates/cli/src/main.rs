mod commands;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use commands::{cmd_check, cmd_doc, cmd_simulate, cmd_tree, AllowLists};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// TraceViz template toolchain.
#[derive(Parser)]
#[command(name = "traceviz", version, about = "TraceViz template toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a template and print its element tree
    Tree {
        /// Path to the .tvz template
        file: PathBuf,
    },

    /// Resolve a template and check its interactions against allow-lists
    Check {
        /// Path to the .tvz template
        file: PathBuf,
        /// Supported actions, as comma-separated target:type pairs
        #[arg(long)]
        actions: Option<String>,
        /// Supported reactions, as comma-separated target:type pairs
        #[arg(long)]
        reactions: Option<String>,
        /// Supported watch types, comma-separated
        #[arg(long)]
        watches: Option<String>,
        /// TOML file with a [supported] table of allow-lists
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the interactions declared by a template
    Doc {
        /// Path to the .tvz template
        file: PathBuf,
    },

    /// Replay a JSON script of UI events against a template
    Simulate {
        /// Path to the .tvz template
        file: PathBuf,
        /// Path to the script JSON file
        #[arg(long)]
        script: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Tree { file } => {
            cmd_tree(&file, cli.output, cli.quiet);
        }
        Commands::Check {
            file,
            actions,
            reactions,
            watches,
            config,
        } => {
            let flags = AllowLists::from_flags(
                actions.as_deref(),
                reactions.as_deref(),
                watches.as_deref(),
            );
            let lists = match (flags, config) {
                (Err(msg), _) => {
                    report_error(&msg, cli.output, cli.quiet);
                    process::exit(1);
                }
                (Ok(flags), Some(path)) => match AllowLists::from_config(&path) {
                    Ok(from_file) => flags.merge(from_file),
                    Err(msg) => {
                        report_error(&msg, cli.output, cli.quiet);
                        process::exit(1);
                    }
                },
                (Ok(flags), None) => flags,
            };
            cmd_check(&file, &lists, cli.output, cli.quiet);
        }
        Commands::Doc { file } => {
            cmd_doc(&file, cli.output, cli.quiet);
        }
        Commands::Simulate { file, script } => {
            cmd_simulate(&file, &script, cli.output, cli.quiet);
        }
    }
}

/// Log to stderr. `TRACEVIZ_LOG` overrides the level picked by `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_env("TRACEVIZ_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
