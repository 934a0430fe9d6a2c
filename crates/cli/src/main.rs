mod commands;
mod config;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use octave_core::{EjectFormat, EjectMode};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Projection mode for the eject subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Canonical,
    Authoring,
    Executive,
    Developer,
}

impl From<ModeArg> for EjectMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Canonical => EjectMode::Canonical,
            ModeArg::Authoring => EjectMode::Authoring,
            ModeArg::Executive => EjectMode::Executive,
            ModeArg::Developer => EjectMode::Developer,
        }
    }
}

/// Rendering format for the eject subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Native,
    Json,
    Yaml,
    Markdown,
}

impl From<FormatArg> for EjectFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Native => EjectFormat::Native,
            FormatArg::Json => EjectFormat::Json,
            FormatArg::Yaml => EjectFormat::Yaml,
            FormatArg::Markdown => EjectFormat::Markdown,
        }
    }
}

/// OCTAVE document toolchain.
#[derive(Parser)]
#[command(name = "octave", version, about = "OCTAVE document toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to an octave.toml (default: ./octave.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Canonicalize a document and validate it against a schema
    Validate {
        /// Path to the OCTAVE document
        file: PathBuf,
        /// Schema name (resolved in the schema directory)
        #[arg(long)]
        schema: Option<String>,
        /// Apply unambiguous value repairs
        #[arg(long)]
        fix: bool,
        /// Accept a missing envelope
        #[arg(long, conflicts_with = "strict")]
        lenient: bool,
        /// Refuse a missing envelope
        #[arg(long)]
        strict: bool,
    },

    /// Canonicalize, validate and store a document
    Write {
        /// Store-relative target path
        path: String,
        /// File holding the full new content
        #[arg(long, conflicts_with = "set")]
        content: Option<PathBuf>,
        /// Field change as PATH=VALUE (repeatable)
        #[arg(long = "set", value_name = "PATH=VALUE")]
        set: Vec<String>,
        /// Schema name to validate against before writing
        #[arg(long)]
        schema: Option<String>,
        /// Hash of the content this change is based on
        #[arg(long)]
        base_hash: Option<String>,
        /// Apply unambiguous value repairs
        #[arg(long)]
        fix: bool,
    },

    /// Project a document (or a schema template) for another reader
    Eject {
        /// Document to project; omit for a template from the schema
        #[arg(long)]
        content: Option<PathBuf>,
        /// Schema name (default: the document's META TYPE or envelope)
        #[arg(long)]
        schema: Option<String>,
        #[arg(long, default_value = "canonical", value_enum)]
        mode: ModeArg,
        #[arg(long, default_value = "native", value_enum)]
        format: FormatArg,
    },

    /// Print the canonical form of a document
    Fmt {
        /// Path to the OCTAVE document
        file: PathBuf,
        /// Exit 1 instead of printing when the file is not canonical
        #[arg(long)]
        check: bool,
    },

    /// Dump the token stream of a document as JSON
    Tokens {
        /// Path to the OCTAVE document
        file: PathBuf,
    },

    /// Start the OCTAVE HTTP API server
    Serve {
        /// Port to listen on (default from config, else 8080)
        #[arg(long)]
        port: Option<u16>,
    },
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "octave=warn" } else { "octave=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("OCTAVE_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| default.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(msg) => {
            report_error(&msg, cli.output, cli.quiet);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Validate {
            file,
            schema,
            fix,
            lenient,
            strict,
        } => {
            let lenient = if strict { false } else { lenient || config.lenient };
            commands::validate::cmd_validate(
                &config,
                &file,
                schema,
                fix || config.fix,
                lenient,
                cli.output,
                cli.quiet,
            );
        }
        Commands::Write {
            path,
            content,
            set,
            schema,
            base_hash,
            fix,
        } => {
            commands::write::cmd_write(
                &config,
                commands::write::WriteArgs {
                    path,
                    content,
                    set,
                    schema,
                    base_hash,
                    fix: fix || config.fix,
                },
                cli.output,
                cli.quiet,
            );
        }
        Commands::Eject {
            content,
            schema,
            mode,
            format,
        } => {
            commands::eject::cmd_eject(
                &config,
                content.as_deref(),
                schema,
                mode.into(),
                format.into(),
                cli.output,
                cli.quiet,
            );
        }
        Commands::Fmt { file, check } => {
            commands::fmt::cmd_fmt(&config, &file, check, cli.output, cli.quiet);
        }
        Commands::Tokens { file } => {
            commands::tokens::cmd_tokens(&file, cli.output, cli.quiet);
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.serve.port);
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    report_error(&format!("failed to start runtime: {}", e), cli.output, cli.quiet);
                    process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(serve::start_server(port, config)) {
                report_error(&format!("Server error: {}", e), cli.output, cli.quiet);
                process::exit(1);
            }
        }
    }
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
