pub(crate) mod eject;
pub(crate) mod fmt;
pub(crate) mod tokens;
pub(crate) mod validate;
pub(crate) mod write;

use std::path::Path;
use std::process;

use octave_core::FileSystemSchemas;
use octave_tools::ToolError;

use crate::config::Config;
use crate::{report_error, OutputFormat};

pub(crate) fn schemas(config: &Config) -> FileSystemSchemas {
    FileSystemSchemas::new(&config.schema_dir)
}

pub(crate) fn read_source(path: &Path, output: OutputFormat, quiet: bool) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

/// Print a structured error and exit 1. JSON output always carries the
/// full error object; text output a one-line summary plus the rationale.
pub(crate) fn fail(err: &ToolError, output: OutputFormat, quiet: bool) -> ! {
    match output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&err.to_json_value())
                .unwrap_or_else(|_| format!("{{\"error\": \"{}\"}}", err.code()));
            eprintln!("{}", json);
        }
        OutputFormat::Text => {
            if !quiet {
                let json = err.to_json_value();
                let position = match (json["line"].as_u64(), json["column"].as_u64()) {
                    (Some(l), Some(c)) => format!(" at {}:{}", l, c),
                    _ => String::new(),
                };
                eprintln!("error[{}]{}: {}", err.code(), position, err);
                if let Some(r) = json["rationale"].as_str() {
                    eprintln!("  = {}", r);
                }
                if let Some(errors) = json["validation_errors"].as_array() {
                    for e in errors {
                        eprintln!(
                            "  {} {}: {}",
                            e["code"].as_str().unwrap_or(""),
                            e["path"].as_str().unwrap_or(""),
                            e["message"].as_str().unwrap_or("")
                        );
                    }
                }
            }
        }
    }
    process::exit(1);
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            eprintln!("serialization error: {}", e);
            process::exit(1);
        }
    }
}
