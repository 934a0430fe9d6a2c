use std::path::Path;
use std::process;

use octave_core::ValidationStatus;
use octave_tools::{validate, ValidateRequest};

use super::{fail, print_json, read_source, schemas};
use crate::config::Config;
use crate::OutputFormat;

pub(crate) fn cmd_validate(
    config: &Config,
    file: &Path,
    schema: Option<String>,
    fix: bool,
    lenient: bool,
    output: OutputFormat,
    quiet: bool,
) {
    let req = ValidateRequest {
        content: Some(read_source(file, output, quiet)),
        file_path: None,
        schema_name: schema,
        fix,
        lenient: Some(lenient),
    };
    let resp = match validate(&req, &schemas(config)) {
        Ok(r) => r,
        Err(e) => fail(&e, output, quiet),
    };

    match output {
        OutputFormat::Json => print_json(&resp),
        OutputFormat::Text => {
            if !quiet {
                for e in &resp.validation_errors {
                    eprintln!("{} {}: {} ({})", e.code, e.path, e.message, e.rationale);
                }
                for r in &resp.repair_log {
                    eprintln!("{:?} {}: {} -> {}", r.tier, r.rule_id, r.before, r.after);
                }
                let status = match resp.validation_status {
                    ValidationStatus::Validated => "VALIDATED",
                    ValidationStatus::Invalid => "INVALID",
                    ValidationStatus::Unvalidated => "UNVALIDATED",
                };
                eprintln!("{}: {}", file.display(), status);
            }
            print!("{}", resp.canonical);
        }
    }
    if !resp.valid {
        process::exit(1);
    }
}
