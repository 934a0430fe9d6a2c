use std::path::Path;
use std::process;

use octave_core::{canonicalize, RepairConfig};
use octave_tools::ToolError;

use super::{fail, print_json, read_source};
use crate::config::Config;
use crate::OutputFormat;

pub(crate) fn cmd_fmt(config: &Config, file: &Path, check: bool, output: OutputFormat, quiet: bool) {
    let src = read_source(file, output, quiet);
    let repair = RepairConfig {
        lenient: config.lenient,
        ..RepairConfig::default()
    };
    let out = match canonicalize(&src, &repair, None) {
        Ok(o) => o,
        Err(e) => fail(&ToolError::from(e), output, quiet),
    };
    let canonical = out.canonical == src;

    if check {
        match output {
            OutputFormat::Json => print_json(&serde_json::json!({
                "file": file.display().to_string(),
                "canonical": canonical,
                "repair_log": out.repair_log.entries(),
            })),
            OutputFormat::Text => {
                if !quiet {
                    let verdict = if canonical { "canonical" } else { "not canonical" };
                    eprintln!("{}: {}", file.display(), verdict);
                }
            }
        }
        if !canonical {
            process::exit(1);
        }
        return;
    }

    match output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "canonical": out.canonical,
            "repair_log": out.repair_log.entries(),
        })),
        OutputFormat::Text => print!("{}", out.canonical),
    }
}
