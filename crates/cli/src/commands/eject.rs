use std::path::Path;

use octave_core::{EjectFormat, EjectMode};
use octave_tools::{eject, EjectRequest};

use super::{fail, print_json, read_source, schemas};
use crate::config::Config;
use crate::OutputFormat;

pub(crate) fn cmd_eject(
    config: &Config,
    content: Option<&Path>,
    schema: Option<String>,
    mode: EjectMode,
    format: EjectFormat,
    output: OutputFormat,
    quiet: bool,
) {
    let req = EjectRequest {
        content: content.map(|p| read_source(p, output, quiet)),
        schema,
        mode,
        format,
    };
    let resp = match eject(&req, &schemas(config)) {
        Ok(r) => r,
        Err(e) => fail(&e, output, quiet),
    };
    match output {
        OutputFormat::Json => print_json(&resp),
        OutputFormat::Text => {
            print!("{}", resp.output);
            if resp.lossy && !quiet {
                if !resp.fields_omitted.is_empty() {
                    eprintln!("lossy projection; omitted: {}", resp.fields_omitted.join(", "));
                }
                for loss in &resp.format_losses {
                    eprintln!("format drops {}", loss);
                }
            }
        }
    }
}
