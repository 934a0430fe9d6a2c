use std::path::Path;

use octave_core::tokenize;
use octave_tools::ToolError;

use super::{fail, print_json, read_source};
use crate::OutputFormat;

pub(crate) fn cmd_tokens(file: &Path, output: OutputFormat, quiet: bool) {
    let src = read_source(file, output, quiet);
    match tokenize(&src) {
        Ok(lexed) => print_json(&serde_json::json!({
            "tokens": lexed.tokens,
            "repair_log": lexed.repairs,
        })),
        Err(e) => fail(&ToolError::from(octave_core::OctaveError::from(e)), output, quiet),
    }
}
