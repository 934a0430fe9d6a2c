use std::collections::BTreeMap;
use std::path::PathBuf;

use octave_storage::FsStore;
use octave_tools::{write, ToolError, WriteRequest};

use super::{fail, print_json, read_source, schemas};
use crate::config::Config;
use crate::OutputFormat;

pub(crate) struct WriteArgs {
    pub(crate) path: String,
    pub(crate) content: Option<PathBuf>,
    pub(crate) set: Vec<String>,
    pub(crate) schema: Option<String>,
    pub(crate) base_hash: Option<String>,
    pub(crate) fix: bool,
}

/// `PATH=VALUE` pairs; the value may itself contain `=`.
fn parse_changes(set: &[String]) -> Result<Option<BTreeMap<String, String>>, ToolError> {
    if set.is_empty() {
        return Ok(None);
    }
    let mut changes = BTreeMap::new();
    for item in set {
        let (path, value) = item.split_once('=').ok_or_else(|| ToolError::InvalidRequest {
            message: format!("--set expects PATH=VALUE, got '{}'", item),
        })?;
        changes.insert(path.trim().to_owned(), value.to_owned());
    }
    Ok(Some(changes))
}

pub(crate) fn cmd_write(config: &Config, args: WriteArgs, output: OutputFormat, quiet: bool) {
    let changes = match parse_changes(&args.set) {
        Ok(c) => c,
        Err(e) => fail(&e, output, quiet),
    };
    let req = WriteRequest {
        target_path: args.path,
        content: args
            .content
            .as_deref()
            .map(|p| read_source(p, output, quiet)),
        changes,
        schema: args.schema,
        base_hash: args.base_hash,
        fix: args.fix,
    };
    let store = FsStore::new(&config.store_root);
    let resp = match write(&req, &store, &schemas(config)) {
        Ok(r) => r,
        Err(e) => fail(&e, output, quiet),
    };
    match output {
        OutputFormat::Json => print_json(&resp),
        OutputFormat::Text => {
            if !quiet {
                print!("{}", resp.diff);
                eprintln!("wrote {} ({})", resp.path, resp.hash);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_pairs_split_on_first_equals() {
        let set = vec!["A.B=[x,y]".to_owned(), "C=\"a=b\"".to_owned()];
        let changes = parse_changes(&set).unwrap().unwrap();
        assert_eq!(changes["A.B"], "[x,y]");
        assert_eq!(changes["C"], "\"a=b\"");
        assert!(parse_changes(&[]).unwrap().is_none());
        assert!(parse_changes(&["nope".to_owned()]).is_err());
    }
}
