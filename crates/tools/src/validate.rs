use crate::ToolError;
use octave_core::schema::{Route, ValidationError};
use octave_core::{canonicalize, RepairConfig, RepairEntry, SchemaSource, ValidationStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Without a schema the document is canonicalized but left UNVALIDATED.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    #[serde(default)]
    pub fix: bool,
    /// Accept a missing envelope; defaults to true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lenient: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub canonical: String,
    pub valid: bool,
    pub validation_status: ValidationStatus,
    pub validation_errors: Vec<ValidationError>,
    pub repair_log: Vec<RepairEntry>,
    pub routes: Vec<Route>,
}

/// Source text of a request that carries either inline content or a path.
pub(crate) fn request_source(
    content: Option<&str>,
    file_path: Option<&str>,
) -> Result<String, ToolError> {
    match (content, file_path) {
        (Some(c), None) => Ok(c.to_owned()),
        (None, Some(p)) => std::fs::read_to_string(p).map_err(|source| ToolError::Io {
            path: p.to_owned(),
            source,
        }),
        (Some(_), Some(_)) => Err(ToolError::request("give either content or file_path, not both")),
        (None, None) => Err(ToolError::request("content or file_path is required")),
    }
}

pub fn validate(req: &ValidateRequest, schemas: &dyn SchemaSource) -> Result<ValidateResponse, ToolError> {
    let src = request_source(req.content.as_deref(), req.file_path.as_deref())?;
    let schema = req
        .schema_name
        .as_deref()
        .map(|name| schemas.load(name))
        .transpose()?;
    let config = RepairConfig {
        fix: req.fix,
        lenient: req.lenient.unwrap_or(true),
        envelope_hint: req.schema_name.clone(),
    };
    let out = canonicalize(&src, &config, schema.as_ref())?;
    tracing::info!(
        schema = req.schema_name.as_deref().unwrap_or("-"),
        status = ?out.validation_status,
        errors = out.validation_errors.len(),
        repairs = out.repair_log.len(),
        "validate"
    );
    Ok(ValidateResponse {
        valid: out.is_valid(),
        canonical: out.canonical,
        validation_status: out.validation_status,
        validation_errors: out.validation_errors,
        repair_log: out.repair_log.into_entries(),
        routes: out.routes,
    })
}
