use crate::ToolError;
use octave_core::{
    canonicalize, eject as project, select_schema, template, EjectFormat, EjectMode,
    RepairConfig, SchemaSource,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EjectRequest {
    /// Without content, a template is generated from the schema examples.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Falls back to the content's META TYPE or envelope name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub mode: EjectMode,
    #[serde(default)]
    pub format: EjectFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EjectResponse {
    pub output: String,
    pub lossy: bool,
    pub fields_omitted: Vec<String>,
    /// What a non-native format could not carry, as `path: what`
    pub format_losses: Vec<String>,
}

pub fn eject(req: &EjectRequest, schemas: &dyn SchemaSource) -> Result<EjectResponse, ToolError> {
    let schema_name = match (&req.schema, &req.content) {
        (Some(name), _) => name.clone(),
        (None, Some(content)) => select_schema(content, None)?,
        (None, None) => select_schema("", None)?,
    };
    let schema = schemas.load(&schema_name)?;

    let ast = match &req.content {
        Some(content) => {
            let config = RepairConfig::default().with_envelope_hint(schema_name.as_str());
            canonicalize(content, &config, None)?.ast
        }
        None => template(&schema),
    };
    let out = project(&ast, Some(&schema), req.mode, req.format)?;
    tracing::info!(
        schema = %schema_name,
        mode = ?req.mode,
        format = ?req.format,
        lossy = out.lossy,
        "eject"
    );
    Ok(EjectResponse {
        output: out.output,
        lossy: out.lossy,
        fields_omitted: out.fields_omitted,
        format_losses: out.format_losses,
    })
}
