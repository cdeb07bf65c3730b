use serde_json::Value;

/// Why a fetched document cannot be synced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("document has no info.version")]
    MissingVersion,

    #[error("info.version is empty")]
    EmptyVersion,
}

/// A parsed OpenAPI/Swagger document and its normalised version.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub document: Value,
    pub version: String,
}

impl ParsedDocument {
    pub fn parse(raw: &str) -> Result<Self, DocumentError> {
        let document: Value =
            serde_json::from_str(raw).map_err(|e| DocumentError::InvalidJson(e.to_string()))?;

        let raw_version = match document.get("info").and_then(|info| info.get("version")) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(DocumentError::MissingVersion),
        };

        let version = normalize_version(&raw_version).ok_or(DocumentError::EmptyVersion)?;

        Ok(Self { document, version })
    }

    /// The document as written to the repository: 2-space indented JSON with
    /// the source key order.
    pub fn render(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(&self.document)
            .map_err(|e| DocumentError::InvalidJson(e.to_string()))
    }
}

/// Keep only the first whitespace-delimited token, so values such as
/// `"1.0.0-16 | 1.0"` become `"1.0.0-16"`.
pub fn normalize_version(raw: &str) -> Option<String> {
    raw.split_whitespace().next().map(str::to_owned)
}
