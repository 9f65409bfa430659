use crate::asset::Asset;

/// A unit of the transform pipeline: maps one asset into a modified
/// asset in place, or fails with a description of what went wrong.
///
/// Transformers that do not apply to an asset's type leave it unchanged
/// and return success.
pub trait Transformer {
    fn transform(&self, asset: &mut Asset) -> Result<(), TransformError>;
}

#[derive(Debug)]
pub enum TransformError {
    /// A text transformer met a payload that is not valid UTF-8.
    Utf8 { path: String },
    Frontmatter { path: String, reason: String },
    Template { path: String, source: tera::Error },
    /// An asset's metadata redefines a reserved template namespace key.
    ReservedKey { path: String, key: &'static str },
    Minify { path: String, mime: String, reason: String },
    MissingPassword,
    MissingTemplateElement { id: String },
    Encrypt { path: String, reason: String },
}

impl std::fmt::Display for TransformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformError::Utf8 { path } => {
                write!(f, "asset {} is not valid UTF-8 text", path)
            }
            TransformError::Frontmatter { path, reason } => {
                write!(f, "invalid frontmatter in {}: {}", path, reason)
            }
            TransformError::Template { path, source } => {
                write!(f, "template error in {}: {}", path, source)
            }
            TransformError::ReservedKey { path, key } => {
                write!(f, "asset {} redefines reserved metadata key '{}'", path, key)
            }
            TransformError::Minify { path, mime, reason } => {
                write!(f, "minify failed for {} ({}): {}", path, mime, reason)
            }
            TransformError::MissingPassword => {
                write!(f, "a non-empty password is required for encryption")
            }
            TransformError::MissingTemplateElement { id } => {
                write!(
                    f,
                    "encryption template must contain an element with id '{}'",
                    id
                )
            }
            TransformError::Encrypt { path, reason } => {
                write!(f, "failed to encrypt {}: {}", path, reason)
            }
        }
    }
}

impl std::error::Error for TransformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransformError::Template { source, .. } => Some(source),
            _ => None,
        }
    }
}
