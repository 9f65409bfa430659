pub mod asset;
pub mod config;
pub mod encrypt;
pub mod filter;
pub mod frontmatter;
pub mod markdown;
pub mod mime;
pub mod minify;
pub mod reload;
pub mod replace;
pub mod sitemap;
pub mod source;
pub mod template;
pub mod transform;

// Re-export main types
pub use asset::{Asset, Assets, Meta, WriteError};
pub use encrypt::{EncryptionTransformer, StorageMode};
pub use filter::Filter;
pub use frontmatter::FrontmatterTransformer;
pub use markdown::MarkdownTransformer;
pub use minify::{Minifier, MinifyTransformer};
pub use reload::AutoReloadTransformer;
pub use replace::ReplaceTransformer;
pub use source::SourceError;
pub use template::{Layout, TemplateTransformer};
pub use transform::{TransformError, Transformer};
