use pulldown_cmark::{html, Options, Parser};

use crate::asset::{extension, Asset};
use crate::transform::{TransformError, Transformer};

/// Renders `.md` assets to HTML and rewrites their extension to
/// `.html`. Every other asset passes through byte-for-byte.
pub struct MarkdownTransformer {
    pub options: Options,
}

impl Default for MarkdownTransformer {
    fn default() -> Self {
        Self {
            options: Options::all(),
        }
    }
}

impl Transformer for MarkdownTransformer {
    fn transform(&self, asset: &mut Asset) -> Result<(), TransformError> {
        if extension(&asset.path) != ".md" {
            return Ok(());
        }

        let text = std::str::from_utf8(&asset.data).map_err(|_| TransformError::Utf8 {
            path: asset.path.clone(),
        })?;

        let mut rendered = String::with_capacity(text.len() * 2);
        html::push_html(&mut rendered, Parser::new_ext(text, self.options));

        if let Some(stem) = asset.path.strip_suffix(".md") {
            asset.path = format!("{}.html", stem);
        }
        asset.data = rendered.into_bytes();

        Ok(())
    }
}
