use std::collections::HashMap;

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier as OxcMinifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

use crate::asset::Asset;
use crate::mime;
use crate::transform::{TransformError, Transformer};

#[derive(Debug, Clone, Copy)]
enum Backend {
    Css,
    Js,
    /// Whitespace collapse for HTML/SVG/XML documents.
    Markup,
}

/// MIME-keyed minification registry. Constructed once at pipeline setup
/// and injected into the [`MinifyTransformer`]; read-only afterwards.
pub struct Minifier {
    backends: HashMap<&'static str, Backend>,
}

impl Minifier {
    pub fn new() -> Self {
        let mut backends = HashMap::new();
        backends.insert("text/html", Backend::Markup);
        backends.insert("text/css", Backend::Css);
        backends.insert("text/javascript", Backend::Js);
        backends.insert("image/svg+xml", Backend::Markup);
        backends.insert("application/xml", Backend::Markup);
        backends.insert("text/xml", Backend::Markup);
        Self { backends }
    }

    /// Minify `data` according to its MIME essence. `Ok(None)` means no
    /// backend handles this type and the caller should pass the payload
    /// through unchanged; `Err` is a genuine backend failure.
    pub fn minify(&self, mime_type: &str, data: &[u8]) -> Result<Option<Vec<u8>>, String> {
        let Some(backend) = self.backends.get(mime_type) else {
            return Ok(None);
        };

        let source =
            std::str::from_utf8(data).map_err(|_| "payload is not valid UTF-8".to_string())?;

        let minified = match backend {
            Backend::Css => minify_css(source)?,
            Backend::Js => minify_js(source)?,
            Backend::Markup => collapse_markup(source),
        };

        Ok(Some(minified.into_bytes()))
    }
}

impl Default for Minifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Minifies assets whose path extension resolves to a registered
/// content type; everything else passes through unchanged.
pub struct MinifyTransformer {
    pub minifier: Minifier,
}

impl MinifyTransformer {
    pub fn new(minifier: Minifier) -> Self {
        Self { minifier }
    }
}

impl Transformer for MinifyTransformer {
    fn transform(&self, asset: &mut Asset) -> Result<(), TransformError> {
        let mime_type = mime::essence(mime::from_path(&asset.path)).to_string();

        match self.minifier.minify(&mime_type, &asset.data) {
            Ok(Some(minified)) => {
                asset.data = minified;
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(reason) => Err(TransformError::Minify {
                path: asset.path.clone(),
                mime: mime_type,
                reason,
            }),
        }
    }
}

fn minify_js(source: &str) -> Result<String, String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if !ret.errors.is_empty() {
        return Err(ret
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; "));
    }

    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = OxcMinifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;

    Ok(code)
}

fn minify_css(source: &str) -> Result<String, String> {
    let stylesheet =
        StyleSheet::parse(source, ParserOptions::default()).map_err(|e| e.to_string())?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;

    Ok(result.code)
}

/// Strip indentation and blank lines from markup documents. Text inside
/// a line keeps its internal spacing.
fn collapse_markup(source: &str) -> String {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("")
}
