use std::collections::HashMap;

use serde_json::Value;
use tera::{Context, Tera};

use crate::asset::{extension, Asset, Meta};
use crate::transform::{TransformError, Transformer};

/// Reserved context key for the shared read-only data bag.
pub const GLOBAL_KEY: &str = "global";
/// Context key the layout's own metadata is exposed under.
pub const LAYOUT_KEY: &str = "layout";

/// A shared layout wrapping each asset: the layout source is rendered as
/// the main template, with the asset's body registered as the named
/// `child_block` template (`{% include "child_block" %}` in the layout).
pub struct Layout {
    pub template: Asset,
    pub child_block: String,
}

/// Renders each asset's payload as a template over its own metadata.
///
/// The context holds the asset's metadata keys at the top level, plus
/// the `global` data bag (reserved; an asset redefining it is rejected).
/// Named components are registered as includable sub-templates for
/// assets sharing their file extension. With a [`Layout`], the layout's
/// metadata is merged underneath the asset's and also exposed intact
/// under `layout`.
pub struct TemplateTransformer {
    pub components: HashMap<String, Asset>,
    pub global: Meta,
    pub layout: Option<Layout>,
}

impl Default for TemplateTransformer {
    fn default() -> Self {
        Self {
            components: HashMap::new(),
            global: Meta::new(),
            layout: None,
        }
    }
}

impl Transformer for TemplateTransformer {
    fn transform(&self, asset: &mut Asset) -> Result<(), TransformError> {
        if let Some(meta) = &asset.meta {
            if meta.contains_key(GLOBAL_KEY) {
                return Err(TransformError::ReservedKey {
                    path: asset.path.clone(),
                    key: GLOBAL_KEY,
                });
            }
        }

        let body = text_of(asset)?.to_string();
        let mut tera = Tera::default();
        // Payloads are trusted site sources, same as the component and
        // layout templates themselves.
        tera.autoescape_on(Vec::new());

        for (name, component) in &self.components {
            if extension(&component.path) != extension(&asset.path) {
                continue;
            }
            let source = text_of(component)?;
            tera.add_raw_template(name, source)
                .map_err(|e| template_error(&component.path, e))?;
        }

        let mut context = Context::new();
        let main_template = match &self.layout {
            Some(layout) => {
                tera.add_raw_template(&layout.child_block, &body)
                    .map_err(|e| template_error(&asset.path, e))?;

                let layout_source = text_of(&layout.template)?;
                tera.add_raw_template(&layout.template.path, layout_source)
                    .map_err(|e| template_error(&layout.template.path, e))?;

                if let Some(layout_meta) = &layout.template.meta {
                    for (key, value) in layout_meta {
                        context.insert(key.as_str(), value);
                    }
                    context.insert(LAYOUT_KEY, &Value::Object(layout_meta.clone()));
                }

                layout.template.path.as_str()
            }
            None => {
                tera.add_raw_template(&asset.path, &body)
                    .map_err(|e| template_error(&asset.path, e))?;
                asset.path.as_str()
            }
        };

        if let Some(meta) = &asset.meta {
            for (key, value) in meta {
                context.insert(key.as_str(), value);
            }
        }
        context.insert(GLOBAL_KEY, &Value::Object(self.global.clone()));

        let rendered = tera
            .render(main_template, &context)
            .map_err(|e| template_error(&asset.path, e))?;
        asset.data = rendered.into_bytes();

        Ok(())
    }
}

fn text_of(asset: &Asset) -> Result<&str, TransformError> {
    std::str::from_utf8(&asset.data).map_err(|_| TransformError::Utf8 {
        path: asset.path.clone(),
    })
}

fn template_error(path: &str, source: tera::Error) -> TransformError {
    TransformError::Template {
        path: path.to_string(),
        source,
    }
}
