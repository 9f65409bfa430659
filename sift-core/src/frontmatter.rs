use serde_json::Value;

use crate::asset::{Asset, Meta};
use crate::transform::{TransformError, Transformer};

/// Extracts a leading delimited metadata block (`---` YAML or `+++`
/// TOML) from the payload, merges its keys into the asset's metadata
/// (block keys win), and replaces the payload with the remaining body.
///
/// Assets without a block keep their payload; either way the metadata
/// container ends up initialized.
pub struct FrontmatterTransformer;

impl Transformer for FrontmatterTransformer {
    fn transform(&self, asset: &mut Asset) -> Result<(), TransformError> {
        let Ok(text) = std::str::from_utf8(&asset.data) else {
            // Binary payloads cannot carry a block.
            if asset.meta.is_none() {
                asset.meta = Some(Meta::new());
            }
            return Ok(());
        };

        let extracted = extract(text).map_err(|reason| TransformError::Frontmatter {
            path: asset.path.clone(),
            reason,
        })?;

        let meta = asset.meta.get_or_insert_with(Meta::new);
        if let Some((block, body)) = extracted {
            for (key, value) in block {
                meta.insert(key, value);
            }
            asset.data = body.into_bytes();
        }

        Ok(())
    }
}

enum Dialect {
    Yaml,
    Toml,
}

impl Dialect {
    fn delimiter(&self) -> &'static str {
        match self {
            Dialect::Yaml => "---",
            Dialect::Toml => "+++",
        }
    }
}

/// Split and parse a leading metadata block. Returns `None` when the
/// payload does not open with a delimiter line; errors when a block is
/// opened but never closed, or fails to parse as a mapping.
fn extract(text: &str) -> Result<Option<(Meta, String)>, String> {
    let (first_line, after_first) = match text.split_once('\n') {
        Some((line, rest)) => (line.trim_end_matches('\r'), rest),
        None => (text.trim_end_matches('\r'), ""),
    };

    let dialect = match first_line {
        "---" => Dialect::Yaml,
        "+++" => Dialect::Toml,
        _ => return Ok(None),
    };
    let delimiter = dialect.delimiter();

    let mut position = 0;
    loop {
        let (line, next) = match after_first[position..].find('\n') {
            Some(i) => (&after_first[position..position + i], position + i + 1),
            None => (&after_first[position..], after_first.len()),
        };

        if line.trim_end_matches('\r') == delimiter {
            let block = &after_first[..position];
            let body = after_first[next..].to_string();
            return Ok(Some((parse_block(&dialect, block)?, body)));
        }
        if next == after_first.len() {
            return Err("unterminated frontmatter block".to_string());
        }
        position = next;
    }
}

fn parse_block(dialect: &Dialect, block: &str) -> Result<Meta, String> {
    let value = match dialect {
        Dialect::Yaml => {
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(block).map_err(|e| e.to_string())?;
            if matches!(yaml, serde_yaml::Value::Null) {
                return Ok(Meta::new());
            }
            serde_json::to_value(yaml).map_err(|e| e.to_string())?
        }
        Dialect::Toml => {
            let table: toml::Table = toml::from_str(block).map_err(|e| e.to_string())?;
            serde_json::to_value(table).map_err(|e| e.to_string())?
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err("frontmatter block must be a mapping".to_string()),
    }
}
