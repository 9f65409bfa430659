use crate::asset::Asset;
use crate::transform::{TransformError, Transformer};

/// Applies literal substring replacements to the payload, in order.
pub struct ReplaceTransformer {
    pub replacements: Vec<(String, String)>,
}

impl Transformer for ReplaceTransformer {
    fn transform(&self, asset: &mut Asset) -> Result<(), TransformError> {
        for (from, to) in &self.replacements {
            asset.data = replace_all(&asset.data, from.as_bytes(), to.as_bytes());
        }
        Ok(())
    }
}

fn replace_all(haystack: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    if from.is_empty() {
        return haystack.to_vec();
    }

    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(at) = find(rest, from) {
        out.extend_from_slice(&rest[..at]);
        out.extend_from_slice(to);
        rest = &rest[at + from.len()..];
    }
    out.extend_from_slice(rest);
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_every_occurrence() {
        let mut asset = Asset::new("/test.html", "Hello World, World");
        ReplaceTransformer {
            replacements: vec![("World".to_string(), "Rust".to_string())],
        }
        .transform(&mut asset)
        .unwrap();

        assert_eq!(asset.data, b"Hello Rust, Rust");
    }

    #[test]
    fn applies_replacements_in_order() {
        let mut asset = Asset::new("/test.txt", "a");
        ReplaceTransformer {
            replacements: vec![
                ("a".to_string(), "b".to_string()),
                ("b".to_string(), "c".to_string()),
            ],
        }
        .transform(&mut asset)
        .unwrap();

        assert_eq!(asset.data, b"c");
    }

    #[test]
    fn missing_needles_change_nothing() {
        let mut asset = Asset::new("/test.txt", "unchanged");
        ReplaceTransformer {
            replacements: vec![("absent".to_string(), "x".to_string())],
        }
        .transform(&mut asset)
        .unwrap();

        assert_eq!(asset.data, b"unchanged");
    }
}
