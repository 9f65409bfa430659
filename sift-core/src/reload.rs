use crate::asset::{extension, Asset};
use crate::transform::{TransformError, Transformer};

/// Injects a reconnect script into HTML assets, right before the last
/// closing body tag. The script reloads the page shortly after its
/// WebSocket connection closes, which is the dev server's rebuild
/// signal. Assets without a `</body>` tag pass through unchanged.
pub struct AutoReloadTransformer {
    pub ws_path: String,
    pub timeout_ms: u64,
}

impl Default for AutoReloadTransformer {
    fn default() -> Self {
        Self {
            ws_path: "/__livereload".to_string(),
            timeout_ms: 1000,
        }
    }
}

impl Transformer for AutoReloadTransformer {
    fn transform(&self, asset: &mut Asset) -> Result<(), TransformError> {
        if extension(&asset.path) != ".html" {
            return Ok(());
        }

        let Some(at) = rfind(&asset.data, b"</body>") else {
            return Ok(());
        };

        let script = format!(
            r#"<script>new WebSocket("ws://"+location.host+"{}").onclose=()=>setTimeout(()=>location.reload(!0),{})</script>"#,
            self.ws_path, self.timeout_ms
        );

        let mut data = Vec::with_capacity(asset.data.len() + script.len());
        data.extend_from_slice(&asset.data[..at]);
        data.extend_from_slice(script.as_bytes());
        data.extend_from_slice(&asset.data[at..]);
        asset.data = data;

        Ok(())
    }
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}
