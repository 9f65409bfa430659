use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use crate::asset::Asset;
use crate::replace::ReplaceTransformer;
use crate::transform::{TransformError, Transformer};

/// Client-side decryption script, with placeholders substituted per page.
const DECRYPT_SCRIPT: &str = include_str!("decrypt.js");

pub const DEFAULT_ITERATIONS: u32 = 600_000;
const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Where the browser caches the derived key between visits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageMode {
    #[default]
    None,
    Local,
    Session,
}

impl StorageMode {
    fn as_js(&self) -> &'static str {
        match self {
            StorageMode::None => "noStorage",
            StorageMode::Local => "window.localStorage",
            StorageMode::Session => "window.sessionStorage",
        }
    }
}

/// Replaces each asset's payload with a password page: the payload is
/// encrypted with AES-256-GCM under a PBKDF2-derived key and embedded,
/// together with a Web Crypto decryption script, into the caller's HTML
/// template.
///
/// The template must contain elements with the configured password
/// input, form, and content ids; this is checked before any
/// cryptography runs. The password is only used for key derivation and
/// never written to the output.
pub struct EncryptionTransformer {
    pub template: Asset,
    pub password: String,
    /// PBKDF2 iteration count. Higher is slower to brute-force and
    /// slower to unlock in the browser.
    pub iterations: u32,
    /// Fixed salt reused for every asset. When `None` (the default) a
    /// fresh salt is drawn per asset; fixing one trades security for
    /// reproducible output and a shareable cached key.
    pub salt: Option<Vec<u8>>,
    pub password_input_id: String,
    pub form_id: String,
    pub content_id: String,
    pub storage_mode: StorageMode,
}

impl EncryptionTransformer {
    pub fn new(template: Asset, password: impl Into<String>) -> Self {
        Self {
            template,
            password: password.into(),
            iterations: DEFAULT_ITERATIONS,
            salt: None,
            password_input_id: "password".to_string(),
            form_id: "password-form".to_string(),
            content_id: "encrypted-content".to_string(),
            storage_mode: StorageMode::None,
        }
    }
}

impl Transformer for EncryptionTransformer {
    fn transform(&self, asset: &mut Asset) -> Result<(), TransformError> {
        if self.password.is_empty() {
            return Err(TransformError::MissingPassword);
        }

        let template = std::str::from_utf8(&self.template.data).map_err(|_| {
            TransformError::Utf8 {
                path: self.template.path.clone(),
            }
        })?;

        for id in [&self.password_input_id, &self.form_id, &self.content_id] {
            if !template.contains(&format!("id=\"{}\"", id)) {
                return Err(TransformError::MissingTemplateElement { id: id.clone() });
            }
        }

        let (ciphertext, salt) = encrypt(
            &asset.data,
            &self.password,
            self.iterations,
            self.salt.as_deref(),
        )
        .map_err(|reason| TransformError::Encrypt {
            path: asset.path.clone(),
            reason,
        })?;

        let script = render_script(
            &BASE64.encode(&ciphertext),
            &BASE64.encode(&salt),
            self.iterations,
            &self.password_input_id,
            &self.form_id,
            &self.content_id,
            self.storage_mode,
        )?;
        let script_tag = format!("\n<script>\n{}\n</script>\n", script);

        // Inject right before the document closes; fall back to
        // appending when the template carries neither closing tag.
        let page = if let Some(at) = template.rfind("</body>") {
            format!("{}{}{}", &template[..at], script_tag, &template[at..])
        } else if let Some(at) = template.rfind("</html>") {
            format!("{}{}{}", &template[..at], script_tag, &template[at..])
        } else {
            format!("{}{}", template, script_tag)
        };

        asset.data = page.into_bytes();

        Ok(())
    }
}

/// A fresh 32-byte salt, for callers that want to fix one across assets.
pub fn random_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// AES-256-GCM encryption with a PBKDF2-HMAC-SHA256 derived key. The
/// random nonce is prepended to the ciphertext, matching what the
/// decryption script expects. Returns (nonce || ciphertext, salt).
fn encrypt(
    data: &[u8],
    password: &str,
    iterations: u32,
    fixed_salt: Option<&[u8]>,
) -> Result<(Vec<u8>, Vec<u8>), String> {
    let salt = match fixed_salt {
        Some(salt) if !salt.is_empty() => salt.to_vec(),
        _ => random_salt(),
    };

    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut key);

    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| e.to_string())?;

    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), data)
        .map_err(|e| e.to_string())?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);

    Ok((sealed, salt))
}

fn render_script(
    encrypted: &str,
    salt: &str,
    iterations: u32,
    input_id: &str,
    form_id: &str,
    content_id: &str,
    storage_mode: StorageMode,
) -> Result<String, TransformError> {
    let mut script = Asset::new("/decrypt.js", DECRYPT_SCRIPT);

    ReplaceTransformer {
        replacements: vec![
            ("__ENCRYPTED__".to_string(), encrypted.to_string()),
            ("__SALT__".to_string(), salt.to_string()),
            ("__ITERATIONS__".to_string(), iterations.to_string()),
            ("__INPUT_ID__".to_string(), input_id.to_string()),
            ("__FORM_ID__".to_string(), form_id.to_string()),
            ("__CONTENT_ID__".to_string(), content_id.to_string()),
            ("__STORAGE__".to_string(), storage_mode.as_js().to_string()),
        ],
    }
    .transform(&mut script)?;

    String::from_utf8(script.data).map_err(|_| TransformError::Utf8 {
        path: "/decrypt.js".to_string(),
    })
}
