use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};

/// The single encoded image every render request is based on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    mime_type: String,
    data: String,
}

impl ReferenceImage {
    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> Result<Self> {
        if bytes.is_empty() {
            bail!("reference image is empty");
        }
        Ok(Self {
            mime_type: mime_type.to_string(),
            data: BASE64.encode(bytes),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        Self::from_bytes(&bytes, mime_for_path(path).unwrap_or("image/png"))
            .with_context(|| format!("invalid reference image {}", path.display()))
    }

    pub fn from_data_uri(raw: &str) -> Result<Self> {
        let (mime_type, payload) = split_data_uri(raw)?;
        if payload.is_empty() {
            bail!("reference image is empty");
        }
        BASE64
            .decode(payload.as_bytes())
            .context("reference image base64 decode failed")?;
        Ok(Self {
            mime_type: mime_type.to_string(),
            data: payload.to_string(),
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 payload without the `data:` prefix.
    pub fn base64_data(&self) -> &str {
        &self.data
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Short content hash, logged instead of the image itself.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.data.as_bytes());
        hex::encode(&digest[..6])
    }
}

/// Splits `data:<mime>;base64,<payload>` into mime type and payload.
pub fn split_data_uri(raw: &str) -> Result<(&str, &str)> {
    let Some(rest) = raw.trim().strip_prefix("data:") else {
        bail!("expected a data URI");
    };
    let Some((header, payload)) = rest.split_once(',') else {
        bail!("data URI has no payload separator");
    };
    let Some(mime_type) = header.strip_suffix(";base64") else {
        bail!("data URI is not base64 encoded");
    };
    let mime_type = if mime_type.is_empty() {
        "application/octet-stream"
    } else {
        mime_type
    };
    Ok((mime_type, payload))
}

/// Decodes a data URI into its mime type and raw bytes.
pub fn decode_data_uri(raw: &str) -> Result<(String, Vec<u8>)> {
    let (mime_type, payload) = split_data_uri(raw)?;
    let bytes = BASE64
        .decode(payload.as_bytes())
        .context("image base64 decode failed")?;
    Ok((mime_type.to_string(), bytes))
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
