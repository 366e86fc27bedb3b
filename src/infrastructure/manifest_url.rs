//! Manifest URL construction
//!
//! The baseline path is unsigned. Hosts that require it get a signed path
//! segment: hex HMAC-SHA256 of `np_{ID}` under a per-service key.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::config::{ConfigError, ManifestConfig};
use crate::domain::identifier::TitleId;

type HmacSha256 = Hmac<Sha256>;

/// Builds the manifest URL for a title
#[derive(Clone)]
pub struct ManifestUrlBuilder {
    host: String,
    path_prefix: String,
    signing_key: Option<Vec<u8>>,
}

impl std::fmt::Debug for ManifestUrlBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestUrlBuilder")
            .field("host", &self.host)
            .field("path_prefix", &self.path_prefix)
            .field("signed", &self.signing_key.is_some())
            .finish()
    }
}

impl ManifestUrlBuilder {
    /// `{host}/{prefix}/np/{ID}/{ID}-ver.xml`
    pub fn unsigned(host: impl Into<String>, path_prefix: impl Into<String>) -> Self {
        Self {
            host: trim_host(host.into()),
            path_prefix: path_prefix.into().trim_matches('/').to_string(),
            signing_key: None,
        }
    }

    /// `{host}/{prefix}/np/{ID}/{hmac}/{ID}-ver.xml`
    pub fn signed(host: impl Into<String>, path_prefix: impl Into<String>, key: Vec<u8>) -> Self {
        Self {
            signing_key: Some(key),
            ..Self::unsigned(host, path_prefix)
        }
    }

    pub fn from_config(config: &ManifestConfig) -> Result<Self, ConfigError> {
        match config.signing_key_hex.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => {
                let key = hex::decode(key).map_err(|e| ConfigError::Validation {
                    message: format!("manifest.signing_key_hex is not valid hex: {e}"),
                })?;
                Ok(Self::signed(&config.host, &config.path_prefix, key))
            }
            _ => Ok(Self::unsigned(&config.host, &config.path_prefix)),
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signing_key.is_some()
    }

    pub fn build(&self, id: &TitleId) -> String {
        let id = id.as_str();
        match &self.signing_key {
            Some(key) => format!(
                "{}/{}/np/{id}/{}/{id}-ver.xml",
                self.host,
                self.path_prefix,
                sign(key, id)
            ),
            None => format!("{}/{}/np/{id}/{id}-ver.xml", self.host, self.path_prefix),
        }
    }
}

fn sign(key: &[u8], id: &str) -> String {
    // HMAC은 모든 키 길이를 허용하므로 실패하지 않음
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return String::new();
    };
    mac.update(format!("np_{id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn trim_host(host: String) -> String {
    host.trim().trim_end_matches('/').to_string()
}
