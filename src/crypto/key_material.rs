// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Private key recovery for notification decryption.
//!
//! The key lives in a PKCS#12 container whose password is not reliably known
//! ahead of time, so the resolver walks an ordered list of candidates. The
//! first successful unlock is persisted as PEM next to the container; later
//! process starts take that fast path instead.
//!
//! The resolved outcome (success or failure) is cached for the lifetime of the
//! resolver. A failed resolution is not retried: every decryption attempt
//! fails fast with [`PipelineError::KeyUnavailable`] until the process is
//! restarted with a corrected configuration.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use p12::PFX;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::RsaPrivateKey;
use serde::Serialize;
use sha1::{Digest, Sha1};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::config::CertificateConfig;
use crate::error::PipelineError;

const PRIVATE_KEY_TAG: &str = "PRIVATE KEY";
const RSA_PRIVATE_KEY_TAG: &str = "RSA PRIVATE KEY";
const CERTIFICATE_TAG: &str = "CERTIFICATE";

// =============================================================================
// Password candidates
// =============================================================================

/// Ordered, de-duplicated container passwords.
///
/// The configured password (when any) comes first, followed by the fallback
/// list in its configured order.
#[derive(Clone, Default)]
pub struct PasswordCandidates {
    candidates: Vec<String>,
    has_configured: bool,
}

impl PasswordCandidates {
    pub fn new(configured: Option<String>, fallbacks: impl IntoIterator<Item = String>) -> Self {
        let has_configured = configured.is_some();
        let mut candidates: Vec<String> = Vec::new();
        for candidate in configured.into_iter().chain(fallbacks) {
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
        Self {
            candidates,
            has_configured,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.candidates.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Whether an explicitly configured password leads the list.
    pub fn has_configured(&self) -> bool {
        self.has_configured
    }
}

impl std::fmt::Debug for PasswordCandidates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordCandidates")
            .field("count", &self.candidates.len())
            .field("has_configured", &self.has_configured)
            .finish()
    }
}

// =============================================================================
// Key material
// =============================================================================

/// RSA private key plus, optionally, the certificate it belongs to.
#[derive(Clone)]
pub struct KeyMaterial {
    private_key: RsaPrivateKey,
    certificate_der: Option<Vec<u8>>,
}

impl KeyMaterial {
    pub fn new(private_key: RsaPrivateKey, certificate_der: Option<Vec<u8>>) -> Self {
        Self {
            private_key,
            certificate_der,
        }
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub fn certificate_der(&self) -> Option<&[u8]> {
        self.certificate_der.as_deref()
    }

    /// SHA-1 over the certificate DER, uppercase hex without separators.
    pub fn thumbprint(&self) -> Option<String> {
        self.certificate_der
            .as_ref()
            .map(|der| hex::encode_upper(Sha1::digest(der)))
    }

    /// Parse a derived-key file: a `PRIVATE KEY` or `RSA PRIVATE KEY` block,
    /// optionally followed by a `CERTIFICATE` block.
    pub fn from_pem(text: &str) -> Result<Self, String> {
        let blocks = pem::parse_many(text).map_err(|e| format!("invalid PEM: {e}"))?;

        let mut private_key = None;
        let mut certificate_der = None;
        for block in &blocks {
            match block.tag() {
                PRIVATE_KEY_TAG if private_key.is_none() => {
                    let key = RsaPrivateKey::from_pkcs8_der(block.contents())
                        .map_err(|e| format!("invalid PKCS#8 key: {e}"))?;
                    private_key = Some(key);
                }
                RSA_PRIVATE_KEY_TAG if private_key.is_none() => {
                    let key = RsaPrivateKey::from_pkcs1_der(block.contents())
                        .map_err(|e| format!("invalid PKCS#1 key: {e}"))?;
                    private_key = Some(key);
                }
                CERTIFICATE_TAG if certificate_der.is_none() => {
                    certificate_der = Some(block.contents().to_vec());
                }
                _ => {}
            }
        }

        let private_key = private_key.ok_or_else(|| "no private key block found".to_string())?;
        Ok(Self::new(private_key, certificate_der))
    }

    /// Serialize as a PKCS#8 `PRIVATE KEY` block followed by the certificate.
    pub fn to_pem(&self) -> Result<String, String> {
        let key_der = self
            .private_key
            .to_pkcs8_der()
            .map_err(|e| format!("failed to encode private key: {e}"))?;

        let mut blocks = vec![pem::Pem::new(PRIVATE_KEY_TAG, key_der.as_bytes().to_vec())];
        if let Some(cert) = &self.certificate_der {
            blocks.push(pem::Pem::new(CERTIFICATE_TAG, cert.clone()));
        }
        Ok(pem::encode_many(&blocks))
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("private_key", &"<redacted>")
            .field("thumbprint", &self.thumbprint())
            .finish()
    }
}

// =============================================================================
// Container unlock
// =============================================================================

/// Result of a successful container unlock.
#[derive(Debug)]
pub struct ContainerUnlock {
    pub material: KeyMaterial,
    /// Number of candidates tried, including the successful one.
    pub attempts: usize,
}

/// Try each password candidate against a PKCS#12 container, in order, and stop
/// at the first one that both verifies the MAC and yields an RSA key bag.
pub fn unlock_container(
    container_der: &[u8],
    candidates: &PasswordCandidates,
) -> Result<ContainerUnlock, String> {
    let pfx = PFX::parse(container_der)
        .map_err(|e| format!("certificate container is not valid PKCS#12: {e:?}"))?;

    for (index, password) in candidates.iter().enumerate() {
        let attempt = index + 1;

        if !pfx.verify_mac(password) {
            debug!(attempt, outcome = "rejected", "Container password candidate");
            continue;
        }

        match extract_material(&pfx, password) {
            Ok(material) => {
                debug!(attempt, outcome = "accepted", "Container password candidate");
                return Ok(ContainerUnlock {
                    material,
                    attempts: attempt,
                });
            }
            Err(reason) => {
                debug!(
                    attempt,
                    outcome = "unusable",
                    reason = %reason,
                    "Container password candidate"
                );
            }
        }
    }

    Err(format!(
        "none of the {} password candidates unlocked the certificate container",
        candidates.len()
    ))
}

fn extract_material(pfx: &PFX, password: &str) -> Result<KeyMaterial, String> {
    let key_bags = pfx
        .key_bags(password)
        .map_err(|e| format!("key bags unreadable: {e:?}"))?;

    let private_key = key_bags
        .iter()
        .find_map(|der| RsaPrivateKey::from_pkcs8_der(der).ok())
        .ok_or_else(|| "container holds no RSA private key".to_string())?;

    // A missing certificate only disables the mismatch diagnostic.
    let certificate_der = pfx
        .cert_x509_bags(password)
        .ok()
        .and_then(|certs| certs.into_iter().next());

    Ok(KeyMaterial::new(private_key, certificate_der))
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolution state, reported without triggering resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum KeyMaterialState {
    NotResolved,
    Available,
    Unavailable,
}

type CachedOutcome = Result<Arc<KeyMaterial>, String>;

/// Lazily resolves and caches the notification decryption key.
pub struct KeyMaterialResolver {
    container_path: PathBuf,
    derived_key_path: PathBuf,
    persist_derived: bool,
    candidates: PasswordCandidates,
    cache: RwLock<Option<CachedOutcome>>,
}

impl KeyMaterialResolver {
    pub fn new(
        container_path: impl Into<PathBuf>,
        derived_key_path: impl Into<PathBuf>,
        candidates: PasswordCandidates,
    ) -> Self {
        Self {
            container_path: container_path.into(),
            derived_key_path: derived_key_path.into(),
            persist_derived: true,
            candidates,
            cache: RwLock::new(None),
        }
    }

    pub fn from_config(config: &CertificateConfig) -> Self {
        Self::new(
            config.container_path.clone(),
            config.derived_key_path.clone(),
            config.passwords.clone(),
        )
        .with_persistence(config.persist_derived)
    }

    /// Resolver whose cache is already populated with `material`.
    pub fn with_material(material: KeyMaterial) -> Self {
        let resolver = Self::new(PathBuf::new(), PathBuf::new(), PasswordCandidates::default());
        *resolver.cache.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Ok(Arc::new(material)));
        resolver
    }

    pub fn with_persistence(mut self, persist_derived: bool) -> Self {
        self.persist_derived = persist_derived;
        self
    }

    pub fn state(&self) -> KeyMaterialState {
        match &*self.cache.read().unwrap_or_else(PoisonError::into_inner) {
            None => KeyMaterialState::NotResolved,
            Some(Ok(_)) => KeyMaterialState::Available,
            Some(Err(_)) => KeyMaterialState::Unavailable,
        }
    }

    /// Return the cached key material, resolving it on first use.
    pub fn resolve(&self) -> Result<Arc<KeyMaterial>, PipelineError> {
        if let Some(cached) = &*self.cache.read().unwrap_or_else(PoisonError::into_inner) {
            return cached.clone().map_err(PipelineError::KeyUnavailable);
        }

        let outcome = self.derive().map(Arc::new);
        if let Err(reason) = &outcome {
            warn!(
                reason = %reason,
                "Key material unavailable, notification decryption disabled"
            );
        }

        // Racing resolutions are equivalent; the first stored outcome wins.
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache
            .get_or_insert(outcome)
            .clone()
            .map_err(PipelineError::KeyUnavailable)
    }

    fn derive(&self) -> Result<KeyMaterial, String> {
        if let Some(material) = self.load_derived() {
            return Ok(material);
        }

        if !self.container_path.exists() {
            return Err(format!(
                "certificate container not found at {}",
                self.container_path.display()
            ));
        }

        let container = fs::read(&self.container_path)
            .map_err(|e| format!("failed to read certificate container: {e}"))?;

        let unlock = unlock_container(&container, &self.candidates)?;
        info!(
            attempts = unlock.attempts,
            thumbprint = ?unlock.material.thumbprint(),
            "Recovered private key from certificate container"
        );

        if self.persist_derived {
            self.persist(&unlock.material);
        }

        Ok(unlock.material)
    }

    fn load_derived(&self) -> Option<KeyMaterial> {
        if !self.derived_key_path.is_file() {
            return None;
        }

        let loaded = fs::read_to_string(&self.derived_key_path)
            .map_err(|e| e.to_string())
            .and_then(|text| KeyMaterial::from_pem(&text));

        match loaded {
            Ok(material) => {
                info!(
                    path = %self.derived_key_path.display(),
                    "Loaded derived private key"
                );
                Some(material)
            }
            Err(reason) => {
                warn!(
                    path = %self.derived_key_path.display(),
                    reason = %reason,
                    "Ignoring unreadable derived key file, re-deriving from container"
                );
                None
            }
        }
    }

    fn persist(&self, material: &KeyMaterial) {
        let written = material
            .to_pem()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            .and_then(|pem| write_private_file(&self.derived_key_path, pem.as_bytes()));

        match written {
            Ok(()) => info!(
                path = %self.derived_key_path.display(),
                "Cached derived private key"
            ),
            Err(e) => warn!(
                path = %self.derived_key_path.display(),
                error = %e,
                "Failed to cache derived private key"
            ),
        }
    }
}

impl std::fmt::Debug for KeyMaterialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterialResolver")
            .field("container_path", &self.container_path)
            .field("derived_key_path", &self.derived_key_path)
            .field("persist_derived", &self.persist_derived)
            .field("candidates", &self.candidates)
            .field("state", &self.state())
            .finish()
    }
}

fn write_private_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
