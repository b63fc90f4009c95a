// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Hybrid RSA + AES-CBC decryption of notification envelopes.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use base64ct::{Base64, Encoding};
use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::crypto::KeyMaterial;
use crate::error::PipelineError;
use crate::models::EncryptedContent;

/// The IV is carried in front of the ciphertext.
pub const IV_LEN: usize = 16;

const AES_BLOCK_LEN: usize = 16;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Decoded form of [`EncryptedContent`].
#[derive(Clone)]
pub struct EncryptedEnvelope {
    pub cipher_data: Vec<u8>,
    pub cipher_symmetric_key: Vec<u8>,
    /// Carried but not verified.
    pub signature: Vec<u8>,
    pub certificate_id: String,
    pub certificate_thumbprint: String,
}

impl EncryptedEnvelope {
    pub fn from_wire(content: &EncryptedContent) -> Result<Self, PipelineError> {
        Ok(Self {
            cipher_data: decode_field("data", &content.data)?,
            cipher_symmetric_key: decode_field("dataKey", &content.data_key)?,
            signature: decode_field("dataSignature", &content.data_signature)?,
            certificate_id: content.encryption_certificate_id.clone(),
            certificate_thumbprint: content.encryption_certificate_thumbprint.clone(),
        })
    }

    /// Short SHA-256 digest of the cipher data, for log correlation.
    pub fn digest(&self) -> String {
        hex::encode(&Sha256::digest(&self.cipher_data)[..8])
    }
}

impl std::fmt::Debug for EncryptedEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedEnvelope")
            .field("cipher_data_len", &self.cipher_data.len())
            .field("cipher_symmetric_key_len", &self.cipher_symmetric_key.len())
            .field("signature_len", &self.signature.len())
            .field("certificate_id", &self.certificate_id)
            .field("certificate_thumbprint", &self.certificate_thumbprint)
            .finish()
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, PipelineError> {
    let compact: String = value.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Base64::decode_vec(&compact)
        .map_err(|e| PipelineError::DecryptionFailed(format!("{name} is not valid base64: {e}")))
}

/// Recover the plaintext of an envelope.
///
/// On failure the local certificate thumbprint is compared against the one the
/// sender used; a difference is reported as
/// [`PipelineError::CertificateMismatch`].
pub fn decrypt(envelope: &EncryptedEnvelope, key: &KeyMaterial) -> Result<Vec<u8>, PipelineError> {
    unwrap_symmetric_key(key.private_key(), &envelope.cipher_symmetric_key)
        .and_then(|symmetric_key| decrypt_content(&symmetric_key, &envelope.cipher_data))
        .map_err(|reason| diagnose(envelope, key, reason))
}

fn unwrap_symmetric_key(private_key: &RsaPrivateKey, wrapped: &[u8]) -> Result<Vec<u8>, String> {
    match private_key.decrypt(Oaep::new::<Sha1>(), wrapped) {
        Ok(symmetric_key) => Ok(symmetric_key),
        Err(oaep_error) => {
            debug!(error = %oaep_error, "OAEP key unwrap failed, retrying with PKCS#1 v1.5");
            private_key
                .decrypt(Pkcs1v15Encrypt, wrapped)
                .map_err(|e| format!("symmetric key unwrap failed: {e}"))
        }
    }
}

fn decrypt_content(symmetric_key: &[u8], data: &[u8]) -> Result<Vec<u8>, String> {
    if data.len() <= IV_LEN {
        return Err(format!("cipher data too short ({} bytes)", data.len()));
    }
    let (iv, ciphertext) = data.split_at(IV_LEN);
    if ciphertext.len() % AES_BLOCK_LEN != 0 {
        return Err(format!(
            "ciphertext length {} is not a multiple of the block size",
            ciphertext.len()
        ));
    }

    let invalid_length = |e: aes::cipher::InvalidLength| format!("invalid key or IV length: {e}");
    let plaintext = match symmetric_key.len() {
        16 => Aes128CbcDec::new_from_slices(symmetric_key, iv)
            .map_err(invalid_length)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        24 => Aes192CbcDec::new_from_slices(symmetric_key, iv)
            .map_err(invalid_length)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        32 => Aes256CbcDec::new_from_slices(symmetric_key, iv)
            .map_err(invalid_length)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        other => return Err(format!("unsupported symmetric key length {other}")),
    };

    plaintext.map_err(|_| "content decryption failed: invalid padding".to_string())
}

fn diagnose(envelope: &EncryptedEnvelope, key: &KeyMaterial, reason: String) -> PipelineError {
    let expected = normalize_thumbprint(&envelope.certificate_thumbprint);
    if let Some(actual) = key.thumbprint() {
        if !expected.is_empty() && expected != actual {
            warn!(
                certificate_id = %envelope.certificate_id,
                expected = %expected,
                actual = %actual,
                "Notification was encrypted for a different certificate"
            );
            return PipelineError::CertificateMismatch { expected, actual };
        }
    }
    PipelineError::DecryptionFailed(reason)
}

/// Uppercase hex digits only, so `aa:bb` and `AABB` compare equal.
pub fn normalize_thumbprint(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{primary_material, seal, secondary_material, WrapPadding};

    fn envelope_for(plaintext: &[u8], padding: WrapPadding) -> EncryptedEnvelope {
        let content = seal(&primary_material(), plaintext, padding);
        EncryptedEnvelope::from_wire(&content).unwrap()
    }

    #[test]
    fn oaep_wrapped_envelope_round_trips() {
        let envelope = envelope_for(b"{\"id\":\"abc\"}", WrapPadding::Oaep);
        let plaintext = decrypt(&envelope, &primary_material()).unwrap();
        assert_eq!(plaintext, b"{\"id\":\"abc\"}");
    }

    #[test]
    fn pkcs1_wrapped_envelope_round_trips() {
        let envelope = envelope_for(b"legacy sender", WrapPadding::Pkcs1v15);
        let plaintext = decrypt(&envelope, &primary_material()).unwrap();
        assert_eq!(plaintext, b"legacy sender");
    }

    #[test]
    fn truncated_ciphertext_is_decryption_failure() {
        let mut envelope = envelope_for(b"some payload that spans blocks", WrapPadding::Oaep);
        envelope.cipher_data.pop();
        match decrypt(&envelope, &primary_material()) {
            Err(PipelineError::DecryptionFailed(reason)) => {
                assert!(reason.contains("block size"))
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn data_without_ciphertext_is_rejected() {
        let mut envelope = envelope_for(b"x", WrapPadding::Oaep);
        envelope.cipher_data.truncate(IV_LEN);
        assert!(matches!(
            decrypt(&envelope, &primary_material()),
            Err(PipelineError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn foreign_certificate_is_reported_as_mismatch() {
        let envelope = envelope_for(b"payload", WrapPadding::Oaep);
        let err = decrypt(&envelope, &secondary_material()).unwrap_err();
        match err {
            PipelineError::CertificateMismatch { expected, actual } => {
                assert_eq!(Some(expected), primary_material().thumbprint());
                assert_eq!(Some(actual), secondary_material().thumbprint());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn matching_thumbprint_keeps_plain_decryption_failure() {
        let mut envelope = envelope_for(b"payload", WrapPadding::Oaep);
        // Same certificate, but a key the private key cannot unwrap.
        envelope.cipher_symmetric_key = vec![0u8; envelope.cipher_symmetric_key.len()];
        let err = decrypt(&envelope, &primary_material()).unwrap_err();
        assert!(matches!(err, PipelineError::DecryptionFailed(_)));
        assert!(err.is_decryption_failure());
    }

    #[test]
    fn invalid_base64_is_decryption_failure() {
        let mut content = seal(&primary_material(), b"payload", WrapPadding::Oaep);
        content.data_key = "%%% not base64 %%%".into();
        let err = EncryptedEnvelope::from_wire(&content).unwrap_err();
        match err {
            PipelineError::DecryptionFailed(reason) => assert!(reason.contains("dataKey")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn line_wrapped_base64_is_accepted() {
        let mut content = seal(&primary_material(), b"wrapped", WrapPadding::Oaep);
        let (head, tail) = content.data.split_at(8);
        content.data = format!("{head}\r\n{tail}");
        let envelope = EncryptedEnvelope::from_wire(&content).unwrap();
        assert_eq!(decrypt(&envelope, &primary_material()).unwrap(), b"wrapped");
    }

    #[test]
    fn thumbprint_normalization_ignores_case_and_separators() {
        assert_eq!(normalize_thumbprint("aa:bb-cc dd"), "AABBCCDD");
        assert_eq!(normalize_thumbprint(""), "");
    }

    #[test]
    fn envelope_debug_and_digest_hide_content() {
        let envelope = envelope_for(b"secret transcript", WrapPadding::Oaep);
        let rendered = format!("{envelope:?}");
        assert!(rendered.contains("cipher_data_len"));
        assert_eq!(envelope.digest().len(), 16);
    }
}
