// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for unit tests: RSA keys, sealed envelopes, PKCS#12
//! containers and in-process collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use aes::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use rsa::pkcs8::EncodePrivateKey;
use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;

use crate::crypto::KeyMaterial;
use crate::models::{EncryptedContent, MeetingInsights};
use crate::providers::{
    CreatedIssue, GitHubError, GraphError, IssueTracker, MeetingContentSource,
};

const TEST_KEY_BITS: usize = 2048;

fn generated_key(slot: &'static OnceLock<RsaPrivateKey>) -> RsaPrivateKey {
    slot.get_or_init(|| {
        RsaPrivateKey::new(&mut rand::thread_rng(), TEST_KEY_BITS).expect("generate test key")
    })
    .clone()
}

/// Key material the notifications in tests are sealed for.
pub fn primary_material() -> KeyMaterial {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KeyMaterial::new(
        generated_key(&KEY),
        Some(b"test certificate: primary".to_vec()),
    )
}

/// Unrelated key material with its own certificate.
pub fn secondary_material() -> KeyMaterial {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KeyMaterial::new(
        generated_key(&KEY),
        Some(b"test certificate: secondary".to_vec()),
    )
}

#[derive(Debug, Clone, Copy)]
pub enum WrapPadding {
    Oaep,
    Pkcs1v15,
}

/// Encrypt `plaintext` the way the notification sender does.
pub fn seal(material: &KeyMaterial, plaintext: &[u8], padding: WrapPadding) -> EncryptedContent {
    let mut rng = rand::thread_rng();

    let mut symmetric_key = [0u8; 32];
    let mut iv = [0u8; 16];
    rng.fill_bytes(&mut symmetric_key);
    rng.fill_bytes(&mut iv);

    let ciphertext = cbc::Encryptor::<aes::Aes256>::new_from_slices(&symmetric_key, &iv)
        .expect("key and iv lengths")
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    let mut data = iv.to_vec();
    data.extend_from_slice(&ciphertext);

    let public_key = RsaPublicKey::from(material.private_key());
    let wrapped = match padding {
        WrapPadding::Oaep => public_key.encrypt(&mut rng, Oaep::new::<Sha1>(), &symmetric_key),
        WrapPadding::Pkcs1v15 => public_key.encrypt(&mut rng, Pkcs1v15Encrypt, &symmetric_key),
    }
    .expect("wrap symmetric key");

    EncryptedContent {
        data: STANDARD.encode(data),
        data_signature: STANDARD.encode(b"unverified signature"),
        data_key: STANDARD.encode(wrapped),
        encryption_certificate_id: "test-certificate".to_string(),
        encryption_certificate_thumbprint: material.thumbprint().unwrap_or_default(),
    }
}

/// DER-encoded PKCS#12 container protected by `password`.
pub fn pkcs12_container(material: &KeyMaterial, password: &str) -> Vec<u8> {
    let key_der = material
        .private_key()
        .to_pkcs8_der()
        .expect("encode test key");
    let cert_der = material.certificate_der().expect("test certificate");
    p12::PFX::new(cert_der, key_der.as_bytes(), None, password, "graphwebhook")
        .expect("build container")
        .to_der()
}

/// In-process meeting content source. Every call counts towards `calls`.
#[derive(Default)]
pub struct FakeContent {
    pub insights: Option<MeetingInsights>,
    /// `None` answers transcript requests with a 404.
    pub transcript: Option<String>,
    pub meeting_id: Option<String>,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl FakeContent {
    async fn called(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl MeetingContentSource for FakeContent {
    async fn meeting_insights(
        &self,
        _user_id: &str,
        _meeting_id: &str,
    ) -> Result<Option<MeetingInsights>, GraphError> {
        self.called().await;
        Ok(self.insights.clone())
    }

    async fn transcript_content(&self, _content_url: &str) -> Result<String, GraphError> {
        self.called().await;
        self.transcript
            .clone()
            .ok_or_else(|| GraphError::Request("GET transcript returned 404 Not Found".into()))
    }

    async fn meeting_id_for_join_url(&self, _join_url: &str) -> Result<Option<String>, GraphError> {
        self.called().await;
        Ok(self.meeting_id.clone())
    }
}

/// In-process issue tracker numbering issues from 1.
#[derive(Default)]
pub struct FakeTracker {
    pub fail: bool,
    /// Yield for this long before answering.
    pub delay: Option<Duration>,
    pub filed: AtomicUsize,
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn create_issue(&self, _title: &str, _body: &str) -> Result<CreatedIssue, GitHubError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(GitHubError::Request(
                "POST /repos/o/r/issues returned 410 Gone".into(),
            ));
        }
        let number = self.filed.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        Ok(CreatedIssue {
            url: format!("https://github.com/o/r/issues/{number}"),
            number,
        })
    }
}
