// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Notification key material and payload decryption.
//!
//! - [`KeyMaterialResolver`]: recovers the RSA private key from the PKCS#12
//!   container, trying password candidates in order, and caches the result
//!   (including failure) for the process lifetime.
//! - [`decrypt`]: unwraps the per-notification symmetric key and decrypts the
//!   envelope body.

pub mod hybrid;
pub mod key_material;

pub use hybrid::{decrypt, EncryptedEnvelope};
pub use key_material::{
    ContainerUnlock, KeyMaterial, KeyMaterialResolver, KeyMaterialState, PasswordCandidates,
};
