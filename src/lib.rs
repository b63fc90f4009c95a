// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Meeting Notes Relay - Transcript Notification Service
//!
//! Receives encrypted change notifications for meeting transcripts, recovers
//! the notification payload and publishes a summary that is enriched in the
//! background with AI insights or the transcript text, optionally filed as an
//! issue.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `crypto` - Key material resolution and hybrid decryption
//! - `reconstruct` - Tolerant recovery of the decrypted notification record
//! - `enrichment` - Notification pipeline and background enrichment
//! - `providers` - Meeting content service and issue tracker clients
//! - `store` - Latest summary and bounded history

pub mod api;
pub mod composer;
pub mod config;
pub mod crypto;
pub mod enrichment;
pub mod error;
pub mod models;
pub mod providers;
pub mod reconstruct;
pub mod state;
pub mod store;
pub mod transcript;

#[cfg(test)]
pub(crate) mod test_support;
