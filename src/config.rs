// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values, and the
//! [`AppConfig`] snapshot read once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `4000` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files enabling HTTPS | Plain HTTP when unset |
//! | `GRAPH_CERT_PATH` | PKCS#12 container holding the notification key | `graphwebhook.pfx` |
//! | `GRAPH_CERT_PEM_PATH` | Derived plaintext key cache | container path with `.pem` |
//! | `GRAPH_CERT_CACHE_DERIVED` | Persist the derived key after a container unlock | `true` |
//! | `GRAPH_CERT_PASSWORD` | First password candidate for the container | None |
//! | `GRAPH_CERT_PASSWORD_FALLBACKS` | Comma-separated ordered fallback candidates | a single empty password |
//! | `AZURE_TENANT_ID` | Tenant for token requests and default identity | Required for enrichment |
//! | `AZURE_CLIENT_ID` / `AZURE_CLIENT_SECRET` | Client credentials for Graph | Required for enrichment |
//! | `TEAMS_USER_OBJECT_ID` | Default organizer used for minimal records | None |
//! | `GRAPH_API_BASE_URL` | Graph endpoint | `https://graph.microsoft.com` |
//! | `AZURE_AUTHORITY_URL` | Identity provider endpoint | `https://login.microsoftonline.com` |
//! | `GITHUB_TOKEN` / `GITHUB_REPO` | Issue tracker credentials (`OWNER/REPO`) | Issue filing disabled |
//! | `GITHUB_API_BASE_URL` | Issue tracker endpoint | `https://api.github.com` |
//! | `ENRICHMENT_TIMEOUT_SECS` | Per-call timeout for enrichment requests | `30` |
//! | `SUMMARY_HISTORY_CAPACITY` | Summaries kept in history | `50` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::crypto::PasswordCandidates;
use crate::reconstruct::DefaultIdentity;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const GRAPH_CERT_PATH_ENV: &str = "GRAPH_CERT_PATH";
pub const GRAPH_CERT_PEM_PATH_ENV: &str = "GRAPH_CERT_PEM_PATH";
pub const GRAPH_CERT_CACHE_DERIVED_ENV: &str = "GRAPH_CERT_CACHE_DERIVED";
pub const GRAPH_CERT_PASSWORD_ENV: &str = "GRAPH_CERT_PASSWORD";
pub const GRAPH_CERT_PASSWORD_FALLBACKS_ENV: &str = "GRAPH_CERT_PASSWORD_FALLBACKS";

pub const AZURE_TENANT_ID_ENV: &str = "AZURE_TENANT_ID";
pub const AZURE_CLIENT_ID_ENV: &str = "AZURE_CLIENT_ID";
pub const AZURE_CLIENT_SECRET_ENV: &str = "AZURE_CLIENT_SECRET";
pub const TEAMS_USER_OBJECT_ID_ENV: &str = "TEAMS_USER_OBJECT_ID";
pub const GRAPH_API_BASE_URL_ENV: &str = "GRAPH_API_BASE_URL";
pub const AZURE_AUTHORITY_URL_ENV: &str = "AZURE_AUTHORITY_URL";

pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const GITHUB_REPO_ENV: &str = "GITHUB_REPO";
pub const GITHUB_API_BASE_URL_ENV: &str = "GITHUB_API_BASE_URL";

pub const ENRICHMENT_TIMEOUT_SECS_ENV: &str = "ENRICHMENT_TIMEOUT_SECS";
pub const SUMMARY_HISTORY_CAPACITY_ENV: &str = "SUMMARY_HISTORY_CAPACITY";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 4000;
const DEFAULT_CERT_PATH: &str = "graphwebhook.pfx";
const DEFAULT_GRAPH_API_BASE_URL: &str = "https://graph.microsoft.com";
const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";
const DEFAULT_GITHUB_API_BASE_URL: &str = "https://api.github.com";
const DEFAULT_ENRICHMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of summaries retained in history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Where the notification decryption key comes from.
#[derive(Debug, Clone)]
pub struct CertificateConfig {
    pub container_path: PathBuf,
    pub derived_key_path: PathBuf,
    pub persist_derived: bool,
    pub passwords: PasswordCandidates,
}

/// Identity-provider and Graph endpoint settings.
#[derive(Clone, Default)]
pub struct GraphConfig {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub api_base_url: String,
    pub authority_url: String,
}

impl GraphConfig {
    pub fn is_configured(&self) -> bool {
        self.tenant_id.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }
}

impl std::fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("authority_url", &self.authority_url)
            .finish()
    }
}

/// Issue tracker settings.
#[derive(Clone, Default)]
pub struct GitHubConfig {
    pub token: Option<String>,
    /// Repository in `OWNER/REPO` form.
    pub repo: Option<String>,
    pub api_base_url: String,
}

impl GitHubConfig {
    pub fn is_configured(&self) -> bool {
        self.token.is_some() && self.repo.is_some()
    }
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("repo", &self.repo)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// Configuration snapshot taken at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsPaths>,
    pub certificate: CertificateConfig,
    pub identity: DefaultIdentity,
    pub graph: GraphConfig,
    pub github: GitHubConfig,
    pub enrichment_timeout: Duration,
    pub history_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| non_empty(lookup(name));

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            _ => None,
        };

        let container_path =
            PathBuf::from(get(GRAPH_CERT_PATH_ENV).unwrap_or_else(|| DEFAULT_CERT_PATH.to_string()));
        let derived_key_path = get(GRAPH_CERT_PEM_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| derived_key_path_for(&container_path));

        // Passwords are taken verbatim: whitespace can be significant.
        let configured_password = lookup(GRAPH_CERT_PASSWORD_ENV).filter(|p| !p.is_empty());
        let fallbacks = match lookup(GRAPH_CERT_PASSWORD_FALLBACKS_ENV) {
            Some(raw) if !raw.is_empty() => raw.split(',').map(str::to_string).collect(),
            _ => vec![String::new()],
        };

        let tenant_id = get(AZURE_TENANT_ID_ENV);

        Self {
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: get(PORT_ENV)
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            tls,
            certificate: CertificateConfig {
                container_path,
                derived_key_path,
                persist_derived: get(GRAPH_CERT_CACHE_DERIVED_ENV)
                    .map(|v| parse_bool(&v))
                    .unwrap_or(true),
                passwords: PasswordCandidates::new(configured_password, fallbacks),
            },
            identity: DefaultIdentity {
                tenant_id: tenant_id.clone(),
                user_object_id: get(TEAMS_USER_OBJECT_ID_ENV),
            },
            graph: GraphConfig {
                tenant_id,
                client_id: get(AZURE_CLIENT_ID_ENV),
                client_secret: get(AZURE_CLIENT_SECRET_ENV),
                api_base_url: get(GRAPH_API_BASE_URL_ENV)
                    .unwrap_or_else(|| DEFAULT_GRAPH_API_BASE_URL.to_string()),
                authority_url: get(AZURE_AUTHORITY_URL_ENV)
                    .unwrap_or_else(|| DEFAULT_AUTHORITY_URL.to_string()),
            },
            github: GitHubConfig {
                token: get(GITHUB_TOKEN_ENV),
                repo: get(GITHUB_REPO_ENV),
                api_base_url: get(GITHUB_API_BASE_URL_ENV)
                    .unwrap_or_else(|| DEFAULT_GITHUB_API_BASE_URL.to_string()),
            },
            enrichment_timeout: get(ENRICHMENT_TIMEOUT_SECS_ENV)
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_ENRICHMENT_TIMEOUT),
            history_capacity: get(SUMMARY_HISTORY_CAPACITY_ENV)
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|cap| *cap > 0)
                .unwrap_or(DEFAULT_HISTORY_CAPACITY),
        }
    }

    /// Whether a configured password (not just fallbacks) was supplied.
    pub fn has_configured_password(&self) -> bool {
        self.certificate.passwords.has_configured()
    }
}

/// `graphwebhook.pfx` -> `graphwebhook.pem`
fn derived_key_path_for(container: &Path) -> PathBuf {
    container.with_extension("pem")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = config_from(&[]);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 4000);
        assert!(config.tls.is_none());
        assert_eq!(
            config.certificate.container_path,
            PathBuf::from("graphwebhook.pfx")
        );
        assert_eq!(
            config.certificate.derived_key_path,
            PathBuf::from("graphwebhook.pem")
        );
        assert!(config.certificate.persist_derived);
        assert_eq!(config.enrichment_timeout, Duration::from_secs(30));
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
        assert!(!config.graph.is_configured());
        assert!(!config.github.is_configured());
        assert!(!config.has_configured_password());

        let candidates: Vec<&str> = config.certificate.passwords.iter().collect();
        assert_eq!(candidates, vec![""]);
    }

    #[test]
    fn password_candidates_follow_configured_order() {
        let config = config_from(&[
            (GRAPH_CERT_PASSWORD_ENV, "primary"),
            (GRAPH_CERT_PASSWORD_FALLBACKS_ENV, "second,,third,primary"),
        ]);
        let candidates: Vec<&str> = config.certificate.passwords.iter().collect();
        assert_eq!(candidates, vec!["primary", "second", "", "third"]);
        assert!(config.has_configured_password());
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = config_from(&[
            (PORT_ENV, "not-a-port"),
            (ENRICHMENT_TIMEOUT_SECS_ENV, "0"),
            (SUMMARY_HISTORY_CAPACITY_ENV, "-3"),
        ]);
        assert_eq!(config.port, 4000);
        assert_eq!(config.enrichment_timeout, Duration::from_secs(30));
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
    }

    #[test]
    fn tls_requires_both_paths() {
        let only_cert = config_from(&[(TLS_CERT_PATH_ENV, "/tmp/cert.pem")]);
        assert!(only_cert.tls.is_none());

        let both = config_from(&[
            (TLS_CERT_PATH_ENV, "/tmp/cert.pem"),
            (TLS_KEY_PATH_ENV, "/tmp/key.pem"),
        ]);
        assert!(both.tls.is_some());
    }

    #[test]
    fn derived_cache_can_be_disabled() {
        let config = config_from(&[(GRAPH_CERT_CACHE_DERIVED_ENV, "false")]);
        assert!(!config.certificate.persist_derived);
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let config = config_from(&[
            (AZURE_CLIENT_SECRET_ENV, "super-secret"),
            (GITHUB_TOKEN_ENV, "ghp_token"),
            (GRAPH_CERT_PASSWORD_ENV, "hunter2"),
        ]);
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("ghp_token"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn default_identity_reuses_tenant() {
        let config = config_from(&[
            (AZURE_TENANT_ID_ENV, "tenant-1"),
            (TEAMS_USER_OBJECT_ID_ENV, "user-1"),
        ]);
        assert_eq!(config.identity.tenant_id.as_deref(), Some("tenant-1"));
        assert_eq!(config.identity.user_object_id.as_deref(), Some("user-1"));
        assert_eq!(config.graph.tenant_id.as_deref(), Some("tenant-1"));
    }
}
