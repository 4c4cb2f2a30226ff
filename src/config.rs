//! TOML configuration types for ChatGuard.
//!
//! The top-level [`AppConfig`] is deserialized from `chatguard.toml`. Every
//! section is optional and falls back to the built-in defaults, so an empty
//! file (or no file at all) yields a working gateway.
//!
//! # Example `chatguard.toml`
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:8080"
//!
//! [audit]
//! path = "audit_log.txt"
//!
//! [policy]
//! forbidden_terms = ["password", "SECRET"]
//!
//! [responder]
//! kind = "http"
//! url = "${BACKEND_URL}"
//! ```

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Terms blocked out of the box, checked in this order.
pub const DEFAULT_FORBIDDEN_TERMS: &[&str] =
    &["社外秘", "機密", "パスワード", "password", "SECRET", "年収"];

/// HTTP server configuration (`[server]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., `"127.0.0.1:8080"`).
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

/// Audit log configuration (`[audit]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    /// Path of the append-only audit log file.
    #[serde(default = "default_audit_path")]
    pub path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: default_audit_path(),
        }
    }
}

fn default_audit_path() -> PathBuf {
    PathBuf::from("audit_log.txt")
}

/// Policy configuration (`[policy]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyConfig {
    /// Literal terms, matched case-sensitively; earlier entries take priority.
    #[serde(default = "default_forbidden_terms")]
    pub forbidden_terms: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            forbidden_terms: default_forbidden_terms(),
        }
    }
}

fn default_forbidden_terms() -> Vec<String> {
    DEFAULT_FORBIDDEN_TERMS
        .iter()
        .map(|t| t.to_string())
        .collect()
}

/// Which backend answers approved messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponderKind {
    /// Echo the message back in a canned reply.
    #[default]
    Mock,
    /// Forward the message to an HTTP backend.
    Http,
}

/// Responder configuration (`[responder]` section).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResponderConfig {
    #[serde(default)]
    pub kind: ResponderKind,
    /// Backend URL, required when `kind = "http"`.
    #[serde(default)]
    pub url: Option<String>,
    /// Request timeout in seconds for the HTTP backend (default: 30).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Top-level application configuration deserialized from `chatguard.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub responder: ResponderConfig,
}

impl AppConfig {
    /// Load and parse the configuration from a TOML file at the given path.
    ///
    /// Before parsing, `${VAR}` and `$VAR` placeholders in the TOML text are
    /// replaced with the corresponding environment variable values. An error is
    /// returned if a referenced variable is not set.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Like [`load_from_path`](Self::load_from_path), but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_path(path)
        } else {
            tracing::info!("No config at {}; using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parse configuration text after environment substitution.
    pub fn from_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Replace `${VAR_NAME}` and `$VAR_NAME` placeholders with environment variable values.
///
/// Returns an error containing the variable name if the variable is not set.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re_braces = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex");
    // Bare form is uppercase-only to avoid false positives.
    let re_bare = Regex::new(r"\$([A-Z_][A-Z0-9_]*)").expect("static regex");

    let mut result = input.to_string();

    for cap in re_braces.captures_iter(input) {
        let var_name = &cap[1];
        let value = std::env::var(var_name)
            .map_err(|_| GatewayError::ConfigEnvVar(var_name.to_string()))?;
        result = result.replace(&cap[0], &value);
    }

    let intermediate = result.clone();
    for cap in re_bare.captures_iter(&intermediate) {
        let var_name = &cap[1];
        let value = std::env::var(var_name)
            .map_err(|_| GatewayError::ConfigEnvVar(var_name.to_string()))?;
        result = result.replace(&cap[0], &value);
    }

    Ok(result)
}
