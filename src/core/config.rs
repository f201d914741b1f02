//! Process-wide configuration, read from the environment exactly once.
//!
//! Every component receives this struct; nothing else in the crate touches
//! ambient state.

use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub const RELEASE_API_VAR: &str = "PGSHIP_RELEASE_API";
pub const TOKEN_VAR: &str = "PGSHIP_TOKEN";
pub const PG_MAJOR_VAR: &str = "PGSHIP_PG_MAJOR";
pub const ARCH_VAR: &str = "PGSHIP_ARCH";
pub const SCRATCH_DIR_VAR: &str = "PGSHIP_SCRATCH_DIR";

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the release host API, without a trailing slash.
    pub api_base: String,
    /// Bearer credential for the release host. Optional for read-only
    /// operations; required before any publish work starts.
    pub token: Option<String>,
    /// Target PostgreSQL major version, e.g. "16".
    pub pg_major: u32,
    /// Debian architecture string used in artifact names, e.g. "amd64".
    pub arch: String,
    /// Directory under which per-build scratch directories are created.
    pub scratch_root: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_base = require(&get, RELEASE_API_VAR)?
            .trim_end_matches('/')
            .to_string();

        let pg_major_raw = require(&get, PG_MAJOR_VAR)?;
        let pg_major: u32 = pg_major_raw.parse().map_err(|_| {
            Error::config_invalid_value(
                PG_MAJOR_VAR,
                Some(pg_major_raw.clone()),
                "PostgreSQL major version must be a positive integer",
            )
        })?;

        let arch = match get(ARCH_VAR).filter(|v| !v.trim().is_empty()) {
            Some(arch) => arch.trim().to_string(),
            None => host_deb_arch()?,
        };

        let token = get(TOKEN_VAR).filter(|v| !v.trim().is_empty());

        let scratch_root = get(SCRATCH_DIR_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("pgship"));

        Ok(Self {
            api_base,
            token,
            pg_major,
            arch,
            scratch_root,
        })
    }

    /// Require the bearer credential, with a setup hint when it is absent.
    pub fn require_token(&self) -> Result<&str> {
        self.token.as_deref().ok_or_else(|| {
            Error::config_missing_key(TOKEN_VAR)
                .with_hint("Export a release host credential: PGSHIP_TOKEN=<token>")
        })
    }

    /// Toolchain helper path for the configured PostgreSQL major version
    /// (Debian layout).
    pub fn pg_config_path(&self) -> PathBuf {
        PathBuf::from(format!(
            "/usr/lib/postgresql/{}/bin/pg_config",
            self.pg_major
        ))
    }
}

fn require(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            Error::config_missing_key(key)
                .with_hint(format!("Export {} before running pgship", key))
        })
}

/// Map the host architecture to its Debian name.
/// Hosts outside the mapping must set PGSHIP_ARCH explicitly.
fn host_deb_arch() -> Result<String> {
    match env::consts::ARCH {
        "x86_64" => Ok("amd64".to_string()),
        "aarch64" => Ok("arm64".to_string()),
        other => Err(Error::config_missing_key(ARCH_VAR).with_hint(format!(
            "No Debian architecture mapping for host arch '{}'; set {} explicitly",
            other, ARCH_VAR
        ))),
    }
}
