//! Runtime configuration for the Nebula API process: the database
//! connection settings `nebula-storage` owns, plus the ambient CORS/rate
//! limit/auth-mode settings this layer owns itself.
//!
//! Grounded on the teacher's `ApiConfig::from_env` idiom: non-secret fields
//! fall back to permissive development defaults via `.ok().and_then(...)`;
//! the one field that must never silently default — the database password —
//! is delegated to `nebula_storage::DbConfig::from_env`, which is fallible.

use nebula_core::ConfigError;
use nebula_storage::DbConfig;
use std::time::Duration;

/// Process-wide configuration, assembled once at startup.
#[derive(Debug, Clone)]
pub struct NebulaConfig {
    pub db: DbConfig,

    /// Mirrors `NEBULA_STRICT_ADMIN`. See `ScopeMediatorConfig::strict_admin`.
    pub admin_bypass_strict: bool,

    /// Mirrors `NEBULA_BOOTSTRAP_ENABLED` — whether `enrollStart` accepts an
    /// unauthenticated caller at all.
    pub bootstrap_enabled: bool,

    /// Mirrors `NEBULA_LOCAL_INSECURE` — relaxes the bootstrap transport
    /// requirement for local development.
    pub local_insecure: bool,

    pub cors_origins: Vec<String>,
    pub cors_allow_credentials: bool,
    pub cors_max_age_secs: u64,

    pub rate_limit_enabled: bool,
    pub rate_limit_unauthenticated: u32,
    pub rate_limit_authenticated: u32,
    pub rate_limit_burst: u32,
    pub rate_limit_window: Duration,
}

impl NebulaConfig {
    /// Assembles configuration from `NEBULA_*` environment variables. The
    /// only fallible part is `DbConfig::from_env`'s mandatory password;
    /// every ambient setting below defaults permissively, matching the
    /// teacher's dev-friendly posture.
    pub fn from_env() -> Result<Self, ConfigError> {
        let db = DbConfig::from_env()?;

        let cors_origins = std::env::var("NEBULA_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_allow_credentials = std::env::var("NEBULA_CORS_ALLOW_CREDENTIALS")
            .ok()
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let cors_max_age_secs = std::env::var("NEBULA_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(86400);

        let rate_limit_enabled = std::env::var("NEBULA_RATE_LIMIT_ENABLED")
            .ok()
            .map(|s| !s.eq_ignore_ascii_case("false"))
            .unwrap_or(true);

        let rate_limit_unauthenticated = std::env::var("NEBULA_RATE_LIMIT_UNAUTHENTICATED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        let rate_limit_authenticated = std::env::var("NEBULA_RATE_LIMIT_AUTHENTICATED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(600);

        let rate_limit_burst = std::env::var("NEBULA_RATE_LIMIT_BURST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let admin_bypass_strict = std::env::var("NEBULA_STRICT_ADMIN")
            .ok()
            .map(|s| s.eq_ignore_ascii_case("true") || s == "1")
            .unwrap_or(false);

        let bootstrap_enabled = std::env::var("NEBULA_BOOTSTRAP_ENABLED")
            .ok()
            .map(|s| !s.eq_ignore_ascii_case("false"))
            .unwrap_or(true);

        let local_insecure = std::env::var("NEBULA_LOCAL_INSECURE")
            .ok()
            .map(|s| s.eq_ignore_ascii_case("true") || s == "1")
            .unwrap_or(false);

        Ok(Self {
            db,
            admin_bypass_strict,
            bootstrap_enabled,
            local_insecure,
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
            rate_limit_enabled,
            rate_limit_unauthenticated,
            rate_limit_authenticated,
            rate_limit_burst,
            rate_limit_window: Duration::from_secs(60),
        })
    }

    /// Strict CORS kicks in the moment an explicit allow-list is configured.
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }
        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(pattern);
                }
            }
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> NebulaConfig {
        NebulaConfig {
            db: DbConfig {
                host: "localhost".to_string(),
                port: 5432,
                dbname: "nebula".to_string(),
                user: "nebula".to_string(),
                password: "x".to_string(),
                max_size: 10,
                timeout: Duration::from_secs(5),
            },
            admin_bypass_strict: false,
            bootstrap_enabled: true,
            local_insecure: false,
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,
            rate_limit_enabled: true,
            rate_limit_unauthenticated: 60,
            rate_limit_authenticated: 600,
            rate_limit_burst: 10,
            rate_limit_window: Duration::from_secs(60),
        }
    }

    #[test]
    fn dev_mode_allows_any_origin() {
        let config = base();
        assert!(!config.is_production());
        assert!(config.is_origin_allowed("https://anything.example"));
    }

    #[test]
    fn production_mode_checks_allow_list() {
        let mut config = base();
        config.cors_origins = vec!["https://nebula.example".to_string()];
        assert!(config.is_production());
        assert!(config.is_origin_allowed("https://nebula.example"));
        assert!(!config.is_origin_allowed("https://evil.example"));
    }

    #[test]
    fn wildcard_subdomain_matches() {
        let mut config = base();
        config.cors_origins = vec!["*.nebula.example".to_string()];
        assert!(config.is_origin_allowed("https://app.nebula.example"));
        assert!(!config.is_origin_allowed("https://evil.example"));
    }
}
