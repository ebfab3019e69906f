use std::env;
use std::time::Duration;

/// Connection settings for the content index database.
///
/// Reads from `FORGE_DATABASE_URL` (and optionally `FORGE_DB_MAX_CONNECTIONS`),
/// falling back to `postgresql://localhost:5432/forge` when unset.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL, including any query parameters.
    pub database_url: String,
    /// Upper bound on pooled connections. Planning requests hold a
    /// connection only for the duration of one query.
    pub max_connections: u32,
    /// How long to wait for a free connection before failing.
    pub acquire_timeout: Duration,
}

impl DbConfig {
    /// The default connection URL used when no environment variable is set.
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/forge";

    const DEFAULT_MAX_CONNECTIONS: u32 = 10;

    /// Build a config from the environment.
    pub fn from_env() -> Self {
        let database_url =
            env::var("FORGE_DATABASE_URL").unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());
        let max_connections = env::var("FORGE_DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(Self::DEFAULT_MAX_CONNECTIONS);
        Self {
            max_connections,
            ..Self::new(database_url)
        }
    }

    /// Build a config from an explicit URL (CLI flags, config file, tests).
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(10),
        }
    }

    /// The URL with any `?query` suffix removed.
    fn base_url(&self) -> &str {
        match self.database_url.split_once('?') {
            Some((base, _)) => base,
            None => &self.database_url,
        }
    }

    /// Extract the database name from the URL.
    ///
    /// Returns `None` when the URL has no path component after the host.
    pub fn database_name(&self) -> Option<&str> {
        let base = self.base_url();
        let after_scheme = base.split_once("://").map_or(base, |(_, rest)| rest);
        after_scheme
            .split_once('/')
            .map(|(_, name)| name)
            .filter(|name| !name.is_empty() && !name.contains('/'))
    }

    /// URL of the `postgres` maintenance database on the same server,
    /// preserving query parameters such as `sslmode`.
    pub fn maintenance_url(&self) -> String {
        let base = self.base_url();
        let query = &self.database_url[base.len()..];
        match base.rfind('/') {
            Some(pos) if self.database_name().is_some() => {
                format!("{}/postgres{query}", &base[..pos])
            }
            _ => self.database_url.clone(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_url() {
        let cfg = DbConfig::new(DbConfig::DEFAULT_URL);
        assert_eq!(cfg.database_url, "postgresql://localhost:5432/forge");
        assert_eq!(cfg.database_name(), Some("forge"));
        assert_eq!(cfg.max_connections, 10);
    }

    #[test]
    fn database_name_ignores_query_string() {
        let cfg = DbConfig::new("postgresql://db.internal:6432/storefront?sslmode=require");
        assert_eq!(cfg.database_name(), Some("storefront"));
    }

    #[test]
    fn database_name_missing() {
        let cfg = DbConfig::new("postgresql://localhost:5432");
        assert_eq!(cfg.database_name(), None);
        assert_eq!(cfg.maintenance_url(), "postgresql://localhost:5432");
    }

    #[test]
    fn maintenance_url_keeps_query() {
        let cfg = DbConfig::new("postgresql://db.internal:6432/storefront?sslmode=require");
        assert_eq!(
            cfg.maintenance_url(),
            "postgresql://db.internal:6432/postgres?sslmode=require"
        );
    }

    #[test]
    fn maintenance_url_replaces_db() {
        let cfg = DbConfig::new("postgresql://localhost:5432/forge");
        assert_eq!(cfg.maintenance_url(), "postgresql://localhost:5432/postgres");
    }
}
