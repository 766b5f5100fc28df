/// Database configuration.
///
/// The CLI resolves the URL from its flag, environment and config file before
/// building one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Full SQLite connection URL.
    pub database_url: String,
}

impl DbConfig {
    /// The default connection URL, relative to the working directory.
    pub const DEFAULT_URL: &str = "sqlite://cram.db";

    /// Build a config from an explicit URL (useful for tests and CLI flags).
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// Build a config pointing at a database file on disk.
    pub fn for_path(path: &std::path::Path) -> Self {
        Self::new(format!("sqlite://{}", path.display()))
    }

    /// The filesystem path of the database, if the URL names one.
    ///
    /// Returns `None` for in-memory databases.
    pub fn database_path(&self) -> Option<&str> {
        let rest = self
            .database_url
            .strip_prefix("sqlite://")
            .or_else(|| self.database_url.strip_prefix("sqlite:"))?;
        let path = rest.split('?').next().unwrap_or(rest);
        if path.is_empty() || path == ":memory:" {
            None
        } else {
            Some(path)
        }
    }
}
