use crate::error::ConfigError;
use std::env::{self, VarError};
use std::fmt;

/// Environment variable naming the target SQL server (e.g. `myserver.database.windows.net`).
pub const SERVER_VAR: &str = "AZSQL_SERVER";
/// Environment variable naming the target database.
pub const DATABASE_VAR: &str = "AZSQL_DATABASE";
/// Environment variable holding the Entra ID tenant id.
pub const TENANT_ID_VAR: &str = "AZSQL_TENANT_ID";
/// Environment variable holding the application (client) id.
pub const CLIENT_ID_VAR: &str = "AZSQL_CLIENT_ID";
/// Environment variable holding the client secret.
pub const CLIENT_SECRET_VAR: &str = "AZSQL_CLIENT_SECRET";

/// The root settings structure for the whole application.
///
/// Constructed once at startup from the process environment and then passed
/// by reference into the identity and database crates. All fields are
/// read-only after construction.
#[derive(Clone)]
pub struct Settings {
    /// Fully qualified server name, e.g. `myserver.database.windows.net`.
    pub server: String,
    /// Database name on that server.
    pub database: String,
    /// Entra ID tenant the service principal lives in.
    pub tenant_id: String,
    /// Application (client) id of the service principal.
    pub client_id: String,
    /// Client secret of the service principal.
    pub client_secret: String,
}

impl Settings {
    /// Builds the settings from the process environment.
    ///
    /// Call `dotenvy::dotenv()` beforehand if a `.env` file should be
    /// honored. A missing variable is a fatal configuration error; callers
    /// are expected to abort startup rather than continue without
    /// credentials.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name))
    }

    /// Builds the settings from an arbitrary variable lookup.
    ///
    /// Split out from `from_env` so tests can supply a map instead of
    /// mutating the (process-global) environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let require = |name: &'static str| match lookup(name) {
            Ok(value) => Ok(value),
            Err(VarError::NotPresent) => Err(ConfigError::MissingVar(name)),
            Err(VarError::NotUnicode(_)) => Err(ConfigError::InvalidVar(name)),
        };

        Ok(Self {
            server: require(SERVER_VAR)?,
            database: require(DATABASE_VAR)?,
            tenant_id: require(TENANT_ID_VAR)?,
            client_id: require(CLIENT_ID_VAR)?,
            client_secret: require(CLIENT_SECRET_VAR)?,
        })
    }
}

// Manual Debug so the client secret never ends up in logs or panics.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (SERVER_VAR, "myserver.database.windows.net"),
            (DATABASE_VAR, "mydb"),
            (TENANT_ID_VAR, "tenant-123"),
            (CLIENT_ID_VAR, "client-456"),
            (CLIENT_SECRET_VAR, "s3cret"),
        ])
    }

    fn lookup_in(
        map: HashMap<&'static str, &'static str>,
    ) -> impl Fn(&str) -> Result<String, VarError> {
        move |name| {
            map.get(name)
                .map(|v| v.to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn loads_all_fields() {
        let settings = Settings::from_lookup(lookup_in(full_env())).unwrap();
        assert_eq!(settings.server, "myserver.database.windows.net");
        assert_eq!(settings.database, "mydb");
        assert_eq!(settings.tenant_id, "tenant-123");
        assert_eq!(settings.client_id, "client-456");
        assert_eq!(settings.client_secret, "s3cret");
    }

    #[test]
    fn missing_variable_is_fatal() {
        let mut env = full_env();
        env.remove(TENANT_ID_VAR);
        let err = Settings::from_lookup(lookup_in(env)).unwrap_err();
        match err {
            ConfigError::MissingVar(name) => assert_eq!(name, TENANT_ID_VAR),
            other => panic!("expected MissingVar, got {other:?}"),
        }
    }

    #[test]
    fn debug_redacts_the_secret() {
        let settings = Settings::from_lookup(lookup_in(full_env())).unwrap();
        let rendered = format!("{settings:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("s3cret"));
    }
}
