use crate::error::DbError;
use crate::session::{Session, TdsSession};
use async_trait::async_trait;
use configuration::Settings;
use identity::{EntraIdClient, TokenProvider};
use std::time::Duration;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::compat::TokioAsyncWriteCompatExt;

/// Default TCP port for SQL Server.
const SQL_SERVER_PORT: u16 = 1433;

/// How long a single login attempt may take before it is classified as a
/// transient login timeout (mirrors the ODBC driver's default).
const LOGIN_TIMEOUT: Duration = Duration::from_secs(15);

/// Builds the ODBC connection string equivalent of this crate's native
/// connection setup, for callers bridging to an ODBC-based driver. Such a
/// driver additionally takes the encoded access token as a pre-login
/// attribute under [`identity::SQL_COPT_SS_ACCESS_TOKEN`].
///
/// The field layout is fixed by the driver: name the driver, the server, the
/// database, and disable client-side encryption negotiation.
pub fn odbc_connection_string(server: &str, database: &str) -> String {
    format!("DRIVER={{ODBC Driver 18 for SQL Server}};SERVER={server};DATABASE={database};ENCRYPT=NO")
}

/// Bounded retry policy for connection acquisition.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of connection attempts.
    pub max_retries: u32,
    /// Pause between attempts after a login timeout.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// The abstract interface for opening one database session.
///
/// The retry loop is written against this trait so its bounds and
/// classification behavior can be exercised without a server.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: Session;

    /// Makes exactly one connection attempt.
    async fn connect(&self) -> Result<Self::Session, DbError>;
}

/// A concrete `Connector` that opens a TDS session against Azure SQL,
/// authenticating with a freshly acquired access token on every attempt.
pub struct TdsConnector<P: TokenProvider> {
    settings: Settings,
    provider: P,
    login_timeout: Duration,
}

impl TdsConnector<EntraIdClient> {
    /// Connector using the live identity platform client.
    pub fn new(settings: &Settings) -> Self {
        let provider = EntraIdClient::new(settings);
        Self::with_provider(settings.clone(), provider)
    }
}

impl<P: TokenProvider> TdsConnector<P> {
    pub fn with_provider(settings: Settings, provider: P) -> Self {
        Self {
            settings,
            provider,
            login_timeout: LOGIN_TIMEOUT,
        }
    }

    fn driver_config(&self, token: &identity::AccessToken) -> Config {
        let mut config = Config::new();
        config.host(&self.settings.server);
        config.port(SQL_SERVER_PORT);
        config.database(&self.settings.database);
        // ENCRYPT=NO: skip the TLS negotiation entirely.
        config.encryption(EncryptionLevel::NotSupported);
        config.authentication(AuthMethod::aad_token(token.secret()));
        config
    }
}

#[async_trait]
impl<P: TokenProvider> Connector for TdsConnector<P> {
    type Session = TdsSession;

    async fn connect(&self) -> Result<TdsSession, DbError> {
        // Tokens are short-lived and never cached; each attempt starts from
        // a fresh one.
        let token = self.provider.acquire().await?;
        let config = self.driver_config(&token);
        let addr = config.get_addr();

        let tcp = timeout(self.login_timeout, TcpStream::connect(addr.as_str()))
            .await
            .map_err(|_| {
                DbError::LoginTimeout(format!(
                    "no response from {addr} within {:?}",
                    self.login_timeout
                ))
            })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::TimedOut {
                    DbError::LoginTimeout(e.to_string())
                } else {
                    DbError::Connection(format!("Failed to connect to {addr}: {e}"))
                }
            })?;
        tcp.set_nodelay(true).ok();

        let client = timeout(self.login_timeout, Client::connect(config, tcp.compat_write()))
            .await
            .map_err(|_| {
                DbError::LoginTimeout(format!(
                    "login handshake with {addr} exceeded {:?}",
                    self.login_timeout
                ))
            })?
            .map_err(DbError::classify_connect)?;

        Ok(TdsSession::new(client))
    }
}

/// Opens a session through `connector`, retrying on login timeouts.
///
/// Up to `policy.max_retries` attempts are made. A login-timeout failure is
/// logged as a warning and retried after `policy.delay`; any other failure is
/// logged and returned immediately with no further attempts. When every
/// attempt has timed out the terminal error is `DbError::RetriesExhausted`.
pub async fn connect_with_retry<C: Connector>(
    connector: &C,
    policy: &RetryPolicy,
) -> Result<C::Session, DbError> {
    for attempt in 1..=policy.max_retries {
        match connector.connect().await {
            Ok(session) => return Ok(session),
            Err(e) if e.is_login_timeout() => {
                tracing::warn!(
                    "Attempt {attempt} failed ({e}), retrying in {:?}...",
                    policy.delay
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => {
                tracing::error!("Operational error: {e}");
                return Err(e);
            }
        }
    }

    tracing::error!("Maximum retry attempts reached");
    Err(DbError::RetriesExhausted {
        attempts: policy.max_retries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_support::{MockSession, SessionLog};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// A connector scripted with one outcome kind per attempt.
    struct ScriptedConnector {
        attempts: AtomicU32,
        // Indexed by attempt; `None` means succeed, `Some` is the error kind.
        script: Vec<Option<fn() -> DbError>>,
        log: SessionLog,
    }

    impl ScriptedConnector {
        fn new(script: Vec<Option<fn() -> DbError>>) -> Self {
            Self {
                attempts: AtomicU32::new(0),
                script,
                log: SessionLog::default(),
            }
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    fn timeout_error() -> DbError {
        DbError::LoginTimeout("Login timeout expired".into())
    }

    fn fatal_error() -> DbError {
        DbError::Connection("network unreachable".into())
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        type Session = MockSession;

        async fn connect(&self) -> Result<MockSession, DbError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) as usize;
            match self.script.get(attempt) {
                Some(Some(make_error)) => Err(make_error()),
                _ => Ok(MockSession::new(self.log.clone())),
            }
        }
    }

    fn immediate_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn exhausts_retries_on_persistent_timeouts() {
        let connector = ScriptedConnector::new(vec![
            Some(timeout_error),
            Some(timeout_error),
            Some(timeout_error),
        ]);

        let result = connect_with_retry(&connector, &immediate_retry()).await;

        assert_eq!(connector.attempts(), 3);
        match result {
            Err(DbError::RetriesExhausted { attempts }) => assert_eq!(attempts, 3),
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_timeouts() {
        let connector = ScriptedConnector::new(vec![Some(timeout_error), None]);

        let result = connect_with_retry(&connector, &immediate_retry()).await;

        assert!(result.is_ok());
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test]
    async fn first_attempt_success_makes_exactly_one_attempt() {
        let connector = ScriptedConnector::new(vec![None]);

        connect_with_retry(&connector, &immediate_retry())
            .await
            .unwrap();

        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test]
    async fn non_timeout_errors_short_circuit() {
        let connector = ScriptedConnector::new(vec![Some(fatal_error), Some(timeout_error)]);

        let result = connect_with_retry(&connector, &immediate_retry()).await;

        assert_eq!(connector.attempts(), 1, "fatal errors must not retry");
        assert!(matches!(result, Err(DbError::Connection(_))));
    }

    #[test]
    fn odbc_connection_string_matches_driver_format() {
        let s = odbc_connection_string("myserver.database.windows.net", "mydb");
        assert_eq!(
            s,
            "DRIVER={ODBC Driver 18 for SQL Server};\
             SERVER=myserver.database.windows.net;DATABASE=mydb;ENCRYPT=NO"
        );
    }
}
