use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to acquire an access token: {0}")]
    Identity(#[from] identity::IdentityError),

    #[error("Login timeout expired: {0}")]
    LoginTimeout(String),

    #[error("Failed to connect to the database: {0}")]
    Connection(String),

    #[error("Maximum retry attempts reached ({attempts})")]
    RetriesExhausted { attempts: u32 },

    #[error("Query execution failed: {0}")]
    Execution(String),

    #[error("Transaction control failed: {0}")]
    Transaction(String),

    #[error("Transaction was already rolled back or resolved")]
    TransactionClosed,

    #[error("Row {row_index} has {row_width} values but {column_count} column names were provided")]
    ShapeMismatch {
        row_index: usize,
        row_width: usize,
        column_count: usize,
    },
}

impl DbError {
    /// Whether this error is the transient login-timeout class that the
    /// connector retries; everything else fails the attempt immediately.
    pub fn is_login_timeout(&self) -> bool {
        matches!(self, DbError::LoginTimeout(_))
    }

    /// Classifies a driver error raised while opening a connection.
    ///
    /// The driver reports timeouts through message text and io error
    /// wrapping rather than a dedicated variant, so classification is by
    /// message: the ODBC-compatible "Login timeout expired" phrase and the
    /// io-level "timed out" both count as transient.
    pub(crate) fn classify_connect(e: tiberius::error::Error) -> Self {
        let text = e.to_string();
        if text.contains("Login timeout expired") || text.contains("timed out") {
            DbError::LoginTimeout(text)
        } else {
            DbError::Connection(text)
        }
    }
}
