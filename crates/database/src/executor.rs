use crate::connection::{connect_with_retry, Connector, RetryPolicy, TdsConnector};
use crate::error::DbError;
use crate::session::Session;
use crate::table::Table;
use crate::value::Params;
use configuration::Settings;
use identity::EntraIdClient;

/// Result-handling mode for a single-step operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    /// Fetch the result set. `commit` controls whether the work is committed
    /// before the rows are returned; left `false`, any data modification the
    /// statement made is discarded when the session closes.
    Rows { commit: bool },
    /// No result set expected; the statement is always committed.
    NoRows,
}

/// Outcome of a single-step operation.
///
/// Failures are carried as data rather than raised: `perform` reports every
/// error through the `Failed` variant so callers branch on this enum instead
/// of unwinding. (The transactional path is the opposite by design.)
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The statement ran and its result set was fetched.
    Rows(Table),
    /// The statement ran and was committed; no rows were requested.
    Done,
    /// The operation failed; the message describes the underlying error.
    Failed(String),
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// High-level entry point for running queries against the configured
/// database. Owns a connector and a retry policy; every operation acquires
/// its own session through them.
pub struct SqlManager<C: Connector> {
    connector: C,
    policy: RetryPolicy,
}

impl SqlManager<TdsConnector<EntraIdClient>> {
    /// Manager backed by the live token provider and TDS connector, with the
    /// default retry policy.
    pub fn new(settings: &Settings) -> Self {
        Self::with_connector(TdsConnector::new(settings), RetryPolicy::default())
    }
}

impl<C: Connector> SqlManager<C> {
    pub fn with_connector(connector: C, policy: RetryPolicy) -> Self {
        Self { connector, policy }
    }

    /// Runs exactly one statement end-to-end on a fresh session.
    ///
    /// The session is opened through the retrying connector and closed on
    /// every exit path. This method never returns an error: acquisition,
    /// execution and commit failures are all folded into
    /// [`Outcome::Failed`].
    pub async fn perform(&self, sql: &str, params: Params, fetch: Fetch) -> Outcome {
        match self.try_perform(sql, params, fetch).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Error performing query: {e}");
                Outcome::Failed(e.to_string())
            }
        }
    }

    async fn try_perform(&self, sql: &str, params: Params, fetch: Fetch) -> Result<Outcome, DbError> {
        let mut session = connect_with_retry(&self.connector, &self.policy).await?;

        let result = Self::run_single(&mut session, sql, &params, fetch).await;

        // Close before inspecting the result so the session is released on
        // the failure path too.
        let closed = session.close().await;
        let outcome = result?;
        closed?;
        Ok(outcome)
    }

    async fn run_single(
        session: &mut C::Session,
        sql: &str,
        params: &Params,
        fetch: Fetch,
    ) -> Result<Outcome, DbError> {
        session.begin().await?;
        match fetch {
            Fetch::NoRows => {
                session.execute(sql, params).await?;
                session.commit().await?;
                Ok(Outcome::Done)
            }
            Fetch::Rows { commit } => {
                let (rows, columns) = session.query(sql, params).await?;
                if commit {
                    session.commit().await?;
                }
                Ok(Outcome::Rows(Table::new(rows, columns)?))
            }
        }
    }

    /// Opens a caller-owned transaction on a fresh session.
    ///
    /// Unlike [`perform`](Self::perform), acquisition failures propagate.
    pub async fn begin(&self) -> Result<SqlTransaction<C::Session>, DbError> {
        let mut session = connect_with_retry(&self.connector, &self.policy).await?;
        if let Err(e) = session.begin().await {
            let _ = session.close().await;
            return Err(e);
        }
        Ok(SqlTransaction {
            session: Some(session),
        })
    }
}

/// A multi-statement transaction owned by the caller.
///
/// Each `step` runs one statement inside the transaction; holding the handle
/// across calls is what shares the session between them. The transaction
/// resolves by consuming the handle through [`commit`](Self::commit) or
/// [`rollback`](Self::rollback).
///
/// Any failing step rolls the transaction back, releases the session, and
/// propagates the error; the handle is dead afterwards and later steps
/// return [`DbError::TransactionClosed`]. A handle dropped unresolved only
/// logs a warning: closing the session discards the open transaction on the
/// server side.
pub struct SqlTransaction<S: Session> {
    session: Option<S>,
}

impl<S: Session> SqlTransaction<S> {
    fn session_mut(&mut self) -> Result<&mut S, DbError> {
        self.session.as_mut().ok_or(DbError::TransactionClosed)
    }

    /// Runs one statement in the transaction, returning affected rows.
    pub async fn step(&mut self, sql: &str, params: Params) -> Result<u64, DbError> {
        let result = self.session_mut()?.execute(sql, &params).await;
        self.check(result).await
    }

    /// Runs one statement and fetches its result set.
    pub async fn step_query(&mut self, sql: &str, params: Params) -> Result<Table, DbError> {
        let result = match self.session_mut()?.query(sql, &params).await {
            Ok((rows, columns)) => Table::new(rows, columns),
            Err(e) => Err(e),
        };
        self.check(result).await
    }

    /// On step failure: roll back, release the session, propagate.
    async fn check<T>(&mut self, result: Result<T, DbError>) -> Result<T, DbError> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::error!("Error in atomic operation: {e}");
                if let Err(release_err) = self.release(false).await {
                    tracing::warn!("Failed to release transaction session: {release_err}");
                }
                Err(e)
            }
        }
    }

    async fn release(&mut self, commit: bool) -> Result<(), DbError> {
        let Some(mut session) = self.session.take() else {
            return Err(DbError::TransactionClosed);
        };
        let resolved = if commit {
            session.commit().await
        } else {
            session.rollback().await
        };
        let closed = session.close().await;
        resolved?;
        closed
    }

    /// Commits the transaction and closes its session.
    pub async fn commit(mut self) -> Result<(), DbError> {
        self.release(true).await
    }

    /// Rolls the transaction back and closes its session.
    pub async fn rollback(mut self) -> Result<(), DbError> {
        self.release(false).await
    }
}

impl<S: Session> Drop for SqlTransaction<S> {
    fn drop(&mut self) {
        if self.session.is_some() {
            // The server rolls the open transaction back once the dropped
            // session's connection goes away.
            tracing::warn!("Transaction dropped without commit or rollback; work is discarded");
        }
    }
}
