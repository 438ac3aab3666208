use crate::error::DbError;
use crate::value::{Params, Value};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use tiberius::Client;
use tokio::net::TcpStream;
use tokio_util::compat::Compat;

/// One open database session: statement execution plus transaction and
/// lifecycle control.
///
/// The executors are written against this trait so their commit, rollback
/// and close sequencing can be verified with a recording mock.
#[async_trait]
pub trait Session: Send {
    /// Opens an explicit transaction on this session.
    async fn begin(&mut self) -> Result<(), DbError>;

    /// Executes a statement, returning the number of affected rows.
    /// `Params::Batch` replays the statement once per parameter row.
    async fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, DbError>;

    /// Executes a statement and fetches its first result set as rows plus
    /// ordered column names.
    async fn query(
        &mut self,
        sql: &str,
        params: &Params,
    ) -> Result<(Vec<Vec<Value>>, Vec<String>), DbError>;

    /// Commits the open transaction. A no-op when none is open.
    async fn commit(&mut self) -> Result<(), DbError>;

    /// Rolls back the open transaction. A no-op when none is open.
    async fn rollback(&mut self) -> Result<(), DbError>;

    /// Closes the session. Idempotent; later calls are no-ops.
    async fn close(&mut self) -> Result<(), DbError>;
}

type TdsClient = Client<Compat<TcpStream>>;

/// The tiberius-backed session.
pub struct TdsSession {
    client: Option<TdsClient>,
    in_transaction: bool,
}

impl TdsSession {
    pub(crate) fn new(client: TdsClient) -> Self {
        Self {
            client: Some(client),
            in_transaction: false,
        }
    }

    fn client(&mut self) -> Result<&mut TdsClient, DbError> {
        self.client
            .as_mut()
            .ok_or_else(|| DbError::Connection("session is already closed".into()))
    }

    async fn execute_one(&mut self, sql: &str, values: &[Value]) -> Result<u64, DbError> {
        let refs = param_refs(values);
        let result = self
            .client()?
            .execute(sql, &refs)
            .await
            .map_err(|e| DbError::Execution(e.to_string()))?;
        Ok(result.total())
    }
}

/// Build a slice of driver parameter references from values. The returned
/// refs borrow from `values`, which must outlive the query call.
fn param_refs(values: &[Value]) -> Vec<&dyn tiberius::ToSql> {
    values.iter().map(|v| v as &dyn tiberius::ToSql).collect()
}

/// Convert one driver column value to a `Value`.
///
/// The driver exposes cells through typed accessors rather than a tagged
/// union, so probe the narrow types before the catch-all binary accessor.
fn read_cell(row: &tiberius::Row, idx: usize) -> Value {
    if let Ok(Some(v)) = row.try_get::<bool, _>(idx) {
        return Value::Bool(v);
    }
    if let Ok(Some(v)) = row.try_get::<u8, _>(idx) {
        return Value::Int(v as i32);
    }
    if let Ok(Some(v)) = row.try_get::<i16, _>(idx) {
        return Value::Int(v as i32);
    }
    if let Ok(Some(v)) = row.try_get::<i32, _>(idx) {
        return Value::Int(v);
    }
    if let Ok(Some(v)) = row.try_get::<i64, _>(idx) {
        return Value::BigInt(v);
    }
    if let Ok(Some(v)) = row.try_get::<f32, _>(idx) {
        return Value::Float(v as f64);
    }
    if let Ok(Some(v)) = row.try_get::<f64, _>(idx) {
        return Value::Float(v);
    }
    if let Ok(Some(v)) = row.try_get::<&str, _>(idx) {
        return Value::Text(v.to_string());
    }
    if let Ok(Some(v)) = row.try_get::<NaiveDateTime, _>(idx) {
        return Value::DateTime(v);
    }
    if let Ok(Some(v)) = row.try_get::<&[u8], _>(idx) {
        return Value::Bytes(v.to_vec());
    }
    Value::Null
}

#[async_trait]
impl Session for TdsSession {
    async fn begin(&mut self) -> Result<(), DbError> {
        self.client()?
            .execute("BEGIN TRANSACTION", &[])
            .await
            .map_err(|e| DbError::Transaction(format!("Failed to begin transaction: {e}")))?;
        self.in_transaction = true;
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, DbError> {
        match params {
            Params::None => self.execute_one(sql, &[]).await,
            Params::Row(values) => self.execute_one(sql, values).await,
            Params::Batch(rows) => {
                let mut total = 0;
                for values in rows {
                    total += self.execute_one(sql, values).await?;
                }
                Ok(total)
            }
        }
    }

    async fn query(
        &mut self,
        sql: &str,
        params: &Params,
    ) -> Result<(Vec<Vec<Value>>, Vec<String>), DbError> {
        let values: &[Value] = match params {
            Params::None => &[],
            Params::Row(values) => values,
            Params::Batch(_) => {
                return Err(DbError::Execution(
                    "batched parameters cannot produce a result set".into(),
                ));
            }
        };
        let refs = param_refs(values);

        let mut stream = self
            .client()?
            .query(sql, &refs)
            .await
            .map_err(|e| DbError::Execution(e.to_string()))?;

        let columns: Vec<String> = stream
            .columns()
            .await
            .map_err(|e| DbError::Execution(e.to_string()))?
            .map(|cols| cols.iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let driver_rows = stream
            .into_first_result()
            .await
            .map_err(|e| DbError::Execution(e.to_string()))?;

        let rows = driver_rows
            .iter()
            .map(|row| (0..columns.len()).map(|i| read_cell(row, i)).collect())
            .collect();

        Ok((rows, columns))
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.client()?
            .execute("COMMIT TRANSACTION", &[])
            .await
            .map_err(|e| DbError::Transaction(format!("Failed to commit: {e}")))?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.client()?
            .execute("ROLLBACK TRANSACTION", &[])
            .await
            .map_err(|e| DbError::Transaction(format!("Failed to rollback: {e}")))?;
        self.in_transaction = false;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DbError> {
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| DbError::Connection(format!("Failed to close session: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Recording mocks shared by the connector and executor tests.

    use super::*;
    use std::sync::{Arc, Mutex};

    /// Shared call log surviving the session it records, so tests can
    /// inspect ordering after the executor consumed the session.
    #[derive(Debug, Clone, Default)]
    pub struct SessionLog(Arc<Mutex<Vec<String>>>);

    impl SessionLog {
        pub fn record(&self, call: impl Into<String>) {
            self.0.lock().unwrap().push(call.into());
        }

        pub fn calls(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        pub fn count(&self, name: &str) -> usize {
            self.calls().iter().filter(|c| c.as_str() == name).count()
        }

        /// Position of the first occurrence of `name`, if any.
        pub fn position(&self, name: &str) -> Option<usize> {
            self.calls().iter().position(|c| c == name)
        }
    }

    /// A scripted in-memory session.
    #[derive(Debug)]
    pub struct MockSession {
        pub log: SessionLog,
        /// 1-based statement index that should fail, if any.
        fail_on_statement: Option<u32>,
        statements: u32,
        canned_rows: Vec<Vec<Value>>,
        canned_columns: Vec<String>,
    }

    impl MockSession {
        pub fn new(log: SessionLog) -> Self {
            Self {
                log,
                fail_on_statement: None,
                statements: 0,
                canned_rows: vec![vec![Value::Int(1), Value::Text("one".into())]],
                canned_columns: vec!["id".into(), "name".into()],
            }
        }

        pub fn failing_on_statement(log: SessionLog, n: u32) -> Self {
            Self {
                fail_on_statement: Some(n),
                ..Self::new(log)
            }
        }

        pub fn with_result(
            log: SessionLog,
            rows: Vec<Vec<Value>>,
            columns: Vec<String>,
        ) -> Self {
            Self {
                canned_rows: rows,
                canned_columns: columns,
                ..Self::new(log)
            }
        }

        fn next_statement(&mut self) -> Result<(), DbError> {
            self.statements += 1;
            if self.fail_on_statement == Some(self.statements) {
                return Err(DbError::Execution("simulated failure".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Session for MockSession {
        async fn begin(&mut self) -> Result<(), DbError> {
            self.log.record("begin");
            Ok(())
        }

        async fn execute(&mut self, sql: &str, _params: &Params) -> Result<u64, DbError> {
            self.log.record(format!("execute:{sql}"));
            self.next_statement()?;
            Ok(1)
        }

        async fn query(
            &mut self,
            sql: &str,
            _params: &Params,
        ) -> Result<(Vec<Vec<Value>>, Vec<String>), DbError> {
            self.log.record(format!("query:{sql}"));
            self.next_statement()?;
            Ok((self.canned_rows.clone(), self.canned_columns.clone()))
        }

        async fn commit(&mut self) -> Result<(), DbError> {
            self.log.record("commit");
            Ok(())
        }

        async fn rollback(&mut self) -> Result<(), DbError> {
            self.log.record("rollback");
            Ok(())
        }

        async fn close(&mut self) -> Result<(), DbError> {
            self.log.record("close");
            Ok(())
        }
    }
}
