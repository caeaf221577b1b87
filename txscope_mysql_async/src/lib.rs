#![forbid(unsafe_code)]
#![cfg_attr(
    not(feature = "mysql-async"),
    doc = "This crate provides a mysql_async driver adapter. Enable feature `mysql-async` to use it."
)]

#[cfg(feature = "mysql-async")]
mod backend {
    use async_trait::async_trait;
    use mysql_async::{prelude::*, Conn, Opts, Params, Pool};
    use std::sync::Arc;
    use std::time::Instant;
    use tokio::sync::Mutex;
    use txscope_core::{
        Connection, ConnectionPool, DbError, DbResult, Driver, QueryOutcome, Row, Value,
    };

    fn to_mysql_value(v: &Value) -> mysql_async::Value {
        match v {
            Value::String(s) => mysql_async::Value::from(s.clone()),
            Value::I64(i) => mysql_async::Value::from(*i),
            Value::F64(f) => mysql_async::Value::from(*f),
            Value::Bool(b) => mysql_async::Value::from(*b),
            Value::Bytes(b) => mysql_async::Value::Bytes(b.clone()),
            Value::Null => mysql_async::Value::NULL,
        }
    }

    fn from_mysql_value(v: mysql_async::Value) -> Value {
        use mysql_async::Value as V;
        match v {
            V::NULL => Value::Null,
            V::Bytes(bytes) => match String::from_utf8(bytes) {
                Ok(s) => Value::String(s),
                Err(e) => Value::Bytes(e.into_bytes()),
            },
            V::Int(i) => Value::I64(i),
            V::UInt(u) => Value::I64(u as i64),
            V::Float(f) => Value::F64(f64::from(f)),
            V::Double(d) => Value::F64(d),
            V::Date(y, mo, d, h, mi, s, us) => Value::String(format!(
                "{y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}.{us:06}"
            )),
            V::Time(neg, days, h, mi, s, us) => {
                let sign = if neg { "-" } else { "" };
                let hours = u32::from(h) + days * 24;
                Value::String(format!("{sign}{hours:02}:{mi:02}:{s:02}.{us:06}"))
            }
        }
    }

    fn from_mysql_row(row: mysql_async::Row) -> Row {
        let columns = row
            .columns_ref()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();
        let values = row.unwrap().into_iter().map(from_mysql_value).collect();
        Row { columns, values }
    }

    #[inline]
    #[allow(unused_variables)]
    fn obs_query(sql: &str, start: Instant, rows: usize, success: bool) {
        #[cfg(feature = "tracing")]
        {
            let elapsed_ms = start.elapsed().as_millis() as u64;
            tracing::debug!(sql, rows, elapsed_ms, success, "mysql query");
        }
    }

    /// A cloneable handle over one `mysql_async` connection. The inner slot
    /// empties on close/destroy; for pooled connections, dropping the inner
    /// `Conn` returns it to the mysql_async pool.
    #[derive(Clone)]
    pub struct MysqlConnection {
        inner: Arc<Mutex<Option<Conn>>>,
    }

    impl MysqlConnection {
        fn new(conn: Conn) -> Self {
            Self {
                inner: Arc::new(Mutex::new(Some(conn))),
            }
        }

        async fn control(&self, sql: &str) -> DbResult<()> {
            let mut guard = self.inner.lock().await;
            let conn = guard
                .as_mut()
                .ok_or_else(|| DbError::transaction("connection already closed"))?;
            conn.query_drop(sql).await.map_err(DbError::transaction)
        }
    }

    #[async_trait]
    impl Connection for MysqlConnection {
        async fn query(&self, sql: &str, params: &[Value]) -> DbResult<QueryOutcome> {
            let start = Instant::now();
            let mut guard = self.inner.lock().await;
            let conn = guard
                .as_mut()
                .ok_or_else(|| DbError::connection("connection already closed"))?;

            let params = if params.is_empty() {
                Params::Empty
            } else {
                Params::Positional(params.iter().map(to_mysql_value).collect())
            };
            let outcome = async {
                let mut result = conn.exec_iter(sql, params).await.map_err(DbError::query)?;
                let mysql_rows: Vec<mysql_async::Row> =
                    result.collect().await.map_err(DbError::query)?;
                let affected = result.affected_rows();
                let last_insert_id = result.last_insert_id();
                Ok(QueryOutcome {
                    rows: mysql_rows.into_iter().map(from_mysql_row).collect(),
                    affected_rows: affected,
                    // mysql_async reports no CLIENT_FOUND_ROWS split.
                    changed_rows: affected,
                    last_insert_id,
                })
            }
            .await;

            match &outcome {
                Ok(out) => obs_query(sql, start, out.rows.len(), true),
                Err(_) => obs_query(sql, start, 0, false),
            }
            outcome
        }

        async fn begin(&self) -> DbResult<()> {
            self.control("START TRANSACTION").await
        }

        async fn commit(&self) -> DbResult<()> {
            self.control("COMMIT").await
        }

        async fn rollback(&self) -> DbResult<()> {
            self.control("ROLLBACK").await
        }

        async fn close(&self) -> DbResult<()> {
            let conn = self.inner.lock().await.take();
            match conn {
                Some(conn) => conn.disconnect().await.map_err(DbError::connection),
                None => Ok(()),
            }
        }

        fn destroy(&self) {
            // Forced teardown: drop the connection without the goodbye packet.
            if let Ok(mut guard) = self.inner.try_lock() {
                guard.take();
            }
        }
    }

    /// A cloneable handle over a `mysql_async` pool.
    #[derive(Clone)]
    pub struct MysqlPool {
        pool: Pool,
    }

    fn map_acquire_err(e: mysql_async::Error) -> DbError {
        match &e {
            mysql_async::Error::Driver(mysql_async::DriverError::PoolDisconnected) => {
                DbError::pool_exhausted(e)
            }
            _ => DbError::connection(e),
        }
    }

    #[async_trait]
    impl ConnectionPool for MysqlPool {
        type Conn = MysqlConnection;

        async fn acquire(&self) -> DbResult<MysqlConnection> {
            let conn = self.pool.get_conn().await.map_err(map_acquire_err)?;
            Ok(MysqlConnection::new(conn))
        }

        async fn release(&self, conn: MysqlConnection) {
            // Dropping the inner Conn returns it to the mysql_async pool.
            conn.inner.lock().await.take();
        }

        async fn close(&self) -> DbResult<()> {
            self.pool
                .clone()
                .disconnect()
                .await
                .map_err(DbError::connection)
        }

        fn destroy(&self) {
            // mysql_async pools have no forced teardown beyond dropping the
            // handles; outstanding conns are severed when their tasks drop.
        }
    }

    /// Driver over `mysql_async`; options are [`mysql_async::Opts`].
    #[derive(Clone, Debug, Default)]
    pub struct MysqlDriver;

    #[async_trait]
    impl Driver for MysqlDriver {
        type Options = Opts;
        type Conn = MysqlConnection;
        type Pool = MysqlPool;

        async fn connect(&self, options: &Opts) -> DbResult<MysqlConnection> {
            let conn = Conn::new(options.clone())
                .await
                .map_err(DbError::connection)?;
            Ok(MysqlConnection::new(conn))
        }

        fn create_pool(&self, options: &Opts) -> MysqlPool {
            MysqlPool {
                pool: Pool::new(options.clone()),
            }
        }
    }

}

#[cfg(feature = "mysql-async")]
pub use backend::{MysqlConnection, MysqlDriver, MysqlPool};
