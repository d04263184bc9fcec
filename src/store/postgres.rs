use async_trait::async_trait;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use tokio::runtime::{Handle, RuntimeFlavor};
use uuid::Uuid;

use super::{Change, ChangeOp, RowPage, Store, StoreSession};
use crate::{DatabaseConfig, EntityRegistry, PagingModel, SortDirection, StoreError, StoreResult};

/// PostgreSQL store. Each entity kind lives in its own table with an
/// `id UUID` primary key and a `body JSONB` column.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the table backing `kind` if it does not exist yet.
    pub async fn ensure_table(&self, kind: &str) -> StoreResult<()> {
        let table = table_ident(kind)?;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (id UUID PRIMARY KEY, body JSONB NOT NULL)"
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Creates a table for every registered kind.
    pub async fn ensure_tables(&self, registry: &EntityRegistry) -> StoreResult<()> {
        for kind in registry.kinds() {
            self.ensure_table(kind).await?;
        }
        Ok(())
    }

    pub async fn drop_table(&self, kind: &str) -> StoreResult<()> {
        let table = table_ident(kind)?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

impl Store for PgStore {
    type Session = PgSession;

    fn open_session(&self) -> PgSession {
        PgSession {
            pool: self.pool.clone(),
            conn: None,
            closed: false,
        }
    }
}

/// Session holding at most one pooled connection, acquired on first use
/// and returned to the pool on close.
pub struct PgSession {
    pool: PgPool,
    conn: Option<PoolConnection<Postgres>>,
    closed: bool,
}

impl PgSession {
    async fn connection(&mut self) -> StoreResult<&mut PoolConnection<Postgres>> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        if self.conn.is_none() {
            self.conn = Some(self.pool.acquire().await?);
        }
        self.conn.as_mut().ok_or(StoreError::Closed)
    }
}

fn table_ident(kind: &str) -> StoreResult<String> {
    let valid = !kind.is_empty() && kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(format!("\"{kind}\""))
    } else {
        Err(StoreError::Runtime(format!("invalid table name `{kind}`")))
    }
}

fn map_write_error(err: sqlx::Error, change: &Change) -> StoreError {
    let unique = err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if unique {
        StoreError::Conflict {
            kind: change.kind,
            id: change.id,
        }
    } else {
        StoreError::Database(err)
    }
}

#[async_trait]
impl StoreSession for PgSession {
    fn apply(&mut self, changes: &[Change]) -> StoreResult<u64> {
        let handle = Handle::try_current().map_err(|e| StoreError::Runtime(e.to_string()))?;
        if handle.runtime_flavor() == RuntimeFlavor::CurrentThread {
            return Err(StoreError::Runtime(
                "blocking save requires a multi-thread runtime".to_string(),
            ));
        }
        tokio::task::block_in_place(|| handle.block_on(self.apply_async(changes)))
    }

    async fn apply_async(&mut self, changes: &[Change]) -> StoreResult<u64> {
        let conn = self.connection().await?;
        let mut tx = sqlx::Connection::begin(&mut **conn).await?;

        let mut affected = 0;
        for change in changes {
            let table = table_ident(change.kind)?;
            let result = match &change.op {
                ChangeOp::Insert(body) => {
                    sqlx::query(&format!("INSERT INTO {table} (id, body) VALUES ($1, $2)"))
                        .bind(change.id)
                        .bind(Json(body))
                        .execute(&mut *tx)
                        .await
                }
                ChangeOp::Update(body) => {
                    sqlx::query(&format!("UPDATE {table} SET body = $2 WHERE id = $1"))
                        .bind(change.id)
                        .bind(Json(body))
                        .execute(&mut *tx)
                        .await
                }
                ChangeOp::Delete => {
                    sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
                        .bind(change.id)
                        .execute(&mut *tx)
                        .await
                }
            }
            .map_err(|e| map_write_error(e, change))?;

            if result.rows_affected() == 0 {
                // dropping `tx` rolls the whole change-set back
                return Err(StoreError::NotFound {
                    kind: change.kind,
                    id: change.id,
                });
            }
            affected += result.rows_affected();
        }

        tx.commit().await?;
        Ok(affected)
    }

    async fn fetch(&mut self, kind: &'static str, id: Uuid) -> StoreResult<Option<Value>> {
        let table = table_ident(kind)?;
        let conn = self.connection().await?;
        let body: Option<Json<Value>> =
            sqlx::query_scalar(&format!("SELECT body FROM {table} WHERE id = $1"))
                .bind(id)
                .fetch_optional(&mut **conn)
                .await?;
        Ok(body.map(|b| b.0))
    }

    async fn page(&mut self, kind: &'static str, paging: &PagingModel) -> StoreResult<RowPage> {
        let table = table_ident(kind)?;
        let paging = paging.normalized();
        let conn = self.connection().await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&mut **conn)
            .await?;

        let limit = i64::from(paging.size);
        let offset = paging.offset() as i64;
        let rows: Vec<Json<Value>> = match paging.sort.as_deref() {
            Some(field) => {
                let direction = match paging.order {
                    Some(SortDirection::Descending) => "DESC",
                    _ => "ASC",
                };
                sqlx::query_scalar(&format!(
                    "SELECT body FROM {table} ORDER BY body -> $1 {direction}, id LIMIT $2 OFFSET $3"
                ))
                .bind(field)
                .bind(limit)
                .bind(offset)
                .fetch_all(&mut **conn)
                .await?
            }
            None => {
                sqlx::query_scalar(&format!(
                    "SELECT body FROM {table} ORDER BY id LIMIT $1 OFFSET $2"
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&mut **conn)
                .await?
            }
        };

        Ok(RowPage {
            rows: rows.into_iter().map(|b| b.0).collect(),
            total: total.max(0) as u64,
        })
    }

    fn close(&mut self) {
        self.closed = true;
        // dropping the connection hands it back to the pool
        self.conn.take();
    }
}
