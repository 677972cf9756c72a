use std::{future::Future, time::Duration};

use sqlx::{
    Database, Error, IntoArguments, PgPool, Postgres,
    postgres::{PgPoolOptions, PgRow},
};
use tokio::{runtime::Handle, task::block_in_place};

/// Blocking facade over a postgres pool, driven on the engine's runtime.
#[derive(Debug, Clone)]
pub struct SynClient {
    pool: PgPool,

    handle: Handle,
}

impl SynClient {
    pub fn connect(
        db_url: &str,
        handle: Handle,
    ) -> Result<Self, Error> {
        let connect = PgPoolOptions::new().acquire_timeout(Duration::from_secs(5)).max_connections(200).connect(db_url);
        let pool = Self::block(&handle, connect)?;

        Ok(Self {
            pool,
            handle,
        })
    }

    fn block<F: Future>(
        handle: &Handle,
        fut: F,
    ) -> F::Output {
        // inside a runtime worker the thread has to be handed over first
        if Handle::try_current().is_ok() {
            block_in_place(|| handle.block_on(fut))
        } else {
            handle.block_on(fut)
        }
    }

    pub fn query_one<'q, A>(
        &self,
        sql: &'q str,
        params: A,
    ) -> Result<PgRow, Error>
    where
        A: IntoArguments<'q, Postgres> + 'q,
    {
        Self::block(&self.handle, async move {
            let mut conn = self.pool.acquire().await?;

            sqlx::query_with(sql, params).fetch_one(&mut *conn).await
        })
    }

    pub fn query_optional<'q, A>(
        &self,
        sql: &'q str,
        params: A,
    ) -> Result<Option<PgRow>, Error>
    where
        A: IntoArguments<'q, Postgres> + 'q,
    {
        Self::block(&self.handle, async move {
            let mut conn = self.pool.acquire().await?;

            sqlx::query_with(sql, params).fetch_optional(&mut *conn).await
        })
    }

    pub fn query<'q, A>(
        &self,
        sql: &'q str,
        params: A,
    ) -> Result<Vec<PgRow>, Error>
    where
        A: IntoArguments<'q, Postgres> + 'q,
    {
        Self::block(&self.handle, async move {
            let mut conn = self.pool.acquire().await?;

            sqlx::query_with(sql, params).fetch_all(&mut *conn).await
        })
    }

    pub fn execute<'q, A>(
        &self,
        sql: &'q str,
        params: A,
    ) -> Result<<Postgres as Database>::QueryResult, Error>
    where
        A: IntoArguments<'q, Postgres> + 'q,
    {
        Self::block(&self.handle, async move {
            let mut conn = self.pool.acquire().await?;

            sqlx::query_with(sql, params).execute(&mut *conn).await
        })
    }

    pub fn batch_execute(
        &self,
        sqls: &[String],
    ) -> Result<(), Error> {
        Self::block(&self.handle, async move {
            let mut tx = self.pool.begin().await?;

            for sql in sqls {
                sqlx::query(sql).execute(&mut *tx).await?;
            }
            tx.commit().await
        })
    }
}
