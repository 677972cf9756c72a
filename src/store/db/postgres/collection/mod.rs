mod analytics;
mod channel;
mod contact;
mod conversation;
mod field;
mod flow;
mod job;
mod message;
mod session;
mod tag;

use std::{marker::PhantomData, str::FromStr, sync::Arc};

use sea_query::{
    Alias as SeaAlias, Condition, Expr as SeaExpr, Func as SeaFunc, Iden, OnConflict, Order as SeaOrder, PostgresQueryBuilder, Query as SeaQuery,
    SimpleExpr, Value as SeaValue,
};
use sea_query_binder::SqlxBinder;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use sqlx::{Error as DbError, Row, postgres::PgRow};
use tracing::trace;

use crate::{
    Result,
    store::{DbCollection, PageData, map_db_err, query},
};

use super::{DbInit, DbRow, synclient::SynClient};

pub type DbConnection = Arc<SynClient>;

/// Mapping of a record type onto one postgres table.
pub trait PgTable: DbRow + Clone + Send + Sync + 'static {
    type Column: Iden + Copy + Send + Sync + 'static;

    const TABLE: Self::Column;
    const ID: Self::Column;

    /// Every column, id first.
    fn columns() -> Vec<Self::Column>;

    /// Column values in the order of [`PgTable::columns`].
    fn values(&self) -> Result<Vec<SimpleExpr>>;

    /// Statements creating the table and its indices.
    fn ddl() -> Vec<String>;
}

/// Generic collection over a [`PgTable`].
#[derive(Debug)]
pub struct PgCollection<T> {
    conn: DbConnection,
    _marker: PhantomData<T>,
}

impl<T: PgTable> PgCollection<T> {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
            _marker: PhantomData,
        }
    }

    fn data_columns() -> Vec<T::Column> {
        T::columns().into_iter().skip(1).collect()
    }
}

impl<T: PgTable> DbInit for PgCollection<T> {
    fn init(&self) -> Result<()> {
        self.conn.batch_execute(&T::ddl()).map_err(map_db_err)
    }
}

impl<T: PgTable> DbCollection for PgCollection<T> {
    type Item = T;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        let (sql, values) = SeaQuery::select()
            .from(T::TABLE)
            .expr(SeaFunc::count(SeaExpr::col(T::ID)))
            .and_where(SeaExpr::col(T::ID).eq(id))
            .build_sqlx(PostgresQueryBuilder);

        let count = self.conn.query_one(sql.as_str(), values).map(|row| row.get::<i64, usize>(0)).map_err(map_db_err)?;

        Ok(count > 0)
    }

    fn find(
        &self,
        id: &str,
    ) -> Result<Option<Self::Item>> {
        let (sql, values) = SeaQuery::select().from(T::TABLE).columns(T::columns()).and_where(SeaExpr::col(T::ID).eq(id)).build_sqlx(PostgresQueryBuilder);
        match self.conn.query_optional(&sql, values).map_err(map_db_err)? {
            Some(row) => T::from_row(&row).map(Some).map_err(map_db_err),
            None => Ok(None),
        }
    }

    fn query(
        &self,
        q: &query::Query,
    ) -> Result<PageData<Self::Item>> {
        let filter = into_query(q);

        let mut count_query = SeaQuery::select();
        count_query.from(T::TABLE).expr(SeaFunc::count(SeaExpr::col(T::ID)));

        let mut query = SeaQuery::select();
        query.columns(T::columns()).from(T::TABLE);

        if !filter.is_empty() {
            count_query.cond_where(filter.clone());
            query.cond_where(filter);
        }

        for (order, rev) in q.order_by().iter() {
            query.order_by(
                SeaAlias::new(order.as_str()),
                if *rev {
                    SeaOrder::Desc
                } else {
                    SeaOrder::Asc
                },
            );
        }
        let (sql, values) = query.limit(q.limit() as u64).offset(q.offset() as u64).build_sqlx(PostgresQueryBuilder);
        trace!("pg::query({})", sql);

        let (count_sql, count_values) = count_query.build_sqlx(PostgresQueryBuilder);
        let count = self.conn.query_one(count_sql.as_str(), count_values).map_err(map_db_err)?.get::<i64, usize>(0) as usize;
        let rows = self.conn.query(&sql, values).map_err(map_db_err)?.iter().map(T::from_row).collect::<std::result::Result<Vec<_>, _>>().map_err(map_db_err)?;

        Ok(PageData {
            count,
            page_size: q.limit(),
            page_num: q.offset() / q.limit() + 1,
            page_count: count.div_ceil(q.limit()),
            rows,
        })
    }

    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        let (sql, sql_values) =
            SeaQuery::insert().into_table(T::TABLE).columns(T::columns()).values(data.values()?).map_err(map_db_err)?.build_sqlx(PostgresQueryBuilder);

        // any unique violation reports as "not created"
        let sql = format!("{} ON CONFLICT DO NOTHING", sql);
        let result = self.conn.execute(sql.as_str(), sql_values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        let values = data.values()?.into_iter().skip(1);
        let (sql, sql_values) = SeaQuery::update()
            .table(T::TABLE)
            .values(Self::data_columns().into_iter().zip(values))
            .and_where(SeaExpr::col(T::ID).eq(data.id()))
            .build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), sql_values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    fn upsert(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        let (sql, sql_values) = SeaQuery::insert()
            .into_table(T::TABLE)
            .columns(T::columns())
            .values(data.values()?)
            .map_err(map_db_err)?
            .on_conflict(OnConflict::column(T::ID).update_columns(Self::data_columns()).to_owned())
            .build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), sql_values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        let (sql, values) = SeaQuery::delete().from_table(T::TABLE).and_where(SeaExpr::col(T::ID).eq(id)).build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

fn into_sea_value(v: &JsonValue) -> Option<SeaValue> {
    match v {
        JsonValue::Bool(b) => Some((*b).into()),
        JsonValue::Number(n) => n.as_i64().map(SeaValue::from).or_else(|| n.as_f64().map(SeaValue::from)),
        JsonValue::String(s) => Some(s.clone().into()),
        _ => None,
    }
}

/// Translate a backend independent [`query::Query`] into a where clause.
pub fn into_query(q: &query::Query) -> Condition {
    let mut cond = Condition::all();
    for c in q.conds() {
        let col = SeaExpr::col(SeaAlias::new(c.key.as_str()));
        let expr = match (c.op, into_sea_value(&c.value)) {
            (query::Op::Eq, None) => col.is_null(),
            (query::Op::Ne, None) => col.is_not_null(),
            (_, None) => SeaExpr::cust("FALSE"),
            (query::Op::Eq, Some(v)) => col.eq(v),
            (query::Op::Ne, Some(v)) => col.ne(v),
            (query::Op::Lt, Some(v)) => col.lt(v),
            (query::Op::Le, Some(v)) => col.lte(v),
            (query::Op::Gt, Some(v)) => col.gt(v),
            (query::Op::Ge, Some(v)) => col.gte(v),
        };
        cond = cond.add(expr);
    }
    cond
}

/// Read a text column holding a strum-serialized enum.
fn get_enum<E>(
    row: &PgRow,
    col: &str,
) -> std::result::Result<E, DbError>
where
    E: FromStr,
    E::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.try_get(col)?;
    text.parse().map_err(|err| DbError::Decode(Box::new(err)))
}

/// Read a text column holding JSON.
fn get_json<T: DeserializeOwned>(
    row: &PgRow,
    col: &str,
) -> std::result::Result<T, DbError> {
    let text: String = row.try_get(col)?;
    serde_json::from_str(&text).map_err(|err| DbError::Decode(Box::new(err)))
}

/// Read a nullable text column holding JSON.
fn get_json_opt<T: DeserializeOwned>(
    row: &PgRow,
    col: &str,
) -> std::result::Result<Option<T>, DbError> {
    let text: Option<String> = row.try_get(col)?;
    text.map(|t| serde_json::from_str(&t)).transpose().map_err(|err| DbError::Decode(Box::new(err)))
}
