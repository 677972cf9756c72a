use sea_query::{ColumnDef, Iden, Index, PostgresQueryBuilder, SimpleExpr, Table};
use sqlx::{Error as DbError, Row, postgres::PgRow};

use crate::{
    Result,
    store::{data, db::postgres::DbRow},
};

use super::{PgTable, get_enum, get_json};

#[derive(Iden, Clone, Copy)]
#[iden = "jobs"]
pub enum JobIden {
    Table,

    Id,
    JobType,
    SessionId,
    Payload,
    RunAt,
    Status,
    Attempts,
    Err,
    CreateTime,
    UpdateTime,
}

impl PgTable for data::Job {
    type Column = JobIden;

    const TABLE: JobIden = JobIden::Table;
    const ID: JobIden = JobIden::Id;

    fn columns() -> Vec<JobIden> {
        vec![
            JobIden::Id,
            JobIden::JobType,
            JobIden::SessionId,
            JobIden::Payload,
            JobIden::RunAt,
            JobIden::Status,
            JobIden::Attempts,
            JobIden::Err,
            JobIden::CreateTime,
            JobIden::UpdateTime,
        ]
    }

    fn values(&self) -> Result<Vec<SimpleExpr>> {
        Ok(vec![
            self.id.clone().into(),
            self.job_type.clone().into(),
            self.session_id.clone().into(),
            serde_json::to_string(&self.payload)?.into(),
            self.run_at.into(),
            self.status.as_ref().into(),
            self.attempts.into(),
            self.err.clone().into(),
            self.create_time.into(),
            self.update_time.into(),
        ])
    }

    fn ddl() -> Vec<String> {
        vec![
            Table::create()
                .table(JobIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(JobIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(JobIden::JobType).string().not_null())
                .col(ColumnDef::new(JobIden::SessionId).string().not_null())
                .col(ColumnDef::new(JobIden::Payload).text().not_null())
                .col(ColumnDef::new(JobIden::RunAt).big_integer().not_null())
                .col(ColumnDef::new(JobIden::Status).string().not_null())
                .col(ColumnDef::new(JobIden::Attempts).big_integer().default(0))
                .col(ColumnDef::new(JobIden::Err).text().null())
                .col(ColumnDef::new(JobIden::CreateTime).big_integer().default(0))
                .col(ColumnDef::new(JobIden::UpdateTime).big_integer().default(0))
                .build(PostgresQueryBuilder),
            Index::create().name("idx_jobs_status_run_at").if_not_exists().table(JobIden::Table).col(JobIden::Status).col(JobIden::RunAt).build(PostgresQueryBuilder),
            Index::create().name("idx_jobs_session").if_not_exists().table(JobIden::Table).col(JobIden::SessionId).build(PostgresQueryBuilder),
        ]
    }
}

impl DbRow for data::Job {
    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized,
    {
        Ok(Self {
            id: row.try_get("id")?,
            job_type: row.try_get("job_type")?,
            session_id: row.try_get("session_id")?,
            payload: get_json(row, "payload")?,
            run_at: row.try_get("run_at")?,
            status: get_enum(row, "status")?,
            attempts: row.try_get("attempts")?,
            err: row.try_get("err")?,
            create_time: row.try_get("create_time")?,
            update_time: row.try_get("update_time")?,
        })
    }
}
