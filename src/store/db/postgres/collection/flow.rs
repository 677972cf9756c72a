use sea_query::{ColumnDef, Iden, Index, PostgresQueryBuilder, SimpleExpr, Table};
use sqlx::{Error as DbError, Row, postgres::PgRow};

use crate::{
    Result,
    store::{data, db::postgres::DbRow},
};

use super::{PgTable, get_enum};

#[derive(Iden, Clone, Copy)]
#[iden = "flows"]
pub enum FlowIden {
    Table,

    Id,
    WorkspaceId,
    Name,
    Version,
    Status,
    Data,
    CreateTime,
    UpdateTime,
}

impl PgTable for data::Flow {
    type Column = FlowIden;

    const TABLE: FlowIden = FlowIden::Table;
    const ID: FlowIden = FlowIden::Id;

    fn columns() -> Vec<FlowIden> {
        vec![
            FlowIden::Id,
            FlowIden::WorkspaceId,
            FlowIden::Name,
            FlowIden::Version,
            FlowIden::Status,
            FlowIden::Data,
            FlowIden::CreateTime,
            FlowIden::UpdateTime,
        ]
    }

    fn values(&self) -> Result<Vec<SimpleExpr>> {
        Ok(vec![
            self.id.clone().into(),
            self.workspace_id.clone().into(),
            self.name.clone().into(),
            self.version.into(),
            self.status.as_ref().into(),
            self.data.clone().into(),
            self.create_time.into(),
            self.update_time.into(),
        ])
    }

    fn ddl() -> Vec<String> {
        vec![
            Table::create()
                .table(FlowIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(FlowIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(FlowIden::WorkspaceId).string().not_null())
                .col(ColumnDef::new(FlowIden::Name).string())
                .col(ColumnDef::new(FlowIden::Version).big_integer().default(1))
                .col(ColumnDef::new(FlowIden::Status).string().not_null())
                .col(ColumnDef::new(FlowIden::Data).text().not_null())
                .col(ColumnDef::new(FlowIden::CreateTime).big_integer().default(0))
                .col(ColumnDef::new(FlowIden::UpdateTime).big_integer().default(0))
                .build(PostgresQueryBuilder),
            Index::create().name("idx_flows_workspace").if_not_exists().table(FlowIden::Table).col(FlowIden::WorkspaceId).build(PostgresQueryBuilder),
        ]
    }
}

impl DbRow for data::Flow {
    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized,
    {
        Ok(Self {
            id: row.try_get("id")?,
            workspace_id: row.try_get("workspace_id")?,
            name: row.try_get("name")?,
            version: row.try_get("version")?,
            status: get_enum(row, "status")?,
            data: row.try_get("data")?,
            create_time: row.try_get("create_time")?,
            update_time: row.try_get("update_time")?,
        })
    }
}
