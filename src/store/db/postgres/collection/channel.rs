use sea_query::{ColumnDef, Iden, PostgresQueryBuilder, SimpleExpr, Table};
use sqlx::{Error as DbError, Row, postgres::PgRow};

use crate::{
    Result,
    store::{data, db::postgres::DbRow},
};

use super::PgTable;

#[derive(Iden, Clone, Copy)]
#[iden = "channels"]
pub enum ChannelIden {
    Table,

    Id,
    WorkspaceId,
    Name,
    Platform,
    ExternalAccountId,
}

impl PgTable for data::Channel {
    type Column = ChannelIden;

    const TABLE: ChannelIden = ChannelIden::Table;
    const ID: ChannelIden = ChannelIden::Id;

    fn columns() -> Vec<ChannelIden> {
        vec![ChannelIden::Id, ChannelIden::WorkspaceId, ChannelIden::Name, ChannelIden::Platform, ChannelIden::ExternalAccountId]
    }

    fn values(&self) -> Result<Vec<SimpleExpr>> {
        Ok(vec![
            self.id.clone().into(),
            self.workspace_id.clone().into(),
            self.name.clone().into(),
            self.platform.clone().into(),
            self.external_account_id.clone().into(),
        ])
    }

    fn ddl() -> Vec<String> {
        vec![
            Table::create()
                .table(ChannelIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(ChannelIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(ChannelIden::WorkspaceId).string().not_null())
                .col(ColumnDef::new(ChannelIden::Name).string())
                .col(ColumnDef::new(ChannelIden::Platform).string().not_null())
                .col(ColumnDef::new(ChannelIden::ExternalAccountId).string().null())
                .build(PostgresQueryBuilder),
        ]
    }
}

impl DbRow for data::Channel {
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
            platform: row.try_get("platform")?,
            external_account_id: row.try_get("external_account_id")?,
        })
    }
}
