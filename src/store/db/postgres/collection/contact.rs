use sea_query::{ColumnDef, Iden, PostgresQueryBuilder, SimpleExpr, Table};
use sqlx::{Error as DbError, Row, postgres::PgRow};

use crate::{
    Result,
    store::{data, db::postgres::DbRow},
};

use super::PgTable;

#[derive(Iden, Clone, Copy)]
#[iden = "contacts"]
pub enum ContactIden {
    Table,

    Id,
    WorkspaceId,
    Name,
    IsSubscribed,
    CreateTime,
    UpdateTime,
}

impl PgTable for data::Contact {
    type Column = ContactIden;

    const TABLE: ContactIden = ContactIden::Table;
    const ID: ContactIden = ContactIden::Id;

    fn columns() -> Vec<ContactIden> {
        vec![ContactIden::Id, ContactIden::WorkspaceId, ContactIden::Name, ContactIden::IsSubscribed, ContactIden::CreateTime, ContactIden::UpdateTime]
    }

    fn values(&self) -> Result<Vec<SimpleExpr>> {
        Ok(vec![
            self.id.clone().into(),
            self.workspace_id.clone().into(),
            self.name.clone().into(),
            self.is_subscribed.into(),
            self.create_time.into(),
            self.update_time.into(),
        ])
    }

    fn ddl() -> Vec<String> {
        vec![
            Table::create()
                .table(ContactIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(ContactIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(ContactIden::WorkspaceId).string().not_null())
                .col(ColumnDef::new(ContactIden::Name).string())
                .col(ColumnDef::new(ContactIden::IsSubscribed).boolean().not_null().default(false))
                .col(ColumnDef::new(ContactIden::CreateTime).big_integer().default(0))
                .col(ColumnDef::new(ContactIden::UpdateTime).big_integer().default(0))
                .build(PostgresQueryBuilder),
        ]
    }
}

impl DbRow for data::Contact {
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
            is_subscribed: row.try_get("is_subscribed")?,
            create_time: row.try_get("create_time")?,
            update_time: row.try_get("update_time")?,
        })
    }
}
