use sea_query::{ColumnDef, Iden, Index, PostgresQueryBuilder, SimpleExpr, Table};
use sqlx::{Error as DbError, Row, postgres::PgRow};

use crate::{
    Result,
    store::{data, db::postgres::DbRow},
};

use super::PgTable;

#[derive(Iden, Clone, Copy)]
#[iden = "tags"]
pub enum TagIden {
    Table,

    Id,
    WorkspaceId,
    Name,
    CreateTime,
}

impl PgTable for data::Tag {
    type Column = TagIden;

    const TABLE: TagIden = TagIden::Table;
    const ID: TagIden = TagIden::Id;

    fn columns() -> Vec<TagIden> {
        vec![TagIden::Id, TagIden::WorkspaceId, TagIden::Name, TagIden::CreateTime]
    }

    fn values(&self) -> Result<Vec<SimpleExpr>> {
        Ok(vec![self.id.clone().into(), self.workspace_id.clone().into(), self.name.clone().into(), self.create_time.into()])
    }

    fn ddl() -> Vec<String> {
        vec![
            Table::create()
                .table(TagIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(TagIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(TagIden::WorkspaceId).string().not_null())
                .col(ColumnDef::new(TagIden::Name).string().not_null())
                .col(ColumnDef::new(TagIden::CreateTime).big_integer().default(0))
                .build(PostgresQueryBuilder),
            Index::create()
                .name("uq_tags_workspace_name")
                .if_not_exists()
                .unique()
                .table(TagIden::Table)
                .col(TagIden::WorkspaceId)
                .col(TagIden::Name)
                .build(PostgresQueryBuilder),
        ]
    }
}

impl DbRow for data::Tag {
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
            create_time: row.try_get("create_time")?,
        })
    }
}

#[derive(Iden, Clone, Copy)]
#[iden = "contact_tags"]
pub enum ContactTagIden {
    Table,

    Id,
    ContactId,
    TagId,
    CreateTime,
}

impl PgTable for data::ContactTag {
    type Column = ContactTagIden;

    const TABLE: ContactTagIden = ContactTagIden::Table;
    const ID: ContactTagIden = ContactTagIden::Id;

    fn columns() -> Vec<ContactTagIden> {
        vec![ContactTagIden::Id, ContactTagIden::ContactId, ContactTagIden::TagId, ContactTagIden::CreateTime]
    }

    fn values(&self) -> Result<Vec<SimpleExpr>> {
        Ok(vec![self.id.clone().into(), self.contact_id.clone().into(), self.tag_id.clone().into(), self.create_time.into()])
    }

    fn ddl() -> Vec<String> {
        vec![
            Table::create()
                .table(ContactTagIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(ContactTagIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(ContactTagIden::ContactId).string().not_null())
                .col(ColumnDef::new(ContactTagIden::TagId).string().not_null())
                .col(ColumnDef::new(ContactTagIden::CreateTime).big_integer().default(0))
                .build(PostgresQueryBuilder),
            Index::create()
                .name("idx_contact_tags_contact")
                .if_not_exists()
                .table(ContactTagIden::Table)
                .col(ContactTagIden::ContactId)
                .build(PostgresQueryBuilder),
        ]
    }
}

impl DbRow for data::ContactTag {
    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized,
    {
        Ok(Self {
            id: row.try_get("id")?,
            contact_id: row.try_get("contact_id")?,
            tag_id: row.try_get("tag_id")?,
            create_time: row.try_get("create_time")?,
        })
    }
}
