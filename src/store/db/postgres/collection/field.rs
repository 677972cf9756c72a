use sea_query::{ColumnDef, Iden, Index, PostgresQueryBuilder, SimpleExpr, Table};
use sqlx::{Error as DbError, Row, postgres::PgRow};

use crate::{
    Result,
    store::{data, db::postgres::DbRow},
};

use super::PgTable;

#[derive(Iden, Clone, Copy)]
#[iden = "field_definitions"]
pub enum FieldDefinitionIden {
    Table,

    Id,
    WorkspaceId,
    Slug,
    Name,
    FieldType,
}

impl PgTable for data::FieldDefinition {
    type Column = FieldDefinitionIden;

    const TABLE: FieldDefinitionIden = FieldDefinitionIden::Table;
    const ID: FieldDefinitionIden = FieldDefinitionIden::Id;

    fn columns() -> Vec<FieldDefinitionIden> {
        vec![FieldDefinitionIden::Id, FieldDefinitionIden::WorkspaceId, FieldDefinitionIden::Slug, FieldDefinitionIden::Name, FieldDefinitionIden::FieldType]
    }

    fn values(&self) -> Result<Vec<SimpleExpr>> {
        Ok(vec![
            self.id.clone().into(),
            self.workspace_id.clone().into(),
            self.slug.clone().into(),
            self.name.clone().into(),
            self.field_type.clone().into(),
        ])
    }

    fn ddl() -> Vec<String> {
        vec![
            Table::create()
                .table(FieldDefinitionIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(FieldDefinitionIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(FieldDefinitionIden::WorkspaceId).string().not_null())
                .col(ColumnDef::new(FieldDefinitionIden::Slug).string().not_null())
                .col(ColumnDef::new(FieldDefinitionIden::Name).string())
                .col(ColumnDef::new(FieldDefinitionIden::FieldType).string().not_null())
                .build(PostgresQueryBuilder),
            Index::create()
                .name("uq_field_definitions_workspace_slug")
                .if_not_exists()
                .unique()
                .table(FieldDefinitionIden::Table)
                .col(FieldDefinitionIden::WorkspaceId)
                .col(FieldDefinitionIden::Slug)
                .build(PostgresQueryBuilder),
        ]
    }
}

impl DbRow for data::FieldDefinition {
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
            slug: row.try_get("slug")?,
            name: row.try_get("name")?,
            field_type: row.try_get("field_type")?,
        })
    }
}

#[derive(Iden, Clone, Copy)]
#[iden = "field_values"]
pub enum FieldValueIden {
    Table,

    Id,
    ContactId,
    FieldId,
    Value,
    UpdateTime,
}

impl PgTable for data::FieldValue {
    type Column = FieldValueIden;

    const TABLE: FieldValueIden = FieldValueIden::Table;
    const ID: FieldValueIden = FieldValueIden::Id;

    fn columns() -> Vec<FieldValueIden> {
        vec![FieldValueIden::Id, FieldValueIden::ContactId, FieldValueIden::FieldId, FieldValueIden::Value, FieldValueIden::UpdateTime]
    }

    fn values(&self) -> Result<Vec<SimpleExpr>> {
        Ok(vec![
            self.id.clone().into(),
            self.contact_id.clone().into(),
            self.field_id.clone().into(),
            self.value.clone().into(),
            self.update_time.into(),
        ])
    }

    fn ddl() -> Vec<String> {
        vec![
            Table::create()
                .table(FieldValueIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(FieldValueIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(FieldValueIden::ContactId).string().not_null())
                .col(ColumnDef::new(FieldValueIden::FieldId).string().not_null())
                .col(ColumnDef::new(FieldValueIden::Value).text().not_null())
                .col(ColumnDef::new(FieldValueIden::UpdateTime).big_integer().default(0))
                .build(PostgresQueryBuilder),
        ]
    }
}

impl DbRow for data::FieldValue {
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
            field_id: row.try_get("field_id")?,
            value: row.try_get("value")?,
            update_time: row.try_get("update_time")?,
        })
    }
}
