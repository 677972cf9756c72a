use sea_query::{ColumnDef, Iden, Index, PostgresQueryBuilder, SimpleExpr, Table};
use sqlx::{Error as DbError, Row, postgres::PgRow};

use crate::{
    Result,
    store::{data, db::postgres::DbRow},
};

use super::{PgTable, get_enum, get_json_opt};

#[derive(Iden, Clone, Copy)]
#[iden = "analytics"]
pub enum AnalyticsIden {
    Table,

    Id,
    WorkspaceId,
    FlowId,
    ContactId,
    EventType,
    Metadata,
    CreateTime,
}

impl PgTable for data::AnalyticsEvent {
    type Column = AnalyticsIden;

    const TABLE: AnalyticsIden = AnalyticsIden::Table;
    const ID: AnalyticsIden = AnalyticsIden::Id;

    fn columns() -> Vec<AnalyticsIden> {
        vec![
            AnalyticsIden::Id,
            AnalyticsIden::WorkspaceId,
            AnalyticsIden::FlowId,
            AnalyticsIden::ContactId,
            AnalyticsIden::EventType,
            AnalyticsIden::Metadata,
            AnalyticsIden::CreateTime,
        ]
    }

    fn values(&self) -> Result<Vec<SimpleExpr>> {
        let metadata = self.metadata.as_ref().map(serde_json::to_string).transpose()?;
        Ok(vec![
            self.id.clone().into(),
            self.workspace_id.clone().into(),
            self.flow_id.clone().into(),
            self.contact_id.clone().into(),
            self.event_type.as_ref().into(),
            metadata.into(),
            self.create_time.into(),
        ])
    }

    fn ddl() -> Vec<String> {
        vec![
            Table::create()
                .table(AnalyticsIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(AnalyticsIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(AnalyticsIden::WorkspaceId).string().not_null())
                .col(ColumnDef::new(AnalyticsIden::FlowId).string().null())
                .col(ColumnDef::new(AnalyticsIden::ContactId).string().null())
                .col(ColumnDef::new(AnalyticsIden::EventType).string().not_null())
                .col(ColumnDef::new(AnalyticsIden::Metadata).text().null())
                .col(ColumnDef::new(AnalyticsIden::CreateTime).big_integer().default(0))
                .build(PostgresQueryBuilder),
            Index::create()
                .name("idx_analytics_flow_type")
                .if_not_exists()
                .table(AnalyticsIden::Table)
                .col(AnalyticsIden::FlowId)
                .col(AnalyticsIden::EventType)
                .build(PostgresQueryBuilder),
        ]
    }
}

impl DbRow for data::AnalyticsEvent {
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
            flow_id: row.try_get("flow_id")?,
            contact_id: row.try_get("contact_id")?,
            event_type: get_enum(row, "event_type")?,
            metadata: get_json_opt(row, "metadata")?,
            create_time: row.try_get("create_time")?,
        })
    }
}
