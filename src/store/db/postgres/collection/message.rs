use sea_query::{ColumnDef, Iden, Index, PostgresQueryBuilder, SimpleExpr, Table};
use sqlx::{Error as DbError, Row, postgres::PgRow};

use crate::{
    Result,
    store::{data, db::postgres::DbRow},
};

use super::{PgTable, get_enum};

#[derive(Iden, Clone, Copy)]
#[iden = "messages"]
pub enum MessageIden {
    Table,

    Id,
    WorkspaceId,
    ConversationId,
    ContactId,
    Direction,
    Text,
    Status,
    ExternalId,
    Err,
    CreateTime,
}

impl PgTable for data::Message {
    type Column = MessageIden;

    const TABLE: MessageIden = MessageIden::Table;
    const ID: MessageIden = MessageIden::Id;

    fn columns() -> Vec<MessageIden> {
        vec![
            MessageIden::Id,
            MessageIden::WorkspaceId,
            MessageIden::ConversationId,
            MessageIden::ContactId,
            MessageIden::Direction,
            MessageIden::Text,
            MessageIden::Status,
            MessageIden::ExternalId,
            MessageIden::Err,
            MessageIden::CreateTime,
        ]
    }

    fn values(&self) -> Result<Vec<SimpleExpr>> {
        Ok(vec![
            self.id.clone().into(),
            self.workspace_id.clone().into(),
            self.conversation_id.clone().into(),
            self.contact_id.clone().into(),
            self.direction.as_ref().into(),
            self.text.clone().into(),
            self.status.as_ref().into(),
            self.external_id.clone().into(),
            self.err.clone().into(),
            self.create_time.into(),
        ])
    }

    fn ddl() -> Vec<String> {
        vec![
            Table::create()
                .table(MessageIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(MessageIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(MessageIden::WorkspaceId).string().not_null())
                .col(ColumnDef::new(MessageIden::ConversationId).string().null())
                .col(ColumnDef::new(MessageIden::ContactId).string().not_null())
                .col(ColumnDef::new(MessageIden::Direction).string().not_null())
                .col(ColumnDef::new(MessageIden::Text).text().null())
                .col(ColumnDef::new(MessageIden::Status).string().not_null())
                .col(ColumnDef::new(MessageIden::ExternalId).string().null())
                .col(ColumnDef::new(MessageIden::Err).text().null())
                .col(ColumnDef::new(MessageIden::CreateTime).big_integer().default(0))
                .build(PostgresQueryBuilder),
            Index::create()
                .name("idx_messages_conversation_time")
                .if_not_exists()
                .table(MessageIden::Table)
                .col(MessageIden::ConversationId)
                .col(MessageIden::CreateTime)
                .build(PostgresQueryBuilder),
        ]
    }
}

impl DbRow for data::Message {
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
            conversation_id: row.try_get("conversation_id")?,
            contact_id: row.try_get("contact_id")?,
            direction: get_enum(row, "direction")?,
            text: row.try_get("text")?,
            status: get_enum(row, "status")?,
            external_id: row.try_get("external_id")?,
            err: row.try_get("err")?,
            create_time: row.try_get("create_time")?,
        })
    }
}
