use sea_query::{ColumnDef, Iden, Index, PostgresQueryBuilder, SimpleExpr, Table};
use sqlx::{Error as DbError, Row, postgres::PgRow};

use crate::{
    Result,
    store::{data, db::postgres::DbRow},
};

use super::PgTable;

#[derive(Iden, Clone, Copy)]
#[iden = "conversations"]
pub enum ConversationIden {
    Table,

    Id,
    WorkspaceId,
    ContactId,
    ChannelId,
    ExternalConversationId,
    AutomationPaused,
    UpdateTime,
}

impl PgTable for data::Conversation {
    type Column = ConversationIden;

    const TABLE: ConversationIden = ConversationIden::Table;
    const ID: ConversationIden = ConversationIden::Id;

    fn columns() -> Vec<ConversationIden> {
        vec![
            ConversationIden::Id,
            ConversationIden::WorkspaceId,
            ConversationIden::ContactId,
            ConversationIden::ChannelId,
            ConversationIden::ExternalConversationId,
            ConversationIden::AutomationPaused,
            ConversationIden::UpdateTime,
        ]
    }

    fn values(&self) -> Result<Vec<SimpleExpr>> {
        Ok(vec![
            self.id.clone().into(),
            self.workspace_id.clone().into(),
            self.contact_id.clone().into(),
            self.channel_id.clone().into(),
            self.external_conversation_id.clone().into(),
            self.automation_paused.into(),
            self.update_time.into(),
        ])
    }

    fn ddl() -> Vec<String> {
        vec![
            Table::create()
                .table(ConversationIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(ConversationIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(ConversationIden::WorkspaceId).string().not_null())
                .col(ColumnDef::new(ConversationIden::ContactId).string().not_null())
                .col(ColumnDef::new(ConversationIden::ChannelId).string().not_null())
                .col(ColumnDef::new(ConversationIden::ExternalConversationId).string().null())
                .col(ColumnDef::new(ConversationIden::AutomationPaused).boolean().not_null().default(false))
                .col(ColumnDef::new(ConversationIden::UpdateTime).big_integer().default(0))
                .build(PostgresQueryBuilder),
            Index::create()
                .name("idx_conversations_contact_channel")
                .if_not_exists()
                .table(ConversationIden::Table)
                .col(ConversationIden::ContactId)
                .col(ConversationIden::ChannelId)
                .build(PostgresQueryBuilder),
        ]
    }
}

impl DbRow for data::Conversation {
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
            contact_id: row.try_get("contact_id")?,
            channel_id: row.try_get("channel_id")?,
            external_conversation_id: row.try_get("external_conversation_id")?,
            automation_paused: row.try_get("automation_paused")?,
            update_time: row.try_get("update_time")?,
        })
    }
}
