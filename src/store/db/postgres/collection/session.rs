use sea_query::{ColumnDef, Iden, Index, PostgresQueryBuilder, SimpleExpr, Table};
use sqlx::{Error as DbError, Row, postgres::PgRow};

use crate::{
    Result,
    store::{data, db::postgres::DbRow},
};

use super::{PgTable, get_enum, get_json};

#[derive(Iden, Clone, Copy)]
#[iden = "sessions"]
pub enum SessionIden {
    Table,

    Id,
    WorkspaceId,
    ContactId,
    FlowId,
    ChannelId,
    ConversationId,
    Status,
    CurrentNodeId,
    Variables,
    CallStack,
    WaitingUntil,
    WaitingForInput,
    HumanTakeoverAt,
    StartTime,
    EndTime,
    UpdateTime,
}

impl PgTable for data::Session {
    type Column = SessionIden;

    const TABLE: SessionIden = SessionIden::Table;
    const ID: SessionIden = SessionIden::Id;

    fn columns() -> Vec<SessionIden> {
        vec![
            SessionIden::Id,
            SessionIden::WorkspaceId,
            SessionIden::ContactId,
            SessionIden::FlowId,
            SessionIden::ChannelId,
            SessionIden::ConversationId,
            SessionIden::Status,
            SessionIden::CurrentNodeId,
            SessionIden::Variables,
            SessionIden::CallStack,
            SessionIden::WaitingUntil,
            SessionIden::WaitingForInput,
            SessionIden::HumanTakeoverAt,
            SessionIden::StartTime,
            SessionIden::EndTime,
            SessionIden::UpdateTime,
        ]
    }

    fn values(&self) -> Result<Vec<SimpleExpr>> {
        Ok(vec![
            self.id.clone().into(),
            self.workspace_id.clone().into(),
            self.contact_id.clone().into(),
            self.flow_id.clone().into(),
            self.channel_id.clone().into(),
            self.conversation_id.clone().into(),
            self.status.as_ref().into(),
            self.current_node_id.clone().into(),
            serde_json::to_string(&self.variables)?.into(),
            serde_json::to_string(&self.call_stack)?.into(),
            self.waiting_until.into(),
            self.waiting_for_input.into(),
            self.human_takeover_at.into(),
            self.start_time.into(),
            self.end_time.into(),
            self.update_time.into(),
        ])
    }

    fn ddl() -> Vec<String> {
        vec![
            Table::create()
                .table(SessionIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(SessionIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(SessionIden::WorkspaceId).string().not_null())
                .col(ColumnDef::new(SessionIden::ContactId).string().not_null())
                .col(ColumnDef::new(SessionIden::FlowId).string().not_null())
                .col(ColumnDef::new(SessionIden::ChannelId).string().not_null())
                .col(ColumnDef::new(SessionIden::ConversationId).string().null())
                .col(ColumnDef::new(SessionIden::Status).string().not_null())
                .col(ColumnDef::new(SessionIden::CurrentNodeId).string().null())
                .col(ColumnDef::new(SessionIden::Variables).text().not_null())
                .col(ColumnDef::new(SessionIden::CallStack).text().not_null())
                .col(ColumnDef::new(SessionIden::WaitingUntil).big_integer().null())
                .col(ColumnDef::new(SessionIden::WaitingForInput).boolean().not_null().default(false))
                .col(ColumnDef::new(SessionIden::HumanTakeoverAt).big_integer().null())
                .col(ColumnDef::new(SessionIden::StartTime).big_integer().default(0))
                .col(ColumnDef::new(SessionIden::EndTime).big_integer().default(0))
                .col(ColumnDef::new(SessionIden::UpdateTime).big_integer().default(0))
                .build(PostgresQueryBuilder),
            Index::create()
                .name("idx_sessions_contact_channel")
                .if_not_exists()
                .table(SessionIden::Table)
                .col(SessionIden::ContactId)
                .col(SessionIden::ChannelId)
                .build(PostgresQueryBuilder),
            // at most one active session waiting for input per contact and channel
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_sessions_waiting ON sessions (contact_id, channel_id) WHERE status = 'active' AND waiting_for_input"
                .to_string(),
        ]
    }
}

impl DbRow for data::Session {
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
            flow_id: row.try_get("flow_id")?,
            channel_id: row.try_get("channel_id")?,
            conversation_id: row.try_get("conversation_id")?,
            status: get_enum(row, "status")?,
            current_node_id: row.try_get("current_node_id")?,
            variables: get_json(row, "variables")?,
            call_stack: get_json(row, "call_stack")?,
            waiting_until: row.try_get("waiting_until")?,
            waiting_for_input: row.try_get("waiting_for_input")?,
            human_takeover_at: row.try_get("human_takeover_at")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            update_time: row.try_get("update_time")?,
        })
    }
}
