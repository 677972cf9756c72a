use std::sync::Arc;

use async_trait::async_trait;
use chatflow::{
    ChannelEvent, ChannelOptions, Config, EngineBuilder, FlowModel, Inbound, MessagingGateway, Result, Trigger, Vars,
    store::data::{Channel, Contact, Conversation},
};
use serde_json::Value;
use tokio::sync::Notify;

/// Prints deliveries instead of sending them.
struct ConsoleGateway;

#[async_trait]
impl MessagingGateway for ConsoleGateway {
    async fn send_message(
        &self,
        account_id: &str,
        conversation_id: &str,
        text: &str,
        attachments: Option<&Value>,
    ) -> Result<String> {
        println!("[{} -> {}] {}", account_id, conversation_id, text);
        if let Some(attachments) = attachments {
            println!("    attachments: {}", attachments);
        }
        Ok(message_id())
    }

    async fn reply_to_post(
        &self,
        post_id: &str,
        _account_id: &str,
        text: &str,
        comment_id: &str,
    ) -> Result<()> {
        println!("[post {} / comment {}] {}", post_id, comment_id, text);
        Ok(())
    }

    async fn send_private_reply(
        &self,
        _post_id: &str,
        comment_id: &str,
        _account_id: &str,
        text: &str,
    ) -> Result<()> {
        println!("[private reply to {}] {}", comment_id, text);
        Ok(())
    }
}

fn message_id() -> String {
    format!("msg-{}", chrono::Utc::now().timestamp_micros())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("chatflow=info").init();

    let config = Config::load_from_str(
        r#"
        [engine]
        message_pacing_ms = 300

        [scheduler]
        poll_interval_ms = 200
        "#,
    )?;
    let engine = EngineBuilder::new().config(config).gateway(Arc::new(ConsoleGateway)).build()?;

    let store = engine.store();
    store.channels().create(&Channel {
        id: "sms-line".into(),
        workspace_id: "demo".into(),
        name: "SMS".into(),
        platform: "sms".into(),
        external_account_id: Some("+15550100".into()),
    })?;
    store.contacts().create(&Contact {
        id: "ada".into(),
        workspace_id: "demo".into(),
        name: "Ada".into(),
        ..Default::default()
    })?;
    store.conversations().create(&Conversation {
        id: "ada-sms".into(),
        workspace_id: "demo".into(),
        contact_id: "ada".into(),
        channel_id: "sms-line".into(),
        external_conversation_id: Some("+15550199".into()),
        ..Default::default()
    })?;

    engine.launch();

    let flow = FlowModel::from_json(include_str!("./flow.json"))?;
    engine.deploy(&flow)?;
    engine.publish(&flow.id)?;

    let done = Arc::new(Notify::new());
    let notify = done.clone();
    ChannelEvent::channel(engine.channel(), ChannelOptions::with_flow(flow.id.clone()))?.on_paused(|e| {
        println!("session {} paused: {:?}", e.session_id, e.event);
    });
    ChannelEvent::channel(engine.channel(), ChannelOptions::with_flow(flow.id.clone()))?.on_complete(move |e| {
        println!("session {} completed", e.session_id);
        notify.notify_one();
    });

    let trigger = Trigger {
        trigger_id: "keyword-hi".into(),
        flow_id: flow.id.clone(),
        channel_id: "sms-line".into(),
        contact_id: "ada".into(),
        conversation_id: Some("ada-sms".into()),
        workspace_id: "demo".into(),
        incoming: Some(Inbound::text("hi")),
        variables: Vars::new().with("first_name", "Ada"),
    };
    let session_id = engine.start_or_resume(trigger).await?;
    println!("started session {:?}, tags of ada: {:?}", session_id, store.contact_tag_names("ada")?);

    // the scheduler resumes the session once the delay is due
    done.notified().await;

    engine.shutdown();
    Ok(())
}
