use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chatflow::{
    ChannelEvent, ChannelOptions, ChatflowError, Config, Engine, EngineBuilder, FlowModel, GenerateRequest, Inbound, MessagingGateway, Result,
    TextGenerator, Trigger,
    store::{
        Query,
        data::{Channel, Contact, Conversation, MessageDirection, SessionStatus},
    },
};
use serde_json::{Value, json};

#[derive(Default)]
struct Outbox {
    texts: Mutex<Vec<String>>,
}

impl Outbox {
    fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingGateway for Outbox {
    async fn send_message(
        &self,
        _account_id: &str,
        _conversation_id: &str,
        text: &str,
        _attachments: Option<&Value>,
    ) -> Result<String> {
        let mut texts = self.texts.lock().unwrap();
        texts.push(text.to_string());
        Ok(format!("out-{}", texts.len()))
    }

    async fn reply_to_post(
        &self,
        _post_id: &str,
        _account_id: &str,
        _text: &str,
        _comment_id: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn send_private_reply(
        &self,
        _post_id: &str,
        _comment_id: &str,
        _account_id: &str,
        _text: &str,
    ) -> Result<()> {
        Ok(())
    }
}

struct Echo;

#[async_trait]
impl TextGenerator for Echo {
    async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<String> {
        match request.messages.last() {
            Some(last) => Ok(format!("you said: {}", last.content)),
            None => Err(ChatflowError::Provider("empty prompt".into())),
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("chatflow=debug").with_test_writer().try_init();
}

fn engine(config: Config) -> (Engine, Arc<Outbox>) {
    init_tracing();
    let outbox = Arc::new(Outbox::default());
    let engine = EngineBuilder::new().config(config).gateway(outbox.clone()).generator(Arc::new(Echo)).build().unwrap();

    let store = engine.store();
    store
        .channels()
        .create(&Channel {
            id: "ch1".into(),
            workspace_id: "w1".into(),
            name: "support".into(),
            platform: "telegram".into(),
            external_account_id: Some("bot-1".into()),
        })
        .unwrap();
    store
        .contacts()
        .create(&Contact {
            id: "c1".into(),
            workspace_id: "w1".into(),
            name: "Grace".into(),
            is_subscribed: true,
            ..Default::default()
        })
        .unwrap();
    store
        .conversations()
        .create(&Conversation {
            id: "conv1".into(),
            workspace_id: "w1".into(),
            contact_id: "c1".into(),
            channel_id: "ch1".into(),
            external_conversation_id: Some("chat-42".into()),
            ..Default::default()
        })
        .unwrap();
    (engine, outbox)
}

fn quiet() -> Config {
    let mut config = Config::default();
    config.engine.message_pacing_ms = 0;
    config
}

fn trigger(flow_id: &str) -> Trigger {
    Trigger {
        trigger_id: "tr1".into(),
        flow_id: flow_id.into(),
        channel_id: "ch1".into(),
        contact_id: "c1".into(),
        conversation_id: Some("conv1".into()),
        workspace_id: "w1".into(),
        ..Default::default()
    }
}

fn publish(
    engine: &Engine,
    flow: Value,
) {
    let model = FlowModel::from_json(&flow.to_string()).unwrap();
    engine.deploy(&model).unwrap();
    assert!(engine.publish(&model.id).unwrap());
}

fn follow_up_flow() -> Value {
    json!({
        "id": "follow-up",
        "workspaceId": "w1",
        "name": "follow up",
        "nodes": [
            {"id": "t", "type": "trigger", "data": {"settings": {"keyword": "hi"}}},
            {"id": "hello", "type": "send-message", "data": {"messages": [{"text": "Welcome!"}]}},
            {"id": "tag", "type": "add-tag", "data": {"tag": "greeted"}},
            {"id": "wait", "type": "delay", "data": {"duration": 0, "unit": "seconds"}},
            {"id": "bye", "type": "send-message", "data": {"messages": [{"text": "Still there?"}]}}
        ],
        "edges": [
            {"id": "e1", "source": "t", "target": "hello"},
            {"id": "e2", "source": "hello", "target": "tag"},
            {"id": "e3", "source": "tag", "target": "wait"},
            {"id": "e4", "source": "wait", "target": "bye"}
        ]
    })
}

#[tokio::test]
async fn test_follow_up_resumes_on_due_job() {
    let (engine, outbox) = engine(quiet());
    publish(&engine, follow_up_flow());

    let id = engine.start_or_resume(trigger("follow-up")).await.unwrap().unwrap();
    assert_eq!(outbox.texts(), vec!["Welcome!".to_string()]);
    assert_eq!(engine.store().contact_tag_names("c1").unwrap(), vec!["greeted".to_string()]);

    assert_eq!(engine.run_due_jobs().await.unwrap(), 1);
    assert_eq!(outbox.texts(), vec!["Welcome!".to_string(), "Still there?".to_string()]);

    let session = engine.store().sessions().find(&id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(engine.run_due_jobs().await.unwrap(), 0);

    let sent = engine.store().messages().query(&Query::new().eq("direction", MessageDirection::Outbound.as_ref())).unwrap();
    assert_eq!(sent.count, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_launched_engine_runs_jobs_in_background() {
    let mut config = quiet();
    config.scheduler.poll_interval_ms = 20;
    let (engine, outbox) = engine(config);
    publish(&engine, follow_up_flow());

    let completed = Arc::new(AtomicUsize::new(0));
    let c = completed.clone();
    ChannelEvent::channel(engine.channel(), ChannelOptions::with_flow("follow-*".into())).unwrap().on_complete(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    engine.launch();
    assert!(engine.is_running());

    engine.start_or_resume(trigger("follow-up")).await.unwrap().unwrap();
    for _ in 0..100 {
        if completed.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(completed.load(Ordering::SeqCst), 1);
    assert_eq!(outbox.texts().len(), 2);

    engine.shutdown();
    assert!(!engine.is_running());
}

#[tokio::test]
async fn test_unreachable_http_request_does_not_stop_flow() {
    let (engine, outbox) = engine(quiet());
    publish(
        &engine,
        json!({
            "id": "lookup",
            "workspaceId": "w1",
            "name": "lookup",
            "nodes": [
                {"id": "t", "type": "trigger"},
                {"id": "http", "type": "http-request", "data": {"url": "http://127.0.0.1:1/orders", "responseVariable": "order", "timeoutMs": 500}},
                {"id": "m", "type": "send-message", "data": {"messages": [{"text": "order: {{order}}"}]}}
            ],
            "edges": [
                {"id": "e1", "source": "t", "target": "http"},
                {"id": "e2", "source": "http", "target": "m"}
            ]
        }),
    );

    engine.start_or_resume(trigger("lookup")).await.unwrap().unwrap();
    let texts = outbox.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("order:"));
}

#[tokio::test]
async fn test_ai_reply_after_waiting_for_input() {
    let (engine, outbox) = engine(quiet());
    publish(
        &engine,
        json!({
            "id": "assistant",
            "workspaceId": "w1",
            "name": "assistant",
            "nodes": [
                {"id": "t", "type": "trigger"},
                {"id": "ask", "type": "send-message", "data": {"messages": [{"text": "How can I help?"}]}},
                {"id": "wait", "type": "smart-delay", "data": {"variable": "question"}},
                {"id": "ai", "type": "ai-response", "data": {"systemPrompt": "Be brief.", "contextMessages": 1}}
            ],
            "edges": [
                {"id": "e1", "source": "t", "target": "ask"},
                {"id": "e2", "source": "ask", "target": "wait"},
                {"id": "e3", "source": "wait", "target": "ai"}
            ]
        }),
    );

    let id = engine.start_or_resume(trigger("assistant")).await.unwrap().unwrap();
    let mut reply = trigger("assistant");
    reply.incoming = Some(Inbound::text("where is my parcel"));
    assert_eq!(engine.start_or_resume(reply).await.unwrap(), Some(id.clone()));

    let texts = outbox.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[1].starts_with("you said: "));

    let session = engine.store().sessions().find(&id).unwrap().unwrap();
    assert_eq!(session.variables.get("question"), Some("where is my parcel"));
    assert_eq!(session.variables.get("ai_response"), Some(texts[1].as_str()));
}

#[tokio::test]
async fn test_archived_flow_is_not_started() {
    let (engine, outbox) = engine(quiet());
    publish(&engine, follow_up_flow());
    assert!(engine.archive("follow-up").unwrap());
    assert!(engine.publish("follow-up").is_err());

    assert!(engine.start_or_resume(trigger("follow-up")).await.unwrap().is_none());
    assert!(outbox.texts().is_empty());
}

#[tokio::test]
async fn test_release_conversation_after_takeover() {
    let (engine, outbox) = engine(quiet());
    publish(
        &engine,
        json!({
            "id": "escalate",
            "workspaceId": "w1",
            "name": "escalate",
            "nodes": [
                {"id": "t", "type": "trigger"},
                {"id": "m", "type": "send-message", "data": {"messages": [{"text": "Connecting you to a person"}]}},
                {"id": "h", "type": "human-takeover", "data": {"note": "billing question"}}
            ],
            "edges": [
                {"id": "e1", "source": "t", "target": "m"},
                {"id": "e2", "source": "m", "target": "h"}
            ]
        }),
    );

    engine.start_or_resume(trigger("escalate")).await.unwrap().unwrap();
    assert!(engine.start_or_resume(trigger("escalate")).await.unwrap().is_none());
    assert_eq!(outbox.texts().len(), 1);

    assert!(engine.release_conversation("conv1").unwrap());
    assert!(!engine.release_conversation("missing").unwrap());
    assert!(engine.start_or_resume(trigger("escalate")).await.unwrap().is_some());
    assert_eq!(outbox.texts().len(), 2);
}

#[tokio::test]
async fn test_cancel_session_skips_pending_job() {
    let (engine, outbox) = engine(quiet());
    publish(&engine, follow_up_flow());

    let id = engine.start_or_resume(trigger("follow-up")).await.unwrap().unwrap();
    assert!(engine.cancel_session(&id).await.unwrap());
    assert_eq!(engine.run_due_jobs().await.unwrap(), 0);
    assert_eq!(outbox.texts(), vec!["Welcome!".to_string()]);

    let session = engine.store().sessions().find(&id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Cancelled);
}

#[test]
fn test_builds_own_runtime_outside_tokio() {
    let config = Config::load_from_str(
        r#"
        async_worker_thread_number = 2
        [engine]
        message_pacing_ms = 0
        "#,
    )
    .unwrap();
    let engine = EngineBuilder::new().config(config).gateway(Arc::new(Outbox::default())).generator(Arc::new(Echo)).build().unwrap();
    engine.launch();
    assert!(engine.is_running());
    engine.shutdown();
}
