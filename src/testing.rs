//! Doubles and fixtures shared by unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    runtime::Handle,
    task::JoinHandle,
};

use crate::{
    ChatflowError, Config, Result,
    gateway::MessagingGateway,
    llm::{GenerateRequest, TextGenerator},
    runtime::{Channel, Context, Services, Tracker, Trigger},
    store::{
        DbStore, MemStore, Store,
        data::{Channel as ChannelRecord, Contact, Conversation},
    },
};

#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Message { account: String, conversation: String, text: String, attachments: Option<Value> },
    PostReply { post: String, comment: String, text: String },
    PrivateReply { post: String, comment: String, text: String },
}

#[derive(Default)]
pub struct RecordingGateway {
    pub deliveries: Mutex<Vec<Delivery>>,
    /// texts containing this fail to send
    pub fail_on: Option<String>,
}

impl RecordingGateway {
    pub fn texts(&self) -> Vec<String> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .map(|d| match d {
                Delivery::Message { text, .. } | Delivery::PostReply { text, .. } | Delivery::PrivateReply { text, .. } => text.clone(),
            })
            .collect()
    }

    fn check(
        &self,
        text: &str,
    ) -> Result<()> {
        match &self.fail_on {
            Some(pattern) if text.contains(pattern.as_str()) => Err(ChatflowError::Gateway("rejected".into())),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send_message(
        &self,
        account_id: &str,
        conversation_id: &str,
        text: &str,
        attachments: Option<&Value>,
    ) -> Result<String> {
        self.check(text)?;
        let mut deliveries = self.deliveries.lock().unwrap();
        deliveries.push(Delivery::Message {
            account: account_id.into(),
            conversation: conversation_id.into(),
            text: text.into(),
            attachments: attachments.cloned(),
        });
        Ok(format!("ext-{}", deliveries.len()))
    }

    async fn reply_to_post(
        &self,
        post_id: &str,
        _account_id: &str,
        text: &str,
        comment_id: &str,
    ) -> Result<()> {
        self.check(text)?;
        self.deliveries.lock().unwrap().push(Delivery::PostReply {
            post: post_id.into(),
            comment: comment_id.into(),
            text: text.into(),
        });
        Ok(())
    }

    async fn send_private_reply(
        &self,
        post_id: &str,
        comment_id: &str,
        _account_id: &str,
        text: &str,
    ) -> Result<()> {
        self.check(text)?;
        self.deliveries.lock().unwrap().push(Delivery::PrivateReply {
            post: post_id.into(),
            comment: comment_id.into(),
            text: text.into(),
        });
        Ok(())
    }
}

/// Generator answering with a fixed reply, or failing when there is none.
#[derive(Default)]
pub struct FixedGenerator {
    pub reply: Option<String>,
    pub requests: Mutex<Vec<GenerateRequest>>,
}

#[async_trait]
impl TextGenerator for FixedGenerator {
    async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply.clone().ok_or_else(|| ChatflowError::Provider("quota exceeded".into()))
    }
}

pub struct Harness {
    pub store: Arc<Store>,
    pub gateway: Arc<RecordingGateway>,
    pub generator: Arc<FixedGenerator>,
    pub services: Arc<Services>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(RecordingGateway::default(), FixedGenerator::default(), "sms")
    }

    /// Must run inside a tokio runtime.
    pub fn with(
        gateway: RecordingGateway,
        generator: FixedGenerator,
        platform: &str,
    ) -> Self {
        let store = Store::new();
        MemStore::new().init(&store).unwrap();
        let store = Arc::new(store);

        let mut config = Config::default();
        config.engine.message_pacing_ms = 0;

        let gateway = Arc::new(gateway);
        let generator = Arc::new(generator);
        let channel = Arc::new(Channel::new(Handle::current()));
        let services = Arc::new(Services {
            config,
            store: store.clone(),
            gateway: gateway.clone(),
            generator: generator.clone(),
            http: reqwest::Client::new(),
            tracker: Tracker::new(store.clone(), channel),
        });

        let harness = Self {
            store,
            gateway,
            generator,
            services,
        };
        harness.seed(platform);
        harness
    }

    fn seed(
        &self,
        platform: &str,
    ) {
        self.store
            .channels()
            .create(&ChannelRecord {
                id: "ch1".into(),
                workspace_id: "w1".into(),
                name: "main".into(),
                platform: platform.into(),
                external_account_id: Some("acc-1".into()),
            })
            .unwrap();
        self.store
            .contacts()
            .create(&Contact {
                id: "c1".into(),
                workspace_id: "w1".into(),
                name: "Ada".into(),
                is_subscribed: true,
                ..Default::default()
            })
            .unwrap();
        self.store
            .conversations()
            .create(&Conversation {
                id: "conv1".into(),
                workspace_id: "w1".into(),
                contact_id: "c1".into(),
                channel_id: "ch1".into(),
                external_conversation_id: Some("ext-conv-1".into()),
                ..Default::default()
            })
            .unwrap();
    }

    pub fn trigger(&self) -> Trigger {
        Trigger {
            trigger_id: "t1".into(),
            flow_id: "f1".into(),
            channel_id: "ch1".into(),
            contact_id: "c1".into(),
            conversation_id: Some("conv1".into()),
            workspace_id: "w1".into(),
            ..Default::default()
        }
    }

    /// Context of session `s1`, with gateway ids left for lazy resolution.
    pub fn context(&self) -> Context {
        let mut ctx = Context::new(self.services.clone(), &self.trigger());
        ctx.session_id = "s1".into();
        ctx.platform = self.store.channels().find("ch1").unwrap().map(|c| c.platform).unwrap_or_default();
        ctx
    }
}

/// Serve one HTTP request on a local port answering `body` as JSON.
/// Resolves to the raw request text.
pub async fn serve_once(body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let body = body.to_string();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| l.to_lowercase().strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap_or(0)))
                    .unwrap_or(0);
                if raw.len() >= end + 4 + length {
                    break;
                }
            }
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&raw).to_string()
    });
    (url, handle)
}
