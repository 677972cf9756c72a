use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use globset::{Glob, GlobMatcher};
use tokio::runtime::Handle;

use crate::{
    ChatflowError, Result, ShareLock,
    common::{EventQueue, Shutdown},
    events::{Event, Message},
};

macro_rules! dispatch_event {
    ($handles:expr, $(&$item:ident), +) => {
        if let Ok(handlers) = $handles.read() {
            for handle in handlers.iter() {
                (handle)($(&$item),+);
            }
        }
    };
}

macro_rules! dispatch_event_async {
    ($handle:expr, $handles:expr, $(&$item:ident), +) => {
        let handles = $handles.clone();

        $handle.spawn(async move {
            let handlers = match handles.read() {
                Ok(h) => h.clone(),
                Err(_) => return,
            };
            for handle in handlers.iter() {
                (handle)($(&$item),+).await;
            }
        });
    };
}

const EVENT_QUEUE_SIZE: usize = 2048;

pub type FlowEventHandle = Arc<dyn Fn(&Event<Message>) + Send + Sync>;
pub type FlowEventHandleAsync = Arc<dyn Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// use the glob pattern to match the session id
    /// eg. sess1*
    pub session: String,

    /// use the glob pattern to match the flow id
    /// eg. welcome-*
    pub flow: String,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            session: "*".to_string(),
            flow: "*".to_string(),
        }
    }
}

impl ChannelOptions {
    pub fn new(
        session: String,
        flow: String,
    ) -> Self {
        Self {
            session,
            flow,
        }
    }

    pub fn with_session(session: String) -> Self {
        Self {
            session,
            flow: "*".to_string(),
        }
    }

    pub fn with_flow(flow: String) -> Self {
        Self {
            session: "*".to_string(),
            flow,
        }
    }
}

/// Publish/subscribe hub for flow events.
#[derive(Clone)]
pub struct Channel {
    event_queue: Arc<EventQueue>,

    events: ShareLock<Vec<FlowEventHandle>>,
    events_async: ShareLock<Vec<FlowEventHandleAsync>>,

    handle: Handle,
    shutdown: Arc<Shutdown>,
}

impl Channel {
    pub(crate) fn new(handle: Handle) -> Self {
        Self {
            event_queue: EventQueue::new(EVENT_QUEUE_SIZE),
            events: Arc::new(RwLock::new(Vec::new())),
            events_async: Arc::new(RwLock::new(Vec::new())),
            handle,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    /// Publish an event. Dropped silently when nobody listens.
    pub(crate) fn publish(
        &self,
        msg: Message,
    ) {
        let _ = self.event_queue.send(Event::new(&msg));
    }

    pub(crate) fn listen(&self) {
        let mut event_queue = self.event_queue.subscribe();
        let events = self.events.clone();
        let events_async = self.events_async.clone();
        let handle = self.handle.clone();

        let shutdown = self.shutdown.clone();
        self.handle.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    recv = event_queue.recv() => match recv {
                        Ok(e) => {
                            let evt = e.clone();
                            dispatch_event!(events, &evt);
                            dispatch_event_async!(handle, events_async, &e);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("channel listener lagged, {} events dropped", n);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}

/// Filtered subscription on a [`Channel`].
#[derive(Clone)]
pub struct ChannelEvent {
    channel: Arc<Channel>,

    glob: (GlobMatcher, GlobMatcher),
}

impl ChannelEvent {
    pub fn channel(
        channel: Arc<Channel>,
        options: ChannelOptions,
    ) -> Result<Self> {
        let compile = |pattern: &str| Glob::new(pattern).map(|g| g.compile_matcher()).map_err(|err| ChatflowError::Engine(format!("invalid pattern '{}': {}", pattern, err)));
        Ok(Self {
            channel,
            glob: (compile(&options.session)?, compile(&options.flow)?),
        })
    }

    fn push(
        &self,
        handle: FlowEventHandle,
    ) {
        if let Ok(mut events) = self.channel.events.write() {
            events.push(handle);
        }
    }

    pub fn on_complete(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.push(Arc::new(move |e| {
            if e.event.is_complete() && is_match(&glob, e) {
                f(e);
            }
        }));
    }

    pub fn on_paused(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.push(Arc::new(move |e| {
            if e.event.is_paused() && is_match(&glob, e) {
                f(e);
            }
        }));
    }

    pub fn on_error(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.push(Arc::new(move |e| {
            if e.event.is_error() && is_match(&glob, e) {
                f(e);
            }
        }));
    }

    pub fn on_event(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.push(Arc::new(move |e| {
            if is_match(&glob, e) {
                f(e);
            }
        }));
    }

    pub fn on_event_async<F>(
        &self,
        f: F,
    ) where
        F: Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let glob = self.glob.clone();

        if let Ok(mut events) = self.channel.events_async.write() {
            events.push(Arc::new(move |e| {
                if is_match(&glob, e) {
                    f(e)
                } else {
                    Box::pin(async {})
                }
            }));
        }
    }
}

fn is_match(
    glob: &(GlobMatcher, GlobMatcher),
    e: &Event<Message>,
) -> bool {
    let (pat_session, pat_flow) = glob;
    pat_session.is_match(&e.session_id) && pat_flow.is_match(&e.flow_id)
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use tokio::runtime::Handle;

    use super::{Channel, ChannelEvent, ChannelOptions};
    use crate::events::{FlowEvent, Message};

    fn message(
        session_id: &str,
        flow_id: &str,
        event: FlowEvent,
    ) -> Message {
        Message {
            session_id: session_id.into(),
            flow_id: flow_id.into(),
            contact_id: "c1".into(),
            node_id: String::new(),
            event,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn test_filters_by_flow_glob() {
        let channel = Arc::new(Channel::new(Handle::current()));
        let hits = Arc::new(AtomicUsize::new(0));
        let completes = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        ChannelEvent::channel(channel.clone(), ChannelOptions::with_flow("welcome-*".into())).unwrap().on_event(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let c = completes.clone();
        ChannelEvent::channel(channel.clone(), ChannelOptions::default()).unwrap().on_complete(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        channel.listen();

        channel.publish(message("s1", "welcome-a", FlowEvent::Started));
        channel.publish(message("s2", "other", FlowEvent::Started));
        channel.publish(message("s1", "welcome-a", FlowEvent::Completed));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(completes.load(Ordering::SeqCst), 1);
        channel.shutdown();
    }

    #[test]
    fn test_rejects_bad_pattern() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let channel = Arc::new(Channel::new(rt.handle().clone()));
        assert!(ChannelEvent::channel(channel, ChannelOptions::with_session("[".into())).is_err());
    }
}
