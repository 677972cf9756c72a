use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};

use crate::{
    ChatflowError, Config, Engine, Result,
    gateway::{HttpGateway, MessagingGateway},
    llm::{OpenAiGenerator, TextGenerator},
};

/// Assembles an [`Engine`].
///
/// Without an explicit runtime the engine joins the current tokio runtime,
/// or builds its own with `async_worker_thread_number` threads when called
/// outside of one. The gateway and generator default to the HTTP clients
/// described by the config.
#[derive(Default)]
pub struct EngineBuilder {
    config: Config,
    rt: Option<Arc<Runtime>>,
    gateway: Option<Arc<dyn MessagingGateway>>,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn async_worker_thread_number(
        mut self,
        n: u16,
    ) -> Self {
        self.config.async_worker_thread_number = n;
        self
    }

    pub fn runtime(
        mut self,
        runtime: Arc<Runtime>,
    ) -> Self {
        self.rt = Some(runtime);
        self
    }

    pub fn gateway(
        mut self,
        gateway: Arc<dyn MessagingGateway>,
    ) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn generator(
        mut self,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let (handle, owned) = match (&self.rt, Handle::try_current()) {
            (Some(rt), _) => (rt.handle().clone(), Some(rt.clone())),
            (None, Ok(handle)) => (handle, None),
            (None, Err(_)) => {
                let threads = self.config.async_worker_thread_number.max(1);
                let rt = Builder::new_multi_thread()
                    .worker_threads(threads.into())
                    .enable_all()
                    .build()
                    .map_err(|err| ChatflowError::Engine(format!("failed to build runtime: {}", err)))?;
                let rt = Arc::new(rt);
                (rt.handle().clone(), Some(rt))
            }
        };

        let gateway = match self.gateway {
            Some(gateway) => gateway,
            None => Arc::new(HttpGateway::new(&self.config.gateway)?),
        };
        let generator = match self.generator {
            Some(generator) => generator,
            None => Arc::new(OpenAiGenerator::new(&self.config.ai)?),
        };

        Engine::new(self.config, handle, owned, gateway, generator)
    }
}
