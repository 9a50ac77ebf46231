//! Dispatch core: classifies each connection and drives its lifecycle.
//!
//! # Data Flow
//! ```text
//! host adapter ── Scope + HostIo ──▶ Dispatcher::dispatch
//!     ├─ Http      → request.rs  (body → route → hooks → handler → frames)
//!     └─ WebSocket → duplex.rs   (route → admit → receive loop → close)
//! ```
//!
//! # Design Decisions
//! - The route table, middleware chain and config are immutable after
//!   build and shared by every dispatch through one `Arc`
//! - The duplex registry exists only when a duplex route is declared
//! - `HostError::Disconnected` is the only error a dispatch returns

pub(crate) mod defect;
mod duplex;
mod request;

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::duplex::{spawn_listener, Broker, DuplexRegistry, RegistryHandle};
use crate::error::{HostError, StartupError};
use crate::middleware::{Middleware, Pipeline};
use crate::observability::monitoring::{self, Monitor};
use crate::protocol::{ConnectionKind, HostIo, Scope};
use crate::routing::RouteTable;

pub use duplex::DuplexPhase;
pub use request::RequestState;

struct Inner {
    config: Arc<GatewayConfig>,
    routes: RouteTable,
    pipeline: Pipeline,
    monitor: Arc<dyn Monitor>,
    registry: Option<RegistryHandle>,
}

/// Entry point for every connection handed over by the host.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Dispatcher with no middleware, the configured monitor and no broker.
    pub fn new(config: Arc<GatewayConfig>, routes: RouteTable) -> Result<Self, StartupError> {
        Self::builder(config).routes(routes).build()
    }

    pub fn builder(config: Arc<GatewayConfig>) -> DispatcherBuilder {
        DispatcherBuilder {
            config,
            routes: RouteTable::default(),
            middlewares: Vec::new(),
            monitor: None,
            broker: None,
        }
    }

    /// Drive one connection to completion.
    pub async fn dispatch(&self, scope: Scope, host: HostIo) -> Result<(), HostError> {
        match scope.kind {
            ConnectionKind::Http => request::dispatch(&self.inner, scope, host).await,
            ConnectionKind::WebSocket => duplex::dispatch(&self.inner, scope, host).await,
        }
    }

    /// The duplex registry, present only when a duplex route exists.
    pub fn registry(&self) -> Option<&RegistryHandle> {
        self.inner.registry.as_ref()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.inner.routes
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.inner.routes.len())
            .field("middlewares", &self.inner.pipeline.len())
            .field("duplex", &self.inner.registry.is_some())
            .finish()
    }
}

pub struct DispatcherBuilder {
    config: Arc<GatewayConfig>,
    routes: RouteTable,
    middlewares: Vec<Arc<dyn Middleware>>,
    monitor: Option<Arc<dyn Monitor>>,
    broker: Option<Arc<dyn Broker>>,
}

impl DispatcherBuilder {
    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    /// Append a middleware. Pre-hooks run in the order added.
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Replace the monitor chosen by `monitoring.enabled`.
    pub fn monitor(mut self, monitor: Arc<dyn Monitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Fan duplex events out through `broker` instead of delivering locally.
    pub fn broker(mut self, broker: Arc<dyn Broker>) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Must be called within a tokio runtime when a duplex route exists.
    pub fn build(self) -> Result<Dispatcher, StartupError> {
        let registry = if self.routes.has_duplex() {
            let duplex = &self.config.duplex;
            let registry = DuplexRegistry::spawn(
                duplex.queue_capacity,
                self.broker.clone(),
                duplex.channel.as_str(),
            );
            if let Some(broker) = &self.broker {
                spawn_listener(Arc::clone(broker), &duplex.channel, registry.clone())?;
            }
            tracing::info!(
                channel = %duplex.channel,
                broker = self.broker.is_some(),
                "Duplex registry started"
            );
            Some(registry)
        } else {
            None
        };

        let monitor = self
            .monitor
            .unwrap_or_else(|| monitoring::from_config(&self.config.monitoring));

        tracing::debug!(
            routes = self.routes.len(),
            middlewares = self.middlewares.len(),
            "Dispatcher built"
        );

        Ok(Dispatcher {
            inner: Arc::new(Inner {
                config: self.config,
                routes: self.routes,
                pipeline: Pipeline::new(self.middlewares),
                monitor,
                registry,
            }),
        })
    }
}
