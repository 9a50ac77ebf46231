//! Duplex connection lifecycle.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;

use crate::dispatch::defect::panic_message;
use crate::dispatch::Inner;
use crate::duplex::connection::{Control, Signal};
use crate::duplex::{ConnectionId, DuplexConnection, RegistryHandle};
use crate::error::HostError;
use crate::observability::{metrics, Outcome};
use crate::protocol::{close_code, HostIo, OutboundEvent, Scope};
use crate::routing::{collect_path_variables, DuplexHandler, EndpointKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplexPhase {
    Opening,
    Routed,
    Rejected,
    Admitted,
    Listening,
    Closing,
    Closed,
}

fn trace_phase(phase: DuplexPhase, path: &str) {
    tracing::debug!(phase = ?phase, path = %path, "Duplex phase");
}

/// Routing view of a connection that has not been admitted yet.
struct RouteView<'a> {
    scope: &'a Scope,
    host: &'a HostIo,
}

impl RouteView<'_> {
    fn path(&self) -> &str {
        &self.scope.path
    }

    async fn close(&self, code: u16) -> Result<(), HostError> {
        self.host.send(OutboundEvent::WebSocketClose { code }).await
    }
}

/// Removes the connection from the registry if the dispatch task is
/// dropped mid-listen.
struct RegistryGuard {
    registry: RegistryHandle,
    id: ConnectionId,
    armed: bool,
}

impl RegistryGuard {
    fn new(registry: RegistryHandle, id: ConnectionId) -> Self {
        Self {
            registry,
            id,
            armed: true,
        }
    }

    async fn release(mut self) {
        self.armed = false;
        if let Err(error) = self.registry.remove(self.id).await {
            tracing::debug!(connection_id = %self.id, error = %error, "Registry removal failed");
        }
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(error) = self.registry.evict(self.id) {
            tracing::warn!(connection_id = %self.id, error = %error, "Registry eviction failed on drop");
        }
    }
}

pub(super) async fn dispatch(inner: &Inner, scope: Scope, host: HostIo) -> Result<(), HostError> {
    let started = Instant::now();
    inner.monitor.before(&scope);
    trace_phase(DuplexPhase::Opening, &scope.path);

    let view = RouteView {
        scope: &scope,
        host: &host,
    };

    let Some(route) = inner.routes.resolve(view.path()) else {
        tracing::debug!(path = %view.path(), "No duplex route matched");
        reject(inner, &scope, started);
        return view.close(close_code::NORMAL_CLOSURE).await;
    };
    let endpoint = route.endpoint();

    let (handler, registry) = match (endpoint.kind(), &inner.registry) {
        (EndpointKind::Duplex(handler), Some(registry)) => (Arc::clone(handler), registry.clone()),
        _ => {
            tracing::error!(
                critical = true,
                endpoint = endpoint.name(),
                kind = endpoint.label(),
                path = %view.path(),
                "Endpoint cannot serve duplex connections"
            );
            reject(inner, &scope, started);
            return view.close(close_code::BAD_GATEWAY).await;
        }
    };
    let path_variables = collect_path_variables(view.path(), route.pattern().as_str());
    trace_phase(DuplexPhase::Routed, &scope.path);

    let mut connection = DuplexConnection::new(scope.clone(), host);
    connection.set_path_variables(path_variables);

    let registered = match AssertUnwindSafe(inner.pipeline.run_before_duplex(&mut connection))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => {
            trace_phase(DuplexPhase::Admitted, &scope.path);
            listen(inner, handler.as_ref(), &registry, &mut connection, &scope, started).await
        }
        Ok(Err(error)) => {
            tracing::debug!(
                connection_id = %connection.id(),
                status = %error.status,
                "Duplex connection refused by middleware"
            );
            if let Err(error) = connection.close(close_code::NORMAL_CLOSURE).await {
                tracing::debug!(connection_id = %connection.id(), error = %error, "Refusal close not delivered");
            }
            false
        }
        Err(panic) => {
            tracing::error!(
                critical = true,
                connection_id = %connection.id(),
                panic = %panic_message(panic.as_ref()),
                "Duplex pre-hook panicked"
            );
            reject(inner, &scope, started);
            return connection.close(close_code::INTERNAL_ERROR).await;
        }
    };

    trace_phase(DuplexPhase::Closing, &scope.path);
    if registered {
        if let Err(panic) = AssertUnwindSafe(handler.disconnect(&connection))
            .catch_unwind()
            .await
        {
            tracing::error!(
                connection_id = %connection.id(),
                panic = %panic_message(panic.as_ref()),
                "Duplex disconnect hook panicked"
            );
        }
    }
    inner.pipeline.run_after_duplex(&connection).await;

    inner.monitor.after(&scope, &Outcome::Closed, started.elapsed());
    metrics::record_duplex_event("closed");
    trace_phase(DuplexPhase::Closed, &scope.path);
    Ok(())
}

fn reject(inner: &Inner, scope: &Scope, started: Instant) {
    trace_phase(DuplexPhase::Rejected, &scope.path);
    inner.monitor.after(scope, &Outcome::Rejected, started.elapsed());
    metrics::record_duplex_event("rejected");
}

/// Accept, register, and run the receive loop. Returns whether the
/// connection made it into the registry.
async fn listen(
    inner: &Inner,
    handler: &dyn DuplexHandler,
    registry: &RegistryHandle,
    connection: &mut DuplexConnection,
    scope: &Scope,
    started: Instant,
) -> bool {
    let id = connection.id();

    match AssertUnwindSafe(handler.connect(connection)).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(HostError::Disconnected)) => {
            connection.mark_closed();
            return false;
        }
        Err(panic) => {
            tracing::error!(
                critical = true,
                connection_id = %id,
                panic = %panic_message(panic.as_ref()),
                "Duplex connect hook panicked"
            );
            let _ = connection.close(close_code::INTERNAL_ERROR).await;
            return false;
        }
    }
    if connection.is_closed() {
        tracing::debug!(connection_id = %id, "Handler closed the connection during connect");
        return false;
    }

    if let Err(error) = registry.admit(connection.handle()).await {
        tracing::error!(connection_id = %id, error = %error, "Failed to register duplex connection");
        let _ = connection.close(close_code::INTERNAL_ERROR).await;
        return false;
    }
    connection.attach_registry(registry.clone());
    let guard = RegistryGuard::new(registry.clone(), id);

    inner.monitor.after(scope, &Outcome::Accepted, started.elapsed());
    metrics::record_duplex_event("accepted");
    trace_phase(DuplexPhase::Listening, &scope.path);

    loop {
        match connection.next_signal().await {
            Signal::Message(message) => {
                match AssertUnwindSafe(handler.receive(connection, message))
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(HostError::Disconnected)) => {
                        connection.mark_closed();
                        break;
                    }
                    Err(panic) => {
                        tracing::error!(
                            critical = true,
                            connection_id = %id,
                            panic = %panic_message(panic.as_ref()),
                            "Duplex handler panicked"
                        );
                        let _ = connection.close(close_code::INTERNAL_ERROR).await;
                        break;
                    }
                }
            }
            Signal::Control(Control::Send(message)) => {
                if connection.send(message).await.is_err() {
                    connection.mark_closed();
                    break;
                }
            }
            Signal::Control(Control::Close(code)) => {
                let _ = connection.close(code).await;
                break;
            }
            Signal::Disconnected { code } => {
                tracing::debug!(connection_id = %id, code, "Peer disconnected");
                connection.mark_closed();
                break;
            }
        }

        if connection.is_closed() {
            break;
        }
    }

    guard.release().await;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    use crate::duplex::registry::DuplexHandle;
    use crate::duplex::DuplexRegistry;

    #[tokio::test]
    async fn test_dropped_guard_evicts_even_when_the_queue_is_full() {
        let registry = DuplexRegistry::spawn(1, None, "events");
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new();

        // Nothing has drained the queue yet, so this admit occupies its only slot.
        registry.admit(DuplexHandle::new(id, tx)).await.unwrap();
        drop(RegistryGuard::new(registry.clone(), id));

        assert!(!registry.contains(id).await.unwrap());
        assert_eq!(registry.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_released_guard_does_not_evict_twice() {
        let registry = DuplexRegistry::spawn(4, None, "events");
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new();
        registry.admit(DuplexHandle::new(id, tx)).await.unwrap();

        RegistryGuard::new(registry.clone(), id).release().await;
        assert!(registry.is_empty().await.unwrap());
    }
}
