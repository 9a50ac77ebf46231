//! Request/response lifecycle.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use axum::http::StatusCode;
use futures_util::FutureExt;

use crate::dispatch::defect::{describe_error, panic_message};
use crate::dispatch::Inner;
use crate::error::{ApiError, HandlerError, HostError};
use crate::http::{Request, Response};
use crate::observability::metrics;
use crate::observability::Outcome;
use crate::protocol::{HostIo, Scope};
use crate::routing::endpoint::call_method;
use crate::routing::{collect_path_variables, EndpointKind, HandlerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    BodyRead,
    Routed,
    Dispatching,
    Handled,
    Failed,
    Responded,
}

/// How far the guarded section got.
enum Target {
    Refused(ApiError),
    Handled(HandlerResult),
}

fn trace_state(state: RequestState, path: &str) {
    tracing::debug!(state = ?state, path = %path, "Request state");
}

pub(super) async fn dispatch(inner: &Inner, scope: Scope, mut host: HostIo) -> Result<(), HostError> {
    let started = Instant::now();
    inner.monitor.before(&scope);
    trace_state(RequestState::Received, &scope.path);

    let body = host.read_body().await.inspect_err(|_| {
        tracing::debug!(path = %scope.path, "Client disconnected before the body was read");
    })?;
    trace_state(RequestState::BodyRead, &scope.path);

    let request = Request::new(scope.clone()).with_body(body);
    let response = handle(inner, request).await;
    respond(inner, &scope, &host, response, started).await
}

async fn handle(inner: &Inner, mut request: Request) -> Response {
    let Some(route) = inner.routes.resolve(request.path()) else {
        tracing::debug!(path = %request.path(), "No route matched");
        return Response::exception(StatusCode::NOT_FOUND);
    };
    let endpoint = route.endpoint();
    trace_state(RequestState::Routed, request.path());

    if let EndpointKind::Duplex(_) = endpoint.kind() {
        tracing::error!(
            critical = true,
            endpoint = endpoint.name(),
            path = %request.path(),
            "Duplex endpoint bound to a plain request route"
        );
        return Response::exception(StatusCode::NOT_IMPLEMENTED);
    }

    let path_variables = collect_path_variables(request.path(), route.pattern().as_str());
    request.set_path_variables(path_variables);
    trace_state(RequestState::Dispatching, request.path());

    let path = request.path().to_owned();
    let guarded = AssertUnwindSafe(async {
        let request = match inner.pipeline.run_before(request).await {
            Ok(request) => request,
            Err(error) => return Target::Refused(error),
        };
        let path_variables = request.path_variables().clone();
        let result = match endpoint.kind() {
            EndpointKind::Function(handler) => handler.call(request, path_variables).await,
            EndpointKind::Resource(handler) => call_method(handler.as_ref(), request, path_variables).await,
            EndpointKind::Duplex(_) => Err(ApiError::from_status(StatusCode::NOT_IMPLEMENTED).into()),
        };
        Target::Handled(result)
    })
    .catch_unwind()
    .await;

    let response = match guarded {
        Ok(Target::Refused(error)) => Response::from(error),
        Ok(Target::Handled(Ok(response))) => response,
        Ok(Target::Handled(Err(HandlerError::Api(error)))) => Response::from(error),
        Ok(Target::Handled(Err(HandlerError::Defect(error)))) => {
            tracing::error!(
                critical = true,
                endpoint = endpoint.name(),
                path = %path,
                error = %describe_error(&*error),
                "Unhandled defect"
            );
            return failed(&path);
        }
        Err(panic) => {
            tracing::error!(
                critical = true,
                endpoint = endpoint.name(),
                path = %path,
                panic = %panic_message(panic.as_ref()),
                "Handler panicked"
            );
            return failed(&path);
        }
    };

    trace_state(RequestState::Handled, &path);
    inner.pipeline.run_after(response).await
}

fn failed(path: &str) -> Response {
    trace_state(RequestState::Failed, path);
    Response::exception(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn respond(
    inner: &Inner,
    scope: &Scope,
    host: &HostIo,
    response: Response,
    started: Instant,
) -> Result<(), HostError> {
    let status = response.status().as_u16();
    inner
        .monitor
        .after(scope, &Outcome::Status(status), started.elapsed());
    metrics::record_request(status, started);

    let (start, body) = response.into_frames();
    host.send(start).await?;
    host.send(body).await?;
    trace_state(RequestState::Responded, &scope.path);
    Ok(())
}
