use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::Request,
    response::Response,
    routing::{get, post},
    Router,
};
use shuttle_runtime::{CustomError, Error};
use tower_http::{classify::ServerErrorsFailureClass, trace::TraceLayer};
use tracing::{error, info, Span};

mod config;
mod presenter;
mod store;

use config::ServiceConfig;
use presenter::handlers;
use store::DocumentStore;

pub struct AxumService(pub axum::Router);

#[shuttle_runtime::async_trait]
impl shuttle_runtime::Service for AxumService {
    async fn bind(mut self, addr: SocketAddr) -> Result<(), Error> {
        let tcp_listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(tcp_listener, self.0.into_make_service())
            .await
            .map_err(CustomError::new)?;

        Ok(())
    }
}

impl From<axum::Router> for AxumService {
    fn from(router: axum::Router) -> Self {
        Self(router)
    }
}

type PShuttleAxum = Result<AxumService, Error>;

/// Handles shared by every request. The store is opened once in `main` and
/// dropped with the router.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn DocumentStore>,
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/v1/tasks", get(handlers::get_tasks).post(handlers::add_task))
        .route("/v1/tasks/toggle", post(handlers::toggle_task))
        .route("/v1/tasks/delete", post(handlers::delete_task))
        .route("/v1/tasks/live", get(handlers::live_tasks))
        .route(
            "/v1/messages",
            get(handlers::get_messages).post(handlers::add_message),
        )
        .route("/v1/messages/live", get(handlers::live_messages))
        .route("/v1/forms", post(handlers::submit_form))
        .route("/v1/seed", post(handlers::seed))
        .route("/v1/rpc", post(handlers::rpc))
        .layer(
            TraceLayer::new_for_http()
                .on_request(|request: &Request<Body>, _span: &Span| {
                    info!("{:?} {:?}", request.method(), request.uri());
                })
                .on_response(|response: &Response, latency: Duration, _span: &Span| {
                    if response.status().is_success() {
                        info!("{:?} in {:?}", response.status(), latency);
                    } else {
                        error!("{:?} in {:?}", response.status(), latency);
                    }
                })
                .on_failure(
                    |failure: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                        error!("request failed: {:?}", failure);
                    },
                ),
        )
        .with_state(app_state)
}

#[shuttle_runtime::main]
async fn axum() -> PShuttleAxum {
    let config = ServiceConfig::from_env().map_err(CustomError::new)?;
    let store = store::open(&config).await.map_err(CustomError::new)?;

    let app_state = AppState { store };

    Ok(router(app_state).into())
}
