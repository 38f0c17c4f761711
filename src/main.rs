#![warn(clippy::pedantic)]

mod config;
mod error;
mod extract;
mod openapi;
mod ratelimit;
mod repository;
mod response;
mod route;
mod session;
mod storage;
#[cfg(test)]
mod test;
mod trace;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use aide::{axum::ApiRouter, openapi::OpenApi};
use argon2::Argon2;
use axum::{error_handling::HandleErrorLayer, extract::Request, Extension, Router, ServiceExt};
use sqlx::postgres::PgPoolOptions;
use tower::{Layer, ServiceBuilder};
use tower_governor::GovernorLayer;
use tower_http::{
	compression::CompressionLayer,
	cors::CorsLayer,
	normalize_path::NormalizePathLayer,
	request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
	trace::TraceLayer,
};

use crate::{
	config::Config,
	repository::{PgRepository, Posts, Users},
	storage::{Blobs, GcsStore, RetryPolicy},
};

pub type AppState = State;

/// The shared application state.
///
/// Every handle in here is constructed once in [`main`] before the server
/// starts, and shared by all requests.
#[derive(Clone, axum::extract::FromRef)]
pub struct State {
	pub posts: Posts,
	pub users: Users,
	pub blobs: Blobs,
	pub hasher: Argon2<'static>,
	pub retry: RetryPolicy,
	#[from_ref(skip)]
	pub request_timeout: Duration,
}

/// Builds the application router with its documentation and middleware.
///
/// Rate limits key on the peer address, so they are only applied when given.
pub fn app(state: State, limits: Option<&ratelimit::Limits>) -> Router {
	let mut api = OpenApi::default();
	let timeout = state.request_timeout;

	let router = ApiRouter::new()
		.merge(route::routes(limits))
		.nest_api_service("/docs", route::docs::routes())
		.finish_api_with(&mut api, openapi::docs)
		.layer(Extension(Arc::new(api)))
		.layer(
			ServiceBuilder::new()
				.layer(HandleErrorLayer::new(error::handle_middleware_error))
				.timeout(timeout),
		)
		.layer(TraceLayer::new_for_http())
		.layer(PropagateRequestIdLayer::x_request_id())
		.layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
		.layer(CorsLayer::permissive())
		.layer(CompressionLayer::new());

	let router = match limits {
		Some(limits) => router.layer(GovernorLayer {
			config: limits.default.clone(),
		}),
		None => router,
	};

	router.with_state(state)
}

#[tokio::main]
async fn main() {
	dotenvy::dotenv().ok();

	let config = Config::from_env().expect("invalid configuration");
	let _otel = trace::init(config.otel);

	let pool = PgPoolOptions::new()
		.max_connections(config.database_max_connections)
		.connect(&config.database_url)
		.await
		.expect("failed to connect to database");

	sqlx::migrate!()
		.run(&pool)
		.await
		.expect("failed to run migrations");

	let repository = Arc::new(PgRepository::new(pool.clone()));
	let blobs = GcsStore::from_config(&config.gcs).expect("failed to initialize storage client");

	let state = State {
		posts: repository.clone(),
		users: repository,
		blobs: Arc::new(blobs),
		hasher: Argon2::default(),
		retry: config.retry.clone(),
		request_timeout: config.request_timeout,
	};

	let limits = ratelimit::Limits::default();
	limits.spawn_cleanup();

	let app = NormalizePathLayer::trim_trailing_slash().layer(app(state, Some(&limits)));

	let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
		.await
		.expect("failed to bind to port");

	tracing::info!(port = config.port, bucket = %config.gcs.bucket, "listening");

	axum::serve(
		listener,
		ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
	)
	.with_graceful_shutdown(shutdown_signal())
	.await
	.expect("server error");

	pool.close().await;

	tracing::info!("shut down");
}

async fn shutdown_signal() {
	let ctrl_c = async {
		tokio::signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
			.expect("failed to install signal handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {},
		() = terminate => {},
	}

	tracing::info!("shutting down");
}
