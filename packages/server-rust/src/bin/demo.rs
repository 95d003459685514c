//! Demo service: an in-memory users API served through the routekit pipeline.
//!
//! ```text
//! GET    /users          paginated list (?page=&per_page=)
//! GET    /users/{id}     one user, 404 when absent
//! POST   /users          create from {"name", "email"}, 201
//! DELETE /users/{id}     writes its own response, returns the sink
//! GET    /crash          unclassified fault, masked outside dev mode
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use axum::http::header::HeaderName;
use axum::http::{HeaderValue, StatusCode};
use axum::routing::MethodFilter;
use axum::Router;
use clap::Parser;
use parking_lot::RwLock;
use routekit_core::{ClassifiedError, Envelope, PageMeta, RequestContext};
use routekit_server::config::{ResolutionMode, RoutekitConfig};
use routekit_server::controller::{
    create_controller, Container, Controller, MethodTable, ResolveError,
};
use routekit_server::pipeline::{Failure, Next, ResponseSink, ResponseWriter};
use routekit_server::routing::controller_route;
use routekit_server::{telemetry, terminator, TypeRegistry};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

const DEFAULT_PER_PAGE: u64 = 20;

#[derive(Debug, Clone, Serialize)]
struct User {
    id: u64,
    name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct NewUser {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
}

impl NewUser {
    fn validate(&self) -> Result<(), ClassifiedError> {
        let mut problems = Vec::new();
        if self.name.trim().is_empty() {
            problems.push("name is required");
        }
        if !self.email.contains('@') {
            problems.push("email must contain '@'");
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ClassifiedError::validation(problems))
        }
    }
}

#[derive(Debug, Deserialize)]
struct Paging {
    page: Option<u64>,
    per_page: Option<u64>,
}

#[derive(Default)]
struct UsersController {
    users: RwLock<BTreeMap<u64, User>>,
    next_id: AtomicU64,
}

impl UsersController {
    fn parse_id(ctx: &RequestContext) -> Result<u64, ClassifiedError> {
        let raw = ctx.require_param("id")?;
        raw.parse()
            .map_err(|_| ClassifiedError::bad_request(format!("invalid user id `{raw}`")))
    }

    async fn list(
        self: Arc<Self>,
        ctx: RequestContext,
        _res: ResponseWriter,
        _next: Next,
    ) -> Result<Envelope, Failure> {
        let paging: Paging = ctx.query_deserialize()?;
        let page = paging.page.unwrap_or(1).max(1);
        let per_page = paging.per_page.unwrap_or(DEFAULT_PER_PAGE);

        let users = self.users.read();
        let skip = usize::try_from((page - 1).saturating_mul(per_page)).unwrap_or(usize::MAX);
        let take = usize::try_from(per_page).unwrap_or(usize::MAX);
        let items: Vec<&User> = users.values().skip(skip).take(take).collect();
        let total = u64::try_from(users.len()).unwrap_or(u64::MAX);
        let meta = PageMeta::new(page, per_page, total);
        Ok(Envelope::paginated(serde_json::to_value(items)?, meta))
    }

    async fn show(
        self: Arc<Self>,
        ctx: RequestContext,
        _res: ResponseWriter,
        _next: Next,
    ) -> Result<Envelope, Failure> {
        let id = Self::parse_id(&ctx)?;
        let user = self
            .users
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| ClassifiedError::not_found(format!("user {id} not found")))?;
        Ok(Envelope::json(StatusCode::OK, &user)?)
    }

    fn create(
        self: Arc<Self>,
        ctx: RequestContext,
        _res: ResponseWriter,
        _next: Next,
    ) -> Result<Envelope, Failure> {
        let input: NewUser = ctx.json()?;
        input.validate()?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let user = User {
            id,
            name: input.name.trim().to_string(),
            email: input.email,
        };
        self.users.write().insert(id, user.clone());
        info!(user_id = id, request_id = ctx.request_id(), "user created");
        Ok(Envelope::json(StatusCode::CREATED, &user)?.with_message("User created"))
    }

    fn remove(
        self: Arc<Self>,
        ctx: RequestContext,
        res: ResponseWriter,
        _next: Next,
    ) -> Result<ResponseWriter, Failure> {
        let id = Self::parse_id(&ctx)?;
        if self.users.write().remove(&id).is_none() {
            return Err(ClassifiedError::not_found(format!("user {id} not found")).into());
        }
        res.write_status(StatusCode::OK);
        res.write_header(HeaderName::from_static("x-deleted-id"), HeaderValue::from(id));
        res.write_json(json!({ "code": 200, "message": "User deleted" }));
        Ok(res)
    }

    async fn crash(
        self: Arc<Self>,
        _ctx: RequestContext,
        _res: ResponseWriter,
        _next: Next,
    ) -> Result<(), Failure> {
        let _config = std::fs::read_to_string("/nonexistent/routekit.toml")
            .context("loading crash-demo configuration")?;
        Ok(())
    }
}

impl Controller for UsersController {
    const NAME: &'static str = "UsersController";

    fn construct() -> Result<Self, ResolveError> {
        Ok(Self::default())
    }

    fn methods() -> MethodTable<Self> {
        MethodTable::new()
            .method("list", Self::list)
            .method("show", Self::show)
            .sync_method("create", Self::create)
            .sync_method("remove", Self::remove)
            .method("crash", Self::crash)
    }
}

fn build_router(config: &RoutekitConfig) -> anyhow::Result<Router> {
    let registry = Arc::new(TypeRegistry::new());
    if config.resolution == ResolutionMode::Container {
        registry.register(UsersController::default());
    }
    let container: Arc<dyn Container> = registry;
    let resolution = config.resolution(Some(container));

    let users = create_controller::<UsersController, _>(&resolution)?;
    let x_request_id = HeaderName::from_static(routekit_core::REQUEST_ID_HEADER);

    let router = Router::new()
        .route(
            "/users",
            controller_route(&users, MethodFilter::GET, "list")?
                .merge(controller_route(&users, MethodFilter::POST, "create")?),
        )
        .route(
            "/users/{id}",
            controller_route(&users, MethodFilter::GET, "show")?
                .merge(controller_route(&users, MethodFilter::DELETE, "remove")?),
        )
        .route("/crash", controller_route(&users, MethodFilter::GET, "crash")?)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        );
    Ok(router)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RoutekitConfig::parse();
    telemetry::init_tracing(config.log_format)?;

    terminator::install(config.terminator_config())?;
    let router = build_router(&config)?;

    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("binding {}", config.bind_addr()))?;
    info!(
        addr = %listener.local_addr()?,
        dev_mode = config.dev_mode,
        resolution = ?config.resolution,
        "routekit demo listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
