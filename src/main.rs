use axum::{
    routing::{get, post},
    Router,
};
use quiz_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    middleware, routes,
    services::question_service::QuestionService,
    AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool.clone());

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let account_api = Router::new()
        .route("/auth/signup", post(routes::auth::signup))
        .route("/auth/login", post(routes::auth::login))
        .with_state(app_state.clone());

    let exam_api = Router::new()
        .route("/auth/me", get(routes::auth::me))
        .route("/attempts/start", post(routes::attempts::start_attempt))
        .route("/attempts/:id", get(routes::attempts::get_attempt_meta))
        .route(
            "/attempts/:id/questions/:position",
            get(routes::attempts::get_attempt_question),
        )
        .route("/attempts/:id/answer", post(routes::attempts::answer_question))
        .route("/attempts/:id/submit", post(routes::attempts::submit_attempt))
        .route("/attempts/:id/result", get(routes::attempts::get_attempt_result))
        .route("/attempts/:id/review", get(routes::attempts::review_attempt))
        .route("/me/attempts", get(routes::attempts::my_attempts))
        .layer(axum::middleware::from_fn(
            middleware::auth::require_bearer_auth,
        ))
        .with_state(app_state);

    let admin_api = Router::new()
        .route(
            "/questions",
            post(routes::questions::create_question).get(routes::questions::list_questions),
        )
        .layer(axum::middleware::from_fn(middleware::auth::require_admin))
        .with_state(QuestionService::new(pool));

    let app = base_routes
        .merge(account_api)
        .merge(exam_api)
        .merge(admin_api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
