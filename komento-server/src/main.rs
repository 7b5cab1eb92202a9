use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    routing::{get, patch, post, put},
    Router,
};
use komento_api::{
    store::{CommentStore, ReportStore},
    Uuid,
};
use structopt::StructOpt;

mod badwords;
mod db;
mod error;
mod extractors;
mod handlers;
mod moderation;
mod query;
mod service;

pub use error::Error;

use badwords::{ContentChecker, WordListChecker};
use extractors::{AppState, ModeratorToken};
use service::Service;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

#[derive(Debug, StructOpt)]
#[structopt(
    name = "komento-server",
    about = "Threaded comment and moderation service"
)]
struct Opt {
    /// Address to listen on
    #[structopt(long, default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// Bearer token granting access to the moderation routes; with no token
    /// configured, every moderation request is denied
    #[structopt(long, env = "MODERATOR_TOKEN")]
    moderator_token: Option<Uuid>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let opt = Opt::from_args();

    let db_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(8)
        .connect(&db_url)
        .await
        .with_context(|| format!("Error opening database {db_url:?}"))?;
    MIGRATOR
        .run(&pool)
        .await
        .context("running the database migrations")?;

    let store = Arc::new(db::PgStore::new(pool));
    let app = app(
        store.clone(),
        store,
        Arc::new(WordListChecker::default()),
        opt.moderator_token.map(ModeratorToken),
    );

    tracing::info!("listening on {}", opt.bind);
    axum::Server::bind(&opt.bind)
        .serve(app.into_make_service())
        .await
        .context("serving axum webserver")
}

pub fn app(
    comments: Arc<dyn CommentStore>,
    reports: Arc<dyn ReportStore>,
    checker: Arc<dyn ContentChecker>,
    moderator_token: Option<ModeratorToken>,
) -> Router {
    let service = Service::new(comments, reports, checker);
    Router::new()
        .route(
            "/api/comments/:relation",
            get(handlers::find_all_in_hierarchy).post(handlers::create),
        )
        .route("/api/comments/:relation/flat", get(handlers::find_all_flat))
        .route(
            "/api/comments/:relation/comment/:id",
            get(handlers::find_one).put(handlers::update),
        )
        .route(
            "/api/comments/:relation/comment/:id/points",
            patch(handlers::points_up),
        )
        .route(
            "/api/comments/:relation/comment/:id/report-abuse",
            post(handlers::report_abuse),
        )
        .route(
            "/api/moderation/comments",
            get(handlers::moderation_find_all),
        )
        .route(
            "/api/moderation/comments/:id/thread",
            get(handlers::moderation_find_one_and_thread),
        )
        .route(
            "/api/moderation/comments/:id/block",
            patch(handlers::moderation_block_comment),
        )
        .route(
            "/api/moderation/comments/:id/block-thread",
            patch(handlers::moderation_block_thread),
        )
        .route(
            "/api/moderation/reports/:report_id/resolve/:comment_id",
            patch(handlers::moderation_resolve_report),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(AppState {
            service,
            moderator_token,
        })
}
