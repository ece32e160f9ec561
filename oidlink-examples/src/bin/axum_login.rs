//! Serves `/login`, `/auth0/callback`, `/logout` and `/verify-email` against
//! the tenant configured through `OIDLINK_*` variables. Identity links are
//! kept in SQLite; local accounts in memory.

use axum::{response::Html, routing::get, Router};
use oidlink::flow::LoginFlowController;
use oidlink::provider::OidcProviderClient;
use oidlink::token::IdTokenValidator;
use oidlink_axum::{take_notice, OidlinkState, SessionConfig};
use oidlink_core::{ChannelEventSink, OidcSettings};
use oidlink_session::MemoryStore;
use oidlink_store::{MemoryDirectory, SqlLinkStore};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tower_cookies::{CookieManagerLayer, Cookies};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = OidcSettings::from_env()?;
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;
    let links = SqlLinkStore::new(pool);
    links.migrate().await?;

    let http = reqwest::Client::new();
    let provider = OidcProviderClient::new(&settings, http.clone());
    let validator = IdTokenValidator::from_settings(&settings, http)?;

    let (events, mut received) = ChannelEventSink::new();
    tokio::spawn(async move {
        while let Some(event) = received.recv().await {
            log::info!("{} for account {}", event.name(), event.account().id);
        }
    });

    let secure_cookies = settings.base_url.starts_with("https://");
    let controller = LoginFlowController::builder(settings)
        .provider(Arc::new(provider))
        .verifier(Arc::new(validator))
        .links(Arc::new(links))
        .accounts(Arc::new(MemoryDirectory::default()))
        .events(Arc::new(events))
        .build()?;

    let state = OidlinkState::new(Arc::new(controller), Arc::new(MemoryStore::default()))
        .with_session_config(SessionConfig {
            secure: secure_cookies,
            ..SessionConfig::default()
        });

    let app = Router::new()
        .route("/", get(index))
        .layer(CookieManagerLayer::new())
        .merge(state.axum_router())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Listening on http://{addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn index(cookies: Cookies) -> Html<String> {
    let notice = take_notice(&cookies)
        .map(|n| format!("<p class=\"notice\">{}</p>", n.message()))
        .unwrap_or_default();
    Html(format!(
        "<!DOCTYPE html>\n<html><body>{notice}<a href=\"/login\">Log in</a> | <a href=\"/logout\">Log out</a></body></html>"
    ))
}
