#![allow(clippy::missing_errors_doc)]

mod api;
mod auth;
mod error;
pub mod files;
mod health;
mod state;
mod status;
mod users;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use chorus_bot::{BotRuntime, Dispatcher, Platform};
use chorus_config::Config;
use chorus_store::{CredentialStore, PasswordHash};
use chorus_suno::MusicProvider;
use jiff::Timestamp;
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub use auth::{ADMIN_SECRET_HEADER, API_KEY_HEADER};
pub use error::AdminError;
pub use files::FileEntry;
use state::{AppState, BotStatus};

/// Subsystems the server is assembled from
pub struct Components {
    pub store: CredentialStore,
    pub provider: Arc<dyn MusicProvider>,
    /// Chat platform; `None` runs the admin panel alone
    pub platform: Option<Platform>,
}

impl Components {
    /// Open the credential store and connect the configured services
    ///
    /// # Errors
    ///
    /// Returns an error if the credential file cannot be read or a client
    /// cannot be built
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = CredentialStore::open(&config.store.path).await?;
        let provider = chorus_suno::build_provider(config)?;
        let platform = config
            .bot
            .as_ref()
            .map(|bot| chorus_bot::build_platform(&bot.platform))
            .transpose()?;

        Ok(Self {
            store,
            provider,
            platform,
        })
    }
}

/// Admin panel, HTTP generation API and chat bot
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
    bot: Option<BotRuntime>,
    sweeper: Option<files::Sweeper>,
}

impl Server {
    /// Build the server from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if subsystem initialization fails
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let components = Components::from_config(&config).await?;
        Ok(Self::assemble(&config, components))
    }

    /// Build the server around already constructed subsystems
    pub fn assemble(config: &Config, components: Components) -> Self {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 5000)));

        let Components {
            store,
            provider,
            platform,
        } = components;

        let bot = config.bot.as_ref().zip(platform).map(|(bot_config, platform)| {
            let settings = chorus_bot::BotSettings::from_config(config, bot_config);
            BotRuntime::new(settings, platform, Arc::clone(&provider), store.clone())
        });

        let state = AppState {
            store,
            provider,
            downloads: config.downloads.clone(),
            generation_timeout: config.generation.timeout,
            started_at: Timestamp::now(),
            bot: bot.as_ref().map(|runtime| BotStatus {
                platform: runtime.platform_name().to_owned(),
                sessions: runtime.dispatcher().sessions().clone(),
            }),
        };

        let mut app = Router::new();

        // Health check
        if config.server.health.enabled {
            app = app.route(&config.server.health.path, get(health::health_handler));
        }

        // Admin panel
        match non_empty(config.admin.secret.as_ref()) {
            Some(secret) => app = app.merge(admin_router(state.clone(), secret)),
            None => tracing::warn!("no admin secret configured, admin routes disabled"),
        }

        // HTTP generation API
        if let Some(key) = non_empty(config.admin.api_key.as_ref()) {
            app = app.merge(api_router(state, key));
        }

        app = app.layer(TraceLayer::new_for_http());

        let sweeper = config.downloads.sweep_interval.map(|every| files::Sweeper {
            dir: config.downloads.directory.clone(),
            retention_days: config.downloads.retention_days,
            every,
        });

        Self {
            router: app,
            listen_address,
            bot,
            sweeper,
        }
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Dispatcher of the chat bot, when one is configured
    pub fn dispatcher(&self) -> Option<&Dispatcher> {
        self.bot.as_ref().map(BotRuntime::dispatcher)
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener, running the bot and the retention
    /// sweep alongside
    ///
    /// Returns once the HTTP server has stopped and in-flight generation
    /// jobs have finished.
    pub async fn serve_on(self, listener: tokio::net::TcpListener, shutdown: CancellationToken) -> anyhow::Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        let bot = self.bot.map(|runtime| tokio::spawn(runtime.run(shutdown.clone())));
        let sweeper = self
            .sweeper
            .map(|sweeper| tokio::spawn(sweeper.run(shutdown.clone())));

        let http_shutdown = shutdown.clone();
        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                http_shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await;

        // A failed listener still stops the bot
        shutdown.cancel();

        if let Some(sweeper) = sweeper {
            sweeper.await?;
        }
        if let Some(bot) = bot {
            bot.await??;
        }

        served?;
        Ok(())
    }
}

fn admin_router(state: AppState, secret: PasswordHash) -> Router {
    Router::new()
        .route("/status", get(status::status))
        .route("/credits", get(status::credits))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/reload", post(users::reload_users))
        .route("/users/{username}", put(users::update_user).delete(users::delete_user))
        .route("/files", get(files::list))
        .route("/files/clear", post(files::clear))
        .route("/files/{name}", get(files::download).delete(files::delete))
        .route_layer(axum::middleware::from_fn(move |req, next| {
            let secret = secret.clone();
            async move { auth::require_secret(ADMIN_SECRET_HEADER, secret, req, next).await }
        }))
        .with_state(state)
}

fn api_router(state: AppState, key: PasswordHash) -> Router {
    Router::new()
        .route("/api/generate", post(api::generate))
        .route_layer(axum::middleware::from_fn(move |req, next| {
            let key = key.clone();
            async move { auth::require_secret(API_KEY_HEADER, key, req, next).await }
        }))
        .with_state(state)
}

fn non_empty(secret: Option<&SecretString>) -> Option<PasswordHash> {
    secret
        .map(|secret| secret.expose_secret())
        .filter(|value| !value.is_empty())
        .map(PasswordHash::new)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use chorus_bot::testing::ScriptedProvider;
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    async fn server(raw: &str, dir: &std::path::Path) -> Router {
        let config = Config::parse(raw).unwrap();
        let store = CredentialStore::open(dir.join("users.txt")).await.unwrap();
        store
            .upsert("alice", "pw", chorus_store::Quota::Remaining(2))
            .await
            .unwrap();

        let components = Components {
            store,
            provider: Arc::new(ScriptedProvider::tracks(1)),
            platform: None,
        };
        Server::assemble(&config, components).into_router()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn get_with(path: &str, secret: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(path);
        if let Some(secret) = secret {
            builder = builder.header(ADMIN_SECRET_HEADER, secret);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let dir = tempfile::tempdir().unwrap();
        let router = server("[admin]\nsecret = \"s3cret\"\n", dir.path()).await;

        let response = router.oneshot(get_with("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_routes_require_secret() {
        let dir = tempfile::tempdir().unwrap();
        let router = server("[admin]\nsecret = \"s3cret\"\n", dir.path()).await;

        let (status, body) = send(&router, get_with("/users", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["type"], "authentication_error");

        let (status, _) = send(&router, get_with("/users", Some("wrong"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&router, get_with("/users", Some("s3cret"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["username"], "alice");
        assert_eq!(body[0]["limit"], 2);
        assert_eq!(body[0]["limit_display"], "2 remaining");
    }

    #[tokio::test]
    async fn admin_routes_absent_without_secret() {
        let dir = tempfile::tempdir().unwrap();
        let router = server("", dir.path()).await;

        let (status, _) = send(&router, get_with("/users", Some("anything"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_reports_users_and_no_bot() {
        let dir = tempfile::tempdir().unwrap();
        let router = server("[admin]\nsecret = \"s3cret\"\n", dir.path()).await;

        let (status, body) = send(&router, get_with("/status", Some("s3cret"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");
        assert_eq!(body["users"], 1);
        assert_eq!(body["provider"], "scripted");
        assert!(body["bot"].is_null());
    }

    #[tokio::test]
    async fn api_requires_key_and_input() {
        let dir = tempfile::tempdir().unwrap();
        let raw = format!(
            "[admin]\napi_key = \"k\"\n[downloads]\ndirectory = \"{}\"\n",
            dir.path().join("downloads").display()
        );
        let router = server(&raw, dir.path()).await;

        let post = |key: &str, body: &str| {
            Request::post("/api/generate")
                .header(API_KEY_HEADER, key)
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_owned()))
                .unwrap()
        };

        let (status, _) = send(&router, post("bad", r#"{"input":"rain"}"#)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&router, post("k", r#"{"mode":"default"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Missing input text");

        let (status, body) = send(&router, post("k", r#"{"input":"rain"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["files"][0], "clip-0-0.mp3");
        assert!(dir.path().join("downloads/clip-0-0.mp3").exists());
    }
}
