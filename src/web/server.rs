//! Web server for cabinet.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::{Config, WebConfig};
use crate::db::RefreshTokenRepository;
use crate::file::FileStorage;
use crate::{CabinetError, Database, Result};

use super::handlers::AppState;
use super::middleware::{JwtState, RateLimitState};
use super::router::{create_health_router, create_router};

/// Web server for the API.
pub struct WebServer {
    addr: SocketAddr,
    app_state: Arc<AppState>,
    jwt_state: Arc<JwtState>,
    rate_limit: Arc<RateLimitState>,
    web_config: WebConfig,
}

impl WebServer {
    /// Create a new web server.
    ///
    /// Fails when the listen address is malformed or the storage directory
    /// cannot be created.
    pub fn new(config: &Config, db: Arc<Database>) -> Result<Self> {
        let web = &config.web;
        let addr: SocketAddr = format!("{}:{}", web.host, web.port)
            .parse()
            .map_err(|e| {
                CabinetError::Config(format!(
                    "invalid web server address {}:{}: {e}",
                    web.host, web.port
                ))
            })?;

        let storage = FileStorage::new(&config.files.storage_path)?;
        tracing::info!("File storage initialized at: {}", config.files.storage_path);

        let app_state = AppState::new(
            db,
            storage,
            &web.jwt_secret,
            web.jwt_access_token_expiry_secs,
            web.jwt_refresh_token_expiry_days,
        )
        .with_max_upload_size(config.files.max_upload_size_bytes());

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            jwt_state: Arc::new(JwtState::new(&web.jwt_secret)),
            rate_limit: Arc::new(RateLimitState::new(web.login_rate_limit)),
            web_config: web.clone(),
        })
    }

    /// Get the configured address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Remove expired and revoked refresh tokens every hour.
    fn start_token_cleanup_task(db: Arc<Database>) {
        tokio::spawn(async move {
            const CLEANUP_INTERVAL_SECS: u64 = 3600;

            let mut interval = tokio::time::interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));
            interval.tick().await;

            loop {
                interval.tick().await;

                match RefreshTokenRepository::new(db.pool()).cleanup_expired().await {
                    Ok(0) => tracing::debug!("No expired refresh tokens to clean up"),
                    Ok(count) => {
                        tracing::info!(deleted_count = count, "Cleaned up expired/revoked refresh tokens")
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to cleanup refresh tokens"),
                }
            }
        });
    }

    /// Build the router, bind, and start background tasks.
    async fn prepare(self) -> std::io::Result<(TcpListener, Router)> {
        let db = self.app_state.db.clone();

        let router = create_router(
            self.app_state,
            self.jwt_state,
            self.rate_limit.clone(),
            &self.web_config.cors_origins,
        )
        .merge(create_health_router());

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        Self::start_token_cleanup_task(db);
        self.rate_limit.start_cleanup_task();
        tracing::info!("Token cleanup task started (runs every hour)");
        tracing::info!("Web server listening on http://{}", local_addr);

        Ok((listener, router))
    }

    /// Run the web server until it fails.
    pub async fn run(self) -> std::io::Result<()> {
        let (listener, router) = self.prepare().await?;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }

    /// Run the server in the background and return the bound address.
    ///
    /// Binding to port 0 picks a free port, which is what tests use.
    pub async fn run_with_addr(self) -> std::io::Result<SocketAddr> {
        let (listener, router) = self.prepare().await?;
        let local_addr = listener.local_addr()?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
