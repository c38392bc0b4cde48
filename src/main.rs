// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, process::ExitCode, sync::Arc};

use coinllector_server::{
    api::router,
    auth::{cookies::CookieOptions, AuthService, AuthSettings, GoogleOAuth, TokenCodec},
    config::AppConfig,
    images::CloudinaryHost,
    logging::init_logging,
    mail::{LogMailer, Mailer, SmtpMailer},
    state::AppState,
    storage::Database,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(config.log_format);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let db = Arc::new(Database::open(&config.database_path)?);
    tracing::info!(path = %config.database_path.display(), "database opened");

    let codec = TokenCodec::from_pem(
        config.private_key_pem.as_bytes(),
        config.public_key_pem.as_bytes(),
    )?;

    let mailer: Arc<dyn Mailer> = match &config.mail {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "smtp mailer configured");
            Arc::new(SmtpMailer::new(smtp)?)
        }
        None => {
            tracing::warn!("SMTP_HOST not set; emails are only logged");
            Arc::new(LogMailer)
        }
    };

    let auth = AuthService::new(
        db.clone(),
        codec,
        mailer,
        AuthSettings {
            access_token_ttl: config.access_token_ttl,
            refresh_token_ttl: config.refresh_token_ttl,
            origin: config.origin.clone(),
            email_sender: config.email_sender.clone(),
        },
    );

    let mut state = AppState::new(db, auth, config.origin.clone()).with_cookies(CookieOptions {
        domain: config.domain.clone(),
        secure: config.secure_cookies,
    });

    match config.cloudinary.clone() {
        Some(cloudinary) => state = state.with_images(Arc::new(CloudinaryHost::new(cloudinary)?)),
        None => tracing::warn!("Cloudinary not configured; image uploads disabled"),
    }
    match config.google.clone() {
        Some(google) => state = state.with_google(Arc::new(GoogleOAuth::new(google)?)),
        None => tracing::warn!("Google OAuth not configured; Google login disabled"),
    }

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Coinllector server listening (docs at /docs)");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
