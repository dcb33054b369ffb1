//! Запуск HTTP(S): без TLS, самоподписанный сертификат или PEM-файлы.

use crate::config::{ServerConfig, TlsMode};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// Интервал перечитывания PEM-файлов в режиме cert.
const CERT_RELOAD_INTERVAL: Duration = Duration::from_secs(12 * 3600);

/// Время на завершение активных соединений при остановке.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(10);

/// Запустить сервер в выбранном TLS-режиме и дождаться остановки.
pub async fn serve(
    config: &ServerConfig,
    app: Router,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr: SocketAddr = config.listen.parse()?;
    match &config.tls_mode {
        TlsMode::None => serve_plain(addr, app, shutdown_rx).await,
        TlsMode::SelfSigned => {
            let rustls = self_signed_config(&config.domain).await?;
            info!("Запуск HTTPS на {addr} (самоподписанный сертификат для {})", config.domain);
            serve_rustls(addr, app, rustls, shutdown_rx).await
        }
        TlsMode::Cert => {
            let rustls = RustlsConfig::from_pem_file(&config.tls_cert, &config.tls_key).await?;
            info!(
                "Запуск HTTPS на {addr} (сертификат: {}, ключ: {})",
                config.tls_cert, config.tls_key
            );
            spawn_cert_reload(rustls.clone(), config.tls_cert.clone(), config.tls_key.clone());
            serve_rustls(addr, app, rustls, shutdown_rx).await
        }
    }
}

/// Ждать, пока в канал не придёт `true` или отправитель не закроется.
async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}

async fn serve_plain(
    addr: SocketAddr,
    app: Router,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    info!("Запуск HTTP на {addr} (без TLS)");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
    .await?;
    Ok(())
}

async fn serve_rustls(
    addr: SocketAddr,
    app: Router,
    rustls: RustlsConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        wait_for_shutdown(shutdown_rx).await;
        shutdown_handle.graceful_shutdown(Some(GRACEFUL_TIMEOUT));
    });

    axum_server::bind_rustls(addr, rustls)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;
    Ok(())
}

async fn self_signed_config(domain: &str) -> anyhow::Result<RustlsConfig> {
    let names = vec![domain.to_string(), "localhost".to_string()];
    let certified = rcgen::generate_simple_self_signed(names)
        .map_err(|e| anyhow::anyhow!("Ошибка генерации сертификата: {e}"))?;

    let config = RustlsConfig::from_pem(
        certified.cert.pem().into_bytes(),
        certified.signing_key.serialize_pem().into_bytes(),
    )
    .await?;
    Ok(config)
}

/// Периодически перечитывать сертификат с диска (продление снаружи).
fn spawn_cert_reload(rustls: RustlsConfig, cert_path: String, key_path: String) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CERT_RELOAD_INTERVAL);
        interval.tick().await; // первый тик срабатывает сразу
        loop {
            interval.tick().await;
            match rustls.reload_from_pem_file(&cert_path, &key_path).await {
                Ok(()) => info!("TLS-сертификат перечитан"),
                Err(e) => tracing::error!("Ошибка перечитывания TLS-сертификата: {e}"),
            }
        }
    });
}
