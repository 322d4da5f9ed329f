//! Accept loop.
//!
//! Each connection gets its own cancellation token. It is cancelled when the
//! connection ends, which cancels any certificate lookup still running for
//! one of its requests. On shutdown the listener stops accepting and open
//! connections finish their in-flight requests before [`serve`] returns.

use crate::error::ServerError;
use axum::{body::Body, Router};
use cert_gateway::{PeerCertificates, RequestCancellation};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;

/// Pause after a failed `accept`, e.g. when the process is out of descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);
/// Upper bound for a client to complete the TLS handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound for open connections to drain after shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Serve `app` on `listener` until `shutdown` is cancelled.
///
/// With `tls` set, every request carries the [`PeerCertificates`] of its
/// connection. Without it no such extension exists, and gated routes answer
/// on the failure path.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    tls: Option<TlsAcceptor>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let address = listener.local_addr()?;
    tracing::info!(%address, tls = tls.is_some(), "CertGate listening");

    let connections = TaskTracker::new();

    loop {
        let (stream, peer) = tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(error) => {
                    tracing::warn!(%error, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            },
        };

        connections.spawn(serve_connection(
            stream,
            peer,
            app.clone(),
            tls.clone(),
            shutdown.clone(),
        ));
    }

    drop(listener);
    connections.close();
    tracing::info!(
        open = connections.len(),
        "Shutdown requested, draining open connections"
    );

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, connections.wait())
        .await
        .is_err()
    {
        tracing::warn!(
            open = connections.len(),
            timeout_seconds = SHUTDOWN_TIMEOUT.as_secs(),
            "Connections still open after shutdown timeout"
        );
    }
    Ok(())
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    app: Router,
    tls: Option<TlsAcceptor>,
    shutdown: CancellationToken,
) {
    let connection = CancellationToken::new();
    let _closed = connection.clone().drop_guard();

    let Some(acceptor) = tls else {
        drive(stream, peer, app, None, connection, shutdown).await;
        return;
    };

    let handshake = tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream));
    let stream = tokio::select! {
        () = shutdown.cancelled() => {
            tracing::debug!(%peer, "Shutdown during TLS handshake");
            return;
        }
        result = handshake => match result {
            Ok(Ok(stream)) => stream,
            Ok(Err(error)) => {
                tracing::debug!(%peer, %error, "TLS handshake failed");
                return;
            }
            Err(_) => {
                tracing::debug!(%peer, "TLS handshake timed out");
                return;
            }
        },
    };

    let chain = stream
        .get_ref()
        .1
        .peer_certificates()
        .map(|certs| certs.iter().map(|cert| cert.as_ref().to_vec()).collect())
        .unwrap_or_default();
    let certificates = PeerCertificates::new(chain);
    tracing::debug!(
        %peer,
        presented = certificates.chain().len(),
        "TLS handshake completed"
    );

    drive(stream, peer, app, Some(certificates), connection, shutdown).await;
}

async fn drive<I>(
    io: I,
    peer: SocketAddr,
    app: Router,
    certificates: Option<PeerCertificates>,
    connection: CancellationToken,
    shutdown: CancellationToken,
) where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = hyper::service::service_fn(move |request: hyper::Request<Incoming>| {
        let mut request = request.map(Body::new);
        if let Some(certificates) = &certificates {
            request.extensions_mut().insert(certificates.clone());
        }
        request
            .extensions_mut()
            .insert(RequestCancellation::new(connection.child_token()));
        app.clone().oneshot(request)
    });

    let builder = Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection_with_upgrades(TokioIo::new(io), service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(error) = result {
                tracing::debug!(%peer, %error, "Connection error");
            }
        }
        () = shutdown.cancelled() => {
            conn.as_mut().graceful_shutdown();
            if let Err(error) = conn.await {
                tracing::debug!(%peer, %error, "Connection error during shutdown");
            }
        }
    }
}
