//! Shared servers and fixtures for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::routing::any;
use axum::Router;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use resilient_dial::net::TlsSettings;

pub const CA_PEM: &[u8] = include_bytes!("../fixtures/ca.pem");
pub const UNTRUSTED_CA_PEM: &[u8] = include_bytes!("../fixtures/untrusted-ca.pem");
const SERVER_PEM: &[u8] = include_bytes!("../fixtures/server.pem");
const SERVER_KEY: &[u8] = include_bytes!("../fixtures/server.key");

/// An address nobody is listening on: bind an ephemeral port, then release it.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Serve an HTTP/1.1 + h2c app that answers every request with its version.
pub async fn start_version_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    serve_version(listener);
    addr
}

/// Serve the version app on an already bound listener.
pub fn serve_version(listener: TcpListener) {
    let app = Router::new().route(
        "/{*path}",
        any(|request: Request| async move { format!("{:?}", request.version()) }),
    );
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
}

/// Accept TCP connections and never speak; counts accepted sockets.
pub async fn start_silent_server() -> (SocketAddr, Arc<AtomicU32>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicU32::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(socket);
        }
    });

    (addr, accepted)
}

/// TLS server presenting the `example.com` certificate signed by `ca.pem`.
/// Counts accepted TCP connections, including failed handshakes.
pub async fn start_tls_server() -> (SocketAddr, Arc<AtomicU32>) {
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut &SERVER_PEM[..])
        .collect::<Result<_, _>>()
        .unwrap();
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut &SERVER_KEY[..])
        .unwrap()
        .unwrap();

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicU32::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(mut stream) = acceptor.accept(socket).await {
                    // Hold the session open until the client hangs up.
                    let mut buf = [0u8; 1024];
                    while matches!(stream.read(&mut buf).await, Ok(n) if n > 0) {}
                }
            });
        }
    });

    (addr, accepted)
}

/// Client settings trusting the test CA, verifying as `example.com`.
pub fn trusted_tls() -> TlsSettings {
    TlsSettings::from_root_pem(CA_PEM)
        .unwrap()
        .with_server_name("example.com")
        .unwrap()
}
