//! Backoff dialing against real sockets.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;

use resilient_dial::net::{dial_fn, Dial, Dialer, Network, TcpDial};
use resilient_dial::{
    dial_with_backoff, dial_with_default_backoff, BackoffPolicy, DialContext, DialErrorKind,
};

mod common;

const TIMEOUT_ERR: &str = "timed out dialing";
const CONNECTION_REFUSED_ERR: &str = "connection refused";

fn short_policy() -> BackoffPolicy {
    BackoffPolicy::DEFAULT.with_steps(2)
}

#[tokio::test]
async fn test_refused_after_all_steps() {
    let addr = common::closed_addr().await;

    let err = dial_with_backoff(
        &DialContext::background(),
        "tcp4",
        &addr.to_string(),
        short_policy(),
        None,
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), DialErrorKind::Refused);
    assert_eq!(err.attempts(), Some(2));
    assert!(
        err.to_string().contains(CONNECTION_REFUSED_ERR),
        "Error = {err}, want: {CONNECTION_REFUSED_ERR}(...)"
    );
}

#[tokio::test]
async fn test_unresponsive_target_times_out() {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    // Stands in for a blackholed address: connect never completes.
    let dialer = Dialer::with_dial(dial_fn(move |_, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<io::Result<tokio::net::TcpStream>>()
    }))
    .with_policy(short_policy())
    .with_attempt_timeout(Duration::from_millis(100));

    let err = dialer
        .dial(&DialContext::background(), Network::Tcp4, "198.18.0.254:8888")
        .await
        .unwrap_err();

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert!(err.is_timeout());
    assert!(
        err.to_string().contains(TIMEOUT_ERR),
        "Error = {err}, want: {TIMEOUT_ERR}(...)"
    );
}

#[tokio::test]
#[ignore = "needs a route that silently drops 198.18.0.0/15 traffic"]
async fn test_blackhole_tcp_connect_times_out() {
    let err = TcpDial
        .dial(Network::Tcp4, "198.18.0.254:8888", Duration::from_millis(200))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::TimedOut);

    let err = Dialer::new()
        .with_policy(short_policy())
        .with_attempt_timeout(Duration::from_millis(200))
        .dial(&DialContext::background(), Network::Tcp4, "198.18.0.254:8888")
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(
        err.to_string().contains(TIMEOUT_ERR),
        "Error = {err}, want: {TIMEOUT_ERR}(...)"
    );
}

#[tokio::test]
async fn test_live_listener_first_attempt() {
    let addr = common::start_version_server().await;

    let started = Instant::now();
    let mut conn = dial_with_default_backoff(&DialContext::background(), "tcp4", &addr.to_string())
        .await
        .expect("Dial error");

    assert!(started.elapsed() < BackoffPolicy::DEFAULT.initial_delay() * 10);
    assert_eq!(conn.peer_addr().unwrap(), addr);
    assert!(!conn.is_tls());
    conn.shutdown().await.expect("close");
}

#[tokio::test]
async fn test_late_listener_is_reached_by_retrying() {
    let addr = common::closed_addr().await;

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        common::serve_version(listener);
    });

    let conn = Dialer::new()
        .dial(&DialContext::background(), Network::Tcp4, &addr.to_string())
        .await
        .expect("Dial error");
    assert_eq!(conn.peer_addr().unwrap(), addr);
}

#[tokio::test]
async fn test_cancel_mid_backoff() {
    let addr = common::closed_addr().await;
    let policy = BackoffPolicy::DEFAULT
        .with_steps(10)
        .with_initial_delay(Duration::from_secs(10))
        .with_cap(Duration::from_secs(10));

    let ctx = DialContext::background();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = dial_with_backoff(&ctx, "tcp4", &addr.to_string(), policy, None)
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(err.kind(), DialErrorKind::Cancelled);
    assert!(err.to_string().contains("context cancelled"));
}

#[tokio::test]
async fn test_deadline_bounds_total_time() {
    let addr = common::closed_addr().await;
    let policy = BackoffPolicy::DEFAULT
        .with_steps(100)
        .with_initial_delay(Duration::from_millis(200))
        .with_cap(Duration::from_millis(200));

    let ctx = DialContext::background().with_timeout(Duration::from_millis(500));
    let started = Instant::now();
    let err = dial_with_backoff(&ctx, "tcp4", &addr.to_string(), policy, None)
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(err.is_cancelled());
    assert!(err.to_string().contains("context deadline exceeded"));
}

#[tokio::test]
async fn test_concurrent_dials_do_not_interfere() {
    let live = common::start_version_server().await;
    let dead = common::closed_addr().await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let target = if i % 2 == 0 { live } else { dead };
        handles.push(tokio::spawn(async move {
            dial_with_backoff(
                &DialContext::background(),
                "tcp4",
                &target.to_string(),
                BackoffPolicy::DEFAULT
                    .with_steps(3)
                    .with_initial_delay(Duration::from_millis(5)),
                None,
            )
            .await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap();
        if i % 2 == 0 {
            assert!(result.is_ok(), "dial {i} should succeed");
        } else {
            let err = result.unwrap_err();
            assert_eq!(err.attempts(), Some(3), "dial {i} used its own budget");
        }
    }
}
