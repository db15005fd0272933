//! Dialing with bounded exponential backoff.
//!
//! # State Machine
//! ```text
//! Idle → Attempting → Success                      (return connection)
//!                   → Retrying → Attempting        (sleep next backoff delay)
//!                   → Exhausted                    (return last error)
//!                   → Cancelled                    (context done, any time)
//! ```
//!
//! Attempts within one call are strictly sequential. Every failure class is
//! retried the same way; the class only shows up in the final error.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::DialerConfig;
use crate::net::context::{DialContext, DoneCause};
use crate::net::error::DialError;
use crate::net::stream::{Connection, DialedStream};
use crate::net::tls::TlsSettings;
use crate::observability::metrics;
use crate::resilience::BackoffPolicy;

/// Per-attempt allowance used when no config overrides it.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);

/// Network family to dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Network {
    /// IPv4 or IPv6, whichever resolves.
    #[default]
    Tcp,
    Tcp4,
    Tcp6,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Tcp4 => "tcp4",
            Network::Tcp6 => "tcp6",
        }
    }

    /// Whether a resolved address belongs to this family.
    pub fn accepts(&self, addr: &SocketAddr) -> bool {
        match self {
            Network::Tcp => true,
            Network::Tcp4 => addr.is_ipv4(),
            Network::Tcp6 => addr.is_ipv6(),
        }
    }
}

impl FromStr for Network {
    type Err = DialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            other => Err(DialError::UnsupportedNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Low-level "open one raw connection" primitive.
pub trait Dial: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open one connection to `address`, giving up after `timeout`.
    fn dial<'a>(
        &'a self,
        network: Network,
        address: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, io::Result<Self::Stream>>;
}

/// Plain TCP connect through the runtime resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDial;

impl Dial for TcpDial {
    type Stream = TcpStream;

    fn dial<'a>(
        &'a self,
        network: Network,
        address: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, io::Result<TcpStream>> {
        Box::pin(async move {
            match tokio::time::timeout(timeout, connect_tcp(network, address)).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
            }
        })
    }
}

async fn connect_tcp(network: Network, address: &str) -> io::Result<TcpStream> {
    let candidates: Vec<SocketAddr> = tokio::net::lookup_host(address)
        .await?
        .filter(|addr| network.accepts(addr))
        .collect();

    let mut last_err = io::Error::new(
        io::ErrorKind::AddrNotAvailable,
        format!("no {network} address found for {address}"),
    );
    for addr in candidates {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => {
                tracing::trace!(%addr, error = %e, "Candidate address failed");
                last_err = e;
            }
        }
    }
    Err(last_err)
}

/// Adapter turning a closure into a [`Dial`] primitive.
#[derive(Clone)]
pub struct DialFn<F> {
    f: F,
}

/// Wrap `f(network, address, timeout)` as a dial primitive.
pub fn dial_fn<F, Fut, S>(f: F) -> DialFn<F>
where
    F: Fn(Network, String, Duration) -> Fut + Send + Sync,
    Fut: Future<Output = io::Result<S>> + Send + 'static,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    DialFn { f }
}

impl<F, Fut, S> Dial for DialFn<F>
where
    F: Fn(Network, String, Duration) -> Fut + Send + Sync,
    Fut: Future<Output = io::Result<S>> + Send + 'static,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Stream = S;

    fn dial<'a>(
        &'a self,
        network: Network,
        address: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, io::Result<S>> {
        Box::pin((self.f)(network, address.to_string(), timeout))
    }
}

impl<F> fmt::Debug for DialFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialFn").finish_non_exhaustive()
    }
}

/// Split `host:port`, stripping IPv6 brackets.
pub(crate) fn split_host_port(address: &str) -> Result<(&str, u16), DialError> {
    let invalid = |reason: &str| DialError::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    };

    let (host, port) = address.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return Err(invalid("missing host"));
    }
    let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
    Ok((host, port))
}

/// One call's worth of dial state.
struct DialAttempt<'a> {
    network: Network,
    address: &'a str,
    host: &'a str,
    tls: Option<&'a TlsSettings>,
    attempts: u32,
}

/// Backoff dialer over a pluggable dial primitive.
///
/// Holds no per-call state; one instance can serve any number of
/// concurrent dials.
#[derive(Debug, Clone)]
pub struct Dialer<D = TcpDial> {
    dial: D,
    policy: BackoffPolicy,
    attempt_timeout: Duration,
}

impl Dialer<TcpDial> {
    /// TCP dialer with the default policy.
    pub fn new() -> Self {
        Self::with_dial(TcpDial)
    }

    /// TCP dialer using the `[backoff]` and `[timeouts]` config sections.
    pub fn from_config(config: &DialerConfig) -> Self {
        Self::new()
            .with_policy(config.backoff.policy())
            .with_attempt_timeout(config.timeouts.attempt())
    }
}

impl Default for Dialer<TcpDial> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dial> Dialer<D> {
    pub fn with_dial(dial: D) -> Self {
        Self {
            dial,
            policy: BackoffPolicy::DEFAULT,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Dial without TLS using this dialer's policy.
    pub async fn dial(
        &self,
        ctx: &DialContext,
        network: Network,
        address: &str,
    ) -> Result<DialedStream<D::Stream>, DialError> {
        self.dial_with_policy(ctx, network, address, self.policy, None).await
    }

    /// Dial and complete a TLS handshake using this dialer's policy.
    pub async fn dial_tls(
        &self,
        ctx: &DialContext,
        network: Network,
        address: &str,
        tls: &TlsSettings,
    ) -> Result<DialedStream<D::Stream>, DialError> {
        self.dial_with_policy(ctx, network, address, self.policy, Some(tls))
            .await
    }

    /// Dial with an explicit policy and optional TLS.
    pub async fn dial_with_policy(
        &self,
        ctx: &DialContext,
        network: Network,
        address: &str,
        policy: BackoffPolicy,
        tls: Option<&TlsSettings>,
    ) -> Result<DialedStream<D::Stream>, DialError> {
        let (host, _) = split_host_port(address)?;
        let mut state = DialAttempt {
            network,
            address,
            host,
            tls,
            attempts: 0,
        };

        let span = tracing::debug_span!(
            "dial",
            dial_id = %Uuid::new_v4(),
            %network,
            address,
            tls = tls.is_some()
        );
        let started = Instant::now();
        let result = self.run(ctx, &mut state, policy).instrument(span).await;

        let label = match &result {
            Ok(_) => "success",
            Err(err) => err.kind().as_str(),
        };
        metrics::record_dial_result(label, state.attempts, started);
        result
    }

    async fn run(
        &self,
        ctx: &DialContext,
        state: &mut DialAttempt<'_>,
        policy: BackoffPolicy,
    ) -> Result<DialedStream<D::Stream>, DialError> {
        let mut backoff = policy.backoff();

        loop {
            if let Some(cause) = ctx.cause() {
                return Err(cancelled(state.address, cause));
            }

            state.attempts += 1;
            let timeout = self.timeout_for(ctx);

            let result = tokio::select! {
                biased;
                cause = ctx.done() => return Err(cancelled(state.address, cause)),
                result = self.attempt(state, timeout) => result,
            };

            let err = match result {
                Ok(stream) => {
                    metrics::record_dial_attempt("success");
                    tracing::debug!(attempt = state.attempts, "Dial succeeded");
                    return Ok(stream);
                }
                Err(err) => err,
            };
            metrics::record_dial_attempt(err.kind().as_str());

            // A clipped attempt timeout firing at the deadline is a cancellation.
            if let Some(cause) = ctx.cause() {
                return Err(cancelled(state.address, cause));
            }

            let Some(delay) = backoff.next_delay() else {
                tracing::warn!(attempts = state.attempts, error = %err, "Dial attempts exhausted");
                return Err(DialError::Exhausted {
                    attempts: state.attempts,
                    last: Box::new(err),
                });
            };

            tracing::debug!(
                attempt = state.attempts,
                delay = ?delay,
                error = %err,
                "Dial attempt failed, backing off"
            );

            tokio::select! {
                biased;
                cause = ctx.done() => return Err(cancelled(state.address, cause)),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Connect plus optional handshake, bounded by `timeout`.
    async fn attempt(
        &self,
        state: &DialAttempt<'_>,
        timeout: Duration,
    ) -> Result<DialedStream<D::Stream>, DialError> {
        let address = state.address;
        let connect = async {
            let stream = self
                .dial
                .dial(state.network, address, timeout)
                .await
                .map_err(|e| DialError::from_io(address, e, timeout))?;

            match state.tls {
                Some(tls) => {
                    let stream = tls.handshake(stream, address, state.host).await?;
                    Ok(DialedStream::Tls(Box::new(stream)))
                }
                None => Ok(DialedStream::Plain(stream)),
            }
        };

        match tokio::time::timeout(timeout, connect).await {
            Ok(result) => result,
            Err(_) => Err(DialError::TimedOut {
                address: address.to_string(),
                timeout,
            }),
        }
    }

    fn timeout_for(&self, ctx: &DialContext) -> Duration {
        match ctx.remaining() {
            Some(remaining) => remaining.min(self.attempt_timeout),
            None => self.attempt_timeout,
        }
    }
}

fn cancelled(address: &str, cause: DoneCause) -> DialError {
    tracing::debug!(%cause, "Dial aborted by context");
    DialError::Cancelled {
        address: address.to_string(),
        cause,
    }
}

/// Dial over TCP with an explicit policy, wrapping in TLS when `tls` is set.
///
/// `network` is one of `"tcp"`, `"tcp4"`, `"tcp6"`.
pub async fn dial_with_backoff(
    ctx: &DialContext,
    network: &str,
    address: &str,
    policy: BackoffPolicy,
    tls: Option<&TlsSettings>,
) -> Result<Connection, DialError> {
    let network = network.parse()?;
    Dialer::new()
        .dial_with_policy(ctx, network, address, policy, tls)
        .await
}

/// Dial over TCP with [`BackoffPolicy::DEFAULT`].
pub async fn dial_with_default_backoff(
    ctx: &DialContext,
    network: &str,
    address: &str,
) -> Result<Connection, DialError> {
    dial_with_backoff(ctx, network, address, BackoffPolicy::DEFAULT, None).await
}

/// Dial over TCP and complete a TLS handshake, with [`BackoffPolicy::DEFAULT`].
pub async fn dial_tls_with_default_backoff(
    ctx: &DialContext,
    network: &str,
    address: &str,
    tls: &TlsSettings,
) -> Result<Connection, DialError> {
    dial_with_backoff(ctx, network, address, BackoffPolicy::DEFAULT, Some(tls)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::io::DuplexStream;

    fn counting<F>(calls: &Arc<AtomicU32>, outcome: F) -> impl Dial<Stream = DuplexStream>
    where
        F: Fn(u32) -> Option<io::Error> + Send + Sync + 'static,
    {
        let calls = calls.clone();
        let outcome = Arc::new(outcome);
        dial_fn(move |_, _, _| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            let outcome = outcome.clone();
            async move {
                match outcome(n) {
                    Some(err) => Err(err),
                    None => Ok(tokio::io::duplex(64).0),
                }
            }
        })
    }

    fn fast_policy(steps: u32) -> BackoffPolicy {
        BackoffPolicy::DEFAULT
            .with_steps(steps)
            .with_initial_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_network_parse() {
        assert_eq!("tcp4".parse::<Network>().unwrap(), Network::Tcp4);
        assert_eq!("tcp".parse::<Network>().unwrap(), Network::Tcp);
        assert!("udp".parse::<Network>().is_err());
    }

    #[test]
    fn test_network_accepts_family() {
        let v4: SocketAddr = "127.0.0.1:80".parse().unwrap();
        let v6: SocketAddr = "[::1]:80".parse().unwrap();
        assert!(Network::Tcp4.accepts(&v4));
        assert!(!Network::Tcp4.accepts(&v6));
        assert!(Network::Tcp6.accepts(&v6));
        assert!(Network::Tcp.accepts(&v4));
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("example.com:443").unwrap(), ("example.com", 443));
        assert_eq!(split_host_port("[::1]:8080").unwrap(), ("::1", 8080));
        assert!(split_host_port("example.com").is_err());
        assert!(split_host_port(":80").is_err());
        assert!(split_host_port("host:http").is_err());
    }

    #[tokio::test]
    async fn test_refused_exhausts_exact_steps() {
        let calls = Arc::new(AtomicU32::new(0));
        let dialer = Dialer::with_dial(counting(&calls, |_| {
            Some(io::Error::from(io::ErrorKind::ConnectionRefused))
        }))
        .with_policy(fast_policy(4));

        let err = dialer
            .dial(&DialContext::background(), Network::Tcp4, "127.0.0.1:1")
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(err.attempts(), Some(4));
        assert!(err.is_refused());
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_success_short_circuits() {
        let calls = Arc::new(AtomicU32::new(0));
        let dialer = Dialer::with_dial(counting(&calls, |n| {
            (n < 3).then(|| io::Error::from(io::ErrorKind::ConnectionRefused))
        }))
        .with_policy(fast_policy(10));

        let stream = dialer
            .dial(&DialContext::background(), Network::Tcp, "localhost:80")
            .await
            .unwrap();

        assert!(!stream.is_tls());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let dialer = Dialer::with_dial(counting(&calls, |_| {
            Some(io::Error::from(io::ErrorKind::NetworkUnreachable))
        }))
        .with_policy(fast_policy(3));

        let err = dialer
            .dial(&DialContext::background(), Network::Tcp, "10.0.0.1:80")
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.kind(), crate::net::DialErrorKind::Other);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_dial_times_out_each_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let dialer = Dialer::with_dial(dial_fn(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<io::Result<DuplexStream>>()
        }))
        .with_policy(fast_policy(2))
        .with_attempt_timeout(Duration::from_millis(500));

        let err = dialer
            .dial(&DialContext::background(), Network::Tcp4, "198.18.0.254:8888")
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(err.is_timeout());
        assert!(err.to_string().contains("timed out dialing"));
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_returns_promptly() {
        let calls = Arc::new(AtomicU32::new(0));
        let dialer = Dialer::with_dial(counting(&calls, |_| {
            Some(io::Error::from(io::ErrorKind::ConnectionRefused))
        }))
        .with_policy(
            BackoffPolicy::DEFAULT
                .with_steps(5)
                .with_initial_delay(Duration::from_secs(30))
                .with_cap(Duration::from_secs(30)),
        );

        let ctx = DialContext::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let err = dialer
            .dial(&ctx, Network::Tcp4, "127.0.0.1:1")
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_context_makes_no_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let dialer = Dialer::with_dial(counting(&calls, |_| None));

        let ctx = DialContext::background();
        ctx.cancel();
        let err = dialer.dial(&ctx, Network::Tcp, "localhost:80").await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_reported_as_cancellation() {
        let dialer = Dialer::with_dial(dial_fn(|_, _, _| {
            std::future::pending::<io::Result<DuplexStream>>()
        }))
        .with_policy(fast_policy(10))
        .with_attempt_timeout(Duration::from_secs(10));

        let ctx = DialContext::background().with_timeout(Duration::from_secs(3));
        let err = dialer.dial(&ctx, Network::Tcp, "localhost:80").await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(err.to_string().contains("context deadline exceeded"));
    }

    #[tokio::test]
    async fn test_bad_network_and_address_fail_fast() {
        let ctx = DialContext::background();
        let err = dial_with_backoff(&ctx, "udp", "127.0.0.1:53", BackoffPolicy::DEFAULT, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DialError::UnsupportedNetwork(_)));

        let err = dial_with_default_backoff(&ctx, "tcp", "no-port")
            .await
            .unwrap_err();
        assert!(matches!(err, DialError::InvalidAddress { .. }));
    }
}
