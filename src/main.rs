//! dialctl: dial endpoints with backoff and send requests through the
//! protocol-routing transport.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Version};
use clap::{Parser, Subcommand};

use resilient_dial::config::{load_config, DialerConfig};
use resilient_dial::http::{AutoTransport, RoundTrip};
use resilient_dial::net::{BackoffConnector, DialContext, Dialer, Network, TlsSettings};
use resilient_dial::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "dialctl")]
#[command(about = "Dial endpoints with exponential backoff", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Give up on the whole operation after this many seconds.
    #[arg(short, long)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a connection and report the peer address
    Dial {
        /// Target as host:port
        address: String,

        /// Network family: tcp, tcp4 or tcp6
        #[arg(short, long, default_value = "tcp")]
        network: String,

        /// Complete a TLS handshake after connecting
        #[arg(long)]
        tls: bool,

        /// PEM bundle of trusted roots (overrides config)
        #[arg(long)]
        ca_file: Option<PathBuf>,

        /// Name to verify the certificate against
        #[arg(long)]
        server_name: Option<String>,

        /// Maximum attempts (overrides config)
        #[arg(long)]
        steps: Option<u32>,
    },
    /// Send a GET request through the auto-transport
    Get {
        url: String,

        /// Use cleartext HTTP/2 (prior knowledge)
        #[arg(long)]
        http2: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => DialerConfig::default(),
    };

    logging::init(&config.observability)?;

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let ctx = match cli.timeout_secs {
        Some(secs) => DialContext::background().with_timeout(Duration::from_secs(secs)),
        None => DialContext::background(),
    };

    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Dial {
            address,
            network,
            tls,
            ca_file,
            server_name,
            steps,
        } => {
            let network: Network = network.parse()?;
            let mut dialer = Dialer::from_config(&config);
            if let Some(steps) = steps {
                let policy = dialer.policy().with_steps(steps);
                dialer = dialer.with_policy(policy);
            }

            let conn = if tls {
                let ca_file = ca_file.map(|path| path.display().to_string());
                let tls_config = config.tls.with_overrides(ca_file, server_name);
                let settings = TlsSettings::from_config(&tls_config)
                    .await?
                    .ok_or("--tls needs --ca-file or tls.ca_file in config")?;
                dialer.dial_tls(&ctx, network, &address, &settings).await?
            } else {
                dialer.dial(&ctx, network, &address).await?
            };

            println!(
                "connected to {} (tls: {})",
                conn.peer_addr()?,
                conn.is_handshake_complete()
            );
        }
        Commands::Get { url, http2 } => {
            let connector = BackoffConnector::new(Dialer::from_config(&config)).with_context(ctx);
            let transport = AutoTransport::with_connector(connector);

            let version = if http2 { Version::HTTP_2 } else { Version::HTTP_11 };
            let request = Request::get(url).version(version).body(Body::empty())?;

            let response = transport.round_trip(request).await?;
            println!("{:?} {}", response.version(), response.status());
            let body = axum::body::to_bytes(response.into_body(), 1024 * 1024).await?;
            println!("{}", String::from_utf8_lossy(&body));
        }
    }

    Ok(())
}
