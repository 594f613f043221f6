use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use rpcz_echo_core::Mode;
use std::path::PathBuf;

/// Where the server listens, or where the client connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// `host:port`
    Tcp(String),
    /// Path to a Unix domain socket.
    Uds(PathBuf),
}

impl Address {
    fn from_args(server_addr: String, uds: bool) -> anyhow::Result<Self> {
        if server_addr.trim().is_empty() {
            bail!("SERVER_ADDR must not be empty");
        }

        if uds {
            if cfg!(not(unix)) {
                bail!("Unix domain sockets are not supported on this platform");
            }
            Ok(Self::Uds(PathBuf::from(server_addr)))
        } else {
            Ok(Self::Tcp(server_addr))
        }
    }
}

impl core::fmt::Display for Address {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            Self::Uds(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Runtime configuration for the `echo-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is honored).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "echo-server",
    version,
    about = "A gRPC echo service that enforces a per-call deadline"
)]
pub struct ServerArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix
    /// socket).
    ///
    /// Example: "localhost:10217" or "/tmp/echo.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("localhost:10217"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be
    /// a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Hard ceiling for a single echo call, in milliseconds, including any
    /// delay the request asks for. The caller's own deadline can only
    /// shorten it. Zero selects the built-in default of 30 seconds.
    ///
    /// Environment variable: `MAX_TIMEOUT_MS`
    #[arg(long, env = "MAX_TIMEOUT_MS", default_value_t = 30_000)]
    pub max_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: Address,
    pub max_timeout: Duration,
}

impl TryFrom<ServerArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: ServerArgs) -> Result<Self, Self::Error> {
        Ok(Self {
            address: Address::from_args(args.server_addr, args.uds)?,
            max_timeout: Duration::from_millis(args.max_timeout_ms),
        })
    }
}

/// Runtime configuration for the `echo-client` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "echo-client",
    version,
    about = "Fires a batch of echo requests and reports how many succeeded"
)]
pub struct ClientArgs {
    /// Address of the echo server (TCP or Unix socket path; use --uds for
    /// Unix socket).
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("localhost:10217"))]
    pub server_addr: String,

    /// Connect over a Unix socket instead of TCP.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Number of requests to make.
    ///
    /// Environment variable: `NREQ`
    #[arg(long, env = "NREQ", default_value_t = 100)]
    pub nreq: usize,

    /// Issue all requests concurrently instead of one after another.
    #[arg(long = "async", default_value_t = false)]
    pub async_mode: bool,

    /// Server-side delay to request for every call, in milliseconds.
    ///
    /// Environment variable: `DELAY_MS`
    #[arg(long, env = "DELAY_MS", default_value_t = 0)]
    pub delay_ms: u64,

    /// Deadline for the whole batch, in milliseconds. Requests still in
    /// flight when it passes are abandoned.
    ///
    /// Environment variable: `DEADLINE_MS`
    #[arg(long, env = "DEADLINE_MS")]
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub address: Address,
    pub requests: usize,
    pub mode: Mode,
    pub delay: Duration,
    pub deadline: Option<Duration>,
}

impl TryFrom<ClientArgs> for ClientConfig {
    type Error = anyhow::Error;

    fn try_from(args: ClientArgs) -> Result<Self, Self::Error> {
        if args.deadline_ms == Some(0) {
            bail!("DEADLINE_MS must be greater than 0");
        }

        Ok(Self {
            address: Address::from_args(args.server_addr, args.uds)?,
            requests: args.nreq,
            mode: if args.async_mode {
                Mode::Async
            } else {
                Mode::Sync
            },
            delay: Duration::from_millis(args.delay_ms),
            deadline: args.deadline_ms.map(Duration::from_millis),
        })
    }
}
