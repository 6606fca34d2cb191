use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::model::PackerDimensions;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub packer: PackerConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            packer: PackerConfig::from_env(),
            session: SessionConfig::from_env(),
        }
    }
}

/// Configuration for the HTTP/WebSocket server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
    asset_dir: PathBuf,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 5000;
    const DEFAULT_ASSET_DIR: &'static str = "packing-algo/templates/truck";

    fn from_env() -> Self {
        let host_value =
            env_string("PACK_LIVE_API_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                tracing::warn!(
                    value = %host_value,
                    error = %err,
                    "could not parse PACK_LIVE_API_HOST, using {}",
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = load_with_warning(
            "PACK_LIVE_API_PORT",
            Self::DEFAULT_PORT,
            |value: u16| value != 0,
            "must not be 0",
        );

        let asset_dir = env_string("PACK_LIVE_ASSET_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_ASSET_DIR));

        Self {
            bind_ip,
            display_host,
            port,
            asset_dir,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Directory served under `/truck`.
    pub fn asset_dir(&self) -> &Path {
        &self.asset_dir
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// How the external packer is launched.
#[derive(Clone, Debug)]
pub struct PackerConfig {
    program: String,
    script: Option<String>,
    timeout: Duration,
    max_concurrent_runs: usize,
}

impl PackerConfig {
    const PROGRAM_VAR: &'static str = "PACK_LIVE_PACKER_PROGRAM";
    const SCRIPT_VAR: &'static str = "PACK_LIVE_PACKER_SCRIPT";
    const TIMEOUT_VAR: &'static str = "PACK_LIVE_PACKER_TIMEOUT_SECS";
    const MAX_CONCURRENT_VAR: &'static str = "PACK_LIVE_PACKER_MAX_CONCURRENT";

    pub const DEFAULT_PROGRAM: &'static str = "python3";
    pub const DEFAULT_SCRIPT: &'static str = "packing-algo/packing.py";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
    pub const DEFAULT_MAX_CONCURRENT_RUNS: usize = 2;

    pub fn new(
        program: impl Into<String>,
        script: Option<String>,
        timeout: Duration,
        max_concurrent_runs: usize,
    ) -> Self {
        Self {
            program: program.into(),
            script,
            timeout,
            max_concurrent_runs: max_concurrent_runs.max(1),
        }
    }

    fn from_env() -> Self {
        let program =
            env_string(Self::PROGRAM_VAR).unwrap_or_else(|| Self::DEFAULT_PROGRAM.to_string());

        // "none" runs the program with the dimensions only
        let script = match env_string(Self::SCRIPT_VAR) {
            Some(raw) if raw.eq_ignore_ascii_case("none") => None,
            Some(raw) => Some(raw),
            None => Some(Self::DEFAULT_SCRIPT.to_string()),
        };

        let timeout_secs = load_with_warning(
            Self::TIMEOUT_VAR,
            Self::DEFAULT_TIMEOUT_SECS,
            |value: u64| value > 0,
            "must be greater than 0",
        );

        let max_concurrent_runs = load_with_warning(
            Self::MAX_CONCURRENT_VAR,
            Self::DEFAULT_MAX_CONCURRENT_RUNS,
            |value: usize| value > 0,
            "must be greater than 0",
        );

        Self::new(
            program,
            script,
            Duration::from_secs(timeout_secs),
            max_concurrent_runs,
        )
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Script passed as first argument, if any.
    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_concurrent_runs(&self) -> usize {
        self.max_concurrent_runs
    }
}

/// Settings of the viewer session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    initial_dimensions: PackerDimensions,
    viewer_queue: usize,
}

impl SessionConfig {
    const WIDTH_VAR: &'static str = "PACK_LIVE_DEFAULT_WIDTH";
    const HEIGHT_VAR: &'static str = "PACK_LIVE_DEFAULT_HEIGHT";
    const LENGTH_VAR: &'static str = "PACK_LIVE_DEFAULT_LENGTH";
    const VIEWER_QUEUE_VAR: &'static str = "PACK_LIVE_VIEWER_QUEUE";

    pub const DEFAULT_VIEWER_QUEUE: usize = 64;

    pub fn new(initial_dimensions: PackerDimensions, viewer_queue: usize) -> Self {
        Self {
            initial_dimensions,
            viewer_queue: viewer_queue.max(1),
        }
    }

    fn from_env() -> Self {
        let positive = |value: u32| value > 0;
        let initial_dimensions = PackerDimensions::new(
            load_with_warning(
                Self::WIDTH_VAR,
                PackerDimensions::DEFAULT_WIDTH,
                positive,
                "must be greater than 0",
            ),
            load_with_warning(
                Self::HEIGHT_VAR,
                PackerDimensions::DEFAULT_HEIGHT,
                positive,
                "must be greater than 0",
            ),
            load_with_warning(
                Self::LENGTH_VAR,
                PackerDimensions::DEFAULT_LENGTH,
                positive,
                "must be greater than 0",
            ),
        );

        let viewer_queue = load_with_warning(
            Self::VIEWER_QUEUE_VAR,
            Self::DEFAULT_VIEWER_QUEUE,
            |value: usize| value > 0,
            "must be greater than 0",
        );

        Self::new(initial_dimensions, viewer_queue)
    }

    /// Dimensions remembered before any viewer sets them.
    pub fn initial_dimensions(&self) -> PackerDimensions {
        self.initial_dimensions
    }

    /// Capacity of each viewer's outbound queue.
    pub fn viewer_queue(&self) -> usize {
        self.viewer_queue
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(PackerDimensions::default(), Self::DEFAULT_VIEWER_QUEUE)
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            tracing::warn!(var = name, error = %err, "environment access failed, using default");
            None
        }
    }
}

fn load_with_warning<T>(
    var_name: &str,
    default: T,
    validator: impl Fn(T) -> bool,
    invalid_hint: &str,
) -> T
where
    T: FromStr + Copy + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    parse_with_warning(
        var_name,
        env_string(var_name).as_deref(),
        default,
        validator,
        invalid_hint,
    )
}

fn parse_with_warning<T>(
    var_name: &str,
    raw: Option<&str>,
    default: T,
    validator: impl Fn(T) -> bool,
    invalid_hint: &str,
) -> T
where
    T: FromStr + Copy + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let Some(raw) = raw else {
        return default;
    };

    match raw.parse::<T>() {
        Ok(value) if validator(value) => value,
        Ok(_) => {
            tracing::warn!(
                var = var_name,
                value = raw,
                "invalid value: {}, using {}",
                invalid_hint,
                default
            );
            default
        }
        Err(err) => {
            tracing::warn!(
                var = var_name,
                value = raw,
                error = %err,
                "could not parse value, using {}",
                default
            );
            default
        }
    }
}
