use crate::services::payload_offload::DEFAULT_PAYLOAD_THRESHOLD;
use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::config::Credentials;
use clap::Parser;
use std::{env, fmt, str::FromStr};

/// Request body cap on routes that carry object or message payloads (64 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub region: String,
    /// Default bucket; also receives offloaded message payloads.
    pub bucket: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Custom provider endpoint (LocalStack, MinIO).
    pub endpoint_url: Option<String>,
    pub transfer_dir: String,
    pub large_payload_threshold: usize,
    /// Largest request body accepted by the payload-carrying routes.
    pub max_body_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "HTTP gateway for object storage and message queues")]
pub struct Args {
    /// Host to bind to (overrides GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Provider region (overrides GATEWAY_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Default bucket (overrides GATEWAY_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Static access key id (overrides GATEWAY_ACCESS_KEY_ID)
    #[arg(long)]
    pub access_key_id: Option<String>,

    /// Static secret access key (overrides GATEWAY_SECRET_ACCESS_KEY)
    #[arg(long)]
    pub secret_access_key: Option<String>,

    /// Provider endpoint override (overrides GATEWAY_ENDPOINT_URL)
    #[arg(long)]
    pub endpoint_url: Option<String>,

    /// Directory for local file transfers (overrides GATEWAY_TRANSFER_DIR)
    #[arg(long)]
    pub transfer_dir: Option<String>,

    /// Message size in bytes above which payloads are offloaded
    /// (overrides GATEWAY_LARGE_PAYLOAD_THRESHOLD)
    #[arg(long)]
    pub large_payload_threshold: Option<usize>,

    /// Largest accepted upload or large-message request body in bytes
    /// (overrides GATEWAY_MAX_BODY_BYTES)
    #[arg(long)]
    pub max_body_bytes: Option<usize>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_sources(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge parsed arguments with values from `lookup` (the environment in
    /// production). Arguments win over the environment.
    pub fn from_sources(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = lookup("GATEWAY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = parse_var(&lookup, "GATEWAY_PORT")?.unwrap_or(8080);
        let env_region = lookup("GATEWAY_REGION").unwrap_or_else(|| "us-east-1".into());
        let env_transfer =
            lookup("GATEWAY_TRANSFER_DIR").unwrap_or_else(|| "./data/transfers".into());
        let env_threshold = parse_var(&lookup, "GATEWAY_LARGE_PAYLOAD_THRESHOLD")?
            .unwrap_or(DEFAULT_PAYLOAD_THRESHOLD);
        let env_max_body =
            parse_var(&lookup, "GATEWAY_MAX_BODY_BYTES")?.unwrap_or(DEFAULT_MAX_BODY_BYTES);

        let bucket = args
            .bucket
            .or_else(|| lookup("GATEWAY_BUCKET"))
            .filter(|b| !b.is_empty())
            .context("no bucket configured; pass --bucket or set GATEWAY_BUCKET")?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            region: args.region.unwrap_or(env_region),
            bucket,
            access_key_id: args.access_key_id.or_else(|| lookup("GATEWAY_ACCESS_KEY_ID")),
            secret_access_key: args
                .secret_access_key
                .or_else(|| lookup("GATEWAY_SECRET_ACCESS_KEY")),
            endpoint_url: args.endpoint_url.or_else(|| lookup("GATEWAY_ENDPOINT_URL")),
            transfer_dir: args.transfer_dir.unwrap_or(env_transfer),
            large_payload_threshold: args.large_payload_threshold.unwrap_or(env_threshold),
            max_body_bytes: args.max_body_bytes.unwrap_or(env_max_body),
        };

        if cfg.large_payload_threshold == 0 {
            anyhow::bail!("large payload threshold must be greater than zero");
        }
        if cfg.max_body_bytes == 0 {
            anyhow::bail!("max body size must be greater than zero");
        }

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Static credentials, when both halves are configured.
    pub fn static_credentials(&self) -> Option<Credentials> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Some(Credentials::new(
                id.clone(),
                secret.clone(),
                None,
                None,
                "gateway-static",
            )),
            _ => None,
        }
    }

    /// Load the shared SDK configuration: region, optional static
    /// credentials (else the default provider chain) and optional endpoint.
    pub async fn load_sdk_config(&self) -> SdkConfig {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(self.region.clone()));
        if let Some(credentials) = self.static_credentials() {
            loader = loader.credentials_provider(credentials);
        }
        if let Some(endpoint) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        loader.load().await
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        None => Ok(None),
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("endpoint_url", &self.endpoint_url)
            .field("transfer_dir", &self.transfer_dir)
            .field("large_payload_threshold", &self.large_payload_threshold)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_bucket_is_set() {
        let cfg = AppConfig::from_sources(Args::default(), env_of(&[("GATEWAY_BUCKET", "media")]))
            .unwrap();

        assert_eq!(cfg.addr(), "0.0.0.0:8080");
        assert_eq!(cfg.region, "us-east-1");
        assert_eq!(cfg.bucket, "media");
        assert_eq!(cfg.transfer_dir, "./data/transfers");
        assert_eq!(cfg.large_payload_threshold, DEFAULT_PAYLOAD_THRESHOLD);
        assert_eq!(cfg.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert!(cfg.static_credentials().is_none());
    }

    #[test]
    fn arguments_override_environment() {
        let args = Args::try_parse_from([
            "cloud-gateway",
            "--bucket",
            "from-args",
            "--port",
            "9000",
        ])
        .unwrap();
        let cfg = AppConfig::from_sources(
            args,
            env_of(&[("GATEWAY_BUCKET", "from-env"), ("GATEWAY_PORT", "7000")]),
        )
        .unwrap();

        assert_eq!(cfg.bucket, "from-args");
        assert_eq!(cfg.port, 9000);
    }

    #[test]
    fn body_limit_comes_from_environment() {
        let cfg = AppConfig::from_sources(
            Args::default(),
            env_of(&[("GATEWAY_BUCKET", "b"), ("GATEWAY_MAX_BODY_BYTES", "1048576")]),
        )
        .unwrap();
        assert_eq!(cfg.max_body_bytes, 1_048_576);

        let err = AppConfig::from_sources(
            Args::default(),
            env_of(&[("GATEWAY_BUCKET", "b"), ("GATEWAY_MAX_BODY_BYTES", "0")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("max body size"));
    }

    #[test]
    fn missing_bucket_is_an_error() {
        let err = AppConfig::from_sources(Args::default(), env_of(&[])).unwrap_err();
        assert!(err.to_string().contains("GATEWAY_BUCKET"));
    }

    #[test]
    fn malformed_port_is_reported_with_its_value() {
        let err = AppConfig::from_sources(
            Args::default(),
            env_of(&[("GATEWAY_BUCKET", "b"), ("GATEWAY_PORT", "eighty")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("eighty"));
    }

    #[test]
    fn static_credentials_need_both_keys() {
        let cfg = AppConfig::from_sources(
            Args::default(),
            env_of(&[
                ("GATEWAY_BUCKET", "b"),
                ("GATEWAY_ACCESS_KEY_ID", "AKIDEXAMPLE"),
                ("GATEWAY_SECRET_ACCESS_KEY", "secret"),
            ]),
        )
        .unwrap();

        assert!(cfg.static_credentials().is_some());
        assert!(!format!("{:?}", cfg).contains("\"secret\""));
    }
}
