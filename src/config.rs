use clap::{Args, Parser};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_BODY_BYTES: u64 = 100 * 1024 * 1024; // 100 MB

#[derive(Clone, Debug, Parser)]
#[command(name = "typescope-web", version, about = "File type identification service")]
pub struct ServerConfig {
    #[arg(long, env = "TYPESCOPE_LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// Directory for `/upload` files.
    #[arg(long, env = "TYPESCOPE_UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    #[arg(long, env = "TYPESCOPE_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: u64,

    #[command(flatten)]
    pub exec: ExecConfig,
}

/// Remote run-code API settings. Credentials are never compiled in.
#[derive(Clone, Debug, Args)]
pub struct ExecConfig {
    #[arg(long = "exec-url", env = "TYPESCOPE_EXEC_URL", default_value = "https://api.jdoodle.com/v1/execute")]
    pub url: String,

    #[arg(long = "exec-client-id", env = "TYPESCOPE_EXEC_CLIENT_ID")]
    pub client_id: Option<String>,

    #[arg(long = "exec-client-secret", env = "TYPESCOPE_EXEC_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    #[arg(long = "exec-timeout-ms", env = "TYPESCOPE_EXEC_TIMEOUT_MS", default_value_t = 10_000)]
    pub timeout_ms: u64,
}

impl ExecConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some((id, secret)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let cfg = ServerConfig::try_parse_from(["typescope-web"]).unwrap();
        assert_eq!(cfg.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(cfg.exec.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.listen.port(), 5000);
    }

    #[test]
    fn flags_override() {
        let cfg = ServerConfig::try_parse_from([
            "typescope-web",
            "--listen",
            "127.0.0.1:8080",
            "--upload-dir",
            "/tmp/up",
            "--exec-client-id",
            "id",
            "--exec-client-secret",
            "secret",
            "--exec-timeout-ms",
            "250",
        ])
        .unwrap();
        assert_eq!(cfg.listen.to_string(), "127.0.0.1:8080");
        assert_eq!(cfg.upload_dir, PathBuf::from("/tmp/up"));
        assert_eq!(cfg.exec.credentials(), Some(("id", "secret")));
        assert_eq!(cfg.exec.timeout(), Duration::from_millis(250));
    }

    #[test]
    fn partial_credentials_are_unusable() {
        let cfg = ServerConfig::try_parse_from(["typescope-web", "--exec-client-id", "id"]).unwrap();
        assert!(cfg.exec.credentials().is_none());
    }
}
