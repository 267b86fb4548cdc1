//! Server configuration from command-line flags with environment fallbacks.
//!
//! Every setting is optional. Flags win over environment variables, which win
//! over the defaults.

use std::{convert::Infallible, net::SocketAddr, path::PathBuf};

use clap::Parser;

use crate::error::ServerError;

/// imgcast HTTP server
#[derive(Parser, Debug, Clone)]
#[command(name = "imgcast-server")]
#[command(about = "Broadcast live images to room viewers over server-sent events")]
#[command(version)]
pub struct Config {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Address to bind to
    #[arg(short, long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind: String,

    /// URL prefix every route is mounted under
    #[arg(long, env = "BASE_PATH", default_value = "/", value_parser = normalize_base_path)]
    pub base_path: String,

    /// Directory holding the admin credential file and `rooms/`
    #[arg(long, env = "ROOMS_BASE_DIR", default_value = "var")]
    pub rooms_base_dir: PathBuf,

    /// Directory replacing the bundled viewer page and static assets
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Largest accepted upload body, in MiB
    #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = 32)]
    pub max_upload_mb: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Socket address built from `bind` and `port`.
    pub fn listen_addr(&self) -> Result<SocketAddr, ServerError> {
        let addr = format!("{}:{}", self.bind, self.port);
        addr.parse()
            .map_err(|e| ServerError::Config(format!("invalid listen address {addr}: {e}")))
    }

    /// Upload size limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    /// Public path of `relative` (which starts with `/`) under the base path.
    pub fn join_path(&self, relative: &str) -> String {
        if self.base_path == "/" {
            return relative.to_string();
        }
        format!("{}{relative}", self.base_path.trim_end_matches('/'))
    }
}

/// Force a leading and a trailing slash; empty means `/`.
#[allow(clippy::unnecessary_wraps, reason = "clap value parsers return a Result")]
fn normalize_base_path(raw: &str) -> Result<String, Infallible> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok("/".to_string());
    }

    let mut path = String::with_capacity(trimmed.len() + 2);
    if !trimmed.starts_with('/') {
        path.push('/');
    }
    path.push_str(trimmed);
    if !path.ends_with('/') {
        path.push('/');
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let argv = std::iter::once("imgcast-server").chain(args.iter().copied());
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn base_path_normalization() {
        assert_eq!(normalize_base_path("").unwrap(), "/");
        assert_eq!(normalize_base_path("/").unwrap(), "/");
        assert_eq!(normalize_base_path("imgcast").unwrap(), "/imgcast/");
        assert_eq!(normalize_base_path("/imgcast").unwrap(), "/imgcast/");
        assert_eq!(normalize_base_path("imgcast/").unwrap(), "/imgcast/");
        assert_eq!(normalize_base_path("/a/b/").unwrap(), "/a/b/");
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&["--port", "9000", "--base-path", "cast", "--rooms-base-dir", "/tmp/rooms"]);

        assert_eq!(config.port, 9000);
        assert_eq!(config.base_path, "/cast/");
        assert_eq!(config.rooms_base_dir, PathBuf::from("/tmp/rooms"));
        assert_eq!(config.static_dir, None);
        assert_eq!(config.listen_addr().unwrap().port(), 9000);
    }

    #[test]
    fn join_path_under_root_and_prefix() {
        let root = parse(&["--base-path", "/"]);
        assert_eq!(root.join_path("/demo/live"), "/demo/live");

        let prefixed = parse(&["--base-path", "/cast/"]);
        assert_eq!(prefixed.join_path("/demo/live"), "/cast/demo/live");
    }

    #[test]
    fn invalid_bind_address_is_a_config_error() {
        let config = parse(&["--bind", "not an address"]);
        assert!(matches!(config.listen_addr(), Err(ServerError::Config(_))));
    }

    #[test]
    fn static_dir_is_an_override() {
        let config = parse(&["--static-dir", "/srv/viewer"]);
        assert_eq!(config.static_dir, Some(PathBuf::from("/srv/viewer")));
    }

    #[test]
    fn upload_limit_in_bytes() {
        let config = parse(&["--max-upload-mb", "2"]);
        assert_eq!(config.max_upload_bytes(), 2 * 1024 * 1024);
    }
}
