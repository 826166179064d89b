use std::time::Duration;

/// Process configuration, loaded from the environment (§6 Configuration).
///
/// This is a dumb struct-from-env loader: no business logic lives here, it
/// just documents the defaults and hands a typed `Config` to `main`.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub engine_host: String,
    pub http_addr: String,
    pub tg_enabled: bool,
    pub tg_token: String,
    pub tg_chat_id: String,
    pub restart_window: Duration,
    pub restart_threshold: u32,
    pub ws_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            db_path: env_or("DB_PATH", "./healthmon.db"),
            engine_host: env_or("ENGINE_HOST", "unix:///var/run/docker.sock"),
            http_addr: env_or("HTTP_ADDR", ":8080"),
            tg_enabled: env_or("TG_ENABLED", "false").parse().unwrap_or(false),
            tg_token: env_or("TG_TOKEN", ""),
            tg_chat_id: env_or("TG_CHAT_ID", ""),
            restart_window: Duration::from_secs(
                env_or("RESTART_WINDOW_SECONDS", "300").parse().unwrap_or(300),
            ),
            restart_threshold: env_or("RESTART_THRESHOLD", "3").parse().unwrap_or(3),
            ws_origins: {
                let raw = env_or("WS_ORIGINS", "");
                if raw.is_empty() {
                    Vec::new()
                } else {
                    raw.split(',').map(|s| s.trim().to_string()).collect()
                }
            },
        }
    }

    /// `HTTP_ADDR` is documented as `:8080`-style (no host); normalize it to
    /// something `std::net::SocketAddr` or axum's `TcpListener` can bind.
    pub fn http_socket_addr(&self) -> String {
        if let Some(stripped) = self.http_addr.strip_prefix(':') {
            format!("0.0.0.0:{stripped}")
        } else {
            self.http_addr.clone()
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        // SAFETY: single-threaded test, no other test in this module touches env.
        for key in [
            "DB_PATH",
            "ENGINE_HOST",
            "HTTP_ADDR",
            "TG_ENABLED",
            "RESTART_WINDOW_SECONDS",
            "RESTART_THRESHOLD",
            "WS_ORIGINS",
        ] {
            unsafe { std::env::remove_var(key) };
        }
        let cfg = Config::from_env();
        assert_eq!(cfg.db_path, "./healthmon.db");
        assert_eq!(cfg.engine_host, "unix:///var/run/docker.sock");
        assert_eq!(cfg.http_addr, ":8080");
        assert!(!cfg.tg_enabled);
        assert_eq!(cfg.restart_window, Duration::from_secs(300));
        assert_eq!(cfg.restart_threshold, 3);
        assert!(cfg.ws_origins.is_empty());
    }

    #[test]
    fn http_socket_addr_normalizes_bare_port() {
        let mut cfg = Config::from_env();
        cfg.http_addr = ":9090".to_string();
        assert_eq!(cfg.http_socket_addr(), "0.0.0.0:9090");
        cfg.http_addr = "127.0.0.1:9090".to_string();
        assert_eq!(cfg.http_socket_addr(), "127.0.0.1:9090");
    }
}
