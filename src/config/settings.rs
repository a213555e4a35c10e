use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the TCP server, the broker core and logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub logging: LoggingSettings,
}

/// Configuration settings for the server.
///
/// Defines the bind address and the per-connection policies the transport
/// enforces.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Seconds without inbound bytes, or spent on a single blocked write,
    /// before a connection is closed. 0 disables both limits.
    pub idle_timeout_secs: u64,
    pub tcp_nodelay: bool,
    /// Close a connection as soon as it sends a malformed frame.
    pub close_on_malformed: bool,
}

/// Configuration settings for the broker.
///
/// Controls the connection limit and the size of each transform pool.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    /// Maximum concurrent connections, 0 for unlimited.
    pub max_connections: usize,
    pub rot13sort_workers: usize,
    pub sumall_workers: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub idle_timeout_secs: Option<u64>,
    pub tcp_nodelay: Option<bool>,
    pub close_on_malformed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub max_connections: Option<usize>,
    pub rot13sort_workers: Option<usize>,
    pub sumall_workers: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            broker: BrokerSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            idle_timeout_secs: 60,
            tcp_nodelay: true,
            close_on_malformed: true,
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            rot13sort_workers: 4,
            sumall_workers: 4,
        }
    }
}

impl Settings {
    /// Fill every missing value of `partial` from `Settings::default()`.
    pub fn merge(partial: PartialSettings) -> Self {
        let default = Settings::default();
        let server = partial.server;
        let broker = partial.broker;
        let logging = partial.logging;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
                idle_timeout_secs: server
                    .as_ref()
                    .and_then(|s| s.idle_timeout_secs)
                    .unwrap_or(default.server.idle_timeout_secs),
                tcp_nodelay: server
                    .as_ref()
                    .and_then(|s| s.tcp_nodelay)
                    .unwrap_or(default.server.tcp_nodelay),
                close_on_malformed: server
                    .as_ref()
                    .and_then(|s| s.close_on_malformed)
                    .unwrap_or(default.server.close_on_malformed),
            },
            broker: BrokerSettings {
                max_connections: broker
                    .as_ref()
                    .and_then(|b| b.max_connections)
                    .unwrap_or(default.broker.max_connections),
                rot13sort_workers: broker
                    .as_ref()
                    .and_then(|b| b.rot13sort_workers)
                    .unwrap_or(default.broker.rot13sort_workers),
                sumall_workers: broker
                    .as_ref()
                    .and_then(|b| b.sumall_workers)
                    .unwrap_or(default.broker.sumall_workers),
            },
            logging: LoggingSettings {
                level: logging
                    .and_then(|l| l.level)
                    .unwrap_or(default.logging.level),
            },
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
