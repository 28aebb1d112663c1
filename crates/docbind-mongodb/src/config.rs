//! Runtime configuration
//!
//! Two kinds of configuration live here:
//! - [`ConnectOptions`]: per-connection driver settings, handed to the MongoDB
//!   driver unchanged.
//! - [`SecurityConfig`]: process-wide switches for the checks this crate runs
//!   before delegating to the driver.

use mongodb::options::{ClientOptions, ServerApi, ServerApiVersion, Tls, TlsOptions};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Hook for driver options that [`ConnectOptions`] does not name
pub type ClientOptionsHook = Arc<dyn Fn(&mut ClientOptions) + Send + Sync>;

/// Driver configuration for a single connection
///
/// Every field is optional; an unset field leaves the driver default in place.
#[derive(Clone, Default)]
pub struct ConnectOptions {
    /// Minimum number of connections in the pool
    pub min_pool_size: Option<u32>,
    /// Maximum number of connections in the pool
    pub max_pool_size: Option<u32>,
    /// Maximum time a connection can remain idle before being closed
    pub max_idle_time: Option<Duration>,
    /// Connection timeout
    pub connect_timeout: Option<Duration>,
    /// Server selection timeout
    pub server_selection_timeout: Option<Duration>,
    /// Application name for server logs
    pub app_name: Option<String>,
    /// Replica set name
    pub replica_set: Option<String>,
    /// Connect to a single host without topology discovery
    pub direct_connection: Option<bool>,
    /// Enable or disable TLS with default TLS options
    pub tls: Option<bool>,
    /// Retry writes once on retryable errors (driver-level behaviour)
    pub retry_writes: Option<bool>,
    /// Pin the stable server API to version 1
    pub stable_api: bool,
    /// Receives the parsed client options after the named fields are applied
    pub client_options_hook: Option<ClientOptionsHook>,
}

impl ConnectOptions {
    /// Copy every configured field onto the parsed driver options
    pub fn apply(&self, client_options: &mut ClientOptions) {
        if let Some(min) = self.min_pool_size {
            client_options.min_pool_size = Some(min);
        }
        if let Some(max) = self.max_pool_size {
            client_options.max_pool_size = Some(max);
        }
        if let Some(idle) = self.max_idle_time {
            client_options.max_idle_time = Some(idle);
        }
        if let Some(connect) = self.connect_timeout {
            client_options.connect_timeout = Some(connect);
        }
        if let Some(server_sel) = self.server_selection_timeout {
            client_options.server_selection_timeout = Some(server_sel);
        }
        if let Some(ref app) = self.app_name {
            client_options.app_name = Some(app.clone());
        }
        if let Some(ref replica_set) = self.replica_set {
            client_options.repl_set_name = Some(replica_set.clone());
        }
        if let Some(direct) = self.direct_connection {
            client_options.direct_connection = Some(direct);
        }
        if let Some(tls) = self.tls {
            client_options.tls = Some(if tls {
                Tls::Enabled(TlsOptions::default())
            } else {
                Tls::Disabled
            });
        }
        if let Some(retry) = self.retry_writes {
            client_options.retry_writes = Some(retry);
        }
        if self.stable_api {
            let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
            client_options.server_api = Some(server_api);
        }
        if let Some(ref hook) = self.client_options_hook {
            hook(client_options);
        }
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("min_pool_size", &self.min_pool_size)
            .field("max_pool_size", &self.max_pool_size)
            .field("max_idle_time", &self.max_idle_time)
            .field("connect_timeout", &self.connect_timeout)
            .field("server_selection_timeout", &self.server_selection_timeout)
            .field("app_name", &self.app_name)
            .field("replica_set", &self.replica_set)
            .field("direct_connection", &self.direct_connection)
            .field("tls", &self.tls)
            .field("retry_writes", &self.retry_writes)
            .field("stable_api", &self.stable_api)
            .field("client_options_hook", &self.client_options_hook.is_some())
            .finish()
    }
}

/// Process-wide security switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    /// Reject `$where`, `$function` and `$accumulator` in filters and pipelines
    pub validate_queries: bool,
    /// Check records against their schema before inserting them
    pub validate_schema: bool,
    /// Redact connection strings and addresses from logged errors
    pub sanitize_errors: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        DEFAULT_SECURITY_CONFIG
    }
}

const DEFAULT_SECURITY_CONFIG: SecurityConfig = SecurityConfig {
    validate_queries: true,
    validate_schema: true,
    sanitize_errors: true,
};

static GLOBAL_CONFIG: RwLock<SecurityConfig> = parking_lot::const_rwlock(DEFAULT_SECURITY_CONFIG);

/// Gets the current security configuration
pub fn get_config() -> SecurityConfig {
    GLOBAL_CONFIG.read().clone()
}

/// Replaces the security configuration
pub fn set_config(config: SecurityConfig) {
    *GLOBAL_CONFIG.write() = config;
}
