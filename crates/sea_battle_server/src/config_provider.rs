use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Bind attempts before the server refuses to run, spaced one
    /// second apart.
    pub init_attempts: u32,
    pub max_users: usize,
    pub max_user_name_length: usize,
    pub min_players_in_session: usize,
    /// Socket read timeout; a peer silent for longer is dropped.
    pub read_timeout: Duration,
    /// PASSWORD packets accepted before a failed login disconnects.
    pub login_attempts: u32,
    /// Capacity of each session's event queue.
    pub event_queue_size: usize,
}

impl ServerConfig {
    pub fn listen_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

pub trait ConfigProvider {
    fn server_config(&self) -> Arc<ServerConfig>;
}

mod default {
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config_provider::{ConfigProvider, ServerConfig};

    pub struct DefaultServerConfig;

    impl ConfigProvider for DefaultServerConfig {
        fn server_config(&self) -> Arc<ServerConfig> {
            Arc::new(ServerConfig {
                host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                port: 64221,
                init_attempts: 100,
                max_users: 20,
                max_user_name_length: 30,
                min_players_in_session: 2,
                read_timeout: Duration::from_secs(10),
                login_attempts: 4,
                event_queue_size: 100,
            })
        }
    }
}

pub fn default_config_provider() -> Arc<dyn ConfigProvider + Send + Sync> {
    Arc::new(default::DefaultServerConfig {})
}
