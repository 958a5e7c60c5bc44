//! Client and server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{Address, Generation};

/// Client transactor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Our own link address. Clients conventionally use the broadcast
    /// address.
    #[serde(default = "default_client_address")]
    pub address: Address,

    /// Password sent in the auth word of every request.
    #[serde(default)]
    pub password: u32,

    /// How long to wait for a response frame.
    #[serde(default = "default_receive_timeout", with = "humantime_serde")]
    pub receive_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: default_client_address(),
            password: 0,
            receive_timeout: default_receive_timeout(),
        }
    }
}

/// Server dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Meter address to answer under.
    #[serde(default = "default_server_address")]
    pub address: Address,

    /// Status word placed in the auth field of every response.
    #[serde(default)]
    pub status: u32,

    /// Generation family to impersonate; selects the encodings the default
    /// handlers produce.
    #[serde(default = "default_generation")]
    pub generation: Generation,

    /// Receive window of a single [`poll`](crate::server::Server::poll)
    /// call. Kept short so the host loop stays responsive.
    #[serde(default = "default_poll_timeout", with = "humantime_serde")]
    pub poll_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_server_address(),
            status: 0,
            generation: default_generation(),
            poll_timeout: default_poll_timeout(),
        }
    }
}

fn default_client_address() -> Address {
    Address::BROADCAST
}

fn default_server_address() -> Address {
    Address::new(0x0001)
}

fn default_generation() -> Generation {
    Generation::New
}

fn default_receive_timeout() -> Duration {
    Duration::from_millis(5000)
}

fn default_poll_timeout() -> Duration {
    Duration::from_millis(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_conventions() {
        let client = ClientConfig::default();
        assert_eq!(client.address, Address::BROADCAST);
        assert_eq!(client.receive_timeout, Duration::from_secs(5));

        let server = ServerConfig::default();
        assert_eq!(server.address, Address::new(0x0001));
        assert_eq!(server.generation, Generation::New);
        assert_eq!(server.poll_timeout, Duration::from_millis(100));
    }
}
