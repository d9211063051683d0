//! Concrete carriers for the exchange contract.

use serde::Deserialize;

use crate::{Error, Result};

use self::http::{
    HttpClientConfig, HttpEndpoint, HttpExchangeHandler, HttpExchangeServer, HttpServerConfig,
};

pub mod http;

/// Transport configuration
/// 传输配置
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Transport type
    pub transport_type: TransportType,
}

/// Transport type: which side of an exchange this process plays
/// 传输类型：本进程在交换中扮演的角色
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportType {
    /// Initiate exchanges by posting to a remote address
    HttpClient(HttpClientConfig),
    /// Answer exchanges posted to a local listener
    HttpServer(HttpServerConfig),
}

impl TransportConfig {
    /// Parse a configuration from JSON
    /// 从 JSON 解析配置
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build the client side; fails for a server configuration
    pub fn endpoint(&self) -> Result<HttpEndpoint> {
        match &self.transport_type {
            TransportType::HttpClient(config) => HttpEndpoint::from_config(config),
            TransportType::HttpServer(_) => Err(Error::Transport(
                "server transport cannot initiate exchanges".into(),
            )),
        }
    }

    /// Bind the server side; fails for a client configuration
    pub async fn bind(self, handler: HttpExchangeHandler) -> Result<HttpExchangeServer> {
        match self.transport_type {
            TransportType::HttpServer(config) => HttpExchangeServer::bind(config, handler).await,
            TransportType::HttpClient(_) => Err(Error::Transport(
                "client transport cannot answer exchanges".into(),
            )),
        }
    }
}
