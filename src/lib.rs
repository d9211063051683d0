pub mod error;
pub mod exchange;
pub mod transport;

pub use error::Error;
pub use exchange::*;
pub use transport::http::{
    cors, HttpClientConfig, HttpEndpoint, HttpExchangeHandler, HttpExchangeReader,
    HttpExchangeServer, HttpExchangeWriter, HttpServerConfig,
};
pub use transport::{TransportConfig, TransportType};

/// Result type for exchange operations
pub type Result<T> = std::result::Result<T, Error>;
