//! Exchanges carried over HTTP POST request/response cycles.
//!
//! The client side buffers the outgoing message and sends it as a single
//! request body once the caller asks for the reply. The server side exposes
//! the request body as the inbound message and the response body as the
//! reply.

pub mod body;
pub mod client;
pub mod cors;
pub mod server;

/// Content type of every exchange request
pub const OCTET_STREAM: &str = "application/octet-stream";

pub use self::body::BodyReader;
pub use self::client::{HttpClientConfig, HttpEndpoint, HttpExchangeWriter};
pub use self::cors::cors;
pub use self::server::{
    HttpExchangeHandler, HttpExchangeReader, HttpExchangeServer, HttpServerConfig, ResponseWriter,
};
