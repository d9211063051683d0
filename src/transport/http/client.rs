use std::{
    collections::BTreeMap,
    io,
    pin::Pin,
    sync::{Arc, OnceLock},
    task::{Context, Poll},
    time::Duration,
};

use async_trait::async_trait;
use bytes::BytesMut;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tokio::io::AsyncWrite;
use tracing::{debug, trace};

use super::{BodyReader, OCTET_STREAM};
use crate::{
    exchange::{ExchangeWriter, ExchangeWriterSource},
    Error, Result,
};

/// HTTP client configuration
/// HTTP 客户端配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpClientConfig {
    /// Address every exchange is posted to
    pub address: String,
    /// Whole-request timeout in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl HttpClientConfig {
    /// Parse a configuration from JSON
    /// 从 JSON 解析配置
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Client shared by every endpoint created without its own.
///
/// Built on first use. A failure to build (e.g. TLS backend setup) is
/// returned to the sender and not cached.
fn default_client() -> Result<Client> {
    static DEFAULT: OnceLock<Client> = OnceLock::new();
    if let Some(client) = DEFAULT.get() {
        return Ok(client.clone());
    }

    let client = Client::builder().build()?;
    Ok(DEFAULT.get_or_init(|| client).clone())
}

/// Fixed exchange target reached through HTTP POST.
/// 通过 HTTP POST 访问的固定交换端点。
///
/// Cloning is cheap; clones share the address and the connection pool.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    address: Arc<str>,
    client: Option<Client>,
}

impl HttpEndpoint {
    /// Create an endpoint for `address`.
    ///
    /// When `client` is `None` the process-wide default client is used; it
    /// is built on the first send, which reports any failure to build it.
    /// The address is not validated here; a malformed one fails on send.
    pub fn new(address: impl Into<String>, client: Option<Client>) -> Self {
        Self {
            address: Arc::from(address.into()),
            client,
        }
    }

    /// Create an endpoint from configuration
    /// 根据配置创建端点
    pub fn from_config(config: &HttpClientConfig) -> Result<Self> {
        if config.timeout_ms.is_none() && config.headers.is_empty() {
            return Ok(Self::new(config.address.clone(), None));
        }

        let mut headers = header::HeaderMap::new();
        for (name, value) in &config.headers {
            let name = header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Transport(e.to_string()))?;
            headers.insert(name, header::HeaderValue::from_str(value)?);
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }

        Ok(Self::new(config.address.clone(), Some(builder.build()?)))
    }

    /// Target address
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl ExchangeWriterSource for HttpEndpoint {
    type Writer = HttpExchangeWriter;

    fn new_writer(&self) -> Result<HttpExchangeWriter> {
        Ok(HttpExchangeWriter {
            buf: BytesMut::new(),
            endpoint: self.clone(),
        })
    }
}

/// Outgoing half of an HTTP exchange.
/// HTTP 交换的发送端。
///
/// Written bytes are buffered; the request is only sent by
/// [`ExchangeWriter::into_reader`].
#[derive(Debug)]
pub struct HttpExchangeWriter {
    buf: BytesMut,
    endpoint: HttpEndpoint,
}

impl HttpExchangeWriter {
    /// Bytes buffered so far
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }
}

impl AsyncWrite for HttpExchangeWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.buf.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    // The response body, if any, is released by the reader.
    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl ExchangeWriter for HttpExchangeWriter {
    type Reader = BodyReader;

    async fn into_reader(self) -> Result<BodyReader> {
        let Self { buf, endpoint } = self;
        trace!(address = %endpoint.address, len = buf.len(), "sending exchange");

        let client = match endpoint.client {
            Some(client) => client,
            None => default_client()?,
        };

        let response = client
            .post(&*endpoint.address)
            .header(header::CONTENT_TYPE, OCTET_STREAM)
            .body(buf.freeze())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!(address = %endpoint.address, %status, "exchange rejected");
            return Err(Error::Status(status));
        }

        Ok(BodyReader::new(response.bytes_stream()))
    }
}
