use std::{
    future::Future,
    io,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use bytes::BytesMut;
use serde::Deserialize;
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadBuf},
    net::TcpListener,
};
use tracing::{debug, info};

use super::{cors, BodyReader};
use crate::{
    exchange::{ExchangeReader, ExchangeResponder},
    Error, Result,
};

/// HTTP server configuration
/// HTTP 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    /// Address to listen on
    pub addr: SocketAddr,
    /// Path the exchange handler is mounted at
    #[serde(default = "default_path")]
    pub path: String,
    /// When set, wrap the handler to accept CORS requests from this origin
    #[serde(default)]
    pub cors_origin: Option<String>,
}

fn default_path() -> String {
    "/".to_string()
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            path: default_path(),
            cors_origin: None,
        }
    }
}

impl HttpServerConfig {
    /// Parse a configuration from JSON
    /// 从 JSON 解析配置
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Reply half of an inbound exchange.
/// 入站交换的回复写入端。
///
/// Bytes are held until the responder returns, so a failed exchange can
/// still be answered with a bare `400 Bad Request`.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    buf: BytesMut,
}

impl AsyncWrite for ResponseWriter {
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

    // The response stream is finished by the server once the handler returns.
    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Inbound exchange: the request body paired with the response writer.
/// 入站交换：请求体与响应写入端的配对。
#[derive(Debug)]
pub struct HttpExchangeReader {
    body: BodyReader,
    writer: ResponseWriter,
}

impl HttpExchangeReader {
    fn new(body: BodyReader) -> Self {
        Self {
            body,
            writer: ResponseWriter::default(),
        }
    }
}

impl AsyncRead for HttpExchangeReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.body).poll_read(cx, buf)
    }
}

impl ExchangeReader for HttpExchangeReader {
    fn writer(&mut self) -> Result<&mut (dyn AsyncWrite + Send + Unpin)> {
        Ok(&mut self.writer)
    }
}

/// Bridge between HTTP request handling and an [`ExchangeResponder`].
/// HTTP 请求处理与 [`ExchangeResponder`] 之间的桥接。
///
/// Each request becomes one exchange. The responder reads the request body
/// and writes the reply through [`ExchangeReader::writer`]. If it returns an
/// error the client gets `400 Bad Request` with an empty body; otherwise
/// `200 OK` with whatever was written.
#[derive(Clone)]
pub struct HttpExchangeHandler {
    responder: Arc<dyn ExchangeResponder>,
}

impl HttpExchangeHandler {
    /// Create a handler dispatching to `responder`
    pub fn new(responder: Arc<dyn ExchangeResponder>) -> Self {
        Self { responder }
    }

    /// Replace the responder. Meant to be called during setup, before serving.
    pub fn bind_responder(&mut self, responder: Arc<dyn ExchangeResponder>) -> Result<()> {
        self.responder = responder;
        Ok(())
    }

    /// Run one exchange for `request`
    pub async fn handle(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let mut exchange = HttpExchangeReader::new(BodyReader::new(body.into_data_stream()));

        match self.responder.take_reader(&mut exchange).await {
            Ok(()) => {
                debug!(
                    method = %parts.method,
                    uri = %parts.uri,
                    len = exchange.writer.buf.len(),
                    "exchange answered"
                );
                exchange.writer.buf.freeze().into_response()
            }
            Err(e) => {
                debug!(method = %parts.method, uri = %parts.uri, error = %e, "exchange failed");
                StatusCode::BAD_REQUEST.into_response()
            }
        }
    }

    /// Mount the handler at `path` for every method.
    ///
    /// # Panics
    ///
    /// Panics if axum rejects `path` as a route. [`HttpExchangeServer::bind`]
    /// checks the path first and returns an error instead.
    pub fn into_router(self, path: &str) -> Router {
        Router::new()
            .route(path, any(exchange_handler))
            .with_state(Arc::new(self))
    }
}

impl std::fmt::Debug for HttpExchangeHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExchangeHandler").finish_non_exhaustive()
    }
}

async fn exchange_handler(
    State(handler): State<Arc<HttpExchangeHandler>>,
    request: Request,
) -> Response {
    handler.handle(request).await
}

/// Listening HTTP server hosting one [`HttpExchangeHandler`]
/// 承载单个 [`HttpExchangeHandler`] 的 HTTP 服务器
pub struct HttpExchangeServer {
    listener: TcpListener,
    router: Router,
}

impl HttpExchangeServer {
    /// Bind the listener and assemble the router
    pub async fn bind(config: HttpServerConfig, handler: HttpExchangeHandler) -> Result<Self> {
        check_path(&config.path)?;

        let mut router = handler.into_router(&config.path);
        if let Some(origin) = &config.cors_origin {
            router = cors(origin, router)?;
        }

        let listener = TcpListener::bind(config.addr).await?;
        info!(addr = %listener.local_addr()?, path = %config.path, "exchange server listening");

        Ok(Self { listener, router })
    }

    /// Address the server is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the listener fails
    pub async fn serve(self) -> Result<()> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }

    /// Serve until `signal` resolves, then finish in-flight exchanges
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(signal)
            .await?;
        info!("exchange server stopped");
        Ok(())
    }
}

/// Accept only literal paths axum can mount without panicking: a leading `/`,
/// no `{`/`}` captures and no segment starting with `:` or `*`.
fn check_path(path: &str) -> Result<()> {
    let invalid = |reason: &str| -> Result<()> {
        Err(Error::Transport(format!(
            "invalid exchange path {path:?}: {reason}"
        )))
    };

    if !path.starts_with('/') {
        return invalid("must start with '/'");
    }
    if path.contains(['{', '}']) {
        return invalid("must not contain '{' or '}'");
    }
    if path
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    {
        return invalid("segments must not start with ':' or '*'");
    }
    Ok(())
}

impl std::fmt::Debug for HttpExchangeServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExchangeServer")
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http,
    };
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tower::ServiceExt;

    /// Replies with the request body reversed
    struct Reverse;

    #[async_trait]
    impl ExchangeResponder for Reverse {
        async fn take_reader(&self, reader: &mut dyn ExchangeReader) -> Result<()> {
            let mut message = Vec::new();
            reader.read_to_end(&mut message).await?;
            message.reverse();
            reader.writer()?.write_all(&message).await?;
            Ok(())
        }
    }

    /// Writes a partial reply, then fails
    struct WriteThenFail;

    #[async_trait]
    impl ExchangeResponder for WriteThenFail {
        async fn take_reader(&self, reader: &mut dyn ExchangeReader) -> Result<()> {
            reader.writer()?.write_all(b"half a reply").await?;
            Err(Error::Responder("gave up".into()))
        }
    }

    /// Fails on the first read
    struct Reject;

    #[async_trait]
    impl ExchangeResponder for Reject {
        async fn take_reader(&self, _reader: &mut dyn ExchangeReader) -> Result<()> {
            Err(Error::Responder("malformed message".into()))
        }
    }

    fn post(body: &'static [u8]) -> Request {
        http::Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(body))
            .unwrap()
    }

    async fn read_body(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_success_returns_written_bytes() {
        let handler = HttpExchangeHandler::new(Arc::new(Reverse));

        let response = handler.handle(post(b"abc")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_body(response).await, b"cba");
    }

    #[tokio::test]
    async fn test_success_without_writes_is_empty_ok() {
        struct Drain;

        #[async_trait]
        impl ExchangeResponder for Drain {
            async fn take_reader(&self, reader: &mut dyn ExchangeReader) -> Result<()> {
                let mut sink = Vec::new();
                reader.read_to_end(&mut sink).await?;
                Ok(())
            }
        }

        let handler = HttpExchangeHandler::new(Arc::new(Drain));
        let response = handler.handle(post(b"ignored")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(read_body(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_responder_error_is_bad_request() {
        let handler = HttpExchangeHandler::new(Arc::new(Reject));

        let response = handler.handle(post(b"abc")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(read_body(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_partial_writes_are_dropped_on_error() {
        let handler = HttpExchangeHandler::new(Arc::new(WriteThenFail));

        let response = handler.handle(post(b"abc")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(read_body(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_bind_responder_replaces_previous() {
        let mut handler = HttpExchangeHandler::new(Arc::new(Reject));
        handler.bind_responder(Arc::new(Reverse)).unwrap();

        let response = handler.handle(post(b"xy")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_body(response).await, b"yx");
    }

    #[tokio::test]
    async fn test_router_accepts_any_method() {
        let router = HttpExchangeHandler::new(Arc::new(Reverse)).into_router("/exchange");

        let request = http::Request::builder()
            .method("PUT")
            .uri("/exchange")
            .body(Body::from("12"))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_body(response).await, b"21");

        let request = http::Request::builder()
            .method("POST")
            .uri("/elsewhere")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_writer_shutdown_is_noop() {
        let mut writer = ResponseWriter::default();
        writer.write_all(b"kept").await.unwrap();
        writer.shutdown().await.unwrap();
        writer.write_all(b"!").await.unwrap();
        assert_eq!(&writer.buf[..], b"kept!");
    }

    #[test]
    fn test_server_config_defaults() {
        let config = HttpServerConfig::from_json(r#"{"addr": "0.0.0.0:8080"}"#).unwrap();
        assert_eq!(config.addr, SocketAddr::from(([0, 0, 0, 0], 8080)));
        assert_eq!(config.path, "/");
        assert!(config.cors_origin.is_none());

        assert!(matches!(
            HttpServerConfig::from_json(r#"{"path": "/x"}"#),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_check_path() {
        for path in ["/", "/exchange", "/api/v1/exchange", "/a.b-c_d"] {
            assert!(check_path(path).is_ok(), "{path}");
        }
        for path in ["", "exchange", "/{", "/a/{x", "/}", "/{id}", "/:id", "/a/*rest"] {
            assert!(
                matches!(check_path(path), Err(Error::Transport(_))),
                "{path}"
            );
        }
    }

    #[tokio::test]
    async fn test_bind_rejects_route_syntax() {
        for path in ["/{", "/a/{x", "/:id"] {
            let config = HttpServerConfig {
                addr: SocketAddr::from(([127, 0, 0, 1], 0)),
                path: path.into(),
                cors_origin: None,
            };
            let handler = HttpExchangeHandler::new(Arc::new(Reject));
            let result = HttpExchangeServer::bind(config, handler).await;
            assert!(matches!(result, Err(Error::Transport(_))), "{path}");
        }
    }

    #[tokio::test]
    async fn test_bind_rejects_relative_path() {
        let config = HttpServerConfig {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            path: "exchange".into(),
            cors_origin: None,
        };
        let handler = HttpExchangeHandler::new(Arc::new(Reject));
        let result = HttpExchangeServer::bind(config, handler).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
