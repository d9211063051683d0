use async_trait::async_trait;
use msg_http::{
    Error, ExchangeReader, ExchangeResponder, ExchangeWriter, ExchangeWriterSource,
    HttpClientConfig, HttpEndpoint, HttpExchangeHandler, HttpExchangeServer, HttpServerConfig,
    Result,
};
use std::{sync::Arc, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    sync::oneshot,
    time::sleep,
};

const SERVER_CONFIG: &str = r#"{"addr": "127.0.0.1:3000", "path": "/exchange"}"#;
const TOTAL_PINGS: usize = 3;
const PING_INTERVAL: Duration = Duration::from_millis(200);

/// 服务端：收到 "ping" 时回复 "pong"
/// Server side: answers "ping" with "pong"
struct Pong;

#[async_trait]
impl ExchangeResponder for Pong {
    async fn take_reader(&self, reader: &mut dyn ExchangeReader) -> Result<()> {
        let mut message = Vec::new();
        reader.read_to_end(&mut message).await?;
        if message != b"ping" {
            return Err(Error::Responder("expected ping".into()));
        }

        reader.writer()?.write_all(b"pong").await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    // 启动服务器
    // Start server
    let config = HttpServerConfig::from_json(SERVER_CONFIG)?;
    let handler = HttpExchangeHandler::new(Arc::new(Pong));
    let server = HttpExchangeServer::bind(config, handler).await?;
    let url = format!("http://{}/exchange", server.local_addr()?);

    let (tx, rx) = oneshot::channel::<()>();
    let server_handle = tokio::spawn(server.serve_with_shutdown(async move {
        rx.await.ok();
    }));

    // 配置客户端
    // Configure client
    let endpoint = HttpEndpoint::from_config(&HttpClientConfig {
        address: url,
        timeout_ms: Some(2_000),
        ..Default::default()
    })?;

    for n in 1..=TOTAL_PINGS {
        eprintln!("Sending ping #{}", n);
        let mut writer = endpoint.new_writer()?;
        writer.write_all(b"ping").await?;

        let mut reader = writer.into_reader().await?;
        let mut reply = String::new();
        reader.read_to_string(&mut reply).await?;
        eprintln!("Received {} #{}", reply, n);

        sleep(PING_INTERVAL).await;
    }

    // 非 ping 消息会得到 400
    // Anything other than ping is rejected with 400
    let mut writer = endpoint.new_writer()?;
    writer.write_all(b"hello").await?;
    match writer.into_reader().await {
        Err(e) => eprintln!("Rejected as expected: {}", e),
        Ok(_) => eprintln!("Unexpected reply to hello"),
    }

    tx.send(()).ok();
    server_handle
        .await
        .map_err(|e| Error::Transport(e.to_string()))??;
    eprintln!("Server stopped");
    Ok(())
}
