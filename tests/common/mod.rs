//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use littletools::config::{AppConfig, Settings};
use littletools::http::{HttpClient, HttpServer, ReqwestClient};
use littletools::net::{BindTarget, Listener};
use littletools::{handlers, Shutdown};

/// A server running on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server task to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server should stop")
            .unwrap()
            .unwrap();
    }
}

/// Start the real server with every endpoint registered.
pub async fn start_server(config: AppConfig) -> TestServer {
    let target: BindTarget = "127.0.0.1:0".parse().unwrap();
    let listener = Listener::bind(&target).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let client: Arc<dyn HttpClient> =
        Arc::new(ReqwestClient::new(Duration::from_secs(1), Duration::from_secs(5)).unwrap());
    let server = HttpServer::new(
        Arc::new(Settings::new(config)),
        handlers::routes().unwrap(),
        client,
    );

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let handle = tokio::spawn(server.run(listener, receiver));

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

/// Start a mock backend that answers every request with the given extra
/// header lines and body.
#[allow(dead_code)]
pub async fn start_mock_backend(headers: &'static [&'static str], body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let mut response = String::from("HTTP/1.1 200 OK\r\n");
                        for header in headers {
                            response.push_str(header);
                            response.push_str("\r\n");
                        }
                        response.push_str(&format!(
                            "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        ));
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// A client that talks to the test server directly and never follows
/// redirects.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
