//! Minimal in-process HTTP/1.1 server for integration tests. No mocks: the
//! client talks to a real socket that plays back a scripted response.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What the server sends back for one request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 with a chunked body, one HTTP chunk per entry, then a clean end.
    Stream(Vec<Vec<u8>>),
    /// 200 with these chunks, then the connection drops mid-body.
    Truncated(Vec<Vec<u8>>),
    /// Non-success status with a JSON body.
    Status(u16, String),
}

impl Reply {
    pub fn text(parts: &[&str]) -> Self {
        Reply::Stream(parts.iter().map(|p| p.as_bytes().to_vec()).collect())
    }
}

/// Running test server and the JSON bodies it received.
pub struct TestServer {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl TestServer {
    pub fn received(&self) -> Vec<serde_json::Value> {
        self.requests.lock().unwrap().clone()
    }
}

/// Delay between body chunks so they reach the client separately.
pub const CHUNK_DELAY: Duration = Duration::from_millis(30);

/// Spawn on the current tokio runtime; serves one reply per connection, in order.
pub async fn spawn(replies: Vec<Reply>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    tokio::spawn(serve(listener, replies, requests.clone()));
    TestServer {
        base_url: format!("http://127.0.0.1:{}", port),
        requests,
    }
}

/// Spawn on a dedicated thread, for tests that drive the binary.
pub fn spawn_in_thread(replies: Vec<Reply>) -> TestServer {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = std_listener.local_addr().unwrap().port();
    std_listener.set_nonblocking(true).unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let sink = requests.clone();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = TcpListener::from_std(std_listener).unwrap();
            serve(listener, replies, sink).await;
            // Keep the socket alive long enough for the client to finish reading.
            tokio::time::sleep(Duration::from_millis(200)).await;
        });
    });
    TestServer {
        base_url: format!("http://127.0.0.1:{}", port),
        requests,
    }
}

/// A port with nothing listening on it.
pub fn free_port() -> u16 {
    let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    l.local_addr().unwrap().port()
}

async fn serve(
    listener: TcpListener,
    replies: Vec<Reply>,
    requests: Arc<Mutex<Vec<serde_json::Value>>>,
) {
    for reply in replies {
        let (mut tcp, _) = listener.accept().await.unwrap();
        let body = read_request(&mut tcp).await;
        requests.lock().unwrap().push(body);
        write_reply(&mut tcp, reply).await;
    }
}

async fn read_request(tcp: &mut TcpStream) -> serde_json::Value {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = tcp.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = tcp.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending body");
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = &buf[header_end..header_end + content_length];
    serde_json::from_slice(body).unwrap_or(serde_json::Value::Null)
}

async fn write_reply(tcp: &mut TcpStream, reply: Reply) {
    match reply {
        Reply::Stream(chunks) => {
            write_chunks(tcp, &chunks).await;
            tcp.write_all(b"0\r\n\r\n").await.unwrap();
            tcp.flush().await.unwrap();
        }
        Reply::Truncated(chunks) => {
            write_chunks(tcp, &chunks).await;
            tokio::time::sleep(CHUNK_DELAY).await;
        }
        Reply::Status(code, body) => {
            let head = format!(
                "HTTP/1.1 {} Error\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                code,
                body.len()
            );
            tcp.write_all(head.as_bytes()).await.unwrap();
            tcp.write_all(body.as_bytes()).await.unwrap();
            tcp.flush().await.unwrap();
        }
    }
    let _ = tcp.shutdown().await;
}

async fn write_chunks(tcp: &mut TcpStream, chunks: &[Vec<u8>]) {
    tcp.write_all(
        b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
    )
    .await
    .unwrap();
    tcp.flush().await.unwrap();
    for chunk in chunks {
        let mut frame = format!("{:x}\r\n", chunk.len()).into_bytes();
        frame.extend_from_slice(chunk);
        frame.extend_from_slice(b"\r\n");
        tcp.write_all(&frame).await.unwrap();
        tcp.flush().await.unwrap();
        tokio::time::sleep(CHUNK_DELAY).await;
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
