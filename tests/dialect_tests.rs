//! Socket-level sessions against the two TCP dialects.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use g5500d::mount::SimMode;
use g5500d::services::{rotctld, web};
use g5500d::state::SharedState;
use g5500d::surface::Rotator;

fn sim_rotator() -> Arc<Rotator> {
    let shared = Arc::new(SharedState::new());
    let rotator = Rotator::new(shared, None);
    rotator.set_sim_mode(SimMode::El180);
    Arc::new(rotator)
}

async fn connect(addr: std::net::SocketAddr) -> (BufReader<OwnedReadHalf>, OwnedWriteHalf) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, write_half) = stream.into_split();
    (BufReader::new(read_half), write_half)
}

async fn roundtrip(
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    command: &str,
) -> String {
    writer.write_all(command.as_bytes()).await.unwrap();
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    line
}

// ============================================================================
// rotctld dialect
// ============================================================================

#[tokio::test]
async fn rotctld_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(rotctld::serve(listener, sim_rotator()));

    let (mut reader, mut writer) = connect(addr).await;

    assert_eq!(roundtrip(&mut reader, &mut writer, "P 20 30\n").await, "RPRT 0\n");

    // get_pos answers two bare lines.
    writer.write_all(b"p\n").await.unwrap();
    let mut az = String::new();
    let mut el = String::new();
    reader.read_line(&mut az).await.unwrap();
    reader.read_line(&mut el).await.unwrap();
    assert_eq!((az.as_str(), el.as_str()), ("0\n", "0\n"));

    assert_eq!(roundtrip(&mut reader, &mut writer, "S\n").await, "RPRT 0\n");
    assert_eq!(
        roundtrip(&mut reader, &mut writer, "P 9999 0\n").await,
        "RPRT -1\n"
    );
    assert_eq!(
        roundtrip(&mut reader, &mut writer, "_\n").await,
        "Yaesu G5500 on RPi\n"
    );
}

#[tokio::test]
async fn rotctld_extended_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(rotctld::serve(listener, sim_rotator()));

    let (mut reader, mut writer) = connect(addr).await;

    // The `;`-joined form comes back as one line.
    assert_eq!(
        roundtrip(&mut reader, &mut writer, ";\\get_pos\n").await,
        "get_pos:;Azimuth: 0;Elevation: 0;RPRT 0\n"
    );
}

#[tokio::test]
async fn rotctld_allows_only_one_client() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(rotctld::serve(listener, sim_rotator()));

    let (mut reader1, mut writer1) = connect(addr).await;
    // Complete a roundtrip so the first client definitely holds the slot.
    assert_eq!(roundtrip(&mut reader1, &mut writer1, "S\n").await, "RPRT 0\n");

    // The second connection is refused outright.
    let stream2 = TcpStream::connect(addr).await.unwrap();
    let (read2, mut write2) = stream2.into_split();
    let _ = write2.write_all(b"S\n").await;
    let mut reader2 = BufReader::new(read2);
    let mut line = String::new();
    match reader2.read_line(&mut line).await {
        Ok(n) => assert_eq!(n, 0, "second client unexpectedly got a reply: {line:?}"),
        Err(_) => {} // reset is fine too
    }

    // The first client is unaffected.
    assert_eq!(roundtrip(&mut reader1, &mut writer1, "S\n").await, "RPRT 0\n");
}

// ============================================================================
// web dialect
// ============================================================================

#[tokio::test]
async fn web_direct_session_is_persistent() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(web::serve(listener, sim_rotator()));

    let (mut reader, mut writer) = connect(addr).await;

    assert_eq!(roundtrip(&mut reader, &mut writer, "get_pos\n").await, "0 0\n");
    assert_eq!(
        roundtrip(&mut reader, &mut writer, "set_pos?az=10&el=20\n").await,
        "ok\n"
    );
    assert_eq!(
        roundtrip(&mut reader, &mut writer, "get_setpos\n").await,
        "10 20\n"
    );
    assert_eq!(roundtrip(&mut reader, &mut writer, "stop\n").await, "ok\n");
}

#[tokio::test]
async fn web_http_request_serves_the_page_and_closes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(web::serve(listener, sim_rotator()));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.0\r\nHost: test\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(response.contains("Content-Type: text/html"));
    assert!(response.contains("<html"));
}

#[tokio::test]
async fn web_http_command_gets_plain_text() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(web::serve(listener, sim_rotator()));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /get_pos HTTP/1.1\r\nHost: test\r\nAccept: */*\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(response.contains("Content-Type: text/plain"));
    assert!(response.ends_with("0 0\n"));
}

#[tokio::test]
async fn web_status_json_over_http() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(web::serve(listener, sim_rotator()));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /status HTTP/1.0\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    let body = response.split("\r\n\r\n").nth(1).unwrap();
    let json: serde_json::Value = serde_json::from_str(body.trim()).unwrap();
    assert_eq!(json["state"], "stop");
    assert_eq!(json["simulator"], 3);
}
