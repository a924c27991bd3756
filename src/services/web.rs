//! Permissive web/direct TCP dialect.
//!
//! Each connection speaks either plain command lines or HTTP. The first
//! line decides: `GET /cmd HTTP/1.x` is treated as a browser request (the
//! remaining headers are consumed, a plain-text preamble is prepended, and
//! the connection closes after one reply), anything else is taken as a bare
//! command on a persistent connection. This keeps the port equally usable
//! from a browser, `curl`, and `nc`.
//!
//! `index.html` (or an empty command) serves the embedded status page;
//! `status` returns a JSON telemetry snapshot for it.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::MAX_WEB_CLIENTS;
use crate::mount::MoveDirection;
use crate::surface::Rotator;

/// The embedded status page.
const STATUS_PAGE: &str = include_str!("status.html");

/// One reply body, tagged with its content type for the HTTP preamble.
#[derive(Debug, PartialEq)]
pub enum Reply {
    /// Plain-text command output.
    Text(String),
    /// The HTML status page.
    Page,
}

impl Reply {
    fn body(&self) -> &str {
        match self {
            Reply::Text(text) => text,
            Reply::Page => STATUS_PAGE,
        }
    }

    fn content_type(&self) -> &'static str {
        match self {
            Reply::Text(_) => "text/plain; charset=us-ascii",
            Reply::Page => "text/html; charset=us-ascii",
        }
    }
}

/// Bind and serve the dialect until the process exits.
pub async fn run_server(rotator: Arc<Rotator>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "web dialect listening");
    serve(listener, rotator).await
}

/// Serve the dialect on an already-bound listener.
pub async fn serve(listener: TcpListener, rotator: Arc<Rotator>) -> std::io::Result<()> {
    let clients = Arc::new(Semaphore::new(MAX_WEB_CLIENTS));
    loop {
        let (stream, peer) = listener.accept().await?;
        match Arc::clone(&clients).try_acquire_owned() {
            Ok(permit) => {
                debug!(%peer, "web client connected");
                let rotator = Arc::clone(&rotator);
                tokio::spawn(async move {
                    if let Err(e) = serve_client(stream, rotator).await {
                        debug!(%peer, %e, "web client error");
                    }
                    debug!(%peer, "web client closed");
                    drop(permit);
                });
            }
            Err(_) => {
                warn!(%peer, "too many web clients, refusing");
            }
        }
    }
}

async fn serve_client(stream: TcpStream, rotator: Arc<Rotator>) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let trimmed = line.trim();
        debug!(line = trimmed, "web rx");

        let is_http = trimmed.starts_with("GET /") && trimmed.contains("HTTP");
        let command = if is_http {
            // Everything between the slash and the next space; `GET / ...`
            // yields the empty command, i.e. the status page.
            let command = trimmed[5..].split(' ').next().unwrap_or("");
            let command = command.to_string();
            // Consume and ignore the request headers.
            loop {
                let mut header = String::new();
                if reader.read_line(&mut header).await? == 0 {
                    break;
                }
                if header == "\r\n" || header == "\n" {
                    break;
                }
            }
            command
        } else {
            trimmed
                .split_whitespace()
                .next()
                .unwrap_or("")
                .to_string()
        };

        let reply = respond(&command, &rotator);
        if is_http {
            let body = reply.body();
            write_half
                .write_all(
                    format!(
                        "HTTP/1.0 200 OK\r\n\
                         Server: g5500d\r\n\
                         Content-Type: {}\r\n\
                         Content-Length: {}\r\n\
                         Connection: close\r\n\r\n",
                        reply.content_type(),
                        body.len(),
                    )
                    .as_bytes(),
                )
                .await?;
            write_half.write_all(body.as_bytes()).await?;
            return Ok(());
        }
        write_half.write_all(reply.body().as_bytes()).await?;
    }
}

fn fmt_deg(value: f32) -> String {
    let s = format!("{value:.2}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn parse_set_pos(query: &str) -> Option<(f32, f32)> {
    let rest = query.strip_prefix("set_pos?az=")?;
    let (az, el) = rest.split_once("&el=")?;
    Some((az.parse().ok()?, el.parse().ok()?))
}

/// Produce the reply for one command.
pub fn respond(command: &str, rotator: &Rotator) -> Reply {
    if command.is_empty() || command == "index.html" {
        return Reply::Page;
    }

    let text = match command {
        "get_pos" => match rotator.get_position() {
            Ok((az, el)) => format!("{} {}\n", fmt_deg(az), fmt_deg(el)),
            Err(e) => format!("err: can not get position, code {}\n", e.code()),
        },

        "get_setpos" => {
            let (az, el) = rotator.last_setpoint();
            format!("{} {}\n", fmt_deg(az), fmt_deg(el))
        }

        "park" => match rotator.park() {
            Ok(()) => "ok\n".to_string(),
            Err(e) => format!("err: error parking, code {}\n", e.code()),
        },

        "stop" => match rotator.stop() {
            Ok(()) => "ok\n".to_string(),
            Err(e) => format!("err: error stopping, code {}\n", e.code()),
        },

        "get_info" => format!("{}\n", rotator.get_info()),

        "dump_caps" => {
            let caps = rotator.caps();
            format!(
                "Azimuth {} .. {} Elevation {} .. {}\n",
                fmt_deg(caps.min_az),
                fmt_deg(caps.max_az),
                fmt_deg(caps.min_el),
                fmt_deg(caps.max_el),
            )
        }

        "status" => match serde_json::to_string(&rotator.snapshot()) {
            Ok(json) => format!("{json}\n"),
            Err(e) => format!("err: {e}\n"),
        },

        "help" => "Available commands:\n\
             \x20   get_pos\n\
             \x20   get_setpos\n\
             \x20   set_pos?az=x&el=y\n\
             \x20   move?direction=[up,down,left,right]\n\
             \x20   park\n\
             \x20   stop\n\
             \x20   get_info\n\
             \x20   dump_caps\n\
             \x20   status\n"
            .to_string(),

        _ => {
            if command.starts_with("set_pos?") {
                match parse_set_pos(command) {
                    Some((az, el)) => match rotator.set_position(az, el) {
                        Ok(()) => "ok\n".to_string(),
                        Err(e) => {
                            format!("err: can not set position, code {}\n", e.code())
                        }
                    },
                    None => "err: malformed set_pos\n".to_string(),
                }
            } else if let Some(name) = command.strip_prefix("move?direction=") {
                match MoveDirection::from_name(name) {
                    Some(direction) => match rotator.slew(direction) {
                        Ok(()) => "ok\n".to_string(),
                        Err(e) => {
                            format!("err: error moving {name}, code {}\n", e.code())
                        }
                    },
                    None => "err: unknown direction\n".to_string(),
                }
            } else {
                "err: unrecognized command\n".to_string()
            }
        }
    };

    Reply::Text(text)
}
