//! Hamlib rotctld-compatible TCP dialect.
//!
//! Commands arrive one per line in four variations, shown here for
//! `get_pos`:
//!
//! ```text
//! p              one bare value per line
//! \get_pos       same as the single letter
//! +\get_pos      echo, labeled key/value lines, then "RPRT n"
//! ;\get_pos      the same lines joined by the punctuation character
//! ```
//!
//! (`;`, `|`, and `,` are all accepted as joiners.) Set-style commands
//! answer `RPRT n`, where `n` is 0 or one of the negative codes from
//! [`RotError`](crate::error::RotError).
//!
//! Only one client is served at a time: a second controller would have no
//! way to know the position the first one commanded.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::MAX_ROT_CLIENTS;
use crate::error::reply_code;
use crate::mount::MoveDirection;
use crate::surface::Rotator;

/// Bind and serve the dialect until the process exits.
pub async fn run_server(rotator: Arc<Rotator>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "rotctld dialect listening");
    serve(listener, rotator).await
}

/// Serve the dialect on an already-bound listener.
pub async fn serve(listener: TcpListener, rotator: Arc<Rotator>) -> std::io::Result<()> {
    let clients = Arc::new(Semaphore::new(MAX_ROT_CLIENTS));
    loop {
        let (stream, peer) = listener.accept().await?;
        match Arc::clone(&clients).try_acquire_owned() {
            Ok(permit) => {
                debug!(%peer, "rotctld client connected");
                let rotator = Arc::clone(&rotator);
                tokio::spawn(async move {
                    if let Err(e) = serve_client(stream, rotator).await {
                        debug!(%peer, %e, "rotctld client error");
                    }
                    debug!(%peer, "rotctld client closed");
                    drop(permit);
                });
            }
            Err(_) => {
                warn!(%peer, "too many rotctld clients, refusing");
            }
        }
    }
}

async fn serve_client(stream: TcpStream, rotator: Arc<Rotator>) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    while let Some(line) = lines.next_line().await? {
        debug!(line = %line, "rotctld rx");
        let reply = respond(&line, &rotator);
        write_half.write_all(reply.as_bytes()).await?;
    }
    Ok(())
}

/// Degrees on the wire: two decimals, trailing zeros trimmed.
fn fmt_deg(value: f32) -> String {
    let s = format!("{value:.2}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn rprt(code: i32) -> String {
    format!("RPRT {code}\n")
}

/// The legal joiner prefixes for the extended forms. `+` means newline.
fn punct_sep(line: &str) -> Option<(char, &str)> {
    let mut chars = line.chars();
    let first = chars.next()?;
    match first {
        '+' => Some(('\n', chars.as_str())),
        ';' | '|' | ',' => Some((first, chars.as_str())),
        _ => None,
    }
}

fn parse_two_floats(args: &str) -> Option<(f32, f32)> {
    let mut parts = args.split_whitespace();
    let a = parts.next()?.parse().ok()?;
    let b = parts.next()?.parse().ok()?;
    Some((a, b))
}

fn parse_two_ints(args: &str) -> Option<(i32, i32)> {
    let mut parts = args.split_whitespace();
    let a = parts.next()?.parse().ok()?;
    let b = parts.next()?.parse().ok()?;
    Some((a, b))
}

fn dump_caps(rotator: &Rotator) -> String {
    let caps = rotator.caps();
    format!(
        "Min Azimuth: {}\nMax Azimuth: {}\nMin Elevation: {}\nMax Elevation: {}\nRPRT 0\n",
        fmt_deg(caps.min_az),
        fmt_deg(caps.max_az),
        fmt_deg(caps.min_el),
        fmt_deg(caps.max_el),
    )
}

fn dump_state(rotator: &Rotator) -> String {
    let (az, el) = rotator.get_position().unwrap_or((0.0, 0.0));
    let caps = rotator.caps();
    format!(
        "Azimuth: {}\nElevation: {}\nMin Azimuth: {}\nMax Azimuth: {}\nMin Elevation: {}\nMax Elevation: {}\nRPRT 0\n",
        fmt_deg(az),
        fmt_deg(el),
        fmt_deg(caps.min_az),
        fmt_deg(caps.max_az),
        fmt_deg(caps.min_el),
        fmt_deg(caps.max_el),
    )
}

fn slew_by_wire(rotator: &Rotator, direction: i32) -> Result<(), crate::error::RotError> {
    match MoveDirection::from_wire(direction) {
        Some(dir) => rotator.slew(dir),
        None => Err(crate::error::RotError::BadArgs),
    }
}

/// Produce the reply for one received line.
pub fn respond(line: &str, rotator: &Rotator) -> String {
    let line = line.trim();

    if let Some((sep, rest)) = punct_sep(line) {
        return respond_extended(sep, rest, rotator);
    }

    match line {
        "p" | "\\get_pos" => match rotator.get_position() {
            Ok((az, el)) => format!("{}\n{}\n", fmt_deg(az), fmt_deg(el)),
            Err(e) => rprt(e.code()),
        },
        "K" | "\\park" => rprt(reply_code(&rotator.park())),
        "S" | "\\stop" => rprt(reply_code(&rotator.stop())),
        "_" | "\\get_info" => format!("{}\n", rotator.get_info()),
        "1" | "\\dump_caps" => dump_caps(rotator),
        "2" | "\\dump_state" => dump_state(rotator),
        _ => {
            if let Some(args) = line
                .strip_prefix("P ")
                .or_else(|| line.strip_prefix("\\set_pos "))
            {
                return match parse_two_floats(args) {
                    Some((az, el)) => rprt(reply_code(&rotator.set_position(az, el))),
                    None => rprt(-1),
                };
            }
            if let Some(args) = line
                .strip_prefix("M ")
                .or_else(|| line.strip_prefix("\\move "))
            {
                return match parse_two_ints(args) {
                    // The second number is a speed; this mount has none.
                    Some((direction, _speed)) => {
                        rprt(reply_code(&slew_by_wire(rotator, direction)))
                    }
                    None => rprt(-1),
                };
            }
            rprt(-1)
        }
    }
}

fn respond_extended(sep: char, rest: &str, rotator: &Rotator) -> String {
    match rest {
        "\\get_pos" => {
            let result = rotator.get_position();
            let (az, el) = result.unwrap_or((0.0, 0.0));
            format!(
                "get_pos:{sep}Azimuth: {}{sep}Elevation: {}{sep}RPRT {}\n",
                fmt_deg(az),
                fmt_deg(el),
                reply_code(&result),
            )
        }
        "\\park" => format!("park:{sep}RPRT {}\n", reply_code(&rotator.park())),
        "\\stop" => format!("stop:{sep}RPRT {}\n", reply_code(&rotator.stop())),
        "\\get_info" => format!("get_info:{sep}Info: {}{sep}RPRT 0\n", rotator.get_info()),
        "\\dump_caps" => dump_caps(rotator),
        "\\dump_state" => dump_state(rotator),
        _ => {
            if let Some(args) = rest.strip_prefix("\\set_pos ") {
                return match parse_two_floats(args) {
                    Some((az, el)) => format!(
                        "set_pos: {} {}{sep}RPRT {}\n",
                        fmt_deg(az),
                        fmt_deg(el),
                        reply_code(&rotator.set_position(az, el)),
                    ),
                    None => rprt(-1),
                };
            }
            if let Some(args) = rest.strip_prefix("\\move ") {
                return match parse_two_ints(args) {
                    Some((direction, speed)) => format!(
                        "move: {direction} {speed}{sep}RPRT {}\n",
                        reply_code(&slew_by_wire(rotator, direction)),
                    ),
                    None => rprt(-1),
                };
            }
            rprt(-1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::SimMode;
    use crate::state::SharedState;

    fn sim_rotator() -> Rotator {
        let shared = Arc::new(SharedState::new());
        let rotator = Rotator::new(shared, None);
        rotator.set_sim_mode(SimMode::El180);
        rotator
    }

    #[test]
    fn get_pos_plain_forms() {
        let rotator = sim_rotator();
        assert_eq!(respond("p", &rotator), "0\n0\n");
        assert_eq!(respond("\\get_pos", &rotator), "0\n0\n");
    }

    #[test]
    fn get_pos_extended_forms() {
        let rotator = sim_rotator();
        assert_eq!(
            respond("+\\get_pos", &rotator),
            "get_pos:\nAzimuth: 0\nElevation: 0\nRPRT 0\n"
        );
        assert_eq!(
            respond(";\\get_pos", &rotator),
            "get_pos:;Azimuth: 0;Elevation: 0;RPRT 0\n"
        );
        assert_eq!(
            respond("|\\get_pos", &rotator),
            "get_pos:|Azimuth: 0|Elevation: 0|RPRT 0\n"
        );
    }

    #[test]
    fn get_pos_uncalibrated_reports_busy() {
        let shared = Arc::new(SharedState::new());
        let rotator = Rotator::new(shared, None);
        assert_eq!(respond("p", &rotator), "RPRT -14\n");
    }

    #[test]
    fn set_pos_forms() {
        let rotator = sim_rotator();
        assert_eq!(respond("P 20 30", &rotator), "RPRT 0\n");
        assert_eq!(respond("\\set_pos 20 30", &rotator), "RPRT 0\n");
        assert_eq!(
            respond("+\\set_pos 20 30", &rotator),
            "set_pos: 20 30\nRPRT 0\n"
        );
        assert_eq!(
            respond(";\\set_pos 20.5 30", &rotator),
            "set_pos: 20.5 30;RPRT 0\n"
        );
    }

    #[test]
    fn set_pos_rejects_bad_arguments() {
        let rotator = sim_rotator();
        assert_eq!(respond("P 1000 2000", &rotator), "RPRT -1\n");
        assert_eq!(respond("P twenty", &rotator), "RPRT -1\n");
    }

    #[test]
    fn move_forms() {
        let rotator = sim_rotator();
        assert_eq!(respond("M 8 0", &rotator), "RPRT 0\n");
        assert_eq!(respond("\\move 16 0", &rotator), "RPRT 0\n");
        assert_eq!(respond("+\\move 2 0", &rotator), "move: 2 0\nRPRT 0\n");
        // 3 is not a direction.
        assert_eq!(respond("M 3 0", &rotator), "RPRT -1\n");
    }

    #[test]
    fn park_and_stop() {
        let rotator = sim_rotator();
        assert_eq!(respond("K", &rotator), "RPRT 0\n");
        assert_eq!(respond("S", &rotator), "RPRT 0\n");
        assert_eq!(respond("+\\park", &rotator), "park:\nRPRT 0\n");
        assert_eq!(respond(";\\stop", &rotator), "stop:;RPRT 0\n");
    }

    #[test]
    fn get_info_forms() {
        let rotator = sim_rotator();
        assert_eq!(respond("_", &rotator), "Yaesu G5500 on RPi\n");
        assert_eq!(
            respond("+\\get_info", &rotator),
            "get_info:\nInfo: Yaesu G5500 on RPi\nRPRT 0\n"
        );
    }

    #[test]
    fn dump_caps_reports_bounds() {
        let rotator = sim_rotator();
        let reply = respond("1", &rotator);
        assert!(reply.contains("Min Azimuth: 0\n"));
        assert!(reply.contains("Max Azimuth: 450\n"));
        assert!(reply.contains("Max Elevation: 180\n"));
        assert!(reply.ends_with("RPRT 0\n"));
        assert_eq!(respond("\\dump_caps", &rotator), reply);
    }

    #[test]
    fn dump_state_reports_position_and_bounds() {
        let rotator = sim_rotator();
        let reply = respond("2", &rotator);
        assert!(reply.starts_with("Azimuth: 0\nElevation: 0\n"));
        assert!(reply.ends_with("RPRT 0\n"));
    }

    #[test]
    fn unknown_input_answers_einval() {
        let rotator = sim_rotator();
        assert_eq!(respond("bogus", &rotator), "RPRT -1\n");
        assert_eq!(respond("", &rotator), "RPRT -1\n");
        assert_eq!(respond("+\\frobnicate", &rotator), "RPRT -1\n");
    }

    #[test]
    fn deg_formatting_trims_zeros() {
        assert_eq!(fmt_deg(0.0), "0");
        assert_eq!(fmt_deg(20.5), "20.5");
        assert_eq!(fmt_deg(445.25), "445.25");
        assert_eq!(fmt_deg(90.000015), "90");
    }
}
