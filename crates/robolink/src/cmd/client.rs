use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

use robolink_frame::{FrameError, Message, MessageReader, HEARTBEAT};
use robolink_transport::LinkStream;
use tracing::{debug, info};

use crate::cmd::{parse_duration, ClientArgs};
use crate::exit::{frame_error, io_error, transport_error, CliError, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn run(args: ClientArgs, format: OutputFormat) -> CliResult<i32> {
    let addr = resolve(&args.addr)?;
    let duration = parse_duration(&args.duration)?;
    let outgoing = args.send.as_deref().map(parse_outgoing).transpose()?;

    let stream = LinkStream::connect(addr).map_err(|err| transport_error("connect failed", err))?;
    let peer = addr.to_string();
    let mut reader = MessageReader::new(stream);

    if let Some(message) = outgoing {
        reader
            .get_mut()
            .send_all(message.as_bytes())
            .map_err(|err| transport_error("send failed", err))?;
        debug!(%message, "sent");
    }

    let deadline = Instant::now() + duration;
    let mut printed = 0usize;
    while Instant::now() < deadline {
        let messages = match reader.poll() {
            Ok(messages) => messages,
            Err(FrameError::ConnectionClosed) => {
                info!("bridge closed the connection");
                break;
            }
            Err(err) => return Err(frame_error("receive failed", err)),
        };

        for message in messages {
            if message.is(HEARTBEAT) {
                if !args.no_ack {
                    reader
                        .get_mut()
                        .send_all(HEARTBEAT)
                        .map_err(|err| transport_error("heartbeat ack failed", err))?;
                }
                if !args.show_heartbeats {
                    continue;
                }
            }

            print_message(&message, &peer, format);
            printed = printed.saturating_add(1);
            if args.count.is_some_and(|count| printed >= count) {
                return Ok(SUCCESS);
            }
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    Ok(SUCCESS)
}

fn resolve(addr: &str) -> CliResult<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|err| io_error(&format!("cannot resolve {addr}"), err))?
        .next()
        .ok_or_else(|| CliError::usage(format!("{addr} resolved to no addresses")))
}

fn parse_outgoing(text: &str) -> CliResult<Message> {
    Message::parse(text.as_bytes().to_vec())
        .ok_or_else(|| CliError::usage("--send must be a single {...} message"))
}
