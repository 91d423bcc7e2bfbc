//! TCP stand-in for the serial-profile link.
//!
//! One client at a time. Every read is handed to the [`SpeedReceiver`] as a
//! raw chunk; a closed or failed connection is reported as a disconnect so
//! any partial line is thrown away.

use crate::metrics::{record_feed, LINK_CONNECTED};
use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use vss_core::{LinkEvent, SpeedReceiver};

/// Reads drained from the client per poll before `stop` is looked at again.
const MAX_READS_PER_POLL: usize = 64;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to configure listener: {0}")]
    Configure(#[source] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub bind_addr: String,
    pub poll_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7100".to_string(),
            poll_interval: Duration::from_millis(2),
        }
    }
}

pub fn bind_link(config: &LinkConfig) -> Result<TcpListener, LinkError> {
    let listener = TcpListener::bind(&config.bind_addr).map_err(|source| LinkError::Bind {
        addr: config.bind_addr.clone(),
        source,
    })?;
    listener
        .set_nonblocking(true)
        .map_err(LinkError::Configure)?;
    Ok(listener)
}

/// Serves the link until `stop` is set.
pub fn run_link(
    listener: &TcpListener,
    receiver: &mut SpeedReceiver,
    config: &LinkConfig,
    stop: &AtomicBool,
) {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Link listening");
    }

    let mut client: Option<TcpStream> = None;

    while !stop.load(Ordering::Relaxed) {
        if client.is_none() {
            match listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(err) = stream.set_nonblocking(true) {
                        warn!(error = %err, client_addr = %addr, "Rejecting link client");
                    } else {
                        info!(client_addr = %addr, "Link client connected");
                        receiver.handle(LinkEvent::Connected);
                        LINK_CONNECTED.set(1.0);
                        client = Some(stream);
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(err) => {
                    warn!(error = %err, "Link accept error");
                }
            }
        }

        let mut drop_client = false;
        if let Some(stream) = client.as_mut() {
            let mut temp = [0u8; 1024];
            for _ in 0..MAX_READS_PER_POLL {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                match stream.read(&mut temp) {
                    Ok(0) => {
                        let record = receiver.exchange().snapshot();
                        info!(
                            last_speed_mph = record.speed_mph,
                            updates = record.generation,
                            "Link client disconnected"
                        );
                        drop_client = true;
                        break;
                    }
                    Ok(n) => {
                        let summary = receiver.handle(LinkEvent::Data(&temp[..n]));
                        record_feed(&summary);
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                    Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                    Err(err) => {
                        warn!(error = %err, "Link read error");
                        drop_client = true;
                        break;
                    }
                }
            }
        }

        if drop_client {
            client = None;
            receiver.handle(LinkEvent::Disconnected);
            LINK_CONNECTED.set(0.0);
        }

        std::thread::sleep(config.poll_interval);
    }

    if client.is_some() {
        receiver.handle(LinkEvent::Disconnected);
        LINK_CONNECTED.set(0.0);
    }
    debug!("Link stopped");
}
