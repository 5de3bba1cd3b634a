//! Syslog transport.
//!
//! Nginx sends access log lines as RFC 3164 datagrams:
//!
//! ```text
//! <190>Oct 16 12:00:00 web-1 nginx: request_time:0.042 status=200
//! ```
//!
//! Only messages with the configured tag, a hostname and non-empty content are passed on.

use crate::config::SyslogAddress;
use crate::metrics::ExporterMetrics;
use nom::{
    branch::alt,
    bytes::complete::{take_till, take_till1, take_while_m_n},
    character::complete::{char, digit1},
    combinator::{map_res, opt, recognize, verify},
    sequence::{delimited, terminated},
    IResult, Parser,
};
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tokio::net::UdpSocket;
#[cfg(unix)]
use tokio::net::UnixDatagram;
use tokio::sync::{mpsc, watch};

/// Largest datagram accepted.
const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Highest valid PRI value (facility 23, severity 7).
const MAX_PRIORITY: u8 = 191;

/// Errors that cause a syslog message to be dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyslogError {
    /// The datagram is not valid UTF-8.
    #[error("Syslog message is not valid UTF-8")]
    InvalidUtf8,

    /// The datagram does not start with an RFC 3164 header.
    #[error("Malformed syslog header")]
    MalformedHeader,

    /// The message was sent with a different tag.
    #[error("Ignoring syslog message with wrong tag '{0}'")]
    WrongTag(String),

    /// The header has no hostname.
    #[error("Hostname missing in syslog message")]
    MissingHostname,

    /// The message has no content.
    #[error("Ignoring empty syslog message")]
    EmptyContent,
}

/// A decoded RFC 3164 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyslogMessage {
    /// Facility and severity.
    pub priority: u8,
    /// Header timestamp as sent, e.g. `Oct  6 12:00:00`.
    pub timestamp: String,
    /// Sending host.
    pub hostname: String,
    /// Program tag.
    pub tag: String,
    /// Process id following the tag, if any.
    pub pid: Option<String>,
    /// Message body.
    pub content: String,
}

impl SyslogMessage {
    /// Parses one datagram.
    ///
    /// # Errors
    ///
    /// Returns an error if the datagram is not UTF-8 or has no valid header.
    pub fn parse(datagram: &[u8]) -> Result<Self, SyslogError> {
        let text = std::str::from_utf8(datagram).map_err(|_| SyslogError::InvalidUtf8)?;
        let (content, (priority, timestamp, hostname, (tag, pid))) =
            message_header(text).map_err(|_| SyslogError::MalformedHeader)?;

        Ok(Self {
            priority,
            timestamp: timestamp.to_string(),
            hostname: hostname.to_string(),
            tag: tag.to_string(),
            pid: pid.map(str::to_string),
            content: content
                .trim_end_matches(|c: char| matches!(c, '\n' | '\r' | '\0'))
                .to_string(),
        })
    }

    /// Returns the facility part of the priority.
    #[must_use]
    pub fn facility(&self) -> u8 {
        self.priority / 8
    }

    /// Returns the severity part of the priority.
    #[must_use]
    pub fn severity(&self) -> u8 {
        self.priority % 8
    }

    /// Applies the transport filter and returns the content.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag differs from `expected_tag`, the hostname is missing
    /// or the content is empty.
    pub fn into_content(self, expected_tag: &str) -> Result<String, SyslogError> {
        if self.tag != expected_tag {
            return Err(SyslogError::WrongTag(self.tag));
        }
        if self.hostname.is_empty() {
            return Err(SyslogError::MissingHostname);
        }
        if self.content.is_empty() {
            return Err(SyslogError::EmptyContent);
        }
        Ok(self.content)
    }
}

/// Decodes a datagram and returns its content if it passes the transport filter.
///
/// # Errors
///
/// Returns an error if the datagram cannot be parsed or is filtered out.
pub fn decode_datagram(datagram: &[u8], expected_tag: &str) -> Result<String, SyslogError> {
    SyslogMessage::parse(datagram)?.into_content(expected_tag)
}

type Header<'a> = (u8, &'a str, &'a str, (&'a str, Option<&'a str>));

fn message_header(input: &str) -> IResult<&str, Header<'_>> {
    let (rest, (pri, stamp, host, tag_and_pid, _, _)) = (
        priority,
        terminated(timestamp, char(' ')),
        terminated(take_till(|c: char| c == ' '), char(' ')),
        tag,
        opt(char(':')),
        opt(char(' ')),
    )
        .parse(input)?;

    Ok((rest, (pri, stamp, host, tag_and_pid)))
}

fn priority(input: &str) -> IResult<&str, u8> {
    delimited(
        char('<'),
        verify(map_res(digit1, |s: &str| s.parse::<u8>()), |p: &u8| *p <= MAX_PRIORITY),
        char('>'),
    )
    .parse(input)
}

fn timestamp(input: &str) -> IResult<&str, &str> {
    recognize((
        take_while_m_n(3, 3, |c: char| c.is_ascii_alphabetic()),
        char(' '),
        alt((recognize((char(' '), digit1)), digit1)),
        char(' '),
        digit1,
        char(':'),
        digit1,
        char(':'),
        digit1,
    ))
    .parse(input)
}

fn tag(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    (
        take_till1(|c: char| c == '[' || c == ':' || c == ' '),
        opt(delimited(char('['), take_till(|c: char| c == ']'), char(']'))),
    )
        .parse(input)
}

enum Socket {
    Udp(UdpSocket),
    #[cfg(unix)]
    Unix(UnixDatagram),
}

/// Listens for syslog datagrams and forwards accepted lines.
pub struct SyslogListener {
    socket: Socket,
    socket_path: Option<PathBuf>,
    tag: String,
    metrics: ExporterMetrics,
}

impl SyslogListener {
    /// Binds the listener socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound, or a Unix socket is requested on a
    /// platform without Unix datagram sockets.
    pub async fn bind(
        address: &SyslogAddress,
        tag: impl Into<String>,
        metrics: ExporterMetrics,
    ) -> io::Result<Self> {
        let (socket, socket_path) = match address {
            SyslogAddress::Udp(addr) => (Socket::Udp(UdpSocket::bind(addr.as_str()).await?), None),
            #[cfg(unix)]
            SyslogAddress::Unixgram(path) => {
                (Socket::Unix(UnixDatagram::bind(path)?), Some(path.clone()))
            }
            #[cfg(not(unix))]
            SyslogAddress::Unixgram(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "Unix datagram sockets are not supported on this platform",
                ))
            }
        };

        Ok(Self {
            socket,
            socket_path,
            tag: tag.into(),
            metrics,
        })
    }

    /// Describes the bound address for logging.
    #[must_use]
    pub fn local_addr(&self) -> String {
        match &self.socket {
            Socket::Udp(socket) => socket
                .local_addr()
                .map_or_else(|_| "udp".to_string(), |addr| addr.to_string()),
            #[cfg(unix)]
            Socket::Unix(_) => self
                .socket_path
                .as_ref()
                .map_or_else(|| "unixgram".to_string(), |p| format!("unix:{}", p.display())),
        }
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        match &self.socket {
            Socket::Udp(socket) => socket.recv_from(buf).await.map(|(len, _)| len),
            #[cfg(unix)]
            Socket::Unix(socket) => socket.recv_from(buf).await.map(|(len, _)| len),
        }
    }

    /// Receives datagrams until shutdown is signalled or the line receiver is dropped.
    pub async fn run(self, lines: mpsc::Sender<String>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(address = %self.local_addr(), tag = %self.tag, "Listening for syslog messages");
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            let received = tokio::select! {
                _ = shutdown.wait_for(|&stop| stop) => break,
                received = self.recv(&mut buf) => received,
            };

            let len = match received {
                Ok(len) => len,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to receive syslog datagram");
                    continue;
                }
            };

            self.metrics.syslog_messages.inc();
            match decode_datagram(&buf[..len], &self.tag) {
                Ok(content) => {
                    if lines.send(content).await.is_err() {
                        tracing::warn!("Line pipeline closed, stopping syslog listener");
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping syslog message");
                    self.metrics.parse_failures.inc();
                }
            }
        }

        if let Some(path) = &self.socket_path {
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::warn!(error = %e, path = %path.display(), "Failed to remove syslog socket");
            }
        }
        tracing::info!("Syslog listener stopped");
    }
}
