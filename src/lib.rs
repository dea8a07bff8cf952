//! A client-side engine for the Dynamic Host Configuration Protocol, version 4.
//!
//! The crate provides three layers:
//!
//!  * The `wire` module deals with the packet representation: the 236-octet
//!    BOOTP fixed header ([`wire::dhcpv4::Packet`]) and the TLV options region
//!    with its per-code encoding policy ([`wire::options`]). These layers
//!    operate on caller-provided buffers and hold no process-wide state.
//!
//!  * The `phy` module provides the OS plumbing: a broadcast-capable UDP
//!    endpoint bound to one interface, and the interface address lookups the
//!    client needs.
//!
//!  * The `client` module drives one DISCOVER broadcast and collects the
//!    OFFER replies. The full DHCP state machine, lease installation and the
//!    server side are out of scope.
//!
//! Packets are exchanged over ordinary UDP sockets (client port 68, server
//! port 67); no kernel-level packet crafting is involved.

use core::fmt;
use std::io;

#[macro_use]
mod macros;

pub mod wire;

#[cfg(target_os = "linux")]
pub mod phy;

#[cfg(target_os = "linux")]
pub mod client;

#[cfg(target_os = "linux")]
pub use crate::client::Client;

/// The error type for the DHCP engine.
#[derive(Debug)]
pub enum Error {
    /// The client configuration cannot be acted on, e.g. no interface was
    /// given or the interface carries no IPv4 address.
    Config(&'static str),
    /// An option value was supplied in a representation that is not accepted
    /// for its option code.
    InvalidType { code: u8 },
    /// An option value matched an accepted representation but violated a
    /// length, count or range constraint of its option code.
    InvalidValue { code: u8 },
    /// A datagram was shorter than the 236-octet BOOTP fixed header.
    TruncatedHeader,
    /// The encoded options do not fit the caller-provided buffer.
    Exhausted,
    /// An OS-level failure, surfaced verbatim.
    Io(io::Error),
    /// An operation was attempted on a closed endpoint.
    Closed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(what) => write!(f, "invalid configuration: {}", what),
            Error::InvalidType { code } => {
                write!(f, "unsupported representation for option {}", code)
            }
            Error::InvalidValue { code } => write!(f, "invalid value for option {}", code),
            Error::TruncatedHeader => write!(f, "truncated packet header"),
            Error::Exhausted => write!(f, "options do not fit the packet"),
            Error::Io(err) => write!(f, "socket error: {}", err),
            Error::Closed => write!(f, "endpoint is closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
