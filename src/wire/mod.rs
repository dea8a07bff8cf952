//! Low-level packet access and construction.
//!
//! The `wire` module deals with the packet *representation*: extracting
//! fields from sequences of octets and inserting fields into sequences of
//! octets. [`dhcpv4::Packet`] covers the fixed BOOTP header and the framing
//! rules of the options region; [`options`] covers the per-code TLV encoding
//! policy of the options themselves.
//!
//! Accessor and parsing functions never panic; emission fails cleanly when a
//! caller-provided buffer is too small.

mod field {
    pub type Field = core::ops::Range<usize>;
    pub type Rest = core::ops::RangeFrom<usize>;
}

mod ethernet;
mod ipv4;

pub mod dhcpv4;
pub mod options;

pub use self::ethernet::Address as EthernetAddress;
pub use self::ipv4::Address as Ipv4Address;

pub use self::dhcpv4::Flags as DhcpFlags;
pub use self::dhcpv4::Hardware;
pub use self::dhcpv4::MessageType as DhcpMessageType;
pub use self::dhcpv4::OpCode as DhcpOpCode;
pub use self::dhcpv4::Packet as DhcpPacket;

pub use self::options::{Options, Value};
