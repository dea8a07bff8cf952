//! Access to the OS networking stack.
//!
//! The `phy` module owns the socket plumbing of the engine: a
//! broadcast-capable [`UdpEndpoint`] that can be tied to one interface, and
//! the per-interface address lookups the client seeds itself from. All of it
//! sits directly on `libc`; errors are `io::Error::last_os_error()` surfaced
//! verbatim.

pub mod sys;

pub use self::sys::udp::{Network, UdpEndpoint};
pub use self::sys::{interface_ipv4, interface_mac, random_xid};
