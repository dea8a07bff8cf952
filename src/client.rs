//! The DISCOVER/OFFER exchange: compose one DHCPDISCOVER, broadcast it on a
//! chosen interface, collect the replies.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use crate::phy::{self, Network, UdpEndpoint};
use crate::wire::dhcpv4::{
    field, Flags, Hardware, MessageType, OpCode, Packet, CLIENT_PORT, MAX_PACKET_LEN, SERVER_PORT,
};
use crate::wire::{Ipv4Address, Options, Value};
use crate::{Error, Result};

/// A one-shot DHCPv4 client.
///
/// The client owns no socket between calls; every [`discover`](Client::discover)
/// opens a fresh endpoint on port 68, broadcasts a single DISCOVER and reads
/// up to `1 + max_read_retries` replies before closing it again. Instances
/// operate independently and may coexist on different interfaces.
#[derive(Debug)]
pub struct Client {
    /// Interface to bind on; its hardware address seeds `chaddr` and the
    /// auto-generated client identifier. Required.
    pub interface: String,
    /// Destination of the DISCOVER; limited broadcast when unset.
    pub server: Option<Ipv4Address>,
    /// Options to carry in the outgoing DISCOVER, augmented in place with
    /// the message type and, unless suppressed, a client identifier and the
    /// host name.
    pub options: Options,
    /// Do not auto-generate a client identifier.
    pub no_auto_client_id: bool,
    /// Do not advertise the OS host name.
    pub no_auto_hostname: bool,
    /// Reserved; transmission is attempted exactly once.
    pub max_write_retries: u8,
    /// Reply reads after the first. Total reads are `1 + max_read_retries`.
    pub max_read_retries: u8,
    /// Per-read deadline. An expired read counts as an empty datagram and
    /// consumes one read slot. `None` blocks indefinitely.
    pub timeout: Option<Duration>,
}

impl Client {
    pub fn new(interface: &str) -> Client {
        Client {
            interface: interface.to_owned(),
            server: None,
            options: Options::new(),
            no_auto_client_id: false,
            no_auto_hostname: false,
            max_write_retries: 0,
            max_read_retries: 0,
            timeout: None,
        }
    }

    /// Broadcast a single DHCPDISCOVER and return the parsed replies.
    ///
    /// Configuration, socket and send failures abort the whole call, as do
    /// read errors other than the per-read timeout. Timeouts, empty
    /// datagrams and replies that fail to parse are logged, skipped and
    /// still consume a read slot, so the call always terminates after
    /// `1 + max_read_retries` reads. No reply at all yields an empty list.
    pub fn discover(&mut self) -> Result<Vec<Packet>> {
        if self.interface.is_empty() {
            return Err(Error::Config("interface not set"));
        }
        let server = self.server.unwrap_or(Ipv4Address::BROADCAST);
        let mac = phy::interface_mac(&self.interface)?;
        let source = phy::interface_ipv4(&self.interface)
            .map_err(|_| Error::Config("no IPv4 address on interface"))?;

        if !self.no_auto_client_id && !self.options.contains_key(&field::OPT_CLIENT_ID) {
            let mut client_id = Vec::with_capacity(1 + mac.as_bytes().len());
            client_id.push(Hardware::Ethernet.into());
            client_id.extend_from_slice(mac.as_bytes());
            self.options.insert(field::OPT_CLIENT_ID, Value::Bytes(client_id));
        }
        if !self.no_auto_hostname && !self.options.contains_key(&field::OPT_HOST_NAME) {
            // best-effort; a nameless host simply advertises none
            if let Some(hostname) = hostname() {
                self.options.insert(field::OPT_HOST_NAME, Value::Str(hostname));
            }
        }
        self.options
            .insert(field::OPT_DHCP_MESSAGE_TYPE, MessageType::Discover.into());

        let xid = phy::random_xid()?;

        let mut packet = Packet::default();
        packet.op = OpCode::Request;
        packet.htype = Hardware::Ethernet;
        packet.hlen = mac.as_bytes().len() as u8;
        packet.xid = xid;
        packet.flags = Flags::BROADCAST;
        packet.chaddr[..mac.as_bytes().len()].copy_from_slice(mac.as_bytes());
        packet.set_options(&self.options)?;

        net_debug!(
            "dhcp: discover on {} ({}, {}) xid 0x{:08x}",
            self.interface,
            mac,
            source,
            xid
        );

        let local = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, CLIENT_PORT));
        let mut endpoint = UdpEndpoint::listen(Network::Udp4, local, &self.interface)?;
        endpoint.set_recv_timeout(self.timeout)?;

        let remote = SocketAddr::V4(SocketAddrV4::new(server.into(), SERVER_PORT));
        let sent = endpoint.send_to(&packet.emit(), remote)?;
        net_debug!("dhcp: broadcast {} octets to {}", sent, remote);

        let mut replies = Vec::new();
        let mut buf = [0u8; MAX_PACKET_LEN];
        for _ in 0..=self.max_read_retries {
            let (len, peer) = match endpoint.recv_from(&mut buf) {
                Ok(read) => read,
                Err(Error::Io(ref err)) if is_timeout(err) => {
                    net_debug!("dhcp: read timed out");
                    continue;
                }
                Err(err) => return Err(err),
            };
            if len == 0 {
                net_debug!("dhcp: empty datagram from {}", peer);
                continue;
            }
            net_trace!("dhcp: {} octets from {}", len, peer);
            match Packet::parse(&buf[..len]) {
                Ok(reply) => replies.push(reply),
                Err(err) => net_debug!("dhcp: discarding reply from {}: {}", peer, err),
            }
        }

        endpoint.close();
        Ok(replies)
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    let res = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if res != 0 {
        return None;
    }
    let len = buf.iter().position(|&b| b == 0)?;
    String::from_utf8(buf[..len].to_vec()).ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_missing_interface_is_config_error() {
        let mut client = Client::new("");
        assert!(matches!(client.discover(), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_interface_is_fatal() {
        let mut client = Client::new("does-not-exist0");
        assert!(client.discover().is_err());
    }

    #[test]
    fn test_hostname_is_available() {
        assert!(hostname().is_some());
    }
}
