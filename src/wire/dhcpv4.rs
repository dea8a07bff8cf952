// See https://tools.ietf.org/html/rfc2131 for the DHCP specification
// and https://tools.ietf.org/html/rfc2132 for the options catalogue.

use bitflags::bitflags;
use byteorder::{ByteOrder, NetworkEndian};

use crate::wire::options::{self, Options};
use crate::wire::Ipv4Address;
use crate::{Error, Result};

pub const SERVER_PORT: u16 = 67;
pub const CLIENT_PORT: u16 = 68;

/// The four octets introducing the DHCP options region.
pub const MAGIC_COOKIE: [u8; 4] = [0x63, 0x82, 0x53, 0x63];

/// Length of the fixed BOOTP header preceding the options region.
pub const HEADER_LEN: usize = 236;

/// BOOTP requires the options region to span at least 64 octets (RFC 951);
/// shorter regions are zero-padded up to this floor.
pub const OPTIONS_LEN_MIN: usize = 64;

/// Largest options region that fits the Ethernet MTU minus the IP and UDP
/// headers.
pub const OPTIONS_LEN_MAX: usize = 1500 - 20 - 8 - HEADER_LEN;

/// Largest whole packet the engine will emit or parse.
pub const MAX_PACKET_LEN: usize = HEADER_LEN + OPTIONS_LEN_MAX;

enum_with_unknown! {
    /// The possible opcodes of a DHCP packet.
    pub enum OpCode(u8) {
        Request = 1,
        Reply = 2,
    }
}

enum_with_unknown! {
    /// The possible message types of a DHCP packet.
    ///
    /// Message type 53 values, per the IANA bootp-dhcp-parameters registry:
    /// 1-8 from RFC 2132, 9 from RFC 3203, 10-15 from RFC 6926 and 16-18
    /// from RFC 7724.
    pub enum MessageType(u8) {
        Discover = 1,
        Offer = 2,
        Request = 3,
        Decline = 4,
        Ack = 5,
        Nak = 6,
        Release = 7,
        Inform = 8,
        ForceRenew = 9,
        LeaseQuery = 10,
        LeaseUnassigned = 11,
        LeaseUnknown = 12,
        LeaseActive = 13,
        BulkLeaseQuery = 14,
        LeaseQueryDone = 15,
        ActiveLeaseQuery = 16,
        LeaseQueryStatus = 17,
        Tls = 18,
    }
}

enum_with_unknown! {
    /// Hardware address types, per the IANA arp-parameters registry.
    pub enum Hardware(u8) {
        Ethernet = 1,
        TokenRing = 6,
        Fddi = 8,
        Infiniband = 32,
        Ipmp = 255,
    }
}

bitflags! {
    /// BOOTP header flags. Only bit 15 is defined; a client sets it to
    /// request broadcast replies.
    pub struct Flags: u16 {
        const BROADCAST = 0b1000_0000_0000_0000;
    }
}

pub mod field {
    #![allow(unused)]

    use crate::wire::field::*;

    pub const OP: usize = 0;
    pub const HTYPE: usize = 1;
    pub const HLEN: usize = 2;
    pub const HOPS: usize = 3;
    pub const XID: Field = 4..8;
    pub const SECS: Field = 8..10;
    pub const FLAGS: Field = 10..12;
    pub const CIADDR: Field = 12..16;
    pub const YIADDR: Field = 16..20;
    pub const SIADDR: Field = 20..24;
    pub const GIADDR: Field = 24..28;
    pub const CHADDR: Field = 28..44;
    pub const SNAME: Field = 44..108;
    pub const FILE: Field = 108..236;
    pub const OPTIONS: Rest = 236..;

    // Vendor Extensions
    pub const OPT_END: u8 = 255;
    pub const OPT_PAD: u8 = 0;
    pub const OPT_SUBNET_MASK: u8 = 1;
    pub const OPT_TIME_OFFSET: u8 = 2;
    pub const OPT_ROUTER: u8 = 3;
    pub const OPT_TIME_SERVER: u8 = 4;
    pub const OPT_NAME_SERVER: u8 = 5;
    pub const OPT_DOMAIN_NAME_SERVER: u8 = 6;
    pub const OPT_LOG_SERVER: u8 = 7;
    pub const OPT_COOKIE_SERVER: u8 = 8;
    pub const OPT_LPR_SERVER: u8 = 9;
    pub const OPT_IMPRESS_SERVER: u8 = 10;
    pub const OPT_RESOURCE_LOCATION_SERVER: u8 = 11;
    pub const OPT_HOST_NAME: u8 = 12;
    pub const OPT_BOOT_FILE_SIZE: u8 = 13;
    pub const OPT_MERIT_DUMP: u8 = 14;
    pub const OPT_DOMAIN_NAME: u8 = 15;
    pub const OPT_SWAP_SERVER: u8 = 16;
    pub const OPT_ROOT_PATH: u8 = 17;
    pub const OPT_EXTENSIONS_PATH: u8 = 18;

    // IP Layer Parameters per Host
    pub const OPT_IP_FORWARDING: u8 = 19;
    pub const OPT_NON_LOCAL_SOURCE_ROUTING: u8 = 20;
    pub const OPT_POLICY_FILTER: u8 = 21;
    pub const OPT_MAX_DATAGRAM_REASSEMBLY_SIZE: u8 = 22;
    pub const OPT_DEFAULT_TTL: u8 = 23;
    pub const OPT_PATH_MTU_AGING_TIMEOUT: u8 = 24;
    pub const OPT_PATH_MTU_PLATEAU_TABLE: u8 = 25;

    // IP Layer Parameters per Interface
    pub const OPT_INTERFACE_MTU: u8 = 26;
    pub const OPT_ALL_SUBNETS_ARE_LOCAL: u8 = 27;
    pub const OPT_BROADCAST_ADDRESS: u8 = 28;
    pub const OPT_PERFORM_MASK_DISCOVERY: u8 = 29;
    pub const OPT_MASK_SUPPLIER: u8 = 30;
    pub const OPT_PERFORM_ROUTER_DISCOVERY: u8 = 31;
    pub const OPT_ROUTER_SOLICITATION_ADDRESS: u8 = 32;
    pub const OPT_STATIC_ROUTE: u8 = 33;

    // Link Layer Parameters per Interface
    pub const OPT_TRAILER_ENCAPSULATION: u8 = 34;
    pub const OPT_ARP_CACHE_TIMEOUT: u8 = 35;
    pub const OPT_ETHERNET_ENCAPSULATION: u8 = 36;

    // TCP Parameters
    pub const OPT_TCP_DEFAULT_TTL: u8 = 37;
    pub const OPT_TCP_KEEPALIVE_INTERVAL: u8 = 38;
    pub const OPT_TCP_KEEPALIVE_GARBAGE: u8 = 39;

    // Application and Service Parameters
    pub const OPT_NIS_DOMAIN: u8 = 40;
    pub const OPT_NIS_SERVERS: u8 = 41;
    pub const OPT_NTP_SERVERS: u8 = 42;
    pub const OPT_VENDOR_SPECIFIC_INFO: u8 = 43;
    pub const OPT_NETBIOS_NAME_SERVER: u8 = 44;
    pub const OPT_NETBIOS_DISTRIBUTION_SERVER: u8 = 45;
    pub const OPT_NETBIOS_NODE_TYPE: u8 = 46;
    pub const OPT_NETBIOS_SCOPE: u8 = 47;
    pub const OPT_X_WINDOW_FONT_SERVER: u8 = 48;
    pub const OPT_X_WINDOW_DISPLAY_MANAGER: u8 = 49;
    pub const OPT_NIS_PLUS_DOMAIN: u8 = 64;
    pub const OPT_NIS_PLUS_SERVERS: u8 = 65;
    pub const OPT_MOBILE_IP_HOME_AGENT: u8 = 68;
    pub const OPT_SMTP_SERVER: u8 = 69;
    pub const OPT_POP3_SERVER: u8 = 70;
    pub const OPT_NNTP_SERVER: u8 = 71;
    pub const OPT_WWW_SERVER: u8 = 72;
    pub const OPT_FINGER_SERVER: u8 = 73;
    pub const OPT_IRC_SERVER: u8 = 74;
    pub const OPT_STREETTALK_SERVER: u8 = 75;
    pub const OPT_STDA_SERVER: u8 = 76;

    // DHCP Extensions
    pub const OPT_REQUESTED_IP: u8 = 50;
    pub const OPT_IP_LEASE_TIME: u8 = 51;
    pub const OPT_OPTION_OVERLOAD: u8 = 52;
    pub const OPT_DHCP_MESSAGE_TYPE: u8 = 53;
    pub const OPT_SERVER_IDENTIFIER: u8 = 54;
    pub const OPT_PARAMETER_REQUEST_LIST: u8 = 55;
    pub const OPT_MESSAGE: u8 = 56;
    pub const OPT_MAX_DHCP_MESSAGE_SIZE: u8 = 57;
    pub const OPT_RENEWAL_TIME_VALUE: u8 = 58;
    pub const OPT_REBINDING_TIME_VALUE: u8 = 59;
    pub const OPT_VENDOR_CLASS_ID: u8 = 60;
    pub const OPT_CLIENT_ID: u8 = 61;
    pub const OPT_TFTP_SERVER_NAME: u8 = 66;
    pub const OPT_BOOTFILE_NAME: u8 = 67;

    // Later extensions; all encoded through the opaque default path.
    pub const OPT_USER_CLASS: u8 = 77;
    pub const OPT_CLIENT_FQDN: u8 = 81;
    pub const OPT_RELAY_AGENT_INFO: u8 = 82;
    pub const OPT_AUTHENTICATION: u8 = 90;
    pub const OPT_CLIENT_LAST_TRANSACTION_TIME: u8 = 91;
    pub const OPT_ASSOCIATED_IP: u8 = 92;
    pub const OPT_POSIX_TIMEZONE: u8 = 100;
    pub const OPT_TZDB_TIMEZONE: u8 = 101;
    pub const OPT_SUBNET_SELECTION: u8 = 118;
    pub const OPT_DOMAIN_SEARCH: u8 = 119;
    pub const OPT_CLASSLESS_STATIC_ROUTE: u8 = 121;
    pub const OPT_CAPWAP_CONTROLLERS: u8 = 138;
}

/// An RFC 2131 DHCP message: the fixed BOOTP header plus an options region.
///
/// Multi-octet header fields are serialised in network byte order. The
/// options region starts with the magic cookie and ends at the first
/// `OPT_END` octet; on emission it is zero-padded up to the 64-octet BOOTP
/// floor and never exceeds [`OPTIONS_LEN_MAX`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub op: OpCode,
    pub htype: Hardware,
    pub hlen: u8,
    pub hops: u8,
    pub xid: u32,
    pub secs: u16,
    pub flags: Flags,
    pub ciaddr: Ipv4Address,
    pub yiaddr: Ipv4Address,
    pub siaddr: Ipv4Address,
    pub giaddr: Ipv4Address,
    /// Client hardware address, left-aligned and zero-padded; only the first
    /// `hlen` octets are meaningful.
    pub chaddr: [u8; 16],
    /// Server host name, a NUL-terminated string in a fixed-size field.
    pub sname: [u8; 64],
    /// Boot file name, same convention as `sname`.
    pub file: [u8; 128],
    options: Vec<u8>,
}

impl Default for Packet {
    fn default() -> Packet {
        Packet {
            op: OpCode::Request,
            htype: Hardware::Ethernet,
            hlen: 0,
            hops: 0,
            xid: 0,
            secs: 0,
            flags: Flags::empty(),
            ciaddr: Ipv4Address::UNSPECIFIED,
            yiaddr: Ipv4Address::UNSPECIFIED,
            siaddr: Ipv4Address::UNSPECIFIED,
            giaddr: Ipv4Address::UNSPECIFIED,
            chaddr: [0; 16],
            sname: [0; 64],
            file: [0; 128],
            options: Vec::new(),
        }
    }
}

impl Packet {
    /// Parse a packet from the wire.
    ///
    /// Fails with [`Error::TruncatedHeader`] when fewer than 236 octets are
    /// supplied. Whatever follows the fixed header is copied into the options
    /// region verbatim, up to [`OPTIONS_LEN_MAX`] octets.
    pub fn parse(data: &[u8]) -> Result<Packet> {
        if data.len() < HEADER_LEN {
            return Err(Error::TruncatedHeader);
        }

        let mut packet = Packet::default();
        packet.op = OpCode::from(data[field::OP]);
        packet.htype = Hardware::from(data[field::HTYPE]);
        packet.hlen = data[field::HLEN];
        packet.hops = data[field::HOPS];
        packet.xid = NetworkEndian::read_u32(&data[field::XID]);
        packet.secs = NetworkEndian::read_u16(&data[field::SECS]);
        packet.flags = Flags::from_bits_truncate(NetworkEndian::read_u16(&data[field::FLAGS]));
        packet.ciaddr = Ipv4Address::from_bytes(&data[field::CIADDR]);
        packet.yiaddr = Ipv4Address::from_bytes(&data[field::YIADDR]);
        packet.siaddr = Ipv4Address::from_bytes(&data[field::SIADDR]);
        packet.giaddr = Ipv4Address::from_bytes(&data[field::GIADDR]);
        packet.chaddr.copy_from_slice(&data[field::CHADDR]);
        packet.sname.copy_from_slice(&data[field::SNAME]);
        packet.file.copy_from_slice(&data[field::FILE]);

        let rest = &data[field::OPTIONS];
        let len = rest.len().min(OPTIONS_LEN_MAX);
        packet.options = rest[..len].to_vec();
        Ok(packet)
    }

    /// Serialise the packet into a fresh buffer.
    ///
    /// The buffer spans the fixed header plus either the exact options length
    /// (the index one past the `OPT_END` terminator) or the zero-padded
    /// 64-octet BOOTP floor, whichever is larger.
    pub fn emit(&self) -> Vec<u8> {
        let mut buf = vec![0; HEADER_LEN];
        buf[field::OP] = self.op.into();
        buf[field::HTYPE] = self.htype.into();
        buf[field::HLEN] = self.hlen;
        buf[field::HOPS] = self.hops;
        NetworkEndian::write_u32(&mut buf[field::XID], self.xid);
        NetworkEndian::write_u16(&mut buf[field::SECS], self.secs);
        NetworkEndian::write_u16(&mut buf[field::FLAGS], self.flags.bits());
        buf[field::CIADDR].copy_from_slice(self.ciaddr.as_bytes());
        buf[field::YIADDR].copy_from_slice(self.yiaddr.as_bytes());
        buf[field::SIADDR].copy_from_slice(self.siaddr.as_bytes());
        buf[field::GIADDR].copy_from_slice(self.giaddr.as_bytes());
        buf[field::CHADDR].copy_from_slice(&self.chaddr);
        buf[field::SNAME].copy_from_slice(&self.sname);
        buf[field::FILE].copy_from_slice(&self.file);

        buf.extend_from_slice(&self.options);
        let options_len = self.options_len().max(OPTIONS_LEN_MIN);
        buf.resize(HEADER_LEN + options_len, 0);
        buf
    }

    /// Decode the options region. Absent cookie yields an empty mapping.
    pub fn get_options(&self) -> Options {
        options::decode(&self.options)
    }

    /// Encode `opts` into the options region, replacing its prior content.
    pub fn set_options(&mut self, opts: &Options) -> Result<()> {
        let mut buf = [0u8; OPTIONS_LEN_MAX];
        let len = options::encode(opts, &mut buf)?;
        self.options.clear();
        self.options.extend_from_slice(&buf[..len]);
        Ok(())
    }

    /// The raw options region, cookie included.
    pub fn options(&self) -> &[u8] {
        &self.options
    }

    /// Index one past the `OPT_END` terminator, scanning strictly from
    /// offset 4 past the cookie. Zero when the cookie is absent.
    fn options_len(&self) -> usize {
        if self.options.len() < MAGIC_COOKIE.len() || self.options[..4] != MAGIC_COOKIE {
            return 0;
        }
        let mut idx = MAGIC_COOKIE.len();
        let mut end = idx;
        while idx < self.options.len() {
            match self.options[idx] {
                field::OPT_PAD => idx += 1,
                field::OPT_END => return idx + 1,
                _ => {
                    if idx + 1 >= self.options.len() {
                        break;
                    }
                    idx += 2 + self.options[idx + 1] as usize;
                    end = idx;
                }
            }
        }
        end.min(self.options.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wire::options::Value;

    const CLIENT_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];

    fn discover_packet() -> Packet {
        let mut packet = Packet::default();
        packet.op = OpCode::Request;
        packet.htype = Hardware::Ethernet;
        packet.hlen = 6;
        packet.xid = 0x12345678;
        packet.flags = Flags::BROADCAST;
        packet.chaddr[..6].copy_from_slice(&CLIENT_MAC);
        packet
    }

    #[test]
    fn test_emit_pads_to_bootp_floor() {
        let mut packet = discover_packet();
        let mut opts = Options::new();
        opts.insert(field::OPT_DHCP_MESSAGE_TYPE, MessageType::Discover.into());
        packet.set_options(&opts).unwrap();

        let bytes = packet.emit();
        assert_eq!(bytes.len(), HEADER_LEN + OPTIONS_LEN_MIN);
        assert_eq!(&bytes[HEADER_LEN..HEADER_LEN + 4], &MAGIC_COOKIE);
        assert_eq!(bytes[HEADER_LEN + 4], field::OPT_DHCP_MESSAGE_TYPE);
        assert_eq!(bytes[HEADER_LEN + 5], 1);
        assert_eq!(bytes[HEADER_LEN + 6], u8::from(MessageType::Discover));
        assert_eq!(bytes[HEADER_LEN + 7], field::OPT_END);
        assert!(bytes[HEADER_LEN + 8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_emit_discover_image() {
        let mut packet = discover_packet();
        let mut opts = Options::new();
        opts.insert(field::OPT_DHCP_MESSAGE_TYPE, MessageType::Discover.into());
        opts.insert(field::OPT_PARAMETER_REQUEST_LIST, Value::Bytes(vec![1, 3, 6]));
        let mut client_id = vec![u8::from(Hardware::Ethernet)];
        client_id.extend_from_slice(&CLIENT_MAC);
        opts.insert(field::OPT_CLIENT_ID, Value::Bytes(client_id));
        packet.set_options(&opts).unwrap();

        let bytes = packet.emit();
        assert!(bytes.len() >= 300);
        assert_eq!(
            &bytes[..12],
            &[0x01, 0x01, 0x06, 0x00, 0x12, 0x34, 0x56, 0x78, 0x00, 0x00, 0x80, 0x00]
        );
        // ciaddr through giaddr are zero
        assert!(bytes[12..28].iter().all(|&b| b == 0));
        assert_eq!(&bytes[28..34], &CLIENT_MAC);
        // chaddr padding, sname and file are zero
        assert!(bytes[34..HEADER_LEN].iter().all(|&b| b == 0));
        // options iterate in code order: 53, 55, 61
        let mut expected = vec![];
        expected.extend_from_slice(&MAGIC_COOKIE);
        expected.extend_from_slice(&[0x35, 0x01, 0x01]);
        expected.extend_from_slice(&[0x37, 0x03, 0x01, 0x03, 0x06]);
        expected.extend_from_slice(&[0x3d, 0x07, 0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
        expected.push(field::OPT_END);
        assert_eq!(&bytes[HEADER_LEN..HEADER_LEN + expected.len()], &expected[..]);
    }

    #[test]
    fn test_parse_discover_image() {
        let mut packet = discover_packet();
        let mut opts = Options::new();
        opts.insert(field::OPT_DHCP_MESSAGE_TYPE, MessageType::Discover.into());
        opts.insert(field::OPT_PARAMETER_REQUEST_LIST, Value::Bytes(vec![1, 3, 6]));
        opts.insert(
            field::OPT_CLIENT_ID,
            Value::Bytes(vec![0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
        );
        packet.set_options(&opts).unwrap();

        let parsed = Packet::parse(&packet.emit()).unwrap();
        assert_eq!(parsed.op, OpCode::Request);
        assert_eq!(parsed.xid, 0x12345678);
        assert_eq!(parsed.flags, Flags::BROADCAST);
        assert_eq!(parsed.hlen, 6);
        assert_eq!(&parsed.chaddr[..6], &CLIENT_MAC);

        let mut expected = Options::new();
        expected.insert(field::OPT_DHCP_MESSAGE_TYPE, Value::Bytes(vec![0x01]));
        expected.insert(
            field::OPT_PARAMETER_REQUEST_LIST,
            Value::Bytes(vec![0x01, 0x03, 0x06]),
        );
        expected.insert(
            field::OPT_CLIENT_ID,
            Value::Bytes(vec![0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
        );
        assert_eq!(parsed.get_options(), expected);
    }

    #[test]
    fn test_parse_truncated_header() {
        assert!(matches!(
            Packet::parse(&[0; HEADER_LEN - 1]),
            Err(Error::TruncatedHeader)
        ));
    }

    #[test]
    fn test_parse_emit_fidelity() {
        let mut packet = discover_packet();
        packet.secs = 4;
        packet.hops = 1;
        packet.ciaddr = Ipv4Address::new(10, 0, 0, 1);
        packet.giaddr = Ipv4Address::new(10, 0, 0, 254);
        packet.sname[..4].copy_from_slice(b"boot");
        let mut opts = Options::new();
        opts.insert(field::OPT_DHCP_MESSAGE_TYPE, MessageType::Offer.into());
        packet.set_options(&opts).unwrap();

        let bytes = packet.emit();
        let mut parsed = Packet::parse(&bytes).unwrap();
        parsed.set_options(&opts).unwrap();
        assert_eq!(parsed.emit(), bytes);
    }

    #[test]
    fn test_emit_stops_at_end_option() {
        let mut packet = discover_packet();
        let mut opts = Options::new();
        for code in 0x80..0xc0 {
            opts.insert(code, Value::Bytes(vec![0xab; 2]));
        }
        packet.set_options(&opts).unwrap();
        // 64 records of 4 octets each, plus cookie and terminator
        let expected_len = 4 + 64 * 4 + 1;
        let bytes = packet.emit();
        assert_eq!(bytes.len(), HEADER_LEN + expected_len);
        assert_eq!(bytes[HEADER_LEN + expected_len - 1], field::OPT_END);
    }

    #[test]
    fn test_options_absent_without_cookie() {
        let mut data = vec![0; HEADER_LEN + 80];
        data[field::OP] = 2;
        data[HEADER_LEN] = 0x35; // looks like an option, but no cookie
        data[HEADER_LEN + 1] = 1;
        data[HEADER_LEN + 2] = 2;
        let packet = Packet::parse(&data).unwrap();
        assert_eq!(packet.get_options(), Options::new());
        // and the region is padded back to the floor on emission
        assert_eq!(packet.emit().len(), HEADER_LEN + OPTIONS_LEN_MIN);
    }
}
