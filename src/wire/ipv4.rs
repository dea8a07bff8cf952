use core::fmt;

use byteorder::{ByteOrder, NetworkEndian};

/// A four-octet IPv4 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 4]);

impl Address {
    /// An unspecified address.
    pub const UNSPECIFIED: Address = Address([0x00; 4]);

    /// The limited broadcast address.
    pub const BROADCAST: Address = Address([0xff; 4]);

    /// Construct an IPv4 address from parts.
    pub fn new(a0: u8, a1: u8, a2: u8, a3: u8) -> Address {
        Address([a0, a1, a2, a3])
    }

    /// Construct an IPv4 address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not four octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Return an IPv4 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether the address is the all-zeroes address.
    pub fn is_unspecified(&self) -> bool {
        self.0 == [0; 4]
    }
}

impl From<u32> for Address {
    fn from(value: u32) -> Address {
        let mut bytes = [0; 4];
        NetworkEndian::write_u32(&mut bytes, value);
        Address(bytes)
    }
}

impl From<Address> for u32 {
    fn from(address: Address) -> u32 {
        NetworkEndian::read_u32(&address.0)
    }
}

impl From<std::net::Ipv4Addr> for Address {
    fn from(address: std::net::Ipv4Addr) -> Address {
        Address(address.octets())
    }
}

impl From<Address> for std::net::Ipv4Addr {
    fn from(address: Address) -> std::net::Ipv4Addr {
        std::net::Ipv4Addr::from(address.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
    }
}
