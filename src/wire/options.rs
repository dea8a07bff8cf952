//! Per-option encoding policy for the RFC 2132 catalogue.
//!
//! DHCP options form a TLV stream whose per-option encoding is dictated by
//! the option code. Callers hand the codec a mapping from code to [`Value`];
//! each code accepts a small set of representations and normalises them to
//! one canonical octet run. Each option is validated and normalised in full
//! before its record is written.

use std::collections::BTreeMap;

use byteorder::{ByteOrder, NetworkEndian};

use crate::wire::dhcpv4::{field, MessageType, MAGIC_COOKIE};
use crate::wire::Ipv4Address;
use crate::{Error, Result};

/// A logical DHCP option value.
///
/// The catalogue accepts several caller representations of the same on-wire
/// encoding; for example a router list may be given as a single `U32`, a
/// `U32List`, an `Ipv4List` or a packed `Bytes` run whose length is a
/// multiple of four. Decoding always yields the raw `Bytes` run, which every
/// code re-accepts, so decode followed by encode is a fixed point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U16List(Vec<u16>),
    U32List(Vec<u32>),
    Ipv4(Ipv4Address),
    Ipv4List(Vec<Ipv4Address>),
    Ipv4Pair(Ipv4Address, Ipv4Address),
    Ipv4PairList(Vec<(Ipv4Address, Ipv4Address)>),
    Str(String),
    Bytes(Vec<u8>),
}

/// DHCP options: a mapping from option code to logical value.
///
/// Encoding iterates the mapping in code order.
pub type Options = BTreeMap<u8, Value>;

impl From<bool> for Value {
    fn from(value: bool) -> Value {
        Value::Bool(value)
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Value {
        Value::U8(value)
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Value {
        Value::U16(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Value {
        Value::U32(value)
    }
}

impl From<Vec<u16>> for Value {
    fn from(value: Vec<u16>) -> Value {
        Value::U16List(value)
    }
}

impl From<Vec<u32>> for Value {
    fn from(value: Vec<u32>) -> Value {
        Value::U32List(value)
    }
}

impl From<Ipv4Address> for Value {
    fn from(value: Ipv4Address) -> Value {
        Value::Ipv4(value)
    }
}

impl From<[u8; 4]> for Value {
    fn from(value: [u8; 4]) -> Value {
        Value::Ipv4(Ipv4Address(value))
    }
}

impl From<Vec<Ipv4Address>> for Value {
    fn from(value: Vec<Ipv4Address>) -> Value {
        Value::Ipv4List(value)
    }
}

impl From<(u32, u32)> for Value {
    fn from((a, b): (u32, u32)) -> Value {
        Value::Ipv4Pair(a.into(), b.into())
    }
}

impl From<(Ipv4Address, Ipv4Address)> for Value {
    fn from((a, b): (Ipv4Address, Ipv4Address)) -> Value {
        Value::Ipv4Pair(a, b)
    }
}

impl From<Vec<(Ipv4Address, Ipv4Address)>> for Value {
    fn from(value: Vec<(Ipv4Address, Ipv4Address)>) -> Value {
        Value::Ipv4PairList(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Value {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Value {
        Value::Str(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Value {
        Value::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Value {
        Value::Bytes(value)
    }
}

impl From<MessageType> for Value {
    fn from(value: MessageType) -> Value {
        Value::U8(value.into())
    }
}

/// Encode `opts` into `buf` as a TLV stream.
///
/// The stream starts with the magic cookie and ends with a single `OPT_END`;
/// no padding is inserted between records. Returns the number of octets
/// written, the terminator included. Fails with [`Error::InvalidType`] or
/// [`Error::InvalidValue`] when an option violates its per-code policy, and
/// with [`Error::Exhausted`] when the stream does not fit `buf`.
pub fn encode(opts: &Options, buf: &mut [u8]) -> Result<usize> {
    if buf.len() < MAGIC_COOKIE.len() + 1 {
        return Err(Error::Exhausted);
    }
    buf[..MAGIC_COOKIE.len()].copy_from_slice(&MAGIC_COOKIE);
    let mut idx = MAGIC_COOKIE.len();

    for (&code, value) in opts {
        let run = match canonical(code, value)? {
            Some(run) => run,
            // the option elides itself, e.g. an empty home agent list
            None => continue,
        };
        if idx + 2 + run.len() + 1 > buf.len() {
            return Err(Error::Exhausted);
        }
        buf[idx] = code;
        buf[idx + 1] = run.len() as u8;
        buf[idx + 2..idx + 2 + run.len()].copy_from_slice(&run);
        idx += 2 + run.len();
    }

    buf[idx] = field::OPT_END;
    Ok(idx + 1)
}

/// Decode a TLV stream into an options mapping.
///
/// A stream not starting with the magic cookie yields an empty mapping, not
/// an error. Reading terminates at the first `OPT_END`; `OPT_PAD` octets are
/// skipped; a record claiming more octets than remain is dropped along with
/// everything after it. Each decoded value is the raw octet run of its
/// record.
pub fn decode(buf: &[u8]) -> Options {
    let mut opts = Options::new();
    if buf.len() < MAGIC_COOKIE.len() || buf[..MAGIC_COOKIE.len()] != MAGIC_COOKIE {
        return opts;
    }
    let mut idx = MAGIC_COOKIE.len();
    while idx < buf.len() {
        match buf[idx] {
            field::OPT_END => break,
            field::OPT_PAD => idx += 1,
            code => {
                if idx + 1 >= buf.len() {
                    break;
                }
                let len = buf[idx + 1] as usize;
                if idx + 2 + len > buf.len() {
                    break;
                }
                opts.insert(code, Value::Bytes(buf[idx + 2..idx + 2 + len].to_vec()));
                idx += 2 + len;
            }
        }
    }
    opts
}

/// Validate `value` against the policy of `code` and normalise it to its
/// canonical octet run. `None` means the option asked to be omitted.
fn canonical(code: u8, value: &Value) -> Result<Option<Vec<u8>>> {
    use crate::wire::dhcpv4::field::*;
    use Value::*;

    let run = match code {
        // N/4 addresses, at most four.
        OPT_ROUTER | OPT_TIME_SERVER | OPT_NAME_SERVER | OPT_DOMAIN_NAME_SERVER
        | OPT_LOG_SERVER | OPT_COOKIE_SERVER | OPT_LPR_SERVER | OPT_IMPRESS_SERVER
        | OPT_RESOURCE_LOCATION_SERVER => addr_list(code, value, 1, Some(4))?,

        // N/4 addresses, at least one.
        OPT_NIS_SERVERS | OPT_NTP_SERVERS | OPT_NETBIOS_NAME_SERVER
        | OPT_NETBIOS_DISTRIBUTION_SERVER | OPT_X_WINDOW_FONT_SERVER
        | OPT_X_WINDOW_DISPLAY_MANAGER | OPT_NIS_PLUS_SERVERS | OPT_SMTP_SERVER
        | OPT_POP3_SERVER | OPT_NNTP_SERVER | OPT_WWW_SERVER | OPT_FINGER_SERVER
        | OPT_IRC_SERVER | OPT_STREETTALK_SERVER | OPT_STDA_SERVER => {
            addr_list(code, value, 1, None)?
        }

        // N/4 addresses; an empty value elides the whole option.
        OPT_MOBILE_IP_HOME_AGENT => {
            let run = addr_list(code, value, 0, None)?;
            if run.is_empty() {
                return Ok(None);
            }
            run
        }

        // Address pairs, at most four.
        OPT_POLICY_FILTER | OPT_STATIC_ROUTE => pair_list(code, value)?,

        // A single address or 32-bit integer.
        OPT_SUBNET_MASK | OPT_TIME_OFFSET | OPT_SWAP_SERVER | OPT_PATH_MTU_AGING_TIMEOUT
        | OPT_BROADCAST_ADDRESS | OPT_ROUTER_SOLICITATION_ADDRESS | OPT_ARP_CACHE_TIMEOUT
        | OPT_TCP_KEEPALIVE_INTERVAL | OPT_REQUESTED_IP | OPT_IP_LEASE_TIME
        | OPT_SERVER_IDENTIFIER | OPT_RENEWAL_TIME_VALUE | OPT_REBINDING_TIME_VALUE => {
            match value {
                U32(v) => v.to_be_bytes().to_vec(),
                Ipv4(addr) => addr.as_bytes().to_vec(),
                Bytes(run) if run.len() == 4 => run.clone(),
                Bytes(_) => return Err(Error::InvalidValue { code }),
                _ => return Err(Error::InvalidType { code }),
            }
        }

        // 16-bit MTU plateau values, each at least 68.
        OPT_PATH_MTU_PLATEAU_TABLE => {
            let words: Vec<u16> = match value {
                U16(v) => vec![*v],
                U16List(vs) => vs.clone(),
                Bytes(run) if run.len() % 2 == 0 => {
                    run.chunks(2).map(NetworkEndian::read_u16).collect()
                }
                Bytes(_) => return Err(Error::InvalidValue { code }),
                _ => return Err(Error::InvalidType { code }),
            };
            if words.is_empty() || words.iter().any(|&w| w < 68) {
                return Err(Error::InvalidValue { code });
            }
            let mut run = Vec::with_capacity(words.len() * 2);
            for word in words {
                run.extend_from_slice(&word.to_be_bytes());
            }
            run
        }

        // A single 16-bit integer.
        OPT_BOOT_FILE_SIZE | OPT_MAX_DATAGRAM_REASSEMBLY_SIZE | OPT_INTERFACE_MTU
        | OPT_MAX_DHCP_MESSAGE_SIZE => match value {
            U16(v) => v.to_be_bytes().to_vec(),
            Bytes(run) if run.len() == 2 => run.clone(),
            Bytes(_) => return Err(Error::InvalidValue { code }),
            _ => return Err(Error::InvalidType { code }),
        },

        // Single-octet enumerations.
        OPT_DHCP_MESSAGE_TYPE | OPT_OPTION_OVERLOAD | OPT_DEFAULT_TTL | OPT_TCP_DEFAULT_TTL
        | OPT_NETBIOS_NODE_TYPE => {
            let v = match value {
                U8(v) => *v,
                Bytes(run) if run.len() == 1 => run[0],
                Bytes(_) => return Err(Error::InvalidValue { code }),
                _ => return Err(Error::InvalidType { code }),
            };
            if code == OPT_OPTION_OVERLOAD && !(1..=3).contains(&v) {
                return Err(Error::InvalidValue { code });
            }
            vec![v]
        }

        // Booleans.
        OPT_IP_FORWARDING | OPT_NON_LOCAL_SOURCE_ROUTING | OPT_ALL_SUBNETS_ARE_LOCAL
        | OPT_PERFORM_MASK_DISCOVERY | OPT_MASK_SUPPLIER | OPT_PERFORM_ROUTER_DISCOVERY
        | OPT_TRAILER_ENCAPSULATION | OPT_ETHERNET_ENCAPSULATION
        | OPT_TCP_KEEPALIVE_GARBAGE => {
            let v = match value {
                Bool(b) => *b as u8,
                U8(v) => *v,
                Bytes(run) if run.len() == 1 => run[0],
                Bytes(_) => return Err(Error::InvalidValue { code }),
                _ => return Err(Error::InvalidType { code }),
            };
            if v > 1 {
                return Err(Error::InvalidValue { code });
            }
            vec![v]
        }

        // An uninterpreted run of requested option codes.
        OPT_PARAMETER_REQUEST_LIST => match value {
            Bytes(run) => run.clone(),
            _ => return Err(Error::InvalidType { code }),
        },

        // Free-form text, emitted without a terminating NUL.
        OPT_MERIT_DUMP | OPT_DOMAIN_NAME | OPT_ROOT_PATH | OPT_EXTENSIONS_PATH | OPT_MESSAGE
        | OPT_NIS_DOMAIN | OPT_NETBIOS_SCOPE | OPT_NIS_PLUS_DOMAIN | OPT_TFTP_SERVER_NAME
        | OPT_BOOTFILE_NAME | OPT_HOST_NAME => match value {
            Str(s) => s.clone().into_bytes(),
            Bytes(run) => run.clone(),
            _ => return Err(Error::InvalidType { code }),
        },

        // Opaque octet runs, including every unrecognised code. The client
        // identifier additionally carries a hardware-type octet before the
        // identifier proper, hence its two-octet minimum.
        _ => match value {
            Bytes(run) => {
                if run.is_empty() {
                    return Err(Error::InvalidValue { code });
                }
                if code == OPT_CLIENT_ID && run.len() < 2 {
                    return Err(Error::InvalidValue { code });
                }
                run.clone()
            }
            _ => return Err(Error::InvalidType { code }),
        },
    };

    if run.len() > 255 {
        return Err(Error::InvalidValue { code });
    }
    Ok(Some(run))
}

/// Normalise an address-list representation. `min` of zero lets an empty
/// value through as an empty run; the caller decides what that means.
fn addr_list(code: u8, value: &Value, min: usize, max: Option<usize>) -> Result<Vec<u8>> {
    let addrs: Vec<Ipv4Address> = match value {
        Value::U32(v) if min == 0 && *v == 0 => Vec::new(),
        Value::U32(v) => vec![Ipv4Address::from(*v)],
        Value::Ipv4(addr) if min == 0 && addr.is_unspecified() => Vec::new(),
        Value::Ipv4(addr) => vec![*addr],
        Value::U32List(vs) => vs.iter().map(|&v| Ipv4Address::from(v)).collect(),
        Value::Ipv4List(addrs) => addrs.clone(),
        Value::Bytes(run) => {
            if run.len() % 4 != 0 {
                return Err(Error::InvalidValue { code });
            }
            run.chunks(4).map(Ipv4Address::from_bytes).collect()
        }
        _ => return Err(Error::InvalidType { code }),
    };

    if addrs.len() < min {
        return Err(Error::InvalidValue { code });
    }
    if let Some(max) = max {
        if addrs.len() > max {
            return Err(Error::InvalidValue { code });
        }
    }

    let mut run = Vec::with_capacity(addrs.len() * 4);
    for addr in addrs {
        run.extend_from_slice(addr.as_bytes());
    }
    Ok(run)
}

/// Normalise an address-pair representation: one to four pairs.
fn pair_list(code: u8, value: &Value) -> Result<Vec<u8>> {
    let pairs: Vec<(Ipv4Address, Ipv4Address)> = match value {
        Value::Ipv4Pair(a, b) => vec![(*a, *b)],
        Value::Ipv4PairList(pairs) => pairs.clone(),
        Value::Bytes(run) => {
            if run.len() % 8 != 0 {
                return Err(Error::InvalidValue { code });
            }
            run.chunks(8)
                .map(|pair| {
                    (
                        Ipv4Address::from_bytes(&pair[..4]),
                        Ipv4Address::from_bytes(&pair[4..]),
                    )
                })
                .collect()
        }
        _ => return Err(Error::InvalidType { code }),
    };

    if pairs.is_empty() || pairs.len() > 4 {
        return Err(Error::InvalidValue { code });
    }

    let mut run = Vec::with_capacity(pairs.len() * 8);
    for (a, b) in pairs {
        run.extend_from_slice(a.as_bytes());
        run.extend_from_slice(b.as_bytes());
    }
    Ok(run)
}
