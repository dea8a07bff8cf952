use std::io;
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::time::Duration;

use crate::{Error, Result};

/// Address family selector for endpoint socket addresses, mirroring the
/// `udp`/`udp4`/`udp6` network names of the BSD socket APIs. `Udp` accepts
/// either family; the others reject peers of the wrong one.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Network {
    Udp,
    Udp4,
    Udp6,
}

/// A broadcast-capable UDP socket, optionally tied to one interface.
///
/// The endpoint exclusively owns its file descriptor; `close` releases it
/// exactly once and `Drop` closes as a fallback. It is not meant to be
/// shared between threads.
#[derive(Debug)]
pub struct UdpEndpoint {
    lower: libc::c_int,
    network: Network,
}

impl UdpEndpoint {
    /// Open a UDP socket bound to `local` on the given interface.
    ///
    /// Sets `SO_REUSEADDR` and `SO_BROADCAST`. Binding to the unspecified
    /// address is permitted. A non-empty `interface` is attached with
    /// `SO_BINDTODEVICE` when the kernel allows it; refusal (the option
    /// needs `CAP_NET_RAW`) leaves the endpoint on the ordinary routing
    /// path and is only logged.
    pub fn listen(network: Network, local: SocketAddr, interface: &str) -> Result<UdpEndpoint> {
        match (network, local) {
            (Network::Udp4, SocketAddr::V6(_)) | (Network::Udp6, SocketAddr::V4(_)) => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "local address family does not match the network",
                )))
            }
            _ => {}
        }

        let family = match local {
            SocketAddr::V4(_) => libc::AF_INET,
            SocketAddr::V6(_) => libc::AF_INET6,
        };
        let lower = unsafe {
            libc::socket(
                family,
                libc::SOCK_DGRAM | libc::SOCK_CLOEXEC,
                libc::IPPROTO_UDP,
            )
        };
        if lower == -1 {
            return Err(io::Error::last_os_error().into());
        }

        let mut endpoint = UdpEndpoint { lower, network };
        endpoint.setsockopt_int(libc::SOL_SOCKET, libc::SO_REUSEADDR, 1)?;
        endpoint.setsockopt_int(libc::SOL_SOCKET, libc::SO_BROADCAST, 1)?;

        if !interface.is_empty() {
            if let Err(err) = endpoint.bind_device(interface) {
                net_debug!("udp: cannot bind to device {}: {}", interface, err);
            }
        }

        let (sockaddr, socklen) = sockaddr_from(local);
        let res = unsafe {
            libc::bind(
                endpoint.lower,
                &sockaddr as *const libc::sockaddr_storage as *const libc::sockaddr,
                socklen,
            )
        };
        if res == -1 {
            return Err(io::Error::last_os_error().into());
        }

        Ok(endpoint)
    }

    /// Upper bound on how long a single `recv_from` may block. `None`
    /// blocks indefinitely. An expired read fails with the OS timeout
    /// error (`WouldBlock` or `TimedOut`).
    pub fn set_recv_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        if self.lower == -1 {
            return Err(Error::Closed);
        }
        let tv = match timeout {
            Some(timeout) => libc::timeval {
                tv_sec: timeout.as_secs() as libc::time_t,
                tv_usec: libc::suseconds_t::from(timeout.subsec_micros()),
            },
            None => libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
        };
        let res = unsafe {
            libc::setsockopt(
                self.lower,
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                &tv as *const libc::timeval as *const libc::c_void,
                mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        };
        if res == -1 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }

    /// Dispatch one datagram to `remote`, returning the octets sent.
    pub fn send_to(&mut self, data: &[u8], remote: SocketAddr) -> Result<usize> {
        if self.lower == -1 {
            return Err(Error::Closed);
        }
        let (sockaddr, socklen) = sockaddr_from(remote);
        let len = unsafe {
            libc::sendto(
                self.lower,
                data.as_ptr() as *const libc::c_void,
                data.len(),
                0,
                &sockaddr as *const libc::sockaddr_storage as *const libc::sockaddr,
                socklen,
            )
        };
        if len == -1 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(len as usize)
    }

    /// Block for one datagram, reading directly into `buf`. Returns the
    /// octet count and the peer address.
    pub fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        if self.lower == -1 {
            return Err(Error::Closed);
        }
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let mut socklen = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        let len = unsafe {
            libc::recvfrom(
                self.lower,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
                &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr,
                &mut socklen,
            )
        };
        if len == -1 {
            return Err(io::Error::last_os_error().into());
        }
        let peer = sockaddr_to(self.network, &storage)?;
        Ok((len as usize, peer))
    }

    /// The address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        if self.lower == -1 {
            return Err(Error::Closed);
        }
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let mut socklen = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        let res = unsafe {
            libc::getsockname(
                self.lower,
                &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr,
                &mut socklen,
            )
        };
        if res == -1 {
            return Err(io::Error::last_os_error().into());
        }
        sockaddr_to(self.network, &storage)
    }

    /// Release the socket. Safe to call more than once; subsequent
    /// operations fail with [`Error::Closed`].
    pub fn close(&mut self) {
        if self.lower != -1 {
            unsafe { libc::close(self.lower) };
            self.lower = -1;
        }
    }

    fn setsockopt_int(&self, level: libc::c_int, option: libc::c_int, value: libc::c_int) -> Result<()> {
        let res = unsafe {
            libc::setsockopt(
                self.lower,
                level,
                option,
                &value as *const libc::c_int as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if res == -1 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }

    fn bind_device(&self, interface: &str) -> io::Result<()> {
        let res = unsafe {
            libc::setsockopt(
                self.lower,
                libc::SOL_SOCKET,
                libc::SO_BINDTODEVICE,
                interface.as_ptr() as *const libc::c_void,
                interface.len() as libc::socklen_t,
            )
        };
        if res == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for UdpEndpoint {
    fn drop(&mut self) {
        self.close()
    }
}

fn sockaddr_from(addr: SocketAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    match addr {
        SocketAddr::V4(v4) => {
            let sin = libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: v4.port().to_be(),
                sin_addr: libc::in_addr {
                    s_addr: u32::from_ne_bytes(v4.ip().octets()),
                },
                sin_zero: [0; 8],
            };
            unsafe {
                *(&mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr_in) = sin;
            }
            (storage, mem::size_of::<libc::sockaddr_in>() as libc::socklen_t)
        }
        SocketAddr::V6(v6) => {
            let sin6 = libc::sockaddr_in6 {
                sin6_family: libc::AF_INET6 as libc::sa_family_t,
                sin6_port: v6.port().to_be(),
                sin6_flowinfo: v6.flowinfo(),
                sin6_addr: libc::in6_addr {
                    s6_addr: v6.ip().octets(),
                },
                sin6_scope_id: v6.scope_id(),
            };
            unsafe {
                *(&mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr_in6) = sin6;
            }
            (storage, mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t)
        }
    }
}

fn sockaddr_to(network: Network, storage: &libc::sockaddr_storage) -> Result<SocketAddr> {
    match (network, storage.ss_family as libc::c_int) {
        (Network::Udp | Network::Udp4, libc::AF_INET) => {
            let sin = unsafe {
                *(storage as *const libc::sockaddr_storage as *const libc::sockaddr_in)
            };
            Ok(SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::from(sin.sin_addr.s_addr.to_ne_bytes()),
                u16::from_be(sin.sin_port),
            )))
        }
        (Network::Udp | Network::Udp6, libc::AF_INET6) => {
            let sin6 = unsafe {
                *(storage as *const libc::sockaddr_storage as *const libc::sockaddr_in6)
            };
            Ok(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(sin6.sin6_addr.s6_addr),
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            )))
        }
        _ => Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            "peer address family does not match the network",
        ))),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn loopback(port: u16) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
    }

    #[test]
    fn test_roundtrip_timeout_and_close() {
        let mut receiver = UdpEndpoint::listen(Network::Udp4, loopback(0), "").unwrap();
        let mut sender = UdpEndpoint::listen(Network::Udp4, loopback(0), "").unwrap();
        let dst = receiver.local_addr().unwrap();

        assert_eq!(sender.send_to(b"bootp", dst).unwrap(), 5);
        let mut buf = [0u8; 64];
        let (len, peer) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"bootp");
        assert_eq!(peer, sender.local_addr().unwrap());

        receiver.set_recv_timeout(Some(Duration::from_millis(20))).unwrap();
        match receiver.recv_from(&mut buf) {
            Err(Error::Io(err)) => assert!(matches!(
                err.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            )),
            other => panic!("expected a timeout, got {:?}", other),
        }

        receiver.close();
        receiver.close(); // idempotent
        assert!(matches!(receiver.recv_from(&mut buf), Err(Error::Closed)));
        assert!(matches!(sender.send_to(b"x", dst), Ok(1)));
    }

    #[test]
    fn test_family_mismatch_is_rejected() {
        assert!(matches!(
            UdpEndpoint::listen(Network::Udp6, loopback(0), ""),
            Err(Error::Io(_))
        ));
    }
}
