use std::io;
use std::mem;

use crate::wire::{EthernetAddress, Ipv4Address};

#[cfg(target_os = "linux")]
#[path = "linux.rs"]
mod imp;

pub mod udp;

#[repr(C)]
#[derive(Copy, Clone)]
#[allow(non_camel_case_types)]
union ifru {
    addr: libc::sockaddr,
    hwaddr: libc::sockaddr,
    // the kernel copies the whole 24-octet union either way
    pad: [u8; 24],
}

#[repr(C)]
#[allow(non_camel_case_types)]
struct ifreq {
    ifr_name: [libc::c_char; libc::IF_NAMESIZE],
    ifru: ifru,
}

fn ifreq_for(name: &str) -> io::Result<ifreq> {
    if name.len() >= libc::IF_NAMESIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "interface name too long",
        ));
    }
    let mut ifreq = ifreq {
        ifr_name: [0; libc::IF_NAMESIZE],
        ifru: unsafe { mem::zeroed() },
    };
    for (i, byte) in name.as_bytes().iter().enumerate() {
        ifreq.ifr_name[i] = *byte as libc::c_char;
    }
    Ok(ifreq)
}

fn ifreq_ioctl(lower: libc::c_int, ifreq: &mut ifreq, cmd: imp::IoctlRequest) -> io::Result<()> {
    unsafe {
        let res = libc::ioctl(lower, cmd as _, ifreq as *mut ifreq);
        if res == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn with_query_socket<T>(query: impl FnOnce(libc::c_int) -> io::Result<T>) -> io::Result<T> {
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM | libc::SOCK_CLOEXEC, 0) };
    if fd == -1 {
        return Err(io::Error::last_os_error());
    }
    let res = query(fd);
    unsafe { libc::close(fd) };
    res
}

/// Hardware address of the named interface.
pub fn interface_mac(name: &str) -> io::Result<EthernetAddress> {
    let mut ifreq = ifreq_for(name)?;
    with_query_socket(|fd| {
        ifreq_ioctl(fd, &mut ifreq, imp::SIOCGIFHWADDR)?;
        let hwaddr = unsafe { ifreq.ifru.hwaddr };
        let mut mac = [0u8; 6];
        for (dst, src) in mac.iter_mut().zip(hwaddr.sa_data.iter()) {
            *dst = *src as u8;
        }
        Ok(EthernetAddress(mac))
    })
}

/// IPv4 address bound to the named interface.
pub fn interface_ipv4(name: &str) -> io::Result<Ipv4Address> {
    let mut ifreq = ifreq_for(name)?;
    with_query_socket(|fd| {
        ifreq_ioctl(fd, &mut ifreq, imp::SIOCGIFADDR)?;
        let addr = unsafe { ifreq.ifru.addr };
        if addr.sa_family != libc::AF_INET as libc::sa_family_t {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "no IPv4 address on interface",
            ));
        }
        let sin = unsafe { *(&ifreq.ifru.addr as *const libc::sockaddr as *const libc::sockaddr_in) };
        Ok(Ipv4Address(sin.sin_addr.s_addr.to_ne_bytes()))
    })
}

/// Draw 32 uniformly random bits from the OS entropy source.
pub fn random_xid() -> io::Result<u32> {
    let mut bytes = [0u8; 4];
    let res = unsafe { libc::getrandom(bytes.as_mut_ptr() as *mut libc::c_void, bytes.len(), 0) };
    if res != bytes.len() as libc::ssize_t {
        return Err(io::Error::last_os_error());
    }
    Ok(u32::from_ne_bytes(bytes))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_loopback_addresses() {
        assert_eq!(
            interface_ipv4("lo").unwrap(),
            Ipv4Address::new(127, 0, 0, 1)
        );
        assert_eq!(
            interface_mac("lo").unwrap(),
            EthernetAddress([0, 0, 0, 0, 0, 0])
        );
    }

    #[test]
    fn test_missing_interface() {
        assert!(interface_ipv4("does-not-exist0").is_err());
    }

    #[test]
    fn test_random_xid_varies() {
        let a = random_xid().unwrap();
        let b = random_xid().unwrap();
        let c = random_xid().unwrap();
        assert!(a != b || b != c);
    }
}
