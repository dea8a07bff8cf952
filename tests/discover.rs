// End-to-end DISCOVER/OFFER exchanges against a local harness server.
//
// The harness answers on the real DHCP ports, which usually needs root;
// when the environment refuses them the tests report the reason and skip.

#![cfg(target_os = "linux")]

use std::net::{SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use smoldhcp::client::Client;
use smoldhcp::phy::{Network, UdpEndpoint};
use smoldhcp::wire::dhcpv4::{field, MessageType, OpCode, Packet, CLIENT_PORT, SERVER_PORT};
use smoldhcp::wire::{Hardware, Ipv4Address, Options, Value};
use smoldhcp::Error;

// both tests bind the real client port; never concurrently
static PORT_LOCK: Mutex<()> = Mutex::new(());

fn offer_for(discover: &Packet, your_ip: Ipv4Address) -> Packet {
    let mut offer = Packet::default();
    offer.op = OpCode::Reply;
    offer.htype = Hardware::Ethernet;
    offer.hlen = discover.hlen;
    offer.xid = discover.xid;
    offer.yiaddr = your_ip;
    offer.siaddr = Ipv4Address::new(192, 0, 2, 1);
    offer.chaddr = discover.chaddr;

    let mut opts = Options::new();
    opts.insert(field::OPT_DHCP_MESSAGE_TYPE, MessageType::Offer.into());
    opts.insert(
        field::OPT_SERVER_IDENTIFIER,
        Value::Ipv4(Ipv4Address::new(192, 0, 2, 1)),
    );
    opts.insert(field::OPT_IP_LEASE_TIME, Value::U32(3600));
    offer.set_options(&opts).unwrap();
    offer
}

#[test]
fn discover_collects_two_offers_then_times_out() {
    let _guard = PORT_LOCK.lock().unwrap();
    let server = match UdpSocket::bind(("127.0.0.1", SERVER_PORT)) {
        Ok(server) => server,
        Err(err) => {
            eprintln!("skipping: cannot bind 127.0.0.1:{}: {}", SERVER_PORT, err);
            return;
        }
    };
    server
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let harness = thread::spawn(move || {
        let mut buf = [0u8; 1500];
        let (len, peer) = server.recv_from(&mut buf).expect("no DISCOVER arrived");
        let discover = Packet::parse(&buf[..len]).expect("malformed DISCOVER");

        assert_eq!(discover.op, OpCode::Request);
        assert_eq!(discover.htype, Hardware::Ethernet);
        assert_eq!(discover.hlen, 6);
        assert!(len >= 300);

        let opts = discover.get_options();
        assert_eq!(
            opts.get(&field::OPT_DHCP_MESSAGE_TYPE),
            Some(&Value::Bytes(vec![u8::from(MessageType::Discover)]))
        );
        // the client identifier is auto-generated from the interface MAC
        let client_id = match opts.get(&field::OPT_CLIENT_ID) {
            Some(Value::Bytes(run)) => run.clone(),
            other => panic!("missing client id: {:?}", other),
        };
        assert_eq!(client_id.len(), 7);
        assert_eq!(client_id[0], u8::from(Hardware::Ethernet));
        assert_eq!(&client_id[1..], &discover.chaddr[..6]);
        // hostname was suppressed
        assert!(!opts.contains_key(&field::OPT_HOST_NAME));

        for i in 0..2u8 {
            let offer = offer_for(&discover, Ipv4Address::new(192, 0, 2, 10 + i));
            server.send_to(&offer.emit(), peer).unwrap();
        }
        discover.xid
    });

    let mut client = Client::new("lo");
    client.server = Some(Ipv4Address::new(127, 0, 0, 1));
    client.no_auto_hostname = true;
    client.max_read_retries = 2;
    client.timeout = Some(Duration::from_secs(2));
    client.options.insert(
        field::OPT_PARAMETER_REQUEST_LIST,
        Value::Bytes(vec![
            field::OPT_SUBNET_MASK,
            field::OPT_ROUTER,
            field::OPT_DOMAIN_NAME_SERVER,
        ]),
    );

    let offers = match client.discover() {
        Ok(offers) => offers,
        Err(Error::Io(err))
            if matches!(
                err.kind(),
                std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::AddrInUse
            ) =>
        {
            eprintln!("skipping: cannot bind client port: {}", err);
            return;
        }
        Err(err) => panic!("discover failed: {}", err),
    };
    let xid = harness.join().unwrap();

    // two offers, then the third read timed out
    assert_eq!(offers.len(), 2);
    for (i, offer) in offers.iter().enumerate() {
        assert_eq!(offer.op, OpCode::Reply);
        assert_eq!(offer.xid, xid);
        assert_eq!(offer.yiaddr, Ipv4Address::new(192, 0, 2, 10 + i as u8));
        let opts = offer.get_options();
        assert_eq!(
            opts.get(&field::OPT_DHCP_MESSAGE_TYPE),
            Some(&Value::Bytes(vec![u8::from(MessageType::Offer)]))
        );
        assert_eq!(
            opts.get(&field::OPT_IP_LEASE_TIME),
            Some(&Value::Bytes(vec![0, 0, 0x0e, 0x10]))
        );
    }
}

#[test]
fn endpoint_receives_limited_broadcast() {
    let _guard = PORT_LOCK.lock().unwrap();
    let local = SocketAddr::V4(SocketAddrV4::new([0, 0, 0, 0].into(), CLIENT_PORT));
    let mut receiver = match UdpEndpoint::listen(Network::Udp4, local, "lo") {
        Ok(receiver) => receiver,
        Err(err) => {
            eprintln!("skipping: cannot bind 0.0.0.0:{}: {}", CLIENT_PORT, err);
            return;
        }
    };
    receiver
        .set_recv_timeout(Some(Duration::from_secs(2)))
        .unwrap();

    let unbound = SocketAddr::V4(SocketAddrV4::new([0, 0, 0, 0].into(), 0));
    let mut sender = UdpEndpoint::listen(Network::Udp4, unbound, "lo").unwrap();
    let broadcast = SocketAddr::V4(SocketAddrV4::new([255, 255, 255, 255].into(), CLIENT_PORT));
    if let Err(err) = sender.send_to(b"offer", broadcast) {
        eprintln!("skipping: cannot send limited broadcast: {}", err);
        return;
    }

    let mut buf = [0u8; 64];
    match receiver.recv_from(&mut buf) {
        Ok((len, _)) => assert_eq!(&buf[..len], b"offer"),
        Err(err) => {
            // without CAP_NET_RAW the sender cannot stay on the loopback
            // device, so the datagram leaves through the default route
            eprintln!("skipping: broadcast did not loop back: {}", err);
        }
    }
}
