use std::env;
use std::process;
use std::time::Duration;

use smoldhcp::client::Client;
use smoldhcp::wire::dhcpv4::field;
use smoldhcp::wire::{EthernetAddress, Value};

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .parse_default_env()
        .init();

    let mut opts = getopts::Options::new();
    opts.optflag("h", "help", "print this help menu");
    opts.optopt("", "server", "destination address for the DISCOVER", "ADDR");
    opts.optopt("", "retries", "extra replies to wait for", "COUNT");
    opts.optopt("", "timeout", "per-read timeout in milliseconds", "MS");
    opts.optflag("", "no-hostname", "do not advertise the host name");

    let matches = match opts.parse(env::args().skip(1)) {
        Ok(matches) => matches,
        Err(err) => {
            println!("{}", err);
            process::exit(1)
        }
    };
    if matches.opt_present("h") || matches.free.len() != 1 {
        let brief = format!(
            "Usage: {} [OPTION]... INTERFACE",
            env::args().next().unwrap()
        );
        print!("{}", opts.usage(&brief));
        process::exit(if matches.free.len() != 1 { 1 } else { 0 })
    }

    let mut client = Client::new(&matches.free[0]);
    if let Some(server) = matches.opt_str("server") {
        let server: std::net::Ipv4Addr = server.parse().expect("invalid server address");
        client.server = Some(server.into());
    }
    client.max_read_retries = matches
        .opt_str("retries")
        .map(|s| s.parse().unwrap())
        .unwrap_or(2);
    let timeout = matches
        .opt_str("timeout")
        .map(|s| s.parse().unwrap())
        .unwrap_or(3000);
    client.timeout = Some(Duration::from_millis(timeout));
    client.no_auto_hostname = matches.opt_present("no-hostname");
    client.options.insert(
        field::OPT_PARAMETER_REQUEST_LIST,
        Value::Bytes(vec![
            field::OPT_SUBNET_MASK,
            field::OPT_CLASSLESS_STATIC_ROUTE,
            field::OPT_ROUTER,
            field::OPT_STATIC_ROUTE,
            field::OPT_DOMAIN_NAME_SERVER,
            field::OPT_RENEWAL_TIME_VALUE,
            field::OPT_REBINDING_TIME_VALUE,
        ]),
    );

    let offers = client.discover().expect("discover failed");
    if offers.is_empty() {
        println!("no offers received");
        return;
    }
    for (i, offer) in offers.iter().enumerate() {
        println!("-- offer {} / {} --", i + 1, offers.len());
        println!("op     = {:?}", offer.op);
        println!("xid    = 0x{:08x}", offer.xid);
        println!("secs   = {}", offer.secs);
        println!("ciaddr = {}", offer.ciaddr);
        println!("yiaddr = {}", offer.yiaddr);
        println!("siaddr = {}", offer.siaddr);
        println!("giaddr = {}", offer.giaddr);
        println!(
            "chaddr = {}",
            EthernetAddress::from_bytes(&offer.chaddr[..6])
        );
        for (code, value) in offer.get_options() {
            println!("option {:>3} = {:?}", code, value);
        }
    }
}
