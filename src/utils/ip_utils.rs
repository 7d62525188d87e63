use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// IP utility functions for parsing and checking store values

/// Parse a subnet cell, rejecting blocks with host bits set
pub fn parse_subnet(value: &str) -> Result<Ipv4Net, String> {
    let net: Ipv4Net = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a valid IPv4 CIDR block", value))?;
    if net.trunc() != net {
        return Err(format!(
            "'{}' has host bits set (network address is {})",
            value,
            net.trunc()
        ));
    }
    Ok(net)
}

/// Parse an address cell
pub fn parse_address(value: &str) -> Result<Ipv4Addr, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a valid IPv4 address", value))
}

/// First and last usable host of a subnet, or `None` for /31 and /32
pub fn host_bounds(net: &Ipv4Net) -> Option<(u32, u32)> {
    if net.prefix_len() >= 31 {
        return None;
    }
    let network = u32::from(net.network());
    let broadcast = u32::from(net.broadcast());
    Some((network + 1, broadcast - 1))
}

/// Check that an address is inside the subnet and is neither its network nor
/// its broadcast address
pub fn is_usable_host(net: &Ipv4Net, addr: Ipv4Addr) -> bool {
    match host_bounds(net) {
        Some((first, last)) => (first..=last).contains(&u32::from(addr)),
        None => false,
    }
}

/// Check if two CIDR blocks overlap
pub fn blocks_overlap(a: &Ipv4Net, b: &Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}
