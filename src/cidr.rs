use core::net::IpAddr;

use ipnet::IpNet;

/// Parse a CIDR block (`addr/prefix`) or a bare address into a network
///
/// A bare address is a block covering only itself. Returns `None` when the address is malformed
/// or the prefix length exceeds the address width.
pub fn parse_block(block: &str) -> Option<IpNet> {
    let block = block.trim();

    match block.split_once('/') {
        Some((address, prefix)) => {
            let address = address.parse::<IpAddr>().ok()?;
            // `u8::from_str` accepts a leading `+`, which is not a valid prefix
            if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let prefix = prefix.parse::<u8>().ok()?;

            IpNet::new(address, prefix).ok()
        }
        None => block.parse::<IpAddr>().ok().map(IpNet::from),
    }
}

/// Check if `address` is inside the CIDR block `block`
///
/// Both operands are textual. A block without a prefix length only matches the exact address.
/// Malformed input and mismatched address families never match.
///
/// # Example
/// ```
/// use trusted_request::ip_match;
///
/// assert!(ip_match("192.168.1.5", "192.168.1.0/24"));
/// assert!(!ip_match("::1", "127.0.0.1/32"));
/// ```
pub fn ip_match(address: &str, block: &str) -> bool {
    let Ok(address) = address.trim().parse::<IpAddr>() else {
        return false;
    };

    match parse_block(block) {
        Some(net) => net_contains(&net, &address),
        None => false,
    }
}

/// Prefix comparison between a network and an address of the same family
pub(crate) fn net_contains(net: &IpNet, address: &IpAddr) -> bool {
    match (net, address) {
        (IpNet::V4(net), IpAddr::V4(address)) => net.contains(address),
        (IpNet::V6(net), IpAddr::V6(address)) => net.contains(address),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_block() {
        assert!(ip_match("192.168.1.5", "192.168.1.0/24"));
        assert!(!ip_match("192.168.2.5", "192.168.1.0/24"));
        assert!(ip_match("10.20.30.40", "10.0.0.0/8"));
        assert!(ip_match("1.2.3.4", "0.0.0.0/0"));
    }

    #[test]
    fn host_bits_in_block_are_ignored() {
        assert!(ip_match("192.168.1.200", "192.168.1.77/24"));
    }

    #[test]
    fn exact_match_without_prefix() {
        assert!(ip_match("127.0.0.1", "127.0.0.1"));
        assert!(!ip_match("127.0.0.2", "127.0.0.1"));
        assert!(ip_match("2001:db8::1", "2001:db8::1"));
    }

    #[test]
    fn ipv6_block() {
        assert!(ip_match("2001:db8:cafe::17", "2001:db8::/32"));
        assert!(!ip_match("2001:db9::1", "2001:db8::/32"));
        assert!(ip_match("fd12::1", "fd00::/8"));
    }

    #[test]
    fn family_mismatch() {
        assert!(!ip_match("::1", "127.0.0.1/32"));
        assert!(!ip_match("127.0.0.1", "::1/128"));
        assert!(!ip_match("::ffff:127.0.0.1", "127.0.0.0/8"));
    }

    #[test]
    fn prefix_out_of_range() {
        assert!(!ip_match("192.168.1.5", "192.168.1.0/33"));
        assert!(!ip_match("::1", "::1/129"));
        assert!(!ip_match("192.168.1.5", "192.168.1.0/-1"));
        assert!(!ip_match("192.168.1.5", "192.168.1.0/+24"));
        assert!(!ip_match("192.168.1.5", "192.168.1.0/"));
    }

    #[test]
    fn malformed_input() {
        assert!(!ip_match("", "10.0.0.0/8"));
        assert!(!ip_match("not an ip", "10.0.0.0/8"));
        assert!(!ip_match("10.0.0.1", "garbage"));
        assert!(!ip_match("10.0.0.1", "10.0.0/8"));
        assert!(!ip_match("300.0.0.1", "0.0.0.0/0"));
    }

    #[test]
    fn parse_block_of_bare_address() {
        let net = parse_block("8.8.8.8").unwrap();

        assert_eq!(net.prefix_len(), 32);
        assert!(parse_block(" fd00::/8 ").is_some());
        assert!(parse_block("fd00::/200").is_none());
    }
}
