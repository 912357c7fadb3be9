use std::fmt;
use std::net::Ipv4Addr;

/// Normalize MAC address to lowercase with colons
pub fn normalize_mac(mac: &str) -> String {
    // Remove any existing separators
    let clean: String = mac
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect();

    // Convert to lowercase and insert colons
    if clean.len() != 12 {
        return mac.to_lowercase();
    }

    clean
        .chars()
        .collect::<Vec<_>>()
        .chunks(2)
        .map(|c| c.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(":")
        .to_lowercase()
}

/// Validate an IPv4 address (e.g., "192.168.1.1").
/// Returns true if the string is a valid dotted-decimal IPv4 address.
pub fn is_valid_ipv4(ip: &str) -> bool {
    let parts: Vec<&str> = ip.split('.').collect();
    if parts.len() != 4 {
        return false;
    }
    parts.iter().all(|p| p.parse::<u8>().is_ok())
}

/// Validate a device name.
/// Allows alphanumeric, hyphens, dots, and underscores. No path separators or shell metacharacters.
pub fn is_valid_hostname(hostname: &str) -> bool {
    if hostname.is_empty() || hostname.len() > 253 {
        return false;
    }
    hostname.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
}

/// Convert a dotted-decimal IPv4 address to its integer form.
pub fn ipv4_to_u32(ip: &str) -> Result<u32, String> {
    if !is_valid_ipv4(ip) {
        return Err(format!("Invalid IPv4 address: {}", ip));
    }
    ip.parse::<Ipv4Addr>()
        .map(u32::from)
        .map_err(|e| format!("Invalid IPv4 address {}: {}", ip, e))
}

/// Convert an integer IPv4 address back to dotted-decimal form.
pub fn u32_to_ipv4(n: u32) -> String {
    Ipv4Addr::from(n).to_string()
}

/// Network mask for a prefix length (0..=32).
pub fn prefix_mask(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        len if len >= 32 => u32::MAX,
        len => u32::MAX << (32 - len),
    }
}

/// Parse "a.b.c.d/len" keeping the host bits as written.
/// Returns (address, prefix_length).
pub fn parse_cidr_address(cidr: &str) -> Result<(u32, u8), String> {
    let (ip, len) = cidr
        .split_once('/')
        .ok_or_else(|| format!("Invalid CIDR (missing '/'): {}", cidr))?;
    let addr = ipv4_to_u32(ip.trim())?;
    let prefix_len: u8 = len
        .trim()
        .parse()
        .map_err(|_| format!("Invalid prefix length in {}", cidr))?;
    if prefix_len > 32 {
        return Err(format!("Prefix length out of range in {}", cidr));
    }
    Ok((addr, prefix_len))
}

/// Parse "a.b.c.d/len" into (network, broadcast, prefix_length).
pub fn parse_cidr(cidr: &str) -> Result<(u32, u32, u8), String> {
    let (addr, prefix_len) = parse_cidr_address(cidr)?;
    let block = Ipv4Block::new(addr, prefix_len);
    Ok((block.network, block.broadcast(), prefix_len))
}

/// Format a network address and prefix length as "a.b.c.d/len".
pub fn format_cidr(network: u32, prefix_len: u8) -> String {
    format!("{}/{}", u32_to_ipv4(network), prefix_len)
}

/// Smallest prefix length whose block holds `count` addresses:
/// `32 - ceil(log2(count))`.
///
/// Returns `None` when `count` is zero (log2 undefined) or when the count
/// does not fit in the IPv4 space.
pub fn cidr_for(count: u64) -> Option<u8> {
    if count == 0 {
        return None;
    }
    let bits = if count == 1 {
        0
    } else {
        64 - (count - 1).leading_zeros()
    };
    if bits > 32 {
        return None;
    }
    Some((32 - bits) as u8)
}

/// Block anchored at the network of `base` sized for `count` addresses.
pub fn subnet_for(base: u32, count: u64) -> Option<Ipv4Block> {
    cidr_for(count).map(|len| Ipv4Block::new(base, len))
}

/// An aligned IPv4 block (network address + prefix length).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Block {
    pub network: u32,
    pub prefix_len: u8,
}

impl Ipv4Block {
    /// Build a block, clearing any host bits of `addr`.
    pub fn new(addr: u32, prefix_len: u8) -> Self {
        let prefix_len = prefix_len.min(32);
        Self {
            network: addr & prefix_mask(prefix_len),
            prefix_len,
        }
    }

    pub fn parse(cidr: &str) -> Result<Self, String> {
        let (addr, len) = parse_cidr_address(cidr)?;
        Ok(Self::new(addr, len))
    }

    pub fn broadcast(&self) -> u32 {
        self.network | !prefix_mask(self.prefix_len)
    }

    /// Total number of addresses in the block.
    pub fn size(&self) -> u64 {
        1u64 << (32 - self.prefix_len as u32)
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr & prefix_mask(self.prefix_len) == self.network
    }

    pub fn overlaps(&self, other: &Ipv4Block) -> bool {
        self.network <= other.broadcast() && other.network <= self.broadcast()
    }

    /// Every address in the block, network and broadcast included.
    pub fn addresses(&self) -> impl Iterator<Item = u32> {
        self.network..=self.broadcast()
    }

    /// Usable host addresses. /31 and /32 have no network/broadcast reservation.
    pub fn hosts(&self) -> impl Iterator<Item = u32> {
        let (first, last) = if self.prefix_len >= 31 {
            (self.network, self.broadcast())
        } else {
            (self.network + 1, self.broadcast() - 1)
        };
        first..=last
    }

    /// Split into consecutive sub-blocks of `prefix_len`.
    /// Yields nothing when `prefix_len` is shorter than this block's.
    pub fn subnets(&self, prefix_len: u8) -> impl Iterator<Item = Ipv4Block> {
        let block = *self;
        let count = if prefix_len < block.prefix_len || prefix_len > 32 {
            0
        } else {
            1u64 << (prefix_len - block.prefix_len)
        };
        let step = if prefix_len > 32 { 0 } else { 1u64 << (32 - prefix_len as u32) };
        (0..count).map(move |i| Ipv4Block {
            network: (block.network as u64 + i * step) as u32,
            prefix_len,
        })
    }
}

impl fmt::Display for Ipv4Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_cidr(self.network, self.prefix_len))
    }
}
