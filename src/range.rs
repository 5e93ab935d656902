//! IPv4 CIDR ranges: parsing, enumeration and sub-block partitioning.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::errors::ConfigError;

/// An IPv4 network in CIDR notation. Host bits of the input address are
/// masked off on construction, so `239.1.2.3/16` and `239.1.0.0/16` are the
/// same network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Net {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Net {
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, ConfigError> {
        if prefix > 32 {
            return Err(ConfigError::InvalidRange(format!("{addr}/{prefix}")));
        }
        let network = Ipv4Addr::from(u32::from(addr) & prefix_mask(prefix));
        Ok(Self { network, prefix })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of addresses covered, network and broadcast included.
    pub fn num_addresses(&self) -> u64 {
        1u64 << (32 - self.prefix)
    }

    /// True when every address in the network is multicast (224.0.0.0/4).
    pub fn is_multicast(&self) -> bool {
        self.network.is_multicast() && self.prefix >= 4
    }

    /// Every address in the network, in ascending order.
    pub fn addresses(self) -> impl Iterator<Item = Ipv4Addr> {
        let base = u32::from(self.network) as u64;
        (0..self.num_addresses()).map(move |i| Ipv4Addr::from((base + i) as u32))
    }

    /// Split into equal sub-blocks of `new_prefix`. The union of the blocks
    /// is exactly this network, with no overlap. The new prefix must be
    /// strictly longer than the range's own, otherwise a single worker would
    /// own the whole range.
    pub fn subnets(&self, new_prefix: u8) -> Result<Vec<Ipv4Net>, ConfigError> {
        if new_prefix <= self.prefix || new_prefix > 32 {
            return Err(ConfigError::SubnetSize {
                size: new_prefix,
                prefix: self.prefix,
            });
        }
        let base = u32::from(self.network) as u64;
        let step = 1u64 << (32 - new_prefix);
        Ok((0..self.num_addresses() / step)
            .map(|i| Ipv4Net {
                network: Ipv4Addr::from((base + i * step) as u32),
                prefix: new_prefix,
            })
            .collect())
    }
}

impl FromStr for Ipv4Net {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidRange(s.to_string());
        let (ip, prefix) = s.split_once('/').ok_or_else(invalid)?;
        let ip = ip.parse::<Ipv4Addr>().map_err(|_| invalid())?;
        let prefix = prefix.parse::<u8>().map_err(|_| invalid())?;
        Self::new(ip, prefix)
    }
}

impl fmt::Display for Ipv4Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

fn prefix_mask(prefix: u8) -> u32 {
    if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) }
}
