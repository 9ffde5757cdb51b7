//! Network vocabulary shared across the flowtable workspace.
//!
//! This crate provides type-safe representations of the header fields a
//! classification rule can constrain:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`Ipv4Address`] / [`Ipv4Prefix`]: IPv4 addresses and CIDR prefixes
//! - [`VlanId`]: IEEE 802.1Q VLAN identifiers, plus the "untagged" marker
//! - [`EtherType`]: Ethernet frame type numbers
//! - [`FlowKey`] / [`Wildcards`]: the twelve-field match pattern itself

mod ethertype;
mod ip;
mod key;
mod mac;
mod vlan;

pub use ethertype::EtherType;
pub use ip::{Ipv4Address, Ipv4Prefix};
pub use key::{FlowKey, Wildcards};
pub use mac::MacAddress;
pub use vlan::VlanId;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IPv4 address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IPv4 prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid VLAN ID: {0} (must be 1-4094, or 0xffff for untagged)")]
    InvalidVlanId(u16),

    #[error("invalid ethertype: {0}")]
    InvalidEtherType(String),
}
