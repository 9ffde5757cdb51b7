//! EtherType (Ethernet frame type) numbers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An Ethernet frame type number, displayed in the conventional hex form.
///
/// # Examples
///
/// ```
/// use flow_types::EtherType;
///
/// assert_eq!(EtherType::IPV4.to_string(), "0x0800");
/// assert_eq!("0x0806".parse::<EtherType>().unwrap(), EtherType::ARP);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EtherType(u16);

impl EtherType {
    /// Internet Protocol version 4.
    pub const IPV4: EtherType = EtherType(0x0800);

    /// Address Resolution Protocol.
    pub const ARP: EtherType = EtherType(0x0806);

    /// IEEE 802.1Q VLAN tag.
    pub const VLAN: EtherType = EtherType(0x8100);

    /// Internet Protocol version 6.
    pub const IPV6: EtherType = EtherType(0x86dd);

    /// Link Layer Discovery Protocol.
    pub const LLDP: EtherType = EtherType(0x88cc);

    /// Stand-in frame type for 802.3 frames that carry no real one
    /// (raw 802.3 or LLC without a SNAP header).
    pub const NOT_ETH_TYPE: EtherType = EtherType(0x05ff);

    /// Values below this are IEEE 802.3 length fields, not frame types.
    pub const MIN_DIX: u16 = 0x0600;

    pub const fn new(value: u16) -> Self {
        EtherType(value)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns true if the value is a DIX frame type rather than an
    /// 802.3 length field.
    pub const fn is_dix(&self) -> bool {
        self.0 >= Self::MIN_DIX
    }

    pub const fn is_ipv4(&self) -> bool {
        self.0 == Self::IPV4.0
    }

    pub const fn is_arp(&self) -> bool {
        self.0 == Self::ARP.0
    }

    /// Returns true if this is the 802.1Q tag protocol identifier.
    pub const fn is_vlan_tag(&self) -> bool {
        self.0 == Self::VLAN.0
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl FromStr for EtherType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            u16::from_str_radix(hex, 16)
        } else {
            s.parse()
        };
        parsed
            .map(EtherType)
            .map_err(|_| ParseError::InvalidEtherType(s.to_string()))
    }
}

impl From<u16> for EtherType {
    fn from(value: u16) -> Self {
        EtherType(value)
    }
}

impl From<EtherType> for u16 {
    fn from(ethertype: EtherType) -> u16 {
        ethertype.0
    }
}
