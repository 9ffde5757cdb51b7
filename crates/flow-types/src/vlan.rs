//! VLAN ID type with validation and the host-protocol "untagged" marker.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// IEEE 802.1Q VLAN identifier.
///
/// Valid configured IDs are 1-4094 (0 and 4095 are reserved by 802.1Q).
/// The distinguished value [`VlanId::NONE`] (0xffff) denotes "no VLAN tag":
/// in a match key it selects untagged frames.
///
/// # Examples
///
/// ```
/// use flow_types::VlanId;
///
/// let vlan = VlanId::new(100).unwrap();
/// assert_eq!(vlan.as_u16(), 100);
///
/// assert!(VlanId::new(0).is_err());
/// assert!(VlanId::new(4095).is_err());
/// assert_eq!(VlanId::NONE.to_string(), "none");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct VlanId(u16);

impl VlanId {
    /// Minimum valid configured VLAN ID.
    pub const MIN: u16 = 1;

    /// Maximum valid configured VLAN ID.
    pub const MAX: u16 = 4094;

    /// The "untagged" marker (0xffff).
    pub const NONE: VlanId = VlanId(0xffff);

    /// Creates a validated VLAN ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID is not in the valid range (1-4094).
    /// Use [`VlanId::NONE`] for the untagged marker.
    pub const fn new(id: u16) -> Result<Self, ParseError> {
        if id >= Self::MIN && id <= Self::MAX {
            Ok(VlanId(id))
        } else {
            Err(ParseError::InvalidVlanId(id))
        }
    }

    /// Extracts the 12-bit VID from a wire TCI value, without validation.
    ///
    /// Reserved VIDs 0 (priority tag) and 4095 pass through unchanged;
    /// classification keys carry whatever was on the wire.
    pub const fn from_wire(tci: u16) -> Self {
        VlanId(tci & 0x0fff)
    }

    /// Returns the raw 16-bit value (0xffff for [`VlanId::NONE`]).
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns true if this is the untagged marker.
    pub const fn is_none(&self) -> bool {
        self.0 == 0xffff
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for VlanId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("none") {
            return Ok(VlanId::NONE);
        }

        // Handle "Vlan100" format
        let id_str = match s.get(..4) {
            Some(head) if head.eq_ignore_ascii_case("vlan") => &s[4..],
            _ => s,
        };

        let id: u16 = id_str.parse().map_err(|_| ParseError::InvalidVlanId(0))?;

        VlanId::new(id)
    }
}

impl TryFrom<u16> for VlanId {
    type Error = ParseError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        if id == 0xffff {
            Ok(VlanId::NONE)
        } else {
            VlanId::new(id)
        }
    }
}

impl From<VlanId> for u16 {
    fn from(vlan: VlanId) -> u16 {
        vlan.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_vlan_ids() {
        assert!(VlanId::new(1).is_ok());
        assert!(VlanId::new(100).is_ok());
        assert!(VlanId::new(4094).is_ok());
    }

    #[test]
    fn test_invalid_vlan_ids() {
        assert!(VlanId::new(0).is_err());
        assert!(VlanId::new(4095).is_err());
        assert!(VlanId::new(0xffff).is_err());
    }

    #[test]
    fn test_untagged_marker() {
        assert!(VlanId::NONE.is_none());
        assert_eq!(VlanId::NONE.as_u16(), 0xffff);
        assert!(!VlanId::new(100).unwrap().is_none());
    }

    #[test]
    fn test_from_wire_masks_tci() {
        // TCI with PCP 5, DEI 0, VID 100
        assert_eq!(VlanId::from_wire(0xa064).as_u16(), 100);
        assert_eq!(VlanId::from_wire(0x0fff).as_u16(), 4095);
    }

    #[test]
    fn test_parse_forms() {
        let vlan: VlanId = "100".parse().unwrap();
        assert_eq!(vlan.as_u16(), 100);

        let prefixed: VlanId = "Vlan200".parse().unwrap();
        assert_eq!(prefixed.as_u16(), 200);

        let untagged: VlanId = "none".parse().unwrap();
        assert!(untagged.is_none());

        assert!("vlan".parse::<VlanId>().is_err());
        assert!("4095".parse::<VlanId>().is_err());
    }

    #[test]
    fn test_serde_preserves_none() {
        let json = serde_json::to_string(&VlanId::NONE).unwrap();
        assert_eq!(json, "65535");
        let back: VlanId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, VlanId::NONE);
    }

    #[test]
    fn test_display() {
        assert_eq!(VlanId::new(100).unwrap().to_string(), "100");
        assert_eq!(VlanId::NONE.to_string(), "none");
    }
}
