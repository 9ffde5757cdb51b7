//! Parsed packet fields and protocol-family predicates.

use flow_types::{EtherType, FlowKey, Ipv4Address, Ipv4Prefix, MacAddress, VlanId};
use std::fmt;

/// Bitset recording which headers the parser recognized in a frame.
///
/// One bit per layer finding; a frame accumulates bits as parsing
/// descends, so "IPv4 TCP" is `NW_IPV4 | TP_TCP` on top of its
/// link-layer bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatFlags(u32);

impl FormatFlags {
    /// Ethernet II (DIX) framing.
    pub const ETH_DIX: FormatFlags = FormatFlags(1 << 0);
    /// 802.3 framing with no LLC header (raw 802.3).
    pub const ETH_8023_RAW: FormatFlags = FormatFlags(1 << 1);
    /// 802.3 framing with an LLC header but no SNAP extension.
    pub const ETH_8023_LLC: FormatFlags = FormatFlags(1 << 2);
    /// 802.3 framing with an LLC/SNAP header.
    pub const ETH_8023_SNAP: FormatFlags = FormatFlags(1 << 3);
    /// An 802.1Q tag was present.
    pub const ETH_8021Q: FormatFlags = FormatFlags(1 << 4);
    /// ARP payload.
    pub const NW_ARP: FormatFlags = FormatFlags(1 << 5);
    /// IPv4 payload.
    pub const NW_IPV4: FormatFlags = FormatFlags(1 << 6);
    /// ICMPv4 inside IPv4.
    pub const NW_ICMPV4: FormatFlags = FormatFlags(1 << 7);
    /// TCP inside IPv4.
    pub const TP_TCP: FormatFlags = FormatFlags(1 << 8);
    /// UDP inside IPv4.
    pub const TP_UDP: FormatFlags = FormatFlags(1 << 9);

    /// No layer recognized yet.
    pub const EMPTY: FormatFlags = FormatFlags(0);

    pub const fn contains(&self, flags: FormatFlags) -> bool {
        self.0 & flags.0 == flags.0
    }

    pub const fn with(self, flags: FormatFlags) -> FormatFlags {
        FormatFlags(self.0 | flags.0)
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for FormatFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Header fields extracted from one frame, plus the [`FormatFlags`]
/// recording which layers were recognized.
///
/// Fields belonging to unrecognized layers hold their zero values; check
/// the predicates (or [`FormatFlags`]) before reading them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketInfo {
    pub format: FormatFlags,
    pub src_mac: MacAddress,
    pub dst_mac: MacAddress,
    /// [`VlanId::NONE`] when the frame carried no 802.1Q tag.
    pub vlan_vid: VlanId,
    pub vlan_pcp: u8,
    pub ether_type: EtherType,
    pub ipv4_tos: u8,
    pub ipv4_proto: u8,
    pub ipv4_src: Ipv4Address,
    pub ipv4_dst: Ipv4Address,
    pub arp_op: u16,
    pub arp_spa: Ipv4Address,
    pub arp_tpa: Ipv4Address,
    pub l4_src_port: u16,
    pub l4_dst_port: u16,
    pub icmp_type: u8,
    pub icmp_code: u8,
}

impl Default for PacketInfo {
    fn default() -> Self {
        PacketInfo {
            format: FormatFlags::EMPTY,
            src_mac: MacAddress::ZERO,
            dst_mac: MacAddress::ZERO,
            vlan_vid: VlanId::NONE,
            vlan_pcp: 0,
            ether_type: EtherType::new(0),
            ipv4_tos: 0,
            ipv4_proto: 0,
            ipv4_src: Ipv4Address::UNSPECIFIED,
            ipv4_dst: Ipv4Address::UNSPECIFIED,
            arp_op: 0,
            arp_spa: Ipv4Address::UNSPECIFIED,
            arp_tpa: Ipv4Address::UNSPECIFIED,
            l4_src_port: 0,
            l4_dst_port: 0,
            icmp_type: 0,
            icmp_code: 0,
        }
    }
}

impl PacketInfo {
    /// Any recognized Ethernet framing (DIX or one of the 802.3 forms).
    pub fn is_ether(&self) -> bool {
        self.format.contains(FormatFlags::ETH_DIX)
            || self.format.contains(FormatFlags::ETH_8023_RAW)
            || self.format.contains(FormatFlags::ETH_8023_LLC)
            || self.format.contains(FormatFlags::ETH_8023_SNAP)
    }

    pub fn is_eth_dix(&self) -> bool {
        self.format.contains(FormatFlags::ETH_DIX)
    }

    pub fn is_eth_raw(&self) -> bool {
        self.format.contains(FormatFlags::ETH_8023_RAW)
    }

    pub fn is_eth_llc(&self) -> bool {
        self.format.contains(FormatFlags::ETH_8023_LLC)
    }

    pub fn is_eth_snap(&self) -> bool {
        self.format.contains(FormatFlags::ETH_8023_SNAP)
    }

    pub fn is_vlan_tagged(&self) -> bool {
        self.format.contains(FormatFlags::ETH_8021Q)
    }

    pub fn is_arp(&self) -> bool {
        self.format.contains(FormatFlags::NW_ARP)
    }

    pub fn is_ipv4(&self) -> bool {
        self.format.contains(FormatFlags::NW_IPV4)
    }

    pub fn is_icmpv4(&self) -> bool {
        self.format.contains(FormatFlags::NW_ICMPV4)
    }

    pub fn is_ipv4_tcp(&self) -> bool {
        self.format
            .contains(FormatFlags::NW_IPV4.with(FormatFlags::TP_TCP))
    }

    pub fn is_ipv4_udp(&self) -> bool {
        self.format
            .contains(FormatFlags::NW_IPV4.with(FormatFlags::TP_UDP))
    }

    /// Builds the fully-specified match key for this packet as received
    /// on `in_port`.
    ///
    /// Every key field is constrained, so the result always lands in (or
    /// probes) the exact-match index. Host-protocol conventions apply to
    /// layers the packet does not carry: for ARP the protocol field holds
    /// the low eight bits of the opcode and the address fields hold the
    /// sender/target addresses; for ICMPv4 the transport-port fields hold
    /// the message type and code; all remaining inapplicable fields are
    /// zero.
    pub fn flow_key(&self, in_port: u16) -> FlowKey {
        let mut key = FlowKey::any()
            .with_in_port(in_port)
            .with_src_mac(self.src_mac)
            .with_dst_mac(self.dst_mac)
            .with_vlan_id(self.vlan_vid)
            .with_vlan_pcp(self.vlan_pcp)
            .with_ether_type(self.ether_type)
            .with_ip_tos(0)
            .with_ip_proto(0)
            .with_src_ip(Ipv4Prefix::host(Ipv4Address::UNSPECIFIED))
            .with_dst_ip(Ipv4Prefix::host(Ipv4Address::UNSPECIFIED))
            .with_l4_src_port(0)
            .with_l4_dst_port(0);

        if self.is_ipv4() {
            key = key
                .with_ip_tos(self.ipv4_tos)
                .with_ip_proto(self.ipv4_proto)
                .with_src_ip(Ipv4Prefix::host(self.ipv4_src))
                .with_dst_ip(Ipv4Prefix::host(self.ipv4_dst));
            if self.is_ipv4_tcp() || self.is_ipv4_udp() {
                key = key
                    .with_l4_src_port(self.l4_src_port)
                    .with_l4_dst_port(self.l4_dst_port);
            } else if self.is_icmpv4() {
                key = key
                    .with_l4_src_port(u16::from(self.icmp_type))
                    .with_l4_dst_port(u16::from(self.icmp_code));
            }
        } else if self.is_arp() {
            key = key
                .with_ip_proto((self.arp_op & 0x00ff) as u8)
                .with_src_ip(Ipv4Prefix::host(self.arp_spa))
                .with_dst_ip(Ipv4Prefix::host(self.arp_tpa));
        }

        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flags_accumulate() {
        let format = FormatFlags::ETH_DIX
            .with(FormatFlags::NW_IPV4)
            .with(FormatFlags::TP_TCP);
        assert!(format.contains(FormatFlags::ETH_DIX));
        assert!(format.contains(FormatFlags::NW_IPV4.with(FormatFlags::TP_TCP)));
        assert!(!format.contains(FormatFlags::TP_UDP));
        assert!(FormatFlags::EMPTY.is_empty());
    }

    #[test]
    fn test_compound_predicates() {
        let mut info = PacketInfo::default();
        info.format = FormatFlags::ETH_DIX.with(FormatFlags::NW_IPV4);
        assert!(info.is_ether());
        assert!(info.is_ipv4());
        assert!(!info.is_ipv4_tcp());

        info.format = info.format.with(FormatFlags::TP_TCP);
        assert!(info.is_ipv4_tcp());
        assert!(!info.is_ipv4_udp());
    }

    #[test]
    fn test_flow_key_is_always_exact() {
        let info = PacketInfo::default();
        assert!(info.flow_key(1).is_exact());
    }

    #[test]
    fn test_flow_key_icmp_type_code_in_port_fields() {
        let info = PacketInfo {
            format: FormatFlags::ETH_DIX
                .with(FormatFlags::NW_IPV4)
                .with(FormatFlags::NW_ICMPV4),
            ether_type: EtherType::IPV4,
            ipv4_proto: 1,
            icmp_type: 8,
            icmp_code: 0,
            ..PacketInfo::default()
        };
        let key = info.flow_key(1);
        assert_eq!(key.l4_src_port(), Some(8));
        assert_eq!(key.l4_dst_port(), Some(0));
    }

    #[test]
    fn test_flow_key_arp_mapping() {
        let info = PacketInfo {
            format: FormatFlags::ETH_DIX.with(FormatFlags::NW_ARP),
            ether_type: EtherType::ARP,
            arp_op: 0x0102,
            arp_spa: Ipv4Address::new(10, 0, 0, 1),
            arp_tpa: Ipv4Address::new(10, 0, 0, 2),
            ..PacketInfo::default()
        };
        let key = info.flow_key(4);
        // Low byte of the opcode rides in the protocol field.
        assert_eq!(key.ip_proto(), Some(0x02));
        assert_eq!(key.src_ip(), Ipv4Prefix::host(Ipv4Address::new(10, 0, 0, 1)));
        assert_eq!(key.dst_ip(), Ipv4Prefix::host(Ipv4Address::new(10, 0, 0, 2)));
        assert_eq!(key.l4_src_port(), Some(0));
    }
}
