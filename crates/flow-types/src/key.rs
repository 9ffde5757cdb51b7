//! The flow match key: a twelve-field header pattern with wildcards.

use crate::{EtherType, Ipv4Address, Ipv4Prefix, MacAddress, VlanId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The set of non-address fields a [`FlowKey`] leaves unconstrained.
///
/// Address wildcarding is not represented here: it is expressed by the
/// prefix length carried next to each address (0 = fully wildcarded,
/// 32 = exact host).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wildcards(u16);

impl Wildcards {
    pub const IN_PORT: Wildcards = Wildcards(1 << 0);
    pub const SRC_MAC: Wildcards = Wildcards(1 << 1);
    pub const DST_MAC: Wildcards = Wildcards(1 << 2);
    pub const VLAN_ID: Wildcards = Wildcards(1 << 3);
    pub const VLAN_PCP: Wildcards = Wildcards(1 << 4);
    pub const ETHER_TYPE: Wildcards = Wildcards(1 << 5);
    pub const IP_TOS: Wildcards = Wildcards(1 << 6);
    pub const IP_PROTO: Wildcards = Wildcards(1 << 7);
    pub const L4_SRC_PORT: Wildcards = Wildcards(1 << 8);
    pub const L4_DST_PORT: Wildcards = Wildcards(1 << 9);

    /// Every non-address field wildcarded.
    pub const ALL: Wildcards = Wildcards(0x03ff);

    /// No field wildcarded.
    pub const NONE: Wildcards = Wildcards(0);

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains(&self, fields: Wildcards) -> bool {
        self.0 & fields.0 == fields.0
    }

    pub const fn with(self, fields: Wildcards) -> Wildcards {
        Wildcards(self.0 | fields.0)
    }

    pub const fn without(self, fields: Wildcards) -> Wildcards {
        Wildcards(self.0 & !fields.0)
    }

    pub const fn bits(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Wildcards {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#05x}", self.0)
    }
}

/// A header match pattern: the fields a classification rule constrains,
/// with everything else wildcarded.
///
/// Keys are normalized on construction: a wildcarded field always holds
/// its zero value and each address is masked down to its prefix length.
/// Two keys that constrain the same fields to the same values therefore
/// compare equal (and hash equal) no matter how they were built, which is
/// exactly the "strict equality" rule management needs.
///
/// Fields are set through the `with_*` builders; accessors return `None`
/// for wildcarded fields.
///
/// # Examples
///
/// ```
/// use flow_types::{EtherType, FlowKey};
///
/// let rule = FlowKey::any()
///     .with_ether_type(EtherType::IPV4)
///     .with_dst_ip("10.0.0.0/8".parse().unwrap());
///
/// let probe = FlowKey::any()
///     .with_in_port(1)
///     .with_ether_type(EtherType::IPV4)
///     .with_dst_ip("10.1.2.3/32".parse().unwrap());
///
/// assert!(rule.covers(&probe));
/// assert!(!probe.covers(&rule));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawFlowKey", into = "RawFlowKey")]
pub struct FlowKey {
    wildcards: Wildcards,
    in_port: u16,
    src_mac: MacAddress,
    dst_mac: MacAddress,
    vlan_id: VlanId,
    vlan_pcp: u8,
    ether_type: EtherType,
    ip_tos: u8,
    ip_proto: u8,
    src_ip: Ipv4Address,
    src_ip_len: u8,
    dst_ip: Ipv4Address,
    dst_ip_len: u8,
    l4_src_port: u16,
    l4_dst_port: u16,
}

impl FlowKey {
    /// The fully wildcarded key: covers every packet, constrains nothing.
    pub const fn any() -> FlowKey {
        FlowKey {
            wildcards: Wildcards::ALL,
            in_port: 0,
            src_mac: MacAddress::ZERO,
            dst_mac: MacAddress::ZERO,
            vlan_id: VlanId::from_wire(0),
            vlan_pcp: 0,
            ether_type: EtherType::new(0),
            ip_tos: 0,
            ip_proto: 0,
            src_ip: Ipv4Address::UNSPECIFIED,
            src_ip_len: 0,
            dst_ip: Ipv4Address::UNSPECIFIED,
            dst_ip_len: 0,
            l4_src_port: 0,
            l4_dst_port: 0,
        }
    }

    pub fn with_in_port(mut self, port: u16) -> Self {
        self.wildcards = self.wildcards.without(Wildcards::IN_PORT);
        self.in_port = port;
        self
    }

    pub fn with_src_mac(mut self, mac: MacAddress) -> Self {
        self.wildcards = self.wildcards.without(Wildcards::SRC_MAC);
        self.src_mac = mac;
        self
    }

    pub fn with_dst_mac(mut self, mac: MacAddress) -> Self {
        self.wildcards = self.wildcards.without(Wildcards::DST_MAC);
        self.dst_mac = mac;
        self
    }

    pub fn with_vlan_id(mut self, vlan: VlanId) -> Self {
        self.wildcards = self.wildcards.without(Wildcards::VLAN_ID);
        self.vlan_id = vlan;
        self
    }

    /// Constrains the VLAN priority bits; only the low three bits are kept.
    pub fn with_vlan_pcp(mut self, pcp: u8) -> Self {
        self.wildcards = self.wildcards.without(Wildcards::VLAN_PCP);
        self.vlan_pcp = pcp & 0x07;
        self
    }

    pub fn with_ether_type(mut self, ether_type: EtherType) -> Self {
        self.wildcards = self.wildcards.without(Wildcards::ETHER_TYPE);
        self.ether_type = ether_type;
        self
    }

    /// Constrains the IP ToS byte; the two ECN bits are not matchable and
    /// are cleared.
    pub fn with_ip_tos(mut self, tos: u8) -> Self {
        self.wildcards = self.wildcards.without(Wildcards::IP_TOS);
        self.ip_tos = tos & 0xfc;
        self
    }

    pub fn with_ip_proto(mut self, proto: u8) -> Self {
        self.wildcards = self.wildcards.without(Wildcards::IP_PROTO);
        self.ip_proto = proto;
        self
    }

    pub fn with_src_ip(mut self, prefix: Ipv4Prefix) -> Self {
        self.src_ip = prefix.address();
        self.src_ip_len = prefix.prefix_len();
        self
    }

    pub fn with_dst_ip(mut self, prefix: Ipv4Prefix) -> Self {
        self.dst_ip = prefix.address();
        self.dst_ip_len = prefix.prefix_len();
        self
    }

    pub fn with_l4_src_port(mut self, port: u16) -> Self {
        self.wildcards = self.wildcards.without(Wildcards::L4_SRC_PORT);
        self.l4_src_port = port;
        self
    }

    pub fn with_l4_dst_port(mut self, port: u16) -> Self {
        self.wildcards = self.wildcards.without(Wildcards::L4_DST_PORT);
        self.l4_dst_port = port;
        self
    }

    /// Reverts the named fields to wildcarded, zeroing their stored values
    /// so the result is indistinguishable from a key that never set them.
    pub fn wildcard(mut self, fields: Wildcards) -> Self {
        self.wildcards = self.wildcards.with(fields);
        if fields.contains(Wildcards::IN_PORT) {
            self.in_port = 0;
        }
        if fields.contains(Wildcards::SRC_MAC) {
            self.src_mac = MacAddress::ZERO;
        }
        if fields.contains(Wildcards::DST_MAC) {
            self.dst_mac = MacAddress::ZERO;
        }
        if fields.contains(Wildcards::VLAN_ID) {
            self.vlan_id = VlanId::from_wire(0);
        }
        if fields.contains(Wildcards::VLAN_PCP) {
            self.vlan_pcp = 0;
        }
        if fields.contains(Wildcards::ETHER_TYPE) {
            self.ether_type = EtherType::new(0);
        }
        if fields.contains(Wildcards::IP_TOS) {
            self.ip_tos = 0;
        }
        if fields.contains(Wildcards::IP_PROTO) {
            self.ip_proto = 0;
        }
        if fields.contains(Wildcards::L4_SRC_PORT) {
            self.l4_src_port = 0;
        }
        if fields.contains(Wildcards::L4_DST_PORT) {
            self.l4_dst_port = 0;
        }
        self
    }

    pub fn wildcards(&self) -> Wildcards {
        self.wildcards
    }

    pub fn in_port(&self) -> Option<u16> {
        self.field(Wildcards::IN_PORT, self.in_port)
    }

    pub fn src_mac(&self) -> Option<MacAddress> {
        self.field(Wildcards::SRC_MAC, self.src_mac)
    }

    pub fn dst_mac(&self) -> Option<MacAddress> {
        self.field(Wildcards::DST_MAC, self.dst_mac)
    }

    pub fn vlan_id(&self) -> Option<VlanId> {
        self.field(Wildcards::VLAN_ID, self.vlan_id)
    }

    pub fn vlan_pcp(&self) -> Option<u8> {
        self.field(Wildcards::VLAN_PCP, self.vlan_pcp)
    }

    pub fn ether_type(&self) -> Option<EtherType> {
        self.field(Wildcards::ETHER_TYPE, self.ether_type)
    }

    pub fn ip_tos(&self) -> Option<u8> {
        self.field(Wildcards::IP_TOS, self.ip_tos)
    }

    pub fn ip_proto(&self) -> Option<u8> {
        self.field(Wildcards::IP_PROTO, self.ip_proto)
    }

    /// The source address constraint; a /0 prefix means unconstrained.
    pub fn src_ip(&self) -> Ipv4Prefix {
        // Stored address is pre-masked, so the length is always valid.
        Ipv4Prefix::new(self.src_ip, self.src_ip_len).unwrap_or(Ipv4Prefix::ANY)
    }

    /// The destination address constraint; a /0 prefix means unconstrained.
    pub fn dst_ip(&self) -> Ipv4Prefix {
        Ipv4Prefix::new(self.dst_ip, self.dst_ip_len).unwrap_or(Ipv4Prefix::ANY)
    }

    pub fn l4_src_port(&self) -> Option<u16> {
        self.field(Wildcards::L4_SRC_PORT, self.l4_src_port)
    }

    pub fn l4_dst_port(&self) -> Option<u16> {
        self.field(Wildcards::L4_DST_PORT, self.l4_dst_port)
    }

    fn field<T: Copy>(&self, flag: Wildcards, value: T) -> Option<T> {
        if self.wildcards.contains(flag) {
            None
        } else {
            Some(value)
        }
    }

    /// Returns true if every field is constrained: no wildcard flags and
    /// both addresses at /32. Only exact keys live in the exact-match
    /// index, and the keys the classifier builds are always exact.
    pub fn is_exact(&self) -> bool {
        self.wildcards.is_empty() && self.src_ip_len == 32 && self.dst_ip_len == 32
    }

    /// Returns true if this key, read as a rule pattern, matches `probe`.
    ///
    /// Per field: a wildcarded rule field matches anything; a constrained
    /// rule field requires the probe to constrain the same field to an
    /// equal value. An address constraint requires the probe's prefix to
    /// be at least as long as the rule's and the addresses to agree on the
    /// rule's masked bits.
    pub fn covers(&self, probe: &FlowKey) -> bool {
        self.field_covered(probe, Wildcards::IN_PORT, self.in_port == probe.in_port)
            && self.field_covered(probe, Wildcards::SRC_MAC, self.src_mac == probe.src_mac)
            && self.field_covered(probe, Wildcards::DST_MAC, self.dst_mac == probe.dst_mac)
            && self.field_covered(probe, Wildcards::VLAN_ID, self.vlan_id == probe.vlan_id)
            && self.field_covered(probe, Wildcards::VLAN_PCP, self.vlan_pcp == probe.vlan_pcp)
            && self.field_covered(probe, Wildcards::ETHER_TYPE, self.ether_type == probe.ether_type)
            && self.field_covered(probe, Wildcards::IP_TOS, self.ip_tos == probe.ip_tos)
            && self.field_covered(probe, Wildcards::IP_PROTO, self.ip_proto == probe.ip_proto)
            && self.field_covered(probe, Wildcards::L4_SRC_PORT, self.l4_src_port == probe.l4_src_port)
            && self.field_covered(probe, Wildcards::L4_DST_PORT, self.l4_dst_port == probe.l4_dst_port)
            && prefix_covered(self.src_ip, self.src_ip_len, probe.src_ip, probe.src_ip_len)
            && prefix_covered(self.dst_ip, self.dst_ip_len, probe.dst_ip, probe.dst_ip_len)
    }

    fn field_covered(&self, probe: &FlowKey, flag: Wildcards, equal: bool) -> bool {
        self.wildcards.contains(flag) || (!probe.wildcards.contains(flag) && equal)
    }
}

fn prefix_covered(rule_ip: Ipv4Address, rule_len: u8, probe_ip: Ipv4Address, probe_len: u8) -> bool {
    probe_len >= rule_len && probe_ip.masked(rule_len) == rule_ip
}

impl Default for FlowKey {
    fn default() -> Self {
        FlowKey::any()
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if let Some(port) = self.in_port() {
            parts.push(format!("in_port={}", port));
        }
        if let Some(mac) = self.src_mac() {
            parts.push(format!("src_mac={}", mac));
        }
        if let Some(mac) = self.dst_mac() {
            parts.push(format!("dst_mac={}", mac));
        }
        if let Some(vlan) = self.vlan_id() {
            parts.push(format!("vlan_id={}", vlan));
        }
        if let Some(pcp) = self.vlan_pcp() {
            parts.push(format!("vlan_pcp={}", pcp));
        }
        if let Some(ethertype) = self.ether_type() {
            parts.push(format!("ether_type={}", ethertype));
        }
        if let Some(tos) = self.ip_tos() {
            parts.push(format!("ip_tos={}", tos));
        }
        if let Some(proto) = self.ip_proto() {
            parts.push(format!("ip_proto={}", proto));
        }
        if self.src_ip_len > 0 {
            parts.push(format!("src_ip={}", self.src_ip()));
        }
        if self.dst_ip_len > 0 {
            parts.push(format!("dst_ip={}", self.dst_ip()));
        }
        if let Some(port) = self.l4_src_port() {
            parts.push(format!("l4_src_port={}", port));
        }
        if let Some(port) = self.l4_dst_port() {
            parts.push(format!("l4_dst_port={}", port));
        }

        if parts.is_empty() {
            write!(f, "any")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Serde wire form of [`FlowKey`]; conversion back re-normalizes, so a
/// deserialized key upholds the same invariants as a built one.
///
/// The VLAN field travels as a bare `u16`: keys hold unvalidated wire
/// VIDs (the zero filler behind a wildcard, VID 0 from a priority tag)
/// that the validated [`VlanId`] wire form refuses.
#[derive(Serialize, Deserialize)]
struct RawFlowKey {
    wildcards: Wildcards,
    in_port: u16,
    src_mac: MacAddress,
    dst_mac: MacAddress,
    vlan_id: u16,
    vlan_pcp: u8,
    ether_type: EtherType,
    ip_tos: u8,
    ip_proto: u8,
    src_ip: Ipv4Address,
    src_ip_len: u8,
    dst_ip: Ipv4Address,
    dst_ip_len: u8,
    l4_src_port: u16,
    l4_dst_port: u16,
}

impl From<FlowKey> for RawFlowKey {
    fn from(key: FlowKey) -> RawFlowKey {
        RawFlowKey {
            wildcards: key.wildcards,
            in_port: key.in_port,
            src_mac: key.src_mac,
            dst_mac: key.dst_mac,
            vlan_id: key.vlan_id.as_u16(),
            vlan_pcp: key.vlan_pcp,
            ether_type: key.ether_type,
            ip_tos: key.ip_tos,
            ip_proto: key.ip_proto,
            src_ip: key.src_ip,
            src_ip_len: key.src_ip_len,
            dst_ip: key.dst_ip,
            dst_ip_len: key.dst_ip_len,
            l4_src_port: key.l4_src_port,
            l4_dst_port: key.l4_dst_port,
        }
    }
}

impl From<RawFlowKey> for FlowKey {
    fn from(raw: RawFlowKey) -> FlowKey {
        let mut key = FlowKey::any();
        if !raw.wildcards.contains(Wildcards::IN_PORT) {
            key = key.with_in_port(raw.in_port);
        }
        if !raw.wildcards.contains(Wildcards::SRC_MAC) {
            key = key.with_src_mac(raw.src_mac);
        }
        if !raw.wildcards.contains(Wildcards::DST_MAC) {
            key = key.with_dst_mac(raw.dst_mac);
        }
        if !raw.wildcards.contains(Wildcards::VLAN_ID) {
            let vlan = if raw.vlan_id == VlanId::NONE.as_u16() {
                VlanId::NONE
            } else {
                VlanId::from_wire(raw.vlan_id)
            };
            key = key.with_vlan_id(vlan);
        }
        if !raw.wildcards.contains(Wildcards::VLAN_PCP) {
            key = key.with_vlan_pcp(raw.vlan_pcp);
        }
        if !raw.wildcards.contains(Wildcards::ETHER_TYPE) {
            key = key.with_ether_type(raw.ether_type);
        }
        if !raw.wildcards.contains(Wildcards::IP_TOS) {
            key = key.with_ip_tos(raw.ip_tos);
        }
        if !raw.wildcards.contains(Wildcards::IP_PROTO) {
            key = key.with_ip_proto(raw.ip_proto);
        }
        if !raw.wildcards.contains(Wildcards::L4_SRC_PORT) {
            key = key.with_l4_src_port(raw.l4_src_port);
        }
        if !raw.wildcards.contains(Wildcards::L4_DST_PORT) {
            key = key.with_l4_dst_port(raw.l4_dst_port);
        }

        let src_len = raw.src_ip_len.min(32);
        key.src_ip = raw.src_ip.masked(src_len);
        key.src_ip_len = src_len;
        let dst_len = raw.dst_ip_len.min(32);
        key.dst_ip = raw.dst_ip.masked(dst_len);
        key.dst_ip_len = dst_len;
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn probe() -> FlowKey {
        FlowKey::any()
            .with_in_port(3)
            .with_src_mac("00:11:22:33:44:55".parse().unwrap())
            .with_dst_mac("66:77:88:99:aa:bb".parse().unwrap())
            .with_vlan_id(VlanId::NONE)
            .with_vlan_pcp(0)
            .with_ether_type(EtherType::IPV4)
            .with_ip_tos(0)
            .with_ip_proto(6)
            .with_src_ip("192.168.1.10/32".parse().unwrap())
            .with_dst_ip("10.0.0.1/32".parse().unwrap())
            .with_l4_src_port(40000)
            .with_l4_dst_port(80)
    }

    #[test]
    fn test_any_covers_everything() {
        assert!(FlowKey::any().covers(&probe()));
        assert!(FlowKey::any().covers(&FlowKey::any()));
    }

    #[test]
    fn test_builder_constrains_field() {
        let key = FlowKey::any().with_in_port(3);
        assert_eq!(key.in_port(), Some(3));
        assert_eq!(key.l4_dst_port(), None);
        assert!(!key.wildcards().contains(Wildcards::IN_PORT));
        assert!(key.wildcards().contains(Wildcards::L4_DST_PORT));
    }

    #[test]
    fn test_wildcard_resets_value() {
        let key = FlowKey::any()
            .with_in_port(5)
            .with_ip_proto(17)
            .wildcard(Wildcards::IN_PORT.with(Wildcards::IP_PROTO));
        assert_eq!(key, FlowKey::any());
    }

    #[test]
    fn test_prefix_normalization() {
        let sloppy = FlowKey::any().with_src_ip("10.1.2.3/8".parse().unwrap());
        let clean = FlowKey::any().with_src_ip("10.0.0.0/8".parse().unwrap());
        assert_eq!(sloppy, clean);
    }

    #[test]
    fn test_exactness() {
        assert!(probe().is_exact());
        assert!(!FlowKey::any().is_exact());
        assert!(!probe().wildcard(Wildcards::IP_TOS).is_exact());
        assert!(!probe().with_dst_ip("10.0.0.0/24".parse().unwrap()).is_exact());
    }

    #[test]
    fn test_covers_field_equality() {
        let rule = FlowKey::any().with_ether_type(EtherType::IPV4).with_ip_proto(6);
        assert!(rule.covers(&probe()));

        let udp_probe = probe().with_ip_proto(17);
        assert!(!rule.covers(&udp_probe));
    }

    #[test]
    fn test_covers_requires_probe_specificity() {
        // A rule that constrains a field the probe wildcards cannot match.
        let rule = FlowKey::any().with_in_port(3);
        let vague = probe().wildcard(Wildcards::IN_PORT);
        assert!(!rule.covers(&vague));
    }

    #[test]
    fn test_prefix_covering() {
        let rule = FlowKey::any().with_dst_ip("10.0.0.0/8".parse().unwrap());
        assert!(rule.covers(&probe()));

        let outside = probe().with_dst_ip("11.0.0.1/32".parse().unwrap());
        assert!(!rule.covers(&outside));

        // Probe shorter than the rule's prefix cannot satisfy it.
        let short = probe().with_dst_ip("10.0.0.0/4".parse().unwrap());
        assert!(!rule.covers(&short));
    }

    #[test]
    fn test_display() {
        assert_eq!(FlowKey::any().to_string(), "any");

        let key = FlowKey::any()
            .with_in_port(1)
            .with_vlan_id(VlanId::NONE)
            .with_ether_type(EtherType::ARP)
            .with_dst_ip("10.0.0.0/8".parse().unwrap());
        assert_eq!(
            key.to_string(),
            "in_port=1, vlan_id=none, ether_type=0x0806, dst_ip=10.0.0.0/8"
        );
    }

    #[test]
    fn test_json_round_trip() {
        let key = probe();
        let json = serde_json::to_string(&key).unwrap();
        let back: FlowKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_deserialization_normalizes() {
        let key = FlowKey::any().with_dst_ip("10.0.0.0/8".parse().unwrap());
        let mut value = serde_json::to_value(key).unwrap();
        // Denormalize the wire form: host bits below the prefix, and a
        // value behind a wildcarded field.
        value["dst_ip"] = serde_json::json!("10.9.9.9");
        value["in_port"] = serde_json::json!(7);
        let back: FlowKey = serde_json::from_value(value).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_json_round_trip_wildcarded_vlan() {
        // The filler behind a wildcarded VLAN is not a valid configured
        // ID; it travels outside the validated VlanId wire form.
        for key in [FlowKey::any(), FlowKey::any().with_ether_type(EtherType::IPV4)] {
            let json = serde_json::to_string(&key).unwrap();
            let back: FlowKey = serde_json::from_str(&json).unwrap();
            assert_eq!(back, key);
            assert_eq!(back.vlan_id(), None);
        }
    }

    #[test]
    fn test_json_round_trip_priority_tag_vid() {
        // A priority tag constrains the key to wire VID 0.
        let key = probe().with_vlan_id(VlanId::from_wire(0));
        let back: FlowKey =
            serde_json::from_str(&serde_json::to_string(&key).unwrap()).unwrap();
        assert_eq!(back, key);
        assert_eq!(back.vlan_id(), Some(VlanId::from_wire(0)));
    }
}
