//! Frame parsing: raw Ethernet bytes to a [`PacketInfo`].
//!
//! The parser walks the frame one layer at a time, accumulating
//! [`FormatFlags`] for each header it recognizes. Unknown frame types and
//! IP protocols are not errors; parsing stops at the last recognized
//! layer. Truncated or malformed headers in a recognized layer are.

use crate::packet_info::{FormatFlags, PacketInfo};
use byteorder::{ByteOrder, NetworkEndian};
use flow_types::{EtherType, Ipv4Address, MacAddress, VlanId};
use thiserror::Error;
use tracing::debug;

const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const LLC_HEADER_LEN: usize = 3;
const LLC_SNAP_LEN: usize = 8;
const ARP_IPV4_LEN: usize = 28;
const IPV4_MIN_HEADER_LEN: usize = 20;
const TCP_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;
const ICMP_MIN_LEN: usize = 4;

const ARP_HW_ETHERNET: u16 = 1;
const IP_PROTO_ICMP: u8 = 1;
const IP_PROTO_TCP: u8 = 6;
const IP_PROTO_UDP: u8 = 17;

/// Fragment-offset bits of the IPv4 flags/offset field.
const IP_FRAG_OFFSET_MASK: u16 = 0x1fff;

/// Why a frame could not be classified.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("truncated {layer} header: need {need} bytes, have {have}")]
    Truncated {
        layer: &'static str,
        need: usize,
        have: usize,
    },
    #[error("bad IP version {0} (expected 4)")]
    BadIpVersion(u8),
    #[error("bad IPv4 header length {0} (expected at least 5 words)")]
    BadIpHeaderLength(u8),
    #[error("IPv4 total length {total} does not fit the {available} available bytes")]
    BadIpTotalLength { total: u16, available: usize },
    #[error("IPv4 header checksum mismatch")]
    BadIpChecksum,
    #[error("malformed ARP header (not IPv4 over Ethernet)")]
    BadArpHeader,
}

fn require(buf: &[u8], need: usize, layer: &'static str) -> Result<(), ParseError> {
    if buf.len() < need {
        return Err(ParseError::Truncated {
            layer,
            need,
            have: buf.len(),
        });
    }
    Ok(())
}

fn mac_at(buf: &[u8], offset: usize) -> MacAddress {
    let mut octets = [0u8; 6];
    octets.copy_from_slice(&buf[offset..offset + 6]);
    MacAddress::new(octets)
}

fn ipv4_at(buf: &[u8], offset: usize) -> Ipv4Address {
    Ipv4Address::new(buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3])
}

/// Classifies one raw Ethernet frame.
///
/// Recognizes DIX and 802.3 (raw, LLC, LLC/SNAP) framing, one 802.1Q
/// tag, ARP, IPv4 (with header-checksum verification), and TCP, UDP and
/// ICMP inside IPv4. Transport headers of non-first fragments are not
/// parsed. A frame type or IP protocol with no parser leaves the deeper
/// layers unrecognized but still succeeds.
///
/// # Errors
///
/// Returns [`ParseError`] when a recognized layer is truncated or fails
/// validation (IPv4 version, header length, total length, checksum, or
/// a non-IPv4-over-Ethernet ARP header).
///
/// # Examples
///
/// ```
/// use flow_classifier::parse;
///
/// let mut frame = vec![
///     0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // destination
///     0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // source
///     0x08, 0x06, // ARP
/// ];
/// frame.extend_from_slice(&[
///     0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01, // request
///     0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 10, 0, 0, 1, // sender
///     0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 10, 0, 0, 2, // target
/// ]);
///
/// let info = parse(&frame).unwrap();
/// assert!(info.is_arp());
/// assert_eq!(info.arp_op, 1);
/// ```
pub fn parse(frame: &[u8]) -> Result<PacketInfo, ParseError> {
    let mut info = PacketInfo::default();

    require(frame, ETHERNET_HEADER_LEN, "Ethernet")?;
    info.dst_mac = mac_at(frame, 0);
    info.src_mac = mac_at(frame, 6);
    let mut type_or_len = NetworkEndian::read_u16(&frame[12..14]);
    let mut rest = &frame[ETHERNET_HEADER_LEN..];

    if type_or_len == EtherType::VLAN.as_u16() {
        require(rest, VLAN_TAG_LEN, "802.1Q tag")?;
        let tci = NetworkEndian::read_u16(&rest[..2]);
        info.format = info.format.with(FormatFlags::ETH_8021Q);
        info.vlan_pcp = (tci >> 13) as u8;
        info.vlan_vid = VlanId::from_wire(tci);
        type_or_len = NetworkEndian::read_u16(&rest[2..4]);
        rest = &rest[VLAN_TAG_LEN..];
    }

    if type_or_len >= EtherType::MIN_DIX {
        info.format = info.format.with(FormatFlags::ETH_DIX);
        info.ether_type = EtherType::new(type_or_len);
    } else if rest.len() >= 2 && rest[0] == 0xff && rest[1] == 0xff {
        // Novell raw 802.3: the payload starts directly with the IPX
        // checksum marker, no LLC header at all.
        info.format = info.format.with(FormatFlags::ETH_8023_RAW);
        info.ether_type = EtherType::NOT_ETH_TYPE;
    } else {
        require(rest, LLC_HEADER_LEN, "LLC")?;
        let (dsap, ssap, control) = (rest[0], rest[1], rest[2]);
        if dsap == 0xaa && ssap == 0xaa && control == 0x03 {
            require(rest, LLC_SNAP_LEN, "SNAP")?;
            info.format = info.format.with(FormatFlags::ETH_8023_SNAP);
            let oui = [rest[3], rest[4], rest[5]];
            if oui == [0, 0, 0] {
                // Zero OUI means the SNAP type field is a real frame type.
                info.ether_type = EtherType::new(NetworkEndian::read_u16(&rest[6..8]));
                rest = &rest[LLC_SNAP_LEN..];
            } else {
                debug!(oui = ?oui, "SNAP header with vendor OUI carries no frame type");
                info.ether_type = EtherType::NOT_ETH_TYPE;
            }
        } else {
            info.format = info.format.with(FormatFlags::ETH_8023_LLC);
            info.ether_type = EtherType::NOT_ETH_TYPE;
        }
    }

    match info.ether_type {
        EtherType::ARP => parse_arp(rest, &mut info)?,
        EtherType::IPV4 => parse_ipv4(rest, &mut info)?,
        EtherType::NOT_ETH_TYPE => {}
        other => debug!(ether_type = %other, "no network-layer parser for frame type"),
    }

    Ok(info)
}

fn parse_arp(buf: &[u8], info: &mut PacketInfo) -> Result<(), ParseError> {
    require(buf, ARP_IPV4_LEN, "ARP")?;
    let htype = NetworkEndian::read_u16(&buf[0..2]);
    let ptype = NetworkEndian::read_u16(&buf[2..4]);
    let (hlen, plen) = (buf[4], buf[5]);
    if htype != ARP_HW_ETHERNET || ptype != EtherType::IPV4.as_u16() || hlen != 6 || plen != 4 {
        return Err(ParseError::BadArpHeader);
    }

    info.format = info.format.with(FormatFlags::NW_ARP);
    info.arp_op = NetworkEndian::read_u16(&buf[6..8]);
    info.arp_spa = ipv4_at(buf, 14);
    info.arp_tpa = ipv4_at(buf, 24);
    Ok(())
}

fn parse_ipv4(buf: &[u8], info: &mut PacketInfo) -> Result<(), ParseError> {
    require(buf, IPV4_MIN_HEADER_LEN, "IPv4")?;
    let version = buf[0] >> 4;
    if version != 4 {
        return Err(ParseError::BadIpVersion(version));
    }
    let ihl = buf[0] & 0x0f;
    let header_len = usize::from(ihl) * 4;
    if header_len < IPV4_MIN_HEADER_LEN {
        return Err(ParseError::BadIpHeaderLength(ihl));
    }
    require(buf, header_len, "IPv4 options")?;
    let total_len = NetworkEndian::read_u16(&buf[2..4]);
    // Frames are commonly padded past the IP datagram, so only a total
    // length that overruns the buffer (or undercuts its own header) is bad.
    if usize::from(total_len) < header_len || usize::from(total_len) > buf.len() {
        return Err(ParseError::BadIpTotalLength {
            total: total_len,
            available: buf.len(),
        });
    }
    if ipv4_checksum(&buf[..header_len]) != 0 {
        return Err(ParseError::BadIpChecksum);
    }

    info.format = info.format.with(FormatFlags::NW_IPV4);
    info.ipv4_tos = buf[1];
    info.ipv4_proto = buf[9];
    info.ipv4_src = ipv4_at(buf, 12);
    info.ipv4_dst = ipv4_at(buf, 16);

    // Non-first fragments carry no transport header.
    let flags_and_offset = NetworkEndian::read_u16(&buf[6..8]);
    if flags_and_offset & IP_FRAG_OFFSET_MASK != 0 {
        return Ok(());
    }

    let payload = &buf[header_len..usize::from(total_len)];
    match info.ipv4_proto {
        IP_PROTO_ICMP => parse_icmp(payload, info)?,
        IP_PROTO_TCP => parse_tcp(payload, info)?,
        IP_PROTO_UDP => parse_udp(payload, info)?,
        other => debug!(proto = other, "no transport-layer parser for IP protocol"),
    }
    Ok(())
}

fn parse_icmp(buf: &[u8], info: &mut PacketInfo) -> Result<(), ParseError> {
    require(buf, ICMP_MIN_LEN, "ICMP")?;
    info.format = info.format.with(FormatFlags::NW_ICMPV4);
    info.icmp_type = buf[0];
    info.icmp_code = buf[1];
    Ok(())
}

fn parse_tcp(buf: &[u8], info: &mut PacketInfo) -> Result<(), ParseError> {
    require(buf, TCP_HEADER_LEN, "TCP")?;
    info.format = info.format.with(FormatFlags::TP_TCP);
    info.l4_src_port = NetworkEndian::read_u16(&buf[0..2]);
    info.l4_dst_port = NetworkEndian::read_u16(&buf[2..4]);
    Ok(())
}

fn parse_udp(buf: &[u8], info: &mut PacketInfo) -> Result<(), ParseError> {
    require(buf, UDP_HEADER_LEN, "UDP")?;
    info.format = info.format.with(FormatFlags::TP_UDP);
    info.l4_src_port = NetworkEndian::read_u16(&buf[0..2]);
    info.l4_dst_port = NetworkEndian::read_u16(&buf[2..4]);
    Ok(())
}

/// RFC 1071 ones-complement checksum over `data`.
///
/// Over a header whose checksum field is zeroed this returns the value to
/// store there; over a header carrying a correct checksum it returns 0.
/// An odd trailing byte is padded with a zero low byte.
pub fn ipv4_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for chunk in chunks.by_ref() {
        sum += u32::from(NetworkEndian::read_u16(chunk));
    }
    if let Some(&last) = chunks.remainder().first() {
        sum += u32::from(last) << 8;
    }
    while sum > 0xffff {
        sum = (sum >> 16) + (sum & 0xffff);
    }
    !(sum as u16)
}
