//! End-to-end classification: queued frames in, forwarding decisions out.

use flow_classifier::{ipv4_checksum, parse, Frame, PacketQueue};
use flow_table::FlowTable;
use flow_types::{EtherType, FlowKey};
use pretty_assertions::assert_eq;

fn eth_frame(ether_type: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend_from_slice(&[0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb]);
    frame.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    frame.extend_from_slice(&ether_type.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

fn ipv4_packet(proto: u8, dst: [u8; 4], payload: &[u8]) -> Vec<u8> {
    let total = 20 + payload.len();
    let mut packet = vec![0u8; 20];
    packet[0] = 0x45;
    packet[2..4].copy_from_slice(&(total as u16).to_be_bytes());
    packet[8] = 64;
    packet[9] = proto;
    packet[12..16].copy_from_slice(&[192, 168, 1, 100]);
    packet[16..20].copy_from_slice(&dst);
    let checksum = ipv4_checksum(&packet[..20]);
    packet[10..12].copy_from_slice(&checksum.to_be_bytes());
    packet.extend_from_slice(payload);
    packet
}

fn tcp_segment(dst_port: u16) -> Vec<u8> {
    let mut segment = vec![0u8; 20];
    segment[0..2].copy_from_slice(&40000u16.to_be_bytes());
    segment[2..4].copy_from_slice(&dst_port.to_be_bytes());
    segment[12] = 0x50;
    segment
}

fn udp_datagram(dst_port: u16) -> Vec<u8> {
    let mut datagram = vec![0u8; 8];
    datagram[0..2].copy_from_slice(&40000u16.to_be_bytes());
    datagram[2..4].copy_from_slice(&dst_port.to_be_bytes());
    datagram[4..6].copy_from_slice(&8u16.to_be_bytes());
    datagram
}

fn arp_request() -> Vec<u8> {
    let mut body = vec![0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01];
    body.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 10, 0, 0, 1]);
    body.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 10, 0, 0, 2]);
    eth_frame(0x0806, &body)
}

fn web_frame() -> Vec<u8> {
    eth_frame(0x0800, &ipv4_packet(6, [10, 0, 0, 5], &tcp_segment(80)))
}

/// ARP to the controller, web traffic to the web rule, everything else
/// to the catch-all.
fn forwarding_table() -> FlowTable<&'static str> {
    let mut table = FlowTable::new();
    table
        .insert(
            FlowKey::any().with_ether_type(EtherType::ARP),
            500,
            "arp-controller",
        )
        .unwrap();
    table
        .insert(
            FlowKey::any()
                .with_ether_type(EtherType::IPV4)
                .with_ip_proto(6)
                .with_dst_ip("10.0.0.0/24".parse().unwrap())
                .with_l4_dst_port(80),
            300,
            "web",
        )
        .unwrap();
    table.insert(FlowKey::any(), 0, "drop").unwrap();
    table
}

#[test]
fn test_queued_frames_get_forwarding_decisions() {
    let table = forwarding_table();

    let mut queue = PacketQueue::new();
    queue.enqueue(Frame::new(1, arp_request()));
    queue.enqueue(Frame::new(2, web_frame()));
    queue.enqueue(Frame::new(2, eth_frame(0x0800, &ipv4_packet(6, [10, 0, 0, 5], &tcp_segment(443)))));
    queue.enqueue(Frame::new(3, eth_frame(0x0800, &ipv4_packet(17, [192, 168, 1, 1], &udp_datagram(53)))));

    let mut decisions = Vec::new();
    while let Some(frame) = queue.dequeue() {
        let info = parse(&frame.data).unwrap();
        let key = info.flow_key(frame.in_port);
        decisions.push(*table.lookup(&key).unwrap());
    }

    assert_eq!(decisions, vec!["arp-controller", "web", "drop", "drop"]);
    assert!(queue.is_empty());
}

#[test]
fn test_classifier_keys_are_exact() {
    let info = parse(&web_frame()).unwrap();
    assert!(info.flow_key(2).is_exact());

    let info = parse(&arp_request()).unwrap();
    assert!(info.flow_key(1).is_exact());
}

#[test]
fn test_exact_pin_overrides_wildcard_rules() {
    let mut table = forwarding_table();

    let pinned_key = parse(&web_frame()).unwrap().flow_key(2);
    table.insert(pinned_key, 10, "pinned").unwrap();

    // The pin wins despite its low priority.
    assert_eq!(table.lookup(&pinned_key), Some(&"pinned"));

    // The same flow on a different port misses the pin and falls back to
    // the wildcard rules.
    let other_port = parse(&web_frame()).unwrap().flow_key(3);
    assert_eq!(table.lookup(&other_port), Some(&"web"));
}

#[test]
fn test_corrupt_frames_never_reach_the_table() {
    let mut frame = web_frame();
    // Flip a bit in the IPv4 header; the checksum catches it.
    frame[24] ^= 0xff;
    assert!(parse(&frame).is_err());
}
