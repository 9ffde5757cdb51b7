//! Raw-frame classification for the flow pipeline.
//!
//! [`parse`] turns the bytes of one Ethernet frame into a [`PacketInfo`]:
//! the parsed header fields plus a [`FormatFlags`] bitset of the layers
//! recognized on the way down. [`PacketInfo::flow_key`] then folds those
//! fields into the fully-specified match key a flow table is probed with.
//! [`PacketQueue`] is the FIFO the pipeline stages frames in between
//! receive and classification.

pub mod packet_info;
pub mod parser;
pub mod queue;

pub use packet_info::{FormatFlags, PacketInfo};
pub use parser::{ipv4_checksum, parse, ParseError};
pub use queue::{Frame, PacketQueue};
