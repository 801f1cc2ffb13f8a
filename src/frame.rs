//! The on-wire 32-byte frame and its codec (C4).
//!
//! Wire layout (spec §6), big-endian bit packing within the control triple:
//! ```text
//! byte 0, bits 7..5 : control version (3 bits, currently 0)
//! byte 0, bits 4..0 : data length    (5 bits, 0..29)
//! byte 1, bits 7..3 : fragment number (5 bits, 0..31)
//! byte 1, bits 2..0 : endpoint        (3 bits, 0..4)
//! byte 2, bit  7    : multicast flag
//! byte 2, bit  6    : require-ack flag
//! byte 2, bits 5..0 : reserved / pad
//! bytes 3..31       : user payload (up to 29 bytes)
//! ```

use crate::addr::{Endpoint, IpAddress, MacAddress, PipeNumber};
use heapless::Vec;

pub const FRAME_LEN: usize = 32;
pub const MAX_PAYLOAD: usize = 29;
const CONTROL_VERSION: u8 = 0;

/// The on-wire unit exchanged with the transceiver, plus out-of-band
/// metadata that never crosses the air (destination, retransmit settings,
/// and -- receive side only -- the pipe it arrived on).
#[derive(Clone, PartialEq, defmt::Format)]
pub struct Frame {
    pub fragment_number: u8,
    pub endpoint: Endpoint,
    pub multicast: bool,
    pub require_ack: bool,
    pub payload: Vec<u8, MAX_PAYLOAD>,

    /// Destination IP. Not transmitted; used by the TX pump to resolve a MAC.
    pub dest_ip: IpAddress,
    /// Hardware auto-retransmit count/delay to apply before sending this frame.
    pub retransmit_count: u8,
    pub retransmit_delay_us: u16,
    /// Pipe the frame arrived on. Receive side only.
    pub rx_pipe: PipeNumber,
}

impl Frame {
    pub fn data_length(&self) -> u8 {
        self.payload.len() as u8
    }

    pub fn frame_length(&self) -> usize {
        3 + self.payload.len()
    }

    /// Serialize the control triple plus payload, zero-padding the rest.
    /// Fails only if the payload exceeds [`MAX_PAYLOAD`] -- an invariant
    /// violation, not a data-dependent failure.
    pub fn pack(&self) -> Option<[u8; FRAME_LEN]> {
        let data_len = self.payload.len();
        if data_len > MAX_PAYLOAD || self.fragment_number > 31 {
            return None;
        }

        let mut out = [0u8; FRAME_LEN];
        out[0] = (CONTROL_VERSION << 5) | (data_len as u8 & 0x1F);
        out[1] = (self.fragment_number << 3) | (self.endpoint.as_control_bits() & 0x07);
        out[2] = ((self.multicast as u8) << 7) | ((self.require_ack as u8) << 6);
        out[3..3 + data_len].copy_from_slice(&self.payload);
        Some(out)
    }

    /// Inverse of [`Frame::pack`]. Returns `None` on a control-version
    /// mismatch; such frames are dropped with a counter increment by the
    /// caller, not surfaced as an error (spec §4.3).
    pub fn unpack(bytes: &[u8; FRAME_LEN], rx_pipe: PipeNumber) -> Option<Self> {
        let version = bytes[0] >> 5;
        if version != CONTROL_VERSION {
            return None;
        }

        let data_len = (bytes[0] & 0x1F) as usize;
        if data_len > MAX_PAYLOAD {
            return None;
        }
        let fragment_number = bytes[1] >> 3;
        let endpoint = Endpoint::from_control_bits(bytes[1] & 0x07)?;
        let multicast = bytes[2] & 0x80 != 0;
        let require_ack = bytes[2] & 0x40 != 0;

        let mut payload = Vec::new();
        payload.extend_from_slice(&bytes[3..3 + data_len]).ok()?;

        Some(Self {
            fragment_number,
            endpoint,
            multicast,
            require_ack,
            payload,
            dest_ip: IpAddress::new(0),
            retransmit_count: 0,
            retransmit_delay_us: 0,
            rx_pipe,
        })
    }

    /// MAC with the destination endpoint's address modifier applied -- where
    /// per-endpoint steering happens on the TX path (spec §4.4.4).
    pub fn steer_to_endpoint(base: MacAddress, endpoint: Endpoint) -> MacAddress {
        base.with_endpoint_modifier(endpoint.address_modifier())
    }
}
