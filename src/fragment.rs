//! Fragmentation and reassembly (C6): splits an application payload into
//! ≤29-byte [`Frame`] payloads sharing one 16-bit UUID, and reassembles an
//! incoming stream of frames back into a byte buffer under a memory budget
//! and a timeout.
//!
//! The transport header (UUID, total length, CRC32) rides in front of the
//! user bytes in fragment 0's payload -- grounded on `original_source/src/
//! netstack/util/fragment_util.cpp`, which reinterprets fragment 0's data as
//! a `TransportHeader` struct. Reassembly ordering uses the merge-sort in
//! `original_source/src/netstack/util/fragment_sort.cpp`, adapted from a
//! linked list to a `heapless::Vec` since Rust has no placement-new lists.

use crate::addr::Endpoint;
use crate::frame::{Frame, MAX_PAYLOAD};
use crate::status::Status;
use core::time::Duration;
use crc::{Crc, CRC_32_ISO_HDLC};
use heapless::Vec;
use std::time::Instant;

/// 5-bit fragment-number field: at most 32 frames per packet.
pub const MAX_FRAGMENTS: usize = 32;
const HEADER_LEN: usize = 8;
const FIRST_FRAME_CAPACITY: usize = MAX_PAYLOAD - HEADER_LEN;

pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_millis(750);

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Transport-level metadata carried in front of the user payload in
/// fragment 0 (spec §4.5 / §3 supplement).
#[derive(Clone, Copy, PartialEq, Eq, Debug, defmt::Format)]
pub struct TransportHeader {
    pub packet_uuid: u16,
    pub payload_len: u16,
    pub crc32: u32,
}

impl TransportHeader {
    fn pack(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..2].copy_from_slice(&self.packet_uuid.to_be_bytes());
        out[2..4].copy_from_slice(&self.payload_len.to_be_bytes());
        out[4..8].copy_from_slice(&self.crc32.to_be_bytes());
        out
    }

    fn unpack(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_LEN {
            return None;
        }
        Some(Self {
            packet_uuid: u16::from_be_bytes([bytes[0], bytes[1]]),
            payload_len: u16::from_be_bytes([bytes[2], bytes[3]]),
            crc32: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }
}

/// A fully reassembled application payload, handed up to the network
/// interface facade.
#[derive(Clone, Debug)]
pub struct Packet {
    pub uuid: u16,
    pub endpoint: Endpoint,
    pub bytes: std::vec::Vec<u8>,
}

/// Splits `payload` into an ordered list of frames sharing `uuid`. Fails
/// with `InvalidParam` if more than [`MAX_FRAGMENTS`] frames would be
/// required -- the 5-bit fragment-number field cannot address more -- and
/// with `Memory` if `heap` doesn't have `payload.len() + K * header size`
/// bytes free (spec §4.5: computed and checked *before* any fragment is
/// built).
pub fn split(
    payload: &[u8],
    endpoint: Endpoint,
    dest_ip: crate::addr::IpAddress,
    require_ack: bool,
    uuid: u16,
    retransmit_count: u8,
    retransmit_delay_us: u16,
    heap: &crate::arena::HeapBudget,
) -> Result<Vec<Frame, MAX_FRAGMENTS>, Status> {
    if payload.len() > u16::MAX as usize {
        return Err(Status::InvalidParam);
    }

    let first_len = payload.len().min(FIRST_FRAME_CAPACITY);
    let remaining = &payload[first_len..];
    let tail_count = remaining.len().div_ceil(MAX_PAYLOAD);
    let total = 1 + tail_count;
    if total > MAX_FRAGMENTS {
        return Err(Status::InvalidParam);
    }

    let needed = payload.len() + total * HEADER_LEN;
    heap.reserve(needed)?;

    let header = TransportHeader {
        packet_uuid: uuid,
        payload_len: payload.len() as u16,
        crc32: compute_crc(uuid, payload.len() as u16, payload),
    };

    let mut frames = Vec::new();

    let mut first_payload: Vec<u8, MAX_PAYLOAD> = Vec::new();
    first_payload.extend_from_slice(&header.pack()).map_err(|_| Status::Fail)?;
    first_payload.extend_from_slice(&payload[..first_len]).map_err(|_| Status::Fail)?;
    frames
        .push(Frame {
            fragment_number: 0,
            endpoint,
            multicast: false,
            require_ack,
            payload: first_payload,
            dest_ip,
            retransmit_count,
            retransmit_delay_us,
            rx_pipe: crate::addr::PipeNumber::Invalid,
        })
        .map_err(|_| Status::Fail)?;

    for (i, chunk) in remaining.chunks(MAX_PAYLOAD).enumerate() {
        let mut body: Vec<u8, MAX_PAYLOAD> = Vec::new();
        body.extend_from_slice(chunk).map_err(|_| Status::Fail)?;
        frames
            .push(Frame {
                fragment_number: (i + 1) as u8,
                endpoint,
                multicast: false,
                require_ack,
                payload: body,
                dest_ip,
                retransmit_count,
                retransmit_delay_us,
                rx_pipe: crate::addr::PipeNumber::Invalid,
            })
            .map_err(|_| Status::Fail)?;
    }

    Ok(frames)
}

/// Bytes a [`split`] call of this shape reserved from its [`crate::arena::
/// HeapBudget`] -- callers hold onto this so they can [`crate::arena::
/// HeapBudget::release`] the same amount once every frame from the split is
/// done with (spec §4.5's "remaining free memory" check, inverted).
pub fn reserved_bytes(payload_len: usize, frame_count: usize) -> usize {
    payload_len + frame_count * HEADER_LEN
}

fn compute_crc(uuid: u16, payload_len: u16, payload: &[u8]) -> u32 {
    let mut digest = CRC32.digest();
    digest.update(&uuid.to_be_bytes());
    digest.update(&payload_len.to_be_bytes());
    digest.update(payload);
    digest.finalize()
}

/// In-progress reassembly state for one packet UUID.
struct Assembly {
    uuid: u16,
    endpoint: Endpoint,
    frames: Vec<Frame, MAX_FRAGMENTS>,
    header: Option<TransportHeader>,
    first_seen: Instant,
}

impl Assembly {
    fn received_bytes(&self) -> usize {
        self.frames
            .iter()
            .map(|f| if f.fragment_number == 0 { f.payload.len().saturating_sub(HEADER_LEN) } else { f.payload.len() })
            .sum()
    }

    fn is_complete(&self) -> bool {
        match self.header {
            Some(h) => self.received_bytes() >= h.payload_len as usize,
            None => false,
        }
    }

    /// Merge-sort the held frames by fragment number (spec §4.5 "Sort
    /// algorithm"). `K` is small (≤32) so this runs on a plain slice rather
    /// than a linked list, but keeps the same split/merge shape as the
    /// original.
    fn sort(&mut self) {
        let mut items: std::vec::Vec<Frame> = self.frames.iter().cloned().collect();
        merge_sort(&mut items);
        self.frames.clear();
        for f in items {
            let _ = self.frames.push(f);
        }
    }

    fn concat_payload(&self) -> std::vec::Vec<u8> {
        let mut out = std::vec::Vec::new();
        for f in &self.frames {
            if f.fragment_number == 0 {
                out.extend_from_slice(&f.payload[HEADER_LEN.min(f.payload.len())..]);
            } else {
                out.extend_from_slice(&f.payload);
            }
        }
        out
    }
}

fn merge_sort(items: &mut std::vec::Vec<Frame>) {
    let len = items.len();
    if len <= 1 {
        return;
    }
    let mid = len / 2;
    let mut back = items.split_off(mid);
    merge_sort(items);
    merge_sort(&mut back);
    *items = merge(std::mem::take(items), back);
}

fn merge(a: std::vec::Vec<Frame>, b: std::vec::Vec<Frame>) -> std::vec::Vec<Frame> {
    let mut out = std::vec::Vec::with_capacity(a.len() + b.len());
    let mut a = a.into_iter().peekable();
    let mut b = b.into_iter().peekable();
    loop {
        match (a.peek(), b.peek()) {
            (Some(x), Some(y)) => {
                if x.fragment_number <= y.fragment_number {
                    out.push(a.next().unwrap());
                } else {
                    out.push(b.next().unwrap());
                }
            }
            (Some(_), None) => out.push(a.next().unwrap()),
            (None, Some(_)) => out.push(b.next().unwrap()),
            (None, None) => break,
        }
    }
    out
}

/// Bounded set of concurrently in-progress reassemblies. `SLOTS` caps how
/// many distinct UUIDs may be tracked at once; a new UUID arriving when full
/// evicts nothing -- the caller must let slots time out or complete.
pub struct Reassembler<const SLOTS: usize> {
    assemblies: Vec<Assembly, SLOTS>,
    timeout: Duration,
    dropped_timeouts: u32,
    dropped_crc_mismatches: u32,
}

impl<const SLOTS: usize> Reassembler<SLOTS> {
    pub fn new() -> Self {
        Self {
            assemblies: Vec::new(),
            timeout: DEFAULT_REASSEMBLY_TIMEOUT,
            dropped_timeouts: 0,
            dropped_crc_mismatches: 0,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout, ..Self::new() }
    }

    pub fn dropped_timeouts(&self) -> u32 {
        self.dropped_timeouts
    }

    pub fn dropped_crc_mismatches(&self) -> u32 {
        self.dropped_crc_mismatches
    }

    /// Feed one arrived frame into its assembly. Returns `Ok(Some(packet))`
    /// once the packet is complete and its CRC checks out, `Ok(None)` while
    /// still incomplete, and an error if the frame can't be accepted.
    pub fn accept(&mut self, frame: Frame) -> Result<Option<Packet>, Status> {
        let uuid = if frame.fragment_number == 0 {
            TransportHeader::unpack(&frame.payload).map(|h| h.packet_uuid)
        } else {
            None
        };

        let index = if let Some(uuid) = uuid {
            match self.assemblies.iter().position(|a| a.uuid == uuid) {
                Some(i) => i,
                None => {
                    if self.assemblies.is_full() {
                        return Err(Status::Memory);
                    }
                    self.assemblies
                        .push(Assembly {
                            uuid,
                            endpoint: frame.endpoint,
                            frames: Vec::new(),
                            header: None,
                            first_seen: Instant::now(),
                        })
                        .ok();
                    self.assemblies.len() - 1
                }
            }
        } else {
            // Non-header fragment: must belong to an assembly already opened
            // by its fragment-0 sibling.
            match self.assemblies.iter().position(|a| a.endpoint == frame.endpoint && !a.is_complete()) {
                Some(i) => i,
                None => return Err(Status::InvalidParam),
            }
        };

        let entry = &mut self.assemblies[index];
        if frame.fragment_number == 0 {
            entry.header = TransportHeader::unpack(&frame.payload);
        }
        // Duplicate fragment numbers overwrite silently (spec §4.5).
        if let Some(existing) = entry.frames.iter_mut().find(|f| f.fragment_number == frame.fragment_number) {
            *existing = frame;
        } else {
            entry.frames.push(frame).map_err(|_| Status::Full)?;
        }

        if !entry.is_complete() {
            return Ok(None);
        }

        let mut entry = self.assemblies.remove(index);
        entry.sort();
        let header = entry.header.expect("is_complete implies header present");
        let bytes = entry.concat_payload();
        let crc = compute_crc(header.packet_uuid, header.payload_len, &bytes);
        if crc != header.crc32 {
            self.dropped_crc_mismatches += 1;
            return Ok(None);
        }

        Ok(Some(Packet { uuid: header.packet_uuid, endpoint: entry.endpoint, bytes }))
    }

    /// Drop any assembly whose age exceeds the reassembly timeout. Call
    /// once per event-loop iteration (spec §8 invariant 7).
    pub fn expire(&mut self, now: Instant) {
        let timeout = self.timeout;
        let before = self.assemblies.len();
        let mut i = 0;
        while i < self.assemblies.len() {
            if now.duration_since(self.assemblies[i].first_seen) > timeout {
                self.assemblies.remove(i);
            } else {
                i += 1;
            }
        }
        self.dropped_timeouts += (before - self.assemblies.len()) as u32;
    }
}

impl<const SLOTS: usize> Default for Reassembler<SLOTS> {
    fn default() -> Self {
        Self::new()
    }
}
