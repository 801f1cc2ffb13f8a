//! Crate-wide error/status taxonomy.

use thiserror::Error;

/// Outcome of any fallible operation against the PHY, the data-link service,
/// or the fragmentation layer. Mirrors the status codes a real transceiver
/// driver would bubble up from its register interface.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error, defmt::Format)]
pub enum Status {
    #[error("ok")]
    Ok,
    /// Caller supplied an out-of-range or otherwise invalid parameter.
    #[error("invalid parameter")]
    InvalidParam,
    /// Driver not opened, or the FSM is in the wrong state for this request.
    #[error("not available")]
    NotAvailable,
    /// Hard failure: register verification mismatch, or unexpected hardware state.
    #[error("failure")]
    Fail,
    /// Heap exhausted.
    #[error("out of memory")]
    Memory,
    /// Producer/consumer backpressure: nothing to take.
    #[error("empty")]
    Empty,
    /// Producer/consumer backpressure: no room to give.
    #[error("full")]
    Full,
    /// Bus wait, or TX transfer-control-block, exceeded its deadline.
    #[error("timeout")]
    Timeout,
    /// Data is ready to be consumed.
    #[error("ready")]
    Ready,
    /// Reserved surface not implemented by this driver (e.g. reverse ARP by MAC).
    #[error("not supported")]
    NotSupported,
}

impl Status {
    pub fn is_ok(self) -> bool {
        matches!(self, Status::Ok | Status::Ready)
    }
}
