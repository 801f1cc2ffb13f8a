//! PHY I/O capability (C1, external). Register-level access is not part of
//! this crate's core; it's consumed through this trait, the same way the
//! teacher driver consumes an externally-supplied HAL SPI bus and GPIO pins.

use crate::addr::MacAddress;
use crate::config::{AddressWidth, CrcLength, DataRate, IsrMask, RfPower};
use crate::status::Status;

/// ISR event bits a transceiver can report after an interrupt.
#[derive(Clone, Copy, Default, PartialEq, Eq, defmt::Format)]
pub struct IsrEvent {
    pub rx_data_ready: bool,
    pub tx_data_sent: bool,
    pub tx_max_retries: bool,
}

/// Opaque register-level access to the transceiver: a serial bus plus two
/// control pins (chip-enable, power), abstracted so the core never touches
/// hardware directly. Out of scope per spec §1; specified here only at its
/// interface, per spec §6.
pub trait PhyPort {
    /// Drive the chip-enable pin.
    fn set_chip_enable(&mut self, high: bool);
    /// Set or clear the power-up bit in the config register.
    fn set_power_up(&mut self, up: bool) -> Result<(), Status>;
    /// Set or clear the primary-RX bit in the config register.
    fn set_primary_rx(&mut self, rx: bool) -> Result<(), Status>;
    /// Busy-wait (or sleep) for at least the given number of microseconds.
    fn delay_us(&mut self, us: u32);

    fn set_crc_length(&mut self, len: CrcLength) -> Result<(), Status>;
    fn set_address_width(&mut self, width: AddressWidth) -> Result<(), Status>;
    fn set_channel(&mut self, channel: u8) -> Result<(), Status>;
    fn set_rf_power(&mut self, power: RfPower) -> Result<(), Status>;
    fn set_data_rate(&mut self, rate: DataRate) -> Result<(), Status>;
    fn set_static_payload_size(&mut self, size: u8) -> Result<(), Status>;
    fn set_auto_retransmit(&mut self, count: u8, delay_us: u16) -> Result<(), Status>;
    fn set_isr_mask(&mut self, mask: IsrMask) -> Result<(), Status>;
    fn set_auto_ack(&mut self, enabled: bool) -> Result<(), Status>;

    fn open_read_pipe(&mut self, pipe: u8, mac: MacAddress) -> Result<(), Status>;
    fn close_read_pipe(&mut self, pipe: u8) -> Result<(), Status>;
    fn open_write_pipe(&mut self, mac: MacAddress) -> Result<(), Status>;
    fn close_write_pipe(&mut self) -> Result<(), Status>;

    /// Write up to 32 bytes to the TX FIFO and start transmission.
    fn write_tx_payload(&mut self, bytes: &[u8]) -> Result<(), Status>;
    /// Read one payload (`width` bytes) out of the RX FIFO.
    fn read_rx_payload(&mut self, width: usize, out: &mut [u8]) -> Result<(), Status>;
    fn flush_tx(&mut self) -> Result<(), Status>;
    fn flush_rx(&mut self) -> Result<(), Status>;
    fn tx_fifo_full(&mut self) -> bool;
    fn rx_fifo_empty(&mut self) -> bool;

    /// Which pipe (if any) has the next available payload.
    fn rx_pipe_with_data(&mut self) -> Option<u8>;

    fn get_isr_event(&mut self) -> IsrEvent;
    fn clear_isr_event(&mut self, event: IsrEvent) -> Result<(), Status>;
    fn clear_max_retry_flag(&mut self) -> Result<(), Status>;

    /// Read back every register `verify_registers` cares about and confirm
    /// it matches what was last written. Soft error per spec §7 -- callers
    /// log and continue rather than treating this as fatal.
    fn verify_registers(&mut self) -> Result<(), Status>;
}
