//! Recognized radio configuration options (spec §6).

/// Data rate in air.
#[derive(Clone, Copy, PartialEq, Eq, Debug, defmt::Format)]
pub enum DataRate {
    Kbps250,
    Mbps1,
    Mbps2,
}

/// Output power level.
#[derive(Clone, Copy, PartialEq, Eq, Debug, defmt::Format)]
pub enum RfPower {
    DbmMinus18,
    DbmMinus12,
    DbmMinus6,
    Dbm0,
}

/// On-air address width, in bytes.
#[derive(Clone, Copy, PartialEq, Eq, Debug, defmt::Format)]
pub enum AddressWidth {
    Bytes3,
    Bytes4,
    Bytes5,
}

/// Hardware CRC length.
#[derive(Clone, Copy, PartialEq, Eq, Debug, defmt::Format)]
pub enum CrcLength {
    Disabled,
    Bits8,
    Bits16,
}

/// Which ISR sources are unmasked.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, defmt::Format)]
pub struct IsrMask {
    pub max_rt: bool,
    pub rx_dr: bool,
    pub tx_ds: bool,
}

impl IsrMask {
    pub const fn all() -> Self {
        Self { max_rt: true, rx_dr: true, tx_ds: true }
    }
}

/// Every recognized configuration option from spec §6, collected the way
/// the teacher collects a radio's settings into one `RadioConfig` struct
/// passed to `power_up`/`Radio::new`.
#[derive(Clone, Debug, defmt::Format)]
pub struct RadioConfig {
    /// RF channel, `0..=125`.
    pub channel: u8,
    pub data_rate: DataRate,
    pub rf_power: RfPower,
    pub address_width: AddressWidth,
    /// Static payload size in bytes, `1..=32`.
    pub static_payload_size: u8,
    pub crc_length: CrcLength,
    /// `250..=4000` microseconds, in 250us steps.
    pub auto_retransmit_delay_us: u16,
    /// `0..=15`.
    pub auto_retransmit_count: u8,
    pub isr_mask: IsrMask,
    /// Soft-check every register write by reading it back. Off by default,
    /// matching the teacher's posture of defaulting expensive checks off.
    pub verify_registers: bool,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            channel: 76,
            data_rate: DataRate::Mbps1,
            rf_power: RfPower::Dbm0,
            address_width: AddressWidth::Bytes5,
            static_payload_size: 32,
            crc_length: CrcLength::Bits16,
            auto_retransmit_delay_us: 1500,
            auto_retransmit_count: 15,
            isr_mask: IsrMask::all(),
            verify_registers: false,
        }
    }
}

impl RadioConfig {
    /// Synchronous validation run before any bus transaction is attempted;
    /// out-of-range values return `InvalidParam` immediately (spec §7).
    pub fn validate(&self) -> Result<(), crate::status::Status> {
        use crate::status::Status;

        if self.channel > 125 {
            return Err(Status::InvalidParam);
        }
        if self.static_payload_size == 0 || self.static_payload_size > 32 {
            return Err(Status::InvalidParam);
        }
        if !(250..=4000).contains(&self.auto_retransmit_delay_us)
            || self.auto_retransmit_delay_us % 250 != 0
        {
            return Err(Status::InvalidParam);
        }
        if self.auto_retransmit_count > 15 {
            return Err(Status::InvalidParam);
        }
        Ok(())
    }
}
