//! Wire addressing: MAC/IP addresses, pipes, and endpoints.
//!
//! DS-equivalent reference: NRF24L01+ datasheet section 7, which reserves
//! pipe 0 for auto-ack reception and pipes 1..5 for application use.

/// Opaque 40-bit identifier addressing a hardware pipe. Five bytes on the
/// wire, network-byte-order for serialization, host-order for comparison.
#[derive(Clone, Copy, PartialEq, Eq, Hash, defmt::Format)]
pub struct MacAddress(pub [u8; 5]);

impl MacAddress {
    pub const fn new(bytes: [u8; 5]) -> Self {
        Self(bytes)
    }

    /// Derive an endpoint address by XORing the modifier onto the low byte
    /// of this (base) MAC.
    pub fn with_endpoint_modifier(&self, modifier: u8) -> Self {
        let mut out = self.0;
        out[4] ^= modifier;
        Self(out)
    }
}

/// 32-bit logical identifier for a node, resolved to a [`MacAddress`] via
/// the ARP cache. Independent of MAC.
#[derive(Clone, Copy, PartialEq, Eq, Hash, defmt::Format)]
pub struct IpAddress(pub u32);

impl IpAddress {
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }
}

/// One of six hardware receive pipes, plus the `Invalid` sentinel and the
/// `All` pseudo-value used when addressing every pipe at once.
#[derive(Clone, Copy, PartialEq, Eq, Debug, defmt::Format)]
pub enum PipeNumber {
    P0,
    P1,
    P2,
    P3,
    P4,
    P5,
    /// No pipe reported data / claimed ownership.
    Invalid,
    /// Pseudo-value meaning "every pipe", used only by configuration calls.
    All,
}

impl PipeNumber {
    pub fn from_index(i: u8) -> Self {
        match i {
            0 => Self::P0,
            1 => Self::P1,
            2 => Self::P2,
            3 => Self::P3,
            4 => Self::P4,
            5 => Self::P5,
            _ => Self::Invalid,
        }
    }

    pub fn as_index(self) -> Option<u8> {
        match self {
            Self::P0 => Some(0),
            Self::P1 => Some(1),
            Self::P2 => Some(2),
            Self::P3 => Some(3),
            Self::P4 => Some(4),
            Self::P5 => Some(5),
            Self::Invalid | Self::All => None,
        }
    }
}

/// Logical channel in `{0..4}`, mapped 1:1 to pipes 1..5.
#[derive(Clone, Copy, PartialEq, Eq, Debug, defmt::Format)]
pub enum Endpoint {
    DeviceRoot,
    NetworkServices,
    DataForwarding,
    ApplicationData0,
    ApplicationData1,
}

/// All endpoints in pipe-declaration order: pipe 1 = `DeviceRoot`, ...,
/// pipe 5 = `ApplicationData1`.
pub const ENDPOINTS: [Endpoint; 5] = [
    Endpoint::DeviceRoot,
    Endpoint::NetworkServices,
    Endpoint::DataForwarding,
    Endpoint::ApplicationData0,
    Endpoint::ApplicationData1,
];

impl Endpoint {
    /// The low-byte XOR modifier applied to the base MAC to derive this
    /// endpoint's address. See spec §6, "Endpoint address modifiers".
    pub const fn address_modifier(self) -> u8 {
        match self {
            Self::DeviceRoot => 0xCA,
            Self::NetworkServices => 0xC5,
            Self::DataForwarding => 0x54,
            Self::ApplicationData0 => 0xB3,
            Self::ApplicationData1 => 0xD3,
        }
    }

    /// The pipe this endpoint is always mapped to (1..5, in declaration order).
    pub const fn pipe(self) -> PipeNumber {
        match self {
            Self::DeviceRoot => PipeNumber::P1,
            Self::NetworkServices => PipeNumber::P2,
            Self::DataForwarding => PipeNumber::P3,
            Self::ApplicationData0 => PipeNumber::P4,
            Self::ApplicationData1 => PipeNumber::P5,
        }
    }

    pub const fn as_control_bits(self) -> u8 {
        match self {
            Self::DeviceRoot => 0,
            Self::NetworkServices => 1,
            Self::DataForwarding => 2,
            Self::ApplicationData0 => 3,
            Self::ApplicationData1 => 4,
        }
    }

    pub fn from_control_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::DeviceRoot),
            1 => Some(Self::NetworkServices),
            2 => Some(Self::DataForwarding),
            3 => Some(Self::ApplicationData0),
            4 => Some(Self::ApplicationData1),
            _ => None,
        }
    }
}
