//! Network Interface Facade (C8): the uniform surface upper layers consume,
//! independent of the physical transport underneath (spec §4.7).

use crate::addr::IpAddress;
use crate::fragment::Packet;
use crate::status::Status;
use std::time::Instant;

/// Implemented by the data-link service (and, in tests, by an in-memory
/// loopback) so upper layers never depend on the transport directly.
pub trait NetIf {
    fn power_up(&mut self) -> Result<(), Status>;
    fn power_down(&mut self);

    /// Send `payload` addressed to `dest_ip`. Splitting into fragments is
    /// the implementer's responsibility.
    fn send(&mut self, payload: &[u8], dest_ip: IpAddress) -> Result<(), Status>;
    /// Pop the next fully reassembled packet, if any is ready.
    fn recv(&mut self) -> Option<Packet>;

    fn max_transfer_size(&self) -> usize;
    fn max_fragments(&self) -> usize;
    fn link_speed(&self) -> u32;
    fn last_active(&self) -> Option<Instant>;

    fn add_arp(&mut self, ip: IpAddress, mac: crate::addr::MacAddress) -> Result<(), Status>;
    fn drop_arp(&mut self, ip: IpAddress);
    fn arp_lookup(&self, ip: IpAddress) -> Option<crate::addr::MacAddress>;
}
