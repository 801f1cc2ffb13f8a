//! Address Resolution cache (C3): a bounded, manually-maintained map from
//! [`IpAddress`] to [`MacAddress`]. No auto-learning from traffic (spec §4.2
//! Non-goals) -- entries only change through explicit `insert`/`remove`.

use crate::addr::{IpAddress, MacAddress};
use crate::status::Status;
use heapless::LinearMap;

/// Bounded IP -> MAC resolution table. `N` is the maximum number of
/// simultaneously-known peers.
#[derive(Default)]
pub struct ArpCache<const N: usize> {
    entries: LinearMap<IpAddress, MacAddress, N>,
}

impl<const N: usize> ArpCache<N> {
    pub fn new() -> Self {
        Self { entries: LinearMap::new() }
    }

    /// Bind `mac` to `ip`. Fails if the cache is full *or* `ip` is already
    /// present -- no implicit update (spec §4.2). Callers that want to
    /// change an existing binding must `remove` then `insert`.
    pub fn insert(&mut self, ip: IpAddress, mac: MacAddress) -> Result<(), Status> {
        if self.entries.contains_key(&ip) {
            return Err(Status::Fail);
        }
        if self.entries.len() == N {
            return Err(Status::Memory);
        }
        self.entries.insert(ip, mac).map_err(|_| Status::Memory)?;
        Ok(())
    }

    /// Remove the entry for `ip`, if any. Not an error if absent.
    pub fn remove(&mut self, ip: IpAddress) {
        self.entries.remove(&ip);
    }

    pub fn resolve(&self, ip: IpAddress) -> Option<MacAddress> {
        self.entries.get(&ip).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == N
    }
}
