//! A reliable, fragmenting, addressable datagram stack over a 32-byte-frame
//! half-duplex radio transceiver.
//!
//! The crate turns an unreliable, tiny-MTU link (six hardware receive pipes,
//! one transmit pipe, built-in auto-acknowledge and retransmit) into an
//! ordered, fragment-reassembling datagram service. Register-level access
//! to the transceiver is not part of this crate; it's consumed through the
//! [`PhyPort`] trait, the same way upstream drivers consume a HAL-supplied
//! SPI bus and GPIO pins.
//!
//! Layout, bottom to top:
//! - [`addr`] / [`config`] / [`frame`] -- wire types, configuration, and the
//!   32-byte frame codec.
//! - [`fsm`] -- the four-mode radio state machine.
//! - [`arp`] -- the bounded address-resolution cache.
//! - [`fragment`] -- splitting/reassembly of application payloads.
//! - [`arena`] -- the fixed-capacity reference-counted block pool.
//! - [`service`] -- the event loop tying all of the above to a [`PhyPort`].
//! - [`netif`] -- the uniform facade upper layers consume.

pub mod addr;
pub mod arena;
pub mod arp;
pub mod callbacks;
pub mod config;
pub mod fragment;
pub mod frame;
pub mod fsm;
pub mod netif;
pub mod phy;
pub mod service;
pub mod status;

pub use addr::{Endpoint, IpAddress, MacAddress, PipeNumber};
pub use callbacks::CallbackId;
pub use config::RadioConfig;
pub use fragment::Packet;
pub use fsm::{RadioEvent, RadioState};
pub use netif::NetIf;
pub use phy::PhyPort;
pub use service::{DataLinkService, IsrHandle};
pub use status::Status;
