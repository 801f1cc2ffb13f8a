//! Data-Link Service (C5): the single event-loop task multiplexing ISR
//! notification, the TX/RX queues, the ARP cache, the transfer-control
//! block, and the mode FSM into a reliable frame-level stream.
//!
//! Mirrors the shape of the teacher's `Radio` driver (`cleanup_tx`/
//! `cleanup_rx`/`receive`/`send_payload` in `examples/David-OConnor-
//! semtech-radios/src/lib.rs`) generalized from a single send/receive call
//! pair into a standing event loop with TX-Failure, TX-Success, RX-Drain,
//! and TX-Pump paths (spec §4.4).

use crate::addr::{Endpoint, IpAddress, MacAddress, PipeNumber, ENDPOINTS};
use crate::arp::ArpCache;
use crate::callbacks::{CallbackId, CallbackRegistry};
use crate::config::RadioConfig;
use crate::fragment::{self, Packet, Reassembler};
use crate::frame::Frame;
use crate::fsm::{Fsm, RadioEvent};
use crate::phy::PhyPort;
use crate::status::Status;

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

const TX_QUEUE_DEPTH: usize = 16;
const RX_QUEUE_DEPTH: usize = 16;
const ARP_CAPACITY: usize = 16;
const REASSEMBLY_SLOTS: usize = 4;
const EVENT_LOOP_TIMEOUT: Duration = Duration::from_millis(25);
const TX_TIMEOUT: Duration = Duration::from_millis(10);
const LOCK_BUDGET: Duration = Duration::from_millis(1);
/// Total bytes the fragmenter's pre-flight check (spec §4.5) is allowed to
/// account for at once, across every in-flight outbound packet.
const HEAP_BUDGET_BYTES: usize = 16 * 1024;

/// One outbound unit: a fragment list plus its destination, queued whole so
/// the TX pump can walk it fragment-by-fragment.
struct OutboundPacket {
    frames: heapless::Vec<Frame, { crate::fragment::MAX_FRAGMENTS }>,
    next: usize,
    dest_ip: IpAddress,
    /// Bytes reserved from the service's [`crate::arena::HeapBudget`] for
    /// this packet's fragments; released once the last one is dequeued.
    heap_reserved: usize,
}

/// The service's view of an in-flight transmission (spec §3 "TCB").
#[derive(Clone, Copy)]
struct Tcb {
    in_progress: bool,
    start: Option<Instant>,
    timeout: Duration,
    last_pipe: PipeNumber,
    /// Minimum spacing between transmit starts; throttles a hot TX queue.
    rate_limit: Duration,
    last_start: Option<Instant>,
}

impl Default for Tcb {
    fn default() -> Self {
        Self {
            in_progress: false,
            start: None,
            timeout: TX_TIMEOUT,
            last_pipe: PipeNumber::Invalid,
            rate_limit: Duration::from_micros(0),
            last_start: None,
        }
    }
}

/// Internal mutable state, held behind one mutex per spec §5's "each has its
/// own mutex" -- split into the TX/RX/ARP groupings named there.
struct TxState {
    queue: std::collections::VecDeque<OutboundPacket>,
    tcb: Tcb,
}

struct RxState {
    queue: std::collections::VecDeque<Packet>,
    reassembler: Reassembler<REASSEMBLY_SLOTS>,
    dropped_frames: u32,
}

/// Wake reasons sent from the ISR callback (or a test harness standing in
/// for one) into the service task.
enum WakeReason {
    Isr,
}

/// Drives the radio mode FSM and PHY against the shared queues. One
/// instance owns exactly one [`PhyPort`]; run [`DataLinkService::run_once`]
/// in a loop (spec's "dedicated task").
pub struct DataLinkService<P: PhyPort> {
    phy: P,
    fsm: Fsm,
    config: RadioConfig,
    root_mac: MacAddress,
    tx: Arc<Mutex<TxState>>,
    rx: Arc<Mutex<RxState>>,
    arp: Arc<Mutex<ArpCache<ARP_CAPACITY>>>,
    /// Remaining-free-memory accounting the fragmenter checks against before
    /// building a fragment list (spec §4.5).
    heap: crate::arena::HeapBudget,
    callbacks: CallbackRegistry,
    wake_rx: Receiver<WakeReason>,
    /// Draws the per-packet UUID (spec §4.5 "Draw one 16-bit UUID... randomly
    /// chosen"), seeded from the wall clock at construction the way
    /// `hermit-os-kernel`'s entropy pool seeds a `ChaCha20Rng` from whatever
    /// entropy the platform offers.
    uuid_rng: ChaCha8Rng,
    last_active: Option<Instant>,
}

/// The ISR-side handle: the only thing an interrupt context is allowed to
/// touch. Setting the pending flag and sending a wake message is all it
/// does (spec §4.4's "ISR handler does no work beyond...").
#[derive(Clone)]
pub struct IsrHandle {
    wake_tx: Sender<WakeReason>,
}

impl IsrHandle {
    pub fn notify(&self) {
        let _ = self.wake_tx.send(WakeReason::Isr);
    }
}

impl<P: PhyPort> DataLinkService<P> {
    /// Construct the service and its paired [`IsrHandle`]. Does not touch
    /// hardware; call [`Self::power_up`] to do that.
    pub fn new(phy: P, config: RadioConfig) -> Result<(Self, IsrHandle), Status> {
        config.validate()?;
        let (wake_tx, wake_rx) = std::sync::mpsc::channel();
        let service = Self {
            phy,
            fsm: Fsm::new(),
            config,
            root_mac: MacAddress::new([0; 5]),
            tx: Arc::new(Mutex::new(TxState { queue: Default::default(), tcb: Tcb::default() })),
            rx: Arc::new(Mutex::new(RxState {
                queue: Default::default(),
                reassembler: Reassembler::new(),
                dropped_frames: 0,
            })),
            arp: Arc::new(Mutex::new(ArpCache::new())),
            heap: crate::arena::HeapBudget::new(HEAP_BUDGET_BYTES),
            callbacks: CallbackRegistry::new(),
            wake_rx,
            uuid_rng: ChaCha8Rng::seed_from_u64(seed_from_clock()),
            last_active: None,
        };
        Ok((service, IsrHandle { wake_tx }))
    }

    /// Peripheral init: opens the device, applies configuration, primes the
    /// FSM, and transitions into RX mode (spec §4.4 `power_up`).
    pub fn power_up(&mut self) -> Result<(), Status> {
        self.phy.set_crc_length(self.config.crc_length)?;
        self.phy.set_address_width(self.config.address_width)?;
        self.phy.set_channel(self.config.channel)?;
        self.phy.set_rf_power(self.config.rf_power)?;
        self.phy.set_data_rate(self.config.data_rate)?;
        self.phy.set_static_payload_size(self.config.static_payload_size)?;
        self.phy.set_isr_mask(self.config.isr_mask)?;
        self.phy.set_auto_ack(true)?;

        if self.config.verify_registers {
            if let Err(e) = self.phy.verify_registers() {
                defmt::warn!("register verification failed during power_up: {}", e);
            }
        }

        self.fsm.apply(&mut self.phy, RadioEvent::PowerUp)?;
        self.fsm.apply(&mut self.phy, RadioEvent::StartRx)?;
        Ok(())
    }

    /// Idle stub reserved for graceful teardown (spec §4.4).
    pub fn power_down(&mut self) {
        let _ = self.fsm.apply(&mut self.phy, RadioEvent::PowerDown);
    }

    /// Assign the root MAC to endpoint 0 and derive/open all five RX pipes.
    /// All-or-nothing in intent; pipes already opened before a failure
    /// retain their state (spec §4.4).
    pub fn set_root_mac(&mut self, mac: MacAddress) -> Result<(), Status> {
        self.root_mac = mac;
        for endpoint in ENDPOINTS {
            let derived = Frame::steer_to_endpoint(mac, endpoint);
            let pipe_index = endpoint.pipe().as_index().expect("ENDPOINTS never map to Invalid/All");
            self.phy.open_read_pipe(pipe_index, derived)?;
        }
        Ok(())
    }

    pub fn get_endpoint_mac(&self, endpoint: Endpoint) -> MacAddress {
        Frame::steer_to_endpoint(self.root_mac, endpoint)
    }

    pub fn add_arp(&mut self, ip: IpAddress, mac: MacAddress) -> Result<(), Status> {
        let mut arp = lock_bounded(&self.arp)?;
        let result = arp.insert(ip, mac);
        drop(arp);
        if let Err(Status::Memory) = result {
            self.callbacks.fire(CallbackId::ArpLimitReached);
        }
        result
    }

    pub fn drop_arp(&self, ip: IpAddress) -> Result<(), Status> {
        let mut arp = lock_bounded(&self.arp)?;
        arp.remove(ip);
        Ok(())
    }

    pub fn arp_lookup(&self, ip: IpAddress) -> Result<Option<MacAddress>, Status> {
        let arp = lock_bounded(&self.arp)?;
        Ok(arp.resolve(ip))
    }

    pub fn register_callback(&mut self, id: CallbackId, handler: Box<dyn FnMut() + Send>) {
        self.callbacks.register(id, handler);
    }

    /// Split `payload` into fragments and enqueue them for `ip` (spec §4.4
    /// `send`).
    pub fn send(&mut self, payload: &[u8], ip: IpAddress, endpoint: Endpoint, require_ack: bool) -> Result<(), Status> {
        let uuid = (self.uuid_rng.next_u32() & 0xFFFF) as u16;

        let frames = fragment::split(
            payload,
            endpoint,
            ip,
            require_ack,
            uuid,
            self.config.auto_retransmit_count,
            self.config.auto_retransmit_delay_us,
            &self.heap,
        )?;
        let heap_reserved = fragment::reserved_bytes(payload.len(), frames.len());

        let mut tx = lock_bounded(&self.tx)?;
        if tx.queue.len() >= TX_QUEUE_DEPTH {
            drop(tx);
            self.heap.release(heap_reserved);
            self.callbacks.fire(CallbackId::TxQueueFull);
            return Err(Status::Full);
        }
        tx.queue.push_back(OutboundPacket { frames, next: 0, dest_ip: ip, heap_reserved });
        Ok(())
    }

    /// Pop the earliest available reassembled packet, if any (spec §4.4 `recv`).
    pub fn recv(&mut self) -> Option<Packet> {
        self.rx.lock().ok().and_then(|mut rx| rx.queue.pop_front())
    }

    pub fn dropped_rx_frames(&self) -> u32 {
        self.rx.lock().map(|rx| rx.dropped_frames).unwrap_or(0)
    }

    /// One pass of the event loop (spec §4.4): wait for an ISR wake or the
    /// bounded timeout, dispatch any pending ISR event, force a TX-Failure
    /// on TCB timeout, then always run RX-drain followed by TX-pump.
    pub fn run_once(&mut self) -> Result<(), Status> {
        match self.wake_rx.recv_timeout(EVENT_LOOP_TIMEOUT) {
            Ok(WakeReason::Isr) => self.handle_isr_event()?,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return Err(Status::Fail),
        }

        let timed_out = {
            let tx = lock_bounded(&self.tx)?;
            match (tx.tcb.in_progress, tx.tcb.start) {
                (true, Some(start)) => start.elapsed() > tx.tcb.timeout,
                _ => false,
            }
        };
        if timed_out {
            self.tx_failure()?;
        }

        self.rx_drain()?;
        self.tx_pump()?;
        Ok(())
    }

    fn handle_isr_event(&mut self) -> Result<(), Status> {
        let event = self.phy.get_isr_event();
        if event.tx_max_retries {
            self.tx_failure()?;
        }
        if event.rx_data_ready {
            self.rx_drain()?;
        }
        if event.tx_data_sent {
            self.tx_success()?;
        }
        Ok(())
    }

    /// §4.4.1 TX-Failure Path.
    fn tx_failure(&mut self) -> Result<(), Status> {
        self.fsm.apply(&mut self.phy, RadioEvent::GoToStandby)?;

        let required_ack_flush = {
            let mut tx = lock_bounded(&self.tx)?;
            let flush = tx
                .queue
                .front()
                .and_then(|p| p.frames.get(p.next))
                .map(|f| f.require_ack)
                .unwrap_or(false);
            if let Some(dropped) = tx.queue.pop_front() {
                self.heap.release(dropped.heap_reserved);
            }
            tx.tcb.in_progress = false;
            flush
        };

        if required_ack_flush {
            self.phy.flush_tx()?;
            self.phy.clear_max_retry_flag()?;
        }

        self.callbacks.fire(CallbackId::TxFailure);
        Ok(())
    }

    /// §4.4.2 TX-Success Path.
    fn tx_success(&mut self) -> Result<(), Status> {
        self.fsm.apply(&mut self.phy, RadioEvent::GoToStandby)?;
        self.phy.clear_isr_event(crate::phy::IsrEvent { tx_data_sent: true, ..Default::default() })?;

        {
            let mut tx = lock_bounded(&self.tx)?;
            let mut drained = false;
            if let Some(front) = tx.queue.front_mut() {
                front.next += 1;
                drained = front.next >= front.frames.len();
            }
            if drained {
                if let Some(done) = tx.queue.pop_front() {
                    self.heap.release(done.heap_reserved);
                }
            }
            tx.tcb.in_progress = false;
        }

        self.last_active = Some(Instant::now());
        self.callbacks.fire(CallbackId::TxSuccess);
        Ok(())
    }

    /// §4.4.3 RX Drain.
    fn rx_drain(&mut self) -> Result<(), Status> {
        {
            let tx = lock_bounded(&self.tx)?;
            if tx.tcb.in_progress {
                return Ok(());
            }
        }

        self.fsm.apply(&mut self.phy, RadioEvent::GoToStandby)?;
        self.phy.clear_isr_event(crate::phy::IsrEvent { rx_data_ready: true, ..Default::default() })?;

        let mut received_any = false;
        while let Some(pipe_index) = self.phy.rx_pipe_with_data() {
            let width = self.config.static_payload_size as usize;
            let mut raw = [0u8; crate::frame::FRAME_LEN];
            self.phy.read_rx_payload(width, &mut raw[..width])?;
            received_any = true;

            let Some(frame) = Frame::unpack(&raw, PipeNumber::from_index(pipe_index)) else {
                continue;
            };

            let mut rx = lock_bounded(&self.rx)?;
            match rx.reassembler.accept(frame) {
                Ok(Some(packet)) => {
                    if rx.queue.len() >= RX_QUEUE_DEPTH {
                        drop(rx);
                        self.callbacks.fire(CallbackId::RxQueueFull);
                        let mut rx = lock_bounded(&self.rx)?;
                        if rx.queue.len() >= RX_QUEUE_DEPTH {
                            rx.dropped_frames += 1;
                            continue;
                        }
                        rx.queue.push_back(packet);
                    } else {
                        rx.queue.push_back(packet);
                    }
                }
                Ok(None) => {}
                Err(_) => rx.dropped_frames += 1,
            }
        }

        self.fsm.apply(&mut self.phy, RadioEvent::StartRx)?;
        if received_any {
            self.last_active = Some(Instant::now());
            self.callbacks.fire(CallbackId::RxSuccess);
        }
        Ok(())
    }

    /// §4.4.4 TX Pump.
    fn tx_pump(&mut self) -> Result<(), Status> {
        {
            let tx = lock_bounded(&self.tx)?;
            if tx.tcb.in_progress {
                return Ok(());
            }
            if let Some(last_start) = tx.tcb.last_start {
                if last_start.elapsed() < tx.tcb.rate_limit {
                    return Ok(());
                }
            }
            if tx.queue.is_empty() {
                drop(tx);
                self.fsm.apply(&mut self.phy, RadioEvent::StartRx)?;
                return Ok(());
            }
        }

        let (dest_ip, frame) = {
            let tx = lock_bounded(&self.tx)?;
            let front = tx.queue.front().expect("checked non-empty above");
            (front.dest_ip, front.frames[front.next].clone())
        };

        let mac = {
            let arp = lock_bounded(&self.arp)?;
            arp.resolve(dest_ip)
        };
        let Some(mac) = mac else {
            let mut tx = lock_bounded(&self.tx)?;
            let dropped = tx.queue.pop_front();
            drop(tx);
            if let Some(dropped) = dropped {
                self.heap.release(dropped.heap_reserved);
            }
            self.callbacks.fire(CallbackId::ArpResolveFailed);
            return Ok(());
        };

        let steered = Frame::steer_to_endpoint(mac, frame.endpoint);

        self.fsm.apply(&mut self.phy, RadioEvent::GoToStandby)?;
        self.phy.open_write_pipe(steered)?;
        if frame.require_ack {
            self.phy.set_auto_retransmit(frame.retransmit_count, frame.retransmit_delay_us)?;
        }

        {
            let mut tx = lock_bounded(&self.tx)?;
            tx.tcb.in_progress = true;
            tx.tcb.start = Some(Instant::now());
            tx.tcb.last_start = Some(Instant::now());
            tx.tcb.last_pipe = PipeNumber::P0;
        }

        let Some(packed) = frame.pack() else {
            return Err(Status::InvalidParam);
        };
        self.phy.write_tx_payload(&packed)?;
        self.fsm.apply(&mut self.phy, RadioEvent::StartTx)?;
        Ok(())
    }
}

/// Wall-clock-derived seed for the per-packet UUID generator. Not
/// cryptographic -- the spec only asks for a randomly chosen identifier to
/// disambiguate in-flight packets, not unpredictability against an adversary.
fn seed_from_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Bounded `try_lock` with a 1 ms retry budget (spec §5). Never blocks
/// indefinitely; a caller that misses the budget gets `Status::Timeout` and
/// retries on the next event-loop pass.
fn lock_bounded<T>(mutex: &Arc<Mutex<T>>) -> Result<std::sync::MutexGuard<'_, T>, Status> {
    let deadline = Instant::now() + LOCK_BUDGET;
    loop {
        match mutex.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(std::sync::TryLockError::WouldBlock) => {
                if Instant::now() >= deadline {
                    return Err(Status::Timeout);
                }
                std::thread::yield_now();
            }
            Err(std::sync::TryLockError::Poisoned(_)) => return Err(Status::Fail),
        }
    }
}

impl<P: PhyPort> crate::netif::NetIf for DataLinkService<P> {
    fn power_up(&mut self) -> Result<(), Status> {
        DataLinkService::power_up(self)
    }

    fn power_down(&mut self) {
        DataLinkService::power_down(self)
    }

    /// Sends on the default application endpoint without requesting a
    /// hardware ack -- the facade trades per-call endpoint/ack control for
    /// a uniform surface (spec §4.7).
    fn send(&mut self, payload: &[u8], dest_ip: IpAddress) -> Result<(), Status> {
        DataLinkService::send(self, payload, dest_ip, Endpoint::ApplicationData0, false)
    }

    fn recv(&mut self) -> Option<Packet> {
        DataLinkService::recv(self)
    }

    fn max_transfer_size(&self) -> usize {
        crate::fragment::MAX_FRAGMENTS * crate::frame::MAX_PAYLOAD
    }

    fn max_fragments(&self) -> usize {
        crate::fragment::MAX_FRAGMENTS
    }

    fn link_speed(&self) -> u32 {
        match self.config.data_rate {
            crate::config::DataRate::Kbps250 => 250_000 / 8,
            crate::config::DataRate::Mbps1 => 1_000_000 / 8,
            crate::config::DataRate::Mbps2 => 2_000_000 / 8,
        }
    }

    fn last_active(&self) -> Option<Instant> {
        self.last_active
    }

    fn add_arp(&mut self, ip: IpAddress, mac: MacAddress) -> Result<(), Status> {
        DataLinkService::add_arp(self, ip, mac)
    }

    fn drop_arp(&mut self, ip: IpAddress) {
        let _ = DataLinkService::drop_arp(self, ip);
    }

    fn arp_lookup(&self, ip: IpAddress) -> Option<MacAddress> {
        DataLinkService::arp_lookup(self, ip).unwrap_or(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AddressWidth, CrcLength, DataRate, IsrMask, RfPower};

    #[derive(Default)]
    struct MemoryPhy {
        rx_queue: std::collections::VecDeque<([u8; 32], u8)>,
        last_tx: Option<[u8; 32]>,
    }

    impl PhyPort for MemoryPhy {
        fn set_chip_enable(&mut self, _: bool) {}
        fn set_power_up(&mut self, _: bool) -> Result<(), Status> { Ok(()) }
        fn set_primary_rx(&mut self, _: bool) -> Result<(), Status> { Ok(()) }
        fn delay_us(&mut self, _: u32) {}
        fn set_crc_length(&mut self, _: CrcLength) -> Result<(), Status> { Ok(()) }
        fn set_address_width(&mut self, _: AddressWidth) -> Result<(), Status> { Ok(()) }
        fn set_channel(&mut self, _: u8) -> Result<(), Status> { Ok(()) }
        fn set_rf_power(&mut self, _: RfPower) -> Result<(), Status> { Ok(()) }
        fn set_data_rate(&mut self, _: DataRate) -> Result<(), Status> { Ok(()) }
        fn set_static_payload_size(&mut self, _: u8) -> Result<(), Status> { Ok(()) }
        fn set_auto_retransmit(&mut self, _: u8, _: u16) -> Result<(), Status> { Ok(()) }
        fn set_isr_mask(&mut self, _: IsrMask) -> Result<(), Status> { Ok(()) }
        fn set_auto_ack(&mut self, _: bool) -> Result<(), Status> { Ok(()) }
        fn open_read_pipe(&mut self, _: u8, _: MacAddress) -> Result<(), Status> { Ok(()) }
        fn close_read_pipe(&mut self, _: u8) -> Result<(), Status> { Ok(()) }
        fn open_write_pipe(&mut self, _: MacAddress) -> Result<(), Status> { Ok(()) }
        fn close_write_pipe(&mut self) -> Result<(), Status> { Ok(()) }
        fn write_tx_payload(&mut self, bytes: &[u8]) -> Result<(), Status> {
            let mut buf = [0u8; 32];
            buf[..bytes.len()].copy_from_slice(bytes);
            self.last_tx = Some(buf);
            self.rx_queue.push_back((buf, 0));
            Ok(())
        }
        fn read_rx_payload(&mut self, width: usize, out: &mut [u8]) -> Result<(), Status> {
            if let Some((buf, _)) = self.rx_queue.pop_front() {
                out[..width].copy_from_slice(&buf[..width]);
            }
            Ok(())
        }
        fn flush_tx(&mut self) -> Result<(), Status> { Ok(()) }
        fn flush_rx(&mut self) -> Result<(), Status> { Ok(()) }
        fn tx_fifo_full(&mut self) -> bool { false }
        fn rx_fifo_empty(&mut self) -> bool { self.rx_queue.is_empty() }
        fn rx_pipe_with_data(&mut self) -> Option<u8> {
            if self.rx_queue.is_empty() { None } else { Some(4) }
        }
        fn get_isr_event(&mut self) -> crate::phy::IsrEvent {
            crate::phy::IsrEvent { rx_data_ready: !self.rx_queue.is_empty(), tx_data_sent: self.last_tx.is_some(), tx_max_retries: false }
        }
        fn clear_isr_event(&mut self, _: crate::phy::IsrEvent) -> Result<(), Status> { Ok(()) }
        fn clear_max_retry_flag(&mut self) -> Result<(), Status> { Ok(()) }
        fn verify_registers(&mut self) -> Result<(), Status> { Ok(()) }
    }

    #[test]
    fn send_with_no_arp_entry_fires_arp_resolve_failed_and_drains_queue() {
        let (mut service, _isr) = DataLinkService::new(MemoryPhy::default(), RadioConfig::default()).unwrap();
        service.power_up().unwrap();

        let fired = Arc::new(Mutex::new(false));
        let f = fired.clone();
        service.register_callback(CallbackId::ArpResolveFailed, Box::new(move || { *f.lock().unwrap() = true; }));

        service.send(b"x", IpAddress::new(0x0A00_0099), Endpoint::ApplicationData0, false).unwrap();
        service.run_once().unwrap();

        assert!(*fired.lock().unwrap());
        let tx = service.tx.lock().unwrap();
        assert!(tx.queue.is_empty());
    }

    #[test]
    fn send_then_recv_round_trips_through_the_loopback_phy() {
        let (mut service, isr) = DataLinkService::new(MemoryPhy::default(), RadioConfig::default()).unwrap();
        service.power_up().unwrap();
        service.add_arp(IpAddress::new(1), MacAddress::new([1, 2, 3, 4, 5])).unwrap();

        service.send(b"hello", IpAddress::new(1), Endpoint::ApplicationData0, false).unwrap();
        // First pass pumps the frame into the (loopback) PHY; the ISR fires
        // once hardware reports completion, which the test simulates.
        service.run_once().unwrap();
        isr.notify();
        service.run_once().unwrap();

        let packet = service.recv().expect("loopback phy hands the frame straight back");
        assert_eq!(packet.bytes, b"hello");
    }

    #[test]
    fn dropped_frame_on_arp_miss_releases_its_heap_reservation() {
        let (mut service, _isr) = DataLinkService::new(MemoryPhy::default(), RadioConfig::default()).unwrap();
        service.power_up().unwrap();
        let before = service.heap.available();

        service.send(b"unreachable", IpAddress::new(0x0A00_0099), Endpoint::ApplicationData0, false).unwrap();
        assert!(service.heap.available() < before, "send() must reserve heap budget up front");
        service.run_once().unwrap();

        assert_eq!(service.heap.available(), before, "ARP-miss drop must release what send() reserved");
    }

    #[test]
    fn send_fails_with_memory_once_heap_budget_is_exhausted() {
        // Each near-max-size send reserves ~1.2KB; queue it (don't run the
        // loop, so nothing dequeues and releases) until the fixed heap
        // budget is exhausted, well before the TX queue's own depth limit.
        let (mut service, _isr) = DataLinkService::new(MemoryPhy::default(), RadioConfig::default()).unwrap();
        service.power_up().unwrap();
        let mac = MacAddress::new([9, 9, 9, 9, 9]);
        service.add_arp(IpAddress::new(1), mac).unwrap();

        let near_max_payload = std::vec![0u8; 28 * 29];
        let mut last = Ok(());
        for _ in 0..(TX_QUEUE_DEPTH + 1) {
            last = service.send(&near_max_payload, IpAddress::new(1), Endpoint::ApplicationData0, false);
            if last.is_err() {
                break;
            }
        }
        assert_eq!(last.unwrap_err(), Status::Memory);
    }
}
