//! Radio Mode FSM (C2): the four operating modes and every legal transition
//! between them (spec §4.1).
//!
//! Modeled as a tagged state plus a pure `transition` function, per design
//! note §9 ("FSM as a tagged state, not a class hierarchy") rather than the
//! original source's polymorphic state classes (`original_source/src/
//! netif/nrf24l01/physical/phy_fsm_controller.hpp`). Generalizes the
//! teacher's per-variant `set_op_mode` dispatch into one table.

use crate::phy::PhyPort;
use crate::status::Status;

/// Initial state is `PoweredOff`; there is no terminal state.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, defmt::Format)]
pub enum RadioState {
    #[default]
    PoweredOff,
    Standby,
    RxMode,
    TxMode,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, defmt::Format)]
pub enum RadioEvent {
    PowerUp,
    PowerDown,
    StartRx,
    StartTx,
    GoToStandby,
}

/// Outcome of a transition attempt: either the state changed (and the PHY
/// side-effects below were already applied), or the request was bad and
/// left the state unchanged.
#[derive(Clone, Copy, PartialEq, Eq, Debug, defmt::Format)]
pub enum TransitionOutcome {
    Moved(RadioState),
    BadRequest { from: RadioState, event: RadioEvent },
}

/// Drives a [`RadioState`] against a [`PhyPort`], executing each
/// transition's hardware contract (spec §4.1) and invoking a hook on bad
/// requests instead of treating them as fatal.
pub struct Fsm {
    state: RadioState,
}

impl Fsm {
    pub fn new() -> Self {
        Self { state: RadioState::PoweredOff }
    }

    pub fn state(&self) -> RadioState {
        self.state
    }

    /// Attempt `event` against the current state, applying the PHY
    /// side-effects from spec §4.1's "Transition contracts" table. Bad
    /// requests are logged via `defmt::warn!` and leave `self.state` as-is.
    pub fn apply<P: PhyPort>(&mut self, phy: &mut P, event: RadioEvent) -> Result<TransitionOutcome, Status> {
        let next = next_state(self.state, event);

        let Some(next) = next else {
            defmt::warn!("bad FSM request: {} from {}", event, self.state);
            return Ok(TransitionOutcome::BadRequest { from: self.state, event });
        };

        match (self.state, event) {
            (RadioState::PoweredOff, RadioEvent::PowerUp) => {
                phy.set_chip_enable(false);
                phy.set_power_up(true)?;
                phy.delay_us(5_000);
            }
            (_, RadioEvent::PowerDown) => {
                phy.set_power_up(false)?;
                phy.set_chip_enable(false);
            }
            (RadioState::Standby, RadioEvent::StartRx) => {
                phy.set_primary_rx(true)?;
                phy.set_chip_enable(true);
                phy.delay_us(130);
            }
            (RadioState::Standby, RadioEvent::StartTx) => {
                phy.set_primary_rx(false)?;
                phy.set_chip_enable(true);
                phy.delay_us(130);
            }
            (RadioState::RxMode, RadioEvent::GoToStandby)
            | (RadioState::TxMode, RadioEvent::GoToStandby) => {
                phy.set_chip_enable(false);
            }
            (RadioState::Standby, RadioEvent::GoToStandby)
            | (RadioState::RxMode, RadioEvent::StartRx)
            | (RadioState::TxMode, RadioEvent::StartTx) => {
                // No-op transitions back into the same state.
            }
            _ => unreachable!("next_state and this match must stay in sync"),
        }

        self.state = next;
        Ok(TransitionOutcome::Moved(next))
    }
}

impl Default for Fsm {
    fn default() -> Self {
        Self::new()
    }
}

/// Pure transition table (spec §4.1). `None` means "bad request": the event
/// is not legal from this state.
fn next_state(from: RadioState, event: RadioEvent) -> Option<RadioState> {
    use RadioEvent::*;
    use RadioState::*;

    match (from, event) {
        (PoweredOff, PowerUp) => Some(Standby),
        (PoweredOff, PowerDown) => Some(PoweredOff),

        (Standby, PowerDown) => Some(PoweredOff),
        (Standby, StartRx) => Some(RxMode),
        (Standby, StartTx) => Some(TxMode),
        (Standby, GoToStandby) => Some(Standby),

        (RxMode, PowerDown) => Some(PoweredOff),
        (RxMode, StartRx) => Some(RxMode),
        (RxMode, GoToStandby) => Some(Standby),

        (TxMode, PowerDown) => Some(PoweredOff),
        (TxMode, StartTx) => Some(TxMode),
        (TxMode, GoToStandby) => Some(Standby),

        _ => None,
    }
}
