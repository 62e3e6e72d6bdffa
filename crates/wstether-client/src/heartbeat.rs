//! Heartbeat driver.
//!
//! Owns the liveness deadline and the awaiting-ack flag. The driver is
//! deliberately passive: the connection's single event loop polls
//! [`HeartbeatDriver::deadline`] in its `select!` and calls
//! [`HeartbeatDriver::fire`] when it elapses, so heartbeats, inbound
//! frames, and outbound writes are serialized in one place with no shared
//! locks. A torn-down loop can never re-fire a heartbeat because the
//! deadline dies with it.

use std::time::Duration;

use tokio::time::Instant;
use wstether_core::protocol::Envelope;
use wstether_core::protocol::control;
use wstether_core::Result;

/// What a timer fire means for the connection.
#[derive(Debug)]
pub enum Beat {
    /// Send this pulse.
    Pulse(Envelope),
    /// The previous pulse was never acknowledged; the connection is dead.
    Dead,
}

/// Liveness timer for one physical connection.
pub struct HeartbeatDriver {
    interval: Duration,
    next_fire: Instant,
    awaiting_ack: bool,
}

impl HeartbeatDriver {
    /// Start the driver from a Hello interval.
    ///
    /// The first fire is jittered to a random fraction of the interval so
    /// many shards reconnecting together do not pulse in lockstep.
    pub fn start(interval_ms: u64) -> Self {
        let interval = Duration::from_millis(interval_ms);
        let jitter = fastrand::f64().clamp(f64::MIN_POSITIVE, 1.0 - f64::EPSILON);
        let first = interval.mul_f64(jitter);
        Self {
            interval,
            next_fire: Instant::now() + first,
            awaiting_ack: false,
        }
    }

    /// When the next pulse is due.
    pub fn deadline(&self) -> Instant {
        self.next_fire
    }

    /// The deadline elapsed. Either produces the next pulse (carrying the
    /// last-seen sequence) or reports the connection dead because the
    /// previous pulse was never acknowledged.
    pub fn fire(&mut self, seq: Option<u64>) -> Result<Beat> {
        if self.awaiting_ack {
            return Ok(Beat::Dead);
        }
        self.awaiting_ack = true;
        self.next_fire = Instant::now() + self.interval;
        Ok(Beat::Pulse(control::heartbeat(seq)?))
    }

    /// The server requested an immediate pulse (inbound heartbeat opcode).
    /// Does not move the deadline.
    pub fn forced_pulse(&mut self, seq: Option<u64>) -> Result<Envelope> {
        self.awaiting_ack = true;
        control::heartbeat(seq)
    }

    /// A heartbeat ack arrived.
    pub fn ack(&mut self) {
        self.awaiting_ack = false;
    }

    #[cfg(test)]
    pub(crate) fn awaiting_ack(&self) -> bool {
        self.awaiting_ack
    }
}
