use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use log::{debug, warn};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::device::codec::{decode_stat, decode_telemetry};
use crate::device::constants::{STAT_CHARACTERISTIC, TELEMETRY_CHARACTERISTIC};
use crate::device::transport::Transport;
use crate::device::types::{StatSample, TelemetrySample};
use crate::error::DeviceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollRole {
    Telemetry,
    Stat,
}

impl PollRole {
    pub fn characteristic(self) -> Uuid {
        match self {
            PollRole::Telemetry => TELEMETRY_CHARACTERISTIC,
            PollRole::Stat => STAT_CHARACTERISTIC,
        }
    }

    fn decode(self, bytes: &[u8]) -> Result<PollOutcome, DeviceError> {
        Ok(match self {
            PollRole::Telemetry => PollOutcome::Telemetry(decode_telemetry(bytes)?),
            PollRole::Stat => PollOutcome::Stat(decode_stat(bytes)?),
        })
    }
}

impl fmt::Display for PollRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            PollRole::Telemetry => "Telemetry",
            PollRole::Stat => "Stat",
        };

        write!(f, "{}", result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollOutcome {
    Telemetry(TelemetrySample),
    Stat(StatSample),
}

/// Allows at most one outstanding poll per role, and lets that poll be cancelled by role.
pub struct PollSlot {
    role: PollRole,
    in_flight: AtomicBool,
    cancel: Mutex<CancellationToken>,
}

impl PollSlot {
    pub fn new(role: PollRole) -> Arc<Self> {
        Arc::new(PollSlot {
            role,
            in_flight: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
        })
    }

    pub fn role(&self) -> PollRole {
        self.role
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// `None` while the previous poll of this role is still running.
    pub fn try_claim(self: &Arc<Self>) -> Option<PollClaim> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return None;
        }

        let token = self.cancel.lock().expect("Failed to lock PollSlot token").clone();
        Some(PollClaim { slot: self.clone(), token })
    }

    /// Cancels the outstanding poll, if any. Later claims get a fresh token.
    pub fn cancel(&self) {
        let mut token = self.cancel.lock().expect("Failed to lock PollSlot token");
        token.cancel();
        *token = CancellationToken::new();
    }
}

/// Held by a running poll; releases the slot when dropped.
pub struct PollClaim {
    slot: Arc<PollSlot>,
    token: CancellationToken,
}

impl PollClaim {
    pub fn role(&self) -> PollRole {
        self.slot.role
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for PollClaim {
    fn drop(&mut self) {
        self.slot.in_flight.store(false, Ordering::Release);
    }
}

/// The poll slots of every role, plus the generation used to discard results that were read
/// before a command interrupted polling.
pub struct Pollers {
    pub telemetry: Arc<PollSlot>,
    pub stat: Arc<PollSlot>,
    generation: AtomicU64,
}

impl Pollers {
    pub fn new() -> Self {
        Pollers {
            telemetry: PollSlot::new(PollRole::Telemetry),
            stat: PollSlot::new(PollRole::Stat),
            generation: AtomicU64::new(0),
        }
    }

    pub fn slot(&self, role: PollRole) -> &Arc<PollSlot> {
        match role {
            PollRole::Telemetry => &self.telemetry,
            PollRole::Stat => &self.stat,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn cancel_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.telemetry.cancel();
        self.stat.cancel();
    }
}

impl Default for Pollers {
    fn default() -> Self {
        Self::new()
    }
}

/// One read of the role's characteristic, decoded. Failures are logged and yield `None`; they
/// never touch the connection state.
pub async fn poll_once<T: Transport>(transport: &T, handle: &T::Handle, claim: &PollClaim) -> Option<PollOutcome> {
    let role = claim.role();

    // a read that already finished wins over the cancellation; the generation check discards it
    let result = tokio::select! {
        biased;
        result = transport.read(handle, role.characteristic()) => result,
        _ = claim.token.cancelled() => {
            debug!("{} poll cancelled", role);
            return None;
        },
    };

    match result.and_then(|bytes| role.decode(&bytes)) {
        Ok(outcome) => Some(outcome),
        Err(err) => {
            warn!("{} poll failed: {}", role, err);
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_allows_one_claim_at_a_time() {
        let slot = PollSlot::new(PollRole::Telemetry);

        let claim = slot.try_claim().expect("first claim");
        assert!(slot.is_in_flight());
        assert!(slot.try_claim().is_none());

        drop(claim);
        assert!(!slot.is_in_flight());
        assert!(slot.try_claim().is_some());
    }

    #[test]
    fn cancel_reaches_outstanding_claim_only() {
        let slot = PollSlot::new(PollRole::Stat);

        let claim = slot.try_claim().expect("claim");
        slot.cancel();
        assert!(claim.is_cancelled());
        drop(claim);

        let claim = slot.try_claim().expect("claim after cancel");
        assert!(!claim.is_cancelled());
    }

    #[test]
    fn cancel_all_bumps_generation() {
        let pollers = Pollers::new();
        let telemetry = pollers.telemetry.try_claim().expect("claim");
        let before = pollers.generation();

        pollers.cancel_all();
        assert_eq!(pollers.generation(), before + 1);
        assert!(telemetry.is_cancelled());
        assert_eq!(pollers.slot(PollRole::Stat).role(), PollRole::Stat);
    }

    #[test]
    fn roles_map_to_characteristics() {
        assert_eq!(PollRole::Telemetry.characteristic(), TELEMETRY_CHARACTERISTIC);
        assert_eq!(PollRole::Stat.characteristic(), STAT_CHARACTERISTIC);
        assert_eq!(
            PollRole::Stat.decode(&[72, 14, 0, 1]).unwrap(),
            PollOutcome::Stat(StatSample { heart_rate_bpm: 72, breath_rate_bpm: 14, stride_rate1_bpm: 0, stride_rate2_bpm: 1 }),
        );
        assert!(PollRole::Telemetry.decode(&[0u8; 4]).is_err());
    }
}
