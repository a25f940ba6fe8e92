//! Periodic "active corruption": fire a request every interval, and finish each
//! restart/reload before firing the next one.

use crate::corruptor::{CorruptRequest, Corruptor, Outcome, PendingReload};
use crate::host::Host;
use log::debug;
use rand::Rng;
use std::time::{Duration, Instant};

/// What a call to [`ActiveCorruption::poll`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// Not due yet.
    Idle,
    /// A reload is pending and its delay has not elapsed; nothing fired.
    Deferred,
    /// A pending reload was completed.
    StateLoaded { ok: bool },
    Fired(Outcome),
}

#[derive(Debug)]
pub struct ActiveCorruption {
    interval: Duration,
    request: CorruptRequest,
    next_due: Instant,
    pending: Option<(PendingReload, Instant)>,
}

impl ActiveCorruption {
    /// The first corruption fires on the first poll at or after `start`.
    pub fn new(request: CorruptRequest, interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            request,
            next_due: start,
            pending: None,
        }
    }

    pub fn has_pending_reload(&self) -> bool {
        self.pending.is_some()
    }

    /// Advances the driver to `now`.
    ///
    /// A pending reload always takes priority over a new corruption, so at most
    /// one restart is ever outstanding.
    pub fn poll<R: Rng>(
        &mut self,
        now: Instant,
        corruptor: &mut Corruptor<R>,
        host: &mut Host<'_>,
    ) -> Tick {
        if let Some((_, due)) = &self.pending {
            if now < *due {
                return Tick::Deferred;
            }
            if let Some((pending, _)) = self.pending.take() {
                let ok = corruptor.complete(host, pending);
                return Tick::StateLoaded { ok };
            }
        }

        if now < self.next_due {
            return Tick::Idle;
        }
        self.next_due = now + self.interval;

        let outcome = corruptor.corrupt(host, &self.request);
        if let Outcome::PendingReload(pending) = &outcome {
            debug!("Active corruption: reload due in {:?}", pending.delay());
            self.pending = Some((pending.clone(), now + pending.delay()));
        }
        Tick::Fired(outcome)
    }
}
