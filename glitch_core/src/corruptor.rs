use crate::config::GlitchConfig;
use crate::governor::SafetyGovernor;
use crate::host::{Host, HostError, SessionManager};
use crate::mutator::{Mode, ModeMutator, Mutator};
use crate::region;
use crate::rom::{self, RowLayout};
use crate::target::Target;
use log::{debug, info, warn};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorruptOptions {
    /// CPU target only: hand the mutated snapshot back instead of restarting
    /// and loading it, so several mutations can share one restart.
    pub suppress_restart: bool,
}

/// A corruption request as the UI sends it. Nothing here is validated; the
/// orchestrator normalizes every field.
#[derive(Debug, Clone, PartialEq)]
pub struct CorruptRequest {
    pub mode: String,
    pub requested: f64,
    pub target: Option<String>,
    pub options: CorruptOptions,
}

impl CorruptRequest {
    pub fn new(mode: impl Into<String>, requested: f64) -> Self {
        Self {
            mode: mode.into(),
            requested,
            target: None,
            options: CorruptOptions::default(),
        }
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn suppress_restart(mut self) -> Self {
        self.options.suppress_restart = true;
        self
    }
}

/// Links a restart to the state load that must follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartToken {
    seq: u64,
    target: Target,
}

impl RestartToken {
    pub fn target(&self) -> Target {
        self.target
    }
}

/// First half of a restart/reload: the core has been asked to restart and
/// `state` must be loaded once `delay` has passed. Hand it back to
/// [`Corruptor::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReload {
    token: RestartToken,
    state: Vec<u8>,
    delay: Duration,
}

impl PendingReload {
    pub fn token(&self) -> RestartToken {
        self.token
    }

    pub fn state(&self) -> &[u8] {
        &self.state
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// How a rewritten ROM gets picked up by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum RomFinalize {
    /// The session restarted and will read the file again.
    Restarted,
    /// No restart was possible; the host should reload itself after this delay.
    ReloadHost { after_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RomReport {
    pub path: String,
    pub len: usize,
    pub mode: Mode,
    pub rows: Vec<usize>,
    pub digest_before: String,
    pub digest_after: String,
    pub written: bool,
    pub finalize: RomFinalize,
}

/// What a corruption call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was available to corrupt, or every step failed.
    Skipped,
    /// Live memory was mutated in place; no restart needed.
    AppliedLive {
        target: Target,
        mode: Mode,
        count: usize,
    },
    /// A snapshot was mutated and a restart issued; the state still has to be
    /// loaded.
    PendingReload(PendingReload),
    /// `suppress_restart` was set: the mutated CPU snapshot, not yet applied.
    Snapshot(Vec<u8>),
    RomRewritten(RomReport),
}

impl Outcome {
    /// The mutated snapshot, when the caller asked to apply it themselves.
    pub fn into_snapshot(self) -> Option<Vec<u8>> {
        match self {
            Outcome::Snapshot(state) => Some(state),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped)
    }
}

/// The corruption engine.
///
/// Owns the RNG and the safety policy; borrows the host's capabilities per
/// call. Every failure inside is logged and absorbed, so `corrupt` never errors.
pub struct Corruptor<R: Rng = ChaCha8Rng> {
    config: GlitchConfig,
    governor: SafetyGovernor,
    rom_governor: SafetyGovernor,
    rng: R,
    restarts_issued: u64,
}

impl Corruptor<ChaCha8Rng> {
    /// Seeds from `config.seed` if set, otherwise from the thread RNG.
    pub fn new(config: GlitchConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> Corruptor<R> {
    pub fn with_rng(config: GlitchConfig, rng: R) -> Self {
        Self {
            governor: SafetyGovernor::new(config.safety.max_fraction),
            rom_governor: SafetyGovernor::new(config.safety.rom_row_fraction),
            config,
            rng,
            restarts_issued: 0,
        }
    }

    pub fn governor(&self) -> &SafetyGovernor {
        &self.governor
    }

    /// Runs one corruption.
    pub fn corrupt(&mut self, host: &mut Host<'_>, request: &CorruptRequest) -> Outcome {
        self.run(host, request, 1)
    }

    /// Runs `passes` corruptions that share one finalization.
    ///
    /// A snapshot is read once, mutated `passes` times and reloaded after a
    /// single restart. Live memory is mutated `passes` times in place. A ROM
    /// has its rows selected once, each selected row is mutated `passes` times,
    /// and the file is rewritten once.
    pub fn corrupt_batch(
        &mut self,
        host: &mut Host<'_>,
        request: &CorruptRequest,
        passes: usize,
    ) -> Outcome {
        self.run(host, request, passes.max(1))
    }

    fn run(&mut self, host: &mut Host<'_>, request: &CorruptRequest, passes: usize) -> Outcome {
        let target = Target::parse_lenient(request.target.as_deref());
        let mode = target.resolve_mode(&request.mode);
        let sample_view = host.memory.as_deref().is_some_and(|m| m.has_sample_view());
        let mutator = ModeMutator::new(mode).with_sample_view(sample_view);
        debug!(
            "corrupt: target={target} mode={mode} requested={} passes={passes}",
            request.requested
        );

        match target {
            Target::Ram | Target::Audio => {
                self.corrupt_live_preferred(host, target, mutator, request.requested, passes)
            }
            Target::Cpu => {
                self.corrupt_cpu(host, mutator, request.requested, request.options, passes)
            }
            Target::Rom => self.corrupt_rom(host, mutator, request.requested, passes),
        }
    }

    /// Restarts the session and returns the token its state load must present.
    /// `None` when there is no session at all.
    pub fn begin_restart(&mut self, host: &mut Host<'_>, target: Target) -> Option<RestartToken> {
        let session = host.session.as_deref_mut()?;
        Some(self.restart_session(session, target))
    }

    /// Second half of a restart/reload: loads `state` into the session.
    ///
    /// Returns whether the load succeeded. Failures are logged, never retried.
    pub fn complete_with_state(
        &mut self,
        host: &mut Host<'_>,
        token: RestartToken,
        state: &[u8],
    ) -> bool {
        let target = token.target;
        if token.seq < self.restarts_issued {
            warn!(
                "Restart #{} was overtaken by restart #{}; loading its {target} state anyway",
                token.seq, self.restarts_issued
            );
        }
        let Some(session) = host.session.as_deref_mut() else {
            warn!("Session manager went away before the corrupted {target} state was loaded");
            return false;
        };
        match session.load_state(state) {
            Ok(()) => {
                info!("Loaded corrupted {target} state ({} bytes)", state.len());
                true
            }
            Err(e) => {
                warn!("Failed to load corrupted {target} state: {e}");
                false
            }
        }
    }

    pub fn complete(&mut self, host: &mut Host<'_>, pending: PendingReload) -> bool {
        self.complete_with_state(host, pending.token, &pending.state)
    }

    /// Bumps the restart sequence and asks the session to restart. Every
    /// restart goes through here so older tokens can be recognised.
    fn issue_restart(&mut self, session: &mut dyn SessionManager) -> Result<(), HostError> {
        self.restarts_issued += 1;
        if !session.can_restart() {
            return Err(HostError::Unsupported("restart"));
        }
        session.restart()
    }

    fn restart_session(
        &mut self,
        session: &mut dyn SessionManager,
        target: Target,
    ) -> RestartToken {
        match self.issue_restart(session) {
            Ok(()) => {}
            Err(HostError::Unsupported(_)) => {
                debug!("Session cannot restart; {target} state will be loaded in place");
            }
            Err(e) => warn!("Failed to restart core after {target} corruption: {e}"),
        }
        RestartToken {
            seq: self.restarts_issued,
            target,
        }
    }

    fn pending(
        &mut self,
        session: &mut dyn SessionManager,
        target: Target,
        state: Vec<u8>,
    ) -> Outcome {
        let token = self.restart_session(session, target);
        Outcome::PendingReload(PendingReload {
            token,
            state,
            delay: self.config.restart.reload_delay(),
        })
    }

    fn mutate_snapshot(
        &mut self,
        state: &mut [u8],
        target: Target,
        mutator: ModeMutator,
        requested: f64,
        passes: usize,
    ) {
        let count = self.governor.safe_count(requested, state.len());
        for _ in 0..passes {
            if let Err(e) = mutator.mutate(state, count, &mut self.rng) {
                warn!("{target} state mutation error: {e}");
            }
        }
        info!(
            "Corrupted {target} snapshot ({} bytes) with {} x{count} ({passes} pass(es))",
            state.len(),
            mutator.mode
        );
    }

    fn corrupt_live_preferred(
        &mut self,
        host: &mut Host<'_>,
        target: Target,
        mutator: ModeMutator,
        requested: f64,
        passes: usize,
    ) -> Outcome {
        if let Some(session) = host.session.as_deref_mut() {
            if let Some(mut state) = region::read_snapshot(session, target.name()) {
                self.mutate_snapshot(&mut state, target, mutator, requested, passes);
                return self.pending(session, target, state);
            }
        }

        let Some(memory) = host.memory.as_deref_mut() else {
            debug!("{target}: no snapshot API and no live memory");
            return Outcome::Skipped;
        };
        let Some(view) = region::live_view(memory, target.name()) else {
            return Outcome::Skipped;
        };
        let count = self.governor.safe_count(requested, view.len());
        for _ in 0..passes {
            if let Err(e) = mutator.mutate(view, count, &mut self.rng) {
                warn!("{target} live corruption error: {e}");
                return Outcome::Skipped;
            }
        }
        info!(
            "Corrupted live {target} memory ({} bytes) with {} x{count}",
            view.len(),
            mutator.mode
        );
        Outcome::AppliedLive {
            target,
            mode: mutator.mode,
            count,
        }
    }

    fn corrupt_cpu(
        &mut self,
        host: &mut Host<'_>,
        mutator: ModeMutator,
        requested: f64,
        options: CorruptOptions,
        passes: usize,
    ) -> Outcome {
        let Some(session) = host.session.as_deref_mut() else {
            debug!("cpu: no session manager, nothing to corrupt");
            return Outcome::Skipped;
        };
        let Some(mut state) = region::read_snapshot(session, "cpu") else {
            return Outcome::Skipped;
        };
        self.mutate_snapshot(&mut state, Target::Cpu, mutator, requested, passes);
        if options.suppress_restart {
            return Outcome::Snapshot(state);
        }
        self.pending(session, Target::Cpu, state)
    }

    fn corrupt_rom(
        &mut self,
        host: &mut Host<'_>,
        mutator: ModeMutator,
        requested: f64,
        passes: usize,
    ) -> Outcome {
        let Some(session) = host.session.as_deref_mut() else {
            warn!("No session manager available for ROM corruption");
            return Outcome::Skipped;
        };

        let (path, len, rows, digest_before, digest_after, written) = {
            let Some(fs) = session.filesystem() else {
                warn!("No virtual filesystem available for ROM corruption");
                return Outcome::Skipped;
            };
            let Some(path) = rom::locate_rom(fs, &self.config.rom.extensions) else {
                return Outcome::Skipped;
            };
            let mut bytes = match fs.read_file(&path) {
                Ok(bytes) if !bytes.is_empty() => bytes,
                Ok(_) => {
                    warn!("ROM file {path} is empty");
                    return Outcome::Skipped;
                }
                Err(e) => {
                    warn!("Failed to read ROM file {path}: {e}");
                    return Outcome::Skipped;
                }
            };
            let digest_before = format!("{:x}", md5::compute(&bytes));

            let layout = RowLayout::new(bytes.len(), &self.config.rom);
            let rows = rom::corrupt_rows(
                &mut bytes,
                &layout,
                &self.rom_governor,
                requested,
                passes,
                &mutator,
                &mut self.rng,
            );
            if rows.is_empty() {
                return Outcome::Skipped;
            }

            let written = match fs.write_file(&path, &bytes) {
                Ok(()) => true,
                Err(first) => {
                    debug!("Overwriting {path} failed ({first}), unlinking and retrying");
                    if let Err(e) = fs.unlink(&path) {
                        debug!("Failed to unlink {path}: {e}");
                    }
                    match fs.write_file(&path, &bytes) {
                        Ok(()) => true,
                        Err(e) => {
                            warn!("Failed to write mutated ROM back to {path}: {e}");
                            false
                        }
                    }
                }
            };
            let digest_after = format!("{:x}", md5::compute(&bytes));
            (path, bytes.len(), rows, digest_before, digest_after, written)
        };
        info!(
            "Corrupted {} rows of ROM {path} with {} ({digest_before} -> {digest_after})",
            rows.len(),
            mutator.mode
        );

        let finalize = match self.issue_restart(session) {
            Ok(()) => RomFinalize::Restarted,
            Err(e) => {
                if matches!(e, HostError::Unsupported(_)) {
                    debug!("Session cannot restart; host must reload to pick up the ROM");
                } else {
                    warn!("Failed to restart after ROM corruption: {e}");
                }
                RomFinalize::ReloadHost {
                    after_ms: self.config.restart.host_reload_delay_ms,
                }
            }
        };

        Outcome::RomRewritten(RomReport {
            path,
            len,
            mode: mutator.mode,
            rows,
            digest_before,
            digest_after,
            written,
            finalize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::test_utils::{FakeFs, FakeMemory, FakeSession};

    fn corruptor(seed: u64) -> Corruptor {
        Corruptor::with_rng(GlitchConfig::default(), ChaCha8Rng::seed_from_u64(seed))
    }

    fn ramp(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 256) as u8).collect()
    }

    fn bit_distance(a: &[u8], b: &[u8]) -> u32 {
        a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
    }

    fn rom_session(name: &str, rom: Vec<u8>) -> FakeSession {
        let mut fs = FakeFs::default();
        fs.files.insert(name.to_string(), rom);
        FakeSession::with_fs(fs)
    }

    fn on(target: &str, mode: &str, requested: f64) -> CorruptRequest {
        CorruptRequest::new(mode, requested).target(target)
    }

    #[test]
    fn no_capabilities_is_a_silent_no_op() {
        let mut engine = corruptor(1);
        for target in ["ram", "cpu", "audio", "rom", "romfile", "bogus"] {
            let outcome = engine.corrupt(&mut Host::none(), &on(target, "bitflip", 10.0));
            assert_eq!(outcome, Outcome::Skipped);
        }
    }

    #[test]
    fn ram_uses_snapshot_restart_and_reload() {
        let mut engine = corruptor(2);
        let original = ramp(4000);
        let mut session = FakeSession::with_state(original.clone());
        let mut memory = FakeMemory::new(vec![0; 1000]);

        let outcome = {
            let mut host = Host::none()
                .with_memory(&mut memory)
                .with_session(&mut session);
            engine.corrupt(&mut host, &CorruptRequest::new("texturevomit", 5.0))
        };
        let Outcome::PendingReload(pending) = outcome else {
            panic!("expected a pending reload, got {outcome:?}");
        };
        assert_eq!(session.restarts, 1);
        assert!(session.loaded.is_empty(), "loaded before completion");
        assert_eq!(pending.delay(), Duration::from_millis(50));
        assert_eq!(pending.token().target(), Target::Ram);
        assert_ne!(pending.state(), original.as_slice());
        assert_eq!(memory.bytes, vec![0; 1000], "live memory untouched");

        let expected = pending.state().to_vec();
        let mut host = Host::none().with_session(&mut session);
        assert!(engine.complete(&mut host, pending));
        assert_eq!(session.loaded, vec![expected]);
    }

    #[test]
    fn ram_falls_back_to_live_memory_when_snapshot_fails() {
        let mut engine = corruptor(3);
        let mut session = FakeSession::with_state(ramp(100));
        session.get_state_fails = true;
        let mut memory = FakeMemory::new(vec![0; 200_000]);
        let outcome = {
            let mut host = Host::none()
                .with_memory(&mut memory)
                .with_session(&mut session);
            engine.corrupt(&mut host, &CorruptRequest::new("bitflip", 1e9))
        };
        assert_eq!(
            outcome,
            Outcome::AppliedLive {
                target: Target::Ram,
                mode: Mode::BitFlip,
                count: 1000,
            }
        );
        assert_eq!(session.restarts, 0);
        let flipped = bit_distance(&memory.bytes, &vec![0; 200_000]);
        assert!(flipped > 0 && flipped <= 1000);
    }

    #[test]
    fn bitflip_clamps_to_half_a_percent_of_a_megabyte() {
        let mut engine = corruptor(4);
        let mut memory = FakeMemory::new(vec![0; 1_000_000]);
        let outcome = {
            let mut host = Host::none().with_memory(&mut memory);
            engine.corrupt(&mut host, &CorruptRequest::new("bitflip", 10_000_000.0))
        };
        assert_eq!(
            outcome,
            Outcome::AppliedLive {
                target: Target::Ram,
                mode: Mode::BitFlip,
                count: 5_000,
            }
        );
        // Flips can land on the same bit twice and cancel, so allow a little slack.
        let flipped = bit_distance(&memory.bytes, &vec![0; 1_000_000]);
        assert!(flipped <= 5_000 && flipped > 4_900, "flipped {flipped}");
        assert_eq!(flipped % 2, 0, "an even number of flips");
    }

    #[test]
    fn audio_substitutes_bytesoundswap_for_ram_modes() {
        let mut engine = corruptor(5);
        let mut memory = FakeMemory::new(vec![0x40; 100_000]);
        memory.sample_view = true;
        let outcome = {
            let mut host = Host::none().with_memory(&mut memory);
            engine.corrupt(&mut host, &on("audio", "bitflip", 50.0))
        };
        assert_eq!(
            outcome,
            Outcome::AppliedLive {
                target: Target::Audio,
                mode: Mode::ByteSoundSwap,
                count: 50,
            }
        );
        assert!(memory.bytes[..35_000].iter().all(|&b| b == 0x40));
    }

    #[test]
    fn audio_snapshot_is_mutated_in_band_and_reloaded() {
        let mut engine = corruptor(16);
        let original = vec![0x40; 100_000];
        let mut session = FakeSession::with_state(original.clone());
        let mut memory = FakeMemory::new(vec![0x40; 100_000]);
        memory.sample_view = true;

        let outcome = {
            let mut host = Host::none()
                .with_memory(&mut memory)
                .with_session(&mut session);
            engine.corrupt(&mut host, &on("audio", "bitflip", 50.0))
        };
        let Outcome::PendingReload(pending) = outcome else {
            panic!("expected a pending reload, got {outcome:?}");
        };
        assert_eq!(pending.token().target(), Target::Audio);
        assert_eq!(session.restarts, 1);
        assert_eq!(memory.bytes, original, "live memory untouched");

        // bytesoundswap stays inside [35%, 65%); a bitflip would land anywhere.
        let state = pending.state();
        assert_ne!(state, original.as_slice());
        assert!(state[..35_000].iter().all(|&b| b == 0x40));
        assert!(state[65_000..].iter().all(|&b| b == 0x40));

        let mut host = Host::none().with_session(&mut session);
        assert!(engine.complete(&mut host, pending));
        assert_eq!(session.loaded.len(), 1);
    }

    #[test]
    fn cpu_with_suppress_restart_returns_snapshot_only() {
        let mut engine = corruptor(6);
        let original = ramp(10_000);
        let mut session = FakeSession::with_state(original.clone());
        let outcome = {
            let mut host = Host::none().with_session(&mut session);
            let request = on("cpu", "xor", 20.0).suppress_restart();
            engine.corrupt(&mut host, &request)
        };
        let state = outcome.into_snapshot().expect("snapshot returned");
        assert_eq!(state.len(), original.len());
        assert_eq!(session.restarts, 0);
        assert!(session.loaded.is_empty());
    }

    #[test]
    fn cpu_without_snapshot_api_does_nothing() {
        let mut engine = corruptor(7);
        let mut session = FakeSession::default();
        let mut memory = FakeMemory::new(vec![1; 1000]);
        let outcome = {
            let mut host = Host::none()
                .with_memory(&mut memory)
                .with_session(&mut session);
            engine.corrupt(&mut host, &on("cpu", "bitflip", 3.0))
        };
        assert!(outcome.is_skipped());
        assert_eq!(memory.bytes, vec![1; 1000]);
    }

    #[test]
    fn cpu_batch_restarts_once() {
        let mut engine = corruptor(8);
        let mut session = FakeSession::with_state(vec![0; 10_000]);
        let outcome = {
            let mut host = Host::none().with_session(&mut session);
            engine.corrupt_batch(&mut host, &on("cpu", "bitflip", 10.0), 2)
        };
        let Outcome::PendingReload(pending) = outcome else {
            panic!("expected a pending reload");
        };
        assert_eq!(session.restarts, 1);
        let flipped = bit_distance(pending.state(), &[0; 10_000]);
        assert!(flipped > 0 && flipped <= 20);
    }

    #[test]
    fn ram_batch_shares_one_snapshot_and_restart() {
        let mut engine = corruptor(17);
        let mut session = FakeSession::with_state(vec![0; 10_000]);
        let outcome = {
            let mut host = Host::none().with_session(&mut session);
            engine.corrupt_batch(&mut host, &on("ram", "bitflip", 10.0), 3)
        };
        let Outcome::PendingReload(pending) = outcome else {
            panic!("expected a pending reload");
        };
        assert_eq!(session.restarts, 1);
        let flipped = bit_distance(pending.state(), &[0; 10_000]);
        assert!(flipped > 10 && flipped <= 30, "flipped {flipped}");
    }

    #[test]
    fn restart_failure_still_yields_pending_reload() {
        let mut engine = corruptor(9);
        let mut session = FakeSession::with_state(vec![5; 1000]);
        session.restart_fails = true;
        let mut host = Host::none().with_session(&mut session);
        let outcome = engine.corrupt(&mut host, &on("cpu", "bitflip", 1.0));
        let Outcome::PendingReload(pending) = outcome else {
            panic!("expected a pending reload");
        };
        assert!(engine.complete(&mut host, pending));
    }

    #[test]
    fn completing_without_session_reports_failure() {
        let mut engine = corruptor(10);
        let mut session = FakeSession::with_state(vec![5; 1000]);
        let token = {
            let mut host = Host::none().with_session(&mut session);
            engine.begin_restart(&mut host, Target::Cpu).unwrap()
        };
        assert_eq!(session.restarts, 1);
        let loaded = engine.complete_with_state(&mut Host::none(), token, &[1, 2, 3]);
        assert!(!loaded);
        assert_eq!(engine.begin_restart(&mut Host::none(), Target::Cpu), None);
    }

    #[test]
    fn rom_scenario_mutates_every_row_outside_boot_area() {
        let mut engine = corruptor(11);
        let original = ramp(2048);
        let mut session = rom_session("game.nes", original.clone());
        if let Some(fs) = session.fs.as_mut() {
            fs.files.insert("notes.txt".to_string(), vec![1; 10]);
        }

        let outcome = {
            let mut host = Host::none().with_session(&mut session);
            engine.corrupt(&mut host, &on("rom", "byteinject", 1000.0))
        };
        let Outcome::RomRewritten(report) = outcome else {
            panic!("expected a ROM rewrite");
        };
        assert_eq!(report.path, "/game.nes");
        assert_eq!(report.rows, (64..128).collect::<Vec<_>>());
        assert_eq!(report.finalize, RomFinalize::Restarted);
        assert!(report.written);
        assert_ne!(report.digest_before, report.digest_after);
        assert_eq!(session.restarts, 1);

        let rewritten = &session.fs.as_ref().unwrap().files["game.nes"];
        assert_eq!(&rewritten[..1024], &original[..1024]);
        assert_ne!(&rewritten[1024..], &original[1024..]);
    }

    #[test]
    fn rom_batch_selects_rows_once_and_rewrites_once() {
        let mut engine = corruptor(18);
        let mut session = rom_session("game.gba", vec![0; 1024 + 16 * 40]);
        let outcome = {
            let mut host = Host::none().with_session(&mut session);
            engine.corrupt_batch(&mut host, &on("rom", "bitflip", 30.0), 2)
        };
        let Outcome::RomRewritten(report) = outcome else {
            panic!("expected a ROM rewrite");
        };
        assert_eq!(report.rows.len(), 30);
        assert!(report.rows.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(session.restarts, 1);
        assert_eq!(session.fs.as_ref().unwrap().writes, 1);
    }

    #[test]
    fn rom_without_restart_asks_host_to_reload() {
        let mut engine = corruptor(12);
        let mut session = rom_session("rom.bin", vec![0; 8192]);
        session.restartable = false;
        let mut host = Host::none().with_session(&mut session);
        let outcome = engine.corrupt(&mut host, &on("romfile", "nonsense", 4.0));
        let Outcome::RomRewritten(report) = outcome else {
            panic!("expected a ROM rewrite");
        };
        assert_eq!(report.mode, Mode::ByteInject);
        assert_eq!(report.rows.len(), 4);
        assert_eq!(report.finalize, RomFinalize::ReloadHost { after_ms: 100 });
    }

    #[test]
    fn rom_restart_overtakes_pending_snapshot_token() {
        let mut engine = corruptor(19);
        let mut session = rom_session("game.sfc", vec![0; 4096]);
        session.snapshots = true;
        session.state = Some(vec![0; 500]);
        let mut host = Host::none().with_session(&mut session);

        let token = engine.begin_restart(&mut host, Target::Cpu).unwrap();
        let outcome = engine.corrupt(&mut host, &on("rom", "bitflip", 2.0));
        assert!(matches!(outcome, Outcome::RomRewritten(_)));
        assert_eq!(engine.restarts_issued, 2);
        assert!(token.seq < engine.restarts_issued);
        assert!(engine.complete_with_state(&mut host, token, &[9; 500]));
    }

    #[test]
    fn rom_write_failure_is_reported_not_raised() {
        let mut engine = corruptor(13);
        let mut session = rom_session("rom.gba", vec![0; 4096]);
        if let Some(fs) = session.fs.as_mut() {
            fs.fail_writes = true;
        }
        let outcome = {
            let mut host = Host::none().with_session(&mut session);
            engine.corrupt(&mut host, &on("rom", "bitflip", 2.0))
        };
        let Outcome::RomRewritten(report) = outcome else {
            panic!("expected a ROM report");
        };
        assert!(!report.written);
        assert_eq!(session.fs.as_ref().unwrap().unlinks, 1);
    }

    #[test]
    fn tiny_rom_is_left_alone() {
        let mut engine = corruptor(14);
        let mut session = rom_session("tiny.gb", vec![3; 20]);
        let outcome = {
            let mut host = Host::none().with_session(&mut session);
            engine.corrupt(&mut host, &on("rom", "bitflip", 2.0))
        };
        assert!(outcome.is_skipped());
        assert_eq!(session.fs.as_ref().unwrap().writes, 0);
        assert_eq!(session.restarts, 0);
    }

    #[test]
    fn seeded_engines_pick_different_rom_rows() {
        let run = |seed| {
            let mut engine = corruptor(seed);
            let mut session = rom_session("big.sfc", vec![0; 1 << 20]);
            let mut host = Host::none().with_session(&mut session);
            match engine.corrupt(&mut host, &on("rom", "bitflip", 20.0)) {
                Outcome::RomRewritten(report) => report.rows,
                other => panic!("unexpected {other:?}"),
            }
        };
        assert_ne!(run(100), run(200));
    }

    #[test]
    fn overtaken_token_still_loads() {
        let mut engine = corruptor(15);
        let mut session = FakeSession::with_state(vec![0; 500]);
        let mut host = Host::none().with_session(&mut session);
        let first = engine.begin_restart(&mut host, Target::Ram).unwrap();
        let _second = engine.begin_restart(&mut host, Target::Ram).unwrap();
        assert!(engine.complete_with_state(&mut host, first, &[9; 500]));
    }
}
