use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use thiserror::Error;

mod audio;
mod bytes;

/// Errors a mutation can report instead of panicking.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("cannot mutate an empty buffer")]
    EmptyBuffer,
}

/// A mode name that is not in the catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown corruption mode '{0}'")]
pub struct UnknownMode(pub String);

/// The catalog of corruption algorithms.
///
/// Every mode is total over `(buffer, count)`: it never reads or writes out of
/// bounds, a count of zero leaves the buffer alone, and the count is a budget
/// rather than an exact number of touched bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    BitFlip,
    ByteSwap,
    Checkerboard,
    TextureVomit,
    EveryByte,
    WorldLevel,
    Xor,
    ClusterBytes,
    StatChanger,
    ByteSoundSwap,
    ByteInject,
    AudioGlitch,
    AudioInject,
}

impl Mode {
    pub const ALL: [Mode; 13] = [
        Mode::BitFlip,
        Mode::ByteSwap,
        Mode::Checkerboard,
        Mode::TextureVomit,
        Mode::EveryByte,
        Mode::WorldLevel,
        Mode::Xor,
        Mode::ClusterBytes,
        Mode::StatChanger,
        Mode::ByteSoundSwap,
        Mode::ByteInject,
        Mode::AudioGlitch,
        Mode::AudioInject,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Mode::BitFlip => "bitflip",
            Mode::ByteSwap => "byteswap",
            Mode::Checkerboard => "checkerboard",
            Mode::TextureVomit => "texturevomit",
            Mode::EveryByte => "everybyte",
            Mode::WorldLevel => "worldlevel",
            Mode::Xor => "xor",
            Mode::ClusterBytes => "clusterbytes",
            Mode::StatChanger => "statchanger",
            Mode::ByteSoundSwap => "bytesoundswap",
            Mode::ByteInject => "byteinject",
            Mode::AudioGlitch => "audioglitch",
            Mode::AudioInject => "audioinject",
        }
    }

    /// Runs this mode over `buf`.
    ///
    /// `sample_view` tells `bytesoundswap` whether the host exposes 16-bit
    /// samples; the other modes ignore it.
    pub fn apply<R: Rng + ?Sized>(
        self,
        buf: &mut [u8],
        count: usize,
        sample_view: bool,
        rng: &mut R,
    ) -> Result<(), MutationError> {
        if buf.is_empty() {
            return Err(MutationError::EmptyBuffer);
        }
        if count == 0 {
            return Ok(());
        }
        match self {
            Mode::BitFlip => bytes::bitflip(buf, count, rng),
            Mode::ByteSwap => bytes::byteswap(buf, count, rng),
            Mode::Checkerboard => bytes::checkerboard(buf, count, rng),
            Mode::TextureVomit => bytes::texturevomit(buf, count, rng),
            Mode::EveryByte => bytes::everybyte(buf, count, rng),
            Mode::WorldLevel => bytes::worldlevel(buf, count, rng),
            Mode::Xor => bytes::xor(buf, count, rng),
            Mode::ClusterBytes => bytes::clusterbytes(buf, count, rng),
            Mode::StatChanger => bytes::statchanger(buf, count, rng),
            Mode::ByteInject => bytes::byteinject(buf, count, rng),
            Mode::ByteSoundSwap => audio::bytesoundswap(buf, count, sample_view, rng),
            Mode::AudioGlitch => audio::audioglitch(buf, count, rng),
            Mode::AudioInject => audio::audioinject(buf, count, rng),
        }
        Ok(())
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Mode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

/// Something that corrupts a byte buffer in place.
///
/// # Type Parameters
/// * `R`: The random number generator driving index and value selection.
pub trait Mutator<R: Rng + ?Sized> {
    /// Applies up to `count` mutations to `buf`.
    ///
    /// # Returns
    /// `Err(MutationError::EmptyBuffer)` when `buf` is empty. Any non-empty
    /// buffer and any count succeed.
    fn mutate(&self, buf: &mut [u8], count: usize, rng: &mut R) -> Result<(), MutationError>;
}

/// The `Mutator` used by the orchestrator: a catalog mode plus what the host
/// told us about its sample view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeMutator {
    pub mode: Mode,
    pub sample_view: bool,
}

impl ModeMutator {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            sample_view: false,
        }
    }

    pub fn with_sample_view(mut self, sample_view: bool) -> Self {
        self.sample_view = sample_view;
        self
    }
}

impl<R: Rng + ?Sized> Mutator<R> for ModeMutator {
    fn mutate(&self, buf: &mut [u8], count: usize, rng: &mut R) -> Result<(), MutationError> {
        self.mode.apply(buf, count, self.sample_view, rng)
    }
}

/// Uniform index in `0..bound`; zero when the bound is zero or one.
pub(crate) fn below<R: Rng + ?Sized>(rng: &mut R, bound: usize) -> usize {
    if bound <= 1 {
        0
    } else {
        rng.random_range(0..bound)
    }
}

pub(crate) fn random_byte<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    rng.random()
}

/// A random window of `count` bytes (clipped to `region_len`) inside
/// `0..region_len`.
fn pick_window<R: Rng + ?Sized>(rng: &mut R, region_len: usize, count: usize) -> Range<usize> {
    let n = count.min(region_len);
    let start = below(rng, (region_len - n).max(1));
    start..start + n
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;

    fn noise(len: usize, seed: u8) -> Vec<u8> {
        let mut rng = ChaCha8Rng::from_seed([seed; 32]);
        (0..len).map(|_| rng.random()).collect()
    }

    #[test]
    fn mode_names_round_trip_through_from_str() {
        for mode in Mode::ALL {
            assert_eq!(mode.name().parse::<Mode>(), Ok(mode));
            assert_eq!(mode.to_string().to_uppercase().parse::<Mode>(), Ok(mode));
        }
        assert_eq!(
            "glitchify".parse::<Mode>(),
            Err(UnknownMode("glitchify".to_string()))
        );
    }

    #[test]
    fn every_mode_is_total_over_small_buffers_and_counts() {
        let mut rng = ChaCha8Rng::from_seed([1; 32]);
        for len in 2..=48 {
            for count in 0..=len {
                for mode in Mode::ALL {
                    for sample_view in [false, true] {
                        let mut buf = noise(len, len as u8);
                        let result = mode.apply(&mut buf, count, sample_view, &mut rng);
                        assert_eq!(result, Ok(()), "{mode} failed on len {len} count {count}");
                        assert_eq!(buf.len(), len);
                    }
                }
            }
        }
    }

    #[test]
    fn every_mode_handles_single_byte_and_large_counts() {
        let mut rng = ChaCha8Rng::from_seed([2; 32]);
        for mode in Mode::ALL {
            let mut buf = vec![0xAB];
            assert_eq!(mode.apply(&mut buf, 1, true, &mut rng), Ok(()));
            let mut buf = noise(4096, 9);
            assert_eq!(mode.apply(&mut buf, 4096, false, &mut rng), Ok(()));
        }
    }

    #[test]
    fn empty_buffer_is_an_error_not_a_panic() {
        let mut rng = ChaCha8Rng::from_seed([3; 32]);
        for mode in Mode::ALL {
            assert_eq!(
                mode.apply(&mut [], 5, false, &mut rng),
                Err(MutationError::EmptyBuffer)
            );
        }
    }

    #[test]
    fn zero_count_is_a_no_op_for_every_mode() {
        let mut rng = ChaCha8Rng::from_seed([4; 32]);
        let original = noise(512, 4);
        for mode in Mode::ALL {
            let mut buf = original.clone();
            mode.apply(&mut buf, 0, true, &mut rng).unwrap();
            assert_eq!(buf, original, "{mode} modified the buffer with count 0");
        }
    }

    #[test]
    fn byteswap_preserves_byte_multiset_for_any_count() {
        let mut rng = ChaCha8Rng::from_seed([5; 32]);
        let original = noise(1000, 5);
        let mut expected = original.clone();
        expected.sort_unstable();
        for count in [1, 7, 500, 1000] {
            let mut buf = original.clone();
            let mode = Mode::ByteSwap;
            mode.apply(&mut buf, count, false, &mut rng).unwrap();
            buf.sort_unstable();
            assert_eq!(buf, expected);
        }
    }

    #[test]
    fn mode_mutator_dispatches_to_mode() {
        let mutator = ModeMutator::new(Mode::Checkerboard).with_sample_view(true);
        let mut rng = ChaCha8Rng::from_seed([6; 32]);
        let mut buf = vec![0x33u8; 2];
        mutator.mutate(&mut buf, 2, &mut rng).unwrap();
        assert_eq!(buf, vec![0xFF, 0x00]);
    }

    #[test]
    fn below_handles_degenerate_bounds() {
        let mut rng = ChaCha8Rng::from_seed([7; 32]);
        assert_eq!(below(&mut rng, 0), 0);
        assert_eq!(below(&mut rng, 1), 0);
        for _ in 0..100 {
            assert!(below(&mut rng, 5) < 5);
        }
    }
}
