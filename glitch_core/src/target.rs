use crate::mutator::Mode;
use serde::Serialize;
use std::fmt;

/// Which class of buffer a corruption call addresses, and therefore how the
/// result is made visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Snapshot-and-reload when possible, live linear memory otherwise.
    #[default]
    Ram,
    /// Snapshot only; CPU registers have no live-memory counterpart.
    Cpu,
    /// Like `Ram`, restricted to audio-aware modes.
    Audio,
    /// The ROM file in the emulator's virtual filesystem.
    Rom,
}

const AUDIO_MODES: [Mode; 4] = [
    Mode::AudioGlitch,
    Mode::AudioInject,
    Mode::ByteSoundSwap,
    Mode::TextureVomit,
];

impl Target {
    pub const ALL: [Target; 4] = [Target::Ram, Target::Cpu, Target::Audio, Target::Rom];

    /// Parses a target name the way the UI sends it. Anything unrecognised,
    /// including a missing value, is `Ram`.
    pub fn parse_lenient(name: Option<&str>) -> Self {
        let Some(name) = name else {
            return Target::Ram;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "cpu" => Target::Cpu,
            "audio" => Target::Audio,
            "rom" | "romfile" | "rom (on-disk)" => Target::Rom,
            _ => Target::Ram,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Target::Ram => "ram",
            Target::Cpu => "cpu",
            Target::Audio => "audio",
            Target::Rom => "rom",
        }
    }

    /// The mode used when the requested one is unknown or not allowed here.
    pub fn fallback_mode(self) -> Mode {
        match self {
            Target::Ram | Target::Cpu => Mode::BitFlip,
            Target::Audio => Mode::ByteSoundSwap,
            Target::Rom => Mode::ByteInject,
        }
    }

    pub fn allows(self, mode: Mode) -> bool {
        match self {
            Target::Audio => AUDIO_MODES.contains(&mode),
            Target::Ram | Target::Cpu | Target::Rom => true,
        }
    }

    /// Modes this target accepts, in catalog order.
    pub fn modes(self) -> Vec<Mode> {
        Mode::ALL
            .into_iter()
            .filter(|mode| self.allows(*mode))
            .collect()
    }

    /// Maps a requested mode name to the mode that will actually run.
    pub fn resolve_mode(self, requested: &str) -> Mode {
        match requested.parse::<Mode>() {
            Ok(mode) if self.allows(mode) => mode,
            Ok(mode) => {
                log::debug!(
                    "{mode} is not an {self} mode, using {}",
                    self.fallback_mode()
                );
                self.fallback_mode()
            }
            Err(e) => {
                log::debug!("{e}, using {}", self.fallback_mode());
                self.fallback_mode()
            }
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
