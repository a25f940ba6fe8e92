pub mod config;
pub mod corruptor;
pub mod disk;
pub mod governor;
pub mod host;
pub mod logging;
pub mod mutator;
pub mod region;
pub mod rom;
pub mod target;
pub mod ticker;

pub use config::GlitchConfig;
pub use corruptor::{
    CorruptOptions, CorruptRequest, Corruptor, Outcome, PendingReload, RestartToken, RomFinalize,
    RomReport,
};
pub use disk::{DirFs, DiskSession};
pub use governor::SafetyGovernor;
pub use host::{FileStat, Host, HostError, MemoryView, SessionManager, VirtualFs};
pub use mutator::{Mode, ModeMutator, MutationError, Mutator};
pub use target::Target;
pub use ticker::{ActiveCorruption, Tick};
