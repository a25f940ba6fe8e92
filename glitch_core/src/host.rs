use thiserror::Error;

/// Errors reported by host capabilities.
///
/// None of these ever reach the caller of `Corruptor::corrupt`; the orchestrator
/// logs them and falls back to the next pathway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The host does not provide the requested operation.
    #[error("host does not support {0}")]
    Unsupported(&'static str),
    /// A filesystem or transport failure.
    #[error("host I/O error: {0}")]
    Io(String),
    /// The host refused the operation (e.g. a state blob it could not parse).
    #[error("host rejected {op}: {reason}")]
    Rejected { op: &'static str, reason: String },
    /// The operation succeeded but produced no bytes.
    #[error("host returned an empty buffer for {0}")]
    Empty(&'static str),
}

impl From<std::io::Error> for HostError {
    fn from(err: std::io::Error) -> Self {
        HostError::Io(err.to_string())
    }
}

/// Access to the running machine's linear memory.
///
/// Linear memory can be reallocated when it grows, so implementations must hand
/// back a view of the *current* memory on every call. The returned slice borrows
/// the accessor, which keeps callers from holding it across calls.
pub trait MemoryView {
    /// A byte view over the module heap (`HEAPU8` in emscripten builds).
    fn heap_view(&mut self) -> Result<&mut [u8], HostError> {
        Err(HostError::Unsupported("heap view"))
    }

    /// The raw memory buffer backing the heap, for builds that only expose that.
    fn memory_buffer(&mut self) -> Result<&mut [u8], HostError> {
        Err(HostError::Unsupported("memory buffer"))
    }

    /// Whether the host also exposes a 16-bit sample view of the same memory.
    fn has_sample_view(&self) -> bool {
        false
    }
}

/// Size information returned by [`VirtualFs::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
}

/// The emulator's virtual filesystem, where the loaded ROM lives.
pub trait VirtualFs {
    fn readdir(&mut self, path: &str) -> Result<Vec<String>, HostError>;
    fn stat(&mut self, path: &str) -> Result<FileStat, HostError>;
    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, HostError>;
    fn write_file(&mut self, path: &str, data: &[u8]) -> Result<(), HostError>;
    fn unlink(&mut self, path: &str) -> Result<(), HostError>;
}

/// The emulator's game/session manager.
///
/// Every operation is optional. The defaults describe a host that supports none
/// of them, so an implementation only overrides what it really has.
pub trait SessionManager {
    /// True when both [`get_state`](Self::get_state) and
    /// [`load_state`](Self::load_state) are available.
    fn can_snapshot(&self) -> bool {
        false
    }

    /// Serializes the current machine state. `Ok(None)` means the host had
    /// nothing to give (no game loaded yet).
    fn get_state(&mut self) -> Result<Option<Vec<u8>>, HostError> {
        Err(HostError::Unsupported("get_state"))
    }

    fn load_state(&mut self, _state: &[u8]) -> Result<(), HostError> {
        Err(HostError::Unsupported("load_state"))
    }

    fn can_restart(&self) -> bool {
        false
    }

    fn restart(&mut self) -> Result<(), HostError> {
        Err(HostError::Unsupported("restart"))
    }

    fn filesystem(&mut self) -> Option<&mut dyn VirtualFs> {
        None
    }
}

/// The capabilities a host offers for one corruption call.
///
/// Either side may be missing; the orchestrator degrades accordingly.
#[derive(Default)]
pub struct Host<'a> {
    pub memory: Option<&'a mut dyn MemoryView>,
    pub session: Option<&'a mut dyn SessionManager>,
}

impl<'a> Host<'a> {
    /// A host with no capabilities at all.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_memory(mut self, memory: &'a mut dyn MemoryView) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_session(mut self, session: &'a mut dyn SessionManager) -> Self {
        self.session = Some(session);
        self
    }
}
