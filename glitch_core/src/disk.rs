//! A host backed by the local filesystem: a directory stands in for the
//! emulator's virtual filesystem and a save-state file for the session.

use crate::host::{FileStat, HostError, SessionManager, VirtualFs};
use log::debug;
use std::fs;
use std::path::PathBuf;

/// A [`VirtualFs`] rooted at a local directory. Paths are interpreted relative
/// to the root; `..` components are rejected.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, HostError> {
        let relative = path.trim_start_matches('/');
        if relative.split('/').any(|part| part == "..") {
            return Err(HostError::Rejected {
                op: "path",
                reason: format!("{path} escapes the filesystem root"),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl VirtualFs for DirFs {
    fn readdir(&mut self, path: &str) -> Result<Vec<String>, HostError> {
        let dir = self.resolve(path)?;
        let mut names = vec![".".to_string(), "..".to_string()];
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        // read_dir order is platform dependent
        names[2..].sort();
        Ok(names)
    }

    fn stat(&mut self, path: &str) -> Result<FileStat, HostError> {
        let meta = fs::metadata(self.resolve(path)?)?;
        Ok(FileStat { size: meta.len() })
    }

    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, HostError> {
        Ok(fs::read(self.resolve(path)?)?)
    }

    fn write_file(&mut self, path: &str, data: &[u8]) -> Result<(), HostError> {
        Ok(fs::write(self.resolve(path)?, data)?)
    }

    fn unlink(&mut self, path: &str) -> Result<(), HostError> {
        Ok(fs::remove_file(self.resolve(path)?)?)
    }
}

/// A [`SessionManager`] whose machine state is a save-state file.
///
/// `get_state` reads `input`; `load_state` writes `output`. It cannot restart,
/// so snapshot corruptions complete in place and ROM corruptions ask the
/// caller to reload.
#[derive(Debug)]
pub struct DiskSession {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    fs: Option<DirFs>,
}

impl DiskSession {
    pub fn state_files(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: Some(input.into()),
            output: Some(output.into()),
            fs: None,
        }
    }

    pub fn rom_dir(root: impl Into<PathBuf>) -> Self {
        Self {
            input: None,
            output: None,
            fs: Some(DirFs::new(root)),
        }
    }
}

impl SessionManager for DiskSession {
    fn can_snapshot(&self) -> bool {
        self.input.is_some() && self.output.is_some()
    }

    fn get_state(&mut self) -> Result<Option<Vec<u8>>, HostError> {
        let input = self
            .input
            .as_ref()
            .ok_or(HostError::Unsupported("get_state"))?;
        let state = fs::read(input)?;
        debug!(
            "Read {} bytes of state from {}",
            state.len(),
            input.display()
        );
        Ok(Some(state))
    }

    fn load_state(&mut self, state: &[u8]) -> Result<(), HostError> {
        let output = self
            .output
            .as_ref()
            .ok_or(HostError::Unsupported("load_state"))?;
        fs::write(output, state)?;
        debug!(
            "Wrote {} bytes of state to {}",
            state.len(),
            output.display()
        );
        Ok(())
    }

    fn filesystem(&mut self) -> Option<&mut dyn VirtualFs> {
        self.fs.as_mut().map(|fs| fs as &mut dyn VirtualFs)
    }
}
