//! Finds the bytes a corruption call operates on.

use crate::host::{HostError, MemoryView, SessionManager};
use log::{debug, warn};

/// Reads a private copy of the machine state through the session manager.
///
/// Returns `None` (after logging why) when the session has no snapshot API,
/// the read fails, or the state is empty. Callers treat `None` as "use the next
/// pathway".
pub fn read_snapshot(session: &mut dyn SessionManager, purpose: &str) -> Option<Vec<u8>> {
    if !session.can_snapshot() {
        debug!("{purpose}: session has no snapshot API");
        return None;
    }
    match session.get_state() {
        Ok(Some(state)) if !state.is_empty() => {
            debug!("{purpose}: snapshot of {} bytes", state.len());
            Some(state)
        }
        Ok(_) => {
            warn!("{purpose}: session returned an empty snapshot");
            None
        }
        Err(e) => {
            warn!("{purpose}: failed to read state: {e}");
            None
        }
    }
}

/// Acquires a fresh view of live linear memory, preferring the heap view and
/// falling back to the raw memory buffer.
///
/// The slice is tied to the `&mut` borrow of `memory`, so it cannot outlive the
/// current call and be used after the memory grows.
pub fn live_view<'m>(memory: &'m mut dyn MemoryView, purpose: &str) -> Option<&'m mut [u8]> {
    let heap_usable = match memory.heap_view() {
        Ok(view) if !view.is_empty() => true,
        Ok(_) => {
            warn!("{purpose}: heap view is empty, trying raw memory buffer");
            false
        }
        Err(HostError::Unsupported(_)) => false,
        Err(e) => {
            warn!("{purpose}: heap view unavailable ({e}), trying raw memory buffer");
            false
        }
    };
    if heap_usable {
        return memory.heap_view().ok();
    }

    match memory.memory_buffer() {
        Ok(view) if !view.is_empty() => Some(view),
        Ok(_) => {
            warn!("{purpose}: live memory is empty");
            None
        }
        Err(HostError::Unsupported(_)) => {
            debug!("{purpose}: host exposes no live memory");
            None
        }
        Err(e) => {
            warn!("{purpose}: failed to create a live memory view: {e}");
            None
        }
    }
}
