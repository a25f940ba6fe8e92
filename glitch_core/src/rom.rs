//! ROM image handling: finding the loaded ROM in the virtual filesystem and
//! corrupting it row by row while leaving the boot area alone.

use crate::config::RomSettings;
use crate::governor::SafetyGovernor;
use crate::host::VirtualFs;
use crate::mutator::{Mutator, below};
use log::{debug, warn};
use rand::Rng;

/// Finds the ROM in the filesystem root.
///
/// The first entry with a known extension wins; otherwise the largest file is
/// taken. Dot-files (including `.` and `..`) are ignored. Returns the absolute
/// path, or `None` if nothing usable exists.
pub fn locate_rom(fs: &mut dyn VirtualFs, extensions: &[String]) -> Option<String> {
    // The listing can fail while the host is still mounting; try twice.
    let entries = match fs.readdir("/").or_else(|_| fs.readdir("/")) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to list filesystem root for ROM corruption: {e}");
            return None;
        }
    };
    let files: Vec<String> = entries
        .into_iter()
        .filter(|name| !name.is_empty() && !name.starts_with('.'))
        .collect();
    if files.is_empty() {
        warn!("No files in filesystem root to target for ROM corruption");
        return None;
    }

    if let Some(name) = files.iter().find(|name| has_extension(name, extensions)) {
        return Some(format!("/{name}"));
    }

    let mut largest: Option<(String, u64)> = None;
    for name in &files {
        let path = format!("/{name}");
        match fs.stat(&path) {
            Ok(stat) if stat.size > largest.as_ref().map_or(0, |(_, size)| *size) => {
                largest = Some((path, stat.size));
            }
            Ok(_) => {}
            Err(e) => debug!("Skipping {path}: {e}"),
        }
    }
    let found = largest.map(|(path, _)| path);
    if found.is_none() {
        warn!("No candidate ROM file found for ROM corruption");
    }
    found
}

fn has_extension(name: &str, extensions: &[String]) -> bool {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return false;
    };
    extensions
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
}

/// How a ROM image is split into rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
    pub line_size: usize,
    pub total_lines: usize,
    /// Rows `0..boot_safe_lines` are never mutated.
    pub boot_safe_lines: usize,
}

impl RowLayout {
    pub fn new(rom_len: usize, settings: &RomSettings) -> Self {
        let line_size = settings.line_size.max(1);
        let boot_bytes = settings.boot_safe_bytes.min(rom_len);
        Self {
            line_size,
            total_lines: (rom_len / line_size).max(1),
            boot_safe_lines: (boot_bytes / line_size).max(settings.min_boot_safe_lines),
        }
    }

    /// Rows outside the boot-safe prefix.
    pub fn available_lines(&self) -> usize {
        self.total_lines.saturating_sub(self.boot_safe_lines)
    }

    /// Picks `count` distinct mutable rows, in ascending order. `count` is
    /// clamped to the number of mutable rows.
    pub fn select_rows<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<usize> {
        let available = self.available_lines();
        let amount = count.min(available);
        let mut rows: Vec<usize> = rand::seq::index::sample(rng, available, amount)
            .into_iter()
            .map(|offset| self.boot_safe_lines + offset)
            .collect();
        rows.sort_unstable();
        rows
    }

    /// Mutations applied to each selected row.
    pub fn per_row_count(&self, row_len: usize) -> usize {
        (self.line_size / 2).min(row_len).max(1)
    }
}

/// Corrupts the selected rows of `rom` in place and returns the rows touched.
///
/// The number of rows comes from `governor` relative to the mutable row count.
/// Rows are selected once; each selected row is handed to `mutator` `passes`
/// times, so no row is picked twice in one call. If the mutator refuses a row,
/// the row gets one random bit flipped per byte instead.
pub fn corrupt_rows<M, R>(
    rom: &mut [u8],
    layout: &RowLayout,
    governor: &SafetyGovernor,
    requested: f64,
    passes: usize,
    mutator: &M,
    rng: &mut R,
) -> Vec<usize>
where
    M: Mutator<R>,
    R: Rng + ?Sized,
{
    let available = layout.available_lines();
    if available == 0 {
        warn!(
            "ROM of {} bytes has no rows outside the {}-row boot-safe area",
            rom.len(),
            layout.boot_safe_lines
        );
        return Vec::new();
    }
    let count = governor.safe_count(requested, available).min(available);
    let rows = layout.select_rows(count, rng);
    debug!(
        "Corrupting {} of {} mutable ROM rows ({} bytes each)",
        rows.len(),
        available,
        layout.line_size
    );

    for &row in &rows {
        let start = row * layout.line_size;
        let end = (start + layout.line_size).min(rom.len());
        let slice = &mut rom[start..end];
        let per_row = layout.per_row_count(slice.len());
        for _ in 0..passes.max(1) {
            if let Err(e) = mutator.mutate(slice, per_row, rng) {
                debug!("Row {row}: {e}, scrambling bits instead");
                for byte in slice.iter_mut() {
                    *byte ^= 1 << below(rng, 8);
                }
            }
        }
    }
    rows
}
