//! Audio-biased modes. Emulator mixing buffers tend to sit in the middle of the
//! heap, so these modes aim there and treat byte pairs as little-endian `i16`
//! samples.

use super::{below, random_byte};
use rand::Rng;

/// A band of the buffer starting at `start_pct` percent, `len_pct` percent long
/// but never shorter than `min_len`, clipped to the buffer.
#[derive(Debug, Clone, Copy)]
struct Band {
    start: usize,
    len: usize,
}

impl Band {
    fn new(buf_len: usize, start_pct: usize, len_pct: usize, min_len: usize) -> Self {
        Self {
            start: buf_len * start_pct / 100,
            len: (buf_len * len_pct / 100).max(min_len),
        }
    }

    fn end(&self, buf_len: usize) -> usize {
        (self.start + self.len).min(buf_len)
    }

    /// A random index inside the band, clamped to the last byte of the buffer.
    fn random_index<R: Rng + ?Sized>(&self, rng: &mut R, buf_len: usize) -> usize {
        (self.start + below(rng, self.len)).min(buf_len - 1)
    }
}

fn read_sample(buf: &[u8], idx: usize) -> i16 {
    let high = buf.get(idx + 1).copied().unwrap_or(0);
    i16::from_le_bytes([buf[idx], high])
}

fn write_sample(buf: &mut [u8], idx: usize, sample: i16) {
    let [low, high] = sample.to_le_bytes();
    buf[idx] = low;
    if let Some(slot) = buf.get_mut(idx + 1) {
        *slot = high;
    }
}

fn swap_nibbles(byte: u8) -> u8 {
    byte.rotate_left(4)
}

fn garble_sample<R: Rng + ?Sized>(sample: i16, low: u8, high: u8, rng: &mut R) -> i16 {
    match below(rng, 4) {
        0 => sample.wrapping_neg(),
        1 => i16::from_le_bytes([swap_nibbles(low), swap_nibbles(high)]),
        2 => {
            // +-15/128, roughly 11%
            let factor = 1.0 + (below(rng, 31) as f64 - 15.0) / 128.0;
            let scaled = (sample as f64 * factor).trunc();
            scaled.clamp(i16::MIN as f64, i16::MAX as f64) as i16
        }
        _ => {
            if below(rng, 3) == 0 {
                0
            } else {
                sample ^ (1 << below(rng, 15))
            }
        }
    }
}

/// Garbles samples in the 35%–65% band. With a 16-bit view the bytes are treated
/// as samples; without one, each touched byte gets its nibbles swapped and its
/// neighbour a single bit flipped.
pub(super) fn bytesoundswap<R: Rng + ?Sized>(
    buf: &mut [u8],
    count: usize,
    sample_view: bool,
    rng: &mut R,
) {
    let len = buf.len();
    let band = Band::new(len, 35, 30, 64);
    let region_start = band.start;
    let region_end = band.end(len);
    let region_len = region_end.saturating_sub(region_start);

    let mut start = region_start + below(rng, count.min(region_len).max(1));
    if start % 2 != 0 {
        start = (start - 1).max(region_start);
    }
    let span = region_end.saturating_sub(start).max(2);

    let mut mutated = 0;
    while mutated < count {
        let idx = start + (mutated * 2) % span;
        if idx + 1 >= len {
            break;
        }
        if sample_view {
            let (low, high) = (buf[idx], buf[idx + 1]);
            let sample = garble_sample(read_sample(buf, idx), low, high, rng);
            write_sample(buf, idx, sample);
        } else {
            buf[idx] = swap_nibbles(buf[idx]) ^ below(rng, 0x1F) as u8;
            buf[idx + 1] ^= 1 << below(rng, 8);
        }
        mutated += 1;
    }

    for _ in mutated..count {
        let idx = (region_start + below(rng, region_len.max(1))).min(len - 1);
        buf[idx] ^= 1 << below(rng, 8);
    }
}

/// Phase flips, dropouts and light noise across a burst of samples in the
/// 30%–70% band.
pub(super) fn audioglitch<R: Rng + ?Sized>(buf: &mut [u8], count: usize, rng: &mut R) {
    let len = buf.len();
    let band = Band::new(len, 30, 40, 128);
    let start = band.random_index(rng, len);
    let end = (start + (count * 2).max(32)).min(len);

    let mut budget = count;
    for idx in (start..end).step_by(2) {
        if budget == 0 {
            break;
        }
        let sample = read_sample(buf, idx);
        let sample = match below(rng, 3) {
            0 => sample.wrapping_neg(),
            1 => 0,
            _ => sample ^ (1 << below(rng, 12)),
        };
        write_sample(buf, idx, sample);
        budget -= 1;
    }

    for _ in 0..budget {
        let idx = band.random_index(rng, len);
        buf[idx] = random_byte(rng);
    }
}

/// Smears short runs of bytes, then overwrites the window with loud, partly
/// correlated noise and the occasional hard clip.
pub(super) fn audioinject<R: Rng + ?Sized>(buf: &mut [u8], count: usize, rng: &mut R) {
    let len = buf.len();
    let band = Band::new(len, 35, 30, 64);
    let slack = band.len.saturating_sub(count).max(1);
    let start = (band.start + below(rng, slack)).min(len - 1);
    let end = (start + count.max(8)).min(len);

    let shift = (count % 5).max(1);
    for _ in 0..shift {
        let mut idx = start;
        while idx + shift < end {
            buf[idx] = buf[idx + shift];
            idx += shift;
        }
        if end >= start + shift {
            buf[end - 1] = random_byte(rng);
        }
    }

    for idx in (start..end).step_by(2) {
        if rng.random_bool(0.12) {
            buf[idx] = 0xFF;
            if let Some(next) = buf.get_mut(idx + 1) {
                *next = 0x7F;
            }
        } else {
            let shift = 1 + below(rng, 3);
            buf[idx] = random_byte(rng) ^ (buf[idx] >> shift);
        }
    }

    for _ in 0..count.saturating_sub(end - start) {
        let idx = below(rng, len);
        buf[idx] = random_byte(rng);
    }
}
