//! General-purpose byte modes. None of these know anything about the data they
//! touch; they differ in how the damage is spread.

use super::{below, pick_window, random_byte};
use rand::Rng;

pub(super) fn bitflip<R: Rng + ?Sized>(buf: &mut [u8], count: usize, rng: &mut R) {
    let len = buf.len();
    for _ in 0..count {
        let idx = below(rng, len);
        buf[idx] ^= 1 << below(rng, 8);
    }
}

pub(super) fn byteswap<R: Rng + ?Sized>(buf: &mut [u8], count: usize, rng: &mut R) {
    let len = buf.len();
    for _ in 0..count {
        let a = below(rng, len);
        let b = below(rng, len);
        buf.swap(a, b);
    }
}

pub(super) fn checkerboard<R: Rng + ?Sized>(buf: &mut [u8], count: usize, rng: &mut R) {
    let window = pick_window(rng, buf.len(), count);
    for (i, byte) in buf[window].iter_mut().enumerate() {
        *byte = if i & 1 == 0 { 0xFF } else { 0x00 };
    }
}

pub(super) fn texturevomit<R: Rng + ?Sized>(buf: &mut [u8], count: usize, rng: &mut R) {
    let len = buf.len();
    for _ in 0..count {
        let idx = below(rng, len);
        buf[idx] = random_byte(rng);
    }
}

pub(super) fn everybyte<R: Rng + ?Sized>(buf: &mut [u8], count: usize, rng: &mut R) {
    let window = pick_window(rng, buf.len(), count);
    let magnitude = rng.random_range(1i8..=15);
    let delta = if rng.random_bool(0.5) {
        magnitude
    } else {
        -magnitude
    };
    for byte in &mut buf[window] {
        *byte = byte.wrapping_add_signed(delta);
    }
}

/// Level and map data tends to sit low in the heap, so only the first quarter is
/// eligible.
pub(super) fn worldlevel<R: Rng + ?Sized>(buf: &mut [u8], count: usize, rng: &mut R) {
    let quarter = buf.len() / 4;
    let region_len = if quarter == 0 { buf.len() } else { quarter };
    let window = pick_window(rng, region_len, count);
    for byte in &mut buf[window] {
        let nudge = below(rng, 64) as u8;
        *byte = if *byte < 0x80 {
            byte.wrapping_add(nudge)
        } else {
            byte.wrapping_sub(nudge)
        };
    }
}

pub(super) fn xor<R: Rng + ?Sized>(buf: &mut [u8], count: usize, rng: &mut R) {
    let len = buf.len();
    let mask = random_byte(rng);
    for _ in 0..count {
        let idx = below(rng, len);
        buf[idx] ^= mask;
    }
}

pub(super) fn clusterbytes<R: Rng + ?Sized>(buf: &mut [u8], count: usize, rng: &mut R) {
    let len = buf.len();
    let cluster = (count / 4).max(8);
    let center = below(rng, len);
    let start = center.saturating_sub(cluster / 2);
    let end = (start + cluster).min(len);
    for byte in &mut buf[start..end] {
        *byte ^= 1 << below(rng, 8);
    }
    for _ in 0..count.saturating_sub(end - start) {
        let idx = below(rng, len);
        buf[idx] = random_byte(rng);
    }
}

/// Player stats and flags usually live in the first 64KiB.
pub(super) fn statchanger<R: Rng + ?Sized>(buf: &mut [u8], count: usize, rng: &mut R) {
    let region_len = buf.len().min(0x10000);
    let window = pick_window(rng, region_len, count);
    for byte in &mut buf[window] {
        let mask = (1u8 << below(rng, 3)) | (1u8 << below(rng, 3));
        *byte ^= mask;
    }
}

/// Rotates a window to fake an insertion, then overwrites it with noise that
/// still carries a trace of the original byte.
pub(super) fn byteinject<R: Rng + ?Sized>(buf: &mut [u8], count: usize, rng: &mut R) {
    let len = buf.len();
    let start = len / 4 + below(rng, (len / 2).saturating_sub(count).max(1));
    let end = (start + count).min(len);
    let window = &mut buf[start..end];
    window.rotate_left(inject_rotation(count, window.len()));
    for byte in window.iter_mut() {
        let shift = 1 + below(rng, 3);
        *byte = random_byte(rng) ^ (*byte >> shift);
    }
    for _ in 0..count.saturating_sub(end - start) {
        let idx = below(rng, len);
        buf[idx] = random_byte(rng);
    }
}

/// How far byteinject rotates its window: `count % 7`, at least 1, wrapped to
/// the window.
fn inject_rotation(count: usize, window_len: usize) -> usize {
    if window_len == 0 {
        return 0;
    }
    (count % 7).max(1) % window_len
}
