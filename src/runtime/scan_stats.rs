//! Counters for full byte scans performed by the rope engine.
//!
//! Counters are per thread so concurrent tests observe only their own work.

use std::cell::Cell;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub code_range_scans: usize,
    pub character_length_scans: usize,
    pub flattens: usize,
}

thread_local! {
    static CODE_RANGE_SCANS: Cell<usize> = const { Cell::new(0) };
    static CHARACTER_LENGTH_SCANS: Cell<usize> = const { Cell::new(0) };
    static FLATTENS: Cell<usize> = const { Cell::new(0) };
}

fn bump(counter: &'static std::thread::LocalKey<Cell<usize>>) {
    counter.with(|c| c.set(c.get() + 1));
}

pub fn record_code_range_scan() {
    bump(&CODE_RANGE_SCANS);
}

pub fn record_character_length_scan() {
    bump(&CHARACTER_LENGTH_SCANS);
}

pub fn record_flatten() {
    bump(&FLATTENS);
}

pub fn snapshot() -> ScanStats {
    ScanStats {
        code_range_scans: CODE_RANGE_SCANS.with(Cell::get),
        character_length_scans: CHARACTER_LENGTH_SCANS.with(Cell::get),
        flattens: FLATTENS.with(Cell::get),
    }
}

pub fn reset() {
    CODE_RANGE_SCANS.with(|c| c.set(0));
    CHARACTER_LENGTH_SCANS.with(|c| c.set(0));
    FLATTENS.with(|c| c.set(0));
}
