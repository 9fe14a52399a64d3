//! Point-in-time counters for the native bridge.

use serde::Serialize;

use crate::runtime::scan_stats::ScanStats;

use super::wrapper_manager::HandleTableStats;

/// Snapshot of the bridge and the rope engine, taken by
/// [`BridgeContext::stats`](super::BridgeContext::stats).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    pub handles: HandleTableStats,
    pub markers: usize,
    pub marker_runs: u64,
    pub marking_pending: bool,
    pub pending_finalizers: usize,
    pub total_finalized: usize,
    pub symbols: usize,
    /// Scan counters of the thread that took the snapshot.
    pub scans: ScanStats,
}

impl BridgeStats {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Formatted report of all counters.
    pub fn report(&self) -> String {
        let mut out = String::from("=== Handle Table ===\n");
        row(&mut out, "Live wrappers", self.handles.live_wrappers);
        row(&mut out, "Live handles", self.handles.live_handles);
        row(&mut out, "Blocks", self.handles.blocks);
        row(&mut out, "Free blocks", self.handles.free_blocks);
        row(&mut out, "Handle allocations", self.handles.total_handle_allocations);
        out.push('\n');

        out.push_str("=== Marking ===\n");
        row(&mut out, "Markers", self.markers);
        row(&mut out, "Marker runs", self.marker_runs);
        row(&mut out, "Pending", if self.marking_pending { "yes" } else { "no" });
        row(&mut out, "Pending finalizers", self.pending_finalizers);
        row(&mut out, "Finalized", self.total_finalized);
        out.push('\n');

        out.push_str("=== Rope Scans ===\n");
        out.push_str(&format!("{:<24} {:>10}\n", "Kind", "Count"));
        out.push_str(&"-".repeat(35));
        out.push('\n');
        row(&mut out, "Code range", self.scans.code_range_scans);
        row(&mut out, "Character length", self.scans.character_length_scans);
        row(&mut out, "Flatten", self.scans.flattens);
        out.push_str(&"-".repeat(35));
        out.push('\n');
        row(&mut out, "Symbols", self.symbols);
        out
    }
}

fn row(out: &mut String, label: &str, value: impl std::fmt::Display) {
    out.push_str(&format!("{:<24} {:>10}\n", label, value));
}
