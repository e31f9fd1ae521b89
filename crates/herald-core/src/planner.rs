use std::iter::Rev;
use std::ops::RangeInclusive;

/// Inclusive-from, exclusive-to range of build numbers scanned newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    /// Newest build to inspect (the remote's last build at cycle start).
    pub from: u64,
    /// Scanning stops before reaching this number.
    pub floor: u64,
}

impl ScanRange {
    pub const EMPTY: ScanRange = ScanRange { from: 0, floor: 0 };

    pub fn is_empty(&self) -> bool {
        self.from <= self.floor
    }

    pub fn len(&self) -> u64 {
        self.from.saturating_sub(self.floor)
    }

    /// Build numbers to inspect, strictly descending.
    pub fn numbers(&self) -> Rev<RangeInclusive<u64>> {
        (self.floor.saturating_add(1)..=self.from).rev()
    }

    /// Number recorded as checked once the range has been fully handled.
    pub fn checked_mark(&self) -> u64 {
        self.from
    }
}

/// Plan which builds to inspect this cycle.
///
/// Scans from `remote_last` down to, but not including,
/// `max(last_checked, remote_first - 1)`. Without a known last build the
/// range is empty.
pub fn plan_range(
    last_checked: u64,
    remote_last: Option<u64>,
    remote_first: Option<u64>,
) -> ScanRange {
    let Some(from) = remote_last else {
        return ScanRange::EMPTY;
    };
    let retained_floor = remote_first.map(|f| f.saturating_sub(1)).unwrap_or(0);
    ScanRange {
        from,
        floor: last_checked.max(retained_floor),
    }
}
