/// Read-only queries over a loaded snapshot.
///
/// `metrics` answers speed, compliance and time-window questions against the
/// cleansed (or raw) table; `runs` finds stretches of consecutive bad rows.

pub mod metrics;
pub mod runs;
