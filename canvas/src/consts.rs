//! Shared numeric constants for the canvas crate.

// ── Viewport ────────────────────────────────────────────────────

/// Smallest allowed zoom scale.
pub const MIN_SCALE: f64 = 0.1;

/// Largest allowed zoom scale.
pub const MAX_SCALE: f64 = 3.0;

/// Multiplicative zoom step applied per wheel event.
pub const WHEEL_ZOOM_STEP: f64 = 1.1;

/// Idle time after the last wheel event before the live transform is committed.
pub const WHEEL_IDLE_MS: f64 = 150.0;

/// Duration of animated view transitions (re-center, focus).
pub const VIEW_ANIMATION_MS: f64 = 320.0;

/// Fraction of the visible area a focused entity fills.
pub const FOCUS_FILL: f64 = 0.9;

// ── Selection ───────────────────────────────────────────────────

/// A marquee must exceed this screen-space area (5×5 px) to change the selection.
pub const MARQUEE_MIN_AREA_PX: f64 = 25.0;

// ── Placement ───────────────────────────────────────────────────

/// Canvas-space origin of the placement grid.
pub const PLACEMENT_ORIGIN_X: f64 = 100.0;

/// Canvas-space origin of the placement grid.
pub const PLACEMENT_ORIGIN_Y: f64 = 100.0;

/// Gap kept around every placed box.
pub const PLACEMENT_PADDING: f64 = 20.0;

/// Columns scanned before wrapping to the next row.
pub const PLACEMENT_COLUMNS: usize = 4;

/// Rows scanned before falling back to appending.
pub const PLACEMENT_ROWS: usize = 10;

// ── History ─────────────────────────────────────────────────────

/// Default number of undo records kept.
pub const UNDO_CAPACITY: usize = 50;

// ── Image loading ───────────────────────────────────────────────

/// Screen-space margin around the viewport inside which entities count as visible.
pub const PREFETCH_MARGIN_PX: f64 = 256.0;
