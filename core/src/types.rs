//! Shared primitive types used across the monitor.

/// 1-based row position in the record store. Row 1 is the header row,
/// so the first account lives at row 2.
pub type RowNumber = u32;

/// First data row of a store that carries a header row.
pub const FIRST_DATA_ROW: RowNumber = 2;

/// Identifier for one Cycle Controller pass.
pub type CycleId = String;
