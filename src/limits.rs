/// Column widths carried over from the reservation table.
pub const MAX_NAME_LEN: usize = 70;
pub const MAX_EMAIL_LEN: usize = 50;

/// Upper bound on stored reservations for one quarter-hour, across all dates.
pub const MAX_RESERVATIONS_PER_TIME: usize = 1_000_000;

/// Upper bound on a single slot's reservation capacity.
pub const MAX_SLOT_CAPACITY: u32 = 100_000;
