use chrono::NaiveDate;

use crate::model::*;
use crate::validate::CanonicalReservation;

use super::Admission;

/// Decide whether `req` may be admitted against `ts`. Caller holds the write lock.
///
/// Checks run in a fixed order: slot existence and party size, then capacity,
/// then the `(email, date, time)` unique key. `Err` carries the rejection.
pub(crate) fn check_admission(
    ts: &TimeState,
    req: &CanonicalReservation,
    scope: CapacityScope,
) -> Result<Slot, Admission> {
    let slot = match ts.slot {
        Some(slot) if slot.max_party_size >= req.party_size => slot,
        _ => return Err(Admission::NoInventoryForPartySize),
    };

    if ts.admitted_count(req.date, scope) >= slot.max_reservations as usize {
        return Err(Admission::InventoryAtCapacity);
    }

    if ts.contains_key(&req.email, req.date) {
        return Err(Admission::ConstraintViolated);
    }

    Ok(slot)
}

/// How many more reservations `slot` can take on `date`.
pub(crate) fn remaining_capacity(
    ts: &TimeState,
    slot: &Slot,
    date: NaiveDate,
    scope: CapacityScope,
) -> u32 {
    let taken = u32::try_from(ts.admitted_count(date, scope)).unwrap_or(u32::MAX);
    slot.max_reservations.saturating_sub(taken)
}
