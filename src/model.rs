use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Minutes between two adjacent slots.
pub const SLOT_MINUTES: u16 = 15;

/// Number of quarter-hours in a day.
pub const SLOTS_PER_DAY: usize = 96;

/// A quarter-hour aligned time of day, stored as its quarter index (00:00 = 0, 23:45 = 95).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlotTime(u8);

impl TryFrom<u8> for SlotTime {
    type Error = String;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::from_index(index as usize).ok_or_else(|| format!("slot index out of range: {index}"))
    }
}

impl From<SlotTime> for u8 {
    fn from(time: SlotTime) -> u8 {
        time.0
    }
}

impl SlotTime {
    /// Build from hour/minute. `None` unless the minute is quarter-hour aligned and in range.
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if hour > 23 || minute > 59 || minute % SLOT_MINUTES as u32 != 0 {
            return None;
        }
        Some(Self((hour * 4 + minute / SLOT_MINUTES as u32) as u8))
    }

    pub fn from_index(index: usize) -> Option<Self> {
        (index < SLOTS_PER_DAY).then_some(Self(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn hour(self) -> u32 {
        self.0 as u32 / 4
    }

    pub fn minute(self) -> u32 {
        (self.0 as u32 % 4) * SLOT_MINUTES as u32
    }

    /// The next quarter-hour, or `None` past 23:45.
    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// Half-open range of slot times `[start, end_exclusive)`, expanded lazily.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRange {
    next: Option<SlotTime>,
    end_exclusive: SlotTime,
}

impl SlotRange {
    pub fn new(start: SlotTime, end_exclusive: SlotTime) -> Self {
        Self {
            next: Some(start),
            end_exclusive,
        }
    }
}

impl Iterator for SlotRange {
    type Item = SlotTime;

    fn next(&mut self) -> Option<SlotTime> {
        let current = self.next.filter(|t| *t < self.end_exclusive)?;
        self.next = current.next();
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self
            .next
            .map_or(0, |t| self.end_exclusive.index().saturating_sub(t.index()));
        (n, Some(n))
    }
}

impl ExactSizeIterator for SlotRange {}

/// Capacity definition for one quarter-hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub time: SlotTime,
    pub max_party_size: u32,
    pub max_reservations: u32,
}

/// An admitted booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub name: String,
    pub email: String,
    pub party_size: u32,
    pub date: NaiveDate,
    pub time: SlotTime,
}

/// Which reservations count against a slot's `max_reservations`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CapacityScope {
    /// Only reservations sharing the exact `(date, time)`.
    #[default]
    PerDate,
    /// Every reservation at that time of day, whatever the date.
    AllDates,
}

impl std::str::FromStr for CapacityScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_date" | "per-date" => Ok(Self::PerDate),
            "all_dates" | "all-dates" => Ok(Self::AllDates),
            other => Err(format!("unknown capacity scope: {other}")),
        }
    }
}

/// Everything stored for one quarter-hour: its slot definition and the
/// reservations made at that time of day, grouped by date.
#[derive(Debug, Clone)]
pub struct TimeState {
    pub time: SlotTime,
    pub slot: Option<Slot>,
    pub reservations: BTreeMap<NaiveDate, Vec<Reservation>>,
}

impl TimeState {
    pub fn new(time: SlotTime) -> Self {
        Self {
            time,
            slot: None,
            reservations: BTreeMap::new(),
        }
    }

    /// Reservations that count against this slot's capacity for `date`.
    pub fn admitted_count(&self, date: NaiveDate, scope: CapacityScope) -> usize {
        match scope {
            CapacityScope::PerDate => self.reservations.get(&date).map_or(0, Vec::len),
            CapacityScope::AllDates => self.reservations.values().map(Vec::len).sum(),
        }
    }

    /// True if any reservation falls on or after `date`.
    pub fn has_reservations_from(&self, date: NaiveDate) -> bool {
        self.reservations
            .range(date..)
            .any(|(_, day)| !day.is_empty())
    }

    /// Unique-key probe for `(email, date)` at this time.
    pub fn contains_key(&self, email: &str, date: NaiveDate) -> bool {
        self.reservations
            .get(&date)
            .is_some_and(|day| day.iter().any(|r| r.email == email))
    }

    /// Insert a reservation. Fails if `(email, date)` is already taken at this time.
    pub fn insert_reservation(&mut self, reservation: Reservation) -> Result<(), Reservation> {
        if self.contains_key(&reservation.email, reservation.date) {
            return Err(reservation);
        }
        self.reservations
            .entry(reservation.date)
            .or_default()
            .push(reservation);
        Ok(())
    }

    pub fn reservation_total(&self) -> usize {
        self.reservations.values().map(Vec::len).sum()
    }
}

/// The event types. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    SlotsDefined {
        times: Vec<SlotTime>,
        max_party_size: u32,
        max_reservations: u32,
    },
    ReservationAdmitted {
        id: Ulid,
        name: String,
        email: String,
        party_size: u32,
        date: NaiveDate,
        time: SlotTime,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotInfo {
    pub time: String,
    pub max_party_size: u32,
    pub max_reservations: u32,
}

impl From<&Slot> for SlotInfo {
    fn from(slot: &Slot) -> Self {
        Self {
            time: slot.time.to_string(),
            max_party_size: slot.max_party_size,
            max_reservations: slot.max_reservations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationInfo {
    pub id: Ulid,
    pub name: String,
    pub email: String,
    pub party_size: u32,
    pub date: String,
    pub time: String,
}

impl From<&Reservation> for ReservationInfo {
    fn from(r: &Reservation) -> Self {
        Self {
            id: r.id,
            name: r.name.clone(),
            email: r.email.clone(),
            party_size: r.party_size,
            date: r.date.format("%m-%d-%Y").to_string(),
            time: r.time.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailability {
    pub time: String,
    pub max_party_size: u32,
    pub remaining: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(hour: u32, minute: u32) -> SlotTime {
        SlotTime::from_hm(hour, minute).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reservation(email: &str, date: NaiveDate, time: SlotTime) -> Reservation {
        Reservation {
            id: Ulid::new(),
            name: "Guest".into(),
            email: email.into(),
            party_size: 2,
            date,
            time,
        }
    }

    #[test]
    fn slot_time_basics() {
        assert_eq!(t(0, 0).index(), 0);
        assert_eq!(t(23, 45).index(), 95);
        assert_eq!(t(12, 30).to_string(), "12:30");
        assert_eq!(t(7, 15).to_string(), "07:15");
        assert!(t(12, 0) < t(12, 15));
    }

    #[test]
    fn slot_time_rejects_unaligned_and_out_of_range() {
        assert!(SlotTime::from_hm(12, 7).is_none());
        assert!(SlotTime::from_hm(24, 0).is_none());
        assert!(SlotTime::from_hm(12, 60).is_none());
        assert!(SlotTime::from_index(SLOTS_PER_DAY).is_none());
    }

    #[test]
    fn slot_time_next_stops_at_end_of_day() {
        assert_eq!(t(12, 45).next(), Some(t(13, 0)));
        assert_eq!(t(23, 45).next(), None);
    }

    #[test]
    fn range_yields_aligned_times_before_end() {
        let times: Vec<_> = SlotRange::new(t(12, 0), t(13, 0)).collect();
        assert_eq!(times, vec![t(12, 0), t(12, 15), t(12, 30), t(12, 45)]);
    }

    #[test]
    fn range_length_matches_duration() {
        for (start, end) in [((12, 0), (19, 0)), ((0, 0), (23, 45)), ((9, 15), (9, 30))] {
            let (s, e) = (t(start.0, start.1), t(end.0, end.1));
            let range = SlotRange::new(s, e);
            assert_eq!(range.len(), e.index() - s.index());
            assert_eq!(range.count(), e.index() - s.index());
        }
    }

    #[test]
    fn range_empty_when_end_not_after_start() {
        assert_eq!(SlotRange::new(t(12, 0), t(12, 0)).count(), 0);
        assert_eq!(SlotRange::new(t(13, 0), t(12, 0)).count(), 0);
        assert_eq!(SlotRange::new(t(13, 0), t(12, 0)).len(), 0);
    }

    #[test]
    fn capacity_scope_parses() {
        assert_eq!("per_date".parse::<CapacityScope>(), Ok(CapacityScope::PerDate));
        assert_eq!("ALL_DATES".parse::<CapacityScope>(), Ok(CapacityScope::AllDates));
        assert!("weekly".parse::<CapacityScope>().is_err());
    }

    #[test]
    fn time_state_counts_by_scope() {
        let noon = t(12, 0);
        let mut ts = TimeState::new(noon);
        ts.insert_reservation(reservation("a@example.com", date(2024, 10, 30), noon)).unwrap();
        ts.insert_reservation(reservation("b@example.com", date(2024, 10, 30), noon)).unwrap();
        ts.insert_reservation(reservation("c@example.com", date(2024, 10, 31), noon)).unwrap();

        assert_eq!(ts.admitted_count(date(2024, 10, 30), CapacityScope::PerDate), 2);
        assert_eq!(ts.admitted_count(date(2024, 11, 1), CapacityScope::PerDate), 0);
        assert_eq!(ts.admitted_count(date(2024, 11, 1), CapacityScope::AllDates), 3);
        assert_eq!(ts.reservation_total(), 3);
    }

    #[test]
    fn time_state_rejects_duplicate_key() {
        let noon = t(12, 0);
        let mut ts = TimeState::new(noon);
        ts.insert_reservation(reservation("a@example.com", date(2024, 10, 30), noon)).unwrap();
        let dup = ts.insert_reservation(reservation("a@example.com", date(2024, 10, 30), noon));
        assert!(dup.is_err());
        // Same email on another date is a different key
        ts.insert_reservation(reservation("a@example.com", date(2024, 10, 31), noon)).unwrap();
        assert_eq!(ts.reservation_total(), 2);
    }

    #[test]
    fn time_state_future_probe_is_inclusive() {
        let noon = t(12, 0);
        let mut ts = TimeState::new(noon);
        ts.insert_reservation(reservation("a@example.com", date(2024, 10, 30), noon)).unwrap();
        assert!(ts.has_reservations_from(date(2024, 10, 30)));
        assert!(ts.has_reservations_from(date(2024, 1, 1)));
        assert!(!ts.has_reservations_from(date(2024, 10, 31)));
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::ReservationAdmitted {
            id: Ulid::new(),
            name: "Justin Brooks".into(),
            email: "justin@example.com".into(),
            party_size: 4,
            date: date(2024, 10, 30),
            time: t(12, 0),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn slot_time_out_of_range_fails_to_decode() {
        let bytes = bincode::serialize(&200u8).unwrap();
        assert!(bincode::deserialize::<SlotTime>(&bytes).is_err());
        let bytes = bincode::serialize(&t(23, 45)).unwrap();
        assert_eq!(bincode::deserialize::<SlotTime>(&bytes).unwrap(), t(23, 45));
    }
}
