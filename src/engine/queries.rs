use chrono::NaiveDate;

use crate::model::*;

use super::admission::remaining_capacity;
use super::Engine;

impl Engine {
    pub async fn get_slot(&self, time: SlotTime) -> Option<Slot> {
        self.slots.get(time).read().await.slot
    }

    /// All defined slots, ordered by time.
    pub async fn list_slots(&self) -> Vec<SlotInfo> {
        let mut slots = Vec::new();
        for index in 0..SLOTS_PER_DAY {
            let Some(time) = SlotTime::from_index(index) else { continue };
            if let Some(slot) = self.get_slot(time).await {
                slots.push(SlotInfo::from(&slot));
            }
        }
        slots
    }

    /// Reservations ordered by date, then time, then id. `None` lists every date.
    pub async fn list_reservations(&self, date: Option<NaiveDate>) -> Vec<ReservationInfo> {
        let mut found: Vec<Reservation> = Vec::new();
        for index in 0..SLOTS_PER_DAY {
            let Some(time) = SlotTime::from_index(index) else { continue };
            let ts = self.slots.get(time);
            let guard = ts.read().await;
            match date {
                Some(d) => found.extend(guard.reservations.get(&d).into_iter().flatten().cloned()),
                None => found.extend(guard.reservations.values().flatten().cloned()),
            }
        }
        found.sort_by(|a, b| (a.date, a.time, a.id).cmp(&(b.date, b.time, b.id)));
        found.iter().map(ReservationInfo::from).collect()
    }

    /// Reservations admitted at exactly `(date, time)`.
    pub async fn reservation_count(&self, date: NaiveDate, time: SlotTime) -> usize {
        self.slots
            .get(time)
            .read()
            .await
            .reservations
            .get(&date)
            .map_or(0, Vec::len)
    }

    /// For every defined slot, how many more reservations it can take on `date`.
    pub async fn availability(&self, date: NaiveDate) -> Vec<SlotAvailability> {
        let mut result = Vec::new();
        for index in 0..SLOTS_PER_DAY {
            let Some(time) = SlotTime::from_index(index) else { continue };
            let ts = self.slots.get(time);
            let guard = ts.read().await;
            if let Some(slot) = guard.slot {
                result.push(SlotAvailability {
                    time: time.to_string(),
                    max_party_size: slot.max_party_size,
                    remaining: remaining_capacity(&guard, &slot, date, self.scope),
                });
            }
        }
        result
    }
}
