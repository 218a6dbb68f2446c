use std::collections::BTreeMap;

use chrono::NaiveDate;
use tokio::sync::oneshot;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::validate::CanonicalReservation;

use super::admission::check_admission;
use super::{Admission, Engine, EngineError, UpdateOutcome, WalCommand};

fn validate_capacity(max_party_size: u32, max_reservations: u32) -> Result<(), EngineError> {
    if max_party_size == 0 {
        return Err(EngineError::InvalidCapacity("max_party_size"));
    }
    if max_reservations == 0 {
        return Err(EngineError::InvalidCapacity("max_reservations"));
    }
    if max_reservations > MAX_SLOT_CAPACITY {
        return Err(EngineError::LimitExceeded("max_reservations too large"));
    }
    Ok(())
}

fn sorted_unique(times: impl IntoIterator<Item = SlotTime>) -> Vec<SlotTime> {
    let mut times: Vec<SlotTime> = times.into_iter().collect();
    times.sort();
    times.dedup();
    times
}

impl Engine {
    /// Insert or replace a slot for every time. Existing reservations are not consulted.
    pub async fn create_inventory(
        &self,
        times: impl IntoIterator<Item = SlotTime>,
        max_party_size: u32,
        max_reservations: u32,
    ) -> Result<(), EngineError> {
        validate_capacity(max_party_size, max_reservations)?;
        let times = sorted_unique(times);
        if times.is_empty() {
            return Ok(());
        }

        let guards = self.slots.write_many(&times).await;
        let count = times.len();
        let event = Event::SlotsDefined { times, max_party_size, max_reservations };
        self.persist_and_apply(guards, event).await?;
        info!("defined {count} slots (max party {max_party_size}, max reservations {max_reservations})");
        Ok(())
    }

    /// Like [`Engine::create_inventory`], but only if no reservation exists on or after `date`.
    ///
    /// Every quarter-hour is write-locked for the duration, so no admission can
    /// slip in between the check and the redefinition.
    pub async fn update_inventory_after_date(
        &self,
        date: NaiveDate,
        times: impl IntoIterator<Item = SlotTime>,
        max_party_size: u32,
        max_reservations: u32,
    ) -> Result<UpdateOutcome, EngineError> {
        validate_capacity(max_party_size, max_reservations)?;
        let times = sorted_unique(times);

        let guards = self.slots.write_all().await;
        if guards.iter().any(|ts| ts.has_reservations_from(date)) {
            debug!("inventory update from {date} refused: reservations exist");
            return Ok(UpdateOutcome::ReservationsExist);
        }
        if times.is_empty() {
            return Ok(UpdateOutcome::Updated);
        }

        // Every guard goes along, so the whole day stays locked until the event is applied.
        let count = times.len();
        let event = Event::SlotsDefined { times, max_party_size, max_reservations };
        self.persist_and_apply(guards, event).await?;
        info!("redefined {count} slots from {date} (max party {max_party_size}, max reservations {max_reservations})");
        Ok(UpdateOutcome::Updated)
    }

    /// Admit a reservation if its slot has room.
    ///
    /// The slot's write lock is held from the capacity read through the WAL
    /// append, so concurrent admissions on one quarter-hour are serialized.
    pub async fn create_reservation(
        &self,
        id: Ulid,
        req: CanonicalReservation,
    ) -> Result<Admission, EngineError> {
        if req.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("name too long"));
        }
        if req.email.len() > MAX_EMAIL_LEN {
            return Err(EngineError::LimitExceeded("email too long"));
        }

        let guard = self.slots.get(req.time).write_owned().await;
        if let Err(rejection) = check_admission(&guard, &req, self.scope) {
            debug!(
                "reservation for {} at {} {} rejected: {}",
                req.email,
                req.date,
                req.time,
                rejection.label()
            );
            metrics::counter!(crate::observability::ADMISSIONS_TOTAL, "outcome" => rejection.label())
                .increment(1);
            return Ok(rejection);
        }
        if guard.reservation_total() >= MAX_RESERVATIONS_PER_TIME {
            return Err(EngineError::LimitExceeded("too many reservations at this time"));
        }

        let event = Event::ReservationAdmitted {
            id,
            name: req.name.clone(),
            email: req.email.clone(),
            party_size: req.party_size,
            date: req.date,
            time: req.time,
        };
        self.persist_and_apply(vec![guard], event).await?;

        info!("admitted reservation {id} for party of {} at {} {}", req.party_size, req.date, req.time);
        metrics::counter!(crate::observability::ADMISSIONS_TOTAL, "outcome" => "admitted").increment(1);
        Ok(Admission::Admitted(Reservation {
            id,
            name: req.name,
            email: req.email,
            party_size: req.party_size,
            date: req.date,
            time: req.time,
        }))
    }

    /// Compact the WAL by rewriting it with only the events needed to recreate the current state.
    ///
    /// Read locks on every quarter-hour are held until the rewrite is done, so no
    /// mutation can be logged against the old file and lost in the swap.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let guards = self.slots.read_all().await;

        // Slots sharing a definition collapse into one event.
        let mut groups: BTreeMap<(u32, u32), Vec<SlotTime>> = BTreeMap::new();
        let mut reservations = Vec::new();
        for ts in &guards {
            if let Some(slot) = ts.slot {
                groups
                    .entry((slot.max_party_size, slot.max_reservations))
                    .or_default()
                    .push(slot.time);
            }
            for r in ts.reservations.values().flatten() {
                reservations.push(Event::ReservationAdmitted {
                    id: r.id,
                    name: r.name.clone(),
                    email: r.email.clone(),
                    party_size: r.party_size,
                    date: r.date,
                    time: r.time,
                });
            }
        }

        let mut events: Vec<Event> = groups
            .into_iter()
            .map(|((max_party_size, max_reservations), times)| Event::SlotsDefined {
                times,
                max_party_size,
                max_reservations,
            })
            .collect();
        events.extend(reservations);
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        drop(guards);

        info!("compacted WAL to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
