//! Parsing and validation of untrusted request fields.
//!
//! Everything here is pure: no storage access, no suspension. Each check
//! returns the first failure it finds, in a fixed order, so error messages are
//! deterministic for a given input.

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;

use crate::limits::MAX_SLOT_CAPACITY;
use crate::model::{SlotRange, SlotTime, SLOT_MINUTES};

// Something, an @, at least one dotted label, then a 2-24 char tail.
static VALID_EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+@(.+\.)+.{2,24}$").expect("valid regex"));
static VALID_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{2}:[0-9]{2}$").expect("valid regex"));
static VALID_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{2}-[0-9]{2}-[0-9]{4}$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyName,
    InvalidEmail,
    InvalidPartySize,
    InvalidDateFormat,
    InvalidCalendarDate(String),
    InvalidTimeFormat(Option<String>),
    NotQuarterHour,
    InvalidMaxPartySize,
    InvalidMaxReservations,
    MaxReservationsTooLarge,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyName => write!(f, "Name must be specified."),
            ValidationError::InvalidEmail => write!(f, "A valid email is required."),
            ValidationError::InvalidPartySize => write!(f, "Party must be at least one person."),
            ValidationError::InvalidDateFormat => {
                write!(f, "Invalid date - The required format is (mm-dd-yyyy).")
            }
            ValidationError::InvalidCalendarDate(cause) => write!(f, "Invalid date: {cause}"),
            ValidationError::InvalidTimeFormat(None) => {
                write!(f, "Invalid time - The required format is (hh:mm).")
            }
            ValidationError::InvalidTimeFormat(Some(cause)) => write!(f, "Invalid time: {cause}"),
            ValidationError::NotQuarterHour => {
                write!(f, "Times must fall on quarter hour intervals.")
            }
            ValidationError::InvalidMaxPartySize => {
                write!(f, "Maximum party size must be at least one.")
            }
            ValidationError::InvalidMaxReservations => {
                write!(f, "Maximum reservations must be at least one.")
            }
            ValidationError::MaxReservationsTooLarge => {
                write!(f, "Maximum reservations must be at most {MAX_SLOT_CAPACITY}.")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Parse `mm-dd-yyyy`.
pub fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    if !VALID_DATE.is_match(s) {
        return Err(ValidationError::InvalidDateFormat);
    }
    NaiveDate::parse_from_str(s, "%m-%d-%Y")
        .map_err(|e| ValidationError::InvalidCalendarDate(format!("{s} ({e})")))
}

/// Parse `hh:mm`, requiring quarter-hour alignment.
pub fn parse_time(s: &str) -> Result<SlotTime, ValidationError> {
    if !VALID_TIME.is_match(s) {
        return Err(ValidationError::InvalidTimeFormat(None));
    }
    // Both halves are exactly two ASCII digits after the regex check.
    let (hour, minute) = s.split_at(2);
    let hour: u32 = hour.parse().map_err(|_| ValidationError::InvalidTimeFormat(None))?;
    let minute: u32 = minute[1..]
        .parse()
        .map_err(|_| ValidationError::InvalidTimeFormat(None))?;

    // Alignment is checked before range, so "12:75" reads as out of range, not misaligned.
    if minute % SLOT_MINUTES as u32 != 0 {
        return Err(ValidationError::NotQuarterHour);
    }
    if hour > 23 {
        return Err(ValidationError::InvalidTimeFormat(Some(format!(
            "{s} (hour {hour} out of range 0-23)"
        ))));
    }
    if minute > 59 {
        return Err(ValidationError::InvalidTimeFormat(Some(format!(
            "{s} (minute {minute} out of range 0-59)"
        ))));
    }
    SlotTime::from_hm(hour, minute).ok_or(ValidationError::InvalidTimeFormat(None))
}

// ── Reservation requests ─────────────────────────────────────────

/// Raw reservation request as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub name: String,
    pub email: String,
    pub party_size: i64,
    /// mm-dd-yyyy
    pub date: String,
    /// hh:mm
    pub time: String,
}

/// A reservation request whose fields have all been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalReservation {
    pub name: String,
    pub email: String,
    pub party_size: u32,
    pub date: NaiveDate,
    pub time: SlotTime,
}

pub fn validate_reservation_request(
    req: &ReservationRequest,
) -> Result<CanonicalReservation, ValidationError> {
    if req.name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if !VALID_EMAIL.is_match(&req.email) {
        return Err(ValidationError::InvalidEmail);
    }
    let party_size = positive(req.party_size).ok_or(ValidationError::InvalidPartySize)?;
    let date = parse_date(&req.date)?;
    let time = parse_time(&req.time)?;

    Ok(CanonicalReservation {
        name: req.name.clone(),
        email: req.email.clone(),
        party_size,
        date,
        time,
    })
}

// ── Inventory requests ───────────────────────────────────────────

/// Raw inventory definition as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRequest {
    /// hh:mm
    pub start_time: String,
    /// hh:mm, exclusive
    pub end_time_exclusive: String,
    pub max_party_size: i64,
    pub max_reservations: i64,
}

/// Raw inventory redefinition that only applies if nothing is booked from `start_date` on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryUpdateRequest {
    /// mm-dd-yyyy
    pub start_date: String,
    #[serde(flatten)]
    pub inventory: InventoryRequest,
}

/// Validated inventory payload shared by both inventory commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventorySpec {
    pub start: SlotTime,
    pub end_exclusive: SlotTime,
    pub max_party_size: u32,
    pub max_reservations: u32,
}

impl InventorySpec {
    /// The quarter-hours this definition covers. Empty if the end is not after the start.
    pub fn times(&self) -> SlotRange {
        SlotRange::new(self.start, self.end_exclusive)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryCommand {
    Create(InventorySpec),
    UpdateAfterDate {
        start_date: NaiveDate,
        spec: InventorySpec,
    },
}

impl InventoryCommand {
    pub fn spec(&self) -> &InventorySpec {
        match self {
            InventoryCommand::Create(spec) | InventoryCommand::UpdateAfterDate { spec, .. } => spec,
        }
    }
}

pub fn validate_inventory_request(req: &InventoryRequest) -> Result<InventorySpec, ValidationError> {
    let max_party_size = positive(req.max_party_size).ok_or(ValidationError::InvalidMaxPartySize)?;
    if req.max_reservations > i64::from(MAX_SLOT_CAPACITY) {
        return Err(ValidationError::MaxReservationsTooLarge);
    }
    let max_reservations =
        positive(req.max_reservations).ok_or(ValidationError::InvalidMaxReservations)?;
    let start = parse_time(&req.start_time)?;
    let end_exclusive = parse_time(&req.end_time_exclusive)?;

    Ok(InventorySpec {
        start,
        end_exclusive,
        max_party_size,
        max_reservations,
    })
}

pub fn validate_inventory_update(
    req: &InventoryUpdateRequest,
) -> Result<InventoryCommand, ValidationError> {
    let start_date = parse_date(&req.start_date)?;
    let spec = validate_inventory_request(&req.inventory)?;
    Ok(InventoryCommand::UpdateAfterDate { start_date, spec })
}

fn positive(n: i64) -> Option<u32> {
    u32::try_from(n).ok().filter(|n| *n >= 1)
}
