use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Active,
    Pending,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "active",
            ReservationStatus::Pending => "pending",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationStatus::Completed | ReservationStatus::Cancelled)
    }

    pub fn can_transition(self, to: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, to),
            (Pending, Active) | (Pending, Cancelled) | (Active, Completed) | (Active, Cancelled)
        )
    }

    pub fn transition(self, to: ReservationStatus) -> Result<ReservationStatus, EngineError> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(EngineError::InvalidReservationTransition { from: self, to })
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(ReservationStatus::Active),
            "pending" => Ok(ReservationStatus::Pending),
            "completed" => Ok(ReservationStatus::Completed),
            "cancelled" | "canceled" => Ok(ReservationStatus::Cancelled),
            _ => Err(EngineError::Parse { what: "reservation status", value: s.to_string() }),
        }
    }
}

/// A time-bounded claim on a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub cell_id: String,
    /// "Tank 1 > Rack 2 > Box 3"
    pub location: String,
    pub reserved_by: String,
    pub reserved_for: String,
    pub start_date: NaiveDate,
    /// None = open-ended
    pub end_date: Option<NaiveDate>,
    pub status: ReservationStatus,
    pub comment: String,
}

impl Reservation {
    pub fn set_status(&mut self, to: ReservationStatus) -> Result<(), EngineError> {
        self.status = self.status.transition(to)?;
        Ok(())
    }
}

/// Status filter; `All` is the "no filter" sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ReservationStatus),
}

impl FromStr for StatusFilter {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        s.parse::<ReservationStatus>().map(StatusFilter::Only)
    }
}

/// Reservations page filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationQuery {
    /// Case-insensitive; matched against id, cell id, requester and purpose
    pub search: String,
    pub status: StatusFilter,
}

impl ReservationQuery {
    pub fn matches(&self, r: &Reservation) -> bool {
        let needle = self.search.to_lowercase();
        let matches_search = [&r.id, &r.cell_id, &r.reserved_by, &r.reserved_for]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle));
        let matches_status = match self.status {
            StatusFilter::All => true,
            StatusFilter::Only(status) => r.status == status,
        };
        matches_search && matches_status
    }
}

pub fn filter_reservations<'a>(reservations: &'a [Reservation], query: &ReservationQuery) -> Vec<&'a Reservation> {
    reservations.iter().filter(|r| query.matches(r)).collect()
}

/// Header counts of the reservations page, over the unfiltered list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReservationStats {
    pub total: usize,
    pub active: usize,
    pub pending: usize,
    pub completed: usize,
}

pub fn reservation_stats(reservations: &[Reservation]) -> ReservationStats {
    let mut stats = ReservationStats { total: reservations.len(), ..Default::default() };
    for r in reservations {
        match r.status {
            ReservationStatus::Active => stats.active += 1,
            ReservationStatus::Pending => stats.pending += 1,
            ReservationStatus::Completed => stats.completed += 1,
            ReservationStatus::Cancelled => {}
        }
    }
    stats
}
