// Guest visits and the check-in / check-out state machine

use super::resident::VehicleInfo;
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `scheduled -> arrived -> departed`, with `cancelled` reachable from
/// either non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "visit_status", rename_all = "lowercase")]
pub enum VisitStatus {
    Scheduled,
    Arrived,
    Departed,
    Cancelled,
}

impl VisitStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, VisitStatus::Departed | VisitStatus::Cancelled)
    }

    pub fn check_in(self) -> Result<Self> {
        match self {
            VisitStatus::Scheduled => Ok(VisitStatus::Arrived),
            _ => Err(AppError::InvalidTransition(
                "Guest can only check in from scheduled status".to_string(),
            )),
        }
    }

    pub fn check_out(self) -> Result<Self> {
        match self {
            VisitStatus::Arrived => Ok(VisitStatus::Departed),
            _ => Err(AppError::InvalidTransition(
                "Guest can only check out from arrived status".to_string(),
            )),
        }
    }

    pub fn cancel(self) -> Result<Self> {
        match self {
            VisitStatus::Scheduled | VisitStatus::Arrived => Ok(VisitStatus::Cancelled),
            VisitStatus::Departed => Err(AppError::InvalidTransition(
                "Cannot cancel a completed visit".to_string(),
            )),
            VisitStatus::Cancelled => Err(AppError::InvalidTransition(
                "Visit has already been cancelled".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestVisit {
    pub id: Uuid,
    pub resident_id: Uuid,
    pub guest_code_id: Uuid,
    pub guest_name: String,
    pub visit_date: DateTime<Utc>,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub vehicle_info: Option<VehicleInfo>,
    pub number_of_guests: i32,
    pub purpose: Option<String>,
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub security_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GuestVisit {
    pub fn check_in(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.status = self.status.check_in()?;
        self.check_in_time = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn check_out(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.status = self.status.check_out()?;
        self.check_out_time = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.status = self.status.cancel()?;
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct VisitFilter {
    pub resident_id: Option<Uuid>,
    pub status: Option<VisitStatus>,
}

impl VisitFilter {
    pub fn matches(&self, visit: &GuestVisit) -> bool {
        self.resident_id.map_or(true, |r| visit.resident_id == r)
            && self.status.map_or(true, |s| visit.status == s)
    }
}

/// Projection shown alongside access logs.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VisitSummary {
    pub guest_name: String,
    pub purpose: Option<String>,
}

impl From<&GuestVisit> for VisitSummary {
    fn from(visit: &GuestVisit) -> Self {
        Self {
            guest_name: visit.guest_name.clone(),
            purpose: visit.purpose.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [VisitStatus; 4] = [
        VisitStatus::Scheduled,
        VisitStatus::Arrived,
        VisitStatus::Departed,
        VisitStatus::Cancelled,
    ];

    #[test]
    fn test_check_in_only_from_scheduled() {
        for status in ALL {
            let result = status.check_in();
            if status == VisitStatus::Scheduled {
                assert_eq!(result.unwrap(), VisitStatus::Arrived);
            } else {
                assert!(matches!(result, Err(AppError::InvalidTransition(_))));
            }
        }
    }

    #[test]
    fn test_check_out_only_from_arrived() {
        for status in ALL {
            let result = status.check_out();
            if status == VisitStatus::Arrived {
                assert_eq!(result.unwrap(), VisitStatus::Departed);
            } else {
                assert!(matches!(result, Err(AppError::InvalidTransition(_))));
            }
        }
    }

    #[test]
    fn test_cancel_only_from_non_terminal() {
        for status in ALL {
            let result = status.cancel();
            if status.is_terminal() {
                assert!(matches!(result, Err(AppError::InvalidTransition(_))));
            } else {
                assert_eq!(result.unwrap(), VisitStatus::Cancelled);
            }
        }
    }
}
