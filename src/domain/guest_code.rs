// Guest codes: time- and use-bounded credentials issued by residents

use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PIN_MIN: u32 = 100_000;
pub const PIN_MAX: u32 = 999_999;
/// Random bytes behind a QR code; rendered as twice as many hex characters.
pub const QR_RANDOM_BYTES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "guest_code_type")]
pub enum GuestCodeType {
    #[serde(rename = "QR")]
    #[sqlx(rename = "QR")]
    Qr,
    #[serde(rename = "PIN")]
    #[sqlx(rename = "PIN")]
    Pin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "guest_code_status", rename_all = "lowercase")]
pub enum GuestCodeStatus {
    Active,
    Used,
    Expired,
    Revoked,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GuestCode {
    pub id: Uuid,
    pub code: String,
    pub code_type: GuestCodeType,
    pub resident_id: Uuid,
    pub guest_name: String,
    pub purpose: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub status: GuestCodeStatus,
    pub used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub usage_count: i32,
    pub max_usage: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GuestCode {
    /// A code is usable iff it is active, `now` lies within the validity
    /// window (inclusive) and uses remain.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == GuestCodeStatus::Active
            && now >= self.valid_from
            && now <= self.valid_until
            && self.usage_count < self.max_usage
    }

    /// Status as it should be reported at `now`: an active code past its
    /// window reads as expired even if the stored row has not caught up.
    pub fn effective_status(&self, now: DateTime<Utc>) -> GuestCodeStatus {
        if self.status == GuestCodeStatus::Active && now > self.valid_until {
            GuestCodeStatus::Expired
        } else {
            self.status
        }
    }

    /// Copy with the status replaced by [`effective_status`](Self::effective_status).
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.status = self.effective_status(now);
        self
    }

    /// Consume one use. Fails without mutating if the code is not usable.
    pub fn record_use(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.is_usable(now) {
            return Err(self.unusable_reason(now));
        }
        self.usage_count += 1;
        self.used_at = Some(now);
        if self.usage_count >= self.max_usage {
            self.status = GuestCodeStatus::Used;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Why a code cannot be used at `now`. Spent codes read the same as
    /// unknown ones: only active codes are ever looked up at the gate.
    pub fn unusable_reason(&self, now: DateTime<Utc>) -> AppError {
        match self.effective_status(now) {
            GuestCodeStatus::Revoked | GuestCodeStatus::Used => AppError::NotFound("Guest code"),
            GuestCodeStatus::Expired => AppError::GuestCodeExpired,
            GuestCodeStatus::Active if now < self.valid_from => AppError::GuestCodeExpired,
            GuestCodeStatus::Active if self.usage_count >= self.max_usage => {
                AppError::NotFound("Guest code")
            }
            GuestCodeStatus::Active => AppError::Internal("Guest code is usable".to_string()),
        }
    }

    /// Terminal revocation by the owner or an administrator.
    pub fn revoke(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status == GuestCodeStatus::Revoked {
            return Err(AppError::InvalidTransition(
                "Guest code has already been revoked".to_string(),
            ));
        }
        self.status = GuestCodeStatus::Revoked;
        self.revoked_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

/// Produce one candidate code of the given type. Uniqueness is the caller's job.
pub fn generate_candidate(code_type: GuestCodeType, qr_prefix: &str) -> String {
    match code_type {
        GuestCodeType::Pin => rand::thread_rng().gen_range(PIN_MIN..=PIN_MAX).to_string(),
        GuestCodeType::Qr => {
            let mut bytes = [0u8; QR_RANDOM_BYTES];
            OsRng.fill_bytes(&mut bytes);
            let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
            format!("{}{}", qr_prefix, hex)
        }
    }
}

/// Projection shown alongside access logs.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GuestCodeSummary {
    pub guest_name: String,
    pub code_type: GuestCodeType,
}

impl From<&GuestCode> for GuestCodeSummary {
    fn from(code: &GuestCode) -> Self {
        Self {
            guest_name: code.guest_name.clone(),
            code_type: code.code_type,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_code(
    status: GuestCodeStatus,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    usage_count: i32,
    max_usage: i32,
) -> GuestCode {
    let now = Utc::now();
    GuestCode {
        id: Uuid::new_v4(),
        code: "123456".to_string(),
        code_type: GuestCodeType::Pin,
        resident_id: Uuid::new_v4(),
        guest_name: "Guest".to_string(),
        purpose: None,
        valid_from,
        valid_until,
        status,
        used_at: None,
        revoked_at: None,
        usage_count,
        max_usage,
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_pin_codes_are_six_digits_in_range() {
        for _ in 0..500 {
            let code = generate_candidate(GuestCodeType::Pin, "QR_");
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap();
            assert!((PIN_MIN..=PIN_MAX).contains(&value));
        }
    }

    #[test]
    fn test_qr_codes_are_prefixed_upper_hex() {
        for _ in 0..200 {
            let code = generate_candidate(GuestCodeType::Qr, "QR_");
            let hex = code.strip_prefix("QR_").expect("prefix");
            assert_eq!(hex.len(), 16);
            assert!(hex
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        }
    }

    #[test]
    fn test_usable_iff_all_conditions_hold() {
        let now = Utc::now();
        let windows = [
            (now - Duration::hours(1), now + Duration::hours(1), true),
            (now + Duration::hours(1), now + Duration::hours(2), false),
            (now - Duration::hours(2), now - Duration::hours(1), false),
        ];
        let statuses = [
            GuestCodeStatus::Active,
            GuestCodeStatus::Used,
            GuestCodeStatus::Expired,
            GuestCodeStatus::Revoked,
        ];
        let usages = [(0, 1, true), (1, 1, false), (2, 3, true), (3, 3, false)];

        for status in statuses {
            for (from, until, in_window) in windows {
                for (count, max, remaining) in usages {
                    let code = sample_code(status, from, until, count, max);
                    let expected = status == GuestCodeStatus::Active && in_window && remaining;
                    assert_eq!(
                        code.is_usable(now),
                        expected,
                        "status={:?} in_window={} remaining={}",
                        status,
                        in_window,
                        remaining
                    );
                }
            }
        }
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let now = Utc::now();
        let code = sample_code(GuestCodeStatus::Active, now, now, 0, 1);
        assert!(code.is_usable(now));
    }

    #[test]
    fn test_effective_status_is_pure() {
        let now = Utc::now();
        let code = sample_code(
            GuestCodeStatus::Active,
            now - Duration::days(2),
            now - Duration::days(1),
            0,
            1,
        );
        assert_eq!(code.effective_status(now), GuestCodeStatus::Expired);
        assert_eq!(code.status, GuestCodeStatus::Active);
        assert_eq!(code.at(now).status, GuestCodeStatus::Expired);
    }

    #[test]
    fn test_record_use_flips_to_used_at_max() {
        let now = Utc::now();
        let mut code = sample_code(
            GuestCodeStatus::Active,
            now - Duration::minutes(1),
            now + Duration::hours(1),
            0,
            2,
        );
        code.record_use(now).unwrap();
        assert_eq!(code.status, GuestCodeStatus::Active);
        assert_eq!(code.usage_count, 1);
        code.record_use(now).unwrap();
        assert_eq!(code.status, GuestCodeStatus::Used);
        assert!(matches!(code.record_use(now), Err(AppError::NotFound(_))));
        assert_eq!(code.usage_count, 2);
    }

    #[test]
    fn test_unusable_reasons() {
        let now = Utc::now();
        let expired = sample_code(
            GuestCodeStatus::Active,
            now - Duration::days(2),
            now - Duration::days(1),
            0,
            1,
        );
        assert!(matches!(
            expired.unusable_reason(now),
            AppError::GuestCodeExpired
        ));

        let revoked = sample_code(
            GuestCodeStatus::Revoked,
            now - Duration::hours(1),
            now + Duration::hours(1),
            0,
            1,
        );
        assert!(matches!(revoked.unusable_reason(now), AppError::NotFound(_)));

        let spent = sample_code(
            GuestCodeStatus::Used,
            now - Duration::hours(1),
            now + Duration::hours(1),
            1,
            1,
        );
        assert!(matches!(spent.unusable_reason(now), AppError::NotFound(_)));

        // Stored row still active but out of uses.
        let exhausted = sample_code(
            GuestCodeStatus::Active,
            now - Duration::hours(1),
            now + Duration::hours(1),
            2,
            2,
        );
        assert!(matches!(exhausted.unusable_reason(now), AppError::NotFound(_)));
    }

    #[test]
    fn test_revoke_is_terminal() {
        let now = Utc::now();
        let mut code = sample_code(
            GuestCodeStatus::Active,
            now,
            now + Duration::hours(1),
            0,
            1,
        );
        code.revoke(now).unwrap();
        assert_eq!(code.status, GuestCodeStatus::Revoked);
        assert!(code.revoked_at.is_some());
        assert!(!code.is_usable(now));
        assert!(matches!(
            code.revoke(now),
            Err(AppError::InvalidTransition(_))
        ));
    }
}
