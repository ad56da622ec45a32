//! `yyyyMMddHHmmss` timestamps in Vietnam time (UTC+7), the only date
//! format the gateway accepts.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

use crate::error::{AppError, AppResult};

pub const VNP_DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// How long a signed payment URL stays payable.
pub const PAYMENT_EXPIRY_MINUTES: i64 = 15;

const VIETNAM_UTC_OFFSET_HOURS: i64 = 7;

pub fn format_vnp_date(instant: DateTime<Utc>) -> String {
    (instant.naive_utc() + Duration::hours(VIETNAM_UTC_OFFSET_HOURS))
        .format(VNP_DATE_FORMAT)
        .to_string()
}

pub fn parse_vnp_date(value: &str) -> AppResult<DateTime<Utc>> {
    if value.len() != 14 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::Validation(format!(
            "Invalid gateway timestamp '{}', expected yyyyMMddHHmmss",
            value
        )));
    }

    let local = NaiveDateTime::parse_from_str(value, VNP_DATE_FORMAT)
        .map_err(|e| AppError::Validation(format!("Invalid gateway timestamp '{}': {}", value, e)))?;

    Ok(Utc.from_utc_datetime(&(local - Duration::hours(VIETNAM_UTC_OFFSET_HOURS))))
}

/// Expiry for a payment created at `create_date`, in the same format.
pub fn expire_date_for(create_date: &str) -> AppResult<String> {
    let created = parse_vnp_date(create_date)?;
    Ok(format_vnp_date(created + Duration::minutes(PAYMENT_EXPIRY_MINUTES)))
}
