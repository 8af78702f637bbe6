//! Provider profile: the timezone and locale a provider operates in.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Error returned when a profile is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    /// Timezone is not an IANA identifier
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    /// Locale is not a language tag like `de-DE`
    #[error("invalid locale: {0}")]
    InvalidLocale(String),
}

/// Timezone and locale of a provider, validated at construction.
///
/// # Examples
///
/// ```
/// use transit_discover::provider::Profile;
///
/// let profile = Profile::new("Europe/Berlin", "de-DE").unwrap();
/// assert_eq!(profile.locale(), "de-DE");
///
/// assert!(Profile::new("Mars/Olympus", "de-DE").is_err());
/// assert!(Profile::new("Europe/Berlin", "").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    timezone: Tz,
    locale: String,
}

impl Profile {
    /// Create a profile from an IANA timezone and a language tag.
    pub fn new(timezone: &str, locale: &str) -> Result<Self, ProfileError> {
        let tz =
            Tz::from_str(timezone).map_err(|_| ProfileError::InvalidTimezone(timezone.into()))?;
        if !is_language_tag(locale) {
            return Err(ProfileError::InvalidLocale(locale.into()));
        }
        Ok(Self {
            timezone: tz,
            locale: locale.to_string(),
        })
    }

    /// The provider's timezone.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// The provider's locale.
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// 10:00 on Monday of the week after `now`, in the provider's timezone.
    ///
    /// Used as the reference time when the caller does not supply one, so
    /// that crawls see a regular weekday timetable.
    pub fn next_week_reference(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        let local = now.with_timezone(&self.timezone).date_naive();
        let monday = local - Duration::days(i64::from(local.weekday().num_days_from_monday()));
        let next_monday = monday + Duration::days(7);
        let ten = next_monday.and_time(NaiveTime::MIN + Duration::hours(10));

        // 10:00 always exists locally; `earliest` covers ambiguous wall times
        self.timezone
            .from_local_datetime(&ten)
            .earliest()
            .unwrap_or_else(|| self.timezone.from_utc_datetime(&ten))
            .fixed_offset()
    }
}

fn is_language_tag(s: &str) -> bool {
    let mut parts = s.split(['-', '_']);
    let Some(language) = parts.next() else {
        return false;
    };
    (2..=3).contains(&language.len())
        && language.chars().all(|c| c.is_ascii_alphabetic())
        && parts.all(|p| (1..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()))
}
