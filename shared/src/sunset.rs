//! Sunset time for the fixed Lake Shinji observer.

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use sunrise::{Coordinates, SolarDay, SolarEvent};

use crate::{Error, Result};

/// Canonical observer: the promenade facing Yomegashima on Lake Shinji.
pub const OBSERVER_LAT: f64 = 35.4690;
pub const OBSERVER_LON: f64 = 133.0505;
pub const OBSERVER_TZ: Tz = chrono_tz::Asia::Tokyo;

/// Computes sunset for a fixed observer in a fixed civil timezone.
#[derive(Debug, Clone, Copy)]
pub struct SunsetCalculator {
    lat: f64,
    lon: f64,
    tz: Tz,
}

impl Default for SunsetCalculator {
    fn default() -> Self {
        Self::new(OBSERVER_LAT, OBSERVER_LON, OBSERVER_TZ)
    }
}

impl SunsetCalculator {
    pub fn new(lat: f64, lon: f64, tz: Tz) -> Self {
        Self { lat, lon, tz }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Sunset on `date` in local civil time.
    ///
    /// The solar routine works on UTC days, so the neighbouring days are
    /// probed until the result falls on `date` locally.
    pub fn compute(&self, date: NaiveDate) -> Result<DateTime<Tz>> {
        let candidates = [Some(date), date.pred_opt(), date.succ_opt()];
        for day in candidates.into_iter().flatten() {
            let local = self.raw_sunset(day)?;
            if local.date_naive() == date {
                return Ok(local);
            }
        }

        Err(Error::Internal(format!("No sunset on {} at {}, {}", date, self.lat, self.lon)))
    }

    /// Today's date in the observer's timezone.
    pub fn today(&self) -> NaiveDate {
        chrono::Utc::now().with_timezone(&self.tz).date_naive()
    }

    fn raw_sunset(&self, day: NaiveDate) -> Result<DateTime<Tz>> {
        let coordinates = Coordinates::new(self.lat, self.lon)
            .ok_or_else(|| Error::Config(format!("Invalid observer coordinates {}, {}", self.lat, self.lon)))?;
        let utc = SolarDay::new(coordinates, day).event_time(SolarEvent::Sunset);
        Ok(utc.with_timezone(&self.tz))
    }
}

/// `HH:MM` label used on cards.
pub fn format_hhmm(sunset: &DateTime<Tz>) -> String {
    sunset.format("%H:%M").to_string()
}
