//! Record-level invariants checked before anything reaches storage

use chrono::{DateTime, Datelike, Utc};
use landfall_common::validation::{ValidationResult, Validator};
use landfall_domain::constants::{
    MAX_LATITUDE, MAX_LONGITUDE, MAX_NAME_LENGTH, MIN_LATITUDE, MIN_LONGITUDE, MIN_YEAR,
};
use landfall_domain::MeteoriteLanding;

/// Validates candidate landings
///
/// Rules: non-blank external id, name of at most 500 characters, latitude
/// in `[-90, 90]`, longitude in `[-180, 180]`, year in
/// `[1, current year + 1]` and non-negative mass. Optional fields are only
/// checked when present.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordValidator;

impl RecordValidator {
    pub fn new() -> Self {
        Self
    }

    /// Check `record` as of `now`, collecting every violated rule
    pub fn validate(&self, record: &MeteoriteLanding, now: DateTime<Utc>) -> ValidationResult<()> {
        let mut validator = Validator::new();

        validator.validate_not_empty("external_id", &record.external_id);
        validator.validate_max_length("name", &record.name, MAX_NAME_LENGTH);

        if let Some(lat) = record.reclat {
            validator.validate_range("reclat", lat, MIN_LATITUDE, MAX_LATITUDE);
        }
        if let Some(lon) = record.reclong {
            validator.validate_range("reclong", lon, MIN_LONGITUDE, MAX_LONGITUDE);
        }
        if let Some(year) = record.year {
            let max_year = now.year().saturating_add(1);
            validator.validate_range("year", year, MIN_YEAR, max_year);
        }
        if let Some(mass) = record.mass {
            validator.validate_min("mass", mass, 0.0);
        }

        validator.finalize()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use landfall_domain::ExternalLanding;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn record() -> MeteoriteLanding {
        let source = ExternalLanding {
            id: Some("1".into()),
            name: Some("Aachen".into()),
            mass: Some("21".into()),
            year: Some("1880".into()),
            reclat: Some("50.775".into()),
            reclong: Some("6.08333".into()),
            ..ExternalLanding::default()
        };
        MeteoriteLanding::from_external("1", &source, now())
    }

    #[test]
    fn valid_record_passes() {
        assert!(RecordValidator::new().validate(&record(), now()).is_ok());
    }

    #[test]
    fn absent_optionals_pass() {
        let r =
            MeteoriteLanding { mass: None, year: None, reclat: None, reclong: None, ..record() };
        assert!(RecordValidator::new().validate(&r, now()).is_ok());
    }

    #[test]
    fn year_bounds_follow_the_clock() {
        let validator = RecordValidator::new();
        let in_year = |year| MeteoriteLanding { year: Some(year), ..record() };
        assert!(validator.validate(&in_year(2026), now()).is_ok());
        assert!(validator.validate(&in_year(1), now()).is_ok());

        let err = validator.validate(&in_year(2027), now()).unwrap_err();
        assert_eq!(err.fields(), vec!["year"]);
        assert!(validator.validate(&in_year(0), now()).is_err());
    }

    /// Validates `RecordValidator::validate` for the all-rules-broken
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms each violated rule is reported against its own field.
    #[test]
    fn reports_every_violation() {
        let bad = MeteoriteLanding {
            external_id: " ".into(),
            name: "x".repeat(501),
            reclat: Some(-90.5),
            reclong: Some(180.1),
            mass: Some(-0.1),
            ..record()
        };
        let err = RecordValidator::new().validate(&bad, now()).unwrap_err();
        assert_eq!(err.fields(), vec!["external_id", "name", "reclat", "reclong", "mass"]);
    }

    #[test]
    fn name_limit_counts_characters() {
        let r = MeteoriteLanding { name: "é".repeat(500), ..record() };
        assert!(RecordValidator::new().validate(&r, now()).is_ok());
    }
}
