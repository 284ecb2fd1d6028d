//! Meteorite landing records
//!
//! [`ExternalLanding`] is one item of the upstream catalogue exactly as it
//! arrives: loosely typed, every field optional. [`MeteoriteLanding`] is the
//! persisted record, keyed for reconciliation by `external_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::utils::field_parser::{parse_coordinate, parse_mass, parse_year};

/// GeoJSON-like point attached to an upstream item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    #[serde(rename = "type", alias = "Type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(alias = "Coordinates", default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Vec<f64>>,
}

/// One upstream catalogue item
///
/// Scalar fields are kept as strings; numbers sent as JSON numbers are
/// accepted and stringified so the field parser sees one representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalLanding {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(rename = "nametype", alias = "nameType", default, deserialize_with = "lenient_string")]
    pub name_type: Option<String>,
    #[serde(rename = "recclass", alias = "recClass", default, deserialize_with = "lenient_string")]
    pub rec_class: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mass: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fall: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reclat: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reclong: Option<String>,
    #[serde(alias = "geoLocation", alias = "GeoLocation", default)]
    pub geolocation: Option<GeoLocation>,
}

impl ExternalLanding {
    /// Trimmed external identifier, or `None` when missing or blank
    pub fn external_id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Persisted meteorite landing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeteoriteLanding {
    pub id: Uuid,
    pub external_id: String,
    pub name: String,
    pub name_type: String,
    pub rec_class: String,
    /// Mass in grams
    pub mass: Option<f64>,
    pub fall: String,
    pub year: Option<i32>,
    pub reclat: Option<f64>,
    pub reclong: Option<f64>,
    /// JSON form of the upstream geolocation object, empty when absent
    pub geolocation: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MeteoriteLanding {
    /// Build a brand-new record with a fresh identity.
    pub fn from_external(
        external_id: impl Into<String>,
        source: &ExternalLanding,
        now: DateTime<Utc>,
    ) -> Self {
        let mut landing = Self {
            id: Uuid::new_v4(),
            external_id: external_id.into(),
            name: String::new(),
            name_type: String::new(),
            rec_class: String::new(),
            mass: None,
            fall: String::new(),
            year: None,
            reclat: None,
            reclong: None,
            geolocation: String::new(),
            created_at: now,
            updated_at: now,
        };
        landing.overwrite_attributes(source);
        landing
    }

    /// Return a copy whose every mapped attribute is replaced from `source`.
    ///
    /// Absent upstream values clear the field (empty string or `None`);
    /// nothing from the previous attributes survives. Identity, external id
    /// and creation time are kept; `updated_at` becomes `now`.
    #[must_use]
    pub fn merged_with(&self, source: &ExternalLanding, now: DateTime<Utc>) -> Self {
        let mut merged = self.clone();
        merged.overwrite_attributes(source);
        merged.updated_at = now;
        merged
    }

    /// Whether the descriptive attributes match, ignoring identity and
    /// timestamps.
    pub fn same_attributes(&self, other: &Self) -> bool {
        self.external_id == other.external_id
            && self.name == other.name
            && self.name_type == other.name_type
            && self.rec_class == other.rec_class
            && self.mass == other.mass
            && self.fall == other.fall
            && self.year == other.year
            && self.reclat == other.reclat
            && self.reclong == other.reclong
            && self.geolocation == other.geolocation
    }

    fn overwrite_attributes(&mut self, source: &ExternalLanding) {
        self.name = source.name.clone().unwrap_or_default();
        self.name_type = source.name_type.clone().unwrap_or_default();
        self.rec_class = source.rec_class.clone().unwrap_or_default();
        self.fall = source.fall.clone().unwrap_or_default();
        self.mass = parse_mass(source.mass.as_deref());
        self.year = parse_year(source.year.as_deref());
        self.reclat = parse_coordinate(source.reclat.as_deref());
        self.reclong = parse_coordinate(source.reclong.as_deref());
        self.geolocation = source
            .geolocation
            .as_ref()
            .and_then(|geo| serde_json::to_string(geo).ok())
            .unwrap_or_default();
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn aachen() -> ExternalLanding {
        serde_json::from_str(
            r#"{
                "name": "Aachen", "id": "1", "nametype": "Valid", "recclass": "L5",
                "mass": "21", "fall": "Fell", "year": "1880-01-01T00:00:00.000",
                "reclat": "50.775000", "reclong": "6.083330",
                "geolocation": {"type": "Point", "coordinates": [6.08333, 50.775]},
                ":@computed_region_cbhk_fwbd": "31"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn deserializes_catalogue_item_and_ignores_unknown_fields() {
        let item = aachen();
        assert_eq!(item.external_id(), Some("1"));
        assert_eq!(item.name_type.as_deref(), Some("Valid"));
        assert_eq!(item.geolocation.unwrap().coordinates, Some(vec![6.08333, 50.775]));
    }

    #[test]
    fn numeric_json_values_are_stringified() {
        let raw = r#"{"id": 42, "mass": 1.5, "year": null, "geoLocation": null}"#;
        let item: ExternalLanding = serde_json::from_str(raw).unwrap();
        assert_eq!(item.id.as_deref(), Some("42"));
        assert_eq!(item.mass.as_deref(), Some("1.5"));
        assert_eq!(item.year, None);
        assert_eq!(item.geolocation, None);
    }

    #[test]
    fn blank_id_is_missing() {
        let item = ExternalLanding { id: Some("   ".into()), ..ExternalLanding::default() };
        assert_eq!(item.external_id(), None);
    }

    #[test]
    fn new_record_parses_fields() {
        let landing = MeteoriteLanding::from_external("1", &aachen(), t(1));
        assert_eq!(landing.name, "Aachen");
        assert_eq!(landing.mass, Some(21.0));
        assert_eq!(landing.year, Some(1880));
        assert_eq!(landing.reclat, Some(50.775));
        assert_eq!(landing.geolocation, r#"{"type":"Point","coordinates":[6.08333,50.775]}"#);
        assert_eq!(landing.created_at, t(1));
        assert_eq!(landing.updated_at, t(1));
    }

    /// Validates `merged_with` for the absent upstream fields scenario.
    ///
    /// Assertions:
    /// - Confirms every mapped field is cleared when absent upstream.
    /// - Confirms identity and creation time survive the merge.
    #[test]
    fn merge_overwrites_every_field() {
        let existing = MeteoriteLanding::from_external("1", &aachen(), t(1));
        let sparse = ExternalLanding { id: Some("1".into()), ..ExternalLanding::default() };

        let merged = existing.merged_with(&sparse, t(2));

        assert_eq!(merged.id, existing.id);
        assert_eq!(merged.external_id, "1");
        assert_eq!(merged.created_at, t(1));
        assert_eq!(merged.updated_at, t(2));
        assert!(merged.name.is_empty());
        assert!(merged.name_type.is_empty());
        assert!(merged.rec_class.is_empty());
        assert!(merged.fall.is_empty());
        assert!(merged.geolocation.is_empty());
        assert_eq!(
            (merged.mass, merged.year, merged.reclat, merged.reclong),
            (None, None, None, None)
        );
    }

    #[test]
    fn same_attributes_ignores_timestamps() {
        let existing = MeteoriteLanding::from_external("1", &aachen(), t(1));
        let merged = existing.merged_with(&aachen(), t(5));
        assert!(existing.same_attributes(&merged));

        let renamed = ExternalLanding { name: Some("Aix".into()), ..aachen() };
        assert!(!existing.same_attributes(&existing.merged_with(&renamed, t(5))));
    }
}
