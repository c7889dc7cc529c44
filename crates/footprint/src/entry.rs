//! Emission entry types.
//!
//! An [`EmissionEntry`] is one recorded activity (a fuel purchase, a metered
//! electricity reading, a business trip) that contributes emissions to one of
//! the three reporting scopes. Numeric fields are kept in the shape the
//! browser sent them so that a snapshot survives a save/load cycle unchanged.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Collection frequency assigned to freshly added entries.
pub const DEFAULT_COLLECTION_FREQUENCY: &str = "Annually";

/// Measurement unit of an entry's quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Unit {
    /// Volume in litres.
    #[default]
    #[serde(rename = "litres")]
    Litres,
    /// Mass in kilograms.
    #[serde(rename = "kg")]
    Kilograms,
    /// Energy in kilowatt-hours.
    #[serde(rename = "kWh")]
    KilowattHours,
    /// Mass in metric tonnes.
    #[serde(rename = "tonnes")]
    Tonnes,
    /// Volume in cubic metres.
    #[serde(rename = "m³")]
    CubicMetres,
}

impl Unit {
    /// Every unit, in the order the entry form offers them.
    pub const ALL: [Unit; 5] = [
        Unit::Litres,
        Unit::Kilograms,
        Unit::KilowattHours,
        Unit::Tonnes,
        Unit::CubicMetres,
    ];

    /// The label used on the wire and in the UI.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Litres => "litres",
            Self::Kilograms => "kg",
            Self::KilowattHours => "kWh",
            Self::Tonnes => "tonnes",
            Self::CubicMetres => "m³",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|unit| unit.as_str() == s)
            .ok_or_else(|| Error::invalid_input(format!("unknown unit: {s}")))
    }
}

/// A numeric field as entered: a JSON number, free text, or anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    /// A value that arrived as a JSON number.
    Number(f64),
    /// A value that arrived as text and is parsed on demand.
    Text(String),
    /// Any other JSON value (bool, object, array). Counts as 0.
    Other(serde_json::Value),
}

impl NumericInput {
    /// The numeric value, or 0 when the input holds no usable number.
    #[must_use]
    pub fn value(&self) -> f64 {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => parse_leading_float(s).unwrap_or(0.0),
            Self::Other(_) => 0.0,
        };
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }
}

impl Default for NumericInput {
    fn default() -> Self {
        Self::Number(0.0)
    }
}

impl From<f64> for NumericInput {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for NumericInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

fn leading_float_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?")
            .expect("Invalid regex pattern")
    })
}

/// Parse the longest numeric prefix of `s`, ignoring trailing text.
///
/// `"12.5 kg"` yields `12.5`; `"abc"` yields `None`.
#[must_use]
pub fn parse_leading_float(s: &str) -> Option<f64> {
    let matched = leading_float_pattern().find(s)?;
    matched.as_str().trim_start().parse::<f64>().ok()
}

/// Deserialize `null` as the type's default.
///
/// Container-level `#[serde(default)]` only covers missing keys.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Parse an entry date into its calendar month key (`YYYY-MM`).
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM` and RFC 3339 timestamps.
#[must_use]
pub fn month_key(date: &str) -> Option<String> {
    let date = date.trim();
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(&format!("{date}-01"), "%Y-%m-%d").ok())
        .or_else(|| DateTime::parse_from_rfc3339(date).ok().map(|dt| dt.date_naive()))?;
    Some(parsed.format("%Y-%m").to_string())
}

/// One recorded activity contributing emissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmissionEntry {
    /// Identifier, unique within its scope list.
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    /// Broad activity category (e.g. "Stationary combustion").
    #[serde(deserialize_with = "null_as_default")]
    pub data_category: String,
    /// Sub-category used for the by-source breakdown.
    #[serde(deserialize_with = "null_as_default")]
    pub sub_category: String,
    /// Fuel or source type (e.g. "Diesel").
    #[serde(deserialize_with = "null_as_default")]
    pub fuel_source_type: String,
    /// Unit of `quantity`.
    #[serde(deserialize_with = "null_as_default")]
    pub unit: Unit,
    /// Activity quantity; `None` when the browser sent `null`.
    pub quantity: Option<NumericInput>,
    /// Emission factor per unit of quantity.
    pub emission_factor: Option<NumericInput>,
    /// Activity date, used for monthly bucketing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Where the emission factor came from.
    #[serde(deserialize_with = "null_as_default")]
    pub emission_factor_source: String,
    /// Where the activity data came from.
    #[serde(deserialize_with = "null_as_default")]
    pub data_source: String,
    /// How often the data is collected.
    #[serde(deserialize_with = "null_as_default")]
    pub collection_frequency: String,
    /// Notes on data quality.
    #[serde(deserialize_with = "null_as_default")]
    pub data_quality_notes: String,
    /// Free-form notes.
    #[serde(deserialize_with = "null_as_default")]
    pub notes: String,
}

impl Default for EmissionEntry {
    fn default() -> Self {
        Self {
            id: String::new(),
            data_category: String::new(),
            sub_category: String::new(),
            fuel_source_type: String::new(),
            unit: Unit::default(),
            quantity: Some(NumericInput::default()),
            emission_factor: Some(NumericInput::default()),
            date: None,
            emission_factor_source: String::new(),
            data_source: String::new(),
            collection_frequency: DEFAULT_COLLECTION_FREQUENCY.to_string(),
            data_quality_notes: String::new(),
            notes: String::new(),
        }
    }
}

impl EmissionEntry {
    /// Create an entry with default field values and a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ..Self::default()
        }
    }

    /// Parsed quantity, 0 when missing or unparseable.
    #[must_use]
    pub fn quantity_value(&self) -> f64 {
        self.quantity.as_ref().map_or(0.0, NumericInput::value)
    }

    /// Parsed emission factor, 0 when missing or unparseable.
    #[must_use]
    pub fn emission_factor_value(&self) -> f64 {
        self.emission_factor.as_ref().map_or(0.0, NumericInput::value)
    }

    /// Calendar month of the entry date, if it has a parseable one.
    #[must_use]
    pub fn month(&self) -> Option<String> {
        self.date.as_deref().and_then(month_key)
    }

    /// Set a single field from its text form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `field` is [`EntryField::Unit`] and
    /// `value` is not one of the known units.
    pub fn set(&mut self, field: EntryField, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        match field {
            EntryField::DataCategory => self.data_category = value,
            EntryField::SubCategory => self.sub_category = value,
            EntryField::FuelSourceType => self.fuel_source_type = value,
            EntryField::Unit => self.unit = value.parse()?,
            EntryField::Quantity => self.quantity = Some(NumericInput::Text(value)),
            EntryField::EmissionFactor => self.emission_factor = Some(NumericInput::Text(value)),
            EntryField::Date => self.date = (!value.is_empty()).then_some(value),
            EntryField::EmissionFactorSource => self.emission_factor_source = value,
            EntryField::DataSource => self.data_source = value,
            EntryField::CollectionFrequency => self.collection_frequency = value,
            EntryField::DataQualityNotes => self.data_quality_notes = value,
            EntryField::Notes => self.notes = value,
        }
        Ok(())
    }
}

/// Editable field of an [`EmissionEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryField {
    /// `dataCategory`
    DataCategory,
    /// `subCategory`
    SubCategory,
    /// `fuelSourceType`
    FuelSourceType,
    /// `unit`
    Unit,
    /// `quantity`
    Quantity,
    /// `emissionFactor`
    EmissionFactor,
    /// `date`
    Date,
    /// `emissionFactorSource`
    EmissionFactorSource,
    /// `dataSource`
    DataSource,
    /// `collectionFrequency`
    CollectionFrequency,
    /// `dataQualityNotes`
    DataQualityNotes,
    /// `notes`
    Notes,
}

impl FromStr for EntryField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| Error::invalid_input(format!("unknown entry field: {s}")))
    }
}
