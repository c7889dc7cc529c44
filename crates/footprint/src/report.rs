//! Report state and the reducer that edits it.
//!
//! [`ReportState`] is the whole editable report: organisation details, the
//! three scope collections and the wizard step. It is changed only through
//! [`ReportState::apply`], which takes an explicit [`Command`]. The same
//! value is what gets saved under a tag as a snapshot.

use std::fmt;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entry::{null_as_default, EmissionEntry, EntryField, NumericInput};
use crate::error::{Error, Result};

/// Wizard step for data entry.
pub const STEP_DATA_ENTRY: u8 = 1;

/// Wizard step for the dashboard.
pub const STEP_DASHBOARD: u8 = 2;

fn default_step() -> u8 {
    STEP_DATA_ENTRY
}

/// One of the three GHG reporting scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Direct emissions from owned or controlled sources.
    #[serde(rename = "scope1")]
    Direct,
    /// Indirect emissions from purchased energy.
    #[serde(rename = "scope2")]
    IndirectEnergy,
    /// All other indirect emissions in the value chain.
    #[serde(rename = "scope3")]
    ValueChain,
}

impl Scope {
    /// All scopes in reporting order.
    pub const ALL: [Scope; 3] = [Scope::Direct, Scope::IndirectEnergy, Scope::ValueChain];

    /// Display label used in chart series.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Direct => "Scope 1",
            Self::IndirectEnergy => "Scope 2",
            Self::ValueChain => "Scope 3",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Organisation-level report details, used only for labelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneralInfo {
    /// Reporting year; the browser sends a number until the field is edited.
    pub reporting_year: NumericInput,
    /// Start of the reporting period.
    #[serde(deserialize_with = "null_as_default")]
    pub start_date: String,
    /// End of the reporting period.
    #[serde(deserialize_with = "null_as_default")]
    pub end_date: String,
    /// Reporting organisation.
    #[serde(deserialize_with = "null_as_default")]
    pub organisation_name: String,
    /// Organisational or operational boundary.
    #[serde(deserialize_with = "null_as_default")]
    pub reporting_boundary: String,
    /// Contact person for the report.
    #[serde(deserialize_with = "null_as_default")]
    pub contact_person: String,
    /// Contact e-mail for the report.
    #[serde(deserialize_with = "null_as_default")]
    pub contact_email: String,
    /// How the activity data was collected.
    #[serde(deserialize_with = "null_as_default")]
    pub data_collection_method: String,
    /// Date the report was last updated (`YYYY-MM-DD`).
    #[serde(deserialize_with = "null_as_default")]
    pub last_update_date: String,
}

impl Default for GeneralInfo {
    fn default() -> Self {
        let today = Utc::now().date_naive();
        Self {
            reporting_year: NumericInput::Number(f64::from(today.year())),
            start_date: String::new(),
            end_date: String::new(),
            organisation_name: String::new(),
            reporting_boundary: String::new(),
            contact_person: String::new(),
            contact_email: String::new(),
            data_collection_method: String::new(),
            last_update_date: today.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Editable field of [`GeneralInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum GeneralInfoField {
    ReportingYear,
    StartDate,
    EndDate,
    OrganisationName,
    ReportingBoundary,
    ContactPerson,
    ContactEmail,
    DataCollectionMethod,
    LastUpdateDate,
}

impl GeneralInfo {
    /// Set a single field from its text form.
    pub fn set(&mut self, field: GeneralInfoField, value: impl Into<String>) {
        let value = value.into();
        match field {
            GeneralInfoField::ReportingYear => self.reporting_year = NumericInput::Text(value),
            GeneralInfoField::StartDate => self.start_date = value,
            GeneralInfoField::EndDate => self.end_date = value,
            GeneralInfoField::OrganisationName => self.organisation_name = value,
            GeneralInfoField::ReportingBoundary => self.reporting_boundary = value,
            GeneralInfoField::ContactPerson => self.contact_person = value,
            GeneralInfoField::ContactEmail => self.contact_email = value,
            GeneralInfoField::DataCollectionMethod => self.data_collection_method = value,
            GeneralInfoField::LastUpdateDate => self.last_update_date = value,
        }
    }
}

/// An edit to a [`ReportState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    /// Append a default entry to a scope.
    #[serde(rename_all = "camelCase")]
    AddEntry {
        /// Target scope.
        scope: Scope,
    },
    /// Change one field of one entry.
    #[serde(rename_all = "camelCase")]
    UpdateField {
        /// Scope holding the entry.
        scope: Scope,
        /// Id of the entry to edit.
        entry_id: String,
        /// Field to change.
        field: EntryField,
        /// New value in text form.
        value: String,
    },
    /// Replace a whole entry (matched by id), as the edit dialog does.
    #[serde(rename_all = "camelCase")]
    ReplaceEntry {
        /// Scope holding the entry.
        scope: Scope,
        /// The replacement row.
        entry: EmissionEntry,
    },
    /// Remove an entry.
    #[serde(rename_all = "camelCase")]
    RemoveEntry {
        /// Scope holding the entry.
        scope: Scope,
        /// Id of the entry to remove.
        entry_id: String,
    },
    /// Change one organisation field.
    SetGeneralInfo {
        /// Field to change.
        field: GeneralInfoField,
        /// New value.
        value: String,
    },
    /// Move the wizard to another step.
    SetStep {
        /// Target step.
        step: u8,
    },
}

/// What a [`Command`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A new entry was appended with this id.
    Added(String),
    /// The state changed.
    Applied,
    /// The command referenced an entry that does not exist; nothing changed.
    Unchanged,
}

/// The complete editable report, persisted verbatim as a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportState {
    /// Organisation details.
    #[serde(default, deserialize_with = "null_as_default")]
    pub general_info: GeneralInfo,
    /// Scope 1 entries.
    #[serde(default, rename = "scope1Data", deserialize_with = "null_as_default")]
    pub scope1: Vec<EmissionEntry>,
    /// Scope 2 entries.
    #[serde(default, rename = "scope2Data", deserialize_with = "null_as_default")]
    pub scope2: Vec<EmissionEntry>,
    /// Scope 3 entries.
    #[serde(default, rename = "scope3Data", deserialize_with = "null_as_default")]
    pub scope3: Vec<EmissionEntry>,
    /// Current wizard step.
    #[serde(default = "default_step", deserialize_with = "null_as_default")]
    pub step: u8,
}

impl Default for ReportState {
    fn default() -> Self {
        Self {
            general_info: GeneralInfo::default(),
            scope1: Vec::new(),
            scope2: Vec::new(),
            scope3: Vec::new(),
            step: STEP_DATA_ENTRY,
        }
    }
}

impl ReportState {
    /// Create an empty report on the data-entry step.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries of one scope.
    #[must_use]
    pub fn scope(&self, scope: Scope) -> &[EmissionEntry] {
        match scope {
            Scope::Direct => &self.scope1,
            Scope::IndirectEnergy => &self.scope2,
            Scope::ValueChain => &self.scope3,
        }
    }

    fn scope_mut(&mut self, scope: Scope) -> &mut Vec<EmissionEntry> {
        match scope {
            Scope::Direct => &mut self.scope1,
            Scope::IndirectEnergy => &mut self.scope2,
            Scope::ValueChain => &mut self.scope3,
        }
    }

    /// Apply a command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the command carries a value that
    /// can't be stored (an unknown unit, an unknown step).
    pub fn apply(&mut self, command: Command) -> Result<Outcome> {
        match command {
            Command::AddEntry { scope } => {
                let entry = EmissionEntry::new();
                let id = entry.id.clone();
                self.scope_mut(scope).push(entry);
                Ok(Outcome::Added(id))
            }
            Command::UpdateField {
                scope,
                entry_id,
                field,
                value,
            } => match self.scope_mut(scope).iter_mut().find(|e| e.id == entry_id) {
                Some(entry) => {
                    entry.set(field, value)?;
                    Ok(Outcome::Applied)
                }
                None => Ok(Outcome::Unchanged),
            },
            Command::ReplaceEntry { scope, entry } => {
                match self.scope_mut(scope).iter_mut().find(|e| e.id == entry.id) {
                    Some(slot) => {
                        *slot = entry;
                        Ok(Outcome::Applied)
                    }
                    None => Ok(Outcome::Unchanged),
                }
            }
            Command::RemoveEntry { scope, entry_id } => {
                let entries = self.scope_mut(scope);
                let before = entries.len();
                entries.retain(|e| e.id != entry_id);
                if entries.len() == before {
                    Ok(Outcome::Unchanged)
                } else {
                    Ok(Outcome::Applied)
                }
            }
            Command::SetGeneralInfo { field, value } => {
                self.general_info.set(field, value);
                Ok(Outcome::Applied)
            }
            Command::SetStep { step } => {
                if step != STEP_DATA_ENTRY && step != STEP_DASHBOARD {
                    return Err(Error::invalid_input(format!("unknown step: {step}")));
                }
                self.step = step;
                Ok(Outcome::Applied)
            }
        }
    }

    /// Decode a stored snapshot payload.
    ///
    /// A step of `0`, `null` or a missing step falls back to the data-entry step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the payload does not have the snapshot shape.
    pub fn from_snapshot(payload: Value) -> Result<Self> {
        let mut state: Self = serde_json::from_value(payload)?;
        if state.step == 0 {
            state.step = STEP_DATA_ENTRY;
        }
        Ok(state)
    }

    /// Encode this state as a snapshot payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_snapshot(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
