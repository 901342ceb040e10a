use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::ValidationError;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generates a fresh identifier carrying this record kind's prefix.
            /// Identifiers generated by one process sort in creation order.
            pub fn generate() -> Self {
                $name(format!(concat!($prefix, "{}"), Uuid::now_v7().simple()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                $name(value.to_string())
            }
        }
    };
}

opaque_id!(
    /// The unique ID of a field unit.
    UnitId,
    "u_"
);
opaque_id!(
    /// The unique ID of a group of units.
    GroupId,
    "g_"
);
opaque_id!(
    /// The unique ID of an incident call.
    CallId,
    "c_"
);
opaque_id!(
    /// The unique ID of a BOLO alert.
    BoloId,
    "b_"
);

/// Agency a unit belongs to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum UnitType {
    #[default]
    Lasd,
    Chp,
    Lapd,
    Dhs,
}

impl UnitType {
    pub const ALL: &'static [UnitType] = &[UnitType::Lasd, UnitType::Chp, UnitType::Lapd, UnitType::Dhs];

    /// Whether units of this type may carry a [`Subdivision`].
    pub fn has_subdivisions(self) -> bool {
        matches!(self, UnitType::Lapd)
    }
}

/// LAPD subdivision.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Subdivision {
    Hc,
    Sup,
    Pu,
}

impl Subdivision {
    pub const ALL: &'static [Subdivision] = &[Subdivision::Hc, Subdivision::Sup, Subdivision::Pu];
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum UnitStatus {
    #[default]
    Available,
    Busy,
    #[serde(rename = "On Scene")]
    #[strum(to_string = "On Scene", serialize = "on-scene")]
    OnScene,
    Unavailable,
    #[serde(rename = "Off Duty")]
    #[strum(to_string = "Off Duty", serialize = "off-duty")]
    OffDuty,
}

impl UnitStatus {
    pub const ALL: &'static [UnitStatus] = &[
        UnitStatus::Available,
        UnitStatus::Busy,
        UnitStatus::OnScene,
        UnitStatus::Unavailable,
        UnitStatus::OffDuty,
    ];

    /// Parses a textual status, rejecting anything outside the enumerated set.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        raw.trim()
            .parse()
            .map_err(|_| ValidationError::invalid("status", raw))
    }
}

/// Call priority. Stored as its numeric label ("1" is the most urgent).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Priority {
    #[serde(rename = "1")]
    #[strum(serialize = "1", to_string = "High")]
    High,
    #[default]
    #[serde(rename = "2")]
    #[strum(serialize = "2", to_string = "Medium")]
    Medium,
    #[serde(rename = "3")]
    #[strum(serialize = "3", to_string = "Low")]
    Low,
}

impl Priority {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        raw.trim()
            .parse()
            .map_err(|_| ValidationError::invalid("priority", raw))
    }
}

/// How a call reached dispatch.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum CallOrigin {
    #[default]
    Caller,
    Radio,
    Dispatch,
    Alarms,
}

/// An insertion-ordered set of unit identifiers.
///
/// Groups and calls only hold weak references to units: nothing guarantees
/// that a member still resolves to a unit of the snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq)]
#[serde(from = "Vec<UnitId>", into = "Vec<UnitId>")]
pub struct UnitIdSet(Vec<UnitId>);

impl UnitIdSet {
    pub fn new() -> Self {
        UnitIdSet(Vec::new())
    }

    pub fn contains(&self, id: &UnitId) -> bool {
        self.0.contains(id)
    }

    /// Adds `id` unless already present. Returns whether the set changed.
    pub fn insert(&mut self, id: UnitId) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.0.push(id);
        true
    }

    /// Returns whether the set changed.
    pub fn remove(&mut self, id: &UnitId) -> bool {
        let before = self.0.len();
        self.0.retain(|member| member != id);
        self.0.len() != before
    }

    pub fn union_with(&mut self, other: &UnitIdSet) -> bool {
        other
            .iter()
            .fold(false, |changed, id| self.insert(id.clone()) || changed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnitId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Membership comparison, order is irrelevant.
impl PartialEq for UnitIdSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|id| other.contains(id))
    }
}

impl From<Vec<UnitId>> for UnitIdSet {
    fn from(ids: Vec<UnitId>) -> Self {
        ids.into_iter().collect()
    }
}

impl From<UnitIdSet> for Vec<UnitId> {
    fn from(set: UnitIdSet) -> Self {
        set.0
    }
}

impl FromIterator<UnitId> for UnitIdSet {
    fn from_iter<T: IntoIterator<Item = UnitId>>(iter: T) -> Self {
        let mut set = UnitIdSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: UnitType,
    #[serde(default, with = "blank_subdivision")]
    pub subdivision: Option<Subdivision>,
    #[serde(default)]
    pub status: UnitStatus,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(rename = "unitIds", default)]
    pub unit_ids: UnitIdSet,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Call {
    pub id: CallId,
    pub title: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub postal: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub origin: CallOrigin,
    /// Ten-code of the call. Free text, looked up but never validated.
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub assigned: UnitIdSet,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Bolo {
    pub id: BoloId,
    pub title: String,
    #[serde(default)]
    pub plate: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub active: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// The complete value of the board at one instant.
///
/// Collections sit behind `Arc` so that a mutation touching one collection
/// shares the other three with the previous snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub units: Arc<Vec<Unit>>,
    #[serde(default)]
    pub groups: Arc<Vec<Group>>,
    #[serde(default)]
    pub calls: Arc<Vec<Call>>,
    #[serde(default)]
    pub bolos: Arc<Vec<Bolo>>,
    #[serde(default)]
    pub dispatch_notes: String,
}

/// Shown in place of a unit name when a reference no longer resolves.
pub const UNKNOWN_UNIT: &str = "Unknown";

impl Snapshot {
    pub fn unit(&self, id: &UnitId) -> Option<&Unit> {
        self.units.iter().find(|unit| &unit.id == id)
    }

    pub fn group(&self, id: &GroupId) -> Option<&Group> {
        self.groups.iter().find(|group| &group.id == id)
    }

    pub fn call(&self, id: &CallId) -> Option<&Call> {
        self.calls.iter().find(|call| &call.id == id)
    }

    pub fn bolo(&self, id: &BoloId) -> Option<&Bolo> {
        self.bolos.iter().find(|bolo| &bolo.id == id)
    }

    /// Display name of a referenced unit, or [`UNKNOWN_UNIT`] if dangling.
    pub fn unit_name(&self, id: &UnitId) -> &str {
        self.unit(id)
            .map(|unit| unit.name.as_str())
            .unwrap_or(UNKNOWN_UNIT)
    }
}

/// An entry of the ten-code table, as compiled into the data crate.
#[derive(Debug)]
pub struct StaticTenCode {
    pub code: &'static str,
    pub meaning: &'static str,
}

/// Source format of the ten-code table consumed at build time.
#[derive(Deserialize, Serialize, Debug)]
pub struct TenCodeTable {
    pub codes: Vec<TenCodeEntry>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct TenCodeEntry {
    pub code: String,
    pub meaning: String,
}

// Stored blobs use an empty string for "no subdivision".
mod blank_subdivision {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use super::Subdivision;

    pub fn serialize<S: Serializer>(value: &Option<Subdivision>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(sub) => s.serialize_str(&sub.to_string()),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Subdivision>, D::Error> {
        let raw = Option::<String>::deserialize(d)?.unwrap_or_default();
        if raw.trim().is_empty() {
            return Ok(None);
        }
        raw.parse().map(Some).map_err(D::Error::custom)
    }
}
