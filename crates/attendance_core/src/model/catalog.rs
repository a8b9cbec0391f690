//! Fixed congregation and position catalogs.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One of the nine congregations the district recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Congregation {
    #[serde(rename = "Emmanuel Congregation Ahinsan")]
    EmmanuelAhinsan,
    #[serde(rename = "Peniel Congregation Esreso No 1")]
    PenielEsreso1,
    #[serde(rename = "Favour Congregation Esreso No 2")]
    FavourEsreso2,
    #[serde(rename = "Christ Congregation Ahinsan Estate")]
    ChristAhinsanEstate,
    #[serde(rename = "Ebenezer Congregation Aprabo")]
    EbenezerAprabo,
    #[serde(rename = "Mizpah Congregation Odagya No 1")]
    MizpahOdagya1,
    #[serde(rename = "Odagya No 2")]
    Odagya2,
    #[serde(rename = "Liberty Congregation High Tension")]
    LibertyHighTension,
    #[serde(rename = "NOM")]
    Nom,
}

impl Congregation {
    /// All congregations in display order.
    pub const ALL: [Congregation; 9] = [
        Self::EmmanuelAhinsan,
        Self::PenielEsreso1,
        Self::FavourEsreso2,
        Self::ChristAhinsanEstate,
        Self::EbenezerAprabo,
        Self::MizpahOdagya1,
        Self::Odagya2,
        Self::LibertyHighTension,
        Self::Nom,
    ];

    /// Stable display/wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmmanuelAhinsan => "Emmanuel Congregation Ahinsan",
            Self::PenielEsreso1 => "Peniel Congregation Esreso No 1",
            Self::FavourEsreso2 => "Favour Congregation Esreso No 2",
            Self::ChristAhinsanEstate => "Christ Congregation Ahinsan Estate",
            Self::EbenezerAprabo => "Ebenezer Congregation Aprabo",
            Self::MizpahOdagya1 => "Mizpah Congregation Odagya No 1",
            Self::Odagya2 => "Odagya No 2",
            Self::LibertyHighTension => "Liberty Congregation High Tension",
            Self::Nom => "NOM",
        }
    }

    /// Parses a wire name. Matching is exact after trimming.
    pub fn parse(value: &str) -> Result<Self, CatalogError> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|congregation| congregation.as_str() == trimmed)
            .ok_or_else(|| CatalogError::UnknownCongregation(trimmed.to_string()))
    }
}

impl Display for Congregation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an attendee represents one congregation or the district.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Local,
    District,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::District => "district",
        }
    }
}

impl Display for EntryType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Executive position held by an attendee.
///
/// `VicePresident` exists only for local entries and `PresidentsRep` only
/// for district entries; see [`Position::allowed_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "President")]
    President,
    #[serde(rename = "Vice President")]
    VicePresident,
    #[serde(rename = "President's Rep")]
    PresidentsRep,
    #[serde(rename = "Secretary")]
    Secretary,
    #[serde(rename = "Assistant Secretary")]
    AssistantSecretary,
    #[serde(rename = "Financial Secretary")]
    FinancialSecretary,
    #[serde(rename = "Treasurer")]
    Treasurer,
    #[serde(rename = "Bible Studies Coordinator")]
    BibleStudiesCoordinator,
    #[serde(rename = "Organizer")]
    Organizer,
}

const LOCAL_POSITIONS: &[Position] = &[
    Position::President,
    Position::VicePresident,
    Position::Secretary,
    Position::AssistantSecretary,
    Position::FinancialSecretary,
    Position::Treasurer,
    Position::BibleStudiesCoordinator,
    Position::Organizer,
];

const DISTRICT_POSITIONS: &[Position] = &[
    Position::President,
    Position::PresidentsRep,
    Position::Secretary,
    Position::AssistantSecretary,
    Position::FinancialSecretary,
    Position::Treasurer,
    Position::BibleStudiesCoordinator,
    Position::Organizer,
];

impl Position {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::President => "President",
            Self::VicePresident => "Vice President",
            Self::PresidentsRep => "President's Rep",
            Self::Secretary => "Secretary",
            Self::AssistantSecretary => "Assistant Secretary",
            Self::FinancialSecretary => "Financial Secretary",
            Self::Treasurer => "Treasurer",
            Self::BibleStudiesCoordinator => "Bible Studies Coordinator",
            Self::Organizer => "Organizer",
        }
    }

    /// Positions selectable for the given entry type, in display order.
    pub fn options_for(entry_type: EntryType) -> &'static [Position] {
        match entry_type {
            EntryType::Local => LOCAL_POSITIONS,
            EntryType::District => DISTRICT_POSITIONS,
        }
    }

    pub fn allowed_for(self, entry_type: EntryType) -> bool {
        Self::options_for(entry_type).contains(&self)
    }

    /// Parses a wire name. Matching is exact after trimming.
    pub fn parse(value: &str) -> Result<Self, CatalogError> {
        let trimmed = value.trim();
        LOCAL_POSITIONS
            .iter()
            .chain(DISTRICT_POSITIONS.iter())
            .copied()
            .find(|position| position.as_str() == trimmed)
            .ok_or_else(|| CatalogError::UnknownPosition(trimmed.to_string()))
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    UnknownCongregation(String),
    UnknownPosition(String),
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCongregation(value) => write!(f, "unknown congregation: `{value}`"),
            Self::UnknownPosition(value) => write!(f, "unknown position: `{value}`"),
        }
    }
}

impl Error for CatalogError {}
