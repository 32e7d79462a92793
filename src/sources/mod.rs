//! Source strategies: one extraction strategy per public data source
//!
//! # Architecture
//!
//! - [`HospitalScraper`] - the contract the ingestion service drives
//! - [`SnapshotSource`] - what a concrete source implements; it only extracts
//!   a [`SourceSnapshot`], and the shared blanket impl turns that into
//!   `scrape`/`validate_data`/`color_distribution`
//! - [`registry`] - hospital id to [`SourceCode`] mapping
//! - [`factory`] - [`SourceCode`] to strategy constructor
//!
//! Source families:
//! - [`asp_palermo`] - ASP Palermo containers (table-based HTML)
//! - [`policlinico_palermo`] - Policlinico Palermo REST API
//! - [`asp_agrigento`] - ASP Agrigento wall board
//! - [`asp_caltanissetta`] - ASP Caltanissetta dashboard
//! - [`ospedali_riuniti`] - Cervello / Villa Sofia cards
//! - [`arnas_civico`] - ARNAS Civico grid tables
//! - [`policlinico_catania`] - Policlinico Rodolico-San Marco API
//! - [`ao_papardo`] - AO Papardo colour swatches
//! - [`policlinico_messina`] - Policlinico G. Martino table

pub mod ao_papardo;
pub mod arnas_civico;
pub mod asp_agrigento;
pub mod asp_caltanissetta;
pub mod asp_palermo;
pub mod factory;
pub mod ospedali_riuniti;
pub mod policlinico_catania;
pub mod policlinico_messina;
pub mod policlinico_palermo;
pub mod registry;
pub mod snapshot;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::models::{ColorCodeDistribution, HospitalStatusCreate};
use crate::transport::Transport;
use crate::utils::error::{FetchError, ScrapeError};

pub use factory::ScraperFactory;
pub use registry::{RegistryError, SourceRegistry};
pub use snapshot::{PatientState, SourceSnapshot};

// ============================================================================
// Source codes
// ============================================================================

/// Stable symbol selecting a strategy and its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceCode {
    PoCervelloAdulti,
    PoVillaSofiaAdulti,
    PoCervelloPediatrico,
    PoliclinicoPalermo,
    PsSciacca,
    PsRibera,
    PsAgrigento,
    PsCanicatti,
    PsLicata,
    PsSantelia,
    PsIngrassia,
    PsPartinico,
    PsCorleone,
    PsPetralia,
    PsTermini,
    PoCivicoAdulti,
    PoCivicoPediatrico,
    PoRodolico,
    PoSanMarco,
    AoPapardo,
    PoliclinicoMessina,
}

impl SourceCode {
    /// Every code in standard registry order
    pub const ALL: [SourceCode; 21] = [
        Self::PoCervelloAdulti,
        Self::PoVillaSofiaAdulti,
        Self::PoCervelloPediatrico,
        Self::PoliclinicoPalermo,
        Self::PsSciacca,
        Self::PsRibera,
        Self::PsAgrigento,
        Self::PsCanicatti,
        Self::PsLicata,
        Self::PsSantelia,
        Self::PsIngrassia,
        Self::PsPartinico,
        Self::PsCorleone,
        Self::PsPetralia,
        Self::PsTermini,
        Self::PoCivicoAdulti,
        Self::PoCivicoPediatrico,
        Self::PoRodolico,
        Self::PoSanMarco,
        Self::AoPapardo,
        Self::PoliclinicoMessina,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PoCervelloAdulti => "PO_CERVELLO_ADULTI",
            Self::PoVillaSofiaAdulti => "PO_VILLA_SOFIA_ADULTI",
            Self::PoCervelloPediatrico => "PO_CERVELLO_PEDIATRICO",
            Self::PoliclinicoPalermo => "POLICLINICO_PALERMO",
            Self::PsSciacca => "PS_SCIACCA",
            Self::PsRibera => "PS_RIBERA",
            Self::PsAgrigento => "PS_AGRIGENTO",
            Self::PsCanicatti => "PS_CANICATTI",
            Self::PsLicata => "PS_LICATA",
            Self::PsSantelia => "PS_SANTELIA",
            Self::PsIngrassia => "PS_INGRASSIA",
            Self::PsPartinico => "PS_PARTINICO",
            Self::PsCorleone => "PS_CORLEONE",
            Self::PsPetralia => "PS_PETRALIA",
            Self::PsTermini => "PS_TERMINI",
            Self::PoCivicoAdulti => "PO_CIVICO_ADULTI",
            Self::PoCivicoPediatrico => "PO_CIVICO_PEDIATRICO",
            Self::PoRodolico => "PO_RODOLICO",
            Self::PoSanMarco => "PO_SAN_MARCO",
            Self::AoPapardo => "AO_PAPARDO",
            Self::PoliclinicoMessina => "POLICLINICO_MESSINA",
        }
    }

    /// Source family serving this code
    pub fn family(self) -> SourceFamily {
        match self {
            Self::PoCervelloAdulti | Self::PoVillaSofiaAdulti | Self::PoCervelloPediatrico => {
                SourceFamily::OspedaliRiuniti
            }
            Self::PoliclinicoPalermo => SourceFamily::PoliclinicoPalermo,
            Self::PsSciacca
            | Self::PsRibera
            | Self::PsAgrigento
            | Self::PsCanicatti
            | Self::PsLicata => SourceFamily::AspAgrigento,
            Self::PsSantelia => SourceFamily::AspCaltanissetta,
            Self::PsIngrassia
            | Self::PsPartinico
            | Self::PsCorleone
            | Self::PsPetralia
            | Self::PsTermini => SourceFamily::AspPalermo,
            Self::PoCivicoAdulti | Self::PoCivicoPediatrico => SourceFamily::ArnasCivico,
            Self::PoRodolico | Self::PoSanMarco => SourceFamily::PoliclinicoCatania,
            Self::AoPapardo => SourceFamily::AoPapardo,
            Self::PoliclinicoMessina => SourceFamily::PoliclinicoMessina,
        }
    }
}

impl fmt::Display for SourceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceCode {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == wanted)
            .ok_or_else(|| RegistryError::UnknownSourceCode(s.to_string()))
    }
}

/// Group of codes sharing one endpoint and parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFamily {
    OspedaliRiuniti,
    PoliclinicoPalermo,
    AspAgrigento,
    AspCaltanissetta,
    AspPalermo,
    ArnasCivico,
    PoliclinicoCatania,
    AoPapardo,
    PoliclinicoMessina,
}

impl SourceFamily {
    /// Key used in `sources.endpoints`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OspedaliRiuniti => "ospedali_riuniti",
            Self::PoliclinicoPalermo => "policlinico_palermo",
            Self::AspAgrigento => "asp_agrigento",
            Self::AspCaltanissetta => "asp_caltanissetta",
            Self::AspPalermo => "asp_palermo",
            Self::ArnasCivico => "arnas_civico",
            Self::PoliclinicoCatania => "policlinico_catania",
            Self::AoPapardo => "ao_papardo",
            Self::PoliclinicoMessina => "policlinico_messina",
        }
    }

    /// Production endpoint (or API base) for the family
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OspedaliRiuniti => ospedali_riuniti::BASE_URL,
            Self::PoliclinicoPalermo => policlinico_palermo::BASE_URL,
            Self::AspAgrigento => asp_agrigento::BASE_URL,
            Self::AspCaltanissetta => asp_caltanissetta::BASE_URL,
            Self::AspPalermo => asp_palermo::BASE_URL,
            Self::ArnasCivico => arnas_civico::BASE_URL,
            Self::PoliclinicoCatania => policlinico_catania::BASE_URL,
            Self::AoPapardo => ao_papardo::BASE_URL,
            Self::PoliclinicoMessina => policlinico_messina::BASE_URL,
        }
    }
}

// ============================================================================
// Construction context
// ============================================================================

/// Shared collaborators handed to every strategy constructor
#[derive(Clone)]
pub struct ScraperContext {
    pub transport: Arc<dyn Transport>,

    /// Base URL overrides keyed by [`SourceFamily::as_str`]
    pub endpoints: HashMap<String, String>,
}

impl ScraperContext {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            endpoints: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_endpoints(mut self, endpoints: HashMap<String, String>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Override one family's base URL
    #[must_use]
    pub fn with_endpoint(mut self, family: SourceFamily, url: impl Into<String>) -> Self {
        self.endpoints.insert(family.as_str().to_string(), url.into());
        self
    }

    /// Effective base URL for a family, without a trailing slash for API bases
    pub fn base_url(&self, family: SourceFamily) -> String {
        self.endpoints
            .get(family.as_str())
            .cloned()
            .unwrap_or_else(|| family.default_base_url().to_string())
    }
}

/// Identity a strategy instance was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceBinding {
    pub hospital_id: i64,
    pub code: SourceCode,
}

// ============================================================================
// Strategy contract
// ============================================================================

/// Extraction contract driven by the ingestion service
#[async_trait]
pub trait HospitalScraper: Send + Sync {
    fn hospital_id(&self) -> i64;

    fn source_code(&self) -> SourceCode;

    /// Fetch and normalize the current state
    ///
    /// Fails when the page or payload lacks the structure the source relies on.
    async fn scrape(&self) -> Result<HospitalStatusCreate, ScrapeError>;

    /// Independent fetch-and-check run before a scrape is trusted
    ///
    /// Returns `Ok(false)` for suspicious or unparseable data and `Err` only
    /// for transport failures.
    async fn validate_data(&self) -> Result<bool, FetchError>;

    /// Colour distribution without the rest of the record
    async fn color_distribution(&self) -> Result<ColorCodeDistribution, ScrapeError> {
        Ok(self.scrape().await?.color_distribution)
    }
}

/// What a concrete source implements
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    fn binding(&self) -> SourceBinding;

    /// Whether a missing source timestamp fails validation
    fn requires_timestamp(&self) -> bool {
        true
    }

    async fn fetch_snapshot(&self) -> Result<SourceSnapshot, ScrapeError>;
}

#[async_trait]
impl<T: SnapshotSource> HospitalScraper for T {
    fn hospital_id(&self) -> i64 {
        self.binding().hospital_id
    }

    fn source_code(&self) -> SourceCode {
        self.binding().code
    }

    async fn scrape(&self) -> Result<HospitalStatusCreate, ScrapeError> {
        let binding = self.binding();
        let snapshot = self.fetch_snapshot().await?;
        Ok(snapshot.into_status(binding.hospital_id, Utc::now()))
    }

    async fn validate_data(&self) -> Result<bool, FetchError> {
        let binding = self.binding();
        match self.fetch_snapshot().await {
            Ok(snapshot) => Ok(snapshot.validate(self.requires_timestamp(), binding.code.as_str())),
            Err(ScrapeError::Parse(e)) => {
                tracing::warn!(
                    hospital_id = binding.hospital_id,
                    source = %binding.code,
                    error = %e,
                    "Validation fetch returned unparseable data"
                );
                Ok(false)
            }
            Err(ScrapeError::Fetch(e)) => Err(e),
        }
    }

    async fn color_distribution(&self) -> Result<ColorCodeDistribution, ScrapeError> {
        Ok(self.fetch_snapshot().await?.distribution())
    }
}

/// Decode a JSON body, mapping malformed payloads to a structural error
pub(crate) fn parse_json(body: &str) -> Result<serde_json::Value, crate::utils::error::ParseError> {
    serde_json::from_str(body)
        .map_err(|e| crate::utils::error::ParseError::InvalidJson(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_code_round_trip_names() {
        for code in SourceCode::ALL {
            assert_eq!(code.as_str().parse::<SourceCode>().unwrap(), code);
        }
        assert_eq!("ps_sciacca".parse::<SourceCode>().unwrap(), SourceCode::PsSciacca);
        assert!(matches!(
            "PS_NOWHERE".parse::<SourceCode>(),
            Err(RegistryError::UnknownSourceCode(_))
        ));
    }

    #[test]
    fn test_families() {
        assert_eq!(SourceCode::PsLicata.family(), SourceFamily::AspAgrigento);
        assert_eq!(SourceCode::PoCervelloPediatrico.family(), SourceFamily::OspedaliRiuniti);
        assert_eq!(SourceCode::PoSanMarco.family(), SourceFamily::PoliclinicoCatania);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&SourceCode::AoPapardo).unwrap();
        assert_eq!(json, "\"AO_PAPARDO\"");
    }
}
