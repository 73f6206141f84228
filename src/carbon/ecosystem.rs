//! Blue-carbon ecosystem taxonomy and sequestration rate tables
//!
//! Rates are conservative literature values in kg CO2 per hectare per year,
//! split into a soil component (long-term storage) and a biomass component.

use crate::analysis::health::ImageAnalysisResult;
use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Standard rate used for ecosystems without a published restoration rate
const DEFAULT_STANDARD_RATE: f64 = 4000.0;

/// Ecosystem inferred from (or declared for) a project site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EcosystemType {
    Mangrove,
    Seagrass,
    SaltMarsh,
    CoastalWetland,
    RestoredVegetation,
    DegradedRecovery,
}

impl EcosystemType {
    /// Infer the ecosystem from an analysed image, first match wins
    pub fn infer(analysis: &ImageAnalysisResult) -> Self {
        let mangrove = analysis.detection.mangrove_likelihood;
        let water = analysis.composition.water_percentage;
        let coverage = analysis.vegetation.total_coverage;

        if mangrove > 20.0 && water > 10.0 {
            EcosystemType::Mangrove
        } else if water > 30.0 && coverage > 40.0 {
            EcosystemType::Seagrass
        } else if water > 15.0 && coverage > 50.0 {
            EcosystemType::SaltMarsh
        } else if water > 5.0 && coverage > 30.0 {
            EcosystemType::CoastalWetland
        } else if coverage > 20.0 {
            EcosystemType::RestoredVegetation
        } else {
            EcosystemType::DegradedRecovery
        }
    }

    /// Soil carbon sequestration rate (kg CO2/ha/yr)
    pub fn soil_rate(&self) -> f64 {
        match self {
            EcosystemType::Mangrove => 5000.0,
            EcosystemType::Seagrass => 4500.0,
            EcosystemType::SaltMarsh => 5500.0,
            EcosystemType::CoastalWetland => 4000.0,
            EcosystemType::RestoredVegetation => 3000.0,
            EcosystemType::DegradedRecovery => 2000.0,
        }
    }

    /// Biomass carbon sequestration rate (kg CO2/ha/yr)
    pub fn biomass_rate(&self) -> f64 {
        match self {
            EcosystemType::Mangrove => 2000.0,
            EcosystemType::Seagrass => 500.0,
            EcosystemType::SaltMarsh => 1500.0,
            EcosystemType::CoastalWetland => 1000.0,
            EcosystemType::RestoredVegetation => 800.0,
            EcosystemType::DegradedRecovery => 500.0,
        }
    }

    /// Standard restoration rate (kg CO2/ha/yr) used for comparison
    pub fn standard_rate(&self) -> f64 {
        match self {
            EcosystemType::Mangrove | EcosystemType::SaltMarsh => 7000.0,
            EcosystemType::Seagrass => 3000.0,
            EcosystemType::CoastalWetland => 4000.0,
            EcosystemType::RestoredVegetation | EcosystemType::DegradedRecovery => {
                DEFAULT_STANDARD_RATE
            }
        }
    }

    /// Ecosystems that earn the ecosystem-type credit bonus
    pub fn has_premium_bonus(&self) -> bool {
        matches!(self, EcosystemType::Mangrove | EcosystemType::SaltMarsh)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EcosystemType::Mangrove => "mangrove",
            EcosystemType::Seagrass => "seagrass",
            EcosystemType::SaltMarsh => "salt_marsh",
            EcosystemType::CoastalWetland => "coastal_wetland",
            EcosystemType::RestoredVegetation => "restored_vegetation",
            EcosystemType::DegradedRecovery => "degraded_recovery",
        }
    }

    /// Title-cased name for reports, e.g. "Salt Marsh"
    pub fn display_name(&self) -> String {
        title_case(self.as_str())
    }
}

impl fmt::Display for EcosystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EcosystemType {
    type Err = AnalysisError;

    /// Parse an ecosystem name; accepts `saltmarsh` and `mixed` as aliases
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "mangrove" => Ok(EcosystemType::Mangrove),
            "seagrass" => Ok(EcosystemType::Seagrass),
            "salt_marsh" | "saltmarsh" => Ok(EcosystemType::SaltMarsh),
            "coastal_wetland" | "mixed" => Ok(EcosystemType::CoastalWetland),
            "restored_vegetation" => Ok(EcosystemType::RestoredVegetation),
            "degraded_recovery" => Ok(EcosystemType::DegradedRecovery),
            _ => Err(AnalysisError::invalid_parameter("ecosystem_type", s)),
        }
    }
}

/// `barren_to_dense` -> `Barren To Dense`
pub(crate) fn title_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
