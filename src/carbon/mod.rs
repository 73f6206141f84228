//! CO2 sequestration and carbon credit calculation

pub mod credits;
pub mod ecosystem;
pub mod pipeline;
pub mod report;
pub mod sequestration;

pub use credits::{legacy_credits, CreditCalculator, CreditDistribution, ProjectMetadata};
pub use ecosystem::EcosystemType;
pub use pipeline::{
    calculate_dynamic_credits, CreditCalculationResult, DynamicCreditCalculator,
    SupportingAnalysis,
};
pub use sequestration::{Co2Calculator, Co2Result};
