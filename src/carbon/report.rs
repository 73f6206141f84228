//! Human-readable report text for audit trails

use crate::analysis::transformation::{TransformationMetrics, VerificationScore};
use crate::carbon::credits::CreditBreakdown;
use crate::carbon::ecosystem::title_case;
use crate::carbon::sequestration::{default_carbon_credits, Co2Result};

/// Step-by-step account of a credit calculation
///
/// The bonus section is only present when bonuses changed the result.
pub fn calculation_summary(
    co2: &Co2Result,
    metrics: &TransformationMetrics,
    verification: &VerificationScore,
    breakdown: &CreditBreakdown,
) -> String {
    let mut lines = vec![
        "CARBON CREDIT CALCULATION SUMMARY".to_string(),
        "=".repeat(40),
        "1. Base Calculation:".to_string(),
        format!("   • CO2 Sequestration: {:.1} kg", co2.co2_sequestration_kg),
        format!("   • Base Credits: {:.2}", breakdown.base_credits),
        "2. Quality Adjustments:".to_string(),
        format!(
            "   • Transformation Quality: {}",
            title_case(metrics.transformation_quality.as_str())
        ),
        format!("   • Verification Confidence: {:.1}%", verification.overall_score),
        format!("   • Quality Adjusted Credits: {:.2}", breakdown.quality_adjusted_credits),
    ];

    if breakdown.bonus_adjusted_credits > breakdown.quality_adjusted_credits {
        lines.push("3. Project Bonuses Applied:".to_string());
        lines.push(format!("   • Bonus Adjusted Credits: {:.2}", breakdown.bonus_adjusted_credits));
    }

    lines.push("4. Final Validation:".to_string());
    lines.push(format!("   • Validated Credits: {:.2}", breakdown.final_validated_credits));
    lines.push(format!(
        "5. Recommendation: {}",
        title_case(verification.recommended_action.as_str())
    ));

    lines.join("\n")
}

/// Narrative comparison of the before/after pair and the CO2 estimate
pub fn comparison_report(metrics: &TransformationMetrics, co2: &Co2Result) -> String {
    let conversion = default_carbon_credits(co2.co2_sequestration_kg);

    [
        "EXECUTIVE SUMMARY:".to_string(),
        format!(
            "Vegetation coverage changed by {:.1}%, resulting in {:.1} kg CO2 sequestration",
            metrics.vegetation_change_percentage, co2.co2_sequestration_kg
        ),
        format!(
            "Transformation quality: {}",
            title_case(metrics.transformation_quality.as_str())
        ),
        format!("Recommended carbon credits: {:.2}", conversion.carbon_credits),
        String::new(),
        "DETAILED ANALYSIS:".to_string(),
        format!("• Before: {:.1}% vegetation coverage", metrics.before_vegetation_coverage),
        format!("• After: {:.1}% vegetation coverage", metrics.after_vegetation_coverage),
        format!("• Net change: {:.1} percentage points", metrics.vegetation_change_absolute),
        format!("• NDVI improvement: {:.3}", metrics.ndvi_improvement),
        format!("• Detected ecosystem: {}", co2.ecosystem_type.display_name()),
        format!(
            "• Transformation type: {}",
            title_case(metrics.transformation_type.as_str())
        ),
        String::new(),
        "CARBON SEQUESTRATION CALCULATION:".to_string(),
        format!(
            "• Sequestration rates: {:.0} kg/ha/yr soil, {:.0} kg/ha/yr biomass",
            co2.soil_rate_kg_ha_year, co2.biomass_rate_kg_ha_year
        ),
        format!("• Project area: {:.2} hectares", co2.project_area_hectares),
        format!("• Transformation multiplier: {:.2}", co2.transformation_multiplier),
        format!("• Greenery multiplier: {:.2}", co2.greenery_multiplier),
        format!(
            "• Total CO2 sequestration: {:.1} kg ({:.3} tonnes)",
            co2.co2_sequestration_kg, co2.co2_sequestration_tonnes
        ),
    ]
    .join("\n")
}
