//! Confidence band and synthetic comparable-listing synthesis.

use super::{
    round1, round2, ComparableListing, ConfidenceRange, PropertyAttributes, PropertyDomain,
};

/// Symmetric ±10% band around the final estimate.
pub fn confidence_range(estimate: f64) -> ConfidenceRange {
    ConfidenceRange {
        low: round2(estimate * 0.9),
        high: round2(estimate * 1.1),
    }
}

/// Three synthetic listings with fixed price ratios (0.95, 1.00, 1.05)
/// and area ratios (0.90, 0.95, 1.00) against the final estimate. The
/// address template differs by domain: HDB listings carry a block prefix
/// and name the precinct, private listings name the location.
pub fn synthesize_comparables(
    estimate: f64,
    attrs: &PropertyAttributes,
    domain: PropertyDomain,
) -> Vec<ComparableListing> {
    let postal = attrs.postal_code.as_deref().unwrap_or("123456");
    (0..3)
        .map(|i| {
            let price_ratio = 0.95 + 0.05 * i as f64;
            let area_ratio = 0.90 + 0.05 * i as f64;
            let address = match domain {
                PropertyDomain::Hdb => format!(
                    "Blk {} {}, Singapore {}",
                    100 + i,
                    attrs.precinct.as_deref().unwrap_or("Sample Street"),
                    postal
                ),
                PropertyDomain::Private => format!(
                    "{} {}, Singapore {}",
                    100 + i,
                    attrs.location.as_deref().unwrap_or("Sample Street"),
                    postal
                ),
            };
            ComparableListing {
                address,
                transaction_date: format!("2024-0{}-15", i + 1),
                price: round2(estimate * price_ratio),
                area_sqm: round1(attrs.area_sqm * area_ratio),
                property_type: attrs.property_type.clone(),
            }
        })
        .collect()
}
