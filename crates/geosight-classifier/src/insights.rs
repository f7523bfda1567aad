//! Static terrain insights

use geosight_core::{ClassLabel, Insight};
use std::collections::HashMap;

/// Insight returned for labels the catalog does not know
pub const FALLBACK_INSIGHT: Insight =
    Insight::new("Terrain type not recognized.", "Manual review required.");

const INSIGHTS: [(ClassLabel, Insight); ClassLabel::COUNT] = [
    (
        ClassLabel::AnnualCrop,
        Insight::new(
            "Detected cultivated land used for seasonal farming (e.g., corn, wheat, vegetables).",
            "Monitor soil moisture levels for irrigation scheduling. Check for pest outbreaks common in seasonal monocultures.",
        ),
    ),
    (
        ClassLabel::Forest,
        Insight::new(
            "Detected dense natural forest or woodland area.",
            "Eligible for Carbon Credit verification. Monitor for illegal logging activities or encroachments using change detection.",
        ),
    ),
    (
        ClassLabel::HerbaceousVegetation,
        Insight::new(
            "Detected natural grasslands, savannas, or non-woody plant cover.",
            "Assess suitability for livestock grazing. Monitor fire risks during dry seasons as this terrain is highly combustible.",
        ),
    ),
    (
        ClassLabel::Highway,
        Insight::new(
            "Detected major transportation infrastructure (paved roads).",
            "Analyze traffic flow efficiency. Check for surface degradation or need for maintenance in this sector.",
        ),
    ),
    (
        ClassLabel::Industrial,
        Insight::new(
            "Detected industrial facilities, warehouses, or factories.",
            "Verify environmental compliance regarding emissions. cross-reference with zoning laws for urban expansion planning.",
        ),
    ),
    (
        ClassLabel::Pasture,
        Insight::new(
            "Detected grazing land for livestock.",
            "Rotate grazing schedules to prevent soil erosion. Test soil nutrient levels to ensure quality fodder.",
        ),
    ),
    (
        ClassLabel::PermanentCrop,
        Insight::new(
            "Detected long-term agricultural plantations (e.g., vineyards, orchards, coffee).",
            "Focus on long-term disease prevention. Inspect irrigation infrastructure as these crops require consistent water delivery.",
        ),
    ),
    (
        ClassLabel::Residential,
        Insight::new(
            "Detected human housing and settlement areas.",
            "Analyze population density for utility planning (water/electricity). Monitor for unauthorized urban sprawl.",
        ),
    ),
    (
        ClassLabel::River,
        Insight::new(
            "Detected flowing water body.",
            "Monitor water levels for flood early warning systems. Test for upstream pollution or sediment runoff.",
        ),
    ),
    (
        ClassLabel::SeaLake,
        Insight::new(
            "Detected large standing water body.",
            "Monitor for algal blooms or water quality changes. Surveillance required for illegal fishing or unauthorized dumping.",
        ),
    ),
];

/// Immutable label to insight lookup, built once at startup
#[derive(Debug, Clone)]
pub struct InsightCatalog {
    entries: HashMap<ClassLabel, Insight>,
}

impl InsightCatalog {
    /// Catalog covering every terrain class
    pub fn new() -> Self {
        Self::from_entries(INSIGHTS)
    }

    /// Catalog from explicit entries; missing labels resolve to the fallback
    pub fn from_entries(entries: impl IntoIterator<Item = (ClassLabel, Insight)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Insight for a label
    pub fn insight_for(&self, label: ClassLabel) -> &Insight {
        self.entries.get(&label).unwrap_or(&FALLBACK_INSIGHT)
    }

    /// Insight for a class name, falling back for names outside the class set
    pub fn insight_for_name(&self, name: &str) -> &Insight {
        match name.parse::<ClassLabel>() {
            Ok(label) => self.insight_for(label),
            Err(_) => &FALLBACK_INSIGHT,
        }
    }

    /// Number of authored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InsightCatalog {
    fn default() -> Self {
        Self::new()
    }
}
