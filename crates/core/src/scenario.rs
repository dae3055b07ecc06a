//! Scenario catalog for sample and full generation.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::CoreError;

/// Number of scenarios in every full generation request.
pub const FULL_SCENARIO_COUNT: usize = 6;

/// Fixed scenarios rendered for the pre-purchase preview.
pub const PREVIEW_SCENARIOS: [&str; 3] = ["studio", "outdoor_golden_hour", "business"];

/// One selectable scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScenarioInfo {
    pub slug: &'static str,
    pub label: &'static str,
}

/// Every scenario the generation service accepts.
pub const SCENARIO_CATALOG: &[ScenarioInfo] = &[
    ScenarioInfo { slug: "studio", label: "Studio portrait" },
    ScenarioInfo { slug: "outdoor_golden_hour", label: "Outdoor, golden hour" },
    ScenarioInfo { slug: "business", label: "Business headshot" },
    ScenarioInfo { slug: "casual_cafe", label: "Casual cafe" },
    ScenarioInfo { slug: "city_street", label: "City street" },
    ScenarioInfo { slug: "beach_sunset", label: "Beach at sunset" },
    ScenarioInfo { slug: "black_and_white", label: "Black and white" },
    ScenarioInfo { slug: "cozy_home", label: "Cozy at home" },
    ScenarioInfo { slug: "travel_landmark", label: "Travel landmark" },
    ScenarioInfo { slug: "fitness", label: "Active and fitness" },
    ScenarioInfo { slug: "evening_formal", label: "Evening formal" },
    ScenarioInfo { slug: "nature_trail", label: "Nature trail" },
];

pub fn is_known_scenario(slug: &str) -> bool {
    SCENARIO_CATALOG.iter().any(|s| s.slug == slug)
}

/// The preview scenarios as owned strings, in catalog order.
pub fn preview_scenarios() -> Vec<String> {
    PREVIEW_SCENARIOS.iter().map(|s| s.to_string()).collect()
}

/// Validate the scenario list of a full generation request.
///
/// The list must name exactly [`FULL_SCENARIO_COUNT`] distinct catalog
/// scenarios. Order is preserved by the caller and drives curation order.
pub fn validate_full_scenarios(scenarios: &[String]) -> Result<(), CoreError> {
    if scenarios.len() != FULL_SCENARIO_COUNT {
        return Err(CoreError::Validation(format!(
            "Exactly {FULL_SCENARIO_COUNT} scenarios are required, got {}",
            scenarios.len()
        )));
    }
    let mut seen = HashSet::with_capacity(scenarios.len());
    for slug in scenarios {
        if !is_known_scenario(slug) {
            return Err(CoreError::Validation(format!("Unknown scenario '{slug}'")));
        }
        if !seen.insert(slug.as_str()) {
            return Err(CoreError::Validation(format!(
                "Scenario '{slug}' is listed more than once"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(slugs: &[&str]) -> Vec<String> {
        slugs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn catalog_slugs_are_unique() {
        let unique: HashSet<_> = SCENARIO_CATALOG.iter().map(|s| s.slug).collect();
        assert_eq!(unique.len(), SCENARIO_CATALOG.len());
    }

    #[test]
    fn previews_are_in_catalog() {
        assert!(PREVIEW_SCENARIOS.iter().all(|s| is_known_scenario(s)));
    }

    #[test]
    fn six_distinct_known_scenarios_pass() {
        let s = owned(&[
            "studio",
            "business",
            "casual_cafe",
            "city_street",
            "beach_sunset",
            "fitness",
        ]);
        assert!(validate_full_scenarios(&s).is_ok());
    }

    #[test]
    fn wrong_count_is_rejected() {
        let s = owned(&["studio", "business"]);
        assert!(validate_full_scenarios(&s).is_err());
    }

    #[test]
    fn duplicate_is_rejected() {
        let s = owned(&[
            "studio",
            "studio",
            "casual_cafe",
            "city_street",
            "beach_sunset",
            "fitness",
        ]);
        let err = validate_full_scenarios(&s).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn unknown_is_rejected() {
        let s = owned(&[
            "studio",
            "moon_base",
            "casual_cafe",
            "city_street",
            "beach_sunset",
            "fitness",
        ]);
        let err = validate_full_scenarios(&s).unwrap_err();
        assert!(err.to_string().contains("moon_base"));
    }
}
