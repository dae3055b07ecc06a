//! Profile-set curation: automatic selection and manual selection rules.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// Size of the profile set and the upper bound of `selected_profile_order`.
pub const PROFILE_SET_SIZE: i16 = 6;

/// A generated image considered for selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurationCandidate {
    pub image_id: DbId,
    pub scenario: String,
}

/// One `(image, order)` assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSelection {
    pub generated_image_id: DbId,
    pub order: i16,
}

/// Pick up to [`PROFILE_SET_SIZE`] images, one per scenario per round.
///
/// Scenarios are visited in `scenario_order`; scenarios that produced
/// images but are not listed there follow in order of first appearance.
/// Within a scenario images keep their input order. Round `k` takes the
/// `k`-th image of every scenario that still has one, so a set with six
/// distinct scenarios gets one image each before any scenario repeats.
pub fn auto_select(scenario_order: &[String], candidates: &[CurationCandidate]) -> Vec<ProfileSelection> {
    let mut scenarios: Vec<&str> = Vec::new();
    for s in scenario_order {
        if !scenarios.contains(&s.as_str()) {
            scenarios.push(s);
        }
    }
    for c in candidates {
        if !scenarios.contains(&c.scenario.as_str()) {
            scenarios.push(&c.scenario);
        }
    }

    let groups: Vec<Vec<DbId>> = scenarios
        .iter()
        .map(|s| {
            candidates
                .iter()
                .filter(|c| c.scenario == *s)
                .map(|c| c.image_id)
                .collect()
        })
        .collect();

    let limit = PROFILE_SET_SIZE as usize;
    let mut picked: Vec<DbId> = Vec::with_capacity(limit);
    let mut round = 0;
    while picked.len() < limit {
        let mut took_any = false;
        for group in &groups {
            if picked.len() == limit {
                break;
            }
            if let Some(&id) = group.get(round) {
                if !picked.contains(&id) {
                    picked.push(id);
                    took_any = true;
                }
            }
        }
        if !took_any {
            break;
        }
        round += 1;
    }

    picked
        .into_iter()
        .zip(1..)
        .map(|(generated_image_id, order)| ProfileSelection {
            generated_image_id,
            order,
        })
        .collect()
}

fn ensure_order_in_range(order: i16) -> Result<(), CoreError> {
    if (1..=PROFILE_SET_SIZE).contains(&order) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Profile order must be between 1 and {PROFILE_SET_SIZE}, got {order}"
        )))
    }
}

/// Validate a full manual selection. An empty list is valid and clears
/// the selection.
pub fn validate_selection(selections: &[ProfileSelection]) -> Result<(), CoreError> {
    if selections.len() > PROFILE_SET_SIZE as usize {
        return Err(CoreError::Validation(format!(
            "At most {PROFILE_SET_SIZE} profile photos may be selected"
        )));
    }
    let mut orders = HashSet::new();
    let mut images = HashSet::new();
    for s in selections {
        ensure_order_in_range(s.order)?;
        if !orders.insert(s.order) {
            return Err(CoreError::Validation(format!(
                "Profile order {} is used more than once",
                s.order
            )));
        }
        if !images.insert(s.generated_image_id) {
            return Err(CoreError::Validation(format!(
                "Image {} is selected more than once",
                s.generated_image_id
            )));
        }
    }
    Ok(())
}

/// Result of planning a single-image toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TogglePlan {
    /// The image was selected; clear its order.
    Clear,
    /// Give the image `order`, first clearing `evict` if another image held it.
    Assign { order: i16, evict: Option<DbId> },
}

/// Plan a toggle of `image_id` against the owner's current selection.
pub fn plan_toggle(
    image_id: DbId,
    requested: Option<i16>,
    current: &[ProfileSelection],
) -> Result<TogglePlan, CoreError> {
    if current.iter().any(|s| s.generated_image_id == image_id) {
        return Ok(TogglePlan::Clear);
    }

    match requested {
        Some(order) => {
            ensure_order_in_range(order)?;
            let evict = current
                .iter()
                .find(|s| s.order == order)
                .map(|s| s.generated_image_id);
            Ok(TogglePlan::Assign { order, evict })
        }
        None => (1..=PROFILE_SET_SIZE)
            .find(|o| current.iter().all(|s| s.order != *o))
            .map(|order| TogglePlan::Assign { order, evict: None })
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "All {PROFILE_SET_SIZE} profile slots are taken; pass an order to replace one"
                ))
            }),
    }
}
