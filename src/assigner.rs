use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AssignmentResult, Criteria, MatchStrength, PersonaLabel, SignalSnapshot, WindowType,
};
use crate::rules;
use crate::store::{AssignmentStore, SignalStore};
use crate::strength;

/// Secondary personas kept after the primary.
pub const MAX_SECONDARY_PERSONAS: usize = 2;

pub const NO_DATA_MESSAGE: &str = "No credit or income signals available for this window";
pub const NO_MATCH_NOTE: &str = "No specific persona criteria met";

pub struct PersonaAssigner {
    signals: Arc<dyn SignalStore>,
    assignments: Arc<dyn AssignmentStore>,
}

impl PersonaAssigner {
    pub fn new(signals: Arc<dyn SignalStore>, assignments: Arc<dyn AssignmentStore>) -> Self {
        Self {
            signals,
            assignments,
        }
    }

    /// Classify a user for a window given as its wire label (`30d`, `180d`).
    /// Any other label is rejected before the signal store is touched.
    pub async fn assign_personas(&self, user_id: &str, window_type: &str) -> Result<AssignmentResult> {
        let window: WindowType = window_type.parse().map_err(|err| {
            warn!(user_id, window = window_type, "rejected window type");
            err
        })?;
        self.assign_for_window(user_id, window).await
    }

    pub async fn assign_for_window(
        &self,
        user_id: &str,
        window: WindowType,
    ) -> Result<AssignmentResult> {
        let snapshot = self
            .signals
            .load_snapshot(user_id, window)
            .await?
            .unwrap_or_default();
        let result = evaluate(user_id, window, &snapshot, Utc::now());

        info!(
            user_id,
            window = %window,
            persona = %result.primary_persona,
            strength = %result.primary_match_strength,
            matches = result.all_matches.len(),
            "persona assigned"
        );
        Ok(result)
    }

    /// Append the result as a new record. Storage errors are returned as-is.
    pub async fn store_assignment(&self, result: &AssignmentResult) -> Result<Uuid> {
        let id = self.assignments.store_assignment(result).await?;
        debug!(user_id = %result.user_id, window = %result.window_type, %id, "assignment stored");
        Ok(id)
    }

    /// Assign and store in one step.
    pub async fn assign_and_store(
        &self,
        user_id: &str,
        window_type: &str,
    ) -> Result<(Uuid, AssignmentResult)> {
        let result = self.assign_personas(user_id, window_type).await?;
        let id = self.store_assignment(&result).await?;
        Ok((id, result))
    }
}

/// Evaluate every persona against `snapshot` and build the assignment.
///
/// The primary persona is the highest-priority match. A strong match on a
/// lower-priority persona never displaces it.
pub fn evaluate(
    user_id: &str,
    window: WindowType,
    snapshot: &SignalSnapshot,
    assigned_at: DateTime<Utc>,
) -> AssignmentResult {
    let mut result = AssignmentResult {
        user_id: user_id.to_string(),
        window_type: window,
        primary_persona: PersonaLabel::Unclassified,
        primary_match_strength: MatchStrength::Unclassified,
        secondary_personas: Vec::new(),
        criteria_met: Criteria::new(),
        all_matches: Vec::new(),
        assigned_at,
        error: None,
        user_metadata: snapshot.user_metadata.clone(),
    };

    if snapshot.is_empty() || !snapshot.has_core_signals() {
        debug!(user_id, window = %window, "no usable signals");
        result.error = Some(NO_DATA_MESSAGE.to_string());
        return result;
    }

    let matches = rules::matching_personas(snapshot);
    debug!(user_id, window = %window, ?matches, "persona rules evaluated");

    let Some((&primary, rest)) = matches.split_first() else {
        result.primary_persona = PersonaLabel::General;
        result.primary_match_strength = MatchStrength::Default;
        result
            .criteria_met
            .insert("note".to_string(), json!(NO_MATCH_NOTE));
        return result;
    };

    result.primary_persona = PersonaLabel::Matched(primary);
    result.primary_match_strength = strength::calculate_strength(primary, snapshot);
    result.criteria_met = rules::extract_criteria(primary, snapshot);
    result.secondary_personas = rest.iter().take(MAX_SECONDARY_PERSONAS).copied().collect();
    result.all_matches = matches;
    result
}
