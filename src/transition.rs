use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::{
    Celebration, Persona, PersonaLabel, StoredAssignment, TransitionPolarity, TransitionRecord,
    TransitionResult, UserMetadata, WindowType,
};
use crate::store::AssignmentStore;

pub const INSUFFICIENT_HISTORY_NOTE: &str =
    "Insufficient assignment history: at least 2 assignments are needed";
pub const NO_CHANGE_NOTE: &str = "Primary persona unchanged";

/// A from/to pair recognised as a financial improvement.
struct Improvement {
    from: Persona,
    to: PersonaLabel,
    requires_graduation: bool,
    milestone: &'static str,
    achievement_title: &'static str,
    message: &'static str,
}

const IMPROVEMENTS: &[Improvement] = &[
    Improvement {
        from: Persona::HighUtilization,
        to: PersonaLabel::Matched(Persona::SavingsBuilder),
        requires_graduation: false,
        milestone: "credit_to_savings",
        achievement_title: "Financial Health Turnaround",
        message: "🎉 You paid down your cards and started building savings. That is a real turnaround!",
    },
    Improvement {
        from: Persona::Student,
        to: PersonaLabel::Matched(Persona::SavingsBuilder),
        requires_graduation: true,
        milestone: "student_to_independence",
        achievement_title: "Financial Independence",
        message: "🎓 Student days are behind you and your savings are growing. Welcome to financial independence!",
    },
    Improvement {
        from: Persona::VariableIncomeBudgeter,
        to: PersonaLabel::Matched(Persona::SavingsBuilder),
        requires_graduation: false,
        milestone: "income_stabilized",
        achievement_title: "Steady Ground",
        message: "🌱 Your cash-flow buffer held up and savings are climbing. Steady ground reached!",
    },
    Improvement {
        from: Persona::SubscriptionHeavy,
        to: PersonaLabel::Matched(Persona::SavingsBuilder),
        requires_graduation: false,
        milestone: "subscriptions_to_savings",
        achievement_title: "Spending Streamliner",
        message: "✂️ You trimmed recurring spend and redirected it into savings. Nicely streamlined!",
    },
    Improvement {
        from: Persona::HighUtilization,
        to: PersonaLabel::General,
        requires_graduation: false,
        milestone: "credit_under_control",
        achievement_title: "Credit Under Control",
        message: "💪 Your credit usage is back in a healthy range. Keep it up!",
    },
];

/// True when the user left student circumstances between two assignments:
/// the age bracket moved out of 18-25 or the student loan flag cleared.
pub fn has_graduated(older: Option<&UserMetadata>, newer: Option<&UserMetadata>) -> bool {
    let (Some(older), Some(newer)) = (older, newer) else {
        return false;
    };
    let aged_out = older.in_student_age_bracket()
        && newer.age_bracket.is_some()
        && !newer.in_student_age_bracket();
    let loan_cleared = older.has_student_loan() && newer.has_student_loan == Some(false);
    aged_out || loan_cleared
}

/// Polarity of a persona change, plus celebration metadata for positive ones.
pub fn classify_transition(
    from: PersonaLabel,
    to: PersonaLabel,
    graduated: bool,
) -> (TransitionPolarity, Option<Celebration>) {
    let celebrated = from.persona().and_then(|from_persona| {
        IMPROVEMENTS.iter().find(|improvement| {
            improvement.from == from_persona
                && improvement.to == to
                && (graduated || !improvement.requires_graduation)
        })
    });
    if let Some(improvement) = celebrated {
        let celebration = Celebration {
            celebration_message: improvement.message.to_string(),
            milestone: improvement.milestone.to_string(),
            achievement_title: improvement.achievement_title.to_string(),
        };
        return (TransitionPolarity::Positive, Some(celebration));
    }

    let polarity = match (from, to) {
        (PersonaLabel::Unclassified, _) | (_, PersonaLabel::Unclassified) => {
            TransitionPolarity::Neutral
        }
        (from, PersonaLabel::Matched(to)) if to.is_risk() => {
            if from.persona().is_some_and(|p| p.is_risk()) {
                TransitionPolarity::Neutral
            } else {
                TransitionPolarity::Negative
            }
        }
        (PersonaLabel::Matched(Persona::SavingsBuilder), _) => TransitionPolarity::Negative,
        _ => TransitionPolarity::Neutral,
    };
    (polarity, None)
}

fn no_transition(
    user_id: &str,
    window: WindowType,
    current: Option<PersonaLabel>,
    note: &str,
) -> TransitionResult {
    TransitionResult {
        user_id: user_id.to_string(),
        window_type: window,
        transition_detected: false,
        from_persona: None,
        to_persona: None,
        transition_date: None,
        days_in_previous_persona: None,
        is_positive_transition: false,
        polarity: None,
        celebration: None,
        current_persona: current,
        note: Some(note.to_string()),
        transition_id: None,
    }
}

/// Compare the newest two assignments in `recent` (newest first).
pub fn compare_assignments(
    user_id: &str,
    window: WindowType,
    recent: &[StoredAssignment],
) -> TransitionResult {
    let [newer, older, ..] = recent else {
        let current = recent.first().map(|row| row.result.primary_persona);
        return no_transition(user_id, window, current, INSUFFICIENT_HISTORY_NOTE);
    };
    let (newer, older) = (&newer.result, &older.result);

    if newer.primary_persona == older.primary_persona {
        return no_transition(user_id, window, Some(newer.primary_persona), NO_CHANGE_NOTE);
    }

    let graduated = has_graduated(older.user_metadata.as_ref(), newer.user_metadata.as_ref());
    let (polarity, celebration) =
        classify_transition(older.primary_persona, newer.primary_persona, graduated);
    let days = (newer.assigned_at - older.assigned_at).num_days().max(0);

    TransitionResult {
        user_id: user_id.to_string(),
        window_type: window,
        transition_detected: true,
        from_persona: Some(older.primary_persona),
        to_persona: Some(newer.primary_persona),
        transition_date: Some(newer.assigned_at),
        days_in_previous_persona: Some(days),
        is_positive_transition: celebration.is_some(),
        polarity: Some(polarity),
        celebration,
        current_persona: Some(newer.primary_persona),
        note: None,
        transition_id: None,
    }
}

impl TransitionResult {
    /// The record to persist for a detected transition.
    pub fn to_record(&self) -> Option<TransitionRecord> {
        if !self.transition_detected {
            return None;
        }
        Some(TransitionRecord {
            user_id: self.user_id.clone(),
            window_type: self.window_type,
            from_persona: self.from_persona?,
            to_persona: self.to_persona?,
            transition_date: self.transition_date?,
            days_in_previous_persona: self.days_in_previous_persona.unwrap_or(0),
            celebration_shown: self.is_positive_transition,
            milestone_achieved: self.celebration.as_ref().map(|c| c.milestone.clone()),
            achievement_title: self
                .celebration
                .as_ref()
                .map(|c| c.achievement_title.clone()),
        })
    }
}

pub struct TransitionTracker {
    assignments: Arc<dyn AssignmentStore>,
}

impl TransitionTracker {
    pub fn new(assignments: Arc<dyn AssignmentStore>) -> Self {
        Self { assignments }
    }

    pub async fn detect_transition(
        &self,
        user_id: &str,
        window_type: &str,
    ) -> Result<TransitionResult> {
        let window: WindowType = window_type.parse().map_err(|err| {
            warn!(user_id, window = window_type, "rejected window type");
            err
        })?;
        self.detect_for_window(user_id, window).await
    }

    /// Detect and, when the persona changed, append a transition record.
    pub async fn detect_for_window(
        &self,
        user_id: &str,
        window: WindowType,
    ) -> Result<TransitionResult> {
        let recent = self
            .assignments
            .load_recent_assignments(user_id, window, 2)
            .await?;
        let mut result = compare_assignments(user_id, window, &recent);

        let Some(record) = result.to_record() else {
            debug!(user_id, window = %window, note = ?result.note, "no transition");
            return Ok(result);
        };

        let id = self.assignments.store_transition(&record).await?;
        result.transition_id = Some(id);
        info!(
            user_id,
            window = %window,
            from = %record.from_persona,
            to = %record.to_persona,
            positive = record.celebration_shown,
            milestone = ?record.milestone_achieved,
            "persona transition recorded"
        );
        Ok(result)
    }
}
