use std::collections::HashMap;
use std::fmt::Write;

use crate::error::Result;
use crate::models::{PersonaLabel, StoredAssignment, StoredTransition, WindowType};
use crate::store::AssignmentStore;

/// Stored history for one window, newest entries first.
#[derive(Debug, Clone)]
pub struct WindowHistory {
    pub window: WindowType,
    pub assignments: Vec<StoredAssignment>,
    pub transitions: Vec<StoredTransition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonaSummary {
    pub persona: PersonaLabel,
    pub count: usize,
}

pub async fn load_history(
    store: &dyn AssignmentStore,
    user_id: &str,
    limit: usize,
) -> Result<Vec<WindowHistory>> {
    let mut history = Vec::new();
    for window in WindowType::ALL {
        history.push(WindowHistory {
            window,
            assignments: store.load_recent_assignments(user_id, window, limit).await?,
            transitions: store.load_transitions(user_id, window).await?,
        });
    }
    Ok(history)
}

/// How often each primary persona appears, most frequent first.
pub fn summarize_personas(assignments: &[StoredAssignment]) -> Vec<PersonaSummary> {
    let mut counts: HashMap<PersonaLabel, usize> = HashMap::new();
    for assignment in assignments {
        *counts.entry(assignment.result.primary_persona).or_insert(0) += 1;
    }

    let mut summaries: Vec<PersonaSummary> = counts
        .into_iter()
        .map(|(persona, count)| PersonaSummary { persona, count })
        .collect();
    summaries.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.persona.as_str().cmp(b.persona.as_str()))
    });
    summaries
}

pub fn build_report(user_id: &str, history: &[WindowHistory]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Persona Progress Report");
    let _ = writeln!(output, "Generated for {}", user_id);

    for section in history {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Window {}", section.window);

        match section.assignments.first() {
            Some(latest) => {
                let result = &latest.result;
                let _ = writeln!(
                    output,
                    "Current persona: **{}** ({} match, assigned {})",
                    result.primary_persona.display_name(),
                    result.primary_match_strength,
                    result.assigned_at.format("%Y-%m-%d")
                );
                if !result.secondary_personas.is_empty() {
                    let names: Vec<&str> = result
                        .secondary_personas
                        .iter()
                        .map(|persona| persona.display_name())
                        .collect();
                    let _ = writeln!(output, "Also matching: {}", names.join(", "));
                }
                if let Some(persona) = result.primary_persona.persona() {
                    let _ = writeln!(output, "> {}", persona.description());
                }
            }
            None => {
                let _ = writeln!(output, "No assignments recorded for this window.");
                continue;
            }
        }

        let _ = writeln!(output);
        let _ = writeln!(output, "### Persona Mix");
        for summary in summarize_personas(&section.assignments) {
            let _ = writeln!(
                output,
                "- {}: {} assignments",
                summary.persona.display_name(),
                summary.count
            );
        }

        let _ = writeln!(output);
        let _ = writeln!(output, "### Transitions");
        if section.transitions.is_empty() {
            let _ = writeln!(output, "No persona changes recorded.");
        } else {
            for stored in section.transitions.iter().take(10) {
                let record = &stored.record;
                let _ = write!(
                    output,
                    "- {}: {} -> {} after {} days",
                    record.transition_date.format("%Y-%m-%d"),
                    record.from_persona.display_name(),
                    record.to_persona.display_name(),
                    record.days_in_previous_persona
                );
                match (&record.achievement_title, record.celebration_shown) {
                    (Some(title), true) => {
                        let _ = writeln!(output, " (milestone: {})", title);
                    }
                    _ => {
                        let _ = writeln!(output);
                    }
                }
            }
        }
    }

    output
}
