use crate::models::{MatchStrength, Persona, SignalSnapshot};
use crate::rules::StudentSupport;

const HIGH_UTILIZATION_STRONG_PCT: f64 = 70.0;
const HIGH_UTILIZATION_MODERATE_PCT: f64 = 50.0;
const VARIABLE_INCOME_STRONG_BUFFER: f64 = 0.5;
const VARIABLE_INCOME_STRONG_VARIABILITY: f64 = 30.0;
const VARIABLE_INCOME_MODERATE_BUFFER: f64 = 1.0;
const VARIABLE_INCOME_MODERATE_VARIABILITY: f64 = 20.0;
const STUDENT_STRONG_SUPPORTING: usize = 3;
const STUDENT_MODERATE_SUPPORTING: usize = 2;
const SUBSCRIPTION_STRONG_MERCHANTS: u32 = 5;
const SUBSCRIPTION_STRONG_SHARE: f64 = 15.0;
const SUBSCRIPTION_MODERATE_MERCHANTS: u32 = 3;
const SUBSCRIPTION_MODERATE_SHARE: f64 = 10.0;
const SAVINGS_STRONG_GROWTH: f64 = 5.0;
const SAVINGS_STRONG_INFLOW: f64 = 400.0;
const SAVINGS_MODERATE_GROWTH: f64 = 2.0;
const SAVINGS_MODERATE_INFLOW: f64 = 200.0;

pub fn calculate_strength(persona: Persona, snapshot: &SignalSnapshot) -> MatchStrength {
    let (strong, moderate) = match persona {
        Persona::HighUtilization => {
            let utilization = snapshot.peak_utilization_pct();
            (
                utilization >= HIGH_UTILIZATION_STRONG_PCT || snapshot.any_overdue(),
                utilization >= HIGH_UTILIZATION_MODERATE_PCT && snapshot.has_interest_charges(),
            )
        }
        Persona::VariableIncomeBudgeter => {
            let buffer = snapshot.cash_flow_buffer_months();
            let variability = snapshot.income_variability_pct();
            (
                buffer < VARIABLE_INCOME_STRONG_BUFFER
                    && variability > VARIABLE_INCOME_STRONG_VARIABILITY,
                buffer < VARIABLE_INCOME_MODERATE_BUFFER
                    && variability > VARIABLE_INCOME_MODERATE_VARIABILITY,
            )
        }
        Persona::Student => {
            let supporting = StudentSupport::from_snapshot(snapshot).count();
            (
                snapshot.has_student_loan() && supporting >= STUDENT_STRONG_SUPPORTING,
                supporting >= STUDENT_MODERATE_SUPPORTING,
            )
        }
        Persona::SubscriptionHeavy => {
            let merchants = snapshot.recurring_merchant_count();
            let share = snapshot.subscription_share_pct();
            (
                merchants >= SUBSCRIPTION_STRONG_MERCHANTS && share >= SUBSCRIPTION_STRONG_SHARE,
                merchants >= SUBSCRIPTION_MODERATE_MERCHANTS
                    && share >= SUBSCRIPTION_MODERATE_SHARE,
            )
        }
        Persona::SavingsBuilder => {
            let growth = snapshot.savings_growth_rate_pct();
            let inflow = snapshot.net_savings_inflow();
            (
                growth >= SAVINGS_STRONG_GROWTH && inflow >= SAVINGS_STRONG_INFLOW,
                growth >= SAVINGS_MODERATE_GROWTH || inflow >= SAVINGS_MODERATE_INFLOW,
            )
        }
    };

    if strong {
        MatchStrength::Strong
    } else if moderate {
        MatchStrength::Moderate
    } else {
        MatchStrength::Weak
    }
}

/// Name-keyed variant for callers holding a raw persona string. Unknown
/// names come back as `weak` instead of failing.
pub fn calculate_strength_by_name(persona_name: &str, snapshot: &SignalSnapshot) -> MatchStrength {
    match persona_name.parse::<Persona>() {
        Ok(persona) => calculate_strength(persona, snapshot),
        Err(_) => MatchStrength::Weak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CreditSignals, IncomeSignals, SavingsSignals, SubscriptionSignals, UserMetadata,
    };

    #[test]
    fn high_utilization_tiers() {
        let mut snapshot = SignalSnapshot {
            credit: Some(CreditSignals {
                aggregate_utilization_pct: Some(55.0),
                has_interest_charges: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            calculate_strength(Persona::HighUtilization, &snapshot),
            MatchStrength::Moderate
        );

        snapshot.credit.as_mut().unwrap().any_overdue = Some(true);
        assert_eq!(
            calculate_strength(Persona::HighUtilization, &snapshot),
            MatchStrength::Strong
        );

        let interest_only = SignalSnapshot {
            credit: Some(CreditSignals {
                aggregate_utilization_pct: Some(20.0),
                has_interest_charges: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            calculate_strength(Persona::HighUtilization, &interest_only),
            MatchStrength::Weak
        );
    }

    #[test]
    fn variable_income_tiers() {
        let snapshot = |buffer: f64, variability: f64| SignalSnapshot {
            income: Some(IncomeSignals {
                cash_flow_buffer_months: Some(buffer),
                income_variability_pct: Some(variability),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            calculate_strength(Persona::VariableIncomeBudgeter, &snapshot(0.4, 35.0)),
            MatchStrength::Strong
        );
        assert_eq!(
            calculate_strength(Persona::VariableIncomeBudgeter, &snapshot(0.4, 25.0)),
            MatchStrength::Moderate
        );
        assert_eq!(
            calculate_strength(Persona::VariableIncomeBudgeter, &snapshot(0.9, 20.0)),
            MatchStrength::Weak
        );
    }

    #[test]
    fn student_strong_needs_loan() {
        let mut snapshot = SignalSnapshot {
            income: Some(IncomeSignals {
                annual_income: Some(12_000.0),
                payment_frequency: Some("irregular".to_string()),
                ..Default::default()
            }),
            user_metadata: Some(UserMetadata {
                has_rent_transactions: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            calculate_strength(Persona::Student, &snapshot),
            MatchStrength::Moderate
        );

        snapshot.user_metadata.as_mut().unwrap().has_student_loan = Some(true);
        assert_eq!(
            calculate_strength(Persona::Student, &snapshot),
            MatchStrength::Strong
        );
    }

    #[test]
    fn subscription_and_savings_boundaries() {
        let snapshot = SignalSnapshot {
            subscriptions: Some(SubscriptionSignals {
                recurring_merchant_count: Some(3),
                monthly_recurring_spend: Some(90.0),
                subscription_share_pct: Some(10.0),
            }),
            savings: Some(SavingsSignals {
                savings_growth_rate_pct: Some(3.0),
                net_savings_inflow: Some(200.0),
            }),
            ..Default::default()
        };
        assert_eq!(
            calculate_strength(Persona::SubscriptionHeavy, &snapshot),
            MatchStrength::Moderate
        );
        assert_eq!(
            calculate_strength(Persona::SavingsBuilder, &snapshot),
            MatchStrength::Moderate
        );
    }

    #[test]
    fn missing_signals_degrade_to_weak() {
        let snapshot = SignalSnapshot::default();
        for persona in Persona::PRIORITY_ORDER {
            assert_eq!(calculate_strength(persona, &snapshot), MatchStrength::Weak);
        }
    }

    #[test]
    fn unknown_persona_name_is_weak() {
        let snapshot = SignalSnapshot {
            credit: Some(CreditSignals {
                any_overdue: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            calculate_strength_by_name("high_utilisation", &snapshot),
            MatchStrength::Weak
        );
        assert_eq!(
            calculate_strength_by_name("high_utilization", &snapshot),
            MatchStrength::Strong
        );
    }
}
