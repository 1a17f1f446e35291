use serde_json::json;

use crate::models::{Criteria, Persona, SignalSnapshot};

pub const HIGH_UTILIZATION_CARD_PCT: f64 = 50.0;
pub const VARIABLE_INCOME_PAY_GAP_DAYS: f64 = 45.0;
pub const VARIABLE_INCOME_BUFFER_MONTHS: f64 = 1.0;
pub const STUDENT_TRANSACTION_COUNT: u32 = 50;
pub const STUDENT_ESSENTIALS_SHARE_PCT: f64 = 40.0;
pub const STUDENT_MIN_SUPPORTING: usize = 2;
pub const STUDENT_ANNUAL_INCOME: f64 = 30_000.0;
pub const STUDENT_COFFEE_DELIVERY_MONTHLY: f64 = 75.0;
pub const STUDENT_MAX_CREDIT_CARDS: u32 = 2;
pub const SUBSCRIPTION_MIN_MERCHANTS: u32 = 3;
pub const SUBSCRIPTION_MONTHLY_SPEND: f64 = 50.0;
pub const SUBSCRIPTION_SHARE_PCT: f64 = 10.0;
pub const SAVINGS_GROWTH_PCT: f64 = 2.0;
pub const SAVINGS_NET_INFLOW: f64 = 200.0;
pub const SAVINGS_MAX_UTILIZATION_PCT: f64 = 30.0;

/// The five lifestyle signals that back up a student classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudentSupport {
    pub low_income: bool,
    pub irregular_income: bool,
    pub frequent_coffee_delivery: bool,
    pub few_credit_cards: bool,
    pub rents_without_mortgage: bool,
}

impl StudentSupport {
    pub fn from_snapshot(snapshot: &SignalSnapshot) -> Self {
        Self {
            low_income: snapshot.annual_income() < STUDENT_ANNUAL_INCOME,
            irregular_income: snapshot.has_irregular_income(),
            frequent_coffee_delivery: snapshot.coffee_food_delivery_monthly()
                >= STUDENT_COFFEE_DELIVERY_MONTHLY,
            few_credit_cards: snapshot.credit_card_count() <= STUDENT_MAX_CREDIT_CARDS,
            rents_without_mortgage: snapshot.rents_without_mortgage(),
        }
    }

    pub fn count(&self) -> usize {
        [
            self.low_income,
            self.irregular_income,
            self.frequent_coffee_delivery,
            self.few_credit_cards,
            self.rents_without_mortgage,
        ]
        .into_iter()
        .filter(|met| *met)
        .count()
    }
}

/// Whether `persona`'s rule fires for this snapshot.
pub fn matches(persona: Persona, snapshot: &SignalSnapshot) -> bool {
    match persona {
        Persona::HighUtilization => matches_high_utilization(snapshot),
        Persona::VariableIncomeBudgeter => matches_variable_income(snapshot),
        Persona::Student => matches_student(snapshot),
        Persona::SubscriptionHeavy => matches_subscription_heavy(snapshot),
        Persona::SavingsBuilder => matches_savings_builder(snapshot),
    }
}

fn matches_high_utilization(snapshot: &SignalSnapshot) -> bool {
    snapshot.peak_utilization_pct() >= HIGH_UTILIZATION_CARD_PCT
        || snapshot.has_interest_charges()
        || snapshot.any_overdue()
        || snapshot.any_minimum_payment_only()
}

fn matches_variable_income(snapshot: &SignalSnapshot) -> bool {
    snapshot.median_pay_gap_days() > VARIABLE_INCOME_PAY_GAP_DAYS
        && snapshot.cash_flow_buffer_months() < VARIABLE_INCOME_BUFFER_MONTHS
}

fn has_major_student_signal(snapshot: &SignalSnapshot) -> bool {
    let thin_essentials_spender = snapshot.monthly_transaction_count() < STUDENT_TRANSACTION_COUNT
        && snapshot.essentials_share_pct() > STUDENT_ESSENTIALS_SHARE_PCT;
    snapshot.has_student_loan() || snapshot.in_student_age_bracket() || thin_essentials_spender
}

fn matches_student(snapshot: &SignalSnapshot) -> bool {
    has_major_student_signal(snapshot)
        && StudentSupport::from_snapshot(snapshot).count() >= STUDENT_MIN_SUPPORTING
}

fn matches_subscription_heavy(snapshot: &SignalSnapshot) -> bool {
    snapshot.recurring_merchant_count() >= SUBSCRIPTION_MIN_MERCHANTS
        && (snapshot.monthly_recurring_spend() >= SUBSCRIPTION_MONTHLY_SPEND
            || snapshot.subscription_share_pct() >= SUBSCRIPTION_SHARE_PCT)
}

fn matches_savings_builder(snapshot: &SignalSnapshot) -> bool {
    let growing = snapshot.savings_growth_rate_pct() >= SAVINGS_GROWTH_PCT
        || snapshot.net_savings_inflow() >= SAVINGS_NET_INFLOW;
    growing && snapshot.aggregate_utilization_pct() < SAVINGS_MAX_UTILIZATION_PCT
}

/// The raw values `persona`'s rule inspects, for explaining an assignment.
/// Absent signals are reported as `null`.
pub fn extract_criteria(persona: Persona, snapshot: &SignalSnapshot) -> Criteria {
    let mut criteria = Criteria::new();
    let mut put = |key: &str, value: serde_json::Value| {
        criteria.insert(key.to_string(), value);
    };

    match persona {
        Persona::HighUtilization => {
            let credit = snapshot.credit.as_ref();
            put(
                "aggregate_utilization_pct",
                json!(credit.and_then(|c| c.aggregate_utilization_pct)),
            );
            put("peak_utilization_pct", json!(snapshot.peak_utilization_pct()));
            put("has_interest_charges", json!(snapshot.has_interest_charges()));
            put("any_overdue", json!(snapshot.any_overdue()));
            put(
                "minimum_payment_only",
                json!(snapshot.any_minimum_payment_only()),
            );
        }
        Persona::VariableIncomeBudgeter => {
            let income = snapshot.income.as_ref();
            put(
                "median_pay_gap_days",
                json!(income.and_then(|i| i.median_pay_gap_days)),
            );
            put(
                "cash_flow_buffer_months",
                json!(income.and_then(|i| i.cash_flow_buffer_months)),
            );
            put(
                "income_variability_pct",
                json!(income.and_then(|i| i.income_variability_pct)),
            );
        }
        Persona::Student => {
            let metadata = snapshot.user_metadata.as_ref();
            let support = StudentSupport::from_snapshot(snapshot);
            put("has_student_loan", json!(snapshot.has_student_loan()));
            put(
                "age_bracket",
                json!(metadata.and_then(|m| m.age_bracket.clone())),
            );
            put(
                "monthly_transaction_count",
                json!(metadata.and_then(|m| m.monthly_transaction_count)),
            );
            put(
                "essentials_share_pct",
                json!(metadata.and_then(|m| m.essentials_share_pct)),
            );
            put(
                "annual_income",
                json!(snapshot.income.as_ref().and_then(|i| i.annual_income)),
            );
            put("low_income", json!(support.low_income));
            put("irregular_income", json!(support.irregular_income));
            put(
                "frequent_coffee_delivery",
                json!(support.frequent_coffee_delivery),
            );
            put("few_credit_cards", json!(support.few_credit_cards));
            put("rents_without_mortgage", json!(support.rents_without_mortgage));
            put("supporting_criteria_met", json!(support.count()));
        }
        Persona::SubscriptionHeavy => {
            let subscriptions = snapshot.subscriptions.as_ref();
            put(
                "recurring_merchant_count",
                json!(subscriptions.and_then(|s| s.recurring_merchant_count)),
            );
            put(
                "monthly_recurring_spend",
                json!(subscriptions.and_then(|s| s.monthly_recurring_spend)),
            );
            put(
                "subscription_share_pct",
                json!(subscriptions.and_then(|s| s.subscription_share_pct)),
            );
        }
        Persona::SavingsBuilder => {
            let savings = snapshot.savings.as_ref();
            put(
                "savings_growth_rate_pct",
                json!(savings.and_then(|s| s.savings_growth_rate_pct)),
            );
            put(
                "net_savings_inflow",
                json!(savings.and_then(|s| s.net_savings_inflow)),
            );
            put(
                "aggregate_utilization_pct",
                json!(snapshot
                    .credit
                    .as_ref()
                    .and_then(|c| c.aggregate_utilization_pct)),
            );
        }
    }

    criteria
}

/// Every persona whose rule fires, in priority order.
pub fn matching_personas(snapshot: &SignalSnapshot) -> Vec<Persona> {
    Persona::PRIORITY_ORDER
        .into_iter()
        .filter(|persona| matches(*persona, snapshot))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CardSignal, CreditSignals, IncomeSignals, SavingsSignals, SubscriptionSignals,
        UserMetadata,
    };

    fn credit(utilization: f64) -> CreditSignals {
        CreditSignals {
            aggregate_utilization_pct: Some(utilization),
            num_credit_cards: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn high_utilization_fires_on_any_single_signal() {
        let by_card = SignalSnapshot {
            credit: Some(CreditSignals {
                cards: vec![CardSignal {
                    utilization_pct: Some(50.0),
                    minimum_payment_only: None,
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches(Persona::HighUtilization, &by_card));

        let by_interest = SignalSnapshot {
            credit: Some(CreditSignals {
                has_interest_charges: Some(true),
                ..credit(10.0)
            }),
            ..Default::default()
        };
        assert!(matches(Persona::HighUtilization, &by_interest));

        let by_minimum_payment = SignalSnapshot {
            credit: Some(CreditSignals {
                cards: vec![CardSignal {
                    utilization_pct: Some(5.0),
                    minimum_payment_only: Some(true),
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches(Persona::HighUtilization, &by_minimum_payment));

        let healthy = SignalSnapshot {
            credit: Some(credit(49.9)),
            ..Default::default()
        };
        assert!(!matches(Persona::HighUtilization, &healthy));
    }

    #[test]
    fn variable_income_needs_gap_and_thin_buffer() {
        let mut snapshot = SignalSnapshot {
            income: Some(IncomeSignals {
                median_pay_gap_days: Some(46.0),
                cash_flow_buffer_months: Some(0.9),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches(Persona::VariableIncomeBudgeter, &snapshot));

        snapshot.income.as_mut().unwrap().median_pay_gap_days = Some(45.0);
        assert!(!matches(Persona::VariableIncomeBudgeter, &snapshot));

        snapshot.income.as_mut().unwrap().median_pay_gap_days = Some(60.0);
        snapshot.income.as_mut().unwrap().cash_flow_buffer_months = None;
        assert!(!matches(Persona::VariableIncomeBudgeter, &snapshot));
    }

    #[test]
    fn student_requires_major_and_two_supporting_signals() {
        let snapshot = SignalSnapshot {
            income: Some(IncomeSignals {
                annual_income: Some(18_000.0),
                ..Default::default()
            }),
            user_metadata: Some(UserMetadata {
                age_bracket: Some("18-25".to_string()),
                has_rent_transactions: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches(Persona::Student, &snapshot));

        let one_supporting = SignalSnapshot {
            income: None,
            ..snapshot.clone()
        };
        assert!(!matches(Persona::Student, &one_supporting));

        let no_major = SignalSnapshot {
            user_metadata: Some(UserMetadata {
                age_bracket: Some("26-35".to_string()),
                has_rent_transactions: Some(true),
                ..Default::default()
            }),
            ..snapshot
        };
        assert!(!matches(Persona::Student, &no_major));
    }

    #[test]
    fn student_major_signal_from_spending_shape() {
        let snapshot = SignalSnapshot {
            credit: Some(credit(10.0)),
            user_metadata: Some(UserMetadata {
                monthly_transaction_count: Some(32),
                essentials_share_pct: Some(55.0),
                coffee_food_delivery_monthly: Some(80.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(has_major_student_signal(&snapshot));
        let support = StudentSupport::from_snapshot(&snapshot);
        assert!(support.few_credit_cards);
        assert!(support.frequent_coffee_delivery);
        assert_eq!(support.count(), 2);
        assert!(matches(Persona::Student, &snapshot));
    }

    #[test]
    fn subscription_heavy_needs_merchants_and_spend_or_share() {
        let mut snapshot = SignalSnapshot {
            subscriptions: Some(SubscriptionSignals {
                recurring_merchant_count: Some(3),
                monthly_recurring_spend: Some(20.0),
                subscription_share_pct: Some(10.0),
            }),
            ..Default::default()
        };
        assert!(matches(Persona::SubscriptionHeavy, &snapshot));

        snapshot.subscriptions.as_mut().unwrap().subscription_share_pct = Some(9.0);
        assert!(!matches(Persona::SubscriptionHeavy, &snapshot));

        snapshot.subscriptions.as_mut().unwrap().monthly_recurring_spend = Some(50.0);
        assert!(matches(Persona::SubscriptionHeavy, &snapshot));

        snapshot.subscriptions.as_mut().unwrap().recurring_merchant_count = Some(2);
        assert!(!matches(Persona::SubscriptionHeavy, &snapshot));
    }

    #[test]
    fn savings_builder_requires_low_utilization() {
        let mut snapshot = SignalSnapshot {
            credit: Some(credit(29.0)),
            savings: Some(SavingsSignals {
                savings_growth_rate_pct: Some(0.5),
                net_savings_inflow: Some(200.0),
            }),
            ..Default::default()
        };
        assert!(matches(Persona::SavingsBuilder, &snapshot));

        snapshot.credit = Some(credit(30.0));
        assert!(!matches(Persona::SavingsBuilder, &snapshot));

        snapshot.credit = None;
        assert!(!matches(Persona::SavingsBuilder, &snapshot));
    }

    #[test]
    fn criteria_report_absent_fields_as_null() {
        let snapshot = SignalSnapshot {
            income: Some(IncomeSignals {
                median_pay_gap_days: Some(65.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let criteria = extract_criteria(Persona::VariableIncomeBudgeter, &snapshot);
        assert_eq!(criteria["median_pay_gap_days"], json!(65.0));
        assert!(criteria["cash_flow_buffer_months"].is_null());
        assert_eq!(criteria.len(), 3);
    }

    #[test]
    fn empty_snapshot_matches_nothing() {
        assert!(matching_personas(&SignalSnapshot::default()).is_empty());
    }

    #[test]
    fn matching_personas_preserves_priority_order() {
        let snapshot = SignalSnapshot {
            credit: Some(CreditSignals {
                has_interest_charges: Some(true),
                ..credit(10.0)
            }),
            subscriptions: Some(SubscriptionSignals {
                recurring_merchant_count: Some(6),
                monthly_recurring_spend: Some(120.0),
                subscription_share_pct: Some(18.0),
            }),
            savings: Some(SavingsSignals {
                savings_growth_rate_pct: Some(6.0),
                net_savings_inflow: Some(500.0),
            }),
            ..Default::default()
        };
        assert_eq!(
            matching_personas(&snapshot),
            vec![
                Persona::HighUtilization,
                Persona::SubscriptionHeavy,
                Persona::SavingsBuilder
            ]
        );
    }
}
