use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Explainability detail attached to an assignment: field name to the raw
/// value that was inspected (`null` when the signal was absent).
pub type Criteria = BTreeMap<String, serde_json::Value>;

/// Lookback period the signals were aggregated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowType {
    #[serde(rename = "30d")]
    Days30,
    #[serde(rename = "180d")]
    Days180,
}

impl WindowType {
    pub const ALL: [WindowType; 2] = [WindowType::Days30, WindowType::Days180];

    pub fn as_str(&self) -> &'static str {
        match self {
            WindowType::Days30 => "30d",
            WindowType::Days180 => "180d",
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            WindowType::Days30 => 30,
            WindowType::Days180 => 180,
        }
    }
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindowType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "30d" => Ok(WindowType::Days30),
            "180d" => Ok(WindowType::Days180),
            other => Err(Error::InvalidWindow {
                value: other.to_string(),
            }),
        }
    }
}

/// The five rule-backed personas, declared in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    HighUtilization,
    VariableIncomeBudgeter,
    Student,
    SubscriptionHeavy,
    SavingsBuilder,
}

impl Persona {
    /// Evaluation order, highest priority first.
    pub const PRIORITY_ORDER: [Persona; 5] = [
        Persona::HighUtilization,
        Persona::VariableIncomeBudgeter,
        Persona::Student,
        Persona::SubscriptionHeavy,
        Persona::SavingsBuilder,
    ];

    /// Priority rank, 1 is evaluated first.
    pub fn priority(&self) -> u8 {
        match self {
            Persona::HighUtilization => 1,
            Persona::VariableIncomeBudgeter => 2,
            Persona::Student => 3,
            Persona::SubscriptionHeavy => 4,
            Persona::SavingsBuilder => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::HighUtilization => "high_utilization",
            Persona::VariableIncomeBudgeter => "variable_income_budgeter",
            Persona::Student => "student",
            Persona::SubscriptionHeavy => "subscription_heavy",
            Persona::SavingsBuilder => "savings_builder",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Persona::HighUtilization => "High Utilization",
            Persona::VariableIncomeBudgeter => "Variable Income Budgeter",
            Persona::Student => "Student",
            Persona::SubscriptionHeavy => "Subscription-Heavy",
            Persona::SavingsBuilder => "Savings Builder",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Persona::HighUtilization => {
                "Carrying high card balances, interest charges or overdue payments"
            }
            Persona::VariableIncomeBudgeter => {
                "Irregular pay with a thin cash-flow buffer between paychecks"
            }
            Persona::Student => "Early-career spending shaped by loans, rent and low income",
            Persona::SubscriptionHeavy => {
                "A large share of spend goes to recurring subscriptions"
            }
            Persona::SavingsBuilder => "Growing savings steadily while keeping credit use low",
        }
    }

    /// Risk personas outrank opportunity personas in the priority order.
    pub fn is_risk(&self) -> bool {
        matches!(
            self,
            Persona::HighUtilization | Persona::VariableIncomeBudgeter
        )
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Persona {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Persona::PRIORITY_ORDER
            .into_iter()
            .find(|persona| persona.as_str() == value)
            .ok_or_else(|| Error::UnknownPersona {
                value: value.to_string(),
            })
    }
}

/// Primary persona of an assignment: a rule persona, the `general`
/// fallback, or the `none` sentinel for users without usable signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PersonaLabel {
    Matched(Persona),
    General,
    Unclassified,
}

impl PersonaLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonaLabel::Matched(persona) => persona.as_str(),
            PersonaLabel::General => "general",
            PersonaLabel::Unclassified => "none",
        }
    }

    pub fn persona(&self) -> Option<Persona> {
        match self {
            PersonaLabel::Matched(persona) => Some(*persona),
            PersonaLabel::General | PersonaLabel::Unclassified => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PersonaLabel::Matched(persona) => persona.display_name(),
            PersonaLabel::General => "General",
            PersonaLabel::Unclassified => "Unclassified",
        }
    }
}

impl From<Persona> for PersonaLabel {
    fn from(persona: Persona) -> Self {
        PersonaLabel::Matched(persona)
    }
}

impl fmt::Display for PersonaLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonaLabel {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "general" => Ok(PersonaLabel::General),
            "none" => Ok(PersonaLabel::Unclassified),
            other => other.parse().map(PersonaLabel::Matched),
        }
    }
}

impl TryFrom<String> for PersonaLabel {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PersonaLabel> for String {
    fn from(label: PersonaLabel) -> Self {
        label.as_str().to_string()
    }
}

/// Qualitative fit of a user's signals to their primary persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrength {
    Strong,
    Moderate,
    Weak,
    /// Fallback `general` assignment
    Default,
    /// No usable signal data
    #[serde(rename = "none")]
    Unclassified,
}

impl MatchStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrength::Strong => "strong",
            MatchStrength::Moderate => "moderate",
            MatchStrength::Weak => "weak",
            MatchStrength::Default => "default",
            MatchStrength::Unclassified => "none",
        }
    }
}

impl fmt::Display for MatchStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStrength {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "strong" => Ok(MatchStrength::Strong),
            "moderate" => Ok(MatchStrength::Moderate),
            "weak" => Ok(MatchStrength::Weak),
            "default" => Ok(MatchStrength::Default),
            "none" => Ok(MatchStrength::Unclassified),
            other => Err(Error::UnknownStrength {
                value: other.to_string(),
            }),
        }
    }
}

// Stand-ins for absent signal fields. Each one sits on the side of its
// threshold that keeps the rule from firing.
const ABSENT_AMOUNT: f64 = 0.0;
const ABSENT_BUFFER_MONTHS: f64 = 999.0;
const ABSENT_AGGREGATE_UTILIZATION_PCT: f64 = 100.0;
const ABSENT_ANNUAL_INCOME: f64 = f64::MAX;
const ABSENT_SMALL_COUNT: u32 = u32::MAX;

// Signal payloads come from upstream jobs and are not trusted. A field with
// the wrong JSON type decodes as absent instead of failing the snapshot.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::CardSignal;

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        Ok(Value::deserialize(deserializer)?.as_f64())
    }

    /// Counts also accept integral floats such as `3.0`.
    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if let Some(n) = value.as_u64() {
            return Ok(u32::try_from(n).ok());
        }
        Ok(value
            .as_f64()
            .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= f64::from(u32::MAX))
            .map(|n| n as u32))
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
        Ok(Value::deserialize(deserializer)?.as_bool())
    }

    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        Ok(Value::deserialize(deserializer)?
            .as_str()
            .map(str::to_string))
    }

    pub fn cards<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<CardSignal>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| CardSignal::deserialize(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn category<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(deserializer)? {
            value @ Value::Object(_) => T::deserialize(value).ok(),
            _ => None,
        })
    }
}

/// Per-card credit detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardSignal {
    #[serde(deserialize_with = "lenient::number")]
    pub utilization_pct: Option<f64>,
    #[serde(deserialize_with = "lenient::flag")]
    pub minimum_payment_only: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditSignals {
    #[serde(deserialize_with = "lenient::number")]
    pub aggregate_utilization_pct: Option<f64>,
    #[serde(deserialize_with = "lenient::cards")]
    pub cards: Vec<CardSignal>,
    #[serde(deserialize_with = "lenient::flag")]
    pub has_interest_charges: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub any_overdue: Option<bool>,
    #[serde(deserialize_with = "lenient::count")]
    pub num_credit_cards: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomeSignals {
    #[serde(deserialize_with = "lenient::number")]
    pub median_pay_gap_days: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub cash_flow_buffer_months: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub income_variability_pct: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub annual_income: Option<f64>,
    #[serde(deserialize_with = "lenient::text")]
    pub payment_frequency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionSignals {
    #[serde(deserialize_with = "lenient::count")]
    pub recurring_merchant_count: Option<u32>,
    #[serde(deserialize_with = "lenient::number")]
    pub monthly_recurring_spend: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub subscription_share_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavingsSignals {
    #[serde(deserialize_with = "lenient::number")]
    pub savings_growth_rate_pct: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub net_savings_inflow: Option<f64>,
}

/// Profile-level facts about the user. Also the input for graduation checks
/// when a student moves on to another persona.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserMetadata {
    #[serde(deserialize_with = "lenient::text")]
    pub age_bracket: Option<String>,
    #[serde(deserialize_with = "lenient::flag")]
    pub has_student_loan: Option<bool>,
    #[serde(deserialize_with = "lenient::count")]
    pub monthly_transaction_count: Option<u32>,
    #[serde(deserialize_with = "lenient::number")]
    pub essentials_share_pct: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub coffee_food_delivery_monthly: Option<f64>,
    #[serde(deserialize_with = "lenient::flag")]
    pub has_rent_transactions: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub has_mortgage: Option<bool>,
}

impl UserMetadata {
    pub const STUDENT_AGE_BRACKET: &'static str = "18-25";

    pub fn in_student_age_bracket(&self) -> bool {
        self.age_bracket.as_deref() == Some(Self::STUDENT_AGE_BRACKET)
    }

    pub fn has_student_loan(&self) -> bool {
        self.has_student_loan.unwrap_or(false)
    }
}

/// Signals for one (user, window) pair. Every category and field may be
/// absent; the accessors below supply the defaults the rules rely on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalSnapshot {
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::category"
    )]
    pub credit: Option<CreditSignals>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::category"
    )]
    pub income: Option<IncomeSignals>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::category"
    )]
    pub subscriptions: Option<SubscriptionSignals>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::category"
    )]
    pub savings: Option<SavingsSignals>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::category"
    )]
    pub user_metadata: Option<UserMetadata>,
}

impl SignalSnapshot {
    pub fn is_empty(&self) -> bool {
        self.credit.is_none()
            && self.income.is_none()
            && self.subscriptions.is_none()
            && self.savings.is_none()
            && self.user_metadata.is_none()
    }

    /// Credit or income must be present for any classification to happen.
    pub fn has_core_signals(&self) -> bool {
        self.credit.is_some() || self.income.is_some()
    }

    fn credit_field<T>(&self, field: impl Fn(&CreditSignals) -> Option<T>) -> Option<T> {
        self.credit.as_ref().and_then(field)
    }

    fn income_field<T>(&self, field: impl Fn(&IncomeSignals) -> Option<T>) -> Option<T> {
        self.income.as_ref().and_then(field)
    }

    fn subscription_field<T>(
        &self,
        field: impl Fn(&SubscriptionSignals) -> Option<T>,
    ) -> Option<T> {
        self.subscriptions.as_ref().and_then(field)
    }

    fn savings_field<T>(&self, field: impl Fn(&SavingsSignals) -> Option<T>) -> Option<T> {
        self.savings.as_ref().and_then(field)
    }

    fn metadata_field<T>(&self, field: impl Fn(&UserMetadata) -> Option<T>) -> Option<T> {
        self.user_metadata.as_ref().and_then(field)
    }

    pub fn cards(&self) -> &[CardSignal] {
        self.credit
            .as_ref()
            .map(|credit| credit.cards.as_slice())
            .unwrap_or(&[])
    }

    /// Highest utilization seen on any card or the aggregate, 0 when unknown.
    pub fn peak_utilization_pct(&self) -> f64 {
        let aggregate = self.credit_field(|c| c.aggregate_utilization_pct);
        self.cards()
            .iter()
            .filter_map(|card| card.utilization_pct)
            .chain(aggregate)
            .fold(ABSENT_AMOUNT, f64::max)
    }

    /// Aggregate utilization, treated as maxed out when unknown.
    pub fn aggregate_utilization_pct(&self) -> f64 {
        self.credit_field(|c| c.aggregate_utilization_pct)
            .unwrap_or(ABSENT_AGGREGATE_UTILIZATION_PCT)
    }

    pub fn has_interest_charges(&self) -> bool {
        self.credit_field(|c| c.has_interest_charges).unwrap_or(false)
    }

    pub fn any_overdue(&self) -> bool {
        self.credit_field(|c| c.any_overdue).unwrap_or(false)
    }

    pub fn any_minimum_payment_only(&self) -> bool {
        self.cards()
            .iter()
            .any(|card| card.minimum_payment_only.unwrap_or(false))
    }

    pub fn credit_card_count(&self) -> u32 {
        self.credit_field(|c| c.num_credit_cards)
            .unwrap_or(ABSENT_SMALL_COUNT)
    }

    pub fn median_pay_gap_days(&self) -> f64 {
        self.income_field(|i| i.median_pay_gap_days)
            .unwrap_or(ABSENT_AMOUNT)
    }

    pub fn cash_flow_buffer_months(&self) -> f64 {
        self.income_field(|i| i.cash_flow_buffer_months)
            .unwrap_or(ABSENT_BUFFER_MONTHS)
    }

    pub fn income_variability_pct(&self) -> f64 {
        self.income_field(|i| i.income_variability_pct)
            .unwrap_or(ABSENT_AMOUNT)
    }

    pub fn annual_income(&self) -> f64 {
        self.income_field(|i| i.annual_income)
            .unwrap_or(ABSENT_ANNUAL_INCOME)
    }

    pub fn has_irregular_income(&self) -> bool {
        self.income
            .as_ref()
            .and_then(|i| i.payment_frequency.as_deref())
            .is_some_and(|freq| freq.eq_ignore_ascii_case("irregular"))
    }

    pub fn recurring_merchant_count(&self) -> u32 {
        self.subscription_field(|s| s.recurring_merchant_count)
            .unwrap_or(0)
    }

    pub fn monthly_recurring_spend(&self) -> f64 {
        self.subscription_field(|s| s.monthly_recurring_spend)
            .unwrap_or(ABSENT_AMOUNT)
    }

    pub fn subscription_share_pct(&self) -> f64 {
        self.subscription_field(|s| s.subscription_share_pct)
            .unwrap_or(ABSENT_AMOUNT)
    }

    pub fn savings_growth_rate_pct(&self) -> f64 {
        self.savings_field(|s| s.savings_growth_rate_pct)
            .unwrap_or(ABSENT_AMOUNT)
    }

    pub fn net_savings_inflow(&self) -> f64 {
        self.savings_field(|s| s.net_savings_inflow)
            .unwrap_or(ABSENT_AMOUNT)
    }

    pub fn has_student_loan(&self) -> bool {
        self.metadata_field(|m| m.has_student_loan).unwrap_or(false)
    }

    pub fn in_student_age_bracket(&self) -> bool {
        self.user_metadata
            .as_ref()
            .is_some_and(UserMetadata::in_student_age_bracket)
    }

    pub fn monthly_transaction_count(&self) -> u32 {
        self.metadata_field(|m| m.monthly_transaction_count)
            .unwrap_or(ABSENT_SMALL_COUNT)
    }

    pub fn essentials_share_pct(&self) -> f64 {
        self.metadata_field(|m| m.essentials_share_pct)
            .unwrap_or(ABSENT_AMOUNT)
    }

    pub fn coffee_food_delivery_monthly(&self) -> f64 {
        self.metadata_field(|m| m.coffee_food_delivery_monthly)
            .unwrap_or(ABSENT_AMOUNT)
    }

    pub fn rents_without_mortgage(&self) -> bool {
        let rents = self.metadata_field(|m| m.has_rent_transactions).unwrap_or(false);
        let mortgage = self.metadata_field(|m| m.has_mortgage).unwrap_or(false);
        rents && !mortgage
    }
}

/// Output of one persona evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub user_id: String,
    pub window_type: WindowType,
    pub primary_persona: PersonaLabel,
    pub primary_match_strength: MatchStrength,
    /// Next matches after the primary, at most two, in priority order.
    pub secondary_personas: Vec<Persona>,
    pub criteria_met: Criteria,
    /// Every persona that matched, primary first.
    pub all_matches: Vec<Persona>,
    pub assigned_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Profile facts at assignment time, kept apart from `criteria_met` so
    /// transition checks can compare them across assignments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<UserMetadata>,
}

/// An assignment as read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAssignment {
    pub id: Uuid,
    #[serde(flatten)]
    pub result: AssignmentResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolarity {
    Positive,
    Negative,
    Neutral,
}

impl TransitionPolarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionPolarity::Positive => "positive",
            TransitionPolarity::Negative => "negative",
            TransitionPolarity::Neutral => "neutral",
        }
    }
}

impl fmt::Display for TransitionPolarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing reinforcement for a recognised improvement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Celebration {
    pub celebration_message: String,
    pub milestone: String,
    pub achievement_title: String,
}

/// Outcome of transition detection. Celebration fields are only serialized
/// when the transition is positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionResult {
    pub user_id: String,
    pub window_type: WindowType,
    pub transition_detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_persona: Option<PersonaLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_persona: Option<PersonaLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_in_previous_persona: Option<i64>,
    pub is_positive_transition: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polarity: Option<TransitionPolarity>,
    #[serde(flatten)]
    pub celebration: Option<Celebration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_persona: Option<PersonaLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_id: Option<Uuid>,
}

/// Persisted record of a detected persona change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub user_id: String,
    pub window_type: WindowType,
    pub from_persona: PersonaLabel,
    pub to_persona: PersonaLabel,
    pub transition_date: DateTime<Utc>,
    pub days_in_previous_persona: i64,
    pub celebration_shown: bool,
    pub milestone_achieved: Option<String>,
    pub achievement_title: Option<String>,
}

/// A transition record as read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTransition {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: TransitionRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_type_parses_only_known_values() {
        assert_eq!("30d".parse::<WindowType>().unwrap(), WindowType::Days30);
        assert_eq!("180d".parse::<WindowType>().unwrap(), WindowType::Days180);
        assert!(matches!(
            "90d".parse::<WindowType>(),
            Err(Error::InvalidWindow { value }) if value == "90d"
        ));
        assert!("30D".parse::<WindowType>().is_err());
    }

    #[test]
    fn priority_order_matches_ranks() {
        for (index, persona) in Persona::PRIORITY_ORDER.iter().enumerate() {
            assert_eq!(persona.priority() as usize, index + 1);
        }
    }

    #[test]
    fn persona_label_serializes_as_plain_name() {
        let json = serde_json::to_string(&PersonaLabel::Matched(Persona::SavingsBuilder)).unwrap();
        assert_eq!(json, "\"savings_builder\"");
        let json = serde_json::to_string(&PersonaLabel::Unclassified).unwrap();
        assert_eq!(json, "\"none\"");
        let label: PersonaLabel = serde_json::from_str("\"general\"").unwrap();
        assert_eq!(label, PersonaLabel::General);
        assert!(serde_json::from_str::<PersonaLabel>("\"gambler\"").is_err());
    }

    #[test]
    fn match_strength_round_trips_labels() {
        for label in ["strong", "moderate", "weak", "default", "none"] {
            let strength: MatchStrength = label.parse().unwrap();
            assert_eq!(strength.as_str(), label);
        }
    }

    #[test]
    fn snapshot_defaults_keep_rules_quiet() {
        let snapshot = SignalSnapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.peak_utilization_pct(), 0.0);
        assert_eq!(snapshot.aggregate_utilization_pct(), 100.0);
        assert_eq!(snapshot.cash_flow_buffer_months(), 999.0);
        assert_eq!(snapshot.recurring_merchant_count(), 0);
        assert_eq!(snapshot.monthly_transaction_count(), u32::MAX);
        assert!(!snapshot.has_irregular_income());
        assert!(!snapshot.rents_without_mortgage());
    }

    #[test]
    fn peak_utilization_takes_highest_card() {
        let snapshot = SignalSnapshot {
            credit: Some(CreditSignals {
                aggregate_utilization_pct: Some(35.0),
                cards: vec![
                    CardSignal {
                        utilization_pct: Some(20.0),
                        minimum_payment_only: None,
                    },
                    CardSignal {
                        utilization_pct: Some(82.5),
                        minimum_payment_only: Some(true),
                    },
                ],
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(snapshot.peak_utilization_pct(), 82.5);
        assert!(snapshot.any_minimum_payment_only());
        assert!(snapshot.has_core_signals());
    }

    #[test]
    fn snapshot_ignores_unknown_fields() {
        let json = r#"{
            "credit": {"aggregate_utilization_pct": 12.0, "issuer": "acme"},
            "loyalty": {"points": 10}
        }"#;
        let snapshot: SignalSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.aggregate_utilization_pct(), 12.0);
        assert!(snapshot.income.is_none());
    }

    #[test]
    fn integral_float_counts_are_accepted() {
        let json = r#"{
            "subscriptions": {"recurring_merchant_count": 3.0},
            "credit": {"num_credit_cards": 2.5},
            "user_metadata": {"monthly_transaction_count": -4}
        }"#;
        let snapshot: SignalSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.recurring_merchant_count(), 3);
        assert_eq!(snapshot.credit.as_ref().unwrap().num_credit_cards, None);
        assert_eq!(
            snapshot.user_metadata.as_ref().unwrap().monthly_transaction_count,
            None
        );
    }

    #[test]
    fn mistyped_signals_decode_as_absent() {
        let inputs = [
            r#"{"credit": {"cards": null}}"#,
            r#"{"credit": {"cards": "none"}}"#,
            r#"{"credit": {"aggregate_utilization_pct": "80"}}"#,
            r#"{"credit": {"has_interest_charges": "yes", "any_overdue": 1}}"#,
            r#"{"credit": 5, "income": [], "savings": null}"#,
            r#"{"income": {"payment_frequency": 14, "annual_income": true}}"#,
            r#"{"user_metadata": {"age_bracket": 21, "has_student_loan": "true"}}"#,
        ];
        for json in inputs {
            let snapshot: SignalSnapshot = serde_json::from_str(json).unwrap();
            assert_eq!(snapshot.aggregate_utilization_pct(), ABSENT_AGGREGATE_UTILIZATION_PCT);
            assert!(!snapshot.has_interest_charges());
            assert!(!snapshot.any_overdue());
            assert!(!snapshot.has_student_loan());
            assert_eq!(snapshot.annual_income(), ABSENT_ANNUAL_INCOME);
            let result = crate::assigner::evaluate("u1", WindowType::Days30, &snapshot, Utc::now());
            assert!(result.secondary_personas.len() <= 2);
        }
    }

    #[test]
    fn bad_card_entries_are_dropped() {
        let json = r#"{"credit": {"cards": [
            {"utilization_pct": 91.0},
            7,
            {"utilization_pct": "high", "minimum_payment_only": true}
        ]}}"#;
        let snapshot: SignalSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.cards().len(), 2);
        assert_eq!(snapshot.peak_utilization_pct(), 91.0);
        assert!(snapshot.any_minimum_payment_only());
    }

    #[test]
    fn celebration_fields_absent_when_missing() {
        let result = TransitionResult {
            user_id: "user-1".to_string(),
            window_type: WindowType::Days30,
            transition_detected: false,
            from_persona: None,
            to_persona: None,
            transition_date: None,
            days_in_previous_persona: None,
            is_positive_transition: false,
            polarity: None,
            celebration: None,
            current_persona: Some(PersonaLabel::General),
            note: None,
            transition_id: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("celebration_message").is_none());
        assert!(value.get("milestone").is_none());
        assert_eq!(value["current_persona"], "general");
    }
}
