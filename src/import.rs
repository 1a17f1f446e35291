use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{
    CardSignal, CreditSignals, IncomeSignals, SavingsSignals, SignalSnapshot,
    SubscriptionSignals, UserMetadata, WindowType,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedSnapshot {
    pub user_id: String,
    pub window: WindowType,
    pub snapshot: SignalSnapshot,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    user_id: String,
    window_type: String,
    aggregate_utilization_pct: Option<f64>,
    card_utilization_pcts: Option<String>,
    minimum_payment_only: Option<bool>,
    has_interest_charges: Option<bool>,
    any_overdue: Option<bool>,
    num_credit_cards: Option<u32>,
    median_pay_gap_days: Option<f64>,
    cash_flow_buffer_months: Option<f64>,
    income_variability_pct: Option<f64>,
    annual_income: Option<f64>,
    payment_frequency: Option<String>,
    recurring_merchant_count: Option<u32>,
    monthly_recurring_spend: Option<f64>,
    subscription_share_pct: Option<f64>,
    savings_growth_rate_pct: Option<f64>,
    net_savings_inflow: Option<f64>,
    age_bracket: Option<String>,
    has_student_loan: Option<bool>,
    monthly_transaction_count: Option<u32>,
    essentials_share_pct: Option<f64>,
    coffee_food_delivery_monthly: Option<f64>,
    has_rent_transactions: Option<bool>,
    has_mortgage: Option<bool>,
}

fn present<T: Default + PartialEq>(value: T) -> Option<T> {
    (value != T::default()).then_some(value)
}

fn parse_cards(
    raw: Option<&str>,
    minimum_payment_only: Option<bool>,
) -> std::result::Result<Vec<CardSignal>, String> {
    let mut cards = Vec::new();
    for part in raw.unwrap_or_default().split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let utilization: f64 = part
            .parse()
            .map_err(|_| format!("card_utilization_pcts entry '{part}' is not a number"))?;
        cards.push(CardSignal {
            utilization_pct: Some(utilization),
            minimum_payment_only: None,
        });
    }

    // The flag is account-level in the export; pin it to the first card.
    if let Some(flag) = minimum_payment_only {
        match cards.first_mut() {
            Some(card) => card.minimum_payment_only = Some(flag),
            None => cards.push(CardSignal {
                utilization_pct: None,
                minimum_payment_only: Some(flag),
            }),
        }
    }
    Ok(cards)
}

impl CsvRow {
    fn into_imported(self, line: u64) -> Result<ImportedSnapshot> {
        let window: WindowType = self.window_type.trim().parse()?;
        let cards = parse_cards(self.card_utilization_pcts.as_deref(), self.minimum_payment_only)
            .map_err(|message| Error::InvalidSignal { line, message })?;

        let snapshot = SignalSnapshot {
            credit: present(CreditSignals {
                aggregate_utilization_pct: self.aggregate_utilization_pct,
                cards,
                has_interest_charges: self.has_interest_charges,
                any_overdue: self.any_overdue,
                num_credit_cards: self.num_credit_cards,
            }),
            income: present(IncomeSignals {
                median_pay_gap_days: self.median_pay_gap_days,
                cash_flow_buffer_months: self.cash_flow_buffer_months,
                income_variability_pct: self.income_variability_pct,
                annual_income: self.annual_income,
                payment_frequency: self.payment_frequency,
            }),
            subscriptions: present(SubscriptionSignals {
                recurring_merchant_count: self.recurring_merchant_count,
                monthly_recurring_spend: self.monthly_recurring_spend,
                subscription_share_pct: self.subscription_share_pct,
            }),
            savings: present(SavingsSignals {
                savings_growth_rate_pct: self.savings_growth_rate_pct,
                net_savings_inflow: self.net_savings_inflow,
            }),
            user_metadata: present(UserMetadata {
                age_bracket: self.age_bracket,
                has_student_loan: self.has_student_loan,
                monthly_transaction_count: self.monthly_transaction_count,
                essentials_share_pct: self.essentials_share_pct,
                coffee_food_delivery_monthly: self.coffee_food_delivery_monthly,
                has_rent_transactions: self.has_rent_transactions,
                has_mortgage: self.has_mortgage,
            }),
        };

        Ok(ImportedSnapshot {
            user_id: self.user_id.trim().to_string(),
            window,
            snapshot,
        })
    }
}

/// One row per (user, window). Empty cells are absent signals and
/// `card_utilization_pcts` is `;`-separated.
pub fn read_signal_csv<R: Read>(reader: R) -> Result<Vec<ImportedSnapshot>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader.headers()?.clone();
    let mut imported = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |pos| pos.line());
        let row: CsvRow = record.deserialize(Some(&headers))?;
        imported.push(row.into_imported(line)?);
    }
    Ok(imported)
}

pub fn read_signal_csv_file(path: &Path) -> Result<Vec<ImportedSnapshot>> {
    let file = std::fs::File::open(path)?;
    read_signal_csv(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "user_id,window_type,aggregate_utilization_pct,card_utilization_pcts,minimum_payment_only,has_interest_charges,any_overdue,num_credit_cards,median_pay_gap_days,cash_flow_buffer_months,income_variability_pct,annual_income,payment_frequency,recurring_merchant_count,monthly_recurring_spend,subscription_share_pct,savings_growth_rate_pct,net_savings_inflow,age_bracket,has_student_loan,monthly_transaction_count,essentials_share_pct,coffee_food_delivery_monthly,has_rent_transactions,has_mortgage";

    #[test]
    fn blank_columns_leave_categories_absent() {
        let data = format!(
            "{HEADER}\nu1,30d,,,,,,,65,0.4,35,,,,,,,,,,,,,,\n"
        );
        let rows = read_signal_csv(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.window, WindowType::Days30);
        assert!(row.snapshot.credit.is_none());
        assert!(row.snapshot.savings.is_none());
        assert_eq!(row.snapshot.cash_flow_buffer_months(), 0.4);
    }

    #[test]
    fn card_list_and_minimum_payment_flag() {
        let data = format!(
            "{HEADER}\nu2,180d,64,82.5;20,true,true,false,2,,,,,,,,,,,,,,,,,\n"
        );
        let rows = read_signal_csv(data.as_bytes()).unwrap();
        let cards = rows[0].snapshot.cards();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].minimum_payment_only, Some(true));
        assert_eq!(rows[0].snapshot.peak_utilization_pct(), 82.5);
        assert_eq!(rows[0].window, WindowType::Days180);
    }

    #[test]
    fn unknown_window_rejects_file() {
        let data = format!("{HEADER}\nu3,90d,10,,,,,,,,,,,,,,,,,,,,,,\n");
        let err = read_signal_csv(data.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::InvalidWindow { .. }));
    }

    #[test]
    fn bad_card_entry_is_reported() {
        let cards = parse_cards(Some("12;lots"), None);
        assert!(cards.is_err());
        assert!(parse_cards(None, None).unwrap().is_empty());
    }

    #[test]
    fn bad_card_entry_names_the_line() {
        let data = format!(
            "{HEADER}\nu1,30d,10,,,,,,,,,,,,,,,,,,,,,,\nu2,30d,40,55;lots,,,,,,,,,,,,,,,,,,,,,\n"
        );
        let err = read_signal_csv(data.as_bytes()).unwrap_err();
        match err {
            Error::InvalidSignal { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("lots"));
            }
            other => panic!("expected InvalidSignal, got {other:?}"),
        }
    }
}
