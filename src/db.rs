use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::import;
use crate::models::{
    AssignmentResult, CardSignal, Criteria, CreditSignals, IncomeSignals, Persona,
    SavingsSignals, SignalSnapshot, StoredAssignment, StoredTransition, SubscriptionSignals,
    TransitionRecord, UserMetadata, WindowType,
};
use crate::store::{AssignmentStore, SignalStore};

// `seq` breaks ties between rows written within the same timestamp.
const LATEST_SNAPSHOT_SQL: &str = r#"
    SELECT snapshot
    FROM persona_engine.signal_snapshots
    WHERE user_id = $1 AND window_type = $2
    ORDER BY computed_at DESC, seq DESC
    LIMIT 1
"#;

const RECENT_ASSIGNMENTS_SQL: &str = r#"
    SELECT id, user_id, window_type, primary_persona, primary_match_strength,
           secondary_personas, criteria_met, all_matches, user_metadata, error,
           assigned_at
    FROM persona_engine.persona_assignments
    WHERE user_id = $1 AND window_type = $2
    ORDER BY assigned_at DESC, seq DESC
    LIMIT $3
"#;

const TRANSITIONS_SQL: &str = r#"
    SELECT id, user_id, window_type, from_persona, to_persona, transition_date,
           days_in_previous_persona, celebration_shown, milestone_achieved,
           achievement_title
    FROM persona_engine.persona_transitions
    WHERE user_id = $1 AND window_type = $2
    ORDER BY transition_date DESC, seq DESC
"#;

pub async fn connect(config: &EngineConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.require_database_url()?)
        .await?;
    Ok(pool)
}

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Append a freshly computed snapshot. Readers always pick the newest.
    pub async fn store_snapshot(
        &self,
        user_id: &str,
        window: WindowType,
        snapshot: &SignalSnapshot,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO persona_engine.signal_snapshots (id, user_id, window_type, snapshot)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(window.as_str())
        .bind(Json(snapshot))
        .execute(&self.pool)
        .await?;
        Ok(id)
    }
}

fn parse_window(raw: &str) -> Result<WindowType> {
    raw.parse()
}

fn assignment_from_row(row: &PgRow) -> Result<StoredAssignment> {
    let window: String = row.try_get("window_type")?;
    let primary: String = row.try_get("primary_persona")?;
    let strength: String = row.try_get("primary_match_strength")?;
    let Json(secondary_personas): Json<Vec<Persona>> = row.try_get("secondary_personas")?;
    let Json(criteria_met): Json<Criteria> = row.try_get("criteria_met")?;
    let Json(all_matches): Json<Vec<Persona>> = row.try_get("all_matches")?;
    let user_metadata: Option<Json<UserMetadata>> = row.try_get("user_metadata")?;

    Ok(StoredAssignment {
        id: row.try_get("id")?,
        result: AssignmentResult {
            user_id: row.try_get("user_id")?,
            window_type: parse_window(&window)?,
            primary_persona: primary.parse()?,
            primary_match_strength: strength.parse()?,
            secondary_personas,
            criteria_met,
            all_matches,
            assigned_at: row.try_get::<DateTime<Utc>, _>("assigned_at")?,
            error: row.try_get("error")?,
            user_metadata: user_metadata.map(|Json(metadata)| metadata),
        },
    })
}

fn transition_from_row(row: &PgRow) -> Result<StoredTransition> {
    let window: String = row.try_get("window_type")?;
    let from: String = row.try_get("from_persona")?;
    let to: String = row.try_get("to_persona")?;

    Ok(StoredTransition {
        id: row.try_get("id")?,
        record: TransitionRecord {
            user_id: row.try_get("user_id")?,
            window_type: parse_window(&window)?,
            from_persona: from.parse()?,
            to_persona: to.parse()?,
            transition_date: row.try_get("transition_date")?,
            days_in_previous_persona: row.try_get("days_in_previous_persona")?,
            celebration_shown: row.try_get("celebration_shown")?,
            milestone_achieved: row.try_get("milestone_achieved")?,
            achievement_title: row.try_get("achievement_title")?,
        },
    })
}

#[async_trait]
impl SignalStore for PgStore {
    async fn load_snapshot(
        &self,
        user_id: &str,
        window: WindowType,
    ) -> Result<Option<SignalSnapshot>> {
        let row = sqlx::query(LATEST_SNAPSHOT_SQL)
            .bind(user_id)
            .bind(window.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let Json(snapshot): Json<SignalSnapshot> = row.try_get("snapshot")?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AssignmentStore for PgStore {
    async fn store_assignment(&self, result: &AssignmentResult) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO persona_engine.persona_assignments
            (id, user_id, window_type, primary_persona, primary_match_strength,
             secondary_personas, criteria_met, all_matches, user_metadata, error, assigned_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(id)
        .bind(&result.user_id)
        .bind(result.window_type.as_str())
        .bind(result.primary_persona.as_str())
        .bind(result.primary_match_strength.as_str())
        .bind(Json(&result.secondary_personas))
        .bind(Json(&result.criteria_met))
        .bind(Json(&result.all_matches))
        .bind(result.user_metadata.as_ref().map(Json))
        .bind(result.error.as_deref())
        .bind(result.assigned_at)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn load_recent_assignments(
        &self,
        user_id: &str,
        window: WindowType,
        limit: usize,
    ) -> Result<Vec<StoredAssignment>> {
        let limit = i64::try_from(limit)
            .map_err(|_| Error::Store(format!("assignment limit {limit} out of range")))?;
        let rows = sqlx::query(RECENT_ASSIGNMENTS_SQL)
            .bind(user_id)
            .bind(window.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(assignment_from_row).collect()
    }

    async fn store_transition(&self, record: &TransitionRecord) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO persona_engine.persona_transitions
            (id, user_id, window_type, from_persona, to_persona, transition_date,
             days_in_previous_persona, celebration_shown, milestone_achieved, achievement_title)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(id)
        .bind(&record.user_id)
        .bind(record.window_type.as_str())
        .bind(record.from_persona.as_str())
        .bind(record.to_persona.as_str())
        .bind(record.transition_date)
        .bind(record.days_in_previous_persona)
        .bind(record.celebration_shown)
        .bind(record.milestone_achieved.as_deref())
        .bind(record.achievement_title.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn load_transitions(
        &self,
        user_id: &str,
        window: WindowType,
    ) -> Result<Vec<StoredTransition>> {
        let rows = sqlx::query(TRANSITIONS_SQL)
            .bind(user_id)
            .bind(window.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(transition_from_row).collect()
    }
}

/// Demo users covering a risk profile, an irregular earner and a saver.
pub fn seed_snapshots() -> Vec<(&'static str, SignalSnapshot)> {
    vec![
        (
            "user-avery",
            SignalSnapshot {
                credit: Some(CreditSignals {
                    aggregate_utilization_pct: Some(78.0),
                    cards: vec![
                        CardSignal {
                            utilization_pct: Some(91.0),
                            minimum_payment_only: Some(true),
                        },
                        CardSignal {
                            utilization_pct: Some(54.0),
                            minimum_payment_only: Some(false),
                        },
                    ],
                    has_interest_charges: Some(true),
                    any_overdue: Some(false),
                    num_credit_cards: Some(2),
                }),
                income: Some(IncomeSignals {
                    median_pay_gap_days: Some(14.0),
                    cash_flow_buffer_months: Some(0.8),
                    income_variability_pct: Some(6.0),
                    annual_income: Some(52_000.0),
                    payment_frequency: Some("biweekly".to_string()),
                }),
                subscriptions: Some(SubscriptionSignals {
                    recurring_merchant_count: Some(4),
                    monthly_recurring_spend: Some(68.0),
                    subscription_share_pct: Some(7.5),
                }),
                ..Default::default()
            },
        ),
        (
            "user-jules",
            SignalSnapshot {
                income: Some(IncomeSignals {
                    median_pay_gap_days: Some(62.0),
                    cash_flow_buffer_months: Some(0.4),
                    income_variability_pct: Some(38.0),
                    annual_income: Some(41_000.0),
                    payment_frequency: Some("irregular".to_string()),
                }),
                savings: Some(SavingsSignals {
                    savings_growth_rate_pct: Some(0.5),
                    net_savings_inflow: Some(40.0),
                }),
                ..Default::default()
            },
        ),
        (
            "user-kiara",
            SignalSnapshot {
                credit: Some(CreditSignals {
                    aggregate_utilization_pct: Some(11.0),
                    cards: vec![CardSignal {
                        utilization_pct: Some(11.0),
                        minimum_payment_only: Some(false),
                    }],
                    has_interest_charges: Some(false),
                    any_overdue: Some(false),
                    num_credit_cards: Some(1),
                }),
                income: Some(IncomeSignals {
                    median_pay_gap_days: Some(15.0),
                    cash_flow_buffer_months: Some(3.2),
                    income_variability_pct: Some(4.0),
                    annual_income: Some(68_000.0),
                    payment_frequency: Some("biweekly".to_string()),
                }),
                savings: Some(SavingsSignals {
                    savings_growth_rate_pct: Some(6.1),
                    net_savings_inflow: Some(520.0),
                }),
                user_metadata: Some(UserMetadata {
                    age_bracket: Some("26-35".to_string()),
                    has_student_loan: Some(false),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ),
    ]
}

pub async fn seed(store: &PgStore) -> Result<usize> {
    let mut inserted = 0usize;
    for (user_id, snapshot) in seed_snapshots() {
        for window in WindowType::ALL {
            store.store_snapshot(user_id, window, &snapshot).await?;
            inserted += 1;
        }
    }
    info!(inserted, "seed snapshots stored");
    Ok(inserted)
}

pub async fn import_csv(store: &PgStore, csv_path: &Path) -> Result<usize> {
    let rows = import::read_signal_csv_file(csv_path)?;
    let mut inserted = 0usize;
    for row in rows {
        store
            .store_snapshot(&row.user_id, row.window, &row.snapshot)
            .await?;
        inserted += 1;
    }
    info!(inserted, path = %csv_path.display(), "signal snapshots imported");
    Ok(inserted)
}
