use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use levy_core::approval;
use levy_core::{
    DecisionAction, LevyCategory, LevyDefinition, LevyRepository, LevyStatus, NewLevyDefinition,
    RateChangeOutcome, RateChangeRecord, RateChangeRequest, RateDecision, RateState,
    RateTableAction, RateTableOutcome, RepositoryError,
};
use rust_decimal::Decimal;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Row, SqliteExecutor};
use tracing::{debug, info};

use crate::decimal::{decimal_to_text, get_decimal, get_optional_decimal};

const LEVY_COLUMNS: &str = "id, name, category, rate, calculation_order, status, pending_rate, \
                            submitted_by, effective_date";

const RATE_CHANGE_COLUMNS: &str = "id, levy_id, previous_rate, proposed_rate, submitted_by, \
                                   submitted_at, decided_by, decided_at, outcome";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Connects to `database_url`: a bare path, a `sqlite:` URL, or
    /// `:memory:`. File databases are created if missing.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to an in-memory database would otherwise need the
        // shared cache to see the same schema.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database: {}", database_url))?;
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Initialise an empty store from the SQL seed files in `seeds_dir`,
    /// executed in alphabetical order by filename within one transaction.
    ///
    /// Seeds run at most once per store, and never against a store that
    /// already holds levies, so deleted or renamed levies stay that way.
    /// Returns the number of files applied.
    pub async fn run_seeds(
        &self,
        seeds_dir: &Path,
    ) -> Result<usize> {
        let mut entries: Vec<_> = std::fs::read_dir(seeds_dir)
            .with_context(|| format!("Failed to read seeds directory '{}'", seeds_dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
            .collect();

        entries.sort_by_key(|entry| entry.file_name());

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start seed transaction")?;

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seed_history")
            .fetch_one(&mut *tx)
            .await
            .context("Failed to read seed history")?;
        let levies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM levy_definition")
            .fetch_one(&mut *tx)
            .await
            .context("Failed to count levies")?;
        if applied > 0 || levies > 0 {
            debug!(applied, levies, "store already initialised, seeds skipped");
            return Ok(0);
        }

        for entry in &entries {
            let path = entry.path();
            let sql = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;

            sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(&sql))
                .await
                .with_context(|| format!("Failed to execute seed file '{}'", path.display()))?;

            sqlx::query("INSERT INTO seed_history (file_name, applied_at) VALUES (?, ?)")
                .bind(entry.file_name().to_string_lossy().into_owned())
                .bind(Utc::now())
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to record seed file '{}'", path.display()))?;
        }

        tx.commit().await.context("Failed to commit seeds")?;
        info!(files = entries.len(), seeds_dir = %seeds_dir.display(), "levy seeds applied");

        Ok(entries.len())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// SQLITE_BUSY or SQLITE_LOCKED, including their extended codes.
fn is_busy(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, 5 | 6))
}

/// Lock contention means another writer got to the levy first.
fn db_err(e: sqlx::Error) -> RepositoryError {
    if is_busy(&e) {
        return RepositoryError::Conflict(format!("store is busy with another change: {e}"));
    }
    RepositoryError::Database(e.to_string())
}

/// Unique-index violations (duplicate name, second VAT levy, second open
/// proposal) are conflicts, not storage failures.
fn write_err(
    e: sqlx::Error,
    what: &str,
) -> RepositoryError {
    let unique = e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if unique {
        RepositoryError::Conflict(format!("{what}: {e}"))
    } else {
        db_err(e)
    }
}

fn row_to_levy(row: &SqliteRow) -> Result<LevyDefinition, RepositoryError> {
    let category_str: String = row.try_get("category").map_err(db_err)?;
    let category = LevyCategory::parse(&category_str).ok_or_else(|| {
        RepositoryError::Database(format!("Invalid levy category: {}", category_str))
    })?;

    let status_str: String = row.try_get("status").map_err(db_err)?;
    let status = LevyStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Database(format!("Invalid levy status: {}", status_str)))?;

    let id: i64 = row.try_get("id").map_err(db_err)?;
    let rate = get_decimal(row, "rate")?;

    let rate_state = match status {
        LevyStatus::Active => RateState::Active { rate },
        LevyStatus::Pending => RateState::PendingApproval {
            current_rate: rate,
            proposed_rate: get_optional_decimal(row, "pending_rate")?.ok_or_else(|| {
                RepositoryError::Database(format!("Levy {} is pending without a pending_rate", id))
            })?,
            submitted_by: row
                .try_get::<Option<String>, _>("submitted_by")
                .map_err(db_err)?
                .unwrap_or_default(),
        },
    };

    Ok(LevyDefinition {
        id,
        name: row.try_get("name").map_err(db_err)?,
        category,
        calculation_order: row.try_get("calculation_order").map_err(db_err)?,
        rate_state,
        effective_date: row
            .try_get::<Option<NaiveDate>, _>("effective_date")
            .map_err(|e| RepositoryError::Database(format!("Failed to get effective_date: {}", e)))?,
    })
}

fn row_to_rate_change(row: &SqliteRow) -> Result<RateChangeRecord, RepositoryError> {
    let outcome_str: String = row.try_get("outcome").map_err(db_err)?;
    let outcome = RateChangeOutcome::parse(&outcome_str).ok_or_else(|| {
        RepositoryError::Database(format!("Invalid rate change outcome: {}", outcome_str))
    })?;

    Ok(RateChangeRecord {
        id: row.try_get("id").map_err(db_err)?,
        levy_id: row.try_get("levy_id").map_err(db_err)?,
        previous_rate: get_decimal(row, "previous_rate")?,
        proposed_rate: get_decimal(row, "proposed_rate")?,
        submitted_by: row.try_get("submitted_by").map_err(db_err)?,
        submitted_at: row
            .try_get::<DateTime<Utc>, _>("submitted_at")
            .map_err(|e| RepositoryError::Database(format!("Failed to get submitted_at: {}", e)))?,
        decided_by: row.try_get("decided_by").map_err(db_err)?,
        decided_at: row
            .try_get::<Option<DateTime<Utc>>, _>("decided_at")
            .map_err(|e| RepositoryError::Database(format!("Failed to get decided_at: {}", e)))?,
        outcome,
    })
}

async fn fetch_levy<'e, E>(
    executor: E,
    id: i64,
) -> Result<LevyDefinition, RepositoryError>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {LEVY_COLUMNS} FROM levy_definition WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(db_err)?
        .ok_or(RepositoryError::NotFound)?;

    row_to_levy(&row)
}

/// Writes `next` over the levy's rate columns, but only if the stored status
/// still matches `expected`. A mismatch means another transition won the race.
async fn write_rate_state<'e, E>(
    executor: E,
    id: i64,
    expected: LevyStatus,
    next: &RateState,
    effective_date: Option<NaiveDate>,
) -> Result<(), RepositoryError>
where
    E: SqliteExecutor<'e>,
{
    let (pending_rate, submitted_by) = match next {
        RateState::Active { .. } => (None, None),
        RateState::PendingApproval {
            proposed_rate,
            submitted_by,
            ..
        } => (Some(decimal_to_text(*proposed_rate)), Some(submitted_by.clone())),
    };

    let result = sqlx::query(
        "UPDATE levy_definition
         SET rate = ?, status = ?, pending_rate = ?, submitted_by = ?,
             effective_date = COALESCE(?, effective_date), updated_at = ?
         WHERE id = ? AND status = ?",
    )
    .bind(decimal_to_text(next.active_rate()))
    .bind(next.status().as_str())
    .bind(pending_rate)
    .bind(submitted_by)
    .bind(effective_date)
    .bind(Utc::now())
    .bind(id)
    .bind(expected.as_str())
    .execute(executor)
    .await
    .map_err(db_err)?;

    if result.rows_affected() != 1 {
        return Err(RepositoryError::Conflict(format!(
            "levy {} changed while the rate change was being applied",
            id
        )));
    }
    Ok(())
}

/// Records a maker's proposal: the levy goes pending and a `rate_change` row
/// is opened. Runs inside the caller's transaction.
async fn record_proposal(
    conn: &mut SqliteConnection,
    levy: &LevyDefinition,
    new_rate: Decimal,
    submitted_by: &str,
) -> Result<RateState, RepositoryError> {
    let next = approval::propose(&levy.rate_state, new_rate, submitted_by)?;

    write_rate_state(&mut *conn, levy.id, LevyStatus::Active, &next, None).await?;

    sqlx::query(
        "INSERT INTO rate_change (levy_id, previous_rate, proposed_rate, submitted_by, submitted_at, outcome)
         VALUES (?, ?, ?, ?, ?, 'pending')",
    )
    .bind(levy.id)
    .bind(decimal_to_text(levy.active_rate()))
    .bind(decimal_to_text(new_rate))
    .bind(submitted_by.trim())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(|e| write_err(e, &format!("cannot record rate change for levy {}", levy.id)))?;

    Ok(next)
}

async fn insert_levy<'e, E>(
    executor: E,
    levy: &NewLevyDefinition,
) -> Result<i64, RepositoryError>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "INSERT INTO levy_definition (name, category, rate, calculation_order, status, effective_date, updated_at)
         VALUES (?, ?, ?, ?, 'active', ?, ?)",
    )
    .bind(levy.name.trim())
    .bind(levy.category.as_str())
    .bind(decimal_to_text(levy.rate))
    .bind(levy.calculation_order)
    .bind(levy.effective_date)
    .bind(Utc::now())
    .execute(executor)
    .await
    .map_err(|e| write_err(e, &format!("cannot create levy '{}'", levy.name)))?;

    Ok(result.last_insert_rowid())
}

fn validate_new_levy(levy: &NewLevyDefinition) -> Result<(), RepositoryError> {
    if levy.name.trim().is_empty() {
        return Err(RepositoryError::Invalid("levy name is required".to_string()));
    }
    if levy.rate.is_sign_negative() && !levy.rate.is_zero() {
        return Err(RepositoryError::Invalid(format!(
            "levy '{}' has negative rate {}",
            levy.name, levy.rate
        )));
    }
    Ok(())
}

#[async_trait]
impl LevyRepository for SqliteRepository {
    async fn list_levies(&self) -> Result<Vec<LevyDefinition>, RepositoryError> {
        let sql = format!("SELECT {LEVY_COLUMNS} FROM levy_definition ORDER BY calculation_order, id");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(row_to_levy).collect()
    }

    async fn get_levy(
        &self,
        id: i64,
    ) -> Result<LevyDefinition, RepositoryError> {
        fetch_levy(&self.pool, id).await
    }

    async fn create_levy(
        &self,
        levy: NewLevyDefinition,
    ) -> Result<LevyDefinition, RepositoryError> {
        validate_new_levy(&levy)?;

        let id = insert_levy(&self.pool, &levy).await?;
        self.get_levy(id).await
    }

    async fn load_rate_table(
        &self,
        levies: &[NewLevyDefinition],
        submitted_by: &str,
    ) -> Result<Vec<RateTableOutcome>, RepositoryError> {
        for levy in levies {
            validate_new_levy(levy)?;
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut outcomes = Vec::with_capacity(levies.len());

        for row in levies {
            let existing: Option<i64> =
                sqlx::query_scalar("SELECT id FROM levy_definition WHERE name = ?")
                    .bind(row.name.trim())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db_err)?;

            let Some(id) = existing else {
                let id = insert_levy(&mut *tx, row).await?;
                outcomes.push(RateTableOutcome {
                    levy: fetch_levy(&mut *tx, id).await?,
                    action: RateTableAction::Created,
                });
                continue;
            };

            let levy = fetch_levy(&mut *tx, id).await?;
            if levy.category != row.category {
                return Err(RepositoryError::Conflict(format!(
                    "levy '{}' is {}; a rate table cannot change it to {}",
                    levy.name,
                    levy.category.as_str(),
                    row.category.as_str()
                )));
            }

            let mut action = RateTableAction::Unchanged;
            if levy.calculation_order != row.calculation_order {
                sqlx::query(
                    "UPDATE levy_definition SET calculation_order = ?, updated_at = ? WHERE id = ?",
                )
                .bind(row.calculation_order)
                .bind(Utc::now())
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
                action = RateTableAction::Reordered;
            }

            // Reloading a table whose proposal is still open is a no-op.
            let already_proposed = levy.pending_rate() == Some(row.rate);
            if row.rate != levy.active_rate() && !already_proposed {
                record_proposal(&mut *tx, &levy, row.rate, submitted_by).await?;
                action = RateTableAction::RateProposed;
            }

            outcomes.push(RateTableOutcome {
                levy: fetch_levy(&mut *tx, id).await?,
                action,
            });
        }

        tx.commit().await.map_err(db_err)?;

        for outcome in outcomes.iter().filter(|o| o.action == RateTableAction::RateProposed) {
            info!(
                levy_id = outcome.levy.id,
                levy = %outcome.levy.name,
                current_rate = %outcome.levy.active_rate(),
                proposed_rate = ?outcome.levy.pending_rate(),
                submitted_by = %submitted_by.trim(),
                "rate change submitted for approval"
            );
        }

        Ok(outcomes)
    }

    async fn delete_levy(
        &self,
        id: i64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM levy_definition WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn submit_rate_change(
        &self,
        request: &RateChangeRequest,
    ) -> Result<LevyDefinition, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let levy = fetch_levy(&mut *tx, request.rate_id).await?;
        let next = record_proposal(&mut *tx, &levy, request.new_rate, &request.submitted_by).await?;

        tx.commit().await.map_err(db_err)?;

        info!(
            levy_id = levy.id,
            levy = %levy.name,
            current_rate = %levy.active_rate(),
            proposed_rate = %request.new_rate,
            submitted_by = %request.submitted_by.trim(),
            "rate change submitted for approval"
        );

        Ok(LevyDefinition {
            rate_state: next,
            ..levy
        })
    }

    async fn decide_rate_change(
        &self,
        decision: &RateDecision,
    ) -> Result<LevyDefinition, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let levy = fetch_levy(&mut *tx, decision.rate_id).await?;
        let (next, effective_date) = match decision.action {
            DecisionAction::Approve => (
                approval::approve(&levy.rate_state, &decision.approved_by)?,
                Some(Utc::now().date_naive()),
            ),
            DecisionAction::Reject => (approval::reject(&levy.rate_state, &decision.approved_by)?, None),
        };

        write_rate_state(&mut *tx, levy.id, LevyStatus::Pending, &next, effective_date).await?;

        let outcome = RateChangeOutcome::from(decision.action);
        sqlx::query(
            "UPDATE rate_change SET outcome = ?, decided_by = ?, decided_at = ?
             WHERE levy_id = ? AND outcome = 'pending'",
        )
        .bind(outcome.as_str())
        .bind(decision.approved_by.trim())
        .bind(Utc::now())
        .bind(levy.id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let stored = fetch_levy(&mut *tx, levy.id).await?;
        tx.commit().await.map_err(db_err)?;

        info!(
            levy_id = levy.id,
            levy = %levy.name,
            outcome = outcome.as_str(),
            active_rate = %stored.active_rate(),
            decided_by = %decision.approved_by.trim(),
            "rate change decided"
        );

        Ok(stored)
    }

    async fn list_rate_changes(
        &self,
        levy_id: i64,
    ) -> Result<Vec<RateChangeRecord>, RepositoryError> {
        // Distinguish an unknown levy from one with no history.
        self.get_levy(levy_id).await?;

        let sql = format!("SELECT {RATE_CHANGE_COLUMNS} FROM rate_change WHERE levy_id = ? ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(levy_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(row_to_rate_change).collect()
    }
}
