//! Payout plan query functions.
//!
//! Plans are append-only audit rows: stored when computed, stamped with
//! `executed_at` exactly once at commit. A plan that failed execution stays
//! in the log uncommitted. `distribution_inputs` and `commit_distribution`
//! are the two transactional halves of a distribution; everything between
//! them happens on an immutable in-memory plan.

use rusqlite::Connection;
use tidemark_payout::{DistributionInputs, PayoutPlan, PlanEntry};
use tidemark_types::{Credit, UnixSecs};

use crate::{queries::accrual, queries::ledger, DbError, Result};

/// One row of the plan audit log, without entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanSummary {
    pub distribution_id: String,
    pub generated_at: UnixSecs,
    pub total_paid_lamports: u64,
    pub total_converted_micro_usd: u64,
    pub entry_count: u64,
    pub executed_at: Option<UnixSecs>,
}

fn parse_total_credit(text: &str) -> Result<Credit> {
    text.parse()
        .map_err(|e| DbError::Serialization(format!("total_credit '{text}': {e}")))
}

/// Freeze the calculator's inputs: ledger state plus the whole accrual book,
/// read in one transaction so no writer interleaves between the two.
pub fn distribution_inputs(conn: &Connection) -> Result<DistributionInputs> {
    let tx = conn.unchecked_transaction()?;
    let ledger = ledger::load(&tx)?;
    let records = accrual::all_records(&tx)?.into_values().collect();
    tx.commit()?;
    Ok(DistributionInputs { ledger, records })
}

/// Append a freshly computed plan to the audit log.
pub fn store_plan(conn: &Connection, plan: &PayoutPlan) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO payout_plans
            (distribution_id, generated_at, pool_lamports, price_micro_usd,
             price_as_of, total_credit, total_converted_micro_usd,
             total_paid_lamports, remainder_lamports, executed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL)",
        rusqlite::params![
            plan.distribution_id,
            plan.generated_at as i64,
            plan.pool_lamports as i64,
            plan.price_micro_usd as i64,
            plan.price_as_of as i64,
            plan.total_credit.to_string(),
            plan.total_converted_micro_usd as i64,
            plan.total_paid_lamports as i64,
            plan.remainder_lamports as i64,
        ],
    )?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO payout_entries
                (distribution_id, position, address, credit, share_ppm,
                 amount_lamports, amount_micro_usd)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for (position, entry) in plan.entries.iter().enumerate() {
            stmt.execute(rusqlite::params![
                plan.distribution_id,
                position as i64,
                entry.address,
                entry.credit.to_string(),
                entry.share_ppm as i64,
                entry.amount_lamports as i64,
                entry.amount_micro_usd as i64,
            ])?;
        }
    }
    tx.commit()?;

    tracing::info!(
        distribution_id = %plan.distribution_id,
        entries = plan.entries.len(),
        total_paid = plan.total_paid_lamports,
        "payout plan stored"
    );
    Ok(())
}

/// Commit an executed distribution: debit the pool, lock baselines, reset
/// credit for every paid address, and stamp `executed_at`, atomically.
///
/// Fails closed: a plan whose total exceeds the live pool (or that was
/// already committed) changes nothing.
pub fn commit_distribution(
    conn: &Connection,
    plan: &PayoutPlan,
    now: UnixSecs,
) -> Result<LedgerStateAfterCommit> {
    let tx = conn.unchecked_transaction()?;

    let mut state = ledger::load(&tx)?;
    state.commit_distribution(plan.total_paid_lamports, now)?;
    ledger::store(&tx, &state)?;

    // Only paid holders lose their credit; dust holders keep accruing.
    let mut credits_reset = 0;
    {
        let mut stmt = tx.prepare(
            "UPDATE accrual_records SET credit = '0', last_updated_at = ?1
             WHERE address = ?2",
        )?;
        for entry in &plan.entries {
            credits_reset += stmt.execute(rusqlite::params![now as i64, entry.address])?;
        }
    }

    let stamped = tx.execute(
        "UPDATE payout_plans SET executed_at = ?1
         WHERE distribution_id = ?2 AND executed_at IS NULL",
        rusqlite::params![now as i64, plan.distribution_id],
    )?;
    if stamped == 0 {
        return Err(DbError::Constraint(format!(
            "plan '{}' is unknown or already committed",
            plan.distribution_id
        )));
    }
    tx.commit()?;

    tracing::info!(
        distribution_id = %plan.distribution_id,
        paid = plan.total_paid_lamports,
        credits_reset,
        pool_after = state.pool_lamports,
        "distribution committed"
    );
    Ok(LedgerStateAfterCommit {
        ledger: state,
        credits_reset: credits_reset as u64,
    })
}

/// Ledger view returned by a successful commit.
#[derive(Clone, Debug)]
pub struct LedgerStateAfterCommit {
    pub ledger: tidemark_ledger::LedgerState,
    pub credits_reset: u64,
}

/// Load one plan with its entries, by distribution id.
pub fn plan(conn: &Connection, distribution_id: &str) -> Result<PayoutPlan> {
    struct PlanRow {
        generated_at: i64,
        pool_lamports: i64,
        price_micro_usd: i64,
        price_as_of: i64,
        total_credit: String,
        total_converted_micro_usd: i64,
        total_paid_lamports: i64,
        remainder_lamports: i64,
        executed_at: Option<i64>,
    }

    let head = conn
        .query_row(
            "SELECT generated_at, pool_lamports, price_micro_usd, price_as_of,
                    total_credit, total_converted_micro_usd, total_paid_lamports,
                    remainder_lamports, executed_at
             FROM payout_plans WHERE distribution_id = ?1",
            [distribution_id],
            |row| {
                Ok(PlanRow {
                    generated_at: row.get(0)?,
                    pool_lamports: row.get(1)?,
                    price_micro_usd: row.get(2)?,
                    price_as_of: row.get(3)?,
                    total_credit: row.get(4)?,
                    total_converted_micro_usd: row.get(5)?,
                    total_paid_lamports: row.get(6)?,
                    remainder_lamports: row.get(7)?,
                    executed_at: row.get(8)?,
                })
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                DbError::NotFound(format!("payout plan '{distribution_id}'"))
            }
            other => DbError::Sqlite(other),
        })?;

    let mut stmt = conn.prepare(
        "SELECT address, credit, share_ppm, amount_lamports, amount_micro_usd
         FROM payout_entries WHERE distribution_id = ?1 ORDER BY position ASC",
    )?;
    let rows = stmt.query_map([distribution_id], |row| {
        let credit_text: String = row.get(1)?;
        Ok((
            PlanEntry {
                address: row.get(0)?,
                credit: 0,
                share_ppm: row.get::<_, i64>(2)? as u64,
                amount_lamports: row.get::<_, i64>(3)? as u64,
                amount_micro_usd: row.get::<_, i64>(4)? as u64,
            },
            credit_text,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (mut entry, credit_text) = row?;
        entry.credit = credit_text
            .parse()
            .map_err(|e| DbError::Serialization(format!("entry credit: {e}")))?;
        entries.push(entry);
    }

    Ok(PayoutPlan {
        distribution_id: distribution_id.to_string(),
        generated_at: head.generated_at as u64,
        pool_lamports: head.pool_lamports as u64,
        price_micro_usd: head.price_micro_usd as u64,
        price_as_of: head.price_as_of as u64,
        total_credit: parse_total_credit(&head.total_credit)?,
        total_converted_micro_usd: head.total_converted_micro_usd as u64,
        total_paid_lamports: head.total_paid_lamports as u64,
        remainder_lamports: head.remainder_lamports as u64,
        executed_at: head.executed_at.map(|t| t as u64),
        entries,
    })
}

/// Most recent plans, newest first, without their entries.
pub fn recent_plans(conn: &Connection, limit: u32) -> Result<Vec<PlanSummary>> {
    let mut stmt = conn.prepare(
        "SELECT p.distribution_id, p.generated_at, p.total_paid_lamports,
                p.total_converted_micro_usd, p.executed_at,
                (SELECT COUNT(*) FROM payout_entries e
                 WHERE e.distribution_id = p.distribution_id)
         FROM payout_plans p
         ORDER BY p.generated_at DESC, p.distribution_id DESC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit], |row| {
        Ok(PlanSummary {
            distribution_id: row.get(0)?,
            generated_at: row.get::<_, i64>(1)? as u64,
            total_paid_lamports: row.get::<_, i64>(2)? as u64,
            total_converted_micro_usd: row.get::<_, i64>(3)? as u64,
            executed_at: row.get::<_, Option<i64>>(4)?.map(|t| t as u64),
            entry_count: row.get::<_, i64>(5)? as u64,
        })
    })?;
    rows.map(|r| r.map_err(DbError::Sqlite)).collect()
}
