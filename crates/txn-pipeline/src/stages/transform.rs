use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, info};
use txn_common::TransactionRecord;

use super::{Stage, StageName};
use crate::dates::parse_mixed_date;
use crate::error::{DataFormatError, Result};
use crate::handoff::{RunContext, CLEAN_TABLE, RAW_TABLE};
use crate::source::RawTable;

/// Normalizes, deduplicates, and filters the fetched table
#[derive(Debug, Default)]
pub struct DataTransformer;

impl DataTransformer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Stage for DataTransformer {
    fn name(&self) -> StageName {
        StageName::Transform
    }

    fn reads(&self) -> &'static [&'static str] {
        const READS: &[&str] = &[RAW_TABLE.name()];
        READS
    }

    fn writes(&self) -> Option<&'static str> {
        Some(CLEAN_TABLE.name())
    }

    async fn run(&self, ctx: &mut RunContext) -> Result<()> {
        let raw = ctx.open(&RAW_TABLE)?;
        let clean = clean_transactions(&raw)?;

        info!(
            rows_in = raw.len(),
            rows_out = clean.len(),
            "Source table cleaned"
        );

        ctx.publish(&CLEAN_TABLE, &clean)?;
        ctx.stats_mut().rows_clean = clean.len();
        Ok(())
    }
}

/// A row after type coercion; any field may still be missing
struct TypedRow<'a> {
    transaction_id: Option<&'a str>,
    user_id: Option<i32>,
    amount: Option<f64>,
    transaction_date: Option<chrono::NaiveDate>,
}

/// Clean a raw table.
///
/// In order: amounts that are not finite numbers become missing; dates are
/// parsed day-first and an unparsable date fails the whole table; rows are
/// deduplicated on `transaction_id` keeping the first; rows with any missing
/// field are dropped. `user_id` must be integral. Output keeps input order.
pub fn clean_transactions(
    raw: &RawTable,
) -> std::result::Result<Vec<TransactionRecord>, DataFormatError> {
    let mut typed = Vec::with_capacity(raw.len());

    for (idx, row) in raw.rows.iter().enumerate() {
        let line = idx + 1;

        let amount = row.amount.as_deref().and_then(coerce_amount);

        let transaction_date = match row.transaction_date.as_deref() {
            Some(text) => Some(parse_mixed_date(text).ok_or_else(|| {
                DataFormatError::InvalidDate {
                    row: line,
                    value: text.to_string(),
                }
            })?),
            None => None,
        };

        let user_id = match row.user_id.as_deref() {
            Some(text) => Some(parse_user_id(text).ok_or_else(|| {
                DataFormatError::InvalidUserId {
                    row: line,
                    value: text.to_string(),
                }
            })?),
            None => None,
        };

        typed.push(TypedRow {
            transaction_id: row.transaction_id.as_deref(),
            user_id,
            amount,
            transaction_date,
        });
    }

    let mut seen = HashSet::new();
    let mut duplicates = 0usize;
    let mut incomplete = 0usize;
    let mut clean = Vec::with_capacity(typed.len());

    for row in typed {
        if let Some(id) = row.transaction_id {
            if !seen.insert(id) {
                duplicates += 1;
                continue;
            }
        }

        match row {
            TypedRow {
                transaction_id: Some(id),
                user_id: Some(user_id),
                amount: Some(amount),
                transaction_date: Some(transaction_date),
            } => clean.push(TransactionRecord {
                transaction_id: id.to_string(),
                user_id,
                amount,
                transaction_date,
            }),
            _ => incomplete += 1,
        }
    }

    debug!(duplicates, incomplete, "Dropped rows during cleaning");
    Ok(clean)
}

fn coerce_amount(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_user_id(text: &str) -> Option<i32> {
    let text = text.trim();
    if let Ok(value) = text.parse::<i32>() {
        return Some(value);
    }

    let value = text.parse::<f64>().ok()?;
    let in_range = value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX);
    (value.is_finite() && value.fract() == 0.0 && in_range).then_some(value as i32)
}
