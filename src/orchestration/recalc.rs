use crate::datasource::MicroHintResolver;
use crate::db::Repository;
use crate::domain::{AccountId, Decimal, Fill, Trade, TradeId, TradeScope};
use crate::engine::{instrument, FeeOutcome, FeeResolver, FeeSchedule};
use crate::locks::KeyedLocks;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Fresh reloads attempted after a rejected write before giving up.
const MAX_STALE_RETRIES: usize = 3;

/// Minimum change that counts as a different fee.
fn fee_epsilon() -> Decimal {
    Decimal::from_parts(1, 9)
}

pub(crate) fn trade_lock_key(id: &TradeId) -> String {
    format!("trade:{}", id)
}

fn account_lock_key(id: &AccountId) -> String {
    format!("account:{}", id)
}

/// Recomputes and persists trade fees, per trade or account-wide.
pub struct FeeRecalculator {
    repo: Arc<Repository>,
    hints: Arc<MicroHintResolver>,
    locks: Arc<KeyedLocks>,
    concurrency: usize,
}

impl FeeRecalculator {
    pub fn new(
        repo: Arc<Repository>,
        hints: Arc<MicroHintResolver>,
        locks: Arc<KeyedLocks>,
        concurrency: usize,
    ) -> Self {
        Self {
            repo,
            hints,
            locks,
            concurrency: concurrency.max(1),
        }
    }

    pub fn locks(&self) -> &Arc<KeyedLocks> {
        &self.locks
    }

    /// Recompute one trade's fee under its lock. Returns whether a write happened.
    pub async fn recalc_trade(&self, trade_id: &TradeId) -> Result<bool, RecalcError> {
        let _guard = self.locks.lock(&trade_lock_key(trade_id)).await;
        self.recalc_trade_locked(trade_id).await
    }

    /// Same as `recalc_trade`; the caller already holds the trade lock.
    ///
    /// A write rejected as stale is retried from a fresh load.
    pub(crate) async fn recalc_trade_locked(
        &self,
        trade_id: &TradeId,
    ) -> Result<bool, RecalcError> {
        for _ in 0..MAX_STALE_RETRIES {
            let Some(bundle) = self.repo.load_trade_bundle(trade_id).await? else {
                debug!(trade_id = %trade_id, "Trade not found, nothing to recalculate");
                return Ok(false);
            };

            let schedule = bundle.schedule();
            let hint = self.micro_hint_for(&bundle.trade, &schedule).await;
            let outcome = FeeResolver::compute(&bundle.trade, &bundle.fills, &schedule, hint);
            match self.persist_if_changed(&bundle.trade, outcome).await? {
                FeeWrite::Written => return Ok(true),
                FeeWrite::Unchanged => return Ok(false),
                FeeWrite::Stale => continue,
            }
        }

        warn!(
            trade_id = %trade_id,
            attempts = MAX_STALE_RETRIES,
            "Trade kept changing during recalculation, giving up"
        );
        Ok(false)
    }

    /// Recompute every trade of an account in `scope`.
    ///
    /// Returns the number of trades whose stored fee changed. A missing
    /// account updates nothing.
    pub async fn recalc_account(
        &self,
        account_id: &AccountId,
        scope: TradeScope,
    ) -> Result<usize, RecalcError> {
        let _account_guard = self.locks.lock(&account_lock_key(account_id)).await;

        let Some(bundle) = self.repo.load_account_bundle(account_id, scope).await? else {
            debug!(account_id = %account_id, "Account not found, nothing to recalculate");
            return Ok(0);
        };
        let schedule = Arc::new(bundle.schedule());
        let total = bundle.trades.len();

        let hint_symbols: Vec<String> = bundle
            .trades
            .iter()
            .filter(|(trade, _)| needs_micro_hint(trade, &schedule))
            .map(|(trade, _)| trade.symbol.as_str().to_string())
            .collect();
        let hints = self.hints.lookup_many(hint_symbols).await;

        let jobs: Vec<(Trade, Vec<Fill>, Option<bool>)> = bundle
            .trades
            .into_iter()
            .map(|(trade, fills)| {
                let hint = hints.get(trade.symbol.as_str()).copied();
                (trade, fills, hint)
            })
            .collect();

        let results: Vec<Result<bool, RecalcError>> = stream::iter(jobs)
            .map(move |(trade, fills, hint)| {
                let schedule = Arc::clone(&schedule);
                async move {
                    let _guard = self.locks.lock(&trade_lock_key(&trade.id)).await;
                    let outcome = FeeResolver::compute(&trade, &fills, &schedule, hint);
                    match self.persist_if_changed(&trade, outcome).await? {
                        FeeWrite::Written => Ok(true),
                        FeeWrite::Unchanged => Ok(false),
                        // The snapshot predates an edit; redo it from fresh rows.
                        FeeWrite::Stale => self.recalc_trade_locked(&trade.id).await,
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut updated = 0usize;
        for result in results {
            if result? {
                updated += 1;
            }
        }

        info!(
            account_id = %account_id,
            scope = scope.as_str(),
            trades = total,
            updated,
            "Recalculated account fees"
        );
        Ok(updated)
    }

    /// External micro hint, fetched only when the futures default branch can
    /// actually use it.
    pub(crate) async fn micro_hint_for(
        &self,
        trade: &Trade,
        schedule: &FeeSchedule,
    ) -> Option<bool> {
        if !needs_micro_hint(trade, schedule) {
            return None;
        }
        self.hints.lookup_micro_hint(trade.symbol.as_str()).await
    }

    /// Compare-and-set write of a computed fee against the snapshot revision.
    async fn persist_if_changed(
        &self,
        trade: &Trade,
        outcome: FeeOutcome,
    ) -> Result<FeeWrite, RecalcError> {
        let FeeOutcome::Computed(fee) = outcome else {
            debug!(trade_id = %trade.id, "No fee rule applies, keeping stored fees");
            return Ok(FeeWrite::Unchanged);
        };
        if !fee.differs_from(trade.fees_or_zero(), fee_epsilon()) {
            return Ok(FeeWrite::Unchanged);
        }

        let written = self
            .repo
            .update_trade_fees_if_revision(&trade.id, fee, trade.revision)
            .await?;
        if written {
            debug!(trade_id = %trade.id, fees = %fee, "Updated trade fees");
            Ok(FeeWrite::Written)
        } else {
            debug!(
                trade_id = %trade.id,
                revision = trade.revision,
                "Trade changed since snapshot, fee write rejected"
            );
            Ok(FeeWrite::Stale)
        }
    }
}

/// Result of one compare-and-set fee write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeeWrite {
    Written,
    Unchanged,
    Stale,
}

/// Futures trade with no ticker override on an account that has defaults.
fn needs_micro_hint(trade: &Trade, schedule: &FeeSchedule) -> bool {
    instrument::is_futures_trade(trade)
        && schedule.has_futures_defaults()
        && !schedule.ticker_fees.contains_key(trade.symbol.as_str())
}

#[derive(Debug, Error)]
pub enum RecalcError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}
