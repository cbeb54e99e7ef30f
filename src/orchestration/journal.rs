use crate::db::Repository;
use crate::domain::{
    Account, AccountId, AssetClass, Decimal, Direction, FeeRate, Fill, FillId, FillType, Symbol,
    TimeMs, Trade, TradeId, TradeScope,
};
use crate::engine::{
    analyze, build_equity_curve, daily_pnl, explain, instrument, CashFlow, DailyPnl, EquityPoint,
    FeeBreakdown, RealizedEvent, TradeAnalytics,
};
use crate::error::AppError;
use crate::orchestration::recalc::{trade_lock_key, FeeRecalculator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// One execution as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillInput {
    #[serde(rename = "type")]
    pub fill_type: FillType,
    pub price: Decimal,
    pub size: Decimal,
    /// Defaults to the trade's entry time on create, to now afterwards.
    #[serde(default)]
    pub time: Option<TimeMs>,
}

impl FillInput {
    pub fn new(fill_type: FillType, price: Decimal, size: Decimal) -> Self {
        FillInput {
            fill_type,
            price,
            size,
            time: None,
        }
    }

    pub fn at(mut self, time: TimeMs) -> Self {
        self.time = Some(time);
        self
    }
}

/// Partial fill update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillEdit {
    pub fill_type: Option<FillType>,
    pub price: Option<Decimal>,
    pub size: Option<Decimal>,
    pub time: Option<TimeMs>,
}

/// A trade to record. Size, entry price and entry time may be omitted when
/// an ENTRY fill is supplied.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTrade {
    pub account_id: AccountId,
    pub symbol: String,
    #[serde(default)]
    pub asset_class: Option<AssetClass>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub size: Option<Decimal>,
    #[serde(default)]
    pub entry_price: Option<Decimal>,
    #[serde(default)]
    pub entry_time: Option<TimeMs>,
    #[serde(default)]
    pub exit_price: Option<Decimal>,
    #[serde(default)]
    pub exit_time: Option<TimeMs>,
    #[serde(default)]
    pub stop_price: Option<Decimal>,
    #[serde(default)]
    pub target_price: Option<Decimal>,
    /// Explicit fees; when present no fee rule is applied.
    #[serde(default)]
    pub fees: Option<Decimal>,
    #[serde(default)]
    pub fills: Vec<FillInput>,
}

impl NewTrade {
    pub fn new(account_id: AccountId, symbol: impl Into<String>) -> Self {
        NewTrade {
            account_id,
            symbol: symbol.into(),
            asset_class: None,
            direction: None,
            size: None,
            entry_price: None,
            entry_time: None,
            exit_price: None,
            exit_time: None,
            stop_price: None,
            target_price: None,
            fees: None,
            fills: Vec::new(),
        }
    }

    pub fn with_fills(mut self, fills: Vec<FillInput>) -> Self {
        self.fills = fills;
        self
    }

    pub fn with_entry(mut self, size: Decimal, entry_price: Decimal, entry_time: TimeMs) -> Self {
        self.size = Some(size);
        self.entry_price = Some(entry_price);
        self.entry_time = Some(entry_time);
        self
    }

    pub fn with_exit(mut self, exit_price: Decimal, exit_time: TimeMs) -> Self {
        self.exit_price = Some(exit_price);
        self.exit_time = Some(exit_time);
        self
    }
}

/// Partial trade update. For nullable fields the outer `Option` says whether
/// to touch the field, the inner one is the new value (`None` clears it).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeEdit {
    pub symbol: Option<String>,
    pub asset_class: Option<AssetClass>,
    pub direction: Option<Option<Direction>>,
    pub size: Option<Decimal>,
    pub entry_price: Option<Decimal>,
    pub entry_time: Option<TimeMs>,
    pub exit_price: Option<Option<Decimal>>,
    pub exit_time: Option<Option<TimeMs>>,
    pub stop_price: Option<Option<Decimal>>,
    pub target_price: Option<Option<Decimal>>,
    pub fees: Option<Option<Decimal>>,
}

impl TradeEdit {
    fn touches_fee_inputs(&self) -> bool {
        self.symbol.is_some()
            || self.asset_class.is_some()
            || self.size.is_some()
            || self.entry_price.is_some()
            || self.exit_price.is_some()
            || self.exit_time.is_some()
    }
}

/// A trade with its fills and derived analytics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeView {
    pub trade: Trade,
    pub fills: Vec<Fill>,
    pub analytics: TradeAnalytics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPerformance {
    pub equity_curve: Vec<EquityPoint>,
    pub daily_pnl: Vec<DailyPnl>,
}

fn validate_fill_values(price: Decimal, size: Decimal) -> Result<(), AppError> {
    if !size.is_positive() {
        return Err(AppError::invalid("fill size must be positive"));
    }
    if price.is_negative() {
        return Err(AppError::invalid("fill price must not be negative"));
    }
    Ok(())
}

fn validate_rate(rate: &FeeRate) -> Result<(), AppError> {
    if rate.value().is_negative() {
        return Err(AppError::invalid("fee value must not be negative"));
    }
    Ok(())
}

fn validate_default(value: Option<Decimal>) -> Result<(), AppError> {
    match value {
        Some(v) if v.is_negative() => Err(AppError::invalid("default fee must not be negative")),
        _ => Ok(()),
    }
}

fn validate_trade(trade: &Trade) -> Result<(), AppError> {
    if trade.symbol.as_str().is_empty() {
        return Err(AppError::invalid("symbol is required"));
    }
    if !trade.size.is_positive() {
        return Err(AppError::invalid("trade size must be positive"));
    }
    let prices = [
        Some(trade.entry_price),
        trade.exit_price,
        trade.stop_price,
        trade.target_price,
    ];
    if prices.iter().flatten().any(|p| p.is_negative()) {
        return Err(AppError::invalid("prices must not be negative"));
    }
    if trade.fees.is_some_and(|f| f.is_negative()) {
        return Err(AppError::invalid("fees must not be negative"));
    }
    Ok(())
}

fn normalize_symbol(raw: &str) -> Result<String, AppError> {
    let symbol = raw.trim().to_ascii_uppercase();
    if symbol.is_empty() {
        return Err(AppError::invalid("symbol is required"));
    }
    Ok(symbol)
}

/// Mutation surface of the journal. Every change that can move a fee
/// triggers the matching recalculation.
pub struct Journal {
    repo: Arc<Repository>,
    recalculator: Arc<FeeRecalculator>,
    scope: TradeScope,
}

impl Journal {
    pub fn new(
        repo: Arc<Repository>,
        recalculator: Arc<FeeRecalculator>,
        scope: TradeScope,
    ) -> Self {
        Self {
            repo,
            recalculator,
            scope,
        }
    }

    pub fn recalculator(&self) -> &Arc<FeeRecalculator> {
        &self.recalculator
    }

    async fn require_account(&self, id: &AccountId) -> Result<Account, AppError> {
        self.repo
            .get_account(id)
            .await?
            .ok_or_else(|| AppError::not_found("account", id))
    }

    async fn require_trade(&self, id: &TradeId) -> Result<Trade, AppError> {
        self.repo
            .get_trade(id)
            .await?
            .ok_or_else(|| AppError::not_found("trade", id))
    }

    async fn require_fill(&self, id: &FillId) -> Result<Fill, AppError> {
        self.repo
            .get_fill(id)
            .await?
            .ok_or_else(|| AppError::not_found("fill", id))
    }

    // =========================================================================
    // Accounts and fee configuration
    // =========================================================================

    pub async fn create_account(
        &self,
        name: &str,
        currency: &str,
        mini: Option<Decimal>,
        micro: Option<Decimal>,
    ) -> Result<Account, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::invalid("account name is required"));
        }
        validate_default(mini)?;
        validate_default(micro)?;

        let currency = match currency.trim() {
            "" => "USD".to_string(),
            c => c.to_ascii_uppercase(),
        };
        let account = Account::new(name, currency).with_futures_defaults(mini, micro);
        self.repo.insert_account(&account).await?;

        info!(account_id = %account.id, "Created account");
        Ok(account)
    }

    /// Set both futures defaults; recalculates the account when either changed.
    ///
    /// Returns the number of trades whose fees changed.
    pub async fn update_account_defaults(
        &self,
        id: &AccountId,
        mini: Option<Decimal>,
        micro: Option<Decimal>,
    ) -> Result<usize, AppError> {
        validate_default(mini)?;
        validate_default(micro)?;
        let account = self.require_account(id).await?;
        if account.default_fee_per_mini_contract == mini
            && account.default_fee_per_micro_contract == micro
        {
            return Ok(0);
        }

        self.repo.update_account_defaults(id, mini, micro).await?;
        Ok(self.recalculator.recalc_account(id, self.scope).await?)
    }

    /// Upsert asset-class fee rules, then recalculate the account.
    pub async fn replace_fee_matrix(
        &self,
        id: &AccountId,
        rules: &[(AssetClass, FeeRate)],
    ) -> Result<usize, AppError> {
        rules.iter().try_for_each(|(_, rate)| validate_rate(rate))?;
        self.require_account(id).await?;

        self.repo.upsert_account_fees(id, rules).await?;
        Ok(self.recalculator.recalc_account(id, self.scope).await?)
    }

    /// Upsert (or, for a `None` rate, delete) ticker overrides, then
    /// recalculate the account.
    pub async fn replace_ticker_fees(
        &self,
        id: &AccountId,
        changes: &[(Symbol, Option<FeeRate>)],
    ) -> Result<usize, AppError> {
        let mut normalized = Vec::with_capacity(changes.len());
        for (symbol, rate) in changes {
            if let Some(rate) = rate {
                validate_rate(rate)?;
            }
            normalized.push((Symbol::new(normalize_symbol(symbol.as_str())?), *rate));
        }
        self.require_account(id).await?;

        self.repo.apply_ticker_fees(id, &normalized).await?;
        Ok(self.recalculator.recalc_account(id, self.scope).await?)
    }

    /// Explicit account-wide recalculation.
    pub async fn recalc_account_fees(&self, id: &AccountId) -> Result<usize, AppError> {
        self.require_account(id).await?;
        Ok(self.recalculator.recalc_account(id, self.scope).await?)
    }

    // =========================================================================
    // Trades
    // =========================================================================

    pub async fn create_trade(&self, new: NewTrade) -> Result<TradeView, AppError> {
        let symbol = normalize_symbol(&new.symbol)?;
        for input in &new.fills {
            validate_fill_values(input.price, input.size)?;
        }
        self.require_account(&new.account_id).await?;

        let first_entry = new.fills.iter().find(|f| f.fill_type == FillType::Entry);
        let size = new
            .size
            .or(first_entry.map(|f| f.size))
            .ok_or_else(|| AppError::invalid("size is required without an ENTRY fill"))?;
        let entry_price = new
            .entry_price
            .or(first_entry.map(|f| f.price))
            .ok_or_else(|| AppError::invalid("entry price is required without an ENTRY fill"))?;
        let entry_time = new
            .entry_time
            .or(first_entry.and_then(|f| f.time))
            .unwrap_or_else(TimeMs::now);
        let asset_class = new
            .asset_class
            .unwrap_or_else(|| instrument::infer_asset_class(&symbol));

        let mut trade = Trade::new(
            new.account_id.clone(),
            Symbol::new(symbol),
            asset_class,
            size,
            entry_price,
            entry_time,
        );
        trade.direction = new.direction;
        trade.exit_price = new.exit_price;
        trade.exit_time = new.exit_time;
        trade.stop_price = new.stop_price;
        trade.target_price = new.target_price;
        trade.fees = new.fees;
        validate_trade(&trade)?;

        let fills: Vec<Fill> = new
            .fills
            .iter()
            .map(|f| {
                Fill::new(
                    trade.id.clone(),
                    f.fill_type,
                    f.price,
                    f.size,
                    f.time.unwrap_or(entry_time),
                )
            })
            .collect();
        self.repo.insert_trade(&trade, &fills).await?;
        info!(
            trade_id = %trade.id,
            account_id = %trade.account_id,
            fills = fills.len(),
            "Created trade"
        );

        if new.fees.is_none() {
            self.recalculator.recalc_trade(&trade.id).await?;
        }
        self.trade_view(&trade.id).await
    }

    /// Apply an edit; fees are recomputed when a fee input changed and fees
    /// were not set explicitly by the same edit.
    pub async fn update_trade(&self, id: &TradeId, edit: TradeEdit) -> Result<TradeView, AppError> {
        let _guard = self.recalculator.locks().lock(&trade_lock_key(id)).await;
        let mut trade = self.require_trade(id).await?;

        if let Some(raw) = &edit.symbol {
            let symbol = normalize_symbol(raw)?;
            if edit.asset_class.is_none() {
                trade.asset_class = instrument::infer_asset_class(&symbol);
            }
            trade.symbol = Symbol::new(symbol);
        }
        if let Some(asset_class) = edit.asset_class {
            trade.asset_class = asset_class;
        }
        if let Some(direction) = edit.direction {
            trade.direction = direction;
        }
        if let Some(size) = edit.size {
            trade.size = size;
        }
        if let Some(entry_price) = edit.entry_price {
            trade.entry_price = entry_price;
        }
        if let Some(entry_time) = edit.entry_time {
            trade.entry_time = entry_time;
        }
        if let Some(exit_price) = edit.exit_price {
            trade.exit_price = exit_price;
        }
        if let Some(exit_time) = edit.exit_time {
            trade.exit_time = exit_time;
        }
        if let Some(stop_price) = edit.stop_price {
            trade.stop_price = stop_price;
        }
        if let Some(target_price) = edit.target_price {
            trade.target_price = target_price;
        }
        if let Some(fees) = edit.fees {
            trade.fees = fees;
        }
        validate_trade(&trade)?;

        self.repo.update_trade_fields(&trade).await?;
        if edit.fees.is_none() && edit.touches_fee_inputs() {
            self.recalculator.recalc_trade_locked(id).await?;
        }
        self.trade_view(id).await
    }

    /// Idempotent soft delete.
    pub async fn soft_delete_trade(&self, id: &TradeId) -> Result<(), AppError> {
        let trade = self.require_trade(id).await?;
        if !trade.is_deleted() {
            self.repo.set_trade_deleted_at(id, Some(TimeMs::now())).await?;
        }
        Ok(())
    }

    /// Idempotent restore of a soft-deleted trade.
    pub async fn restore_trade(&self, id: &TradeId) -> Result<(), AppError> {
        let trade = self.require_trade(id).await?;
        if trade.is_deleted() {
            self.repo.set_trade_deleted_at(id, None).await?;
        }
        Ok(())
    }

    pub async fn trade_view(&self, id: &TradeId) -> Result<TradeView, AppError> {
        let trade = self.require_trade(id).await?;
        let fills = self.repo.list_fills(id).await?;
        let analytics = analyze(&trade, &fills);
        Ok(TradeView {
            trade,
            fills,
            analytics,
        })
    }

    /// How the trade's fee is derived under the current configuration.
    pub async fn fee_breakdown(&self, id: &TradeId) -> Result<FeeBreakdown, AppError> {
        let bundle = self
            .repo
            .load_trade_bundle(id)
            .await?
            .ok_or_else(|| AppError::not_found("trade", id))?;
        let schedule = bundle.schedule();
        let hint = self.recalculator.micro_hint_for(&bundle.trade, &schedule).await;
        Ok(explain(&bundle.trade, &bundle.fills, &schedule, hint))
    }

    /// Equity curve and per-day PnL over the account's active trades.
    pub async fn account_performance(
        &self,
        id: &AccountId,
        cash: &[CashFlow],
    ) -> Result<AccountPerformance, AppError> {
        let bundle = self
            .repo
            .load_account_bundle(id, TradeScope::Active)
            .await?
            .ok_or_else(|| AppError::not_found("account", id))?;

        let realized: Vec<RealizedEvent> = bundle
            .trades
            .iter()
            .filter_map(|(trade, fills)| {
                RealizedEvent::from_analytics(trade, &analyze(trade, fills))
            })
            .collect();

        Ok(AccountPerformance {
            equity_curve: build_equity_curve(&realized, cash),
            daily_pnl: daily_pnl(&realized),
        })
    }

    // =========================================================================
    // Fills
    // =========================================================================

    /// Append fills to a trade and recompute its fee under the trade lock.
    pub async fn add_fills(
        &self,
        trade_id: &TradeId,
        inputs: Vec<FillInput>,
    ) -> Result<Vec<Fill>, AppError> {
        if inputs.is_empty() {
            return Err(AppError::invalid("at least one fill is required"));
        }
        for input in &inputs {
            validate_fill_values(input.price, input.size)?;
        }

        let _guard = self.recalculator.locks().lock(&trade_lock_key(trade_id)).await;
        self.require_trade(trade_id).await?;

        let now = TimeMs::now();
        let fills: Vec<Fill> = inputs
            .into_iter()
            .map(|f| {
                let time = f.time.unwrap_or(now);
                Fill::new(trade_id.clone(), f.fill_type, f.price, f.size, time)
            })
            .collect();
        self.repo.insert_fills(trade_id, &fills).await?;
        self.recalculator.recalc_trade_locked(trade_id).await?;

        Ok(fills)
    }

    pub async fn update_fill(&self, fill_id: &FillId, edit: FillEdit) -> Result<Fill, AppError> {
        let trade_id = self.require_fill(fill_id).await?.trade_id;
        let _guard = self.recalculator.locks().lock(&trade_lock_key(&trade_id)).await;

        // Re-read under the lock; the fill may have changed while waiting.
        let mut fill = self.require_fill(fill_id).await?;
        if let Some(fill_type) = edit.fill_type {
            fill.fill_type = fill_type;
        }
        if let Some(price) = edit.price {
            fill.price = price;
        }
        if let Some(size) = edit.size {
            fill.size = size;
        }
        if let Some(time) = edit.time {
            fill.time = time;
        }
        validate_fill_values(fill.price, fill.size)?;

        if !self.repo.update_fill(&fill).await? {
            return Err(AppError::not_found("fill", fill_id));
        }
        self.recalculator.recalc_trade_locked(&trade_id).await?;
        Ok(fill)
    }

    pub async fn delete_fill(&self, fill_id: &FillId) -> Result<(), AppError> {
        let fill = self.require_fill(fill_id).await?;
        let _guard = self.recalculator.locks().lock(&trade_lock_key(&fill.trade_id)).await;

        if !self.repo.delete_fill(&fill).await? {
            return Err(AppError::not_found("fill", fill_id));
        }
        self.recalculator.recalc_trade_locked(&fill.trade_id).await?;
        Ok(())
    }
}
