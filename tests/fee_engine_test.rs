use trade_journal::domain::{
    AccountId, AssetClass, Decimal, Direction, FeeRate, Fill, FillType, Symbol, TimeMs, Trade,
};
use trade_journal::engine::{
    aggregate, analyze, calc_risk_reward, directional_pnl, explain, ContractSize, FeeOutcome,
    FeeResolver, FeeRuleSource, FeeSchedule,
};

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn trade(symbol: &str, asset_class: AssetClass) -> Trade {
    Trade::new(
        AccountId::new("acct-1"),
        Symbol::new(symbol),
        asset_class,
        d("1"),
        d("100"),
        TimeMs::new(1_000),
    )
}

fn fill(trade: &Trade, fill_type: FillType, price: &str, size: &str, time: i64) -> Fill {
    Fill::new(trade.id.clone(), fill_type, d(price), d(size), TimeMs::new(time))
}

fn futures_schedule(mini: &str, micro: &str) -> FeeSchedule {
    FeeSchedule {
        mini_default: Some(d(mini)),
        micro_default: Some(d(micro)),
        ..FeeSchedule::default()
    }
}

#[test]
fn test_round_trip_fee_charges_realized_quantity() {
    let t = trade("ES=F", AssetClass::Future);
    let fills = vec![
        fill(&t, FillType::Entry, "4500", "10", 1_000),
        fill(&t, FillType::Exit, "4510", "6", 2_000),
    ];
    let schedule = futures_schedule("2.5", "0.75");

    let outcome = FeeResolver::compute(&t, &fills, &schedule, None);
    assert_eq!(outcome, FeeOutcome::Computed(d("15")));
}

#[test]
fn test_ticker_override_beats_futures_default_and_matrix() {
    let t = trade("ES=F", AssetClass::Future);
    let fills = vec![
        fill(&t, FillType::Entry, "4500", "10", 1_000),
        fill(&t, FillType::Exit, "4510", "6", 2_000),
    ];
    let mut schedule = futures_schedule("2.5", "0.75");
    schedule
        .ticker_fees
        .insert("ES=F".to_string(), FeeRate::PerContractDollar(d("1")));
    schedule
        .asset_class_fees
        .insert(AssetClass::Future, FeeRate::PerContractDollar(d("3")));

    let breakdown = explain(&t, &fills, &schedule, None);
    let rule = breakdown.rule.unwrap();
    assert_eq!(rule.source, FeeRuleSource::TickerOverride);
    assert!(rule.round_trip);
    assert_eq!(breakdown.expected_fees, Some(d("6")));
}

#[test]
fn test_micro_hint_overrides_symbol_heuristic() {
    let t = trade("MWE=F", AssetClass::Future);
    let fills = vec![
        fill(&t, FillType::Entry, "700", "4", 1_000),
        fill(&t, FillType::Exit, "705", "4", 2_000),
    ];
    let schedule = futures_schedule("2.5", "1");

    let heuristic = explain(&t, &fills, &schedule, None);
    assert_eq!(heuristic.contract_size, Some(ContractSize::Micro));
    assert_eq!(heuristic.expected_fees, Some(d("4")));

    let hinted = explain(&t, &fills, &schedule, Some(false));
    assert_eq!(hinted.contract_size, Some(ContractSize::Mini));
    assert_eq!(hinted.expected_fees, Some(d("10")));
}

#[test]
fn test_matrix_dollar_rate_is_per_side_for_stocks() {
    let t = trade("AAPL", AssetClass::Stock);
    let fills = vec![
        fill(&t, FillType::Entry, "190", "10", 1_000),
        fill(&t, FillType::Exit, "195", "10", 2_000),
    ];
    let mut schedule = FeeSchedule::default();
    schedule
        .asset_class_fees
        .insert(AssetClass::Stock, FeeRate::PerContractDollar(d("0.5")));

    let outcome = FeeResolver::compute(&t, &fills, &schedule, None);
    assert_eq!(outcome.computed(), Some(d("10")));
}

#[test]
fn test_percent_mode_charges_notional_on_both_sides() {
    let t = trade("AAPL", AssetClass::Stock);
    let fills = vec![
        fill(&t, FillType::Entry, "1000", "1", 1_000),
        fill(&t, FillType::Exit, "1100", "1", 2_000),
    ];
    let mut schedule = FeeSchedule::default();
    schedule
        .asset_class_fees
        .insert(AssetClass::Stock, FeeRate::PerContractPercent(d("1")));

    let outcome = FeeResolver::compute(&t, &fills, &schedule, None);
    assert_eq!(outcome.computed(), Some(d("21")));
}

#[test]
fn test_percent_mode_without_fills_uses_trade_prices() {
    let t = Trade::new(
        AccountId::new("acct-1"),
        Symbol::new("AAPL"),
        AssetClass::Stock,
        d("1"),
        d("1000"),
        TimeMs::new(1_000),
    )
    .with_exit(d("1100"), TimeMs::new(2_000));
    let mut schedule = FeeSchedule::default();
    schedule
        .asset_class_fees
        .insert(AssetClass::Stock, FeeRate::PerContractPercent(d("1")));

    let outcome = FeeResolver::compute(&t, &[], &schedule, None);
    assert_eq!(outcome, FeeOutcome::Computed(d("21")));

    let open = Trade { exit_price: None, exit_time: None, ..t };
    let outcome = FeeResolver::compute(&open, &[], &schedule, None);
    assert_eq!(outcome, FeeOutcome::Computed(d("10")));
}

#[test]
fn test_no_applicable_rule() {
    let t = trade("AAPL", AssetClass::Stock);
    let schedule = futures_schedule("2.5", "0.75");

    assert_eq!(FeeResolver::compute(&t, &[], &schedule, None), FeeOutcome::NoRule);
    assert_eq!(explain(&t, &[], &schedule, None).expected_fees, None);
}

#[test]
fn test_fee_computation_is_deterministic() {
    let t = trade("MES=F", AssetClass::Future);
    let fills = vec![
        fill(&t, FillType::Entry, "5000", "3", 1_000),
        fill(&t, FillType::Exit, "5004.25", "3", 2_000),
    ];
    let schedule = futures_schedule("2.5", "0.62");

    let first = FeeResolver::compute(&t, &fills, &schedule, None);
    let second = FeeResolver::compute(&t, &fills, &schedule, None);
    assert_eq!(first, second);
    assert_eq!(first.computed(), Some(d("1.86")));
}

#[test]
fn test_weighted_average_entry() {
    let t = trade("AAPL", AssetClass::Stock);
    let fills = vec![
        fill(&t, FillType::Entry, "104", "2", 2_000),
        fill(&t, FillType::Entry, "100", "2", 1_000),
    ];

    let summary = aggregate(&t, &fills);
    assert_eq!(summary.avg_entry_price, Some(d("102")));
    assert_eq!(summary.qty_entry, d("4"));
    assert_eq!(summary.first_entry_time, Some(TimeMs::new(1_000)));
}

#[test]
fn test_direction_aware_pnl() {
    let long = directional_pnl(d("100"), d("105"), d("10"), Direction::Long, d("1"), d("2"));
    let short = directional_pnl(d("100"), d("105"), d("10"), Direction::Short, d("1"), d("2"));
    assert_eq!(long, d("48"));
    assert_eq!(short, d("-52"));
}

#[test]
fn test_point_value_scales_futures_pnl() {
    let t = trade("MNQ=F", AssetClass::Future).with_fees(d("1"));
    let fills = vec![
        fill(&t, FillType::Entry, "4500", "2", 1_000),
        fill(&t, FillType::Exit, "4510", "2", 61_000),
    ];

    let analytics = analyze(&t, &fills);
    assert_eq!(analytics.pnl, Some(d("39")));
    assert_eq!(analytics.hold_time_seconds, Some(d("60")));
}

#[test]
fn test_r_multiple() {
    let metrics = calc_risk_reward(d("50"), d("48"), d("56"), d("10"), Direction::Long);
    assert_eq!(metrics.risk, d("20"));
    assert_eq!(metrics.reward, d("60"));
    assert_eq!(metrics.r_multiple, Some(d("3")));
}

#[test]
fn test_zero_risk_has_no_r_multiple() {
    let metrics = calc_risk_reward(d("50"), d("50"), d("56"), d("10"), Direction::Long);
    assert!(metrics.risk.is_zero());
    assert_eq!(metrics.r_multiple, None);
}
