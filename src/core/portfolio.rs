use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use tracing::{info, warn};

use super::dividend::DividendYieldResolver;
use super::errors::{CoreError, CoreResult};
use super::parse::{amount_or_zero, clean_name, normalize_symbol, parse_amount};
use super::types::{
    AccountSnapshot, ColumnRef, Holding, PortfolioAggregate, PortfolioSummary, RawHoldingRow,
    RowWarning,
};

/// Source of annualized dividend yields (fractions) for symbols whose account
/// export carries no dividend columns.
pub trait YieldSource {
    fn annual_yield(&self, symbol: &str) -> f64;
}

impl YieldSource for DividendYieldResolver {
    fn annual_yield(&self, symbol: &str) -> f64 {
        self.resolve(symbol)
    }
}

impl<F: Fn(&str) -> f64> YieldSource for F {
    fn annual_yield(&self, symbol: &str) -> f64 {
        self(symbol)
    }
}

impl Holding {
    fn from_position(symbol: String, name: String, account: &str, position: Position) -> Self {
        let mut holding = Holding {
            symbol,
            name,
            equity: position.equity,
            cost: position.cost,
            gain_loss: position.gain_loss,
            return_pct: 0.0,
            dividend_yield_pct: position.dividend_yield_pct,
            annual_dividend: position.annual_dividend,
            allocation_pct: 0.0,
            accounts: BTreeSet::from([account.to_string()]),
        };
        holding.return_pct = return_pct(holding.gain_loss, holding.cost);
        holding
    }

    /// Folds another position in the same security into this one. Summed
    /// fields do not depend on merge order.
    pub fn absorb(&mut self, other: Holding) {
        self.equity += other.equity;
        self.cost += other.cost;
        self.gain_loss += other.gain_loss;
        self.annual_dividend += other.annual_dividend;
        self.return_pct = return_pct(self.gain_loss, self.cost);
        self.dividend_yield_pct = if self.equity > 0.0 {
            self.annual_dividend / self.equity * 100.0
        } else {
            self.dividend_yield_pct.max(other.dividend_yield_pct)
        };
        if self.name.is_empty() {
            self.name = other.name;
        }
        self.accounts.extend(other.accounts);
    }
}

fn return_pct(gain_loss: f64, cost: f64) -> f64 {
    if cost != 0.0 {
        gain_loss / cost * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Position {
    equity: f64,
    cost: f64,
    gain_loss: f64,
    dividend_yield_pct: f64,
    annual_dividend: f64,
}

#[derive(Debug, Clone, Copy)]
struct ResolvedColumns {
    symbol: usize,
    name: Option<usize>,
    equity: Option<usize>,
    cost: Option<usize>,
    gain_loss: Option<usize>,
    annual_dividend: Option<usize>,
    dividend_yield: Option<usize>,
}

fn resolve_column(column: &ColumnRef, headers: Option<&[String]>) -> Option<usize> {
    match column {
        ColumnRef::Index(idx) => Some(*idx),
        ColumnRef::Header(name) => headers?
            .iter()
            .position(|header| header.trim().eq_ignore_ascii_case(name.trim())),
    }
}

struct AccountParser<'a> {
    account: &'a str,
    warnings: &'a mut Vec<RowWarning>,
}

impl AccountParser<'_> {
    fn warn(&mut self, row: Option<usize>, field: &'static str, raw: &str, message: String) {
        warn!(account = %self.account, row, field, raw, "{message}");
        self.warnings.push(RowWarning {
            account: self.account.to_string(),
            row,
            field,
            raw: raw.to_string(),
            message,
        });
    }

    fn resolve(&mut self, snapshot: &AccountSnapshot) -> Option<ResolvedColumns> {
        let headers = snapshot.headers.as_deref();
        let mapping = &snapshot.mapping;

        let Some(symbol) = resolve_column(&mapping.symbol, headers) else {
            self.warn(
                None,
                "symbol",
                &format!("{:?}", mapping.symbol),
                "symbol column not found; account skipped".to_string(),
            );
            return None;
        };

        let mut required = |field: &'static str, column: &ColumnRef| {
            let resolved = resolve_column(column, headers);
            if resolved.is_none() {
                self.warn(
                    None,
                    field,
                    &format!("{column:?}"),
                    "column not found; field zeroed".to_string(),
                );
            }
            resolved
        };

        let name = required("name", &mapping.name);
        let equity = required("equity", &mapping.equity);
        let cost = required("cost", &mapping.cost);
        let gain_loss = required("gainLoss", &mapping.gain_loss);

        Some(ResolvedColumns {
            symbol,
            name,
            equity,
            cost,
            gain_loss,
            annual_dividend: mapping
                .annual_dividend
                .as_ref()
                .and_then(|c| resolve_column(c, headers)),
            dividend_yield: mapping
                .dividend_yield
                .as_ref()
                .and_then(|c| resolve_column(c, headers)),
        })
    }

    fn amount(
        &mut self,
        row_idx: usize,
        row: &RawHoldingRow,
        column: Option<usize>,
        field: &'static str,
    ) -> f64 {
        let Some(raw) = column.and_then(|idx| row.cell(idx)) else {
            return 0.0;
        };
        let (value, err) = amount_or_zero(raw);
        if let Some(err) = err {
            self.warn(
                Some(row_idx),
                field,
                &err.raw,
                format!("unparseable {field}; using 0"),
            );
        }
        value
    }

    /// Dividend figures carried by the export itself. A malformed or negative
    /// cell discards both so the symbol is resolved from market data instead.
    fn explicit_dividend(
        &mut self,
        row_idx: usize,
        row: &RawHoldingRow,
        columns: &ResolvedColumns,
        equity: f64,
    ) -> Option<(f64, f64)> {
        if columns.annual_dividend.is_none() && columns.dividend_yield.is_none() {
            return None;
        }

        let mut read = |column: Option<usize>, field: &'static str| -> Option<Option<f64>> {
            let Some(idx) = column else {
                return Some(None);
            };
            let raw = row.cell(idx).unwrap_or_default();
            match parse_amount(raw) {
                Ok(Some(value)) if value >= 0.0 => Some(Some(value)),
                Ok(Some(_)) | Err(_) => {
                    self.warn(
                        Some(row_idx),
                        field,
                        raw,
                        format!("invalid {field}; resolving from market data"),
                    );
                    None
                }
                Ok(None) => Some(None),
            }
        };

        let yield_pct = read(columns.dividend_yield, "dividendYield")?;
        let annual = read(columns.annual_dividend, "annualDividend")?;
        match (yield_pct, annual) {
            (Some(yield_pct), Some(annual)) => Some((yield_pct, annual)),
            (Some(yield_pct), None) => Some((yield_pct, equity * yield_pct / 100.0)),
            (None, Some(annual)) => {
                let yield_pct = if equity > 0.0 {
                    annual / equity * 100.0
                } else {
                    0.0
                };
                Some((yield_pct, annual))
            }
            (None, None) => None,
        }
    }

    fn holding(
        &mut self,
        row_idx: usize,
        row: &RawHoldingRow,
        columns: &ResolvedColumns,
        yields: &dyn YieldSource,
    ) -> Option<Holding> {
        let raw_symbol = row.cell(columns.symbol).unwrap_or_default();
        let symbol = match normalize_symbol(raw_symbol) {
            Ok(Some(symbol)) => symbol,
            Ok(None) => return None,
            Err(_) => {
                self.warn(
                    Some(row_idx),
                    "symbol",
                    raw_symbol,
                    "unparseable symbol; row skipped".to_string(),
                );
                return None;
            }
        };

        let name = columns
            .name
            .and_then(|idx| row.cell(idx))
            .map(clean_name)
            .unwrap_or_default();

        let mut equity = self.amount(row_idx, row, columns.equity, "equity");
        if equity < 0.0 {
            self.warn(
                Some(row_idx),
                "equity",
                &equity.to_string(),
                "negative equity; using 0".to_string(),
            );
            equity = 0.0;
        }
        let cost = self.amount(row_idx, row, columns.cost, "cost");
        let gain_loss = self.amount(row_idx, row, columns.gain_loss, "gainLoss");

        let (dividend_yield_pct, annual_dividend) =
            match self.explicit_dividend(row_idx, row, columns, equity) {
                Some(explicit) => explicit,
                None => {
                    let fraction = yields.annual_yield(&symbol).max(0.0);
                    (fraction * 100.0, equity * fraction)
                }
            };

        Some(Holding::from_position(
            symbol,
            name,
            self.account,
            Position {
                equity,
                cost,
                gain_loss,
                dividend_yield_pct,
                annual_dividend,
            },
        ))
    }
}

/// Normalizes and merges every account's rows into one holding per symbol.
///
/// The last row of each account is the broker's subtotal and is never read.
/// A failed account is reported in `failed_accounts`; only when no account
/// could be read at all does aggregation fail.
pub fn aggregate<E: Display>(
    accounts: &BTreeMap<String, Result<AccountSnapshot, E>>,
    yields: &dyn YieldSource,
) -> CoreResult<PortfolioAggregate> {
    if accounts.is_empty() {
        return Err(CoreError::Configuration("no accounts configured".to_string()));
    }

    let mut holdings: BTreeMap<String, Holding> = BTreeMap::new();
    let mut warnings = Vec::new();
    let mut failed_accounts = Vec::new();

    for (account, fetched) in accounts {
        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(account = %account, error = %e, "account rows unavailable");
                failed_accounts.push(account.clone());
                continue;
            }
        };

        let mut parser = AccountParser {
            account,
            warnings: &mut warnings,
        };
        let Some(columns) = parser.resolve(snapshot) else {
            failed_accounts.push(account.clone());
            continue;
        };

        let data_rows = snapshot.rows.len().saturating_sub(1);
        for (row_idx, row) in snapshot.rows.iter().take(data_rows).enumerate() {
            let Some(holding) = parser.holding(row_idx, row, &columns, yields) else {
                continue;
            };
            match holdings.get_mut(&holding.symbol) {
                Some(existing) => existing.absorb(holding),
                None => {
                    holdings.insert(holding.symbol.clone(), holding);
                }
            }
        }
    }

    if failed_accounts.len() == accounts.len() {
        return Err(CoreError::NoAccountData { failed_accounts });
    }

    let total_equity = recompute_allocations(&mut holdings);
    info!(
        accounts = accounts.len() - failed_accounts.len(),
        holdings = holdings.len(),
        total_equity,
        "aggregated portfolio"
    );

    Ok(PortfolioAggregate {
        total_equity,
        holdings,
        warnings,
        failed_accounts,
    })
}

/// Replaces every allocation with the holding's share of the merged total.
fn recompute_allocations(holdings: &mut BTreeMap<String, Holding>) -> f64 {
    let total_equity: f64 = holdings.values().map(|h| h.equity).sum();
    for holding in holdings.values_mut() {
        holding.allocation_pct = if total_equity > 0.0 {
            holding.equity / total_equity * 100.0
        } else {
            0.0
        };
    }
    total_equity
}

fn ranked(
    aggregate: &PortfolioAggregate,
    top_n: usize,
    cmp: impl Fn(&Holding, &Holding) -> Ordering,
) -> Vec<Holding> {
    let mut holdings: Vec<Holding> = aggregate.holdings.values().cloned().collect();
    holdings.sort_by(|a, b| cmp(a, b).then_with(|| a.symbol.cmp(&b.symbol)));
    holdings.truncate(top_n);
    holdings
}

pub fn summarize(aggregate: &PortfolioAggregate, top_n: usize) -> PortfolioSummary {
    let total_equity = aggregate.total_equity;
    let total_annual_dividend: f64 = aggregate.holdings.values().map(|h| h.annual_dividend).sum();

    PortfolioSummary {
        total_equity,
        total_cost: aggregate.holdings.values().map(|h| h.cost).sum(),
        total_gain_loss: aggregate.holdings.values().map(|h| h.gain_loss).sum(),
        total_annual_dividend,
        portfolio_dividend_yield_pct: if total_equity > 0.0 {
            total_annual_dividend / total_equity * 100.0
        } else {
            0.0
        },
        holding_count: aggregate.holdings.len(),
        best_performers: ranked(aggregate, top_n, |a, b| b.return_pct.total_cmp(&a.return_pct)),
        worst_performers: ranked(aggregate, top_n, |a, b| a.return_pct.total_cmp(&b.return_pct)),
        largest_allocations: ranked(aggregate, top_n, |a, b| {
            b.allocation_pct.total_cmp(&a.allocation_pct)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ColumnMapping;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn positional_mapping() -> ColumnMapping {
        ColumnMapping {
            symbol: ColumnRef::Index(0),
            name: ColumnRef::Index(1),
            equity: ColumnRef::Index(2),
            cost: ColumnRef::Index(3),
            gain_loss: ColumnRef::Index(4),
            allocation: Some(ColumnRef::Index(5)),
            annual_dividend: None,
            dividend_yield: None,
        }
    }

    fn row(cells: &[&str]) -> RawHoldingRow {
        cells.iter().copied().collect()
    }

    fn subtotal() -> RawHoldingRow {
        row(&["", "Total", "$999,999.00", "$1.00", "$1.00", "100%"])
    }

    fn snapshot(rows: Vec<RawHoldingRow>) -> AccountSnapshot {
        let mut rows = rows;
        rows.push(subtotal());
        AccountSnapshot {
            headers: None,
            rows,
            mapping: positional_mapping(),
        }
    }

    fn no_yield(_: &str) -> f64 {
        0.0
    }

    fn accounts(
        entries: Vec<(&str, Result<AccountSnapshot, String>)>,
    ) -> BTreeMap<String, Result<AccountSnapshot, String>> {
        entries
            .into_iter()
            .map(|(id, snapshot)| (id.to_string(), snapshot))
            .collect()
    }

    #[test]
    fn single_account_example_recomputes_return_and_allocation() {
        let input = accounts(vec![(
            "A",
            Ok(snapshot(vec![row(&[
                "X", "Example", "$100.00", "$80.00", "$20.00", "50%",
            ])])),
        )]);

        let result = aggregate(&input, &no_yield).expect("aggregates");
        assert_eq!(result.holdings.len(), 1);
        let x = &result.holdings["X"];
        assert_eq!(x.symbol, "X");
        assert_approx(x.equity, 100.0);
        assert_approx(x.cost, 80.0);
        assert_approx(x.gain_loss, 20.0);
        assert_approx(x.return_pct, 25.0);
        assert_approx(x.allocation_pct, 100.0);
        assert_approx(result.total_equity, 100.0);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn duplicate_symbols_merge_across_accounts() {
        let input = accounts(vec![
            (
                "Robinhood",
                Ok(snapshot(vec![
                    row(&["vti", "Vanguard Total", "$300.00", "$200.00", "$100.00", "60%"]),
                    row(&["AAPL", "Apple", "$200.00", "$250.00", "($50.00)", "40%"]),
                ])),
            ),
            (
                "Schwab",
                Ok(snapshot(vec![row(&[
                    "VTI", "Vanguard Total", "$500.00", "$400.00", "$100.00", "100%",
                ])])),
            ),
        ]);

        let result = aggregate(&input, &no_yield).expect("aggregates");
        assert_approx(result.total_equity, 1000.0);

        let vti = &result.holdings["VTI"];
        assert_approx(vti.equity, 800.0);
        assert_approx(vti.cost, 600.0);
        assert_approx(vti.gain_loss, 200.0);
        assert_approx(vti.return_pct, 200.0 / 600.0 * 100.0);
        assert_approx(vti.allocation_pct, 80.0);
        assert_eq!(
            vti.accounts.iter().cloned().collect::<Vec<_>>(),
            vec!["Robinhood".to_string(), "Schwab".to_string()]
        );

        let aapl = &result.holdings["AAPL"];
        assert_approx(aapl.gain_loss, -50.0);
        assert_approx(aapl.return_pct, -20.0);
        assert_approx(aapl.allocation_pct, 20.0);
    }

    #[test]
    fn subtotal_row_and_blank_symbols_are_skipped() {
        let input = accounts(vec![(
            "A",
            Ok(snapshot(vec![
                row(&["", "Cash sweep", "$10.00", "$10.00", "$0.00", "1%"]),
                row(&["X", "Example", "$100.00", "$80.00", "$20.00", "99%"]),
            ])),
        )]);

        let result = aggregate(&input, &no_yield).expect("aggregates");
        assert_eq!(result.holdings.keys().collect::<Vec<_>>(), vec!["X"]);
        assert_approx(result.total_equity, 100.0);
    }

    #[test]
    fn malformed_fields_are_zeroed_with_a_warning() {
        let input = accounts(vec![(
            "A",
            Ok(snapshot(vec![
                row(&["X", "Example", "$100.00", "n/a?", "$20.00", "50%"]),
                row(&["BAD TICKER!", "Junk", "$5.00", "$5.00", "$0.00", "1%"]),
            ])),
        )]);

        let result = aggregate(&input, &no_yield).expect("aggregates");
        let x = &result.holdings["X"];
        assert_approx(x.cost, 0.0);
        assert_approx(x.return_pct, 0.0);
        assert_eq!(result.holdings.len(), 1);

        let fields: Vec<(&str, Option<usize>)> = result
            .warnings
            .iter()
            .map(|w| (w.field, w.row))
            .collect();
        assert_eq!(fields, vec![("cost", Some(0)), ("symbol", Some(1))]);
    }

    #[test]
    fn failed_account_is_recoverable() {
        let input = accounts(vec![
            ("Broken", Err("sheet unavailable".to_string())),
            (
                "Working",
                Ok(snapshot(vec![row(&[
                    "X", "Example", "$100.00", "$80.00", "$20.00", "50%",
                ])])),
            ),
        ]);

        let result = aggregate(&input, &no_yield).expect("aggregates");
        assert_eq!(result.failed_accounts, vec!["Broken".to_string()]);
        assert_eq!(result.holdings.len(), 1);
    }

    #[test]
    fn every_account_failing_is_fatal() {
        let input = accounts(vec![
            ("A", Err("timeout".to_string())),
            ("B", Err("timeout".to_string())),
        ]);
        let err = aggregate(&input, &no_yield).expect_err("must fail");
        assert!(err.kind().is_fatal());
        assert_eq!(
            err,
            CoreError::NoAccountData {
                failed_accounts: vec!["A".to_string(), "B".to_string()]
            }
        );

        let empty = accounts(vec![]);
        assert!(matches!(
            aggregate(&empty, &no_yield),
            Err(CoreError::Configuration(_))
        ));
    }

    #[test]
    fn header_mapping_resolves_named_columns() {
        let snapshot = AccountSnapshot {
            headers: Some(
                ["Ticker", "Name", "Total Equity", "Total Cost", "Total Gain/Loss"]
                    .iter()
                    .map(|h| h.to_string())
                    .collect(),
            ),
            rows: vec![
                row(&["msft", "Microsoft 4 shares", "$1,600.00", "$1,200.00", "$400.00"]),
                row(&["", "", "$1,600.00", "$1,200.00", "$400.00"]),
            ],
            mapping: ColumnMapping {
                symbol: ColumnRef::Header("Ticker".to_string()),
                name: ColumnRef::Header("Name".to_string()),
                equity: ColumnRef::Header("Total Equity".to_string()),
                cost: ColumnRef::Header("Total Cost".to_string()),
                gain_loss: ColumnRef::Header("Total Gain/Loss".to_string()),
                allocation: Some(ColumnRef::Header("Allocation".to_string())),
                annual_dividend: None,
                dividend_yield: None,
            },
        };
        let input = accounts(vec![("Schwab", Ok(snapshot))]);

        let result = aggregate(&input, &no_yield).expect("aggregates");
        let msft = &result.holdings["MSFT"];
        assert_eq!(msft.name, "Microsoft shares");
        assert_approx(msft.equity, 1600.0);
        assert_approx(msft.return_pct, 400.0 / 1200.0 * 100.0);
    }

    #[test]
    fn missing_symbol_header_fails_the_account() {
        let snapshot = AccountSnapshot {
            headers: Some(vec!["Name".to_string()]),
            rows: vec![row(&["x"]), row(&["total"])],
            mapping: ColumnMapping {
                symbol: ColumnRef::Header("Ticker".to_string()),
                ..positional_mapping()
            },
        };
        let input = accounts(vec![("Schwab", Ok(snapshot))]);
        assert!(matches!(
            aggregate(&input, &no_yield),
            Err(CoreError::NoAccountData { .. })
        ));
    }

    #[test]
    fn explicit_dividend_columns_take_precedence_over_resolver() {
        let mut m1 = snapshot(vec![
            row(&["SCHD", "Schwab Dividend", "$1,000.00", "$900.00", "$100.00", "50%", "$35.00", "3.5%"]),
            row(&["VTI", "Vanguard Total", "$1,000.00", "$900.00", "$100.00", "50%", "oops", "1.3%"]),
        ]);
        m1.mapping.annual_dividend = Some(ColumnRef::Index(6));
        m1.mapping.dividend_yield = Some(ColumnRef::Index(7));
        let input = accounts(vec![("M1", Ok(m1))]);

        let lookups = std::cell::RefCell::new(Vec::new());
        let yields = |symbol: &str| {
            lookups.borrow_mut().push(symbol.to_string());
            0.02
        };

        let result = aggregate(&input, &yields).expect("aggregates");
        let schd = &result.holdings["SCHD"];
        assert_approx(schd.annual_dividend, 35.0);
        assert_approx(schd.dividend_yield_pct, 3.5);

        let vti = &result.holdings["VTI"];
        assert_approx(vti.dividend_yield_pct, 2.0);
        assert_approx(vti.annual_dividend, 20.0);
        assert_eq!(lookups.into_inner(), vec!["VTI".to_string()]);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].field, "annualDividend");
    }

    #[test]
    fn resolver_yield_drives_annual_dividend() {
        let input = accounts(vec![(
            "A",
            Ok(snapshot(vec![row(&[
                "KO", "Coca-Cola", "$2,000.00", "$1,500.00", "$500.00", "100%",
            ])])),
        )]);
        let result = aggregate(&input, &|_: &str| 0.03).expect("aggregates");
        let ko = &result.holdings["KO"];
        assert_approx(ko.dividend_yield_pct, 3.0);
        assert_approx(ko.annual_dividend, 60.0);
    }

    #[test]
    fn zero_total_equity_yields_zero_allocations() {
        let input = accounts(vec![(
            "A",
            Ok(snapshot(vec![
                row(&["X", "Example", "$0.00", "$10.00", "-$10.00", "50%"]),
                row(&["Y", "Other", "", "", "", ""]),
            ])),
        )]);
        let result = aggregate(&input, &no_yield).expect("aggregates");
        assert_approx(result.total_equity, 0.0);
        for holding in result.holdings.values() {
            assert_eq!(holding.allocation_pct, 0.0);
        }
    }

    #[test]
    fn summary_ranks_holdings_and_blends_yield() {
        let input = accounts(vec![(
            "A",
            Ok(snapshot(vec![
                row(&["A", "Alpha", "$600.00", "$300.00", "$300.00", ""]),
                row(&["B", "Beta", "$300.00", "$400.00", "-$100.00", ""]),
                row(&["C", "Gamma", "$100.00", "$100.00", "$0.00", ""]),
            ])),
        )]);
        let yields = |symbol: &str| if symbol == "A" { 0.05 } else { 0.0 };
        let result = aggregate(&input, &yields).expect("aggregates");

        let summary = summarize(&result, 2);
        assert_eq!(summary.holding_count, 3);
        assert_approx(summary.total_cost, 800.0);
        assert_approx(summary.total_gain_loss, 200.0);
        assert_approx(summary.total_annual_dividend, 30.0);
        assert_approx(summary.portfolio_dividend_yield_pct, 3.0);

        let symbols = |list: &[Holding]| list.iter().map(|h| h.symbol.clone()).collect::<Vec<_>>();
        assert_eq!(symbols(&summary.best_performers), vec!["A", "C"]);
        assert_eq!(symbols(&summary.worst_performers), vec!["B", "C"]);
        assert_eq!(symbols(&summary.largest_allocations), vec!["A", "B"]);
    }

    fn holdings_for(order: &[usize], positions: &[(u32, u32, i32)]) -> BTreeMap<String, Holding> {
        let mut input = BTreeMap::new();
        for (slot, &idx) in order.iter().enumerate() {
            let (equity, cost, gl) = positions[idx];
            let cells = [
                "X".to_string(),
                "Example".to_string(),
                format!("${equity}.00"),
                format!("${cost}.00"),
                format!("{gl}"),
                "10%".to_string(),
            ];
            input.insert(
                format!("account-{slot}"),
                Ok::<_, String>(snapshot(vec![cells.into_iter().collect()])),
            );
        }
        aggregate(&input, &no_yield).expect("aggregates").holdings
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_merge_is_order_independent(
            positions in proptest::collection::vec((0u32..1_000_000, 0u32..1_000_000, -500_000i32..500_000), 2..6),
            rotation in 0usize..6
        ) {
            let forward: Vec<usize> = (0..positions.len()).collect();
            let mut rotated = forward.clone();
            rotated.rotate_left(rotation % positions.len());
            let mut reversed = forward.clone();
            reversed.reverse();

            let a = holdings_for(&forward, &positions);
            let b = holdings_for(&rotated, &positions);
            let c = holdings_for(&reversed, &positions);

            for other in [&b, &c] {
                let (x, y) = (&a["X"], &other["X"]);
                prop_assert!((x.equity - y.equity).abs() <= 1e-6);
                prop_assert!((x.cost - y.cost).abs() <= 1e-6);
                prop_assert!((x.gain_loss - y.gain_loss).abs() <= 1e-6);
                prop_assert!((x.return_pct - y.return_pct).abs() <= 1e-6);
                prop_assert!(x.accounts.len() == y.accounts.len());
            }
        }

        #[test]
        fn prop_allocations_sum_to_one_hundred(
            equities in proptest::collection::vec(0u32..5_000_000, 1..12)
        ) {
            let rows: Vec<RawHoldingRow> = equities
                .iter()
                .enumerate()
                .map(|(idx, equity)| {
                    [
                        format!("T{idx}"),
                        "Name".to_string(),
                        format!("${equity}"),
                        "$1.00".to_string(),
                        "$0.00".to_string(),
                        "".to_string(),
                    ]
                    .into_iter()
                    .collect()
                })
                .collect();
            let input = accounts(vec![("A", Ok(snapshot(rows)))]);
            let result = aggregate(&input, &no_yield).expect("aggregates");

            let total: f64 = result.holdings.values().map(|h| h.allocation_pct).sum();
            if result.total_equity > 0.0 {
                prop_assert!((total - 100.0).abs() <= 1e-6, "sum was {total}");
            } else {
                prop_assert!(total == 0.0);
            }
        }
    }
}
