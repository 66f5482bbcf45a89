//! Financial statement reports pulled from a spreadsheet host
//!
//! The host evaluates `FA.<Report>.Reports(...)` formulas into a grid. A
//! report is often not ready on the first evaluation, so each one is polled
//! until it succeeds or the poll timeout runs out.

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::table::{Cell, Table};
use crate::utils::errors::WorkbookError;

/// Spreadsheet automation host
pub trait WorkbookSource {
    /// Names of the workbooks currently open
    fn open_workbooks(&self) -> Vec<String>;

    /// Clear the active sheet of `workbook`, write `formula` to its first
    /// cell and read back the used range
    fn evaluate(&mut self, workbook: &str, formula: &str) -> Result<Vec<Vec<Cell>>, WorkbookError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    IncomeStatement,
    BalanceSheet,
    CashFlow,
}

impl ReportKind {
    pub const ALL: [ReportKind; 3] = [ReportKind::IncomeStatement, ReportKind::BalanceSheet, ReportKind::CashFlow];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::IncomeStatement => "IncomeStatement",
            ReportKind::BalanceSheet => "BalanceSheet",
            ReportKind::CashFlow => "CashFlow",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which statements to pull
#[derive(Debug, Clone)]
pub struct StatementRequest {
    pub stock: String,
    pub year: i32,
    pub quarter: u8,
    pub periods: u32,
    pub workbook: String,
}

impl StatementRequest {
    pub fn new(stock: impl Into<String>, year: i32, quarter: u8, periods: u32) -> Self {
        Self {
            stock: stock.into(),
            year,
            quarter,
            periods,
            workbook: "workbook.xlsx".to_string(),
        }
    }

    pub fn formula(&self, report: ReportKind) -> String {
        format!(
            "=FA.{}.Reports(\"{}\",{},{},{},1000000)",
            report, self.stock, self.year, self.quarter, self.periods
        )
    }
}

/// How long to keep re-evaluating a report that is not ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            interval: Duration::from_millis(10),
        }
    }
}

/// The three statements of one request, in `ReportKind::ALL` order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinancialStatements {
    pub reports: Vec<(ReportKind, Table)>,
}

impl FinancialStatements {
    pub fn get(&self, kind: ReportKind) -> Option<&Table> {
        self.reports.iter().find(|(k, _)| *k == kind).map(|(_, t)| t)
    }
}

/// Pull income statement, balance sheet and cash flow for a stock
pub async fn fetch_financial_statements<S: WorkbookSource>(
    source: &mut S,
    request: &StatementRequest,
    policy: PollPolicy,
) -> Result<FinancialStatements, WorkbookError> {
    if !source.open_workbooks().iter().any(|w| *w == request.workbook) {
        return Err(WorkbookError::WorkbookNotOpen(request.workbook.clone()));
    }

    let mut statements = FinancialStatements::default();
    for kind in ReportKind::ALL {
        let grid = poll_report(source, request, kind, policy).await?;
        let table = grid_to_table(grid);
        debug!("{} for {}: {} rows", kind, request.stock, table.len());
        statements.reports.push((kind, table));
    }

    info!("📊 Fetched financial statements for {}", request.stock);
    Ok(statements)
}

async fn poll_report<S: WorkbookSource>(
    source: &mut S,
    request: &StatementRequest,
    kind: ReportKind,
    policy: PollPolicy,
) -> Result<Vec<Vec<Cell>>, WorkbookError> {
    let formula = request.formula(kind);
    let started = Instant::now();
    let mut failures = 0u32;

    loop {
        match source.evaluate(&request.workbook, &formula) {
            Ok(grid) => return Ok(grid),
            Err(e) => {
                failures += 1;
                if started.elapsed() >= policy.timeout {
                    warn!("{} not ready after {} attempts: {}", kind, failures, e);
                    return Err(WorkbookError::PollTimeout {
                        report: kind.to_string(),
                        waited_ms: started.elapsed().as_millis(),
                    });
                }
            }
        }
        tokio::time::sleep(policy.interval).await;
    }
}

/// First grid row becomes the header
pub fn grid_to_table(grid: Vec<Vec<Cell>>) -> Table {
    let mut rows = grid.into_iter();
    let Some(header) = rows.next() else {
        return Table::default();
    };

    let mut table = Table::new(header.iter().map(|c| match c {
        Cell::Null => String::new(),
        other => other.to_string(),
    }));
    for row in rows {
        table.push_row(row);
    }
    table
}
