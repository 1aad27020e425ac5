//! Plain-text operational reports over the record store.

use crate::expiry::{compute_status, days_until_expiry};
use crate::notify::select_due;
use crate::records::{IssuedPass, PassStatus};
use crate::store::RecordStore;
use chrono::NaiveDate;
use std::fmt;

const UNKNOWN: &str = "Unknown";

/// Which report to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Active passes expiring within the window.
    Expiring { window_days: u32 },
    /// Passes whose stored status is `Expired`.
    Expired,
    /// Passes whose stored status is `Active`.
    Active,
    /// Every employee with their active passes.
    Employees,
    /// Totals and per-type usage.
    Stats,
}

/// One pass line with its references resolved for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassLine {
    pub pass_id: String,
    pub employee_name: String,
    pub email: String,
    pub pass_type_name: String,
    pub expiry_date: NaiveDate,
    pub days_remaining: i64,
}

/// Employee entry in the summary report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeLine {
    pub employee_id: String,
    pub name: String,
    pub department: String,
    pub manager: String,
    pub email: String,
    /// `(pass type name, days remaining)` for each active pass.
    pub active_passes: Vec<(String, i64)>,
}

/// Aggregate counts for the statistics report.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStats {
    pub employees: usize,
    pub pass_types: usize,
    pub passes: usize,
    pub active: usize,
    pub expired: usize,
    pub revoked: usize,
    pub expiring_soon: usize,
    pub window_days: u32,
    /// `(pass type name, passes issued)` in pass type id order.
    pub usage: Vec<(String, usize)>,
}

impl SystemStats {
    /// Share of passes in `count`, as a percentage. `None` with no passes.
    pub fn percent(&self, count: usize) -> Option<f64> {
        (self.passes > 0).then(|| count as f64 / self.passes as f64 * 100.0)
    }
}

/// A built report. `Display` renders the text form.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Expiring {
        window_days: u32,
        lines: Vec<PassLine>,
    },
    Expired {
        lines: Vec<PassLine>,
    },
    Active {
        lines: Vec<PassLine>,
    },
    Employees {
        lines: Vec<EmployeeLine>,
    },
    Stats(SystemStats),
}

impl Report {
    /// Build `kind` from the store as of `today`.
    ///
    /// `stats_window_days` is the window used for the expiring-soon count.
    pub fn build(
        kind: ReportKind,
        store: &RecordStore,
        today: NaiveDate,
        stats_window_days: u32,
    ) -> Self {
        match kind {
            ReportKind::Expiring { window_days } => Self::Expiring {
                window_days,
                lines: select_due(store.passes(), today, window_days)
                    .iter()
                    .map(|due| pass_line(store, &due.pass, due.days_remaining))
                    .collect(),
            },
            ReportKind::Expired => Self::Expired {
                lines: stored_with_status(store, today, PassStatus::Expired),
            },
            ReportKind::Active => Self::Active {
                lines: stored_with_status(store, today, PassStatus::Active),
            },
            ReportKind::Employees => Self::Employees {
                lines: store
                    .employees()
                    .map(|employee| EmployeeLine {
                        employee_id: employee.employee_id.clone(),
                        name: employee.name.clone(),
                        department: employee.department.clone(),
                        manager: employee.manager.clone(),
                        email: employee.email.clone(),
                        active_passes: store
                            .passes()
                            .filter(|pass| pass.employee_id == employee.employee_id)
                            .filter(|pass| compute_status(pass, today) == PassStatus::Active)
                            .map(|pass| {
                                (
                                    pass_type_name(store, pass),
                                    days_until_expiry(pass, today),
                                )
                            })
                            .collect(),
                    })
                    .collect(),
            },
            ReportKind::Stats => Self::Stats(stats(store, today, stats_window_days)),
        }
    }
}

fn pass_type_name(store: &RecordStore, pass: &IssuedPass) -> String {
    store
        .pass_type(&pass.pass_type_id)
        .map_or_else(|| UNKNOWN.to_owned(), |pass_type| pass_type.name.clone())
}

fn pass_line(store: &RecordStore, pass: &IssuedPass, days_remaining: i64) -> PassLine {
    let employee = store.employee(&pass.employee_id);
    PassLine {
        pass_id: pass.pass_id.clone(),
        employee_name: employee.map_or_else(|| UNKNOWN.to_owned(), |e| e.name.clone()),
        email: employee.map_or_else(|| UNKNOWN.to_owned(), |e| e.email.clone()),
        pass_type_name: pass_type_name(store, pass),
        expiry_date: pass.expiry_date,
        days_remaining,
    }
}

fn stored_with_status(store: &RecordStore, today: NaiveDate, status: PassStatus) -> Vec<PassLine> {
    store
        .passes()
        .filter(|pass| pass.status == status)
        .map(|pass| pass_line(store, pass, days_until_expiry(pass, today)))
        .collect()
}

fn stats(store: &RecordStore, today: NaiveDate, window_days: u32) -> SystemStats {
    let count = |status: PassStatus| store.passes().filter(|p| p.status == status).count();
    SystemStats {
        employees: store.employee_count(),
        pass_types: store.pass_type_count(),
        passes: store.pass_count(),
        active: count(PassStatus::Active),
        expired: count(PassStatus::Expired),
        revoked: count(PassStatus::Revoked),
        expiring_soon: select_due(store.passes(), today, window_days).len(),
        window_days,
        usage: store
            .pass_types()
            .map(|pass_type| {
                let issued = store
                    .passes()
                    .filter(|p| p.pass_type_id == pass_type.pass_type_id)
                    .count();
                (pass_type.name.clone(), issued)
            })
            .collect(),
    }
}

fn heading(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f, "{title}")?;
    writeln!(f, "{}", "=".repeat(title.len()))?;
    writeln!(f)
}

fn urgency(days_remaining: i64) -> &'static str {
    match days_remaining {
        ..=3 => "URGENT",
        4..=7 => "WARNING",
        _ => "NOTICE",
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expiring { window_days, lines } => {
                heading(f, &format!("PASSES EXPIRING IN NEXT {window_days} DAYS"))?;
                if lines.is_empty() {
                    return writeln!(f, "No passes expiring in the next {window_days} days.");
                }
                for line in lines {
                    writeln!(f, "[{}] {}", urgency(line.days_remaining), line.employee_name)?;
                    writeln!(f, "   Pass: {} ({})", line.pass_type_name, line.pass_id)?;
                    writeln!(
                        f,
                        "   Expires: {} ({} days)",
                        line.expiry_date, line.days_remaining
                    )?;
                    writeln!(f, "   Email: {}", line.email)?;
                    writeln!(f)?;
                }
                Ok(())
            }
            Self::Expired { lines } => {
                heading(f, "EXPIRED PASSES REPORT")?;
                if lines.is_empty() {
                    return writeln!(f, "No expired passes found.");
                }
                for line in lines {
                    writeln!(f, "{}", line.employee_name)?;
                    writeln!(f, "   Pass: {} ({})", line.pass_type_name, line.pass_id)?;
                    writeln!(f, "   Expired: {}", line.expiry_date)?;
                    writeln!(f, "   Email: {}", line.email)?;
                    writeln!(f)?;
                }
                Ok(())
            }
            Self::Active { lines } => {
                heading(f, "ACTIVE PASSES REPORT")?;
                if lines.is_empty() {
                    return writeln!(f, "No active passes found.");
                }
                for line in lines {
                    let flag = if line.days_remaining <= 7 { "[!] " } else { "" };
                    writeln!(f, "{flag}{}", line.employee_name)?;
                    writeln!(f, "   Pass: {} ({})", line.pass_type_name, line.pass_id)?;
                    writeln!(
                        f,
                        "   Expires: {} ({} days)",
                        line.expiry_date, line.days_remaining
                    )?;
                    writeln!(f)?;
                }
                Ok(())
            }
            Self::Employees { lines } => {
                heading(f, "EMPLOYEE SUMMARY REPORT")?;
                for line in lines {
                    writeln!(f, "{} ({})", line.name, line.employee_id)?;
                    writeln!(f, "   Department: {}", line.department)?;
                    writeln!(f, "   Manager: {}", line.manager)?;
                    writeln!(f, "   Email: {}", line.email)?;
                    writeln!(f, "   Active Passes: {}", line.active_passes.len())?;
                    if line.active_passes.is_empty() {
                        writeln!(f, "     - No active passes")?;
                    }
                    for (name, days) in &line.active_passes {
                        writeln!(f, "     - {name} (expires in {days} days)")?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            Self::Stats(stats) => {
                heading(f, "SYSTEM STATISTICS REPORT")?;
                writeln!(f, "OVERVIEW")?;
                writeln!(f, "   Total Employees: {}", stats.employees)?;
                writeln!(f, "   Total Pass Types: {}", stats.pass_types)?;
                writeln!(f, "   Total Passes Issued: {}", stats.passes)?;
                writeln!(f)?;
                writeln!(f, "PASS STATUS")?;
                writeln!(f, "   Active Passes: {}", stats.active)?;
                writeln!(f, "   Expired Passes: {}", stats.expired)?;
                writeln!(f, "   Revoked Passes: {}", stats.revoked)?;
                writeln!(
                    f,
                    "   Expiring Soon ({} days): {}",
                    stats.window_days, stats.expiring_soon
                )?;
                writeln!(f)?;
                if let (Some(active), Some(expired)) =
                    (stats.percent(stats.active), stats.percent(stats.expired))
                {
                    writeln!(f, "PERCENTAGES")?;
                    writeln!(f, "   Active: {active:.1}%")?;
                    writeln!(f, "   Expired: {expired:.1}%")?;
                    writeln!(f)?;
                }
                writeln!(f, "PASS TYPE USAGE")?;
                for (name, issued) in &stats.usage {
                    writeln!(f, "   {name}: {issued} issued")?;
                }
                Ok(())
            }
        }
    }
}
