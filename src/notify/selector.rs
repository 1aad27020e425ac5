//! Selection of passes due for a renewal reminder.

use crate::expiry::{compute_status, days_until_expiry};
use crate::records::{IssuedPass, PassStatus};
use chrono::NaiveDate;

/// Default look-ahead window for reminders, in days.
pub const DEFAULT_WINDOW_DAYS: u32 = 15;

/// A pass that should get a reminder on the reference day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueReminder {
    pub pass: IssuedPass,
    /// Always in `1..=window_days`.
    pub days_remaining: i64,
}

/// Passes that are `Active` on `reference_day` and expire in `1..=window_days` days.
///
/// Passes expiring on the reference day or earlier are never selected.
/// Output is ordered by days remaining, then pass id, so repeated calls with
/// the same inputs return the same sequence.
pub fn select_due<'a, I>(passes: I, reference_day: NaiveDate, window_days: u32) -> Vec<DueReminder>
where
    I: IntoIterator<Item = &'a IssuedPass>,
{
    let window = i64::from(window_days);
    let mut due: Vec<DueReminder> = passes
        .into_iter()
        .filter(|pass| compute_status(pass, reference_day) == PassStatus::Active)
        .filter_map(|pass| {
            let days_remaining = days_until_expiry(pass, reference_day);
            (1..=window).contains(&days_remaining).then(|| DueReminder {
                pass: pass.clone(),
                days_remaining,
            })
        })
        .collect();

    due.sort_by(|a, b| {
        a.days_remaining
            .cmp(&b.days_remaining)
            .then_with(|| a.pass.pass_id.cmp(&b.pass.pass_id))
    });
    due
}
