//! Expiry state derivation.
//!
//! Everything here is a pure function of a pass and an explicit reference
//! date. Nothing reads the wall clock.

use crate::records::{IssuedPass, PassStatus};
use chrono::NaiveDate;

/// Whole days from `today` until the pass expires. Negative once past.
pub fn days_until_expiry(pass: &IssuedPass, today: NaiveDate) -> i64 {
    (pass.expiry_date - today).num_days()
}

/// Status of `pass` as of `today`.
///
/// `Revoked` is absorbing. Otherwise a pass whose expiry date is strictly
/// before `today` is `Expired`; a pass expiring today is still `Active`.
pub fn compute_status(pass: &IssuedPass, today: NaiveDate) -> PassStatus {
    match pass.status {
        PassStatus::Revoked => PassStatus::Revoked,
        PassStatus::Expired => PassStatus::Expired,
        PassStatus::Active if pass.expiry_date < today => PassStatus::Expired,
        PassStatus::Active => PassStatus::Active,
    }
}

/// Passes flipped from `Active` to `Expired` by a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Identifiers of the passes whose stored status changed.
    pub changed: Vec<String>,
}

impl SweepOutcome {
    pub fn changed_count(&self) -> usize {
        self.changed.len()
    }
}

/// Flip every stored-`Active` pass that has run past its expiry date.
///
/// This is the only writer of the `Active → Expired` transition.
pub fn sweep_expirations<'a, I>(passes: I, today: NaiveDate) -> SweepOutcome
where
    I: IntoIterator<Item = &'a mut IssuedPass>,
{
    let mut outcome = SweepOutcome::default();
    for pass in passes {
        if pass.status == PassStatus::Active && compute_status(pass, today) == PassStatus::Expired {
            pass.status = PassStatus::Expired;
            outcome.changed.push(pass.pass_id.clone());
        }
    }
    outcome
}

/// A pass annotated with its derived status for a given day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassView {
    pub pass: IssuedPass,
    pub status: PassStatus,
    pub days_remaining: i64,
}

impl PassView {
    pub fn new(pass: &IssuedPass, today: NaiveDate) -> Self {
        Self {
            status: compute_status(pass, today),
            days_remaining: days_until_expiry(pass, today),
            pass: pass.clone(),
        }
    }
}
