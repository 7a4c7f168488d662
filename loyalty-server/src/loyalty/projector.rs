//! Balance projector - derives balances and tier from the ledger
//!
//! The ledger is the source of truth; balances are computed by replaying a
//! customer's entries in `(created_at, id)` order. The projector is pure
//! and read-only, safe to call concurrently and repeatedly.
//!
//! # Allocation rule (FEFO)
//!
//! Debits consume the soonest-expiring live credit first ("first-expiring-
//! first-out"); never-expiring credits are consumed last. The sweeper uses
//! the same projection to cap expiry amounts, so both sides always agree on
//! how much of a credit is still unconsumed.
//!
//! # Lazy expiry
//!
//! A credit past its `expires_at` with no posted `expiry` entry is excluded
//! from `current_points` even before the sweeper runs. Reads are therefore
//! consistent regardless of sweep timing. `lifetime_points` always includes
//! every historical credit, expired or not.

use shared::models::{CustomerBalance, EntryKind, LedgerEntry, LoyaltyTier};

/// Per-credit consumption state accumulated during replay
#[derive(Debug, Clone)]
struct CreditState {
    entry_id: i64,
    amount: i64,
    /// Portion consumed by manual debits and redemptions
    consumed: i64,
    /// Portion retired by a posted expiry entry
    expired: i64,
    created_at: i64,
    expires_at: Option<i64>,
}

impl CreditState {
    fn remaining(&self) -> i64 {
        self.amount - self.consumed - self.expired
    }

    /// Live at the given instant: not yet past its expiry window
    fn is_live_at(&self, at: i64) -> bool {
        self.expires_at.map_or(true, |exp| exp > at)
    }
}

/// A credit the sweeper should retire: past its window, no expiry posted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpirableCredit {
    pub entry_id: i64,
    /// Unconsumed portion; the expiry debit is capped to this
    pub remaining: i64,
}

/// Replayed ledger state for one customer
#[derive(Debug, Clone)]
pub struct Projection {
    /// Sum of all positive credit amounts ever posted; never decreases
    pub lifetime_points: i64,
    credits: Vec<CreditState>,
    /// Debit amount that found no live credit to consume. Stays zero as
    /// long as the store's write-time balance check holds.
    unallocated_debit: i64,
}

impl Projection {
    /// Spendable points at `as_of`: remaining credit that is still live,
    /// minus any unallocated debit.
    pub fn current_points(&self, as_of: i64) -> i64 {
        let live: i64 = self
            .credits
            .iter()
            .filter(|c| c.is_live_at(as_of))
            .map(CreditState::remaining)
            .sum();
        (live - self.unallocated_debit).max(0)
    }

    /// Credits past their expiry window at `now` with no expiry entry yet
    pub fn expirable_credits(&self, now: i64) -> Vec<ExpirableCredit> {
        self.credits
            .iter()
            .filter(|c| c.expired == 0 && c.expires_at.is_some_and(|exp| exp <= now))
            .map(|c| ExpirableCredit {
                entry_id: c.entry_id,
                remaining: c.remaining(),
            })
            .collect()
    }

    /// Unconsumed portion of a specific credit entry
    pub fn remaining_for(&self, entry_id: i64) -> Option<i64> {
        self.credits
            .iter()
            .find(|c| c.entry_id == entry_id)
            .map(CreditState::remaining)
    }
}

/// Replay a customer's entries, which must be ordered by `(created_at, id)`
/// ascending - the order `ledger::list_by_customer` returns.
pub fn project_entries(entries: &[LedgerEntry]) -> Projection {
    let mut credits: Vec<CreditState> = Vec::new();
    let mut lifetime_points = 0i64;
    let mut unallocated_debit = 0i64;

    for entry in entries {
        if entry.amount > 0 {
            lifetime_points += entry.amount;
            credits.push(CreditState {
                entry_id: entry.id,
                amount: entry.amount,
                consumed: 0,
                expired: 0,
                created_at: entry.created_at,
                expires_at: entry.expires_at,
            });
        } else if entry.amount < 0 {
            let need = -entry.amount;
            if entry.kind == EntryKind::Expiry {
                apply_expiry(&mut credits, entry, need);
            } else {
                unallocated_debit += allocate_fefo(&mut credits, entry.created_at, need);
            }
        }
        // amount == 0 never reaches the ledger; ignore defensively
    }

    Projection {
        lifetime_points,
        credits,
        unallocated_debit,
    }
}

/// An expiry entry retires its own source credit, not FEFO
fn apply_expiry(credits: &mut [CreditState], entry: &LedgerEntry, need: i64) {
    let source_id = entry
        .source_ref
        .as_deref()
        .and_then(|s| s.parse::<i64>().ok());
    if let Some(source_id) = source_id {
        if let Some(credit) = credits.iter_mut().find(|c| c.entry_id == source_id) {
            // The sweeper caps amounts to the credit's remaining; cap again
            // here so a replay can never drive a credit negative.
            credit.expired += need.min(credit.remaining());
        }
    }
}

/// Consume `need` points from live credits in FEFO order at `debit_at`.
/// Returns the portion that could not be allocated.
fn allocate_fefo(credits: &mut Vec<CreditState>, debit_at: i64, mut need: i64) -> i64 {
    let mut order: Vec<usize> = (0..credits.len())
        .filter(|&i| credits[i].remaining() > 0 && credits[i].is_live_at(debit_at))
        .collect();
    // Soonest-expiring first; never-expiring last; ties broken by age
    order.sort_by_key(|&i| {
        let c = &credits[i];
        (c.expires_at.unwrap_or(i64::MAX), c.created_at, c.entry_id)
    });

    for i in order {
        if need == 0 {
            break;
        }
        let take = need.min(credits[i].remaining());
        credits[i].consumed += take;
        need -= take;
    }
    need
}

/// Highest tier whose threshold is <= `lifetime_points`.
/// `tiers` must be sorted ascending by `min_points`.
pub fn resolve_tier<'a>(tiers: &'a [LoyaltyTier], lifetime_points: i64) -> Option<&'a LoyaltyTier> {
    tiers
        .iter()
        .take_while(|t| t.min_points <= lifetime_points)
        .last()
}

/// Project a full [`CustomerBalance`] from ordered entries and tiers
pub fn project(
    merchant_id: i64,
    customer_phone: &str,
    entries: &[LedgerEntry],
    tiers: &[LoyaltyTier],
    as_of: i64,
) -> CustomerBalance {
    let projection = project_entries(entries);
    let tier = resolve_tier(tiers, projection.lifetime_points).cloned();
    CustomerBalance {
        merchant_id,
        customer_phone: customer_phone.to_string(),
        current_points: projection.current_points(as_of),
        lifetime_points: projection.lifetime_points,
        tier,
    }
}
