//! Durable period-keyed persistence of computed overlap tables.

mod schema;
mod store;

pub use store::MatchCacheStore;

use crate::aggregate::{Dimension, MatchEntry};
use std::collections::BTreeMap;

/// A period's full computed result set. Closed records are immutable and
/// served verbatim on later runs; open records are overwritten on every
/// recompute.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodRecord {
    pub dimensions: BTreeMap<Dimension, Vec<MatchEntry>>,
    /// Unix seconds at computation time.
    pub computed_at: i64,
    pub closed: bool,
}
