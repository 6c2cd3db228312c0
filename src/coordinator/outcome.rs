// ============================================================================
// Outcome Sink
// ============================================================================
//
// Every failure the coordinator absorbs is handed to the sink. Cache lookups,
// store failures and deliveries are reported here too.
//
// ============================================================================

/// A cache or notification fault that did not fail the request.
#[derive(Debug, Clone, PartialEq)]
pub enum SoftFailure {
    CacheRead { key: String, error: String },
    CacheWrite { key: String, error: String },
    Publish { topic: String, order_id: i64, error: String },
}

impl SoftFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            SoftFailure::CacheRead { .. } => "cache_read",
            SoftFailure::CacheWrite { .. } => "cache_write",
            SoftFailure::Publish { .. } => "publish",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Hit,
    Miss,
}

pub trait OutcomeSink: Send + Sync {
    fn soft_failure(&self, failure: SoftFailure);

    fn cache_lookup(&self, _outcome: CacheLookup) {}

    fn store_failure(&self, _operation: &'static str) {}

    fn order_created(&self, _order_id: i64) {}

    fn published(&self, _order_id: i64) {}
}
