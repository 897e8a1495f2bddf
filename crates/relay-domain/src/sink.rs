use async_trait::async_trait;

use crate::error::RelayResult;
use crate::record::OutputRecord;

/// Upload sink boundary: accepts one flat record per call.
///
/// Implementations own the connection to the ingestion endpoint; the
/// pipeline treats every non-success outcome uniformly (logged, record
/// dropped after the one attempt).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn submit(&self, record: &OutputRecord) -> RelayResult<()>;
}
