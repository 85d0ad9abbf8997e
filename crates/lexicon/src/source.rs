use crate::error::Result;
use crate::sense::{CandidateSense, HypernymRef};
use async_trait::async_trait;
use concord_protocol::SourceKind;

/// Read-only client over one knowledge source.
///
/// Implementations report problems through `Err`; callers that fan out over
/// several sources treat any error as "no candidates" so a dead source only
/// makes results less complete, never wrong.
#[async_trait]
pub trait LexicalSource: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Local sources answer from memory and take part in the single-sense
    /// short-circuit before any fan-out.
    fn is_local(&self) -> bool {
        false
    }

    /// Every sense the source knows for `term`.
    async fn lookup(&self, term: &str) -> Result<Vec<CandidateSense>>;

    /// Chain of more general concepts above `concept_id`, nearest first.
    async fn hypernyms_of(&self, concept_id: &str) -> Result<Vec<HypernymRef>>;
}
