//! Bounded parallel segment tagging and verification.
//!
//! Work runs on blocking workers, at most `parallelism` at a time. Results
//! are yielded in segment order regardless of completion order, so the
//! aggregate tag input and the first reported failure are deterministic.

use crate::error::{TdfError, TdfResult};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use ztdf_crypto::integrity::verify_segment;
use ztdf_crypto::{ContentKey, IntegrityAlgorithm, tag_segment};

/// Computes segment tags in index order.
pub(crate) async fn tag_segments(
    segments: &[Arc<[u8]>],
    key: &ContentKey,
    alg: IntegrityAlgorithm,
    parallelism: usize,
    cancel: &CancellationToken,
) -> TdfResult<Vec<Vec<u8>>> {
    let key = Arc::new(key.clone());
    stream::iter(segments.iter().cloned())
        .map(|segment| {
            let key = key.clone();
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return Err(TdfError::Cancelled);
                }
                let tag = tokio::task::spawn_blocking(move || {
                    tag_segment(&segment, key.as_bytes(), alg)
                })
                .await??;
                Ok::<_, TdfError>(tag)
            }
        })
        .buffered(parallelism.max(1))
        .try_collect()
        .await
}

/// Checks every segment against its declared tag; the lowest failing
/// index is reported.
pub(crate) async fn verify_segments(
    segments: Vec<(Arc<[u8]>, Vec<u8>)>,
    key: &ContentKey,
    alg: IntegrityAlgorithm,
    parallelism: usize,
    cancel: &CancellationToken,
) -> TdfResult<()> {
    let key = Arc::new(key.clone());
    stream::iter(segments.into_iter().enumerate())
        .map(|(index, (segment, declared))| {
            let key = key.clone();
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return Err(TdfError::Cancelled);
                }
                tokio::task::spawn_blocking(move || {
                    verify_segment(index, &segment, &declared, key.as_bytes(), alg)
                })
                .await??;
                Ok::<_, TdfError>(())
            }
        })
        .buffered(parallelism.max(1))
        .try_collect::<Vec<()>>()
        .await?;
    Ok(())
}
