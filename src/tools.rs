use std::sync::Arc;

use futures::future::try_join_all;
use sdf_outline_renderer::{DistanceField, FieldParams, GlyphId};
use tokio::task::spawn_blocking;

use crate::{GlyphFieldCache, SdfFontError};

/// Fetches a single field from the cache without blocking the async runtime.
///
/// Rasterization is compute-bound, so the lookup runs on tokio's blocking pool.
pub async fn get_field(
    cache: Arc<GlyphFieldCache>,
    id: GlyphId,
    params: FieldParams,
) -> Result<Arc<DistanceField>, SdfFontError> {
    Ok(spawn_blocking(move || cache.get(id, params)).await??)
}

/// Fetches fields for a run of glyphs concurrently.
///
/// The output is in the same order as `ids`. Repeated ids are rasterized only
/// once, since concurrent lookups of the same key coalesce in the cache. The
/// first failure is returned.
pub async fn get_fields(
    cache: Arc<GlyphFieldCache>,
    ids: &[GlyphId],
    params: FieldParams,
) -> Result<Vec<Arc<DistanceField>>, SdfFontError> {
    try_join_all(
        ids.iter()
            .map(|&id| get_field(Arc::clone(&cache), id, params)),
    )
    .await
}

/// Like [`get_fields`], but substitutes the placeholder field for any glyph that
/// fails instead of failing the whole batch.
pub async fn get_fields_or_placeholder(
    cache: Arc<GlyphFieldCache>,
    ids: &[GlyphId],
    params: FieldParams,
) -> Result<Vec<Arc<DistanceField>>, SdfFontError> {
    try_join_all(ids.iter().map(|&id| {
        let cache = Arc::clone(&cache);
        async move {
            Ok::<_, SdfFontError>(
                spawn_blocking(move || cache.get_or_placeholder(id, params)).await?,
            )
        }
    }))
    .await
}
