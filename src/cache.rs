//! A coalescing cache of rasterized glyph fields.
//!
//! Looking up a missing field claims its key and rasterizes outside the lock.
//! Anyone asking for the same key in the meantime waits for that result
//! instead of starting a second rasterization. Published fields are immutable
//! and handed out as `Arc`s, so readers never block each other.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};
use sdf_outline_renderer::{
    DistanceField, DistanceFieldRasterizer, FieldParams, Glyph, GlyphId, SdfGlyphError,
};

/// A source of glyph outlines, e.g. a parsed font.
pub trait GlyphProvider: Send + Sync {
    fn glyph(&self, id: GlyphId) -> Option<Arc<Glyph>>;
}

/// An in-memory set of outlines.
#[derive(Clone, Debug, Default)]
pub struct GlyphSet {
    glyphs: HashMap<GlyphId, Arc<Glyph>>,
}

impl GlyphSet {
    #[must_use]
    pub fn new() -> GlyphSet {
        GlyphSet::default()
    }

    /// Adds a glyph, replacing any previous glyph with the same id.
    pub fn insert(&mut self, glyph: Glyph) {
        self.glyphs.insert(glyph.id(), Arc::new(glyph));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

impl FromIterator<Glyph> for GlyphSet {
    fn from_iter<I: IntoIterator<Item = Glyph>>(iter: I) -> Self {
        let mut set = GlyphSet::new();
        for glyph in iter {
            set.insert(glyph);
        }
        set
    }
}

impl GlyphProvider for GlyphSet {
    fn glyph(&self, id: GlyphId) -> Option<Arc<Glyph>> {
        self.glyphs.get(&id).cloned()
    }
}

/// Identifies one cached field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub glyph: GlyphId,
    pub params: FieldParams,
}

/// Decides which published fields to drop.
///
/// The cache reports every published field, every hit and every removal it
/// makes on its own; after each publication it keeps asking for victims until
/// the policy returns `None`. In-flight rasterizations are never reported, so
/// they can never be chosen.
pub trait EvictionPolicy: Send {
    fn inserted(&mut self, key: FieldKey, bytes: usize);

    fn touched(&mut self, key: &FieldKey);

    fn removed(&mut self, key: &FieldKey);

    /// The next entry to evict, if the policy is over budget. The returned key
    /// is no longer tracked by the policy.
    fn next_victim(&mut self) -> Option<FieldKey>;
}

/// Keeps everything until it is invalidated explicitly.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unbounded;

impl EvictionPolicy for Unbounded {
    fn inserted(&mut self, _key: FieldKey, _bytes: usize) {}

    fn touched(&mut self, _key: &FieldKey) {}

    fn removed(&mut self, _key: &FieldKey) {}

    fn next_victim(&mut self) -> Option<FieldKey> {
        None
    }
}

/// Least-recently-used eviction under an entry count and/or byte budget.
///
/// A field larger than the whole byte budget is still returned to the caller
/// that requested it, but is not retained.
#[derive(Clone, Debug, Default)]
pub struct Lru {
    max_entries: Option<usize>,
    max_bytes: Option<usize>,
    tick: u64,
    bytes: usize,
    entries: HashMap<FieldKey, (u64, usize)>,
    order: BTreeMap<u64, FieldKey>,
}

impl Lru {
    #[must_use]
    pub fn new(max_entries: Option<usize>, max_bytes: Option<usize>) -> Lru {
        Lru {
            max_entries,
            max_bytes,
            ..Lru::default()
        }
    }

    #[must_use]
    pub fn with_max_entries(max_entries: usize) -> Lru {
        Lru::new(Some(max_entries), None)
    }

    #[must_use]
    pub fn with_max_bytes(max_bytes: usize) -> Lru {
        Lru::new(None, Some(max_bytes))
    }

    /// Bytes currently accounted to retained fields.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn over_budget(&self) -> bool {
        self.max_entries.is_some_and(|max| self.entries.len() > max)
            || self.max_bytes.is_some_and(|max| self.bytes > max)
    }
}

impl EvictionPolicy for Lru {
    fn inserted(&mut self, key: FieldKey, bytes: usize) {
        self.removed(&key);
        let tick = self.next_tick();
        self.entries.insert(key, (tick, bytes));
        self.order.insert(tick, key);
        self.bytes += bytes;
    }

    fn touched(&mut self, key: &FieldKey) {
        let tick = self.next_tick();
        if let Some((last_used, _)) = self.entries.get_mut(key) {
            self.order.remove(&*last_used);
            *last_used = tick;
            self.order.insert(tick, *key);
        }
    }

    fn removed(&mut self, key: &FieldKey) {
        if let Some((last_used, bytes)) = self.entries.remove(key) {
            self.order.remove(&last_used);
            self.bytes -= bytes;
        }
    }

    fn next_victim(&mut self) -> Option<FieldKey> {
        if !self.over_budget() {
            return None;
        }
        let (_, key) = self.order.pop_first()?;
        if let Some((_, bytes)) = self.entries.remove(&key) {
            self.bytes -= bytes;
        }
        Some(key)
    }
}

/// Counters describing cache activity since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from a published field.
    pub hits: u64,
    /// Lookups that claimed a key and computed its field.
    pub misses: u64,
    /// Lookups that waited for another caller's in-flight computation.
    pub coalesced: u64,
    /// Rasterizations started.
    pub rasterizations: u64,
    /// Fields dropped by the eviction policy.
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    rasterizations: AtomicU64,
    evictions: AtomicU64,
}

type FieldResult = Result<Arc<DistanceField>, SdfGlyphError>;

/// One in-flight computation that any number of callers can wait on.
#[derive(Debug, Default)]
struct Flight {
    result: Mutex<Option<FieldResult>>,
    done: Condvar,
}

impl Flight {
    fn finish(&self, result: FieldResult) {
        *self.result.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
        self.done.notify_all();
    }

    fn wait(&self) -> FieldResult {
        let mut result = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(result) = result.as_ref() {
                return result.clone();
            }
            result = self
                .done
                .wait(result)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[derive(Clone, Debug)]
enum Slot {
    Pending(Arc<Flight>),
    Ready(Arc<DistanceField>),
}

struct Inner {
    slots: HashMap<FieldKey, Slot>,
    policy: Box<dyn EvictionPolicy>,
}

/// Publishes a failure if the computing caller unwinds before finishing.
struct FlightGuard<'a> {
    cache: &'a GlyphFieldCache,
    key: FieldKey,
    flight: Arc<Flight>,
    finished: bool,
}

impl FlightGuard<'_> {
    fn finish(mut self, result: FieldResult) {
        self.finished = true;
        self.cache.publish(self.key, &self.flight, result);
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Rasterization of glyph {} panicked", self.key.glyph);
            let error = SdfGlyphError::RasterizationPanicked(self.key.glyph);
            self.cache.publish(self.key, &self.flight, Err(error));
        }
    }
}

/// Caches one distance field per `(glyph, params)` pair.
///
/// ```
/// use sdf_font_tools::{GlyphFieldCache, GlyphSet};
/// use sdf_outline_renderer::{ContourBuilder, FieldParams, Glyph, GlyphId};
///
/// let mut builder = ContourBuilder::new();
/// builder.move_to((0.0, 0.0))?.line_to((10.0, 0.0))?.line_to((5.0, 10.0))?;
/// let glyph = Glyph::new(GlyphId::from('A'), builder.finish()?, 10.0);
///
/// let cache = GlyphFieldCache::new(GlyphSet::from_iter([glyph]));
/// let params = FieldParams::new(32, 32, 2.0)?;
/// let field = cache.get(GlyphId::from('A'), params)?;
/// assert!(std::sync::Arc::ptr_eq(&field, &cache.get(GlyphId::from('A'), params)?));
/// # Ok::<(), sdf_outline_renderer::SdfGlyphError>(())
/// ```
pub struct GlyphFieldCache {
    provider: Arc<dyn GlyphProvider>,
    rasterizer: DistanceFieldRasterizer,
    inner: Mutex<Inner>,
    counters: Counters,
}

impl GlyphFieldCache {
    /// Creates an unbounded cache rasterizing with the default configuration.
    pub fn new(provider: impl GlyphProvider + 'static) -> GlyphFieldCache {
        GlyphFieldCache::from_provider(Arc::new(provider))
    }

    pub fn from_provider(provider: Arc<dyn GlyphProvider>) -> GlyphFieldCache {
        GlyphFieldCache {
            provider,
            rasterizer: DistanceFieldRasterizer::default(),
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                policy: Box::new(Unbounded),
            }),
            counters: Counters::default(),
        }
    }

    /// Replaces the eviction policy. Already cached fields are kept but are
    /// unknown to the new policy until they are touched by a lookup again.
    #[must_use]
    pub fn with_eviction(self, policy: impl EvictionPolicy + 'static) -> GlyphFieldCache {
        self.lock().policy = Box::new(policy);
        self
    }

    #[must_use]
    pub fn with_rasterizer(mut self, rasterizer: DistanceFieldRasterizer) -> GlyphFieldCache {
        self.rasterizer = rasterizer;
        self
    }

    /// The rasterizer every miss runs on. Its worker pool is shared by all
    /// concurrent misses.
    #[must_use]
    pub fn rasterizer(&self) -> &DistanceFieldRasterizer {
        &self.rasterizer
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The outline behind `id`, straight from the provider.
    #[must_use]
    pub fn glyph(&self, id: GlyphId) -> Option<Arc<Glyph>> {
        self.provider.glyph(id)
    }

    /// Returns the field for `id` at `params`, rasterizing it on first use.
    ///
    /// Concurrent calls for the same key share a single rasterization. Errors
    /// reach every caller waiting on that rasterization and are not cached,
    /// so a later call tries again.
    pub fn get(&self, id: GlyphId, params: FieldParams) -> Result<Arc<DistanceField>, SdfGlyphError> {
        params.validate()?;
        let key = FieldKey { glyph: id, params };

        let flight = {
            let mut inner = self.lock();
            let slot = inner.slots.get(&key).cloned();
            match slot {
                Some(Slot::Ready(field)) => {
                    inner.policy.touched(&key);
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(field);
                }
                Some(Slot::Pending(flight)) => {
                    drop(inner);
                    self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    debug!("Waiting for in-flight rasterization of glyph {id}");
                    return flight.wait();
                }
                None => {
                    let flight = Arc::new(Flight::default());
                    inner.slots.insert(key, Slot::Pending(Arc::clone(&flight)));
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                    flight
                }
            }
        };

        let guard = FlightGuard {
            cache: self,
            key,
            flight,
            finished: false,
        };
        let result = self.compute(key);
        guard.finish(result.clone());
        result
    }

    /// Like [`Self::get`], but falls back to [`DistanceField::placeholder`]
    /// (a field that is fully outside everywhere) instead of failing.
    pub fn get_or_placeholder(&self, id: GlyphId, params: FieldParams) -> Arc<DistanceField> {
        match self.get(id, params) {
            Ok(field) => field,
            Err(e) => {
                warn!("Using a placeholder field for glyph {id}: {e}");
                Arc::new(DistanceField::placeholder(params))
            }
        }
    }

    fn compute(&self, key: FieldKey) -> FieldResult {
        let glyph = self
            .provider
            .glyph(key.glyph)
            .ok_or(SdfGlyphError::UnknownGlyph(key.glyph))?;
        self.counters.rasterizations.fetch_add(1, Ordering::Relaxed);
        self.rasterizer.rasterize(&glyph, key.params).map(Arc::new)
    }

    fn publish(&self, key: FieldKey, flight: &Arc<Flight>, result: FieldResult) {
        {
            let mut inner = self.lock();
            // The key may have been invalidated (and even claimed again) while
            // this flight was running; only replace our own pending slot.
            let ours = matches!(inner.slots.get(&key), Some(Slot::Pending(f)) if Arc::ptr_eq(f, flight));
            if ours {
                match &result {
                    Ok(field) => {
                        inner.slots.insert(key, Slot::Ready(Arc::clone(field)));
                        inner.policy.inserted(key, field.byte_size());
                        self.evict(&mut inner);
                    }
                    Err(_) => {
                        inner.slots.remove(&key);
                    }
                }
            }
        }
        flight.finish(result);
    }

    fn evict(&self, inner: &mut Inner) {
        while let Some(victim) = inner.policy.next_victim() {
            if let Some(Slot::Ready(_)) = inner.slots.get(&victim) {
                inner.slots.remove(&victim);
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                debug!("Evicted glyph {} at {:?}", victim.glyph, victim.params.resolution);
            }
        }
    }

    /// Drops the field for `key`. An in-flight rasterization for the key still
    /// completes for its waiters, but its result is not cached.
    pub fn invalidate(&self, key: &FieldKey) -> bool {
        let mut inner = self.lock();
        inner.policy.removed(key);
        inner.slots.remove(key).is_some()
    }

    /// Drops every field of glyph `id`, at any parameters. Returns how many
    /// entries were removed.
    pub fn invalidate_glyph(&self, id: GlyphId) -> usize {
        let mut inner = self.lock();
        let keys: Vec<FieldKey> = inner
            .slots
            .keys()
            .filter(|key| key.glyph == id)
            .copied()
            .collect();
        for key in &keys {
            inner.policy.removed(key);
            inner.slots.remove(key);
        }
        keys.len()
    }

    /// Drops everything.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let Inner { slots, policy } = &mut *inner;
        for key in slots.keys() {
            policy.removed(key);
        }
        slots.clear();
    }

    /// Number of published fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock()
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, key: &FieldKey) -> bool {
        matches!(self.lock().slots.get(key), Some(Slot::Ready(_)))
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            rasterizations: self.counters.rasterizations.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{channel, Receiver};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use sdf_outline_renderer::{
        ContourBuilder, DistanceFieldRasterizer, FieldParams, Glyph, GlyphId, RasterizerConfig,
        SdfGlyphError,
    };

    use super::{EvictionPolicy, FieldKey, GlyphFieldCache, GlyphProvider, GlyphSet, Lru};

    fn triangle(c: char) -> Glyph {
        let mut builder = ContourBuilder::new();
        builder
            .move_to((0.0, 0.0))
            .unwrap()
            .line_to((10.0, 0.0))
            .unwrap()
            .line_to((5.0, 10.0))
            .unwrap();
        Glyph::new(GlyphId::from(c), builder.finish().unwrap(), 12.0)
    }

    fn glyphs(chars: &str) -> GlyphSet {
        chars.chars().map(triangle).collect()
    }

    fn params(size: u32) -> FieldParams {
        FieldParams::new(size, size, 2.0).unwrap()
    }

    #[test_log::test]
    fn test_hit_after_miss() {
        let cache = GlyphFieldCache::new(glyphs("AB"));
        let first = cache.get(GlyphId::from('A'), params(16)).unwrap();
        let second = cache.get(GlyphId::from('A'), params(16)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let other = cache.get(GlyphId::from('A'), params(8)).unwrap();
        assert!(!Arc::ptr_eq(&first, &other));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.rasterizations, 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_unknown_glyph_is_not_cached() {
        let cache = GlyphFieldCache::new(glyphs("A"));
        let id = GlyphId::from('Z');
        assert!(matches!(
            cache.get(id, params(16)),
            Err(SdfGlyphError::UnknownGlyph(missing)) if missing == id
        ));
        assert!(cache.is_empty());
        assert_eq!(cache.stats().rasterizations, 0);

        let placeholder = cache.get_or_placeholder(id, params(16));
        assert!(placeholder.values().iter().all(|v| *v == 1.0));
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_invalid_params_are_rejected_up_front() {
        let cache = GlyphFieldCache::new(glyphs("A"));
        let bad = FieldParams {
            band: 0.0,
            ..params(16)
        };
        assert!(matches!(
            cache.get(GlyphId::from('A'), bad),
            Err(SdfGlyphError::InvalidBand(_))
        ));
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = GlyphFieldCache::new(glyphs("A")).with_rasterizer(DistanceFieldRasterizer::new(
            RasterizerConfig {
                timeout: Some(Duration::ZERO),
                ..RasterizerConfig::default()
            },
        ));
        for _ in 0..2 {
            assert!(matches!(
                cache.get(GlyphId::from('A'), params(16)),
                Err(SdfGlyphError::Timeout(_))
            ));
        }
        assert_eq!(cache.stats().rasterizations, 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_misses_share_the_worker_pool() {
        let rasterizer = DistanceFieldRasterizer::new(RasterizerConfig {
            threads: 2,
            rows_per_job: 2,
            timeout: None,
        });
        let chars = "ABCDEFGH";
        let cache = Arc::new(GlyphFieldCache::new(glyphs(chars)).with_rasterizer(rasterizer.clone()));

        let handles: Vec<_> = chars
            .chars()
            .map(|c| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get(GlyphId::from(c), params(16)).map(|_| ()))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(cache.stats().rasterizations, chars.len() as u64);
        assert!(cache.rasterizer().shares_pool_with(&rasterizer));
        assert_eq!(cache.rasterizer().threads(), 2);

        // Caches built with the default rasterizer all share one pool too.
        let other = GlyphFieldCache::new(glyphs("A"));
        assert!(GlyphFieldCache::new(glyphs("B"))
            .rasterizer()
            .shares_pool_with(other.rasterizer()));
    }

    #[test]
    fn test_lru_entry_budget() {
        let cache = GlyphFieldCache::new(glyphs("ABC")).with_eviction(Lru::with_max_entries(2));
        let key = |c: char| FieldKey {
            glyph: GlyphId::from(c),
            params: params(8),
        };
        cache.get(GlyphId::from('A'), params(8)).unwrap();
        cache.get(GlyphId::from('B'), params(8)).unwrap();
        // Touch A so that B becomes the least recently used.
        cache.get(GlyphId::from('A'), params(8)).unwrap();
        cache.get(GlyphId::from('C'), params(8)).unwrap();

        assert!(cache.contains(&key('A')));
        assert!(!cache.contains(&key('B')));
        assert!(cache.contains(&key('C')));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_lru_byte_budget() {
        let mut lru = Lru::with_max_bytes(100);
        let key = |c: char| FieldKey {
            glyph: GlyphId::from(c),
            params: params(8),
        };
        lru.inserted(key('A'), 60);
        assert_eq!(lru.next_victim(), None);
        lru.inserted(key('B'), 60);
        assert_eq!(lru.next_victim(), Some(key('A')));
        assert_eq!(lru.next_victim(), None);
        assert_eq!(lru.bytes(), 60);
        lru.removed(&key('B'));
        assert_eq!(lru.bytes(), 0);
    }

    #[test]
    fn test_invalidation() {
        let cache = GlyphFieldCache::new(glyphs("AB"));
        let a = GlyphId::from('A');
        cache.get(a, params(8)).unwrap();
        cache.get(a, params(16)).unwrap();
        cache.get(GlyphId::from('B'), params(8)).unwrap();

        assert!(cache.invalidate(&FieldKey {
            glyph: GlyphId::from('B'),
            params: params(8),
        }));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.invalidate_glyph(a), 2);
        assert!(cache.is_empty());

        cache.get(a, params(8)).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().rasterizations, 4);
    }

    /// Blocks inside the provider until told to continue, then panics.
    struct PanickingProvider {
        release: Mutex<Receiver<()>>,
    }

    impl GlyphProvider for PanickingProvider {
        fn glyph(&self, _id: GlyphId) -> Option<Arc<Glyph>> {
            let _ = self.release.lock().unwrap().recv();
            panic!("outline decoder crashed");
        }
    }

    #[test]
    fn test_panic_wakes_waiters() {
        let (release, rx) = channel();
        let cache = Arc::new(GlyphFieldCache::new(PanickingProvider {
            release: Mutex::new(rx),
        }));
        let id = GlyphId::from('A');

        let leader = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get(id, params(8)))
        };
        while cache.stats().misses == 0 {
            thread::yield_now();
        }
        let waiter = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get(id, params(8)))
        };
        while cache.stats().coalesced == 0 {
            thread::yield_now();
        }

        release.send(()).unwrap();
        assert!(leader.join().is_err());
        assert!(matches!(
            waiter.join().unwrap(),
            Err(SdfGlyphError::RasterizationPanicked(panicked)) if panicked == id
        ));
        assert!(cache.is_empty());
    }
}
