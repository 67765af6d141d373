use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use spmc::{channel, Receiver, Sender};

use crate::contour::{Glyph, GlyphId};
use crate::field::{normalize_distance, DistanceField, FieldParams, FieldTransform, Resolution};
use crate::geometry::{Bounds, Point};
use crate::nearest::nearest_unchecked;
use crate::segment::Segment;
use crate::sign::SignResolver;
use crate::SdfGlyphError;

/// Tuning knobs for [`DistanceFieldRasterizer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterizerConfig {
    /// Number of worker threads in the rasterizer's pool; 0 uses one per
    /// logical CPU.
    pub threads: usize,

    /// Grid rows handed to a worker at a time.
    pub rows_per_job: usize,

    /// Wall-clock budget for one glyph. When it runs out the partial field
    /// is thrown away and [`SdfGlyphError::Timeout`] is returned.
    pub timeout: Option<Duration>,
}

impl Default for RasterizerConfig {
    fn default() -> Self {
        RasterizerConfig {
            threads: 0,
            rows_per_job: 8,
            timeout: None,
        }
    }
}

/// Computes distance fields from glyph outlines on a fixed pool of worker
/// threads.
///
/// The pool is started once, when the rasterizer is created, and is shared by
/// every clone of it; concurrent rasterizations queue their row bands on the
/// same workers instead of starting threads of their own. Every cell is
/// computed independently from the shared, read-only outline, so the output
/// does not depend on how rows are split between workers.
#[derive(Clone, Debug)]
pub struct DistanceFieldRasterizer {
    config: RasterizerConfig,
    pool: Arc<WorkerPool>,
}

impl Default for DistanceFieldRasterizer {
    /// The process-wide rasterizer with the default configuration. All
    /// defaults share one pool.
    fn default() -> Self {
        static SHARED: OnceLock<DistanceFieldRasterizer> = OnceLock::new();
        SHARED
            .get_or_init(|| DistanceFieldRasterizer::new(RasterizerConfig::default()))
            .clone()
    }
}

/// Read-only state shared by all jobs of one rasterization.
struct Sampler {
    glyph: GlyphId,
    segments: Vec<(Segment, Bounds)>,
    resolver: SignResolver,
    /// Cells outside this box are at least a band away from every segment.
    reach: Bounds,
    transform: FieldTransform,
    params: FieldParams,
    deadline: Option<Instant>,
    /// Set once the result is no longer wanted.
    abandoned: AtomicBool,
}

/// A band of consecutive rows. Finished bands are sent back as
/// `(first_row, values)`; abandoned ones are dropped.
struct Job {
    sampler: Arc<Sampler>,
    first_row: u32,
    rows: u32,
    results: mpsc::Sender<(u32, Vec<f64>)>,
}

/// Long-lived workers fed through an spmc queue. Dropping the pool sends one
/// `None` per worker and joins them.
struct WorkerPool {
    tx: Mutex<Sender<Option<Job>>>,
    workers: Vec<JoinHandle<()>>,
}

impl DistanceFieldRasterizer {
    /// Creates a rasterizer and starts its worker pool.
    #[must_use]
    pub fn new(config: RasterizerConfig) -> DistanceFieldRasterizer {
        let threads = match config.threads {
            0 => num_cpus::get(),
            n => n,
        };
        DistanceFieldRasterizer {
            config,
            pool: Arc::new(WorkerPool::start(threads)),
        }
    }

    #[must_use]
    pub fn config(&self) -> RasterizerConfig {
        self.config
    }

    /// Number of worker threads in the pool, fixed at construction.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.workers.len()
    }

    /// True when both rasterizers feed the same worker pool.
    #[must_use]
    pub fn shares_pool_with(&self, other: &DistanceFieldRasterizer) -> bool {
        Arc::ptr_eq(&self.pool, &other.pool)
    }

    /// Rasterizes `glyph` into a `params.resolution` grid, with distances
    /// saturating at `params.band` glyph units.
    ///
    /// A glyph without contours (e.g. a space) yields a field that is fully
    /// outside everywhere.
    pub fn rasterize(&self, glyph: &Glyph, params: FieldParams) -> Result<DistanceField, SdfGlyphError> {
        params.validate()?;
        let Some(bounds) = glyph.bounds() else {
            debug!("Glyph {} has no contours; using an empty field", glyph.id());
            return Ok(DistanceField::placeholder(params));
        };

        let started = Instant::now();
        let transform = FieldTransform::fit(bounds, params.band, params.resolution);
        let sampler = Arc::new(Sampler {
            glyph: glyph.id(),
            segments: glyph
                .segments()
                .map(|segment| (*segment, segment.control_bounds()))
                .collect(),
            resolver: SignResolver::new(glyph.contours()),
            reach: bounds.inflate(params.band),
            transform,
            params,
            deadline: self.config.timeout.map(|timeout| started + timeout),
            abandoned: AtomicBool::new(false),
        });

        let Resolution { width, height } = params.resolution;
        let rows_per_job = u32::try_from(self.config.rows_per_job.max(1)).unwrap_or(u32::MAX);
        debug!(
            "Rasterizing glyph {} ({} segments) at {width}x{height}, band {}, on {} thread(s)",
            glyph.id(),
            sampler.segments.len(),
            params.band,
            self.threads()
        );

        let (results, finished) = mpsc::channel();
        let mut pending = 0usize;
        for first_row in (0..height).step_by(rows_per_job as usize) {
            self.pool.submit(Job {
                sampler: Arc::clone(&sampler),
                first_row,
                rows: rows_per_job.min(height - first_row),
                results: results.clone(),
            });
            pending += 1;
        }
        drop(results);

        let mut values = vec![0.0; params.resolution.cells()];
        while pending > 0 {
            let received = match sampler.deadline {
                Some(deadline) => finished.recv_timeout(deadline.saturating_duration_since(Instant::now())),
                None => finished.recv().map_err(RecvTimeoutError::from),
            };
            match received {
                Ok((first_row, rows)) => {
                    let start = first_row as usize * width as usize;
                    values[start..start + rows.len()].copy_from_slice(&rows);
                    pending -= 1;
                }
                Err(RecvTimeoutError::Timeout) => return Err(self.timed_out(&sampler)),
                // Every job is gone without reporting: abandoned past the
                // deadline, or lost to a panic.
                Err(RecvTimeoutError::Disconnected) if sampler.expired() => {
                    return Err(self.timed_out(&sampler))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(SdfGlyphError::RasterizationPanicked(glyph.id()))
                }
            }
        }
        if sampler.expired() {
            return Err(self.timed_out(&sampler));
        }

        debug!("Rasterized glyph {} in {:?}", glyph.id(), started.elapsed());
        Ok(DistanceField::new(params, transform, values))
    }

    fn timed_out(&self, sampler: &Sampler) -> SdfGlyphError {
        sampler.abandoned.store(true, Ordering::Relaxed);
        let timeout = self.config.timeout.unwrap_or_default();
        warn!(
            "Rasterizing glyph {} exceeded its {timeout:?} deadline; discarding the field",
            sampler.glyph
        );
        SdfGlyphError::Timeout(timeout)
    }
}

impl WorkerPool {
    fn start(threads: usize) -> WorkerPool {
        let (tx, rx) = channel();
        let workers = (0..threads.max(1))
            .filter_map(|index| {
                let rx = rx.clone();
                thread::Builder::new()
                    .name(format!("sdf-raster-{index}"))
                    .spawn(move || work(rx))
                    .map_err(|e| warn!("Unable to start rasterizer worker {index}: {e}"))
                    .ok()
            })
            .collect();
        WorkerPool {
            tx: Mutex::new(tx),
            workers,
        }
    }

    /// Queues `job`, or runs it on the calling thread when no worker is
    /// available to take it.
    fn submit(&self, job: Job) {
        if self.workers.is_empty() {
            job.run();
            return;
        }
        let sent = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(Some(job));
        if let Err(spmc::SendError(Some(job))) = sent {
            job.run();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        {
            let mut tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
            for _ in 0..self.workers.len() {
                // Sentinel value to signal the end of the work pool for each thread
                let _ = tx.send(None);
            }
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.workers.len())
            .finish()
    }
}

fn work(rx: Receiver<Option<Job>>) {
    while let Ok(Some(job)) = rx.recv() {
        let glyph = job.sampler.glyph;
        // A panicking job drops its result sender, which the waiting caller
        // sees as a disconnect; the worker itself stays in the pool.
        if panic::catch_unwind(AssertUnwindSafe(|| job.run())).is_err() {
            warn!("Rasterizer worker panicked on glyph {glyph}");
        }
    }
}

impl Job {
    fn run(self) {
        let width = self.sampler.params.resolution.width as usize;
        let mut values = Vec::with_capacity(self.rows as usize * width);
        trace!("Glyph {} rows from {} ({} rows)", self.sampler.glyph, self.first_row, self.rows);
        for row in self.first_row..self.first_row + self.rows {
            if self.sampler.expired() {
                return;
            }
            self.sampler.fill_row(row, &mut values);
        }
        // The caller may already have given up; nothing to do then.
        let _ = self.results.send((self.first_row, values));
    }
}

impl Sampler {
    /// True once the result is no longer wanted, marking it so when the
    /// deadline has passed.
    fn expired(&self) -> bool {
        if self.abandoned.load(Ordering::Relaxed) {
            return true;
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            self.abandoned.store(true, Ordering::Relaxed);
            return true;
        }
        false
    }

    fn fill_row(&self, row: u32, values: &mut Vec<f64>) {
        let scanline = self.resolver.scanline(self.transform.row_y(row));
        for col in 0..self.params.resolution.width {
            let p = self.transform.cell_center(col, row);
            values.push(if self.reach.contains(p) {
                let inside = scanline.is_inside(p.x);
                normalize_distance(self.distance(p), inside, self.params.band)
            } else {
                1.0
            });
        }
    }

    /// Unsigned distance from `p` to the outline, capped at the band.
    fn distance(&self, p: Point) -> f64 {
        let mut best = self.params.band;
        for (segment, bounds) in &self.segments {
            if bounds.distance_to(p) >= best {
                continue;
            }
            best = best.min(nearest_unchecked(segment, p).distance);
        }
        best
    }
}

/// Rasterizes `glyph` with the shared default [`DistanceFieldRasterizer`].
pub fn rasterize(glyph: &Glyph, resolution: Resolution, band: f64) -> Result<DistanceField, SdfGlyphError> {
    DistanceFieldRasterizer::default().rasterize(glyph, FieldParams { resolution, band })
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use super::{rasterize, DistanceFieldRasterizer, RasterizerConfig};
    use crate::contour::{Glyph, GlyphId};
    use crate::field::{FieldParams, Resolution};
    use crate::fixtures::{letter_o, polygon};
    use crate::geometry::Point;
    use crate::SdfGlyphError;

    fn rasterizer(threads: usize, rows_per_job: usize) -> DistanceFieldRasterizer {
        DistanceFieldRasterizer::new(RasterizerConfig {
            threads,
            rows_per_job,
            timeout: None,
        })
    }

    #[test_log::test]
    fn test_letter_o_end_to_end() {
        let glyph = letter_o();
        let field = rasterize(&glyph, Resolution::new(64, 64), 4.0).unwrap();
        assert!(field.values().iter().all(|v| (-1.0..=1.0).contains(v)));

        // Corners are far outside the ring.
        for (col, row) in [(0, 0), (63, 0), (0, 63), (63, 63)] {
            assert_eq!(field.get(col, row), Some(1.0));
        }
        // The hole's centre is outside too.
        assert!(field.sample(Point::new(50.0, 50.0)) > 0.0);
        // The middle of the stroke (radius 25) is deep inside.
        assert!(field.sample(Point::new(75.0, 50.0)) < -0.9);
        assert!(field.sample(Point::new(50.0, 25.0)) < -0.9);

        // Along the middle row the sign flips once at each of the four edges,
        // each within a cell of the true outline.
        let transform = field.transform();
        let row = 32;
        let y = transform.row_y(row);
        let dy = y - 50.0;
        let outer = (30.0f64 * 30.0 - dy * dy).sqrt();
        let inner = (20.0f64 * 20.0 - dy * dy).sqrt();
        let expected = [50.0 - outer, 50.0 - inner, 50.0 + inner, 50.0 + outer];
        let mut flips = Vec::new();
        for col in 1..64 {
            let before = field.get(col - 1, row).unwrap();
            let after = field.get(col, row).unwrap();
            if (before < 0.0) != (after < 0.0) {
                flips.push(0.5 * (transform.cell_center(col - 1, row).x + transform.cell_center(col, row).x));
            }
        }
        assert_eq!(flips.len(), 4, "{flips:?}");
        let cell = 1.0 / transform.scale;
        for (flip, edge) in flips.iter().zip(expected) {
            assert!((flip - edge).abs() <= cell, "{flips:?} vs {expected:?}");
        }
    }

    #[test]
    fn test_deterministic_across_thread_counts() {
        let glyph = letter_o();
        let params = FieldParams::new(48, 40, 6.0).unwrap();
        let reference = rasterizer(1, 1000).rasterize(&glyph, params).unwrap();
        for (threads, rows) in [(1, 1), (2, 3), (4, 8), (0, 5)] {
            let field = rasterizer(threads, rows).rasterize(&glyph, params).unwrap();
            assert_eq!(field, reference, "threads={threads} rows={rows}");
        }
        let again = rasterizer(0, 8).rasterize(&glyph, params).unwrap();
        assert_eq!(again, reference);
    }

    #[test]
    fn test_empty_glyph_is_saturated() {
        let space = Glyph::new(GlyphId::from(' '), Vec::new(), 30.0);
        let field = rasterize(&space, Resolution::new(16, 16), 2.0).unwrap();
        assert!(field.values().iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_square_distances() {
        let square = Glyph::new(
            GlyphId(1),
            vec![polygon(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)])],
            10.0,
        );
        let field = rasterize(&square, Resolution::new(20, 20), 5.0).unwrap();
        // Padded bounds are 20 x 20, so one cell per glyph unit.
        let transform = field.transform();
        assert_eq!(transform.scale, 1.0);
        // Cell (7, 7) is centred on (2.5, 7.5): 2.5 inside the left edge.
        let p = transform.cell_center(7, 7);
        assert!(p.distance(Point::new(2.5, 7.5)) < 1e-12);
        assert!((field.get(7, 7).unwrap() + 0.5).abs() < 1e-12);
        // Cell (3, 7) is centred on (-1.5, 7.5): 1.5 outside.
        assert!((field.get(3, 7).unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_params() {
        let glyph = letter_o();
        assert!(matches!(
            rasterize(&glyph, Resolution::new(16, 16), -1.0),
            Err(SdfGlyphError::InvalidBand(_))
        ));
        assert!(matches!(
            rasterize(&glyph, Resolution::new(16, 0), 1.0),
            Err(SdfGlyphError::InvalidResolution(16, 0))
        ));
    }

    #[test_log::test]
    fn test_timeout_discards_field() {
        let rasterizer = DistanceFieldRasterizer::new(RasterizerConfig {
            timeout: Some(Duration::ZERO),
            ..RasterizerConfig::default()
        });
        let params = FieldParams::new(64, 64, 4.0).unwrap();
        assert!(matches!(
            rasterizer.rasterize(&letter_o(), params),
            Err(SdfGlyphError::Timeout(d)) if d == Duration::ZERO
        ));

        let generous = DistanceFieldRasterizer::new(RasterizerConfig {
            timeout: Some(Duration::from_secs(60)),
            ..RasterizerConfig::default()
        });
        assert!(generous.rasterize(&letter_o(), params).is_ok());
    }

    #[test]
    fn test_deadline_interrupts_a_running_band() {
        // One worker and one band covering the whole grid: the deadline can only
        // be noticed while the band is being computed.
        let rasterizer = DistanceFieldRasterizer::new(RasterizerConfig {
            threads: 1,
            rows_per_job: 512,
            timeout: Some(Duration::from_millis(5)),
        });
        let params = FieldParams::new(512, 512, 40.0).unwrap();
        let started = Instant::now();
        let result = rasterizer.rasterize(&letter_o(), params);
        assert!(
            matches!(result, Err(SdfGlyphError::Timeout(d)) if d == Duration::from_millis(5)),
            "{:?}",
            result.map(|field| field.width())
        );
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_clones_share_one_pool() {
        let rasterizer = rasterizer(2, 4);
        assert_eq!(rasterizer.threads(), 2);
        let glyph = letter_o();
        let params = FieldParams::new(32, 32, 4.0).unwrap();
        let reference = rasterizer.rasterize(&glyph, params).unwrap();

        // Eight glyphs at once still run on the same two workers.
        thread::scope(|scope| {
            for _ in 0..8 {
                let clone = rasterizer.clone();
                assert!(clone.shares_pool_with(&rasterizer));
                let (glyph, reference) = (&glyph, &reference);
                scope.spawn(move || {
                    assert_eq!(&clone.rasterize(glyph, params).unwrap(), reference);
                    assert_eq!(clone.threads(), 2);
                });
            }
        });

        assert!(DistanceFieldRasterizer::default().shares_pool_with(&DistanceFieldRasterizer::default()));
        assert!(!rasterizer.shares_pool_with(&DistanceFieldRasterizer::default()));
    }
}
