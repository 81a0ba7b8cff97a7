//! Off-thread scans with results applied on the caller's thread.
//!
//! `submit` hands a scan to a rayon pool and returns at once. Workers push
//! completions onto a crossbeam queue; the host calls [`ScanScheduler::drain`]
//! once per tick, which resolves each completion's target and runs its
//! handler there. Workers never touch requester state.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, unbounded};
use hashbrown::HashMap;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tessel_geom::Offset3;
use tessel_structures::Pattern;
use tessel_world::CellSource;

use crate::discover::{BlockDiscoverer, CancelFlag, Nearest, ScanError, nearest};
use crate::predicate::CellPredicate;
use crate::targets::{ScanTargets, TargetId};

#[derive(Clone)]
pub struct ScanRequest {
    pub origin: Offset3,
    pub radius: i32,
    pub predicate: Arc<dyn CellPredicate>,
    /// Ignore the origin cell when picking the nearest candidate.
    pub skip_origin: bool,
}

impl ScanRequest {
    pub fn new<P: CellPredicate + 'static>(origin: Offset3, radius: i32, predicate: P) -> Self {
        Self {
            origin,
            radius,
            predicate: Arc::new(predicate),
            skip_origin: true,
        }
    }

    pub fn include_origin(mut self) -> Self {
        self.skip_origin = false;
        self
    }
}

#[derive(Clone, Debug)]
pub struct ScanReport {
    pub origin: Offset3,
    pub radius: i32,
    pub candidates: Pattern,
    pub nearest: Option<Nearest>,
    pub elapsed_ms: u32,
}

pub type ScanOutcome = Result<ScanReport, ScanError>;

type Handler<T> = Box<dyn FnOnce(&mut T, ScanOutcome, &ScanScheduler<T>) + Send>;

struct Completion<T> {
    id: u64,
    target: TargetId,
    outcome: ScanOutcome,
    cancel: CancelFlag,
    handler: Handler<T>,
}

/// Handle for one submitted scan.
#[derive(Clone, Debug)]
pub struct ScanTicket {
    id: u64,
    cancel: CancelFlag,
}

impl ScanTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop the scan at its next layer boundary and drop its result. The
    /// handler never runs for a cancelled scan.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[derive(Clone, Debug, Default)]
pub struct SchedulerConfig {
    /// Worker threads; 0 picks the machine's parallelism.
    pub workers: usize,
    /// Most completions applied per drain; `None` drains everything ready.
    pub drain_budget: Option<usize>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub drained: usize,
    pub applied: usize,
    pub stale: usize,
    pub cancelled: usize,
    pub failed: usize,
}

struct Inner<T> {
    pool: ThreadPool,
    world: Arc<dyn CellSource>,
    tx: Sender<Completion<T>>,
    rx: Receiver<Completion<T>>,
    q_scan: Arc<AtomicUsize>,
    inflight: Arc<AtomicUsize>,
    pending: AtomicUsize,
    next_id: AtomicU64,
    tickets: Mutex<HashMap<u64, (TargetId, CancelFlag)>>,
    drain_budget: Option<usize>,
    workers: usize,
}

pub struct ScanScheduler<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ScanScheduler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> ScanScheduler<T> {
    pub fn new<W: CellSource + 'static>(world: W, cfg: SchedulerConfig) -> Result<Self, ScanError> {
        let workers = if cfg.workers == 0 {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            cfg.workers
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tessel-scan-{i}"))
            .build()
            .map_err(|e| ScanError::Pool(e.to_string()))?;
        let (tx, rx) = unbounded::<Completion<T>>();
        log::debug!(target: "scan", "scan pool up: {workers} workers, budget {:?}", cfg.drain_budget);
        Ok(Self {
            inner: Arc::new(Inner {
                pool,
                world: Arc::new(world),
                tx,
                rx,
                q_scan: Arc::new(AtomicUsize::new(0)),
                inflight: Arc::new(AtomicUsize::new(0)),
                pending: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
                tickets: Mutex::new(HashMap::new()),
                drain_budget: cfg.drain_budget,
                workers,
            }),
        })
    }

    pub fn workers(&self) -> usize {
        self.inner.workers
    }

    /// Queue a scan for `target`. Returns before the predicate has run; the
    /// handler runs later inside [`drain`](Self::drain), on the draining
    /// thread, and only if `target` still resolves there.
    pub fn submit<F>(&self, request: ScanRequest, target: TargetId, on_complete: F) -> Result<ScanTicket, ScanError>
    where
        F: FnOnce(&mut T, ScanOutcome, &ScanScheduler<T>) + Send + 'static,
    {
        let discoverer = BlockDiscoverer::new(request.radius)?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancelFlag::new();
        self.tickets().insert(id, (target, cancel.clone()));

        let world = Arc::clone(&self.inner.world);
        let tx = self.inner.tx.clone();
        let q_scan = Arc::clone(&self.inner.q_scan);
        let inflight = Arc::clone(&self.inner.inflight);
        let flag = cancel.clone();
        let handler: Handler<T> = Box::new(on_complete);

        self.inner.pending.fetch_add(1, Ordering::Relaxed);
        q_scan.fetch_add(1, Ordering::Relaxed);
        self.inner.pool.spawn(move || {
            q_scan.fetch_sub(1, Ordering::Relaxed);
            inflight.fetch_add(1, Ordering::Relaxed);
            let t0 = Instant::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                discoverer.scan_with_cancel(world.as_ref(), request.origin, request.predicate.as_ref(), &flag)
            }))
            .unwrap_or(Err(ScanError::Panicked))
            .map(|candidates| ScanReport {
                origin: request.origin,
                radius: request.radius,
                nearest: nearest(&candidates, request.skip_origin),
                candidates,
                elapsed_ms: t0.elapsed().as_millis().min(u128::from(u32::MAX)) as u32,
            });
            inflight.fetch_sub(1, Ordering::Relaxed);
            // Receiver lives in the scheduler; a failed send means it is gone.
            let _ = tx.send(Completion {
                id,
                target,
                outcome,
                cancel: flag,
                handler,
            });
        });
        log::trace!(target: "scan", "submitted scan #{id} at {:?} r={}", request.origin, request.radius);
        Ok(ScanTicket { id, cancel })
    }

    /// Apply ready completions to their targets.
    ///
    /// Takes only what is already queued when called (capped by the drain
    /// budget), so scans submitted from handlers are picked up next time.
    pub fn drain<S>(&self, targets: &mut S) -> DrainStats
    where
        S: ScanTargets<Target = T> + ?Sized,
    {
        let mut stats = DrainStats::default();
        let mut limit = self.inner.rx.len();
        if let Some(budget) = self.inner.drain_budget {
            limit = limit.min(budget);
        }
        while stats.drained < limit {
            let Ok(done) = self.inner.rx.try_recv() else {
                break;
            };
            stats.drained += 1;
            self.inner.pending.fetch_sub(1, Ordering::Relaxed);
            self.tickets().remove(&done.id);

            if done.cancel.is_cancelled() {
                stats.cancelled += 1;
                log::trace!(target: "scan", "scan #{} cancelled, result dropped", done.id);
                continue;
            }
            let Some(target) = targets.target_mut(done.target) else {
                stats.stale += 1;
                log::trace!(target: "scan", "scan #{} target {:?} gone", done.id, done.target);
                continue;
            };
            match &done.outcome {
                Ok(report) => log::debug!(
                    target: "scan",
                    "scan #{} done: {} candidates, nearest {:?}, {}ms",
                    done.id,
                    report.candidates.len(),
                    report.nearest.map(|n| n.offset),
                    report.elapsed_ms
                ),
                Err(e) => {
                    stats.failed += 1;
                    log::warn!(target: "scan", "scan #{} failed: {e}", done.id);
                }
            }
            (done.handler)(target, done.outcome, self);
            stats.applied += 1;
        }
        stats
    }

    /// Cancel every outstanding scan submitted for `target`.
    pub fn cancel_for(&self, target: TargetId) -> usize {
        let tickets = self.tickets();
        let mut n = 0;
        for (t, flag) in tickets.values() {
            if *t == target && !flag.is_cancelled() {
                flag.cancel();
                n += 1;
            }
        }
        n
    }

    /// Scans submitted but not yet drained.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Relaxed)
    }

    /// (queued, in flight, ready to drain)
    pub fn queue_debug_counts(&self) -> (usize, usize, usize) {
        (
            self.inner.q_scan.load(Ordering::Relaxed),
            self.inner.inflight.load(Ordering::Relaxed),
            self.inner.rx.len(),
        )
    }

    fn tickets(&self) -> MutexGuard<'_, HashMap<u64, (TargetId, CancelFlag)>> {
        // Only plain inserts/removes happen under this lock.
        self.inner
            .tickets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
