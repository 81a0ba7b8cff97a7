use std::error::Error;
use std::thread;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use tessel_cells::{Cell, CellId, CellRegistry};
use tessel_geom::{Bounds3, Offset3};
use tessel_runtime::{
    IsType, ScanError, ScanRequest, ScanScheduler, ScanTicket, SchedulerConfig, TargetArena,
    TargetId,
};
use tessel_structures::StructurePattern;
use tessel_world::{ChunkedWorld, SharedWorld, WorldGen};

use crate::config::HostConfig;
use crate::event::{Event, EventEnvelope, EventQueue};
use crate::relay::{Relay, Transition, build_structure};

#[derive(Clone, Copy, Debug, Default)]
pub struct SimStats {
    pub ticks: u64,
    pub edits: usize,
    pub submitted: usize,
    pub applied: usize,
    pub stale: usize,
    pub cancelled: usize,
    pub failed: usize,
    pub completed: usize,
    pub broken: usize,
}

/// One partner scan on behalf of a relay.
#[derive(Clone, Copy, Debug)]
struct ScanJob {
    relay: TargetId,
    origin: Offset3,
    partner: CellId,
    radius: i32,
}

/// Submit `job`. When its result moves the relay's link, every relay in
/// `neighbors` is rescanned once from inside the handler.
fn submit_partner_scan(
    sched: &ScanScheduler<Relay>,
    job: ScanJob,
    neighbors: Vec<ScanJob>,
) -> Result<ScanTicket, ScanError> {
    let req = ScanRequest::new(job.origin, job.radius, IsType(job.partner));
    sched.submit(req, job.relay, move |relay: &mut Relay, outcome, sched| {
        if !relay.apply_scan(outcome) {
            return;
        }
        for n in &neighbors {
            if let Err(e) = submit_partner_scan(sched, *n, Vec::new()) {
                log::warn!(target: "relay", "neighbor rescan for {:?} rejected: {e}", n.relay);
            }
        }
    })
}

pub struct Sim {
    reg: CellRegistry,
    world: SharedWorld,
    relays: TargetArena<Relay>,
    by_name: HashMap<String, TargetId>,
    scheduler: ScanScheduler<Relay>,
    events: EventQueue,
    radius: i32,
    rescan_interval: u64,
    stats: SimStats,
}

impl Sim {
    pub fn new(cfg: &HostConfig, reg: CellRegistry) -> Result<Self, Box<dyn Error>> {
        if cfg.world.chunk_size <= 0 {
            return Err(format!("world.chunk_size must be positive, got {}", cfg.world.chunk_size).into());
        }
        if cfg.world.load_radius < 0 {
            return Err(format!("world.load_radius must not be negative, got {}", cfg.world.load_radius).into());
        }
        let mut world = ChunkedWorld::new(cfg.world.chunk_size);
        let area = Bounds3::cube(Offset3::ZERO, cfg.world.load_radius);
        let loaded = world.load_region(area);
        let generated = WorldGen::new(&cfg.world.worldgen, &reg)?.populate_region(&mut world, area);
        log::info!("world: {} chunk(s) resident, {} generated", loaded, generated);

        let mut presets: HashMap<&str, StructurePattern> = HashMap::new();
        for (name, def) in &cfg.presets {
            presets.insert(name.as_str(), build_structure(name, def, &reg)?);
        }

        let mut relays = TargetArena::new();
        let mut by_name = HashMap::new();
        for def in &cfg.relays {
            let structure = presets
                .get(def.preset.as_str())
                .cloned()
                .ok_or_else(|| format!("relay {}: unknown preset {:?}", def.name, def.preset))?;
            let relay = Relay::from_def(def, structure, &reg)?;
            if def.prebuilt {
                relay.build(&mut world)?;
            } else {
                world.set(relay.pos, relay.core)?;
            }
            if by_name.insert(def.name.clone(), relays.insert(relay)).is_some() {
                return Err(format!("duplicate relay name {:?}", def.name).into());
            }
        }

        let world = SharedWorld::new(world);
        let scheduler = ScanScheduler::new(
            world.reader(),
            SchedulerConfig {
                workers: cfg.scan.workers,
                drain_budget: cfg.scan.drain_budget,
            },
        )?;
        log::info!(
            "{} relay(s), scan radius {}, {} scan worker(s)",
            relays.len(),
            cfg.scan.radius,
            scheduler.workers()
        );
        let mut sim = Self {
            reg,
            world,
            relays,
            by_name,
            scheduler,
            events: EventQueue::new(),
            radius: cfg.scan.radius,
            rescan_interval: cfg.rescan_interval.max(1),
            stats: SimStats::default(),
        };
        for e in &cfg.edits {
            let cell = sim
                .reg
                .cell(&e.cell)
                .ok_or_else(|| format!("edit at tick {}: unknown cell {:?}", e.tick, e.cell))?;
            let [x, y, z] = e.pos;
            sim.emit_at(e.tick, Event::SetCell { pos: Offset3::new(x, y, z), cell });
        }
        for b in &cfg.builds {
            sim.emit_at(b.tick, Event::PlaceStructure { relay: b.relay.clone() });
        }
        for r in &cfg.removals {
            sim.emit_at(r.tick, Event::RemoveRelay { relay: r.relay.clone() });
        }
        Ok(sim)
    }

    pub fn tick(&self) -> u64 {
        self.events.now
    }

    #[allow(dead_code)]
    pub fn stats(&self) -> SimStats {
        self.stats
    }

    pub fn world(&self) -> &SharedWorld {
        &self.world
    }

    #[allow(dead_code)]
    pub fn relay(&self, name: &str) -> Option<&Relay> {
        self.by_name.get(name).and_then(|id| self.relays.get(*id))
    }

    pub fn relays(&self) -> impl Iterator<Item = &Relay> + '_ {
        self.relays.iter().map(|(_, r)| r)
    }

    /// Scripted events not yet applied.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn emit_at(&mut self, tick: u64, event: Event) -> u64 {
        self.events.emit_at(tick, event)
    }

    /// Apply scripted edits, re-evaluate relays, queue scans, apply ready
    /// results.
    pub fn step(&mut self) {
        let tick = self.events.now;
        while let Some(env) = self.events.pop_ready() {
            self.apply_event(env);
        }

        let reader = self.world.reader();
        let mut due: Vec<ScanJob> = Vec::new();
        for (id, relay) in self.relays.iter_mut() {
            let transition = relay.evaluate(&reader);
            match transition {
                Transition::Completed => self.stats.completed += 1,
                Transition::Broken => self.stats.broken += 1,
                Transition::Unchanged => {}
            }
            let rescan = tick % self.rescan_interval == 0;
            if relay.complete && (transition == Transition::Completed || rescan) {
                due.push(ScanJob {
                    relay: id,
                    origin: relay.pos,
                    partner: relay.partner,
                    radius: self.radius,
                });
            }
        }
        for job in &due {
            let neighbors = self.neighbors_of(job);
            match submit_partner_scan(&self.scheduler, *job, neighbors) {
                Ok(_) => self.stats.submitted += 1,
                Err(e) => log::warn!(target: "relay", "[tick {}] scan rejected: {e}", tick),
            }
        }

        let st = self.scheduler.drain(&mut self.relays);
        self.stats.applied += st.applied;
        self.stats.stale += st.stale;
        self.stats.cancelled += st.cancelled;
        self.stats.failed += st.failed;
        if st.drained > 0 {
            let (queued, inflight, ready) = self.scheduler.queue_debug_counts();
            log::debug!(
                target: "scan",
                "[tick {}] drained {} (stale {}, cancelled {}) q={} inflight={} ready={}",
                tick,
                st.drained,
                st.stale,
                st.cancelled,
                queued,
                inflight,
                ready
            );
        }
        self.stats.ticks += 1;
        self.events.advance_tick();
    }

    pub fn run(&mut self, ticks: u64, tick_ms: u64) {
        for _ in 0..ticks {
            self.step();
            if tick_ms > 0 {
                thread::sleep(Duration::from_millis(tick_ms));
            }
        }
    }

    /// Keep draining until no scans are outstanding or `timeout` passes.
    /// Returns true when everything settled.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.scheduler.pending() > 0 {
            if Instant::now() >= deadline {
                log::warn!(target: "scan", "{} scan(s) still pending", self.scheduler.pending());
                return false;
            }
            let st = self.scheduler.drain(&mut self.relays);
            self.stats.applied += st.applied;
            self.stats.stale += st.stale;
            self.stats.cancelled += st.cancelled;
            self.stats.failed += st.failed;
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    /// Close the world; scans still running fail instead of reading on.
    pub fn shutdown(mut self) -> SimStats {
        self.world.close();
        self.settle(Duration::from_secs(2));
        self.stats
    }

    // Complete relays whose cores lie inside this job's scan cube.
    fn neighbors_of(&self, job: &ScanJob) -> Vec<ScanJob> {
        self.relays
            .iter()
            .filter(|(id, r)| {
                *id != job.relay
                    && r.complete
                    && r.pos.chebyshev(job.origin) <= i64::from(job.radius)
            })
            .map(|(id, r)| ScanJob {
                relay: id,
                origin: r.pos,
                partner: r.partner,
                radius: self.radius,
            })
            .collect()
    }

    fn apply_event(&mut self, env: EventEnvelope) {
        let (id, tick) = (env.id, env.tick);
        match env.kind {
            Event::SetCell { pos, cell } => {
                let res = self.world.write().and_then(|mut w| w.set(pos, cell));
                match res {
                    Ok(()) => {
                        self.stats.edits += 1;
                        log::debug!(
                            target: "events",
                            "[tick {}] #{} SetCell {:?} = {}",
                            tick,
                            id,
                            pos,
                            self.reg.name_of(cell)
                        );
                    }
                    Err(e) => log::warn!(target: "events", "[tick {}] SetCell {:?} failed: {e}", tick, pos),
                }
            }
            Event::PlaceStructure { relay } => {
                let Some(r) = self.by_name.get(&relay).and_then(|id| self.relays.get(*id)) else {
                    log::warn!(target: "events", "[tick {}] PlaceStructure: no relay {relay:?}", tick);
                    return;
                };
                match self.world.write().and_then(|mut w| r.build(&mut *w)) {
                    Ok(n) => log::info!(target: "events", "[tick {}] placed {relay} ({n} cells)", tick),
                    Err(e) => log::warn!(target: "events", "[tick {}] placing {relay} failed: {e}", tick),
                }
            }
            Event::RemoveRelay { relay } => {
                let Some(id) = self.by_name.remove(&relay) else {
                    log::warn!(target: "events", "[tick {}] RemoveRelay: no relay {relay:?}", tick);
                    return;
                };
                let cancelled = self.scheduler.cancel_for(id);
                if let Some(r) = self.relays.remove(id) {
                    // The core and its tile go with the relay so partners stop seeing it.
                    let res = self.world.write().and_then(|mut w| {
                        w.remove_tile(r.pos);
                        w.set(r.pos, Cell::EMPTY)
                    });
                    if let Err(e) = res {
                        log::warn!(target: "events", "[tick {}] clearing core of {relay} failed: {e}", tick);
                    }
                }
                log::info!(
                    target: "events",
                    "[tick {}] removed relay {relay}, {cancelled} scan(s) cancelled",
                    tick
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CELLS: &str = r#"
        [[cells]]
        name = "stone"
        [[cells]]
        name = "core"
        tags = ["relay"]
        [[cells]]
        name = "frame"
        [[cells]]
        name = "lamp"
        states = ["off", "lit"]
    "#;

    const HOST: &str = r##"
        ticks = 12
        rescan_interval = 4

        [world]
        chunk_size = 8
        load_radius = 16

        [scan]
        radius = 8
        workers = 2

        [presets.mast]
        legend = { "#" = "frame", "L" = "lamp:lit" }
        layers = [["#@#"], [".L."]]

        [[relay]]
        name = "west"
        pos = [-3, 0, 0]
        preset = "mast"
        partner = "core"
        prebuilt = true

        [[relay]]
        name = "east"
        pos = [3, 0, 0]
        preset = "mast"
        partner = "core"
        prebuilt = true

        [[relay]]
        name = "far"
        pos = [3, 0, 8]
        preset = "mast"
        partner = "core"
    "##;

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn sim() -> Sim {
        init_logs();
        let cfg = HostConfig::from_toml_str(HOST).unwrap();
        let reg = CellRegistry::from_toml_str(CELLS).unwrap();
        Sim::new(&cfg, reg).unwrap()
    }

    fn new_err(host: &str) -> String {
        let cfg = HostConfig::from_toml_str(host).unwrap();
        let reg = CellRegistry::from_toml_str(CELLS).unwrap();
        match Sim::new(&cfg, reg) {
            Ok(_) => panic!("config was accepted"),
            Err(e) => e.to_string(),
        }
    }

    #[test]
    fn bad_world_dimensions_are_config_errors() {
        init_logs();
        let zero = HOST.replace("chunk_size = 8", "chunk_size = 0");
        assert!(new_err(&zero).contains("chunk_size"));
        let negative = HOST.replace("load_radius = 16", "load_radius = -1");
        assert!(new_err(&negative).contains("load_radius"));
    }

    fn step_settled(sim: &mut Sim) {
        sim.step();
        assert!(sim.settle(Duration::from_secs(10)));
    }

    #[test]
    fn prebuilt_relays_link_to_each_other() {
        let mut sim = sim();
        step_settled(&mut sim);
        let west = sim.relay("west").unwrap();
        let east = sim.relay("east").unwrap();
        assert!(west.complete && east.complete);
        assert_eq!(west.link.map(|l| l.pos), Some(Offset3::new(3, 0, 0)));
        assert_eq!(east.link.map(|l| l.pos), Some(Offset3::new(-3, 0, 0)));
        // Only its core was placed, so the far relay never scans.
        let far = sim.relay("far").unwrap();
        assert!(!far.complete);
        assert_eq!(far.incomplete_level, Some(0));
        assert_eq!(far.scans_applied, 0);
        assert_eq!(sim.stats().completed, 2);
    }

    #[test]
    fn breaking_a_structure_drops_its_link() {
        let mut sim = sim();
        step_settled(&mut sim);
        // East's lamp sits at (3,1,0); knock it out.
        let t = sim.tick();
        sim.emit_at(t, Event::SetCell { pos: Offset3::new(3, 1, 0), cell: Cell::EMPTY });
        step_settled(&mut sim);
        let east = sim.relay("east").unwrap();
        assert!(!east.complete);
        assert_eq!(east.incomplete_level, Some(1));
        assert_eq!(east.link, None);
        assert_eq!(sim.stats().broken, 1);
        assert_eq!(sim.stats().edits, 1);
    }

    #[test]
    fn removal_moves_the_partner_link() {
        let mut sim = sim();
        step_settled(&mut sim);
        let t = sim.tick();
        sim.emit_at(t, Event::RemoveRelay { relay: "east".into() });
        while sim.tick() <= 4 {
            step_settled(&mut sim);
        }
        assert!(sim.relay("east").is_none());
        assert!(sim.world().read().unwrap().tile(Offset3::new(3, 0, 0)).is_none());
        // With east gone the closest core left in range is far's.
        let west = sim.relay("west").unwrap();
        assert_eq!(west.link.map(|l| l.pos), Some(Offset3::new(3, 0, 8)));
        assert_eq!(west.link_changes, 2);
    }

    #[test]
    fn completing_a_structure_links_it() {
        let mut sim = sim();
        step_settled(&mut sim);
        let t = sim.tick();
        sim.emit_at(t, Event::PlaceStructure { relay: "far".into() });
        step_settled(&mut sim);
        let far = sim.relay("far").unwrap();
        assert!(far.complete);
        assert_eq!(far.link.map(|l| l.pos), Some(Offset3::new(3, 0, 0)));
        let tile = sim.world().read().unwrap().tile(Offset3::new(3, 0, 8)).cloned();
        assert_eq!(tile.map(|t| t.tag), Some("relay".to_string()));
    }

    #[test]
    fn settle_reports_a_timeout() {
        let mut sim = sim();
        sim.step();
        let queued = sim.scheduler.pending();
        assert_eq!(sim.settle(Duration::ZERO), queued == 0);
        assert!(sim.settle(Duration::from_secs(10)));
        assert_eq!(sim.scheduler.pending(), 0);
    }

    #[test]
    fn shutdown_settles() {
        let mut sim = sim();
        sim.run(3, 0);
        let stats = sim.shutdown();
        assert_eq!(stats.ticks, 3);
        assert!(stats.submitted >= 2);
        // Handler-driven neighbor rescans come on top of direct submissions.
        assert!(stats.applied + stats.stale + stats.cancelled >= stats.submitted);
    }
}
