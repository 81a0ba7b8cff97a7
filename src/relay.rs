//! Relays: multi-cell structures that look for a partner cell nearby.
//!
//! A relay sits on a core cell. Once the structure around it is complete it
//! periodically scans for its partner type and links to the nearest hit.

use std::error::Error;
use std::sync::Arc;

use tessel_cells::{Cell, CellDescriptor, CellId, CellRegistry};
use tessel_geom::Offset3;
use tessel_runtime::{ScanOutcome, ScanTarget};
use tessel_structures::{PatternBuilder, StructurePattern, TileContext, TileHook};
use tessel_world::{CellSink, CellSource, TileData, WorldError};

use crate::config::{PresetDef, RelayDef};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Link {
    pub pos: Offset3,
    pub distance: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Completed,
    Broken,
}

pub struct Relay {
    pub name: String,
    pub pos: Offset3,
    pub core: Cell,
    pub partner: CellId,
    pub structure: StructurePattern,
    pub complete: bool,
    pub incomplete_level: Option<i32>,
    pub link: Option<Link>,
    pub link_changes: usize,
    pub scans_applied: usize,
}

impl ScanTarget for Relay {
    // A broken relay ignores results that were in flight when it broke.
    fn is_live(&self) -> bool {
        self.complete
    }
}

/// Build a preset's structure. The origin symbol is the relay core and is
/// exempt from checks; placing the structure stamps a `relay` tile there.
pub fn build_structure(
    name: &str,
    preset: &PresetDef,
    reg: &CellRegistry,
) -> Result<StructurePattern, Box<dyn Error>> {
    let mut legend: Vec<(char, CellDescriptor)> = Vec::with_capacity(preset.legend.len());
    for (sym, spec) in &preset.legend {
        let d = reg
            .descriptor(spec)
            .ok_or_else(|| format!("preset {name}: unknown cell {spec:?} for {sym:?}"))?;
        legend.push((*sym, d));
    }
    let cells = preset.layers.iter().map(|l| l.len()).sum::<usize>();
    let stamp: TileHook = Arc::new(move |ctx: &mut TileContext<'_>| {
        ctx.attach(TileData::new("relay").with("rows", cells as i64))
    });
    let pattern = PatternBuilder::new()
        .layout(&preset.layers, &legend, preset.origin)?
        .tile(Offset3::ZERO, stamp)
        .build()?;
    Ok(StructurePattern::new(pattern)?)
}

impl Relay {
    pub fn from_def(
        def: &RelayDef,
        structure: StructurePattern,
        reg: &CellRegistry,
    ) -> Result<Self, Box<dyn Error>> {
        let partner = reg
            .id_by_name(&def.partner)
            .ok_or_else(|| format!("relay {}: unknown partner {:?}", def.name, def.partner))?;
        let core = reg
            .cell(&def.core)
            .ok_or_else(|| format!("relay {}: unknown core {:?}", def.name, def.core))?;
        Ok(Self {
            name: def.name.clone(),
            pos: def.position(),
            core,
            partner,
            structure,
            complete: false,
            incomplete_level: None,
            link: None,
            link_changes: 0,
            scans_applied: 0,
        })
    }

    /// Write the core and the full structure around it.
    pub fn build<W: CellSink + CellSource>(&self, world: &mut W) -> Result<usize, WorldError> {
        let n = self.structure.place(world, self.pos)?;
        world.set_cell(self.pos, self.core)?;
        Ok(n + 1)
    }

    /// Re-check completeness level by level, bottom up.
    pub fn evaluate<W: CellSource + ?Sized>(&mut self, world: &W) -> Transition {
        let core_ok = world.cell_at(self.pos).cell().is_some_and(|c| c.id == self.core.id);
        let level = if core_ok {
            self.structure.first_incomplete_level(world, self.pos)
        } else {
            Some(0)
        };
        self.incomplete_level = level;
        let now_complete = level.is_none();
        if now_complete == self.complete {
            return Transition::Unchanged;
        }
        self.complete = now_complete;
        if now_complete {
            log::info!(target: "relay", "{} complete at {:?}", self.name, self.pos);
            Transition::Completed
        } else {
            let p = self.structure.progress(world, self.pos);
            log::info!(
                target: "relay",
                "{} broken: level {:?} incomplete ({}/{} cells)",
                self.name,
                level,
                p.satisfied,
                p.required
            );
            if self.link.take().is_some() {
                self.link_changes += 1;
            }
            Transition::Broken
        }
    }

    /// Fold a partner scan into this relay. True when the link moved.
    pub fn apply_scan(&mut self, outcome: ScanOutcome) -> bool {
        self.scans_applied += 1;
        let report = match outcome {
            Ok(r) => r,
            Err(e) => {
                log::warn!(target: "relay", "{} scan failed: {e}", self.name);
                return false;
            }
        };
        let next = report.nearest.map(|n| Link {
            pos: report.origin + n.offset,
            distance: n.distance(),
        });
        if next.map(|l| l.pos) == self.link.map(|l| l.pos) {
            return false;
        }
        match next {
            Some(l) => log::info!(
                target: "relay",
                "{} linked to {:?} ({:.2} away, {} candidates)",
                self.name,
                l.pos,
                l.distance,
                report.candidates.len()
            ),
            None => log::info!(target: "relay", "{} lost its link", self.name),
        }
        self.link = next;
        self.link_changes += 1;
        true
    }
}
