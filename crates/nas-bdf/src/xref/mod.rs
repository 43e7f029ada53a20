//! Staged cross-reference resolver.
//!
//! Categories are linked in a fixed order, each stage relying on the ones
//! before it. Stages that only attach handles (elements, properties, masses,
//! materials, loads) tolerate per-entity failures: the entity is left
//! unlinked, the failure goes to [`XrefErrorLog`] and its siblings still
//! resolve. Stages that establish invariants for later stages (coordinates,
//! nodes, node/element linkage, aero, constraints, sets, optimization) stop
//! the pass on the first failure.

mod log;
mod options;

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

pub use log::{Overflow, XrefErrorLog, XrefErrorRecord};
pub use options::{OverflowPolicy, XrefOptions};

use crate::collection::{Arena, Card, Handle};
use crate::constraints::{MpcAdd, SpcAdd};
use crate::coords::Coord;
use crate::elements::Element;
use crate::error::{EntityRef, StructuralError};
use crate::model::Model;
use crate::nodes::{NodeRef, SpointIndex};
use crate::resolvable::{FinalizeGeometry, FrameTable, Resolvable};

/// Resolution stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Coordinates,
    Nodes,
    Elements,
    NodeElementLinkage,
    Properties,
    Masses,
    Materials,
    Aero,
    Constraints,
    Loads,
    Sets,
    Optimization,
}

impl Stage {
    /// Whether per-entity failures are logged instead of stopping the pass
    pub fn is_tolerant(self) -> bool {
        matches!(
            self,
            Stage::Elements | Stage::Properties | Stage::Masses | Stage::Materials | Stage::Loads
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Coordinates => "coordinates",
            Stage::Nodes => "nodes",
            Stage::Elements => "elements",
            Stage::NodeElementLinkage => "node/element linkage",
            Stage::Properties => "properties",
            Stage::Masses => "masses",
            Stage::Materials => "materials",
            Stage::Aero => "aero",
            Stage::Constraints => "constraints",
            Stage::Loads => "loads",
            Stage::Sets => "sets",
            Stage::Optimization => "optimization",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fatal outcome of a cross-reference pass
#[derive(Error, Debug, Clone, PartialEq)]
pub enum XrefError {
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: StructuralError,
    },

    #[error("broken node/element linkage in {element}: {message}")]
    BrokenLinkage { element: EntityRef, message: String },

    #[error("too many cross-reference errors ({total} > {limit})")]
    TooManyErrors { total: usize, limit: usize },
}

impl XrefError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            XrefError::Stage { stage, .. } => Some(*stage),
            XrefError::BrokenLinkage { .. } => Some(Stage::NodeElementLinkage),
            XrefError::TooManyErrors { .. } => None,
        }
    }
}

/// Link every enabled category of `model` in dependency order.
///
/// The error log and the constraint aggregates are reset first. Entities
/// that fail in a tolerant stage keep their symbolic IDs and report
/// `is_cross_referenced() == false`.
pub fn cross_reference(model: &mut Model, options: &XrefOptions) -> Result<(), XrefError> {
    debug!("cross referencing");
    model.xref_errors.reset(options.max_errors, options.overflow);
    model.spc_aggregate.clear();
    model.mpc_aggregate.clear();

    if options.coordinates {
        resolve_coordinates(model)?;
    }
    if options.nodes {
        resolve_nodes(model)?;
    }
    if options.elements {
        let stage = Stage::Elements;
        resolve_all(model, stage, |m| &m.elements, |m| &mut m.elements)?;
        resolve_all(model, stage, |m| &m.rigid_elements, |m| &mut m.rigid_elements)?;
    }
    if options.nodes_with_elements {
        link_nodes_with_elements(model)?;
    }
    if options.properties {
        resolve_all(model, Stage::Properties, |m| &m.properties, |m| &mut m.properties)?;
    }
    if options.masses {
        let stage = Stage::Masses;
        resolve_all(model, stage, |m| &m.masses, |m| &mut m.masses)?;
        resolve_all(model, stage, |m| &m.mass_properties, |m| &mut m.mass_properties)?;
    }
    if options.materials {
        let stage = Stage::Materials;
        resolve_all(model, stage, |m| &m.materials, |m| &mut m.materials)?;
        resolve_all(model, stage, |m| &m.material_deps, |m| &mut m.material_deps)?;
    }
    if options.aero {
        resolve_aero(model)?;
    }
    if options.constraints {
        resolve_constraints(model)?;
    }
    if options.loads {
        let stage = Stage::Loads;
        resolve_all(model, stage, |m| &m.loads, |m| &mut m.loads)?;
        resolve_all(model, stage, |m| &m.dloads, |m| &mut m.dloads)?;
        resolve_all(model, stage, |m| &m.dload_entries, |m| &mut m.dload_entries)?;
        debug!("done with loads");
    }
    if options.sets {
        resolve_sets(model)?;
    }
    if options.optimization {
        let stage = Stage::Optimization;
        resolve_all(model, stage, |m| &m.dresps, |m| &mut m.dresps)?;
        resolve_all(model, stage, |m| &m.dconstrs, |m| &mut m.dconstrs)?;
    }

    info!(
        tolerated = model.xref_errors.total(),
        overflowed = model.xref_errors.overflow_events() > 0,
        "cross referencing complete"
    );
    Ok(())
}

/// Resolve and link one slot; the error carries the entity for reporting
fn resolve_slot<A, G, M>(
    model: &mut Model,
    get: &G,
    get_mut: &M,
    slot: &A::Slot,
) -> Result<(), (EntityRef, StructuralError)>
where
    A: Arena,
    A::Item: Resolvable,
    G: Fn(&Model) -> &A,
    M: Fn(&mut Model) -> &mut A,
{
    let resolved = {
        let model = &*model;
        let Some(item) = get(model).slot(slot) else {
            return Ok(());
        };
        item.resolve(model).map_err(|err| (item.entity(), err))
    };
    let Some(item) = get_mut(model).slot_mut(slot) else {
        return Ok(());
    };
    match resolved {
        Ok(links) => {
            item.link(links);
            Ok(())
        }
        Err(failure) => {
            item.unlink();
            Err(failure)
        }
    }
}

/// Resolve every entity of one container under the stage's policy
fn resolve_all<A, G, M>(
    model: &mut Model,
    stage: Stage,
    get: G,
    get_mut: M,
) -> Result<(), XrefError>
where
    A: Arena,
    A::Item: Resolvable,
    G: Fn(&Model) -> &A,
    M: Fn(&mut Model) -> &mut A,
{
    resolve_each(model, stage, get, get_mut, |_, _| {})
}

/// Like [`resolve_all`], running `prepare` on each slot before it is resolved
fn resolve_each<A, G, M, P>(
    model: &mut Model,
    stage: Stage,
    get: G,
    get_mut: M,
    mut prepare: P,
) -> Result<(), XrefError>
where
    A: Arena,
    A::Item: Resolvable,
    G: Fn(&Model) -> &A,
    M: Fn(&mut Model) -> &mut A,
    P: FnMut(&mut Model, &A::Slot),
{
    for slot in get(&*model).slots() {
        prepare(model, &slot);
        if let Err((entity, err)) = resolve_slot(model, &get, &get_mut, &slot) {
            tolerate(model, stage, entity, err)?;
        }
    }
    Ok(())
}

/// Apply the stage policy to a failed entity
fn tolerate(
    model: &mut Model,
    stage: Stage,
    entity: EntityRef,
    err: StructuralError,
) -> Result<(), XrefError> {
    if !stage.is_tolerant() {
        return Err(XrefError::Stage { stage, source: err });
    }
    match model.xref_errors.record(stage, entity, &err) {
        Overflow::Continue => Ok(()),
        Overflow::Abort => Err(XrefError::TooManyErrors {
            total: model.xref_errors.total(),
            limit: model.xref_errors.limit(),
        }),
    }
}

fn resolve_coordinates(model: &mut Model) -> Result<(), XrefError> {
    let stage = Stage::Coordinates;
    resolve_all(model, stage, |m| &m.coords, |m| &mut m.coords)?;

    let fatal = |source| XrefError::Stage { stage, source };
    let mut frames = FrameTable::with_capacity(model.coords.len());
    let mut state = vec![Visit::Pending; model.coords.len()];
    for handle in model.coords.handles() {
        let mut path = Vec::new();
        setup_frame(model, handle, &mut frames, &mut state, &mut path).map_err(fatal)?;
    }
    for handle in model.coords.handles() {
        if let Some(transform) = frames.take(handle) {
            model.coords[handle].set_transform(transform);
        }
    }
    debug!(count = model.coords.len(), "coordinate systems set up");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Pending,
    Active,
    Done,
}

/// Depth-first setup so every frame's dependencies are computed before it
fn setup_frame(
    model: &Model,
    handle: Handle<Coord>,
    frames: &mut FrameTable,
    state: &mut [Visit],
    path: &mut Vec<Handle<Coord>>,
) -> Result<(), StructuralError> {
    match state[handle.index()] {
        Visit::Done => return Ok(()),
        Visit::Active => {
            let start = path.iter().position(|&h| h == handle).unwrap_or(0);
            let chain = path[start..]
                .iter()
                .chain(std::iter::once(&handle))
                .map(|&h| model.coords[h].cid)
                .collect();
            return Err(StructuralError::CoordinateCycle { chain });
        }
        Visit::Pending => {}
    }

    state[handle.index()] = Visit::Active;
    path.push(handle);
    let coord = &model.coords[handle];
    for dependency in coord.setup_dependencies(model)? {
        setup_frame(model, dependency, frames, state, path)?;
    }
    let transform = coord.setup(model, frames)?;
    frames.insert(handle, transform);
    path.pop();
    state[handle.index()] = Visit::Done;
    Ok(())
}

fn resolve_nodes(model: &mut Model) -> Result<(), XrefError> {
    resolve_all(model, Stage::Nodes, |m| &m.nodes, |m| &mut m.nodes)?;
    model.spoint_index = (!model.spoints.is_empty()).then(|| SpointIndex::new(&model.spoints));
    debug!(
        nodes = model.nodes.len(),
        spoints = model.spoints.len(),
        "nodes linked"
    );
    Ok(())
}

/// Attach to every grid the elements whose resolved node list contains it
fn link_nodes_with_elements(model: &mut Model) -> Result<(), XrefError> {
    let mut attached: Vec<Vec<Handle<Element>>> = vec![Vec::new(); model.nodes.len()];

    for handle in model.elements.handles() {
        let element = &model.elements[handle];
        let Some(links) = element.links() else {
            continue;
        };
        for (slot, node) in links.nodes.iter().enumerate() {
            let Some(NodeRef::Grid(grid)) = node else {
                continue;
            };
            let broken = |message: String| XrefError::BrokenLinkage {
                element: element.entity(),
                message,
            };
            let target = model
                .nodes
                .resolve(*grid)
                .ok_or_else(|| broken(format!("node slot {slot} points at no grid")))?;
            let declared = element.nodes.get(slot).copied().flatten();
            if declared != Some(target.nid) {
                return Err(broken(format!(
                    "node slot {slot} declares {declared:?} but is linked to GRID {}",
                    target.nid
                )));
            }
            let list = &mut attached[grid.index()];
            if list.last() != Some(&handle) {
                list.push(handle);
            }
        }
    }

    for (handle, elements) in model.nodes.handles().zip(attached) {
        model.nodes[handle].set_elements(elements);
    }
    Ok(())
}

fn resolve_aero(model: &mut Model) -> Result<(), XrefError> {
    let stage = Stage::Aero;
    resolve_all(model, stage, |m| &m.caeros, |m| &mut m.caeros)?;
    resolve_all(model, stage, |m| &m.paeros, |m| &mut m.paeros)?;
    resolve_all(model, stage, |m| &m.splines, |m| &mut m.splines)?;
    resolve_all(model, stage, |m| &m.aecomps, |m| &mut m.aecomps)?;
    resolve_all(model, stage, |m| &m.aelists, |m| &mut m.aelists)?;
    resolve_all(model, stage, |m| &m.aeparams, |m| &mut m.aeparams)?;
    resolve_all(model, stage, |m| &m.aestats, |m| &mut m.aestats)?;
    resolve_all(model, stage, |m| &m.aesurf, |m| &mut m.aesurf)?;
    resolve_all(model, stage, |m| &m.aesurfs, |m| &mut m.aesurfs)?;
    Ok(())
}

/// SPC and MPC cards are captured into the model aggregates as they are
/// linked; a combination registers its members before it is resolved
fn resolve_constraints(model: &mut Model) -> Result<(), XrefError> {
    let stage = Stage::Constraints;

    resolve_each(
        model,
        stage,
        |m| &m.spcadds,
        |m| &mut m.spcadds,
        |m: &mut Model, slot: &Handle<SpcAdd>| {
            let spcadd = &m.spcadds[*slot];
            let (sid, members) = (spcadd.sid, spcadd.sets.clone());
            m.spc_aggregate.add_combination(sid, &members);
        },
    )?;
    resolve_each(
        model,
        stage,
        |m| &m.spcs,
        |m| &mut m.spcs,
        |m: &mut Model, slot: &(i32, usize)| {
            if let Some(spc) = m.spcs.slot(slot) {
                let (sid, dofs) = (spc.sid, spc.constrained_dofs());
                m.spc_aggregate.append(sid, dofs);
            }
        },
    )?;
    resolve_each(
        model,
        stage,
        |m| &m.mpcadds,
        |m| &mut m.mpcadds,
        |m: &mut Model, slot: &Handle<MpcAdd>| {
            let mpcadd = &m.mpcadds[*slot];
            let (sid, members) = (mpcadd.sid, mpcadd.sets.clone());
            m.mpc_aggregate.add_combination(sid, &members);
        },
    )?;
    resolve_each(
        model,
        stage,
        |m| &m.mpcs,
        |m| &mut m.mpcs,
        |m: &mut Model, slot: &(i32, usize)| {
            if let Some(mpc) = m.mpcs.slot(slot) {
                let equation = mpc.equation();
                m.mpc_aggregate.append(equation.sid, [equation]);
            }
        },
    )?;

    resolve_all(model, stage, |m| &m.suports, |m| &mut m.suports)?;
    resolve_all(model, stage, |m| &m.suport1s, |m| &mut m.suport1s)?;
    resolve_all(model, stage, |m| &m.se_suports, |m| &mut m.se_suports)?;
    debug!(
        spc_dofs = model.spc_aggregate.len(),
        mpc_equations = model.mpc_aggregate.len(),
        "constraints linked"
    );
    Ok(())
}

fn resolve_sets(model: &mut Model) -> Result<(), XrefError> {
    let stage = Stage::Sets;
    resolve_all(model, stage, |m| &m.asets, |m| &mut m.asets)?;
    resolve_all(model, stage, |m| &m.bsets, |m| &mut m.bsets)?;
    resolve_all(model, stage, |m| &m.csets, |m| &mut m.csets)?;
    resolve_all(model, stage, |m| &m.qsets, |m| &mut m.qsets)?;
    resolve_all(model, stage, |m| &m.usets, |m| &mut m.usets)?;
    resolve_all(model, stage, |m| &m.se_sets, |m| &mut m.se_sets)?;
    resolve_all(model, stage, |m| &m.se_bsets, |m| &mut m.se_bsets)?;
    resolve_all(model, stage, |m| &m.se_csets, |m| &mut m.se_csets)?;
    resolve_all(model, stage, |m| &m.se_qsets, |m| &mut m.se_qsets)?;
    resolve_all(model, stage, |m| &m.se_usets, |m| &mut m.se_usets)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::Grid;

    #[test]
    fn only_attachment_stages_are_tolerant() {
        let tolerant: Vec<Stage> = [
            Stage::Coordinates,
            Stage::Nodes,
            Stage::Elements,
            Stage::NodeElementLinkage,
            Stage::Properties,
            Stage::Masses,
            Stage::Materials,
            Stage::Aero,
            Stage::Constraints,
            Stage::Loads,
            Stage::Sets,
            Stage::Optimization,
        ]
        .into_iter()
        .filter(|stage| stage.is_tolerant())
        .collect();
        assert_eq!(
            tolerant,
            [
                Stage::Elements,
                Stage::Properties,
                Stage::Masses,
                Stage::Materials,
                Stage::Loads
            ]
        );
    }

    #[test]
    fn disabled_stage_is_skipped() {
        let mut model = Model::new();
        model.add_grid(Grid::new(1, [0.0; 3]).with_cp(42)).unwrap();
        let options = XrefOptions {
            nodes: false,
            ..XrefOptions::default()
        };
        cross_reference(&mut model, &options).unwrap();
        assert!(!model.nodes.get(1).unwrap().is_cross_referenced());
    }

    #[test]
    fn stage_error_names_its_stage() {
        let err = XrefError::Stage {
            stage: Stage::Nodes,
            source: StructuralError::missing(EntityRef::new("GRID", 1), "CORD", 42),
        };
        assert_eq!(err.stage(), Some(Stage::Nodes));
        assert!(err.to_string().starts_with("nodes stage failed"));
    }
}
