//! Grid points, GRDSET defaults and scalar points.

use std::collections::BTreeSet;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::collection::{Card, Handle, Keyed};
use crate::coords::Coord;
use crate::elements::Element;
use crate::error::{EntityRef, StructuralError};
use crate::model::Model;
use crate::resolvable::Resolvable;

/// Default fields applied to every GRID that leaves them blank
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSet {
    pub cp: Option<i32>,
    pub cd: Option<i32>,
    pub ps: Option<String>,
    pub seid: Option<i32>,
}

/// Resolved references and defaulted fields of a grid point
#[derive(Debug, Clone, PartialEq)]
pub struct GridLinks {
    /// Frame the coordinates are given in
    pub cp: Handle<Coord>,
    /// Displacement (analysis/output) frame; `None` for fluid grids (cd = -1)
    pub cd: Option<Handle<Coord>>,
    pub ps: Option<String>,
    pub seid: i32,
}

/// A GRID card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    pub nid: i32,
    #[serde(default)]
    pub cp: Option<i32>,
    pub xyz: [f64; 3],
    #[serde(default)]
    pub cd: Option<i32>,
    #[serde(default)]
    pub ps: Option<String>,
    #[serde(default)]
    pub seid: Option<i32>,
    #[serde(skip)]
    links: Option<GridLinks>,
    #[serde(skip)]
    elements: Vec<Handle<Element>>,
}

impl Grid {
    pub fn new(nid: i32, xyz: [f64; 3]) -> Self {
        Self {
            nid,
            cp: None,
            xyz,
            cd: None,
            ps: None,
            seid: None,
            links: None,
            elements: Vec::new(),
        }
    }

    /// Builder-style input frame
    pub fn with_cp(mut self, cp: i32) -> Self {
        self.cp = Some(cp);
        self
    }

    /// Builder-style output frame
    pub fn with_cd(mut self, cd: i32) -> Self {
        self.cd = Some(cd);
        self
    }

    pub fn links(&self) -> Option<&GridLinks> {
        self.links.as_ref()
    }

    /// Elements attached during node/element linkage
    pub fn elements(&self) -> &[Handle<Element>] {
        &self.elements
    }

    pub(crate) fn set_elements(&mut self, elements: Vec<Handle<Element>>) {
        self.elements = elements;
    }

    /// Location in the basic frame; needs the grid linked and its frame set up
    pub fn position(&self, model: &Model) -> Option<Vector3<f64>> {
        let links = self.links.as_ref()?;
        model.coords.resolve(links.cp)?.to_basic(self.xyz)
    }

    /// Location as rectangular components of frame `cid`
    pub fn position_wrt(&self, model: &Model, cid: i32) -> Option<Vector3<f64>> {
        let basic = self.position(model)?;
        let frame = model.coords.get(cid)?.transform()?;
        Some(frame.to_local_rectangular(&basic))
    }

    /// Link against the coordinate collection, filling blanks from `grid_set`
    pub fn resolve_with(
        &self,
        model: &Model,
        grid_set: Option<&GridSet>,
    ) -> Result<GridLinks, StructuralError> {
        let defaults = grid_set.cloned().unwrap_or_default();
        let cp_id = self.cp.or(defaults.cp).unwrap_or(0);
        let cd_id = self.cd.or(defaults.cd).unwrap_or(0);

        let coord = |cid: i32| {
            model
                .coords
                .handle(cid)
                .ok_or_else(|| StructuralError::missing(self.entity(), "coordinate system", cid))
        };

        let cp = coord(cp_id)?;
        let cd = if cd_id == -1 { None } else { Some(coord(cd_id)?) };

        let ps = self.ps.clone().or(defaults.ps);
        if let Some(ps) = &ps {
            validate_components(self.entity(), ps)?;
        }

        Ok(GridLinks {
            cp,
            cd,
            ps,
            seid: self.seid.or(defaults.seid).unwrap_or(0),
        })
    }
}

impl Card for Grid {
    fn card(&self) -> &'static str {
        "GRID"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("GRID", self.nid)
    }
}

impl Keyed for Grid {
    fn id(&self) -> i32 {
        self.nid
    }
}

impl Resolvable for Grid {
    type Links = GridLinks;

    fn resolve(&self, model: &Model) -> Result<GridLinks, StructuralError> {
        self.resolve_with(model, model.grid_set.as_ref())
    }

    fn link(&mut self, links: GridLinks) {
        self.links = Some(links);
    }

    fn unlink(&mut self) {
        self.links = None;
    }

    fn is_cross_referenced(&self) -> bool {
        self.links.is_some()
    }
}

/// Sorted lookup over the scalar points of the model
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpointIndex {
    ids: Vec<i32>,
}

impl SpointIndex {
    pub fn new(spoints: &BTreeSet<i32>) -> Self {
        Self {
            ids: spoints.iter().copied().collect(),
        }
    }

    /// Zero-based position of a scalar point
    pub fn position(&self, id: i32) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }

    pub fn contains(&self, id: i32) -> bool {
        self.position(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[i32] {
        &self.ids
    }
}

/// A resolved grid or scalar point reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    Grid(Handle<Grid>),
    Scalar(i32),
}

impl NodeRef {
    pub fn grid(self) -> Option<Handle<Grid>> {
        match self {
            NodeRef::Grid(handle) => Some(handle),
            NodeRef::Scalar(_) => None,
        }
    }
}

/// Resolve a grid ID, falling back to scalar points when `allow_scalar`
pub(crate) fn node_ref(
    model: &Model,
    entity: &EntityRef,
    nid: i32,
    allow_scalar: bool,
) -> Result<NodeRef, StructuralError> {
    if let Some(handle) = model.nodes.handle(nid) {
        return Ok(NodeRef::Grid(handle));
    }
    if allow_scalar && model.spoints.contains(&nid) {
        return Ok(NodeRef::Scalar(nid));
    }
    Err(StructuralError::missing(
        entity.clone(),
        if allow_scalar { "GRID/SPOINT" } else { "GRID" },
        nid,
    ))
}

/// Resolve a grid ID that may only name a structural grid
pub(crate) fn grid_ref(
    model: &Model,
    entity: &EntityRef,
    nid: i32,
) -> Result<Handle<Grid>, StructuralError> {
    model
        .nodes
        .handle(nid)
        .ok_or_else(|| StructuralError::missing(entity.clone(), "GRID", nid))
}

/// Component codes are unique digits 0-6 (`123456`, `0` for scalar points)
pub(crate) fn validate_components(
    entity: EntityRef,
    components: &str,
) -> Result<(), StructuralError> {
    let mut seen = [false; 7];
    if components.is_empty() {
        return Err(StructuralError::malformed(entity, "empty component code"));
    }
    for c in components.chars() {
        let digit = c
            .to_digit(10)
            .filter(|d| *d <= 6)
            .ok_or_else(|| {
                StructuralError::malformed(entity.clone(), format!("invalid component '{c}'"))
            })? as usize;
        if seen[digit] {
            return Err(StructuralError::malformed(
                entity,
                format!("component {digit} repeated in '{components}'"),
            ));
        }
        seen[digit] = true;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spoint_index_positions() {
        let spoints: BTreeSet<i32> = [30, 10, 20].into_iter().collect();
        let index = SpointIndex::new(&spoints);
        assert_eq!(index.ids(), &[10, 20, 30]);
        assert_eq!(index.position(20), Some(1));
        assert_eq!(index.position(25), None);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn component_codes() {
        let e = EntityRef::new("SPC1", 1);
        assert!(validate_components(e.clone(), "123456").is_ok());
        assert!(validate_components(e.clone(), "0").is_ok());
        assert!(validate_components(e.clone(), "117").is_err());
        assert!(validate_components(e.clone(), "7").is_err());
        assert!(validate_components(e, "").is_err());
    }

    #[test]
    fn grid_builder_sets_frames() {
        let g = Grid::new(5, [1.0, 2.0, 3.0]).with_cp(2).with_cd(3);
        assert_eq!(g.cp, Some(2));
        assert_eq!(g.cd, Some(3));
        assert!(!g.is_cross_referenced());
        assert!(g.elements().is_empty());
    }
}
