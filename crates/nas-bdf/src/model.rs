//! The bulk-data model container.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::aero::{
    Aecomp, Aefact, Aelist, Aeparam, Aestat, Aesurf, Aesurfs, Caero1, Paero1, Set1, Spline1,
};
use crate::collection::{Collection, FanOut};
use crate::constraints::{
    ConstrainedDof, ConstraintAggregate, Mpc, MpcAdd, MpcEquation, SeSuport, SinglePointConstraint,
    SpcAdd, Suport, Suport1,
};
use crate::coords::Coord;
use crate::elements::{Element, RigidElement};
use crate::error::ModelError;
use crate::loads::{DynamicLoadCombination, DynamicLoadEntry, Load};
use crate::masses::{Mass, PointMassProperty};
use crate::materials::{DependencyTable, Material, Table};
use crate::nodes::{Grid, GridSet, SpointIndex};
use crate::optimization::{DesignConstraint, DesignResponse, Deqatn, Desvar, Dtable};
use crate::properties::Property;
use crate::sets::DofSet;
use crate::summary::ModelSummary;
use crate::xref::XrefErrorLog;

/// Every card of a deck, grouped by category.
///
/// Cards are stored unresolved; [`crate::cross_reference`] attaches handles
/// in place. Serialization skips handles and resolver state, so a model read
/// back from JSON is unresolved again.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Model {
    pub coords: Collection<Coord>,
    pub nodes: Collection<Grid>,
    pub grid_set: Option<GridSet>,
    pub spoints: BTreeSet<i32>,

    pub elements: Collection<Element>,
    pub rigid_elements: Collection<RigidElement>,
    pub properties: Collection<Property>,
    pub masses: Collection<Mass>,
    pub mass_properties: Collection<PointMassProperty>,
    pub materials: Collection<Material>,
    pub tables: Collection<Table>,
    pub material_deps: DependencyTable,

    pub loads: FanOut<Load>,
    pub dloads: FanOut<DynamicLoadCombination>,
    pub dload_entries: FanOut<DynamicLoadEntry>,

    pub spcs: FanOut<SinglePointConstraint>,
    pub spcadds: Collection<SpcAdd>,
    pub mpcs: FanOut<Mpc>,
    pub mpcadds: Collection<MpcAdd>,
    pub suports: Vec<Suport>,
    pub suport1s: Collection<Suport1>,
    pub se_suports: Vec<SeSuport>,

    pub caeros: Collection<Caero1>,
    pub paeros: Collection<Paero1>,
    pub splines: Collection<Spline1>,
    pub aecomps: BTreeMap<String, Aecomp>,
    pub aelists: Collection<Aelist>,
    pub aeparams: Collection<Aeparam>,
    pub aestats: Collection<Aestat>,
    pub aesurf: Collection<Aesurf>,
    pub aesurfs: Collection<Aesurfs>,
    pub aefacts: Collection<Aefact>,
    pub set1s: Collection<Set1>,

    pub asets: Vec<DofSet>,
    pub bsets: Vec<DofSet>,
    pub csets: Vec<DofSet>,
    pub qsets: Vec<DofSet>,
    /// USET cards by set name
    pub usets: FanOut<DofSet, String>,
    /// SESET cards by superelement ID
    pub se_sets: FanOut<DofSet>,
    pub se_bsets: Vec<DofSet>,
    pub se_csets: Vec<DofSet>,
    pub se_qsets: Vec<DofSet>,
    pub se_usets: Vec<DofSet>,

    pub desvars: Collection<Desvar>,
    pub deqatns: Collection<Deqatn>,
    pub dtable: Option<Dtable>,
    pub dresps: Collection<DesignResponse>,
    pub dconstrs: FanOut<DesignConstraint>,

    /// Combined SPC sets, filled during cross-referencing
    #[serde(skip)]
    pub spc_aggregate: ConstraintAggregate<ConstrainedDof>,
    /// Combined MPC sets, filled during cross-referencing
    #[serde(skip)]
    pub mpc_aggregate: ConstraintAggregate<MpcEquation>,
    #[serde(skip)]
    pub spoint_index: Option<SpointIndex>,
    #[serde(skip)]
    pub xref_errors: XrefErrorLog,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            coords: Collection::single(Coord::basic()),
            nodes: Collection::new(),
            grid_set: None,
            spoints: BTreeSet::new(),
            elements: Collection::new(),
            rigid_elements: Collection::new(),
            properties: Collection::new(),
            masses: Collection::new(),
            mass_properties: Collection::new(),
            materials: Collection::new(),
            tables: Collection::new(),
            material_deps: DependencyTable::default(),
            loads: FanOut::new(),
            dloads: FanOut::new(),
            dload_entries: FanOut::new(),
            spcs: FanOut::new(),
            spcadds: Collection::new(),
            mpcs: FanOut::new(),
            mpcadds: Collection::new(),
            suports: Vec::new(),
            suport1s: Collection::new(),
            se_suports: Vec::new(),
            caeros: Collection::new(),
            paeros: Collection::new(),
            splines: Collection::new(),
            aecomps: BTreeMap::new(),
            aelists: Collection::new(),
            aeparams: Collection::new(),
            aestats: Collection::new(),
            aesurf: Collection::new(),
            aesurfs: Collection::new(),
            aefacts: Collection::new(),
            set1s: Collection::new(),
            asets: Vec::new(),
            bsets: Vec::new(),
            csets: Vec::new(),
            qsets: Vec::new(),
            usets: FanOut::new(),
            se_sets: FanOut::new(),
            se_bsets: Vec::new(),
            se_csets: Vec::new(),
            se_qsets: Vec::new(),
            se_usets: Vec::new(),
            desvars: Collection::new(),
            deqatns: Collection::new(),
            dtable: None,
            dresps: Collection::new(),
            dconstrs: FanOut::new(),
            spc_aggregate: ConstraintAggregate::default(),
            mpc_aggregate: ConstraintAggregate::default(),
            spoint_index: None,
            xref_errors: XrefErrorLog::default(),
        }
    }
}

impl Model {
    /// Empty model holding only the basic coordinate system
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let mut model: Model = serde_json::from_str(json)?;
        if !model.coords.contains(0) {
            model.coords.insert(Coord::basic())?;
        }
        Ok(model)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Input frame of a grid after GRDSET defaulting
    pub fn effective_cp(&self, grid: &Grid) -> i32 {
        grid.cp
            .or_else(|| self.grid_set.as_ref().and_then(|g| g.cp))
            .unwrap_or(0)
    }

    pub fn add_coord(&mut self, coord: Coord) -> Result<(), ModelError> {
        self.coords.insert(coord).map(drop)
    }

    pub fn add_grid(&mut self, grid: Grid) -> Result<(), ModelError> {
        self.nodes.insert(grid).map(drop)
    }

    pub fn add_element(&mut self, element: Element) -> Result<(), ModelError> {
        self.elements.insert(element).map(drop)
    }

    pub fn add_property(&mut self, property: Property) -> Result<(), ModelError> {
        self.properties.insert(property).map(drop)
    }

    pub fn add_material(&mut self, material: Material) -> Result<(), ModelError> {
        self.materials.insert(material).map(drop)
    }

    pub fn add_load(&mut self, load: Load) {
        self.loads.push(load.sid, load);
    }

    pub fn add_spc(&mut self, spc: SinglePointConstraint) {
        self.spcs.push(spc.sid, spc);
    }

    pub fn add_mpc(&mut self, mpc: Mpc) {
        self.mpcs.push(mpc.sid, mpc);
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary::from_model(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::CoordFamily;

    #[test]
    fn new_model_has_basic_frame() {
        let model = Model::new();
        assert!(model.coords.contains(0));
        assert_eq!(model.coords.len(), 1);
    }

    #[test]
    fn json_roundtrip_restores_basic_frame() {
        let json = r#"{
            "coords": [{"cid": 5, "family": "rectangular", "form": "points", "rid": 0,
                        "origin": [0, 0, 0], "z_axis": [0, 0, 1], "xz_plane": [1, 0, 0]}],
            "nodes": [{"nid": 1, "xyz": [1.0, 2.0, 3.0], "cp": 5}]
        }"#;
        let model = Model::from_json_str(json).unwrap();
        assert!(model.coords.contains(0));
        assert!(model.coords.contains(5));
        assert_eq!(model.coords.get(5).map(|c| c.family), Some(CoordFamily::Rectangular));

        let text = model.to_json_string().unwrap();
        let back = Model::from_json_str(&text).unwrap();
        assert_eq!(back.coords.len(), 2);
        assert_eq!(back.nodes.get(1).map(|g| g.cp), Some(Some(5)));
    }

    #[test]
    fn duplicate_ids_are_rejected_on_load() {
        let json = r#"{"nodes": [{"nid": 1, "xyz": [0, 0, 0]}, {"nid": 1, "xyz": [1, 0, 0]}]}"#;
        assert!(matches!(Model::from_json_str(json), Err(ModelError::Json(_))));
    }

    #[test]
    fn effective_cp_uses_grdset() {
        let mut model = Model::new();
        let grid = Grid::new(1, [0.0; 3]);
        assert_eq!(model.effective_cp(&grid), 0);
        model.grid_set = Some(GridSet {
            cp: Some(3),
            ..GridSet::default()
        });
        assert_eq!(model.effective_cp(&grid), 3);
        assert_eq!(model.effective_cp(&grid.with_cp(7)), 7);
    }
}
