//! Element connectivity cards and rigid elements.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::collection::{Card, Handle, Keyed};
use crate::error::{EntityRef, StructuralError};
use crate::materials::{Material, MaterialKind, material_ref};
use crate::model::Model;
use crate::nodes::{Grid, NodeRef, grid_ref, node_ref, validate_components};
use crate::properties::{Property, PropertyKind};
use crate::resolvable::Resolvable;

/// Element card type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ElementKind {
    Crod,
    Conrod,
    Ctube,
    Cbar,
    Cbeam,
    Cquad4,
    Cquad8,
    Cquadr,
    Ctria3,
    Ctria6,
    Ctriar,
    Chexa,
    Ctetra,
    Cpenta,
    Celas1,
    Celas2,
    Celas3,
    Celas4,
    Cdamp1,
    Cdamp2,
    Cbush,
    Cbush1d,
}

/// What the PID/MID field of an element must point at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyRequirement {
    /// Property-less (CELAS2, CELAS4, CDAMP2)
    None,
    Property(&'static [PropertyKind]),
    /// Material given directly on the element (CONROD)
    Material(&'static [MaterialKind]),
}

/// Broad element family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementFamily {
    Line,
    Plate,
    Solid,
    Scalar,
}

impl ElementKind {
    pub fn card(self) -> &'static str {
        match self {
            ElementKind::Crod => "CROD",
            ElementKind::Conrod => "CONROD",
            ElementKind::Ctube => "CTUBE",
            ElementKind::Cbar => "CBAR",
            ElementKind::Cbeam => "CBEAM",
            ElementKind::Cquad4 => "CQUAD4",
            ElementKind::Cquad8 => "CQUAD8",
            ElementKind::Cquadr => "CQUADR",
            ElementKind::Ctria3 => "CTRIA3",
            ElementKind::Ctria6 => "CTRIA6",
            ElementKind::Ctriar => "CTRIAR",
            ElementKind::Chexa => "CHEXA",
            ElementKind::Ctetra => "CTETRA",
            ElementKind::Cpenta => "CPENTA",
            ElementKind::Celas1 => "CELAS1",
            ElementKind::Celas2 => "CELAS2",
            ElementKind::Celas3 => "CELAS3",
            ElementKind::Celas4 => "CELAS4",
            ElementKind::Cdamp1 => "CDAMP1",
            ElementKind::Cdamp2 => "CDAMP2",
            ElementKind::Cbush => "CBUSH",
            ElementKind::Cbush1d => "CBUSH1D",
        }
    }

    pub fn family(self) -> ElementFamily {
        use ElementKind::*;
        match self {
            Crod | Conrod | Ctube | Cbar | Cbeam | Cbush | Cbush1d => ElementFamily::Line,
            Cquad4 | Cquad8 | Cquadr | Ctria3 | Ctria6 | Ctriar => ElementFamily::Plate,
            Chexa | Ctetra | Cpenta => ElementFamily::Solid,
            Celas1 | Celas2 | Celas3 | Celas4 | Cdamp1 | Cdamp2 => ElementFamily::Scalar,
        }
    }

    /// Scalar elements connect scalar points as well as grids, and may be grounded
    pub fn is_scalar(self) -> bool {
        self.family() == ElementFamily::Scalar
    }

    /// Corner nodes that must be present
    pub fn corner_count(self) -> usize {
        use ElementKind::*;
        match self {
            Crod | Conrod | Ctube | Cbar | Cbeam => 2,
            Cbush | Cbush1d => 1,
            Cquad4 | Cquad8 | Cquadr => 4,
            Ctria3 | Ctria6 | Ctriar => 3,
            Chexa => 8,
            Ctetra => 4,
            Cpenta => 6,
            Celas1 | Celas2 | Celas3 | Celas4 | Cdamp1 | Cdamp2 => 0,
        }
    }

    /// Allowed lengths of the node list (midside nodes may be blank)
    pub fn node_counts(self) -> &'static [usize] {
        use ElementKind::*;
        match self {
            Crod | Conrod | Ctube | Cbar | Cbeam | Cbush | Cbush1d => &[2],
            Cquad4 | Cquadr => &[4],
            Cquad8 => &[4, 8],
            Ctria3 | Ctriar => &[3],
            Ctria6 => &[3, 6],
            Chexa => &[8, 20],
            Ctetra => &[4, 10],
            Cpenta => &[6, 15],
            Celas1 | Celas2 | Celas3 | Celas4 | Cdamp1 | Cdamp2 => &[2],
        }
    }

    pub fn property_requirement(self) -> PropertyRequirement {
        use ElementKind::*;
        use PropertyRequirement as R;
        match self {
            Crod => R::Property(&[PropertyKind::Prod]),
            Ctube => R::Property(&[PropertyKind::Ptube]),
            Conrod => R::Material(&[MaterialKind::Mat1]),
            Cbar => R::Property(&[PropertyKind::Pbar]),
            Cbeam => R::Property(&[PropertyKind::Pbeam]),
            Cquad4 | Cquad8 | Cquadr | Ctria3 | Ctria6 | Ctriar => {
                R::Property(&[PropertyKind::Pshell, PropertyKind::Pcomp])
            }
            Chexa | Ctetra | Cpenta => R::Property(&[PropertyKind::Psolid]),
            Celas1 | Celas3 => R::Property(&[PropertyKind::Pelas]),
            Cdamp1 => R::Property(&[PropertyKind::Pdamp]),
            Cbush => R::Property(&[PropertyKind::Pbush]),
            Cbush1d => R::Property(&[PropertyKind::Pbush1d]),
            Celas2 | Celas4 | Cdamp2 => R::None,
        }
    }

    /// Whether the element carries a CBAR/CBEAM style orientation grid
    fn has_orientation(self) -> bool {
        matches!(self, ElementKind::Cbar | ElementKind::Cbeam | ElementKind::Cbush)
    }
}

/// Resolved references of an element
#[derive(Debug, Clone, PartialEq)]
pub struct ElementLinks {
    /// Aligned with `Element::nodes`; blank slots stay `None`
    pub nodes: Vec<Option<NodeRef>>,
    pub property: Option<Handle<Property>>,
    pub material: Option<Handle<Material>>,
    pub orientation: Option<Handle<Grid>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub eid: i32,
    pub kind: ElementKind,
    /// Property ID, or material ID for CONROD
    #[serde(default)]
    pub pid: Option<i32>,
    pub nodes: Vec<Option<i32>>,
    /// Orientation grid (G0) of CBAR/CBEAM/CBUSH
    #[serde(default)]
    pub g0: Option<i32>,
    #[serde(skip)]
    links: Option<ElementLinks>,
}

impl Element {
    pub fn new(eid: i32, kind: ElementKind, pid: Option<i32>, nodes: &[i32]) -> Self {
        Self {
            eid,
            kind,
            pid,
            nodes: nodes.iter().map(|&nid| Some(nid)).collect(),
            g0: None,
            links: None,
        }
    }

    /// Scalar element between two optional points (0 or blank = ground)
    pub fn scalar(
        eid: i32,
        kind: ElementKind,
        pid: Option<i32>,
        p1: Option<i32>,
        p2: Option<i32>,
    ) -> Self {
        Self {
            eid,
            kind,
            pid,
            nodes: vec![p1, p2],
            g0: None,
            links: None,
        }
    }

    pub fn links(&self) -> Option<&ElementLinks> {
        self.links.as_ref()
    }

    /// Declared node IDs, blanks and zeros skipped
    pub fn node_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.nodes.iter().flatten().copied().filter(|&nid| nid != 0)
    }

    /// Basic-frame locations of the element's grids, once nodes and frames are set up
    pub fn node_positions(&self, model: &Model) -> Option<Vec<Vector3<f64>>> {
        let links = self.links.as_ref()?;
        links
            .nodes
            .iter()
            .flatten()
            .filter_map(|node| node.grid())
            .map(|g| model.nodes.resolve(g).and_then(|grid| grid.position(model)))
            .collect()
    }

    /// Mean of the grid positions
    pub fn centroid(&self, model: &Model) -> Option<Vector3<f64>> {
        let points = self.node_positions(model)?;
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        Some(points.iter().sum::<Vector3<f64>>() / n)
    }

    fn check_connectivity(&self) -> Result<(), StructuralError> {
        let entity = self.entity();
        let counts = self.kind.node_counts();
        if !counts.contains(&self.nodes.len()) {
            return Err(StructuralError::malformed(
                entity,
                format!("expected {:?} nodes, found {}", counts, self.nodes.len()),
            ));
        }
        let corners = self.kind.corner_count();
        if let Some(slot) = self.nodes[..corners].iter().position(|n| is_blank(*n)) {
            return Err(StructuralError::malformed(
                entity,
                format!("corner node {} is blank or 0", slot + 1),
            ));
        }
        if self.kind.is_scalar() && self.nodes.iter().all(|n| is_blank(*n)) {
            return Err(StructuralError::malformed(entity, "both points are grounded"));
        }
        let mut seen: Vec<i32> = self.node_ids().collect();
        seen.sort_unstable();
        if seen.windows(2).any(|w| w[0] == w[1]) {
            return Err(StructuralError::malformed(entity, "repeated node"));
        }
        Ok(())
    }
}

/// Blank or 0 node slot
fn is_blank(node: Option<i32>) -> bool {
    matches!(node, None | Some(0))
}

impl Card for Element {
    fn card(&self) -> &'static str {
        self.kind.card()
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new(self.card(), self.eid)
    }
}

impl Keyed for Element {
    fn id(&self) -> i32 {
        self.eid
    }
}

impl Resolvable for Element {
    type Links = ElementLinks;

    fn resolve(&self, model: &Model) -> Result<ElementLinks, StructuralError> {
        self.check_connectivity()?;
        let entity = self.entity();
        let scalar = self.kind.is_scalar();

        let nodes = self
            .nodes
            .iter()
            .map(|slot| match slot {
                // grounded scalar point or blank midside node
                Some(0) | None => Ok(None),
                Some(nid) => node_ref(model, &entity, *nid, scalar).map(Some),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut property = None;
        let mut material = None;
        match self.kind.property_requirement() {
            PropertyRequirement::None => {}
            PropertyRequirement::Property(accepted) => {
                // blank PID defaults to the EID
                let pid = self.pid.unwrap_or(self.eid);
                let handle = model
                    .properties
                    .handle(pid)
                    .ok_or_else(|| StructuralError::missing(entity.clone(), "property", pid))?;
                let found = model.properties[handle].kind();
                if !accepted.contains(&found) {
                    return Err(StructuralError::TypeMismatch {
                        entity,
                        field: "PID",
                        expected: accepted
                            .iter()
                            .map(|k| k.card())
                            .collect::<Vec<_>>()
                            .join("/"),
                        found: found.card(),
                    });
                }
                property = Some(handle);
            }
            PropertyRequirement::Material(accepted) => {
                let mid = self
                    .pid
                    .ok_or_else(|| StructuralError::malformed(entity.clone(), "blank MID"))?;
                material = Some(material_ref(model, &entity, "MID", mid, accepted)?);
            }
        }

        let orientation = match self.g0 {
            Some(g0) if self.kind.has_orientation() => Some(grid_ref(model, &entity, g0)?),
            Some(_) => {
                return Err(StructuralError::malformed(
                    entity,
                    "orientation grid on an element without orientation",
                ));
            }
            None => None,
        };

        Ok(ElementLinks {
            nodes,
            property,
            material,
            orientation,
        })
    }

    fn link(&mut self, links: ElementLinks) {
        self.links = Some(links);
    }

    fn unlink(&mut self) {
        self.links = None;
    }

    fn is_cross_referenced(&self) -> bool {
        self.links.is_some()
    }
}

/// One weighted group of an RBE3
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightGroup {
    pub weight: f64,
    pub components: String,
    pub grids: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "card", rename_all = "UPPERCASE")]
pub enum RigidData {
    Rbar {
        ga: i32,
        gb: i32,
        cna: String,
        #[serde(default)]
        cnb: Option<String>,
        #[serde(default)]
        cma: Option<String>,
        #[serde(default)]
        cmb: Option<String>,
    },
    Rbe2 {
        gn: i32,
        cm: String,
        gm: Vec<i32>,
    },
    Rbe3 {
        refgrid: i32,
        refc: String,
        groups: Vec<WeightGroup>,
    },
}

/// Resolved grids of a rigid element in card order (independent first)
#[derive(Debug, Clone, PartialEq)]
pub struct RigidLinks {
    pub independent: Vec<Handle<Grid>>,
    pub dependent: Vec<Handle<Grid>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigidElement {
    pub eid: i32,
    #[serde(flatten)]
    pub data: RigidData,
    #[serde(skip)]
    links: Option<RigidLinks>,
}

impl RigidElement {
    pub fn new(eid: i32, data: RigidData) -> Self {
        Self {
            eid,
            data,
            links: None,
        }
    }

    pub fn links(&self) -> Option<&RigidLinks> {
        self.links.as_ref()
    }

    /// (independent, dependent) grid IDs
    pub fn grid_ids(&self) -> (Vec<i32>, Vec<i32>) {
        match &self.data {
            RigidData::Rbar { ga, gb, .. } => (vec![*ga], vec![*gb]),
            RigidData::Rbe2 { gn, gm, .. } => (vec![*gn], gm.clone()),
            RigidData::Rbe3 {
                refgrid, groups, ..
            } => (
                groups.iter().flat_map(|g| g.grids.iter().copied()).collect(),
                vec![*refgrid],
            ),
        }
    }

    fn component_fields(&self) -> Vec<&str> {
        match &self.data {
            RigidData::Rbar {
                cna, cnb, cma, cmb, ..
            } => std::iter::once(cna.as_str())
                .chain([cnb, cma, cmb].into_iter().flatten().map(String::as_str))
                .collect(),
            RigidData::Rbe2 { cm, .. } => vec![cm.as_str()],
            RigidData::Rbe3 { refc, groups, .. } => std::iter::once(refc.as_str())
                .chain(groups.iter().map(|g| g.components.as_str()))
                .collect(),
        }
    }
}

impl Card for RigidElement {
    fn card(&self) -> &'static str {
        match self.data {
            RigidData::Rbar { .. } => "RBAR",
            RigidData::Rbe2 { .. } => "RBE2",
            RigidData::Rbe3 { .. } => "RBE3",
        }
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new(self.card(), self.eid)
    }
}

impl Keyed for RigidElement {
    fn id(&self) -> i32 {
        self.eid
    }
}

impl Resolvable for RigidElement {
    type Links = RigidLinks;

    fn resolve(&self, model: &Model) -> Result<RigidLinks, StructuralError> {
        let entity = self.entity();
        for components in self.component_fields() {
            validate_components(entity.clone(), components)?;
        }
        if let RigidData::Rbe3 { groups, .. } = &self.data {
            if groups.is_empty() {
                return Err(StructuralError::malformed(entity, "no weighted grids"));
            }
        }

        let (independent, dependent) = self.grid_ids();
        let lookup = |ids: Vec<i32>| {
            ids.into_iter()
                .map(|nid| grid_ref(model, &entity, nid))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(RigidLinks {
            independent: lookup(independent)?,
            dependent: lookup(dependent)?,
        })
    }

    fn link(&mut self, links: RigidLinks) {
        self.links = Some(links);
    }

    fn unlink(&mut self) {
        self.links = None;
    }

    fn is_cross_referenced(&self) -> bool {
        self.links.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_checks() {
        let quad = Element::new(1, ElementKind::Cquad4, Some(1), &[1, 2, 3, 4]);
        assert!(quad.check_connectivity().is_ok());

        let short = Element::new(2, ElementKind::Cquad4, Some(1), &[1, 2, 3]);
        assert!(short.check_connectivity().is_err());

        let repeated = Element::new(3, ElementKind::Ctria3, Some(1), &[1, 2, 2]);
        assert!(repeated.check_connectivity().is_err());

        let mut tet10 = Element::new(4, ElementKind::Ctetra, Some(1), &[1, 2, 3, 4]);
        tet10.nodes.extend([Some(5), None, None, None, None, Some(10)]);
        assert!(tet10.check_connectivity().is_ok());

        let grounded = Element::scalar(5, ElementKind::Celas2, None, Some(7), None);
        assert!(grounded.check_connectivity().is_ok());
        let floating = Element::scalar(6, ElementKind::Celas2, None, None, None);
        assert!(floating.check_connectivity().is_err());
    }

    #[test]
    fn zero_is_ground_only_for_scalar_elements() {
        let rod = Element::new(7, ElementKind::Crod, Some(1), &[1, 0]);
        let err = rod.check_connectivity().unwrap_err();
        assert!(err.to_string().contains("corner node 2"));

        let quad = Element::new(8, ElementKind::Cquad4, Some(1), &[1, 0, 3, 4]);
        assert!(quad.check_connectivity().is_err());

        let spring = Element::new(9, ElementKind::Celas1, Some(1), &[7, 0]);
        assert!(spring.check_connectivity().is_ok());
        assert_eq!(spring.node_ids().collect::<Vec<_>>(), [7]);

        let mut quad8 = Element::new(10, ElementKind::Cquad8, Some(1), &[1, 2, 3, 4]);
        quad8.nodes.extend([Some(5), Some(0), Some(0), Some(8)]);
        assert!(quad8.check_connectivity().is_ok());
    }

    #[test]
    fn property_requirements() {
        assert_eq!(
            ElementKind::Conrod.property_requirement(),
            PropertyRequirement::Material(&[MaterialKind::Mat1])
        );
        assert_eq!(ElementKind::Celas2.property_requirement(), PropertyRequirement::None);
        assert!(matches!(
            ElementKind::Ctria6.property_requirement(),
            PropertyRequirement::Property(kinds) if kinds.contains(&PropertyKind::Pcomp)
        ));
        assert_eq!(ElementKind::Cpenta.family(), ElementFamily::Solid);
        assert!(ElementKind::Cdamp1.is_scalar());
    }

    #[test]
    fn rigid_grid_ids() {
        let rbe3 = RigidElement::new(
            9,
            RigidData::Rbe3 {
                refgrid: 100,
                refc: "123".to_string(),
                groups: vec![WeightGroup {
                    weight: 1.0,
                    components: "123".to_string(),
                    grids: vec![1, 2, 3],
                }],
            },
        );
        assert_eq!(rbe3.grid_ids(), (vec![1, 2, 3], vec![100]));
        assert_eq!(rbe3.card(), "RBE3");
        assert_eq!(rbe3.component_fields(), vec!["123", "123"]);
    }
}
