//! Concentrated and scalar masses, and the PMASS property.

use serde::{Deserialize, Serialize};

use crate::collection::{Card, Handle, Keyed};
use crate::coords::Coord;
use crate::error::{EntityRef, StructuralError};
use crate::model::Model;
use crate::nodes::{NodeRef, grid_ref, node_ref, validate_components};
use crate::resolvable::Resolvable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "card", rename_all = "UPPERCASE")]
pub enum MassData {
    /// 6x6 mass matrix at a grid, lower triangle by rows
    Conm1 {
        node: i32,
        #[serde(default)]
        cid: i32,
        matrix: Vec<f64>,
    },
    /// Lumped mass with offset and inertia; `cid = -1` gives the offset in basic
    Conm2 {
        node: i32,
        #[serde(default)]
        cid: i32,
        mass: f64,
        #[serde(default)]
        offset: [f64; 3],
        #[serde(default)]
        inertia: [f64; 6],
    },
    /// Scalar mass through a PMASS
    Cmass1 {
        #[serde(default)]
        pid: Option<i32>,
        nodes: [Option<i32>; 2],
        #[serde(default)]
        components: [Option<String>; 2],
    },
    /// Scalar mass with the value on the element
    Cmass2 {
        mass: f64,
        nodes: [Option<i32>; 2],
        #[serde(default)]
        components: [Option<String>; 2],
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MassLinks {
    pub nodes: Vec<NodeRef>,
    pub coord: Option<Handle<Coord>>,
    pub property: Option<Handle<PointMassProperty>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mass {
    pub eid: i32,
    #[serde(flatten)]
    pub data: MassData,
    #[serde(skip)]
    links: Option<MassLinks>,
}

impl Mass {
    pub fn new(eid: i32, data: MassData) -> Self {
        Self {
            eid,
            data,
            links: None,
        }
    }

    /// CONM2 at a grid in the basic frame
    pub fn conm2(eid: i32, node: i32, mass: f64) -> Self {
        Self::new(
            eid,
            MassData::Conm2 {
                node,
                cid: 0,
                mass,
                offset: [0.0; 3],
                inertia: [0.0; 6],
            },
        )
    }

    pub fn links(&self) -> Option<&MassLinks> {
        self.links.as_ref()
    }

    /// Translational mass; CMASS1 needs to be cross-referenced to its PMASS
    pub fn mass(&self, model: &Model) -> Option<f64> {
        match &self.data {
            MassData::Conm1 { matrix, .. } => matrix.first().copied(),
            MassData::Conm2 { mass, .. } | MassData::Cmass2 { mass, .. } => Some(*mass),
            MassData::Cmass1 { .. } => {
                let property = self.links.as_ref()?.property?;
                model.mass_properties.resolve(property).map(|p| p.mass)
            }
        }
    }
}

impl Card for Mass {
    fn card(&self) -> &'static str {
        match self.data {
            MassData::Conm1 { .. } => "CONM1",
            MassData::Conm2 { .. } => "CONM2",
            MassData::Cmass1 { .. } => "CMASS1",
            MassData::Cmass2 { .. } => "CMASS2",
        }
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new(self.card(), self.eid)
    }
}

impl Keyed for Mass {
    fn id(&self) -> i32 {
        self.eid
    }
}

fn scalar_nodes(
    model: &Model,
    entity: &EntityRef,
    nodes: &[Option<i32>; 2],
    components: &[Option<String>; 2],
) -> Result<Vec<NodeRef>, StructuralError> {
    if nodes.iter().all(|n| matches!(n, None | Some(0))) {
        return Err(StructuralError::malformed(entity.clone(), "both points are grounded"));
    }
    for c in components.iter().flatten() {
        validate_components(entity.clone(), c)?;
    }
    nodes
        .iter()
        .flatten()
        .filter(|&&nid| nid != 0)
        .map(|&nid| node_ref(model, entity, nid, true))
        .collect()
}

impl Resolvable for Mass {
    type Links = MassLinks;

    fn resolve(&self, model: &Model) -> Result<MassLinks, StructuralError> {
        let entity = self.entity();
        let coord = |cid: i32| {
            model
                .coords
                .handle(cid)
                .ok_or_else(|| StructuralError::missing(entity.clone(), "coordinate system", cid))
        };

        match &self.data {
            MassData::Conm1 { node, cid, matrix } => {
                if matrix.len() != 21 {
                    return Err(StructuralError::malformed(
                        self.entity(),
                        format!("expected 21 mass terms, found {}", matrix.len()),
                    ));
                }
                Ok(MassLinks {
                    nodes: vec![NodeRef::Grid(grid_ref(model, &entity, *node)?)],
                    coord: Some(coord(*cid)?),
                    property: None,
                })
            }
            MassData::Conm2 { node, cid, mass, .. } => {
                if *mass < 0.0 {
                    return Err(StructuralError::malformed(self.entity(), "negative mass"));
                }
                Ok(MassLinks {
                    nodes: vec![NodeRef::Grid(grid_ref(model, &entity, *node)?)],
                    coord: if *cid == -1 { None } else { Some(coord(*cid)?) },
                    property: None,
                })
            }
            MassData::Cmass1 {
                pid,
                nodes,
                components,
            } => {
                let pid = pid.unwrap_or(self.eid);
                let property = model
                    .mass_properties
                    .handle(pid)
                    .ok_or_else(|| StructuralError::missing(entity.clone(), "PMASS", pid))?;
                Ok(MassLinks {
                    nodes: scalar_nodes(model, &entity, nodes, components)?,
                    coord: None,
                    property: Some(property),
                })
            }
            MassData::Cmass2 {
                nodes, components, ..
            } => Ok(MassLinks {
                nodes: scalar_nodes(model, &entity, nodes, components)?,
                coord: None,
                property: None,
            }),
        }
    }

    fn link(&mut self, links: MassLinks) {
        self.links = Some(links);
    }

    fn unlink(&mut self) {
        self.links = None;
    }

    fn is_cross_referenced(&self) -> bool {
        self.links.is_some()
    }
}

/// PMASS: scalar mass value shared by CMASS1 elements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointMassProperty {
    pub pid: i32,
    pub mass: f64,
    #[serde(skip)]
    checked: bool,
}

impl PointMassProperty {
    pub fn new(pid: i32, mass: f64) -> Self {
        Self {
            pid,
            mass,
            checked: false,
        }
    }
}

impl Card for PointMassProperty {
    fn card(&self) -> &'static str {
        "PMASS"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("PMASS", self.pid)
    }
}

impl Keyed for PointMassProperty {
    fn id(&self) -> i32 {
        self.pid
    }
}

impl Resolvable for PointMassProperty {
    type Links = ();

    fn resolve(&self, _model: &Model) -> Result<(), StructuralError> {
        if !self.mass.is_finite() {
            return Err(StructuralError::malformed(self.entity(), "mass is not finite"));
        }
        Ok(())
    }

    fn link(&mut self, _links: ()) {
        self.checked = true;
    }

    fn unlink(&mut self) {
        self.checked = false;
    }

    fn is_cross_referenced(&self) -> bool {
        self.checked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_names() {
        assert_eq!(Mass::conm2(1, 10, 2.0).card(), "CONM2");
        let cmass = Mass::new(
            2,
            MassData::Cmass2 {
                mass: 1.0,
                nodes: [Some(1), None],
                components: [Some("1".into()), None],
            },
        );
        assert_eq!(cmass.entity().to_string(), "CMASS2 2");
    }

    #[test]
    fn cmass_json_defaults() {
        let json = r#"{"eid": 3, "card": "CMASS1", "nodes": [5, null]}"#;
        let m: Mass = serde_json::from_str(json).unwrap();
        match m.data {
            MassData::Cmass1 { pid, nodes, components } => {
                assert_eq!(pid, None);
                assert_eq!(nodes, [Some(5), None]);
                assert_eq!(components, [None, None]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
