//! Element properties.

use serde::{Deserialize, Serialize};

use crate::collection::{Card, Handle, Keyed};
use crate::error::{EntityRef, StructuralError};
use crate::materials::{Material, MaterialKind, material_ref};
use crate::model::Model;
use crate::resolvable::Resolvable;

const BEAM_MATERIALS: &[MaterialKind] = &[MaterialKind::Mat1];
const SHELL_MATERIALS: &[MaterialKind] =
    &[MaterialKind::Mat1, MaterialKind::Mat2, MaterialKind::Mat8];
const SHELL_SHEAR_MATERIALS: &[MaterialKind] = &[MaterialKind::Mat1, MaterialKind::Mat2];
const SOLID_MATERIALS: &[MaterialKind] = &[MaterialKind::Mat1, MaterialKind::Mat9];

/// Property family, used by elements to check what they point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PropertyKind {
    Prod,
    Ptube,
    Pbar,
    Pbeam,
    Pshell,
    Pcomp,
    Psolid,
    Pelas,
    Pdamp,
    Pbush,
    Pbush1d,
}

impl PropertyKind {
    pub fn card(self) -> &'static str {
        match self {
            PropertyKind::Prod => "PROD",
            PropertyKind::Ptube => "PTUBE",
            PropertyKind::Pbar => "PBAR",
            PropertyKind::Pbeam => "PBEAM",
            PropertyKind::Pshell => "PSHELL",
            PropertyKind::Pcomp => "PCOMP",
            PropertyKind::Psolid => "PSOLID",
            PropertyKind::Pelas => "PELAS",
            PropertyKind::Pdamp => "PDAMP",
            PropertyKind::Pbush => "PBUSH",
            PropertyKind::Pbush1d => "PBUSH1D",
        }
    }
}

/// One layer of a PCOMP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ply {
    pub mid: i32,
    pub t: f64,
    #[serde(default)]
    pub theta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "card", rename_all = "UPPERCASE")]
pub enum PropertyData {
    Prod {
        mid: i32,
        a: f64,
        #[serde(default)]
        j: f64,
    },
    Ptube {
        mid: i32,
        od: f64,
        #[serde(default)]
        t: Option<f64>,
    },
    Pbar {
        mid: i32,
        a: f64,
        #[serde(default)]
        i1: f64,
        #[serde(default)]
        i2: f64,
        #[serde(default)]
        j: f64,
    },
    Pbeam {
        mid: i32,
        a: f64,
        #[serde(default)]
        i1: f64,
        #[serde(default)]
        i2: f64,
        #[serde(default)]
        j: f64,
    },
    Pshell {
        #[serde(default)]
        mid1: Option<i32>,
        t: f64,
        #[serde(default)]
        mid2: Option<i32>,
        #[serde(default)]
        mid3: Option<i32>,
    },
    Pcomp { plies: Vec<Ply> },
    Psolid { mid: i32 },
    Pelas {
        k: f64,
        #[serde(default)]
        ge: f64,
    },
    Pdamp { b: f64 },
    Pbush {
        #[serde(default)]
        k: [f64; 6],
        #[serde(default)]
        b: [f64; 6],
    },
    Pbush1d {
        #[serde(default)]
        k: f64,
        #[serde(default)]
        c: f64,
    },
}

/// Material field of a property: (field name, MID, accepted material families)
type MaterialSlot = (&'static str, i32, &'static [MaterialKind]);

impl PropertyData {
    fn material_slots(&self) -> Vec<MaterialSlot> {
        match self {
            PropertyData::Prod { mid, .. }
            | PropertyData::Ptube { mid, .. }
            | PropertyData::Pbar { mid, .. }
            | PropertyData::Pbeam { mid, .. } => vec![("MID", *mid, BEAM_MATERIALS)],
            PropertyData::Pshell {
                mid1, mid2, mid3, ..
            } => [
                ("MID1", *mid1, SHELL_MATERIALS),
                ("MID2", *mid2, SHELL_MATERIALS),
                ("MID3", *mid3, SHELL_SHEAR_MATERIALS),
            ]
            .into_iter()
            .filter_map(|(field, mid, accepted)| mid.map(|mid| (field, mid, accepted)))
            .collect(),
            PropertyData::Pcomp { plies } => plies
                .iter()
                .map(|ply| ("MID", ply.mid, SHELL_MATERIALS))
                .collect(),
            PropertyData::Psolid { mid } => vec![("MID", *mid, SOLID_MATERIALS)],
            PropertyData::Pelas { .. }
            | PropertyData::Pdamp { .. }
            | PropertyData::Pbush { .. }
            | PropertyData::Pbush1d { .. } => Vec::new(),
        }
    }
}

/// Resolved material references, in field order
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyLinks {
    pub materials: Vec<Handle<Material>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub pid: i32,
    #[serde(flatten)]
    pub data: PropertyData,
    #[serde(skip)]
    links: Option<PropertyLinks>,
}

impl Property {
    pub fn new(pid: i32, data: PropertyData) -> Self {
        Self {
            pid,
            data,
            links: None,
        }
    }

    pub fn kind(&self) -> PropertyKind {
        match self.data {
            PropertyData::Prod { .. } => PropertyKind::Prod,
            PropertyData::Ptube { .. } => PropertyKind::Ptube,
            PropertyData::Pbar { .. } => PropertyKind::Pbar,
            PropertyData::Pbeam { .. } => PropertyKind::Pbeam,
            PropertyData::Pshell { .. } => PropertyKind::Pshell,
            PropertyData::Pcomp { .. } => PropertyKind::Pcomp,
            PropertyData::Psolid { .. } => PropertyKind::Psolid,
            PropertyData::Pelas { .. } => PropertyKind::Pelas,
            PropertyData::Pdamp { .. } => PropertyKind::Pdamp,
            PropertyData::Pbush { .. } => PropertyKind::Pbush,
            PropertyData::Pbush1d { .. } => PropertyKind::Pbush1d,
        }
    }

    pub fn links(&self) -> Option<&PropertyLinks> {
        self.links.as_ref()
    }

    /// Material IDs referenced by the property
    pub fn material_ids(&self) -> Vec<i32> {
        self.data.material_slots().into_iter().map(|(_, mid, _)| mid).collect()
    }

    /// Total laminate or shell thickness
    pub fn thickness(&self) -> Option<f64> {
        match &self.data {
            PropertyData::Pshell { t, .. } => Some(*t),
            PropertyData::Pcomp { plies } => Some(plies.iter().map(|p| p.t).sum()),
            _ => None,
        }
    }
}

impl Card for Property {
    fn card(&self) -> &'static str {
        self.kind().card()
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new(self.card(), self.pid)
    }
}

impl Keyed for Property {
    fn id(&self) -> i32 {
        self.pid
    }
}

impl Resolvable for Property {
    type Links = PropertyLinks;

    fn resolve(&self, model: &Model) -> Result<PropertyLinks, StructuralError> {
        let entity = self.entity();
        match &self.data {
            PropertyData::Pshell { mid1: None, mid2: None, .. } => {
                return Err(StructuralError::malformed(entity, "MID1 and MID2 are both blank"));
            }
            PropertyData::Pcomp { plies } if plies.is_empty() => {
                return Err(StructuralError::malformed(entity, "no plies"));
            }
            _ => {}
        }

        let materials = self
            .data
            .material_slots()
            .into_iter()
            .map(|(field, mid, accepted)| material_ref(model, &entity, field, mid, accepted))
            .collect::<Result<_, _>>()?;
        Ok(PropertyLinks { materials })
    }

    fn link(&mut self, links: PropertyLinks) {
        self.links = Some(links);
    }

    fn unlink(&mut self) {
        self.links = None;
    }

    fn is_cross_referenced(&self) -> bool {
        self.links.is_some()
    }
}
