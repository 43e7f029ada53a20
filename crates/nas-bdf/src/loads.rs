//! Static loads, load combinations and dynamic load cards.

use serde::{Deserialize, Serialize};

use crate::collection::{Card, Handle, SetKey};
use crate::coords::Coord;
use crate::elements::{Element, ElementFamily};
use crate::error::{EntityRef, StructuralError};
use crate::materials::{Table, TableKind, table_ref};
use crate::model::Model;
use crate::nodes::{Grid, grid_ref};
use crate::resolvable::Resolvable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "card", rename_all = "UPPERCASE")]
pub enum LoadData {
    Force {
        node: i32,
        #[serde(default)]
        cid: i32,
        scale: f64,
        vector: [f64; 3],
    },
    Moment {
        node: i32,
        #[serde(default)]
        cid: i32,
        scale: f64,
        vector: [f64; 3],
    },
    /// Force along the line from `g1` to `g2`
    Force1 {
        node: i32,
        scale: f64,
        g1: i32,
        g2: i32,
    },
    /// Pressure on plate faces or solid faces, optionally over an EID range
    Pload4 {
        eid: i32,
        pressures: [f64; 4],
        #[serde(default)]
        eid_thru: Option<i32>,
        #[serde(default)]
        cid: Option<i32>,
        #[serde(default)]
        direction: Option<[f64; 3]>,
    },
    Grav {
        #[serde(default)]
        cid: i32,
        scale: f64,
        vector: [f64; 3],
    },
    /// Linear combination of other load sets
    Load {
        scale: f64,
        factors: Vec<(f64, i32)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadLinks {
    Point {
        node: Handle<Grid>,
        coord: Handle<Coord>,
    },
    Direction {
        node: Handle<Grid>,
        from: Handle<Grid>,
        to: Handle<Grid>,
    },
    Pressure {
        elements: Vec<Handle<Element>>,
        coord: Option<Handle<Coord>>,
    },
    Gravity {
        coord: Handle<Coord>,
    },
    Combination(Vec<SetKey<Load>>),
}

/// A static load card; several may share a load set ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Load {
    pub sid: i32,
    #[serde(flatten)]
    pub data: LoadData,
    #[serde(skip)]
    links: Option<LoadLinks>,
}

impl Load {
    pub fn new(sid: i32, data: LoadData) -> Self {
        Self {
            sid,
            data,
            links: None,
        }
    }

    pub fn links(&self) -> Option<&LoadLinks> {
        self.links.as_ref()
    }

    pub fn is_combination(&self) -> bool {
        matches!(self.data, LoadData::Load { .. })
    }
}

impl Card for Load {
    fn card(&self) -> &'static str {
        match self.data {
            LoadData::Force { .. } => "FORCE",
            LoadData::Moment { .. } => "MOMENT",
            LoadData::Force1 { .. } => "FORCE1",
            LoadData::Pload4 { .. } => "PLOAD4",
            LoadData::Grav { .. } => "GRAV",
            LoadData::Load { .. } => "LOAD",
        }
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new(self.card(), self.sid)
    }
}

fn coord_ref(
    model: &Model,
    entity: &EntityRef,
    cid: i32,
) -> Result<Handle<Coord>, StructuralError> {
    model
        .coords
        .handle(cid)
        .ok_or_else(|| StructuralError::missing(entity.clone(), "coordinate system", cid))
}

impl Resolvable for Load {
    type Links = LoadLinks;

    fn resolve(&self, model: &Model) -> Result<LoadLinks, StructuralError> {
        let entity = self.entity();
        match &self.data {
            LoadData::Force { node, cid, .. } | LoadData::Moment { node, cid, .. } => {
                Ok(LoadLinks::Point {
                    node: grid_ref(model, &entity, *node)?,
                    coord: coord_ref(model, &entity, *cid)?,
                })
            }
            LoadData::Force1 { node, g1, g2, .. } => {
                if g1 == g2 {
                    return Err(StructuralError::malformed(entity, "G1 and G2 must differ"));
                }
                Ok(LoadLinks::Direction {
                    node: grid_ref(model, &entity, *node)?,
                    from: grid_ref(model, &entity, *g1)?,
                    to: grid_ref(model, &entity, *g2)?,
                })
            }
            LoadData::Pload4 {
                eid, eid_thru, cid, ..
            } => {
                let last = eid_thru.unwrap_or(*eid);
                if last < *eid {
                    return Err(StructuralError::malformed(entity, "EID range is reversed"));
                }
                let elements = (*eid..=last)
                    .map(|id| {
                        let handle = model
                            .elements
                            .handle(id)
                            .ok_or_else(|| {
                                StructuralError::missing(entity.clone(), "element", id)
                            })?;
                        let kind = model.elements[handle].kind;
                        match kind.family() {
                            ElementFamily::Plate | ElementFamily::Solid => Ok(handle),
                            _ => Err(StructuralError::TypeMismatch {
                                entity: entity.clone(),
                                field: "EID",
                                expected: "plate or solid element".to_string(),
                                found: kind.card(),
                            }),
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let coord = cid.map(|cid| coord_ref(model, &entity, cid)).transpose()?;
                Ok(LoadLinks::Pressure { elements, coord })
            }
            LoadData::Grav { cid, vector, .. } => {
                if vector.iter().all(|v| *v == 0.0) {
                    return Err(StructuralError::malformed(entity, "zero direction vector"));
                }
                Ok(LoadLinks::Gravity {
                    coord: coord_ref(model, &entity, *cid)?,
                })
            }
            LoadData::Load { factors, .. } => {
                let keys = factors
                    .iter()
                    .map(|&(_, sid)| {
                        if sid == self.sid {
                            return Err(StructuralError::malformed(
                                entity.clone(),
                                "LOAD references its own set",
                            ));
                        }
                        let key = model
                            .loads
                            .key(&sid)
                            .ok_or_else(|| {
                                StructuralError::missing(entity.clone(), "load set", sid)
                            })?;
                        if model.loads.get(&sid).iter().any(Load::is_combination) {
                            return Err(StructuralError::TypeMismatch {
                                entity: entity.clone(),
                                field: "Li",
                                expected: "FORCE/MOMENT/PLOAD4/GRAV set".to_string(),
                                found: "LOAD",
                            });
                        }
                        Ok(key)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(LoadLinks::Combination(keys))
            }
        }
    }

    fn link(&mut self, links: LoadLinks) {
        self.links = Some(links);
    }

    fn unlink(&mut self) {
        self.links = None;
    }

    fn is_cross_referenced(&self) -> bool {
        self.links.is_some()
    }
}

/// DLOAD: combination of dynamic load sets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicLoadCombination {
    pub sid: i32,
    pub scale: f64,
    pub factors: Vec<(f64, i32)>,
    #[serde(skip)]
    links: Option<Vec<SetKey<DynamicLoadEntry>>>,
}

impl DynamicLoadCombination {
    pub fn new(sid: i32, scale: f64, factors: Vec<(f64, i32)>) -> Self {
        Self {
            sid,
            scale,
            factors,
            links: None,
        }
    }

    pub fn links(&self) -> Option<&[SetKey<DynamicLoadEntry>]> {
        self.links.as_deref()
    }
}

impl Card for DynamicLoadCombination {
    fn card(&self) -> &'static str {
        "DLOAD"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("DLOAD", self.sid)
    }
}

impl Resolvable for DynamicLoadCombination {
    type Links = Vec<SetKey<DynamicLoadEntry>>;

    fn resolve(&self, model: &Model) -> Result<Self::Links, StructuralError> {
        if self.factors.is_empty() {
            return Err(StructuralError::malformed(self.entity(), "no load sets"));
        }
        self.factors
            .iter()
            .map(|&(_, sid)| {
                model.dload_entries.key(&sid).ok_or_else(|| {
                    StructuralError::missing(self.entity(), "dynamic load set", sid)
                })
            })
            .collect()
    }

    fn link(&mut self, links: Self::Links) {
        self.links = Some(links);
    }

    fn unlink(&mut self) {
        self.links = None;
    }

    fn is_cross_referenced(&self) -> bool {
        self.links.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "card", rename_all = "UPPERCASE")]
pub enum DynamicLoadData {
    /// Frequency response, C(f) + iD(f)
    Rload1 {
        excite_id: i32,
        #[serde(default)]
        tc: Option<i32>,
        #[serde(default)]
        td: Option<i32>,
    },
    /// Frequency response, B(f) e^{i phi(f)}
    Rload2 {
        excite_id: i32,
        #[serde(default)]
        tb: Option<i32>,
        #[serde(default)]
        tp: Option<i32>,
    },
    /// Transient, F(t - tau)
    Tload1 {
        excite_id: i32,
        tid: i32,
        #[serde(default)]
        delay: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DynamicLoadLinks {
    pub excite: SetKey<Load>,
    pub tables: Vec<Handle<Table>>,
}

/// RLOAD1 / RLOAD2 / TLOAD1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicLoadEntry {
    pub sid: i32,
    #[serde(flatten)]
    pub data: DynamicLoadData,
    #[serde(skip)]
    links: Option<DynamicLoadLinks>,
}

impl DynamicLoadEntry {
    pub fn new(sid: i32, data: DynamicLoadData) -> Self {
        Self {
            sid,
            data,
            links: None,
        }
    }

    pub fn links(&self) -> Option<&DynamicLoadLinks> {
        self.links.as_ref()
    }
}

impl Card for DynamicLoadEntry {
    fn card(&self) -> &'static str {
        match self.data {
            DynamicLoadData::Rload1 { .. } => "RLOAD1",
            DynamicLoadData::Rload2 { .. } => "RLOAD2",
            DynamicLoadData::Tload1 { .. } => "TLOAD1",
        }
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new(self.card(), self.sid)
    }
}

impl Resolvable for DynamicLoadEntry {
    type Links = DynamicLoadLinks;

    fn resolve(&self, model: &Model) -> Result<DynamicLoadLinks, StructuralError> {
        let entity = self.entity();
        let (excite_id, table_fields): (i32, Vec<(&'static str, i32)>) = match &self.data {
            DynamicLoadData::Rload1 { excite_id, tc, td } => (
                *excite_id,
                [("TC", *tc), ("TD", *td)]
                    .into_iter()
                    .filter_map(|(f, t)| t.map(|t| (f, t)))
                    .collect(),
            ),
            DynamicLoadData::Rload2 { excite_id, tb, tp } => (
                *excite_id,
                [("TB", *tb), ("TP", *tp)]
                    .into_iter()
                    .filter_map(|(f, t)| t.map(|t| (f, t)))
                    .collect(),
            ),
            DynamicLoadData::Tload1 { excite_id, tid, .. } => (*excite_id, vec![("TID", *tid)]),
        };
        if table_fields.is_empty() {
            return Err(StructuralError::malformed(entity, "no tables given"));
        }

        let excite = model
            .loads
            .key(&excite_id)
            .ok_or_else(|| StructuralError::missing(entity.clone(), "load set", excite_id))?;
        let tables = table_fields
            .into_iter()
            .map(|(field, tid)| table_ref(model, &entity, field, tid, TableKind::Tabled1))
            .collect::<Result<_, _>>()?;
        Ok(DynamicLoadLinks { excite, tables })
    }

    fn link(&mut self, links: DynamicLoadLinks) {
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
    fn load_json_tags() {
        let json = r#"{"sid": 1, "card": "LOAD", "scale": 1.0, "factors": [[2.0, 10], [0.5, 20]]}"#;
        let load: Load = serde_json::from_str(json).unwrap();
        assert!(load.is_combination());
        assert_eq!(load.card(), "LOAD");

        let json = r#"{"sid": 4, "card": "TLOAD1", "excite_id": 1, "tid": 9}"#;
        let entry: DynamicLoadEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.card(), "TLOAD1");
    }
}
