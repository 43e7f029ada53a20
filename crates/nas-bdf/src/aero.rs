//! Aeroelastic panels, splines and the aero control/parameter cards.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::collection::{Card, Handle, Keyed};
use crate::coords::Coord;
use crate::error::{EntityRef, StructuralError};
use crate::model::Model;
use crate::nodes::{Grid, grid_ref};
use crate::resolvable::Resolvable;

/// CAERO1 lifting-surface panel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caero1 {
    pub eid: i32,
    pub pid: i32,
    #[serde(default)]
    pub cp: i32,
    /// Equal spanwise boxes; ignored when `lspan` is given
    #[serde(default)]
    pub nspan: usize,
    #[serde(default)]
    pub nchord: usize,
    /// AEFACT with spanwise division points
    #[serde(default)]
    pub lspan: Option<i32>,
    #[serde(default)]
    pub lchord: Option<i32>,
    #[serde(default = "default_igid")]
    pub igid: i32,
    pub p1: [f64; 3],
    pub x12: f64,
    pub p4: [f64; 3],
    pub x43: f64,
    #[serde(skip)]
    links: Option<Caero1Links>,
}

fn default_igid() -> i32 {
    1
}

#[derive(Debug, Clone, PartialEq)]
pub struct Caero1Links {
    pub property: Handle<Paero1>,
    pub coord: Handle<Coord>,
    pub lspan: Option<Handle<Aefact>>,
    pub lchord: Option<Handle<Aefact>>,
}

impl Caero1 {
    pub fn new(eid: i32, pid: i32, nspan: usize, nchord: usize) -> Self {
        Self {
            eid,
            pid,
            cp: 0,
            nspan,
            nchord,
            lspan: None,
            lchord: None,
            igid: 1,
            p1: [0.0; 3],
            x12: 1.0,
            p4: [0.0, 1.0, 0.0],
            x43: 1.0,
            links: None,
        }
    }

    pub fn links(&self) -> Option<&Caero1Links> {
        self.links.as_ref()
    }

    /// Spanwise and chordwise box counts, using the AEFACT division points
    /// when given
    pub fn box_counts(&self, model: &Model) -> Option<(usize, usize)> {
        let divisions = |count: usize, list: Option<i32>| match list {
            Some(sid) => model.aefacts.get(sid).and_then(|f| f.values.len().checked_sub(1)),
            None => Some(count),
        };
        Some((
            divisions(self.nspan, self.lspan)?,
            divisions(self.nchord, self.lchord)?,
        ))
    }

    /// Aero box IDs numbered from the panel EID
    pub fn box_ids(&self, model: &Model) -> Result<RangeInclusive<i32>, StructuralError> {
        let malformed = |message: &str| StructuralError::malformed(self.entity(), message);
        let (nspan, nchord) = self
            .box_counts(model)
            .ok_or_else(|| malformed("division AEFACT is missing or empty"))?;
        let count = nspan
            .checked_mul(nchord)
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| malformed("box count overflows"))?;
        if count == 0 {
            return Err(malformed("panel has no boxes"));
        }
        let last = self
            .eid
            .checked_add(count - 1)
            .ok_or_else(|| malformed("box IDs overflow"))?;
        Ok(self.eid..=last)
    }
}

impl Card for Caero1 {
    fn card(&self) -> &'static str {
        "CAERO1"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("CAERO1", self.eid)
    }
}

impl Keyed for Caero1 {
    fn id(&self) -> i32 {
        self.eid
    }
}

impl Resolvable for Caero1 {
    type Links = Caero1Links;

    fn resolve(&self, model: &Model) -> Result<Caero1Links, StructuralError> {
        let entity = self.entity();
        let property = model
            .paeros
            .handle(self.pid)
            .ok_or_else(|| StructuralError::missing(entity.clone(), "PAERO1", self.pid))?;
        let coord = model
            .coords
            .handle(self.cp)
            .ok_or_else(|| StructuralError::missing(entity.clone(), "coordinate system", self.cp))?;
        let aefact = |sid: Option<i32>| {
            sid.map(|sid| {
                model
                    .aefacts
                    .handle(sid)
                    .ok_or_else(|| StructuralError::missing(entity.clone(), "AEFACT", sid))
            })
            .transpose()
        };
        let lspan = aefact(self.lspan)?;
        let lchord = aefact(self.lchord)?;

        self.box_ids(model)?;
        if self.x12 <= 0.0 && self.x43 <= 0.0 {
            return Err(StructuralError::DegenerateGeometry {
                entity: self.entity(),
                message: "both chords are zero".to_string(),
            });
        }

        Ok(Caero1Links {
            property,
            coord,
            lspan,
            lchord,
        })
    }

    fn link(&mut self, links: Caero1Links) {
        self.links = Some(links);
    }

    fn unlink(&mut self) {
        self.links = None;
    }

    fn is_cross_referenced(&self) -> bool {
        self.links.is_some()
    }
}

/// PAERO1: lists the bodies (other CAERO panels) interfering with a panel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paero1 {
    pub pid: i32,
    #[serde(default)]
    pub bodies: Vec<i32>,
    #[serde(skip)]
    links: Option<Vec<Handle<Caero1>>>,
}

impl Paero1 {
    pub fn new(pid: i32) -> Self {
        Self {
            pid,
            bodies: Vec::new(),
            links: None,
        }
    }
}

impl Card for Paero1 {
    fn card(&self) -> &'static str {
        "PAERO1"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("PAERO1", self.pid)
    }
}

impl Keyed for Paero1 {
    fn id(&self) -> i32 {
        self.pid
    }
}

impl Resolvable for Paero1 {
    type Links = Vec<Handle<Caero1>>;

    fn resolve(&self, model: &Model) -> Result<Self::Links, StructuralError> {
        self.bodies
            .iter()
            .map(|&eid| {
                model
                    .caeros
                    .handle(eid)
                    .ok_or_else(|| StructuralError::missing(self.entity(), "CAERO", eid))
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

/// SPLINE1: surface spline between a box range of a panel and a SET1 of grids
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spline1 {
    pub eid: i32,
    pub caero: i32,
    pub box1: i32,
    pub box2: i32,
    pub setg: i32,
    #[serde(default)]
    pub dz: f64,
    #[serde(skip)]
    links: Option<SplineLinks>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplineLinks {
    pub caero: Handle<Caero1>,
    pub set: Handle<Set1>,
    pub grids: Vec<Handle<Grid>>,
}

impl Spline1 {
    pub fn new(eid: i32, caero: i32, box1: i32, box2: i32, setg: i32) -> Self {
        Self {
            eid,
            caero,
            box1,
            box2,
            setg,
            dz: 0.0,
            links: None,
        }
    }

    pub fn links(&self) -> Option<&SplineLinks> {
        self.links.as_ref()
    }
}

impl Card for Spline1 {
    fn card(&self) -> &'static str {
        "SPLINE1"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("SPLINE1", self.eid)
    }
}

impl Keyed for Spline1 {
    fn id(&self) -> i32 {
        self.eid
    }
}

impl Resolvable for Spline1 {
    type Links = SplineLinks;

    fn resolve(&self, model: &Model) -> Result<SplineLinks, StructuralError> {
        let entity = self.entity();
        let caero = model
            .caeros
            .handle(self.caero)
            .ok_or_else(|| StructuralError::missing(entity.clone(), "CAERO", self.caero))?;
        let boxes = model.caeros[caero].box_ids(model).map_err(|_| {
            StructuralError::malformed(entity.clone(), format!("CAERO {} has no boxes", self.caero))
        })?;
        if self.box1 > self.box2 || !boxes.contains(&self.box1) || !boxes.contains(&self.box2) {
            return Err(StructuralError::malformed(
                entity,
                format!(
                    "boxes {}..{} outside panel range {}..{}",
                    self.box1,
                    self.box2,
                    boxes.start(),
                    boxes.end()
                ),
            ));
        }

        let set = model
            .set1s
            .handle(self.setg)
            .ok_or_else(|| StructuralError::missing(entity.clone(), "SET1", self.setg))?;
        let grids = model.set1s[set]
            .ids
            .iter()
            .map(|&nid| grid_ref(model, &entity, nid))
            .collect::<Result<_, _>>()?;
        Ok(SplineLinks { caero, set, grids })
    }

    fn link(&mut self, links: SplineLinks) {
        self.links = Some(links);
    }

    fn unlink(&mut self) {
        self.links = None;
    }

    fn is_cross_referenced(&self) -> bool {
        self.links.is_some()
    }
}

/// Kind of list an AECOMP gathers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AecompListType {
    Set1,
    Aelist,
    Caero,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AecompLinks {
    Set1(Vec<Handle<Set1>>),
    Aelist(Vec<Handle<Aelist>>),
    Caero(Vec<Handle<Caero1>>),
}

/// AECOMP: named aero component made of lists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aecomp {
    pub name: String,
    pub list_type: AecompListType,
    pub lists: Vec<i32>,
    #[serde(skip)]
    links: Option<AecompLinks>,
}

impl Aecomp {
    pub fn new(name: &str, list_type: AecompListType, lists: &[i32]) -> Self {
        Self {
            name: name.to_string(),
            list_type,
            lists: lists.to_vec(),
            links: None,
        }
    }

    pub fn links(&self) -> Option<&AecompLinks> {
        self.links.as_ref()
    }
}

impl Card for Aecomp {
    fn card(&self) -> &'static str {
        "AECOMP"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::labelled("AECOMP", &self.name)
    }
}

impl Resolvable for Aecomp {
    type Links = AecompLinks;

    fn resolve(&self, model: &Model) -> Result<AecompLinks, StructuralError> {
        let entity = self.entity();
        let ids = self.lists.iter().copied();
        Ok(match self.list_type {
            AecompListType::Set1 => AecompLinks::Set1(
                ids.map(|id| {
                    model
                        .set1s
                        .handle(id)
                        .ok_or_else(|| StructuralError::missing(entity.clone(), "SET1", id))
                })
                .collect::<Result<_, _>>()?,
            ),
            AecompListType::Aelist => AecompLinks::Aelist(
                ids.map(|id| {
                    model
                        .aelists
                        .handle(id)
                        .ok_or_else(|| StructuralError::missing(entity.clone(), "AELIST", id))
                })
                .collect::<Result<_, _>>()?,
            ),
            AecompListType::Caero => AecompLinks::Caero(
                ids.map(|id| {
                    model
                        .caeros
                        .handle(id)
                        .ok_or_else(|| StructuralError::missing(entity.clone(), "CAERO", id))
                })
                .collect::<Result<_, _>>()?,
            ),
        })
    }

    fn link(&mut self, links: AecompLinks) {
        self.links = Some(links);
    }

    fn unlink(&mut self) {
        self.links = None;
    }

    fn is_cross_referenced(&self) -> bool {
        self.links.is_some()
    }
}

/// AELIST: aero box IDs; links to the panels owning them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aelist {
    pub sid: i32,
    pub elements: Vec<i32>,
    #[serde(skip)]
    links: Option<Vec<Handle<Caero1>>>,
}

impl Aelist {
    pub fn new(sid: i32, elements: &[i32]) -> Self {
        Self {
            sid,
            elements: elements.to_vec(),
            links: None,
        }
    }

    /// Distinct panels the boxes belong to, in first-seen order
    pub fn links(&self) -> Option<&[Handle<Caero1>]> {
        self.links.as_deref()
    }
}

impl Card for Aelist {
    fn card(&self) -> &'static str {
        "AELIST"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("AELIST", self.sid)
    }
}

impl Keyed for Aelist {
    fn id(&self) -> i32 {
        self.sid
    }
}

impl Resolvable for Aelist {
    type Links = Vec<Handle<Caero1>>;

    fn resolve(&self, model: &Model) -> Result<Self::Links, StructuralError> {
        let ranges: Vec<(Handle<Caero1>, RangeInclusive<i32>)> = model
            .caeros
            .handles()
            .filter_map(|h| model.caeros[h].box_ids(model).ok().map(|r| (h, r)))
            .collect();

        let mut panels = Vec::new();
        for &id in &self.elements {
            let (panel, _) = ranges
                .iter()
                .find(|(_, r)| r.contains(&id))
                .ok_or_else(|| StructuralError::missing(self.entity(), "aero box", id))?;
            if !panels.contains(panel) {
                panels.push(*panel);
            }
        }
        Ok(panels)
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

/// AEPARAM: general trim parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aeparam {
    pub id: i32,
    pub label: String,
    #[serde(default)]
    pub units: String,
    #[serde(skip)]
    checked: bool,
}

/// AESTAT: rigid-body trim variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aestat {
    pub id: i32,
    pub label: String,
    #[serde(skip)]
    checked: bool,
}

impl Aeparam {
    pub fn new(id: i32, label: &str) -> Self {
        Self {
            id,
            label: label.to_string(),
            units: String::new(),
            checked: false,
        }
    }
}

impl Aestat {
    pub fn new(id: i32, label: &str) -> Self {
        Self {
            id,
            label: label.to_string(),
            checked: false,
        }
    }
}

/// Labels are at most eight characters and unique within the category
fn check_label(
    model_labels: impl Iterator<Item = (i32, String)>,
    entity: EntityRef,
    id: i32,
    label: &str,
) -> Result<(), StructuralError> {
    if label.is_empty() || label.len() > 8 {
        return Err(StructuralError::malformed(
            entity,
            format!("label '{label}' must be 1-8 characters"),
        ));
    }
    for (other, other_label) in model_labels {
        if other != id && other_label.eq_ignore_ascii_case(label) {
            return Err(StructuralError::malformed(
                entity,
                format!("label '{label}' also used by id {other}"),
            ));
        }
    }
    Ok(())
}

impl Card for Aeparam {
    fn card(&self) -> &'static str {
        "AEPARAM"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("AEPARAM", self.id)
    }
}

impl Keyed for Aeparam {
    fn id(&self) -> i32 {
        self.id
    }
}

impl Resolvable for Aeparam {
    type Links = ();

    fn resolve(&self, model: &Model) -> Result<(), StructuralError> {
        let labels = model.aeparams.iter().map(|p| (p.id, p.label.clone()));
        check_label(labels, self.entity(), self.id, &self.label)
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

impl Card for Aestat {
    fn card(&self) -> &'static str {
        "AESTAT"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("AESTAT", self.id)
    }
}

impl Keyed for Aestat {
    fn id(&self) -> i32 {
        self.id
    }
}

impl Resolvable for Aestat {
    type Links = ();

    fn resolve(&self, model: &Model) -> Result<(), StructuralError> {
        let labels = model.aestats.iter().map(|s| (s.id, s.label.clone()));
        check_label(labels, self.entity(), self.id, &self.label)
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

/// AESURF: control surface hinge frames and box lists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aesurf {
    pub id: i32,
    pub label: String,
    pub cid1: i32,
    pub alid1: i32,
    #[serde(default)]
    pub cid2: Option<i32>,
    #[serde(default)]
    pub alid2: Option<i32>,
    #[serde(skip)]
    links: Option<AesurfLinks>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AesurfLinks {
    pub coords: Vec<Handle<Coord>>,
    pub aelists: Vec<Handle<Aelist>>,
}

impl Aesurf {
    pub fn new(id: i32, label: &str, cid1: i32, alid1: i32) -> Self {
        Self {
            id,
            label: label.to_string(),
            cid1,
            alid1,
            cid2: None,
            alid2: None,
            links: None,
        }
    }

    pub fn links(&self) -> Option<&AesurfLinks> {
        self.links.as_ref()
    }
}

impl Card for Aesurf {
    fn card(&self) -> &'static str {
        "AESURF"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("AESURF", self.id)
    }
}

impl Keyed for Aesurf {
    fn id(&self) -> i32 {
        self.id
    }
}

impl Resolvable for Aesurf {
    type Links = AesurfLinks;

    fn resolve(&self, model: &Model) -> Result<AesurfLinks, StructuralError> {
        let entity = self.entity();
        if self.cid2.is_some() != self.alid2.is_some() {
            return Err(StructuralError::malformed(
                entity,
                "CID2 and ALID2 must be given together",
            ));
        }
        let coords = std::iter::once(self.cid1)
            .chain(self.cid2)
            .map(|cid| {
                model
                    .coords
                    .handle(cid)
                    .ok_or_else(|| {
                        StructuralError::missing(entity.clone(), "coordinate system", cid)
                    })
            })
            .collect::<Result<_, _>>()?;
        let aelists = std::iter::once(self.alid1)
            .chain(self.alid2)
            .map(|sid| {
                model
                    .aelists
                    .handle(sid)
                    .ok_or_else(|| StructuralError::missing(entity.clone(), "AELIST", sid))
            })
            .collect::<Result<_, _>>()?;
        Ok(AesurfLinks { coords, aelists })
    }

    fn link(&mut self, links: AesurfLinks) {
        self.links = Some(links);
    }

    fn unlink(&mut self) {
        self.links = None;
    }

    fn is_cross_referenced(&self) -> bool {
        self.links.is_some()
    }
}

/// AESURFS: structural grids of a control surface through SET1 lists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aesurfs {
    pub id: i32,
    pub label: String,
    pub list1: i32,
    pub list2: i32,
    #[serde(skip)]
    links: Option<[Handle<Set1>; 2]>,
}

impl Aesurfs {
    pub fn new(id: i32, label: &str, list1: i32, list2: i32) -> Self {
        Self {
            id,
            label: label.to_string(),
            list1,
            list2,
            links: None,
        }
    }

    pub fn links(&self) -> Option<&[Handle<Set1>; 2]> {
        self.links.as_ref()
    }
}

impl Card for Aesurfs {
    fn card(&self) -> &'static str {
        "AESURFS"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("AESURFS", self.id)
    }
}

impl Keyed for Aesurfs {
    fn id(&self) -> i32 {
        self.id
    }
}

impl Resolvable for Aesurfs {
    type Links = [Handle<Set1>; 2];

    fn resolve(&self, model: &Model) -> Result<Self::Links, StructuralError> {
        let set = |sid: i32| {
            model
                .set1s
                .handle(sid)
                .ok_or_else(|| StructuralError::missing(self.entity(), "SET1", sid))
        };
        Ok([set(self.list1)?, set(self.list2)?])
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

/// AEFACT: list of real numbers (division points, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aefact {
    pub sid: i32,
    pub values: Vec<f64>,
}

impl Card for Aefact {
    fn card(&self) -> &'static str {
        "AEFACT"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("AEFACT", self.sid)
    }
}

impl Keyed for Aefact {
    fn id(&self) -> i32 {
        self.sid
    }
}

/// SET1: list of structural grid IDs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Set1 {
    pub sid: i32,
    pub ids: Vec<i32>,
}

impl Card for Set1 {
    fn card(&self) -> &'static str {
        "SET1"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("SET1", self.sid)
    }
}

impl Keyed for Set1 {
    fn id(&self) -> i32 {
        self.sid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_rules() {
        let e = EntityRef::new("AESTAT", 1);
        let others = || vec![(1, "ANGLEA".to_string()), (2, "PITCH".to_string())].into_iter();
        assert!(check_label(others(), e.clone(), 1, "ANGLEA").is_ok());
        assert!(check_label(others(), e.clone(), 3, "pitch").is_err());
        assert!(check_label(others(), e.clone(), 3, "TOOLONGLABEL").is_err());
        assert!(check_label(others(), e, 3, "").is_err());
    }

    #[test]
    fn caero_defaults_from_json() {
        let json = r#"{"eid": 1001, "pid": 1, "nspan": 4, "nchord": 2,
                       "p1": [0, 0, 0], "x12": 1.0, "p4": [0, 5, 0], "x43": 0.8}"#;
        let panel: Caero1 = serde_json::from_str(json).unwrap();
        assert_eq!(panel.igid, 1);
        assert_eq!(panel.cp, 0);
        assert!(panel.lspan.is_none());
    }

    #[test]
    fn box_ids_reject_overflow() {
        let model = Model::new();
        assert_eq!(Caero1::new(1001, 1, 4, 2).box_ids(&model).unwrap(), 1001..=1008);

        let near_max = Caero1::new(i32::MAX - 2, 1, 2, 2);
        assert!(near_max.box_ids(&model).is_err());

        let huge = Caero1::new(1, 1, usize::MAX, 2);
        let err = huge.box_ids(&model).unwrap_err();
        assert!(err.to_string().contains("box count overflows"));

        assert!(Caero1::new(1, 1, 0, 2).box_ids(&model).is_err());
    }
}
