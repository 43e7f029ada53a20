//! Materials, material tables and the MATS/MATT/CREEP dependency cards.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::collection::{Arena, Card, Collection, Handle, Keyed};
use crate::error::{EntityRef, ModelError, StructuralError};
use crate::model::Model;
use crate::resolvable::Resolvable;

/// Material card family
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MaterialKind {
    Mat1,
    Mat2,
    Mat3,
    Mat4,
    Mat5,
    Mat8,
    Mat9,
}

impl MaterialKind {
    pub fn card(self) -> &'static str {
        match self {
            MaterialKind::Mat1 => "MAT1",
            MaterialKind::Mat2 => "MAT2",
            MaterialKind::Mat3 => "MAT3",
            MaterialKind::Mat4 => "MAT4",
            MaterialKind::Mat5 => "MAT5",
            MaterialKind::Mat8 => "MAT8",
            MaterialKind::Mat9 => "MAT9",
        }
    }
}

/// Card-specific material constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "card", rename_all = "UPPERCASE")]
pub enum MaterialData {
    /// Isotropic; at least one of `e` and `g` must be given
    Mat1 {
        #[serde(default)]
        e: Option<f64>,
        #[serde(default)]
        g: Option<f64>,
        #[serde(default)]
        nu: Option<f64>,
        #[serde(default)]
        rho: f64,
    },
    /// Anisotropic shell, upper triangle of the 3x3 stiffness
    Mat2 {
        g: [f64; 6],
        #[serde(default)]
        rho: f64,
    },
    /// Orthotropic axisymmetric
    Mat3 {
        ex: f64,
        eth: f64,
        ez: f64,
        #[serde(default)]
        rho: f64,
    },
    /// Isotropic thermal
    Mat4 {
        k: f64,
        #[serde(default)]
        cp: f64,
        #[serde(default)]
        rho: f64,
    },
    /// Anisotropic thermal, upper triangle of the conductivity
    Mat5 {
        k: [f64; 6],
        #[serde(default)]
        cp: f64,
        #[serde(default)]
        rho: f64,
    },
    /// Orthotropic shell
    Mat8 {
        e1: f64,
        e2: f64,
        nu12: f64,
        #[serde(default)]
        g12: f64,
        #[serde(default)]
        rho: f64,
    },
    /// Anisotropic solid, upper triangle of the 6x6 stiffness
    Mat9 {
        g: Vec<f64>,
        #[serde(default)]
        rho: f64,
    },
}

/// A material card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub mid: i32,
    #[serde(flatten)]
    pub data: MaterialData,
    #[serde(skip)]
    validated: bool,
}

impl Material {
    pub fn new(mid: i32, data: MaterialData) -> Self {
        Self {
            mid,
            data,
            validated: false,
        }
    }

    /// Isotropic MAT1 from Young's modulus and Poisson's ratio
    pub fn isotropic(mid: i32, e: f64, nu: f64, rho: f64) -> Self {
        Self::new(
            mid,
            MaterialData::Mat1 {
                e: Some(e),
                g: None,
                nu: Some(nu),
                rho,
            },
        )
    }

    pub fn kind(&self) -> MaterialKind {
        match self.data {
            MaterialData::Mat1 { .. } => MaterialKind::Mat1,
            MaterialData::Mat2 { .. } => MaterialKind::Mat2,
            MaterialData::Mat3 { .. } => MaterialKind::Mat3,
            MaterialData::Mat4 { .. } => MaterialKind::Mat4,
            MaterialData::Mat5 { .. } => MaterialKind::Mat5,
            MaterialData::Mat8 { .. } => MaterialKind::Mat8,
            MaterialData::Mat9 { .. } => MaterialKind::Mat9,
        }
    }

    pub fn density(&self) -> f64 {
        match self.data {
            MaterialData::Mat1 { rho, .. }
            | MaterialData::Mat2 { rho, .. }
            | MaterialData::Mat3 { rho, .. }
            | MaterialData::Mat4 { rho, .. }
            | MaterialData::Mat5 { rho, .. }
            | MaterialData::Mat8 { rho, .. }
            | MaterialData::Mat9 { rho, .. } => rho,
        }
    }

    /// Shear modulus of a MAT1, derived from E and nu when left blank
    pub fn shear_modulus(&self) -> Option<f64> {
        match self.data {
            MaterialData::Mat1 { g: Some(g), .. } => Some(g),
            MaterialData::Mat1 {
                e: Some(e),
                nu: Some(nu),
                ..
            } => Some(e / (2.0 * (1.0 + nu))),
            _ => None,
        }
    }
}

impl Card for Material {
    fn card(&self) -> &'static str {
        self.kind().card()
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new(self.card(), self.mid)
    }
}

impl Keyed for Material {
    fn id(&self) -> i32 {
        self.mid
    }
}

impl Resolvable for Material {
    type Links = ();

    /// Materials reference nothing; resolution checks the constants are usable
    fn resolve(&self, _model: &Model) -> Result<(), StructuralError> {
        match &self.data {
            MaterialData::Mat1 { e: None, g: None, .. } => Err(StructuralError::malformed(
                self.entity(),
                "E and G may not both be blank",
            )),
            MaterialData::Mat1 { nu: Some(nu), .. } if !(-1.0..=0.5).contains(nu) => Err(
                StructuralError::malformed(self.entity(), format!("nu={nu} outside [-1, 0.5]")),
            ),
            MaterialData::Mat8 { e1, e2, .. } if *e1 <= 0.0 || *e2 <= 0.0 => Err(
                StructuralError::malformed(self.entity(), "E1 and E2 must be positive"),
            ),
            MaterialData::Mat9 { g, .. } if g.len() != 21 => Err(StructuralError::malformed(
                self.entity(),
                format!("expected 21 stiffness terms, found {}", g.len()),
            )),
            _ => Ok(()),
        }
    }

    fn link(&mut self, _links: ()) {
        self.validated = true;
    }

    fn unlink(&mut self) {
        self.validated = false;
    }

    fn is_cross_referenced(&self) -> bool {
        self.validated
    }
}

/// Tabular function family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TableKind {
    /// Material property versus temperature
    Tablem1,
    /// Stress versus strain
    Tables1,
    /// Dynamic load versus time or frequency
    Tabled1,
}

impl TableKind {
    pub fn card(self) -> &'static str {
        match self {
            TableKind::Tablem1 => "TABLEM1",
            TableKind::Tables1 => "TABLES1",
            TableKind::Tabled1 => "TABLED1",
        }
    }
}

/// A piecewise-linear table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub tid: i32,
    pub kind: TableKind,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Table {
    /// Points must be paired, non-empty and strictly increasing in x
    pub fn validate(&self) -> Result<(), StructuralError> {
        let malformed = |message: String| StructuralError::malformed(self.entity(), message);
        if self.x.is_empty() {
            return Err(malformed("table has no points".to_string()));
        }
        if self.x.len() != self.y.len() {
            return Err(malformed(format!(
                "{} x values but {} y values",
                self.x.len(),
                self.y.len()
            )));
        }
        let increasing = |w: &[f64]| w[0].partial_cmp(&w[1]) == Some(Ordering::Less);
        if let Some(i) = self.x.windows(2).position(|w| !increasing(w)) {
            return Err(malformed(format!(
                "x values not strictly increasing at point {}",
                i + 2
            )));
        }
        Ok(())
    }

    /// Linear interpolation, clamped to the end values outside the range.
    /// `None` for a table that fails [`Table::validate`].
    pub fn interpolate(&self, x: f64) -> Option<f64> {
        self.validate().ok()?;
        let (first, last) = (self.x.first()?, self.x.last()?);
        if x <= *first {
            return self.y.first().copied();
        }
        if x >= *last {
            return self.y.last().copied();
        }
        let i = self.x.partition_point(|xi| *xi <= x);
        let (x0, x1) = (self.x[i - 1], self.x[i]);
        let (y0, y1) = (self.y[i - 1], self.y[i]);
        Some(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
    }
}

impl Card for Table {
    fn card(&self) -> &'static str {
        self.kind.card()
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new(self.card(), self.tid)
    }
}

impl Keyed for Table {
    fn id(&self) -> i32 {
        self.tid
    }
}

/// Resolve a table ID, checking the table family
pub(crate) fn table_ref(
    model: &Model,
    entity: &EntityRef,
    field: &'static str,
    tid: i32,
    kind: TableKind,
) -> Result<Handle<Table>, StructuralError> {
    let handle = model
        .tables
        .handle(tid)
        .ok_or_else(|| StructuralError::missing(entity.clone(), "TABLE", tid))?;
    let table = &model.tables[handle];
    if table.kind != kind {
        return Err(StructuralError::TypeMismatch {
            entity: entity.clone(),
            field,
            expected: kind.card().to_string(),
            found: table.kind.card(),
        });
    }
    table.validate()?;
    Ok(handle)
}

/// Resolve a material ID, checking it is one of the accepted families
pub(crate) fn material_ref(
    model: &Model,
    entity: &EntityRef,
    field: &'static str,
    mid: i32,
    accepted: &[MaterialKind],
) -> Result<Handle<Material>, StructuralError> {
    let handle = model
        .materials
        .handle(mid)
        .ok_or_else(|| StructuralError::missing(entity.clone(), "material", mid))?;
    let found = model.materials[handle].kind();
    if !accepted.contains(&found) {
        return Err(StructuralError::TypeMismatch {
            entity: entity.clone(),
            field,
            expected: accepted
                .iter()
                .map(|k| k.card())
                .collect::<Vec<_>>()
                .join("/"),
            found: found.card(),
        });
    }
    Ok(handle)
}

/// Material dependency card family
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DependencyKind {
    Mats1,
    Mats3,
    Mats8,
    Matt1,
    Matt2,
    Matt3,
    Matt4,
    Matt5,
    Matt8,
    Matt9,
    Creep,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 11] = [
        DependencyKind::Mats1,
        DependencyKind::Mats3,
        DependencyKind::Mats8,
        DependencyKind::Matt1,
        DependencyKind::Matt2,
        DependencyKind::Matt3,
        DependencyKind::Matt4,
        DependencyKind::Matt5,
        DependencyKind::Matt8,
        DependencyKind::Matt9,
        DependencyKind::Creep,
    ];

    pub fn card(self) -> &'static str {
        match self {
            DependencyKind::Mats1 => "MATS1",
            DependencyKind::Mats3 => "MATS3",
            DependencyKind::Mats8 => "MATS8",
            DependencyKind::Matt1 => "MATT1",
            DependencyKind::Matt2 => "MATT2",
            DependencyKind::Matt3 => "MATT3",
            DependencyKind::Matt4 => "MATT4",
            DependencyKind::Matt5 => "MATT5",
            DependencyKind::Matt8 => "MATT8",
            DependencyKind::Matt9 => "MATT9",
            DependencyKind::Creep => "CREEP",
        }
    }

    /// Material family the card extends (same MID)
    pub fn base_material(self) -> MaterialKind {
        match self {
            DependencyKind::Mats1 | DependencyKind::Matt1 | DependencyKind::Creep => {
                MaterialKind::Mat1
            }
            DependencyKind::Matt2 => MaterialKind::Mat2,
            DependencyKind::Mats3 | DependencyKind::Matt3 => MaterialKind::Mat3,
            DependencyKind::Matt4 => MaterialKind::Mat4,
            DependencyKind::Matt5 => MaterialKind::Mat5,
            DependencyKind::Mats8 | DependencyKind::Matt8 => MaterialKind::Mat8,
            DependencyKind::Matt9 => MaterialKind::Mat9,
        }
    }

    /// Table family every table field must point at
    pub fn table_kind(self) -> TableKind {
        match self {
            DependencyKind::Mats1
            | DependencyKind::Mats3
            | DependencyKind::Mats8
            | DependencyKind::Creep => TableKind::Tables1,
            _ => TableKind::Tablem1,
        }
    }
}

/// Links of a dependency card
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyLinks {
    pub material: Handle<Material>,
    pub tables: BTreeMap<String, Handle<Table>>,
}

/// A MATSx / MATTx / CREEP card; the MID is shared with its base material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialDependency {
    pub mid: i32,
    pub kind: DependencyKind,
    /// Field name (`E`, `NU`, ...) to table ID
    #[serde(default)]
    pub tables: BTreeMap<String, i32>,
    #[serde(skip)]
    links: Option<DependencyLinks>,
}

impl MaterialDependency {
    pub fn new(mid: i32, kind: DependencyKind) -> Self {
        Self {
            mid,
            kind,
            tables: BTreeMap::new(),
            links: None,
        }
    }

    pub fn with_table(mut self, field: &str, tid: i32) -> Self {
        self.tables.insert(field.to_string(), tid);
        self
    }

    pub fn links(&self) -> Option<&DependencyLinks> {
        self.links.as_ref()
    }
}

impl Card for MaterialDependency {
    fn card(&self) -> &'static str {
        self.kind.card()
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new(self.card(), self.mid)
    }
}

impl Keyed for MaterialDependency {
    fn id(&self) -> i32 {
        self.mid
    }
}

impl Resolvable for MaterialDependency {
    type Links = DependencyLinks;

    fn resolve(&self, model: &Model) -> Result<DependencyLinks, StructuralError> {
        let entity = self.entity();
        let material = material_ref(model, &entity, "MID", self.mid, &[self.kind.base_material()])?;
        let tables = self
            .tables
            .iter()
            .map(|(field, &tid)| {
                table_ref(model, &entity, "TID", tid, self.kind.table_kind())
                    .map(|handle| (field.clone(), handle))
            })
            .collect::<Result<_, _>>()?;
        Ok(DependencyLinks { material, tables })
    }

    fn link(&mut self, links: DependencyLinks) {
        self.links = Some(links);
    }

    fn unlink(&mut self) {
        self.links = None;
    }

    fn is_cross_referenced(&self) -> bool {
        self.links.is_some()
    }
}

/// Dependency cards grouped by family, one card per MID within a family
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyTable {
    by_kind: BTreeMap<DependencyKind, Collection<MaterialDependency>>,
}

impl DependencyTable {
    pub fn insert(
        &mut self,
        dependency: MaterialDependency,
    ) -> Result<Handle<MaterialDependency>, ModelError> {
        self.by_kind
            .entry(dependency.kind)
            .or_default()
            .insert(dependency)
    }

    pub fn get(&self, kind: DependencyKind, mid: i32) -> Option<&MaterialDependency> {
        self.by_kind.get(&kind).and_then(|c| c.get(mid))
    }

    /// Every dependency card attached to a material
    pub fn for_material(&self, mid: i32) -> impl Iterator<Item = &MaterialDependency> {
        self.by_kind.values().filter_map(move |c| c.get(mid))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaterialDependency> {
        self.by_kind.values().flat_map(|c| c.iter())
    }

    pub fn len(&self) -> usize {
        self.by_kind.values().map(Collection::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Arena for DependencyTable {
    type Item = MaterialDependency;
    type Slot = (DependencyKind, Handle<MaterialDependency>);

    fn slots(&self) -> Vec<Self::Slot> {
        self.by_kind
            .iter()
            .flat_map(|(&kind, c)| c.handles().map(move |h| (kind, h)))
            .collect()
    }

    fn slot(&self, slot: &Self::Slot) -> Option<&MaterialDependency> {
        self.by_kind.get(&slot.0).and_then(|c| c.resolve(slot.1))
    }

    fn slot_mut(&mut self, slot: &Self::Slot) -> Option<&mut MaterialDependency> {
        self.by_kind
            .get_mut(&slot.0)
            .and_then(|c| c.slot_mut(&slot.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mat1_shear_modulus_from_e_and_nu() {
        let steel = Material::isotropic(1, 210.0e9, 0.3, 7850.0);
        assert_relative_eq!(steel.shear_modulus().unwrap(), 210.0e9 / 2.6, max_relative = 1e-12);
        assert_eq!(steel.card(), "MAT1");
        assert_relative_eq!(steel.density(), 7850.0);
    }

    #[test]
    fn table_interpolation_is_clamped() {
        let t = Table {
            tid: 1,
            kind: TableKind::Tablem1,
            x: vec![0.0, 100.0, 200.0],
            y: vec![1.0, 2.0, 4.0],
        };
        assert_relative_eq!(t.interpolate(50.0).unwrap(), 1.5);
        assert_relative_eq!(t.interpolate(150.0).unwrap(), 3.0);
        assert_relative_eq!(t.interpolate(-10.0).unwrap(), 1.0);
        assert_relative_eq!(t.interpolate(500.0).unwrap(), 4.0);
    }

    #[test]
    fn unsorted_table_fails_validation() {
        let t = Table {
            tid: 2,
            kind: TableKind::Tablem1,
            x: vec![0.0, 200.0, 100.0],
            y: vec![1.0, 4.0, 2.0],
        };
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("not strictly increasing at point 3"));
        assert_eq!(t.interpolate(150.0), None);

        let repeated = Table {
            x: vec![0.0, 0.0],
            y: vec![1.0, 2.0],
            ..t
        };
        assert!(repeated.validate().is_err());
    }

    #[test]
    fn dependency_families() {
        assert_eq!(DependencyKind::Creep.base_material(), MaterialKind::Mat1);
        assert_eq!(DependencyKind::Matt9.base_material(), MaterialKind::Mat9);
        assert_eq!(DependencyKind::Mats8.table_kind(), TableKind::Tables1);
        assert_eq!(DependencyKind::Matt2.table_kind(), TableKind::Tablem1);
    }

    #[test]
    fn dependency_table_allows_same_mid_across_families() {
        let mut deps = DependencyTable::default();
        deps.insert(MaterialDependency::new(1, DependencyKind::Mats1))
            .unwrap();
        deps.insert(MaterialDependency::new(1, DependencyKind::Matt1))
            .unwrap();
        assert!(
            deps.insert(MaterialDependency::new(1, DependencyKind::Mats1))
                .is_err()
        );
        assert_eq!(deps.len(), 2);
        assert_eq!(deps.for_material(1).count(), 2);
        assert_eq!(deps.slots().len(), 2);
    }
}
