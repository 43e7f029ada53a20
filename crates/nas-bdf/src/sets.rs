//! Degree-of-freedom set cards (ASET/BSET/CSET/QSET/USET and the SE* variants).

use serde::{Deserialize, Serialize};

use crate::collection::Card;
use crate::error::{EntityRef, StructuralError};
use crate::model::Model;
use crate::nodes::{NodeRef, node_ref, validate_components};
use crate::resolvable::Resolvable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DofSetKind {
    Aset,
    Bset,
    Cset,
    Qset,
    Uset,
    Seset,
    Sebset,
    Secset,
    Seqset,
    Seuset,
}

impl DofSetKind {
    pub fn card(self) -> &'static str {
        match self {
            DofSetKind::Aset => "ASET",
            DofSetKind::Bset => "BSET",
            DofSetKind::Cset => "CSET",
            DofSetKind::Qset => "QSET",
            DofSetKind::Uset => "USET",
            DofSetKind::Seset => "SESET",
            DofSetKind::Sebset => "SEBSET",
            DofSetKind::Secset => "SECSET",
            DofSetKind::Seqset => "SEQSET",
            DofSetKind::Seuset => "SEUSET",
        }
    }

    /// SESET lists grids only; every other kind lists (point, components)
    pub fn has_components(self) -> bool {
        self != DofSetKind::Seset
    }

    pub fn is_superelement(self) -> bool {
        matches!(
            self,
            DofSetKind::Seset
                | DofSetKind::Sebset
                | DofSetKind::Secset
                | DofSetKind::Seqset
                | DofSetKind::Seuset
        )
    }
}

/// A set definition card in its `xSET1` form: one component code, many points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DofSet {
    pub kind: DofSetKind,
    /// Superelement ID of the SE* variants
    #[serde(default)]
    pub seid: Option<i32>,
    /// Set name of USET/SEUSET (`U1`..`U6`, ...)
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub components: Option<String>,
    pub ids: Vec<i32>,
    #[serde(skip)]
    links: Option<Vec<NodeRef>>,
}

impl DofSet {
    pub fn new(kind: DofSetKind, components: &str, ids: &[i32]) -> Self {
        Self {
            kind,
            seid: None,
            name: None,
            components: Some(components.to_string()),
            ids: ids.to_vec(),
            links: None,
        }
    }

    pub fn with_seid(mut self, seid: i32) -> Self {
        self.seid = Some(seid);
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn links(&self) -> Option<&[NodeRef]> {
        self.links.as_deref()
    }
}

impl Card for DofSet {
    fn card(&self) -> &'static str {
        self.kind.card()
    }

    fn entity(&self) -> EntityRef {
        match (&self.name, self.seid) {
            (Some(name), _) => EntityRef::labelled(self.card(), name.clone()),
            (None, Some(seid)) => EntityRef::new(self.card(), seid),
            (None, None) => EntityRef::new(self.card(), self.ids.first().copied().unwrap_or(0)),
        }
    }
}

impl Resolvable for DofSet {
    type Links = Vec<NodeRef>;

    fn resolve(&self, model: &Model) -> Result<Vec<NodeRef>, StructuralError> {
        let entity = self.entity();
        if self.kind.is_superelement() && self.seid.is_none() {
            return Err(StructuralError::malformed(entity, "missing superelement ID"));
        }
        if matches!(self.kind, DofSetKind::Uset | DofSetKind::Seuset) && self.name.is_none() {
            return Err(StructuralError::malformed(entity, "missing set name"));
        }
        match (&self.components, self.kind.has_components()) {
            (Some(c), true) => validate_components(entity.clone(), c)?,
            (None, true) => return Err(StructuralError::malformed(entity, "missing components")),
            (Some(_), false) => {
                return Err(StructuralError::malformed(entity, "SESET takes no components"));
            }
            (None, false) => {}
        }
        if self.ids.is_empty() {
            return Err(StructuralError::malformed(entity, "empty set"));
        }

        // SESET only lists structural grids
        let allow_scalar = self.kind.has_components();
        self.ids
            .iter()
            .map(|&nid| node_ref(model, &entity, nid, allow_scalar))
            .collect()
    }

    fn link(&mut self, links: Vec<NodeRef>) {
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
    fn entity_naming() {
        let uset = DofSet::new(DofSetKind::Uset, "123", &[1, 2]).with_name("U6");
        assert_eq!(uset.entity().to_string(), "USET U6");

        let seset = DofSet {
            components: None,
            ..DofSet::new(DofSetKind::Seset, "", &[5])
        }
        .with_seid(3);
        assert_eq!(seset.entity().to_string(), "SESET 3");
        assert!(seset.kind.is_superelement());
        assert!(!seset.kind.has_components());
    }
}
