//! Single- and multi-point constraints, their combinations and supports.
//!
//! SPC/SPC1 and MPC cards may share a set ID, so they live in fan-out maps.
//! SPCADD/MPCADD combine such sets; the model keeps a [`ConstraintAggregate`]
//! for each family that the resolver fills while linking.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::collection::{Card, Keyed, SetKey};
use crate::error::{EntityRef, StructuralError};
use crate::model::Model;
use crate::nodes::{NodeRef, node_ref, validate_components};
use crate::resolvable::Resolvable;

/// One constrained degree of freedom
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstrainedDof {
    pub node: i32,
    /// 1-6 for grids, 0 for scalar points
    pub component: u8,
    pub enforced: f64,
}

fn components_of(code: &str) -> impl Iterator<Item = u8> + '_ {
    code.bytes().filter(u8::is_ascii_digit).map(|b| b - b'0')
}

/// Grid/component entry of an SPC card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpcEntry {
    pub node: i32,
    pub components: String,
    #[serde(default)]
    pub enforced: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "card", rename_all = "UPPERCASE")]
pub enum SpcData {
    Spc { entries: Vec<SpcEntry> },
    Spc1 { components: String, nodes: Vec<i32> },
}

/// SPC or SPC1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinglePointConstraint {
    pub sid: i32,
    #[serde(flatten)]
    pub data: SpcData,
    #[serde(skip)]
    links: Option<Vec<NodeRef>>,
}

impl SinglePointConstraint {
    pub fn spc1(sid: i32, components: &str, nodes: &[i32]) -> Self {
        Self {
            sid,
            data: SpcData::Spc1 {
                components: components.to_string(),
                nodes: nodes.to_vec(),
            },
            links: None,
        }
    }

    pub fn spc(sid: i32, entries: Vec<SpcEntry>) -> Self {
        Self {
            sid,
            data: SpcData::Spc { entries },
            links: None,
        }
    }

    pub fn links(&self) -> Option<&[NodeRef]> {
        self.links.as_deref()
    }

    /// Expanded (node, component) pairs
    pub fn constrained_dofs(&self) -> Vec<ConstrainedDof> {
        match &self.data {
            SpcData::Spc { entries } => entries
                .iter()
                .flat_map(|e| {
                    components_of(&e.components).map(move |component| ConstrainedDof {
                        node: e.node,
                        component,
                        enforced: e.enforced,
                    })
                })
                .collect(),
            SpcData::Spc1 { components, nodes } => nodes
                .iter()
                .flat_map(|&node| {
                    components_of(components).map(move |component| ConstrainedDof {
                        node,
                        component,
                        enforced: 0.0,
                    })
                })
                .collect(),
        }
    }

    fn node_components(&self) -> Vec<(i32, &str)> {
        match &self.data {
            SpcData::Spc { entries } => entries
                .iter()
                .map(|e| (e.node, e.components.as_str()))
                .collect(),
            SpcData::Spc1 { components, nodes } => {
                nodes.iter().map(|&n| (n, components.as_str())).collect()
            }
        }
    }
}

impl Card for SinglePointConstraint {
    fn card(&self) -> &'static str {
        match self.data {
            SpcData::Spc { .. } => "SPC",
            SpcData::Spc1 { .. } => "SPC1",
        }
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new(self.card(), self.sid)
    }
}

/// Check components and resolve grid/scalar points of a (node, components) list
fn resolve_points(
    model: &Model,
    entity: &EntityRef,
    points: &[(i32, &str)],
) -> Result<Vec<NodeRef>, StructuralError> {
    if points.is_empty() {
        return Err(StructuralError::malformed(entity.clone(), "no grid points"));
    }
    points
        .iter()
        .map(|&(nid, components)| {
            validate_components(entity.clone(), components)?;
            node_ref(model, entity, nid, true)
        })
        .collect()
}

impl Resolvable for SinglePointConstraint {
    type Links = Vec<NodeRef>;

    fn resolve(&self, model: &Model) -> Result<Vec<NodeRef>, StructuralError> {
        resolve_points(model, &self.entity(), &self.node_components())
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

/// SPCADD
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpcAdd {
    pub sid: i32,
    pub sets: Vec<i32>,
    #[serde(skip)]
    links: Option<Vec<SetKey<SinglePointConstraint>>>,
}

impl SpcAdd {
    pub fn new(sid: i32, sets: &[i32]) -> Self {
        Self {
            sid,
            sets: sets.to_vec(),
            links: None,
        }
    }

    pub fn links(&self) -> Option<&[SetKey<SinglePointConstraint>]> {
        self.links.as_deref()
    }
}

impl Card for SpcAdd {
    fn card(&self) -> &'static str {
        "SPCADD"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("SPCADD", self.sid)
    }
}

impl Keyed for SpcAdd {
    fn id(&self) -> i32 {
        self.sid
    }
}

impl Resolvable for SpcAdd {
    type Links = Vec<SetKey<SinglePointConstraint>>;

    fn resolve(&self, model: &Model) -> Result<Self::Links, StructuralError> {
        self.sets
            .iter()
            .map(|sid| {
                model
                    .spcs
                    .key(sid)
                    .ok_or_else(|| StructuralError::missing(self.entity(), "SPC set", *sid))
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

/// One term of a multipoint constraint equation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpcTerm {
    pub node: i32,
    pub component: u8,
    pub coefficient: f64,
}

/// Equation captured into the MPC aggregate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MpcEquation {
    pub sid: i32,
    pub terms: Vec<MpcTerm>,
}

/// MPC: the first term is the dependent degree of freedom
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mpc {
    pub sid: i32,
    pub terms: Vec<MpcTerm>,
    #[serde(skip)]
    links: Option<Vec<NodeRef>>,
}

impl Mpc {
    pub fn new(sid: i32, terms: Vec<MpcTerm>) -> Self {
        Self {
            sid,
            terms,
            links: None,
        }
    }

    pub fn links(&self) -> Option<&[NodeRef]> {
        self.links.as_deref()
    }

    pub fn equation(&self) -> MpcEquation {
        MpcEquation {
            sid: self.sid,
            terms: self.terms.clone(),
        }
    }
}

impl Card for Mpc {
    fn card(&self) -> &'static str {
        "MPC"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("MPC", self.sid)
    }
}

impl Resolvable for Mpc {
    type Links = Vec<NodeRef>;

    fn resolve(&self, model: &Model) -> Result<Vec<NodeRef>, StructuralError> {
        let entity = self.entity();
        match self.terms.first() {
            None => return Err(StructuralError::malformed(entity, "no terms")),
            Some(t) if t.coefficient == 0.0 => {
                return Err(StructuralError::malformed(
                    entity,
                    "dependent term has a zero coefficient",
                ));
            }
            Some(_) => {}
        }
        self.terms
            .iter()
            .map(|t| {
                if t.component > 6 {
                    return Err(StructuralError::malformed(
                        entity.clone(),
                        format!("invalid component {}", t.component),
                    ));
                }
                node_ref(model, &entity, t.node, true)
            })
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

/// MPCADD
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpcAdd {
    pub sid: i32,
    pub sets: Vec<i32>,
    #[serde(skip)]
    links: Option<Vec<SetKey<Mpc>>>,
}

impl MpcAdd {
    pub fn new(sid: i32, sets: &[i32]) -> Self {
        Self {
            sid,
            sets: sets.to_vec(),
            links: None,
        }
    }

    pub fn links(&self) -> Option<&[SetKey<Mpc>]> {
        self.links.as_deref()
    }
}

impl Card for MpcAdd {
    fn card(&self) -> &'static str {
        "MPCADD"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("MPCADD", self.sid)
    }
}

impl Keyed for MpcAdd {
    fn id(&self) -> i32 {
        self.sid
    }
}

impl Resolvable for MpcAdd {
    type Links = Vec<SetKey<Mpc>>;

    fn resolve(&self, model: &Model) -> Result<Self::Links, StructuralError> {
        self.sets
            .iter()
            .map(|sid| {
                model
                    .mpcs
                    .key(sid)
                    .ok_or_else(|| StructuralError::missing(self.entity(), "MPC set", *sid))
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

/// Grid/component pair of a support card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportEntry {
    pub node: i32,
    pub components: String,
}

fn support_points(entries: &[SupportEntry]) -> Vec<(i32, &str)> {
    entries
        .iter()
        .map(|e| (e.node, e.components.as_str()))
        .collect()
}

/// SUPORT (residual structure, no set ID)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suport {
    pub entries: Vec<SupportEntry>,
    #[serde(skip)]
    links: Option<Vec<NodeRef>>,
}

impl Suport {
    pub fn new(entries: Vec<SupportEntry>) -> Self {
        Self {
            entries,
            links: None,
        }
    }

    pub fn links(&self) -> Option<&[NodeRef]> {
        self.links.as_deref()
    }
}

impl Card for Suport {
    fn card(&self) -> &'static str {
        "SUPORT"
    }

    fn entity(&self) -> EntityRef {
        let first = self.entries.first().map_or(0, |e| e.node);
        EntityRef::new("SUPORT", first)
    }
}

impl Resolvable for Suport {
    type Links = Vec<NodeRef>;

    fn resolve(&self, model: &Model) -> Result<Vec<NodeRef>, StructuralError> {
        resolve_points(model, &self.entity(), &support_points(&self.entries))
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

/// SUPORT1, selected by set ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suport1 {
    pub sid: i32,
    pub entries: Vec<SupportEntry>,
    #[serde(skip)]
    links: Option<Vec<NodeRef>>,
}

impl Suport1 {
    pub fn new(sid: i32, entries: Vec<SupportEntry>) -> Self {
        Self {
            sid,
            entries,
            links: None,
        }
    }

    pub fn links(&self) -> Option<&[NodeRef]> {
        self.links.as_deref()
    }
}

impl Card for Suport1 {
    fn card(&self) -> &'static str {
        "SUPORT1"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("SUPORT1", self.sid)
    }
}

impl Keyed for Suport1 {
    fn id(&self) -> i32 {
        self.sid
    }
}

impl Resolvable for Suport1 {
    type Links = Vec<NodeRef>;

    fn resolve(&self, model: &Model) -> Result<Vec<NodeRef>, StructuralError> {
        resolve_points(model, &self.entity(), &support_points(&self.entries))
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

/// SESUP: supports of a superelement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeSuport {
    pub seid: i32,
    pub entries: Vec<SupportEntry>,
    #[serde(skip)]
    links: Option<Vec<NodeRef>>,
}

impl SeSuport {
    pub fn new(seid: i32, entries: Vec<SupportEntry>) -> Self {
        Self {
            seid,
            entries,
            links: None,
        }
    }

    pub fn links(&self) -> Option<&[NodeRef]> {
        self.links.as_deref()
    }
}

impl Card for SeSuport {
    fn card(&self) -> &'static str {
        "SESUP"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("SESUP", self.seid)
    }
}

impl Resolvable for SeSuport {
    type Links = Vec<NodeRef>;

    fn resolve(&self, model: &Model) -> Result<Vec<NodeRef>, StructuralError> {
        resolve_points(model, &self.entity(), &support_points(&self.entries))
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

/// Combined view of one constraint family, filled during resolution.
///
/// Simple sets hold the items appended under their ID; a combination ID
/// expands to the concatenation of its member sets.
#[derive(Debug, Clone, Serialize)]
pub struct ConstraintAggregate<C> {
    combinations: BTreeMap<i32, Vec<i32>>,
    sets: BTreeMap<i32, Vec<C>>,
}

impl<C> Default for ConstraintAggregate<C> {
    fn default() -> Self {
        Self {
            combinations: BTreeMap::new(),
            sets: BTreeMap::new(),
        }
    }
}

impl<C: Clone> ConstraintAggregate<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a combination card and its member set IDs
    pub fn add_combination(&mut self, sid: i32, members: &[i32]) {
        self.combinations
            .entry(sid)
            .or_default()
            .extend_from_slice(members);
    }

    /// Append the items of one simple card to its set
    pub fn append(&mut self, sid: i32, items: impl IntoIterator<Item = C>) {
        self.sets.entry(sid).or_default().extend(items);
    }

    /// Everything active when `sid` is selected, combinations expanded
    pub fn constraints_for(&self, sid: i32) -> Vec<C> {
        match self.combinations.get(&sid) {
            Some(members) => members
                .iter()
                .filter_map(|m| self.sets.get(m))
                .flatten()
                .cloned()
                .collect(),
            None => self.sets.get(&sid).cloned().unwrap_or_default(),
        }
    }

    pub fn combination_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.combinations.keys().copied()
    }

    pub fn set_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.sets.keys().copied()
    }

    /// Number of items over all simple sets
    pub fn len(&self) -> usize {
        self.sets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty() && self.sets.is_empty()
    }

    pub fn clear(&mut self) {
        self.combinations.clear();
        self.sets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spc1_expands_components() {
        let spc = SinglePointConstraint::spc1(1, "123", &[10, 11]);
        let dofs = spc.constrained_dofs();
        assert_eq!(dofs.len(), 6);
        assert_eq!(dofs[0], ConstrainedDof { node: 10, component: 1, enforced: 0.0 });
        assert_eq!(dofs[5].node, 11);
        assert_eq!(dofs[5].component, 3);
    }

    #[test]
    fn spc_keeps_enforced_value() {
        let spc = SinglePointConstraint::spc(
            2,
            vec![SpcEntry {
                node: 4,
                components: "3".to_string(),
                enforced: 0.25,
            }],
        );
        assert_eq!(
            spc.constrained_dofs(),
            vec![ConstrainedDof { node: 4, component: 3, enforced: 0.25 }]
        );
    }

    #[test]
    fn aggregate_expands_combinations() {
        let mut agg = ConstraintAggregate::new();
        agg.add_combination(100, &[1, 2]);
        agg.append(1, [10, 11]);
        agg.append(2, [20]);
        agg.append(3, [30]);

        assert_eq!(agg.constraints_for(100), vec![10, 11, 20]);
        assert_eq!(agg.constraints_for(3), vec![30]);
        assert!(agg.constraints_for(99).is_empty());
        assert_eq!(agg.len(), 4);

        agg.clear();
        assert!(agg.is_empty());
    }
}
