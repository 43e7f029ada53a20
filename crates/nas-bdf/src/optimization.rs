//! Design optimization cards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::collection::{Card, Handle, Keyed};
use crate::elements::Element;
use crate::error::{EntityRef, StructuralError};
use crate::model::Model;
use crate::nodes::{Grid, grid_ref};
use crate::properties::Property;
use crate::resolvable::Resolvable;

/// DESVAR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Desvar {
    pub id: i32,
    pub label: String,
    pub xinit: f64,
    #[serde(default = "default_xlb")]
    pub xlb: f64,
    #[serde(default = "default_xub")]
    pub xub: f64,
}

fn default_xlb() -> f64 {
    -1.0e20
}

fn default_xub() -> f64 {
    1.0e20
}

impl Desvar {
    pub fn new(id: i32, label: &str, xinit: f64) -> Self {
        Self {
            id,
            label: label.to_string(),
            xinit,
            xlb: default_xlb(),
            xub: default_xub(),
        }
    }
}

impl Card for Desvar {
    fn card(&self) -> &'static str {
        "DESVAR"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("DESVAR", self.id)
    }
}

impl Keyed for Desvar {
    fn id(&self) -> i32 {
        self.id
    }
}

/// DEQATN: user equation, kept as source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deqatn {
    pub id: i32,
    pub expression: String,
}

impl Card for Deqatn {
    fn card(&self) -> &'static str {
        "DEQATN"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("DEQATN", self.id)
    }
}

impl Keyed for Deqatn {
    fn id(&self) -> i32 {
        self.id
    }
}

/// DTABLE: named constants for DRESP2 equations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dtable {
    pub values: BTreeMap<String, f64>,
}

/// What the ATTi fields of a DRESP1 name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeTarget {
    Grids,
    Elements,
    Properties(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "card", rename_all = "UPPERCASE")]
pub enum ResponseData {
    /// Analysis response (`DISP`, `STRESS`, `WEIGHT`, ...)
    Dresp1 {
        response_type: String,
        /// `ELEM`, a property card name (`PSHELL`, ...) or blank for grid responses
        #[serde(default)]
        property_type: Option<String>,
        #[serde(default)]
        atta: Option<i32>,
        #[serde(default)]
        atti: Vec<i32>,
    },
    /// Synthetic response from a DEQATN
    Dresp2 {
        equation: i32,
        #[serde(default)]
        desvars: Vec<i32>,
        #[serde(default)]
        dtable: Vec<String>,
        #[serde(default)]
        dresp1: Vec<i32>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeLinks {
    None,
    Grids(Vec<Handle<Grid>>),
    Elements(Vec<Handle<Element>>),
    Properties(Vec<Handle<Property>>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseLinks {
    Dresp1(AttributeLinks),
    Dresp2 {
        equation: Handle<Deqatn>,
        desvars: Vec<Handle<Desvar>>,
        dresp1: Vec<Handle<DesignResponse>>,
    },
}

/// DRESP1 or DRESP2; both share one ID space
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignResponse {
    pub id: i32,
    pub label: String,
    #[serde(flatten)]
    pub data: ResponseData,
    #[serde(skip)]
    links: Option<ResponseLinks>,
}

impl DesignResponse {
    pub fn new(id: i32, label: &str, data: ResponseData) -> Self {
        Self {
            id,
            label: label.to_string(),
            data,
            links: None,
        }
    }

    pub fn links(&self) -> Option<&ResponseLinks> {
        self.links.as_ref()
    }

    /// Target of the attribute IDs of a DRESP1
    pub fn attribute_target(&self) -> Option<AttributeTarget> {
        match &self.data {
            ResponseData::Dresp1 { property_type, .. } => Some(match property_type.as_deref() {
                None => AttributeTarget::Grids,
                Some("ELEM") => AttributeTarget::Elements,
                Some(card) => AttributeTarget::Properties(property_card(card)?),
            }),
            ResponseData::Dresp2 { .. } => None,
        }
    }

    fn resolve_attributes(
        &self,
        model: &Model,
        entity: &EntityRef,
        atti: &[i32],
    ) -> Result<AttributeLinks, StructuralError> {
        if atti.is_empty() {
            return Ok(AttributeLinks::None);
        }
        let target = self.attribute_target().ok_or_else(|| {
            StructuralError::malformed(entity.clone(), "unsupported property type")
        })?;
        Ok(match target {
            AttributeTarget::Grids => AttributeLinks::Grids(
                atti.iter()
                    .map(|&nid| grid_ref(model, entity, nid))
                    .collect::<Result<_, _>>()?,
            ),
            AttributeTarget::Elements => AttributeLinks::Elements(
                atti.iter()
                    .map(|&eid| {
                        model
                            .elements
                            .handle(eid)
                            .ok_or_else(|| StructuralError::missing(entity.clone(), "element", eid))
                    })
                    .collect::<Result<_, _>>()?,
            ),
            AttributeTarget::Properties(card) => AttributeLinks::Properties(
                atti.iter()
                    .map(|&pid| {
                        let handle = model.properties.handle(pid).ok_or_else(|| {
                            StructuralError::missing(entity.clone(), "property", pid)
                        })?;
                        let found = model.properties[handle].card();
                        if found != card {
                            return Err(StructuralError::TypeMismatch {
                                entity: entity.clone(),
                                field: "ATTi",
                                expected: card.to_string(),
                                found,
                            });
                        }
                        Ok(handle)
                    })
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

/// Canonical property card name for a DRESP1 PTYPE
fn property_card(card: &str) -> Option<&'static str> {
    const CARDS: [&str; 11] = [
        "PROD", "PTUBE", "PBAR", "PBEAM", "PSHELL", "PCOMP", "PSOLID", "PELAS", "PDAMP", "PBUSH",
        "PBUSH1D",
    ];
    CARDS.into_iter().find(|c| c.eq_ignore_ascii_case(card))
}

impl Card for DesignResponse {
    fn card(&self) -> &'static str {
        match self.data {
            ResponseData::Dresp1 { .. } => "DRESP1",
            ResponseData::Dresp2 { .. } => "DRESP2",
        }
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new(self.card(), self.id)
    }
}

impl Keyed for DesignResponse {
    fn id(&self) -> i32 {
        self.id
    }
}

impl Resolvable for DesignResponse {
    type Links = ResponseLinks;

    fn resolve(&self, model: &Model) -> Result<ResponseLinks, StructuralError> {
        let entity = self.entity();
        match &self.data {
            ResponseData::Dresp1 { atti, .. } => Ok(ResponseLinks::Dresp1(
                self.resolve_attributes(model, &entity, atti)?,
            )),
            ResponseData::Dresp2 {
                equation,
                desvars,
                dtable,
                dresp1,
            } => {
                let equation = model
                    .deqatns
                    .handle(*equation)
                    .ok_or_else(|| StructuralError::missing(entity.clone(), "DEQATN", *equation))?;
                let desvars = desvars
                    .iter()
                    .map(|&id| {
                        model
                            .desvars
                            .handle(id)
                            .ok_or_else(|| StructuralError::missing(entity.clone(), "DESVAR", id))
                    })
                    .collect::<Result<_, _>>()?;
                for label in dtable {
                    let known = model
                        .dtable
                        .as_ref()
                        .is_some_and(|t| t.values.contains_key(label));
                    if !known {
                        return Err(StructuralError::MissingLabel {
                            entity: entity.clone(),
                            target: "DTABLE",
                            label: label.clone(),
                        });
                    }
                }
                let dresp1 = dresp1
                    .iter()
                    .map(|&id| {
                        let handle = model
                            .dresps
                            .handle(id)
                            .ok_or_else(|| StructuralError::missing(entity.clone(), "DRESP1", id))?;
                        let found = model.dresps[handle].card();
                        if found != "DRESP1" {
                            return Err(StructuralError::TypeMismatch {
                                entity: entity.clone(),
                                field: "DRESP1",
                                expected: "DRESP1".to_string(),
                                found,
                            });
                        }
                        Ok(handle)
                    })
                    .collect::<Result<_, _>>()?;
                Ok(ResponseLinks::Dresp2 {
                    equation,
                    desvars,
                    dresp1,
                })
            }
        }
    }

    fn link(&mut self, links: ResponseLinks) {
        self.links = Some(links);
    }

    fn unlink(&mut self) {
        self.links = None;
    }

    fn is_cross_referenced(&self) -> bool {
        self.links.is_some()
    }
}

/// DCONSTR: bounds on a response; several may share a DCID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignConstraint {
    pub dcid: i32,
    pub response: i32,
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
    #[serde(skip)]
    links: Option<Handle<DesignResponse>>,
}

impl DesignConstraint {
    pub fn new(dcid: i32, response: i32, lower: Option<f64>, upper: Option<f64>) -> Self {
        Self {
            dcid,
            response,
            lower,
            upper,
            links: None,
        }
    }

    pub fn response_handle(&self) -> Option<Handle<DesignResponse>> {
        self.links
    }
}

impl Card for DesignConstraint {
    fn card(&self) -> &'static str {
        "DCONSTR"
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new("DCONSTR", self.dcid)
    }
}

impl Resolvable for DesignConstraint {
    type Links = Handle<DesignResponse>;

    fn resolve(&self, model: &Model) -> Result<Self::Links, StructuralError> {
        if let (Some(lower), Some(upper)) = (self.lower, self.upper) {
            if lower > upper {
                return Err(StructuralError::malformed(
                    self.entity(),
                    format!("lower bound {lower} exceeds upper bound {upper}"),
                ));
            }
        }
        model
            .dresps
            .handle(self.response)
            .ok_or_else(|| StructuralError::missing(self.entity(), "DRESP", self.response))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_targets() {
        let grid = DesignResponse::new(
            1,
            "D1",
            ResponseData::Dresp1 {
                response_type: "DISP".into(),
                property_type: None,
                atta: Some(3),
                atti: vec![10],
            },
        );
        assert_eq!(grid.attribute_target(), Some(AttributeTarget::Grids));

        let shell = DesignResponse::new(
            2,
            "S1",
            ResponseData::Dresp1 {
                response_type: "STRESS".into(),
                property_type: Some("pshell".into()),
                atta: Some(9),
                atti: vec![1],
            },
        );
        assert_eq!(
            shell.attribute_target(),
            Some(AttributeTarget::Properties("PSHELL"))
        );
    }

    #[test]
    fn desvar_bounds_default_wide_open() {
        let json = r#"{"id": 1, "label": "T", "xinit": 0.1}"#;
        let d: Desvar = serde_json::from_str(json).unwrap();
        assert_eq!(d, Desvar::new(1, "T", 0.1));
        assert!(d.xlb < -1.0e19 && d.xub > 1.0e19);
    }
}
