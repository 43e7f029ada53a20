//! Coordinate systems (CORD1R/C/S, CORD2R/C/S and the basic frame).
//!
//! A coordinate system is linked in two passes. `resolve` attaches the parent
//! frame (CORD2x) or the three defining grid points (CORD1x). Once every
//! system is linked, `setup` computes the transform to the basic frame; the
//! resolver runs setup in dependency order so parents are always ready first.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::collection::{Card, Handle, Keyed};
use crate::error::{EntityRef, StructuralError};
use crate::model::Model;
use crate::nodes::Grid;
use crate::resolvable::{FinalizeGeometry, FrameTable, Resolvable};

const GEOMETRY_TOLERANCE: f64 = 1.0e-12;

/// Shape of the local coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordFamily {
    /// (x, y, z)
    Rectangular,
    /// (r, theta [deg], z)
    Cylindrical,
    /// (r, theta [deg], phi [deg]), theta measured from the local z-axis
    Spherical,
}

/// How the system is defined on its card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "lowercase")]
pub enum CoordDefinition {
    /// The global frame, cid 0
    Basic,
    /// CORD1x: origin, z-axis and xz-plane given by grid points
    Grids { g1: i32, g2: i32, g3: i32 },
    /// CORD2x: three points expressed in the reference frame `rid`
    Points {
        rid: i32,
        origin: [f64; 3],
        z_axis: [f64; 3],
        xz_plane: [f64; 3],
    },
}

/// Resolved references of a coordinate system
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordLinks {
    Basic,
    Parent(Handle<Coord>),
    Grids([Handle<Grid>; 3]),
}

/// Placement of a coordinate system in the basic frame.
///
/// Rows of `beta` are the local unit axes expressed in basic components.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub family: CoordFamily,
    pub origin: Vector3<f64>,
    pub beta: Matrix3<f64>,
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            family: CoordFamily::Rectangular,
            origin: Vector3::zeros(),
            beta: Matrix3::identity(),
        }
    }

    /// Build a frame from origin `a`, z-axis point `b` and xz-plane point `c`,
    /// all in basic coordinates.
    pub fn from_points(
        entity: EntityRef,
        family: CoordFamily,
        a: Vector3<f64>,
        b: Vector3<f64>,
        c: Vector3<f64>,
    ) -> Result<Self, StructuralError> {
        let z = b - a;
        if z.norm() < GEOMETRY_TOLERANCE {
            return Err(StructuralError::DegenerateGeometry {
                entity,
                message: "origin and z-axis point coincide".to_string(),
            });
        }
        let ez = z.normalize();
        let y = ez.cross(&(c - a));
        if y.norm() < GEOMETRY_TOLERANCE {
            return Err(StructuralError::DegenerateGeometry {
                entity,
                message: "xz-plane point lies on the z-axis".to_string(),
            });
        }
        let ey = y.normalize();
        let ex = ey.cross(&ez);

        Ok(Self {
            family,
            origin: a,
            beta: Matrix3::from_rows(&[ex.transpose(), ey.transpose(), ez.transpose()]),
        })
    }

    /// Convert local (possibly curvilinear) coordinates to local rectangular
    pub fn local_to_rectangular(&self, p: [f64; 3]) -> Vector3<f64> {
        match self.family {
            CoordFamily::Rectangular => Vector3::new(p[0], p[1], p[2]),
            CoordFamily::Cylindrical => {
                let theta = p[1].to_radians();
                Vector3::new(p[0] * theta.cos(), p[0] * theta.sin(), p[2])
            }
            CoordFamily::Spherical => {
                let theta = p[1].to_radians();
                let phi = p[2].to_radians();
                Vector3::new(
                    p[0] * theta.sin() * phi.cos(),
                    p[0] * theta.sin() * phi.sin(),
                    p[0] * theta.cos(),
                )
            }
        }
    }

    /// Local coordinates → basic frame
    pub fn to_basic(&self, p: [f64; 3]) -> Vector3<f64> {
        self.origin + self.beta.transpose() * self.local_to_rectangular(p)
    }

    /// Basic point → local rectangular components
    pub fn to_local_rectangular(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.beta * (p - self.origin)
    }
}

/// A coordinate system card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coord {
    pub cid: i32,
    pub family: CoordFamily,
    #[serde(flatten)]
    pub definition: CoordDefinition,
    #[serde(skip)]
    links: Option<CoordLinks>,
    #[serde(skip)]
    transform: Option<Transform>,
}

impl Coord {
    /// The global frame
    pub fn basic() -> Self {
        Self {
            cid: 0,
            family: CoordFamily::Rectangular,
            definition: CoordDefinition::Basic,
            links: None,
            transform: None,
        }
    }

    /// CORD2R/C/S
    pub fn cord2(
        cid: i32,
        family: CoordFamily,
        rid: i32,
        origin: [f64; 3],
        z_axis: [f64; 3],
        xz_plane: [f64; 3],
    ) -> Self {
        Self {
            cid,
            family,
            definition: CoordDefinition::Points {
                rid,
                origin,
                z_axis,
                xz_plane,
            },
            links: None,
            transform: None,
        }
    }

    /// CORD1R/C/S
    pub fn cord1(cid: i32, family: CoordFamily, g1: i32, g2: i32, g3: i32) -> Self {
        Self {
            cid,
            family,
            definition: CoordDefinition::Grids { g1, g2, g3 },
            links: None,
            transform: None,
        }
    }

    /// Parent frame ID for CORD2x systems
    pub fn rid(&self) -> Option<i32> {
        match self.definition {
            CoordDefinition::Points { rid, .. } => Some(rid),
            _ => None,
        }
    }

    pub fn links(&self) -> Option<&CoordLinks> {
        self.links.as_ref()
    }

    pub fn parent(&self) -> Option<Handle<Coord>> {
        match self.links {
            Some(CoordLinks::Parent(handle)) => Some(handle),
            _ => None,
        }
    }

    pub fn is_setup(&self) -> bool {
        self.transform.is_some()
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    pub(crate) fn set_transform(&mut self, transform: Transform) {
        self.transform = Some(transform);
    }

    /// Local coordinates → basic frame, once setup has run
    pub fn to_basic(&self, p: [f64; 3]) -> Option<Vector3<f64>> {
        self.transform.as_ref().map(|t| t.to_basic(p))
    }

    fn require_links(&self) -> Result<&CoordLinks, StructuralError> {
        self.links
            .as_ref()
            .ok_or_else(|| StructuralError::malformed(self.entity(), "not cross-referenced"))
    }
}

impl Card for Coord {
    fn card(&self) -> &'static str {
        match (&self.definition, self.family) {
            (CoordDefinition::Basic, _) => "CORD2R",
            (CoordDefinition::Grids { .. }, CoordFamily::Rectangular) => "CORD1R",
            (CoordDefinition::Grids { .. }, CoordFamily::Cylindrical) => "CORD1C",
            (CoordDefinition::Grids { .. }, CoordFamily::Spherical) => "CORD1S",
            (CoordDefinition::Points { .. }, CoordFamily::Rectangular) => "CORD2R",
            (CoordDefinition::Points { .. }, CoordFamily::Cylindrical) => "CORD2C",
            (CoordDefinition::Points { .. }, CoordFamily::Spherical) => "CORD2S",
        }
    }

    fn entity(&self) -> EntityRef {
        EntityRef::new(self.card(), self.cid)
    }
}

impl Keyed for Coord {
    fn id(&self) -> i32 {
        self.cid
    }
}

impl Resolvable for Coord {
    type Links = CoordLinks;

    fn resolve(&self, model: &Model) -> Result<CoordLinks, StructuralError> {
        match &self.definition {
            CoordDefinition::Basic => Ok(CoordLinks::Basic),
            CoordDefinition::Points { rid, .. } => {
                if *rid == self.cid {
                    return Err(StructuralError::CoordinateCycle {
                        chain: vec![self.cid, self.cid],
                    });
                }
                model
                    .coords
                    .handle(*rid)
                    .map(CoordLinks::Parent)
                    .ok_or_else(|| {
                        StructuralError::missing(self.entity(), "coordinate system", *rid)
                    })
            }
            CoordDefinition::Grids { g1, g2, g3 } => {
                if g1 == g2 || g2 == g3 || g1 == g3 {
                    return Err(StructuralError::malformed(
                        self.entity(),
                        "defining grid points must be distinct",
                    ));
                }
                let grid = |nid: i32| {
                    model
                        .nodes
                        .handle(nid)
                        .ok_or_else(|| StructuralError::missing(self.entity(), "GRID", nid))
                };
                Ok(CoordLinks::Grids([grid(*g1)?, grid(*g2)?, grid(*g3)?]))
            }
        }
    }

    fn link(&mut self, links: CoordLinks) {
        self.links = Some(links);
        self.transform = None;
    }

    fn unlink(&mut self) {
        self.links = None;
        self.transform = None;
    }

    fn is_cross_referenced(&self) -> bool {
        self.links.is_some()
    }
}

impl FinalizeGeometry for Coord {
    fn setup_dependencies(&self, model: &Model) -> Result<Vec<Handle<Coord>>, StructuralError> {
        match self.require_links()? {
            CoordLinks::Basic => Ok(Vec::new()),
            CoordLinks::Parent(parent) => Ok(vec![*parent]),
            // a CORD1x frame depends on the frames its grids are located in
            CoordLinks::Grids(grids) => grids
                .iter()
                .map(|&g| {
                    let grid = &model.nodes[g];
                    let cp = model.effective_cp(grid);
                    model.coords.handle(cp).ok_or_else(|| {
                        StructuralError::missing(grid.entity(), "coordinate system", cp)
                    })
                })
                .collect(),
        }
    }

    fn setup(&self, model: &Model, frames: &FrameTable) -> Result<Transform, StructuralError> {
        let not_ready =
            || StructuralError::malformed(self.entity(), "reference frame is not set up");

        let (a, b, c) = match (self.require_links()?, &self.definition) {
            (CoordLinks::Basic, _) => return Ok(Transform::identity()),
            (
                CoordLinks::Parent(parent),
                CoordDefinition::Points {
                    origin,
                    z_axis,
                    xz_plane,
                    ..
                },
            ) => {
                let frame = frames.get(*parent).ok_or_else(not_ready)?;
                (
                    frame.to_basic(*origin),
                    frame.to_basic(*z_axis),
                    frame.to_basic(*xz_plane),
                )
            }
            (CoordLinks::Grids(grids), _) => {
                let deps = self.setup_dependencies(model)?;
                let mut points = [Vector3::zeros(); 3];
                for (i, (&g, cp)) in grids.iter().zip(deps).enumerate() {
                    let frame = frames.get(cp).ok_or_else(not_ready)?;
                    points[i] = frame.to_basic(model.nodes[g].xyz);
                }
                (points[0], points[1], points[2])
            }
            (CoordLinks::Parent(_), _) => {
                return Err(StructuralError::malformed(
                    self.entity(),
                    "parent link on a system without defining points",
                ));
            }
        };

        Transform::from_points(self.entity(), self.family, a, b, c)
    }
}
