//! End-to-end cross-referencing of small models.

use approx::assert_relative_eq;
use nas_bdf::constraints::{SinglePointConstraint, SpcAdd};
use nas_bdf::materials::Material;
use nas_bdf::properties::{Property, PropertyData};
use nas_bdf::{
    Coord, CoordFamily, Element, ElementKind, Grid, Model, NodeRef, OverflowPolicy, Resolvable,
    Stage, StructuralError, XrefError, XrefOptions, cross_reference,
};

/// Two-bay rod truss: grids 1-3 along x, CROD 10 and 11, PROD 1, MAT1 100
fn truss() -> Model {
    let mut model = Model::new();
    for nid in 1..=3 {
        model
            .add_grid(Grid::new(nid, [(nid - 1) as f64, 0.0, 0.0]))
            .unwrap();
    }
    model
        .add_element(Element::new(10, ElementKind::Crod, Some(1), &[1, 2]))
        .unwrap();
    model
        .add_element(Element::new(11, ElementKind::Crod, Some(1), &[2, 3]))
        .unwrap();
    model
        .add_property(Property::new(
            1,
            PropertyData::Prod {
                mid: 100,
                a: 0.01,
                j: 0.0,
            },
        ))
        .unwrap();
    model
        .add_material(Material::isotropic(100, 2.1e11, 0.3, 7850.0))
        .unwrap();
    model
}

#[test]
fn truss_resolves_completely() {
    let mut model = truss();
    cross_reference(&mut model, &XrefOptions::default()).unwrap();

    assert!(model.xref_errors.is_empty());
    assert!(model.nodes.iter().all(|g| g.is_cross_referenced()));
    assert!(model.elements.iter().all(|e| e.is_cross_referenced()));
    assert!(model.properties.iter().all(|p| p.is_cross_referenced()));
    assert!(model.materials.iter().all(|m| m.is_cross_referenced()));

    let summary = model.summary();
    assert_eq!(summary.count("GRID"), 3);
    assert!(summary.unresolved.is_empty());
}

#[test]
fn dangling_input_frame_fails_nodes_stage() {
    let mut model = truss();
    model.add_grid(Grid::new(4, [0.0; 3]).with_cp(9)).unwrap();

    let err = cross_reference(&mut model, &XrefOptions::default()).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Nodes));
    match err {
        XrefError::Stage {
            source: StructuralError::MissingReference { id, .. },
            ..
        } => assert_eq!(id, 9),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn coordinate_cycle_is_fatal() {
    let mut model = Model::new();
    let points = ([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]);
    model
        .add_coord(Coord::cord2(1, CoordFamily::Rectangular, 2, points.0, points.1, points.2))
        .unwrap();
    model
        .add_coord(Coord::cord2(2, CoordFamily::Rectangular, 1, points.0, points.1, points.2))
        .unwrap();

    let err = cross_reference(&mut model, &XrefOptions::geometry_only()).unwrap_err();
    match err {
        XrefError::Stage {
            stage: Stage::Coordinates,
            source: StructuralError::CoordinateCycle { chain },
        } => {
            assert!(chain.contains(&1) && chain.contains(&2));
            assert_eq!(chain.first(), chain.last());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn one_bad_property_leaves_siblings_linked() {
    let mut model = truss();
    for eid in 20..25 {
        model
            .add_element(Element::new(eid, ElementKind::Crod, Some(1), &[1, 3]))
            .unwrap();
    }
    model
        .add_element(Element::new(30, ElementKind::Crod, Some(77), &[1, 2]))
        .unwrap();

    cross_reference(&mut model, &XrefOptions::default()).unwrap();

    assert_eq!(model.xref_errors.total(), 1);
    let record = model.xref_errors.records().next().unwrap();
    assert_eq!(record.stage, Stage::Elements);
    assert_eq!(record.entity.to_string(), "CROD 30");

    let linked = model.elements.iter().filter(|e| e.is_cross_referenced()).count();
    assert_eq!(linked, model.elements.len() - 1);
    assert!(!model.elements.get(30).unwrap().is_cross_referenced());
}

#[test]
fn zero_corner_node_is_logged_not_grounded() {
    let mut model = truss();
    model
        .add_element(Element::new(12, ElementKind::Crod, Some(1), &[1, 0]))
        .unwrap();

    cross_reference(&mut model, &XrefOptions::default()).unwrap();

    assert_eq!(model.xref_errors.total(), 1);
    let record = model.xref_errors.records().next().unwrap();
    assert_eq!(record.stage, Stage::Elements);
    assert_eq!(record.entity.to_string(), "CROD 12");
    assert!(record.description.contains("corner node 2 is blank or 0"));

    let rod = model.elements.get(12).unwrap();
    assert!(!rod.is_cross_referenced());
    assert!(rod.links().is_none());
    // only CROD 10 is attached to grid 1
    assert_eq!(model.nodes.get(1).unwrap().elements().len(), 1);
}

#[test]
fn failed_second_pass_drops_stale_links() {
    let mut model = truss();
    cross_reference(&mut model, &XrefOptions::default()).unwrap();
    assert!(model.elements.get(10).unwrap().is_cross_referenced());
    assert_eq!(model.nodes.get(1).unwrap().elements().len(), 1);

    model.elements.get_mut(10).unwrap().pid = Some(77);
    cross_reference(&mut model, &XrefOptions::default()).unwrap();

    assert_eq!(model.xref_errors.total(), 1);
    let rod = model.elements.get(10).unwrap();
    assert!(!rod.is_cross_referenced());
    assert!(rod.links().is_none());
    assert!(model.nodes.get(1).unwrap().elements().is_empty());
    assert!(model.summary().unresolved.contains_key("CROD"));

    // fixing the card links it again
    model.elements.get_mut(10).unwrap().pid = Some(1);
    cross_reference(&mut model, &XrefOptions::default()).unwrap();
    assert!(model.xref_errors.is_empty());
    let property = model.elements.get(10).unwrap().links().unwrap().property;
    assert_eq!(property, model.properties.handle(1));
}

fn model_with_bad_elements(count: i32) -> Model {
    let mut model = truss();
    for eid in 0..count {
        model
            .add_element(Element::new(100 + eid, ElementKind::Crod, Some(999), &[1, 2]))
            .unwrap();
    }
    model
}

#[test]
fn overflow_flush_fires_once_and_completes() {
    let mut model = model_with_bad_elements(5);
    let options = XrefOptions::default().with_max_errors(3);

    cross_reference(&mut model, &options).unwrap();

    assert_eq!(model.xref_errors.total(), 5);
    assert_eq!(model.xref_errors.overflow_events(), 1);
    assert!(model.xref_errors.pending().is_empty());
    // later stages still ran
    assert!(model.properties.get(1).unwrap().is_cross_referenced());
}

#[test]
fn overflow_abort_stops_the_pass() {
    let mut model = model_with_bad_elements(5);
    let options = XrefOptions::default()
        .with_max_errors(3)
        .with_overflow(OverflowPolicy::Abort);

    let err = cross_reference(&mut model, &options).unwrap_err();
    assert_eq!(err, XrefError::TooManyErrors { total: 4, limit: 3 });
    assert!(!model.properties.get(1).unwrap().is_cross_referenced());
}

#[test]
fn node_element_linkage_is_symmetric() {
    let mut model = truss();
    cross_reference(&mut model, &XrefOptions::default()).unwrap();

    for element_handle in model.elements.handles() {
        let element = &model.elements[element_handle];
        for node in element.links().unwrap().nodes.iter().flatten() {
            let NodeRef::Grid(grid) = node else { continue };
            assert!(model.nodes[*grid].elements().contains(&element_handle));
        }
    }
    for grid in model.nodes.iter() {
        for &eh in grid.elements() {
            assert!(model.elements[eh].node_ids().any(|nid| nid == grid.nid));
        }
    }

    let middle = model.nodes.get(2).unwrap();
    assert_eq!(middle.elements().len(), 2);
    assert_eq!(model.nodes.get(1).unwrap().elements().len(), 1);
}

#[test]
fn spcadd_expands_member_sets() {
    let mut model = truss();
    model.add_spc(SinglePointConstraint::spc1(1, "123", &[1, 3]));
    model.add_spc(SinglePointConstraint::spc1(2, "456", &[1]));
    model.spcadds.insert(SpcAdd::new(10, &[1, 2])).unwrap();

    cross_reference(&mut model, &XrefOptions::default()).unwrap();

    assert_eq!(model.spc_aggregate.constraints_for(1).len(), 6);
    assert_eq!(model.spc_aggregate.constraints_for(2).len(), 3);
    let combined = model.spc_aggregate.constraints_for(10);
    assert_eq!(combined.len(), 9);
    assert!(combined.iter().any(|dof| dof.node == 1 && dof.component == 6));

    // a second pass starts from empty aggregates
    cross_reference(&mut model, &XrefOptions::default()).unwrap();
    assert_eq!(model.spc_aggregate.constraints_for(10).len(), 9);
}

#[test]
fn spcadd_with_unknown_member_is_fatal() {
    let mut model = truss();
    model.add_spc(SinglePointConstraint::spc1(1, "123", &[1]));
    model.spcadds.insert(SpcAdd::new(10, &[1, 5])).unwrap();

    let err = cross_reference(&mut model, &XrefOptions::default()).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Constraints));
}

#[test]
fn positions_follow_nested_frames() {
    let mut model = Model::new();
    // frame 1: basic shifted by +1 in x
    model
        .add_coord(Coord::cord2(
            1,
            CoordFamily::Rectangular,
            0,
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 1.0],
            [2.0, 0.0, 0.0],
        ))
        .unwrap();
    // frame 2: cylindrical, centred on the origin of frame 1
    model
        .add_coord(Coord::cord2(
            2,
            CoordFamily::Cylindrical,
            1,
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 0.0],
        ))
        .unwrap();
    model.add_grid(Grid::new(1, [1.0, 2.0, 3.0]).with_cp(1)).unwrap();
    model.add_grid(Grid::new(2, [2.0, 90.0, 1.0]).with_cp(2)).unwrap();

    cross_reference(&mut model, &XrefOptions::geometry_only()).unwrap();

    let p1 = model.nodes.get(1).unwrap().position(&model).unwrap();
    assert_relative_eq!(p1.x, 2.0, epsilon = 1e-12);
    assert_relative_eq!(p1.y, 2.0, epsilon = 1e-12);
    assert_relative_eq!(p1.z, 3.0, epsilon = 1e-12);

    let p2 = model.nodes.get(2).unwrap().position(&model).unwrap();
    assert_relative_eq!(p2.x, 1.0, epsilon = 1e-12);
    assert_relative_eq!(p2.y, 2.0, epsilon = 1e-12);
    assert_relative_eq!(p2.z, 1.0, epsilon = 1e-12);

    let local = model.nodes.get(2).unwrap().position_wrt(&model, 1).unwrap();
    assert_relative_eq!(local.x, 0.0, epsilon = 1e-12);
    assert_relative_eq!(local.y, 2.0, epsilon = 1e-12);
}

#[test]
fn json_roundtrip_drops_links() {
    let mut model = truss();
    cross_reference(&mut model, &XrefOptions::default()).unwrap();

    let text = model.to_json_string().unwrap();
    let back = Model::from_json_str(&text).unwrap();

    assert_eq!(back.nodes.len(), 3);
    assert_eq!(back.elements.len(), 2);
    assert!(back.nodes.iter().all(|g| !g.is_cross_referenced()));
    assert!(back.elements.iter().all(|e| !e.is_cross_referenced()));
    assert!(back.xref_errors.is_empty());

    let mut back = back;
    cross_reference(&mut back, &XrefOptions::default()).unwrap();
    assert!(back.elements.iter().all(|e| e.is_cross_referenced()));
}
