use std::io::Write;

use nas_bdf::materials::Material;
use nas_bdf::properties::{Property, PropertyData};
use nas_bdf::{Element, ElementKind, Grid, Model};
use nas_cli::{DecodeArgs, run_decode, run_xref, summarize};
use tempfile::{NamedTempFile, TempDir};

fn rod_model() -> Model {
    let mut model = Model::new();
    model.add_grid(Grid::new(1, [0.0, 0.0, 0.0])).unwrap();
    model.add_grid(Grid::new(2, [1.0, 0.0, 0.0])).unwrap();
    model
        .add_element(Element::new(10, ElementKind::Crod, Some(1), &[1, 2]))
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
        .add_material(Material::isotropic(100, 7.0e10, 0.33, 2700.0))
        .unwrap();
    model
}

fn write_model(model: &Model) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(model.to_json_string().unwrap().as_bytes())
        .unwrap();
    file
}

#[test]
fn summary_counts_cards_from_json() {
    let file = write_model(&rod_model());
    let summary = summarize(file.path()).unwrap();
    assert_eq!(summary.count("GRID"), 2);
    assert_eq!(summary.count("CROD"), 1);
    assert_eq!(summary.cross_referenced, 0);
}

#[test]
fn xref_report_lists_tolerated_errors() {
    let mut model = rod_model();
    model
        .add_element(Element::new(11, ElementKind::Crod, Some(77), &[1, 2]))
        .unwrap();
    let file = write_model(&model);

    let report = run_xref(file.path(), None).unwrap();
    assert!(report.completed);
    assert!(report.fatal.is_none());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].entity.to_string(), "CROD 11");

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["errors"][0]["stage"], "elements");
    assert!(json["generated_at"].as_str().unwrap().ends_with('Z'));
}

#[test]
fn xref_report_carries_fatal_stage() {
    let mut model = rod_model();
    model.add_grid(Grid::new(3, [0.0; 3]).with_cp(9)).unwrap();
    let file = write_model(&model);

    let report = run_xref(file.path(), None).unwrap();
    assert!(!report.completed);
    assert_eq!(report.fatal_stage.as_deref(), Some("nodes"));
}

#[test]
fn xref_reads_options_file() {
    let mut model = rod_model();
    model
        .add_element(Element::new(11, ElementKind::Crod, Some(77), &[1, 2]))
        .unwrap();
    let dir = TempDir::new().unwrap();
    let model_path = dir.path().join("model.json");
    let options_path = dir.path().join("opts.json");
    std::fs::write(&model_path, model.to_json_string().unwrap()).unwrap();
    std::fs::write(&options_path, r#"{ "elements": false, "max_errors": 5 }"#).unwrap();

    let report = run_xref(&model_path, Some(&options_path)).unwrap();
    assert!(report.completed);
    assert!(!report.options.elements);
    assert_eq!(report.options.max_errors, 5);
    assert!(report.errors.is_empty());
}

#[test]
fn missing_model_is_a_load_error() {
    let dir = TempDir::new().unwrap();
    let err = summarize(&dir.path().join("absent.json")).unwrap_err();
    assert!(err.contains("absent.json"));
}

#[test]
fn decode_reports_records_and_residual() {
    let mut bytes = Vec::new();
    for (eid, values) in [(101, [1.0f32, 2.0, 3.0, 4.0]), (102, [5.0, 6.0, 7.0, 8.0])] {
        bytes.extend_from_slice(&(10 * eid + 1i32).to_le_bytes());
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
    }
    bytes.extend_from_slice(&[0; 6]);
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();

    let path = file.path().to_string_lossy().to_string();
    let args: Vec<String> = [
        path.as_str(),
        "--element-type",
        "1",
        "--num-wide",
        "5",
        "--device-code",
        "1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let report = run_decode(&DecodeArgs::parse(&args).unwrap()).unwrap();

    assert_eq!(report.decoded.records, 2);
    assert_eq!(report.decoded.residual, 6);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["results"]["element_names"]["102"], "CROD");
    assert_eq!(
        json["results"]["steps"][0]["elements"]["102"][0]["values"][0],
        serde_json::json!([5.0, 6.0])
    );
}

#[test]
fn decode_width_mismatch_is_an_error() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&[0; 40]).unwrap();
    let args = DecodeArgs {
        table: file.path().to_path_buf(),
        header: nas_op2::TableHeader::new(1, 7),
    };
    let err = run_decode(&args).unwrap_err();
    assert!(err.contains("num_wide") || err.contains("7"));
}
