//! Command implementations behind the `nas-cli` binary.
//!
//! Each command loads its inputs, runs the library pass and returns a
//! serializable report; `main` only handles argument routing and output.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use nas_bdf::{Model, ModelSummary, XrefErrorRecord, XrefOptions, cross_reference};
use nas_op2::{DecodedTable, Endian, ResultKind, Sort, TableHeader, decode_tables_parallel};
use serde::Serialize;
use tracing::info;

/// Outcome of `nas-cli xref`
#[derive(Debug, Clone, Serialize)]
pub struct XrefReport {
    pub generated_at: String,
    pub model: String,
    pub options: XrefOptions,
    pub completed: bool,
    /// Message of the fatal error that stopped the pass
    pub fatal: Option<String>,
    pub fatal_stage: Option<String>,
    pub errors: Vec<XrefErrorRecord>,
    pub summary: ModelSummary,
}

/// Outcome of `nas-cli decode`
#[derive(Debug, Clone, Serialize)]
pub struct DecodeReport {
    pub table: String,
    pub header: TableHeader,
    #[serde(flatten)]
    pub decoded: DecodedTable,
}

pub fn load_model(path: &Path) -> Result<Model, String> {
    Model::from_json_file(path).map_err(|err| format!("{}: {}", path.display(), err))
}

pub fn load_options(path: Option<&Path>) -> Result<XrefOptions, String> {
    let Some(path) = path else {
        return Ok(XrefOptions::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    serde_json::from_str(&text).map_err(|err| format!("{}: {}", path.display(), err))
}

pub fn summarize(path: &Path) -> Result<ModelSummary, String> {
    Ok(load_model(path)?.summary())
}

/// Load the model, run the resolver and report what happened.
///
/// A fatal resolver error is part of the report, not an `Err`; only load
/// failures are.
pub fn run_xref(model_path: &Path, options_path: Option<&Path>) -> Result<XrefReport, String> {
    let mut model = load_model(model_path)?;
    let options = load_options(options_path)?;

    let outcome = cross_reference(&mut model, &options);
    let summary = model.summary();
    info!(
        model = %model_path.display(),
        cards = summary.total_cards,
        linked = summary.cross_referenced,
        tolerated = summary.xref_errors,
        "cross-reference pass finished"
    );

    let (fatal, fatal_stage) = match &outcome {
        Ok(()) => (None, None),
        Err(err) => (
            Some(err.to_string()),
            err.stage().map(|stage| stage.name().to_string()),
        ),
    };
    Ok(XrefReport {
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        model: model_path.display().to_string(),
        options,
        completed: outcome.is_ok(),
        fatal,
        fatal_stage,
        errors: model.xref_errors.records().cloned().collect(),
        summary,
    })
}

/// Arguments of `nas-cli decode`
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeArgs {
    pub table: PathBuf,
    pub header: TableHeader,
}

impl DecodeArgs {
    /// Parse `<table.bin> --element-type N --num-wide W [flags]`
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let mut table = None;
        let mut element_type = None;
        let mut num_wide = None;
        let mut device_code = 0;
        let mut magnitude_phase = false;
        let mut endian = Endian::Little;
        let mut dt = None;
        let mut sort2 = None;
        let mut result_kind = ResultKind::Stress;

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| {
                iter.next()
                    .ok_or_else(|| format!("{flag} needs a value"))
                    .cloned()
            };
            match arg.as_str() {
                "--element-type" => element_type = Some(parse_number(&value(arg)?, arg)?),
                "--num-wide" => num_wide = Some(parse_number(&value(arg)?, arg)?),
                "--device-code" => device_code = parse_number(&value(arg)?, arg)?,
                "--dt" => dt = Some(parse_number(&value(arg)?, arg)?),
                "--sort2" => sort2 = Some(parse_number(&value(arg)?, arg)?),
                "--mag-phase" => magnitude_phase = true,
                "--big-endian" => endian = Endian::Big,
                "--strain" => result_kind = ResultKind::Strain,
                flag if flag.starts_with("--") => return Err(format!("unknown option {flag}")),
                path if table.is_none() => table = Some(PathBuf::from(path)),
                extra => return Err(format!("unexpected argument {extra}")),
            }
        }

        let table = table.ok_or("missing table file")?;
        let element_type = element_type.ok_or("missing --element-type")?;
        let num_wide = num_wide.ok_or("missing --num-wide")?;

        let mut header = TableHeader::new(element_type, num_wide)
            .with_device_code(device_code)
            .with_magnitude_phase(magnitude_phase)
            .with_endian(endian);
        header.nonlinear_factor = dt;
        header.result_kind = result_kind;
        if let Some(element_id) = sort2 {
            header.sort = Sort::Sort2 { element_id };
        }
        Ok(Self { table, header })
    }
}

fn parse_number<T: std::str::FromStr>(text: &str, flag: &str) -> Result<T, String> {
    text.parse()
        .map_err(|_| format!("{flag}: invalid number '{text}'"))
}

/// Decode every whole record of the table file
pub fn run_decode(args: &DecodeArgs) -> Result<DecodeReport, String> {
    let bytes = std::fs::read(&args.table)
        .map_err(|err| format!("failed to read {}: {err}", args.table.display()))?;

    let tables = [(args.header.clone(), bytes.as_slice())];
    let decoded = decode_tables_parallel(&tables)
        .into_iter()
        .next()
        .ok_or("no table decoded")?
        .map_err(|err| format!("{}: {}", args.table.display(), err))?;

    Ok(DecodeReport {
        table: args.table.display().to_string(),
        header: args.header.clone(),
        decoded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_decode_flags() {
        let args = DecodeArgs::parse(&strings(&[
            "oes.bin",
            "--element-type",
            "144",
            "--num-wide",
            "77",
            "--device-code",
            "1",
            "--mag-phase",
            "--big-endian",
            "--dt",
            "12.5",
            "--strain",
        ]))
        .unwrap();

        assert_eq!(args.table, PathBuf::from("oes.bin"));
        assert_eq!(args.header.element_type, 144);
        assert_eq!(args.header.num_wide, 77);
        assert_eq!(args.header.device_code, 1);
        assert!(args.header.is_magnitude_phase());
        assert_eq!(args.header.endian, Endian::Big);
        assert_eq!(args.header.nonlinear_factor, Some(12.5));
        assert_eq!(args.header.result_kind, ResultKind::Strain);
        assert!(args.header.is_sort1());
    }

    #[test]
    fn rejects_missing_and_bad_values() {
        let err = DecodeArgs::parse(&strings(&["oes.bin", "--num-wide", "5"])).unwrap_err();
        assert_eq!(err, "missing --element-type");

        let err = DecodeArgs::parse(&strings(&["oes.bin", "--element-type", "rod"])).unwrap_err();
        assert!(err.contains("invalid number"));

        let err = DecodeArgs::parse(&strings(&["oes.bin", "--num-wide"])).unwrap_err();
        assert_eq!(err, "--num-wide needs a value");
    }

    #[test]
    fn missing_options_file_means_defaults() {
        assert_eq!(load_options(None).unwrap(), XrefOptions::default());
    }
}
