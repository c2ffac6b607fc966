//! End-to-end pipeline tests over a temporary CSV fixture: derived file
//! names, statistics sidecars, error taxonomy, and byte-stable reruns.

use std::fs;
use std::path::Path;

use reporter::analysis::correlation::CorrMethod;
use reporter::charts::PlotLayout;
use reporter::filters::{FilterSpec, NonPositivePolicy};
use reporter::models::{PlotFormat, ReportError, RoundFilter};
use reporter::pipeline::{self, RunConfig};

const FIXTURE: &str = "\
name,round,kd,iptm,pae_interaction,binding,binding_strength,expression,selected,design_category
d1,1,1e-7,0.80,10.0,Yes,Weak,High,Top 100,De novo
d2,1,1e-9,0.90,8.0,Yes,Strong,High,Top 100,De novo
d3,1,,0.30,22.0,No,None,None,No,Optimized binder
d4,2,5e-8,0.70,12.0,Yes,Medium,Medium,Adaptyv selection,De novo
d5,2,,0.20,25.0,No,None,Low,No,Hallucination
d6,2,2e-8,0.85,9.0,Yes,Medium,High,Top 100,De novo
d7,2,,0.25,24.0,No,None,None,No,Optimized binder
d8,2,1e-6,0.60,15.0,Yes,Weak,Medium,No,De novo
d9,2,,0.40,20.0,No,Unknown,Low,No,Hallucination
d10,2,4e-9,0.88,8.5,Yes,Strong,High,Adaptyv selection,De novo
";

fn write_fixture(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("submissions.csv");
    fs::write(&path, content).unwrap();
    path
}

fn config(input: &Path, output: &Path, format: PlotFormat) -> RunConfig {
    RunConfig {
        input: input.to_path_buf(),
        output_dir: output.to_path_buf(),
        layout: PlotLayout {
            width: 640,
            height: 480,
            res: 150,
            format,
        },
        filter: FilterSpec::default(),
        title: None,
        subtitle: None,
    }
}

#[test]
fn bar_writes_image_and_count_table() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), FIXTURE);
    let cfg = config(&input, dir.path(), PlotFormat::Png);

    let artifacts = pipeline::run_bar(&cfg, "binding_strength", "expression").unwrap();
    assert_eq!(
        artifacts.image.file_name().unwrap(),
        "barplot_binding_strength_by_expression.png"
    );
    assert!(artifacts.image.exists());

    let counts = fs::read_to_string(artifacts.stats_csv.unwrap()).unwrap();
    assert!(counts.starts_with("binding_strength,expression,count"));
    // The "Unknown" level is recoded before counting.
    assert!(counts.contains("Not expressed"));
    assert!(!counts.contains("Unknown"));
}

#[test]
fn rerun_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), FIXTURE);

    let out_a = dir.path().join("a");
    let out_b = dir.path().join("b");
    pipeline::run_bar(&config(&input, &out_a, PlotFormat::Svg), "binding_strength", "expression")
        .unwrap();
    pipeline::run_bar(&config(&input, &out_b, PlotFormat::Svg), "binding_strength", "expression")
        .unwrap();

    let a = fs::read(out_a.join("barplot_binding_strength_by_expression.svg")).unwrap();
    let b = fs::read(out_b.join("barplot_binding_strength_by_expression.svg")).unwrap();
    assert_eq!(a, b);
}

#[test]
fn missing_column_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), FIXTURE);
    let cfg = config(&input, dir.path(), PlotFormat::Png);

    let err = pipeline::run_bar(&cfg, "no_such_column", "expression").unwrap_err();
    assert!(matches!(err, ReportError::Configuration(_)));
    assert!(err.to_string().contains("no_such_column"));
}

#[test]
fn round_one_scatter_reports_perfect_correlation() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), FIXTURE);
    let mut cfg = config(&input, dir.path(), PlotFormat::Png);
    cfg.filter.round = RoundFilter::One;

    // Round 1 has exactly two rows with a KD value: -log10(kd) of 7 and 9
    // against ipTM 0.80 and 0.90 lie on one line.
    let artifacts = pipeline::run_scatter(
        &cfg,
        "kd",
        "iptm",
        None,
        CorrMethod::Pearson,
        NonPositivePolicy::Drop,
    )
    .unwrap();
    assert_eq!(
        artifacts.image.file_name().unwrap(),
        "scatterplot_iptm_vs_kd.png"
    );

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(artifacts.stats_json.unwrap()).unwrap()).unwrap();
    assert_eq!(json["n"], 2);
    assert!((json["r"].as_f64().unwrap() - 1.0).abs() < 1e-9);
    assert!(json["p"].is_null());
}

#[test]
fn roc_skips_metric_without_usable_scores() {
    let dir = tempfile::tempdir().unwrap();
    // Same table but every KD is zero, so the -log10 transform leaves no
    // usable score for that metric while ipTM still works.
    let zero_kd = FIXTURE
        .lines()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                line.to_string()
            } else {
                let mut fields: Vec<&str> = line.split(',').collect();
                fields[2] = "0";
                fields.join(",")
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    let input = write_fixture(dir.path(), &zero_kd);
    let cfg = config(&input, dir.path(), PlotFormat::Png);

    let artifacts = pipeline::run_roc(
        &cfg,
        &["kd".to_string(), "iptm".to_string()],
        "binding",
        "Yes",
    )
    .unwrap();
    assert!(artifacts.image.exists());

    let stats = fs::read_to_string(artifacts.stats_csv.unwrap()).unwrap();
    assert!(stats.contains("iptm"));
    assert!(!stats.contains("\nkd,"));
}

#[test]
fn roc_with_single_class_outcome_fails() {
    let dir = tempfile::tempdir().unwrap();
    let all_yes = FIXTURE.replace(",No,", ",Yes,");
    let input = write_fixture(dir.path(), &all_yes);
    let cfg = config(&input, dir.path(), PlotFormat::Png);

    let err = pipeline::run_roc(&cfg, &["iptm".to_string()], "binding", "Yes").unwrap_err();
    assert!(matches!(err, ReportError::StatisticalPrecondition(_)));
}

#[test]
fn violin_writes_both_stats_sidecars() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), FIXTURE);
    let cfg = config(&input, dir.path(), PlotFormat::Png);

    let artifacts =
        pipeline::run_violin(&cfg, "iptm", "expression", NonPositivePolicy::Fail).unwrap();
    assert!(artifacts.image.exists());
    assert!(artifacts.stats_csv.as_ref().unwrap().exists());

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(artifacts.stats_json.unwrap()).unwrap()).unwrap();
    assert!(json["h"].is_number());
    assert_eq!(json["df"], 3);
}
