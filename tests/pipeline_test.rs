//! Integration tests for the prepare and reconcile stages
//!
//! Each test lays out a complete workspace in a temporary directory: raw
//! data folders, a job table, the batch tool's quant table and the exports
//! of the statistics and networking tools.

use std::fs;
use std::path::Path;

use featurelink::config::Config;
use featurelink::error::PipelineError;
use featurelink::filter::network::{KEEP_COMPONENT, KEEP_NODE};
use featurelink::job::JobTable;
use featurelink::pipeline::{Pipeline, Stage};
use featurelink::report::{report_dir, Manifest, MANIFEST_FILE};
use featurelink::table::Table;
use tempfile::tempdir;

const JOBS: &str = "Job Name,Control Folder,Ionization,RT minimum cutoff
JobA,CtrlA,POS,0.5
JobB,CtrlB,POS,0.5
";

const QUANT: &str = "row ID,row m/z,row retention time,c1.mzML Peak area,c2.mzML Peak area,e1.mzML Peak area,e2.mzML Peak area
3,300.1,3.2,200000,200000,4000000,4000000
1,229.9811,4.69,100000,100000,100000,100000
2,504.32372,7.4631,0,0,1200000,1200000
4,150.05,0.2,0,0,0,0
5,505.33,7.5,10,10,10,10
";

const FOLD_CHANGE: &str = "MetaboAnalyst_ID,Fold Change,Log2_FoldChange
2/504.3237mz/7.46min,1024,10.0
3/300.1mz/3.2min,20,4.32
1/229.9811mz/4.69min,1,0.0
";

const T_TEST: &str = ",t.stat,p.value,-log10(p),FDR
2/504.3237mz/7.46min,12.1,0.001,3.0,0.003
3/300.1mz/3.2min,8.2,0.01,2.0,0.015
";

const NORMALIZED: &str = "MetaboAnalyst_ID,c1.mzML,c2.mzML,e1.mzML,e2.mzML
2/504.3237mz/7.46min,-1.2,-1.2,1.2,1.2
";

const NODES: &str = "shared name,componentindex,precursor mass,RTMean,Compound_Name
1,-1,229.98,4.70,
2,7,504.3237,7.46,Baumin
3,9,300.1,3.2,Suspect related to Tryptophan
5,7,505.33,7.5,Leucine
";

const NODES_GRAPHML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <key id="ci" for="node" attr.name="componentindex" attr.type="int"/>
  <key id="pm" for="node" attr.name="precursor mass" attr.type="double"/>
  <key id="rt" for="node" attr.name="RTMean" attr.type="double"/>
  <key id="ctrl" for="node" attr.name="GNPSGROUP:CTRL" attr.type="double"/>
  <key id="exp" for="node" attr.name="GNPSGROUP:EXP" attr.type="double"/>
  <key id="cn" for="node" attr.name="Compound_Name" attr.type="string"/>
  <key id="cs" for="edge" attr.name="cosine_score" attr.type="double"/>
  <graph edgedefault="undirected">
    <node id="1">
      <data key="ci">-1</data><data key="pm">229.98</data><data key="rt">4.70</data>
      <data key="ctrl">100000</data><data key="exp">100000</data>
    </node>
    <node id="2">
      <data key="ci">7</data><data key="pm">504.3237</data><data key="rt">7.46</data>
      <data key="exp">5000000</data><data key="cn">Baumin</data>
    </node>
    <node id="3">
      <data key="ci">9</data><data key="pm">300.1</data><data key="rt">3.2</data>
      <data key="ctrl">200000</data><data key="exp">4000000</data>
      <data key="cn">Suspect related to Tryptophan</data>
    </node>
    <node id="5">
      <data key="ci">7</data><data key="pm">505.33</data><data key="rt">7.5</data>
      <data key="ctrl">10</data><data key="exp">10</data><data key="cn">Leucine</data>
    </node>
    <edge source="2" target="5"><data key="cs">0.91</data></edge>
  </graph>
</graphml>
"#;

/// Quant table without the internal standard's feature
fn quant_without_standard() -> String {
    QUANT
        .lines()
        .filter(|l| !l.starts_with("1,"))
        .map(|l| format!("{}\n", l))
        .collect()
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Lay out a workspace and return its configuration
fn workspace(root: &Path) -> Config {
    let mut config = Config::default();
    config.paths.data = root.join("data");
    config.paths.temp = root.join("temp");
    config.paths.output = root.join("output");
    config.paths.job_table = root.join("input").join("jobs.csv");

    write(&config.paths.job_table, JOBS);
    for file in ["e1.mzML", "e2.mzML", "notes.txt"] {
        write(&config.data_folder("JobA").join(file), "");
    }
    for file in ["c1.mzML", "c2.mzML"] {
        write(&config.data_folder("CtrlA").join(file), "");
    }
    write(&config.data_folder("JobB").join("e1.mzML"), "");
    fs::create_dir_all(config.data_folder("CtrlB")).unwrap();

    write(&config.quant_path("JobA"), QUANT);
    write(&config.fold_change_path("JobA"), FOLD_CHANGE);
    write(&config.t_test_path("JobA"), T_TEST);
    write(&config.normalized_path("JobA"), NORMALIZED);
    write(&config.temp_file("JobA", "_node_table.csv"), NODES);
    config
}

fn manifest(config: &Config, job: &str) -> Manifest {
    let dir = report_dir(&config.paths.output, job);
    let json = fs::read_to_string(dir.join(MANIFEST_FILE)).unwrap();
    serde_json::from_str(&json).unwrap()
}

fn report_files(config: &Config, job: &str) -> Vec<(String, Vec<u8>)> {
    let dir = report_dir(&config.paths.output, job);
    let mut files: Vec<_> = fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .map(|p| {
            let name = p.file_name().unwrap().to_string_lossy().into_owned();
            (name, fs::read(&p).unwrap())
        })
        .collect();
    files.sort();
    files
}

#[test]
fn test_prepare_writes_sheets_and_records_standard() {
    let dir = tempdir().unwrap();
    let config = workspace(dir.path());
    let mut pipeline = Pipeline::new(config.clone()).unwrap();

    pipeline.run(Stage::Prepare, Some("JobA")).unwrap();

    let sheet = fs::read_to_string(config.temp_file("JobA", "_metadata.tsv")).unwrap();
    assert_eq!(
        sheet,
        "Filename\tClass\nc1.mzML\tCTRL\nc2.mzML\tCTRL\ne1.mzML\tEXP\ne2.mzML\tEXP\n"
    );
    let network_sheet = fs::read_to_string(config.temp_file("JobA", "_metadata_gnps.tsv")).unwrap();
    assert!(network_sheet.starts_with("filename\tATTRIBUTE_GROUP\n"));

    let input = fs::read_to_string(config.temp_file("JobA", "_MetaboAnalyst_input.csv")).unwrap();
    let lines: Vec<&str> = input.lines().collect();
    assert_eq!(lines[0], "Filename,c1.mzML,c2.mzML,e1.mzML,e2.mzML");
    assert_eq!(lines[1], "Class,CTRL,CTRL,EXP,EXP");
    assert_eq!(lines[2], "1/229.9811mz/4.69min,100000,100000,100000,100000");
    // Row 4 elutes before the cutoff
    assert_eq!(lines.len(), 6);
    assert!(!input.contains("4/150.05mz"));

    let jobs = JobTable::open(&config.paths.job_table, "Standard Feature").unwrap();
    let job = jobs.find("JobA").unwrap();
    assert_eq!(job.standard_feature.as_deref(), Some("1/229.9811mz/4.69min"));
    assert_eq!(jobs.find("JobB").unwrap().standard_feature, None);

    let summary = pipeline.summary();
    assert_eq!(summary.jobs.len(), 1);
    assert_eq!(summary.jobs[0].features, 4);
    assert!(!summary.has_failures());
}

#[test]
fn test_reconcile_writes_report() {
    let dir = tempdir().unwrap();
    let config = workspace(dir.path());
    let mut pipeline = Pipeline::new(config.clone()).unwrap();

    pipeline.run(Stage::Run, Some("JobA")).unwrap();

    let manifest = manifest(&config, "JobA");
    assert_eq!(manifest.job, "JobA");
    assert_eq!(manifest.standard_feature.as_deref(), Some("1/229.9811mz/4.69min"));
    assert_eq!(manifest.rows("All"), Some(5));
    assert_eq!(manifest.rows("All Peaks Simple"), Some(5));
    assert_eq!(manifest.rows("Filtered Peaks of Interest"), Some(1));
    assert_eq!(manifest.rows("Upreg Likely Host Metabolites"), Some(1));
    assert_eq!(manifest.rows("Standard Candidates"), Some(1));
    assert_eq!(manifest.rows("All Cmpd Matches"), Some(2));
    assert_eq!(manifest.rows("Cmpd Matches No Sus"), Some(2));
    assert_eq!(manifest.sheets.first().unwrap().name, "All Peaks Simple");
    assert_eq!(manifest.sheets.last().unwrap().name, "Filter Parameters");

    let report = report_dir(&config.paths.output, "JobA");
    let peaks = Table::from_path(report.join("Filtered_Peaks_of_Interest.csv")).unwrap();
    assert_eq!(peaks.columns()[0], "shared name");
    assert_eq!(peaks.value(0, "shared name").unwrap().to_key().as_deref(), Some("2"));
    assert_eq!(
        peaks.value(0, "feature_id").unwrap().as_str(),
        Some("2/504.3237mz/7.46min")
    );
    assert_eq!(peaks.value(0, "GNPSGROUP:EXP_log10").unwrap().as_f64(), Some(6.08));
    assert!(peaks.value(0, "GNPSGROUP:CTRL_log10").unwrap().is_null());
    assert_eq!(peaks.value(0, "log2.FC.").unwrap().as_f64(), Some(10.0));

    let all = Table::from_path(report.join("All.csv")).unwrap();
    let suspect = (0..all.len())
        .find(|&r| all.value(r, "shared name").unwrap().to_key().as_deref() == Some("3"))
        .unwrap();
    assert!(all.value(suspect, "Compound_Name").unwrap().is_null());
    assert_eq!(
        all.value(suspect, "Suspect_Compound_Match").unwrap().as_str(),
        Some("Suspect related to Tryptophan")
    );
    assert!(all.has_column("c1.mzML_normalized"));

    let nodes = Table::from_path(config.node_table_output_path("JobA")).unwrap();
    let flags: Vec<(String, String, String)> = (0..nodes.len())
        .map(|r| {
            (
                nodes.value(r, "shared name").unwrap().to_key().unwrap(),
                nodes.value(r, KEEP_NODE).unwrap().to_string(),
                nodes.value(r, KEEP_COMPONENT).unwrap().to_string(),
            )
        })
        .collect();
    let flag = |key: &str| flags.iter().find(|f| f.0 == key).cloned().unwrap();
    assert_eq!(flag("2"), ("2".into(), "TRUE".into(), "TRUE".into()));
    assert_eq!(flag("5"), ("5".into(), "FALSE".into(), "TRUE".into()));
    assert_eq!(flag("1"), ("1".into(), "FALSE".into(), "FALSE".into()));
}

#[test]
fn test_reconcile_is_idempotent() {
    let dir = tempdir().unwrap();
    let config = workspace(dir.path());
    let mut pipeline = Pipeline::new(config.clone()).unwrap();

    pipeline.run(Stage::Run, Some("JobA")).unwrap();
    let first = report_files(&config, "JobA");
    let jobs_first = fs::read(&config.paths.job_table).unwrap();

    let mut pipeline = Pipeline::new(config.clone()).unwrap();
    pipeline.run(Stage::Run, Some("JobA")).unwrap();
    let second = report_files(&config, "JobA");

    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert_eq!(jobs_first, fs::read(&config.paths.job_table).unwrap());
}

#[test]
fn test_missing_control_files_abort_run() {
    let dir = tempdir().unwrap();
    let config = workspace(dir.path());
    let mut pipeline = Pipeline::new(config.clone()).unwrap();

    let err = pipeline.run(Stage::Prepare, None).unwrap_err();
    assert!(matches!(err, PipelineError::NoControlFiles { ref job, .. } if job == "JobB"));

    // JobA completed and its standard stays recorded
    let summary = pipeline.summary();
    assert_eq!(summary.jobs.len(), 2);
    assert_eq!(summary.success_count(), 1);
    assert!(summary.has_failures());
    let jobs = JobTable::open(&config.paths.job_table, "Standard Feature").unwrap();
    assert!(jobs.find("JobA").unwrap().standard_feature.is_some());
}

#[test]
fn test_missing_statistics_export() {
    let dir = tempdir().unwrap();
    let config = workspace(dir.path());
    fs::remove_file(config.t_test_path("JobA")).unwrap();
    let mut pipeline = Pipeline::new(config.clone()).unwrap();

    let err = pipeline.run(Stage::Reconcile, Some("JobA")).unwrap_err();
    assert!(matches!(err, PipelineError::MissingInput(_)));
    assert!(!report_dir(&config.paths.output, "JobA").exists());
}

#[test]
fn test_reconcile_without_network() {
    let dir = tempdir().unwrap();
    let config = workspace(dir.path());
    fs::remove_file(config.temp_file("JobA", "_node_table.csv")).unwrap();
    let mut pipeline = Pipeline::new(config.clone()).unwrap();

    pipeline.run(Stage::Reconcile, Some("JobA")).unwrap();

    let manifest = manifest(&config, "JobA");
    assert_eq!(manifest.rows("All"), Some(5));
    assert_eq!(manifest.rows("Filtered Peaks of Interest"), Some(1));
    // Falls back to the quant table's own m/z and retention time
    assert_eq!(manifest.rows("Standard Candidates"), Some(1));
    assert_eq!(manifest.rows("All Cmpd Matches"), None);
    assert!(!config.node_table_output_path("JobA").exists());
}

#[test]
fn test_reconcile_with_graphml_network() {
    let dir = tempdir().unwrap();
    let config = workspace(dir.path());
    fs::remove_file(config.temp_file("JobA", "_node_table.csv")).unwrap();
    write(&config.temp_file("JobA", ".graphml"), NODES_GRAPHML);
    let mut pipeline = Pipeline::new(config.clone()).unwrap();

    pipeline.run(Stage::Reconcile, Some("JobA")).unwrap();

    let manifest = manifest(&config, "JobA");
    assert_eq!(manifest.rows("All"), Some(5));
    assert_eq!(manifest.rows("Filtered Peaks of Interest"), Some(1));
    assert_eq!(manifest.rows("Standard Candidates"), Some(1));
    assert_eq!(manifest.rows("All Cmpd Matches"), Some(2));

    // Group averages come from the network export, not the peak areas
    let report = report_dir(&config.paths.output, "JobA");
    let peaks = Table::from_path(report.join("Filtered_Peaks_of_Interest.csv")).unwrap();
    assert_eq!(peaks.value(0, "shared name").unwrap().to_key().as_deref(), Some("2"));
    assert_eq!(peaks.value(0, "GNPSGROUP:EXP").unwrap().as_f64(), Some(5e6));
    assert_eq!(peaks.value(0, "GNPSGROUP:EXP_log10").unwrap().as_f64(), Some(6.7));
    assert_eq!(peaks.value(0, "precursor mass").unwrap().as_f64(), Some(504.3237));

    let standard = Table::from_path(report.join("Standard_Candidates.csv")).unwrap();
    assert_eq!(standard.len(), 1);
    assert_eq!(standard.value(0, "shared name").unwrap().to_key().as_deref(), Some("1"));

    let nodes = Table::from_path(config.node_table_output_path("JobA")).unwrap();
    let flag = |key: &str| {
        let r = (0..nodes.len())
            .find(|&r| nodes.value(r, "shared name").unwrap().to_key().as_deref() == Some(key))
            .unwrap();
        (
            nodes.value(r, KEEP_NODE).unwrap().to_string(),
            nodes.value(r, KEEP_COMPONENT).unwrap().to_string(),
        )
    };
    assert_eq!(flag("2"), ("TRUE".into(), "TRUE".into()));
    assert_eq!(flag("5"), ("FALSE".into(), "TRUE".into()));
    assert_eq!(flag("3"), ("FALSE".into(), "FALSE".into()));
}

#[test]
fn test_prepare_without_standard_feature() {
    let dir = tempdir().unwrap();
    let config = workspace(dir.path());
    write(&config.quant_path("JobA"), &quant_without_standard());
    let mut pipeline = Pipeline::new(config.clone()).unwrap();

    let err = pipeline.run(Stage::Prepare, Some("JobA")).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::NoStandardMatch { ref job, ref standard } if job == "JobA" && standard == "ABMBA"
    ));
    assert!(pipeline.summary().has_failures());
    assert_eq!(fs::read_to_string(&config.paths.job_table).unwrap(), JOBS);
}

#[test]
fn test_reconcile_without_standard_feature() {
    let dir = tempdir().unwrap();
    let config = workspace(dir.path());
    write(&config.quant_path("JobA"), &quant_without_standard());
    let mut pipeline = Pipeline::new(config.clone()).unwrap();

    let err = pipeline.run(Stage::Reconcile, Some("JobA")).unwrap_err();
    assert!(matches!(err, PipelineError::NoStandardMatch { ref job, .. } if job == "JobA"));
    assert!(!report_dir(&config.paths.output, "JobA").exists());
}

#[test]
fn test_reconcile_without_standard_search() {
    let dir = tempdir().unwrap();
    let mut config = workspace(dir.path());
    config.standards.search = false;
    write(&config.quant_path("JobA"), &quant_without_standard());
    let mut pipeline = Pipeline::new(config.clone()).unwrap();

    pipeline.run(Stage::Reconcile, Some("JobA")).unwrap();

    assert_eq!(manifest(&config, "JobA").rows("Standard Candidates"), Some(0));
    assert!(!pipeline.summary().has_failures());
}

#[test]
fn test_unknown_job() {
    let dir = tempdir().unwrap();
    let config = workspace(dir.path());
    let mut pipeline = Pipeline::new(config).unwrap();

    let err = pipeline.run(Stage::Prepare, Some("JobZ")).unwrap_err();
    assert!(matches!(err, PipelineError::UnknownJob(ref name) if name == "JobZ"));
}
