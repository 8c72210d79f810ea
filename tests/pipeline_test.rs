use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use uuid::Uuid;

use basic_cleaning::cli::Args;
use basic_cleaning::config::StoreSettings;
use basic_cleaning::dataset::Dataset;
use basic_cleaning::pipeline;
use basic_cleaning::store::{
    Artifact, ArtifactRef, ArtifactStore, ArtifactVersion, LocalArtifactStore, RunRecord,
    RunStatus,
};
use basic_cleaning::CleaningError;

const RAW: &str = "\
id,name,neighbourhood_group,latitude,longitude,room_type,price,minimum_nights,number_of_reviews,last_review,reviews_per_month
2539,Clean & quiet apt home by the park,Brooklyn,40.64749,-73.97237,Private room,10,1,9,2018-10-19,0.21
2595,Skylit Midtown Castle,Manhattan,40.75362,-73.98377,Entire home/apt,50,1,45,2019-05-21,
3647,THE VILLAGE OF HARLEM....NEW YORK !,Manhattan,40.80902,-73.9419,Private room,9999,3,0,,
3831,\"Cozy Entire Floor, Brownstone\",Brooklyn,40.68514,-80.0,Entire home/apt,30,1,270,2019-07-05,4.64
5022,Entire Apt: Spacious Studio/Loft,Manhattan,40.79851,-73.94399,Entire home/apt,-5,10,9,2018-11-19,0.10
";

fn args(input: &str) -> Args {
    Args {
        input_artifact: input.to_string(),
        artifact_name: "clean_sample.csv".to_string(),
        artifact_type: "clean_sample".to_string(),
        artifact_description: "Data with outliers and null values removed".to_string(),
        min_price: 20,
        max_price: 100,
    }
}

fn settings(root: &Path) -> StoreSettings {
    StoreSettings {
        root: root.join("store"),
        download_dir: root.join("downloads"),
        ..StoreSettings::default()
    }
}

fn seed_raw(store: &LocalArtifactStore, dir: &Path) -> Result<()> {
    let raw = dir.join("sample.csv");
    fs::write(&raw, RAW)?;
    let mut artifact = Artifact::new("sample.csv", "raw_data", "Raw NYC listings");
    artifact.add_file(&raw)?;
    store.log_artifact(&artifact, Uuid::new_v4())?;
    Ok(())
}

fn read_back(store: &dyn ArtifactStore, version: &ArtifactVersion, dir: &Path) -> Result<Dataset> {
    let paths = store.download(version, dir)?;
    Ok(Dataset::read_csv(&paths[0])?)
}

#[test]
fn cleans_and_publishes_a_new_version() -> Result<()> {
    let tmp = tempdir()?;
    let work = tmp.path().join("work");
    fs::create_dir_all(&work)?;
    let settings = settings(tmp.path());
    let store = LocalArtifactStore::open(&settings.root)?;
    seed_raw(&store, tmp.path())?;

    let version = pipeline::go(&args("team/nyc_airbnb/sample.csv:latest"), &store, &settings, &work)?;
    assert_eq!(version.qualified_name(), "clean_sample.csv:v0");
    assert_eq!(version.artifact_type, "clean_sample");
    assert_eq!(version.files[0].name, "processed_data.csv");
    assert_eq!(version.metadata["rows"], 1);
    assert_eq!(version.metadata["columns"][6], "price");

    // The scratch file never outlives the run
    assert!(!work.join("processed_data.csv").exists());

    let cleaned = read_back(&store, &version, &tmp.path().join("check"))?;
    // 50 survives, 30 is inside the price range but outside the bounding box
    assert_eq!(cleaned.column("price")?, vec!["50"]);
    assert_eq!(cleaned.column("reviews_per_month")?, vec!["0"]);
    assert_eq!(cleaned.column("last_review")?, vec!["2019-05-21"]);
    assert_eq!(cleaned.headers()[0], "id");
    assert_eq!(cleaned.headers().len(), 11);

    let run_id = version.logged_by.expect("logged by the run");
    let run = store.load_run(run_id)?.expect("run recorded");
    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(run.job_type, "basic_cleaning");
    assert_eq!(run.inputs, vec!["sample.csv:v0"]);
    assert_eq!(run.outputs, vec!["clean_sample.csv:v0"]);
    assert_eq!(run.config["min_price"], 20);
    assert_eq!(run.config["input_artifact"], "team/nyc_airbnb/sample.csv:latest");
    Ok(())
}

#[test]
fn every_run_creates_a_new_version() -> Result<()> {
    let tmp = tempdir()?;
    let settings = settings(tmp.path());
    let store = LocalArtifactStore::open(&settings.root)?;
    seed_raw(&store, tmp.path())?;

    let first = pipeline::go(&args("sample.csv"), &store, &settings, tmp.path())?;
    let second = pipeline::go(&args("sample.csv"), &store, &settings, tmp.path())?;
    assert_eq!((first.version, second.version), (0, 1));
    assert_eq!(first.files[0].sha256, second.files[0].sha256);

    let latest = store.resolve(&ArtifactRef::latest("clean_sample.csv")?)?;
    assert_eq!(latest.version, 1);
    Ok(())
}

#[test]
fn missing_input_artifact_fails_the_run() -> Result<()> {
    let tmp = tempdir()?;
    let settings = settings(tmp.path());
    let store = LocalArtifactStore::open(&settings.root)?;

    let err = pipeline::go(&args("sample.csv:v7"), &store, &settings, tmp.path()).unwrap_err();
    assert!(matches!(err, CleaningError::ArtifactNotFound(_)));
    assert!(store.list_versions("clean_sample.csv")?.is_empty());
    Ok(())
}

#[test]
fn missing_column_fails_before_publishing() -> Result<()> {
    let tmp = tempdir()?;
    let settings = settings(tmp.path());
    let store = LocalArtifactStore::open(&settings.root)?;

    let raw = tmp.path().join("partial.csv");
    fs::write(&raw, "id,price\n1,50\n")?;
    let mut artifact = Artifact::new("sample.csv", "raw_data", "no coordinates");
    artifact.add_file(&raw)?;
    store.log_artifact(&artifact, Uuid::new_v4())?;

    let err = pipeline::go(&args("sample.csv"), &store, &settings, tmp.path()).unwrap_err();
    assert!(matches!(err, CleaningError::MissingColumn(ref c) if c == "reviews_per_month"));
    assert!(store.list_versions("clean_sample.csv")?.is_empty());
    Ok(())
}

/// Delegates to a local store but refuses every upload.
struct RejectingStore {
    inner: LocalArtifactStore,
    saved_runs: std::cell::RefCell<Vec<RunRecord>>,
}

impl ArtifactStore for RejectingStore {
    fn resolve(&self, reference: &ArtifactRef) -> basic_cleaning::Result<ArtifactVersion> {
        self.inner.resolve(reference)
    }

    fn download(&self, version: &ArtifactVersion, dest_dir: &Path) -> basic_cleaning::Result<Vec<PathBuf>> {
        self.inner.download(version, dest_dir)
    }

    fn log_artifact(&self, _artifact: &Artifact, _run_id: Uuid) -> basic_cleaning::Result<ArtifactVersion> {
        Err(CleaningError::Store { status: 503, message: "upload unavailable".to_string() })
    }

    fn save_run(&self, run: &RunRecord) -> basic_cleaning::Result<()> {
        self.saved_runs.borrow_mut().push(run.clone());
        self.inner.save_run(run)
    }

    fn describe(&self) -> String {
        "rejecting store".to_string()
    }
}

#[test]
fn failed_upload_still_removes_the_scratch_file() -> Result<()> {
    let tmp = tempdir()?;
    let work = tmp.path().join("work");
    fs::create_dir_all(&work)?;
    let settings = settings(tmp.path());
    let inner = LocalArtifactStore::open(&settings.root)?;
    seed_raw(&inner, tmp.path())?;
    let store = RejectingStore { inner, saved_runs: Default::default() };

    let err = pipeline::go(&args("sample.csv"), &store, &settings, &work).unwrap_err();
    assert!(matches!(err, CleaningError::Store { status: 503, .. }));
    assert!(!work.join("processed_data.csv").exists());

    let runs = store.saved_runs.borrow();
    let last = runs.last().expect("run saved");
    assert_eq!(last.status, RunStatus::Failed);
    assert!(last.error.as_deref().unwrap_or_default().contains("upload unavailable"));
    Ok(())
}
