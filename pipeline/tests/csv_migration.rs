//! End-to-end migration runs over CSV directories with in-memory doubles.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rstest::{fixture, rstest};
use tempfile::TempDir;

use user_migration::domain::{
    Email, GeoEnrichment, GeolocationEnricher, GeolocationEnricherConfig, IdentityResolver,
    MigrationPipeline, MigrationRunError, PersistenceApplier, RecordReconciler, RunSummary,
};
use user_migration::outbound::column_mapping::ColumnMapping;
use user_migration::outbound::csv_source::CsvDirectorySource;
use user_migration::test_support::cap_fs::write_file;
use user_migration::test_support::{
    FixedClock, InMemoryUserStore, RecordingSleeper, ScriptedGeolocationSource, StoreOperation,
    new_user,
};

const HEADER: &str = "email,first_name,ip_address,updated_at,status\n";

fn run_started() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

fn sydney() -> GeoEnrichment {
    GeoEnrichment {
        latitude: -33.8688,
        longitude: 151.2093,
        country: Some("Australia".to_owned()),
        city: Some("Sydney".to_owned()),
        timezone: Some("Australia/Sydney".to_owned()),
        ..GeoEnrichment::default()
    }
}

fn email(address: &str) -> Email {
    Email::new(address).expect("valid email")
}

struct Harness {
    store: Arc<InMemoryUserStore>,
    geolocation: Arc<ScriptedGeolocationSource>,
    sleeper: Arc<RecordingSleeper>,
    pipeline: MigrationPipeline,
}

impl Harness {
    fn new(store: InMemoryUserStore, geolocation: ScriptedGeolocationSource) -> Self {
        let store = Arc::new(store);
        let geolocation = Arc::new(geolocation);
        let sleeper = Arc::new(RecordingSleeper::default());
        let pipeline = MigrationPipeline::new(
            RecordReconciler::new(
                IdentityResolver::new(store.clone()),
                GeolocationEnricher::with_sleeper(
                    geolocation.clone(),
                    sleeper.clone(),
                    GeolocationEnricherConfig::default(),
                ),
                Arc::new(FixedClock::new(run_started())),
            ),
            PersistenceApplier::new(store.clone()),
        );
        Self {
            store,
            geolocation,
            sleeper,
            pipeline,
        }
    }

    async fn run(
        &self,
        directory: &TempDir,
        chunk_size: usize,
    ) -> Result<RunSummary, MigrationRunError> {
        let mut source =
            CsvDirectorySource::open(directory.path(), ColumnMapping::identity(), chunk_size)
                .expect("directory opens");
        self.pipeline.run(&mut source).await
    }
}

#[fixture]
fn directory() -> TempDir {
    tempfile::tempdir().expect("temp dir")
}

fn write(directory: &TempDir, name: &str, rows: &str) {
    let contents = format!("{HEADER}{rows}");
    write_file(&directory.path().join(name), contents.as_bytes()).expect("write fixture");
}

fn write_two_exports(directory: &TempDir) {
    write(
        directory,
        "a.csv",
        "new@x.com,Ada,1.1.1.1,2024-01-01,true\nexisting@x.com,Bob,8.8.8.8,2024-02-01,false\n",
    );
    write(
        directory,
        "b.csv",
        "later@x.com,Cy,1.1.1.1,2024-03-01,yes\nnot-an-email,Dee,1.1.1.1,2024-03-02,no\n",
    );
}

#[rstest]
#[tokio::test]
async fn migrates_every_file_and_classifies_identities(directory: TempDir) {
    write_two_exports(&directory);
    let harness = Harness::new(
        InMemoryUserStore::with_users([new_user("existing@x.com")]),
        ScriptedGeolocationSource::default()
            .with_success("1.1.1.1", sydney())
            .with_failure("8.8.8.8", "quota"),
    );

    let summary = harness.run(&directory, 10).await.expect("run succeeds");

    assert_eq!(
        summary,
        RunSummary {
            batches: 2,
            inserted: 2,
            updated: 1,
            rejected: 1,
        }
    );
    assert_eq!(harness.store.users().len(), 3);

    let inserted = harness.store.find(&email("new@x.com")).expect("inserted");
    assert_eq!(inserted.first_name.as_deref(), Some("Ada"));
    assert_eq!(inserted.status, Some(true));
    assert_eq!(inserted.geolocation, Some(sydney()));
    assert_eq!(inserted.migrated_at, Some(run_started()));
    assert!(!inserted.updated);

    let updated = harness.store.find(&email("existing@x.com")).expect("updated");
    assert_eq!(updated.first_name, None, "names are written on insert only");
    assert_eq!(updated.ip_address.as_deref(), Some("8.8.8.8"));
    assert_eq!(updated.status, Some(false));
    assert_eq!(updated.geolocation, None);
    assert!(updated.updated);

    assert_eq!(
        harness.geolocation.calls(),
        vec![
            vec!["1.1.1.1".to_owned(), "8.8.8.8".to_owned()],
            vec!["1.1.1.1".to_owned()],
        ]
    );
}

#[rstest]
#[tokio::test]
async fn rerunning_the_same_exports_only_updates(directory: TempDir) {
    write_two_exports(&directory);
    let harness = Harness::new(
        InMemoryUserStore::default(),
        ScriptedGeolocationSource::default().with_success("1.1.1.1", sydney()),
    );

    let first = harness.run(&directory, 10).await.expect("first run");
    let second = harness.run(&directory, 10).await.expect("second run");

    assert_eq!((first.inserted, first.updated), (3, 0));
    assert_eq!((second.inserted, second.updated, second.rejected), (0, 3, 1));
    assert_eq!(harness.store.users().len(), 3);
}

#[rstest]
#[tokio::test]
async fn large_batches_are_geolocated_in_paced_groups(directory: TempDir) {
    let rows = (0..250_u32)
        .map(|n| format!("user{n}@x.com,,10.1.{}.{},2024-01-01,\n", n >> 8, n & 0xff))
        .collect::<String>();
    write(&directory, "bulk.csv", &rows);
    let harness = Harness::new(
        InMemoryUserStore::default(),
        ScriptedGeolocationSource::default(),
    );

    let summary = harness.run(&directory, 3000).await.expect("run succeeds");

    assert_eq!(summary.inserted, 250);
    let group_sizes = harness
        .geolocation
        .calls()
        .iter()
        .map(Vec::len)
        .collect::<Vec<_>>();
    assert_eq!(group_sizes, vec![100, 100, 50]);
    assert_eq!(
        harness.sleeper.durations(),
        vec![Duration::from_secs(4), Duration::from_secs(4)]
    );
}

#[rstest]
#[tokio::test]
async fn store_failures_halt_the_run_at_the_failing_batch(directory: TempDir) {
    write_two_exports(&directory);
    let harness = Harness::new(
        InMemoryUserStore::default().failing_on(StoreOperation::Insert),
        ScriptedGeolocationSource::default(),
    );

    let error = harness
        .run(&directory, 10)
        .await
        .expect_err("insert failure halts the run");

    match &error {
        MigrationRunError::Batch {
            label,
            completed_batches,
            ..
        } => {
            assert_eq!(label, "a.csv#1");
            assert_eq!(*completed_batches, 0);
        }
        MigrationRunError::Extraction { .. } => panic!("expected a batch failure, got {error:?}"),
    }
    assert!(harness.store.users().is_empty());
    assert_eq!(
        harness.geolocation.calls().len(),
        1,
        "the second file is never read"
    );
}

#[rstest]
#[tokio::test]
async fn mapped_exports_migrate_like_canonical_ones(directory: TempDir) {
    write_file(
        &directory.path().join("crm.csv"),
        b"Email Address,Last Seen IP,Modified\nada@example.com,1.1.1.1,2024-04-01 08:00:00\n",
    )
    .expect("write fixture");
    let mapping = ColumnMapping::from_json_str(
        r#"{"Email Address": "email", "Last Seen IP": "ip_address", "Modified": "updated_at"}"#,
    )
    .expect("valid mapping");
    let harness = Harness::new(
        InMemoryUserStore::default(),
        ScriptedGeolocationSource::default().with_success("1.1.1.1", sydney()),
    );
    let mut source =
        CsvDirectorySource::open(directory.path(), mapping, 10).expect("directory opens");

    let summary = harness.pipeline.run(&mut source).await.expect("run succeeds");

    assert_eq!(summary.inserted, 1);
    let stored = harness
        .store
        .find(&email("ada@example.com"))
        .expect("inserted");
    assert_eq!(stored.geolocation, Some(sydney()));
}
