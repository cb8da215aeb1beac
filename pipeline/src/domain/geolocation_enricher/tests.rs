//! Unit tests for geolocation grouping, pacing, and failure handling.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use rstest::{fixture, rstest};

use super::{GeolocationEnricher, GeolocationEnricherConfig};
use crate::domain::ports::{GeolocationSourceError, MockGeolocationSource};
use crate::domain::{BatchError, GeoEnrichment};
use crate::test_support::{RecordingSleeper, ScriptedGeolocationSource};

fn addresses(count: usize) -> BTreeSet<String> {
    (0..count)
        .map(|n| format!("10.0.{}.{}", n >> 8, n & 0xff))
        .collect()
}

fn sydney() -> GeoEnrichment {
    GeoEnrichment {
        latitude: -33.8688,
        longitude: 151.2093,
        country: Some("Australia".to_owned()),
        region: Some("New South Wales".to_owned()),
        city: Some("Sydney".to_owned()),
        timezone: Some("Australia/Sydney".to_owned()),
        isp_name: Some("Cloudflare, Inc".to_owned()),
    }
}

#[fixture]
fn sleeper() -> Arc<RecordingSleeper> {
    Arc::new(RecordingSleeper::default())
}

fn enricher(
    source: Arc<ScriptedGeolocationSource>,
    sleeper: Arc<RecordingSleeper>,
) -> GeolocationEnricher {
    GeolocationEnricher::with_sleeper(source, sleeper, GeolocationEnricherConfig::default())
}

#[rstest]
#[tokio::test]
async fn groups_addresses_by_bulk_limit_and_pauses_between_calls(sleeper: Arc<RecordingSleeper>) {
    let source = Arc::new(ScriptedGeolocationSource::default());
    let enricher = enricher(source.clone(), sleeper.clone());

    enricher
        .enrich(&addresses(250))
        .await
        .expect("enrichment should succeed");

    let sizes = source.calls().iter().map(Vec::len).collect::<Vec<_>>();
    assert_eq!(sizes, vec![100, 100, 50]);
    assert_eq!(
        sleeper.durations(),
        vec![Duration::from_secs(4), Duration::from_secs(4)],
        "the delay applies between calls only"
    );
}

#[rstest]
#[tokio::test]
async fn groups_are_sorted_and_disjoint(sleeper: Arc<RecordingSleeper>) {
    let source = Arc::new(ScriptedGeolocationSource::default());
    let enricher = GeolocationEnricher::with_sleeper(
        source.clone(),
        sleeper,
        GeolocationEnricherConfig {
            group_size: 2,
            delay: Duration::from_millis(10),
        },
    );
    let input = ["9.9.9.9", "1.1.1.1", "8.8.8.8"]
        .into_iter()
        .map(str::to_owned)
        .collect::<BTreeSet<_>>();

    enricher.enrich(&input).await.expect("enrichment");

    assert_eq!(
        source.calls(),
        vec![
            vec!["1.1.1.1".to_owned(), "8.8.8.8".to_owned()],
            vec!["9.9.9.9".to_owned()],
        ]
    );
}

#[rstest]
#[case(0, 1)]
#[case(500, 100)]
#[tokio::test]
async fn group_size_is_clamped_to_service_limits(
    sleeper: Arc<RecordingSleeper>,
    #[case] configured: usize,
    #[case] expected: usize,
) {
    let source = Arc::new(ScriptedGeolocationSource::default());
    let enricher = GeolocationEnricher::with_sleeper(
        source.clone(),
        sleeper,
        GeolocationEnricherConfig {
            group_size: configured,
            delay: Duration::ZERO,
        },
    );

    enricher.enrich(&addresses(120)).await.expect("enrichment");

    let calls = source.calls();
    let first = calls.first().expect("at least one call");
    assert_eq!(first.len(), expected);
}

#[rstest]
#[tokio::test]
async fn keeps_successes_and_drops_unresolved_addresses(sleeper: Arc<RecordingSleeper>) {
    let source = Arc::new(
        ScriptedGeolocationSource::default()
            .with_success("1.1.1.1", sydney())
            .with_failure("10.0.0.1", "private range"),
    );
    let enricher = enricher(source, sleeper);
    let input = ["1.1.1.1", "10.0.0.1"]
        .into_iter()
        .map(str::to_owned)
        .collect::<BTreeSet<_>>();

    let enrichments = enricher.enrich(&input).await.expect("enrichment");

    assert_eq!(enrichments.len(), 1);
    assert_eq!(enrichments.get("1.1.1.1"), Some(&sydney()));
    assert!(!enrichments.contains_key("10.0.0.1"));
}

#[rstest]
#[tokio::test]
async fn transport_failure_aborts_without_partial_results(sleeper: Arc<RecordingSleeper>) {
    let source = Arc::new(
        ScriptedGeolocationSource::default()
            .failing_on_call(2, GeolocationSourceError::transport("connection reset")),
    );
    let enricher = enricher(source.clone(), sleeper);

    let error = enricher
        .enrich(&addresses(250))
        .await
        .expect_err("second group failure should abort");

    assert!(matches!(error, BatchError::EnrichmentUnavailable { .. }));
    assert_eq!(source.calls().len(), 2, "no call after the failing group");
}

#[rstest]
#[tokio::test]
async fn empty_input_makes_no_calls() {
    let mut source = MockGeolocationSource::new();
    source.expect_lookup_batch().times(0);
    let sleeper = Arc::new(RecordingSleeper::default());
    let enricher = GeolocationEnricher::with_sleeper(
        Arc::new(source),
        sleeper.clone(),
        GeolocationEnricherConfig::default(),
    );

    let enrichments = enricher.enrich(&BTreeSet::new()).await.expect("enrichment");

    assert!(enrichments.is_empty());
    assert!(sleeper.durations().is_empty());
}

#[rstest]
#[tokio::test]
async fn single_group_does_not_pause(sleeper: Arc<RecordingSleeper>) {
    let source = Arc::new(ScriptedGeolocationSource::default());
    let enricher = enricher(source.clone(), sleeper.clone());

    enricher.enrich(&addresses(100)).await.expect("enrichment");

    assert_eq!(source.calls().len(), 1);
    assert!(sleeper.durations().is_empty());
}
