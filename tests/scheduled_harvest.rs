use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use epg_grid::config::{ProviderConfig, RetryBackoff};
use epg_grid::errors::SourceResult;
use epg_grid::ingestor::{
    AssetScheduleMapper, CycleSettings, HarvestJob, IngestionCycle, ManualTrigger, SchedulerService,
};
use epg_grid::models::{Channel, FetchWindow, RawScheduleEntry};
use epg_grid::sources::{PressAssociationClient, ScheduleProvider};
use epg_grid::storage::{MemoryRunMarkerStore, MemoryScheduleStore, RunMarkerStore, StaticChannelDirectory};
use epg_grid::utils::time::ManualClock;

const PLACEHOLDER: &str = "https://img.example/na.png";

struct OneProgrammeProvider;

#[async_trait]
impl ScheduleProvider for OneProgrammeProvider {
    async fn fetch_schedule(
        &self,
        channel_id: &str,
        _window: &FetchWindow,
    ) -> SourceResult<Vec<RawScheduleEntry>> {
        Ok(vec![RawScheduleEntry {
            id: format!("{channel_id}-news"),
            title: "News".to_string(),
            date_time: Utc.with_ymd_and_hms(2023, 1, 15, 18, 0, 0).unwrap(),
            duration: 30,
            asset: None,
        }])
    }
}

fn settings() -> CycleSettings {
    CycleSettings {
        horizon_days: 14,
        timezone: chrono_tz::UTC,
        fetch_interval: Duration::ZERO,
        request_timeout: Duration::from_secs(5),
        retry_gap: Duration::from_secs(1),
        retry_backoff: RetryBackoff::Fixed,
        max_retry_gap: Duration::from_secs(1),
        max_retry_rounds: 0,
    }
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2023, 1, 1, 22, 0, 0).unwrap()))
}

#[tokio::test]
async fn scheduler_runs_harvest_on_its_own_task() {
    let clock = clock();
    let store = Arc::new(MemoryScheduleStore::new());
    let markers = Arc::new(MemoryRunMarkerStore::new());
    let job = Arc::new(HarvestJob::new(
        IngestionCycle::new(
            Arc::new(OneProgrammeProvider),
            AssetScheduleMapper::new(PLACEHOLDER),
            clock.clone(),
            settings(),
        ),
        Arc::new(StaticChannelDirectory::new(vec![
            Channel::new("bbc1", "BBC One", ""),
            Channel::new("itv", "ITV", ""),
        ])),
        store.clone(),
        markers.clone(),
        clock.clone(),
    ));

    let (tx, trigger) = ManualTrigger::new(clock);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(SchedulerService::new(Box::new(trigger), job, false).run(cancel.clone()));

    tx.send(()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while markers.load().await.unwrap().first_run_pending {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("harvest did not complete");

    cancel.cancel();
    handle.await.unwrap().unwrap();
    assert_eq!(store.len().await, 2);
}

/// Serve one JSON body over HTTP and return the base URL
async fn serve_json(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 4096];
        let _ = socket.read(&mut buf).await.unwrap();
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
    });
    format!("http://{addr}/v2")
}

#[tokio::test]
async fn null_optional_fields_do_not_fail_the_channel() {
    let base_url = serve_json(
        r#"{"item": [
            {"id": "s1", "title": null, "dateTime": "2023-01-15T06:00:00Z", "duration": 60,
             "asset": {"id": null, "category": null, "related": null, "summary": null}},
            {"id": "s2", "title": "Lunchtime News", "dateTime": "2023-01-15T13:00:00Z", "duration": 30,
             "asset": {"id": "a2", "category": [{"code": "news"}], "related": [{"media": null}]}}
        ]}"#,
    )
    .await;
    let client = PressAssociationClient::new(&ProviderConfig {
        base_url,
        ..ProviderConfig::default()
    })
    .unwrap();

    let report = IngestionCycle::new(Arc::new(client), AssetScheduleMapper::new(PLACEHOLDER), clock(), settings())
        .run_cycle(&[Channel::new("bbc1", "BBC One", "")], false, &CancellationToken::new())
        .await;

    assert!(report.is_complete(), "failures: {:?}", report.failures);
    assert_eq!(report.schedules.len(), 2);
    assert_eq!(report.schedules[0].title, "");
    assert!(report.schedules[0].categories.is_empty());
    assert_eq!(report.schedules[0].image_url, PLACEHOLDER);
    assert!(report.schedules[1].has_category("news"));
}
