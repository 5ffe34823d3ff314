//! End-to-end client tests against a mock collaborator.
//!
//! Each test serves a framed event-stream body from a wiremock server and
//! drives a real `EnrichmentClient` through submission, stream consumption,
//! and terminal transitions.

use std::time::Duration;

use phone_enrich::{
    ClientConfig, EnrichmentClient, Error, JobEvent, JobPhase, JobRequest, StatusCode,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> EnrichmentClient {
    EnrichmentClient::new(ClientConfig {
        endpoint: format!("{}/api/scrape", server.uri()),
        ..Default::default()
    })
    .unwrap()
}

fn request() -> JobRequest {
    JobRequest {
        api_key: "test-key".to_string(),
        phone_numbers: vec!["555".to_string()],
        range_size: 2,
        min_age: 10,
        max_age: 20,
    }
}

async fn mount_stream(server: &MockServer, body: &str) {
    Mock::given(method("POST"))
        .and(path("/api/scrape"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/event-stream"))
        .mount(server)
        .await;
}

async fn wait_for_terminal(client: &EnrichmentClient) -> JobPhase {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let phase = client.phase().await;
            if phase.is_terminal() {
                return phase;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job did not reach a terminal phase in time")
}

const BATCH_AGE_RANGE: &str = r#"data: {"type":"batch","data":{"ageRange":[{"Name":"A","Number":"5550","Age":15}],"otherAges":[],"failed":[]},"progress":{"processed":1,"total":2,"rateLimitHits":0}}"#;
const BATCH_FAILED: &str = r#"data: {"type":"batch","data":{"ageRange":[],"otherAges":[],"failed":[{"Number":"5551","StatusCode":429,"Reason":"rate limited"}]},"progress":{"processed":2,"total":2,"rateLimitHits":1}}"#;
const COMPLETE_INCREMENTAL: &str = r#"data: {"type":"complete","processed":2,"rateLimitHits":1}"#;

#[tokio::test]
async fn test_incremental_stream_accumulates_both_categories() {
    let server = MockServer::start().await;
    let body = format!("{}\n{}\n{}\n", BATCH_AGE_RANGE, BATCH_FAILED, COMPLETE_INCREMENTAL);
    mount_stream(&server, &body).await;

    let client = client_for(&server);
    client.submit(request()).await.unwrap();

    assert_eq!(wait_for_terminal(&client).await, JobPhase::Completed);

    let snapshot = client.snapshot().await;
    assert_eq!(snapshot.age_range.len(), 1);
    assert_eq!(snapshot.age_range[0].name, "A");
    assert_eq!(snapshot.age_range[0].number, "5550");
    assert_eq!(snapshot.age_range[0].age, 15);
    assert!(snapshot.other_ages.is_empty());
    assert_eq!(snapshot.failed.len(), 1);
    assert_eq!(snapshot.failed[0].status_code, StatusCode::Code(429));
    assert_eq!(snapshot.failed[0].reason, "rate limited");

    let progress = client.progress().await;
    assert_eq!(progress.processed, 2);
    assert_eq!(progress.total, 2);
    assert_eq!(progress.rate_limit_hits, 1);

    let status = client.status().await;
    assert_eq!(status.fraction, 1.0);
    assert_eq!(status.age_range_count, 1);
    assert_eq!(status.failed_count, 1);
    assert!(status.started_at.is_some());
    assert!(status.finished_at.is_some());
}

#[tokio::test]
async fn test_malformed_line_between_valid_frames_is_skipped() {
    let server = MockServer::start().await;
    let body = format!(
        "{}\ndata: {{this is not json\n{}\n{}\n",
        BATCH_AGE_RANGE, BATCH_FAILED, COMPLETE_INCREMENTAL
    );
    mount_stream(&server, &body).await;

    let client = client_for(&server);
    client.submit(request()).await.unwrap();

    assert_eq!(wait_for_terminal(&client).await, JobPhase::Completed);

    // Both valid frames around the malformed line were applied
    let snapshot = client.snapshot().await;
    assert_eq!(snapshot.age_range.len(), 1);
    assert_eq!(snapshot.failed.len(), 1);
}

#[tokio::test]
async fn test_keep_alives_and_unknown_discriminants_ignored() {
    let server = MockServer::start().await;
    let body = format!(
        ": keep-alive\n\n{}\ndata: {{\"type\":\"heartbeat\",\"seq\":1}}\n{}\n",
        BATCH_AGE_RANGE, COMPLETE_INCREMENTAL
    );
    mount_stream(&server, &body).await;

    let client = client_for(&server);
    client.submit(request()).await.unwrap();

    assert_eq!(wait_for_terminal(&client).await, JobPhase::Completed);
    assert_eq!(client.snapshot().await.age_range.len(), 1);
}

#[tokio::test]
async fn test_legacy_whole_result_delivery_replaces_state() {
    let server = MockServer::start().await;
    let body = concat!(
        r#"data: {"type":"progress","processed":1,"total":2,"ageRangeCount":0,"otherAgesCount":0,"failedCount":1}"#,
        "\n",
        r#"data: {"type":"progress","processed":2,"total":2,"ageRangeCount":1,"otherAgesCount":0,"failedCount":1}"#,
        "\n",
        r#"data: {"type":"complete","results":{"ageRange":[{"Name":"Jane","Number":"5550","Age":15}],"otherAges":[],"failed":[{"Number":"5551","StatusCode":"timeout","Reason":"no response"}]}}"#,
        "\n",
    );
    mount_stream(&server, body).await;

    let client = client_for(&server);
    client.submit(request()).await.unwrap();

    assert_eq!(wait_for_terminal(&client).await, JobPhase::Completed);

    let snapshot = client.snapshot().await;
    assert_eq!(snapshot.age_range.len(), 1);
    assert_eq!(snapshot.age_range[0].name, "Jane");
    assert_eq!(
        snapshot.failed[0].status_code,
        StatusCode::Text("timeout".to_string())
    );

    let progress = client.progress().await;
    assert_eq!(progress.processed, 2);
    assert_eq!(progress.total, 2);
}

#[tokio::test]
async fn test_server_error_event_fails_job_with_verbatim_message() {
    let server = MockServer::start().await;
    let body = format!(
        "{}\ndata: {{\"type\":\"error\",\"message\":\"invalid API key\"}}\n",
        BATCH_AGE_RANGE
    );
    mount_stream(&server, &body).await;

    let client = client_for(&server);
    let mut events = client.subscribe();
    client.submit(request()).await.unwrap();

    match wait_for_terminal(&client).await {
        JobPhase::Failed { error } => assert_eq!(error, "invalid API key"),
        other => panic!("expected Failed, got: {:?}", other),
    }

    // The broadcast failure event carries the same verbatim message
    let failed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let JobEvent::Failed { error } = events.recv().await.expect("event channel closed")
            {
                return error;
            }
        }
    })
    .await
    .expect("timed out waiting for the failure event");
    assert_eq!(failed, "invalid API key");

    // Records applied before the error remain readable
    assert_eq!(client.snapshot().await.age_range.len(), 1);
}

#[tokio::test]
async fn test_stream_eof_without_terminal_event_fails_job() {
    let server = MockServer::start().await;
    let body = format!("{}\n", BATCH_AGE_RANGE);
    mount_stream(&server, &body).await;

    let client = client_for(&server);
    client.submit(request()).await.unwrap();

    match wait_for_terminal(&client).await {
        JobPhase::Failed { error } => {
            assert!(
                error.contains("terminal"),
                "error should mention the missing terminal event, got: {}",
                error
            );
        }
        other => panic!("expected Failed, got: {:?}", other),
    }

    // The batch applied before the premature close is kept
    assert_eq!(client.snapshot().await.age_range.len(), 1);
}

#[tokio::test]
async fn test_unterminated_trailing_frame_is_discarded() {
    let server = MockServer::start().await;
    // The final complete frame is missing its terminator, so it is never
    // honored: the job ends as Failed with only the first batch applied.
    let body = format!("{}\n{}", BATCH_AGE_RANGE, COMPLETE_INCREMENTAL);
    mount_stream(&server, &body).await;

    let client = client_for(&server);
    client.submit(request()).await.unwrap();

    match wait_for_terminal(&client).await {
        JobPhase::Failed { .. } => {}
        other => panic!("expected Failed, got: {:?}", other),
    }
    assert_eq!(client.snapshot().await.age_range.len(), 1);
}

#[tokio::test]
async fn test_empty_number_list_fails_fast_without_network() {
    let server = MockServer::start().await;
    // Expect zero requests: validation must fail before any network activity
    Mock::given(method("POST"))
        .and(path("/api/scrape"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client
        .submit(JobRequest {
            phone_numbers: vec![],
            ..request()
        })
        .await;

    match result {
        Err(Error::Validation { field, .. }) => assert_eq!(field, "phone_numbers"),
        other => panic!("expected Validation error, got: {:?}", other),
    }
    assert_eq!(client.phase().await, JobPhase::Idle);
}

#[tokio::test]
async fn test_out_of_range_request_fields_rejected() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let oversized_range = client
        .submit(JobRequest {
            range_size: 1001,
            ..request()
        })
        .await;
    assert!(matches!(
        oversized_range,
        Err(Error::Validation { field: "range_size", .. })
    ));

    let inverted_ages = client
        .submit(JobRequest {
            min_age: 30,
            max_age: 20,
            ..request()
        })
        .await;
    assert!(matches!(
        inverted_ages,
        Err(Error::Validation { field: "min_age", .. })
    ));
}

#[tokio::test]
async fn test_resubmission_supersedes_and_resets_state() {
    let first_server = MockServer::start().await;
    let body = format!("{}\n{}\n{}\n", BATCH_AGE_RANGE, BATCH_FAILED, COMPLETE_INCREMENTAL);
    mount_stream(&first_server, &body).await;

    let client = client_for(&first_server);
    client.submit(request()).await.unwrap();
    assert_eq!(wait_for_terminal(&client).await, JobPhase::Completed);
    assert!(!client.snapshot().await.is_empty());

    // Second submission: the collaborator delivers nothing but completion.
    // All previously accumulated records and progress must be discarded.
    first_server.reset().await;
    mount_stream(
        &first_server,
        "data: {\"type\":\"complete\",\"processed\":0,\"rateLimitHits\":0}\n",
    )
    .await;

    client
        .submit(JobRequest {
            phone_numbers: vec!["777".to_string()],
            min_age: 30,
            max_age: 40,
            ..request()
        })
        .await
        .unwrap();

    assert_eq!(wait_for_terminal(&client).await, JobPhase::Completed);
    assert!(client.snapshot().await.is_empty());
    assert_eq!(client.progress().await.processed, 0);

    // Exports now reflect the new request's bounds
    let (filename, csv) = client.export_age_range().await.unwrap();
    assert_eq!(filename, "age-30-to-40.csv");
    assert_eq!(csv, "Name,Number,Age\n");
}

#[tokio::test]
async fn test_racing_submissions_never_cancel_the_newest_job() {
    let server = MockServer::start().await;
    let body = format!("{}\n{}\n", BATCH_AGE_RANGE, COMPLETE_INCREMENTAL);
    mount_stream(&server, &body).await;

    let client = client_for(&server);
    let first = client.clone();
    let second = client.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { first.submit(request()).await }),
        tokio::spawn(async move {
            second
                .submit(JobRequest {
                    phone_numbers: vec!["777".to_string()],
                    ..request()
                })
                .await
        }),
    );
    a.unwrap().unwrap();
    b.unwrap().unwrap();

    // Whichever submission won the race owns the state and its token; the
    // superseded one is abandoned without ever failing the live job.
    assert_eq!(wait_for_terminal(&client).await, JobPhase::Completed);
    assert_eq!(client.snapshot().await.age_range.len(), 1);
}

#[tokio::test]
async fn test_connection_failure_fails_job() {
    let client = EnrichmentClient::new(ClientConfig {
        // Nothing listens on port 1
        endpoint: "http://127.0.0.1:1/api/scrape".to_string(),
        ..Default::default()
    })
    .unwrap();

    client.submit(request()).await.unwrap();

    match wait_for_terminal(&client).await {
        JobPhase::Failed { .. } => {}
        other => panic!("expected Failed, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_http_error_status_fails_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scrape"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.submit(request()).await.unwrap();

    match wait_for_terminal(&client).await {
        JobPhase::Failed { .. } => {}
        other => panic!("expected Failed, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_abandons_transport_and_fails_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scrape"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(30))
                .set_body_raw(COMPLETE_INCREMENTAL.to_string() + "\n", "text/event-stream"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.submit(request()).await.unwrap();
    client.cancel().await.unwrap();

    match wait_for_terminal(&client).await {
        JobPhase::Failed { error } => assert_eq!(error, "job cancelled"),
        other => panic!("expected Failed, got: {:?}", other),
    }

    // No second job to cancel
    assert!(matches!(client.cancel().await, Err(Error::NoJob)));
}

#[tokio::test]
async fn test_cancel_after_completion_reports_no_job() {
    let server = MockServer::start().await;
    mount_stream(&server, &format!("{}\n", COMPLETE_INCREMENTAL)).await;

    let client = client_for(&server);
    client.submit(request()).await.unwrap();
    assert_eq!(wait_for_terminal(&client).await, JobPhase::Completed);

    // Nothing is left to cancel once the job finished on its own
    assert!(matches!(client.cancel().await, Err(Error::NoJob)));
    assert_eq!(client.phase().await, JobPhase::Completed);
}

#[tokio::test]
async fn test_exports_render_current_snapshot() {
    let server = MockServer::start().await;
    let body = format!("{}\n{}\n{}\n", BATCH_AGE_RANGE, BATCH_FAILED, COMPLETE_INCREMENTAL);
    mount_stream(&server, &body).await;

    let client = client_for(&server);
    client.submit(request()).await.unwrap();
    assert_eq!(wait_for_terminal(&client).await, JobPhase::Completed);

    let (filename, csv) = client.export_age_range().await.unwrap();
    assert_eq!(filename, "age-10-to-20.csv");
    assert_eq!(csv, "Name,Number,Age\n\"A\",\"5550\",15");

    let (filename, csv) = client.export_failed().await;
    assert_eq!(filename, "failed-requests.csv");
    assert_eq!(csv, "Number,StatusCode,Reason\n\"5551\",\"429\",\"rate limited\"");

    let (filename, csv) = client.export_other_ages().await;
    assert_eq!(filename, "other-ages.csv");
    assert_eq!(csv, "Name,Number,Age\n");
}

#[tokio::test]
async fn test_export_before_any_submission_has_no_bounds() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    assert!(matches!(
        client.export_age_range().await,
        Err(Error::NoJob)
    ));
    // Category exports without bound-dependent filenames still work
    let (_, csv) = client.export_failed().await;
    assert_eq!(csv, "Number,StatusCode,Reason\n");
}

#[tokio::test]
async fn test_lifecycle_events_arrive_in_order() {
    let server = MockServer::start().await;
    let body = format!("{}\n{}\n", BATCH_AGE_RANGE, COMPLETE_INCREMENTAL);
    mount_stream(&server, &body).await;

    let client = client_for(&server);
    let mut events = client.subscribe();
    client.submit(request()).await.unwrap();

    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for events")
            .expect("event channel closed");
        let terminal = matches!(event, JobEvent::Completed | JobEvent::Failed { .. });
        seen.push(event);
        if terminal {
            break;
        }
    }

    assert!(matches!(seen.first(), Some(JobEvent::Submitted { base_numbers: 1 })));
    assert!(matches!(seen.get(1), Some(JobEvent::Streaming)));
    assert!(
        seen.iter()
            .any(|e| matches!(e, JobEvent::BatchApplied { age_range: 1, .. })),
        "expected a BatchApplied event, got: {:?}",
        seen
    );
    assert!(matches!(seen.last(), Some(JobEvent::Completed)));
}
