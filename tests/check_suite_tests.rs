// tests/check_suite_tests.rs
use async_trait::async_trait;
use service_bringup::{
    checks::{Check, CheckStatus, CheckSuite, EndpointCheck},
    config::{CheckConfig, CheckTarget, EndpointConfig, Severity},
    health::Endpoint,
    metrics::MetricsRegistry,
};
use std::sync::Arc;
use std::time::Duration;

struct Passing(&'static str);

#[async_trait]
impl Check for Passing {
    fn name(&self) -> &str {
        self.0
    }

    async fn run(&self) -> anyhow::Result<String> {
        Ok("ok".into())
    }
}

struct Panicking;

#[async_trait]
impl Check for Panicking {
    fn name(&self) -> &str {
        "exploding"
    }

    async fn run(&self) -> anyhow::Result<String> {
        panic!("check blew up");
    }
}

#[tokio::test]
async fn test_panicking_check_is_isolated() {
    let suite = CheckSuite::new()
        .with_check(Arc::new(Passing("first")))
        .with_check(Arc::new(Panicking))
        .with_check(Arc::new(Passing("third")));

    let results = suite.run_all(&[]).await;

    let statuses: Vec<CheckStatus> = results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![CheckStatus::Pass, CheckStatus::Fail, CheckStatus::Pass]
    );
    assert_eq!(results[1].check_name, "exploding");
    assert!(results[1].detail.contains("panicked"));
}

#[tokio::test]
async fn test_http_endpoint_checks_against_mock() {
    let mut server = mockito::Server::new_async().await;
    let _login = server
        .mock("GET", "/login")
        .with_status(403)
        .expect_at_least(1)
        .create_async()
        .await;
    let _down = server
        .mock("GET", "/down")
        .with_status(503)
        .create_async()
        .await;

    let url = |path: &str| format!("{}{path}", server.url()).parse().unwrap();
    let configs = vec![
        CheckConfig {
            name: "jenkins-ui".into(),
            target: CheckTarget::Endpoint(EndpointConfig::Http {
                url: url("/login"),
                expect_status: Some(vec![200, 403]),
                expect_json: None,
                timeout_ms: 2_000,
            }),
            severity: Severity::Fail,
            after: vec![],
        },
        CheckConfig {
            name: "optional".into(),
            target: CheckTarget::Endpoint(EndpointConfig::Http {
                url: url("/down"),
                expect_status: None,
                expect_json: None,
                timeout_ms: 2_000,
            }),
            severity: Severity::Warn,
            after: vec![],
        },
    ];

    let registry = MetricsRegistry::new().unwrap();
    let suite = CheckSuite::from_config(&configs, &reqwest::Client::new())
        .unwrap()
        .with_metrics(registry.collector());
    let results = suite.run_all(&[]).await;

    assert_eq!(results[0].status, CheckStatus::Pass);
    assert_eq!(results[1].status, CheckStatus::Warn);
    assert!(results[1].detail.contains("503"));

    let exposition = String::from_utf8(registry.gather().unwrap()).unwrap();
    assert!(exposition.contains(r#"bringup_check_results_total{status="PASS"} 1"#));
    assert!(exposition.contains(r#"bringup_check_results_total{status="WARN"} 1"#));
}

#[tokio::test]
async fn test_endpoint_check_times_out() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/hang", listener.local_addr().unwrap());

    let check = EndpointCheck::new(
        "hanging",
        Endpoint::http(url.parse().unwrap(), [200], Duration::from_millis(200)),
        reqwest::Client::new(),
    );
    let err = check.run().await.unwrap_err();
    assert!(format!("{err:#}").contains("no response within 200ms"));
    drop(listener);
}
