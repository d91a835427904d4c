// tests/orchestrator_tests.rs
use async_trait::async_trait;
use service_bringup::{
    config::{ActionConfig, FailurePolicy, PlanConfig, RetryConfig, Settings},
    health::{FnProbe, ProbeError},
    orchestrator::{run_plan, Orchestrator, UnitError, UnitState},
    report::{aggregate, load_artifact, write_artifact},
    retry::PollError,
    service::{CommandAction, DependencyPlan, ServiceUnit, StartAction, StartActionError},
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct StartLog {
    order: Mutex<Vec<String>>,
}

struct LoggedStart {
    id: String,
    fail: bool,
    log: Arc<StartLog>,
}

#[async_trait]
impl StartAction for LoggedStart {
    async fn start(&self) -> Result<(), StartActionError> {
        self.log.order.lock().unwrap().push(self.id.clone());
        if self.fail {
            Err(StartActionError::Failed(format!("{} exited with 1", self.id)))
        } else {
            Ok(())
        }
    }
}

fn unit(id: &str, log: &Arc<StartLog>) -> ServiceUnit {
    failing_unit(id, false, log)
}

fn failing_unit(id: &str, fail: bool, log: &Arc<StartLog>) -> ServiceUnit {
    ServiceUnit::new(
        id,
        Arc::new(LoggedStart {
            id: id.into(),
            fail,
            log: log.clone(),
        }),
    )
}

/// Fails until the `ready_on`-th call.
fn probe_ready_on(name: &str, ready_on: u32, max_attempts: u32) -> Arc<FnProbe> {
    let calls = Arc::new(AtomicU32::new(0));
    Arc::new(FnProbe::new(
        name,
        RetryConfig::fixed(max_attempts, 10_000),
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n >= ready_on {
                    Ok(())
                } else {
                    Err(ProbeError::Unexpected("503 Service Unavailable".into()))
                }
            }
        },
    ))
}

#[tokio::test]
async fn test_units_start_in_dependency_order() {
    let log = Arc::new(StartLog::default());
    let plan = DependencyPlan::new(vec![
        unit("jenkins", &log).depends_on("sonarqube"),
        unit("sonarqube", &log).depends_on("postgres"),
        unit("postgres", &log),
        unit("nexus", &log),
    ])
    .unwrap();

    let results = Orchestrator::new(plan, FailurePolicy::Abort).run().await;

    let order = log.order.lock().unwrap().clone();
    let position = |id: &str| order.iter().position(|o| o == id).unwrap();
    assert!(position("postgres") < position("sonarqube"));
    assert!(position("sonarqube") < position("jenkins"));
    assert_eq!(order.len(), 4);

    let reported: Vec<&str> = results.iter().map(|r| r.unit_id.as_str()).collect();
    assert_eq!(reported, order.iter().map(String::as_str).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn test_first_try_success_records_one_attempt_per_probe() {
    let log = Arc::new(StartLog::default());
    let plan = DependencyPlan::new(vec![
        unit("db", &log).with_probe(probe_ready_on("port", 1, 5)),
        unit("app", &log)
            .depends_on("db")
            .with_probe(probe_ready_on("http", 1, 5))
            .with_probe(probe_ready_on("json", 1, 5)),
    ])
    .unwrap();

    let results = Orchestrator::new(plan, FailurePolicy::Abort).run().await;

    let attempts: usize = results.iter().map(|r| r.attempts.len()).sum();
    assert_eq!(attempts, 3);
    assert!(results.iter().all(|r| r.ready && r.start_invocations == 1));
}

#[tokio::test(start_paused = true)]
async fn test_slow_unit_becomes_ready_within_budget() {
    let log = Arc::new(StartLog::default());
    let plan = DependencyPlan::new(vec![
        unit("db", &log).with_probe(probe_ready_on("port", 1, 5)),
        unit("app", &log)
            .depends_on("db")
            .with_probe(probe_ready_on("health", 3, 5)),
    ])
    .unwrap();

    let results = Orchestrator::new(plan, FailurePolicy::Abort).run().await;
    assert_eq!(results[0].attempts.len(), 1);
    assert_eq!(results[1].attempts.len(), 3);
    assert!(!results[1].attempts[0].succeeded());
    assert!(results[1].attempts[2].succeeded());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("status.env");
    write_artifact(&aggregate(results, vec![]), &path).await.unwrap();

    let artifact = load_artifact(&path).await.unwrap();
    assert!(artifact.ready());
    assert_eq!(artifact.count("PASS_COUNT"), Some(2));
    assert_eq!(artifact.count("FAIL_COUNT"), Some(0));
    assert_eq!(artifact.get("UNITS_READY"), Some("db,app"));
}

#[tokio::test]
async fn test_start_failure_under_abort_fails_the_run() {
    let log = Arc::new(StartLog::default());
    let plan = DependencyPlan::new(vec![
        failing_unit("db", true, &log),
        unit("app", &log).depends_on("db"),
    ])
    .unwrap();

    let results = Orchestrator::new(plan, FailurePolicy::Abort).run().await;
    assert_eq!(*log.order.lock().unwrap(), vec!["db"]);
    assert_eq!(results[0].state, UnitState::Failed);
    assert!(!results[0].started);
    assert!(results[1].skipped());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("status.env");
    write_artifact(&aggregate(results, vec![]), &path).await.unwrap();

    let artifact = load_artifact(&path).await.unwrap();
    assert!(!artifact.ready());
    assert_eq!(artifact.count("FAIL_COUNT"), Some(1));
    assert_eq!(artifact.get("UNIT_DB"), Some("FAILED"));
    assert_eq!(artifact.get("UNIT_APP"), Some("SKIPPED"));
}

#[tokio::test]
async fn test_restart_once_reinvokes_start_and_stop() {
    let dir = tempfile::tempdir().unwrap();
    let journal = dir.path().join("journal");
    let journal = journal.display();

    let action = CommandAction::new(
        ActionConfig {
            command: format!("echo start >> {journal}; echo 'port in use' >&2; exit 1"),
            workdir: None,
            env: Default::default(),
            timeout_secs: Some(10),
        },
        Some(ActionConfig {
            command: format!("echo stop >> {journal}"),
            workdir: None,
            env: Default::default(),
            timeout_secs: None,
        }),
    );
    let plan = DependencyPlan::new(vec![ServiceUnit::new("tomcat", Arc::new(action))]).unwrap();

    let results = Orchestrator::new(plan, FailurePolicy::RestartOnce).run().await;

    let tomcat = &results[0];
    assert_eq!(tomcat.start_invocations, 2);
    assert!(!tomcat.ready);
    match &tomcat.final_error {
        Some(UnitError::Start(StartActionError::Exit { code, stderr, .. })) => {
            assert_eq!(*code, Some(1));
            assert!(stderr.contains("port in use"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let lines = std::fs::read_to_string(dir.path().join("journal")).unwrap();
    assert_eq!(lines.lines().collect::<Vec<_>>(), vec!["start", "stop", "start"]);
}

#[tokio::test(start_paused = true)]
async fn test_restart_once_after_readiness_exhausted() {
    let log = Arc::new(StartLog::default());
    let plan = DependencyPlan::new(vec![
        unit("service-y", &log).with_probe(probe_ready_on("health", u32::MAX, 3)),
    ])
    .unwrap();

    let results = Orchestrator::new(plan, FailurePolicy::RestartOnce).run().await;

    let service = &results[0];
    assert_eq!(*log.order.lock().unwrap(), vec!["service-y", "service-y"]);
    assert_eq!(service.start_invocations, 2);
    assert!(service.started);
    assert!(!service.ready);
    assert_eq!(service.attempts.len(), 6);
    assert!(matches!(
        &service.final_error,
        Some(UnitError::Probe(PollError::Exhausted { attempts: 3, .. }))
    ));

    let numbers: Vec<u32> = service.attempts.iter().map(|a| a.attempt_number).collect();
    assert!(numbers.windows(2).all(|pair| pair[0] < pair[1]), "{numbers:?}");
    assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_within_one_interval() {
    let log = Arc::new(StartLog::default());
    let plan = DependencyPlan::new(vec![
        unit("app", &log).with_probe(probe_ready_on("health", u32::MAX, 100)),
        unit("ui", &log).depends_on("app"),
    ])
    .unwrap();

    let cancel = CancellationToken::new();
    let orchestrator = Orchestrator::new(plan, FailurePolicy::Continue).with_cancellation(cancel.clone());

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    let started = tokio::time::Instant::now();
    let results = orchestrator.run().await;
    trigger.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(results[0].attempts.len(), 1);
    assert!(results[0].final_error.as_ref().unwrap().is_cancelled());
    assert_eq!(results[1].final_error, Some(UnitError::Cancelled));
    assert!(!results[1].started);
    assert_eq!(*log.order.lock().unwrap(), vec!["app"]);
}

const PLAN: &str = r#"
units:
  - id: db
    start:
      command: "true"
    probes:
      - name: port
        endpoint:
          kind: tcp
          address: "{ADDR}"
          timeout_ms: 500
        retry:
          max_attempts: 3
          interval_ms: 50
  - id: app
    depends_on: [db]
    start:
      command: "true"
checks:
  - name: shell
    target:
      tool: sh
  - name: db-port
    after: [db]
    target:
      endpoint:
        kind: tcp
        address: "{ADDR}"
  - name: missing-file
    severity: warn
    target:
      file: /definitely/not/here.conf
"#;

#[tokio::test]
async fn test_run_plan_end_to_end() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let config: PlanConfig = serde_yaml::from_str(&PLAN.replace("{ADDR}", &addr)).unwrap();
    config.validate().unwrap();

    let settings = Settings::default();
    let report = run_plan(
        &config,
        &settings,
        &reqwest::Client::new(),
        CancellationToken::new(),
        None,
    )
    .await
    .unwrap();

    assert!(report.ready());
    assert_eq!(report.summary.pass_count, 4);
    assert_eq!(report.summary.warn_count, 1);
    assert_eq!(report.plan_digest.as_deref(), Some(config.digest().as_str()));
    assert_eq!(report.policy, Some(FailurePolicy::Abort));

    let names: Vec<&str> = report.check_results.iter().map(|c| c.check_name.as_str()).collect();
    assert_eq!(names, vec!["shell", "db-port", "missing-file"]);
}

#[tokio::test]
async fn test_run_plan_cancelled_skips_checks() {
    let config: PlanConfig =
        serde_yaml::from_str(&PLAN.replace("{ADDR}", "127.0.0.1:1")).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = run_plan(&config, &Settings::default(), &reqwest::Client::new(), cancel, None)
        .await
        .unwrap();

    assert!(!report.ready());
    assert_eq!(report.summary.fail_count, 2);
    assert_eq!(report.check_results.len(), 1);
    assert_eq!(report.check_results[0].detail, "skipped (cancelled)");
}
