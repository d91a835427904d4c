// src/config/mod.rs
mod models;

pub use models::*;

use std::path::{Path, PathBuf};

/// Environment prefix for run settings overrides (`BRINGUP_REPORT_PATH`, ...).
pub const ENV_PREFIX: &str = "BRINGUP";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed to resolve settings: {0}")]
    Settings(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("duplicate unit id `{0}`")]
    DuplicateUnit(String),

    #[error("`{unit}` depends on unknown unit `{dependency}`")]
    UnknownDependency { unit: String, dependency: String },

    #[error("dependency cycle among units: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),
}

/// Load a plan definition from a file (YAML or JSON)
pub async fn load_plan<P: AsRef<Path>>(path: P) -> Result<PlanConfig, ConfigError> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let plan = parse_plan(path, &contents)?;
    plan.validate()?;
    Ok(plan)
}

fn parse_plan(path: &Path, contents: &str) -> Result<PlanConfig, ConfigError> {
    let extension = path.extension().and_then(|s| s.to_str());
    let parsed = if extension == Some("yaml") || extension == Some("yml") {
        serde_yaml::from_str(contents).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(contents).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Resolve run settings. Later layers win: the plan's `settings` block,
/// then an optional settings file, then `BRINGUP_*` environment variables.
/// CLI flags are applied on top by the caller.
pub fn load_settings(
    plan: &PlanConfig,
    settings_file: Option<&Path>,
) -> Result<Settings, ConfigError> {
    let mut builder =
        ::config::Config::builder().add_source(::config::Config::try_from(&plan.settings)?);

    if let Some(path) = settings_file {
        builder = builder.add_source(::config::File::from(path).required(true));
    }

    let settings: Settings = builder
        .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()?
        .try_deserialize()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PLAN_YAML: &str = r#"
settings:
  report_path: /tmp/bringup-status.env
  policy: continue
units:
  - id: postgres
    start:
      command: docker start postgres
    probes:
      - name: port
        endpoint:
          kind: tcp
          address: 127.0.0.1:5432
  - id: sonarqube
    display_name: SonarQube
    depends_on: [postgres]
    start:
      command: docker start sonarqube
      timeout_secs: 120
    probes:
      - name: api
        endpoint:
          kind: http
          url: http://127.0.0.1:9000/api/system/status
          expect_json:
            path: $.status
            equals: UP
        retry:
          max_attempts: 30
          interval_ms: 10000
checks:
  - name: docker
    target:
      tool: docker
  - name: jenkins-ui
    target:
      endpoint:
        kind: http
        url: http://127.0.0.1:8080/login
        expect_status: [200, 403]
"#;

    #[tokio::test]
    async fn test_load_yaml_plan() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(PLAN_YAML.as_bytes()).unwrap();

        let plan = load_plan(file.path()).await.unwrap();
        assert_eq!(plan.units.len(), 2);
        assert_eq!(plan.checks.len(), 2);
        assert_eq!(plan.settings.policy, FailurePolicy::Continue);

        let sonar = &plan.units[1];
        assert_eq!(sonar.display_name.as_deref(), Some("SonarQube"));
        assert_eq!(sonar.depends_on, vec!["postgres".to_string()]);
        assert_eq!(sonar.probes[0].retry.max_attempts, 30);
        assert_eq!(sonar.start.timeout_secs, Some(120));
    }

    #[tokio::test]
    async fn test_load_json_plan() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(
            br#"{"units":[{"id":"tomcat","start":{"command":"true"},"probes":[]}]}"#,
        )
        .unwrap();

        let plan = load_plan(file.path()).await.unwrap();
        assert_eq!(plan.units[0].id, "tomcat");
        assert_eq!(plan.settings.policy, FailurePolicy::Abort);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = load_plan("/nonexistent/plan.yaml").await.unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[tokio::test]
    async fn test_parse_error_names_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        file.write_all(b"units: [not, a, unit]").unwrap();

        let err = load_plan(file.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_settings_file_overrides_plan() {
        let plan: PlanConfig = serde_yaml::from_str(PLAN_YAML).unwrap();

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "policy = \"restart-once\"").unwrap();
        writeln!(file, "deadline_secs = 900").unwrap();

        let settings = load_settings(&plan, Some(file.path())).unwrap();
        assert_eq!(settings.policy, FailurePolicy::RestartOnce);
        assert_eq!(settings.deadline_secs, Some(900));
        assert_eq!(
            settings.report_path,
            PathBuf::from("/tmp/bringup-status.env")
        );
    }
}
