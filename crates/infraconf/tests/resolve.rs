//! Resolution of documents on disk
//!
//! Every test writes its documents into a fresh temporary directory and resolves against a fixed
//! set of environment variables, never the process environment.

use infraconf::{
    Context, EnvResolver, EnvSnapshot, Error, Loader, MemorySecrets, SecretError, Value,
};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("INFRACONF_LOG"))
        .with_test_writer()
        .try_init();
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn resolver(path: &Path, env: &[(&str, &str)]) -> EnvResolver {
    init_logging();
    let env = Arc::new(env.iter().copied().collect::<EnvSnapshot>());
    let config = Loader::new(env.clone()).load_config(path).unwrap();
    EnvResolver::builder(config).environment(env).build()
}

const DOCUMENT: &str = r#"
project     = "acme-prod"
region      = "us-east1"
environment = "prod"

backend {
  type   = "gcs"
  bucket = "${project}-state"
  prefix = "${environment}/${upper(region)}"
}

module "vpc" {
  source = "./modules/vpc"
  variables = {
    name = "${project}-vpc"
  }
}

variables = {
  tier = get_env("TIER", "dev")
  motd = file("motd.txt")
  dir  = get_terragrunt_dir()
}
"#;

#[test]
fn document_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "motd.txt", "hello");
    let path = write(dir.path(), "terragrunt.hcl", DOCUMENT);

    let resolver = resolver(&path, &[("TIER", "prod")]);
    resolver.resolve(&Context::background()).unwrap();

    let config = resolver.config().snapshot();
    assert_eq!(config.backend.bucket, "acme-prod-state");
    assert_eq!(config.backend.prefix, "prod/US-EAST1");
    assert_eq!(
        config.module_by_name("vpc").unwrap().variables["name"],
        Value::from("acme-prod-vpc")
    );
    assert_eq!(config.variables["tier"], Value::from("prod"));
    assert_eq!(config.variables["motd"], Value::from("hello"));
    assert_eq!(
        config.variables["dir"],
        Value::from(dir.path().canonicalize().unwrap().display().to_string())
    );
    assert_eq!(config.source_path, Some(path.canonicalize().unwrap()));
}

#[test]
fn resolving_twice_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "motd.txt", "hello");
    let path = write(dir.path(), "terragrunt.hcl", DOCUMENT);

    let resolver = resolver(&path, &[]);
    resolver.resolve(&Context::background()).unwrap();
    let once = resolver.config().snapshot();

    resolver.resolve(&Context::background()).unwrap();
    assert_eq!(resolver.config().snapshot(), once);
    assert_eq!(once.variables["tier"], Value::from("dev"));
}

#[test]
fn expressions_against_resolved_config() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "motd.txt", "hello");
    let path = write(dir.path(), "terragrunt.hcl", DOCUMENT);

    let resolver = resolver(&path, &[]);
    resolver.resolve(&Context::background()).unwrap();

    assert_eq!(
        resolver
            .expand_variables("gs://${project}-state/${var.tier}/${lower(\"STATE\")}")
            .unwrap(),
        "gs://acme-prod-state/dev/state"
    );
    assert_eq!(
        resolver.get_resolved_value("backend.bucket").unwrap(),
        Value::from("acme-prod-state")
    );
    assert_eq!(
        resolver.get_resolved_value("variables.tier").unwrap(),
        Value::from("dev")
    );
}

#[test]
fn secrets_fail_closed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "config.yaml",
        "project: acme-prod\nbackend:\n  type: gcs\n  bucket: secret:state/bucket\n",
    );

    let resolver = resolver(&path, &[]);
    let (key, source) = match resolver.resolve(&Context::background()) {
        Err(Error::SecretResolution { key, source, .. }) => (key, source),
        other => panic!("expected a secret error, got {other:?}"),
    };
    assert_eq!(key, "state/bucket");
    assert!(matches!(source, SecretError::NotConfigured));
    assert_eq!(resolver.config().read().backend.bucket, "secret:state/bucket");
}

#[test]
fn secrets_from_provider() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "config.yaml",
        "project: acme-prod\n\
         authentication:\n  type: service_account\n  service_account_key: secret:sa/key\n\
         variables:\n  token: ${get_secret(\"api/token\", \"none\")}\n",
    );

    let env = Arc::new(EnvSnapshot::default());
    let config = Loader::new(env.clone()).load_config(&path).unwrap();
    let secrets: MemorySecrets = [("sa/key", "{\"type\": \"service_account\"}")]
        .into_iter()
        .collect();
    let resolver = EnvResolver::builder(config)
        .environment(env)
        .secrets(Arc::new(secrets))
        .build();
    resolver.resolve(&Context::background()).unwrap();

    let config = resolver.config().snapshot();
    assert_eq!(
        config.authentication.service_account_key,
        "{\"type\": \"service_account\"}"
    );
    assert_eq!(config.variables["token"], Value::from("none"));
}

#[test]
fn included_documents() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("live")).unwrap();
    write(
        dir.path(),
        "common.hcl",
        r#"
project = "acme-shared"
region  = "europe-west1"
"#,
    );
    let path = write(
        &dir.path().join("live"),
        "terragrunt.hcl",
        r#"
project = read_terragrunt_config("../common.hcl").project
region  = "${read_terragrunt_config("../common.hcl").region}"
"#,
    );

    let resolver = resolver(&path, &[]);
    resolver.resolve(&Context::background()).unwrap();

    let config = resolver.config().snapshot();
    assert_eq!(config.project, "acme-shared");
    assert_eq!(config.region, "europe-west1");
}

#[test]
fn include_cycle_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.hcl",
        "region = read_terragrunt_config(\"b.hcl\").region\n",
    );
    write(
        dir.path(),
        "b.hcl",
        "region = read_terragrunt_config(\"a.hcl\").region\n",
    );

    let resolver = resolver(&dir.path().join("a.hcl"), &[]);
    let error = resolver.resolve(&Context::background()).unwrap_err();
    assert!(matches!(error, Error::Evaluation { ref field, .. } if field == "region"));

    let chain: Vec<String> = std::iter::successors(
        Some(&error as &(dyn std::error::Error + 'static)),
        |error| error.source(),
    )
    .map(ToString::to_string)
    .collect();
    assert!(
        chain.iter().any(|message| message.starts_with("config include cycle")),
        "{chain:#?}"
    );
    assert!(resolver.config().read().region.starts_with("${read_terragrunt_config("));
}

#[test]
fn timeout_leaves_config_untouched() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "motd.txt", "hello");
    let path = write(dir.path(), "terragrunt.hcl", DOCUMENT);

    let resolver = resolver(&path, &[]);
    let cx = Context::background().with_timeout(std::time::Duration::ZERO);

    assert!(matches!(resolver.resolve(&cx), Err(Error::Cancelled(_))));
    assert_eq!(resolver.config().read().backend.bucket, "${project}-state");
}

#[test]
fn environment_fallback_document() {
    let env = Arc::new(
        [
            ("TERRAGRUNT_PROJECT", "acme-env"),
            ("TERRAGRUNT_REGION", "us-central1"),
            ("TIER", "stage"),
        ]
        .into_iter()
        .collect::<EnvSnapshot>(),
    );
    let config = Loader::new(env.clone()).load_config("").unwrap();
    let resolver = EnvResolver::builder(config).environment(env).build();
    resolver.resolve(&Context::background()).unwrap();

    assert_eq!(
        resolver.expand_variables("${project}/${region}/${env(\"TIER\")}").unwrap(),
        "acme-env/us-central1/stage"
    );
}

#[test]
fn secret_material_stays_literal() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "config.yaml",
        "project: acme-prod\n\
         authentication:\n  type: oauth\n  client_secret: secret:oauth/client\n\
         variables:\n  api_key: secret:api/key\n  endpoint: \"https://${project}.example.com\"\n",
    );

    let env = Arc::new(EnvSnapshot::default());
    let config = Loader::new(env.clone()).load_config(&path).unwrap();
    let secrets: MemorySecrets = [
        ("oauth/client", "pa${ss"),
        ("api/key", "k-${upper(\"leak\")}"),
    ]
    .into_iter()
    .collect();
    let resolver = EnvResolver::builder(config)
        .environment(env)
        .secrets(Arc::new(secrets))
        .build();

    for _ in 0..2 {
        resolver.resolve(&Context::background()).unwrap();
        let config = resolver.config().snapshot();
        assert_eq!(config.authentication.client_secret, "pa${ss");
        assert_eq!(config.variables["api_key"], Value::from("k-${upper(\"leak\")}"));
        assert_eq!(
            config.variables["endpoint"],
            Value::from("https://acme-prod.example.com")
        );
    }
}

#[test]
fn variables_read_resolved_variables() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "terragrunt.hcl",
        r#"
project = "acme-prod"

backend {
  type   = "gcs"
  bucket = "${var.name}-state"
}

variables = {
  name = "${base}"
  base = "${project}-x"
}
"#,
    );

    let resolver = resolver(&path, &[]);
    resolver.resolve(&Context::background()).unwrap();

    let config = resolver.config().snapshot();
    assert_eq!(config.variables["base"], Value::from("acme-prod-x"));
    assert_eq!(config.variables["name"], Value::from("acme-prod-x"));
    assert_eq!(config.backend.bucket, "acme-prod-x-state");
}

#[test]
fn variable_cycles_fail() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "config.yaml",
        "variables:\n  a: \"${b}\"\n  b: \"${a}\"\n",
    );

    let resolver = resolver(&path, &[]);
    let error = resolver.resolve(&Context::background()).unwrap_err();
    assert!(matches!(error, Error::Evaluation { ref field, .. } if field == "variables.a"));
    assert_eq!(resolver.config().read().variables["a"], Value::from("${b}"));
}

#[test]
fn templated_secret_references() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "config.yaml",
        "project: acme-prod\nenvironment: prod\n\
         backend:\n  type: gcs\n  bucket: \"secret:${environment}/bucket\"\n",
    );

    let unconfigured = resolver(&path, &[]);
    match unconfigured.resolve(&Context::background()) {
        Err(Error::SecretResolution { field, key, source }) => {
            assert_eq!(field, "backend.bucket");
            assert_eq!(key, "prod/bucket");
            assert!(matches!(source, SecretError::NotConfigured));
        }
        other => panic!("expected a secret error, got {other:?}"),
    }
    assert_eq!(
        unconfigured.config().read().backend.bucket,
        "secret:${environment}/bucket"
    );

    let env = Arc::new(EnvSnapshot::default());
    let config = Loader::new(env.clone()).load_config(&path).unwrap();
    let secrets: MemorySecrets = [("prod/bucket", "acme-prod-state")].into_iter().collect();
    let resolver = EnvResolver::builder(config)
        .environment(env)
        .secrets(Arc::new(secrets))
        .build();
    resolver.resolve(&Context::background()).unwrap();
    assert_eq!(resolver.config().read().backend.bucket, "acme-prod-state");
}
