use indexmap::IndexMap;
use infraconf::config::{BackendConfig, ModuleConfig, Provider, Subnet};
use infraconf::{Config, EnvSnapshot, Error, Loader, Value};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("INFRACONF_LOG"))
        .with_test_writer()
        .try_init();
}

fn loader() -> Loader {
    init_logging();
    Loader::new(Arc::new(EnvSnapshot::default()))
}

fn sample() -> Config {
    let mut config = Config {
        project: "acme-prod".into(),
        region: "us-east1".into(),
        environment: "prod".into(),
        backend: BackendConfig {
            kind: "gcs".into(),
            bucket: "${project}-state".into(),
            encryption: true,
            ..Default::default()
        },
        providers: IndexMap::from([(
            "google".to_string(),
            Provider {
                source: "hashicorp/google".into(),
                version: "~> 5.0".into(),
                scopes: vec!["cloud-platform".into()],
                ..Default::default()
            },
        )]),
        modules: vec![
            ModuleConfig {
                name: "vpc".into(),
                source: "./modules/vpc".into(),
                enabled: true,
                ..Default::default()
            },
            ModuleConfig {
                name: "gke".into(),
                source: "./modules/gke".into(),
                depends_on: vec!["vpc".into()],
                ..Default::default()
            },
        ],
        variables: IndexMap::from([
            ("replicas".to_string(), Value::Integer(3)),
            ("labels".to_string(), Value::from(vec!["a", "b"])),
        ]),
        tags: IndexMap::from([("team".to_string(), "platform".to_string())]),
        ..Default::default()
    };
    config.terraform.version = "1.5.7".into();
    config.terraform.parallelism = 10;
    config.network.subnets = vec![Subnet {
        name: "a".into(),
        cidr: "10.0.0.0/24".into(),
        region: "us-east1".into(),
        ..Default::default()
    }];
    config
}

#[test]
fn saved_documents_load_back() {
    let dir = tempfile::tempdir().unwrap();

    for name in ["config.json", "config.yaml", "config.yml", "nested/config.hcl"] {
        let path = dir.path().join(name);
        let mut config = sample();
        loader().save_as(&mut config, &path).unwrap();
        assert_eq!(config.source_path.as_deref(), Some(path.as_path()));

        let loaded = loader().load_config(&path).unwrap();
        assert_eq!(
            Config {
                source_path: None,
                ..loaded
            },
            Config {
                source_path: None,
                ..config
            },
            "{name}"
        );
    }
}

#[test]
fn hcl_uses_labeled_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("terragrunt.hcl");
    sample().save_as(&path).unwrap();

    let rendered = std::fs::read_to_string(&path).unwrap();
    assert!(rendered.contains("module \"gke\" {"), "{rendered}");
    assert!(rendered.contains("provider \"google\" {"), "{rendered}");
}

#[test]
fn unknown_extension_is_not_saved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let error = sample().save_as(&path).unwrap_err();
    assert!(matches!(error, Error::UnsupportedFormat { path: ref p } if *p == path));
    assert!(!path.exists());
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let error = loader()
        .load_config(dir.path().join("absent.yaml"))
        .unwrap_err();

    assert!(matches!(error, Error::Io { .. }), "{error:?}");
}

#[test]
fn syntax_errors_name_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.hcl");
    std::fs::write(&path, "project = \"acme\"\nregion = \n").unwrap();

    let error = loader().load_config(&path).unwrap_err();
    assert!(matches!(error, Error::Syntax(_)), "{error:?}");
    assert!(error.to_string().contains("broken.hcl"), "{error}");
}

#[test]
fn layered_documents_merge() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let overlay = dir.path().join("overlay.json");
    std::fs::write(
        &base,
        "project: acme-prod\nregion: us-east1\n\
         modules:\n  - name: vpc\n    source: ./modules/vpc\n\
         tags:\n  team: platform\n  tier: base\n",
    )
    .unwrap();
    std::fs::write(
        &overlay,
        r#"{
  "region": "europe-west1",
  "modules": [{"name": "gke", "source": "./modules/gke"}],
  "tags": {"tier": "overlay"}
}"#,
    )
    .unwrap();

    let mut config = loader().load_config(&base).unwrap();
    config.merge(&loader().load_config(&overlay).unwrap());

    assert_eq!(config.project, "acme-prod");
    assert_eq!(config.region, "europe-west1");
    assert_eq!(
        config
            .modules
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>(),
        ["vpc", "gke"]
    );
    assert_eq!(config.tags["team"], "platform");
    assert_eq!(config.tags["tier"], "overlay");
}
