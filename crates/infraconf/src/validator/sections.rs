//! structural checks per config section
//!
//! Field formats covered by the rule table are not checked again here; a section only adds
//! what the table cannot express, such as required fields, ranges and cross-field references.
use super::rules::{self, OUTPUT_NAME, TAG_KEY, TAG_VALUE};
use super::ValidationReport;
use crate::config::{Config, MonitoringConfig};
use std::collections::HashSet;
use std::path::Path;

const REGIONS: &[&str] = &[
    "us-central1",
    "us-east1",
    "us-east4",
    "us-west1",
    "us-west2",
    "us-west3",
    "us-west4",
    "europe-central2",
    "europe-north1",
    "europe-west1",
    "europe-west2",
    "europe-west3",
    "europe-west4",
    "europe-west6",
    "europe-west8",
    "europe-west9",
    "europe-west12",
    "asia-east1",
    "asia-east2",
    "asia-northeast1",
    "asia-northeast2",
    "asia-northeast3",
    "asia-south1",
    "asia-south2",
    "asia-southeast1",
    "asia-southeast2",
    "australia-southeast1",
    "australia-southeast2",
    "northamerica-northeast1",
    "northamerica-northeast2",
    "southamerica-east1",
    "southamerica-west1",
    "africa-south1",
    "me-west1",
    "me-central1",
];

const BACKEND_TYPES: &[&str] = &[
    "gcs", "local", "remote", "s3", "azurerm", "consul", "etcd", "http",
];
const HOOK_TRIGGERS: &[&str] = &["before", "after", "error"];
const HOOK_COMMANDS: &[&str] = &[
    "apply", "plan", "destroy", "init", "validate", "import", "push", "refresh",
];
const MONITORING_PROVIDERS: &[&str] = &[
    "stackdriver",
    "prometheus",
    "datadog",
    "newrelic",
    "elastic",
];
const ALERT_CHANNEL_TYPES: &[&str] = &["email", "slack", "pagerduty", "webhook", "sms"];

/// Tracks names of a named collection; `true` when `name` was seen before
#[derive(Default)]
pub(super) struct Names<'a>(HashSet<&'a str>);

impl<'a> Names<'a> {
    pub fn duplicate(&mut self, name: &'a str) -> bool {
        !self.0.insert(name)
    }
}

fn missing(path: &str) -> bool {
    !Path::new(path).exists()
}

pub(super) fn project(config: &Config, report: &mut ValidationReport) {
    let project = config.project.as_str();
    if project.is_empty() {
        report.error("project", "", "Project ID is required");
    }
}

pub(super) fn region(config: &Config, report: &mut ValidationReport) {
    if config.region.is_empty() {
        report.error("region", "", "Region is required");
    } else if !REGIONS.contains(&config.region.as_str()) {
        report.error("region", &config.region, "Invalid GCP region");
    }
}

pub(super) fn zone(config: &Config, report: &mut ValidationReport) {
    let zone = config.zone.as_str();
    if zone.is_empty() {
        return;
    }
    if !zone.starts_with(config.region.as_str()) {
        report.error(
            "zone",
            zone,
            format!("Zone must be in region {}", config.region),
        );
    }
}

pub(super) fn terraform(config: &Config, report: &mut ValidationReport) {
    let tf = &config.terraform;

    if !tf.working_dir.is_empty()
        && Path::new(&tf.working_dir).is_relative()
        && missing(&tf.working_dir)
    {
        report.warning(
            "terraform.working_dir",
            &tf.working_dir,
            "Working directory does not exist",
        );
    }
    if !(1..=1000).contains(&tf.parallelism) {
        report.error(
            "terraform.parallelism",
            tf.parallelism,
            "Parallelism must be between 1 and 1000",
        );
    }
    if !tf.lock_timeout.is_empty() && !rules::duration(&tf.lock_timeout) {
        report.error(
            "terraform.lock_timeout",
            &tf.lock_timeout,
            "Invalid duration format",
        );
    }
    if !tf.state_file.is_empty() && !tf.state_file.ends_with(".tfstate") {
        report.warning(
            "terraform.state_file",
            &tf.state_file,
            "State file should have .tfstate extension",
        );
    }
    if !tf.plan_file.is_empty() && !tf.plan_file.ends_with(".tfplan") {
        report.warning(
            "terraform.plan_file",
            &tf.plan_file,
            "Plan file should have .tfplan extension",
        );
    }
}

pub(super) fn terragrunt(config: &Config, report: &mut ValidationReport) {
    let tg = &config.terragrunt;

    if !tg.config_file.is_empty() && !tg.config_file.ends_with(".hcl") {
        report.warning(
            "terragrunt.config_file",
            &tg.config_file,
            "Config file should have .hcl extension",
        );
    }
    if !(0..=100).contains(&tg.max_retries) {
        report.error(
            "terragrunt.max_retries",
            tg.max_retries,
            "Max retries must be between 0 and 100",
        );
    }
    if !(0..=3600).contains(&tg.sleep_interval) {
        report.error(
            "terragrunt.sleep_interval",
            tg.sleep_interval,
            "Sleep interval must be between 0 and 3600 seconds",
        );
    }
    if !(1..=100).contains(&tg.parallelism) {
        report.error(
            "terragrunt.parallelism",
            tg.parallelism,
            "Parallelism must be between 1 and 100",
        );
    }
    for pattern in &tg.retryable_errors {
        if let Err(e) = regex::Regex::new(pattern) {
            report.error(
                "terragrunt.retryable_errors",
                pattern,
                format!("Invalid regex pattern: {e}"),
            );
        }
    }
}

pub(super) fn backend(config: &Config, report: &mut ValidationReport) {
    let backend = &config.backend;

    if backend.kind.is_empty() {
        report.error("backend.type", "", "Backend type is required");
        return;
    }
    if !BACKEND_TYPES.contains(&backend.kind.as_str()) {
        report.error("backend.type", &backend.kind, "Invalid backend type");
    }
    if backend.kind != "gcs" {
        return;
    }

    if backend.bucket.is_empty() {
        report.error("backend.bucket", "", "Bucket is required for GCS backend");
    }
    if backend.prefix.starts_with('/') {
        report.warning(
            "backend.prefix",
            &backend.prefix,
            "Prefix should not start with /",
        );
    }
    if !backend.kms_key_id.is_empty() && !backend.kms_key_id.starts_with("projects/") {
        report.warning(
            "backend.kms_key_id",
            &backend.kms_key_id,
            "KMS key should be in format: \
             projects/PROJECT/locations/LOCATION/keyRings/KEYRING/cryptoKeys/KEY",
        );
    }
}

pub(super) fn providers(config: &Config, report: &mut ValidationReport) {
    for (name, provider) in &config.providers {
        let field = |suffix: &str| format!("providers.{name}.{suffix}");

        if provider.source.is_empty() {
            report.error(field("source"), "", "Provider source is required");
        }
        if !provider.version.is_empty() && rules::version_constraint(&provider.version).is_err() {
            report.error(
                field("version"),
                &provider.version,
                "Invalid version constraint",
            );
        }
        if !provider.credentials.is_empty()
            && Path::new(&provider.credentials).is_relative()
            && missing(&provider.credentials)
        {
            report.warning(
                field("credentials"),
                &provider.credentials,
                "Credentials file not found",
            );
        }
        if !provider.impersonate_service_account.is_empty() {
            if let Err(message) = rules::email(&provider.impersonate_service_account) {
                report.error(
                    field("impersonate_service_account"),
                    &provider.impersonate_service_account,
                    message,
                );
            }
        }
        if !provider.region.is_empty() {
            if let Err(message) = rules::region_format(&provider.region) {
                report.error(field("region"), &provider.region, message);
            }
        }
    }
}

pub(super) fn modules(config: &Config, report: &mut ValidationReport) {
    let mut names = Names::default();

    for (i, module) in config.modules.iter().enumerate() {
        let field = |suffix: &str| format!("modules[{i}].{suffix}");

        if module.name.is_empty() {
            report.error(field("name"), "", "Module name is required");
            continue;
        }
        if names.duplicate(&module.name) {
            report.error(field("name"), &module.name, "Duplicate module name");
        }

        if module.source.is_empty() {
            report.error(field("source"), "", "Module source is required");
        } else {
            module_source(&field("source"), &module.source, report);
        }

        if !module.version.is_empty() && rules::version_constraint(&module.version).is_err() {
            report.error(field("version"), &module.version, "Invalid version constraint");
        }
        if module.count < 0 {
            report.error(field("count"), module.count, "Count cannot be negative");
        }
        if module.depends_on.contains(&module.name) {
            report.error(
                field("depends_on"),
                &module.name,
                "Module cannot depend on itself",
            );
        }
        if !module.condition.is_empty() {
            balanced(&field("condition"), &module.condition, report);
        }
    }
}

/// Local paths must exist, remote sources must look like their kind
fn module_source(field: &str, source: &str, report: &mut ValidationReport) {
    if source.starts_with("./") || source.starts_with("../") {
        if missing(source) {
            report.error(field, source, "Local module source does not exist");
        }
    } else if let Some(rest) = source
        .strip_prefix("git::")
        .or_else(|| source.strip_prefix("github.com/"))
    {
        if !rest.contains('/') {
            report.error(field, source, "Invalid Git repository format");
        }
    } else if let Some(bucket) = source.strip_prefix("gs://") {
        let bucket = bucket.split('/').next().unwrap_or_default();
        if rules::bucket_name(bucket).is_err() {
            report.error(field, source, "Invalid GCS bucket in source");
        }
    } else if !source.contains("://") && source.split('/').count() < 3 {
        // registry sources are NAMESPACE/NAME/PROVIDER
        report.error(field, source, "Invalid registry module format");
    }
}

fn balanced(field: &str, expression: &str, report: &mut ValidationReport) {
    let count = |c: char| expression.matches(c).count();

    let pairs = [
        ('(', ')', "parentheses"),
        ('{', '}', "braces"),
        ('[', ']', "brackets"),
    ];
    for (open, close, what) in pairs {
        if count(open) != count(close) {
            report.error(field, expression, format!("Unbalanced {what} in condition"));
        }
    }
}

pub(super) fn dependencies(config: &Config, report: &mut ValidationReport) {
    let mut names = Names::default();

    for (i, dependency) in config.terragrunt.dependencies.iter().enumerate() {
        let field = |suffix: &str| format!("terragrunt.dependencies[{i}].{suffix}");

        if dependency.name.is_empty() {
            report.error(field("name"), "", "Dependency name is required");
            continue;
        }
        if names.duplicate(&dependency.name) {
            report.error(field("name"), &dependency.name, "Duplicate dependency name");
        }

        let path = dependency.path.as_str();
        if path.is_empty() {
            report.error(field("path"), "", "Dependency path is required");
        } else if Path::new(path).is_relative()
            && !path.starts_with("./")
            && !path.starts_with("../")
        {
            report.warning(
                field("path"),
                path,
                "Dependency path should be absolute or relative",
            );
        }
    }
}

pub(super) fn hooks(config: &Config, report: &mut ValidationReport) {
    let mut names = Names::default();

    for (i, hook) in config.terragrunt.hooks.iter().enumerate() {
        let field = |suffix: &str| format!("terragrunt.hooks[{i}].{suffix}");

        if hook.name.is_empty() {
            report.error(field("name"), "", "Hook name is required");
            continue;
        }
        if names.duplicate(&hook.name) {
            report.error(field("name"), &hook.name, "Duplicate hook name");
        }
        if hook.commands.is_empty() {
            report.error(
                field("commands"),
                "",
                "Hook must have at least one command",
            );
        }
        if !HOOK_TRIGGERS.contains(&hook.execute_on.as_str()) {
            report.error(
                field("execute_on"),
                &hook.execute_on,
                "ExecuteOn must be 'before', 'after', or 'error'",
            );
        }
        for command in &hook.run_on {
            if !HOOK_COMMANDS.contains(&command.as_str()) {
                report.error(
                    field("run_on"),
                    command,
                    format!("Invalid run_on command: {command}"),
                );
            }
        }
    }
}

pub(super) fn monitoring(monitoring: &MonitoringConfig, report: &mut ValidationReport) {
    if !monitoring.enabled {
        return;
    }

    if !monitoring.provider.is_empty()
        && !MONITORING_PROVIDERS.contains(&monitoring.provider.as_str())
    {
        report.error(
            "monitoring.provider",
            &monitoring.provider,
            "Invalid monitoring provider",
        );
    }
    if !(0.0..=1.0).contains(&monitoring.sampling_rate) {
        report.error(
            "monitoring.sampling_rate",
            monitoring.sampling_rate,
            "Sampling rate must be between 0 and 1",
        );
    }

    for (field, days, what) in [
        (
            "monitoring.metrics_retention_days",
            monitoring.metrics_retention_days,
            "Metrics",
        ),
        (
            "monitoring.logs_retention_days",
            monitoring.logs_retention_days,
            "Logs",
        ),
        (
            "monitoring.traces_retention_days",
            monitoring.traces_retention_days,
            "Traces",
        ),
    ] {
        if !(0..=3650).contains(&days) {
            report.warning(
                field,
                days,
                format!("{what} retention must be between 0 and 3650 days"),
            );
        }
    }

    for (i, channel) in monitoring.alert_channels.iter().enumerate() {
        if channel.name.is_empty() {
            report.error(
                format!("monitoring.alert_channels[{i}].name"),
                "",
                "Alert channel name is required",
            );
        }
        if !ALERT_CHANNEL_TYPES.contains(&channel.kind.as_str()) {
            report.error(
                format!("monitoring.alert_channels[{i}].type"),
                &channel.kind,
                "Invalid alert channel type",
            );
        }
    }
}

pub(super) fn outputs(config: &Config, report: &mut ValidationReport) {
    for (name, output) in &config.outputs {
        if name.is_empty() {
            report.error("outputs", "", "Output name cannot be empty");
            continue;
        }
        if !OUTPUT_NAME.is_match(name) {
            report.error(
                format!("outputs.{name}"),
                name,
                "Output name must start with letter and contain only letters, numbers, and \
                 underscores",
            );
        }
        if output.depends_on.contains(name) {
            report.error(
                format!("outputs.{name}.depends_on"),
                name,
                "Output cannot depend on itself",
            );
        }
    }
}

pub(super) fn tags(config: &Config, report: &mut ValidationReport) {
    for (key, value) in &config.tags {
        if key.is_empty() {
            report.error("tags", "", "Tag key cannot be empty");
            continue;
        }
        let field = format!("tags.{key}");

        if key.chars().count() > 128 {
            report.error(&field, key, "Tag key cannot exceed 128 characters");
        }
        if value.chars().count() > 256 {
            report.error(&field, value, "Tag value cannot exceed 256 characters");
        }
        if !TAG_KEY.is_match(key) {
            report.error(&field, key, "Tag key contains invalid characters");
        }
        if !TAG_VALUE.is_match(value) {
            report.error(&field, value, "Tag value contains invalid characters");
        }
    }
}
