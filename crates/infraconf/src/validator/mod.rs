//! rule based validation of a resolved config
//!
//! A run first applies the declarative rule table in [rules], then the structural checks for
//! every section. Issues are collected, never short-circuited, so one run reports everything
//! that is wrong with a config.
mod network;
mod rules;
mod sections;
mod security;

use crate::config::Config;
use crate::error::{Error, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct ValidationIssue {
    /// Dotted path of the offending field, `network.subnets[1].cidr`
    pub field: String,
    pub value: String,
    pub message: String,
    pub severity: Severity,
}

/// Every issue of one validation run
#[derive(thiserror::Error, Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
    errors: usize,
    warnings: usize,
}

impl ValidationReport {
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.of(Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.of(Severity::Warning)
    }

    fn of(&self, severity: Severity) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(move |issue| issue.severity == severity)
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings > 0
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    fn log(&mut self, issue: ValidationIssue) {
        tracing::trace!(?issue, "issue found");
        match issue.severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
        }
        self.issues.push(issue);
    }

    pub(crate) fn error(
        &mut self,
        field: impl Into<String>,
        value: impl ToString,
        message: impl Into<String>,
    ) {
        self.log(ValidationIssue::new(
            field.into(),
            value.to_string(),
            message.into(),
            Severity::Error,
        ));
    }

    pub(crate) fn warning(
        &mut self,
        field: impl Into<String>,
        value: impl ToString,
        message: impl Into<String>,
    ) {
        self.log(ValidationIssue::new(
            field.into(),
            value.to_string(),
            message.into(),
            Severity::Warning,
        ));
    }

    pub(crate) fn push(
        &mut self,
        severity: Severity,
        field: impl Into<String>,
        value: impl ToString,
        message: impl Into<String>,
    ) {
        match severity {
            Severity::Error => self.error(field, value, message),
            Severity::Warning => self.warning(field, value, message),
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn section<'a>(
            f: &mut fmt::Formatter<'_>,
            title: &str,
            issues: impl Iterator<Item = &'a ValidationIssue>,
        ) -> fmt::Result {
            write!(f, "{title}:")?;
            for issue in issues {
                write!(f, "\n  - {}: {}", issue.field, issue.message)?;
                if !issue.value.is_empty() {
                    write!(f, " (value: {})", issue.value)?;
                }
            }
            Ok(())
        }

        if self.has_errors() {
            section(f, "Validation errors", self.errors())?;
        }
        if self.has_warnings() {
            if self.has_errors() {
                f.write_str("\n\n")?;
            }
            section(f, "Validation warnings", self.warnings())?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, derive_new::new)]
pub struct Validator {
    #[new(default)]
    report: ValidationReport,
}

impl Validator {
    /// Checks `config` and fails with the full report when any error was found
    ///
    /// Warnings alone do not fail. The issues of the latest run stay available through
    /// [Validator::report].
    pub fn validate(&mut self, config: &Config) -> Result<()> {
        self.report = ValidationReport::default();
        let report = &mut self.report;

        rules::apply(config, report);

        sections::project(config, report);
        sections::region(config, report);
        sections::zone(config, report);
        sections::terraform(config, report);
        sections::terragrunt(config, report);
        sections::backend(config, report);
        sections::providers(config, report);
        sections::modules(config, report);
        sections::dependencies(config, report);
        sections::hooks(config, report);
        security::authentication(&config.authentication, report);
        sections::monitoring(&config.monitoring, report);
        security::security(&config.security, report);
        network::network(&config.network, report);
        sections::outputs(config, report);
        sections::tags(config, report);

        tracing::debug!(
            errors = report.errors,
            warnings = report.warnings,
            "validation finished"
        );

        if report.has_errors() {
            return Err(Error::Validation(report.clone()));
        }
        Ok(())
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        self.report.issues()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.report.errors()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.report.warnings()
    }

    pub fn has_errors(&self) -> bool {
        self.report.has_errors()
    }

    pub fn has_warnings(&self) -> bool {
        self.report.has_warnings()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::config::{BackendConfig, Config};
    use pretty_assertions::assert_eq;

    /// A config every check accepts
    pub(crate) fn valid() -> Config {
        let mut config = Config {
            project: "acme-prod-1".into(),
            region: "us-east1".into(),
            zone: "us-east1-b".into(),
            environment: "prod".into(),
            backend: BackendConfig {
                kind: "gcs".into(),
                bucket: "acme-state".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        config.terraform.parallelism = 10;
        config.terragrunt.parallelism = 10;
        config.terragrunt.max_retries = 3;
        config
    }

    /// Fields of all issues, in order
    pub(crate) fn fields(report: &ValidationReport) -> Vec<&str> {
        report.issues().iter().map(|i| i.field.as_str()).collect()
    }

    #[test]
    fn valid_config_passes() {
        let mut validator = Validator::new();
        validator.validate(&valid()).unwrap();
        assert!(validator.report().is_empty(), "{}", validator.report());
    }

    #[test]
    fn warnings_alone_do_not_fail() {
        let mut config = valid();
        config.environment = "sandbox".into();

        let mut validator = Validator::new();
        validator.validate(&config).unwrap();
        assert!(validator.has_warnings());
        assert!(!validator.has_errors());
        assert_eq!(
            validator.warnings().map(|w| w.field.as_str()).collect::<Vec<_>>(),
            ["environment"]
        );
    }

    #[test]
    fn each_run_starts_fresh() {
        let mut config = valid();
        config.project = String::new();

        let mut validator = Validator::new();
        assert!(validator.validate(&config).is_err());
        assert!(validator.has_errors());

        validator.validate(&valid()).unwrap();
        assert!(!validator.has_errors());
        assert!(validator.issues().is_empty());
    }

    #[test]
    fn report_format() {
        let mut report = ValidationReport::default();
        report.error("project", "", "Project ID is required");
        report.warning("environment", "sandbox", "unknown environment");
        report.error("region", "mars-1", "Invalid GCP region");

        insta::assert_snapshot!(report.to_string(), @r###"
        Validation errors:
          - project: Project ID is required
          - region: Invalid GCP region (value: mars-1)

        Validation warnings:
          - environment: unknown environment (value: sandbox)
        "###);
    }

    #[test]
    fn error_carries_the_report() {
        let mut config = valid();
        config.region = "mars-1".into();

        let Err(Error::Validation(report)) = config.validate() else {
            panic!("expected a validation error");
        };
        assert_eq!(fields(&report), ["region", "zone"]);
    }
}
