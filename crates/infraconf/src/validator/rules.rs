//! declarative field format rules and the format checks shared by the section validators
use super::{Severity, ValidationReport};
use crate::config::Config;
use regex::Regex;
use std::net::IpAddr;
use std::sync::LazyLock;

type Check = fn(&str) -> Result<(), String>;

struct Rule {
    name: &'static str,
    field: &'static str,
    value: fn(&Config) -> &str,
    check: Check,
    severity: Severity,
}

static RULES: &[Rule] = &[
    Rule {
        name: "project_format",
        field: "project",
        value: |c: &Config| c.project.as_str(),
        check: project_format,
        severity: Severity::Error,
    },
    Rule {
        name: "region_format",
        field: "region",
        value: |c: &Config| c.region.as_str(),
        check: region_format,
        severity: Severity::Error,
    },
    Rule {
        name: "zone_format",
        field: "zone",
        value: |c: &Config| c.zone.as_str(),
        check: zone_format,
        severity: Severity::Error,
    },
    Rule {
        name: "environment_format",
        field: "environment",
        value: |c: &Config| c.environment.as_str(),
        check: environment_format,
        severity: Severity::Warning,
    },
    Rule {
        name: "backend_bucket",
        field: "backend.bucket",
        value: |c: &Config| c.backend.bucket.as_str(),
        check: bucket_name,
        severity: Severity::Error,
    },
    Rule {
        name: "terraform_version",
        field: "terraform.version",
        value: |c: &Config| c.terraform.version.as_str(),
        check: version,
        severity: Severity::Warning,
    },
    Rule {
        name: "terragrunt_version",
        field: "terragrunt.version",
        value: |c: &Config| c.terragrunt.version.as_str(),
        check: version,
        severity: Severity::Warning,
    },
];

/// Runs the rule table; empty fields are left to the section validators
pub(super) fn apply(config: &Config, report: &mut ValidationReport) {
    for rule in RULES {
        let value = (rule.value)(config);
        if value.is_empty() {
            continue;
        }
        if let Err(message) = (rule.check)(value) {
            tracing::trace!(rule = rule.name, "rule failed");
            report.push(rule.severity, rule.field, value, message);
        }
    }
}

macro_rules! patterns {
    ($($name:ident = $regex:literal;)*) => {
        $(
            pub(super) static $name: LazyLock<Regex> =
                LazyLock::new(|| Regex::new($regex).expect("static pattern"));
        )*
    };
}

patterns! {
    PROJECT = r"^[a-z][a-z0-9-]*[a-z0-9]$";
    REGION = r"^[a-z]+-[a-z0-9]+$";
    ZONE = r"^[a-z]+-[a-z0-9]+-[a-z]$";
    BUCKET = r"^[a-z0-9][a-z0-9._-]*[a-z0-9]$";
    VPC_NAME = r"^[a-z][a-z0-9-]*$";
    OUTPUT_NAME = r"^[a-zA-Z][a-zA-Z0-9_]*$";
    TAG_KEY = r"^[a-zA-Z0-9+\-=._:/@]*$";
    TAG_VALUE = r"^[a-zA-Z0-9+\-=._:/@\s]*$";
    DURATION = r"^(\d+(\.\d+)?(ns|us|µs|ms|s|m|h))+$";
}

pub(super) const ENVIRONMENTS: &[&str] = &[
    "dev",
    "development",
    "test",
    "testing",
    "qa",
    "staging",
    "prod",
    "production",
];

pub(super) fn project_format(project: &str) -> Result<(), String> {
    if !(6..=30).contains(&project.len()) {
        return Err("project ID must be between 6 and 30 characters".into());
    }
    if !PROJECT.is_match(project) {
        return Err("project ID must start with a lowercase letter and contain only lowercase \
                    letters, numbers, and hyphens"
            .into());
    }
    Ok(())
}

pub(super) fn region_format(region: &str) -> Result<(), String> {
    if REGION.is_match(region) {
        Ok(())
    } else {
        Err("invalid region format".into())
    }
}

pub(super) fn zone_format(zone: &str) -> Result<(), String> {
    if ZONE.is_match(zone) {
        Ok(())
    } else {
        Err("invalid zone format".into())
    }
}

pub(super) fn environment_format(environment: &str) -> Result<(), String> {
    if ENVIRONMENTS.contains(&environment.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err("environment should be one of: dev, test, qa, staging, prod".into())
    }
}

/// Storage bucket naming: 3-63 characters, lowercase, no `..`, not an IP and nothing
/// resembling `goog`
pub(super) fn bucket_name(bucket: &str) -> Result<(), String> {
    if !(3..=63).contains(&bucket.len()) {
        return Err("bucket name must be between 3 and 63 characters".into());
    }
    if !BUCKET.is_match(bucket) {
        return Err("bucket name must start and end with a lowercase letter or number and \
                    contain only lowercase letters, numbers, dots, hyphens and underscores"
            .into());
    }
    if bucket.contains("..") {
        return Err("bucket name cannot contain consecutive dots".into());
    }
    if ["goog", "g00g"].iter().any(|reserved| bucket.contains(reserved)) {
        return Err("bucket name cannot contain 'goog' or close variants".into());
    }
    if bucket.parse::<IpAddr>().is_ok() {
        return Err("bucket name cannot be an IP address".into());
    }
    Ok(())
}

/// A single version, `v` prefix and missing minor or patch allowed (`v1.5`)
pub(super) fn version(version: &str) -> Result<(), String> {
    let version = version.strip_prefix('v').unwrap_or(version);
    let (core, rest) = match version.find(['-', '+']) {
        Some(at) => version.split_at(at),
        None => (version, ""),
    };

    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 {
        return Err(format!("invalid version format: {version}"));
    }
    parts.resize(3, "0");

    semver::Version::parse(&format!("{}{rest}", parts.join(".")))
        .map(drop)
        .map_err(|e| format!("invalid version format: {e}"))
}

/// Version constraint such as `>= 4.0, < 5.0` or `~> 4.0`
pub(super) fn version_constraint(constraint: &str) -> Result<(), String> {
    // pessimistic `~>` means the same as a cargo tilde requirement
    let constraint = constraint.replace("~>", "~");
    semver::VersionReq::parse(&constraint)
        .map(drop)
        .map_err(|_| "invalid version constraint".to_string())
}

pub(super) fn email(email: &str) -> Result<(), String> {
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            if domain.contains('.') {
                Ok(())
            } else {
                Err("invalid email domain".into())
            }
        }
        _ => Err("invalid email format".into()),
    }
}

/// Duration made of number and unit pairs, `30s`, `1h30m`, `1.5h`
pub(super) fn duration(duration: &str) -> bool {
    duration == "0" || DURATION.is_match(duration)
}

pub(super) fn url(url: &str) -> bool {
    url.split_once("://")
        .is_some_and(|(scheme, rest)| !scheme.is_empty() && !rest.is_empty())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::validator::test::{fields, valid};
    use pretty_assertions::assert_eq;

    #[test]
    fn buckets() {
        assert!(bucket_name("acme-state").is_ok());
        assert!(bucket_name("acme.state_1").is_ok());

        for invalid in [
            "ab",
            "Acme-state",
            "-acme",
            "acme-",
            "acme..state",
            "my-google-bucket",
            "acme-g00gle",
            "192.168.1.1",
        ] {
            assert!(bucket_name(invalid).is_err(), "{invalid} should be rejected");
        }
        assert_eq!(
            bucket_name("10.0.0.1").unwrap_err(),
            "bucket name cannot be an IP address"
        );
    }

    #[test]
    fn versions() {
        assert!(version("1.5.7").is_ok());
        assert!(version("v1.5").is_ok());
        assert!(version("0.55.1-beta.1").is_ok());
        assert!(version("latest").is_err());
        assert!(version("1.2.3.4").is_err());

        assert!(version_constraint(">= 4.0, < 5.0").is_ok());
        assert!(version_constraint("~> 4.80").is_ok());
        assert!(version_constraint("=> 4").is_err());
    }

    #[test]
    fn emails_durations_urls() {
        assert!(email("deploy@acme.iam.gserviceaccount.com").is_ok());
        assert_eq!(email("deploy@localhost").unwrap_err(), "invalid email domain");
        assert!(email("deploy").is_err());
        assert!(email("a@b@c.com").is_err());

        assert!(duration("20m"));
        assert!(duration("1h30m"));
        assert!(!duration("soon"));

        assert!(url("https://token.actions.githubusercontent.com"));
        assert!(!url("token.actions"));
    }

    #[test]
    fn table_skips_empty_values() {
        let mut config = valid();
        config.zone = String::new();
        config.terraform.version = "next".into();

        let mut report = ValidationReport::default();
        apply(&config, &mut report);

        assert_eq!(fields(&report), ["terraform.version"]);
        assert!(!report.has_errors());
    }
}
