use super::network::{cidr, ip_or_cidr};
use super::rules;
use super::ValidationReport;
use crate::config::{
    AccessControl, AuditLogging, AuthConfig, DataProtection, FirewallRule, IamPolicy, OidcConfig,
    SecretManagement, SecurityConfig, SecurityGroup,
};
use std::path::Path;

const AUTH_TYPES: &[&str] = &[
    "service_account",
    "application_default",
    "oauth",
    "oidc",
    "access_token",
];
const TLS_VERSIONS: &[&str] = &["1.0", "1.1", "1.2", "1.3"];
const MEMBER_PREFIXES: &[&str] = &["user:", "serviceAccount:", "group:", "domain:"];
const SECRET_PROVIDERS: &[&str] = &[
    "google-secret-manager",
    "vault",
    "aws-secrets-manager",
    "azure-key-vault",
];
const AUDIT_LOG_TYPES: &[&str] = &[
    "data_access",
    "admin_activity",
    "system_event",
    "policy_denied",
    "all",
];
const CLASSIFICATIONS: &[&str] = &["public", "internal", "confidential", "restricted"];

pub(super) fn authentication(auth: &AuthConfig, report: &mut ValidationReport) {
    if !auth.kind.is_empty() && !AUTH_TYPES.contains(&auth.kind.as_str()) {
        report.error(
            "authentication.type",
            &auth.kind,
            "Invalid authentication type",
        );
    }

    match auth.kind.as_str() {
        "service_account" => {
            if auth.service_account_key.is_empty() && auth.service_account_email.is_empty() {
                report.error(
                    "authentication",
                    &auth.kind,
                    "Service account key or email is required",
                );
            }
            let key = auth.service_account_key.as_str();
            if !key.is_empty() && !key.starts_with("gs://") && !Path::new(key).exists() {
                report.error(
                    "authentication.service_account_key",
                    key,
                    "Service account key file not found",
                );
            }
            if !auth.service_account_email.is_empty() {
                if let Err(message) = rules::email(&auth.service_account_email) {
                    report.error(
                        "authentication.service_account_email",
                        &auth.service_account_email,
                        message,
                    );
                }
            }
        }
        "oidc" => oidc(&auth.oidc, report),
        _ => {}
    }

    if !auth.impersonate_email.is_empty() {
        if let Err(message) = rules::email(&auth.impersonate_email) {
            report.error(
                "authentication.impersonate_email",
                &auth.impersonate_email,
                message,
            );
        }
    }
}

fn oidc(oidc: &OidcConfig, report: &mut ValidationReport) {
    if !oidc.enabled {
        return;
    }

    if oidc.provider.is_empty() {
        report.error(
            "authentication.oidc.provider",
            "",
            "OIDC provider is required",
        );
    }
    if oidc.issuer.is_empty() {
        report.error("authentication.oidc.issuer", "", "OIDC issuer is required");
    } else if !rules::url(&oidc.issuer) {
        report.error(
            "authentication.oidc.issuer",
            &oidc.issuer,
            "Invalid issuer URL",
        );
    }
    if oidc.client_id.is_empty() {
        report.error(
            "authentication.oidc.client_id",
            "",
            "OIDC client ID is required",
        );
    }
    if !oidc.redirect_uri.is_empty() && !rules::url(&oidc.redirect_uri) {
        report.error(
            "authentication.oidc.redirect_uri",
            &oidc.redirect_uri,
            "Invalid redirect URI",
        );
    }
    if !oidc.workload_identity_pool.is_empty()
        && !oidc.workload_identity_pool.starts_with("projects/")
    {
        report.error(
            "authentication.oidc.workload_identity_pool",
            &oidc.workload_identity_pool,
            "Workload identity pool should be in format: \
             projects/PROJECT_ID/locations/global/workloadIdentityPools/POOL_ID",
        );
    }
    if !oidc.service_account.is_empty() {
        if let Err(message) = rules::email(&oidc.service_account) {
            report.error(
                "authentication.oidc.service_account",
                &oidc.service_account,
                message,
            );
        }
    }
}

pub(super) fn security(security: &SecurityConfig, report: &mut ValidationReport) {
    if !security.enabled {
        return;
    }

    if !security.tls_min_version.is_empty()
        && !TLS_VERSIONS.contains(&security.tls_min_version.as_str())
    {
        report.error(
            "security.tls_min_version",
            &security.tls_min_version,
            "Invalid TLS version",
        );
    }
    for (field, path, what) in [
        (
            "security.certificate_path",
            &security.certificate_path,
            "Certificate",
        ),
        (
            "security.private_key_path",
            &security.private_key_path,
            "Private key",
        ),
    ] {
        if !path.is_empty() && !Path::new(path).exists() {
            report.error(field, path, format!("{what} file not found"));
        }
    }

    firewall_rules(&security.firewall_rules, report);
    iam_policies(&security.iam_policies, report);
    security_groups(&security.security_groups, report);
    secret_management(&security.secret_management, report);
    audit_logging(&security.audit_logging, report);
    data_protection(&security.data_protection, report);
    access_control(&security.access_control, report);
}

fn firewall_rules(rules: &[FirewallRule], report: &mut ValidationReport) {
    for (i, rule) in rules.iter().enumerate() {
        let field = |suffix: &str| format!("security.firewall_rules[{i}].{suffix}");

        if rule.name.is_empty() {
            report.error(field("name"), "", "Firewall rule name is required");
        }
        if !matches!(rule.direction.as_str(), "INGRESS" | "EGRESS") {
            report.error(
                field("direction"),
                &rule.direction,
                "Direction must be INGRESS or EGRESS",
            );
        }
        if !(0..=65535).contains(&rule.priority) {
            report.error(
                field("priority"),
                rule.priority,
                "Priority must be between 0 and 65535",
            );
        }
        if !matches!(rule.action.as_str(), "allow" | "deny") {
            report.error(
                field("action"),
                &rule.action,
                "Action must be 'allow' or 'deny'",
            );
        }
        for range in rule.source_ranges.iter().chain(&rule.destination_ranges) {
            if cidr(range).is_none() {
                let list = if rule.source_ranges.contains(range) {
                    "source_ranges"
                } else {
                    "destination_ranges"
                };
                report.error(field(list), range, "Invalid CIDR format");
            }
        }
    }
}

fn iam_policies(policies: &[IamPolicy], report: &mut ValidationReport) {
    for (i, policy) in policies.iter().enumerate() {
        let field = |suffix: &str| format!("security.iam_policies[{i}].{suffix}");

        for (suffix, value, what) in [
            ("name", &policy.name, "name"),
            ("resource", &policy.resource, "resource"),
            ("role", &policy.role, "role"),
        ] {
            if value.is_empty() {
                report.error(field(suffix), "", format!("IAM policy {what} is required"));
            }
        }
        if policy.members.is_empty() {
            report.error(
                field("members"),
                "",
                "IAM policy must have at least one member",
            );
        }
        for member in &policy.members {
            if !MEMBER_PREFIXES.iter().any(|prefix| member.starts_with(prefix)) {
                report.error(field("members"), member, "Invalid member format");
            }
        }
    }
}

fn security_groups(groups: &[SecurityGroup], report: &mut ValidationReport) {
    for (i, group) in groups.iter().enumerate() {
        let field = format!("security.security_groups[{i}]");

        if group.name.is_empty() {
            report.error(
                format!("{field}.name"),
                "",
                "Security group name is required",
            );
        }
        if group.vpc.is_empty() {
            report.error(format!("{field}.vpc"), "", "Security group VPC is required");
        }

        for (j, rule) in group.rules.iter().enumerate() {
            let field = format!("{field}.rules[{j}]");

            if !matches!(rule.kind.as_str(), "ingress" | "egress") {
                report.error(
                    format!("{field}.type"),
                    &rule.kind,
                    "Rule type must be 'ingress' or 'egress'",
                );
            }
            if rule.from_port > rule.to_port {
                report.error(&field, "", "FromPort cannot be greater than ToPort");
            }
            for block in &rule.cidr_blocks {
                if cidr(block).is_none() {
                    report.error(format!("{field}.cidr_blocks"), block, "Invalid CIDR format");
                }
            }
        }
    }
}

fn secret_management(secrets: &SecretManagement, report: &mut ValidationReport) {
    if secrets.provider.is_empty() {
        return;
    }

    if !SECRET_PROVIDERS.contains(&secrets.provider.as_str()) {
        report.error(
            "security.secret_management.provider",
            &secrets.provider,
            "Invalid secret management provider",
        );
    }
    if secrets.auto_rotation && secrets.rotation_days <= 0 {
        report.error(
            "security.secret_management.rotation_days",
            secrets.rotation_days,
            "Rotation days must be positive when auto-rotation is enabled",
        );
    }
}

fn audit_logging(audit: &AuditLogging, report: &mut ValidationReport) {
    if !audit.enabled {
        return;
    }

    if !audit.log_type.is_empty() && !AUDIT_LOG_TYPES.contains(&audit.log_type.as_str()) {
        report.error(
            "security.audit_logging.log_type",
            &audit.log_type,
            "Invalid audit log type",
        );
    }
    if !(0..=3650).contains(&audit.retention_days) {
        report.warning(
            "security.audit_logging.retention_days",
            audit.retention_days,
            "Retention days must be between 0 and 3650",
        );
    }
}

fn data_protection(protection: &DataProtection, report: &mut ValidationReport) {
    if !protection.enabled {
        return;
    }

    if !protection.classification_level.is_empty()
        && !CLASSIFICATIONS.contains(&protection.classification_level.as_str())
    {
        report.error(
            "security.data_protection.classification_level",
            &protection.classification_level,
            "Invalid classification level",
        );
    }
    if protection.backup_enabled && protection.backup_retention_days <= 0 {
        report.error(
            "security.data_protection.backup_retention_days",
            protection.backup_retention_days,
            "Backup retention days must be positive",
        );
    }
}

fn access_control(access: &AccessControl, report: &mut ValidationReport) {
    if !access.enabled {
        return;
    }

    if !(0..=1440).contains(&access.session_timeout_minutes) {
        report.error(
            "security.access_control.session_timeout_minutes",
            access.session_timeout_minutes,
            "Session timeout must be between 0 and 1440 minutes",
        );
    }
    if !(0..=12).contains(&access.max_session_duration_hours) {
        report.error(
            "security.access_control.max_session_duration_hours",
            access.max_session_duration_hours,
            "Max session duration must be between 0 and 12 hours",
        );
    }
    for (field, list) in [
        ("security.access_control.ip_whitelist", &access.ip_whitelist),
        ("security.access_control.ip_blacklist", &access.ip_blacklist),
    ] {
        for address in list {
            if !ip_or_cidr(address) {
                report.error(field, address, "Invalid IP or CIDR format");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::SecurityGroupRule;
    use crate::validator::test::fields;
    use pretty_assertions::assert_eq;

    #[test]
    fn authentication_types() {
        let mut report = ValidationReport::default();
        authentication(
            &AuthConfig {
                kind: "service_account".into(),
                service_account_email: "deployer@acme".into(),
                impersonate_email: "ops@acme.dev".into(),
                ..Default::default()
            },
            &mut report,
        );
        authentication(
            &AuthConfig {
                kind: "kerberos".into(),
                ..Default::default()
            },
            &mut report,
        );
        assert_eq!(
            fields(&report),
            [
                "authentication.service_account_email",
                "authentication.type"
            ]
        );
    }

    #[test]
    fn oidc_requires_its_fields_when_enabled() {
        let mut auth = AuthConfig {
            kind: "oidc".into(),
            ..Default::default()
        };
        let mut report = ValidationReport::default();
        authentication(&auth, &mut report);
        assert!(report.is_empty());

        auth.oidc = OidcConfig {
            enabled: true,
            issuer: "token.actions".into(),
            workload_identity_pool: "pools/ci".into(),
            ..Default::default()
        };
        authentication(&auth, &mut report);
        assert_eq!(
            fields(&report),
            [
                "authentication.oidc.provider",
                "authentication.oidc.issuer",
                "authentication.oidc.client_id",
                "authentication.oidc.workload_identity_pool"
            ]
        );
    }

    #[test]
    fn posture() {
        let security = SecurityConfig {
            enabled: true,
            tls_min_version: "1.4".into(),
            firewall_rules: vec![FirewallRule {
                name: "allow-ssh".into(),
                direction: "INGRESS".into(),
                priority: 1000,
                action: "allow".into(),
                source_ranges: vec!["35.235.240.0/20".into(), "everywhere".into()],
                ..Default::default()
            }],
            iam_policies: vec![IamPolicy {
                name: "viewers".into(),
                resource: "projects/acme".into(),
                role: "roles/viewer".into(),
                members: vec!["user:ops@acme.dev".into(), "ops@acme.dev".into()],
                ..Default::default()
            }],
            security_groups: vec![SecurityGroup {
                name: "web".into(),
                vpc: "main".into(),
                rules: vec![SecurityGroupRule {
                    kind: "ingress".into(),
                    from_port: 443,
                    to_port: 80,
                    cidr_blocks: vec!["0.0.0.0/0".into()],
                    ..Default::default()
                }],
                ..Default::default()
            }],
            access_control: AccessControl {
                enabled: true,
                ip_whitelist: vec!["10.0.0.1".into(), "10.0.0.0/8".into(), "ten".into()],
                ..Default::default()
            },
            ..Default::default()
        };

        let mut report = ValidationReport::default();
        super::security(&security, &mut report);
        assert_eq!(
            fields(&report),
            [
                "security.tls_min_version",
                "security.firewall_rules[0].source_ranges",
                "security.iam_policies[0].members",
                "security.security_groups[0].rules[0]",
                "security.access_control.ip_whitelist"
            ]
        );
    }

    #[test]
    fn disabled_security_is_not_checked() {
        let mut report = ValidationReport::default();
        super::security(
            &SecurityConfig {
                tls_min_version: "0.9".into(),
                ..Default::default()
            },
            &mut report,
        );
        assert!(report.is_empty());
    }
}
