//! section types of the configuration document
//!
//! All sections default every field, so partial documents load. Named collections accept a
//! list of entries or a map keyed by name (the shape labeled blocks produce).
use super::named;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

type Strings = IndexMap<String, String>;
type Values = IndexMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformConfig {
    pub version: String,
    pub working_dir: String,
    pub plan_file: String,
    pub state_file: String,
    pub plugin_dir: String,
    pub parallelism: i64,
    pub lock_timeout: String,
    pub backend_config: Strings,
    pub required_providers: Strings,
    pub extra_args: Vec<String>,
    pub auto_init: bool,
    pub auto_plan: bool,
    pub auto_approve: bool,
    pub color: bool,
    pub input: bool,
    pub refresh: bool,
    pub upgrade: bool,
    pub reconfigure: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerragruntConfig {
    pub version: String,
    pub config_file: String,
    pub download_dir: String,
    pub iam_role: String,
    pub terraform_binary: String,
    pub non_interactive: bool,
    pub auto_retry: bool,
    pub max_retries: i64,
    pub sleep_interval: i64,
    pub ignore_dependencies: bool,
    pub include_external_dependencies: bool,
    pub parallelism: i64,
    pub prevent_destroy: bool,
    pub locals: Values,
    #[serde(alias = "dependency", deserialize_with = "named::list")]
    pub dependencies: Vec<Dependency>,
    #[serde(alias = "hook", deserialize_with = "named::list")]
    pub hooks: Vec<Hook>,
    pub retryable_errors: Vec<String>,
    pub include_dir: String,
    pub extra_args: IndexMap<String, Vec<String>>,
    #[serde(alias = "generate", deserialize_with = "named::list")]
    pub generate_blocks: Vec<GenerateBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dependency {
    pub name: String,
    pub path: String,
    pub config_path: String,
    pub outputs: Vec<String>,
    pub mock_outputs: Values,
    pub skip: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hook {
    pub name: String,
    pub commands: Vec<String>,
    pub execute_on: String,
    pub run_on: Vec<String>,
    pub working_dir: String,
    pub env: Strings,
    pub error_message: String,
    pub suppress: bool,
}

/// File generated next to the module before running terraform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateBlock {
    pub name: String,
    pub path: String,
    pub if_exists: String,
    pub contents: String,
    pub comment_prefix: String,
    pub disable_signature: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub bucket: String,
    pub prefix: String,
    pub project: String,
    pub region: String,
    pub encryption: bool,
    pub kms_key_id: String,
    pub lock_table: String,
    pub extra: Values,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Provider {
    pub source: String,
    pub version: String,
    pub alias: String,
    pub region: String,
    pub project: String,
    pub zone: String,
    pub credentials: String,
    pub access_token: String,
    pub impersonate_service_account: String,
    pub scopes: Vec<String>,
    pub user_project_override: bool,
    pub billing_project: String,
    pub default_labels: Strings,
    pub configuration: Values,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    pub name: String,
    pub source: String,
    pub version: String,
    pub path: String,
    pub enabled: bool,
    pub depends_on: Vec<String>,
    pub count: i64,
    pub for_each: Values,
    pub providers: Strings,
    pub variables: Values,
    pub outputs: Vec<String>,
    pub tags: Strings,
    pub condition: String,
    pub error_message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub value: Value,
    pub description: String,
    pub sensitive: bool,
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub service_account_key: String,
    pub service_account_email: String,
    pub impersonate_email: String,
    pub access_token: String,
    pub refresh_token: String,
    pub client_id: String,
    pub client_secret: String,
    pub token_uri: String,
    pub auth_uri: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub oidc: OidcConfig,
    pub metadata: Strings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OidcConfig {
    pub enabled: bool,
    pub provider: String,
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    pub audience: String,
    pub redirect_uri: String,
    pub response_type: String,
    pub grant_type: String,
    pub scopes: Vec<String>,
    pub workload_identity_pool: String,
    pub workload_identity_provider: String,
    pub service_account: String,
    pub claims: Strings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub provider: String,
    pub project_id: String,
    pub metrics_enabled: bool,
    pub logging_enabled: bool,
    pub tracing_enabled: bool,
    pub alerting_enabled: bool,
    pub dashboard_enabled: bool,
    pub metrics_retention_days: i64,
    pub logs_retention_days: i64,
    pub traces_retention_days: i64,
    pub sampling_rate: f64,
    #[serde(alias = "alert_channel", deserialize_with = "named::list")]
    pub alert_channels: Vec<AlertChannel>,
    pub labels: Strings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertChannel {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub enabled: bool,
    pub config: Values,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub enabled: bool,
    pub encryption_enabled: bool,
    pub kms_key_id: String,
    pub tls_enabled: bool,
    pub tls_min_version: String,
    pub mutual_tls_enabled: bool,
    pub certificate_path: String,
    pub private_key_path: String,
    pub ca_certificate_path: String,
    #[serde(alias = "iam_policy", deserialize_with = "named::list")]
    pub iam_policies: Vec<IamPolicy>,
    #[serde(alias = "firewall_rule", deserialize_with = "named::list")]
    pub firewall_rules: Vec<FirewallRule>,
    #[serde(alias = "security_group", deserialize_with = "named::list")]
    pub security_groups: Vec<SecurityGroup>,
    pub compliance_standards: Vec<String>,
    pub vulnerability_scan: bool,
    pub secret_management: SecretManagement,
    pub audit_logging: AuditLogging,
    pub data_protection: DataProtection,
    pub access_control: AccessControl,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IamPolicy {
    pub name: String,
    pub resource: String,
    pub members: Vec<String>,
    pub role: String,
    pub condition: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallRule {
    pub name: String,
    pub direction: String,
    pub priority: i64,
    pub source_ranges: Vec<String>,
    pub destination_ranges: Vec<String>,
    pub source_tags: Vec<String>,
    pub target_tags: Vec<String>,
    pub protocol: String,
    pub ports: Vec<String>,
    pub action: String,
    pub disabled: bool,
    pub log_config: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityGroup {
    pub name: String,
    pub description: String,
    pub vpc: String,
    #[serde(alias = "rule", deserialize_with = "named::one_or_many")]
    pub rules: Vec<SecurityGroupRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityGroupRule {
    #[serde(rename = "type")]
    pub kind: String,
    pub from_port: i64,
    pub to_port: i64,
    pub protocol: String,
    pub cidr_blocks: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretManagement {
    pub provider: String,
    pub project_id: String,
    pub auto_rotation: bool,
    pub rotation_days: i64,
    pub encryption_key: String,
    pub labels: Strings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditLogging {
    pub enabled: bool,
    pub log_type: String,
    pub data_access: bool,
    pub admin_activity: bool,
    pub system_event: bool,
    pub policy_denied: bool,
    pub retention_days: i64,
    pub destination: String,
    pub filters: Vec<String>,
    pub exempt_members: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataProtection {
    pub enabled: bool,
    pub classification_level: String,
    pub dlp_enabled: bool,
    pub encryption_at_rest: bool,
    pub encryption_in_transit: bool,
    pub backup_enabled: bool,
    pub backup_retention_days: i64,
    pub data_residency: String,
    pub retention_policy: String,
    pub labels: Strings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessControl {
    pub enabled: bool,
    pub mfa_required: bool,
    pub session_timeout_minutes: i64,
    pub ip_whitelist: Vec<String>,
    pub ip_blacklist: Vec<String>,
    pub require_approval: bool,
    pub approval_groups: Vec<String>,
    pub privileged_access_mode: String,
    pub just_in_time_access: bool,
    pub max_session_duration_hours: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub vpc_name: String,
    pub vpc_network: String,
    pub subnet_mode: String,
    pub routing_mode: String,
    pub auto_create_subnets: bool,
    pub delete_default_routes: bool,
    pub mtu: i64,
    pub enable_flow_logs: bool,
    pub private_google_access: bool,
    #[serde(alias = "subnet", deserialize_with = "named::list")]
    pub subnets: Vec<Subnet>,
    #[serde(alias = "route", deserialize_with = "named::list")]
    pub routes: Vec<Route>,
    #[serde(alias = "peering", deserialize_with = "named::list")]
    pub peerings: Vec<Peering>,
    #[serde(alias = "nat_gateway", deserialize_with = "named::list")]
    pub nat_gateways: Vec<NatGateway>,
    #[serde(alias = "load_balancer", deserialize_with = "named::list")]
    pub load_balancers: Vec<LoadBalancer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subnet {
    pub name: String,
    pub cidr: String,
    pub region: String,
    pub private_google_access: bool,
    pub flow_logs: bool,
    #[serde(alias = "secondary_range", deserialize_with = "named::list")]
    pub secondary_ranges: Vec<SecondaryRange>,
    pub purpose: String,
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondaryRange {
    pub name: String,
    pub cidr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Route {
    pub name: String,
    pub dest_range: String,
    pub next_hop_gateway: String,
    pub next_hop_instance: String,
    pub next_hop_ip: String,
    pub next_hop_vpn: String,
    pub priority: i64,
    pub tags: Vec<String>,
}

impl Route {
    /// Next hop fields that carry a value
    pub fn next_hops(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("next_hop_gateway", self.next_hop_gateway.as_str()),
            ("next_hop_instance", self.next_hop_instance.as_str()),
            ("next_hop_ip", self.next_hop_ip.as_str()),
            ("next_hop_vpn", self.next_hop_vpn.as_str()),
        ]
        .into_iter()
        .filter(|(_, hop)| !hop.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Peering {
    pub name: String,
    pub peer_network: String,
    pub auto_create_routes: bool,
    pub export_custom_routes: bool,
    pub import_custom_routes: bool,
    pub export_subnet_routes_with_public_ip: bool,
    pub import_subnet_routes_with_public_ip: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NatGateway {
    pub name: String,
    pub region: String,
    pub router: String,
    pub ip_allocation_option: String,
    pub source_subnetwork_ip_ranges: String,
    pub subnetworks: Vec<String>,
    pub nat_ips: Vec<String>,
    pub min_ports_per_vm: i64,
    pub log_config: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadBalancer {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub scheme: String,
    pub ip_address: String,
    pub ip_protocol: String,
    pub port: i64,
    pub backend_service: String,
    pub health_check: String,
    pub ssl_certificates: Vec<String>,
    pub ssl_policy: String,
    pub cdn_enabled: bool,
    pub log_config: bool,
    pub labels: Strings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub enable_caching: bool,
    pub enable_parallel_exec: bool,
    pub enable_auto_retry: bool,
    pub enable_dry_run: bool,
    pub enable_debug_mode: bool,
    pub enable_metrics: bool,
    pub enable_tracing: bool,
    pub enable_profiling: bool,
    pub enable_validation: bool,
    pub enable_optimization: bool,
    pub enable_compression: bool,
    pub enable_encryption: bool,
    pub enable_backup: bool,
    pub enable_recovery: bool,
    pub enable_monitoring: bool,
    pub enable_alerting: bool,
    pub enable_reporting: bool,
    pub enable_analytics: bool,
    pub custom_flags: IndexMap<String, bool>,
}

impl FeatureFlags {
    /// Looks up a flag by its short name (`caching`, `dry_run`, ...), then in `custom_flags`
    pub fn is_enabled(&self, feature: &str) -> bool {
        match feature {
            "caching" => self.enable_caching,
            "parallel_exec" => self.enable_parallel_exec,
            "auto_retry" => self.enable_auto_retry,
            "dry_run" => self.enable_dry_run,
            "debug" => self.enable_debug_mode,
            "metrics" => self.enable_metrics,
            "tracing" => self.enable_tracing,
            "profiling" => self.enable_profiling,
            "validation" => self.enable_validation,
            "optimization" => self.enable_optimization,
            "compression" => self.enable_compression,
            "encryption" => self.enable_encryption,
            "backup" => self.enable_backup,
            "recovery" => self.enable_recovery,
            "monitoring" => self.enable_monitoring,
            "alerting" => self.enable_alerting,
            "reporting" => self.enable_reporting,
            "analytics" => self.enable_analytics,
            custom => self.custom_flags.get(custom).copied().unwrap_or(false),
        }
    }
}
