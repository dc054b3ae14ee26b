//! configuration from environment variables
//!
//! Used when there is no document to load. Every bound key `a.b` is read from
//! `TERRAGRUNT_A_B`; unset keys keep their defaults.
use crate::config::Config;
use crate::environment::EnvironmentProvider;

pub const ENV_PREFIX: &str = "TERRAGRUNT_";

enum Binding {
    Text(fn(&mut Config) -> &mut String),
    Number(fn(&mut Config) -> &mut i64),
    Flag(fn(&mut Config) -> &mut bool),
}

static BINDINGS: &[(&str, Binding)] = &[
    ("project", Binding::Text(|c| &mut c.project)),
    ("region", Binding::Text(|c| &mut c.region)),
    ("zone", Binding::Text(|c| &mut c.zone)),
    ("environment", Binding::Text(|c| &mut c.environment)),
    ("terraform.version", Binding::Text(|c| &mut c.terraform.version)),
    ("terraform.working_dir", Binding::Text(|c| &mut c.terraform.working_dir)),
    ("terraform.plugin_dir", Binding::Text(|c| &mut c.terraform.plugin_dir)),
    ("terraform.lock_timeout", Binding::Text(|c| &mut c.terraform.lock_timeout)),
    ("terraform.parallelism", Binding::Number(|c| &mut c.terraform.parallelism)),
    ("terraform.color", Binding::Flag(|c| &mut c.terraform.color)),
    ("terraform.auto_approve", Binding::Flag(|c| &mut c.terraform.auto_approve)),
    ("terragrunt.version", Binding::Text(|c| &mut c.terragrunt.version)),
    ("terragrunt.config_file", Binding::Text(|c| &mut c.terragrunt.config_file)),
    ("terragrunt.download_dir", Binding::Text(|c| &mut c.terragrunt.download_dir)),
    ("terragrunt.iam_role", Binding::Text(|c| &mut c.terragrunt.iam_role)),
    ("terragrunt.terraform_binary", Binding::Text(|c| &mut c.terragrunt.terraform_binary)),
    ("terragrunt.non_interactive", Binding::Flag(|c| &mut c.terragrunt.non_interactive)),
    ("terragrunt.auto_retry", Binding::Flag(|c| &mut c.terragrunt.auto_retry)),
    ("terragrunt.max_retries", Binding::Number(|c| &mut c.terragrunt.max_retries)),
    ("terragrunt.sleep_interval", Binding::Number(|c| &mut c.terragrunt.sleep_interval)),
    ("terragrunt.parallelism", Binding::Number(|c| &mut c.terragrunt.parallelism)),
    ("backend.type", Binding::Text(|c| &mut c.backend.kind)),
    ("backend.bucket", Binding::Text(|c| &mut c.backend.bucket)),
    ("backend.prefix", Binding::Text(|c| &mut c.backend.prefix)),
    ("backend.project", Binding::Text(|c| &mut c.backend.project)),
    ("backend.region", Binding::Text(|c| &mut c.backend.region)),
];

/// Name of the variable bound to a dotted key
///
/// `terraform.parallelism` reads `TERRAGRUNT_TERRAFORM_PARALLELISM`.
pub fn env_key(key: &str) -> String {
    format!(
        "{ENV_PREFIX}{}",
        key.replace(['.', '-'], "_").to_ascii_uppercase()
    )
}

pub fn from_environment(env: &dyn EnvironmentProvider) -> Config {
    let mut config = Config {
        project: env.get("GOOGLE_PROJECT").unwrap_or_default(),
        region: env.get("GOOGLE_REGION").unwrap_or_default(),
        zone: env.get("GOOGLE_ZONE").unwrap_or_default(),
        environment: "dev".into(),
        ..Default::default()
    };
    config.terraform.parallelism = 10;
    config.terraform.color = true;
    config.terragrunt.non_interactive = false;
    config.terragrunt.auto_retry = true;
    config.terragrunt.max_retries = 3;

    for (key, binding) in BINDINGS {
        let name = env_key(key);
        let Some(raw) = env.get(&name) else {
            continue;
        };

        match binding {
            Binding::Text(field) => *field(&mut config) = raw,
            Binding::Number(field) => match raw.trim().parse() {
                Ok(number) => *field(&mut config) = number,
                Err(_) => tracing::warn!(%name, %raw, "ignoring non-numeric value"),
            },
            Binding::Flag(field) => match parse_flag(&raw) {
                Some(flag) => *field(&mut config) = flag,
                None => tracing::warn!(%name, %raw, "ignoring non-boolean value"),
            },
        }
    }

    config
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::environment::EnvSnapshot;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = from_environment(&EnvSnapshot::default());

        assert_eq!(config.environment, "dev");
        assert_eq!(config.terraform.parallelism, 10);
        assert!(config.terraform.color);
        assert!(!config.terragrunt.non_interactive);
        assert!(config.terragrunt.auto_retry);
        assert_eq!(config.terragrunt.max_retries, 3);
    }

    #[test]
    fn prefixed_variables_override() {
        let env: EnvSnapshot = [
            ("GOOGLE_PROJECT", "from-google"),
            ("TERRAGRUNT_PROJECT", "from-prefix"),
            ("TERRAGRUNT_TERRAFORM_PARALLELISM", "4"),
            ("TERRAGRUNT_TERRAGRUNT_AUTO_RETRY", "false"),
            ("TERRAGRUNT_BACKEND_TYPE", "gcs"),
            ("TERRAGRUNT_TERRAGRUNT_MAX_RETRIES", "many"),
        ]
        .into_iter()
        .collect();

        let config = from_environment(&env);

        assert_eq!(config.project, "from-prefix");
        assert_eq!(config.terraform.parallelism, 4);
        assert!(!config.terragrunt.auto_retry);
        assert_eq!(config.backend.kind, "gcs");
        assert_eq!(config.terragrunt.max_retries, 3);
    }

    #[test]
    fn key_mapping() {
        assert_eq!(env_key("terraform.working_dir"), "TERRAGRUNT_TERRAFORM_WORKING_DIR");
        assert_eq!(env_key("a-b.c"), "TERRAGRUNT_A_B_C");
    }
}
