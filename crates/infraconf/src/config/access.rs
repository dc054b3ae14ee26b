//! dotted-path string access
//!
//! Only the keys in the accessor tables address typed fields. Every other key reads or writes
//! the `variables` bag.
use super::Config;
use crate::value::Value;

type Getter = fn(&Config) -> String;
type Setter = fn(&mut Config, String);

static GETTERS: &[(&str, Getter)] = &[
    ("project", |c: &Config| c.project.clone()),
    ("region", |c: &Config| c.region.clone()),
    ("zone", |c: &Config| c.zone.clone()),
    ("environment", |c: &Config| c.environment.clone()),
    ("terraform.version", |c: &Config| c.terraform.version.clone()),
    ("terraform.working_dir", |c: &Config| c.terraform.working_dir.clone()),
    ("terraform.plan_file", |c: &Config| c.terraform.plan_file.clone()),
    ("terraform.state_file", |c: &Config| c.terraform.state_file.clone()),
    ("terraform.plugin_dir", |c: &Config| c.terraform.plugin_dir.clone()),
    ("terraform.lock_timeout", |c: &Config| c.terraform.lock_timeout.clone()),
    ("terraform.parallelism", |c: &Config| c.terraform.parallelism.to_string()),
    ("terragrunt.version", |c: &Config| c.terragrunt.version.clone()),
    ("terragrunt.config_file", |c: &Config| c.terragrunt.config_file.clone()),
    ("terragrunt.download_dir", |c: &Config| c.terragrunt.download_dir.clone()),
    ("terragrunt.iam_role", |c: &Config| c.terragrunt.iam_role.clone()),
    ("terragrunt.terraform_binary", |c: &Config| {
        c.terragrunt.terraform_binary.clone()
    }),
    ("terragrunt.parallelism", |c: &Config| c.terragrunt.parallelism.to_string()),
    ("terragrunt.max_retries", |c: &Config| c.terragrunt.max_retries.to_string()),
    ("backend.type", |c: &Config| c.backend.kind.clone()),
    ("backend.bucket", |c: &Config| c.backend.bucket.clone()),
    ("backend.prefix", |c: &Config| c.backend.prefix.clone()),
    ("backend.project", |c: &Config| c.backend.project.clone()),
    ("backend.region", |c: &Config| c.backend.region.clone()),
    ("backend.kms_key_id", |c: &Config| c.backend.kms_key_id.clone()),
    ("backend.lock_table", |c: &Config| c.backend.lock_table.clone()),
];

static SETTERS: &[(&str, Setter)] = &[
    ("project", |c: &mut Config, v: String| c.project = v),
    ("region", |c: &mut Config, v: String| c.region = v),
    ("zone", |c: &mut Config, v: String| c.zone = v),
    ("environment", |c: &mut Config, v: String| c.environment = v),
    ("terraform.version", |c: &mut Config, v: String| c.terraform.version = v),
    ("terraform.working_dir", |c: &mut Config, v: String| c.terraform.working_dir = v),
    ("terraform.plan_file", |c: &mut Config, v: String| c.terraform.plan_file = v),
    ("terraform.state_file", |c: &mut Config, v: String| c.terraform.state_file = v),
    ("terraform.lock_timeout", |c: &mut Config, v: String| c.terraform.lock_timeout = v),
    ("terragrunt.version", |c: &mut Config, v: String| c.terragrunt.version = v),
    ("terragrunt.config_file", |c: &mut Config, v: String| c.terragrunt.config_file = v),
    ("terragrunt.iam_role", |c: &mut Config, v: String| c.terragrunt.iam_role = v),
    ("backend.type", |c: &mut Config, v: String| c.backend.kind = v),
    ("backend.bucket", |c: &mut Config, v: String| c.backend.bucket = v),
    ("backend.prefix", |c: &mut Config, v: String| c.backend.prefix = v),
];

fn getter(key: &str) -> Option<Getter> {
    GETTERS
        .iter()
        .find_map(|(name, getter)| (*name == key).then_some(*getter))
}

fn setter(key: &str) -> Option<Setter> {
    SETTERS
        .iter()
        .find_map(|(name, setter)| (*name == key).then_some(*setter))
}

impl Config {
    /// Whether `key` addresses a typed field rather than the variables bag
    pub fn is_known_key(key: &str) -> bool {
        getter(key).is_some()
    }

    /// Reads a typed field or, for any other key, the canonical text of `variables[key]`
    ///
    /// Missing keys read as an empty string.
    pub fn get_string(&self, key: &str) -> String {
        match getter(key) {
            Some(get) => get(self),
            None => self
                .variables
                .get(key)
                .map(Value::to_text)
                .unwrap_or_default(),
        }
    }

    /// Writes a typed field or, for any other key, `variables[key]`
    pub fn set_string(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match setter(key) {
            Some(set) => set(self, value),
            None => {
                self.variables.insert(key.to_owned(), Value::String(value));
            }
        }
    }
}
