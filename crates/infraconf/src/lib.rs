//! # infraconf - infrastructure configuration resolution
//!
//! Turns a configuration document into a fully resolved, validated [Config]: no `${...}`
//! templates and no `secret:` references left.
//!
//! ## Introduction for developers
//!
//! A config moves through three stages.
//!
//! ### Loading
//!
//! see [Loader::load_config]
//!
//! The file extension selects a [loader::DocumentFormat]: JSON, YAML or HCL. HCL documents use
//! labeled blocks for named collections:
//!
//! ```hcl
//! project = "acme-prod"
//! region  = "us-east1"
//!
//! module "vpc" {
//!   source = "terraform-google-modules/network/google"
//!   tags   = { team = "platform" }
//! }
//!
//! backend {
//!   type   = "gcs"
//!   bucket = "${project}-state"
//! }
//! ```
//!
//! Without a known extension the config is built from `TERRAGRUNT_*` environment variables and
//! defaults instead.
//!
//! ### Resolution
//!
//! see [EnvResolver::resolve]
//!
//! Every string field is scanned for `${...}` spans. A span holds an HCL expression which is
//! evaluated against the config itself (`project`, `region`, `var.name`, ...) and a registry of
//! functions ([eval::FunctionRegistry]). Some functions reach outside: environment variables,
//! secrets, files relative to the source document, other config documents. All of these go
//! through injected providers ([EnvironmentProvider], [SecretsProvider]) and honor a
//! cancellable [Context].
//!
//! | field value                   | resolved                |
//! |-------------------------------|-------------------------|
//! | `${project}-state`            | `acme-prod-state`       |
//! | `${upper(region)}`            | `US-EAST1`              |
//! | `secret:db/password`          | the secret's value      |
//! | `${get_env("TIER", "dev")}`   | `$TIER`, else `dev`     |
//!
//! Resolution works on a copy and only replaces the shared config when every field resolved.
//!
//! ### Validation
//!
//! see [Validator::validate]
//!
//! A rule table of field formats runs first, then structural checks per section (unique names,
//! ranges, CIDR overlap between subnets, one next hop per route, ...). The outcome is a
//! [ValidationReport] of errors and warnings.
//!
pub mod cache;
pub mod config;
pub mod context;
pub mod environment;
pub mod error;
pub mod eval;
pub mod loader;
pub mod resolver;
pub mod secrets;
pub mod validator;
pub mod value;
mod visit;

pub use cache::{Clock, ManualClock, SystemClock, TtlCache};
pub use config::{Config, SharedConfig};
pub use context::{Context, Interrupted};
pub use environment::{EnvSnapshot, EnvironmentProvider};
pub use error::{Error, Result};
pub use eval::EvalContext;
pub use loader::{load_config, Loader};
pub use resolver::{EnvResolver, EnvResolverBuilder};
pub use secrets::{MemorySecrets, SecretError, SecretsProvider};
pub use validator::{Severity, ValidationIssue, ValidationReport, Validator};
pub use value::Value;
