use super::Config;

impl Config {
    /// Folds `other` into `self` by replacing blocks, not by merging deeply
    ///
    /// - scalars: a non-empty value in `other` wins
    /// - `terraform`, `terragrunt` and `backend` are replaced wholesale when `other` sets their
    ///   `version` (resp. `type`)
    /// - `providers`, `variables` and `tags` are unioned, `other` wins on collision
    /// - `modules` are appended
    pub fn merge(&mut self, other: &Config) {
        tracing::debug!(
            modules = other.modules.len(),
            providers = other.providers.len(),
            "merging config"
        );

        for (mine, theirs) in [
            (&mut self.project, &other.project),
            (&mut self.region, &other.region),
            (&mut self.zone, &other.zone),
            (&mut self.environment, &other.environment),
            (&mut self.terraform_version, &other.terraform_version),
            (&mut self.terragrunt_version, &other.terragrunt_version),
        ] {
            if !theirs.is_empty() {
                mine.clone_from(theirs);
            }
        }

        if !other.terraform.version.is_empty() {
            self.terraform = other.terraform.clone();
        }
        if !other.terragrunt.version.is_empty() {
            self.terragrunt = other.terragrunt.clone();
        }
        if !other.backend.kind.is_empty() {
            self.backend = other.backend.clone();
        }

        self.providers.extend(
            other
                .providers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        self.variables.extend(
            other
                .variables
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        self.tags
            .extend(other.tags.iter().map(|(k, v)| (k.clone(), v.clone())));

        self.modules.extend(other.modules.iter().cloned());
    }
}
