//! Product naming conventions.

/// The server product being launched.
///
/// The product name fans out into every convention the resolver relies on:
/// the `<PRODUCT>_HOME` / `<PRODUCT>_CONFIG` environment variables, the
/// `<product>.yml` settings file, and the home-relative paths of the
/// bundled node runtime and CLI entry script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    name: String,
}

impl Product {
    /// Create a product from its name, e.g. `"kibana"`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The product name as given.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Environment variable naming the home directory, e.g. `KIBANA_HOME`.
    #[must_use]
    pub fn home_env_var(&self) -> String {
        format!("{}_HOME", self.env_prefix())
    }

    /// Environment variable naming the config directory, e.g. `KIBANA_CONFIG`.
    #[must_use]
    pub fn config_env_var(&self) -> String {
        format!("{}_CONFIG", self.env_prefix())
    }

    /// Settings file name inside the config directory, e.g. `kibana.yml`.
    #[must_use]
    pub fn settings_file_name(&self) -> String {
        format!("{}.yml", self.name.to_lowercase())
    }

    fn env_prefix(&self) -> String {
        self.name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_names() {
        let product = Product::new("kibana");
        assert_eq!(product.home_env_var(), "KIBANA_HOME");
        assert_eq!(product.config_env_var(), "KIBANA_CONFIG");
    }

    #[test]
    fn test_settings_file_name_is_lowercase() {
        let product = Product::new("Kibana");
        assert_eq!(product.settings_file_name(), "kibana.yml");
    }

    #[test]
    fn test_env_prefix_sanitizes_punctuation() {
        let product = Product::new("my-server");
        assert_eq!(product.home_env_var(), "MY_SERVER_HOME");
    }
}
