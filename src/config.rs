//! Per-session configuration.
//!
//! Configuration is an explicit value owned by each [`Session`](crate::Session)
//! and passed into the refresh machinery — never ambient global state read
//! deep inside helpers.

/// How a hidden ancestor affects visibility-bound descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisibilityPropagation {
    /// Hidden ancestors force-hide nested visibility-bound descendants.
    #[default]
    Auto,
    /// Only elements carrying [`Config::propagation_class`] participate.
    Manual,
    /// No propagation; every element's own state stands alone.
    None,
}

/// Configuration for a document session.
#[derive(Debug, Clone)]
pub struct Config {
    /// The scope symbol inside binding text. Any length; an empty string
    /// disables scope splitting entirely.
    pub scope_symbol: String,
    /// Visibility propagation mode.
    pub visibility_propagation: VisibilityPropagation,
    /// Opt-in class for [`VisibilityPropagation::Manual`].
    pub propagation_class: String,
    /// Diagnostic mode: expression failures are reported at warn level with
    /// expression text and element context.
    pub diagnostics: bool,
    /// Schedule a refresh whenever a template store mutation changes it.
    pub refresh_on_template_change: bool,
    /// Invoke the host's data-refresh collaborator after every refresh pass.
    pub refresh_data_on_change: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scope_symbol: "⇢".to_owned(),
            visibility_propagation: VisibilityPropagation::Auto,
            propagation_class: "visibility-propagation".to_owned(),
            diagnostics: false,
            refresh_on_template_change: true,
            refresh_data_on_change: false,
        }
    }
}

impl Config {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scope symbol (builder).
    pub fn with_scope_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.scope_symbol = symbol.into();
        self
    }

    /// Set the visibility propagation mode (builder).
    pub fn with_visibility_propagation(mut self, mode: VisibilityPropagation) -> Self {
        self.visibility_propagation = mode;
        self
    }

    /// Set the manual-propagation opt-in class (builder).
    pub fn with_propagation_class(mut self, class: impl Into<String>) -> Self {
        self.propagation_class = class.into();
        self
    }

    /// Enable or disable diagnostic reporting (builder).
    pub fn with_diagnostics(mut self, diagnostics: bool) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Control refresh-on-template-change (builder).
    pub fn with_refresh_on_template_change(mut self, refresh: bool) -> Self {
        self.refresh_on_template_change = refresh;
        self
    }

    /// Control the post-pass data-refresh hook (builder).
    pub fn with_refresh_data_on_change(mut self, refresh: bool) -> Self {
        self.refresh_data_on_change = refresh;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.scope_symbol, "⇢");
        assert_eq!(config.visibility_propagation, VisibilityPropagation::Auto);
        assert!(!config.diagnostics);
        assert!(config.refresh_on_template_change);
        assert!(!config.refresh_data_on_change);
    }

    #[test]
    fn builder() {
        let config = Config::new()
            .with_scope_symbol("->")
            .with_visibility_propagation(VisibilityPropagation::Manual)
            .with_propagation_class("prop")
            .with_diagnostics(true)
            .with_refresh_on_template_change(false)
            .with_refresh_data_on_change(true);
        assert_eq!(config.scope_symbol, "->");
        assert_eq!(config.visibility_propagation, VisibilityPropagation::Manual);
        assert_eq!(config.propagation_class, "prop");
        assert!(config.diagnostics);
        assert!(!config.refresh_on_template_change);
        assert!(config.refresh_data_on_change);
    }
}
