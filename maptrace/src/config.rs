//! Resolver configuration

/// Object name printed when neither the registry nor the loader knows a frame
pub const DEFAULT_UNKNOWN_OBJECT: &str = "<unknown>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Name suffixes of objects whose frames end a backtrace, such as the
    /// library doing the capturing. Everything from the first matching frame
    /// onward is left out.
    pub ignored_objects: Vec<String>,
    pub unknown_object: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { ignored_objects: Vec::new(), unknown_object: DEFAULT_UNKNOWN_OBJECT.to_string() }
    }
}

impl ResolverConfig {
    #[must_use]
    pub fn ignore(mut self, suffix: impl Into<String>) -> Self {
        self.ignored_objects.push(suffix.into());
        self
    }
}
