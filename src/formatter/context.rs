//! Process-wide source details stamped onto every logstash document.
//!
//! The host name and tag list are resolved once per process and are
//! read-only afterwards. Formatters receive them by value so tests can
//! inject their own.

use std::{env, fs, sync::Arc};

use once_cell::sync::OnceCell;

/// Environment variable holding a comma-separated tag list.
pub const TAGS_ENV_VAR: &str = "FEMTOSTASH_TAGS";

const FALLBACK_HOST: &str = "localhost";

static PROCESS_CONTEXT: OnceCell<SourceContext> = OnceCell::new();

/// Host name and static tags describing where records come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceContext {
    host: Arc<str>,
    tags: Arc<[String]>,
}

impl SourceContext {
    /// Build a context from explicit values. Empty tags are discarded.
    pub fn new<I, S>(host: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: Vec<String> = tags
            .into_iter()
            .map(Into::into)
            .filter(|tag: &String| !tag.is_empty())
            .collect();
        Self {
            host: Arc::from(host.into()),
            tags: Arc::from(tags),
        }
    }

    /// Resolve the context from the environment.
    pub fn detect() -> Self {
        let tags = env::var(TAGS_ENV_VAR).unwrap_or_default();
        Self::new(detect_host_name(), parse_tags(&tags))
    }

    /// The process-wide context, detected on first use.
    pub fn global() -> &'static SourceContext {
        PROCESS_CONTEXT.get_or_init(Self::detect)
    }

    /// Install the process-wide context.
    ///
    /// Returns the rejected value if the context was already initialised.
    pub fn install(context: SourceContext) -> Result<(), SourceContext> {
        PROCESS_CONTEXT.set(context)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Split a comma-separated tag list, trimming whitespace.
pub(crate) fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

fn detect_host_name() -> String {
    env::var("HOSTNAME")
        .ok()
        .or_else(|| fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_HOST.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("foo,bar", &["foo", "bar"])]
    #[case(" foo , ,bar,", &["foo", "bar"])]
    #[case("", &[])]
    fn parses_tag_lists(#[case] raw: &str, #[case] expected: &[&str]) {
        assert_eq!(parse_tags(raw), expected);
    }

    #[rstest]
    fn new_discards_empty_tags() {
        let context = SourceContext::new("box", ["", "a"]);
        assert_eq!(context.host(), "box");
        assert_eq!(context.tags(), ["a".to_owned()]);
    }

    #[rstest]
    fn detect_always_yields_a_host() {
        assert!(!SourceContext::detect().host().is_empty());
    }

    #[rstest]
    fn global_is_stable() {
        let first = SourceContext::global();
        let second = SourceContext::global();
        assert!(std::ptr::eq(first, second));
        assert!(SourceContext::install(SourceContext::new("late", ["x"])).is_err());
    }
}
