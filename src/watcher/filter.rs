//! Name filters applied to event names and walked directories.

use regex::Regex;

/// Result of a successful catch-pattern match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caught {
    /// First capture group, when the pattern has one and it participated.
    pub group: Option<String>,
}

/// Exclude and catch patterns, compiled once at startup.
///
/// Both patterns are optional: with no exclude pattern nothing is excluded,
/// with no catch pattern every name is caught.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    exclude: Option<Regex>,
    catch: Option<Regex>,
}

impl EventFilter {
    pub fn new(exclude: Option<Regex>, catch: Option<Regex>) -> Self {
        Self { exclude, catch }
    }

    /// Filter that excludes nothing and catches everything.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude.as_ref().is_some_and(|re| re.is_match(name))
    }

    /// Match `name` against the catch pattern.
    pub fn catch(&self, name: &str) -> Option<Caught> {
        let Some(re) = &self.catch else {
            return Some(Caught::default());
        };

        let captures = re.captures(name)?;
        Some(Caught {
            group: captures.get(1).map(|m| m.as_str().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let filter = EventFilter::allow_all();
        assert!(!filter.is_excluded("anything"));
        assert_eq!(filter.catch("anything"), Some(Caught::default()));
    }

    #[test]
    fn test_exclude() {
        let filter = EventFilter::new(Some(Regex::new(r"\.swp$").unwrap()), None);
        assert!(filter.is_excluded("notes.txt.swp"));
        assert!(!filter.is_excluded("notes.txt"));
    }

    #[test]
    fn test_catch_group() {
        let filter = EventFilter::new(None, Some(Regex::new(r"^report-(\d+)\.csv$").unwrap()));

        let caught = filter.catch("report-42.csv").unwrap();
        assert_eq!(caught.group.as_deref(), Some("42"));
        assert_eq!(filter.catch("summary.csv"), None);
    }

    #[test]
    fn test_catch_without_group() {
        let filter = EventFilter::new(None, Some(Regex::new(r"\.log$").unwrap()));
        assert_eq!(filter.catch("app.log"), Some(Caught { group: None }));
    }
}
