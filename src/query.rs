//! Shape queries (spec §4.6): a class filter applied to the candidate
//! list rapier2d's `QueryPipeline` returns for each query shape.

/// A class filter for shape queries and `All`/`except` ignore-graph
/// sentinels (spec §4.6: "absent means `All`"). Structurally identical
/// to [`crate::class::IgnoreSpec`] but kept as its own type since it
/// answers a different question (membership, not mutual avoidance).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassFilter {
    /// Every registered class.
    All,
    /// Every registered class except the ones named here.
    AllExcept(Vec<String>),
    /// Exactly the classes named here.
    Named(Vec<String>),
}

impl Default for ClassFilter {
    fn default() -> Self {
        ClassFilter::All
    }
}

impl ClassFilter {
    pub fn named<I: IntoIterator<Item = S>, S: Into<String>>(names: I) -> Self {
        ClassFilter::Named(names.into_iter().map(Into::into).collect())
    }

    pub fn all_except<I: IntoIterator<Item = S>, S: Into<String>>(except: I) -> Self {
        ClassFilter::AllExcept(except.into_iter().map(Into::into).collect())
    }

    pub(crate) fn admits(&self, class_name: &str) -> bool {
        match self {
            ClassFilter::All => true,
            ClassFilter::AllExcept(except) => !except.iter().any(|n| n == class_name),
            ClassFilter::Named(names) => names.iter().any(|n| n == class_name),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn filter_all_admits_everything() {
        assert!(ClassFilter::All.admits("Anything"));
    }

    #[test]
    fn filter_all_except_excludes_named() {
        let filter = ClassFilter::all_except(["Player"]);
        assert!(!filter.admits("Player"));
        assert!(filter.admits("Enemy"));
    }

    #[test]
    fn filter_named_admits_only_listed() {
        let filter = ClassFilter::named(["Enemy", "Neutral"]);
        assert!(filter.admits("Enemy"));
        assert!(!filter.admits("Player"));
    }
}
