//! Scenario tables, one module per routine family.

pub mod classify;
pub mod file_io;
pub mod matmul;
pub mod vector;

use crate::Scenario;

/// Every scenario in suite order: leaf routines first, then the routines
/// that depend on them.
#[must_use]
pub fn all() -> Vec<Scenario> {
    [
        vector::SCENARIOS,
        matmul::SCENARIOS,
        file_io::SCENARIOS,
        classify::SCENARIOS,
    ]
    .concat()
}

/// Scenarios whose id starts with `prefix`, e.g. `dot::` or `main`.
#[must_use]
pub fn matching(prefix: &str) -> Vec<Scenario> {
    all()
        .into_iter()
        .filter(|scenario| scenario.id.starts_with(prefix))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{all, matching};
    use std::collections::BTreeSet;

    #[test]
    fn scenario_ids_are_unique() {
        let scenarios = all();
        let ids = scenarios.iter().map(|scenario| scenario.id).collect::<BTreeSet<_>>();
        assert_eq!(ids.len(), scenarios.len());
    }

    #[test]
    fn prefix_filter_selects_family() {
        let dot = matching("dot::");
        assert_eq!(dot.len(), 4);
        assert!(dot.iter().all(|scenario| scenario.id.starts_with("dot::")));
        assert!(matching("nope").is_empty());
    }
}
