//! Property-based tests over randomly generated catalogs
//!
//! These tests verify, for every successful resolution:
//! - at most one version of each singleton id is selected
//! - every non-optional requirement of every selected unit is satisfied
//! - the same inputs always produce the same operands

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;

use prov_planner::{
    Budget, Catalog, InMemoryCatalog, Plan, Planner, Profile, ProfileChangeRequest, PropertyContext, Requirement,
    ResolutionError, Unit,
};
use prov_version::{Version, VersionRange};

const IDS: usize = 4;

/// (dependency id, minimum major version, optional)
type DependencySpec = (usize, u64, bool);

/// Per id: singleton flag, then the dependencies of each version
type IdSpec = (bool, Vec<Vec<DependencySpec>>);

fn id_strategy() -> impl Strategy<Value = IdSpec> {
    let dependency = (0..IDS, 1u64..4, any::<bool>());
    let version = prop::collection::vec(dependency, 0..3);
    (any::<bool>(), prop::collection::vec(version, 1..4))
}

fn catalog_strategy() -> impl Strategy<Value = Vec<IdSpec>> {
    prop::collection::vec(id_strategy(), IDS)
}

fn build_catalog(specs: &[IdSpec]) -> InMemoryCatalog {
    let mut units = Vec::new();
    for (idx, (singleton, versions)) in specs.iter().enumerate() {
        for (v, dependencies) in versions.iter().enumerate() {
            let mut unit = Unit::new(format!("u{}", idx), Version::new(v as u64 + 1, 0, 0));
            if *singleton {
                unit = unit.singleton();
            }
            for &(dependency, min, optional) in dependencies {
                let mut requirement =
                    Requirement::on_unit(format!("u{}", dependency), VersionRange::at_least(Version::new(min, 0, 0)));
                if optional {
                    requirement = requirement.optional();
                }
                unit = unit.requires(requirement);
            }
            units.push(unit);
        }
    }
    InMemoryCatalog::from_units(units)
}

fn resolve(catalog: &InMemoryCatalog, root: &Arc<Unit>) -> Result<Plan, ResolutionError> {
    let mut request = ProfileChangeRequest::new();
    request.add(root.clone());
    let budget = Budget::unlimited().with_conflict_limit(20_000);
    Planner::default().resolve(&Profile::new(), catalog, &request, &PropertyContext::new(), &budget)
}

fn pick_root(catalog: &InMemoryCatalog, pick: usize) -> Arc<Unit> {
    let units = catalog.units();
    units[pick % units.len()].clone()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Singleton ids never appear twice in a plan
    #[test]
    fn singleton_selected_at_most_once(specs in catalog_strategy(), pick in 0usize..12) {
        let catalog = build_catalog(&specs);
        let root = pick_root(&catalog, pick);

        if let Ok(plan) = resolve(&catalog, &root) {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for unit in plan.selected() {
                *counts.entry(unit.id()).or_default() += 1;
            }
            for unit in plan.selected() {
                if unit.is_singleton() {
                    prop_assert_eq!(counts[unit.id()], 1, "{} selected more than once", unit.id());
                }
            }
        }
    }

    /// Non-optional requirements of selected units hold
    #[test]
    fn selection_is_closed(specs in catalog_strategy(), pick in 0usize..12) {
        let catalog = build_catalog(&specs);
        let root = pick_root(&catalog, pick);

        match resolve(&catalog, &root) {
            Ok(plan) => {
                prop_assert!(plan.selected().contains(&root));
                for unit in plan.selected() {
                    for requirement in unit.requirements().iter().filter(|r| !r.is_optional()) {
                        let count = plan.selected().iter().filter(|u| requirement.matches(u)).count();
                        prop_assert!(
                            requirement.is_satisfied_by(count),
                            "{} requires {} but {} units match", unit, requirement, count
                        );
                    }
                }
            }
            Err(ResolutionError::Unsatisfiable(_)) | Err(ResolutionError::Timeout { .. }) => {}
            Err(err) => prop_assert!(false, "unexpected error: {}", err),
        }
    }

    /// Identical inputs give identical outcomes
    #[test]
    fn resolution_is_deterministic(specs in catalog_strategy(), pick in 0usize..12) {
        let catalog = build_catalog(&specs);
        let root = pick_root(&catalog, pick);

        let render = |result: Result<Plan, ResolutionError>| -> Result<Vec<String>, String> {
            result
                .map(|plan| plan.operands().iter().map(|o| o.to_string()).collect())
                .map_err(|err| err.to_string())
        };
        prop_assert_eq!(render(resolve(&catalog, &root)), render(resolve(&catalog, &root)));
    }
}
