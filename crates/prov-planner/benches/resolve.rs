use criterion::{black_box, criterion_group, criterion_main, Criterion};
use prov_planner::{
    Budget, InMemoryCatalog, Planner, Profile, ProfileChangeRequest, PropertyContext, Requirement, Unit, UnitKey,
};
use prov_version::{Version, VersionRange};

const LAYERS: u64 = 30;
const VERSIONS: u64 = 5;

/// Each version of layer `n` accepts a window of versions of layer `n + 1`
fn layered_catalog(satisfiable: bool) -> InMemoryCatalog {
    let mut units = Vec::new();
    for layer in 0..LAYERS {
        for major in 1..=VERSIONS {
            let mut unit = Unit::new(format!("layer{}", layer), Version::new(major, 0, 0)).singleton();
            if layer + 1 < LAYERS {
                let range = if satisfiable || layer + 2 < LAYERS {
                    VersionRange::parse(&format!("[{}.0,{}.0)", major, major + 2)).unwrap()
                } else {
                    // No such version: the last link can never be satisfied
                    VersionRange::exact(Version::new(VERSIONS + 1, 0, 0))
                };
                unit = unit.requires(Requirement::on_unit(format!("layer{}", layer + 1), range));
            }
            units.push(unit);
        }
    }
    InMemoryCatalog::from_units(units)
}

fn request_for(catalog: &InMemoryCatalog) -> ProfileChangeRequest {
    let mut request = ProfileChangeRequest::new();
    if let Some(root) = catalog.get(&UnitKey::new("layer0", Version::new(1, 0, 0))) {
        request.add(root.clone());
    }
    request
}

fn bench_resolve(c: &mut Criterion) {
    let planner = Planner::default();
    let context = PropertyContext::new();

    let catalog = layered_catalog(true);
    let request = request_for(&catalog);
    c.bench_function("resolve_layered", |b| {
        b.iter(|| {
            black_box(planner.resolve(&Profile::new(), &catalog, &request, &context, &Budget::unlimited()).ok());
        })
    });

    let catalog = layered_catalog(false);
    let request = request_for(&catalog);
    c.bench_function("explain_layered", |b| {
        b.iter(|| {
            black_box(planner.resolve(&Profile::new(), &catalog, &request, &context, &Budget::unlimited()).err());
        })
    });
}

criterion_group!(benches, bench_resolve);
criterion_main!(benches);
