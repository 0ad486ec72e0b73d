#![cfg(all(feature = "criterion-bench", feature = "memory-store"))]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use futures::executor::block_on;
use http::Method;
use rs_warden::{
    Access, MemoryStore, MenuNode, MenuTree, PermissionMatrix, RoleName, RoleSet, RouteDef,
    RoutePath,
};

fn role(name: &str) -> RoleName {
    RoleName::try_from(name).unwrap()
}

fn setup_matrix() -> (PermissionMatrix<MemoryStore>, RoutePath, RoleSet) {
    let matrix = PermissionMatrix::new(MemoryStore::new());
    let routes = vec![RouteDef::new("/roles", Method::GET).unwrap()];
    block_on(matrix.reconcile(&routes)).unwrap();

    let path = RoutePath::try_from("/roles").unwrap();
    block_on(matrix.assign_role(&path, &Method::GET, role("ops"))).unwrap();

    let caller: RoleSet = [role("ops")].into_iter().collect();
    (matrix, path, caller)
}

fn setup_caller_fanout(role_count: usize) -> (PermissionMatrix<MemoryStore>, RoutePath, RoleSet) {
    let matrix = PermissionMatrix::new(MemoryStore::new());
    let routes = vec![RouteDef::new("/roles", Method::GET).unwrap()];
    block_on(matrix.reconcile(&routes)).unwrap();

    let path = RoutePath::try_from("/roles").unwrap();
    block_on(matrix.assign_role(
        &path,
        &Method::GET,
        role(format!("role_{}", role_count - 1).as_str()),
    ))
    .unwrap();

    let caller: RoleSet = (0..role_count)
        .map(|i| role(format!("role_{i}").as_str()))
        .collect();
    (matrix, path, caller)
}

fn setup_menu_chain(depth: usize) -> (MenuTree<MemoryStore>, RoleSet) {
    let tree = MenuTree::new(MemoryStore::new()).with_max_depth(depth + 2);

    let mut parent: Option<MenuNode> = None;
    for i in 0..depth {
        let mut node = MenuNode::new(format!("node_{i}"), format!("/node/{i}"));
        if let Some(parent) = &parent {
            node = node.with_parent(parent.id.clone());
        }
        let node = block_on(tree.create(node)).unwrap();
        block_on(tree.assign_role(&node.id, role("ops"))).unwrap();
        parent = Some(node);
    }

    let caller: RoleSet = [role("ops")].into_iter().collect();
    (tree, caller)
}

fn bench_check_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_access");
    group.sample_size(30);
    group.throughput(Throughput::Elements(1));

    let (matrix, path, caller) = setup_matrix();
    group.bench_function("allow", |b| {
        b.iter(|| {
            let access =
                block_on(matrix.check_access(&path, &Method::GET, &caller)).unwrap();
            black_box(access);
        });
    });

    let stranger: RoleSet = [role("viewer")].into_iter().collect();
    group.bench_function("forbidden", |b| {
        b.iter(|| {
            let access =
                block_on(matrix.check_access(&path, &Method::GET, &stranger)).unwrap();
            assert_eq!(access, Access::Forbidden);
            black_box(access);
        });
    });

    let unknown = RoutePath::try_from("/nowhere").unwrap();
    group.bench_function("route_unknown", |b| {
        b.iter(|| {
            let access =
                block_on(matrix.check_access(&unknown, &Method::GET, &caller)).unwrap();
            assert_eq!(access, Access::RouteUnknown);
            black_box(access);
        });
    });

    group.finish();
}

fn bench_caller_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_access_caller_fanout");
    group.sample_size(30);
    group.throughput(Throughput::Elements(1));

    for role_count in [1usize, 8, 32, 128] {
        let (matrix, path, caller) = setup_caller_fanout(role_count);
        let id = BenchmarkId::from_parameter(role_count);
        group.bench_with_input(id, &role_count, |b, _| {
            b.iter(|| {
                let access =
                    block_on(matrix.check_access(&path, &Method::GET, &caller)).unwrap();
                black_box(access);
            });
        });
    }

    group.finish();
}

fn bench_menu_descent(c: &mut Criterion) {
    let mut group = c.benchmark_group("menu_descent_depth");
    group.sample_size(30);
    group.throughput(Throughput::Elements(1));

    for depth in [1usize, 4, 8, 16] {
        let (tree, caller) = setup_menu_chain(depth);
        let id = BenchmarkId::from_parameter(depth);
        group.bench_with_input(id, &depth, |b, _| {
            b.iter(|| {
                let forest = block_on(tree.build_for_roles(&caller)).unwrap();
                black_box(forest);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_check_access,
    bench_caller_fanout,
    bench_menu_descent
);
criterion_main!(benches);
