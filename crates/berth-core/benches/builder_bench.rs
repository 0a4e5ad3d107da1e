use berth_core::options::OptionMap;
use berth_core::spec::{ContainerSpec, NetworkSpec, PortBindPolicy, VolumeSpec};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn opts(pairs: &[(&str, &str)]) -> OptionMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn bench_builders(c: &mut Criterion) {
    let container_opts = opts(&[
        ("name", "web"),
        ("image", "nginx:1.27"),
        ("port", "80"),
        ("hostPort", "8080"),
        ("env", "MODE=prod,REGION=eu-west-1,LOG_LEVEL=info"),
        ("cmd", "nginx,-g,daemon off;"),
    ]);
    c.bench_function("container_spec_from_options", |b| {
        b.iter(|| ContainerSpec::from_options(black_box(&container_opts), PortBindPolicy::V4Only))
    });

    let network_opts = opts(&[
        ("name", "backplane"),
        ("driver", "overlay"),
        ("internal", "y"),
        ("ipv6", "y"),
    ]);
    c.bench_function("network_spec_from_options", |b| {
        b.iter(|| NetworkSpec::from_options(black_box(&network_opts)))
    });

    let volume_opts = opts(&[
        ("name", "scratch"),
        ("labels", "team=infra,tier=scratch"),
        ("options", "type=tmpfs,device=tmpfs,o=size=256m"),
    ]);
    c.bench_function("volume_spec_from_options", |b| {
        b.iter(|| VolumeSpec::from_options(black_box(&volume_opts)))
    });
}

criterion_group!(benches, bench_builders);
criterion_main!(benches);
