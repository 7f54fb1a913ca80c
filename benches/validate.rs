use criterion::{black_box, criterion_group, criterion_main, Criterion};
use field_guardian::{user_rules, RuleSet, RuleSetConfig, User, ValidationOptions};

fn bench_validate(c: &mut Criterion) {
    let rules = user_rules().expect("reference rules build");
    let invalid = User::new("", -5);
    let valid = User::new("Anna Beispiel", 30);

    c.bench_function("validate_invalid_user", |b| {
        b.iter(|| rules.validate(black_box(&invalid)))
    });
    c.bench_function("validate_valid_user", |b| {
        b.iter(|| rules.validate(black_box(&valid)))
    });

    let configured: RuleSet<User> = RuleSetConfig::default().build().expect("default config builds");
    c.bench_function("validate_configured_rules", |b| {
        b.iter(|| configured.validate(black_box(&invalid)))
    });
}

fn bench_validate_all(c: &mut Criterion) {
    let rules = user_rules().expect("reference rules build");
    let users: Vec<User> = (0..1_000)
        .map(|i| User::new("x".repeat(i % 60), (i as i32 % 150) - 10))
        .collect();

    c.bench_function("validate_all_sequential", |b| {
        b.iter(|| rules.validate_all(black_box(&users), &ValidationOptions { parallel: false }))
    });
    c.bench_function("validate_all_parallel", |b| {
        b.iter(|| rules.validate_all(black_box(&users), &ValidationOptions::default()))
    });
}

criterion_group!(benches, bench_validate, bench_validate_all);
criterion_main!(benches);
