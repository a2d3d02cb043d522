//! Throughput benchmarks for the keyspace and the request path.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use flintkv::commands::{CommandHandler, Session};
use flintkv::protocol::{parse_frame, Request};
use flintkv::storage::{Condition, Databases, Expiry, Keyspace, SetOptions, DEFAULT_MAX_DB_INDEX};
use std::sync::Arc;
use std::time::Duration;

fn bench_set_get(c: &mut Criterion) {
    let keyspace = Keyspace::new();
    for i in 0..100_000 {
        keyspace.set(
            Bytes::from(format!("key:{}", i)),
            Bytes::from(format!("value:{}", i)),
        );
    }

    let mut group = c.benchmark_group("keyspace");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_plain", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(1024));
        b.iter(|| {
            keyspace.set(Bytes::from(format!("new:{}", i)), value.clone());
            i += 1;
        });
    });

    group.bench_function("set_nx_px", |b| {
        let mut i = 0u64;
        let options = SetOptions {
            expiry: Some(Expiry::Px(60_000)),
            condition: Some(Condition::IfAbsent),
            ..SetOptions::default()
        };
        b.iter(|| {
            let key = Bytes::from(format!("cond:{}", i % 10_000));
            black_box(keyspace.set_conditional(key, Bytes::from("v"), &options).ok());
            i += 1;
        });
    });

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(keyspace.get(key.as_bytes()));
            i += 1;
        });
    });

    group.bench_function("incr_single_counter", |b| {
        let key = Bytes::from("counter");
        b.iter(|| black_box(keyspace.incr_by(&key, 1).ok()));
    });

    group.finish();
}

fn bench_keys(c: &mut Criterion) {
    let keyspace = Keyspace::new();
    for i in 0..1_000 {
        keyspace.set(Bytes::from(format!("user:{}", i)), Bytes::from("u"));
        keyspace.set(Bytes::from(format!("session:{}", i)), Bytes::from("s"));
    }

    let mut group = c.benchmark_group("keys");
    group.bench_function("keys_pattern", |b| {
        b.iter(|| black_box(keyspace.keys_matching(b"user:*")));
    });
    group.bench_function("keys_all", |b| {
        b.iter(|| black_box(keyspace.keys_matching(b"*")));
    });
    group.finish();
}

/// Frame, validate and execute a request, as one connection would.
fn bench_request_path(c: &mut Criterion) {
    let handler = CommandHandler::new(Arc::new(Databases::new(DEFAULT_MAX_DB_INDEX)));
    let mut session = Session::default();

    let set = b"*5\r\n$3\r\nSET\r\n$4\r\nname\r\n$5\r\nflint\r\n$2\r\nEX\r\n$2\r\n60\r\n";
    let get = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";

    let mut group = c.benchmark_group("request_path");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(2));

    group.bench_function("set_ex_then_get", |b| {
        b.iter(|| {
            for input in [&set[..], &get[..]] {
                if let Ok(Some((args, _))) = parse_frame(input) {
                    if let Ok(request) = Request::parse(args, DEFAULT_MAX_DB_INDEX) {
                        black_box(handler.execute(&mut session, &request).serialize());
                    }
                }
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_set_get, bench_keys, bench_request_path);

criterion_main!(benches);
