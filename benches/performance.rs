//! Performance benchmarks for the tunnel harness
//!
//! Covers the hot paths that run per control line or per log row: command
//! parsing, environment expansion, log formatting and session analysis.

use clap::Parser;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tunnel_harness::{
    cli::Cli,
    command::{expand::EnvExpander, CommandParser},
    eventlog::RttRecord,
    models::Config,
    stats::{parse_rtt_samples, parse_timestamps, per_second_loss, RttSummary, SessionAnalysis},
};

/// Send/ack timestamps for `count` probes, 100 per second, every tenth lost
fn create_sample_session(count: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut sent = Vec::with_capacity(count);
    let mut recv = Vec::with_capacity(count);
    let mut rtt = Vec::with_capacity(count);

    for i in 0..count {
        let t_send = 1_700_000_000.0 + i as f64 * 0.01;
        sent.push(t_send);
        if i % 10 != 0 {
            let rtt_ms = 20.0 + (i % 37) as f64;
            recv.push(t_send + rtt_ms / 1000.0);
            rtt.push(rtt_ms);
        }
    }

    (sent, recv, rtt)
}

fn benchmark_command_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_parsing");
    let parser = CommandParser::with_default_launchers()
        .unwrap()
        .with_home(Some("/home/bench".to_string()));

    let lines = [
        ("spawn", "tunnel 1 mm-tunnelclient --server-port=9000 --ingress-log=~/in.log --egress-log=~/out.log"),
        ("python", "tunnel 1 python send_packet(seq=4)"),
        ("readline", "tunnel 12 readline"),
        ("unknown", "frobnicate the tunnels"),
    ];

    for (name, line) in lines.iter() {
        group.bench_with_input(BenchmarkId::new("parse", name), line, |b, line| {
            b.iter(|| {
                let command = parser.parse(black_box(line));
                black_box(command)
            });
        });
    }

    group.bench_function("expand_env", |b| {
        let expander = EnvExpander::new().unwrap();
        let lookup = |name: &str| match name {
            "HOME" => Some("/home/bench".to_string()),
            "PORT" => Some("9000".to_string()),
            _ => None,
        };
        b.iter(|| {
            let expanded = expander.expand(black_box("--port=$PORT --log=${HOME}/x.log --keep=$UNSET"), lookup);
            black_box(expanded)
        });
    });

    group.finish();
}

fn benchmark_config_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("config_parsing");

    group.bench_function("parse_cli_args", |b| {
        let args = [
            "tunnel-manager",
            "--auto-test",
            "--duration", "30",
            "--interval", "0.05",
            "--read-timeout-ms", "500",
        ];
        b.iter(|| {
            let cli = Cli::try_parse_from(black_box(&args)).unwrap();
            black_box(cli)
        });
    });

    group.bench_function("validate_config", |b| {
        let config = Config::default();
        b.iter(|| black_box(config.validate()));
    });

    group.finish();
}

fn benchmark_log_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_records");

    group.bench_function("rtt_to_line", |b| {
        b.iter(|| {
            let record = RttRecord::new(black_box(1_700_000_000.125), black_box(1_700_000_000.150));
            black_box(record.to_line())
        });
    });

    let (sent, _, rtt) = create_sample_session(10_000);
    let sent_text: String = sent.iter().map(|t| format!("{:.6}\n", t)).collect();
    let rtt_text: String = rtt
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{:.6} {:.6} {:.4}\n", sent[i], sent[i] + r / 1000.0, r))
        .collect();

    group.bench_function("parse_sent_log_10k", |b| {
        b.iter(|| black_box(parse_timestamps(black_box(&sent_text))));
    });
    group.bench_function("parse_rtt_log_10k", |b| {
        b.iter(|| black_box(parse_rtt_samples(black_box(&rtt_text))));
    });

    group.finish();
}

fn benchmark_session_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_analysis");

    for size in [100, 1_000, 10_000, 100_000].iter() {
        let (sent, recv, rtt) = create_sample_session(*size);

        group.bench_with_input(BenchmarkId::new("per_second_loss", size), size, |b, _| {
            b.iter(|| black_box(per_second_loss(black_box(&sent), black_box(&recv))));
        });

        group.bench_with_input(BenchmarkId::new("rtt_summary", size), size, |b, _| {
            b.iter(|| black_box(RttSummary::from_samples(black_box(&rtt))));
        });

        group.bench_with_input(BenchmarkId::new("full_analysis", size), size, |b, _| {
            b.iter(|| black_box(SessionAnalysis::from_samples(&sent, &recv, &rtt)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_command_parsing,
    benchmark_config_parsing,
    benchmark_log_records,
    benchmark_session_analysis
);

criterion_main!(benches);
