#[macro_use]
extern crate criterion;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use criterion::Criterion;

use bandvakt_core::prelude::*;

struct RampCounters(AtomicU64);

impl CounterSource for RampCounters {
    fn read(&self) -> Result<CounterSnapshot, CounterError> {
        let n = self.0.fetch_add(4096, Ordering::Relaxed);
        Ok(CounterSnapshot::new(n, n / 2, Utc::now()))
    }
}

struct EmptyScanner;

#[async_trait]
impl DeviceScanner for EmptyScanner {
    async fn scan(&self, _timeout: Duration) -> Result<DeviceScanResult, ScanError> {
        Ok(DeviceScanResult::default())
    }
}

fn bench_tick(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let mut group = c.benchmark_group("sampler_tick");

    for window_size in [10, 100, 1000] {
        group.bench_function(format!("window_{}", window_size), |b| {
            let settings = SamplerSettings {
                window_size,
                ..SamplerSettings::default()
            };
            let start = DateTime::<Utc>::UNIX_EPOCH;
            let mut sampler = TrafficSampler::new(
                settings,
                Arc::new(RampCounters(AtomicU64::new(0))),
                Arc::new(EmptyScanner),
                Arc::new(NullSink),
                start,
            )
            .unwrap();
            let mut secs = 0;
            b.iter(|| {
                secs += 1;
                runtime
                    .block_on(sampler.tick(start + TimeDelta::seconds(secs)))
                    .unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
