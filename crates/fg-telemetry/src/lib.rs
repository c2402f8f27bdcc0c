// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Observability primitives: a small metrics registry with Prometheus text
//! exposition, and correlation-id generation.
//!
//! The registry is deliberately self-contained — counters and histograms
//! behind a mutex, rendered on scrape.  Exporter integrations stay outside
//! the core.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

/// Label set rendered into the metric line, sorted for determinism.
pub type Labels = BTreeMap<String, String>;

#[derive(Debug, Default)]
struct CounterFamily {
    help: String,
    values: BTreeMap<String, u64>,
}

#[derive(Debug, Default)]
struct HistogramFamily {
    help: String,
    buckets: Vec<f64>,
    // label key → (per-bucket counts, sum, count)
    values: BTreeMap<String, (Vec<u64>, f64, u64)>,
}

/// Process-wide metrics registry.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: Mutex<BTreeMap<String, CounterFamily>>,
    histograms: Mutex<BTreeMap<String, HistogramFamily>>,
}

/// Default duration buckets (seconds).
pub const DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

impl MetricsRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a counter family (idempotent).
    pub fn declare_counter(&self, name: &str, help: &str) {
        let mut counters = self.counters.lock().expect("metrics lock");
        counters.entry(name.to_string()).or_insert_with(|| CounterFamily {
            help: help.to_string(),
            values: BTreeMap::new(),
        });
    }

    /// Declare a histogram family with duration buckets (idempotent).
    pub fn declare_histogram(&self, name: &str, help: &str) {
        let mut histograms = self.histograms.lock().expect("metrics lock");
        histograms
            .entry(name.to_string())
            .or_insert_with(|| HistogramFamily {
                help: help.to_string(),
                buckets: DURATION_BUCKETS.to_vec(),
                values: BTreeMap::new(),
            });
    }

    /// Increment a counter by 1.
    pub fn inc(&self, name: &str, labels: &Labels) {
        self.add(name, labels, 1);
    }

    /// Increment a counter by `delta`.
    pub fn add(&self, name: &str, labels: &Labels, delta: u64) {
        let mut counters = self.counters.lock().expect("metrics lock");
        let family = counters.entry(name.to_string()).or_default();
        *family.values.entry(render_labels(labels)).or_insert(0) += delta;
    }

    /// Observe a duration in a histogram.
    pub fn observe(&self, name: &str, labels: &Labels, value: Duration) {
        let secs = value.as_secs_f64();
        let mut histograms = self.histograms.lock().expect("metrics lock");
        let family = histograms.entry(name.to_string()).or_insert_with(|| {
            HistogramFamily {
                help: String::new(),
                buckets: DURATION_BUCKETS.to_vec(),
                values: BTreeMap::new(),
            }
        });
        let bucket_count = family.buckets.len();
        let entry = family
            .values
            .entry(render_labels(labels))
            .or_insert_with(|| (vec![0; bucket_count], 0.0, 0));
        for (i, bound) in family.buckets.iter().enumerate() {
            if secs <= *bound {
                entry.0[i] += 1;
            }
        }
        entry.1 += secs;
        entry.2 += 1;
    }

    /// Current value of a counter (tests, readiness checks).
    pub fn counter_value(&self, name: &str, labels: &Labels) -> u64 {
        let counters = self.counters.lock().expect("metrics lock");
        counters
            .get(name)
            .and_then(|f| f.values.get(&render_labels(labels)))
            .copied()
            .unwrap_or(0)
    }

    /// Render everything in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();

        let counters = self.counters.lock().expect("metrics lock");
        for (name, family) in counters.iter() {
            if !family.help.is_empty() {
                out.push_str(&format!("# HELP {name} {}\n", family.help));
            }
            out.push_str(&format!("# TYPE {name} counter\n"));
            for (labels, value) in &family.values {
                out.push_str(&format!("{name}{labels} {value}\n"));
            }
        }
        drop(counters);

        let histograms = self.histograms.lock().expect("metrics lock");
        for (name, family) in histograms.iter() {
            if !family.help.is_empty() {
                out.push_str(&format!("# HELP {name} {}\n", family.help));
            }
            out.push_str(&format!("# TYPE {name} histogram\n"));
            for (labels, (buckets, sum, count)) in &family.values {
                let base = labels.trim_end_matches('}');
                for (i, bound) in family.buckets.iter().enumerate() {
                    let le = if labels.is_empty() {
                        format!("{{le=\"{bound}\"}}")
                    } else {
                        format!("{base},le=\"{bound}\"}}")
                    };
                    out.push_str(&format!("{name}_bucket{le} {}\n", buckets[i]));
                }
                let inf = if labels.is_empty() {
                    "{le=\"+Inf\"}".to_string()
                } else {
                    format!("{base},le=\"+Inf\"}}")
                };
                out.push_str(&format!("{name}_bucket{inf} {count}\n"));
                out.push_str(&format!("{name}_sum{labels} {sum}\n"));
                out.push_str(&format!("{name}_count{labels} {count}\n"));
            }
        }
        out
    }
}

fn render_labels(labels: &Labels) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", v.replace('"', "\\\"")))
        .collect();
    format!("{{{}}}", rendered.join(","))
}

/// A fresh hex-16 correlation id.
pub fn correlation_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..16].to_string()
}

/// Convenience: build a label set from pairs.
pub fn labels<const N: usize>(pairs: [(&str, &str); N]) -> Labels {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
