//! Load generation against a seqbench write endpoint.

use std::time::{Duration, Instant};

use comfy_table::{presets::UTF8_FULL, Table};
use futures::future::join_all;
use serde::Deserialize;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WriteResponse {
    process_duration_ms: f64,
}

/// Aggregate results of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Server-reported `processDurationMs` of each successful write.
    pub durations_ms: Vec<f64>,
    pub elapsed: Duration,
}

impl LoadReport {
    pub fn avg_ms(&self) -> Option<f64> {
        if self.durations_ms.is_empty() {
            return None;
        }
        Some(self.durations_ms.iter().sum::<f64>() / self.durations_ms.len() as f64)
    }

    pub fn max_ms(&self) -> Option<f64> {
        self.durations_ms.iter().copied().reduce(f64::max)
    }

    pub fn requests_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.completed as f64 / secs
    }

    pub fn render(&self) -> String {
        let fmt_ms = |v: Option<f64>| v.map_or("-".to_string(), |v| format!("{:.2}ms", v));

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Metric", "Value"]);
        table.add_row(vec!["Total Requests".to_string(), self.total.to_string()]);
        table.add_row(vec!["Successful Requests".to_string(), self.completed.to_string()]);
        table.add_row(vec!["Failed Requests".to_string(), self.failed.to_string()]);
        table.add_row(vec!["Average Response Time".to_string(), fmt_ms(self.avg_ms())]);
        table.add_row(vec!["Max Response Time".to_string(), fmt_ms(self.max_ms())]);
        table.add_row(vec![
            "Requests per Second".to_string(),
            format!("{:.2}", self.requests_per_second()),
        ]);
        table.add_row(vec![
            "Total Test Time".to_string(),
            format!("{:.2}s", self.elapsed.as_secs_f64()),
        ]);
        table.to_string()
    }
}

async fn write_once(client: &reqwest::Client, url: &str) -> Option<f64> {
    let resp = client.post(url).send().await.ok()?;
    if !resp.status().is_success() {
        return None;
    }
    resp.json::<WriteResponse>().await.ok().map(|r| r.process_duration_ms)
}

/// Issue `total` writes against `base_url`, `concurrency` at a time.
///
/// Each batch is awaited in full before the next starts.
pub async fn run(base_url: &str, concurrency: usize, total: usize) -> LoadReport {
    let client = reqwest::Client::new();
    let url = format!("{}/test-write", base_url.trim_end_matches('/'));
    let concurrency = concurrency.max(1);

    let start = Instant::now();
    let mut durations_ms = Vec::with_capacity(total);
    let mut failed = 0;

    let mut sent = 0;
    while sent < total {
        let batch = concurrency.min(total - sent);
        let results = join_all((0..batch).map(|_| write_once(&client, &url))).await;
        for r in results {
            match r {
                Some(d) => durations_ms.push(d),
                None => failed += 1,
            }
        }
        sent += batch;
        eprint!("\rCompleted: {}, Failed: {}", durations_ms.len(), failed);
    }
    eprintln!();

    LoadReport {
        total,
        completed: durations_ms.len(),
        failed,
        durations_ms,
        elapsed: start.elapsed(),
    }
}
