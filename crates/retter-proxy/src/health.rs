//! The `/health` endpoint.
//!
//! A single JSON document reporting uptime, the live cache/breaker
//! population, and the running request-time counters. The `memory` block
//! is best-effort: Rust has no equivalent of Go's `runtime.MemStats`, so
//! this reads the process's resident set size out of `/proc/self/status`
//! on Linux and reports zero everywhere else or on any parse failure,
//! rather than fabricating numbers.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::Proxy;

/// Best-effort process memory usage. Only `sys_memory_byte` (Linux `VmRSS`)
/// is populated; the allocator-level fields have no portable Rust
/// equivalent to Go's `runtime.MemStats` and are reported as zero.
fn memory_stats() -> serde_json::Value {
    let sys_memory_byte = read_vmrss_bytes().unwrap_or(0);
    serde_json::json!({
        "sys-memory-byte": sys_memory_byte,
        "alloc-memory-byte": 0,
        "total-alloc-memory-byte": 0,
    })
}

#[cfg(target_os = "linux")]
fn read_vmrss_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: u64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn read_vmrss_bytes() -> Option<u64> {
    None
}

pub async fn handler(State(proxy): State<Arc<Proxy>>) -> impl IntoResponse {
    let snapshot = proxy.metrics.snapshot();
    Json(serde_json::json!({
        "status": "OK",
        "server-uptime": humantime::format_duration(snapshot.uptime).to_string(),
        "cache-count": proxy.cache.len(),
        "ttl-timer-count": proxy.cache.timer_len(),
        "breaker-count": proxy.breakers.len(),
        "total-request-served": snapshot.total_requests,
        "total-response-time-ms": snapshot.total_response_time_ms,
        "average-response-time-ms": snapshot.average_response_time_ms,
        "slowest-response-time-ms": snapshot.slowest_ms,
        "fastest-response-time-ms": snapshot.fastest_ms,
        "memory": memory_stats(),
    }))
}
