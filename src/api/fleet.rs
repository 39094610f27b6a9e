//! Fleet fan-out: one scoped worker thread per concurrently reconciled host.
//!
//! Workers share only `&Hardline` and an atomic cursor into the host list. Each host
//! keeps its own journal partition, so runs on different hosts never contend.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use log::Level;

use crate::api::errors::ApiError;
use crate::api::Hardline;
use crate::logging::{AuditSink, FactsEmitter};
use crate::types::{Baseline, Host, RunReport};

pub(crate) fn run<E: FactsEmitter, A: AuditSink>(
    api: &Hardline<E, A>,
    baseline: &Baseline,
    hosts: &[Host],
) -> Vec<(String, Result<RunReport, ApiError>)> {
    let workers = api.policy.host_concurrency.max(1).min(hosts.len());
    api.audit.log(
        Level::Info,
        &format!("fleet: hosts={} workers={workers}", hosts.len()),
    );
    let next = AtomicUsize::new(0);
    let slots: Vec<Mutex<Option<Result<RunReport, ApiError>>>> =
        hosts.iter().map(|_| Mutex::new(None)).collect();

    std::thread::scope(|s| {
        for _ in 0..workers {
            s.spawn(|| loop {
                let i = next.fetch_add(1, Ordering::SeqCst);
                let Some(host) = hosts.get(i) else {
                    break;
                };
                let res = api.apply(baseline, host);
                if let Ok(mut slot) = slots[i].lock() {
                    *slot = Some(res);
                }
            });
        }
    });

    hosts
        .iter()
        .zip(slots)
        .map(|(h, slot)| {
            let res = slot
                .into_inner()
                .ok()
                .flatten()
                .unwrap_or_else(|| Err(ApiError::Journal(format!("worker for {} did not finish", h.id))));
            (h.id.clone(), res)
        })
        .collect()
}
