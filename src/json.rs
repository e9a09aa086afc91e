/*
 *  json.rs: JSON status snapshots for dwipe.
 *
 *  Copyright Paolo Iannelli <info@paoloiannelli.com>.
 *
 *  This program is free software; you can redistribute it and/or modify it under
 *  the terms of the GNU General Public License as published by the Free Software
 *  Foundation, version 2.
 */

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde::Serialize;

use crate::context::WipeContext;
use crate::logging::hours_minutes_seconds;
use crate::options::WipeOptions;
use crate::prng::ENTROPY_LABEL;

/// The per-device block of the status snapshot.
#[derive(Debug, Serialize)]
pub struct DiskStatus {
    pub select: u8,
    pub label: String,
    pub eta: u64,
    pub block_size: u64,
    pub sector_size: u64,
    pub sync_status: u8,
    pub throughput: u64,
    pub verify_errors: u64,
    pub device: DeviceStatus,
    pub pass: PassStatus,
    pub round: RoundStatus,
}

#[derive(Debug, Serialize)]
pub struct DeviceStatus {
    pub part: u32,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct PassStatus {
    pub count: i32,
    pub done: u64,
    pub errors: u64,
    pub size: u64,
    #[serde(rename = "type")]
    pub pass_type: u8,
    pub working: i32,
}

#[derive(Debug, Serialize)]
pub struct RoundStatus {
    pub count: i32,
    pub done: u64,
    pub errors: u64,
    pub size: u64,
    pub percent: f64,
    pub working: i32,
}

/// The global info block of the status snapshot.
#[derive(Debug, Serialize)]
pub struct InfoStatus {
    pub entropy: &'static str,
    pub prng: &'static str,
    pub method: &'static str,
    pub verify: &'static str,
    pub rounds: i32,
    pub runtime: String,
    pub remaining: String,
    pub load_avg: String,
    pub throughput: u64,
    pub errors: u64,
    pub total_disks: usize,
    pub wiping_disks: usize,
}

/// One device's observable state.
pub fn disk_status(c: &WipeContext) -> DiskStatus {
    DiskStatus {
        select: c.select() as u8,
        label: c.label.clone(),
        eta: c.eta.load(Ordering::Relaxed),
        block_size: c.block_size,
        sector_size: c.sector_size,
        sync_status: c.sync_status.load(Ordering::Relaxed) as u8,
        throughput: c.throughput.load(Ordering::Relaxed),
        verify_errors: c.verify_errors.load(Ordering::Relaxed),
        device: DeviceStatus {
            part: c.device_part,
            size: c.device_size,
        },
        pass: PassStatus {
            count: c.pass_count.load(Ordering::Relaxed),
            done: c.pass_done.load(Ordering::Relaxed),
            errors: c.pass_errors.load(Ordering::Relaxed),
            size: c.pass_size.load(Ordering::Relaxed),
            pass_type: c.pass_type() as u8,
            working: c.pass_working.load(Ordering::Relaxed),
        },
        round: RoundStatus {
            count: c.round_count.load(Ordering::Relaxed),
            done: c.round_done.load(Ordering::Relaxed),
            errors: c.round_errors.load(Ordering::Relaxed),
            size: c.round_size.load(Ordering::Relaxed),
            percent: c.round_percent(),
            working: c.round_working.load(Ordering::Relaxed),
        },
    }
}

/// Render the per-disk snapshot of a context array.
pub fn status_json(contexts: &[Arc<WipeContext>]) -> String {
    #[derive(Serialize)]
    struct Snapshot {
        disks: BTreeMap<String, DiskStatus>,
    }

    let disks = contexts
        .iter()
        .map(|c| (c.device_name.clone(), disk_status(c)))
        .collect();

    serde_json::to_string(&Snapshot { disks }).unwrap_or_else(|_| "{}".to_string())
}

fn clock(seconds: u64) -> String {
    let (h, m, s) = hours_minutes_seconds(seconds);
    format!("{:02}:{:02}:{:02}", h, m, s)
}

/// Render the global info snapshot.
pub fn info_json(
    options: &WipeOptions,
    contexts: &[Arc<WipeContext>],
    enumerated: usize,
    selected: usize,
    runtime_seconds: u64,
) -> String {
    #[derive(Serialize)]
    struct Snapshot {
        info: InfoStatus,
    }

    let throughput: u64 = contexts
        .iter()
        .map(|c| c.throughput.load(Ordering::Relaxed))
        .sum();
    let errors: u64 = contexts
        .iter()
        .map(|c| {
            c.round_errors.load(Ordering::Relaxed) + c.verify_errors.load(Ordering::Relaxed)
        })
        .sum();
    let remaining = contexts
        .iter()
        .map(|c| c.eta.load(Ordering::Relaxed))
        .max()
        .unwrap_or(0);

    let load_avg = sys_info::loadavg()
        .map(|l| format!("{:.2} {:.2} {:.2}", l.one, l.five, l.fifteen))
        .unwrap_or_default();

    let info = InfoStatus {
        entropy: ENTROPY_LABEL,
        prng: options.prng.label(),
        method: options.method.label(),
        verify: options.verify.label(),
        rounds: options.rounds,
        runtime: clock(runtime_seconds),
        remaining: clock(remaining),
        load_avg,
        throughput,
        errors,
        total_disks: enumerated,
        wiping_disks: selected,
    };

    serde_json::to_string(&Snapshot { info }).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{PassType, SelectStatus};

    fn sample_context() -> Arc<WipeContext> {
        let mut c = WipeContext::new("/dev/sdz");
        c.label = "/dev/sdz [1.0 GB]".to_string();
        c.device_size = 1_000_000_000;
        c.sector_size = 512;
        c.block_size = 512;
        let c = Arc::new(c);
        c.set_select(SelectStatus::True);
        c.set_pass_type(PassType::Write);
        c.pass_count.store(3, Ordering::Relaxed);
        c.pass_working.store(2, Ordering::Relaxed);
        c.round_size.store(3_000_000_000, Ordering::Relaxed);
        c.round_done.store(1_500_000_000, Ordering::Relaxed);
        c.set_round_percent(50.0);
        c.throughput.store(80_000_000, Ordering::Relaxed);
        c
    }

    #[test]
    fn disk_snapshot_nests_device_pass_and_round() {
        let c = sample_context();
        let json = status_json(&[c]);
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();

        let disk = &v["disks"]["/dev/sdz"];
        assert_eq!(disk["select"], 1);
        assert_eq!(disk["label"], "/dev/sdz [1.0 GB]");
        assert_eq!(disk["sector_size"], 512);
        assert_eq!(disk["device"]["size"], 1_000_000_000u64);
        assert_eq!(disk["pass"]["count"], 3);
        assert_eq!(disk["pass"]["working"], 2);
        assert_eq!(disk["pass"]["type"], 1);
        assert_eq!(disk["round"]["percent"], 50.0);
    }

    #[test]
    fn info_snapshot_carries_the_run_configuration() {
        let options = WipeOptions::default();
        let c = sample_context();
        let json = info_json(&options, &[c], 4, 1, 3661);
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();

        let info = &v["info"];
        assert_eq!(info["entropy"], "Linux Kernel (urandom)");
        assert_eq!(info["method"], "DoD Short");
        assert_eq!(info["verify"], "last");
        assert_eq!(info["rounds"], 1);
        assert_eq!(info["runtime"], "01:01:01");
        assert_eq!(info["total_disks"], 4);
        assert_eq!(info["wiping_disks"], 1);
        assert_eq!(info["throughput"], 80_000_000u64);
    }
}
