/*
 *  context.rs: The internal state representation of dwipe.
 *
 *  Copyright Darik Horn <dajhorn-dban@vanadac.com>.
 *  Modifications to original dwipe Copyright Andy Beverley <andy@andybev.com>
 *
 *  This program is free software; you can redistribute it and/or modify it under
 *  the terms of the GNU General Public License as published by the Free Software
 *  Foundation, version 2.
 */

use std::fs::File;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicU8, Ordering};

use crate::prng::PrngKind;

/// The status of a device selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectStatus {
    /// Do not wipe this device.
    False = 0,
    /// Wipe this device.
    True = 1,
    /// A parent of this device has been selected, so the wipe is implied.
    TrueParent = 2,
    /// A child of this device has been selected, so we can't wipe this device.
    FalseChild = 3,
    /// Do not wipe this device and do not allow it to be selected.
    Disabled = 4,
}

impl SelectStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => SelectStatus::True,
            2 => SelectStatus::TrueParent,
            3 => SelectStatus::FalseChild,
            4 => SelectStatus::Disabled,
            _ => SelectStatus::False,
        }
    }
}

/// The type of the current pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassType {
    /// Not running any pass.
    None = 0,
    /// Writing a pattern to the device.
    Write = 1,
    /// Verifying a pattern.
    Verify = 2,
    /// Filling the device with zeros on the last round.
    FinalBlank = 3,
    /// The terminal random pass of the OPS-II method.
    FinalOps2 = 4,
}

impl PassType {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => PassType::Write,
            2 => PassType::Verify,
            3 => PassType::FinalBlank,
            4 => PassType::FinalOps2,
            _ => PassType::None,
        }
    }

    /// The short tag shown in the status screen.
    pub fn tag(&self) -> &'static str {
        match self {
            PassType::None => "-",
            PassType::Write => "write",
            PassType::Verify => "verify",
            PassType::FinalBlank => "blank",
            PassType::FinalOps2 => "ops2",
        }
    }
}

/// Device identity information, read from sysfs where available.
#[derive(Debug, Clone, Default)]
pub struct DeviceIdentity {
    /// The device model.
    pub model_no: String,
    /// The device serial number.
    pub serial_no: String,
    /// The firmware revision.
    pub firmware_rev: String,
}

/// The per-device context.
///
/// Identity fields are fixed once device setup completes. Progress fields are
/// plain atomics: the worker that owns the device stores into them and the
/// supervisor, the status screen, and the snapshot exporters load from them.
/// All accesses are relaxed; the values are display approximations.
#[derive(Debug)]
pub struct WipeContext {
    /// The device file name.
    pub device_name: String,
    /// The string that we will show the user.
    pub label: String,
    /// The open read/write handle, present for wipable devices.
    pub device_file: Option<File>,
    /// The device size in bytes.
    pub device_size: u64,
    /// The hard sector size reported by the device.
    pub sector_size: u64,
    /// The soft block size; forced equal to the sector size at setup.
    pub block_size: u64,
    /// The device partition number, zero for whole disks.
    pub device_part: u32,
    /// The device identity information.
    pub identity: DeviceIdentity,
    /// The PRNG implementation used for random passes on this device.
    pub prng: PrngKind,

    /// Whether this device should be wiped.
    pub select: AtomicU8,
    /// The number of passes performed by the working wipe method.
    pub pass_count: AtomicI32,
    /// The current working pass, one-based.
    pub pass_working: AtomicI32,
    /// The type of the current working pass.
    pub pass_type: AtomicU8,
    /// The total number of bytes of the current pass.
    pub pass_size: AtomicU64,
    /// The number of bytes already i/o'd in the current pass.
    pub pass_done: AtomicU64,
    /// The number of i/o errors in the current pass.
    pub pass_errors: AtomicU64,
    /// The number of rounds performed by the working wipe method.
    pub round_count: AtomicI32,
    /// The current working round, one-based.
    pub round_working: AtomicI32,
    /// The total number of write bytes across all rounds.
    pub round_size: AtomicU64,
    /// The number of write bytes already done across all rounds.
    pub round_done: AtomicU64,
    /// The number of i/o errors across all rounds.
    pub round_errors: AtomicU64,
    /// The percentage complete across all rounds, stored as f64 bits.
    pub round_percent: AtomicU64,
    /// The number of verification mismatches across all passes.
    pub verify_errors: AtomicU64,
    /// Average throughput in bytes per second.
    pub throughput: AtomicU64,
    /// The estimated number of seconds until method completion.
    pub eta: AtomicU64,
    /// Raised while the method is syncing the device.
    pub sync_status: AtomicBool,
    /// -1 pending, 1 wiping, 0 finished.
    pub wipe_status: AtomicI32,
    /// The worker exit code.
    pub result: AtomicI32,
    /// Set when the worker was stopped by a signal.
    pub signal: AtomicI32,
}

impl WipeContext {
    /// Create a new context for a device.
    pub fn new(device_name: &str) -> Self {
        Self {
            device_name: device_name.to_string(),
            label: device_name.to_string(),
            device_file: None,
            device_size: 0,
            sector_size: 0,
            block_size: 0,
            device_part: 0,
            identity: DeviceIdentity::default(),
            prng: PrngKind::MersenneTwister,
            select: AtomicU8::new(SelectStatus::False as u8),
            pass_count: AtomicI32::new(0),
            pass_working: AtomicI32::new(0),
            pass_type: AtomicU8::new(PassType::None as u8),
            pass_size: AtomicU64::new(0),
            pass_done: AtomicU64::new(0),
            pass_errors: AtomicU64::new(0),
            round_count: AtomicI32::new(0),
            round_working: AtomicI32::new(0),
            round_size: AtomicU64::new(0),
            round_done: AtomicU64::new(0),
            round_errors: AtomicU64::new(0),
            round_percent: AtomicU64::new(0f64.to_bits()),
            verify_errors: AtomicU64::new(0),
            throughput: AtomicU64::new(0),
            eta: AtomicU64::new(0),
            sync_status: AtomicBool::new(false),
            wipe_status: AtomicI32::new(-1),
            result: AtomicI32::new(0),
            signal: AtomicI32::new(0),
        }
    }

    pub fn select(&self) -> SelectStatus {
        SelectStatus::from_u8(self.select.load(Ordering::Relaxed))
    }

    pub fn set_select(&self, s: SelectStatus) {
        self.select.store(s as u8, Ordering::Relaxed);
    }

    pub fn pass_type(&self) -> PassType {
        PassType::from_u8(self.pass_type.load(Ordering::Relaxed))
    }

    pub fn set_pass_type(&self, t: PassType) {
        self.pass_type.store(t as u8, Ordering::Relaxed);
    }

    pub fn round_percent(&self) -> f64 {
        f64::from_bits(self.round_percent.load(Ordering::Relaxed))
    }

    pub fn set_round_percent(&self, p: f64) {
        self.round_percent.store(p.to_bits(), Ordering::Relaxed);
    }

    /// Reset the per-pass counters at the start of a pass.
    pub fn begin_pass(&self, ordinal: i32, pass_type: PassType) {
        self.pass_working.store(ordinal, Ordering::Relaxed);
        self.set_pass_type(pass_type);
        self.pass_size.store(self.device_size, Ordering::Relaxed);
        self.pass_done.store(0, Ordering::Relaxed);
        self.pass_errors.store(0, Ordering::Relaxed);
    }
}
