/*
 *  engine.rs: The wipe engine: one worker per selected device.
 *
 *  Copyright Darik Horn <dajhorn-dban@vanadac.com>.
 *  Modifications to original dwipe Copyright Andy Beverley <andy@andybev.com>
 *
 *  This program is free software; you can redistribute it and/or modify it under
 *  the terms of the GNU General Public License as published by the Free Software
 *  Foundation, version 2.
 */

use std::fs::File;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::context::{SelectStatus, WipeContext};
use crate::logging::{wipe_log, LogLevel};
use crate::method::{self, VerifyLevel};
use crate::options::{WipeOptions, KNOB_SLEEP};

/// Raised when a termination signal was delivered to the process.
pub static TERMINATE_FLAG: AtomicBool = AtomicBool::new(false);

/// The number of the signal that requested termination.
pub static TERMINATE_SIGNAL: AtomicI32 = AtomicI32::new(0);

/// Ask all workers to stop at their next block boundary.
pub fn request_terminate(signal: i32) {
    TERMINATE_SIGNAL.store(signal, Ordering::Relaxed);
    TERMINATE_FLAG.store(true, Ordering::Relaxed);
}

/// Whether a termination signal has been observed.
pub fn terminate_requested() -> bool {
    TERMINATE_FLAG.load(Ordering::Relaxed)
}

/// The per-device outcome of a wipe run.
#[derive(Debug, Clone)]
pub struct WipeResult {
    /// The device file name.
    pub device_name: String,
    /// The label shown to the user.
    pub label: String,
    /// The label of the method that was run.
    pub method: &'static str,
    /// The number of rounds that were requested.
    pub rounds: i32,
    /// The read-back policy that was in effect.
    pub verify: VerifyLevel,
    /// The worker exit code: 0 pass, positive incomplete, negative fatal.
    pub result: i32,
    /// The signal that stopped the worker, if any.
    pub signal: i32,
}

impl WipeResult {
    /// The outcome word written to the result file.
    pub fn outcome(&self) -> &'static str {
        if self.result == 0 {
            "pass"
        } else {
            "fail"
        }
    }
}

/// A blocking one second tick for runs without the terminal interface.
pub fn sleep_tick(_contexts: &[Arc<WipeContext>]) {
    thread::sleep(Duration::from_secs(KNOB_SLEEP));
}

/// Wipe every selected device.
///
/// One worker thread runs per context with `select == True`; contexts in any
/// other selection state are never touched. The supplied `tick` paces the
/// supervisor loop: it is expected to block for about a second (the status
/// screen's key-read with timeout, or [`sleep_tick`]). Workers are polled
/// non-blockingly between ticks and reaped as they finish.
pub fn wipe<F>(
    contexts: &[Arc<WipeContext>],
    options: &WipeOptions,
    entropy: &Arc<File>,
    mut tick: F,
) -> Vec<WipeResult>
where
    F: FnMut(&[Arc<WipeContext>]),
{
    let mut handles: Vec<(usize, Option<JoinHandle<i32>>)> = Vec::new();

    for (i, context) in contexts.iter().enumerate() {
        if context.select() != SelectStatus::True {
            continue;
        }

        let c = Arc::clone(context);
        let opts = options.clone();
        let ent = Arc::clone(entropy);
        let handle = thread::spawn(move || method::run_method(&c, &opts, &ent));
        handles.push((i, Some(handle)));
    }

    #[cfg(feature = "web")]
    crate::notify::notify_start(options);

    let mut pending = handles.len();
    while pending > 0 {
        for (i, slot) in handles.iter_mut() {
            let finished = slot.as_ref().map_or(false, |h| h.is_finished());
            if !finished {
                continue;
            }

            let handle = slot.take().unwrap();
            let context = &contexts[*i];
            match handle.join() {
                Ok(code) => {
                    context.result.store(code, Ordering::Relaxed);
                    if code != 0 && terminate_requested() {
                        context
                            .signal
                            .store(TERMINATE_SIGNAL.load(Ordering::Relaxed), Ordering::Relaxed);
                    }
                }
                Err(_) => {
                    // The worker died; the damage is contained to its device.
                    wipe_log(
                        LogLevel::Fatal,
                        &format!("Worker for '{}' terminated abnormally.", context.device_name),
                    );
                    context.result.store(-1, Ordering::Relaxed);
                }
            }
            pending -= 1;
        }

        if pending > 0 {
            tick(contexts);
        }
    }

    let mut results = Vec::new();
    for context in contexts {
        if context.select() != SelectStatus::True {
            continue;
        }

        let result = WipeResult {
            device_name: context.device_name.clone(),
            label: context.label.clone(),
            method: options.method.label(),
            rounds: options.rounds,
            verify: options.verify,
            result: context.result.load(Ordering::Relaxed),
            signal: context.signal.load(Ordering::Relaxed),
        };

        match result.result {
            0 => wipe_log(
                LogLevel::Notice,
                &format!("Wipe of device '{}' succeeded.", result.device_name),
            ),
            r if r > 0 => wipe_log(
                LogLevel::Notice,
                &format!("Wipe of device '{}' incomplete.", result.device_name),
            ),
            _ => wipe_log(
                LogLevel::Notice,
                &format!("Wipe of device '{}' failed.", result.device_name),
            ),
        }

        if let Err(e) = write_result_file(&result) {
            wipe_log(
                LogLevel::Warning,
                &format!(
                    "Unable to write the result file for '{}': {}",
                    result.device_name, e
                ),
            );
        }

        results.push(result);
    }

    #[cfg(feature = "web")]
    {
        if summary_code(&results) == 0 {
            crate::notify::notify_success(options);
        } else {
            crate::notify::notify_fail(options);
        }
    }

    results
}

/// Write `<device>.result` describing the terminal outcome.
fn write_result_file(result: &WipeResult) -> io::Result<()> {
    let path = format!("{}.result", result.device_name);
    let mut file = File::create(path)?;
    writeln!(file, "DWIPE_LABEL='{}'", result.label)?;
    writeln!(file, "DWIPE_METHOD='{}'", result.method)?;
    writeln!(file, "DWIPE_ROUNDS='{}'", result.rounds)?;
    writeln!(file, "DWIPE_VERIFY='{}'", result.verify.label())?;
    writeln!(file, "DWIPE_RESULT='{}'", result.outcome())?;
    Ok(())
}

/// Fold per-device exit codes into the process exit code: 0 when every
/// device passed, 1 when any was incomplete, -1 when any failed fatally.
pub fn summary_code(results: &[WipeResult]) -> i32 {
    if results.iter().any(|r| r.result < 0) {
        return -1;
    }
    if results.iter().any(|r| r.result > 0) {
        return 1;
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(code: i32) -> WipeResult {
        WipeResult {
            device_name: "/dev/sdx".to_string(),
            label: "/dev/sdx".to_string(),
            method: "Quick Erase",
            rounds: 1,
            verify: VerifyLevel::None,
            result: code,
            signal: 0,
        }
    }

    #[test]
    fn summary_code_reports_the_worst_outcome() {
        assert_eq!(summary_code(&[]), 0);
        assert_eq!(summary_code(&[result(0), result(0)]), 0);
        assert_eq!(summary_code(&[result(0), result(1)]), 1);
        assert_eq!(summary_code(&[result(1), result(-1)]), -1);
    }

    #[test]
    fn result_file_has_the_expected_lines() {
        let dir = std::env::temp_dir().join(format!("dwipe-result-{}", std::process::id()));
        let device = dir.to_str().unwrap().to_string();

        let mut r = result(0);
        r.device_name = device.clone();
        r.label = "Test Device".to_string();
        write_result_file(&r).unwrap();

        let contents = std::fs::read_to_string(format!("{}.result", device)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "DWIPE_LABEL='Test Device'",
                "DWIPE_METHOD='Quick Erase'",
                "DWIPE_ROUNDS='1'",
                "DWIPE_VERIFY='off'",
                "DWIPE_RESULT='pass'",
            ]
        );

        let _ = std::fs::remove_file(format!("{}.result", device));
    }

    #[test]
    fn failed_and_incomplete_wipes_both_read_fail() {
        assert_eq!(result(0).outcome(), "pass");
        assert_eq!(result(1).outcome(), "fail");
        assert_eq!(result(-1).outcome(), "fail");
    }
}
