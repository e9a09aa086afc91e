/*
 *  main.rs:  Darik's Wipe - Rust implementation.
 *
 *  Copyright Darik Horn <dajhorn-dban@vanadac.com>.
 *
 *  Modifications to original dwipe Copyright Andy Beverley <andy@andybev.com>
 *
 *  This program is free software; you can redistribute it and/or modify it under
 *  the terms of the GNU General Public License as published by the Free Software
 *  Foundation, version 2.
 *
 *  This program is distributed in the hope that it will be useful, but WITHOUT
 *  ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
 *  FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
 *  details.
 *
 *  You should have received a copy of the GNU General Public License along with
 *  this program; if not, write to the Free Software Foundation, Inc.,
 *  51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.
 *
 */

use std::fs::File;
use std::process;
use std::sync::Arc;
use std::thread;

use signal_hook::consts::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;

use dwipe::context::{SelectStatus, WipeContext};
use dwipe::device;
use dwipe::engine;
use dwipe::gui;
use dwipe::logging::{self, wipe_log, wipe_perror, LogLevel};
use dwipe::options::{self, KNOB_ENTROPY};

fn main() {
    // Parse command line options.
    let opts = options::parse_options();

    // The console log sink would fight the status screen for the terminal.
    logging::init_logging(opts.logfile.as_deref(), opts.nogui);

    if opts.nogui && !opts.autonuke {
        eprintln!("--nogui option must be used with the autonuke option");
        process::exit(1);
    }

    // Open the entropy source.
    let entropy = match File::open(KNOB_ENTROPY) {
        Ok(file) => Arc::new(file),
        Err(e) => {
            wipe_perror(&e, "main", "open");
            wipe_log(
                LogLevel::Fatal,
                &format!("Unable to open entropy source {}.", KNOB_ENTROPY),
            );
            process::exit(-1);
        }
    };
    wipe_log(
        LogLevel::Notice,
        &format!("Opened entropy source '{}'.", KNOB_ENTROPY),
    );

    logging::log_sysinfo();
    options::log_options(&opts);

    // Deliver termination signals to the workers as a flag they poll at
    // block boundaries.
    match Signals::new([SIGHUP, SIGINT, SIGQUIT, SIGTERM]) {
        Ok(mut signals) => {
            thread::spawn(move || {
                if let Some(sig) = signals.forever().next() {
                    engine::request_terminate(sig);
                }
            });
        }
        Err(e) => {
            wipe_log(
                LogLevel::Warning,
                &format!("Unable to install signal handlers: {}", e),
            );
        }
    }

    // Enumerate devices, either from the command line or by scanning.
    let names: Vec<(String, u32)> = if opts.device_names.is_empty() {
        match device::device_scan() {
            Ok(names) if names.is_empty() => {
                wipe_log(LogLevel::Error, "Storage devices not found.");
                process::exit(-1);
            }
            Ok(names) => {
                wipe_log(
                    LogLevel::Info,
                    &format!("Automatically enumerated {} devices.", names.len()),
                );
                names
            }
            Err(e) => {
                wipe_log(
                    LogLevel::Fatal,
                    &format!("Unable to scan for storage devices: {}", e),
                );
                process::exit(-1);
            }
        }
    } else {
        opts.device_names.iter().map(|n| (n.clone(), 0)).collect()
    };

    // Set up every device. Any setup failure aborts before wiping begins.
    let mut contexts: Vec<Arc<WipeContext>> = Vec::with_capacity(names.len());
    for (name, part) in &names {
        match device::device_setup(name, *part, &opts) {
            Ok(context) => contexts.push(Arc::new(context)),
            Err(_) => {
                wipe_log(
                    LogLevel::Fatal,
                    &format!("Device setup failed for '{}'.", name),
                );
                process::exit(-1);
            }
        }
    }

    // Preselect devices for autonuke; partitions follow their parent disk.
    for context in &contexts {
        if opts.autonuke {
            if context.device_part == 0 {
                context.set_select(SelectStatus::True);
            } else {
                context.set_select(SelectStatus::TrueParent);
            }
        } else {
            context.set_select(SelectStatus::False);
        }
    }

    let mut use_gui = !opts.nogui;
    if use_gui {
        if let Err(e) = gui::gui_init() {
            wipe_log(
                LogLevel::Warning,
                &format!("Unable to start the terminal interface: {}", e),
            );
            use_gui = false;
        }
    }

    if opts.autonuke {
        if use_gui {
            let _ = gui::gui_options(&opts);
        }
    } else {
        // The user must manually select devices.
        let proceed = gui::gui_select(&contexts).unwrap_or(false);
        if !proceed || engine::terminate_requested() {
            gui::gui_free();
            wipe_log(LogLevel::Notice, "Wipe aborted before starting.");
            process::exit(0);
        }
    }

    let selected: Vec<Arc<WipeContext>> = contexts
        .iter()
        .filter(|c| c.select() == SelectStatus::True)
        .cloned()
        .collect();

    if selected.is_empty() {
        if use_gui {
            gui::gui_free();
        }
        wipe_log(LogLevel::Notice, "No devices selected.");
        process::exit(0);
    }

    // Start the web server.
    if opts.web_enabled {
        #[cfg(feature = "web")]
        dwipe::httpd::start_web_server(&opts, contexts.clone(), selected.clone());

        #[cfg(not(feature = "web"))]
        wipe_log(
            LogLevel::Warning,
            "This build does not include the web status endpoint.",
        );
    }

    // Run the engine; the tick paces the supervisor at about one second.
    let results = if use_gui {
        engine::wipe(&contexts, &opts, &entropy, gui::gui_status_tick)
    } else {
        engine::wipe(&contexts, &opts, &entropy, engine::sleep_tick)
    };

    if use_gui {
        let _ = gui::gui_finish(&contexts);
        if !opts.nowait && !engine::terminate_requested() {
            gui::wait_key();
        }
        gui::gui_free();
    }

    logging::log_summary(&selected);
    wipe_log(LogLevel::Notice, "Wipe finished.");

    let code = engine::summary_code(&results);
    if code == 0 {
        wipe_log(LogLevel::Info, "Dwipe successfully exited.");
    }
    process::exit(code);
}
