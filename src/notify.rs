/*
 *  notify.rs: Lifecycle webhook notifications for dwipe.
 *
 *  Copyright Paolo Iannelli <info@paoloiannelli.com>.
 *
 *  This program is free software; you can redistribute it and/or modify it under
 *  the terms of the GNU General Public License as published by the Free Software
 *  Foundation, version 2.
 */

use std::time::Duration;

use crate::logging::{wipe_log, LogLevel};
use crate::options::WipeOptions;
use crate::version::VERSION_STRING;

fn notify_url(address: &str) {
    let client = match reqwest::blocking::Client::builder()
        .danger_accept_invalid_certs(true)
        .user_agent(VERSION_STRING)
        .timeout(Duration::from_secs(10))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            wipe_log(
                LogLevel::Error,
                &format!("Unable to build the notification client: {}", e),
            );
            return;
        }
    };

    match client.get(address).send() {
        Ok(_) => wipe_log(
            LogLevel::Notice,
            &format!("Notified successfully URL: {}", address),
        ),
        Err(e) => wipe_log(
            LogLevel::Error,
            &format!("Failed to notify URL: {} - {}", address, e),
        ),
    }
}

/// Call the start webhook, when configured.
pub fn notify_start(options: &WipeOptions) {
    if let Some(url) = &options.notify_start_url {
        notify_url(url);
    }
}

/// Call the success webhook, when configured.
pub fn notify_success(options: &WipeOptions) {
    if let Some(url) = &options.notify_success_url {
        notify_url(url);
    }
}

/// Call the failure webhook, when configured.
pub fn notify_fail(options: &WipeOptions) {
    if let Some(url) = &options.notify_fail_url {
        notify_url(url);
    }
}
