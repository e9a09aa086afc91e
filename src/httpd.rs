/*
 *  httpd.rs: The read-only web status endpoint for dwipe.
 *
 *  Copyright Paolo Iannelli <info@paoloiannelli.com>.
 *
 *  This program is free software; you can redistribute it and/or modify it under
 *  the terms of the GNU General Public License as published by the Free Software
 *  Foundation, version 2.
 */

use std::net::IpAddr;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use base64::Engine;
use warp::hyper::Body;
use warp::Filter;

use crate::context::WipeContext;
use crate::json;
use crate::logging::{wipe_log, LogLevel};
use crate::options::WipeOptions;

/// Start the status server on a background thread. The routes only ever read
/// the shared contexts, so the wipe itself is unaffected.
pub fn start_web_server(
    options: &WipeOptions,
    enumerated: Vec<Arc<WipeContext>>,
    selected: Vec<Arc<WipeContext>>,
) {
    let listen: IpAddr = match options.web_listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            wipe_log(
                LogLevel::Error,
                &format!("Invalid web listen address '{}': {}", options.web_listen, e),
            );
            return;
        }
    };
    let port = options.web_port;
    let options = options.clone();

    wipe_log(
        LogLevel::Notice,
        &format!("Starting the web server on {}:{}.", listen, port),
    );

    thread::spawn(move || {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                wipe_log(
                    LogLevel::Error,
                    &format!("Unable to start the web server runtime: {}", e),
                );
                return;
            }
        };
        runtime.block_on(serve(options, enumerated, selected, listen, port));
    });
}

fn authorized(header: &Option<String>, user: &str, pass: &str) -> bool {
    if user.is_empty() {
        return true;
    }

    let header = match header {
        Some(h) => h,
        None => return false,
    };
    let encoded = match header.strip_prefix("Basic ") {
        Some(e) => e,
        None => return false,
    };
    let decoded = match base64::engine::general_purpose::STANDARD.decode(encoded.trim()) {
        Ok(d) => d,
        Err(_) => return false,
    };

    decoded == format!("{}:{}", user, pass).as_bytes()
}

fn reply(authorized: bool, content_type: &str, body: String) -> warp::http::Response<Body> {
    if !authorized {
        return warp::http::Response::builder()
            .status(401)
            .header("WWW-Authenticate", "Basic realm=\"dwipe\"")
            .body(Body::from(
                "<html><body><h1>401 Unauthorized</h1></body></html>",
            ))
            .unwrap();
    }

    warp::http::Response::builder()
        .header("Content-Type", content_type)
        .body(Body::from(body))
        .unwrap()
}

async fn serve(
    options: WipeOptions,
    enumerated: Vec<Arc<WipeContext>>,
    selected: Vec<Arc<WipeContext>>,
    listen: IpAddr,
    port: u16,
) {
    let started = Instant::now();
    let user = options.web_auth_user.clone();
    let pass = options.web_auth_pass.clone();

    let auth = warp::header::optional::<String>("authorization");

    let info = {
        let options = options.clone();
        let enumerated = enumerated.clone();
        let selected = selected.clone();
        let (user, pass) = (user.clone(), pass.clone());
        warp::path!("dwipe.json")
            .and(warp::get())
            .and(auth)
            .map(move |header: Option<String>| {
                let body = json::info_json(
                    &options,
                    &selected,
                    enumerated.len(),
                    selected.len(),
                    started.elapsed().as_secs(),
                );
                reply(
                    authorized(&header, &user, &pass),
                    "application/json",
                    body,
                )
            })
    };

    let all = {
        let enumerated = enumerated.clone();
        let (user, pass) = (user.clone(), pass.clone());
        warp::path!("disks" / "all.json")
            .and(warp::get())
            .and(auth)
            .map(move |header: Option<String>| {
                reply(
                    authorized(&header, &user, &pass),
                    "application/json",
                    json::status_json(&enumerated),
                )
            })
    };

    let wiping = {
        let selected = selected.clone();
        let (user, pass) = (user.clone(), pass.clone());
        warp::path!("disks" / "wiping.json")
            .and(warp::get())
            .and(auth)
            .map(move |header: Option<String>| {
                reply(
                    authorized(&header, &user, &pass),
                    "application/json",
                    json::status_json(&selected),
                )
            })
    };

    let fallback = warp::get().and(auth).map(move |header: Option<String>| {
        reply(
            authorized(&header, &user, &pass),
            "text/html",
            "This server is currently being wiped".to_string(),
        )
    });

    let routes = info.or(all).or(wiping).or(fallback);

    warp::serve(routes).run((listen, port)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(user: &str, pass: &str) -> Option<String> {
        let token =
            base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, pass));
        Some(format!("Basic {}", token))
    }

    #[test]
    fn empty_auth_user_disables_authentication() {
        assert!(authorized(&None, "", ""));
        assert!(authorized(&Some("garbage".to_string()), "", ""));
    }

    #[test]
    fn basic_auth_matches_exact_credentials() {
        assert!(authorized(&basic("op", "secret"), "op", "secret"));
        assert!(!authorized(&basic("op", "wrong"), "op", "secret"));
        assert!(!authorized(&basic("other", "secret"), "op", "secret"));
        assert!(!authorized(&None, "op", "secret"));
        assert!(!authorized(
            &Some("Bearer abcdef".to_string()),
            "op",
            "secret"
        ));
    }
}
