/*
 *  lib.rs: Darik's Wipe - Rust implementation.
 *
 *  Copyright Darik Horn <dajhorn-dban@vanadac.com>.
 *  Modifications to original dwipe Copyright Andy Beverley <andy@andybev.com>
 *
 *  This program is free software; you can redistribute it and/or modify it under
 *  the terms of the GNU General Public License as published by the Free Software
 *  Foundation, version 2.
 */

pub mod context;
pub mod device;
pub mod engine;
pub mod gui;
pub mod json;
pub mod logging;
pub mod method;
pub mod options;
pub mod pass;
pub mod prng;
pub mod speedring;
pub mod version;

#[cfg(feature = "web")]
pub mod httpd;
#[cfg(feature = "web")]
pub mod notify;
