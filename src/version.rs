/*
 *  version.rs: Version information for dwipe.
 *
 *  Copyright Darik Horn <dajhorn-dban@vanadac.com>.
 *  Modifications to original dwipe Copyright Andy Beverley <andy@andybev.com>
 *
 *  This program is free software; you can redistribute it and/or modify it under
 *  the terms of the GNU General Public License as published by the Free Software
 *  Foundation, version 2.
 */

/// The version string of the program.
pub const VERSION: &str = "2.2.0";

/// The version string with additional information.
pub const VERSION_STRING: &str = "dwipe 2.2.0 (Rust Edition)";

/// The banner shown on the top line of the screen.
pub const BANNER: &str = "Darik's Wipe 2.2.0";

/// Get the full version information.
pub fn version_info() -> String {
    format!(
        "{}\nCopyright Darik Horn, modifications by Andy Beverley",
        VERSION_STRING
    )
}
