/*
 *  device.rs: Device enumeration and setup for dwipe.
 *
 *  Copyright Darik Horn <dajhorn-dban@vanadac.com>.
 *  Modifications to original dwipe Copyright Andy Beverley <andy@andybev.com>
 *
 *  This program is free software; you can redistribute it and/or modify it under
 *  the terms of the GNU General Public License as published by the Free Software
 *  Foundation, version 2.
 */

use std::fs::{self, OpenOptions};
use std::io::{self, Seek, SeekFrom};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use nix::sys::stat::fstat;

use crate::context::{DeviceIdentity, WipeContext};
use crate::logging::{wipe_log, wipe_perror, LogLevel};
use crate::options::{WipeOptions, KNOB_PARTITIONS};

// Block device ioctls, as in <linux/fs.h>.
nix::ioctl_read_bad!(blksszget, nix::request_code_none!(0x12, 104), libc::c_int);
nix::ioctl_read_bad!(
    blkbszget,
    nix::request_code_read!(0x12, 112, std::mem::size_of::<libc::size_t>()),
    libc::c_int
);
nix::ioctl_write_ptr_bad!(
    blkbszset,
    nix::request_code_write!(0x12, 113, std::mem::size_of::<libc::size_t>()),
    libc::c_int
);
nix::ioctl_read_bad!(
    blkgetsize64,
    nix::request_code_read!(0x12, 114, std::mem::size_of::<libc::size_t>()),
    u64
);

/// Scan the kernel partition table for candidate devices. Returns device
/// paths with their partition numbers, zero for whole disks.
pub fn device_scan() -> io::Result<Vec<(String, u32)>> {
    let contents = fs::read_to_string(KNOB_PARTITIONS)?;
    Ok(parse_partitions(&contents))
}

/// Parse the contents of /proc/partitions into (path, partition) entries.
fn parse_partitions(contents: &str) -> Vec<(String, u32)> {
    let mut names: Vec<String> = Vec::new();

    for line in contents.lines().skip(2) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() == 4 {
            names.push(fields[3].to_string());
        }
    }

    names
        .iter()
        .map(|name| {
            (
                format!("/dev/{}", name),
                partition_number(name, &names),
            )
        })
        .collect()
}

/// The partition number of `name`, derived from a sibling whole-disk entry:
/// `sda1` against `sda`, `nvme0n1p2` against `nvme0n1`. Zero for whole disks.
fn partition_number(name: &str, all: &[String]) -> u32 {
    for base in all {
        if base.as_str() == name || !name.starts_with(base.as_str()) {
            continue;
        }
        let rest = &name[base.len()..];
        let digits = rest.strip_prefix('p').unwrap_or(rest);
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(n) = digits.parse() {
                return n;
            }
        }
    }
    0
}

/// Open and probe one device, producing a wipable context. Any failure here
/// is a fatal setup error; the run must not start.
pub fn device_setup(name: &str, part: u32, options: &WipeOptions) -> io::Result<WipeContext> {
    let mut open_options = OpenOptions::new();
    open_options.read(true).write(true);
    if options.sync {
        open_options.custom_flags(libc::O_SYNC);
    }

    let file = open_options.open(name).map_err(|e| {
        wipe_perror(&e, "device_setup", "open");
        wipe_log(LogLevel::Fatal, &format!("Unable to open device '{}'.", name));
        e
    })?;
    let fd = file.as_raw_fd();

    let stat = fstat(fd).map_err(errno_to_io)?;
    let is_block = stat.st_mode & libc::S_IFMT == libc::S_IFBLK;
    let is_regular = stat.st_mode & libc::S_IFMT == libc::S_IFREG;

    if !is_block && !is_regular {
        wipe_log(
            LogLevel::Error,
            &format!("'{}' is not a block device.", name),
        );
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{}' is not a block device", name),
        ));
    }

    if is_regular {
        wipe_log(
            LogLevel::Warning,
            &format!("'{}' is not a block device; wiping it as a file target.", name),
        );
    }

    let mut context = WipeContext::new(name);
    context.device_part = part;
    context.prng = options.prng;

    // Sector size and block size checking.
    if is_block {
        let mut sector_size: libc::c_int = 0;
        unsafe { blksszget(fd, &mut sector_size) }.map_err(errno_to_io)?;
        wipe_log(
            LogLevel::Info,
            &format!("Device '{}' has sector size {}.", name, sector_size),
        );
        context.sector_size = sector_size as u64;

        let mut block_size: libc::c_int = 0;
        match unsafe { blkbszget(fd, &mut block_size) } {
            Ok(_) if block_size != sector_size => {
                wipe_log(
                    LogLevel::Warning,
                    &format!(
                        "Changing '{}' block size from {} to {}.",
                        name, block_size, sector_size
                    ),
                );
                if unsafe { blkbszset(fd, &sector_size) }.is_err() {
                    wipe_log(
                        LogLevel::Warning,
                        &format!("Device '{}' failed BLKBSZSET ioctl.", name),
                    );
                }
            }
            Ok(_) => {}
            Err(_) => {
                wipe_log(
                    LogLevel::Warning,
                    &format!("Device '{}' failed BLKBSZGET ioctl.", name),
                );
            }
        }
    } else {
        context.sector_size = 512;
    }

    // The soft block size always follows the hard sector size.
    context.block_size = context.sector_size;

    // Seek to the end of the device to determine its size.
    let mut handle = &file;
    let seek_size = handle.seek(SeekFrom::End(0)).map_err(|e| {
        wipe_perror(&e, "device_setup", "lseek");
        wipe_log(
            LogLevel::Error,
            &format!("Unable to determine the size of '{}'.", name),
        );
        e
    })?;

    if is_block {
        // Also ask the driver, and insist the two sizes agree.
        let mut driver_size: u64 = 0;
        unsafe { blkgetsize64(fd, &mut driver_size) }.map_err(|e| {
            wipe_log(
                LogLevel::Error,
                &format!("BLKGETSIZE64 failed on '{}'.", name),
            );
            errno_to_io(e)
        })?;

        if driver_size != seek_size {
            wipe_log(
                LogLevel::Error,
                &format!("Last-odd-block detected on '{}'.", name),
            );
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "device size mismatch on '{}': seek says {}, driver says {}",
                    name, seek_size, driver_size
                ),
            ));
        }
    }

    if seek_size == 0 {
        wipe_log(LogLevel::Error, &format!("Device '{}' is size 0.", name));
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("device '{}' has zero size", name),
        ));
    }
    context.device_size = seek_size;
    wipe_log(
        LogLevel::Info,
        &format!("Device '{}' is size {}.", name, seek_size),
    );

    // Reset the file pointer.
    handle.seek(SeekFrom::Start(0)).map_err(|e| {
        wipe_perror(&e, "device_setup", "lseek");
        wipe_log(
            LogLevel::Error,
            &format!("Unable to reset the '{}' file offset.", name),
        );
        e
    })?;

    context.identity = identity_from_sysfs(name).unwrap_or_default();
    context.label = device_label(&context);
    context.device_file = Some(file);

    Ok(context)
}

fn errno_to_io(e: nix::errno::Errno) -> io::Error {
    io::Error::from_raw_os_error(e as i32)
}

/// The string shown to the user for one device.
fn device_label(context: &WipeContext) -> String {
    let model = context.identity.model_no.trim();
    if model.is_empty() {
        format!(
            "{} [{}]",
            context.device_name,
            human_size(context.device_size)
        )
    } else {
        format!(
            "{} [{}] {}",
            context.device_name,
            human_size(context.device_size),
            model
        )
    }
}

/// Read model, serial, and firmware strings from sysfs.
fn identity_from_sysfs(device_name: &str) -> Option<DeviceIdentity> {
    let dev_name = Path::new(device_name).file_name()?.to_str()?;
    let sysfs_path = PathBuf::from(format!("/sys/block/{}", dev_name));
    if !sysfs_path.exists() {
        return None;
    }

    let read_field = |field: &str| {
        fs::read_to_string(sysfs_path.join(field))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    Some(DeviceIdentity {
        model_no: read_field("device/model"),
        serial_no: read_field("device/serial"),
        firmware_rev: read_field("device/firmware_rev"),
    })
}

/// Decimal size with one fraction digit, as disk vendors label them.
fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1000.0 && unit < UNITS.len() - 1 {
        size /= 1000.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

/// Check whether a device is mounted.
pub fn device_is_mounted(device_name: &str) -> bool {
    if let Ok(mounts) = fs::read_to_string("/proc/mounts") {
        for line in mounts.lines() {
            let mut parts = line.split_whitespace();
            if parts.next() == Some(device_name) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_PARTITIONS: &str = "\
major minor  #blocks  name

   8        0  976762584 sda
   8        1     262144 sda1
   8        2  976499200 sda2
 259        0  500107608 nvme0n1
 259        1     524288 nvme0n1p1
";

    #[test]
    fn proc_partitions_parses_names_and_partitions() {
        let devices = parse_partitions(PROC_PARTITIONS);
        assert_eq!(
            devices,
            vec![
                ("/dev/sda".to_string(), 0),
                ("/dev/sda1".to_string(), 1),
                ("/dev/sda2".to_string(), 2),
                ("/dev/nvme0n1".to_string(), 0),
                ("/dev/nvme0n1p1".to_string(), 1),
            ]
        );
    }

    #[test]
    fn file_targets_are_probed_like_devices() {
        let path = std::env::temp_dir().join(format!("dwipe-dev-{}", std::process::id()));
        {
            let f = std::fs::File::create(&path).unwrap();
            f.set_len(8192).unwrap();
        }

        let options = WipeOptions::default();
        let context = device_setup(path.to_str().unwrap(), 0, &options).unwrap();
        assert_eq!(context.device_size, 8192);
        assert_eq!(context.sector_size, 512);
        assert_eq!(context.block_size, context.sector_size);
        assert!(context.device_file.is_some());
        assert!(context.label.contains("8.2 KB"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn zero_size_targets_are_rejected() {
        let path = std::env::temp_dir().join(format!("dwipe-dev0-{}", std::process::id()));
        std::fs::File::create(&path).unwrap();

        let options = WipeOptions::default();
        assert!(device_setup(path.to_str().unwrap(), 0, &options).is_err());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_devices_fail_setup() {
        let options = WipeOptions::default();
        assert!(device_setup("/nonexistent/dwipe-target", 0, &options).is_err());
    }

    #[test]
    fn sizes_render_like_vendor_labels() {
        assert_eq!(human_size(512), "512.0 B");
        assert_eq!(human_size(500_107_608_064), "500.1 GB");
        assert_eq!(human_size(2_000_398_934_016), "2.0 TB");
    }
}
