/*
 *  pass.rs: Routines that read and write patterns to block devices.
 *
 *  Copyright Darik Horn <dajhorn-dban@vanadac.com>.
 *  Modifications to original dwipe Copyright Andy Beverley <andy@andybev.com>
 *
 *  This program is free software; you can redistribute it and/or modify it under
 *  the terms of the GNU General Public License as published by the Free Software
 *  Foundation, version 2.
 */

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::sync::atomic::Ordering;
use std::time::Instant;

use nix::unistd::fsync;

use crate::context::WipeContext;
use crate::engine;
use crate::logging::{wipe_log, wipe_perror, LogLevel};
use crate::prng::PrngState;
use crate::speedring::SpeedSampler;

/// Write a fixed pattern over the whole device, tiling it across each block.
pub fn static_pass(c: &WipeContext, sampler: &mut SpeedSampler, pattern: &[u8]) -> io::Result<()> {
    let tile = tile_block(pattern, c.block_size.max(1) as usize);
    write_blocks(c, sampler, |buf| {
        let n = buf.len();
        buf.copy_from_slice(&tile[..n]);
    })
}

/// Read the device back and compare every block against a fixed pattern.
pub fn static_verify(c: &WipeContext, pattern: &[u8]) -> io::Result<()> {
    let tile = tile_block(pattern, c.block_size.max(1) as usize);
    verify_blocks(c, |buf| {
        let n = buf.len();
        buf.copy_from_slice(&tile[..n]);
    })
}

/// Write the PRNG stream over the whole device.
pub fn random_pass(
    c: &WipeContext,
    sampler: &mut SpeedSampler,
    prng: &mut PrngState,
) -> io::Result<()> {
    write_blocks(c, sampler, |buf| prng.read(buf))
}

/// Read the device back against an identically reseeded PRNG stream. The
/// caller must reseed the generator with the same entropy that fed the
/// preceding write pass; the stream is consumed in the same block order.
pub fn random_verify(c: &WipeContext, prng: &mut PrngState) -> io::Result<()> {
    verify_blocks(c, |buf| prng.read(buf))
}

/// Tile a short pattern across one block. Each block restarts the pattern at
/// its first byte, so write and verify agree on the layout.
fn tile_block(pattern: &[u8], block_size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; block_size];
    for (i, b) in buf.iter_mut().enumerate() {
        *b = pattern[i % pattern.len()];
    }
    buf
}

fn device(c: &WipeContext) -> io::Result<&File> {
    c.device_file.as_ref().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotConnected,
            format!("device '{}' is not open", c.device_name),
        )
    })
}

fn interrupted() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "wipe stopped by signal")
}

/// The block traversal for write passes. Bad blocks are counted and skipped;
/// only the inability to position the device is fatal.
fn write_blocks<F>(c: &WipeContext, sampler: &mut SpeedSampler, mut fill: F) -> io::Result<()>
where
    F: FnMut(&mut [u8]),
{
    let mut file = device(c)?;

    if let Err(e) = file.seek(SeekFrom::Start(0)) {
        wipe_perror(&e, "write_blocks", "lseek");
        wipe_log(
            LogLevel::Error,
            &format!("Unable to reset the '{}' file offset.", c.device_name),
        );
        return Err(e);
    }

    let block_size = c.block_size.max(1) as usize;
    let mut buf = vec![0u8; block_size];
    let mut offset: u64 = 0;

    while offset < c.device_size {
        if engine::terminate_requested() {
            return Err(interrupted());
        }

        let writable = (c.device_size - offset).min(block_size as u64) as usize;
        fill(&mut buf[..writable]);

        match file.write_all(&buf[..writable]) {
            Ok(()) => {
                c.pass_done.fetch_add(writable as u64, Ordering::Relaxed);
                let round_done = c.round_done.fetch_add(writable as u64, Ordering::Relaxed)
                    + writable as u64;
                update_progress(c, sampler, round_done);
            }
            Err(e) => {
                c.pass_errors.fetch_add(1, Ordering::Relaxed);
                c.round_errors.fetch_add(1, Ordering::Relaxed);
                wipe_log(
                    LogLevel::Error,
                    &format!(
                        "Write error on '{}' at offset {}: {}",
                        c.device_name, offset, e
                    ),
                );
                // Skip the bad block and keep going.
                if let Err(e) = file.seek(SeekFrom::Start(offset + block_size as u64)) {
                    wipe_perror(&e, "write_blocks", "lseek");
                    return Err(e);
                }
            }
        }

        offset += block_size as u64;
    }

    c.sync_status.store(true, Ordering::Relaxed);
    if let Err(e) = fsync(file.as_raw_fd()) {
        wipe_log(
            LogLevel::Warning,
            &format!("Unable to flush '{}': {}", c.device_name, e),
        );
    }
    c.sync_status.store(false, Ordering::Relaxed);

    Ok(())
}

/// The block traversal for verify passes. Mismatched blocks are counted in
/// `verify_errors`, unreadable blocks in `pass_errors`.
fn verify_blocks<F>(c: &WipeContext, mut expect: F) -> io::Result<()>
where
    F: FnMut(&mut [u8]),
{
    let mut file = device(c)?;

    if let Err(e) = file.seek(SeekFrom::Start(0)) {
        wipe_perror(&e, "verify_blocks", "lseek");
        wipe_log(
            LogLevel::Error,
            &format!("Unable to reset the '{}' file offset.", c.device_name),
        );
        return Err(e);
    }

    let block_size = c.block_size.max(1) as usize;
    let mut buf = vec![0u8; block_size];
    let mut expected = vec![0u8; block_size];
    let mut offset: u64 = 0;

    while offset < c.device_size {
        if engine::terminate_requested() {
            return Err(interrupted());
        }

        let readable = (c.device_size - offset).min(block_size as u64) as usize;
        expect(&mut expected[..readable]);

        match file.read_exact(&mut buf[..readable]) {
            Ok(()) => {
                if buf[..readable] != expected[..readable] {
                    c.verify_errors.fetch_add(1, Ordering::Relaxed);
                }
                c.pass_done.fetch_add(readable as u64, Ordering::Relaxed);
            }
            Err(e) => {
                c.pass_errors.fetch_add(1, Ordering::Relaxed);
                c.round_errors.fetch_add(1, Ordering::Relaxed);
                wipe_log(
                    LogLevel::Error,
                    &format!(
                        "Read error on '{}' at offset {}: {}",
                        c.device_name, offset, e
                    ),
                );
                if let Err(e) = file.seek(SeekFrom::Start(offset + block_size as u64)) {
                    wipe_perror(&e, "verify_blocks", "lseek");
                    return Err(e);
                }
            }
        }

        offset += block_size as u64;
    }

    Ok(())
}

/// Refresh the percentage, throughput, and ETA after a successful write.
fn update_progress(c: &WipeContext, sampler: &mut SpeedSampler, round_done: u64) {
    let round_size = c.round_size.load(Ordering::Relaxed);
    if round_size == 0 {
        return;
    }

    c.set_round_percent(100.0 * round_done as f64 / round_size as f64);

    if let Some(throughput) = sampler.sample(Instant::now(), round_done) {
        c.throughput.store(throughput, Ordering::Relaxed);
        let remaining = round_size.saturating_sub(round_done);
        c.eta.store(remaining / throughput.max(1), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PassType;
    use std::fs::OpenOptions;
    use std::path::PathBuf;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("dwipe-pass-{}-{}", std::process::id(), name))
    }

    fn file_context(name: &str, size: u64, block_size: u64) -> WipeContext {
        let path = scratch_path(name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .unwrap();
        file.set_len(size).unwrap();

        let mut c = WipeContext::new(path.to_str().unwrap());
        c.device_file = Some(file);
        c.device_size = size;
        c.sector_size = block_size;
        c.block_size = block_size;
        c
    }

    fn read_back(c: &WipeContext) -> Vec<u8> {
        std::fs::read(&c.device_name).unwrap()
    }

    fn cleanup(c: WipeContext) {
        let _ = std::fs::remove_file(&c.device_name);
    }

    #[test]
    fn zero_pass_blanks_an_unaligned_device_exactly() {
        // One megabyte plus one byte: 2048 full blocks and a one-byte tail.
        let size = 1024 * 1024 + 1;
        let c = file_context("unaligned", size, 512);
        let mut sampler = SpeedSampler::new();

        c.begin_pass(1, PassType::Write);
        static_pass(&c, &mut sampler, &[0x00]).unwrap();

        assert_eq!(c.pass_done.load(Ordering::Relaxed), size);
        assert_eq!(c.pass_errors.load(Ordering::Relaxed), 0);

        let contents = read_back(&c);
        assert_eq!(contents.len() as u64, size);
        assert!(contents.iter().all(|&b| b == 0));
        cleanup(c);
    }

    #[test]
    fn one_byte_pattern_tiles_every_block() {
        let c = file_context("tile", 4096, 512);
        let mut sampler = SpeedSampler::new();

        c.begin_pass(1, PassType::Write);
        static_pass(&c, &mut sampler, &[0xAA]).unwrap();

        assert!(read_back(&c).iter().all(|&b| b == 0xAA));

        c.begin_pass(1, PassType::Verify);
        static_verify(&c, &[0xAA]).unwrap();
        assert_eq!(c.verify_errors.load(Ordering::Relaxed), 0);
        assert_eq!(c.pass_done.load(Ordering::Relaxed), 4096);
        cleanup(c);
    }

    #[test]
    fn three_byte_pattern_restarts_at_each_block() {
        let c = file_context("tile3", 1024, 512);
        let mut sampler = SpeedSampler::new();

        c.begin_pass(1, PassType::Write);
        static_pass(&c, &mut sampler, &[0x92, 0x49, 0x24]).unwrap();

        let contents = read_back(&c);
        // Block 0 and block 1 both begin with the first pattern byte.
        assert_eq!(contents[0], 0x92);
        assert_eq!(contents[512], 0x92);
        assert_eq!(contents[513], 0x49);

        c.begin_pass(1, PassType::Verify);
        static_verify(&c, &[0x92, 0x49, 0x24]).unwrap();
        assert_eq!(c.verify_errors.load(Ordering::Relaxed), 0);
        cleanup(c);
    }

    #[test]
    fn verify_counts_a_corrupted_block() {
        let c = file_context("corrupt", 2048, 512);
        let mut sampler = SpeedSampler::new();

        c.begin_pass(1, PassType::Write);
        static_pass(&c, &mut sampler, &[0x55]).unwrap();

        // Flip one byte in the third block.
        {
            let mut file = c.device_file.as_ref().unwrap();
            file.seek(SeekFrom::Start(1030)).unwrap();
            file.write_all(&[0x00]).unwrap();
        }

        c.begin_pass(1, PassType::Verify);
        static_verify(&c, &[0x55]).unwrap();
        assert_eq!(c.verify_errors.load(Ordering::Relaxed), 1);
        assert_eq!(c.pass_done.load(Ordering::Relaxed), 2048);
        cleanup(c);
    }

    #[test]
    fn random_write_and_verify_agree_when_reseeded_identically() {
        use crate::prng::PrngKind;

        let c = file_context("random", 64 * 1024 + 3, 512);
        let mut sampler = SpeedSampler::new();
        let seed = [0x5Au8; 512];

        c.begin_pass(1, PassType::Write);
        let mut prng = PrngKind::MersenneTwister.init(&seed);
        random_pass(&c, &mut sampler, &mut prng).unwrap();

        c.begin_pass(1, PassType::Verify);
        let mut prng = PrngKind::MersenneTwister.init(&seed);
        random_verify(&c, &mut prng).unwrap();

        assert_eq!(c.verify_errors.load(Ordering::Relaxed), 0);
        assert_eq!(c.pass_errors.load(Ordering::Relaxed), 0);
        cleanup(c);
    }

    #[test]
    fn write_errors_are_counted_but_not_fatal() {
        // A read-only handle makes every block write fail.
        let path = scratch_path("readonly");
        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)
                .unwrap();
            file.set_len(2048).unwrap();
        }
        let file = OpenOptions::new().read(true).open(&path).unwrap();

        let mut c = WipeContext::new(path.to_str().unwrap());
        c.device_file = Some(file);
        c.device_size = 2048;
        c.sector_size = 512;
        c.block_size = 512;

        let mut sampler = SpeedSampler::new();
        c.begin_pass(1, PassType::Write);
        static_pass(&c, &mut sampler, &[0x00]).unwrap();

        assert_eq!(c.pass_errors.load(Ordering::Relaxed), 4);
        assert_eq!(c.round_errors.load(Ordering::Relaxed), 4);
        assert_eq!(c.pass_done.load(Ordering::Relaxed), 0);
        let _ = std::fs::remove_file(&path);
    }
}
