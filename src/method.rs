/*
 *  method.rs: Method implementations for dwipe.
 *
 *  Copyright Darik Horn <dajhorn-dban@vanadac.com>.
 *  Modifications to original dwipe Copyright Andy Beverley <andy@andybev.com>
 *
 *  This program is free software; you can redistribute it and/or modify it under
 *  the terms of the GNU General Public License as published by the Free Software
 *  Foundation, version 2.
 */

use std::fs::File;
use std::io::{self, Read};
use std::sync::atomic::Ordering;

use crate::context::{PassType, WipeContext};
use crate::logging::{wipe_log, LogLevel};
use crate::options::{WipeOptions, KNOB_PRNG_STATE_LENGTH};
use crate::pass;
use crate::speedring::SpeedSampler;

/// The read-back policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyLevel {
    /// Do not read anything back from the device.
    None,
    /// Check the last pass.
    Last,
    /// Check all passes.
    All,
}

impl VerifyLevel {
    /// Look up a verification level by its command line name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "0" | "off" => Some(VerifyLevel::None),
            "1" | "last" => Some(VerifyLevel::Last),
            "2" | "all" => Some(VerifyLevel::All),
            _ => None,
        }
    }

    /// The name used in result files.
    pub fn label(&self) -> &'static str {
        match self {
            VerifyLevel::None => "off",
            VerifyLevel::Last => "last",
            VerifyLevel::All => "all",
        }
    }
}

/// A wipe pattern: a short byte sequence tiled across each block, or the
/// seeded PRNG stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Static(Vec<u8>),
    Random,
}

/// The available wipe methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipeMethod {
    /// A single zero-fill pass.
    Zero,
    /// A single PRNG stream pass.
    Random,
    /// DoD 5220.22-M passes 1, 2, and 7.
    DodShort,
    /// DoD 5220.22-M, seven passes ending in the blanking pass.
    Dod522022m,
    /// The 35-pass Gutmann wipe.
    Gutmann,
    /// RCMP TSSIT OPS-II with its terminal random pass.
    Ops2,
}

/// The 27 fixed patterns of the Gutmann method, in declared order.
const GUTMANN_PATTERNS: [[u8; 3]; 27] = [
    [0x55, 0x55, 0x55],
    [0xAA, 0xAA, 0xAA],
    [0x92, 0x49, 0x24],
    [0x49, 0x24, 0x92],
    [0x24, 0x92, 0x49],
    [0x00, 0x00, 0x00],
    [0x11, 0x11, 0x11],
    [0x22, 0x22, 0x22],
    [0x33, 0x33, 0x33],
    [0x44, 0x44, 0x44],
    [0x55, 0x55, 0x55],
    [0x66, 0x66, 0x66],
    [0x77, 0x77, 0x77],
    [0x88, 0x88, 0x88],
    [0x99, 0x99, 0x99],
    [0xAA, 0xAA, 0xAA],
    [0xBB, 0xBB, 0xBB],
    [0xCC, 0xCC, 0xCC],
    [0xDD, 0xDD, 0xDD],
    [0xEE, 0xEE, 0xEE],
    [0xFF, 0xFF, 0xFF],
    [0x92, 0x49, 0x24],
    [0x49, 0x24, 0x92],
    [0x24, 0x92, 0x49],
    [0x6D, 0xB6, 0xDB],
    [0xB6, 0xDB, 0x6D],
    [0xDB, 0x6D, 0xB6],
];

impl WipeMethod {
    /// Look up a method by any of its command line names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "zero" | "quick" => Some(WipeMethod::Zero),
            "random" | "prng" | "stream" => Some(WipeMethod::Random),
            "dodshort" | "dod3pass" => Some(WipeMethod::DodShort),
            "dod522022m" | "dod" => Some(WipeMethod::Dod522022m),
            "gutmann" => Some(WipeMethod::Gutmann),
            "ops2" => Some(WipeMethod::Ops2),
            _ => None,
        }
    }

    /// The label shown to the user and written to result files.
    pub fn label(&self) -> &'static str {
        match self {
            WipeMethod::Zero => "Quick Erase",
            WipeMethod::Random => "PRNG Stream",
            WipeMethod::DodShort => "DoD Short",
            WipeMethod::Dod522022m => "DoD 5220.22-M",
            WipeMethod::Gutmann => "Gutmann Wipe",
            WipeMethod::Ops2 => "RCMP TSSIT OPS-II",
        }
    }

    /// Whether this method appends the OPS-II terminal stream pass.
    pub fn final_ops2(&self) -> bool {
        matches!(self, WipeMethod::Ops2)
    }

    /// Whether this method's pattern list terminates in the blanking pass.
    pub fn ends_blank(&self) -> bool {
        matches!(self, WipeMethod::Dod522022m)
    }

    /// The number of passes one round performs, counting the OPS-II
    /// terminal pass and not counting verifications.
    pub fn pass_count(&self) -> usize {
        match self {
            WipeMethod::Zero | WipeMethod::Random => 1,
            WipeMethod::DodShort => 3,
            WipeMethod::Dod522022m => 7,
            WipeMethod::Gutmann => 35,
            WipeMethod::Ops2 => 7,
        }
    }

    /// Build the ordered pattern list. Methods with random characters draw
    /// them from the entropy source.
    pub fn build_patterns(&self, entropy: &mut impl Read) -> io::Result<Vec<Pattern>> {
        let patterns = match self {
            WipeMethod::Zero => vec![Pattern::Static(vec![0x00])],
            WipeMethod::Random => vec![Pattern::Random],
            WipeMethod::DodShort => {
                let mut c = [0u8; 1];
                entropy.read_exact(&mut c)?;
                vec![
                    Pattern::Static(vec![c[0]]),
                    Pattern::Static(vec![!c[0]]),
                    Pattern::Random,
                ]
            }
            WipeMethod::Dod522022m => {
                let mut c = [0u8; 2];
                entropy.read_exact(&mut c)?;
                vec![
                    Pattern::Static(vec![c[0]]),
                    Pattern::Static(vec![!c[0]]),
                    Pattern::Random,
                    Pattern::Static(vec![c[1]]),
                    Pattern::Static(vec![!c[1]]),
                    Pattern::Random,
                    Pattern::Static(vec![0x00]),
                ]
            }
            WipeMethod::Gutmann => {
                let mut patterns = Vec::with_capacity(35);
                patterns.extend(std::iter::repeat(Pattern::Random).take(4));
                patterns.extend(
                    GUTMANN_PATTERNS
                        .iter()
                        .map(|p| Pattern::Static(p.to_vec())),
                );
                patterns.extend(std::iter::repeat(Pattern::Random).take(4));
                patterns
            }
            WipeMethod::Ops2 => vec![
                Pattern::Static(vec![0x00]),
                Pattern::Static(vec![0xFF]),
                Pattern::Static(vec![0x00]),
                Pattern::Static(vec![0xFF]),
                Pattern::Static(vec![0x00]),
                Pattern::Static(vec![0xFF]),
            ],
        };
        Ok(patterns)
    }
}

/// Run the selected wipe method on one device. This is the worker entry
/// point; the return value becomes the worker exit code: 0 clean, 1 when
/// non-fatal I/O errors accumulated, -1 on a fatal error.
pub fn run_method(c: &WipeContext, options: &WipeOptions, entropy: &File) -> i32 {
    c.wipe_status.store(1, Ordering::Relaxed);
    wipe_log(
        LogLevel::Notice,
        &format!(
            "Starting a {} wipe of device {}.",
            options.method.label(),
            c.device_name
        ),
    );

    let result = match run_rounds(c, options, entropy) {
        Ok(()) => {
            if c.round_errors.load(Ordering::Relaxed) > 0 {
                1
            } else {
                0
            }
        }
        Err(e) if e.kind() == io::ErrorKind::Interrupted => {
            wipe_log(
                LogLevel::Notice,
                &format!("Wipe of device {} stopped by signal.", c.device_name),
            );
            -1
        }
        Err(e) => {
            wipe_log(
                LogLevel::Error,
                &format!("Wipe of device {} failed: {}", c.device_name, e),
            );
            -1
        }
    };

    c.wipe_status.store(0, Ordering::Relaxed);
    c.result.store(result, Ordering::Relaxed);

    if result == 0 {
        wipe_log(
            LogLevel::Notice,
            &format!("Wipe of device {} completed successfully.", c.device_name),
        );
    }

    result
}

/// The round and pass scheduler: rounds in sequence, patterns in declared
/// order, a verify after each write when the policy asks for it, and the
/// OPS-II terminal pass last.
fn run_rounds(c: &WipeContext, options: &WipeOptions, entropy: &File) -> io::Result<()> {
    let method = options.method;

    let mut entropy_reader = entropy;
    let patterns = method.build_patterns(&mut entropy_reader)?;

    let terminal_size = if method.final_ops2() { c.device_size } else { 0 };
    let round_size =
        options.rounds as u64 * patterns.len() as u64 * c.device_size + terminal_size;

    c.round_count.store(options.rounds, Ordering::Relaxed);
    c.round_working.store(0, Ordering::Relaxed);
    c.round_size.store(round_size, Ordering::Relaxed);
    c.round_done.store(0, Ordering::Relaxed);
    c.round_errors.store(0, Ordering::Relaxed);
    c.verify_errors.store(0, Ordering::Relaxed);
    c.pass_count
        .store(method.pass_count() as i32, Ordering::Relaxed);

    let mut sampler = SpeedSampler::new();
    let mut seed = vec![0u8; KNOB_PRNG_STATE_LENGTH];

    for round in 1..=options.rounds {
        c.round_working.store(round, Ordering::Relaxed);
        let last_round = round == options.rounds;

        for (j, pattern) in patterns.iter().enumerate() {
            let ordinal = (j + 1) as i32;
            let last_pattern = j + 1 == patterns.len() && !method.final_ops2();

            let pass_type = if last_round && last_pattern && method.ends_blank() {
                PassType::FinalBlank
            } else {
                PassType::Write
            };
            c.begin_pass(ordinal, pass_type);

            match pattern {
                Pattern::Static(bytes) => pass::static_pass(c, &mut sampler, bytes)?,
                Pattern::Random => {
                    // Reseed from fresh entropy at the start of the pass and
                    // keep the seed so a verify can replay the same stream.
                    entropy_reader.read_exact(&mut seed)?;
                    let mut prng = c.prng.init(&seed);
                    pass::random_pass(c, &mut sampler, &mut prng)?;
                }
            }

            let verify_now = options.verify == VerifyLevel::All
                || (options.verify == VerifyLevel::Last && last_round && last_pattern);
            if verify_now {
                c.begin_pass(ordinal, PassType::Verify);
                match pattern {
                    Pattern::Static(bytes) => pass::static_verify(c, bytes)?,
                    Pattern::Random => {
                        let mut prng = c.prng.init(&seed);
                        pass::random_verify(c, &mut prng)?;
                    }
                }
            }
        }
    }

    if method.final_ops2() {
        // The terminal stream pass is always verified.
        let ordinal = patterns.len() as i32 + 1;

        c.begin_pass(ordinal, PassType::FinalOps2);
        entropy_reader.read_exact(&mut seed)?;
        let mut prng = c.prng.init(&seed);
        pass::random_pass(c, &mut sampler, &mut prng)?;

        c.begin_pass(ordinal, PassType::Verify);
        let mut prng = c.prng.init(&seed);
        pass::random_verify(c, &mut prng)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn entropy() -> Cursor<Vec<u8>> {
        Cursor::new((0u8..=255).cycle().take(4096).collect())
    }

    #[test]
    fn method_names_resolve_with_aliases() {
        assert_eq!(WipeMethod::from_name("zero"), Some(WipeMethod::Zero));
        assert_eq!(WipeMethod::from_name("quick"), Some(WipeMethod::Zero));
        assert_eq!(WipeMethod::from_name("random"), Some(WipeMethod::Random));
        assert_eq!(WipeMethod::from_name("prng"), Some(WipeMethod::Random));
        assert_eq!(WipeMethod::from_name("stream"), Some(WipeMethod::Random));
        assert_eq!(WipeMethod::from_name("dodshort"), Some(WipeMethod::DodShort));
        assert_eq!(WipeMethod::from_name("dod3pass"), Some(WipeMethod::DodShort));
        assert_eq!(
            WipeMethod::from_name("dod522022m"),
            Some(WipeMethod::Dod522022m)
        );
        assert_eq!(WipeMethod::from_name("dod"), Some(WipeMethod::Dod522022m));
        assert_eq!(WipeMethod::from_name("gutmann"), Some(WipeMethod::Gutmann));
        assert_eq!(WipeMethod::from_name("ops2"), Some(WipeMethod::Ops2));
        assert_eq!(WipeMethod::from_name("vaporize"), None);
    }

    #[test]
    fn verify_levels_resolve() {
        assert_eq!(VerifyLevel::from_name("0"), Some(VerifyLevel::None));
        assert_eq!(VerifyLevel::from_name("off"), Some(VerifyLevel::None));
        assert_eq!(VerifyLevel::from_name("1"), Some(VerifyLevel::Last));
        assert_eq!(VerifyLevel::from_name("last"), Some(VerifyLevel::Last));
        assert_eq!(VerifyLevel::from_name("2"), Some(VerifyLevel::All));
        assert_eq!(VerifyLevel::from_name("all"), Some(VerifyLevel::All));
        assert_eq!(VerifyLevel::from_name("sometimes"), None);
    }

    #[test]
    fn zero_method_is_a_single_zero_pattern() {
        let p = WipeMethod::Zero.build_patterns(&mut entropy()).unwrap();
        assert_eq!(p, vec![Pattern::Static(vec![0x00])]);
    }

    #[test]
    fn dodshort_is_char_complement_stream() {
        let mut e = Cursor::new(vec![0xC3u8]);
        let p = WipeMethod::DodShort.build_patterns(&mut e).unwrap();
        assert_eq!(p.len(), 3);
        assert_eq!(p[0], Pattern::Static(vec![0xC3]));
        assert_eq!(p[1], Pattern::Static(vec![0x3C]));
        assert_eq!(p[2], Pattern::Random);
    }

    #[test]
    fn dod522022m_has_seven_passes_ending_blank() {
        let p = WipeMethod::Dod522022m.build_patterns(&mut entropy()).unwrap();
        assert_eq!(p.len(), 7);
        assert_eq!(p[2], Pattern::Random);
        assert_eq!(p[5], Pattern::Random);
        assert_eq!(p[6], Pattern::Static(vec![0x00]));

        // Passes 2 and 5 are the bitwise complements of passes 1 and 4.
        match (&p[0], &p[1], &p[3], &p[4]) {
            (
                Pattern::Static(a),
                Pattern::Static(na),
                Pattern::Static(b),
                Pattern::Static(nb),
            ) => {
                assert_eq!(na[0], !a[0]);
                assert_eq!(nb[0], !b[0]);
            }
            _ => panic!("unexpected pattern shapes"),
        }
        assert!(WipeMethod::Dod522022m.ends_blank());
        assert!(!WipeMethod::Dod522022m.final_ops2());
    }

    #[test]
    fn gutmann_has_thirty_five_passes() {
        let p = WipeMethod::Gutmann.build_patterns(&mut entropy()).unwrap();
        assert_eq!(p.len(), 35);
        assert!(p[..4].iter().all(|x| *x == Pattern::Random));
        assert!(p[31..].iter().all(|x| *x == Pattern::Random));
        assert_eq!(p[4], Pattern::Static(vec![0x55, 0x55, 0x55]));
        assert_eq!(p[30], Pattern::Static(vec![0xDB, 0x6D, 0xB6]));
    }

    #[test]
    fn ops2_alternates_and_keeps_a_terminal_pass() {
        let p = WipeMethod::Ops2.build_patterns(&mut entropy()).unwrap();
        assert_eq!(p.len(), 6);
        for (i, pattern) in p.iter().enumerate() {
            let expected = if i % 2 == 0 { 0x00 } else { 0xFF };
            assert_eq!(*pattern, Pattern::Static(vec![expected]));
        }
        assert!(WipeMethod::Ops2.final_ops2());
        assert_eq!(WipeMethod::Ops2.pass_count(), 7);
    }
}
