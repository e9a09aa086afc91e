/*
 *  prng.rs: Pseudo Random Number Generator abstractions for dwipe.
 *
 *  Copyright Darik Horn <dajhorn-dban@vanadac.com>.
 *  Modifications to original dwipe Copyright Andy Beverley <andy@andybev.com>
 *
 *  This program is free software; you can redistribute it and/or modify it under
 *  the terms of the GNU General Public License as published by the Free Software
 *  Foundation, version 2.
 */

use rand::{RngCore, SeedableRng};
use rand_isaac::IsaacRng;
use rand_mt::Mt;

/// The label of the process entropy source.
pub const ENTROPY_LABEL: &str = "Linux Kernel (urandom)";

/// The available PRNG implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrngKind {
    /// The 32-bit Mersenne Twister.
    MersenneTwister,
    /// Bob Jenkins' ISAAC.
    Isaac,
}

impl PrngKind {
    /// Look up a PRNG by any of its command line names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mersenne" | "twister" => Some(PrngKind::MersenneTwister),
            "isaac" => Some(PrngKind::Isaac),
            _ => None,
        }
    }

    /// The name of the pseudo random number generator.
    pub fn label(&self) -> &'static str {
        match self {
            PrngKind::MersenneTwister => "Mersenne Twister (MT19937)",
            PrngKind::Isaac => "ISAAC",
        }
    }

    /// Seed a fresh generator state. Seeding twice with the same entropy
    /// yields byte-identical streams, which the verify passes rely on.
    pub fn init(&self, seed: &[u8]) -> PrngState {
        match self {
            PrngKind::MersenneTwister => {
                let words: Vec<u32> = seed
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                if words.is_empty() {
                    PrngState::Twister(Mt::default())
                } else {
                    PrngState::Twister(Mt::new_with_key(words))
                }
            }
            PrngKind::Isaac => {
                // Take the minimum of the ISAAC seed size and available
                // entropy; an empty seed starts ISAAC unseeded.
                let mut s = [0u8; 32];
                let n = seed.len().min(s.len());
                s[..n].copy_from_slice(&seed[..n]);
                PrngState::Isaac(IsaacRng::from_seed(s))
            }
        }
    }
}

/// The private internal state of a seeded PRNG.
pub enum PrngState {
    Twister(Mt),
    Isaac(IsaacRng),
}

impl PrngState {
    /// Fill the buffer from the generator stream.
    pub fn read(&mut self, buf: &mut [u8]) {
        match self {
            PrngState::Twister(rng) => {
                // The twister returns four bytes per call, packed little
                // endian. Each trailing byte takes the low byte of one more
                // draw; the rest of that word is discarded.
                let words = buf.len() / 4;
                for i in 0..words {
                    buf[4 * i..4 * i + 4].copy_from_slice(&rng.next_u32().to_le_bytes());
                }
                let remain = buf.len() % 4;
                let len = buf.len();
                for i in 1..=remain {
                    buf[len - i] = rng.next_u32() as u8;
                }
            }
            PrngState::Isaac(rng) => rng.fill_bytes(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(kind: PrngKind, seed: &[u8], n: usize) -> Vec<u8> {
        let mut state = kind.init(seed);
        let mut buf = vec![0u8; n];
        state.read(&mut buf);
        buf
    }

    #[test]
    fn twister_reseed_is_deterministic() {
        let seed: Vec<u8> = (0u8..=255).cycle().take(512).collect();
        let a = stream(PrngKind::MersenneTwister, &seed, 8192);
        let b = stream(PrngKind::MersenneTwister, &seed, 8192);
        assert_eq!(a, b);
        assert_ne!(a, vec![0u8; 8192]);
    }

    #[test]
    fn twister_streams_differ_across_seeds() {
        let a = stream(PrngKind::MersenneTwister, &[1u8; 512], 512);
        let b = stream(PrngKind::MersenneTwister, &[2u8; 512], 512);
        assert_ne!(a, b);
    }

    #[test]
    fn twister_packs_whole_words_little_endian() {
        let seed = [7u8; 16];
        let buf = stream(PrngKind::MersenneTwister, &seed, 8);

        let words: Vec<u32> = seed
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let mut rng = Mt::new_with_key(words);
        let mut expected = Vec::new();
        expected.extend_from_slice(&rng.next_u32().to_le_bytes());
        expected.extend_from_slice(&rng.next_u32().to_le_bytes());
        assert_eq!(buf, expected);
    }

    #[test]
    fn twister_fills_the_tail_from_fresh_draws() {
        let seed = [9u8; 16];
        let buf = stream(PrngKind::MersenneTwister, &seed, 6);

        let words: Vec<u32> = seed
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let mut rng = Mt::new_with_key(words);
        let word = rng.next_u32().to_le_bytes();
        // Tail bytes are written back to front, one draw each.
        let tail_hi = rng.next_u32() as u8;
        let tail_lo = rng.next_u32() as u8;
        assert_eq!(&buf[..4], &word);
        assert_eq!(buf[5], tail_hi);
        assert_eq!(buf[4], tail_lo);
    }

    #[test]
    fn isaac_reseed_is_deterministic() {
        let seed = [0xA5u8; 512];
        let a = stream(PrngKind::Isaac, &seed, 4096);
        let b = stream(PrngKind::Isaac, &seed, 4096);
        assert_eq!(a, b);
        assert_ne!(a, vec![0u8; 4096]);
    }

    #[test]
    fn isaac_uses_at_most_its_seed_buffer() {
        // Entropy beyond the internal seed buffer is ignored.
        let mut long_a = vec![3u8; 64];
        let mut long_b = vec![3u8; 64];
        long_a[40] = 0xEE;
        long_b[40] = 0x11;
        assert_eq!(
            stream(PrngKind::Isaac, &long_a, 256),
            stream(PrngKind::Isaac, &long_b, 256)
        );
    }

    #[test]
    fn isaac_starts_without_entropy() {
        // No entropy still yields a usable stream.
        let a = stream(PrngKind::Isaac, &[], 256);
        assert_ne!(a, vec![0u8; 256]);
    }

    #[test]
    fn prng_names_resolve() {
        assert_eq!(
            PrngKind::from_name("mersenne"),
            Some(PrngKind::MersenneTwister)
        );
        assert_eq!(
            PrngKind::from_name("twister"),
            Some(PrngKind::MersenneTwister)
        );
        assert_eq!(PrngKind::from_name("isaac"), Some(PrngKind::Isaac));
        assert_eq!(PrngKind::from_name("fortuna"), None);
    }
}
