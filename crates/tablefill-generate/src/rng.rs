//! Seeded Mersenne Twister source and the integer/real draws built on it.

use rand::RngCore;

/// MT19937 with `init_genrand` seeding.
pub type Mt19937 = rand_mt::Mt;

const UINT32_SIZE: u64 = 1 << 32;
const UINT53_SIZE: u64 = 1 << 53;
const MAX_SAFE_INTEGER: u64 = UINT53_SIZE - 1;

/// Uniform draws over any `RngCore`, consuming 32-bit words.
///
/// Integer ranges of the form `2^k - 1` are masked, other ranges below
/// `2^32` are reduced by modulo with rejection, and wider ranges (up to
/// `2^53`) combine a masked high word with a full low word.
pub trait Draw: RngCore {
    /// Integer in `[min, max]`; returns `min` when the range is empty.
    fn integer(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let range = (i128::from(max) - i128::from(min)) as u64;
        let offset = if range == u64::from(u32::MAX) {
            u64::from(self.next_u32())
        } else if range < u64::from(u32::MAX) {
            downscale(self, range as u32)
        } else if range == MAX_SAFE_INTEGER {
            uint53(self)
        } else if range < MAX_SAFE_INTEGER {
            upscale(self, range)
        } else if range == u64::MAX {
            self.next_u64()
        } else {
            let ext = range + 1;
            let maximum = ext * (u64::MAX / ext);
            loop {
                let value = self.next_u64();
                if value < maximum {
                    break value % ext;
                }
            }
        };
        (i128::from(min) + i128::from(offset)) as i64
    }

    /// Index into a non-empty collection of `len` items.
    fn index(&mut self, len: usize) -> usize {
        self.integer(0, len.saturating_sub(1) as i64) as usize
    }

    /// Real in `[0, 1)` with 53 bits of precision.
    fn real01(&mut self) -> f64 {
        uint53(self) as f64 / UINT53_SIZE as f64
    }

    /// Real in `[min, max)`.
    fn real(&mut self, min: f64, max: f64) -> f64 {
        min + self.real01() * (max - min)
    }

    /// True with probability `p`.
    fn chance(&mut self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        (self.next_u32() as f64) < p * UINT32_SIZE as f64
    }
}

impl<R: RngCore + ?Sized> Draw for R {}

fn is_power_of_two_minus_one(value: u64) -> bool {
    value & (value + 1) == 0
}

fn downscale<R: RngCore + ?Sized>(rng: &mut R, range: u32) -> u64 {
    if is_power_of_two_minus_one(u64::from(range)) {
        return u64::from(rng.next_u32() & range);
    }
    let ext = u64::from(range) + 1;
    let maximum = ext * (UINT32_SIZE / ext);
    loop {
        let value = u64::from(rng.next_u32());
        if value < maximum {
            return value % ext;
        }
    }
}

fn uint53<R: RngCore + ?Sized>(rng: &mut R) -> u64 {
    let high = u64::from(rng.next_u32() & 0x1f_ffff);
    let low = u64::from(rng.next_u32());
    high * UINT32_SIZE + low
}

fn upscale<R: RngCore + ?Sized>(rng: &mut R, range: u64) -> u64 {
    let ext = range + 1;
    if ext % UINT32_SIZE == 0 {
        let high_range = ext / UINT32_SIZE - 1;
        if is_power_of_two_minus_one(high_range) {
            let high = u64::from(rng.next_u32()) & high_range;
            let low = u64::from(rng.next_u32());
            return high * UINT32_SIZE + low;
        }
    }
    let maximum = ext * (UINT53_SIZE / ext);
    loop {
        let value = uint53(rng);
        if value < maximum {
            return value % ext;
        }
    }
}
