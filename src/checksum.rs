//! Weak rolling checksum and strong block digest
//!
//! The weak checksum is Adler-32 style:
//! - a = sum of all bytes
//! - b = sum of running sums = n*byte[0] + (n-1)*byte[1] + ... + 1*byte[n-1]
//! - result = (b << 16) | (a & 0xffff)
//!
//! Both components wrap modulo 2^32, which keeps the O(1) window update
//! exact. The strong checksum is BLAKE3.

/// Byte width of an encoded weak checksum
pub const WEAK_CHECKSUM_WIDTH: usize = 4;

/// Byte width of an encoded strong checksum
pub const STRONG_CHECKSUM_WIDTH: usize = blake3::OUT_LEN;

/// BLAKE3 digest of a block
pub type StrongChecksum = [u8; STRONG_CHECKSUM_WIDTH];

/// Compute the weak checksum of a whole buffer
#[inline]
pub fn weak_checksum(data: &[u8]) -> u32 {
    RollingChecksum::new(data).value()
}

/// Compute the strong checksum of a buffer
#[inline]
pub fn strong_checksum(data: &[u8]) -> StrongChecksum {
    *blake3::hash(data).as_bytes()
}

/// Rolling checksum state for O(1) window updates
#[derive(Debug, Clone)]
pub struct RollingChecksum {
    a: u32,
    b: u32,
    window_size: usize,
}

impl RollingChecksum {
    /// Create a rolling checksum over an initial window
    pub fn new(window: &[u8]) -> Self {
        let mut a: u32 = 0;
        let mut b: u32 = 0;

        for &byte in window {
            a = a.wrapping_add(byte as u32);
            b = b.wrapping_add(a);
        }

        Self {
            a,
            b,
            window_size: window.len(),
        }
    }

    /// Current checksum value
    #[inline]
    pub fn value(&self) -> u32 {
        (self.b << 16) | (self.a & 0xffff)
    }

    /// Length of the window this state covers
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Slide the window by one byte: `outgoing` leaves at the front,
    /// `incoming` enters at the back.
    #[inline]
    pub fn roll(&mut self, outgoing: u8, incoming: u8) {
        let old = outgoing as u32;
        let new = incoming as u32;

        self.a = self.a.wrapping_sub(old).wrapping_add(new);
        // b loses window_size * old and gains the new a
        self.b = self
            .b
            .wrapping_sub((self.window_size as u32).wrapping_mul(old))
            .wrapping_add(self.a);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weak_empty() {
        assert_eq!(weak_checksum(b""), 0);
    }

    #[test]
    fn test_weak_single_byte() {
        // a = 97, b = 97
        assert_eq!(weak_checksum(b"a"), (97 << 16) | 97);
    }

    #[test]
    fn test_roll_matches_recompute() {
        let data = b"The quick brown fox jumped over the lazy dog";
        for window in [1usize, 4, 7, 16] {
            let mut rolling = RollingChecksum::new(&data[..window]);
            for pos in 1..=data.len() - window {
                rolling.roll(data[pos - 1], data[pos + window - 1]);
                assert_eq!(
                    rolling.value(),
                    weak_checksum(&data[pos..pos + window]),
                    "window {} at {}",
                    window,
                    pos
                );
            }
        }
    }

    #[test]
    fn test_roll_with_wrapping_sums() {
        // Large window of high bytes pushes b past u32::MAX
        let data = vec![0xFFu8; 70_000];
        let window = 65_536;
        let mut rolling = RollingChecksum::new(&data[..window]);
        rolling.roll(data[0], data[window]);
        assert_eq!(rolling.value(), weak_checksum(&data[1..window + 1]));
    }

    #[test]
    fn test_strong_differs() {
        assert_ne!(strong_checksum(b"abcd"), strong_checksum(b"abce"));
        assert_eq!(strong_checksum(b"abcd").len(), STRONG_CHECKSUM_WIDTH);
    }
}
