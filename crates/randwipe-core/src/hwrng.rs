//! Hardware RNG used as an XOR combiner input for produced blocks.
//!
//! On x86_64 this is the RDRAND instruction, detected at runtime via CPUID.
//! RDRAND reads the processor's DRBG and can transiently underflow, in which
//! case the carry flag is clear and the read is retried a bounded number of
//! times. Other architectures report the source as unavailable and the
//! stream stage falls back to cipher keystream alone.

/// Retries per 64-bit word before giving up on a transient underflow.
#[cfg(target_arch = "x86_64")]
const RDRAND_RETRIES: usize = 10;

#[cfg(target_arch = "x86_64")]
cpufeatures::new!(cpuid_rdrand, "rdrand");

/// Handle to a runtime-detected hardware random source.
///
/// Only obtainable through [`detect`], so holding one implies the
/// instruction is present.
pub struct HwRng {
    _private: (),
}

/// Probe the CPU for a usable hardware random source.
#[cfg(target_arch = "x86_64")]
pub fn detect() -> Option<HwRng> {
    cpuid_rdrand::get().then_some(HwRng { _private: () })
}

/// Probe the CPU for a usable hardware random source.
#[cfg(not(target_arch = "x86_64"))]
pub fn detect() -> Option<HwRng> {
    None
}

impl HwRng {
    /// Fill `buf` with hardware random bytes.
    ///
    /// Returns `false` if the instruction underflowed past its retry
    /// budget; `buf` may then be partially filled and the remainder is
    /// untouched.
    #[cfg(target_arch = "x86_64")]
    pub fn fill(&self, buf: &mut [u8]) -> bool {
        for chunk in buf.chunks_mut(8) {
            let Some(word) = rdrand_u64() else {
                return false;
            };
            chunk.copy_from_slice(&word.to_le_bytes()[..chunk.len()]);
        }
        true
    }

    /// Fill `buf` with hardware random bytes.
    #[cfg(not(target_arch = "x86_64"))]
    pub fn fill(&self, _buf: &mut [u8]) -> bool {
        // detect() never hands out a handle here.
        false
    }
}

/// One RDRAND read. CF=1 signals success, CF=0 a momentary DRBG underflow.
#[cfg(target_arch = "x86_64")]
fn rdrand_u64() -> Option<u64> {
    for _ in 0..RDRAND_RETRIES {
        let mut value: u64;
        let ok: u8;
        // SAFETY: rdrand writes a register and the carry flag; no memory
        // is touched and the asm block declares both outputs.
        unsafe {
            core::arch::asm!(
                "rdrand {value}",
                "setc {ok}",
                value = out(reg) value,
                ok = out(reg_byte) ok,
                options(nostack, nomem),
            );
        }
        if ok != 0 {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_is_stable() {
        // Detection is a pure CPUID probe; repeated calls agree.
        assert_eq!(detect().is_some(), detect().is_some());
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_fill_produces_nonzero_output() {
        let Some(rng) = detect() else {
            return; // CPU without RDRAND; nothing to test.
        };
        let mut buf = [0u8; 64];
        assert!(rng.fill(&mut buf));
        assert!(buf.iter().any(|&b| b != 0));
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_fill_handles_non_word_lengths() {
        let Some(rng) = detect() else {
            return;
        };
        for len in [1usize, 7, 8, 9, 44] {
            let mut buf = vec![0u8; len];
            assert!(rng.fill(&mut buf));
        }
    }
}
