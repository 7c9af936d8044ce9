//! Chunked constant storage with an x/z mask.

use std::num::NonZeroUsize;
use awint::ExtAwi;

/// A constant of `width` bits stored as LSB-first 64-bit chunks,
/// together with a parallel x/z mask.
///
/// Bit `i` lives at `value[i / 64] >> (i % 64)`. A set mask bit marks
/// the position as x (unknown) or z (high impedance); only the mask is
/// tracked, the two states are not distinguished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstBits {
    /// Logical width in bits.
    pub width: u32,
    /// Value chunks, LSB first.
    pub value: Vec<u64>,
    /// x/z mask chunks, LSB first.
    pub xz: Vec<u64>,
}

impl ConstBits {
    #[inline]
    fn n_chunks(width: u32) -> usize {
        (width as usize + 63) / 64
    }

    /// All-zero constant of `width` bits.
    pub fn zeros(width: u32) -> ConstBits {
        let n = Self::n_chunks(width);
        ConstBits { width, value: vec![0; n], xz: vec![0; n] }
    }

    /// All-one constant of `width` bits.
    pub fn ones(width: u32) -> ConstBits {
        let mut c = Self::zeros(width);
        for chunk in c.value.iter_mut() {
            *chunk = !0u64;
        }
        let rem = width % 64;
        if rem != 0 {
            if let Some(last) = c.value.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
        c
    }

    /// A constant of up to 64 bits. `v` is truncated to `width`.
    pub fn from_u64(width: u32, v: u64) -> ConstBits {
        assert!(width >= 1 && width <= 64);
        let mask = match width {
            64 => !0u64,
            w => (1u64 << w) - 1,
        };
        ConstBits { width, value: vec![v & mask], xz: vec![0] }
    }

    /// Decode the digit body of a sized literal such as `16'hbeef`.
    ///
    /// `radix` is 2, 8, 10, or 16. x/z digits set the mask; when the
    /// leading digit is x or z it is expanded up to the full width, as
    /// the literal syntax requires. Underscores are skipped. Base-10
    /// literals cannot carry x/z.
    pub fn from_radix_str(width: u32, radix: u8, digits: &[u8]) -> ConstBits {
        let width_nonzero = NonZeroUsize::new(width as usize)
            .expect("zero-width literal");
        let has_xz = digits.iter()
            .any(|c| matches!(c.to_ascii_lowercase(), b'x' | b'z'));
        let (mut value, mut is_xz) = if !has_xz {
            (ExtAwi::from_bytes_radix(None, digits, radix, width_nonzero).unwrap(),
             ExtAwi::zero(width_nonzero))
        } else {
            // decode the x/z digits into mask digits, expanding the
            // highest digit when it is x or z.
            let (radix_full_char, radix_bits) = match radix {
                10 => panic!("base 10 literals cannot have x/z."),
                2 => (b'1', 1usize),
                8 => (b'7', 3),
                16 => (b'f', 4),
                _ => unreachable!(),
            };
            let full_ndigits = (width as usize + radix_bits - 1) / radix_bits;
            let mut tmp_value = vec![b'0'; full_ndigits];
            let mut tmp_is_xz = vec![b'0'; full_ndigits];
            let full_width = NonZeroUsize::new(full_ndigits * radix_bits).unwrap();

            let mut pos = full_ndigits;
            for i in (0..digits.len()).rev() {
                let (d_value, d_is_xz) = match digits[i].to_ascii_lowercase() {
                    b'_' => continue,
                    b'x' => (b'0', radix_full_char),
                    b'z' => (radix_full_char, radix_full_char),
                    num => (num, b'0'),
                };
                pos -= 1;
                tmp_value[pos] = d_value;
                tmp_is_xz[pos] = d_is_xz;
            }
            if pos != 0 && tmp_is_xz[pos] == radix_full_char {
                for i in 0..pos {
                    tmp_value[i] = tmp_value[pos];
                    tmp_is_xz[i] = tmp_is_xz[pos];
                }
            }
            (ExtAwi::from_bytes_radix(None, &tmp_value, radix, full_width).unwrap(),
             ExtAwi::from_bytes_radix(None, &tmp_is_xz, radix, full_width).unwrap())
        };

        let n_chunks = Self::n_chunks(width);
        let mut out = ConstBits {
            width,
            value: Vec::with_capacity(n_chunks),
            xz: Vec::with_capacity(n_chunks),
        };
        for i in 0..n_chunks {
            let w = (width as usize - i * 64).min(64);
            let mask = match w {
                64 => !0u64,
                w => (1u64 << w) - 1,
            };
            out.value.push(value.to_u64() & mask);
            out.xz.push(is_xz.to_u64() & mask);
            if i + 1 != n_chunks {
                value.lshr_(64).unwrap();
                is_xz.lshr_(64).unwrap();
            }
        }
        out
    }

    /// Bit `i` of the value, 0 or 1. x/z positions read as 0.
    #[inline]
    pub fn bit(&self, i: u32) -> u8 {
        ((self.value[(i / 64) as usize] >> (i % 64)) & 1) as u8
    }

    /// Whether bit `i` is masked as x or z.
    #[inline]
    pub fn xz_bit(&self, i: u32) -> bool {
        (self.xz[(i / 64) as usize] >> (i % 64)) & 1 != 0
    }

    /// Whether any bit is masked as x or z.
    pub fn has_xz(&self) -> bool {
        self.xz.iter().any(|c| *c != 0)
    }

    /// The low 32 bits of the value. `Sel` offsets and replicate
    /// counts are read through this.
    #[inline]
    pub fn as_u32(&self) -> u32 {
        self.value.first().copied().unwrap_or(0) as u32
    }
}

#[test]
fn test_const_bits_small() {
    let c = ConstBits::from_u64(8, 0xa5);
    assert_eq!(c.width, 8);
    assert_eq!((0..8).rev().map(|i| c.bit(i)).collect::<Vec<_>>(),
               vec![1, 0, 1, 0, 0, 1, 0, 1]);
    assert!(!c.has_xz());

    let c = ConstBits::from_radix_str(8, 16, b"a5");
    assert_eq!(c.value, vec![0xa5]);

    let c = ConstBits::ones(3);
    assert_eq!(c.value, vec![0b111]);
}

#[test]
fn test_const_bits_chunk_boundaries() {
    // widths right at and around the chunk boundaries.
    for (width, digits, expect) in [
        (32u32, &b"ffffffff"[..], vec![0xffff_ffffu64]),
        (33, b"1ffffffff", vec![0x1_ffff_ffff]),
        (64, b"ffffffffffffffff", vec![!0u64]),
        (65, b"1ffffffffffffffff", vec![!0u64, 1]),
        (128, b"ffffffffffffffffffffffffffffffff", vec![!0u64, !0u64]),
        (129, b"1ffffffffffffffffffffffffffffffff", vec![!0u64, !0u64, 1]),
    ] {
        let c = ConstBits::from_radix_str(width, 16, digits);
        assert_eq!(c.width, width);
        assert_eq!(c.value, expect, "width {}", width);
        assert_eq!(c.bit(width - 1), 1);
    }

    // a sparse value across the first boundary.
    let c = ConstBits::from_radix_str(72, 16, b"8000000000000000a5");
    assert_eq!(c.value, vec![0xa5, 0x80]);
    assert_eq!(c.bit(71), 1);
    assert_eq!(c.bit(70), 0);
    assert_eq!(c.bit(7), 1);
}

#[test]
fn test_const_bits_xz() {
    // leading x expands to the full width.
    let c = ConstBits::from_radix_str(8, 2, b"x1");
    assert!(c.has_xz());
    assert_eq!(c.xz, vec![0b1111_1110]);
    assert_eq!(c.value, vec![0b0000_0001]);
    assert!(c.xz_bit(7));
    assert!(!c.xz_bit(0));

    // z reads back as 1 in the value plane, x as 0.
    let c = ConstBits::from_radix_str(4, 2, b"10zx");
    assert_eq!(c.value, vec![0b1010]);
    assert_eq!(c.xz, vec![0b0011]);

    let c = ConstBits::from_radix_str(68, 16, b"x0000000000000000");
    assert!(c.xz_bit(67));
    assert!(c.xz_bit(64));
    assert!(!c.xz_bit(63));
}
