// SPDX-License-Identifier: Apache-2.0

//! Fixed-width unsigned bit-vector values.
//!
//! `Bits` is the one value type that flows through constant folding and both
//! simulator back ends. A value is `width` bits wide (width >= 1) and stored
//! least-significant-limb first in 64-bit limbs; all storage bits at index
//! `width` and above are kept zero so limb-wise equality and hashing are
//! value equality.

use std::fmt;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Bits {
    width: usize,
    limbs: Vec<u64>,
}

fn limbs_for(width: usize) -> usize {
    (width + 63) / 64
}

impl Bits {
    pub fn zero(width: usize) -> Self {
        assert!(width >= 1, "Bits width must be >= 1, got {}", width);
        Bits {
            width,
            limbs: vec![0; limbs_for(width)],
        }
    }

    /// Creates a value of the given width; `None` if `value` needs more than
    /// `width` bits.
    pub fn from_u64(width: usize, value: u64) -> Option<Self> {
        let mut result = Self::zero(width);
        result.limbs[0] = value;
        if width < 64 && (value >> width) != 0 {
            return None;
        }
        Some(result)
    }

    /// Creates a value of the given width keeping only the low `width` bits of
    /// `value`.
    pub fn from_u64_trunc(width: usize, value: u64) -> Self {
        let mut result = Self::zero(width);
        result.limbs[0] = value;
        result.mask_excess();
        result
    }

    /// Interprets `value` as a two's complement quantity of the given width.
    /// `None` if the value does not fit. This is a formatting convenience;
    /// nothing inside the engine is signed.
    pub fn from_i64(width: usize, value: i64) -> Option<Self> {
        if value >= 0 {
            return Self::from_u64(width, value as u64);
        }
        if width > 64 {
            // Sign-extend the negative value across all limbs then mask.
            let mut result = Self::zero(width);
            result.limbs.fill(u64::MAX);
            result.limbs[0] = value as u64;
            result.mask_excess();
            return Some(result);
        }
        // The value must survive the round trip through `width` bits.
        if (value >> (width - 1)) != -1 {
            return None;
        }
        Some(Self::from_u64_trunc(width, value as u64))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_zero(&self) -> bool {
        self.limbs.iter().all(|&limb| limb == 0)
    }

    pub fn get_bit(&self, index: usize) -> bool {
        assert!(
            index < self.width,
            "bit index {} out of range for width {}",
            index,
            self.width
        );
        (self.limbs[index / 64] >> (index % 64)) & 1 == 1
    }

    pub fn set_bit(&mut self, index: usize, value: bool) {
        assert!(
            index < self.width,
            "bit index {} out of range for width {}",
            index,
            self.width
        );
        let mask = 1u64 << (index % 64);
        if value {
            self.limbs[index / 64] |= mask;
        } else {
            self.limbs[index / 64] &= !mask;
        }
    }

    /// True if every set bit lies below `width`, i.e. the value is
    /// representable in `width` bits.
    pub fn fits_width(&self, width: usize) -> bool {
        if width >= self.width {
            return true;
        }
        (width..self.width).all(|i| !self.get_bit(i))
    }

    /// The full value when it is representable in 64 bits.
    pub fn to_u64(&self) -> Option<u64> {
        if self.limbs[1..].iter().any(|&limb| limb != 0) {
            return None;
        }
        Some(self.limbs[0])
    }

    /// The low 64 bits of the value.
    pub fn low_u64(&self) -> u64 {
        self.limbs[0]
    }

    /// Two's complement read-out for values up to 64 bits wide. A formatting
    /// convenience only.
    pub fn to_i64(&self) -> Option<i64> {
        if self.width > 64 {
            return None;
        }
        let raw = self.limbs[0];
        if self.width == 64 {
            return Some(raw as i64);
        }
        if self.get_bit(self.width - 1) {
            Some((raw | !((1u64 << self.width) - 1)) as i64)
        } else {
            Some(raw as i64)
        }
    }

    fn mask_excess(&mut self) {
        let rem = self.width % 64;
        if rem != 0 {
            let last = self.limbs.len() - 1;
            self.limbs[last] &= (1u64 << rem) - 1;
        }
    }

    fn binary_limbwise(&self, rhs: &Self, f: impl Fn(u64, u64) -> u64) -> Self {
        debug_assert_eq!(self.width, rhs.width, "width mismatch in bitwise op");
        let limbs = self
            .limbs
            .iter()
            .zip(rhs.limbs.iter())
            .map(|(&a, &b)| f(a, b))
            .collect();
        let mut result = Bits {
            width: self.width,
            limbs,
        };
        result.mask_excess();
        result
    }

    pub fn and(&self, rhs: &Self) -> Self {
        self.binary_limbwise(rhs, |a, b| a & b)
    }

    pub fn or(&self, rhs: &Self) -> Self {
        self.binary_limbwise(rhs, |a, b| a | b)
    }

    pub fn xor(&self, rhs: &Self) -> Self {
        self.binary_limbwise(rhs, |a, b| a ^ b)
    }

    pub fn not(&self) -> Self {
        let mut result = Bits {
            width: self.width,
            limbs: self.limbs.iter().map(|&limb| !limb).collect(),
        };
        result.mask_excess();
        result
    }

    /// Keeps the low `new_width` bits.
    pub fn truncate(&self, new_width: usize) -> Self {
        assert!(
            new_width <= self.width,
            "truncate to {} from narrower width {}",
            new_width,
            self.width
        );
        let mut result = Bits {
            width: new_width,
            limbs: self.limbs[..limbs_for(new_width)].to_vec(),
        };
        result.mask_excess();
        result
    }

    pub fn zext(&self, new_width: usize) -> Self {
        assert!(
            new_width >= self.width,
            "zext to {} from wider width {}",
            new_width,
            self.width
        );
        let mut limbs = self.limbs.clone();
        limbs.resize(limbs_for(new_width), 0);
        Bits {
            width: new_width,
            limbs,
        }
    }

    /// Truncates or zero-extends to exactly `width`.
    pub fn with_width(&self, width: usize) -> Self {
        if width <= self.width {
            self.truncate(width)
        } else {
            self.zext(width)
        }
    }

    /// `(self + rhs) mod 2^out_width`; operands are read as unsigned and may
    /// be narrower than `out_width`.
    pub fn add_mod(&self, rhs: &Self, out_width: usize) -> Self {
        debug_assert_eq!(self.width, rhs.width, "width mismatch in add");
        let mut result = Bits::zero(out_width);
        let mut carry = 0u64;
        for i in 0..result.limbs.len() {
            let a = self.limbs.get(i).copied().unwrap_or(0);
            let b = rhs.limbs.get(i).copied().unwrap_or(0);
            let sum = (a as u128) + (b as u128) + (carry as u128);
            result.limbs[i] = sum as u64;
            carry = (sum >> 64) as u64;
        }
        result.mask_excess();
        result
    }

    /// `(self - rhs) mod 2^out_width`, computed as `self + !rhs + 1` over
    /// `out_width` bits.
    pub fn sub_mod(&self, rhs: &Self, out_width: usize) -> Self {
        debug_assert_eq!(self.width, rhs.width, "width mismatch in sub");
        let mut result = Bits::zero(out_width);
        let mut carry = 1u64;
        for i in 0..result.limbs.len() {
            let a = self.limbs.get(i).copied().unwrap_or(0);
            // The complement must cover the full output width, so limbs past
            // the operand's storage complement to all-ones.
            let b = !rhs.limbs.get(i).copied().unwrap_or(0);
            let sum = (a as u128) + (b as u128) + (carry as u128);
            result.limbs[i] = sum as u64;
            carry = (sum >> 64) as u64;
        }
        result.mask_excess();
        result
    }

    /// `(self * rhs) mod 2^out_width` via schoolbook limb products.
    pub fn mul_mod(&self, rhs: &Self, out_width: usize) -> Self {
        debug_assert_eq!(self.width, rhs.width, "width mismatch in mul");
        let out_limbs = limbs_for(out_width);
        let mut acc = vec![0u64; out_limbs];
        for (i, &a) in self.limbs.iter().enumerate() {
            if i >= out_limbs || a == 0 {
                continue;
            }
            let mut carry = 0u128;
            for (j, &b) in rhs.limbs.iter().enumerate() {
                if i + j >= out_limbs {
                    break;
                }
                let t = (a as u128) * (b as u128) + (acc[i + j] as u128) + carry;
                acc[i + j] = t as u64;
                carry = t >> 64;
            }
            let mut k = i + rhs.limbs.len();
            while carry != 0 && k < out_limbs {
                let t = (acc[k] as u128) + carry;
                acc[k] = t as u64;
                carry = t >> 64;
                k += 1;
            }
        }
        let mut result = Bits {
            width: out_width,
            limbs: acc,
        };
        result.mask_excess();
        result
    }

    /// Unsigned less-than.
    pub fn ult(&self, rhs: &Self) -> bool {
        debug_assert_eq!(self.width, rhs.width, "width mismatch in compare");
        for (&a, &b) in self.limbs.iter().zip(rhs.limbs.iter()).rev() {
            if a != b {
                return a < b;
            }
        }
        false
    }

    /// Unsigned greater-than.
    pub fn ugt(&self, rhs: &Self) -> bool {
        rhs.ult(self)
    }

    /// Concatenates with `msbs` in the high bits and `lsbs` in the low bits.
    pub fn concat(msbs: &Self, lsbs: &Self) -> Self {
        let mut result = Bits::zero(msbs.width + lsbs.width);
        for i in 0..lsbs.width {
            result.set_bit(i, lsbs.get_bit(i));
        }
        for i in 0..msbs.width {
            result.set_bit(lsbs.width + i, msbs.get_bit(i));
        }
        result
    }

    /// Gathers arbitrary (possibly repeated) bit positions; result bit `i` is
    /// source bit `indices[i]`.
    pub fn select(&self, indices: &[usize]) -> Self {
        assert!(!indices.is_empty(), "select requires at least one index");
        let mut result = Bits::zero(indices.len());
        for (i, &index) in indices.iter().enumerate() {
            result.set_bit(i, self.get_bit(index));
        }
        result
    }

    /// The `width` bits starting at bit `start`.
    pub fn slice(&self, start: usize, width: usize) -> Self {
        let indices: Vec<usize> = (start..start + width).collect();
        self.select(&indices)
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bits[{}]:0x", self.width)?;
        let mut started = false;
        for &limb in self.limbs.iter().rev() {
            if started {
                write!(f, "{:016x}", limb)?;
            } else if limb != 0 || self.limbs.len() == 1 {
                write!(f, "{:x}", limb)?;
                started = true;
            }
        }
        if !started && self.limbs.len() > 1 {
            write!(f, "0")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_u64_range_check() {
        assert!(Bits::from_u64(4, 15).is_some());
        assert!(Bits::from_u64(4, 16).is_none());
        assert_eq!(Bits::from_u64_trunc(4, 0x1f).to_u64(), Some(0xf));
    }

    #[test]
    fn test_add_with_carry_out_bit() {
        let a = Bits::from_u64(8, 0xff).unwrap();
        let b = Bits::from_u64(8, 1).unwrap();
        // Natural width for an 8-bit add is 9 bits: carry visible.
        assert_eq!(a.add_mod(&b, 9).to_u64(), Some(0x100));
        // Truncated back to 8 bits the carry is dropped.
        assert_eq!(a.add_mod(&b, 8).to_u64(), Some(0));
    }

    #[test]
    fn test_sub_wraps() {
        let a = Bits::from_u64(8, 3).unwrap();
        let b = Bits::from_u64(8, 5).unwrap();
        assert_eq!(a.sub_mod(&b, 9).to_u64(), Some(510));
        assert_eq!(a.sub_mod(&b, 8).to_u64(), Some(254));
        assert_eq!(b.sub_mod(&a, 8).to_u64(), Some(2));
    }

    #[test]
    fn test_mul_truncates() {
        let a = Bits::from_u64(8, 200).unwrap();
        let b = Bits::from_u64(8, 3).unwrap();
        assert_eq!(a.mul_mod(&b, 16).to_u64(), Some(600));
        assert_eq!(a.mul_mod(&b, 8).to_u64(), Some(600 & 0xff));
    }

    #[test]
    fn test_wide_arithmetic_crosses_limbs() {
        let a = Bits::from_u64(70, u64::MAX).unwrap().zext(70);
        let b = Bits::from_u64(70, 1).unwrap();
        let sum = a.add_mod(&b, 71);
        assert!(sum.get_bit(64));
        assert!(!sum.get_bit(0));

        let x = Bits::from_u64(96, u64::MAX).unwrap();
        let product = x.mul_mod(&x, 192);
        // (2^64 - 1)^2 = 2^128 - 2^65 + 1
        assert!(product.get_bit(0));
        assert!(!product.get_bit(64));
        assert!(product.get_bit(127));
    }

    #[test]
    fn test_compares() {
        let a = Bits::from_u64(8, 3).unwrap();
        let b = Bits::from_u64(8, 5).unwrap();
        assert!(a.ult(&b));
        assert!(!b.ult(&a));
        assert!(b.ugt(&a));
        assert!(!a.ult(&a));
    }

    #[test]
    fn test_concat_and_select() {
        let hi = Bits::from_u64(4, 0b1010).unwrap();
        let lo = Bits::from_u64(4, 0b0011).unwrap();
        let cat = Bits::concat(&hi, &lo);
        assert_eq!(cat.to_u64(), Some(0b1010_0011));
        assert_eq!(cat.slice(2, 4).to_u64(), Some(0b1000));
        // Repeats are legal.
        assert_eq!(cat.select(&[0, 0, 1]).to_u64(), Some(0b011));
    }

    #[test]
    fn test_fits_width() {
        let v = Bits::from_u64(8, 0b101).unwrap();
        assert!(v.fits_width(3));
        assert!(!v.fits_width(2));
        assert!(Bits::zero(8).fits_width(1));
    }

    #[test]
    fn test_signed_round_trip() {
        let v = Bits::from_i64(8, -3).unwrap();
        assert_eq!(v.to_u64(), Some(253));
        assert_eq!(v.to_i64(), Some(-3));
        assert!(Bits::from_i64(4, -9).is_none());
        assert_eq!(Bits::from_i64(4, -8).unwrap().to_i64(), Some(-8));
    }

    #[test]
    fn test_not_masks_excess() {
        let v = Bits::from_u64(4, 0b0101).unwrap();
        assert_eq!(v.not().to_u64(), Some(0b1010));
    }
}
