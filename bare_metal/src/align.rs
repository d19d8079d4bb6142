//! Alignment arithmetic for addresses and sizes.

/// Values that can be rounded to a power-of-two alignment expressed in a
/// (possibly different) numeric type.
pub trait Alignable {
    type Alignment;

    /// Return the smallest multiple of `alignment` that is `>= self`.
    fn align_up(self, alignment: Self::Alignment) -> Self;

    /// Return the largest multiple of `alignment` that is `<= self`.
    fn align_down(self, alignment: Self::Alignment) -> Self;

    /// Whether `self` is already a multiple of `alignment`.
    fn is_aligned(self, alignment: Self::Alignment) -> bool;
}

macro_rules! impl_alignable_int {
    ($($int:ty),*) => {$(
        impl Alignable for $int {
            type Alignment = $int;

            fn align_up(self, alignment: Self) -> Self {
                if alignment == 0 {
                    return self;
                }
                let mask = alignment - 1;
                assert!(alignment & mask == 0, "alignment must be a power of two");
                let rem = self & mask;
                if rem == 0 {
                    self
                } else {
                    self + (alignment - rem)
                }
            }

            fn align_down(self, alignment: Self) -> Self {
                if alignment == 0 {
                    return self;
                }
                let mask = alignment - 1;
                assert!(alignment & mask == 0, "alignment must be a power of two");
                self & !mask
            }

            fn is_aligned(self, alignment: Self) -> bool {
                self.align_down(alignment) == self
            }
        }
    )*};
}

impl_alignable_int!(u32, u64, usize);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn align_down() {
        assert_eq!(0x1234_u64.align_down(0x1000), 0x1000);
        assert_eq!(0x1000_u64.align_down(0x1000), 0x1000);
        assert_eq!(0x0FFF_u64.align_down(0x1000), 0x0000);

        // zero alignment is the identity
        assert_eq!(0x1234_u64.align_down(0), 0x1234);
        assert_eq!(u64::max_value().align_down(0), u64::max_value());
    }

    #[test]
    fn align_up() {
        assert_eq!(0x1234_u64.align_up(0x1000), 0x2000);
        assert_eq!(0x1000_u64.align_up(0x1000), 0x1000);
        assert_eq!(0x0001_u64.align_up(0x1000), 0x1000);
        assert_eq!(0x0000_u64.align_up(0x1000), 0x0000);

        // zero alignment is the identity
        assert_eq!(0x1234_u64.align_up(0), 0x1234);
        assert_eq!(u64::max_value().align_up(0), u64::max_value());
    }

    #[test]
    fn aligned_check() {
        assert!(0x2000_u64.is_aligned(0x1000));
        assert!(!0x2001_u64.is_aligned(0x1000));
        assert!(0_usize.is_aligned(0x1000));
    }

    #[test]
    #[should_panic]
    fn non_power_of_two() {
        let _ = 0x1234_u64.align_up(48);
    }
}
