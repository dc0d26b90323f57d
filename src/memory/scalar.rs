// Mon Oct 19 2026 - Alex

/// Fixed-width values that can be moved to and from target memory as raw
/// native-endian bytes.
pub trait Scalar: Copy + Default + PartialEq + Send + Sync + 'static {
    const SIZE: usize;

    fn from_bytes(bytes: &[u8]) -> Self;

    fn write_bytes(&self, out: &mut [u8]);

    fn to_vec(&self) -> Vec<u8> {
        let mut out = vec![0u8; Self::SIZE];
        self.write_bytes(&mut out);
        out
    }
}

macro_rules! impl_scalar {
    ($($t:ty),*) => {
        $(
            impl Scalar for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                fn from_bytes(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$t>::from_ne_bytes(raw)
                }

                fn write_bytes(&self, out: &mut [u8]) {
                    out[..Self::SIZE].copy_from_slice(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_scalar!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64, usize, isize);

impl Scalar for bool {
    const SIZE: usize = 1;

    fn from_bytes(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn write_bytes(&self, out: &mut [u8]) {
        out[0] = *self as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_bytes() {
        let v: u32 = 0xdeadbeef;
        let bytes = v.to_vec();
        assert_eq!(bytes.len(), 4);
        assert_eq!(u32::from_bytes(&bytes), v);
        assert_eq!(f64::from_bytes(&1.5f64.to_vec()), 1.5);
        assert!(bool::from_bytes(&[1]));
    }
}
