// Tue Oct 20 2026 - Alex

/// Bits needed to hold `value`. Zero needs zero bits.
pub fn bit_count(value: u64) -> u32 {
    u64::BITS - value.leading_zeros()
}

/// Largest value that fits in `bits` bits.
pub fn max_for_bits(bits: u32) -> u64 {
    match bits {
        0 => 0,
        b if b >= 64 => u64::MAX,
        b => (1u64 << b) - 1,
    }
}

/// Packs fields least significant bit first into a fixed byte slice.
pub struct BitWriter<'a> {
    buf: &'a mut [u8],
    bit: usize,
}

impl<'a> BitWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, bit: 0 }
    }

    /// Caller guarantees `value` fits in `width` bits and the slice has room.
    pub fn write(&mut self, mut value: u64, width: u32) {
        let mut remaining = width as usize;
        while remaining > 0 {
            let byte = self.bit / 8;
            let shift = self.bit % 8;
            let take = (8 - shift).min(remaining);
            let mask = ((1u16 << take) - 1) as u8;
            self.buf[byte] |= ((value as u8) & mask) << shift;
            value >>= take;
            self.bit += take;
            remaining -= take;
        }
    }

    pub fn position(&self) -> usize {
        self.bit
    }
}

pub struct BitReader<'a> {
    buf: &'a [u8],
    bit: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, bit: 0 }
    }

    pub fn read(&mut self, width: u32) -> u64 {
        let mut value = 0u64;
        let mut filled = 0usize;
        let width = width as usize;
        while filled < width {
            let byte = self.bit / 8;
            let shift = self.bit % 8;
            let take = (8 - shift).min(width - filled);
            let mask = ((1u16 << take) - 1) as u8;
            let bits = (self.buf.get(byte).copied().unwrap_or(0) >> shift) & mask;
            value |= (bits as u64) << filled;
            self.bit += take;
            filled += take;
        }
        value
    }
}
