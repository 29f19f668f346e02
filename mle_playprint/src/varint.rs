//! Variable-length indices used as opcode arguments.
//!
//! An index is written as big-endian groups of 7 bits, one group per byte,
//! with the high bit of every group byte clear. There is no continuation
//! flag: the index ends at the first byte whose high bit is set, which is
//! always the next opcode, or at the end of the stream. The decoder leaves
//! that byte unconsumed. Compiled playprints depend on this exact layout.

/// Bits carried by one group byte.
pub const VALUE_BITS: u32 = 7;

/// Mask of the payload bits in a group byte.
pub const VALUE_MASK: u8 = (1 << VALUE_BITS) - 1;

/// Accumulator bits that must be clear before another group is shifted in.
pub const OVERFLOW_MASK: u32 = 0xfe00_0000;

/// Largest index the format can carry.
pub const MAX_INDEX: u32 = i32::MAX as u32;

/// Returns `true` when `byte` is a group byte rather than a terminator.
pub fn is_group_byte(byte: u8) -> bool {
    byte & 0x80 == 0
}

/// Shifts one more group into `value`; `None` once the result would leave 31 bits.
pub fn accumulate(value: u32, group: u8) -> Option<u32> {
    if value & OVERFLOW_MASK != 0 {
        return None;
    }
    Some((value << VALUE_BITS) | u32::from(group & VALUE_MASK))
}

/// Appends the encoding of `value` to `out`. `None` when it exceeds [`MAX_INDEX`].
pub fn push_index(out: &mut Vec<u8>, value: u32) -> Option<()> {
    if value > MAX_INDEX {
        return None;
    }
    let mut groups = [0u8; 5];
    let mut count = 0;
    let mut rest = value;
    loop {
        groups[count] = (rest as u8) & VALUE_MASK;
        count += 1;
        rest >>= VALUE_BITS;
        if rest == 0 {
            break;
        }
    }
    out.extend(groups[..count].iter().rev());
    Some(())
}

pub fn encode_index(value: u32) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(5);
    push_index(&mut out, value)?;
    Some(out)
}

/// Number of bytes [`push_index`] emits for `value`.
pub fn encoded_len(value: u32) -> usize {
    let bits = 32 - value.leading_zeros();
    (bits.max(1)).div_ceil(VALUE_BITS) as usize
}
