/// Number of bits needed to encode any integer in `minimum..=maximum`
///
/// Equal to `ceil(log2(maximum - minimum + 1))`, and 0 when the range holds
/// a single value. Requires `minimum <= maximum`.
pub fn bits_needed(minimum: i64, maximum: i64) -> u32 {
    let span = (maximum as u64).wrapping_sub(minimum as u64);
    u64::BITS - span.leading_zeros()
}
