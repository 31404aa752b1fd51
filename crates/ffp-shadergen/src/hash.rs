use xxhash_rust::xxh3::Xxh3;

/// Streams a feature's configuration into a 32-bit hash.
///
/// Every feature starts with its type name so equal payloads from different features never
/// produce the same value by construction.
pub(crate) struct FeatureHasher(Xxh3);

impl FeatureHasher {
    pub(crate) fn new(type_name: &str) -> Self {
        let mut hasher = Xxh3::new();
        hasher.update(type_name.as_bytes());
        Self(hasher)
    }

    pub(crate) fn write_u8(&mut self, v: u8) {
        self.0.update(&[v]);
    }

    pub(crate) fn write_u32(&mut self, v: u32) {
        self.0.update(&v.to_le_bytes());
    }

    pub(crate) fn write_bool(&mut self, v: bool) {
        self.write_u8(v as u8);
    }

    pub(crate) fn write_f32(&mut self, v: f32) {
        // Fold -0.0 into 0.0 so equal configurations hash equally.
        let v = if v == 0.0 { 0.0 } else { v };
        self.write_u32(v.to_bits());
    }

    pub(crate) fn write_f32s(&mut self, values: &[f32]) {
        for v in values {
            self.write_f32(*v);
        }
    }

    pub(crate) fn finish(self) -> u32 {
        let h = self.0.digest();
        (h ^ (h >> 32)) as u32
    }
}

/// Order-sensitive combine in the style of `boost::hash_combine`.
pub(crate) fn hash_combine(seed: u32, value: u32) -> u32 {
    seed ^ value
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_is_order_sensitive() {
        let a = hash_combine(hash_combine(0, 1), 2);
        let b = hash_combine(hash_combine(0, 2), 1);
        assert_ne!(a, b);
    }

    #[test]
    fn type_name_separates_equal_payloads() {
        let mut a = FeatureHasher::new("A");
        a.write_u32(7);
        let mut b = FeatureHasher::new("B");
        b.write_u32(7);
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn signed_zero_hashes_like_zero() {
        let mut a = FeatureHasher::new("F");
        a.write_f32(0.0);
        let mut b = FeatureHasher::new("F");
        b.write_f32(-0.0);
        assert_eq!(a.finish(), b.finish());
    }
}
