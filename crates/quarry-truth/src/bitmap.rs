//! Word-aligned row-id bitmaps.

const WORD_BITS: usize = 64;

/// A set of row ids packed into 64-bit words.
///
/// `and`/`or`/`sub`/`not` allocate a fresh bitmap; `and_with`/`or_with`
/// mutate the receiver. After `not(universe)`, bits at or beyond the
/// universe size are clear, so `count` never sees trailing garbage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    words: Vec<u64>,
}

impl Bitmap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bitmap with every id below `universe` set.
    pub fn full(universe: usize) -> Self {
        Self::new().not(universe)
    }

    /// Sets bit `id`, growing the word array as needed.
    pub fn set(&mut self, id: u32) {
        let word = id as usize / WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (id as usize % WORD_BITS);
    }

    /// Whether bit `id` is set.
    pub fn has(&self, id: u32) -> bool {
        let word = id as usize / WORD_BITS;
        self.words
            .get(word)
            .is_some_and(|w| w & (1u64 << (id as usize % WORD_BITS)) != 0)
    }

    /// Whether no bit is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Number of set bits.
    pub fn count(&self) -> u64 {
        self.words.iter().map(|w| u64::from(w.count_ones())).sum()
    }

    /// Intersection.
    pub fn and(&self, other: &Bitmap) -> Bitmap {
        let len = self.words.len().min(other.words.len());
        let words = (0..len).map(|i| self.words[i] & other.words[i]).collect();
        Bitmap { words }
    }

    /// Union.
    pub fn or(&self, other: &Bitmap) -> Bitmap {
        let len = self.words.len().max(other.words.len());
        let words = (0..len)
            .map(|i| {
                self.words.get(i).copied().unwrap_or(0) | other.words.get(i).copied().unwrap_or(0)
            })
            .collect();
        Bitmap { words }
    }

    /// Difference: bits in `self` and not in `other`.
    pub fn sub(&self, other: &Bitmap) -> Bitmap {
        let words = self
            .words
            .iter()
            .enumerate()
            .map(|(i, w)| w & !other.words.get(i).copied().unwrap_or(0))
            .collect();
        Bitmap { words }
    }

    /// Complement over an explicit universe of `universe` ids; bits at or
    /// beyond the universe boundary come out clear.
    pub fn not(&self, universe: usize) -> Bitmap {
        let len = universe.div_ceil(WORD_BITS);
        let mut words: Vec<u64> = (0..len)
            .map(|i| !self.words.get(i).copied().unwrap_or(0))
            .collect();
        let tail = universe % WORD_BITS;
        if tail != 0
            && let Some(last) = words.last_mut()
        {
            *last &= (1u64 << tail) - 1;
        }
        Bitmap { words }
    }

    /// In-place intersection. The receiver may stay longer than the
    /// argument; the surviving extra words are zeroed so `count` stays
    /// exact.
    pub fn and_with(&mut self, other: &Bitmap) {
        for (i, w) in self.words.iter_mut().enumerate() {
            *w &= other.words.get(i).copied().unwrap_or(0);
        }
    }

    /// In-place union; grows the receiver to the argument's length.
    pub fn or_with(&mut self, other: &Bitmap) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (i, w) in other.words.iter().enumerate() {
            self.words[i] |= w;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn from_ids(ids: &[u32]) -> Bitmap {
        let mut b = Bitmap::new();
        for &id in ids {
            b.set(id);
        }
        b
    }

    #[test]
    fn set_and_has() {
        let b = from_ids(&[0, 63, 64, 1000]);
        assert!(b.has(0));
        assert!(b.has(63));
        assert!(b.has(64));
        assert!(b.has(1000));
        assert!(!b.has(1));
        assert!(!b.has(999));
    }

    #[test]
    fn count_equals_distinct_sets() {
        let mut b = Bitmap::new();
        for id in [5, 5, 7, 64, 7] {
            b.set(id);
        }
        assert_eq!(b.count(), 3);
    }

    #[test]
    fn not_clears_trailing_bits() {
        let b = Bitmap::new().not(70);
        assert_eq!(b.count(), 70);
        assert!(b.has(69));
        assert!(!b.has(70));
        assert!(!b.has(127));
    }

    #[test]
    fn and_with_zeroes_surviving_words() {
        let mut long = from_ids(&[1, 200]);
        let short = from_ids(&[1]);
        long.and_with(&short);
        assert_eq!(long.count(), 1);
        assert!(!long.has(200));
    }

    #[test]
    fn or_with_grows_receiver() {
        let mut b = from_ids(&[1]);
        b.or_with(&from_ids(&[300]));
        assert!(b.has(1));
        assert!(b.has(300));
    }

    proptest! {
        #[test]
        fn algebra_laws(ids in prop::collection::btree_set(0u32..512, 0..64)) {
            let ids: Vec<u32> = ids.into_iter().collect();
            let universe = 512usize;
            let b = from_ids(&ids);

            prop_assert_eq!(b.or(&b), b.clone());
            prop_assert_eq!(b.and(&b), b.clone());
            prop_assert!(b.sub(&b).is_empty());
            prop_assert_eq!(b.not(universe).not(universe), b.clone());
            prop_assert_eq!(b.count() + b.not(universe).count(), universe as u64);
        }

        #[test]
        fn in_place_matches_value_ops(
            left in prop::collection::btree_set(0u32..512, 0..64),
            right in prop::collection::btree_set(0u32..512, 0..64),
        ) {
            let left: Vec<u32> = left.into_iter().collect();
            let right: Vec<u32> = right.into_iter().collect();
            let a = from_ids(&left);
            let b = from_ids(&right);

            let mut and_in_place = a.clone();
            and_in_place.and_with(&b);
            prop_assert_eq!(and_in_place.count(), a.and(&b).count());

            let mut or_in_place = a.clone();
            or_in_place.or_with(&b);
            prop_assert_eq!(or_in_place.count(), a.or(&b).count());
        }
    }
}
