//! Hash collections used throughout Astrelis.
//!
//! The engine never hashes untrusted keys on its hot paths, so the default
//! collections use AHash instead of SipHash.

pub use ahash::{AHashMap as HashMap, AHashSet as HashSet};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collections_behave_like_std() {
        let mut map: HashMap<&str, usize> = HashMap::with_capacity(16);
        assert!(map.capacity() >= 16);
        map.insert("texture", 4);
        assert_eq!(map.get("texture"), Some(&4));

        let mut set = HashSet::default();
        assert!(set.insert(7u32));
        assert!(!set.insert(7u32));
    }
}
