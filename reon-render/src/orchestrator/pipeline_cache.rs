//! pipeline 排列的 memo 缓存
//!
//! key 是材质的 feature 位掩码，首次遇到某个排列时同步编译并缓存，
//! 之后的帧直接复用。启动时可以用常见排列预热，避免运行中卡顿。

use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use reon_gfx::error::RenderResult;

pub struct PermutationCache<K, V> {
    entries: HashMap<K, Rc<V>>,
    compile_count: usize,
}

impl<K: Eq + Hash + Copy, V> Default for PermutationCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            compile_count: 0,
        }
    }
}

impl<K: Eq + Hash + Copy, V> PermutationCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 命中缓存直接返回，否则调用 create 编译并缓存
    ///
    /// create 失败时不缓存任何东西，下一帧会重试
    pub fn get_or_create(&mut self, key: K, create: impl FnOnce() -> RenderResult<V>) -> RenderResult<Rc<V>> {
        if let Some(cached) = self.entries.get(&key) {
            return Ok(cached.clone());
        }
        let value = Rc::new(create()?);
        self.compile_count += 1;
        self.entries.insert(key, value.clone());
        Ok(value)
    }

    #[inline]
    pub fn get(&self, key: K) -> Option<Rc<V>> {
        self.entries.get(&key).cloned()
    }

    /// 启动时预热一批常见排列
    pub fn warm(&mut self, keys: &[K], mut create: impl FnMut(K) -> RenderResult<V>) -> RenderResult<()> {
        for &key in keys {
            self.get_or_create(key, || create(key))?;
        }
        Ok(())
    }

    /// 已经编译过的排列数量
    #[inline]
    pub fn compile_count(&self) -> usize {
        self.compile_count
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 取出所有缓存项，resize 等场景下由调用方逐个销毁
    pub fn drain(&mut self) -> impl Iterator<Item = (K, Rc<V>)> + '_ {
        self.entries.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reon_gfx::error::RenderError;

    #[test]
    fn second_lookup_does_not_recompile() {
        let mut cache: PermutationCache<u32, String> = PermutationCache::new();
        let first = cache.get_or_create(0b11, || Ok("compiled".to_string())).unwrap();
        let second = cache.get_or_create(0b11, || panic!("must not compile twice")).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(cache.compile_count(), 1);
    }

    #[test]
    fn distinct_keys_compile_separately() {
        let mut cache: PermutationCache<u32, u32> = PermutationCache::new();
        cache.get_or_create(1, || Ok(10)).unwrap();
        cache.get_or_create(2, || Ok(20)).unwrap();
        assert_eq!(cache.compile_count(), 2);
        assert_eq!(*cache.get(2).unwrap(), 20);
    }

    #[test]
    fn failed_compile_is_not_cached() {
        let mut cache: PermutationCache<u32, u32> = PermutationCache::new();
        let err = cache.get_or_create(5, || Err(RenderError::Unsupported("boom")));
        assert!(err.is_err());
        assert_eq!(cache.compile_count(), 0);
        // 重试会再次触发编译
        cache.get_or_create(5, || Ok(42)).unwrap();
        assert_eq!(cache.compile_count(), 1);
    }

    #[test]
    fn warm_precompiles_listed_keys() {
        let mut cache: PermutationCache<u32, u32> = PermutationCache::new();
        cache.warm(&[0, 1, 3], |key| Ok(key * 2)).unwrap();
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.compile_count(), 3);
        cache.get_or_create(1, || panic!("warmed key must hit cache")).unwrap();
    }
}
