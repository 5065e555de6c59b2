//! Inline caching and dispatch statistics
//!
//! Each send site owns an [`InlineCache`] with two entries, a primary and a
//! fallback. A miss fills the primary entry if empty, otherwise the fallback.
//! Once both are occupied the site is saturated: further misses are resolved
//! by a full lookup and never cached. There is no eviction.

use crate::class::Class;
use crate::invokable::Method;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

/// A (receiver class, resolved method) pair recorded at a send site
#[derive(Clone)]
pub struct CacheEntry {
    pub class: Rc<Class>,
    pub method: Method,
}

/// Outcome of recording a lookup result at a send site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheFill {
    Primary,
    Fallback,
    /// Both entries are taken; nothing was recorded
    Saturated,
}

/// Two-entry per-site cache
#[derive(Default)]
pub struct InlineCache {
    entries: RefCell<[Option<CacheEntry>; 2]>,
}

impl InlineCache {
    /// Method recorded for exactly `class`, checking primary then fallback
    #[inline]
    pub fn lookup(&self, class: &Rc<Class>) -> Option<Method> {
        self.entries
            .borrow()
            .iter()
            .flatten()
            .find(|entry| Rc::ptr_eq(&entry.class, class))
            .map(|entry| entry.method.clone())
    }

    /// Record a lookup result. Only call with a method found by a real
    /// lookup against `class`.
    pub fn fill(&self, class: Rc<Class>, method: Method) -> CacheFill {
        let mut entries = self.entries.borrow_mut();
        let [primary, fallback] = &mut *entries;
        if primary.is_none() {
            *primary = Some(CacheEntry { class, method });
            CacheFill::Primary
        } else if fallback.is_none() {
            *fallback = Some(CacheEntry { class, method });
            CacheFill::Fallback
        } else {
            CacheFill::Saturated
        }
    }

    pub fn occupancy(&self) -> usize {
        self.entries.borrow().iter().flatten().count()
    }

    pub fn is_saturated(&self) -> bool {
        self.occupancy() == 2
    }

    /// Classes currently recorded, primary first
    pub fn classes(&self) -> Vec<Rc<Class>> {
        self.entries
            .borrow()
            .iter()
            .flatten()
            .map(|entry| entry.class.clone())
            .collect()
    }
}

/// Counters describing how sends were resolved
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// `SEND` instructions executed
    pub sends: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Class-hierarchy lookups, from sends, super sends and reflective sends
    pub lookups: u64,
    /// Misses at a site whose two entries were already taken
    pub saturated_misses: u64,
    pub does_not_understand: u64,
    pub unknown_globals: u64,
    pub frames: u64,
    pub non_local_returns: u64,
    pub escaped_blocks: u64,
}

impl DispatchStats {
    /// Fraction of `SEND`s served by an inline cache; 0 when nothing was sent
    pub fn hit_ratio(&self) -> f64 {
        if self.sends == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.sends as f64
        }
    }
}
