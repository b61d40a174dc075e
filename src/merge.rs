//! Ordered-merge join of a primary stream against a sorted auxiliary stream.
//!
//! The caller drives the primary side one key at a time through
//! [`MergeJoiner::advance_to`]; the joiner keeps the auxiliary cursor between
//! calls and never rewinds. Both sides must be sorted ascending by the same key:
//! - auxiliary records whose key is below the requested one are skipped and
//!   dropped (no primary entity for them),
//! - an auxiliary record with an equal key is returned, and returned again for
//!   further primary records with that same key,
//! - a greater key or an exhausted stream gives `None` without moving the cursor.
//!
//! Duplicate auxiliary keys are not detected: the first record wins and the
//! following ones are skipped on the next advance. Keys requested out of order
//! give wrong matches rather than an error; a warning is logged once.

use tracing::warn;

use crate::error::Result;
use crate::metrics;

pub struct MergeJoiner<I, R, K, F>
where
    I: Iterator<Item = Result<R>>,
    F: Fn(&R) -> Result<K>,
    K: Ord + Clone,
{
    stream: &'static str,
    records: I,
    key_fn: F,
    current: Option<(K, R)>,
    position: usize,
    started: bool,
    exhausted: bool,
    last_requested: Option<K>,
    order_warned: bool,
}

impl<I, R, K, F> MergeJoiner<I, R, K, F>
where
    I: Iterator<Item = Result<R>>,
    F: Fn(&R) -> Result<K>,
    K: Ord + Clone + std::fmt::Debug,
{
    pub fn new(stream: &'static str, records: I, key_fn: F) -> Self {
        Self {
            stream,
            records,
            key_fn,
            current: None,
            position: 0,
            started: false,
            exhausted: false,
            last_requested: None,
            order_warned: false,
        }
    }

    /// Move the auxiliary cursor up to `key` and return the record with that key, if any
    pub fn advance_to(&mut self, key: &K) -> Result<Option<&R>> {
        self.check_order(key);

        if !self.started {
            self.started = true;
            self.pull()?;
        }

        loop {
            let behind = match &self.current {
                Some((current_key, _)) => current_key < key,
                None => false,
            };
            if !behind {
                break;
            }
            self.pull()?;
        }

        let found = match &self.current {
            Some((current_key, record)) if current_key == key => Some(record),
            _ => None,
        };
        metrics::join::lookup(self.stream, found.is_some());
        Ok(found)
    }

    /// Number of auxiliary records read so far
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn pull(&mut self) -> Result<()> {
        if self.exhausted {
            return Ok(());
        }
        match self.records.next() {
            Some(record) => {
                let record = record?;
                let key = (self.key_fn)(&record)?;
                self.position += 1;
                self.current = Some((key, record));
            }
            None => {
                self.exhausted = true;
                self.current = None;
            }
        }
        Ok(())
    }

    fn check_order(&mut self, key: &K) {
        if let Some(last) = &self.last_requested {
            if key < last && !self.order_warned {
                warn!(
                    stream = self.stream,
                    "Keys requested out of order ({:?} after {:?}), matches will be wrong",
                    key,
                    last
                );
                self.order_warned = true;
            }
        }
        self.last_requested = Some(key.clone());
    }
}
