use crate::db::{
    direction::Direction,
    index::script::{id_from_member, rank_score},
    store::{
        LexRange, ScoreRange, SortedSetStore, StoreAggregate, StoreError, WeightedKey, Window,
    },
};
use std::{
    cmp::Ordering,
    collections::{BTreeSet, HashMap},
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

///
/// MemoryStore
///
/// In-process sorted-set store with the same ordering, lex-range, and
/// script semantics as the Redis backend. Every operation, scripts
/// included, runs under one lock, so scripts are atomic.
///

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of `(member, score)` pairs in store order.
    #[must_use]
    pub fn entries(&self, key: &str) -> Vec<(Vec<u8>, f64)> {
        let mut state = self.lock();
        state
            .get(key)
            .map(|set| {
                set.ordered
                    .iter()
                    .map(|(score, member)| (member.clone(), score.0))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of members in `key`; absent keys have none.
    #[must_use]
    pub fn len(&self, key: &str) -> usize {
        let mut state = self.lock();
        state.get(key).map_or(0, SortedSet::len)
    }

    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.len(key) > 0
    }

    /// Every live key, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut state = self.lock();
        state.purge_expired(Instant::now());
        let mut keys: Vec<String> = state.sets.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SortedSetStore for MemoryStore {
    fn add(&self, key: &str, score: f64, member: &[u8]) -> Result<(), StoreError> {
        if score.is_nan() {
            return Err(StoreError::Command("score is not a valid float".to_string()));
        }

        let mut state = self.lock();
        state.get_or_create(key).insert(member.to_vec(), score);

        Ok(())
    }

    fn remove(&self, key: &str, member: &[u8]) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let Some(set) = state.get_mut(key) else {
            return Ok(false);
        };
        let removed = set.remove(member);
        state.drop_if_empty(key);

        Ok(removed)
    }

    fn range_by_score(
        &self,
        key: &str,
        range: &ScoreRange,
        direction: Direction,
        window: Window,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut state = self.lock();
        let Some(set) = state.get(key) else {
            return Ok(Vec::new());
        };
        let matching = set
            .iter(direction)
            .filter(|(score, _)| range.contains(score.0))
            .map(|(_, member)| member.clone());

        Ok(window.apply(matching))
    }

    fn card(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self.len(key) as u64)
    }

    fn range_by_rank(
        &self,
        key: &str,
        direction: Direction,
        window: Window,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut state = self.lock();
        let Some(set) = state.get(key) else {
            return Ok(Vec::new());
        };

        Ok(window.apply(set.iter(direction).map(|(_, member)| member.clone())))
    }

    fn extract_ids(
        &self,
        source: &str,
        destination: &str,
        range: &LexRange,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let members = state
            .get(source)
            .map(|set| set.lex_range(range))
            .unwrap_or_default();
        if members.is_empty() {
            return Ok(());
        }

        // Decode every member before writing so a malformed entry leaves no partial output.
        let ids = members
            .iter()
            .map(|member| {
                id_from_member(member).map(<[u8]>::to_vec).ok_or_else(|| {
                    StoreError::Command(format!("member without separator in {source}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let target = state.get_or_create(destination);
        for (rank, id) in ids.into_iter().enumerate() {
            target.insert(id, rank_score(rank));
        }

        Ok(())
    }

    fn copy_score_range(
        &self,
        source: &str,
        destination: &str,
        range: &ScoreRange,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let entries: Vec<(Vec<u8>, f64)> = state
            .get(source)
            .map(|set| {
                set.iter(Direction::Asc)
                    .filter(|(score, _)| range.contains(score.0))
                    .map(|(score, member)| (member.clone(), score.0))
                    .collect()
            })
            .unwrap_or_default();
        if entries.is_empty() {
            return Ok(());
        }

        let target = state.get_or_create(destination);
        for (member, score) in entries {
            target.insert(member, score);
        }

        Ok(())
    }

    fn intersect(
        &self,
        destination: &str,
        sources: &[WeightedKey],
        aggregate: StoreAggregate,
    ) -> Result<u64, StoreError> {
        if sources.is_empty() {
            return Err(StoreError::Command(
                "intersection requires at least one source".to_string(),
            ));
        }

        let mut state = self.lock();
        let mut result: Option<HashMap<Vec<u8>, f64>> = None;

        for source in sources {
            let scores = state
                .get(&source.key)
                .map(|set| set.scores.clone())
                .unwrap_or_default();

            result = Some(match result {
                None => scores
                    .into_iter()
                    .map(|(member, score)| (member, weighted(score, source.weight)))
                    .collect(),
                Some(acc) => acc
                    .into_iter()
                    .filter_map(|(member, acc_score)| {
                        let score = weighted(*scores.get(&member)?, source.weight);
                        Some((member, combine(aggregate, acc_score, score)))
                    })
                    .collect(),
            });
        }

        // The destination is replaced, which also clears any TTL it carried.
        state.remove_key(destination);
        let result = result.unwrap_or_default();
        let cardinality = result.len() as u64;
        if !result.is_empty() {
            let target = state.get_or_create(destination);
            for (member, score) in result {
                target.insert(member, score);
            }
        }

        Ok(cardinality)
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.get(key).is_some() {
            state.deadlines.insert(key.to_string(), Instant::now() + ttl);
        }

        Ok(())
    }

    fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        let mut state = self.lock();
        for key in keys {
            state.remove_key(key);
        }

        Ok(())
    }
}

// Weight zero must contribute zero even for infinite scores.
fn weighted(score: f64, weight: f64) -> f64 {
    if weight == 0.0 { 0.0 } else { score * weight }
}

fn combine(aggregate: StoreAggregate, lhs: f64, rhs: f64) -> f64 {
    match aggregate {
        StoreAggregate::Sum => lhs + rhs,
        StoreAggregate::Min => lhs.min(rhs),
        StoreAggregate::Max => lhs.max(rhs),
    }
}

///
/// State
///

#[derive(Debug, Default)]
struct State {
    sets: HashMap<String, SortedSet>,
    deadlines: HashMap<String, Instant>,
}

impl State {
    fn purge_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();

        for key in expired {
            self.remove_key(&key);
        }
    }

    fn get(&mut self, key: &str) -> Option<&SortedSet> {
        self.purge_expired(Instant::now());
        self.sets.get(key)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut SortedSet> {
        self.purge_expired(Instant::now());
        self.sets.get_mut(key)
    }

    fn get_or_create(&mut self, key: &str) -> &mut SortedSet {
        self.purge_expired(Instant::now());
        self.sets.entry(key.to_string()).or_default()
    }

    fn remove_key(&mut self, key: &str) {
        self.sets.remove(key);
        self.deadlines.remove(key);
    }

    // Empty sets do not exist, matching the Redis data model.
    fn drop_if_empty(&mut self, key: &str) {
        if self.sets.get(key).is_some_and(|set| set.len() == 0) {
            self.remove_key(key);
        }
    }
}

///
/// SortedSet
///

#[derive(Debug, Default)]
struct SortedSet {
    scores: HashMap<Vec<u8>, f64>,
    ordered: BTreeSet<(Score, Vec<u8>)>,
}

impl SortedSet {
    fn len(&self) -> usize {
        self.scores.len()
    }

    fn insert(&mut self, member: Vec<u8>, score: f64) {
        let score = normalize(score);
        if let Some(previous) = self.scores.insert(member.clone(), score) {
            self.ordered.remove(&(Score(previous), member.clone()));
        }
        self.ordered.insert((Score(score), member));
    }

    fn remove(&mut self, member: &[u8]) -> bool {
        let Some(score) = self.scores.remove(member) else {
            return false;
        };
        self.ordered.remove(&(Score(score), member.to_vec()));

        true
    }

    fn iter(&self, direction: Direction) -> Box<dyn Iterator<Item = &(Score, Vec<u8>)> + '_> {
        match direction {
            Direction::Asc => Box::new(self.ordered.iter()),
            Direction::Desc => Box::new(self.ordered.iter().rev()),
        }
    }

    fn lex_range(&self, range: &LexRange) -> Vec<Vec<u8>> {
        self.ordered
            .iter()
            .filter(|(_, member)| range.contains(member))
            .map(|(_, member)| member.clone())
            .collect()
    }
}

fn normalize(score: f64) -> f64 {
    if score == 0.0 { 0.0 } else { score }
}

///
/// Score
///
/// Totally ordered score; NaN never reaches the set.
///

#[derive(Clone, Copy, Debug)]
struct Score(f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}
