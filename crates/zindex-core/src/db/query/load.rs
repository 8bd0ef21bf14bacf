use crate::error::Error;
use std::{
    collections::{BTreeMap, HashMap},
    hash::BuildHasher,
};

///
/// RecordLoader
///
/// Fetches full records for ids produced by a query. Implementations return
/// one slot per requested id, in the same order; `None` marks a record that
/// no longer exists.
///

pub trait RecordLoader {
    type Record;

    fn load(&self, ids: &[String]) -> Result<Vec<Option<Self::Record>>, Error>;
}

impl<R: Clone, H: BuildHasher> RecordLoader for HashMap<String, R, H> {
    type Record = R;

    fn load(&self, ids: &[String]) -> Result<Vec<Option<R>>, Error> {
        Ok(ids.iter().map(|id| self.get(id).cloned()).collect())
    }
}

impl<R: Clone> RecordLoader for BTreeMap<String, R> {
    type Record = R;

    fn load(&self, ids: &[String]) -> Result<Vec<Option<R>>, Error> {
        Ok(ids.iter().map(|id| self.get(id).cloned()).collect())
    }
}

///
/// LoadedRecord
///
/// One query result slot. Index entries can outlive their record, so a
/// missing record is reported rather than dropped.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LoadedRecord<R> {
    Found(R),
    Missing(String),
}

/// Pair loader output with the requested ids, preserving id order.
pub(crate) fn load_records<L: RecordLoader + ?Sized>(
    loader: &L,
    ids: Vec<String>,
) -> Result<Vec<LoadedRecord<L::Record>>, Error> {
    let slots = loader.load(&ids)?;
    if slots.len() != ids.len() {
        return Err(Error::load(format!(
            "loader returned {} slots for {} ids",
            slots.len(),
            ids.len()
        )));
    }

    Ok(ids
        .into_iter()
        .zip(slots)
        .map(|(id, slot)| match slot {
            Some(record) => LoadedRecord::Found(record),
            None => LoadedRecord::Missing(id),
        })
        .collect())
}
