//! Schedule report: the earliest time of day at which two or more
//! train lines share a scheduled arrival.

use std::collections::{BTreeMap, BTreeSet};

use crate::clock::{self, Minutes, TimeError};
use crate::model::{LINE_PREFIX, TrainLine, TrainsAtTime};
use crate::store::{Store, StoreError};

/// A minute slot shared by at least two schedule entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub minutes: Minutes,
    pub lines: BTreeSet<String>,
}

impl Collision {
    /// Render in the report wire shape: am/pm-formatted time plus the
    /// sorted set of line names.
    pub fn into_answer(self) -> TrainsAtTime {
        TrainsAtTime {
            time: clock::format(self.minutes, true),
            trains: self.lines,
        }
    }
}

/// Flatten every `TL-` record in the store into (line name, minutes)
/// pairs. Records that fail to decode, or times that fail to parse,
/// abort the load; nothing is skipped silently.
pub async fn load_entries(store: &Store) -> Result<Vec<(String, Minutes)>, ReportError> {
    let mut entries = Vec::new();
    for key in store.keys(LINE_PREFIX).await? {
        let bytes = store.get(&key).await?;
        let line: TrainLine =
            serde_json::from_slice(&bytes).map_err(|e| ReportError::Decode(key.clone(), e))?;
        for time_text in &line.schedule.times {
            let minutes =
                clock::parse(time_text).map_err(|e| ReportError::Time(key.clone(), e))?;
            entries.push((line.name.clone(), minutes));
        }
    }
    Ok(entries)
}

/// Earliest minute strictly after `threshold` shared by two or more
/// entries. When the first pass finds nothing and `threshold` is not
/// already 0, one second pass searches the whole day from 0.
///
/// Grouping counts raw entries, not distinct names: a line listed
/// twice at the same minute collides with itself.
pub fn find_collision(entries: &[(String, Minutes)], threshold: Minutes) -> Option<Collision> {
    scan(entries, threshold).or_else(|| {
        if threshold != 0 {
            scan(entries, 0)
        } else {
            None
        }
    })
}

fn scan(entries: &[(String, Minutes)], threshold: Minutes) -> Option<Collision> {
    let mut groups: BTreeMap<Minutes, Vec<&str>> = BTreeMap::new();
    for (name, minutes) in entries {
        if *minutes > threshold {
            groups.entry(*minutes).or_default().push(name);
        }
    }
    groups
        .into_iter()
        .find(|(_, names)| names.len() > 1)
        .map(|(minutes, names)| Collision {
            minutes,
            lines: names.into_iter().map(str::to_string).collect(),
        })
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ReportError {
    Store(StoreError),
    Decode(String, serde_json::Error),
    Time(String, TimeError),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Store(e) => write!(f, "{e}"),
            ReportError::Decode(key, e) => write!(f, "bad record under {key}: {e}"),
            ReportError::Time(key, e) => write!(f, "bad time in {key}: {e}"),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Store(e) => Some(e),
            ReportError::Decode(_, e) => Some(e),
            ReportError::Time(_, e) => Some(e),
        }
    }
}

impl From<StoreError> for ReportError {
    fn from(e: StoreError) -> Self {
        ReportError::Store(e)
    }
}
