use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

/// Key namespace for train-line records. Prefixing keeps line records
/// easy to find in the store directory and leaves room for other
/// record types under the same store.
pub const LINE_PREFIX: &str = "TL-";

/// Store key for a train line.
pub fn line_key(name: &str) -> String {
    format!("{LINE_PREFIX}{name}")
}

/// Line names are 1 to 4 alphanumeric characters.
pub fn valid_line_name(name: &str) -> bool {
    let count = name.chars().count();
    (1..=4).contains(&count) && name.chars().all(char::is_alphanumeric)
}

/// A named train line with its scheduled arrival times. This is the
/// record format stored under `TL-` keys, serialized as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainLine {
    pub name: String,
    pub schedule: Schedule,
}

/// Arrival times in `hh:mm [am|pm]` text form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schedule {
    pub times: HashSet<String>,
}

/// Report answer: the first time slot with more than one inbound train.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainsAtTime {
    pub time: String,
    pub trains: BTreeSet<String>,
}
