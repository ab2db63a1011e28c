//! Contestant collaborator entity.
//!
//! Contestant CRUD is owned by a different subsystem; this service only
//! reads contestants and increments their vote counter.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contestant {
    pub id: String,
    pub name: String,
    pub vote_total: u64,
}

/// One crediting target: a contestant and the number of votes it receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteCredit {
    pub contestant_id: String,
    pub votes: u32,
}

impl VoteCredit {
    pub fn new(contestant_id: impl Into<String>, votes: u32) -> Self {
        Self {
            contestant_id: contestant_id.into(),
            votes,
        }
    }
}
