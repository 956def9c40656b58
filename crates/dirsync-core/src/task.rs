//! Task kinds and queue lanes.
//!
//! Priority order (highest wins): terminate, full sync, incremental sync.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Kind of work a queued task asks a worker to do for one connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Enumerate only entries changed since the last successful sync.
    IncrementalSync,
    /// Enumerate every entry under the base scope.
    FullSync,
    /// Cancel whatever is running for the connector.
    Terminate,
}

impl TaskKind {
    /// Numeric priority; higher values win.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::IncrementalSync => 1,
            Self::FullSync => 3,
            Self::Terminate => 5,
        }
    }

    /// True iff a request of kind `incoming` must be rejected while `self` is active.
    #[must_use]
    pub const fn outranks(self, incoming: TaskKind) -> bool {
        self.priority() > incoming.priority()
    }

    /// Lane a task of this kind is enqueued on.
    #[must_use]
    pub const fn queue(self) -> Queue {
        match self {
            Self::IncrementalSync => Queue::Incremental,
            Self::FullSync => Queue::Full,
            Self::Terminate => Queue::Terminate,
        }
    }

    /// Wire name used in payloads and as the broker task type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IncrementalSync => "incremental_sync",
            Self::FullSync => "full_sync",
            Self::Terminate => "terminate",
        }
    }

    /// Whether this kind drives the sync engine.
    #[must_use]
    pub const fn is_sync(self) -> bool {
        !matches!(self, Self::Terminate)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "incremental_sync" | "incremental" => Ok(Self::IncrementalSync),
            "full_sync" | "full" => Ok(Self::FullSync),
            "terminate" => Ok(Self::Terminate),
            _ => Err(ParseError::UnknownTaskKind(s.to_string())),
        }
    }
}

/// Broker lane. Workers drain higher-priority lanes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Queue {
    Incremental,
    Full,
    Terminate,
}

impl Queue {
    /// All lanes, highest priority first.
    pub const ALL: [Queue; 3] = [Queue::Terminate, Queue::Full, Queue::Incremental];

    /// Lanes that carry sync work.
    pub const SYNC_LANES: [Queue; 2] = [Queue::Incremental, Queue::Full];

    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Incremental => 1,
            Self::Full => 3,
            Self::Terminate => 5,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Incremental => "incremental",
            Self::Full => "full",
            Self::Terminate => "terminate",
        }
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Queue {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "incremental" | "inc" => Ok(Self::Incremental),
            "full" => Ok(Self::Full),
            "terminate" => Ok(Self::Terminate),
            _ => Err(ParseError::UnknownQueue(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [TaskKind; 3] = [
        TaskKind::IncrementalSync,
        TaskKind::FullSync,
        TaskKind::Terminate,
    ];

    #[test]
    fn test_outranks_truth_table() {
        let expected_true = [
            (TaskKind::Terminate, TaskKind::FullSync),
            (TaskKind::Terminate, TaskKind::IncrementalSync),
            (TaskKind::FullSync, TaskKind::IncrementalSync),
        ];

        for active in KINDS {
            for incoming in KINDS {
                let expected = expected_true.contains(&(active, incoming));
                assert_eq!(
                    active.outranks(incoming),
                    expected,
                    "outranks({active}, {incoming})"
                );
            }
        }
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&TaskKind::IncrementalSync).unwrap(),
            "\"incremental_sync\""
        );
        assert_eq!(
            serde_json::to_string(&TaskKind::FullSync).unwrap(),
            "\"full_sync\""
        );
        assert_eq!(
            serde_json::to_string(&TaskKind::Terminate).unwrap(),
            "\"terminate\""
        );
    }

    #[test]
    fn test_kind_parse_accepts_cli_spelling() {
        assert_eq!(
            "full-sync".parse::<TaskKind>().unwrap(),
            TaskKind::FullSync
        );
        assert_eq!(
            "incremental_sync".parse::<TaskKind>().unwrap(),
            TaskKind::IncrementalSync
        );
        assert!("restart".parse::<TaskKind>().is_err());
    }

    #[test]
    fn test_lanes_ordered_by_priority() {
        let priorities: Vec<u8> = Queue::ALL.iter().map(|q| q.priority()).collect();
        assert_eq!(priorities, vec![5, 3, 1]);
        for kind in KINDS {
            assert_eq!(kind.queue().priority(), kind.priority());
        }
    }
}
