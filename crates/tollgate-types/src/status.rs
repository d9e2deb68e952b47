use serde::{Deserialize, Serialize};

/// Lifecycle status of a node execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Queued,
    Running,
    /// Suspended until execution input arrives or the wait times out.
    InputWaiting,
    Succeeded,
    Failed,
    Errored,
    Aborted,
    Expired,
    Skipped,
}

const FINAL_STATUSES: &[Status] = &[
    Status::Succeeded,
    Status::Failed,
    Status::Errored,
    Status::Aborted,
    Status::Expired,
    Status::Skipped,
];

impl Status {
    /// Every status, indexed by [`Status::ordinal`].
    pub const ALL: [Status; 9] = [
        Status::Queued,
        Status::Running,
        Status::InputWaiting,
        Status::Succeeded,
        Status::Failed,
        Status::Errored,
        Status::Aborted,
        Status::Expired,
        Status::Skipped,
    ];

    /// Position of this status in [`Status::ALL`].
    pub const fn ordinal(self) -> usize {
        match self {
            Self::Queued => 0,
            Self::Running => 1,
            Self::InputWaiting => 2,
            Self::Succeeded => 3,
            Self::Failed => 4,
            Self::Errored => 5,
            Self::Aborted => 6,
            Self::Expired => 7,
            Self::Skipped => 8,
        }
    }

    /// Every status other than `status`.
    pub fn all_except(status: Status) -> Vec<Status> {
        Self::ALL.into_iter().filter(|s| *s != status).collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::InputWaiting => "INPUT_WAITING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Errored => "ERRORED",
            Self::Aborted => "ABORTED",
            Self::Expired => "EXPIRED",
            Self::Skipped => "SKIPPED",
        }
    }

    /// Statuses from which a node execution never moves again.
    pub fn final_statuses() -> &'static [Status] {
        FINAL_STATUSES
    }

    pub fn is_final(&self) -> bool {
        FINAL_STATUSES.contains(self)
    }
}

// ALL and ordinal() must agree entry for entry.
const _: () = {
    let mut i = 0;
    while i < Status::ALL.len() {
        assert!(Status::ALL[i].ordinal() == i);
        i += 1;
    }
};

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
