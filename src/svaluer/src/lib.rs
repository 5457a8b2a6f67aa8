//! Simple valuer: awards group scores.
//!
//! Tasks are fed in table order. A group of `count` consecutive tasks is accepted
//! iff every non-fallthrough task in it was accepted; fallthrough tasks never
//! block acceptance, whatever their verdict is.


use invoker_api::Verdict;
use log::{debug, info};
use pom::TaskGroup;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOutcome {
    /// 1-based group number
    pub group: usize,
    pub accepted: bool,
    pub score: u32,
    pub max_score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Valuation {
    /// Sum of group scores, which may not fit in `u32`
    pub score: u64,
    pub groups: Vec<GroupOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValuerError {
    #[error("got more tasks than groups declare")]
    TooManyTasks,
    #[error("group {group} is unfinished: {judged} of {count} tasks judged")]
    Unfinished {
        group: usize,
        judged: usize,
        count: usize,
    },
}

/// Accumulator of the group being judged
#[derive(Debug)]
struct Current {
    idx: usize,
    judged: usize,
    accepted: bool,
}

#[derive(Debug)]
pub struct SimpleValuer<'a> {
    groups: &'a [TaskGroup],
    current: Option<Current>,
    finished: Vec<GroupOutcome>,
    score: u64,
}

impl<'a> SimpleValuer<'a> {
    pub fn new(groups: &'a [TaskGroup]) -> SimpleValuer<'a> {
        let mut valuer = SimpleValuer {
            groups,
            current: None,
            finished: Vec::with_capacity(groups.len()),
            score: 0,
        };
        valuer.open_group(0);
        valuer
    }

    /// Makes group `idx` current. Groups without tasks are closed at once.
    fn open_group(&mut self, mut idx: usize) {
        while idx < self.groups.len() && self.groups[idx].count == 0 {
            debug!("group {} has no tasks", idx + 1);
            self.close(Current {
                idx,
                judged: 0,
                accepted: true,
            });
            idx += 1;
        }
        self.current = if idx < self.groups.len() {
            Some(Current {
                idx,
                judged: 0,
                accepted: true,
            })
        } else {
            None
        };
    }

    fn close(&mut self, cur: Current) -> GroupOutcome {
        let max_score = self.groups[cur.idx].score;
        let score = if cur.accepted { max_score } else { 0 };
        self.score += u64::from(score);
        let outcome = GroupOutcome {
            group: cur.idx + 1,
            accepted: cur.accepted,
            score,
            max_score,
        };
        info!(
            "End of group {}, giving score {}/{}",
            outcome.group, score, max_score
        );
        self.finished.push(outcome);
        outcome
    }

    /// Position of the next task: (1-based group, 1-based index in group, group size)
    pub fn position(&self) -> Option<(usize, usize, usize)> {
        self.current
            .as_ref()
            .map(|cur| (cur.idx + 1, cur.judged + 1, self.groups[cur.idx].count))
    }

    /// Records verdict of the next task.
    /// Returns outcome of the group if this task was its last one.
    pub fn add(
        &mut self,
        verdict: Verdict,
        fallthrough: bool,
    ) -> Result<Option<GroupOutcome>, ValuerError> {
        let mut cur = self.current.take().ok_or(ValuerError::TooManyTasks)?;
        if !verdict.is_accepted() && !fallthrough {
            cur.accepted = false;
        }
        cur.judged += 1;
        if cur.judged < self.groups[cur.idx].count {
            self.current = Some(cur);
            return Ok(None);
        }
        let next = cur.idx + 1;
        let outcome = self.close(cur);
        self.open_group(next);
        Ok(Some(outcome))
    }

    /// Running total of awarded score
    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn finish(self) -> Result<Valuation, ValuerError> {
        if let Some(cur) = self.current {
            return Err(ValuerError::Unfinished {
                group: cur.idx + 1,
                judged: cur.judged,
                count: self.groups[cur.idx].count,
            });
        }
        Ok(Valuation {
            score: self.score,
            groups: self.finished,
        })
    }
}
