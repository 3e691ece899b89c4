use crate::config::TieBreakPolicy;
use crate::model::{MergeGroup, MergePlan, Person};
use crate::normalize::group_by_name;

/// Decides equal-score comparisons during master selection.
pub trait TieBreak {
    /// `true` if `candidate` should replace `incumbent` on a tie.
    fn prefer_candidate(&self, incumbent: &Person, candidate: &Person) -> bool;
}

impl TieBreak for TieBreakPolicy {
    fn prefer_candidate(&self, incumbent: &Person, candidate: &Person) -> bool {
        match self {
            Self::KeepIncumbent => false,
            Self::EarliestCreated => match (candidate.created_at, incumbent.created_at) {
                (Some(c), Some(i)) => c < i,
                (Some(_), None) => true,
                _ => false,
            },
            Self::LowestId => candidate.id < incumbent.id,
        }
    }
}

impl<F> TieBreak for F
where
    F: Fn(&Person, &Person) -> bool,
{
    fn prefer_candidate(&self, incumbent: &Person, candidate: &Person) -> bool {
        self(incumbent, candidate)
    }
}

/// Score of `subject` when compared against `other`: +2 phone, +2 date of
/// birth, +1 if `subject` was created strictly earlier.
pub fn comparative_score(subject: &Person, other: &Person) -> u8 {
    let mut score = 0;
    if subject.has_phone() {
        score += 2;
    }
    if subject.has_date_of_birth() {
        score += 2;
    }
    if let (Some(a), Some(b)) = (subject.created_at, other.created_at) {
        if a < b {
            score += 1;
        }
    }
    score
}

#[derive(Debug, Clone)]
pub struct MasterSelection {
    pub master: Person,
    pub duplicates: Vec<Person>,
}

/// Fold `group` in order, keeping a running master. A candidate replaces the
/// master only on a strictly higher score, or on a tie the policy grants it.
/// Returns `None` for an empty group.
pub fn select_master(group: Vec<Person>, tie_break: &dyn TieBreak) -> Option<MasterSelection> {
    let mut members = group.into_iter();
    let mut master = members.next()?;
    let mut duplicates = Vec::new();

    for candidate in members {
        let incumbent_score = comparative_score(&master, &candidate);
        let candidate_score = comparative_score(&candidate, &master);

        let replace = candidate_score > incumbent_score
            || (candidate_score == incumbent_score && tie_break.prefer_candidate(&master, &candidate));

        if replace {
            duplicates.push(std::mem::replace(&mut master, candidate));
        } else {
            duplicates.push(candidate);
        }
    }

    Some(MasterSelection { master, duplicates })
}

/// Group by normalized name and select masters in a single pass.
///
/// Singleton groups are left out of the plan, as is the blank-name group
/// unless `group_blank_names` is set.
pub fn plan_merges(persons: Vec<Person>, tie_break: &dyn TieBreak, group_blank_names: bool) -> MergePlan {
    let scanned = persons.len();
    let mut groups = Vec::new();

    for (key, members) in group_by_name(persons) {
        if members.len() < 2 || (key.is_empty() && !group_blank_names) {
            continue;
        }
        if let Some(selection) = select_master(members, tie_break) {
            groups.push(MergeGroup {
                key,
                master: selection.master,
                duplicates: selection.duplicates,
            });
        }
    }

    MergePlan::new(groups, scanned)
}
