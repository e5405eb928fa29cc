//! Caller-specified ordering and filtering for project task lists.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Position,
    KanbanPosition,
    Id,
    Done,
    StartDate,
    DueDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Inclusive range over `startDate`.
#[derive(Debug, Clone, PartialEq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Keep tasks without a start date.
    pub include_nulls: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskQuery {
    pub sort: Vec<(SortField, SortOrder)>,
    pub start_date: Option<DateRange>,
}

impl TaskQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort_by(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort.push((field, order));
        self
    }

    pub fn start_between(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        include_nulls: bool,
    ) -> Self {
        self.start_date = Some(DateRange {
            from,
            to,
            include_nulls,
        });
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        let Some(range) = &self.start_date else {
            return true;
        };
        let Some(start) = task.start_date else {
            return range.include_nulls;
        };
        range.from.is_none_or(|from| start >= from) && range.to.is_none_or(|to| start <= to)
    }

    /// Sorts by the requested keys; position ascending when none were given. The task
    /// id is always the last tie-breaker.
    pub fn sort(&self, tasks: &mut [Task]) {
        let default_sort = [(SortField::Position, SortOrder::Asc)];
        let keys: &[(SortField, SortOrder)] = if self.sort.is_empty() {
            &default_sort
        } else {
            &self.sort
        };
        tasks.sort_by(|a, b| {
            keys.iter()
                .map(|&(field, order)| {
                    let ord = compare_field(a, b, field);
                    match order {
                        SortOrder::Asc => ord,
                        SortOrder::Desc => ord.reverse(),
                    }
                })
                .find(|ord| ord.is_ne())
                .unwrap_or_else(|| a.id.cmp(&b.id))
        });
    }
}

fn compare_field(a: &Task, b: &Task, field: SortField) -> Ordering {
    match field {
        SortField::Position => a.position.total_cmp(&b.position),
        SortField::KanbanPosition => a.kanban_position.total_cmp(&b.kanban_position),
        SortField::Id => a.id.cmp(&b.id),
        SortField::Done => a.done.cmp(&b.done),
        // Missing dates sort last in ascending order.
        SortField::StartDate => cmp_optional_date(a.start_date, b.start_date),
        SortField::DueDate => cmp_optional_date(a.due_date, b.due_date),
    }
}

fn cmp_optional_date(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
