//! Filter expressions and queries understood by record stores.
//!
//! Filters compose field comparisons with AND/OR; [`Filter::matches`] is
//! the reference evaluation used by the in-memory store.

use std::cmp::Ordering;

use calstream_core::record::{Field, FieldValue, Record, RecordFlavor};
use calstream_core::types::SortOrder;
use icu::casemap::CaseMapper;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Case-insensitive substring match on text fields.
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Compare {
        field: Field,
        op: CompareOp,
        value: FieldValue,
    },
    And(Vec<Filter>),
    /// An empty `Or` matches nothing.
    Or(Vec<Filter>),
}

impl Filter {
    #[must_use]
    pub const fn compare(field: Field, op: CompareOp, value: FieldValue) -> Self {
        Self::Compare { field, op, value }
    }

    /// ## Summary
    /// AND-composes the present filters.
    ///
    /// Returns `None` when no filter is present and the single filter when
    /// only one is.
    #[must_use]
    pub fn all(filters: impl IntoIterator<Item = Option<Self>>) -> Option<Self> {
        let mut present: Vec<Self> = filters.into_iter().flatten().collect();
        match present.len() {
            0 => None,
            1 => present.pop(),
            _ => Some(Self::And(present)),
        }
    }

    /// Evaluates the filter against a record. Missing fields never match.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::Compare { field, op, value } => record
                .field(*field)
                .is_some_and(|actual| compare_values(&actual, *op, value)),
            Self::And(filters) => filters.iter().all(|filter| filter.matches(record)),
            Self::Or(filters) => filters.iter().any(|filter| filter.matches(record)),
        }
    }
}

fn compare_values(actual: &FieldValue, op: CompareOp, expected: &FieldValue) -> bool {
    if op == CompareOp::Contains {
        return match (actual, expected) {
            (FieldValue::Text(haystack), FieldValue::Text(needle)) => {
                let mapper = CaseMapper::new();
                mapper
                    .fold_string(haystack)
                    .contains(mapper.fold_string(needle).as_ref())
            }
            _ => false,
        };
    }

    let Some(ordering) = actual.compare(expected) else {
        return false;
    };
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Contains => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub field: Field,
    pub order: SortOrder,
}

/// A filtered, sorted read against one record view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub flavor: RecordFlavor,
    pub filter: Option<Filter>,
    pub sort: Vec<SortKey>,
}

impl Query {
    #[must_use]
    pub const fn new(flavor: RecordFlavor) -> Self {
        Self {
            flavor,
            filter: None,
            sort: Vec::new(),
        }
    }

    /// AND-composes `filter` with any filter already on the query.
    #[must_use]
    pub fn and_filter(mut self, filter: Option<Filter>) -> Self {
        self.filter = Filter::all([self.filter.take(), filter]);
        self
    }

    #[must_use]
    pub fn sort_by(mut self, field: Field, order: SortOrder) -> Self {
        self.sort.push(SortKey { field, order });
        self
    }

    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        record.flavor() == self.flavor
            && self.filter.as_ref().is_none_or(|filter| filter.matches(record))
    }

    /// Orders two records by this query's sort keys.
    #[must_use]
    pub fn compare_records(&self, a: &Record, b: &Record) -> Ordering {
        for key in &self.sort {
            let ordering = match (a.field(key.field), b.field(key.field)) {
                (Some(left), Some(right)) => left.compare(&right).unwrap_or(Ordering::Equal),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ordering = key.order.apply(ordering);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}
