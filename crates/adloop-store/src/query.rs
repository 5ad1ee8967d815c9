// ABOUTME: Builder for filtered, ordered, paginated reads of the history table.
// ABOUTME: Compiles to a parameterized WHERE clause; values are always bound, never interpolated.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::types::Value;

/// Columns that may be filtered or ordered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ProductName,
    ProductUrl,
    PlanUuid,
    PlanName,
    Budget,
    ActualCost,
    PlanScore,
    CreatedAt,
    EvaluatedAt,
}

impl Field {
    pub fn column(&self) -> &'static str {
        match self {
            Field::ProductName => "product_name",
            Field::ProductUrl => "product_url",
            Field::PlanUuid => "plan_uuid",
            Field::PlanName => "plan_name",
            Field::Budget => "budget",
            Field::ActualCost => "actual_cost",
            Field::PlanScore => "plan_score",
            Field::CreatedAt => "created_at",
            Field::EvaluatedAt => "evaluated_at",
        }
    }
}

/// Comparison operators. `In`/`NotIn` take any number of values, the rest exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    In,
    NotIn,
}

impl Op {
    fn sql(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Like => "LIKE",
            Op::In => "IN",
            Op::NotIn => "NOT IN",
        }
    }
}

/// How field conditions are joined together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Combine {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Restrictions on `created_at`. Always ANDed with the field conditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeFilter {
    After(DateTime<Utc>),
    Before(DateTime<Utc>),
    Within(Duration),
}

#[derive(Debug, Clone)]
struct Condition {
    field: Field,
    op: Op,
    values: Vec<Value>,
}

/// Timestamps are stored in this exact format so text comparison orders correctly.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    conditions: Vec<Condition>,
    combine: Combine,
    time_filters: Vec<TimeFilter>,
    order_by: Option<(Field, SortOrder)>,
    limit: Option<u32>,
    offset: Option<u32>,
}

impl HistoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one product. Shorthand for two equality filters.
    pub fn product(self, name: &str, url: &str) -> Self {
        self.filter(Field::ProductName, Op::Eq, name.to_string())
            .filter(Field::ProductUrl, Op::Eq, url.to_string())
    }

    pub fn filter(mut self, field: Field, op: Op, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            field,
            op,
            values: vec![value.into()],
        });
        self
    }

    pub fn filter_in<V: Into<Value>>(mut self, field: Field, values: impl IntoIterator<Item = V>) -> Self {
        self.conditions.push(Condition {
            field,
            op: Op::In,
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn filter_not_in<V: Into<Value>>(
        mut self,
        field: Field,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.conditions.push(Condition {
            field,
            op: Op::NotIn,
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn combine(mut self, combine: Combine) -> Self {
        self.combine = combine;
        self
    }

    pub fn created(mut self, filter: TimeFilter) -> Self {
        self.time_filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: Field, order: SortOrder) -> Self {
        self.order_by = Some((field, order));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Compile the query tail (everything after `FROM history`) and its bound values.
    pub fn to_sql(&self, now: DateTime<Utc>) -> (String, Vec<Value>) {
        let mut values = Vec::new();
        let mut field_clauses = Vec::new();

        for cond in &self.conditions {
            let column = cond.field.column();
            let clause = match cond.op {
                Op::In | Op::NotIn => {
                    if cond.values.is_empty() {
                        // Nothing is in the empty set; everything is outside it.
                        if cond.op == Op::In { "0".to_string() } else { "1".to_string() }
                    } else {
                        let marks = vec!["?"; cond.values.len()].join(", ");
                        values.extend(cond.values.iter().cloned());
                        format!("{} {} ({})", column, cond.op.sql(), marks)
                    }
                }
                op => {
                    values.extend(cond.values.iter().take(1).cloned());
                    format!("{} {} ?", column, op.sql())
                }
            };
            field_clauses.push(clause);
        }

        let mut where_parts = Vec::new();
        if !field_clauses.is_empty() {
            let joiner = match self.combine {
                Combine::And => " AND ",
                Combine::Or => " OR ",
            };
            where_parts.push(format!("({})", field_clauses.join(joiner)));
        }

        for filter in &self.time_filters {
            let (op, ts) = match filter {
                TimeFilter::After(ts) => (">=", *ts),
                TimeFilter::Before(ts) => ("<=", *ts),
                TimeFilter::Within(window) => (
                    ">=",
                    now.checked_sub_signed(*window).unwrap_or(DateTime::<Utc>::MIN_UTC),
                ),
            };
            where_parts.push(format!("created_at {} ?", op));
            values.push(Value::Text(format_timestamp(&ts)));
        }

        let mut sql = String::new();
        if !where_parts.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_parts.join(" AND "));
        }

        if let Some((field, order)) = self.order_by {
            let dir = match order {
                SortOrder::Asc => "ASC",
                SortOrder::Desc => "DESC",
            };
            // id breaks ties between rows inserted in the same microsecond.
            sql.push_str(&format!(" ORDER BY {} {}, id {}", field.column(), dir, dir));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }

        (sql, values)
    }
}
