//! Shared repository utilities.

use sqlx::{Postgres, QueryBuilder};

/// Column list for `requests`, qualified with the `r` alias every request
/// query uses so it can be joined against `employees e`.
pub const REQUEST_COLUMNS: &str = "r.request_id, r.emp_id, r.request_type, r.title, r.content, \
     r.request_date, r.status, r.approved_by, r.approved_date, r.approver_role, \
     r.rejection_reason, r.attached_file, r.updated_at";

/// Appends WHERE or AND to the query builder depending on whether a clause has already been added.
pub fn push_clause(builder: &mut QueryBuilder<'_, Postgres>, has_clause: &mut bool) {
    if *has_clause {
        builder.push(" AND ");
    } else {
        builder.push(" WHERE ");
        *has_clause = true;
    }
}

/// Clamps a caller-supplied page/limit pair into a `(limit, offset)` pair.
pub fn page_window(page: i64, limit: i64, max_limit: i64) -> (i64, i64) {
    let limit = limit.clamp(1, max_limit);
    let page = page.max(1);
    let offset = (page - 1).saturating_mul(limit);
    (limit, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_clause_switches_between_where_and_and() {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT 1");
        let mut has_clause = false;

        push_clause(&mut builder, &mut has_clause);
        builder.push("a = 1");
        assert!(has_clause);

        push_clause(&mut builder, &mut has_clause);
        builder.push("b = 2");

        assert_eq!(builder.sql(), "SELECT 1 WHERE a = 1 AND b = 2");
    }

    #[test]
    fn page_window_clamps_inputs() {
        assert_eq!(page_window(1, 10, 100), (10, 0));
        assert_eq!(page_window(3, 20, 100), (20, 40));
        assert_eq!(page_window(0, 0, 100), (1, 0));
        assert_eq!(page_window(2, 500, 100), (100, 100));
        assert_eq!(page_window(i64::MAX, 100, 100).1, i64::MAX);
    }
}
