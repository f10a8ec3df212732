//! Text-level detection of data-modifying verbs hidden in CTE bodies
//!
//! The root statement of `WITH x AS (...) SELECT ...` is a query, so the
//! statement-kind check never sees what the CTE body does. This scan looks
//! at every `name AS ( ... )` definition of a WITH clause directly.

use lazy_regex::{Lazy, Regex, lazy_regex};

static WITH_KEYWORD: Lazy<Regex> = lazy_regex!(r"\bWITH\b");
static CTE_HEAD: Lazy<Regex> = lazy_regex!(
    r#"(?:\bWITH(?:\s+RECURSIVE)?|,)\s*(?:\w+|"[^"]*")\s*(?:\([^()]*\)\s*)?AS\s*(?:(?:NOT\s+)?MATERIALIZED\s*)?\("#
);
static CTE_VERB: Lazy<Regex> = lazy_regex!(r"\b(DROP|DELETE|INSERT|UPDATE|ALTER)\b");

/// Find a forbidden verb inside any CTE body
///
/// `sql` must already be comment-stripped; it is upper-cased here.
///
/// # Examples
/// ```
/// # use kodegen_tools_sql_guard::cte::find_forbidden_cte_operation;
/// let sql = "WITH d AS (DELETE FROM t RETURNING *) SELECT * FROM d";
/// assert_eq!(find_forbidden_cte_operation(sql).as_deref(), Some("DELETE"));
///
/// let sql = "WITH recent AS (SELECT updated_at FROM t) SELECT * FROM recent";
/// assert_eq!(find_forbidden_cte_operation(sql), None);
/// ```
pub fn find_forbidden_cte_operation(sql: &str) -> Option<String> {
    let upper = sql.to_uppercase();
    if !WITH_KEYWORD.is_match(&upper) {
        return None;
    }

    CTE_HEAD
        .find_iter(&upper)
        .filter_map(|head| cte_body(&upper, head.end()))
        .find_map(|body| CTE_VERB.captures(body).map(|captures| captures[1].to_string()))
}

/// Body text from just after the opening parenthesis up to its matching close
///
/// Quoted strings and identifiers are skipped. An unbalanced body extends to
/// the end of the text.
fn cte_body(sql: &str, start: usize) -> Option<&str> {
    let rest = sql.get(start..)?;
    let mut depth = 1usize;
    let mut quote: Option<char> = None;

    for (offset, ch) in rest.char_indices() {
        match quote {
            Some(open) => {
                if ch == open {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' | '`' => quote = Some(ch),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return rest.get(..offset);
                    }
                }
                _ => {}
            },
        }
    }

    Some(rest)
}
