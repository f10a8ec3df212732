//! Keyword denylist scan over comment-stripped SQL text
//!
//! Runs before the parser so text a parser might reject or normalize away
//! is still caught. Matches inside string literals count as hits.

use lazy_regex::{Lazy, Regex, lazy_regex};

// Compile-time validated regexes
static FORBIDDEN_KEYWORD: Lazy<Regex> = lazy_regex!(
    r"(?i)\b(INSERT|UPDATE|DELETE|DROP|TRUNCATE|ALTER|CREATE|GRANT|REVOKE|EXECUTE|CONNECT|USE|COPY|VACUUM|LOAD|DO)\b"
);
static WITH_DROP: Lazy<Regex> = lazy_regex!(r"(?is)\bWITH\s+.*\bDROP\b");

/// Return the first forbidden keyword found, upper-cased
///
/// # Examples
/// ```
/// # use kodegen_tools_sql_guard::keywords::find_forbidden_keyword;
/// assert_eq!(find_forbidden_keyword("select 1; drop table t").as_deref(), Some("DROP"));
/// assert_eq!(find_forbidden_keyword("SELECT created_at, updated_by FROM t"), None);
/// ```
pub fn find_forbidden_keyword(sql: &str) -> Option<String> {
    if WITH_DROP.is_match(sql) {
        return Some("WITH ... DROP".to_string());
    }

    FORBIDDEN_KEYWORD
        .captures(sql)
        .map(|captures| captures[1].to_ascii_uppercase())
}
