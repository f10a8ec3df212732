//! Table and column reference extraction from a parsed statement
//!
//! Recursively traverses the AST, including CTEs, subqueries, derived tables,
//! set operations and expression contexts, and records every physical table
//! and column it reaches.
//!
//! Column ownership is resolved conservatively:
//! 1. an explicit qualifier (`u.id`) resolves through the alias scopes of the
//!    enclosing SELECTs, innermost first;
//! 2. an unqualified column in a SELECT over exactly one physical table and
//!    no joins belongs to that table;
//! 3. anything else has no owner (`table: None`).
//!
//! A qualifier naming a derived table or CTE also yields no owner. The
//! columns reaching that relation are recorded where it is defined.
//!
//! A bare name that resolves to a relation in scope (`SELECT u FROM users u`,
//! `to_json(u)`) is a whole-row reference and counts as `*` on that table.
//! A field of a whole row (`(u).password`) is a column of that table.
//!
//! Nodes without a dedicated arm are not skipped. Their children are walked
//! generically through sqlparser's `Visit` and every subquery, relation and
//! column reference found below them is handed back to the scoped walk.

use crate::types::{ColumnReference, StatementKind, TableReference};
use sqlparser::ast::{
    AccessExpr, Cte, Expr, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, Ident,
    JoinConstraint, JoinOperator, ObjectName, OrderByKind, Query, Select, SelectItem,
    SelectItemQualifiedWildcardKind, SetExpr, Statement, TableFactor, TableWithJoins, Visit,
    Visitor, WindowType,
};
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;

/// References gathered from one or more statements
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub tables: Vec<TableReference>,
    pub columns: Vec<ColumnReference>,
    /// Data-modifying query bodies found anywhere in the tree
    pub nested_writes: Vec<StatementKind>,
}

/// Extract references from a single statement
///
/// # Examples
/// ```
/// # use kodegen_tools_sql_guard::extract::extract_references;
/// # use kodegen_tools_sql_guard::sql_parser::parse_statements;
/// # use kodegen_tools_sql_guard::types::DatabaseType;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let stmts = parse_statements(
///     "SELECT u.id, o.total FROM users u JOIN orders o ON u.id = o.user_id",
///     DatabaseType::Postgres,
/// )?;
/// let refs = extract_references(&stmts[0]);
/// let names: Vec<_> = refs.tables.iter().map(|t| t.name.as_str()).collect();
/// assert_eq!(names, ["users", "orders"]);
/// assert_eq!(refs.columns[0].table.as_deref(), Some("users"));
/// # Ok(())
/// # }
/// ```
pub fn extract_references(stmt: &Statement) -> Extraction {
    extract_from_statements(std::slice::from_ref(stmt))
}

/// Extract references from several statements, deduplicated across all of them
pub fn extract_from_statements(stmts: &[Statement]) -> Extraction {
    let mut extractor = Extractor::default();
    for stmt in stmts {
        extractor.visit_statement(stmt);
    }
    extractor.finish()
}

/// What a name in a FROM clause stands for
#[derive(Debug, Clone)]
enum Relation {
    Physical(String),
    Derived,
}

/// Name resolution state for one SELECT
#[derive(Debug, Default)]
struct Scope {
    /// Lower-cased alias or table name
    relations: HashMap<String, Relation>,
    /// Physical tables in FROM order, for wildcard expansion
    physical: Vec<String>,
    lone_table: Option<String>,
    /// Lower-cased projection aliases
    output_aliases: HashSet<String>,
    /// Set while visiting clauses where projection aliases are in scope
    resolving_outputs: bool,
}

/// Outermost nodes below an unhandled AST node that the scoped walk has an
/// arm for
#[derive(Default)]
struct Residue {
    exprs: Vec<Expr>,
    queries: Vec<Query>,
    relations: Vec<ObjectName>,
    /// Nesting depth below a collected expression or query
    claimed: usize,
    /// Whether each open expression raised `claimed`
    open_exprs: Vec<bool>,
    /// Set when the walk starts at an expression that must not collect itself
    skip_root: bool,
}

impl Visitor for Residue {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<()> {
        if self.claimed == 0 {
            self.queries.push(query.clone());
        }
        self.claimed += 1;
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<()> {
        self.claimed = self.claimed.saturating_sub(1);
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<()> {
        if self.claimed == 0 {
            self.relations.push(relation.clone());
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<()> {
        let is_root = std::mem::take(&mut self.skip_root);
        let claim = !is_root && has_dedicated_arm(expr);
        if claim {
            if self.claimed == 0 {
                self.exprs.push(expr.clone());
            }
            self.claimed += 1;
        }
        self.open_exprs.push(claim);
        ControlFlow::Continue(())
    }

    fn post_visit_expr(&mut self, _expr: &Expr) -> ControlFlow<()> {
        if self.open_exprs.pop().unwrap_or(false) {
            self.claimed = self.claimed.saturating_sub(1);
        }
        ControlFlow::Continue(())
    }
}

#[derive(Default)]
struct Extractor {
    tables: Vec<TableReference>,
    table_keys: HashSet<String>,
    columns: Vec<ColumnReference>,
    column_keys: HashSet<(Option<String>, String)>,
    nested_writes: Vec<StatementKind>,
    scopes: Vec<Scope>,
    cte_scopes: Vec<HashSet<String>>,
}

impl Extractor {
    fn finish(self) -> Extraction {
        Extraction {
            tables: self.tables,
            columns: self.columns,
            nested_writes: self.nested_writes,
        }
    }

    // ------------------------------------------------------------------
    // Statements and queries
    // ------------------------------------------------------------------

    fn visit_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Query(query) => self.visit_query(query),
            Statement::Explain { statement, .. } => self.visit_statement(statement),
            other => self.visit_residue(other),
        }
    }

    fn visit_query(&mut self, query: &Query) {
        self.cte_scopes.push(HashSet::new());

        if let Some(with) = &query.with {
            if with.recursive {
                let names = with.cte_tables.iter().map(cte_name).collect::<HashSet<_>>();
                self.current_ctes().extend(names);
                for cte in &with.cte_tables {
                    self.visit_query(&cte.query);
                }
            } else {
                // Each CTE sees only the ones defined before it
                for cte in &with.cte_tables {
                    self.visit_query(&cte.query);
                    let name = cte_name(cte);
                    self.current_ctes().insert(name);
                }
            }
        }

        let order_by = order_by_exprs(query);
        match query.body.as_ref() {
            SetExpr::Select(select) => self.visit_select(select, &order_by),
            body => {
                self.scopes.push(Scope::default());
                self.visit_set_expr(body);
                for expr in order_by {
                    self.visit_expr(expr);
                }
                self.scopes.pop();
            }
        }

        self.visit_residue(&query.limit_clause);
        self.visit_residue(&query.fetch);

        self.cte_scopes.pop();
    }

    fn current_ctes(&mut self) -> &mut HashSet<String> {
        if self.cte_scopes.is_empty() {
            self.cte_scopes.push(HashSet::new());
        }
        let last = self.cte_scopes.len() - 1;
        &mut self.cte_scopes[last]
    }

    fn is_cte(&self, lowered: &str) -> bool {
        self.cte_scopes.iter().any(|names| names.contains(lowered))
    }

    fn visit_set_expr(&mut self, expr: &SetExpr) {
        match expr {
            SetExpr::Select(select) => self.visit_select(select, &[]),
            SetExpr::Query(query) => self.visit_query(query),
            SetExpr::SetOperation { left, right, .. } => {
                self.visit_set_expr(left);
                self.visit_set_expr(right);
            }
            SetExpr::Values(values) => {
                for row in &values.rows {
                    for expr in row {
                        self.visit_expr(expr);
                    }
                }
            }
            SetExpr::Table(table) => {
                if let Some(name) = &table.table_name {
                    self.record_table(name, None, table.schema_name.as_deref());
                }
            }
            SetExpr::Insert(_) => self.nested_writes.push(StatementKind::Insert),
            SetExpr::Update(_) => self.nested_writes.push(StatementKind::Update),
            SetExpr::Delete(_) => self.nested_writes.push(StatementKind::Delete),
            SetExpr::Merge(_) => self.nested_writes.push(StatementKind::Merge),
        }
    }

    // ------------------------------------------------------------------
    // SELECT
    // ------------------------------------------------------------------

    fn visit_select(&mut self, select: &Select, order_by: &[&Expr]) {
        let mut scope = Scope::default();
        for table_with_joins in &select.from {
            self.register_table_with_joins(table_with_joins, &mut scope);
        }
        scope.lone_table = lone_physical_table(select, &scope);
        for item in &select.projection {
            if let SelectItem::ExprWithAlias { alias, .. } = item {
                scope.output_aliases.insert(alias.value.to_lowercase());
            }
        }
        self.scopes.push(scope);

        for table_with_joins in &select.from {
            self.visit_table_with_joins(table_with_joins);
        }

        for item in &select.projection {
            self.visit_select_item(item);
        }
        self.visit_residue(&select.distinct);
        self.visit_residue(&select.top);
        self.visit_residue(&select.named_window);

        if let Some(expr) = &select.selection {
            self.visit_expr(expr);
        }
        if let Some(expr) = &select.having {
            self.visit_expr(expr);
        }
        if let Some(expr) = &select.qualify {
            self.visit_expr(expr);
        }
        if let Some(expr) = &select.prewhere {
            self.visit_expr(expr);
        }
        for expr in &select.cluster_by {
            self.visit_expr(expr);
        }
        for expr in &select.distribute_by {
            self.visit_expr(expr);
        }
        for expr in &select.sort_by {
            self.visit_expr(&expr.expr);
        }

        self.set_resolving_outputs(true);
        if let GroupByExpr::Expressions(exprs, ..) = &select.group_by {
            for expr in exprs {
                self.visit_expr(expr);
            }
        }
        for expr in order_by {
            self.visit_expr(expr);
        }
        self.set_resolving_outputs(false);

        self.scopes.pop();
    }

    fn set_resolving_outputs(&mut self, on: bool) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.resolving_outputs = on;
        }
    }

    fn visit_select_item(&mut self, item: &SelectItem) {
        match item {
            SelectItem::UnnamedExpr(expr) => self.visit_expr(expr),
            SelectItem::ExprWithAlias { expr, alias } => match expr {
                Expr::Identifier(ident) => self.record_column(None, ident, Some(alias)),
                Expr::CompoundIdentifier(idents) if idents.len() >= 2 => {
                    let qualifier = &idents[idents.len() - 2];
                    let name = &idents[idents.len() - 1];
                    self.record_column(Some(qualifier), name, Some(alias));
                }
                other => self.visit_expr(other),
            },
            SelectItem::Wildcard(..) => {
                let physical = self
                    .scopes
                    .last()
                    .map(|scope| scope.physical.clone())
                    .unwrap_or_default();
                for table in physical {
                    self.push_column(Some(table), "*".to_string(), None);
                }
            }
            SelectItem::QualifiedWildcard(SelectItemQualifiedWildcardKind::ObjectName(name), _) => {
                self.record_qualified_wildcard(name)
            }
            SelectItem::QualifiedWildcard(SelectItemQualifiedWildcardKind::Expr(expr), _) => {
                self.visit_expr(expr)
            }
        }
    }

    // ------------------------------------------------------------------
    // FROM clause
    // ------------------------------------------------------------------

    /// First pass: name every relation so join constraints and the
    /// projection can resolve qualifiers
    fn register_table_with_joins(&mut self, table_with_joins: &TableWithJoins, scope: &mut Scope) {
        self.register_table_factor(&table_with_joins.relation, scope);
        for join in &table_with_joins.joins {
            self.register_table_factor(&join.relation, scope);
        }
    }

    fn register_table_factor(&mut self, factor: &TableFactor, scope: &mut Scope) {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                let parts = ident_parts(name);
                let Some(table_name) = parts.last().cloned() else {
                    return;
                };
                let lowered = table_name.to_lowercase();
                let alias_name = alias.as_ref().map(|a| a.name.value.clone());

                if parts.len() == 1 && self.is_cte(&lowered) {
                    scope.relations.insert(lowered, Relation::Derived);
                    if let Some(alias_name) = alias_name {
                        scope.relations.insert(alias_name.to_lowercase(), Relation::Derived);
                    }
                    return;
                }

                let schema = parts.len().checked_sub(2).map(|i| parts[i].as_str());
                self.record_table(&table_name, alias_name.as_deref(), schema);
                scope.physical.push(table_name.clone());
                scope
                    .relations
                    .insert(lowered, Relation::Physical(table_name.clone()));
                if let Some(alias_name) = alias_name {
                    scope
                        .relations
                        .insert(alias_name.to_lowercase(), Relation::Physical(table_name));
                }
            }
            TableFactor::Derived { alias, .. }
            | TableFactor::Function { alias, .. }
            | TableFactor::UNNEST { alias, .. } => {
                if let Some(alias) = alias {
                    scope
                        .relations
                        .insert(alias.name.value.to_lowercase(), Relation::Derived);
                }
            }
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.register_table_with_joins(table_with_joins, scope),
            TableFactor::Pivot { table, .. } | TableFactor::Unpivot { table, .. } => {
                self.register_table_factor(table, scope)
            }
            _ => {}
        }
    }

    /// Second pass: visit subqueries, function arguments and join constraints
    fn visit_table_with_joins(&mut self, table_with_joins: &TableWithJoins) {
        self.visit_table_factor(&table_with_joins.relation);

        for join in &table_with_joins.joins {
            self.visit_table_factor(&join.relation);

            match &join.join_operator {
                JoinOperator::Join(constraint)
                | JoinOperator::Inner(constraint)
                | JoinOperator::Left(constraint)
                | JoinOperator::LeftOuter(constraint)
                | JoinOperator::Right(constraint)
                | JoinOperator::RightOuter(constraint)
                | JoinOperator::FullOuter(constraint)
                | JoinOperator::Semi(constraint)
                | JoinOperator::LeftSemi(constraint)
                | JoinOperator::RightSemi(constraint)
                | JoinOperator::Anti(constraint)
                | JoinOperator::LeftAnti(constraint)
                | JoinOperator::RightAnti(constraint) => {
                    if let JoinConstraint::On(expr) = constraint {
                        self.visit_expr(expr);
                    }
                }
                JoinOperator::AsOf {
                    match_condition,
                    constraint,
                } => {
                    self.visit_expr(match_condition);
                    if let JoinConstraint::On(expr) = constraint {
                        self.visit_expr(expr);
                    }
                }
                other => self.visit_residue(other),
            }
        }
    }

    fn visit_table_factor(&mut self, factor: &TableFactor) {
        match factor {
            TableFactor::Table { args, .. } => {
                if let Some(args) = args {
                    for arg in &args.args {
                        self.visit_function_arg(arg);
                    }
                }
            }
            TableFactor::Derived { subquery, .. } => self.visit_query(subquery),
            TableFactor::Function { args, .. } => {
                for arg in args {
                    self.visit_function_arg(arg);
                }
            }
            TableFactor::UNNEST { array_exprs, .. } => {
                for expr in array_exprs {
                    self.visit_expr(expr);
                }
            }
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.visit_table_with_joins(table_with_joins),
            TableFactor::Pivot { table, .. } | TableFactor::Unpivot { table, .. } => {
                self.visit_table_factor(table)
            }
            other => self.visit_residue(other),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn visit_function_arg(&mut self, arg: &FunctionArg) {
        match arg {
            FunctionArg::Unnamed(arg_expr)
            | FunctionArg::Named { arg: arg_expr, .. }
            | FunctionArg::ExprNamed { arg: arg_expr, .. } => {
                match arg_expr {
                    FunctionArgExpr::Expr(expr) => self.visit_expr(expr),
                    // `to_json(u.*)` exposes the whole row
                    FunctionArgExpr::QualifiedWildcard(name) => self.record_qualified_wildcard(name),
                    FunctionArgExpr::Wildcard => {}
                }
            }
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Identifier(ident) => self.record_column(None, ident, None),
            Expr::CompoundIdentifier(idents) => match idents.as_slice() {
                [] => {}
                [name] => self.record_column(None, name, None),
                [.., qualifier, name] => self.record_column(Some(qualifier), name, None),
            },

            Expr::Subquery(query) => self.visit_query(query),
            Expr::InSubquery { expr, subquery, .. } => {
                self.visit_expr(expr);
                self.visit_query(subquery);
            }
            Expr::Exists { subquery, .. } => self.visit_query(subquery),

            Expr::BinaryOp { left, right, .. } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            Expr::AnyOp { left, right, .. } | Expr::AllOp { left, right, .. } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            Expr::UnaryOp { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::Extract { expr, .. }
            | Expr::Collate { expr, .. }
            | Expr::Nested(expr) => self.visit_expr(expr),
            Expr::Like { expr, pattern, .. }
            | Expr::ILike { expr, pattern, .. }
            | Expr::SimilarTo { expr, pattern, .. } => {
                self.visit_expr(expr);
                self.visit_expr(pattern);
            }
            Expr::IsDistinctFrom(left, right) | Expr::IsNotDistinctFrom(left, right) => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            Expr::AtTimeZone {
                timestamp,
                time_zone,
            } => {
                self.visit_expr(timestamp);
                self.visit_expr(time_zone);
            }
            Expr::Substring {
                expr,
                substring_from,
                substring_for,
                ..
            } => {
                self.visit_expr(expr);
                if let Some(from_expr) = substring_from {
                    self.visit_expr(from_expr);
                }
                if let Some(for_expr) = substring_for {
                    self.visit_expr(for_expr);
                }
            }
            Expr::Case {
                operand,
                conditions,
                else_result,
                ..
            } => {
                if let Some(expr) = operand {
                    self.visit_expr(expr);
                }
                for case_when in conditions {
                    self.visit_expr(&case_when.condition);
                    self.visit_expr(&case_when.result);
                }
                if let Some(expr) = else_result {
                    self.visit_expr(expr);
                }
            }
            Expr::Function(func) => {
                match &func.args {
                    FunctionArguments::List(arg_list) => {
                        for arg in &arg_list.args {
                            self.visit_function_arg(arg);
                        }
                        // ORDER BY, LIMIT and the like inside the parentheses
                        self.visit_residue(&arg_list.clauses);
                    }
                    FunctionArguments::Subquery(query) => self.visit_query(query),
                    FunctionArguments::None => {}
                }
                if let Some(filter) = &func.filter {
                    self.visit_expr(filter);
                }
                for order in &func.within_group {
                    self.visit_expr(&order.expr);
                }
                if let Some(WindowType::WindowSpec(spec)) = &func.over {
                    for expr in &spec.partition_by {
                        self.visit_expr(expr);
                    }
                    for order in &spec.order_by {
                        self.visit_expr(&order.expr);
                    }
                    self.visit_residue(&spec.window_frame);
                }
            }
            Expr::InList { expr, list, .. } => {
                self.visit_expr(expr);
                for item in list {
                    self.visit_expr(item);
                }
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                self.visit_expr(expr);
                self.visit_expr(low);
                self.visit_expr(high);
            }
            Expr::IsNull(expr)
            | Expr::IsNotNull(expr)
            | Expr::IsTrue(expr)
            | Expr::IsNotTrue(expr)
            | Expr::IsFalse(expr)
            | Expr::IsNotFalse(expr)
            | Expr::IsUnknown(expr)
            | Expr::IsNotUnknown(expr) => self.visit_expr(expr),
            Expr::InUnnest {
                expr, array_expr, ..
            } => {
                self.visit_expr(expr);
                self.visit_expr(array_expr);
            }
            Expr::Tuple(exprs) => {
                for expr in exprs {
                    self.visit_expr(expr);
                }
            }
            Expr::Array(arr) => {
                for expr in &arr.elem {
                    self.visit_expr(expr);
                }
            }
            Expr::CompoundFieldAccess { root, access_chain } => {
                let field = match access_chain.first() {
                    Some(AccessExpr::Dot(Expr::Identifier(field))) => Some(field),
                    _ => None,
                };
                let rest = match (self.relation_root(root), field) {
                    (Some(Relation::Physical(table)), Some(field)) => {
                        self.push_column(Some(table), field.value.clone(), None);
                        &access_chain[1..]
                    }
                    (Some(Relation::Derived), Some(_)) => &access_chain[1..],
                    _ => {
                        self.visit_expr(root);
                        &access_chain[..]
                    }
                };
                for access in rest {
                    match access {
                        // field name, not a column
                        AccessExpr::Dot(Expr::Identifier(_)) => {}
                        AccessExpr::Dot(expr) => self.visit_expr(expr),
                        AccessExpr::Subscript(subscript) => self.visit_residue(subscript),
                    }
                }
            }

            Expr::QualifiedWildcard(name, ..) => self.record_qualified_wildcard(name),
            Expr::Wildcard(..) => {}

            other => self.visit_unhandled_expr(other),
        }
    }

    /// Walk the children of an expression variant without a dedicated arm
    fn visit_unhandled_expr(&mut self, expr: &Expr) {
        let mut residue = Residue {
            skip_root: true,
            ..Residue::default()
        };
        let _ = expr.visit(&mut residue);
        self.absorb(residue);
    }

    /// Walk any AST node generically, feeding what it contains back into
    /// the scoped walk
    fn visit_residue<T: Visit>(&mut self, node: &T) {
        let mut residue = Residue::default();
        let _ = node.visit(&mut residue);
        self.absorb(residue);
    }

    fn absorb(&mut self, residue: Residue) {
        for relation in &residue.relations {
            let parts = ident_parts(relation);
            let Some(table_name) = parts.last() else {
                continue;
            };
            if parts.len() == 1 && self.is_cte(&table_name.to_lowercase()) {
                continue;
            }
            let schema = parts.len().checked_sub(2).map(|i| parts[i].as_str());
            self.record_table(table_name, None, schema);
        }
        for query in &residue.queries {
            self.visit_query(query);
        }
        for expr in &residue.exprs {
            self.visit_expr(expr);
        }
    }

    /// The relation a whole-row expression such as `u` or `(u)` names
    fn relation_root(&self, expr: &Expr) -> Option<Relation> {
        match expr {
            Expr::Identifier(ident) => self.resolve_qualifier(&ident.value),
            Expr::Nested(inner) => self.relation_root(inner),
            _ => None,
        }
    }

    fn record_qualified_wildcard(&mut self, name: &ObjectName) {
        let Some(qualifier) = last_ident(name) else {
            return;
        };
        match self.resolve_qualifier(&qualifier.value) {
            Some(Relation::Physical(table)) => self.push_column(Some(table), "*".to_string(), None),
            Some(Relation::Derived) => {}
            None => self.push_column(Some(qualifier.value.clone()), "*".to_string(), None),
        }
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    fn record_table(&mut self, name: &str, alias: Option<&str>, schema: Option<&str>) {
        let reference = TableReference {
            name: name.to_string(),
            alias: alias.map(str::to_string),
            schema: schema.map(str::to_string),
        };
        if self.table_keys.insert(reference.qualified_lower()) {
            self.tables.push(reference);
        }
    }

    fn record_column(&mut self, qualifier: Option<&Ident>, name: &Ident, alias: Option<&Ident>) {
        let owner = match qualifier {
            Some(qualifier) => match self.resolve_qualifier(&qualifier.value) {
                Some(Relation::Physical(table)) => Some(table),
                Some(Relation::Derived) => None,
                None => Some(qualifier.value.clone()),
            },
            None => {
                let Some(scope) = self.scopes.last() else {
                    self.push_column(None, name.value.clone(), alias.map(|a| a.value.clone()));
                    return;
                };
                if scope.resolving_outputs
                    && scope.output_aliases.contains(&name.value.to_lowercase())
                {
                    return;
                }
                let lone_table = scope.lone_table.clone();
                match self.resolve_qualifier(&name.value) {
                    Some(Relation::Physical(table)) => {
                        self.push_column(Some(table), "*".to_string(), None);
                        return;
                    }
                    Some(Relation::Derived) => return,
                    None => lone_table,
                }
            }
        };

        self.push_column(owner, name.value.clone(), alias.map(|a| a.value.clone()));
    }

    fn push_column(&mut self, table: Option<String>, name: String, alias: Option<String>) {
        let key = (table.as_ref().map(|t| t.to_lowercase()), name.to_lowercase());
        if self.column_keys.insert(key) {
            self.columns.push(ColumnReference { name, table, alias });
        }
    }

    fn resolve_qualifier(&self, qualifier: &str) -> Option<Relation> {
        let lowered = qualifier.to_lowercase();
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.relations.get(&lowered).cloned())
    }
}

/// Variants `Extractor::visit_expr` matches explicitly
fn has_dedicated_arm(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Identifier(_)
            | Expr::CompoundIdentifier(_)
            | Expr::Subquery(_)
            | Expr::InSubquery { .. }
            | Expr::Exists { .. }
            | Expr::BinaryOp { .. }
            | Expr::AnyOp { .. }
            | Expr::AllOp { .. }
            | Expr::UnaryOp { .. }
            | Expr::Cast { .. }
            | Expr::Extract { .. }
            | Expr::Collate { .. }
            | Expr::Nested(_)
            | Expr::Like { .. }
            | Expr::ILike { .. }
            | Expr::SimilarTo { .. }
            | Expr::IsDistinctFrom(..)
            | Expr::IsNotDistinctFrom(..)
            | Expr::AtTimeZone { .. }
            | Expr::Substring { .. }
            | Expr::Case { .. }
            | Expr::Function(_)
            | Expr::InList { .. }
            | Expr::Between { .. }
            | Expr::IsNull(_)
            | Expr::IsNotNull(_)
            | Expr::IsTrue(_)
            | Expr::IsNotTrue(_)
            | Expr::IsFalse(_)
            | Expr::IsNotFalse(_)
            | Expr::IsUnknown(_)
            | Expr::IsNotUnknown(_)
            | Expr::InUnnest { .. }
            | Expr::Tuple(_)
            | Expr::Array(_)
            | Expr::CompoundFieldAccess { .. }
            | Expr::QualifiedWildcard(..)
            | Expr::Wildcard(..)
    )
}

fn cte_name(cte: &Cte) -> String {
    cte.alias.name.value.to_lowercase()
}

fn ident_parts(name: &ObjectName) -> Vec<String> {
    name.0
        .iter()
        .filter_map(|part| part.as_ident())
        .map(|ident| ident.value.clone())
        .collect()
}

fn last_ident(name: &ObjectName) -> Option<&Ident> {
    name.0.iter().rev().find_map(|part| part.as_ident())
}

fn order_by_exprs(query: &Query) -> Vec<&Expr> {
    match &query.order_by {
        Some(order_by) => match &order_by.kind {
            OrderByKind::Expressions(exprs) => exprs.iter().map(|order| &order.expr).collect(),
            _ => Vec::new(),
        },
        None => Vec::new(),
    }
}

/// The physical table of a join-free, single-source SELECT
fn lone_physical_table(select: &Select, scope: &Scope) -> Option<String> {
    match select.from.as_slice() {
        [only] if only.joins.is_empty() && matches!(only.relation, TableFactor::Table { .. }) => {
            scope.physical.first().cloned()
        }
        _ => None,
    }
}
