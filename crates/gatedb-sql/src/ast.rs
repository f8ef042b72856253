//! The compiled query plan and statement types the parser suite produces
//! (§4.N "a `query_plan` is an ordered list of steps"; §4.O).
//!
//! Conditions and scalar expressions are represented directly as
//! [`gatedb_types::Value`] trees using the literal shapes §4.I describes
//! (`{column, op, value}`, `{op, left, right}`, `{fn, args}`, ...) rather
//! than a parallel typed AST — this expression grammar is already
//! data-shaped, so evaluating it as data (in `crate::eval`) avoids a
//! redundant conversion layer. The one place this doesn't reach is
//! subqueries, which aren't expressible as `Value`; those are held out of
//! line in `Plan::subqueries` and referenced from inside a condition/expr
//! tree by index (`{"exists": idx}`, `{"__subquery__": idx}`), resolved by
//! the executor before any row is evaluated (subqueries are non-
//! correlated per §4.I/§9d, so each is run exactly once).

use gatedb_types::Value;

/// One item in a `SELECT` list or `RETURNING` clause.
#[derive(Debug, Clone)]
pub struct SelectItem {
    /// The expression to evaluate, or `Value::String("*")` for "all
    /// columns" (optionally qualified `t.*`).
    pub expr: Value,
    /// An explicit `AS alias`, if given.
    pub alias: Option<String>,
}

/// One `ORDER BY` key.
#[derive(Debug, Clone)]
pub struct OrderKey {
    /// The expression to sort by (often a bare column reference).
    pub expr: Value,
    /// Descending if true, ascending otherwise.
    pub desc: bool,
    /// Explicit `NULLS FIRST`/`NULLS LAST` override, if given.
    pub nulls_first: Option<bool>,
}

/// One aggregate call in a `SELECT` list (`COUNT(*)`, `SUM(x)`, ...).
#[derive(Debug, Clone)]
pub struct AggregateCall {
    /// Function name, upper-cased (`COUNT`, `SUM`, `AVG`, `MIN`, `MAX`,
    /// `GROUP_CONCAT`).
    pub func: String,
    /// The argument expression, or `None` for `COUNT(*)`.
    pub arg: Option<Value>,
    /// Whether `DISTINCT` was specified.
    pub distinct: bool,
    /// `GROUP_CONCAT`'s optional `SEPARATOR`, default `","`.
    pub separator: Option<String>,
    /// The output column name (explicit alias or a synthesized one).
    pub alias: String,
}

/// One window function call (`... OVER (PARTITION BY ... ORDER BY ...)`).
#[derive(Debug, Clone)]
pub struct WindowCall {
    /// `ROW_NUMBER`, `RANK`, `DENSE_RANK`, `SUM`, `COUNT`, `AVG`, `MIN`,
    /// `MAX`.
    pub func: String,
    /// The argument expression for the aggregate-style window functions;
    /// `None` for `ROW_NUMBER`/`RANK`/`DENSE_RANK`.
    pub arg: Option<Value>,
    /// `PARTITION BY` expressions; empty means one partition over all
    /// rows.
    pub partition_by: Vec<Value>,
    /// `ORDER BY` keys within each partition.
    pub order_by: Vec<OrderKey>,
    /// The output column name.
    pub alias: String,
}

/// `INNER`/`LEFT`/`RIGHT`/`FULL`/`CROSS` (§4.J).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `INNER JOIN` / bare `JOIN`.
    Inner,
    /// `LEFT [OUTER] JOIN`.
    Left,
    /// `RIGHT [OUTER] JOIN`.
    Right,
    /// `FULL [OUTER] JOIN`.
    Full,
    /// `CROSS JOIN`.
    Cross,
}

/// Where a plan step's input rows come from (§4.N `table_scan (or
/// values)`).
#[derive(Debug, Clone)]
pub enum PlanSource {
    /// A single implicit empty row — `SELECT` with no `FROM` (§6.A).
    None,
    /// Scan a table's rows (resolved by the executor from the state the
    /// Runner read for this statement).
    Table {
        /// Table name.
        name: String,
        /// `FROM t AS alias` / `FROM t alias`.
        alias: Option<String>,
    },
    /// A derived table: `(SELECT ...) AS alias`.
    SubPlan {
        /// The nested plan.
        plan: Box<Plan>,
        /// Required alias.
        alias: String,
    },
    /// A reference to a CTE materialized earlier in the same statement.
    CteRef {
        /// The CTE's name.
        name: String,
        /// An additional alias given at the reference site, if any.
        alias: Option<String>,
    },
    /// `INSERT ... VALUES` literal rows, or a values-only source used
    /// internally for constant folding.
    Values {
        /// Column names, assigned `column1`, `column2`, ... if omitted.
        columns: Vec<String>,
        /// Row literals, each a list of scalar expressions (usually
        /// literals, but arbitrary expressions are accepted).
        rows: Vec<Vec<Value>>,
    },
}

/// One `JOIN` clause chained onto a plan's source.
#[derive(Debug, Clone)]
pub struct JoinClause {
    /// Join kind.
    pub kind: JoinKind,
    /// The right-hand input.
    pub right: PlanSource,
    /// The `ON` condition, as a `Value`-encoded `Condition` tree
    /// (§4.I). `None` for `CROSS JOIN`.
    pub on: Option<Value>,
}

/// A `WITH [RECURSIVE] name(cols) AS (...)` entry.
#[derive(Debug, Clone)]
pub struct CteDef {
    /// CTE name, referenced by `PlanSource::CteRef`.
    pub name: String,
    /// Explicit column names from `name(col1, col2)`, if given.
    pub columns: Vec<String>,
    /// The seed/anchor query.
    pub anchor: Box<Plan>,
    /// The recursive term (`UNION ALL SELECT ... FROM name`), if this is
    /// a `RECURSIVE` CTE with a self-reference.
    pub recursive_term: Option<Box<Plan>>,
}

/// A compiled, linear query pipeline (§4.N): `table_scan/values → join(s)
/// → filter → aggregate → project → distinct → order_by → limit`, with
/// `HAVING` folded in as a post-aggregate filter and `UNION`/`UNION ALL`
/// represented as a combinator over two sub-plans.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// `WITH` clause entries, materialized in order before the body runs.
    pub ctes: Vec<CteDef>,
    /// The first input (table scan, values, CTE reference, or derived
    /// table).
    pub source: PlanSource,
    /// `JOIN` clauses chained onto `source`, applied in order.
    pub joins: Vec<JoinClause>,
    /// `WHERE` condition, as a `Value`-encoded `Condition` tree.
    pub filter: Option<Value>,
    /// `GROUP BY` expressions. Non-empty, or non-empty `aggregates`,
    /// triggers the aggregate step.
    pub group_by: Vec<Value>,
    /// Aggregate calls referenced anywhere in the select list / having.
    pub aggregates: Vec<AggregateCall>,
    /// `HAVING` condition, evaluated against aggregated rows.
    pub having: Option<Value>,
    /// Window function calls referenced in the select list.
    pub windows: Vec<WindowCall>,
    /// The `SELECT` list.
    pub select: Vec<SelectItem>,
    /// `DISTINCT` (`Some(vec![])` for a full-row distinct, `Some(cols)`
    /// for `DISTINCT ON`-style column lists); `None` if absent.
    pub distinct: Option<Vec<Value>>,
    /// `ORDER BY` keys.
    pub order_by: Vec<OrderKey>,
    /// `LIMIT`.
    pub limit: Option<i64>,
    /// `OFFSET`.
    pub offset: Option<i64>,
    /// `UNION`/`UNION ALL` with another plan.
    pub union: Option<(bool, Box<Plan>)>,
    /// Non-correlated subqueries referenced from `filter`/`having`/
    /// `select`/join `on` conditions via `{"exists": idx}` /
    /// `{"__subquery__": idx}` / `{"in_subquery": idx}` markers.
    pub subqueries: Vec<Plan>,
}

impl Default for PlanSource {
    fn default() -> Self {
        PlanSource::None
    }
}

impl Plan {
    /// Every base table name referenced anywhere in this plan — its own
    /// source/joins, every CTE, and every nested subquery — so the
    /// caller can build one `ReadSet` that resolves everything a single
    /// execution might touch (§4.G.2).
    pub fn referenced_tables(&self, out: &mut std::collections::BTreeSet<String>) {
        fn from_source(source: &PlanSource, out: &mut std::collections::BTreeSet<String>) {
            match source {
                PlanSource::Table { name, .. } => {
                    out.insert(name.clone());
                }
                PlanSource::SubPlan { plan, .. } => plan.referenced_tables(out),
                PlanSource::CteRef { .. } | PlanSource::None | PlanSource::Values { .. } => {}
            }
        }
        from_source(&self.source, out);
        for join in &self.joins {
            from_source(&join.right, out);
        }
        for cte in &self.ctes {
            cte.anchor.referenced_tables(out);
            if let Some(term) = &cte.recursive_term {
                term.referenced_tables(out);
            }
        }
        for sub in &self.subqueries {
            sub.referenced_tables(out);
        }
        if let Some((_, other)) = &self.union {
            other.referenced_tables(out);
        }
    }
}

/// A fully parsed statement. DDL/DML variants carry just enough to build
/// the corresponding `*_execute` event (§6.C); `Select`/`Explain`/
/// `CreateTableAs` carry a compiled [`Plan`] the engine runs directly
/// against Runner-resolved state rather than round-tripping through the
/// event bus (see crate-level docs and `DESIGN.md`).
#[derive(Debug, Clone)]
pub enum Statement {
    /// `CREATE TABLE`.
    CreateTable {
        /// Table name.
        table: String,
        /// User-declared columns (the synthetic `id` column is added by
        /// the executor, not here).
        columns: Vec<gatedb_types::Column>,
        /// `IF NOT EXISTS`.
        if_not_exists: bool,
    },
    /// `CREATE TABLE ... AS SELECT ...`.
    CreateTableAs {
        /// Table name.
        table: String,
        /// The `SELECT` to run and derive columns/rows from.
        plan: Box<Plan>,
    },
    /// `DROP TABLE`.
    DropTable {
        /// Table name.
        table: String,
        /// `IF EXISTS`.
        if_exists: bool,
    },
    /// `TRUNCATE [TABLE]`.
    Truncate {
        /// Table name.
        table: String,
    },
    /// `ALTER TABLE ... ADD [COLUMN] ...`.
    AddColumn {
        /// Table name.
        table: String,
        /// The new column.
        column: gatedb_types::Column,
    },
    /// `ALTER TABLE ... DROP COLUMN ...`.
    DropColumn {
        /// Table name.
        table: String,
        /// Column to drop.
        column: String,
    },
    /// `ALTER TABLE ... RENAME TO ...`.
    RenameTable {
        /// Current name.
        table: String,
        /// New name.
        new_name: String,
    },
    /// `INSERT INTO ... VALUES (...), ...` / `DEFAULT VALUES`.
    Insert {
        /// Table name.
        table: String,
        /// Explicit column list, if given.
        columns: Option<Vec<String>>,
        /// One row of value expressions per `VALUES (...)` tuple.
        rows: Vec<Vec<Value>>,
        /// `ON CONFLICT (col) DO NOTHING | DO UPDATE SET ...`.
        on_conflict: Option<OnConflict>,
        /// `RETURNING` list.
        returning: Vec<SelectItem>,
    },
    /// `INSERT INTO ... SELECT ...`.
    InsertSelect {
        /// Table name.
        table: String,
        /// Explicit column list, if given.
        columns: Option<Vec<String>>,
        /// The `SELECT` plan to run first.
        plan: Box<Plan>,
    },
    /// `UPDATE ... SET ... WHERE ...`.
    Update {
        /// Table name.
        table: String,
        /// `column = expr` assignments.
        changes: Vec<(String, Value)>,
        /// `WHERE` condition.
        filter: Option<Value>,
        /// `RETURNING` list.
        returning: Vec<SelectItem>,
    },
    /// `DELETE FROM ... WHERE ...`.
    Delete {
        /// Table name.
        table: String,
        /// `WHERE` condition.
        filter: Option<Value>,
        /// `RETURNING` list.
        returning: Vec<SelectItem>,
    },
    /// `SELECT ...` (including `WITH`/CTEs and `UNION`).
    Select(Box<Plan>),
    /// `EXPLAIN <stmt>`.
    Explain(Box<Plan>),
    /// `CREATE [UNIQUE] INDEX i ON t (col)`.
    CreateIndex {
        /// Index name.
        name: String,
        /// Table name.
        table: String,
        /// Indexed column.
        column: String,
        /// `UNIQUE`.
        unique: bool,
    },
    /// `DROP INDEX i ON t`.
    DropIndex {
        /// Index name.
        name: String,
        /// Table name.
        table: String,
    },
    /// `CREATE VIEW v AS SELECT ...`.
    CreateView {
        /// View name.
        name: String,
        /// The view's query.
        plan: Box<Plan>,
    },
    /// `DROP VIEW v`.
    DropView {
        /// View name.
        name: String,
    },
    /// `CREATE TRIGGER r ...` (catalog-only, §9 Open Question b).
    CreateTrigger {
        /// Trigger name.
        name: String,
        /// Raw definition text, stored verbatim (triggers aren't
        /// enforced — see `DESIGN.md`).
        definition: String,
    },
    /// `DROP TRIGGER r`.
    DropTrigger {
        /// Trigger name.
        name: String,
    },
    /// `ALTER TABLE t ADD CONSTRAINT c ...`.
    CreateConstraint {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
        /// Raw definition text (catalog-only).
        definition: String,
    },
    /// `ALTER TABLE t DROP CONSTRAINT c`.
    DropConstraint {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },
    /// `BEGIN`.
    Begin,
    /// `COMMIT`.
    Commit,
    /// `ROLLBACK`.
    Rollback,
}

/// `INSERT ... ON CONFLICT` clause.
#[derive(Debug, Clone)]
pub enum OnConflict {
    /// `ON CONFLICT (col) DO NOTHING`.
    DoNothing {
        /// The conflict target column.
        column: String,
    },
    /// `ON CONFLICT (col) DO UPDATE SET ...`.
    DoUpdate {
        /// The conflict target column.
        column: String,
        /// Assignments to apply to the existing row.
        changes: Vec<(String, Value)>,
    },
}
