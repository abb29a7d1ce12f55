//! Compiling the query AST to parameterized sqlite statements.
//!
//! The WHERE walk is iterative: an explicit stack of sub-iterators visits
//! the group tree depth-first, left-to-right. References emit
//! table-qualified column names (recording each owning table once),
//! literals emit `?` placeholders and push their value onto the positional
//! parameter list, and nested groups are parenthesized — except the
//! outermost group, which never is.

use crate::ast::{CompareOp, Group, GroupItem, LogicalOp, Operand, ScalarValue};
use crate::model::ModelSchema;
use crate::status::DriverError;

/// A compiled SELECT: statement text, positional params, tables involved.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<ScalarValue>,
    pub tables: Vec<String>,
}

/// A compiled write statement plus the record-field order its
/// placeholders bind in.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledWrite {
    pub sql: String,
    pub columns: Vec<String>,
}

/// A rendered WHERE clause body.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereFragment {
    pub sql: String,
    pub params: Vec<ScalarValue>,
    pub tables: Vec<String>,
}

impl CompareOp {
    fn keyword(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

impl LogicalOp {
    fn keyword(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

/// Render a group into a WHERE clause body.
///
/// The alternation invariant is re-checked during the walk; a stray
/// operator or an empty nested group is [`DriverError::MalformedQuery`]
/// with no partial recovery.
pub fn compile_where(group: &Group) -> Result<WhereFragment, DriverError> {
    let mut sql = String::new();
    let mut params = Vec::new();
    let mut tables: Vec<String> = Vec::new();

    // (sub-iterator, expecting a clause next, saw any item)
    let mut stack = vec![(group.items().iter(), true, false)];

    while let Some((iter, expecting_clause, any)) = stack.last_mut() {
        let Some(item) = iter.next() else {
            if *any && *expecting_clause {
                return Err(DriverError::MalformedQuery(
                    "group ends with a logical operator".into(),
                ));
            }
            if !*any && stack.len() > 1 {
                return Err(DriverError::MalformedQuery("empty nested group".into()));
            }
            stack.pop();
            if !stack.is_empty() {
                sql.push(')');
            }
            continue;
        };

        match item {
            GroupItem::Op(op) => {
                if *expecting_clause {
                    return Err(DriverError::MalformedQuery(format!(
                        "stray {} operator",
                        op.keyword()
                    )));
                }
                sql.push(' ');
                sql.push_str(op.keyword());
                sql.push(' ');
                *expecting_clause = true;
            }
            GroupItem::Comparison(comparison) => {
                if !*expecting_clause {
                    return Err(DriverError::MalformedQuery(
                        "adjacent clauses without an operator".into(),
                    ));
                }
                *expecting_clause = false;
                *any = true;
                emit_operand(&comparison.left, &mut sql, &mut params, &mut tables);
                sql.push(' ');
                sql.push_str(comparison.op.keyword());
                sql.push(' ');
                emit_operand(&comparison.right, &mut sql, &mut params, &mut tables);
            }
            GroupItem::Group(nested) => {
                if !*expecting_clause {
                    return Err(DriverError::MalformedQuery(
                        "adjacent clauses without an operator".into(),
                    ));
                }
                *expecting_clause = false;
                *any = true;
                sql.push('(');
                stack.push((nested.items().iter(), true, false));
            }
        }
    }

    Ok(WhereFragment { sql, params, tables })
}

fn emit_operand(
    operand: &Operand,
    sql: &mut String,
    params: &mut Vec<ScalarValue>,
    tables: &mut Vec<String>,
) {
    match operand {
        Operand::Reference(reference) => {
            sql.push_str(&reference.table);
            sql.push('.');
            sql.push_str(&reference.field);
            if !tables.contains(&reference.table) {
                tables.push(reference.table.clone());
            }
        }
        Operand::Literal(value) => {
            sql.push('?');
            params.push(value.clone());
        }
    }
}

/// `SELECT * FROM <tables> [WHERE <clause>];`
///
/// The model's own table always leads the FROM list; tables referenced
/// only by the filter follow in first-mention order.
pub fn select(schema: &ModelSchema, filter: Option<&Group>) -> Result<CompiledQuery, DriverError> {
    let mut tables = vec![schema.table.clone()];
    let (clause, params) = match filter {
        Some(group) if !group.is_empty() => {
            let fragment = compile_where(group)?;
            for table in fragment.tables {
                if !tables.contains(&table) {
                    tables.push(table);
                }
            }
            (Some(fragment.sql), fragment.params)
        }
        _ => (None, Vec::new()),
    };

    let mut sql = format!("SELECT * FROM {}", tables.join(", "));
    if let Some(clause) = clause {
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
    }
    sql.push(';');
    Ok(CompiledQuery { sql, params, tables })
}

/// Idempotent DDL for one model, columns in primary-key-first order.
pub fn create_table(schema: &ModelSchema) -> Result<String, DriverError> {
    let ordered = schema.ordered_fields();
    let pk = schema.primary_key().ok_or_else(|| DriverError::NoColumns {
        table: schema.table.clone(),
    })?;

    let columns: Vec<String> = ordered
        .iter()
        .map(|field| {
            if field.name == pk.name {
                format!("{} {} PRIMARY KEY", field.name, field.ty.sql_type())
            } else {
                format!("{} {}", field.name, field.ty.sql_type())
            }
        })
        .collect();

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        schema.table,
        columns.join(", ")
    ))
}

/// `INSERT INTO <table> (<columns>) VALUES (?, ...);`
pub fn insert(schema: &ModelSchema) -> Result<CompiledWrite, DriverError> {
    let ordered = schema.ordered_fields();
    if ordered.is_empty() {
        return Err(DriverError::NoColumns {
            table: schema.table.clone(),
        });
    }
    let columns: Vec<String> = ordered.iter().map(|f| f.name.clone()).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    Ok(CompiledWrite {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({});",
            schema.table,
            columns.join(", "),
            placeholders
        ),
        columns,
    })
}

/// `UPDATE <table> SET col = ?, ... WHERE <pk> = ?;`
///
/// Binding order is every non-key column in declaration order, then the
/// primary key.
pub fn update(schema: &ModelSchema) -> Result<CompiledWrite, DriverError> {
    let pk = schema.primary_key().ok_or_else(|| DriverError::NoColumns {
        table: schema.table.clone(),
    })?;
    let mut columns: Vec<String> = schema
        .fields
        .iter()
        .filter(|f| f.name != pk.name)
        .map(|f| f.name.clone())
        .collect();
    if columns.is_empty() {
        return Err(DriverError::MalformedQuery(format!(
            "model `{}` has only its key column, nothing to update",
            schema.table
        )));
    }

    let assignments: Vec<String> = columns.iter().map(|c| format!("{c} = ?")).collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?;",
        schema.table,
        assignments.join(", "),
        pk.name
    );
    columns.push(pk.name.clone());
    Ok(CompiledWrite { sql, columns })
}

/// `DELETE FROM <table> WHERE <pk> = ?;`
pub fn delete(schema: &ModelSchema) -> Result<CompiledWrite, DriverError> {
    let pk = schema.primary_key().ok_or_else(|| DriverError::NoColumns {
        table: schema.table.clone(),
    })?;
    Ok(CompiledWrite {
        sql: format!("DELETE FROM {} WHERE {} = ?;", schema.table, pk.name),
        columns: vec![pk.name.clone()],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CompareOp, FieldRef, compare, when};
    use crate::model::{FieldDef, FieldType};

    fn pages() -> ModelSchema {
        ModelSchema::new(
            "pages",
            vec![
                FieldDef::new("id", FieldType::Int),
                FieldDef::new("title", FieldType::Text),
                FieldDef::new("views", FieldType::Int),
            ],
        )
    }

    #[test]
    fn test_select_without_filter() {
        let query = select(&pages(), None).unwrap();
        assert_eq!(query.sql, "SELECT * FROM pages;");
        assert!(query.params.is_empty());
    }

    #[test]
    fn test_select_flat_where() {
        let filter = when([
            compare(FieldRef::new("pages", "title"), CompareOp::Eq, "home"),
            compare(FieldRef::new("pages", "views"), CompareOp::Gt, 10i64),
        ]);
        let query = select(&pages(), Some(&filter)).unwrap();
        assert_eq!(
            query.sql,
            "SELECT * FROM pages WHERE pages.title = ? AND pages.views > ?;"
        );
        assert_eq!(
            query.params,
            vec![ScalarValue::Text("home".into()), ScalarValue::Int(10)]
        );
        assert_eq!(query.tables, vec!["pages".to_string()]);
    }

    #[test]
    fn test_nested_group_parenthesized_outer_not() {
        let filter = when([compare(
            FieldRef::new("pages", "views"),
            CompareOp::Ge,
            1i64,
        )])
        .or(when([
            compare(FieldRef::new("pages", "title"), CompareOp::Eq, "a"),
            compare(FieldRef::new("pages", "title"), CompareOp::Eq, "b"),
        ]));
        let query = select(&pages(), Some(&filter)).unwrap();
        assert_eq!(
            query.sql,
            "SELECT * FROM pages WHERE pages.views >= ? OR (pages.title = ? AND pages.title = ?);"
        );
    }

    #[test]
    fn test_foreign_table_recorded() {
        let filter = when([compare(
            FieldRef::new("users", "id"),
            CompareOp::Eq,
            FieldRef::new("pages", "id"),
        )]);
        let query = select(&pages(), Some(&filter)).unwrap();
        assert_eq!(query.sql, "SELECT * FROM pages, users WHERE users.id = pages.id;");
        assert_eq!(query.tables, vec!["pages".to_string(), "users".to_string()]);
    }

    #[test]
    fn test_stray_operator_rejected() {
        let malformed = Group::from_items(vec![GroupItem::Op(crate::ast::LogicalOp::And)]);
        let err = compile_where(&malformed).unwrap_err();
        assert!(matches!(err, DriverError::MalformedQuery(_)));

        let trailing = Group::from_items(vec![
            GroupItem::Comparison(compare(
                FieldRef::new("pages", "id"),
                CompareOp::Eq,
                1i64,
            )),
            GroupItem::Op(crate::ast::LogicalOp::And),
        ]);
        assert!(matches!(
            compile_where(&trailing),
            Err(DriverError::MalformedQuery(_))
        ));
    }

    #[test]
    fn test_create_table_pk_first() {
        let schema = ModelSchema::new(
            "notes",
            vec![
                FieldDef::new("body", FieldType::Text),
                FieldDef::new("id", FieldType::Int),
                FieldDef::new("starred", FieldType::Bool),
            ],
        );
        assert_eq!(
            create_table(&schema).unwrap(),
            "CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY, body TEXT, starred INTEGER);"
        );
    }

    #[test]
    fn test_insert_matches_create_order() {
        let schema = ModelSchema::new(
            "notes",
            vec![
                FieldDef::new("body", FieldType::Text),
                FieldDef::new("id", FieldType::Int),
            ],
        );
        let write = insert(&schema).unwrap();
        assert_eq!(write.sql, "INSERT INTO notes (id, body) VALUES (?, ?);");
        assert_eq!(write.columns, ["id", "body"]);
    }

    #[test]
    fn test_update_binds_key_last() {
        let write = update(&pages()).unwrap();
        assert_eq!(
            write.sql,
            "UPDATE pages SET title = ?, views = ? WHERE id = ?;"
        );
        assert_eq!(write.columns, ["title", "views", "id"]);
    }

    #[test]
    fn test_delete_by_key() {
        let write = delete(&pages()).unwrap();
        assert_eq!(write.sql, "DELETE FROM pages WHERE id = ?;");
        assert_eq!(write.columns, ["id"]);
    }
}
