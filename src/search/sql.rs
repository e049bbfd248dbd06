//! PostgreSQL rendering of compiled queries.
//!
//! Every user value is referenced through a `:name` placeholder; the
//! statement text itself only ever contains column names, aliases and
//! compiler constants.

use std::fmt::Write as _;

use crate::model::label::EntityLabel;
use crate::store::{Filter, ItemChanges, SelectQuery};

use super::predicate::{
    Column, ExtraColumn, NullsOrder, Operand, Predicate, Projection, SortDirective, TextIndex,
};

pub const TABLE: &str = "library_item";

const TS_CONFIG: &str = "english";

/// Render a predicate as a boolean SQL expression.
pub fn predicate(p: &Predicate) -> String {
    match p {
        Predicate::And(l, r) => format!("{} AND {}", operand_of(l), operand_of(r)),
        Predicate::Or(l, r) => format!("{} OR {}", operand_of(l), operand_of(r)),
        Predicate::Not(inner) => format!("NOT ({})", predicate(inner)),
        Predicate::Group(inner) => format!("({})", predicate(inner)),
        Predicate::TextMatch { index, query } => {
            format!("{} @@ {}", tsvector(*index), tsquery(query.name()))
        }
        Predicate::ILike { column, pattern } => format!("{} ILIKE :{pattern}", col(*column)),
        Predicate::EqualsIgnoreCase { column, value } => {
            format!("LOWER({}) = :{value}", col(*column))
        }
        Predicate::Equals { column, value } => format!("{} = :{value}", col(*column)),
        Predicate::NotEquals { column, value } => format!("{} <> :{value}", col(*column)),
        Predicate::Compare { column, op, value } => {
            format!("{} {} {}", col(*column), op.as_str(), operand(value))
        }
        Predicate::Between { column, low, high } => format!(
            "{} BETWEEN {} AND {}",
            col(*column),
            operand(low),
            operand(high)
        ),
        Predicate::ArrayContains { columns, value } => format!(
            "LOWER(:{value}) = ANY(LOWER({}::text)::text[])",
            array_union(columns)
        ),
        Predicate::ArrayAnyLike { columns, pattern } => format!(
            "EXISTS (SELECT 1 FROM unnest({}) AS element WHERE element ILIKE :{pattern})",
            array_union(columns)
        ),
        Predicate::InList { column, values } => format!("{} = ANY(:{values})", col(*column)),
        Predicate::IsNull(column) => format!("{} IS NULL", col(*column)),
        Predicate::IsNotNull(column) => format!("{} IS NOT NULL", col(*column)),
        Predicate::NotEmpty(column) if column.is_array() => {
            format!("cardinality({}) > 0", col(*column))
        }
        Predicate::NotEmpty(column) => format!("{} <> ''", col(*column)),
        Predicate::IsEmpty(column) if column.is_array() => {
            let c = col(*column);
            format!("({c} IS NULL OR cardinality({c}) = 0)")
        }
        Predicate::IsEmpty(column) => {
            let c = col(*column);
            format!("({c} IS NULL OR {c} = '')")
        }
        Predicate::WithinDays { column, days } => {
            let c = col(*column);
            format!("({c} IS NOT NULL AND {c} >= NOW() - INTERVAL '{days} days')")
        }
    }
}

/// `WHERE ...`, or an empty string for an unconstrained filter.
pub fn where_clause(filter: &Filter) -> String {
    match &filter.predicate {
        Some(p) => format!("WHERE {}", predicate(p)),
        None => String::new(),
    }
}

pub fn projection(column: &ExtraColumn) -> String {
    match &column.expr {
        Projection::Rank { index, query } => format!(
            "ts_rank_cd({}, {}) AS {}",
            tsvector(*index),
            tsquery(query.name()),
            column.alias
        ),
    }
}

/// `ORDER BY ...`, or an empty string when there is nothing to sort by.
pub fn order_by(sort: &[SortDirective]) -> String {
    if sort.is_empty() {
        return String::new();
    }
    let entries: Vec<String> = sort
        .iter()
        .map(|d| {
            let target = match Column::from_name(&d.by) {
                Some(column) => col(column),
                None => d.by.clone(),
            };
            let nulls = match d.nulls {
                NullsOrder::First => "NULLS FIRST",
                NullsOrder::Last => "NULLS LAST",
            };
            format!("{target} {} {nulls}", d.direction.as_str())
        })
        .collect();
    format!("ORDER BY {}", entries.join(", "))
}

/// Page query.
pub fn select(query: &SelectQuery) -> String {
    let mut sql = format!("SELECT {TABLE}.*");
    for column in &query.extra_columns {
        let _ = write!(sql, ", {}", projection(column));
    }
    let _ = write!(sql, " FROM {TABLE}");
    push_clause(&mut sql, &where_clause(&query.filter));
    push_clause(&mut sql, &order_by(&query.sort));
    let _ = write!(sql, " LIMIT {} OFFSET {}", query.limit, query.offset);
    sql
}

pub fn count(filter: &Filter) -> String {
    let mut sql = format!("SELECT COUNT(*) FROM {TABLE}");
    push_clause(&mut sql, &where_clause(filter));
    sql
}

/// Bulk update. Assigned values use the `:set_<column>` placeholders.
pub fn update(filter: &Filter, changes: &ItemChanges) -> String {
    let mut assignments = Vec::new();
    let mut set = |column: Column, present: bool| {
        if present {
            assignments.push(format!("{0} = :set_{0}", column.name()));
        }
    };
    set(Column::State, changes.state.is_some());
    set(Column::Folder, changes.folder.is_some());
    set(Column::ArchivedAt, changes.archived_at.is_some());
    set(Column::DeletedAt, changes.deleted_at.is_some());
    set(Column::ReadAt, changes.read_at.is_some());
    set(
        Column::ReadingProgressTopPercent,
        changes.reading_progress.is_some(),
    );
    set(
        Column::ReadingProgressBottomPercent,
        changes.reading_progress.is_some(),
    );
    set(Column::UpdatedAt, changes.updated_at.is_some());

    let mut sql = format!("UPDATE {TABLE} SET {}", assignments.join(", "));
    push_clause(&mut sql, &where_clause(filter));
    sql
}

/// Label link insert that ignores rows which already exist.
pub fn insert_labels(links: &[EntityLabel]) -> String {
    let rows: Vec<String> = (0..links.len())
        .map(|i| format!("(:label_id_{i}, :library_item_id_{i})"))
        .collect();
    format!(
        "INSERT INTO entity_labels (label_id, library_item_id) VALUES {} ON CONFLICT DO NOTHING",
        rows.join(", ")
    )
}

fn push_clause(sql: &mut String, clause: &str) {
    if !clause.is_empty() {
        sql.push(' ');
        sql.push_str(clause);
    }
}

/// Parenthesize connectives so nesting never depends on precedence.
fn operand_of(p: &Predicate) -> String {
    match p {
        Predicate::And(..) | Predicate::Or(..) => format!("({})", predicate(p)),
        _ => predicate(p),
    }
}

fn col(column: Column) -> String {
    format!("{TABLE}.{}", column.name())
}

fn operand(value: &Operand) -> String {
    match value {
        Operand::Param(p) => format!(":{p}"),
        Operand::Int(n) => n.to_string(),
    }
}

fn tsvector(index: TextIndex) -> String {
    match index {
        TextIndex::Search => format!("{TABLE}.search_tsv"),
        TextIndex::Field(column) => format!("{TABLE}.{}_tsv", column.name()),
    }
}

fn tsquery(param: &str) -> String {
    format!("websearch_to_tsquery('{TS_CONFIG}', :{param})")
}

fn array_union(columns: &[Column]) -> String {
    match columns {
        [single] => col(*single),
        _ => {
            let parts: Vec<String> = columns.iter().map(|c| col(*c)).collect();
            format!("array_cat({})", parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::compiler::{CompileOptions, QueryCompiler};
    use crate::search::fields::FieldRegistry;
    use crate::search::predicate::{ParamValue, Parameters, SortDirection};

    fn compile(text: &str) -> Filter {
        let registry = FieldRegistry::standard();
        let options = CompileOptions::new(
            chrono::DateTime::parse_from_rfc3339("2024-03-15T10:00:00+00:00").unwrap(),
        );
        let compiled = QueryCompiler::new(&registry)
            .compile_text(text, &options)
            .unwrap();
        Filter {
            predicate: compiled.predicate,
            parameters: compiled.parameters,
        }
    }

    #[test]
    fn test_user_values_never_reach_sql_text() {
        let hostile = "label:\"x'); DROP TABLE library_item; --\" title:\"o'brien\"";
        let filter = compile(hostile);
        let sql = where_clause(&filter);
        assert!(!sql.contains("DROP"), "{sql}");
        assert!(!sql.contains("brien"), "{sql}");
        assert!(sql.contains(":label_0"));
        assert_eq!(filter.parameters.len(), 3);
    }

    #[test]
    fn test_label_group_renders_parenthesized_or() {
        let filter = compile("label:\"a,b*\"");
        assert_eq!(
            where_clause(&filter),
            "WHERE (LOWER(:label_0) = ANY(LOWER(array_cat(library_item.label_names, \
             library_item.highlight_labels)::text)::text[]) OR EXISTS (SELECT 1 FROM \
             unnest(array_cat(library_item.label_names, library_item.highlight_labels)) \
             AS element WHERE element ILIKE :label_1))"
        );
    }

    #[test]
    fn test_nested_connectives_are_parenthesized() {
        let filter = compile("is:read OR in:archive has:labels");
        assert_eq!(
            where_clause(&filter),
            "WHERE library_item.reading_progress_bottom_percent > 98 OR \
             (library_item.archived_at IS NOT NULL AND cardinality(library_item.label_names) > 0)"
        );
    }

    #[test]
    fn test_negation_and_trash() {
        let filter = compile("-in:trash");
        assert_eq!(
            where_clause(&filter),
            "WHERE NOT ((library_item.deleted_at IS NOT NULL AND \
             library_item.deleted_at >= NOW() - INTERVAL '14 days'))"
        );
    }

    #[test]
    fn test_empty_filter_has_no_where() {
        let filter = Filter::default();
        assert_eq!(where_clause(&filter), "");
        assert_eq!(count(&filter), "SELECT COUNT(*) FROM library_item");
    }

    #[test]
    fn test_select_with_rank_and_order() {
        let registry = FieldRegistry::standard();
        let options = CompileOptions::new(
            chrono::DateTime::parse_from_rfc3339("2024-03-15T10:00:00+00:00").unwrap(),
        );
        let compiled = QueryCompiler::new(&registry)
            .compile_text("coffee sort:saved-asc", &options)
            .unwrap();
        let mut sort = compiled.sort.clone();
        sort.push(SortDirective::new("updated_at", SortDirection::Desc));
        let query = SelectQuery {
            filter: Filter {
                predicate: compiled.predicate,
                parameters: compiled.parameters,
            },
            extra_columns: compiled.extra_columns,
            sort,
            offset: 20,
            limit: 10,
        };
        assert_eq!(
            select(&query),
            "SELECT library_item.*, ts_rank_cd(library_item.search_tsv, \
             websearch_to_tsquery('english', :implicit_0)) AS rank_0 FROM library_item \
             WHERE library_item.search_tsv @@ websearch_to_tsquery('english', :implicit_0) \
             ORDER BY rank_0 DESC NULLS LAST, library_item.saved_at ASC NULLS LAST, \
             library_item.updated_at DESC NULLS LAST LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_update_and_insert() {
        let mut parameters = Parameters::new();
        let owner = parameters.bind("user_id", ParamValue::Text("u1".into()));
        let filter = Filter {
            predicate: Some(Predicate::Equals {
                column: Column::UserId,
                value: owner,
            }),
            parameters,
        };
        let changes = ItemChanges {
            folder: Some("later".into()),
            updated_at: Some(chrono::Utc::now()),
            ..Default::default()
        };
        assert_eq!(
            update(&filter, &changes),
            "UPDATE library_item SET folder = :set_folder, updated_at = :set_updated_at \
             WHERE library_item.user_id = :user_id_0"
        );

        let links = vec![
            EntityLabel {
                label_id: "l".into(),
                library_item_id: "a".into(),
            };
            2
        ];
        assert_eq!(
            insert_labels(&links),
            "INSERT INTO entity_labels (label_id, library_item_id) VALUES \
             (:label_id_0, :library_item_id_0), (:label_id_1, :library_item_id_1) \
             ON CONFLICT DO NOTHING"
        );
    }
}
