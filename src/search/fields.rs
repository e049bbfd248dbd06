//! Field compilers.
//!
//! One rule per `field:` keyword, plus the rule for bare free text. Each
//! rule maps an operand to an optional predicate and may add parameters,
//! ranking columns or sort directives to the [`Accumulator`].
//!
//! # Vocabulary
//!
//! | Field | Operand |
//! |---|---|
//! | *(free text)* | full-text query, ranked |
//! | `in` | `all`, `archive`, `trash`, or a folder name |
//! | `is` | `read`, `reading`, `unread` |
//! | `type` | item type |
//! | `label` | `a,b*`: comma list, `*` wildcards |
//! | `sort` | `<key>-<asc\|desc>` |
//! | `has` | `highlights`, `labels`, `subscriptions` |
//! | `saved`, `read`, `updated`, `published` | see [`super::dates`] |
//! | `subscription`, `rss`, `language` | exact value |
//! | `author`, `title`, `description`, `note`, `site` | text or substring |
//! | `includes` | comma list of item ids |
//! | `recommendedBy` | name or `*` |
//! | `no` | `highlight`, `label`, `subscription` |
//! | `use`, `mode` | ignored |
//! | `readPosition`, `wordsCount` | `<`, `<=`, `>`, `>=` then an integer |

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::QueryError;

use super::ast::Tag;
use super::compiler::{Accumulator, CompileOptions};
use super::dates;
use super::predicate::{
    CmpOp, Column, ExtraColumn, Operand, ParamValue, Predicate, Projection, SortDirection,
    SortDirective, TextIndex, LABEL_SET,
};

/// Days a soft-deleted item stays visible under `in:trash`.
pub const TRASH_RETENTION_DAYS: i64 = 14;

/// Reading progress above this percentage counts as read.
const READ_THRESHOLD: i64 = 98;
/// Reading progress below this percentage counts as unread.
const UNREAD_THRESHOLD: i64 = 2;

const RECOMMENDERS: &[Column] = &[Column::RecommenderNames];

/// What a field compiler gets to see.
#[derive(Debug, Clone, Copy)]
pub struct FieldInput<'a> {
    /// Registry key (lower-cased field name).
    pub key: &'a str,
    /// Field name as written, for diagnostics.
    pub name: &'a str,
    /// Trimmed, non-empty operand.
    pub value: &'a str,
    pub quoted: bool,
    pub options: &'a CompileOptions,
}

impl FieldInput<'_> {
    fn invalid(&self) -> QueryError {
        QueryError::InvalidEnumValue {
            field: self.name.to_string(),
            value: self.value.to_string(),
        }
    }

    fn missing(&self) -> QueryError {
        QueryError::MissingOperand {
            field: self.name.to_string(),
        }
    }
}

pub type FieldCompiler =
    fn(&FieldInput<'_>, &mut Accumulator) -> Result<Option<Predicate>, QueryError>;

/// Immutable table from field name to compiler.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    implicit: FieldCompiler,
    named: HashMap<&'static str, FieldCompiler>,
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl FieldRegistry {
    /// The full query vocabulary.
    pub fn standard() -> Self {
        let entries: [(&'static str, FieldCompiler); 25] = [
            ("in", compile_in),
            ("is", compile_is),
            ("type", compile_type),
            ("label", compile_label),
            ("sort", compile_sort),
            ("has", compile_has),
            ("saved", compile_date),
            ("read", compile_date),
            ("updated", compile_date),
            ("published", compile_date),
            ("subscription", compile_term),
            ("rss", compile_term),
            ("language", compile_term),
            ("author", compile_match),
            ("title", compile_match),
            ("description", compile_match),
            ("note", compile_match),
            ("site", compile_match),
            ("includes", compile_includes),
            ("recommendedby", compile_recommended_by),
            ("no", compile_no),
            ("use", compile_ignored),
            ("mode", compile_ignored),
            ("readposition", compile_range),
            ("wordscount", compile_range),
        ];
        Self {
            implicit: compile_implicit,
            named: entries.into_iter().collect(),
        }
    }

    /// Compiler for a field name, matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<FieldCompiler> {
        self.named.get(name.to_lowercase().as_str()).copied()
    }

    /// Registered field names, sorted.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.named.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Compile one leaf of the query tree.
    ///
    /// Unknown fields are rejected even with an empty operand; a known
    /// field with an empty operand contributes nothing.
    pub fn compile_tag(
        &self,
        tag: &Tag,
        acc: &mut Accumulator,
        options: &CompileOptions,
    ) -> Result<Option<Predicate>, QueryError> {
        let (name, compiler) = match tag.field_name() {
            None => ("implicit", self.implicit),
            Some(name) => {
                let compiler = self.get(name).ok_or_else(|| QueryError::UnknownField {
                    field: name.to_string(),
                })?;
                (name, compiler)
            }
        };

        let operand = tag.operand();
        let value = operand.trim();
        if value.is_empty() {
            return Ok(None);
        }

        let key = name.to_lowercase();
        let input = FieldInput {
            key: &key,
            name,
            value,
            quoted: tag.is_quoted(),
            options,
        };
        compiler(&input, acc)
    }
}

// ── Free text ───────────────────────────────────────────────────

fn compile_implicit(
    input: &FieldInput<'_>,
    acc: &mut Accumulator,
) -> Result<Option<Predicate>, QueryError> {
    // Keep the quotes so web-search syntax treats it as a phrase.
    let text = if input.quoted {
        format!("\"{}\"", input.value)
    } else {
        input.value.to_string()
    };
    let query = acc.bind("implicit", ParamValue::Text(text));
    let alias = format!("rank_{}", acc.extra_columns.len());

    acc.add_column(ExtraColumn {
        expr: Projection::Rank {
            index: TextIndex::Search,
            query: query.clone(),
        },
        alias: alias.clone(),
    });
    acc.prepend_sort(SortDirective::new(alias, SortDirection::Desc));

    Ok(Some(Predicate::TextMatch {
        index: TextIndex::Search,
        query,
    }))
}

// ── Keyword fields ──────────────────────────────────────────────

fn compile_in(input: &FieldInput<'_>, acc: &mut Accumulator) -> Result<Option<Predicate>, QueryError> {
    let predicate = match input.value.to_lowercase().as_str() {
        "all" => return Ok(None),
        "archive" => Predicate::IsNotNull(Column::ArchivedAt),
        "trash" => {
            acc.trash = true;
            Predicate::WithinDays {
                column: Column::DeletedAt,
                days: TRASH_RETENTION_DAYS,
            }
        }
        _ => {
            let not_archived = Predicate::IsNull(Column::ArchivedAt);
            if !input.options.folder_scoped {
                not_archived
            } else {
                let folder = acc.bind("in", ParamValue::Text(input.value.to_string()));
                Predicate::and(
                    not_archived,
                    Predicate::Equals {
                        column: Column::Folder,
                        value: folder,
                    },
                )
            }
        }
    };
    Ok(Some(predicate))
}

fn compile_is(input: &FieldInput<'_>, _acc: &mut Accumulator) -> Result<Option<Predicate>, QueryError> {
    let column = Column::ReadingProgressBottomPercent;
    let predicate = match input.value.to_lowercase().as_str() {
        "read" => Predicate::Compare {
            column,
            op: CmpOp::Gt,
            value: Operand::Int(READ_THRESHOLD),
        },
        "reading" => Predicate::Between {
            column,
            low: Operand::Int(UNREAD_THRESHOLD),
            high: Operand::Int(READ_THRESHOLD),
        },
        "unread" => Predicate::Compare {
            column,
            op: CmpOp::Lt,
            value: Operand::Int(UNREAD_THRESHOLD),
        },
        _ => return Err(input.invalid()),
    };
    Ok(Some(predicate))
}

fn compile_has(input: &FieldInput<'_>, _acc: &mut Accumulator) -> Result<Option<Predicate>, QueryError> {
    let predicate = match input.value.to_lowercase().as_str() {
        "highlights" => Predicate::NotEmpty(Column::HighlightAnnotations),
        "labels" => Predicate::NotEmpty(Column::LabelNames),
        "subscriptions" => Predicate::NotEmpty(Column::Subscription),
        _ => return Err(input.invalid()),
    };
    Ok(Some(predicate))
}

fn compile_no(input: &FieldInput<'_>, _acc: &mut Accumulator) -> Result<Option<Predicate>, QueryError> {
    let column = match input.value.to_lowercase().as_str() {
        "highlight" => Column::HighlightAnnotations,
        "label" => Column::LabelNames,
        "subscription" => Column::Subscription,
        _ => return Err(input.invalid()),
    };
    Ok(Some(Predicate::IsEmpty(column)))
}

fn compile_ignored(
    _input: &FieldInput<'_>,
    _acc: &mut Accumulator,
) -> Result<Option<Predicate>, QueryError> {
    Ok(None)
}

// ── Value fields ────────────────────────────────────────────────

fn compile_type(input: &FieldInput<'_>, acc: &mut Accumulator) -> Result<Option<Predicate>, QueryError> {
    let value = acc.bind("type", ParamValue::Text(input.value.to_lowercase()));
    Ok(Some(Predicate::EqualsIgnoreCase {
        column: Column::ItemType,
        value,
    }))
}

fn compile_term(input: &FieldInput<'_>, acc: &mut Accumulator) -> Result<Option<Predicate>, QueryError> {
    let column = match input.key {
        "language" => Column::ItemLanguage,
        _ => Column::Subscription,
    };
    let value = acc.bind(input.key, ParamValue::Text(input.value.to_lowercase()));
    Ok(Some(Predicate::EqualsIgnoreCase { column, value }))
}

/// Full-text match on the field's own index, or a substring match for what
/// tokenization misses (partial words, punctuation).
fn compile_match(input: &FieldInput<'_>, acc: &mut Accumulator) -> Result<Option<Predicate>, QueryError> {
    let column = match input.key {
        "author" => Column::Author,
        "title" => Column::Title,
        "description" => Column::Description,
        "note" => Column::Note,
        _ => Column::SiteName,
    };
    let value = input.value.to_lowercase();
    let pattern = format!("%{}%", escape_like(&value));
    let query = acc.bind(input.key, ParamValue::Text(value));
    let pattern = acc.bind(input.key, ParamValue::Text(pattern));

    Ok(Some(Predicate::group(Predicate::or(
        Predicate::TextMatch {
            index: TextIndex::Field(column),
            query,
        },
        Predicate::ILike { column, pattern },
    ))))
}

fn compile_label(input: &FieldInput<'_>, acc: &mut Accumulator) -> Result<Option<Predicate>, QueryError> {
    let labels: Vec<String> = input
        .value
        .split(',')
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect();
    if labels.is_empty() {
        return Err(input.missing());
    }

    let mut group: Option<Predicate> = None;
    for label in labels {
        let predicate = if label.contains('*') {
            let pattern = acc.bind("label", ParamValue::Text(wildcard_pattern(&label)));
            Predicate::ArrayAnyLike {
                columns: LABEL_SET,
                pattern,
            }
        } else {
            let value = acc.bind("label", ParamValue::Text(label));
            Predicate::ArrayContains {
                columns: LABEL_SET,
                value,
            }
        };
        group = Some(match group {
            None => predicate,
            Some(prev) => Predicate::or(prev, predicate),
        });
    }
    Ok(group.map(Predicate::group))
}

fn compile_includes(
    input: &FieldInput<'_>,
    acc: &mut Accumulator,
) -> Result<Option<Predicate>, QueryError> {
    let ids: Vec<String> = input
        .value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return Err(input.missing());
    }
    let values = acc.bind("includes", ParamValue::TextList(ids));
    Ok(Some(Predicate::InList {
        column: Column::Id,
        values,
    }))
}

fn compile_recommended_by(
    input: &FieldInput<'_>,
    acc: &mut Accumulator,
) -> Result<Option<Predicate>, QueryError> {
    if input.value == "*" {
        return Ok(Some(Predicate::NotEmpty(Column::RecommenderNames)));
    }
    let value = acc.bind("recommended_by", ParamValue::Text(input.value.to_lowercase()));
    Ok(Some(Predicate::ArrayContains {
        columns: RECOMMENDERS,
        value,
    }))
}

fn compile_date(input: &FieldInput<'_>, acc: &mut Accumulator) -> Result<Option<Predicate>, QueryError> {
    let column = match input.key {
        "saved" => Column::SavedAt,
        "read" => Column::ReadAt,
        "updated" => Column::UpdatedAt,
        _ => Column::PublishedAt,
    };
    let options = input.options;
    let range = dates::resolve(input.value, options.now, options.week_start).ok_or_else(|| {
        QueryError::MalformedDate {
            field: input.name.to_string(),
            value: input.value.to_string(),
        }
    })?;

    let start = range.start.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let end = range.end.unwrap_or_else(|| options.now.with_timezone(&Utc));
    let low = acc.bind(&format!("{}_start", input.key), ParamValue::Timestamp(start));
    let high = acc.bind(&format!("{}_end", input.key), ParamValue::Timestamp(end));

    Ok(Some(Predicate::Between {
        column,
        low: Operand::Param(low),
        high: Operand::Param(high),
    }))
}

fn compile_range(input: &FieldInput<'_>, acc: &mut Accumulator) -> Result<Option<Predicate>, QueryError> {
    let (column, prefix) = match input.key {
        "readposition" => (Column::ReadingProgressBottomPercent, "read_position"),
        _ => (Column::WordCount, "words_count"),
    };
    let malformed = || QueryError::MalformedNumericOperand {
        field: input.name.to_string(),
        value: input.value.to_string(),
    };

    let (op, rest) = split_comparison(input.value).ok_or_else(malformed)?;
    let rest = rest.trim();
    if rest.is_empty() {
        return Err(input.missing());
    }
    let number: i64 = rest.parse().map_err(|_| malformed())?;

    let value = acc.bind(prefix, ParamValue::Int(number));
    Ok(Some(Predicate::Compare {
        column,
        op,
        value: Operand::Param(value),
    }))
}

// ── Sorting ─────────────────────────────────────────────────────

fn compile_sort(input: &FieldInput<'_>, acc: &mut Accumulator) -> Result<Option<Predicate>, QueryError> {
    let (key, order) = input.value.split_once('-').unwrap_or((input.value, ""));
    let key = key.trim().to_lowercase();
    if key.is_empty() {
        return Err(input.missing());
    }
    let direction = if order.trim().eq_ignore_ascii_case("asc") {
        SortDirection::Asc
    } else {
        SortDirection::Desc
    };
    let column = sort_column(&key).ok_or_else(|| input.invalid())?;
    acc.push_sort(SortDirective::new(column, direction));
    Ok(None)
}

/// Map a `sort:` key to a column. Unknown keys pass through as long as they
/// are plain identifiers, since they end up in `ORDER BY` text. They arrive
/// lower-cased, which PostgreSQL does to unquoted identifiers anyway.
fn sort_column(key: &str) -> Option<String> {
    let column = match key {
        "saved" | "read" | "updated" | "published" => format!("{key}_at"),
        "wordscount" => Column::WordCount.name().to_string(),
        "readposition" => Column::ReadingProgressBottomPercent.name().to_string(),
        "title" => Column::Title.name().to_string(),
        other
            if other
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') =>
        {
            other.to_string()
        }
        _ => return None,
    };
    Some(column)
}

// ── Helpers ─────────────────────────────────────────────────────

/// Split `>=500` into `(Ge, "500")`.
fn split_comparison(value: &str) -> Option<(CmpOp, &str)> {
    if let Some(rest) = value.strip_prefix("<=") {
        Some((CmpOp::Le, rest))
    } else if let Some(rest) = value.strip_prefix(">=") {
        Some((CmpOp::Ge, rest))
    } else if let Some(rest) = value.strip_prefix('<') {
        Some((CmpOp::Lt, rest))
    } else {
        value.strip_prefix('>').map(|rest| (CmpOp::Gt, rest))
    }
}

/// Escape `LIKE` metacharacters so user text matches literally.
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// `news*` → `news%`, with the rest escaped.
fn wildcard_pattern(label: &str) -> String {
    escape_like(label).replace('*', "%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::ast::QueryNode;
    use crate::search::predicate::{ParamRef, Parameters};

    fn options() -> CompileOptions {
        CompileOptions::new(DateTime::parse_from_rfc3339("2024-03-15T10:30:00+02:00").unwrap())
    }

    fn compile(field: &str, value: &str) -> Result<(Option<Predicate>, Accumulator), QueryError> {
        compile_with(field, value, &options())
    }

    fn compile_with(
        field: &str,
        value: &str,
        options: &CompileOptions,
    ) -> Result<(Option<Predicate>, Accumulator), QueryError> {
        let registry = FieldRegistry::standard();
        let QueryNode::Tag(tag) = QueryNode::tag(field, value) else {
            unreachable!()
        };
        let mut acc = Accumulator::new();
        let predicate = registry.compile_tag(&tag, &mut acc, options)?;
        Ok((predicate, acc))
    }

    fn text(params: &Parameters, p: &ParamRef) -> String {
        match params.get(p.name()) {
            Some(ParamValue::Text(s)) => s.clone(),
            other => panic!("expected text param, got {other:?}"),
        }
    }

    #[test]
    fn test_implicit_text_ranks_and_sorts() {
        let registry = FieldRegistry::standard();
        let mut acc = Accumulator::new();
        let QueryNode::Tag(tag) = QueryNode::text("  coffee  ") else {
            unreachable!()
        };
        let predicate = registry.compile_tag(&tag, &mut acc, &options()).unwrap();

        let Some(Predicate::TextMatch { index, query }) = predicate else {
            panic!("expected a text match");
        };
        assert_eq!(index, TextIndex::Search);
        assert_eq!(text(&acc.parameters, &query), "coffee");
        assert_eq!(acc.extra_columns[0].alias, "rank_0");
        assert_eq!(acc.sort, vec![SortDirective::new("rank_0", SortDirection::Desc)]);
    }

    #[test]
    fn test_blank_operand_contributes_nothing() {
        let (predicate, acc) = compile("label", "   ").unwrap();
        assert_eq!(predicate, None);
        assert!(acc.parameters.is_empty());
    }

    #[test]
    fn test_unknown_field() {
        assert_eq!(
            compile("foo", "bar").unwrap_err(),
            QueryError::UnknownField { field: "foo".into() }
        );
        assert!(matches!(
            compile("foo", "").unwrap_err(),
            QueryError::UnknownField { .. }
        ));
    }

    #[test]
    fn test_in_keywords() {
        assert_eq!(compile("in", "all").unwrap().0, None);
        assert_eq!(
            compile("in", "Archive").unwrap().0,
            Some(Predicate::IsNotNull(Column::ArchivedAt))
        );

        let (predicate, acc) = compile("in", "trash").unwrap();
        assert_eq!(
            predicate,
            Some(Predicate::WithinDays {
                column: Column::DeletedAt,
                days: 14
            })
        );
        assert!(acc.trash);
    }

    #[test]
    fn test_in_folder_only_when_scoped() {
        assert_eq!(
            compile("in", "reading-list").unwrap().0,
            Some(Predicate::IsNull(Column::ArchivedAt))
        );

        let scoped = options().with_folders(true);
        let (predicate, acc) = compile_with("in", "reading-list", &scoped).unwrap();
        let Some(Predicate::And(left, right)) = predicate else {
            panic!("expected a conjunction");
        };
        assert_eq!(*left, Predicate::IsNull(Column::ArchivedAt));
        let Predicate::Equals { column, value } = *right else {
            panic!("expected folder equality");
        };
        assert_eq!(column, Column::Folder);
        assert_eq!(text(&acc.parameters, &value), "reading-list");
    }

    #[test]
    fn test_is_keywords() {
        assert!(matches!(
            compile("is", "read").unwrap().0,
            Some(Predicate::Compare {
                op: CmpOp::Gt,
                value: Operand::Int(98),
                ..
            })
        ));
        assert!(matches!(
            compile("is", "READING").unwrap().0,
            Some(Predicate::Between {
                low: Operand::Int(2),
                high: Operand::Int(98),
                ..
            })
        ));
        assert!(matches!(
            compile("is", "unread").unwrap().0,
            Some(Predicate::Compare {
                op: CmpOp::Lt,
                value: Operand::Int(2),
                ..
            })
        ));
    }

    #[test]
    fn test_enum_fields_reject_unknown_values() {
        for field in ["is", "has", "no"] {
            assert_eq!(
                compile(field, "bogus").unwrap_err(),
                QueryError::InvalidEnumValue {
                    field: field.into(),
                    value: "bogus".into()
                }
            );
        }
    }

    #[test]
    fn test_has_and_no() {
        assert_eq!(
            compile("has", "highlights").unwrap().0,
            Some(Predicate::NotEmpty(Column::HighlightAnnotations))
        );
        assert_eq!(
            compile("has", "subscriptions").unwrap().0,
            Some(Predicate::NotEmpty(Column::Subscription))
        );
        assert_eq!(
            compile("no", "label").unwrap().0,
            Some(Predicate::IsEmpty(Column::LabelNames))
        );
        assert_eq!(
            compile("no", "subscription").unwrap().0,
            Some(Predicate::IsEmpty(Column::Subscription))
        );
    }

    #[test]
    fn test_label_list_is_grouped_or() {
        let (predicate, acc) = compile("label", "A,b*").unwrap();
        let Some(Predicate::Group(inner)) = predicate else {
            panic!("expected a parenthesized group");
        };
        let Predicate::Or(exact, wildcard) = *inner else {
            panic!("expected a disjunction");
        };
        let Predicate::ArrayContains { columns, value } = *exact else {
            panic!("expected exact membership");
        };
        assert_eq!(columns, LABEL_SET);
        assert_eq!(text(&acc.parameters, &value), "a");
        let Predicate::ArrayAnyLike { pattern, .. } = *wildcard else {
            panic!("expected wildcard membership");
        };
        assert_eq!(text(&acc.parameters, &pattern), "b%");
    }

    #[test]
    fn test_label_wildcard_escapes_like_metacharacters() {
        assert_eq!(wildcard_pattern("100%_done*"), "100\\%\\_done%");
        assert_eq!(
            compile("label", " , ").unwrap_err(),
            QueryError::MissingOperand { field: "label".into() }
        );
    }

    #[test]
    fn test_sort_keys() {
        let (predicate, acc) = compile("sort", "saved-ASC").unwrap();
        assert_eq!(predicate, None);
        assert_eq!(acc.sort, vec![SortDirective::new("saved_at", SortDirection::Asc)]);

        let (_, acc) = compile("sort", "wordsCount").unwrap();
        assert_eq!(acc.sort, vec![SortDirective::new("word_count", SortDirection::Desc)]);

        let (_, acc) = compile("sort", "score-up").unwrap();
        assert_eq!(acc.sort, vec![SortDirective::new("score", SortDirection::Desc)]);
        let (_, acc) = compile("sort", "Item_Score-asc").unwrap();
        assert_eq!(acc.sort, vec![SortDirective::new("item_score", SortDirection::Asc)]);

        assert!(matches!(
            compile("sort", "title;drop-asc").unwrap_err(),
            QueryError::InvalidEnumValue { .. }
        ));
        assert!(matches!(
            compile("sort", "-asc").unwrap_err(),
            QueryError::MissingOperand { .. }
        ));
    }

    #[test]
    fn test_saved_yesterday_binds_full_day() {
        let (predicate, acc) = compile("saved", "yesterday").unwrap();
        let Some(Predicate::Between {
            column,
            low: Operand::Param(low),
            high: Operand::Param(high),
        }) = predicate
        else {
            panic!("expected a between");
        };
        assert_eq!(column, Column::SavedAt);
        let (Some(ParamValue::Timestamp(start)), Some(ParamValue::Timestamp(end))) =
            (acc.parameters.get(low.name()), acc.parameters.get(high.name()))
        else {
            panic!("expected timestamps");
        };
        assert_eq!(*end - *start, chrono::Duration::hours(24));
        assert_eq!(end.to_rfc3339(), "2024-03-14T22:00:00+00:00");
    }

    #[test]
    fn test_date_defaults_and_errors() {
        let (_, acc) = compile("published", "*..2024-01-01").unwrap();
        let values: Vec<&ParamValue> = acc.parameters.iter().map(|p| &p.value).collect();
        assert_eq!(values[0], &ParamValue::Timestamp(DateTime::<Utc>::UNIX_EPOCH));

        let (_, acc) = compile("read", "2024-01-01").unwrap();
        let values: Vec<&ParamValue> = acc.parameters.iter().map(|p| &p.value).collect();
        assert_eq!(
            values[1],
            &ParamValue::Timestamp(options().now.with_timezone(&Utc))
        );

        assert_eq!(
            compile("saved", "someday").unwrap_err(),
            QueryError::MalformedDate {
                field: "saved".into(),
                value: "someday".into()
            }
        );
    }

    #[test]
    fn test_match_fields_bind_two_params() {
        let (predicate, acc) = compile("site", "Example.COM").unwrap();
        assert_eq!(acc.parameters.len(), 2);
        let Some(Predicate::Group(inner)) = predicate else {
            panic!("expected a group");
        };
        let Predicate::Or(fts, like) = *inner else {
            panic!("expected a disjunction");
        };
        assert!(matches!(
            *fts,
            Predicate::TextMatch {
                index: TextIndex::Field(Column::SiteName),
                ..
            }
        ));
        let Predicate::ILike { column, pattern } = *like else {
            panic!("expected ilike");
        };
        assert_eq!(column, Column::SiteName);
        assert_eq!(text(&acc.parameters, &pattern), "%example.com%");
    }

    #[test]
    fn test_term_fields() {
        let (predicate, acc) = compile("rss", "The Verge").unwrap();
        let Some(Predicate::EqualsIgnoreCase { column, value }) = predicate else {
            panic!("expected equality");
        };
        assert_eq!(column, Column::Subscription);
        assert_eq!(text(&acc.parameters, &value), "the verge");
        assert_eq!(value.name(), "rss_0");
    }

    #[test]
    fn test_includes_and_recommended_by() {
        let (predicate, acc) = compile("includes", "a, b,,c").unwrap();
        let Some(Predicate::InList { values, .. }) = predicate else {
            panic!("expected an id list");
        };
        assert_eq!(
            acc.parameters.get(values.name()),
            Some(&ParamValue::TextList(vec!["a".into(), "b".into(), "c".into()]))
        );

        assert_eq!(
            compile("recommendedBy", "*").unwrap().0,
            Some(Predicate::NotEmpty(Column::RecommenderNames))
        );
        let (predicate, _) = compile("recommendedby", "Alice").unwrap();
        assert!(matches!(predicate, Some(Predicate::ArrayContains { .. })));
    }

    #[test]
    fn test_numeric_ranges() {
        let (predicate, acc) = compile("wordsCount", ">=500").unwrap();
        let Some(Predicate::Compare {
            column,
            op,
            value: Operand::Param(value),
        }) = predicate
        else {
            panic!("expected a comparison");
        };
        assert_eq!(column, Column::WordCount);
        assert_eq!(op, CmpOp::Ge);
        assert_eq!(acc.parameters.get(value.name()), Some(&ParamValue::Int(500)));

        assert_eq!(
            compile("readPosition", "50").unwrap_err(),
            QueryError::MalformedNumericOperand {
                field: "readPosition".into(),
                value: "50".into()
            }
        );
        assert!(matches!(
            compile("readPosition", "<fifty").unwrap_err(),
            QueryError::MalformedNumericOperand { .. }
        ));
        assert!(matches!(
            compile("wordsCount", ">").unwrap_err(),
            QueryError::MissingOperand { .. }
        ));
    }

    #[test]
    fn test_use_and_mode_are_ignored() {
        assert_eq!(compile("use", "folders").unwrap().0, None);
        assert_eq!(compile("mode", "highlights").unwrap().0, None);
    }

    #[test]
    fn test_registry_vocabulary() {
        let registry = FieldRegistry::standard();
        assert_eq!(registry.field_names().len(), 25);
        assert!(registry.get("WordsCount").is_some());
        assert!(registry.get("content").is_none());
    }
}
