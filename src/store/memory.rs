//! In-memory storage engine.
//!
//! Evaluates compiled predicates directly against [`LibraryItem`] rows with
//! SQL semantics: comparisons involving a null are unknown, unknown rows are
//! filtered out, and `NOT` of unknown stays unknown. A library can be loaded
//! from and saved to a JSON snapshot.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, ShelfError};
use crate::model::item::LibraryItem;
use crate::model::label::{EntityLabel, Label};
use crate::search::predicate::{
    CmpOp, Column, NullsOrder, Operand, ParamRef, ParamValue, Parameters, Predicate, Projection,
    SortDirection, TextIndex,
};

use super::text::{ilike, TextQuery};
use super::{Filter, ItemChanges, ItemRow, ItemStore, SelectQuery};

/// Serialized form of a whole library.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Library {
    #[serde(default)]
    pub items: Vec<LibraryItem>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub entity_labels: Vec<EntityLabel>,
}

/// Thread-safe in-memory engine.
#[derive(Debug, Default)]
pub struct MemoryStore {
    library: RwLock<Library>,
    /// Fixed clock for `WithinDays`; wall clock when unset.
    clock: Option<DateTime<Utc>>,
}

impl MemoryStore {
    pub fn new(library: Library) -> Self {
        Self {
            library: RwLock::new(library),
            clock: None,
        }
    }

    /// Evaluate time-relative predicates against `now` instead of the wall clock.
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Some(now);
        self
    }

    /// Load a JSON snapshot.
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| ShelfError::io(path, e))?;
        let library: Library = serde_json::from_str(&data)?;
        info!(
            path = %path.display(),
            items = library.items.len(),
            labels = library.labels.len(),
            "Loaded library"
        );
        Ok(Self::new(library))
    }

    /// Write a JSON snapshot.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(&*self.read()?)?;
        std::fs::write(path, data).map_err(|e| ShelfError::io(path, e))?;
        debug!(path = %path.display(), "Saved library");
        Ok(())
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Result<Library> {
        Ok(self.read()?.clone())
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Library>> {
        self.library
            .read()
            .map_err(|_| ShelfError::Store("library lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Library>> {
        self.library
            .write()
            .map_err(|_| ShelfError::Store("library lock poisoned".into()))
    }

    fn matching<'a>(
        &self,
        items: &'a [LibraryItem],
        filter: &Filter,
    ) -> Result<Vec<&'a LibraryItem>> {
        let eval = Evaluator {
            params: &filter.parameters,
            now: self.now(),
        };
        let mut out = Vec::new();
        for item in items {
            if eval.accepts(filter.predicate.as_ref(), item)? {
                out.push(item);
            }
        }
        Ok(out)
    }
}

impl ItemStore for MemoryStore {
    fn select(&self, query: &SelectQuery) -> Result<Vec<ItemRow>> {
        let library = self.read()?;
        let matched = self.matching(&library.items, &query.filter)?;

        let mut rows = Vec::with_capacity(matched.len());
        for item in matched {
            let mut scores = BTreeMap::new();
            for column in &query.extra_columns {
                let Projection::Rank { index, query: q } = &column.expr;
                let text = text_param(&query.filter.parameters, q)?;
                let rank = document(item, *index)
                    .map(|doc| TextQuery::parse(text).rank(&doc))
                    .unwrap_or(0.0);
                scores.insert(column.alias.clone(), rank);
            }
            rows.push(ItemRow {
                item: item.clone(),
                scores,
            });
        }

        for directive in &query.sort {
            if Column::from_name(&directive.by).is_none()
                && !query.extra_columns.iter().any(|c| c.alias == directive.by)
            {
                return Err(ShelfError::Store(format!(
                    "column \"{}\" does not exist",
                    directive.by
                )));
            }
        }

        rows.sort_by(|a, b| {
            for directive in &query.sort {
                let (x, y) = (sort_key(a, &directive.by), sort_key(b, &directive.by));
                let ordering = match (x.is_null(), y.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) | (false, true) => {
                        let nulls_first = directive.nulls == NullsOrder::First;
                        if x.is_null() == nulls_first {
                            Ordering::Less
                        } else {
                            Ordering::Greater
                        }
                    }
                    (false, false) => {
                        let ord = x.compare(&y).unwrap_or(Ordering::Equal);
                        match directive.direction {
                            SortDirection::Asc => ord,
                            SortDirection::Desc => ord.reverse(),
                        }
                    }
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        Ok(rows
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    fn count(&self, filter: &Filter) -> Result<usize> {
        let library = self.read()?;
        Ok(self.matching(&library.items, filter)?.len())
    }

    fn update(&self, filter: &Filter, changes: &ItemChanges) -> Result<usize> {
        let mut library = self.write()?;
        let ids: HashSet<String> = self
            .matching(&library.items, filter)?
            .into_iter()
            .map(|item| item.id.clone())
            .collect();
        if changes.is_empty() {
            return Ok(ids.len());
        }

        for item in library.items.iter_mut().filter(|i| ids.contains(&i.id)) {
            if let Some(state) = changes.state {
                item.state = state;
            }
            if let Some(folder) = &changes.folder {
                item.folder = folder.clone();
            }
            if changes.archived_at.is_some() {
                item.archived_at = changes.archived_at;
            }
            if changes.deleted_at.is_some() {
                item.deleted_at = changes.deleted_at;
            }
            if changes.read_at.is_some() {
                item.read_at = changes.read_at;
            }
            if let Some(progress) = changes.reading_progress {
                item.reading_progress_top_percent = progress;
                item.reading_progress_bottom_percent = progress;
            }
            if changes.updated_at.is_some() {
                item.updated_at = changes.updated_at;
            }
        }
        Ok(ids.len())
    }

    fn select_ids(&self, filter: &Filter) -> Result<Vec<String>> {
        let library = self.read()?;
        Ok(self
            .matching(&library.items, filter)?
            .into_iter()
            .map(|item| item.id.clone())
            .collect())
    }

    fn find_labels(&self, user_id: &str, ids: &[String]) -> Result<Vec<Label>> {
        let library = self.read()?;
        Ok(library
            .labels
            .iter()
            .filter(|l| l.user_id == user_id && ids.contains(&l.id))
            .cloned()
            .collect())
    }

    fn entity_labels(&self, item_ids: &[String]) -> Result<Vec<EntityLabel>> {
        let library = self.read()?;
        let wanted: HashSet<&str> = item_ids.iter().map(String::as_str).collect();
        Ok(library
            .entity_labels
            .iter()
            .filter(|link| wanted.contains(link.library_item_id.as_str()))
            .cloned()
            .collect())
    }

    fn insert_labels(&self, links: &[EntityLabel]) -> Result<usize> {
        let mut library = self.write()?;
        let library = &mut *library;
        let mut inserted = 0;

        for link in links {
            if library.entity_labels.contains(link) {
                continue;
            }
            library.entity_labels.push(link.clone());
            inserted += 1;

            // Keep the denormalized name list in step with the links.
            let name = library
                .labels
                .iter()
                .find(|l| l.id == link.label_id)
                .map(|l| l.name.clone());
            let item = library
                .items
                .iter_mut()
                .find(|i| i.id == link.library_item_id);
            if let (Some(name), Some(item)) = (name, item) {
                if !item.label_names.contains(&name) {
                    item.label_names.push(name);
                }
            }
        }
        Ok(inserted)
    }
}

// ── Predicate evaluation ────────────────────────────────────────

/// A column or parameter value.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Null,
    Text(String),
    Number(f64),
    Time(DateTime<Utc>),
    List(Vec<String>),
}

impl Value {
    fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    fn text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

struct Evaluator<'a> {
    params: &'a Parameters,
    now: DateTime<Utc>,
}

impl Evaluator<'_> {
    fn accepts(&self, predicate: Option<&Predicate>, item: &LibraryItem) -> Result<bool> {
        match predicate {
            None => Ok(true),
            Some(p) => Ok(self.eval(p, item)? == Some(true)),
        }
    }

    /// Three-valued evaluation; `None` is SQL's unknown.
    fn eval(&self, p: &Predicate, item: &LibraryItem) -> Result<Option<bool>> {
        let truth = match p {
            Predicate::And(l, r) => match (self.eval(l, item)?, self.eval(r, item)?) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Predicate::Or(l, r) => match (self.eval(l, item)?, self.eval(r, item)?) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            Predicate::Not(inner) => self.eval(inner, item)?.map(|b| !b),
            Predicate::Group(inner) => self.eval(inner, item)?,
            Predicate::TextMatch { index, query } => {
                let text = text_param(self.params, query)?;
                document(item, *index).map(|doc| TextQuery::parse(text).matches(&doc))
            }
            Predicate::ILike { column, pattern } => {
                let pattern = text_param(self.params, pattern)?;
                column_value(item, *column).text().map(|v| ilike(v, pattern))
            }
            Predicate::EqualsIgnoreCase { column, value } => {
                let value = text_param(self.params, value)?;
                column_value(item, *column)
                    .text()
                    .map(|v| v.to_lowercase() == value.to_lowercase())
            }
            Predicate::Equals { column, value } => {
                let value = text_param(self.params, value)?;
                column_value(item, *column).text().map(|v| v == value)
            }
            Predicate::NotEquals { column, value } => {
                let value = text_param(self.params, value)?;
                column_value(item, *column).text().map(|v| v != value)
            }
            Predicate::Compare { column, op, value } => {
                let left = column_value(item, *column);
                let right = self.operand(value)?;
                left.compare(&right).map(|ord| match op {
                    CmpOp::Lt => ord == Ordering::Less,
                    CmpOp::Le => ord != Ordering::Greater,
                    CmpOp::Gt => ord == Ordering::Greater,
                    CmpOp::Ge => ord != Ordering::Less,
                })
            }
            Predicate::Between { column, low, high } => {
                let value = column_value(item, *column);
                let low = value.compare(&self.operand(low)?);
                let high = value.compare(&self.operand(high)?);
                match (low, high) {
                    (Some(l), Some(h)) => Some(l != Ordering::Less && h != Ordering::Greater),
                    _ => None,
                }
            }
            Predicate::ArrayContains { columns, value } => {
                let value = text_param(self.params, value)?.to_lowercase();
                Some(array_union(item, columns).any(|e| e.to_lowercase() == value))
            }
            Predicate::ArrayAnyLike { columns, pattern } => {
                let pattern = text_param(self.params, pattern)?;
                Some(array_union(item, columns).any(|e| ilike(e, pattern)))
            }
            Predicate::InList { column, values } => {
                let values = match self.param(values)? {
                    ParamValue::TextList(values) => values,
                    _ => return Err(type_mismatch(values)),
                };
                column_value(item, *column)
                    .text()
                    .map(|v| values.iter().any(|x| x == v))
            }
            Predicate::IsNull(column) => Some(column_value(item, *column).is_null()),
            Predicate::IsNotNull(column) => Some(!column_value(item, *column).is_null()),
            Predicate::NotEmpty(column) => match column_value(item, *column) {
                Value::List(list) => Some(!list.is_empty()),
                Value::Text(s) => Some(!s.is_empty()),
                Value::Null => None,
                _ => Some(true),
            },
            Predicate::IsEmpty(column) => Some(match column_value(item, *column) {
                Value::Null => true,
                Value::List(list) => list.is_empty(),
                Value::Text(s) => s.is_empty(),
                _ => false,
            }),
            // A missing timestamp is outside the window, not unknown.
            Predicate::WithinDays { column, days } => {
                let cutoff = Value::Time(self.now - Duration::days(*days));
                Some(
                    column_value(item, *column)
                        .compare(&cutoff)
                        .is_some_and(|ord| ord != Ordering::Less),
                )
            }
        };
        Ok(truth)
    }

    fn param(&self, p: &ParamRef) -> Result<&ParamValue> {
        self.params
            .get(p.name())
            .ok_or_else(|| ShelfError::Store(format!("unbound parameter :{p}")))
    }

    fn operand(&self, operand: &Operand) -> Result<Value> {
        Ok(match operand {
            Operand::Int(n) => Value::Number(*n as f64),
            Operand::Param(p) => match self.param(p)? {
                ParamValue::Int(n) => Value::Number(*n as f64),
                ParamValue::Timestamp(t) => Value::Time(*t),
                ParamValue::Text(s) => Value::Text(s.clone()),
                ParamValue::TextList(_) => return Err(type_mismatch(p)),
            },
        })
    }
}

fn text_param<'a>(params: &'a Parameters, p: &ParamRef) -> Result<&'a str> {
    match params.get(p.name()) {
        Some(ParamValue::Text(s)) => Ok(s),
        Some(_) => Err(type_mismatch(p)),
        None => Err(ShelfError::Store(format!("unbound parameter :{p}"))),
    }
}

fn type_mismatch(p: &ParamRef) -> ShelfError {
    ShelfError::Store(format!("parameter :{p} has the wrong type"))
}

fn array_union<'a>(
    item: &'a LibraryItem,
    columns: &'a [Column],
) -> impl Iterator<Item = &'a String> + 'a {
    columns.iter().flat_map(move |c| array_column(item, *c).iter())
}

fn array_column(item: &LibraryItem, column: Column) -> &[String] {
    match column {
        Column::LabelNames => &item.label_names,
        Column::HighlightLabels => &item.highlight_labels,
        Column::HighlightAnnotations => &item.highlight_annotations,
        Column::RecommenderNames => &item.recommender_names,
        _ => &[],
    }
}

/// Text behind a full-text index, or `None` when the column is null.
fn document(item: &LibraryItem, index: TextIndex) -> Option<String> {
    match index {
        TextIndex::Search => Some(format!("{} {}", item.title, item.content)),
        TextIndex::Field(column) => column_value(item, column).text().map(str::to_string),
    }
}

fn column_value(item: &LibraryItem, column: Column) -> Value {
    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }
    fn opt_text(s: &Option<String>) -> Value {
        s.as_deref().map_or(Value::Null, text)
    }
    fn opt_time(t: Option<DateTime<Utc>>) -> Value {
        t.map_or(Value::Null, Value::Time)
    }

    match column {
        Column::Id => text(&item.id),
        Column::UserId => text(&item.user_id),
        Column::State => text(item.state.as_str()),
        Column::Folder => text(&item.folder),
        Column::ItemType => text(&item.item_type),
        Column::Title => text(&item.title),
        Column::Author => opt_text(&item.author),
        Column::Description => opt_text(&item.description),
        Column::Note => opt_text(&item.note),
        Column::SiteName => opt_text(&item.site_name),
        Column::Subscription => opt_text(&item.subscription),
        Column::ItemLanguage => opt_text(&item.item_language),
        Column::LabelNames
        | Column::HighlightLabels
        | Column::HighlightAnnotations
        | Column::RecommenderNames => Value::List(array_column(item, column).to_vec()),
        Column::WordCount => item.word_count.map_or(Value::Null, |n| Value::Number(n as f64)),
        Column::ReadingProgressTopPercent => Value::Number(item.reading_progress_top_percent),
        Column::ReadingProgressBottomPercent => {
            Value::Number(item.reading_progress_bottom_percent)
        }
        Column::SavedAt => Value::Time(item.saved_at),
        Column::UpdatedAt => opt_time(item.updated_at),
        Column::PublishedAt => opt_time(item.published_at),
        Column::ReadAt => opt_time(item.read_at),
        Column::ArchivedAt => opt_time(item.archived_at),
        Column::DeletedAt => opt_time(item.deleted_at),
    }
}

fn sort_key(row: &ItemRow, by: &str) -> Value {
    match Column::from_name(by) {
        Some(column) => column_value(&row.item, column),
        None => row
            .scores
            .get(by)
            .map_or(Value::Null, |score| Value::Number(*score)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::ItemState;
    use crate::search::predicate::{SortDirective, LABEL_SET};

    fn t(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn store() -> MemoryStore {
        let mut a = LibraryItem::new("a", "u1", "Alpha", t("2024-01-01T00:00:00Z"));
        a.word_count = Some(500);
        a.author = Some("Ann".into());
        let mut b = LibraryItem::new("b", "u1", "Beta", t("2024-01-02T00:00:00Z"));
        b.word_count = None;
        b.deleted_at = Some(t("2024-03-01T00:00:00Z"));
        b.state = ItemState::Deleted;
        let mut c = LibraryItem::new("c", "u2", "Gamma", t("2024-01-03T00:00:00Z"));
        c.word_count = Some(50);
        MemoryStore::new(Library {
            items: vec![a, b, c],
            labels: vec![Label {
                id: "l1".into(),
                user_id: "u1".into(),
                name: "Favorites".into(),
            }],
            entity_labels: Vec::new(),
        })
        .with_clock(t("2024-03-10T00:00:00Z"))
    }

    fn ids(rows: &[ItemRow]) -> Vec<&str> {
        rows.iter().map(|r| r.item.id.as_str()).collect()
    }

    fn select_all(store: &MemoryStore, filter: Filter, sort: Vec<SortDirective>) -> Vec<ItemRow> {
        store
            .select(&SelectQuery {
                filter,
                extra_columns: Vec::new(),
                sort,
                offset: 0,
                limit: 100,
            })
            .unwrap()
    }

    #[test]
    fn test_null_comparisons_are_unknown() {
        let store = store();
        let mut parameters = Parameters::new();
        let n = parameters.bind("words_count", ParamValue::Int(100));
        let cmp = Predicate::Compare {
            column: Column::WordCount,
            op: CmpOp::Gt,
            value: Operand::Param(n),
        };
        let filter = Filter {
            predicate: Some(Predicate::negate(cmp)),
            parameters,
        };
        // `b` has no word count: NOT(unknown) is still unknown.
        assert_eq!(store.count(&filter).unwrap(), 1);
        assert_eq!(ids(&select_all(&store, filter, Vec::new())), vec!["c"]);
    }

    #[test]
    fn test_within_days_uses_clock() {
        let store = store();
        let filter = Filter {
            predicate: Some(Predicate::WithinDays {
                column: Column::DeletedAt,
                days: 14,
            }),
            parameters: Parameters::new(),
        };
        assert_eq!(store.select_ids(&filter).unwrap(), vec!["b".to_string()]);

        // Rows never deleted are outside the window, so the negation keeps them.
        let outside = Filter {
            predicate: filter.predicate.clone().map(Predicate::negate),
            parameters: Parameters::new(),
        };
        let mut kept = store.select_ids(&outside).unwrap();
        kept.sort();
        assert_eq!(kept, vec!["a".to_string(), "c".to_string()]);

        let later = store.with_clock(t("2024-03-20T00:00:00Z"));
        assert_eq!(later.count(&filter).unwrap(), 0);
        assert_eq!(later.count(&outside).unwrap(), 3);
    }

    #[test]
    fn test_empty_subscription_is_not_a_subscription() {
        let store = store();
        {
            let mut library = store.library.write().unwrap();
            library.items[0].subscription = Some(String::new());
            library.items[1].subscription = Some("Weekly".into());
        }
        let count = |predicate: Predicate| {
            store
                .count(&Filter {
                    predicate: Some(predicate),
                    parameters: Parameters::new(),
                })
                .unwrap()
        };
        assert_eq!(count(Predicate::NotEmpty(Column::Subscription)), 1);
        assert_eq!(count(Predicate::IsEmpty(Column::Subscription)), 2);
    }

    #[test]
    fn test_sort_nulls_last_and_direction() {
        let store = store();
        let rows = select_all(
            &store,
            Filter::default(),
            vec![SortDirective::new("word_count", SortDirection::Asc)],
        );
        assert_eq!(ids(&rows), vec!["c", "a", "b"]);

        let rows = select_all(
            &store,
            Filter::default(),
            vec![SortDirective::new("saved_at", SortDirection::Desc)],
        );
        assert_eq!(ids(&rows), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_unknown_sort_column_is_a_store_error() {
        let store = store();
        let err = store
            .select(&SelectQuery {
                filter: Filter::default(),
                extra_columns: Vec::new(),
                sort: vec![SortDirective::new("score", SortDirection::Desc)],
                offset: 0,
                limit: 10,
            })
            .unwrap_err();
        assert!(matches!(err, ShelfError::Store(_)));
    }

    #[test]
    fn test_update_and_insert_labels() {
        let store = store();
        let mut parameters = Parameters::new();
        let owner = parameters.bind("user_id", ParamValue::Text("u1".into()));
        let filter = Filter {
            predicate: Some(Predicate::Equals {
                column: Column::UserId,
                value: owner,
            }),
            parameters,
        };
        let changed = store
            .update(
                &filter,
                &ItemChanges {
                    folder: Some("later".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(changed, 2);

        let link = EntityLabel {
            label_id: "l1".into(),
            library_item_id: "a".into(),
        };
        assert_eq!(store.insert_labels(&[link.clone(), link.clone()]).unwrap(), 1);
        assert_eq!(store.insert_labels(&[link]).unwrap(), 0);

        let library = store.snapshot().unwrap();
        assert_eq!(library.items[0].folder, "later");
        assert_eq!(library.items[0].label_names, vec!["Favorites".to_string()]);
        assert_eq!(library.items[2].folder, "inbox");
    }

    #[test]
    fn test_label_set_wildcards() {
        let store = store();
        store
            .insert_labels(&[EntityLabel {
                label_id: "l1".into(),
                library_item_id: "a".into(),
            }])
            .unwrap();
        let mut parameters = Parameters::new();
        let pattern = parameters.bind("label", ParamValue::Text("fav%".into()));
        let filter = Filter {
            predicate: Some(Predicate::ArrayAnyLike {
                columns: LABEL_SET,
                pattern,
            }),
            parameters,
        };
        assert_eq!(store.select_ids(&filter).unwrap(), vec!["a".to_string()]);
    }
}
