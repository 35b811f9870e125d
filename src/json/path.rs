use serde_json::Value;

/// Suffix marking a path segment that fans out over a list
pub const LIST_MARKER: &str = "[]";

/// One segment of a dotted path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Descend into an object key
    Key(String),
    /// Descend into an object key holding a list, then fan out over its elements
    List(String),
}

/// Split a dotted path into segments, recognising the `[]` list-descent marker.
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    path.split('.')
        .map(|segment| match segment.strip_suffix(LIST_MARKER) {
            Some(key) => PathSegment::List(key.to_string()),
            None => PathSegment::Key(segment.to_string()),
        })
        .collect()
}

/// Render a JSON value the way it appears in joined list values.
///
/// Strings are written verbatim; everything else uses its compact JSON form.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve a dotted path against an arbitrarily nested object/list tree.
///
/// - a plain segment descends into an object key;
/// - a `key[]` segment with nothing after it joins every element of the list
///   with single spaces;
/// - a `key[]` segment followed by more segments resolves the remainder against
///   every element and joins the non-null results with single spaces.
///
/// A missing key at any depth, a list marker on a non-list, a key lookup on a
/// non-object, or a terminal `null` all yield `None`.
pub fn resolve_nested(root: &Value, path: &str) -> Option<Value> {
    let segments = parse_path(path);
    resolve_segments(root, &segments)
}

fn resolve_segments(node: &Value, segments: &[PathSegment]) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return (!node.is_null()).then(|| node.clone());
    };

    match head {
        PathSegment::Key(key) => resolve_segments(node.as_object()?.get(key)?, rest),
        PathSegment::List(key) => {
            let items = node.as_object()?.get(key)?.as_array()?;

            if rest.is_empty() {
                let joined: Vec<String> = items.iter().map(stringify).collect();
                return Some(Value::String(joined.join(" ")));
            }

            let joined: Vec<String> = items
                .iter()
                .filter_map(|item| resolve_segments(item, rest))
                .map(|value| stringify(&value))
                .collect();

            if joined.is_empty() {
                None
            } else {
                Some(Value::String(joined.join(" ")))
            }
        }
    }
}

/// Access to the discriminator and fields of a tagged record.
///
/// Tagged records are lists of heterogeneous records where each one is
/// identified by a tag value rather than by its position.
pub trait TagAccessor<R> {
    /// The record's discriminator, if it has one
    fn tag<'r>(&self, record: &'r R) -> Option<&'r str>;

    /// A named field of the record
    fn field<'r>(&self, record: &'r R, name: &str) -> Option<&'r Value>;

    /// Names of the record's fields, excluding the discriminator
    fn field_names<'r>(&self, record: &'r R) -> Vec<&'r str>;
}

/// Tag accessor reading the discriminator from a named field of a JSON object
#[derive(Debug, Clone, Copy)]
pub struct FieldTag<'a> {
    /// Name of the discriminator field
    pub field: &'a str,
}

/// Discriminator used by particle parameter groups and pulse shapes
pub const DESCRIPTION_TAG: FieldTag<'static> = FieldTag {
    field: "description",
};

impl TagAccessor<Value> for FieldTag<'_> {
    fn tag<'r>(&self, record: &'r Value) -> Option<&'r str> {
        record.get(self.field)?.as_str()
    }

    fn field<'r>(&self, record: &'r Value, name: &str) -> Option<&'r Value> {
        record.as_object()?.get(name)
    }

    fn field_names<'r>(&self, record: &'r Value) -> Vec<&'r str> {
        record
            .as_object()
            .map(|object| {
                object
                    .keys()
                    .map(String::as_str)
                    .filter(|key| *key != self.field)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Resolve `"<discriminator>.<field>"` against a list of tagged records.
///
/// The path is split on its first dot, so discriminators may not contain dots
/// but field names may. The first record whose tag matches wins; `None` when no
/// record matches, the field is absent or the field is `null`.
pub fn resolve_tagged<'r, R, A>(records: &'r [R], accessor: &A, path: &str) -> Option<&'r Value>
where
    A: TagAccessor<R>,
{
    let (tag, field) = path.split_once('.')?;
    let record = records.iter().find(|record| accessor.tag(record) == Some(tag))?;
    accessor.field(record, field).filter(|value| !value.is_null())
}

/// List every path `resolve_tagged` can answer for these records.
pub fn discover_tagged_paths<R, A>(records: &[R], accessor: &A) -> Vec<String>
where
    A: TagAccessor<R>,
{
    let mut paths = Vec::new();
    for record in records {
        let Some(tag) = accessor.tag(record) else {
            continue;
        };
        for name in accessor.field_names(record) {
            paths.push(format!("{}.{}", tag, name));
        }
    }
    paths
}

/// List every path reachable in a sample instance of a nested tree.
///
/// Objects contribute their own path and are recursed into; non-empty lists
/// contribute `key[]` and, when their first element is an object, that
/// element's structure (lists are assumed homogeneous). Scalars and empty lists
/// contribute their plain path.
pub fn discover_paths(value: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    collect_paths(value, "", &mut paths);
    paths
}

fn collect_paths(value: &Value, prefix: &str, paths: &mut Vec<String>) {
    let Some(object) = value.as_object() else {
        return;
    };

    for (key, child) in object {
        let current = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match child {
            Value::Object(_) => {
                paths.push(current.clone());
                collect_paths(child, &current, paths);
            }
            Value::Array(items) if !items.is_empty() => {
                let list_path = format!("{}{}", current, LIST_MARKER);
                paths.push(list_path.clone());
                if items[0].is_object() {
                    collect_paths(&items[0], &list_path, paths);
                }
            }
            _ => paths.push(current),
        }
    }
}
