//! Relation scopes built from FROM clauses and statement targets

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use super::Warning;
use crate::parser::{FromItem, RangeVar};

/// Physical relation a column belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub table: String,
}

impl RelationRef {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            schema: None,
            table: table.into(),
        }
    }

    pub fn with_schema(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            table: table.into(),
        }
    }
}

impl From<&RangeVar> for RelationRef {
    fn from(range: &RangeVar) -> Self {
        Self {
            schema: range.schema.clone(),
            table: range.table.clone(),
        }
    }
}

impl fmt::Display for RelationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.table),
            None => f.write_str(&self.table),
        }
    }
}

/// Alias to relation mapping visible while resolving columns
///
/// Unaliased relations are keyed by the empty string. A key that two different
/// sibling relations competed for is withdrawn and remembered as ambiguous, so that
/// an unqualified column cannot silently bind to either of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationScope {
    entries: IndexMap<String, RelationRef>,
    ambiguous: IndexSet<String>,
}

impl RelationScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope of a statement's target relation
    pub fn for_target(range: &RangeVar) -> Self {
        let mut scope = Self::new();
        scope.insert(range.alias.clone().unwrap_or_default(), RelationRef::from(range));
        scope
    }

    /// Add an entry, replacing any relation already under `alias`
    pub fn insert(&mut self, alias: impl Into<String>, relation: RelationRef) {
        let alias = alias.into();
        self.ambiguous.shift_remove(&alias);
        self.entries.insert(alias, relation);
    }

    pub fn get(&self, alias: &str) -> Option<&RelationRef> {
        self.entries.get(alias)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_ambiguous(&self, alias: &str) -> bool {
        self.ambiguous.contains(alias)
    }

    /// The only relation in scope, if there is exactly one
    pub fn single(&self) -> Option<&RelationRef> {
        match self.entries.len() {
            1 => self.entries.values().next(),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RelationRef)> {
        self.entries.iter().map(|(alias, rel)| (alias.as_str(), rel))
    }

    /// Merge the right branch of a join; the right side wins on collisions
    pub fn merge_join(&mut self, right: RelationScope) {
        for (alias, relation) in right.entries {
            self.insert(alias, relation);
        }
        for alias in right.ambiguous {
            self.withdraw(alias);
        }
    }

    /// Merge a sibling FROM item
    pub fn merge_sibling(&mut self, sibling: RelationScope) {
        for (alias, relation) in sibling.entries {
            if self.ambiguous.contains(&alias) {
                continue;
            }
            let collides = alias.is_empty()
                && self
                    .entries
                    .get(&alias)
                    .is_some_and(|existing| *existing != relation);
            if collides {
                self.withdraw(alias);
            } else {
                self.entries.insert(alias, relation);
            }
        }
        for alias in sibling.ambiguous {
            self.withdraw(alias);
        }
    }

    /// Add the aliased entries of `other` that are not already in scope
    ///
    /// Unaliased entries are skipped, so unqualified columns keep resolving to
    /// this scope's relations.
    pub fn merge_qualified(&mut self, other: RelationScope) {
        for (alias, relation) in other.entries {
            if !alias.is_empty() && !self.entries.contains_key(&alias) {
                self.insert(alias, relation);
            }
        }
    }

    /// Scope of a subselect: `child` entries shadow this scope's entries
    pub fn nested(&self, child: RelationScope) -> RelationScope {
        let mut scope = self.clone();
        for (alias, relation) in child.entries {
            scope.insert(alias, relation);
        }
        for alias in child.ambiguous {
            scope.withdraw(alias);
        }
        scope
    }

    fn withdraw(&mut self, alias: String) {
        self.entries.shift_remove(&alias);
        self.ambiguous.insert(alias);
    }
}

/// Build the scope of one FROM item
pub fn resolve_from_item(item: &FromItem) -> (RelationScope, Vec<Warning>) {
    match item {
        FromItem::Relation(range) => (RelationScope::for_target(range), Vec::new()),
        FromItem::Join(left, right) => {
            let (mut scope, mut warnings) = resolve_from_item(left);
            let (right_scope, right_warnings) = resolve_from_item(right);
            scope.merge_join(right_scope);
            warnings.extend(right_warnings);
            (scope, warnings)
        }
        FromItem::Unrecognized(node) => (
            RelationScope::new(),
            vec![Warning::not_supported("from clause", node.clone())],
        ),
    }
}

/// Build the scope of a comma separated FROM list
pub fn resolve_from_list(items: &[FromItem]) -> (RelationScope, Vec<Warning>) {
    items.iter().fold(
        (RelationScope::new(), Vec::new()),
        |(mut scope, mut warnings), item| {
            let (item_scope, item_warnings) = resolve_from_item(item);
            scope.merge_sibling(item_scope);
            warnings.extend(item_warnings);
            (scope, warnings)
        },
    )
}
