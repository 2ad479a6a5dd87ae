use std::fmt::Display;

use crate::error::{DbError, Result};
use crate::tuple::field::Type;

/// One column of a tuple descriptor: a type and an optional name.
/// Anonymous columns never match a name lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct TdItem {
    pub field_type: Type,
    pub name: Option<String>,
}

impl TdItem {
    pub fn new(field_type: Type, name: Option<String>) -> Self {
        Self { field_type, name }
    }

    pub fn named(field_type: Type, name: &str) -> Self {
        Self::new(field_type, Some(name.to_owned()))
    }

    pub fn anonymous(field_type: Type) -> Self {
        Self::new(field_type, None)
    }
}

/// The schema of a tuple: an ordered sequence of typed, optionally named
/// columns. Immutable after construction.
#[derive(Clone, Debug, PartialEq)]
pub struct TupleDesc {
    items: Vec<TdItem>,
}

impl TupleDesc {
    /// A descriptor needs at least one column.
    pub fn new(items: Vec<TdItem>) -> Self {
        assert!(
            !items.is_empty(),
            "a tuple descriptor needs at least one column"
        );
        Self { items }
    }

    /// Convenience constructor for a descriptor of anonymous columns.
    pub fn from_types(types: &[Type]) -> Self {
        Self::new(types.iter().map(|t| TdItem::anonymous(*t)).collect())
    }

    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[TdItem] {
        &self.items
    }

    pub fn field_type(&self, i: usize) -> Result<Type> {
        self.item(i).map(|item| item.field_type)
    }

    pub fn field_name(&self, i: usize) -> Result<Option<&str>> {
        self.item(i).map(|item| item.name.as_deref())
    }

    fn item(&self, i: usize) -> Result<&TdItem> {
        self.items
            .get(i)
            .ok_or_else(|| DbError::NotFound(format!("no column with index {}", i)))
    }

    /// The first column whose name equals `name`. Anonymous columns are
    /// skipped.
    pub fn field_name_to_index(&self, name: &str) -> Result<usize> {
        self.items
            .iter()
            .position(|item| item.name.as_deref() == Some(name))
            .ok_or_else(|| DbError::NotFound(format!("no column named {}", name)))
    }

    /// Serialized width in bytes of a tuple with this schema.
    pub fn byte_size(&self) -> usize {
        self.items.iter().map(|item| item.field_type.len()).sum()
    }

    /// Concatenates two descriptors, columns of `left` first.
    pub fn merge(left: &TupleDesc, right: &TupleDesc) -> TupleDesc {
        let mut items = Vec::with_capacity(left.num_fields() + right.num_fields());
        items.extend(left.items.iter().cloned());
        items.extend(right.items.iter().cloned());
        TupleDesc::new(items)
    }
}

impl Display for TupleDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let columns = self
            .items
            .iter()
            .map(|item| match &item.name {
                Some(name) => format!("{}({})", item.field_type, name),
                None => item.field_type.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}", columns)
    }
}

#[cfg(test)]
mod tests {
    use super::{TdItem, TupleDesc};
    use crate::common::STRING_MAX_SIZE;
    use crate::error::DbError;
    use crate::tuple::field::Type;

    #[test]
    fn byte_size_is_the_sum_of_column_widths() {
        let desc = TupleDesc::new(vec![
            TdItem::named(Type::Int, "id"),
            TdItem::named(Type::Str, "name"),
            TdItem::anonymous(Type::Int),
        ]);
        assert_eq!(desc.byte_size(), 4 + (4 + STRING_MAX_SIZE) + 4);
        assert_eq!(desc.num_fields(), 3);
    }

    #[test]
    fn name_lookup_returns_the_first_match_and_skips_anonymous_columns() {
        let desc = TupleDesc::new(vec![
            TdItem::anonymous(Type::Int),
            TdItem::named(Type::Int, "a"),
            TdItem::named(Type::Int, "a"),
        ]);
        assert_eq!(desc.field_name_to_index("a").unwrap(), 1);
        assert!(matches!(
            desc.field_name_to_index("missing"),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn merge_concatenates_columns_in_order() {
        let left = TupleDesc::new(vec![
            TdItem::named(Type::Int, "a"),
            TdItem::named(Type::Str, "b"),
        ]);
        let right = TupleDesc::new(vec![TdItem::named(Type::Int, "c")]);

        let merged = TupleDesc::merge(&left, &right);
        assert_eq!(
            merged.num_fields(),
            left.num_fields() + right.num_fields()
        );
        assert_eq!(merged.items()[..2], left.items()[..]);
        assert_eq!(merged.items()[2..], right.items()[..]);
        assert_eq!(merged.byte_size(), left.byte_size() + right.byte_size());
    }

    #[test]
    fn equality_is_structural() {
        let a = TupleDesc::from_types(&[Type::Int, Type::Str]);
        let b = TupleDesc::from_types(&[Type::Int, Type::Str]);
        let c = TupleDesc::from_types(&[Type::Str, Type::Int]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
