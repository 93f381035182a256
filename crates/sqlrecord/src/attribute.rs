//! Classification of attribute names.

use crate::columns::TableColumns;
use crate::model::ModelMeta;
use crate::relation::RelationKind;
use std::collections::HashMap;
use std::sync::Arc;

/// What an attribute name refers to on a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    /// A table column
    Column,
    /// A column stored verbatim, without coercion or dirty tracking
    Ignored,
    /// A relationship alias
    Relation(RelationKind),
}

/// The columns of a model together with its attribute map.
///
/// Built once per model and column set, then shared by every record.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Arc<TableColumns>,
    attributes: HashMap<String, Attribute>,
}

impl Schema {
    /// Classify every name of `meta` against `columns`.
    ///
    /// A column shadows a relation alias of the same name, and an ignored
    /// column shadows both.
    pub fn new(meta: &ModelMeta, columns: Arc<TableColumns>) -> Self {
        let mut attributes: HashMap<String, Attribute> = meta
            .relations()
            .iter()
            .map(|(alias, relation)| (alias.clone(), Attribute::Relation(relation.kind())))
            .collect();
        for column in columns.names() {
            attributes.insert(column.to_string(), Attribute::Column);
        }
        for column in meta.ignored_columns() {
            attributes.insert(column.clone(), Attribute::Ignored);
        }
        Self {
            columns,
            attributes,
        }
    }

    pub fn resolve(&self, name: &str) -> Option<Attribute> {
        self.attributes.get(name).copied()
    }

    pub fn columns(&self) -> &Arc<TableColumns> {
        &self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inflector::Inflector;
    use crate::model::ModelDef;
    use crate::relation::RelationOptions;
    use sqlrecord_core::ColumnMeta;

    #[test]
    fn columns_shadow_relations() {
        let meta = ModelDef::new("post")
            .belongs_to("author", RelationOptions::new().model("user"))
            .belongs_to("status", RelationOptions::new())
            .ignored_columns(["password_confirm"])
            .resolve(&Inflector::new());
        let columns = Arc::new(TableColumns::new(vec![
            ColumnMeta::new("id", "INTEGER", false),
            ColumnMeta::new("status", "VARCHAR(16)", false),
            ColumnMeta::new("author_id", "INTEGER", true),
        ]));
        let schema = Schema::new(&meta, columns);

        assert_eq!(schema.resolve("status"), Some(Attribute::Column));
        assert_eq!(
            schema.resolve("author"),
            Some(Attribute::Relation(RelationKind::BelongsTo))
        );
        assert_eq!(schema.resolve("password_confirm"), Some(Attribute::Ignored));
        assert_eq!(schema.resolve("nonexistent"), None);
    }
}
