//! Relationship declarations and their resolved form.

use crate::inflector::Inflector;

/// The shape of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// The foreign key lives on this table
    BelongsTo,
    /// The foreign key lives on the target table; at most one target row
    HasOne,
    /// The foreign key lives on the target table or on a pivot table
    HasMany,
}

impl RelationKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RelationKind::BelongsTo => "belongs_to",
            RelationKind::HasOne => "has_one",
            RelationKind::HasMany => "has_many",
        }
    }

    /// Whether traversing the relation yields at most one record.
    pub const fn is_one_to_one(&self) -> bool {
        matches!(self, RelationKind::BelongsTo | RelationKind::HasOne)
    }
}

/// The explicitly declared parts of a relationship.
///
/// Anything left unset is filled in by [`resolve_defaults`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationOptions {
    pub model: Option<String>,
    pub foreign_key: Option<String>,
    pub through: Option<String>,
    pub far_key: Option<String>,
}

impl RelationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target model name.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = Some(column.into());
        self
    }

    /// Pivot table of a many-to-many relationship.
    pub fn through(mut self, table: impl Into<String>) -> Self {
        self.through = Some(table.into());
        self
    }

    /// Pivot column referencing the target's primary key.
    pub fn far_key(mut self, column: impl Into<String>) -> Self {
        self.far_key = Some(column.into());
        self
    }
}

/// A fully resolved relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    BelongsTo {
        model: String,
        foreign_key: String,
    },
    HasOne {
        model: String,
        foreign_key: String,
    },
    HasMany {
        model: String,
        foreign_key: String,
        through: Option<String>,
        far_key: String,
    },
}

impl Relation {
    pub fn kind(&self) -> RelationKind {
        match self {
            Relation::BelongsTo { .. } => RelationKind::BelongsTo,
            Relation::HasOne { .. } => RelationKind::HasOne,
            Relation::HasMany { .. } => RelationKind::HasMany,
        }
    }

    /// Target model name.
    pub fn model(&self) -> &str {
        match self {
            Relation::BelongsTo { model, .. }
            | Relation::HasOne { model, .. }
            | Relation::HasMany { model, .. } => model,
        }
    }

    pub fn foreign_key(&self) -> &str {
        match self {
            Relation::BelongsTo { foreign_key, .. }
            | Relation::HasOne { foreign_key, .. }
            | Relation::HasMany { foreign_key, .. } => foreign_key,
        }
    }

    /// Pivot table and far key, for a has-many through a pivot.
    pub fn pivot(&self) -> Option<(&str, &str)> {
        match self {
            Relation::HasMany {
                through: Some(through),
                far_key,
                ..
            } => Some((through, far_key)),
            _ => None,
        }
    }
}

/// Fill in the defaults of one relationship declaration.
///
/// Each declaration is resolved on its own: nothing carries over from a
/// previously resolved alias.
///
/// | kind | model | foreign key | far key |
/// |------|-------|-------------|---------|
/// | belongs_to | `alias` | `alias + suffix` | |
/// | has_one | `alias` | `object_name + suffix` | |
/// | has_many | `singular(alias)` | `object_name + suffix` | `singular(alias) + suffix` |
pub fn resolve_defaults(
    kind: RelationKind,
    alias: &str,
    declared: &RelationOptions,
    object_name: &str,
    foreign_key_suffix: &str,
    inflector: &Inflector,
) -> Relation {
    let own_key = || format!("{object_name}{foreign_key_suffix}");
    match kind {
        RelationKind::BelongsTo => Relation::BelongsTo {
            model: declared
                .model
                .clone()
                .unwrap_or_else(|| alias.to_string())
                .to_lowercase(),
            foreign_key: declared
                .foreign_key
                .clone()
                .unwrap_or_else(|| format!("{alias}{foreign_key_suffix}")),
        },
        RelationKind::HasOne => Relation::HasOne {
            model: declared
                .model
                .clone()
                .unwrap_or_else(|| alias.to_string())
                .to_lowercase(),
            foreign_key: declared.foreign_key.clone().unwrap_or_else(own_key),
        },
        RelationKind::HasMany => {
            let singular = inflector.singular(alias);
            Relation::HasMany {
                model: declared
                    .model
                    .clone()
                    .unwrap_or_else(|| singular.clone())
                    .to_lowercase(),
                foreign_key: declared.foreign_key.clone().unwrap_or_else(own_key),
                through: declared.through.clone(),
                far_key: declared
                    .far_key
                    .clone()
                    .unwrap_or_else(|| format!("{singular}{foreign_key_suffix}")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(kind: RelationKind, alias: &str, declared: &RelationOptions) -> Relation {
        resolve_defaults(kind, alias, declared, "user", "_id", &Inflector::new())
    }

    #[test]
    fn belongs_to_defaults() {
        assert_eq!(
            resolve(RelationKind::BelongsTo, "author", &RelationOptions::new()),
            Relation::BelongsTo {
                model: "author".into(),
                foreign_key: "author_id".into(),
            }
        );
    }

    #[test]
    fn has_one_defaults_to_own_key() {
        let relation = resolve(
            RelationKind::HasOne,
            "profile",
            &RelationOptions::new().model("Profile"),
        );
        assert_eq!(relation.model(), "profile");
        assert_eq!(relation.foreign_key(), "user_id");
    }

    #[test]
    fn has_many_through_defaults() {
        let relation = resolve(
            RelationKind::HasMany,
            "roles",
            &RelationOptions::new().through("roles_users"),
        );
        assert_eq!(
            relation,
            Relation::HasMany {
                model: "role".into(),
                foreign_key: "user_id".into(),
                through: Some("roles_users".into()),
                far_key: "role_id".into(),
            }
        );
        assert_eq!(relation.pivot(), Some(("roles_users", "role_id")));
    }

    #[test]
    fn declarations_do_not_leak_defaults() {
        // A belongs_to with an explicit model followed by relations that omit it
        let declarations = [
            (
                RelationKind::BelongsTo,
                "owner",
                RelationOptions::new().model("account").foreign_key("owner_ref"),
            ),
            (RelationKind::HasOne, "profile", RelationOptions::new()),
            (RelationKind::HasMany, "tokens", RelationOptions::new()),
        ];
        let resolved: Vec<Relation> = declarations
            .iter()
            .map(|(kind, alias, declared)| resolve(*kind, alias, declared))
            .collect();

        assert_eq!(resolved[0].model(), "account");
        assert_eq!(resolved[0].foreign_key(), "owner_ref");
        assert_eq!(resolved[1].model(), "profile");
        assert_eq!(resolved[1].foreign_key(), "user_id");
        assert_eq!(resolved[2].model(), "token");
        assert_eq!(resolved[2].foreign_key(), "user_id");
        assert_eq!(resolved[2].pivot(), None);
    }
}
