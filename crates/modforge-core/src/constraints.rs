use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Referential action applied by a foreign key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum ReferentialAction {
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "RESTRICT")]
    Restrict,
    #[serde(rename = "NO ACTION")]
    NoAction,
}

impl ReferentialAction {
    pub fn as_sql(self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Cardinality of a relation as seen from the declaring entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationKind {
    /// Kind of the mirrored property on the target entity.
    pub fn inverse(self) -> RelationKind {
        match self {
            RelationKind::OneToOne => RelationKind::OneToOne,
            RelationKind::OneToMany => RelationKind::ManyToOne,
            RelationKind::ManyToOne => RelationKind::OneToMany,
            RelationKind::ManyToMany => RelationKind::ManyToMany,
        }
    }

    /// To-one kinds own a join column on the declaring side.
    pub fn owns_join_column(self) -> bool {
        matches!(self, RelationKind::OneToOne | RelationKind::ManyToOne)
    }

    pub fn is_collection(self) -> bool {
        matches!(self, RelationKind::OneToMany | RelationKind::ManyToMany)
    }

    /// One-to-many and many-to-many cannot exist without the reverse property.
    pub fn requires_inverse(self) -> bool {
        self.is_collection()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelationKind::OneToOne => "OneToOne",
            RelationKind::OneToMany => "OneToMany",
            RelationKind::ManyToOne => "ManyToOne",
            RelationKind::ManyToMany => "ManyToMany",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_kinds_mirror() {
        assert_eq!(RelationKind::OneToOne.inverse(), RelationKind::OneToOne);
        assert_eq!(RelationKind::OneToMany.inverse(), RelationKind::ManyToOne);
        assert_eq!(RelationKind::ManyToOne.inverse(), RelationKind::OneToMany);
        assert_eq!(RelationKind::ManyToMany.inverse(), RelationKind::ManyToMany);
    }

    #[test]
    fn referential_actions_use_sql_names() {
        let action: ReferentialAction = serde_json::from_str("\"SET NULL\"").unwrap();
        assert_eq!(action, ReferentialAction::SetNull);
        assert_eq!(action.to_string(), "SET NULL");
    }
}
