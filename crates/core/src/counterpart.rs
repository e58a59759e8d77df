use serde::{Deserialize, Serialize};
use std::fmt;

use crate::account::AccountId;
use crate::category::CategoryId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterpartId(pub i64);

impl fmt::Display for CounterpartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The other party of a transaction, as seen from one owning account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterpart {
    pub id: CounterpartId,
    pub owner_id: AccountId,
    /// Always stored in the form returned by [`normalize_name`].
    pub name: String,
    pub category_id: Option<CategoryId>,
}

/// Matching key for counterpart names: trimmed, inner whitespace collapsed,
/// lower case.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// How a caller points at a counterpart when editing category membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CounterpartRef {
    Id(CounterpartId),
    Name(String),
}

impl From<CounterpartId> for CounterpartRef {
    fn from(id: CounterpartId) -> Self {
        CounterpartRef::Id(id)
    }
}

impl From<&str> for CounterpartRef {
    fn from(name: &str) -> Self {
        CounterpartRef::Name(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_case_and_whitespace() {
        assert_eq!(normalize_name("ACME"), "acme");
        assert_eq!(normalize_name("  Acme "), "acme");
        assert_eq!(normalize_name("Acme   Corp\tNV"), "acme corp nv");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn counterpart_ref_accepts_ids_and_names() {
        let refs: Vec<CounterpartRef> = serde_json::from_str(r#"[3, "Globex"]"#).unwrap();
        assert_eq!(refs[0], CounterpartRef::Id(CounterpartId(3)));
        assert_eq!(refs[1], CounterpartRef::Name("Globex".to_string()));
    }
}
