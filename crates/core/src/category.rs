use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::account::AccountId;
use crate::counterpart::CounterpartRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub i64);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Declared kind of money flow for a category, copied onto every transaction
/// classified into it. `None` means "not typed yet" / uncategorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CategoryType {
    Expenses,
    Income,
    Savings,
    #[default]
    None,
}

impl CategoryType {
    pub const TYPED: [CategoryType; 3] = [
        CategoryType::Expenses,
        CategoryType::Income,
        CategoryType::Savings,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CategoryType::Expenses => "Expenses",
            CategoryType::Income => "Income",
            CategoryType::Savings => "Savings",
            CategoryType::None => "None",
        }
    }

    /// Expenses and savings are stored as outflows; reports show them positive.
    pub fn is_outflow(self) -> bool {
        matches!(self, CategoryType::Expenses | CategoryType::Savings)
    }
}

impl fmt::Display for CategoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expenses" => Ok(CategoryType::Expenses),
            "income" => Ok(CategoryType::Income),
            "savings" => Ok(CategoryType::Savings),
            "none" | "" => Ok(CategoryType::None),
            other => Err(format!("Unknown category type: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub owner_id: AccountId,
    pub name: String,
    pub description: String,
    pub category_type: CategoryType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_type: CategoryType,
    #[serde(default)]
    pub counterparts: Vec<CounterpartRef>,
}

/// Partial update. `counterparts: None` leaves membership untouched,
/// `Some(vec![])` detaches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_type: Option<CategoryType>,
    pub counterparts: Option<Vec<CounterpartRef>>,
}

impl CategoryPatch {
    /// Applies the scalar fields. Membership is handled by the category manager.
    pub fn apply_fields(&self, category: &mut Category) {
        if let Some(name) = &self.name {
            category.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            category.description = description.clone();
        }
        if let Some(category_type) = self.category_type {
            category.category_type = category_type;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_type_round_trips_through_str() {
        for t in [
            CategoryType::Expenses,
            CategoryType::Income,
            CategoryType::Savings,
            CategoryType::None,
        ] {
            assert_eq!(t.as_str().parse::<CategoryType>().unwrap(), t);
        }
        assert_eq!("INCOME".parse::<CategoryType>().unwrap(), CategoryType::Income);
        assert!("groceries".parse::<CategoryType>().is_err());
    }

    #[test]
    fn outflow_types() {
        assert!(CategoryType::Expenses.is_outflow());
        assert!(CategoryType::Savings.is_outflow());
        assert!(!CategoryType::Income.is_outflow());
        assert!(!CategoryType::None.is_outflow());
    }

    #[test]
    fn patch_applies_scalars_only() {
        let mut c = Category {
            id: CategoryId(1),
            owner_id: AccountId(1),
            name: "Food".to_string(),
            description: String::new(),
            category_type: CategoryType::None,
        };
        let patch = CategoryPatch {
            name: Some(" Groceries ".to_string()),
            category_type: Some(CategoryType::Expenses),
            ..Default::default()
        };
        patch.apply_fields(&mut c);
        assert_eq!(c.name, "Groceries");
        assert_eq!(c.description, "");
        assert_eq!(c.category_type, CategoryType::Expenses);
    }
}
