use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Year/month filter used when listing or summarising transactions.
/// A month of `0` is the front end's way of saying "whole year".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Period {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl Period {
    pub fn all() -> Self {
        Period::default()
    }

    pub fn year(year: i32) -> Self {
        Period {
            year: Some(year),
            month: None,
        }
    }

    pub fn month(year: i32, month: u32) -> Result<Self, ValidationError> {
        Period::new(Some(year), Some(month))
    }

    pub fn new(year: Option<i32>, month: Option<u32>) -> Result<Self, ValidationError> {
        let month = month.filter(|m| *m != 0);
        if let Some(m) = month {
            if m > 12 {
                return Err(ValidationError::InvalidMonth(m));
            }
        }
        Ok(Period { year, month })
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        self.year.map_or(true, |y| date.year() == y) && self.month.map_or(true, |m| date.month() == m)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.year, self.month) {
            (Some(y), Some(m)) => write!(f, "{y}-{m:02}"),
            (Some(y), None) => write!(f, "{y}"),
            (None, Some(m)) => write!(f, "*-{m:02}"),
            (None, None) => write!(f, "all"),
        }
    }
}
