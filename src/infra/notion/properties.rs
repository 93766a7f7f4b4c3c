//! Typed access into a page's untyped property bag.
//!
//! All upstream-schema branching lives here: every accessor switches on the
//! declared property kind and hands back the caller-supplied default on any
//! mismatch or absent key. Pure reads, no errors.

use std::collections::HashMap;

use serde::Deserialize;
use time::OffsetDateTime;

use crate::domain::sanitize::parse_datetime;

use super::wire::{Property, plain_text};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag(HashMap<String, Property>);

impl PropertyBag {
    pub fn get(&self, key: &str) -> Option<&Property> {
        self.0.get(key)
    }

    /// Extract text from title, rich-text, select, or URL properties.
    pub fn get_string(&self, key: &str, default: &str) -> String {
        let value = match self.get(key) {
            Some(Property::Title { title }) => plain_text(title),
            Some(Property::RichText { rich_text }) => plain_text(rich_text),
            Some(Property::Select {
                select: Some(option),
            }) => option.name.clone(),
            Some(Property::Url { url: Some(url) }) => url.clone(),
            _ => return default.to_string(),
        };
        value.trim().to_string()
    }

    pub fn get_boolean(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(Property::Checkbox { checkbox }) => *checkbox,
            _ => default,
        }
    }

    pub fn get_number(&self, key: &str, default: f64) -> f64 {
        match self.get(key) {
            Some(Property::Number {
                number: Some(number),
            }) => *number,
            _ => default,
        }
    }

    /// Extract option names from multi-select (or a lone select) properties.
    pub fn get_string_array(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Property::MultiSelect { multi_select }) => multi_select
                .iter()
                .map(|option| option.name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
            Some(Property::Select {
                select: Some(option),
            }) if !option.name.trim().is_empty() => {
                vec![option.name.trim().to_string()]
            }
            _ => Vec::new(),
        }
    }

    /// Extract an instant from date, created-time, or last-edited-time
    /// properties.
    pub fn get_date(&self, key: &str, default: OffsetDateTime) -> OffsetDateTime {
        let text = match self.get(key) {
            Some(Property::Date { date: Some(value) }) => value.start.as_deref(),
            Some(Property::CreatedTime { created_time }) => Some(created_time.as_str()),
            Some(Property::LastEditedTime { last_edited_time }) => {
                Some(last_edited_time.as_str())
            }
            _ => None,
        };
        text.and_then(parse_datetime).unwrap_or(default)
    }

    /// Whether the page declares the property at all, of any kind.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}
