//! Form definitions and submitted values for the admin console.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::validation::{FieldErrors, REQUIRED};

pub const NOT_A_NUMBER: &str = "Enter a whole number.";
pub const NOT_A_DATE: &str = "Enter a valid date.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

/// `(value, label)` pairs for select inputs.
pub type Choices = Vec<(String, String)>;

#[derive(Debug, Clone)]
pub enum FieldKind {
    Text,
    TextArea,
    Email,
    Password,
    Number,
    Date,
    Checkbox,
    /// Single choice; `blank` allows an empty selection.
    Select { choices: Choices, blank: bool },
    MultiSelect(Choices),
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub name: String,
    pub label: &'static str,
    pub kind: FieldKind,
    pub help: Option<&'static str>,
}

impl FormField {
    pub fn new(name: impl Into<String>, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label,
            kind,
            help: None,
        }
    }

    pub fn text(name: impl Into<String>, label: &'static str) -> Self {
        Self::new(name, label, FieldKind::Text)
    }

    pub fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

/// Submitted form values. Keys may repeat (multi-selects), so every key
/// maps to a list; checkboxes are present only when ticked.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormValues(BTreeMap<String, Vec<String>>);

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut values = Self::new();
        for (key, value) in pairs {
            values.0.entry(key).or_default().push(value);
        }
        values
    }

    /// First value for `name`, or `""`.
    pub fn text(&self, name: &str) -> &str {
        self.0
            .get(name)
            .and_then(|v| v.first())
            .map_or("", String::as_str)
    }

    /// Trimmed value, `None` when missing or blank.
    pub fn opt(&self, name: &str) -> Option<&str> {
        Some(self.text(name).trim()).filter(|v| !v.is_empty())
    }

    pub fn all(&self, name: &str) -> &[String] {
        self.0.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn checked(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), vec![value.into()]);
    }

    pub fn set_all(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.0.insert(name.into(), values);
    }

    pub fn set_checked(&mut self, name: impl Into<String>, checked: bool) {
        let name = name.into();
        if checked {
            self.0.insert(name, vec!["on".into()]);
        } else {
            self.0.remove(&name);
        }
    }

    /// Required non-blank text.
    pub fn required(&self, errors: &mut FieldErrors, name: &str) -> Option<String> {
        let value = self.opt(name).map(str::to_string);
        if value.is_none() {
            errors.add(name, REQUIRED);
        }
        value
    }

    /// Optional whole number; blank is `None`.
    pub fn int(&self, errors: &mut FieldErrors, name: &str) -> Option<i64> {
        let raw = self.opt(name)?;
        match raw.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                errors.add(name, NOT_A_NUMBER);
                None
            }
        }
    }

    /// Optional `YYYY-MM-DD` date; blank is `Ok(None)`.
    pub fn date(&self, errors: &mut FieldErrors, name: &str) -> Option<Option<NaiveDate>> {
        let Some(raw) = self.opt(name) else {
            return Some(None);
        };
        match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(d) => Some(Some(d)),
            Err(_) => {
                errors.add(name, NOT_A_DATE);
                None
            }
        }
    }

    /// Required choice among `choices`, parsed as an id.
    pub fn choice_id(&self, errors: &mut FieldErrors, name: &str, choices: &Choices) -> Option<i64> {
        let raw = self.required(errors, name)?;
        match raw.parse::<i64>() {
            Ok(id) if choices.iter().any(|(value, _)| *value == raw) => Some(id),
            _ => {
                errors.add(name, INVALID_CHOICE);
                None
            }
        }
    }

    /// Every selected id among `choices`.
    pub fn choice_ids(&self, errors: &mut FieldErrors, name: &str, choices: &Choices) -> Vec<i64> {
        let mut ids = Vec::new();
        for raw in self.all(name) {
            match raw.parse::<i64>() {
                Ok(id) if choices.iter().any(|(value, _)| value == raw) => ids.push(id),
                _ => {
                    errors.add(name, INVALID_CHOICE);
                    return Vec::new();
                }
            }
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormValues {
        FormValues::from_pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    #[test]
    fn repeated_keys_are_collected() {
        let values = form(&[("speciality1", "2"), ("speciality1", "1"), ("name", "x")]);
        assert_eq!(values.all("speciality1"), &["2".to_string(), "1".to_string()]);
        assert_eq!(values.text("name"), "x");
        assert_eq!(values.text("missing"), "");
    }

    #[test]
    fn blank_values_are_absent() {
        let values = form(&[("city", "   ")]);
        assert!(values.opt("city").is_none());
        let mut errors = FieldErrors::new();
        assert!(values.required(&mut errors, "city").is_none());
        assert_eq!(errors.get("city").unwrap()[0], REQUIRED);
    }

    #[test]
    fn checkboxes_are_presence_based() {
        let mut values = form(&[("is_staff", "on")]);
        assert!(values.checked("is_staff"));
        assert!(!values.checked("is_active"));
        values.set_checked("is_staff", false);
        assert!(!values.checked("is_staff"));
    }

    #[test]
    fn numbers_and_dates_report_bad_input() {
        let values = form(&[("days", "two"), ("valid_until", "31/12/2030"), ("price", "")]);
        let mut errors = FieldErrors::new();
        assert_eq!(values.int(&mut errors, "days"), None);
        assert_eq!(values.int(&mut errors, "price"), None);
        assert_eq!(values.date(&mut errors, "valid_until"), None);
        assert_eq!(errors.get("days").unwrap()[0], NOT_A_NUMBER);
        assert_eq!(errors.get("valid_until").unwrap()[0], NOT_A_DATE);
        assert!(!errors.contains("price"));
    }

    #[test]
    fn choices_must_be_offered() {
        let choices: Choices = vec![("1".into(), "One".into()), ("2".into(), "Two".into())];
        let mut errors = FieldErrors::new();
        assert_eq!(form(&[("h", "2")]).choice_id(&mut errors, "h", &choices), Some(2));
        assert_eq!(form(&[("h", "9")]).choice_id(&mut errors, "h", &choices), None);
        assert_eq!(errors.get("h").unwrap()[0], INVALID_CHOICE);

        let mut errors = FieldErrors::new();
        let ids = form(&[("s", "2"), ("s", "1"), ("s", "2")]).choice_ids(&mut errors, "s", &choices);
        assert_eq!(ids, vec![1, 2]);
        assert!(errors.is_empty());
    }
}
