// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signup form values and per-field validation state.

use std::collections::{BTreeMap, BTreeSet};

use crate::validation::{filter_nin_input, validate, Field, ValidationError};

/// Values collected by the signup wizard.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub nin: String,
    pub agree_to_terms: bool,
}

impl std::fmt::Debug for SignupForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupForm")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("password", &"<redacted>")
            .field("nin", &self.nin)
            .field("agree_to_terms", &self.agree_to_terms)
            .finish()
    }
}

impl SignupForm {
    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.name,
            Field::Email => &self.email,
            Field::Phone => &self.phone,
            Field::Password => &self.password,
            Field::Nin => &self.nin,
        }
    }

    fn value_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Name => &mut self.name,
            Field::Email => &mut self.email,
            Field::Phone => &mut self.phone,
            Field::Password => &mut self.password,
            Field::Nin => &mut self.nin,
        }
    }

    /// Apply a keystroke-level edit. Returns `false` when the edit was
    /// filtered out and the stored value is unchanged.
    pub fn apply_edit(&mut self, field: Field, value: String) -> bool {
        let value = match field {
            Field::Nin => match filter_nin_input(&value) {
                Some(value) => value,
                None => return false,
            },
            _ => value,
        };
        *self.value_mut(field) = value;
        true
    }

    /// True when no field holds a value.
    pub fn is_blank(&self) -> bool {
        Field::ALL.iter().all(|field| self.value(*field).is_empty()) && !self.agree_to_terms
    }
}

/// Errors and touched flags per field.
///
/// An error is only ever stored for a field whose current value fails its
/// rule; edits to a touched field recompute its entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationState {
    errors: BTreeMap<Field, ValidationError>,
    touched: BTreeSet<Field>,
}

impl ValidationState {
    pub fn error(&self, field: Field) -> Option<ValidationError> {
        self.errors.get(&field).copied()
    }

    pub fn errors(&self) -> impl Iterator<Item = (Field, ValidationError)> + '_ {
        self.errors.iter().map(|(field, err)| (*field, *err))
    }

    pub fn is_touched(&self, field: Field) -> bool {
        self.touched.contains(&field)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Mark `field` touched and validate it. Returns whether it passed.
    pub fn touch(&mut self, form: &SignupForm, field: Field) -> bool {
        self.touched.insert(field);
        self.check(form, field)
    }

    /// Re-run the rule for `field` if the user has already left it once.
    pub fn revalidate(&mut self, form: &SignupForm, field: Field) {
        if self.is_touched(field) {
            self.check(form, field);
        }
    }

    /// Validation pass for a step: touches every field in `fields` and
    /// returns true only if all of them pass.
    pub fn validate_fields(&mut self, form: &SignupForm, fields: &[Field]) -> bool {
        fields
            .iter()
            .fold(true, |all_ok, field| self.touch(form, *field) && all_ok)
    }

    pub fn clear(&mut self) {
        self.errors.clear();
        self.touched.clear();
    }

    fn check(&mut self, form: &SignupForm, field: Field) -> bool {
        match validate(field, form.value(field)) {
            Ok(()) => {
                self.errors.remove(&field);
                true
            }
            Err(err) => {
                self.errors.insert(field, err);
                false
            }
        }
    }
}
