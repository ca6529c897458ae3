//! Canonical form signature used for deduplication

use crate::normalize::normalize_action;
use std::collections::BTreeSet;
use surfacemap_core::Form;

/// Order-independent key identifying structurally identical forms.
///
/// Two forms collide when they post to the same normalized path with the
/// same method and accept the same set of `(name, type, required)` inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormSignature {
    pub action: String,
    pub method: String,
    pub inputs: BTreeSet<(String, String, bool)>,
}

impl FormSignature {
    pub fn of(form: &Form) -> Self {
        Self {
            action: normalize_action(form.action.trim()),
            method: form.method.trim().to_uppercase(),
            inputs: form
                .inputs
                .iter()
                .map(|input| {
                    (
                        input.name.trim().to_string(),
                        input.input_type.trim().to_string(),
                        input.required,
                    )
                })
                .collect(),
        }
    }
}
