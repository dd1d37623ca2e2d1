//! Collector for non-fatal diagnostics.
//!
//! The scanner, parser and resolver all keep going after an error.  Instead of
//! flipping a shared "had error" flag they push into a `Diagnostics` value the
//! caller owns and inspects once the phase is over.

use log::info;

use crate::error::LoxError;

#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<LoxError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one diagnostic.
    pub fn report(&mut self, error: LoxError) {
        info!("Diagnostic recorded: {}", error);

        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoxError> {
        self.errors.iter()
    }
}
