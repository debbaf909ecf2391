//! Command output templates
//!
//! Layouts live in `templates/` and are compiled in with askama. The
//! padding filters count visible columns, so color markup in a value does
//! not push the columns after it out of line.

use crate::color::ColorTable;
use askama::Template;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("render failed: {0}")]
    Render(#[from] askama::Error),
}

/// One row of the `who` listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoEntry {
    pub recap: String,
    pub description: String,
    /// Already formatted, e.g. `1m5s`
    pub idle: String,
}

#[derive(Template)]
#[template(path = "who.txt", escape = "none")]
struct WhoTemplate<'a> {
    colors: &'a ColorTable,
    users: &'a [WhoEntry],
}

/// Render the `who` listing, one row per entry in the order given
pub fn render_who(colors: &ColorTable, users: &[WhoEntry]) -> Result<String, TemplateError> {
    let view = WhoTemplate { colors, users };
    Ok(view.render()?)
}

mod filters {
    use crate::color::ColorTable;
    use std::fmt::Display;

    pub fn join_with<A: Display, B: Display>(
        first: A,
        separator: &str,
        second: B,
    ) -> askama::Result<String> {
        Ok(format!("{}{}{}", first, separator, second))
    }

    /// Pad on the right to `width` visible columns
    pub fn ljust<T: Display>(value: T, width: usize, colors: &ColorTable) -> askama::Result<String> {
        let value = value.to_string();
        let width = width + colors.count_markup_bytes(&value);
        Ok(format!("{:<width$}", value, width = width))
    }

    /// Pad on the left to `width` visible columns
    pub fn rjust<T: Display>(value: T, width: usize, colors: &ColorTable) -> askama::Result<String> {
        let value = value.to_string();
        let width = width + colors.count_markup_bytes(&value);
        Ok(format!("{:>width$}", value, width = width))
    }
}
