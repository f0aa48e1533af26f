//! Derive macros for chainorm
//!
//! Provides `#[derive(Model)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod model;

/// Derive `chainorm::Model` for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use chainorm::Model;
///
/// #[derive(Debug, Default, Model)]
/// #[orm(table = "users")]
/// struct User {
///     #[orm(tag = "primaryKey;autoIncrement")]
///     id: i64,
///     #[orm(column = "user_name")]
///     name: String,
///     #[orm(tag = "default:18")]
///     age: i32,
///     #[orm(tag = "softDelete")]
///     deleted_at: Option<chrono::DateTime<chrono::Utc>>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(table = "name")]` - Explicit table name (defaults to the snake-cased type name)
/// - `#[orm(hooks)]` - Take lifecycle hooks from the type's `ModelHooks` impl
/// - `#[orm(tag = "...")]` - Field directives, `;`-separated
/// - `#[orm(column = "name")]` - Shorthand for the `column:` directive
#[proc_macro_derive(Model, attributes(orm))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    model::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
