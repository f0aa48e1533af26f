//! Struct-level and field-level `#[orm(...)]` parsing.

use syn::{Attribute, LitStr, Result};

#[derive(Default)]
pub(super) struct ModelAttrs {
    pub table: Option<String>,
    pub hooks: bool,
}

#[derive(Default)]
pub(super) struct FieldAttrs {
    pub tag: Option<String>,
    pub column: Option<String>,
}

impl FieldAttrs {
    /// The directive string with a `column` shorthand folded in.
    pub fn directives(&self) -> String {
        let tag = self.tag.clone().unwrap_or_default();
        match &self.column {
            None => tag,
            Some(column) if tag.trim().is_empty() => format!("column:{column}"),
            Some(column) => format!("{tag};column:{column}"),
        }
    }
}

pub(super) fn parse_model_attrs(attrs: &[Attribute]) -> Result<ModelAttrs> {
    let mut out = ModelAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("orm")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                out.table = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else if meta.path.is_ident("hooks") {
                out.hooks = true;
                Ok(())
            } else {
                Err(meta.error("expected `table = \"...\"` or `hooks`"))
            }
        })?;
    }
    Ok(out)
}

pub(super) fn parse_field_attrs(attrs: &[Attribute]) -> Result<FieldAttrs> {
    let mut out = FieldAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("orm")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("tag") {
                out.tag = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else if meta.path.is_ident("column") {
                out.column = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("expected `tag = \"...\"` or `column = \"...\"`"))
            }
        })?;
    }
    Ok(out)
}
