//! Model derive macro implementation

mod attrs;

use attrs::{parse_field_attrs, parse_model_attrs};
use proc_macro2::{Literal, TokenStream};
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let name_str = name.to_string();
    let model = parse_model_attrs(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Model can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Model can only be derived for structs",
            ));
        }
    };

    let mut defs = Vec::new();
    let mut getters = Vec::new();
    let mut setters = Vec::new();
    let mut takes = Vec::new();

    for (i, field) in fields.iter().enumerate() {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let ty = &field.ty;
        let index = Literal::usize_unsuffixed(i);
        let field_name = ident.to_string();
        let tag = parse_field_attrs(&field.attrs)?.directives();

        defs.push(quote! {
            ::chainorm::FieldDef::new(
                #field_name,
                #tag,
                <#ty as ::chainorm::SqlField>::KIND,
                <#ty as ::chainorm::SqlField>::NULLABLE,
            )
        });
        getters.push(quote! {
            #index => ::std::option::Option::Some(::chainorm::FieldValue::of(&self.#ident)),
        });
        setters.push(quote! {
            #index => {
                self.#ident = <#ty as ::chainorm::SqlField>::from_value(value)
                    .map_err(|message| ::chainorm::OrmError::decode(#field_name, message))?;
                ::std::result::Result::Ok(())
            }
        });
        takes.push(quote! {
            #ident: fields.take(#index)?,
        });
    }

    let table = match &model.table {
        Some(table) => quote! { ::std::option::Option::Some(#table) },
        None => quote! { ::std::option::Option::None },
    };

    let hooks = model.hooks.then(|| {
        quote! {
            fn hooks() -> ::chainorm::Hooks<Self> {
                <Self as ::chainorm::ModelHooks>::register_hooks()
            }
        }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::chainorm::Model for #name #ty_generics #where_clause {
            const NAME: &'static str = #name_str;
            const TABLE: ::std::option::Option<&'static str> = #table;
            const FIELDS: &'static [::chainorm::FieldDef] = &[#(#defs),*];

            fn field(&self, index: usize) -> ::std::option::Option<::chainorm::FieldValue> {
                match index {
                    #(#getters)*
                    _ => ::std::option::Option::None,
                }
            }

            fn set_field(
                &mut self,
                index: usize,
                value: ::chainorm::Value,
            ) -> ::chainorm::OrmResult<()> {
                match index {
                    #(#setters)*
                    _ => ::std::result::Result::Err(::chainorm::OrmError::field_resolution(
                        ::std::format!("{} has no field at index {}", #name_str, index),
                    )),
                }
            }

            #[allow(unused_mut)]
            fn from_fields(
                mut fields: ::chainorm::FieldValues,
            ) -> ::chainorm::OrmResult<Self> {
                ::std::result::Result::Ok(Self {
                    #(#takes)*
                })
            }

            #hooks
        }
    })
}
