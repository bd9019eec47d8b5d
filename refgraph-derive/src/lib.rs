//! # RefGraph Derive Macros
//!
//! This crate provides the procedural macro for `refgraph`. It implements the
//! `Model` trait: the member descriptors, type-level modifiers and aliases, and
//! by-name member access through `IntoValue` / `FromValue`.
//!
//! Compatible with `syn 2.0`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, Path, parse_macro_input, parse_quote};

/// Derives `refgraph::Model` for a struct with named fields.
///
/// Struct attributes (`#[refgraph(...)]`):
/// - `name = "..."`: wire name (default: module path and struct name),
/// - `alias = "..."`: legacy wire name, repeatable,
/// - `modifier = Path`: a `Default` modifier type, repeatable, applied in order.
///
/// Field attributes:
/// - `property`: a regular property (serialized only with `include`),
/// - `field`: a field (serialized only with `include`),
/// - `include` / `exclude`: explicit markers, `exclude` wins,
/// - `rename = "..."`: wire name of the member,
/// - `skip`: not a member at all; the type need not be convertible.
///
/// Unmarked fields are model properties and are serialized by default.
///
/// The struct must implement `Default`: deserialization creates a blank
/// instance and assigns members onto it. Member types must implement
/// `IntoValue` and `FromValue` unless the field is marked `skip`.
#[proc_macro_derive(Model, attributes(refgraph))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(e) => e.to_compile_error().into(),
    }
}

// --- Internal Data Structures ---

#[derive(Default)]
struct TypeAttributes {
    name: Option<LitStr>,
    aliases: Vec<LitStr>,
    modifiers: Vec<Path>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Group {
    ModelProperty,
    RegularProperty,
    Field,
}

struct MemberField {
    ident: syn::Ident,
    ty: syn::Type,
    wire_name: String,
    group: Group,
    include: bool,
    exclude: bool,
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;

    let named = match &input.data {
        Data::Struct(ds) => match &ds.fields {
            Fields::Named(named) => named,
            _ => {
                return Err(syn::Error::new(
                    name.span(),
                    "Model can only be derived for structs with named fields",
                ));
            }
        },
        _ => return Err(syn::Error::new(name.span(), "Model only supports structs")),
    };

    let type_attrs = parse_type_attributes(&input.attrs)?;

    let mut members = Vec::new();
    for field in &named.named {
        if let Some(member) = parse_member(field)? {
            members.push(member);
        }
    }

    let type_name = match &type_attrs.name {
        Some(lit) => quote! { #lit },
        None if input.generics.params.is_empty() => {
            quote! { ::core::concat!(::core::module_path!(), "::", ::core::stringify!(#name)) }
        }
        None => quote! { ::core::any::type_name::<Self>() },
    };

    let describe = generate_model_type(&type_name, &type_attrs, &members);
    let getter = generate_get_member(&type_name, &members);
    let setter = generate_set_member(&type_name, &members);

    // Blank instances are created through `Default`.
    let mut generics = input.generics.clone();
    generics
        .make_where_clause()
        .predicates
        .push(parse_quote! { Self: ::core::default::Default });
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::refgraph::Model for #name #ty_generics #where_clause {
            fn model_type() -> ::refgraph::ModelType {
                #describe
            }

            fn describe(&self) -> ::refgraph::ModelType {
                <Self as ::refgraph::Model>::model_type()
            }

            #getter
            #setter
        }
    })
}

/// Parses `#[refgraph(...)]` on the struct.
fn parse_type_attributes(attrs: &[Attribute]) -> syn::Result<TypeAttributes> {
    let mut parsed = TypeAttributes::default();

    for attr in attrs {
        if attr.path().is_ident("refgraph") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    parsed.name = Some(meta.value()?.parse()?);
                    return Ok(());
                }

                if meta.path.is_ident("alias") {
                    parsed.aliases.push(meta.value()?.parse()?);
                    return Ok(());
                }

                if meta.path.is_ident("modifier") {
                    parsed.modifiers.push(meta.value()?.parse()?);
                    return Ok(());
                }
                Err(meta.error("Unknown refgraph type attribute. Supported: name, alias, modifier"))
            })?;
        }
    }
    Ok(parsed)
}

/// Parses `#[refgraph(...)]` on a field. Returns `None` for skipped fields.
fn parse_member(field: &syn::Field) -> syn::Result<Option<MemberField>> {
    let Some(ident) = field.ident.clone() else {
        return Err(syn::Error::new_spanned(field, "expected a named field"));
    };

    let mut group = Group::ModelProperty;
    let mut include = false;
    let mut exclude = false;
    let mut skip = false;
    let mut wire_name = ident.to_string();

    for attr in &field.attrs {
        if attr.path().is_ident("refgraph") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("property") {
                    group = Group::RegularProperty;
                    return Ok(());
                }

                if meta.path.is_ident("field") {
                    group = Group::Field;
                    return Ok(());
                }

                if meta.path.is_ident("include") {
                    include = true;
                    return Ok(());
                }

                if meta.path.is_ident("exclude") {
                    exclude = true;
                    return Ok(());
                }

                if meta.path.is_ident("skip") {
                    skip = true;
                    return Ok(());
                }

                if meta.path.is_ident("rename") {
                    let lit: LitStr = meta.value()?.parse()?;
                    wire_name = lit.value();
                    return Ok(());
                }
                Err(meta.error(
                    "Unknown refgraph field attribute. Supported: property, field, include, exclude, rename, skip",
                ))
            })?;
        }
    }

    if skip {
        return Ok(None);
    }

    Ok(Some(MemberField {
        ident,
        ty: field.ty.clone(),
        wire_name,
        group,
        include,
        exclude,
    }))
}

// --- Generator: model_type ---

fn generate_model_type(
    type_name: &proc_macro2::TokenStream,
    type_attrs: &TypeAttributes,
    members: &[MemberField],
) -> proc_macro2::TokenStream {
    let aliases = &type_attrs.aliases;
    let modifiers = &type_attrs.modifiers;

    let descriptors = members.iter().map(|m| {
        let wire_name = &m.wire_name;
        let ty = &m.ty;
        let include = m.include;
        let exclude = m.exclude;
        let group = match m.group {
            Group::ModelProperty => quote! { ::refgraph::MemberGroup::ModelProperty },
            Group::RegularProperty => quote! { ::refgraph::MemberGroup::RegularProperty },
            Group::Field => quote! { ::refgraph::MemberGroup::Field },
        };

        quote! {
            .member(
                ::refgraph::MemberDescriptor::new(#wire_name, #group, ::core::stringify!(#ty))
                    .include(#include)
                    .exclude(#exclude)
                    .nested(<#ty as ::refgraph::FromValue>::nested_model_type)
            )
        }
    });

    quote! {
        ::refgraph::ModelType::new::<Self>(#type_name)
            #( .alias(#aliases) )*
            #( #descriptors )*
            #(
                .modifier(::std::sync::Arc::new(<#modifiers as ::core::default::Default>::default()))
            )*
    }
}

// --- Generator: by-name access ---

fn generate_get_member(type_name: &proc_macro2::TokenStream, members: &[MemberField]) -> proc_macro2::TokenStream {
    let arms = members.iter().map(|m| {
        let wire_name = &m.wire_name;
        let ident = &m.ident;
        quote! {
            #wire_name => ::core::result::Result::Ok(::refgraph::IntoValue::to_value(&self.#ident)),
        }
    });

    quote! {
        fn get_member(&self, name: &str) -> ::refgraph::Result<::refgraph::Value> {
            match name {
                #( #arms )*
                _ => ::core::result::Result::Err(::refgraph::GraphError::member_not_registered(#type_name, name)),
            }
        }
    }
}

fn generate_set_member(type_name: &proc_macro2::TokenStream, members: &[MemberField]) -> proc_macro2::TokenStream {
    let arms = members.iter().map(|m| {
        let wire_name = &m.wire_name;
        let ident = &m.ident;
        quote! {
            #wire_name => {
                self.#ident = ::refgraph::FromValue::from_value(value)?;
                ::core::result::Result::Ok(())
            }
        }
    });

    quote! {
        fn set_member(&mut self, name: &str, value: ::refgraph::Value) -> ::refgraph::Result<()> {
            let _ = &value;
            match name {
                #( #arms )*
                _ => ::core::result::Result::Err(::refgraph::GraphError::member_not_registered(#type_name, name)),
            }
        }
    }
}
