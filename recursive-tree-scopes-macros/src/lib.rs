use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{
    parse_macro_input, spanned::Spanned, Attribute, Data, DeriveInput, Fields, Ident, LitStr, Type,
};

#[proc_macro_derive(TreeScopeModel, attributes(tree_scope))]
pub fn derive_tree_scope_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match impl_tree_scope_model(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error().into(),
    }
}

struct RoleOption {
    name: String,
    field: String,
    span: proc_macro2::Span,
}

#[derive(Default)]
struct Options {
    id_field: Option<String>,
    id_type: Option<Type>,
    entity_name: Option<String>,
    roles: Vec<RoleOption>,
    max_depth: Option<syn::LitInt>,
    ancestor_order: Option<LitStr>,
    order_column: Option<String>,
}

fn impl_tree_scope_model(input: &DeriveInput) -> syn::Result<TokenStream> {
    let struct_ident = &input.ident;

    let data_struct = match &input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "TreeScopeModel can only be derived for structs",
            ))
        }
    };

    let mut options = Options::default();
    let mut table_name: Option<String> = None;

    for attr in &input.attrs {
        if attr.path().is_ident("tree_scope") {
            parse_tree_scope_attr(attr, &mut options)?;
        }

        if attr.path().is_ident("sea_orm") {
            if let Some(name) = parse_sea_orm_table_name(attr)? {
                table_name = Some(name);
            }
        }
    }

    let fields = match &data_struct.fields {
        Fields::Named(fields) => fields,
        other => {
            return Err(syn::Error::new(
                other.span(),
                "TreeScopeModel requires named fields",
            ))
        }
    };

    let field_names: Vec<String> = fields
        .named
        .iter()
        .filter_map(|field| field.ident.as_ref())
        .map(|ident| ident.unraw().to_string())
        .collect();

    let id_field_name = options.id_field.unwrap_or_else(|| "id".to_string());
    let id_field_ident = Ident::new(&id_field_name, struct_ident.span());

    let mut id_field_type: Option<Type> = options.id_type.clone();
    for field in &fields.named {
        if let Some(ident) = &field.ident {
            if ident == &id_field_ident && id_field_type.is_none() {
                id_field_type = Some(field.ty.clone());
            }
        }
    }

    let id_type = id_field_type.ok_or_else(|| {
        syn::Error::new(
            struct_ident.span(),
            "Unable to determine id field type; specify `id_type = ...` in #[tree_scope]",
        )
    })?;

    let mut roles = options.roles;
    if roles.is_empty() {
        roles.push(RoleOption {
            name: "parent".to_string(),
            field: "parent_id".to_string(),
            span: struct_ident.span(),
        });
    }

    for role in &roles {
        if !field_names.iter().any(|name| name == &role.field) {
            return Err(syn::Error::new(
                role.span,
                format!(
                    "parent role `{}` refers to unknown field `{}`",
                    role.name, role.field
                ),
            ));
        }
    }

    let struct_name = struct_ident.unraw().to_string();
    let entity_name = options
        .entity_name
        .unwrap_or_else(|| default_entity_name(&struct_name, table_name.as_deref()));
    let entity_name_literal = LitStr::new(&entity_name, struct_ident.span());

    let role_builders = roles.iter().map(|role| {
        let name = LitStr::new(&role.name, role.span);
        let column = LitStr::new(&role.field, role.span);
        quote! { .role(#name, #column) }
    });

    let max_depth_builder = options
        .max_depth
        .as_ref()
        .map(|value| quote! { .max_depth(#value) });

    let ancestor_order_builder = match &options.ancestor_order {
        Some(value) => {
            let variant = match value.value().as_str() {
                "root_first" => format_ident!("RootFirst"),
                "nearest_first" => format_ident!("NearestFirst"),
                "storage" => format_ident!("Storage"),
                other => {
                    return Err(syn::Error::new(
                        value.span(),
                        format!(
                            "Unsupported ancestor_order `{other}`; expected `root_first`, `nearest_first` or `storage`"
                        ),
                    ))
                }
            };
            Some(quote! { .ancestor_order(::recursive_tree_scopes::AncestorOrder::#variant) })
        }
        None => None,
    };

    let order_column_builder = options.order_column.as_ref().map(|column| {
        let column = LitStr::new(column, struct_ident.span());
        quote! { .order_column(#column) }
    });

    let id_column_variant = format_ident!("{}", to_pascal_case(&id_field_name));
    let parent_field_idents: Vec<Ident> = roles
        .iter()
        .map(|role| Ident::new(&role.field, role.span))
        .collect();
    let parent_column_variants: Vec<Ident> = roles
        .iter()
        .map(|role| format_ident!("{}", to_pascal_case(&role.field)))
        .collect();
    let member_literals = field_names
        .iter()
        .map(|name| LitStr::new(name, struct_ident.span()));

    let generated = quote! {
        impl ::recursive_tree_scopes::TreeScopeModel for #struct_ident {
            type Entity = Entity;
            type Id = #id_type;

            fn tree_scope_config() -> &'static ::recursive_tree_scopes::TreeScopeConfig {
                static CONFIG: ::once_cell::sync::Lazy<::recursive_tree_scopes::TreeScopeConfig> =
                    ::once_cell::sync::Lazy::new(|| {
                        let base = ::recursive_tree_scopes::TreeScopeConfig::new(
                            #entity_name_literal,
                        );
                        ::recursive_tree_scopes::TreeScopeOptions::default()
                            #(#role_builders)*
                            #max_depth_builder
                            #ancestor_order_builder
                            #order_column_builder
                            .apply(base)
                    });
                &CONFIG
            }

            fn id(&self) -> Self::Id {
                self.#id_field_ident.clone()
            }

            fn parent_ids(&self) -> ::std::vec::Vec<::core::option::Option<Self::Id>> {
                ::std::vec![#(self.#parent_field_idents.clone()),*]
            }

            fn id_to_value(id: &Self::Id) -> ::sea_orm::Value {
                ::sea_orm::Value::from(id.clone())
            }

            fn id_column() -> <Self::Entity as ::sea_orm::EntityTrait>::Column {
                Column::#id_column_variant
            }

            fn parent_columns() -> ::std::vec::Vec<<Self::Entity as ::sea_orm::EntityTrait>::Column> {
                ::std::vec![#(Column::#parent_column_variants),*]
            }

            fn member_names() -> &'static [&'static str] {
                &[#(#member_literals),*]
            }
        }
    };

    Ok(generated.into())
}

fn parse_tree_scope_attr(attr: &Attribute, options: &mut Options) -> syn::Result<()> {
    attr.parse_nested_meta(|meta| {
        let ident = meta
            .path
            .get_ident()
            .ok_or_else(|| syn::Error::new(meta.path.span(), "Invalid option key"))?
            .to_string();

        match ident.as_str() {
            "id_field" => {
                let value: LitStr = meta.value()?.parse()?;
                options.id_field = Some(value.value());
            }
            "id_type" => {
                let ty: Type = meta.value()?.parse()?;
                options.id_type = Some(ty);
            }
            "entity_name" => {
                let value: LitStr = meta.value()?.parse()?;
                options.entity_name = Some(value.value());
            }
            "parent_field" => {
                let value: LitStr = meta.value()?.parse()?;
                options.roles.push(RoleOption {
                    name: value.value().trim_end_matches("_id").to_string(),
                    field: value.value(),
                    span: value.span(),
                });
            }
            "role" => {
                let mut name: Option<LitStr> = None;
                let mut field: Option<LitStr> = None;
                meta.parse_nested_meta(|inner| {
                    if inner.path.is_ident("name") {
                        name = Some(inner.value()?.parse()?);
                        Ok(())
                    } else if inner.path.is_ident("field") {
                        field = Some(inner.value()?.parse()?);
                        Ok(())
                    } else {
                        Err(inner.error("Unsupported role option; expected `name` or `field`"))
                    }
                })?;
                let name = name.ok_or_else(|| meta.error("role requires `name = \"...\"`"))?;
                let field = match field {
                    Some(field) => field.value(),
                    None => format!("{}_id", name.value()),
                };
                options.roles.push(RoleOption {
                    name: name.value(),
                    field,
                    span: name.span(),
                });
            }
            "max_depth" => {
                let value: syn::LitInt = meta.value()?.parse()?;
                value.base10_parse::<usize>()?;
                options.max_depth = Some(value);
            }
            "ancestor_order" => {
                let value: LitStr = meta.value()?.parse()?;
                options.ancestor_order = Some(value);
            }
            "order_column" => {
                let value: LitStr = meta.value()?.parse()?;
                options.order_column = Some(value.value());
            }
            other => {
                return Err(syn::Error::new(
                    meta.path.span(),
                    format!("Unsupported tree_scope option `{other}`"),
                ));
            }
        }

        Ok(())
    })
}

fn parse_sea_orm_table_name(attr: &Attribute) -> syn::Result<Option<String>> {
    let mut table_name: Option<String> = None;
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("table_name") {
            let value: LitStr = meta.value()?.parse()?;
            table_name = Some(value.value());
        } else if meta.input.peek(syn::Token![=]) {
            // Other sea_orm options are not ours; consume their values.
            let _: syn::Expr = meta.value()?.parse()?;
        }
        Ok(())
    })?;
    Ok(table_name)
}

fn to_pascal_case(value: &str) -> String {
    value
        .split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// A hand-named struct keeps its own name; a SeaORM `Model` takes its name from
/// the singular of its table (`employees` is `Employee`, `people` stays `People`).
fn default_entity_name(struct_name: &str, table_name: Option<&str>) -> String {
    match table_name {
        Some(table) if struct_name == "Model" => to_pascal_case(&singular(table)),
        _ => struct_name.to_string(),
    }
}

fn singular(table: &str) -> String {
    if let Some(stem) = table.strip_suffix("ies") {
        return format!("{stem}y");
    }
    for suffix in ["sses", "shes", "ches", "xes"] {
        if table.ends_with(suffix) {
            return table[..table.len() - 2].to_string();
        }
    }
    match table.strip_suffix('s') {
        Some(stem) if !stem.ends_with('s') && !stem.is_empty() => stem.to_string(),
        _ => table.to_string(),
    }
}
