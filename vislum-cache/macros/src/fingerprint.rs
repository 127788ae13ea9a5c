use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, DeriveInput, Field, Index, Member, Type};

#[derive(Clone, Copy, PartialEq, Eq)]
enum FieldMode {
    Value,
    Float,
    Object,
    Objects,
    Skip,
}

impl FieldMode {
    fn from_field(field: &Field) -> syn::Result<Self> {
        let mut mode = None;

        for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("fingerprint")) {
            let parsed = Self::from_attr(attr)?;
            if mode.replace(parsed).is_some() {
                return Err(syn::Error::new_spanned(
                    attr,
                    "only one #[fingerprint(..)] attribute is allowed per field",
                ));
            }
        }

        Ok(mode.unwrap_or_else(|| {
            if is_float(&field.ty) {
                FieldMode::Float
            } else {
                FieldMode::Value
            }
        }))
    }

    fn from_attr(attr: &Attribute) -> syn::Result<Self> {
        let mut mode = None;

        attr.parse_nested_meta(|meta| {
            let parsed = if meta.path.is_ident("skip") {
                FieldMode::Skip
            } else if meta.path.is_ident("object") {
                FieldMode::Object
            } else if meta.path.is_ident("objects") {
                FieldMode::Objects
            } else {
                return Err(meta.error("expected `skip`, `object` or `objects`"));
            };

            if mode.replace(parsed).is_some() {
                return Err(meta.error("conflicting fingerprint modes"));
            }
            Ok(())
        })?;

        mode.ok_or_else(|| syn::Error::new_spanned(attr, "missing fingerprint mode"))
    }
}

fn is_float(ty: &Type) -> bool {
    match ty {
        Type::Path(path) if path.qself.is_none() => {
            path.path.is_ident("f32") || path.path.is_ident("f64")
        }
        _ => false,
    }
}

fn float_recorder(ty: &Type) -> TokenStream {
    match ty {
        Type::Path(path) if path.path.is_ident("f64") => quote! { record_f64 },
        _ => quote! { record_f32 },
    }
}

pub fn derive_fingerprint_impl(input: DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    let data_struct = match &input.data {
        syn::Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Fingerprint derive macro only supports structs",
            ));
        }
    };

    let mut statements = Vec::with_capacity(data_struct.fields.len());

    for (index, field) in data_struct.fields.iter().enumerate() {
        let member = match &field.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(Index::from(index)),
        };

        let statement = match FieldMode::from_field(field)? {
            FieldMode::Skip => continue,
            FieldMode::Value => quote! { recorder.record(&self.#member); },
            FieldMode::Float => {
                let method = float_recorder(&field.ty);
                quote! { recorder.#method(self.#member); }
            }
            FieldMode::Object => quote! { recorder.record_object(&self.#member); },
            FieldMode::Objects => quote! { recorder.record_objects(&self.#member); },
        };

        statements.push(statement);
    }

    if statements.is_empty() {
        return Err(syn::Error::new_spanned(
            &input,
            "Fingerprint needs at least one recorded field",
        ));
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::vislum_cache::Fingerprint for #ident #ty_generics #where_clause {
            fn fingerprint(&self, recorder: &mut ::vislum_cache::FingerprintRecorder) {
                #(#statements)*
            }
        }
    })
}
