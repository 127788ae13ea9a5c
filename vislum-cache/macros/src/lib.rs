use proc_macro::TokenStream;
use syn::parse_macro_input;

mod fingerprint;

#[proc_macro_derive(Fingerprint, attributes(fingerprint))]
pub fn derive_fingerprint(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as syn::DeriveInput);
    fingerprint::derive_fingerprint_impl(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
