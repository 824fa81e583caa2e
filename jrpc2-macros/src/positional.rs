use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

pub fn derive_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "FromPositional can only be derived for structs",
        ));
    };

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let count = data.fields.len();

    let construct = match &data.fields {
        Fields::Named(fields) => {
            let assignments = fields.named.iter().enumerate().map(|(index, field)| {
                let ident = &field.ident;
                quote! { #ident: ::jrpc2_core::params::decode_at(&values, #index)? }
            });
            quote! { #name { #(#assignments),* } }
        }
        Fields::Unnamed(fields) => {
            let items = (0..fields.unnamed.len())
                .map(|index| quote! { ::jrpc2_core::params::decode_at(&values, #index)? });
            quote! { #name ( #(#items),* ) }
        }
        Fields::Unit => quote! { #name },
    };

    Ok(quote! {
        impl #impl_generics ::jrpc2_core::params::FromPositional for #name #ty_generics #where_clause {
            fn from_positional(
                values: ::std::vec::Vec<::jrpc2_core::Value>,
            ) -> ::std::result::Result<Self, ::jrpc2_core::params::ParamsError> {
                ::jrpc2_core::params::expect_len(&values, #count)?;
                ::std::result::Result::Ok(#construct)
            }
        }
    })
}
