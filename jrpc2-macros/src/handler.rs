//! `#[handler]` expansion
//!
//! Input:
//! ```ignore
//! #[handler]
//! async fn add(p: AddParams) -> Result<i64> {
//!     Ok(p.a + p.b)
//! }
//! ```
//!
//! Output:
//! ```ignore
//! fn add() -> Box<dyn ::jrpc2_server::Handler> {
//!     async fn add(p: AddParams) -> Result<i64> {
//!         Ok(p.a + p.b)
//!     }
//!     ::jrpc2_server::from_typed_fn(add)
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::spanned::Spanned;
use syn::{parse_macro_input, FnArg, ItemFn};

pub fn handler_impl(input: TokenStream) -> TokenStream {
    let input_fn = parse_macro_input!(input as ItemFn);
    match expand(input_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input_fn: ItemFn) -> syn::Result<TokenStream2> {
    let sig = &input_fn.sig;
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(
            sig.fn_token.span(),
            "#[handler] requires an async fn",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            sig.generics.span(),
            "#[handler] functions cannot be generic",
        ));
    }
    if let Some(FnArg::Receiver(receiver)) = sig.inputs.first() {
        return Err(syn::Error::new(
            receiver.span(),
            "#[handler] cannot be used on methods",
        ));
    }

    let name = &sig.ident;
    let vis = &input_fn.vis;
    let attrs = &input_fn.attrs;
    let inputs = &sig.inputs;
    let output = &sig.output;
    let block = &input_fn.block;

    let inner = quote! {
        async fn #name(#inputs) #output #block
    };

    let factory = match sig.inputs.len() {
        0 => quote! { ::jrpc2_server::from_typed_fn(move |_: ()| #name()) },
        1 => quote! { ::jrpc2_server::from_typed_fn(#name) },
        2 => quote! { ::jrpc2_server::from_typed_fn_with_context(#name) },
        _ => {
            return Err(syn::Error::new(
                sig.inputs.span(),
                "#[handler] takes at most a context and one params argument",
            ));
        }
    };

    Ok(quote! {
        #(#attrs)*
        #vis fn #name() -> ::std::boxed::Box<dyn ::jrpc2_server::Handler> {
            #inner
            #factory
        }
    })
}
