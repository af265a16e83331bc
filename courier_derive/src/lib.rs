extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

/// Implements `courier_protocol::Param` for a serde type, encoding with the
/// format the caller's serializer asks for.
#[proc_macro_derive(Param)]
pub fn param(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics ::courier_protocol::Param for #name #ty_generics #where_clause {
            fn into_bytes(
                &self,
                st: ::courier_protocol::SerializeType,
            ) -> ::courier_protocol::Result<::std::vec::Vec<u8>> {
                ::courier_protocol::to_vec(st, self)
            }
            fn from_slice(
                &mut self,
                st: ::courier_protocol::SerializeType,
                data: &[u8],
            ) -> ::courier_protocol::Result<()> {
                *self = ::courier_protocol::from_slice(st, data)?;
                Ok(())
            }
        }
    };

    TokenStream::from(expanded)
}
