use proc_macro::TokenStream;
use quote::quote;
use syn::{
  parse::Parser, parse_macro_input, punctuated::Punctuated, spanned::Spanned, Ident, ItemFn,
  Token,
};

/// Test attribute shared by every rxmarble test.
///
/// - `#[rxmarble_macro::test]` on a sync fn expands to `#[test]`, on an async fn to
///   `#[tokio::test]` (current-thread runtime).
/// - `local` / `shared` pick the tokio flavor of an async test.
/// - `trace` installs a `tracing_subscriber` writing into the test output before the body
///   runs, so scheduler and harness logs show up for failing tests.
///
/// On wasm targets `wasm_bindgen_test` is used instead.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let mut input = parse_macro_input!(item as ItemFn);
  let is_async = input.sig.asyncness.is_some();

  let args = match Punctuated::<Ident, Token![,]>::parse_terminated.parse(attr) {
    Ok(args) => args,
    Err(err) => return TokenStream::from(err.to_compile_error()),
  };

  let mut tokio_args = proc_macro2::TokenStream::new();
  let mut trace = false;
  for ident in args.iter() {
    match ident.to_string().as_str() {
      "trace" => trace = true,
      flavor @ ("local" | "shared") => {
        if !is_async {
          return TokenStream::from(
            syn::Error::new(
              ident.span(),
              "rxmarble_macro::test flavor args are only supported for async tests. Use \
               #[rxmarble_macro::test] for sync tests, or make the function async.",
            )
            .to_compile_error(),
          );
        }
        tokio_args = if flavor == "local" {
          quote!(flavor = "current_thread")
        } else {
          quote!(flavor = "multi_thread")
        };
      }
      _ => {
        return TokenStream::from(
          syn::Error::new(
            ident.span(),
            "rxmarble_macro::test only accepts: `trace`, `local` or `shared`, e.g. \
             #[rxmarble_macro::test(trace)] or #[rxmarble_macro::test(local, trace)]",
          )
          .to_compile_error(),
        );
      }
    }
  }

  if trace {
    let install: syn::Stmt = syn::parse_quote_spanned! {input.sig.span()=>
      let _ = ::tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(::tracing::Level::TRACE)
        .try_init();
    };
    input.block.stmts.insert(0, install);
  }

  let wasm_attr = if is_async {
    quote!(wasm_bindgen_test::wasm_bindgen_test(async))
  } else {
    quote!(wasm_bindgen_test::wasm_bindgen_test)
  };

  let native_attr = if is_async { quote!(tokio::test(#tokio_args)) } else { quote!(test) };

  let expanded = quote! {
      #[cfg_attr(target_arch = "wasm32", #wasm_attr)]
      #[cfg_attr(not(target_arch = "wasm32"), #native_attr)]
      #input
  };

  TokenStream::from(expanded)
}
