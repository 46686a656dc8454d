use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{ToTokens, quote, quote_spanned};
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{FnArg, Ident, Item, LitStr, Pat, PatType, Token, Type, parse_macro_input};

enum ParamShape {
    Required,
    /// `Option<T>`, `bool` and plain `Vec<T>` parameters may be left out.
    Optional(proc_macro2::TokenStream),
    VarArgs,
    VarKwargs,
}

/// A proc macro applied to async functions that will create a type that implements the `Handler`
/// trait. The first parameter receives the event; every other parameter becomes part of the
/// handler's signature, under its own name, so that usage strings can refer to it:
///
/// ```ignore
/// #[handler]
/// async fn memo(event: &Event, action: String, text: Option<String>, #[varargs] rest: Vec<String>) -> anyhow::Result<()> {}
/// ```
///
/// becomes roughly...
///
/// ```ignore
/// struct memo_handler;
///
/// impl Handler for memo_handler {
///     fn signature(&self) -> &Signature {
///         // action, text=None, *rest
///     }
///
///     async fn call(&self, event: &Event, mut args: BoundArgs) -> anyhow::Result<Value> {
///         let action = args.take("action")?;
///         let text = args.take("text")?;
///         let rest = args.take_varargs("rest")?;
///         Ok(memo(event, action, text, rest).await?.into())
///     }
/// }
///
/// async fn memo(event: &Event, action: String, text: Option<String>, rest: Vec<String>) -> anyhow::Result<()> {}
/// ```
///
/// `Option<T>` parameters default to nothing, `bool` parameters to `false` and `Vec<T>` parameters
/// to an empty list. `#[varargs]` marks the parameter that collects surplus positional arguments
/// and `#[kwargs]` the `HashMap<String, Value>` that collects surplus named ones.
#[proc_macro_attribute]
pub fn handler(_attrs: TokenStream, func: TokenStream) -> TokenStream {
    let Item::Fn(mut item) = parse_macro_input!(func as syn::Item) else {
        panic!("#[handler] applied to non-function")
    };

    if item.sig.asyncness.is_none() {
        return quote_spanned!(item.sig.fn_token.span() => compile_error!("#[handler] functions must be async");)
            .into();
    }

    let fn_name = item.sig.ident.clone();
    let vis = item.vis.clone();
    let struct_name = Ident::new(&format!("{}_handler", item.sig.ident), Span::call_site());

    // the event comes first and is not part of the signature
    verify_has_event(&item.sig.inputs);

    let mut signature_calls = Vec::new();
    let mut take_idents = Vec::new();
    let mut take_exprs = Vec::new();
    let mut seen_varargs = false;
    let mut seen_kwargs = false;

    for (index, input) in item.sig.inputs.iter_mut().skip(1).enumerate() {
        let FnArg::Typed(PatType { attrs, pat, ty, .. }) = input else {
            panic!("#[handler] cannot have `self` arguments")
        };

        let Pat::Ident(pat_ident) = &**pat else {
            return quote_spanned!(pat.span() => compile_error!("#[handler] parameters must be plain identifiers");)
                .into();
        };
        let name = LitStr::new(&pat_ident.ident.to_string(), pat_ident.ident.span());

        let varargs = take_marker(attrs, "varargs");
        let kwargs = take_marker(attrs, "kwargs");

        let shape = match (varargs, kwargs) {
            (true, true) => {
                return quote_spanned!(ty.span() => compile_error!("a parameter cannot be both #[varargs] and #[kwargs]");)
                    .into();
            },
            (true, false) => ParamShape::VarArgs,
            (false, true) => ParamShape::VarKwargs,
            (false, false) => default_for(ty).map_or(ParamShape::Required, ParamShape::Optional),
        };

        let duplicate = match shape {
            ParamShape::VarArgs => std::mem::replace(&mut seen_varargs, true),
            ParamShape::VarKwargs => std::mem::replace(&mut seen_kwargs, true),
            _ => false,
        };
        if duplicate {
            return quote_spanned!(ty.span() => compile_error!("only one #[varargs] and one #[kwargs] parameter are allowed");)
                .into();
        }

        let ident = Ident::new(&format!("p{index}"), Span::call_site());
        match shape {
            ParamShape::Required => {
                signature_calls.push(quote!(.param(#name)));
                take_exprs.push(quote!(args.take(#name)?));
            },
            ParamShape::Optional(default) => {
                signature_calls.push(quote!(.optional(#name, #default)));
                take_exprs.push(quote!(args.take(#name)?));
            },
            ParamShape::VarArgs => {
                signature_calls.push(quote!(.varargs(#name)));
                take_exprs.push(quote!(args.take_varargs(#name)?));
            },
            ParamShape::VarKwargs => {
                signature_calls.push(quote!(.kwargs(#name)));
                take_exprs.push(quote!(args.take_kwargs()));
            },
        }
        take_idents.push(ident);
    }

    let following = quote! {
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, Default)]
        #vis struct #struct_name;

        #[::async_trait::async_trait]
        impl crate::command::Handler for #struct_name {
            fn signature(&self) -> &crate::command::signature::Signature {
                static SIGNATURE: ::std::sync::OnceLock<crate::command::signature::Signature> =
                    ::std::sync::OnceLock::new();
                SIGNATURE.get_or_init(|| crate::command::signature::Signature::new() #(#signature_calls)*)
            }

            #[allow(unused_mut)]
            async fn call(
                &self,
                event: &crate::command::Event,
                mut args: crate::command::signature::BoundArgs,
            ) -> ::anyhow::Result<crate::command::value::Value> {
                #(
                    let #take_idents = #take_exprs;
                )*

                let result = #fn_name(event, #(#take_idents),*).await?;
                Ok(crate::command::value::Value::from(result))
            }
        }
    };

    let mut output = item.into_token_stream();
    output.extend(following);

    output.into()
}

/// Removes a bare `#[name]` marker from a parameter's attributes, returning whether it was there.
fn take_marker(attrs: &mut Vec<syn::Attribute>, name: &str) -> bool {
    let before = attrs.len();
    attrs.retain(|attr| !attr.path().is_ident(name));
    attrs.len() != before
}

/// The default value for parameters that may be left out, if this type is one of them.
fn default_for(ty: &Type) -> Option<proc_macro2::TokenStream> {
    let Type::Path(path) = ty else {
        return None;
    };
    let seg = path.path.segments.last()?;

    if seg.ident == "Option" {
        Some(quote!(crate::command::value::Value::None))
    } else if seg.ident == "bool" {
        Some(quote!(false))
    } else if seg.ident == "Vec" {
        Some(quote!(crate::command::value::Value::List(::std::vec::Vec::new())))
    } else {
        None
    }
}

fn verify_has_event(inputs: &Punctuated<FnArg, Token![,]>) {
    if let Some(FnArg::Typed(PatType { ty, .. })) = inputs.first()
        && let Type::Reference(reference) = &**ty
        && let Type::Path(path) = &*reference.elem
        && let Some(seg) = path.path.segments.last()
        && seg.ident == "Event"
    {
        return;
    }

    panic!("first parameter of a #[handler] annotated function should be the `&Event`");
}
