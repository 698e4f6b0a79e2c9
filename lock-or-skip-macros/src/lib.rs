use proc_macro::TokenStream;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input, Error, Expr, FnArg, Ident, ItemFn, LitStr, Pat, ReturnType, Signature,
    Token,
};

/// Guards an async function with a named non-blocking lock.
///
/// On each call, a key is derived and the matching lock is looked up in a
/// registry. If the lock is already held the call returns
/// `Outcome::Skipped` without running the function body; otherwise the body
/// runs under the lock and its value is returned in `Outcome::Completed`.
/// The function's return type `T` becomes `lock_or_skip::Outcome<T>`.
///
/// Arguments:
///
/// - `#[lock_or_skip]` — the key is the function's name, the same for every
///   call.
/// - `#[lock_or_skip("template")]` (or `key = "template"`) — the key is the
///   template rendered against the call's arguments: `{}` takes the next
///   parameter in declaration order, `{0}` a parameter by position, `{name}`
///   a parameter by name; `{{` and `}}` escape braces and `{name:spec}`
///   format specs pass through. `#[lock_or_skip("lock_work_{}")]` on
///   `async fn workwork(x: u32)` locks `"lock_work_3"` for `workwork(3)`.
/// - `registry = <expr>` — an expression evaluating to the `LockRegistry` to
///   use instead of `lock_or_skip::global()`.
#[proc_macro_attribute]
pub fn lock_or_skip(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as Args);
    let func = parse_macro_input!(item as ItemFn);
    expand(args, func)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

struct Args {
    template: Option<LitStr>,
    registry: Option<Expr>,
}

impl Parse for Args {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut template = None;
        let mut registry = None;
        if input.peek(LitStr) {
            template = Some(input.parse()?);
            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }
        while !input.is_empty() {
            let name: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            if name == "key" {
                template = Some(input.parse()?);
            } else if name == "registry" {
                registry = Some(input.parse()?);
            } else {
                return Err(Error::new(name.span(), "expected `key` or `registry`"));
            }
            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }
        Ok(Args { template, registry })
    }
}

fn expand(args: Args, func: ItemFn) -> syn::Result<proc_macro2::TokenStream> {
    if func.sig.asyncness.is_none() {
        return Err(Error::new_spanned(
            &func.sig.fn_token,
            "#[lock_or_skip] only supports async functions",
        ));
    }

    let key = match &args.template {
        Some(template) => key_from_template(template, &func.sig)?,
        None => {
            let name = func.sig.ident.to_string();
            quote! { ::std::string::String::from(#name) }
        }
    };
    let registry = match &args.registry {
        Some(expr) => quote! { #expr },
        None => quote! { ::lock_or_skip::global() },
    };

    let attrs = &func.attrs;
    let vis = &func.vis;
    let block = &func.block;
    let mut sig = func.sig.clone();
    let output = match &sig.output {
        ReturnType::Default => quote! { () },
        ReturnType::Type(_, ty) => quote! { #ty },
    };
    sig.output = syn::parse2(quote! { -> ::lock_or_skip::Outcome<#output> })?;

    Ok(quote! {
        #(#attrs)*
        #vis #sig {
            let __lock_or_skip_key = #key;
            (#registry)
                .run_or_skip(__lock_or_skip_key, async move #block)
                .await
        }
    })
}

/// Rewrites the key template into a `format!` call against the function's
/// parameters: positional placeholders are resolved to parameter names at
/// expansion time, named placeholders are left for `format!`'s implicit
/// capture.
fn key_from_template(
    template: &LitStr,
    sig: &Signature,
) -> syn::Result<proc_macro2::TokenStream> {
    let params: Vec<Option<Ident>> = sig
        .inputs
        .iter()
        .filter_map(|arg| match arg {
            FnArg::Typed(typed) => match &*typed.pat {
                Pat::Ident(pat) => Some(Some(pat.ident.clone())),
                _ => Some(None),
            },
            FnArg::Receiver(_) => None,
        })
        .collect();
    let positional = |index: usize| -> syn::Result<&Ident> {
        match params.get(index) {
            Some(Some(ident)) => Ok(ident),
            Some(None) => Err(Error::new(
                template.span(),
                format!("positional argument {index} in key template refers to a pattern parameter; use a named placeholder"),
            )),
            None => Err(Error::new(
                template.span(),
                format!(
                    "key template refers to positional argument {index} but the function takes {}",
                    params.len()
                ),
            )),
        }
    };

    let raw = template.value();
    let mut rewritten = String::with_capacity(raw.len());
    let mut substituted = false;
    let mut next_positional = 0usize;
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                rewritten.push_str("{{");
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                rewritten.push_str("}}");
            }
            '{' => {
                let mut placeholder = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    placeholder.push(inner);
                }
                if !closed {
                    return Err(Error::new(
                        template.span(),
                        "unterminated `{` in key template",
                    ));
                }
                let (name, spec) = match placeholder.split_once(':') {
                    Some((name, spec)) => (name, Some(spec)),
                    None => (placeholder.as_str(), None),
                };
                let ident = if name.is_empty() {
                    let index = next_positional;
                    next_positional += 1;
                    positional(index)?.clone()
                } else if let Ok(index) = name.parse::<usize>() {
                    positional(index)?.clone()
                } else {
                    syn::parse_str::<Ident>(name).map_err(|_| {
                        Error::new(
                            template.span(),
                            format!("`{name}` is not a valid placeholder name"),
                        )
                    })?
                };
                substituted = true;
                rewritten.push('{');
                rewritten.push_str(&ident.to_string());
                if let Some(spec) = spec {
                    rewritten.push(':');
                    rewritten.push_str(spec);
                }
                rewritten.push('}');
            }
            '}' => {
                return Err(Error::new(
                    template.span(),
                    "unmatched `}` in key template",
                ));
            }
            other => rewritten.push(other),
        }
    }

    let lit = LitStr::new(&rewritten, template.span());
    if substituted {
        Ok(quote! { ::std::format!(#lit) })
    } else {
        Ok(quote! { ::std::string::String::from(#lit) })
    }
}
