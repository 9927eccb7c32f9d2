use proc_macro::TokenStream as TokenStream1;
use quote::ToTokens;
use syn::parse::Parser;
use syn::punctuated::Punctuated;
use syn::{self, Ident, Token};

/// This macro is added before a method of the `Game` struct in the impl block.
/// Use this macro to first check if the current game phase is one of the phases
/// in the attribute.
///
/// For example, `#[allowed_phase(PlaceBets)]` will make a method first check
/// if current game phase is `PlaceBets`, and `#[allowed_phase(DealerPeek, PlayHands)]`
/// accepts either phase. If not, the method returns `Error::WrongPhase`.
///
/// The method must return `crate::Result<_>` and the struct must hold its phase
/// in a field called `phase`.
#[proc_macro_attribute]
pub fn allowed_phase(attr: TokenStream1, item: TokenStream1) -> TokenStream1 {
    let mut ast: syn::ImplItemFn = match syn::parse(item) {
        Ok(ast) => ast,
        Err(err) => return err.to_compile_error().into(),
    };
    let phases = match Punctuated::<Ident, Token![,]>::parse_terminated.parse(attr) {
        Ok(phases) => phases,
        Err(err) => return err.to_compile_error().into(),
    };
    if phases.is_empty() {
        return syn::Error::new_spanned(&ast.sig.ident, "allowed_phase needs at least one phase")
            .to_compile_error()
            .into();
    }

    let function_name = ast.sig.ident.to_string();
    let phases = phases.iter();
    let early_return: syn::Stmt = syn::parse_quote! {
        if !matches!(self.phase, #(GamePhase::#phases)|*) {
            return Err(crate::Error::WrongPhase {
                operation: #function_name,
                phase: self.phase,
            });
        }
    };
    ast.block.stmts.insert(0, early_return);
    ast.into_token_stream().into()
}
