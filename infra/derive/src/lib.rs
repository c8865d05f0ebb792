#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the `confcrypt` crates.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! confcrypt-derive = { path = "../infra/derive" }
//! thiserror = "2"
//! ```
//!
//! See the macro docstring for an example; it is `ignore`d to avoid compiling in this crate.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Attribute macro for the error enums of the workspace.
///
/// Turns a plain enum into an error type with context support, so every crate reports
/// failures the same way.
///
/// # Features
///
/// * **Automatic Derives**: Injects `#[derive(Debug, thiserror::Error)]` when missing.
/// * **Context Support**: Generates a companion `...Ext` trait that adds `.context()`
///   to `Result<T, Self>` and to results of every wrapped upstream error.
/// * **Conversions**: Implements `From<T>` for variants containing a `source` field
///   (or a field marked `#[source]`/`#[from]`), enabling the `?` operator.
/// * **Variant Names**: Generates `variant_name()`, a stable `&'static str` used as a
///   structured logging field.
///
/// # Requirements
///
/// 1. The macro must be applied to an **enum**.
/// 2. Variants that support context must include a `context: Option<Cow<'static, str>>` field.
/// 3. Variants wrapping external errors must also carry the `context` field.
/// 4. Tuple or unit variants are rejected.
///
/// # Example
///
/// ```rust,ignore
/// use confcrypt_derive::confcrypt_error;
/// use std::borrow::Cow;
///
/// #[confcrypt_error]
/// pub enum CodecError {
///     #[error("Base64 error{}: {source}", format_context(.context))]
///     Base64 { source: base64::DecodeError, context: Option<Cow<'static, str>> },
///
///     #[error("Rejected value{}: {message}", format_context(.context))]
///     Rejected { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn decode(raw: &str) -> Result<Vec<u8>, CodecError> {
///     STANDARD.decode(raw).context("Decoding stored value")
/// }
/// ```
#[proc_macro_attribute]
pub fn confcrypt_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}
