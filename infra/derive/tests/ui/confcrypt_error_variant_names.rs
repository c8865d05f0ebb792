use confcrypt_derive::confcrypt_error;
use std::borrow::Cow;

#[confcrypt_error]
pub enum DemoError {
    #[error("Wrong key{}: {message}", format_context(.context))]
    WrongKey { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Destroyed")]
    State { message: Cow<'static, str> },
}

fn main() {
    let err = DemoError::WrongKey { message: "tag mismatch".into(), context: None };
    assert_eq!(err.variant_name(), "WrongKey");

    let err = DemoError::State { message: "gone".into() };
    assert_eq!(err.variant_name(), "State");
}
