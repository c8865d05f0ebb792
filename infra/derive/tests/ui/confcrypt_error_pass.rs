use confcrypt_derive::confcrypt_error;
use std::borrow::Cow;

#[confcrypt_error]
pub enum DemoError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Rejected{}: {message}", format_context(.context))]
    Rejected { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn read() -> Result<(), DemoError> {
    Err::<(), _>(std::io::Error::other("disk")).context("Reading salt file")
}

fn main() {
    let err = read().unwrap_err();
    assert!(err.to_string().contains("(Reading salt file)"));

    let converted: DemoError = std::io::Error::other("disk").into();
    assert!(matches!(converted, DemoError::Io { context: None, .. }));
}
