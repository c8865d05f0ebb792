use confcrypt_derive::confcrypt_error;

#[confcrypt_error]
pub enum DemoError {
    #[error("IO error: {source}")]
    Io {
        source: std::io::Error,
        context: Option<String>,
    },
}

fn main() {}
