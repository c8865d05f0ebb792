use confcrypt_derive::confcrypt_error;

#[confcrypt_error]
pub enum DemoError {
    #[error("IO error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
}

fn main() {}
