use confcrypt_derive::confcrypt_error;

#[confcrypt_error]
pub enum DemoError {
    Io(std::io::Error),
}

fn main() {}
