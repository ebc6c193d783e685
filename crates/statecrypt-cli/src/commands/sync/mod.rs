mod decrypt;
mod encrypt;

pub use decrypt::handle_decrypt;
pub use encrypt::handle_encrypt;
