// RSA Module - Main module file
// Software RSA primitives backing the bundled provider

pub mod bigint;
pub mod decrypt;
pub mod encrypt;
pub mod error;
pub mod keygen;
pub mod padding;

pub use decrypt::decrypt_block;
pub use encrypt::encrypt_block;
pub use error::RsaError;
pub use keygen::{generate_keypair, RsaKeyPair, RsaPrivateKey, RsaPublicKey};
pub use padding::{pad_pkcs1_v15, unpad_pkcs1_v15, MIN_PADDING_OVERHEAD};
