pub mod hash;
pub mod keypair;
pub mod sign;

pub use hash::{
    address_from_public_key, block_id, double_sha256, merkle_root, ripemd160_of_sha512, sha256,
    sha256_id, tx_id_from_body,
};
pub use keypair::KeyPair;
pub use sign::{recover_public_key, sign, verify, SignatureError, SolsticeSignature};
