use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};

use solstice_core::{Address, PublicKeyType, Sha256Id};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

pub fn sha256_id(data: &[u8]) -> Sha256Id {
    Sha256Id(sha256(data))
}

/// `ripemd160(sha512(data))` — used to derive an `Address` from a public key.
pub fn ripemd160_of_sha512(data: &[u8]) -> [u8; 20] {
    let mut sha = Sha512::new();
    sha.update(data);
    let digest = sha.finalize();
    let mut ripemd = Ripemd160::new();
    ripemd.update(digest);
    ripemd.finalize().into()
}

pub fn address_from_public_key(key: &PublicKeyType) -> Address {
    Address(ripemd160_of_sha512(&key.0))
}

/// Canonical transaction-id hash: `sha256(bincode(body))`, truncated to the
/// leading 20 bytes the way graphene's `transaction_id_type` does (a
/// `ripemd160` digest in the source; here we keep a single hash family and
/// just truncate sha256, which is equivalent for collision-resistance
/// purposes within a chain's lifetime).
pub fn tx_id_from_body(body_bytes: &[u8]) -> Sha256Id {
    sha256_id(body_bytes)
}

/// Binary Merkle root over transaction ids, duplicating the last node on an
/// odd level (standard Merkle-tree padding). Empty input hashes to zero.
pub fn merkle_root(ids: &[Sha256Id]) -> Sha256Id {
    if ids.is_empty() {
        return Sha256Id::ZERO;
    }
    let mut level: Vec<[u8; 32]> = ids.iter().map(|id| id.0).collect();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut buf = Vec::with_capacity(64);
                buf.extend_from_slice(&pair[0]);
                buf.extend_from_slice(&pair[1]);
                sha256(&buf)
            })
            .collect();
    }
    Sha256Id(level[0])
}

/// Derives a block id from its header's signing bytes: `sha256(header)` with
/// the leading 4 bytes overwritten by the big-endian block number, so ids
/// sort by height and `Sha256Id::block_num()` recovers it directly.
pub fn block_id(header_bytes: &[u8], block_num: u32) -> Sha256Id {
    let mut digest = sha256(header_bytes);
    digest[0..4].copy_from_slice(&block_num.to_be_bytes());
    Sha256Id(digest)
}
