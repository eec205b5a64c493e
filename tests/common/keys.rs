use istanbul_rs::types::{
    crypto_primitives::SigningKey, data_types::Address, keypair::Keypair,
};
use rand_core::OsRng;

// Generate `n` fresh keypairs, sorted by address so that their order matches the order of a validator set.
pub(crate) fn keypairs(n: usize) -> Vec<Keypair> {
    let mut keypairs: Vec<Keypair> = (0..n)
        .map(|_| Keypair::new(SigningKey::random(&mut OsRng)))
        .collect();
    keypairs.sort_by_key(Keypair::address);
    keypairs
}

pub(crate) fn addresses(keypairs: &[Keypair]) -> Vec<Address> {
    keypairs.iter().map(Keypair::address).collect()
}
