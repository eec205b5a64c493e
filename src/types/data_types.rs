/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store bytes, and do not have any major "active" behavior.

use std::{
    fmt::{self, Debug, Display, Formatter},
    hash::Hash,
    ops::{Add, Sub},
};

use borsh::{BorshDeserialize, BorshSerialize};

/// 20-byte account address identifying a validator or any other chain participant.
///
/// Addresses are derived from secp256k1 public keys by
/// [`address_of`](super::crypto_primitives::address_of). Validator sets order their members by the
/// byte-wise ordering of this type.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct Address([u8; 20]);

impl Address {
    /// Create a new `Address` wrapping `bytes`.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// The all-zeroes address, standing in for "no address" (e.g., the proposer of the Genesis Block).
    pub const fn zero() -> Self {
        Self([0u8; 20])
    }

    /// Get the inner `[u8; 20]` value of this `Address`.
    pub const fn bytes(&self) -> [u8; 20] {
        self.0
    }

    /// Check whether this is the all-zeroes address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// 32-byte cryptographic hash.
///
/// # Choice of cryptographic hash function
///
/// Within Istanbul-rs, `CryptoHash`-es of blocks, headers, transactions and gossiped payloads are
/// always SHA256 hashes produced by [`CryptoHasher`](super::crypto_primitives::CryptoHasher).
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct CryptoHash([u8; 32]);

impl CryptoHash {
    /// Create a new `CryptoHash` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 32]` value of this `CryptoHash`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Display for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl Debug for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Number (height) of a block in the chain. Starts at 0 for the Genesis Block.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct BlockNumber(u64);

impl BlockNumber {
    /// Create a new `BlockNumber` with an `int` inner value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `BlockNumber`.
    pub const fn int(&self) -> u64 {
        self.0
    }

    /// Get the number of the parent of the block with this number. Saturates at the Genesis Block.
    pub fn parent(&self) -> BlockNumber {
        BlockNumber(self.0.saturating_sub(1))
    }

    /// Check whether this is the number of the Genesis Block.
    pub const fn is_genesis(&self) -> bool {
        self.0 == 0
    }
}

impl Display for BlockNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<u64> for BlockNumber {
    type Output = BlockNumber;
    fn add(self, rhs: u64) -> Self::Output {
        BlockNumber(self.0 + rhs)
    }
}

impl Sub<BlockNumber> for BlockNumber {
    type Output = u64;
    fn sub(self, rhs: BlockNumber) -> Self::Output {
        self.0 - rhs.0
    }
}

/// Number of blocks in an epoch. Validator set changes only take effect at the last block of an epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct EpochLength(u64);

impl EpochLength {
    /// Create a new `EpochLength` with an `int` inner value. An `int` of 0 is treated as 1.
    pub const fn new(int: u64) -> Self {
        if int == 0 {
            Self(1)
        } else {
            Self(int)
        }
    }

    /// Get the inner `u64` value of this `EpochLength`.
    pub const fn int(&self) -> u64 {
        self.0
    }

    /// Check whether the block with `number` is the last block of its epoch.
    pub const fn is_last_block_of_epoch(&self, number: BlockNumber) -> bool {
        number.int() % self.0 == 0
    }
}

/// 65-byte recoverable secp256k1 signature, laid out as `r || s || v`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct SignatureBytes([u8; 65]);

impl SignatureBytes {
    /// Length, in bytes, of every signature produced by Istanbul-rs.
    pub const LENGTH: usize = 65;

    /// Create a new `SignatureBytes` wrapping `bytes`.
    pub const fn new(bytes: [u8; 65]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 65]` value of this `SignatureBytes`.
    pub const fn bytes(&self) -> [u8; 65] {
        self.0
    }

    /// Get the inner value as a byte vector, the form in which seals are stored in extra-data.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl TryFrom<&[u8]> for SignatureBytes {
    type Error = std::array::TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self(<[u8; 65]>::try_from(value)?))
    }
}

impl Debug for SignatureBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SignatureBytes").field(&&self.0[..]).finish()
    }
}

/// Network endpoint of a node, in enode URL form (`enode://<node id>@<host>:<port>`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, BorshDeserialize, BorshSerialize)]
pub struct EnodeUrl(String);

impl EnodeUrl {
    /// Create a new `EnodeUrl` wrapping `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Get the URL as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EnodeUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Debug for EnodeUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

/// Consensus round number, used for proposer selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Round(u64);

impl Round {
    /// Create a new `Round` with an `int` inner value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `Round`.
    pub const fn int(&self) -> u64 {
        self.0
    }
}
