// Copyright 2023 Pawn Finance Developer.
// This file is part of Pawn Finance.

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0

// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![cfg_attr(not(feature = "std"), no_std)]

use codec::{Decode, Encode};
use scale_info::TypeInfo;
use sp_runtime::{DispatchError, FixedU128, Permill, RuntimeDebug};
use sp_std::vec::Vec;

pub mod tokens;

/// Balance of an account.
pub type Balance = u128;

/// Signed version of Balance
pub type Amount = i128;

/// The fixed point number
pub type Rate = FixedU128;

/// The fixed point number, range from 0 to 1.
pub type Ratio = Permill;

pub type Price = FixedU128;

/// An instant in time, unix seconds.
pub type Timestamp = u64;

pub type CurrencyId = u32;

/// Sequential identifier of a loan, assigned at borrow time.
pub type LoanId = u64;

/// Replay-protection nonce carried by a price attestation.
pub type AttestNonce = [u8; 32];

pub const SECONDS_PER_YEAR: Timestamp = 365 * 24 * 60 * 60;

/// An all-zero nonce denotes "no replay protection requested" and is only
/// acceptable for read-only valuation queries.
pub const EMPTY_NONCE: AttestNonce = [0u8; 32];

/// A signed, time-bounded claim of the aggregate value of a set of
/// collateral items from one collection.
///
/// The signature covers the SCALE encoding of
/// `(magic, collection, items, amount, deadline, nonce)` where `magic` is
/// the verifier's domain separator.
#[derive(Encode, Decode, Clone, Eq, PartialEq, RuntimeDebug, TypeInfo)]
pub struct PriceAttestation<CollectionId, ItemId, AccountId, Signature> {
    pub collection: CollectionId,
    /// Ordered token-id list the price refers to.
    pub items: Vec<ItemId>,
    /// Aggregate price of the whole item set, in the pool asset.
    pub amount: Balance,
    /// Unix seconds after which the claim is stale.
    pub deadline: Timestamp,
    pub nonce: AttestNonce,
    pub signer: AccountId,
    pub signature: Signature,
}

/// The gate in front of every collateral-value-dependent decision.
///
/// Implemented by the price-attest pallet, consumed by the lending market.
pub trait AttestedValuation<CollectionId, ItemId, AccountId, Signature> {
    /// Validate the claim without consuming its nonce.
    ///
    /// Accepts an all-zero nonce; suitable for read-only valuations only.
    fn attested_value(
        attestation: &PriceAttestation<CollectionId, ItemId, AccountId, Signature>,
    ) -> Result<Balance, DispatchError>;

    /// Validate the claim and consume its nonce.
    ///
    /// State-mutating callers must use this so a claim is never replayed
    /// across two operations. Rejects the all-zero nonce.
    fn consume_attestation(
        attestation: &PriceAttestation<CollectionId, ItemId, AccountId, Signature>,
    ) -> Result<Balance, DispatchError>;
}
