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

//! # Price Attest Pallet
//!
//! ## Overview
//!
//! Verifies off-chain signed valuations of NFT collateral. A trusted
//! signer produces a `PriceAttestation` over the SCALE encoding of
//! `(magic, collection, items, amount, deadline, nonce)`; this pallet
//! checks the signer registry, the deadline and the signature, and
//! burns the nonce when the valuation feeds a state change.

#![cfg_attr(not(feature = "std"), no_std)]

pub use pallet::*;

pub mod weights;

#[cfg(test)]
mod mock;

#[frame_support::pallet]
pub mod pallet {
    use frame_support::{pallet_prelude::*, traits::UnixTime};
    use frame_system::pallet_prelude::*;
    use primitives::{AttestNonce, AttestedValuation, Balance, PriceAttestation, EMPTY_NONCE};
    use sp_runtime::traits::{IdentifyAccount, Verify};
    use sp_std::prelude::*;

    use crate::weights::WeightInfo;

    pub type AttestationOf<T> = PriceAttestation<
        <T as Config>::CollectionId,
        <T as Config>::ItemId,
        <T as frame_system::Config>::AccountId,
        <T as Config>::Signature,
    >;

    #[pallet::pallet]
    pub struct Pallet<T>(_);

    #[pallet::config]
    pub trait Config: frame_system::Config {
        type RuntimeEvent: From<Event<Self>>
            + IsType<<Self as frame_system::Config>::RuntimeEvent>;

        /// Attestation signature type.
        type Signature: Parameter + Verify<Signer = Self::Signer>;

        /// Signer identity matching the runtime account id.
        type Signer: IdentifyAccount<AccountId = Self::AccountId>;

        /// Collateral collection identifier bound into signed payloads.
        type CollectionId: Parameter + Copy;

        /// Collateral item identifier bound into signed payloads.
        type ItemId: Parameter + Copy;

        /// Domain separator mixed into every signed payload.
        #[pallet::constant]
        type AttestMagicNumber: Get<u16>;

        /// Unix time to evaluate attestation deadlines against.
        type UnixTime: UnixTime;

        /// The origin which can manage the signer and source registries.
        type UpdateOrigin: EnsureOrigin<Self::RuntimeOrigin>;

        /// Weight information
        type WeightInfo: WeightInfo;
    }

    #[pallet::error]
    pub enum Error<T> {
        /// Attestation signer is not in the trusted registry.
        UntrustedSigner,
        /// Attestation deadline has passed.
        DeadlineExceeded,
        /// Signature does not match the signed payload.
        InvalidSignature,
        /// Attestation covers no items.
        EmptyItemSet,
        /// State-changing consumption requires a non-zero nonce.
        MissingNonce,
        /// Nonce was already consumed by an earlier operation.
        NonceAlreadyUsed,
        /// Account is already registered.
        AlreadyRegistered,
        /// Account is not registered.
        NotRegistered,
    }

    #[pallet::event]
    #[pallet::generate_deposit(pub(super) fn deposit_event)]
    pub enum Event<T: Config> {
        /// Trusted signer added. \[signer\]
        SignerAdded(T::AccountId),
        /// Trusted signer removed. \[signer\]
        SignerRemoved(T::AccountId),
        /// Trusted valuation source added. \[source\]
        SourceAdded(T::AccountId),
        /// Trusted valuation source removed. \[source\]
        SourceRemoved(T::AccountId),
        /// An attestation nonce was consumed. \[signer, nonce, amount\]
        AttestationConsumed(T::AccountId, AttestNonce, Balance),
    }

    /// Accounts whose signatures are accepted on price attestations.
    #[pallet::storage]
    #[pallet::getter(fn trusted_signers)]
    pub type TrustedSigners<T: Config> =
        StorageMap<_, Blake2_128Concat, T::AccountId, (), OptionQuery>;

    /// Accounts allowed to relay read-only valuations without a live signature.
    #[pallet::storage]
    #[pallet::getter(fn trusted_sources)]
    pub type TrustedSources<T: Config> =
        StorageMap<_, Blake2_128Concat, T::AccountId, (), OptionQuery>;

    /// Nonces burnt by state-changing attestation consumption.
    #[pallet::storage]
    pub type ConsumedNonces<T: Config> =
        StorageMap<_, Blake2_128Concat, AttestNonce, (), OptionQuery>;

    #[pallet::call]
    impl<T: Config> Pallet<T> {
        /// Register an account as a trusted attestation signer.
        #[pallet::call_index(0)]
        #[pallet::weight(T::WeightInfo::add_signer())]
        pub fn add_signer(origin: OriginFor<T>, signer: T::AccountId) -> DispatchResult {
            T::UpdateOrigin::ensure_origin(origin)?;
            ensure!(
                !TrustedSigners::<T>::contains_key(&signer),
                Error::<T>::AlreadyRegistered
            );

            TrustedSigners::<T>::insert(&signer, ());
            Self::deposit_event(Event::<T>::SignerAdded(signer));
            Ok(())
        }

        /// Remove an account from the trusted signer registry.
        ///
        /// Attestations already consumed stay consumed; pending
        /// attestations by this signer stop verifying immediately.
        #[pallet::call_index(1)]
        #[pallet::weight(T::WeightInfo::remove_signer())]
        pub fn remove_signer(origin: OriginFor<T>, signer: T::AccountId) -> DispatchResult {
            T::UpdateOrigin::ensure_origin(origin)?;
            ensure!(
                TrustedSigners::<T>::contains_key(&signer),
                Error::<T>::NotRegistered
            );

            TrustedSigners::<T>::remove(&signer);
            Self::deposit_event(Event::<T>::SignerRemoved(signer));
            Ok(())
        }

        /// Register an account as a trusted valuation source.
        #[pallet::call_index(2)]
        #[pallet::weight(T::WeightInfo::add_source())]
        pub fn add_source(origin: OriginFor<T>, source: T::AccountId) -> DispatchResult {
            T::UpdateOrigin::ensure_origin(origin)?;
            ensure!(
                !TrustedSources::<T>::contains_key(&source),
                Error::<T>::AlreadyRegistered
            );

            TrustedSources::<T>::insert(&source, ());
            Self::deposit_event(Event::<T>::SourceAdded(source));
            Ok(())
        }

        /// Remove an account from the trusted source registry.
        #[pallet::call_index(3)]
        #[pallet::weight(T::WeightInfo::remove_source())]
        pub fn remove_source(origin: OriginFor<T>, source: T::AccountId) -> DispatchResult {
            T::UpdateOrigin::ensure_origin(origin)?;
            ensure!(
                TrustedSources::<T>::contains_key(&source),
                Error::<T>::NotRegistered
            );

            TrustedSources::<T>::remove(&source);
            Self::deposit_event(Event::<T>::SourceRemoved(source));
            Ok(())
        }
    }

    impl<T: Config> Pallet<T> {
        /// Whether `who` may relay read-only valuations.
        pub fn is_trusted_source(who: &T::AccountId) -> bool {
            TrustedSources::<T>::contains_key(who)
        }

        /// Check registry membership, deadline and signature. Leaves the
        /// nonce untouched.
        pub fn verify_attestation(attestation: &AttestationOf<T>) -> DispatchResult {
            ensure!(!attestation.items.is_empty(), Error::<T>::EmptyItemSet);
            ensure!(
                TrustedSigners::<T>::contains_key(&attestation.signer),
                Error::<T>::UntrustedSigner
            );

            let now = T::UnixTime::now().as_secs();
            ensure!(now <= attestation.deadline, Error::<T>::DeadlineExceeded);

            let payload = (
                T::AttestMagicNumber::get(),
                &attestation.collection,
                &attestation.items,
                attestation.amount,
                attestation.deadline,
                attestation.nonce,
            );
            ensure!(
                attestation
                    .signature
                    .verify(&payload.encode()[..], &attestation.signer),
                Error::<T>::InvalidSignature
            );

            Ok(())
        }
    }

    impl<T: Config> AttestedValuation<T::CollectionId, T::ItemId, T::AccountId, T::Signature>
        for Pallet<T>
    {
        fn attested_value(attestation: &AttestationOf<T>) -> Result<Balance, DispatchError> {
            Self::verify_attestation(attestation)?;
            Ok(attestation.amount)
        }

        fn consume_attestation(attestation: &AttestationOf<T>) -> Result<Balance, DispatchError> {
            ensure!(
                attestation.nonce != EMPTY_NONCE,
                Error::<T>::MissingNonce
            );
            ensure!(
                !ConsumedNonces::<T>::contains_key(attestation.nonce),
                Error::<T>::NonceAlreadyUsed
            );
            Self::verify_attestation(attestation)?;

            ConsumedNonces::<T>::insert(attestation.nonce, ());
            log::trace!(
                target: "price-attest::consume_attestation",
                "signer: {:?}, nonce: {:?}, amount: {:?}",
                &attestation.signer,
                &attestation.nonce,
                &attestation.amount,
            );
            Self::deposit_event(Event::<T>::AttestationConsumed(
                attestation.signer.clone(),
                attestation.nonce,
                attestation.amount,
            ));

            Ok(attestation.amount)
        }
    }
}
