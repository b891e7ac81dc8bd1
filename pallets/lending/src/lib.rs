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

//! # Lending pallet
//!
//! ## Overview
//!
//! Pool-based NFT-collateralized lending. Depositors supply a fungible
//! asset to a per-(collection, asset) vault and receive proportional
//! shares; borrowers lock collection items to draw on the pooled
//! liquidity at a rate snapshotted from the utilization-driven curve.
//! Undercollateralized loans, established by a fresh signed valuation,
//! resolve through a timed ascending-bid auction.

#![cfg_attr(not(feature = "std"), no_std)]

pub use crate::rate_model::*;

use frame_support::{
    log,
    pallet_prelude::*,
    require_transactional,
    traits::{
        tokens::{
            fungibles::{Inspect, Mutate, Transfer},
            nonfungibles::{Inspect as NftInspect, Transfer as NftTransfer},
        },
        UnixTime,
    },
    transactional, PalletId,
};
use frame_system::pallet_prelude::*;
pub use pallet::*;
use primitives::{
    AttestedValuation, Balance, CurrencyId, LoanId, PriceAttestation, Rate, Ratio, Timestamp,
};
use sp_runtime::{
    traits::{AccountIdConversion, One, Saturating, Zero},
    ArithmeticError, DispatchError,
};
use sp_std::{result::Result, vec::Vec};

pub use types::{Auction, CollectionConfig, Loan, LoanState, Pool, PoolConfig};
pub use weights::WeightInfo;

#[cfg(test)]
mod mock;

mod interest;
mod rate_model;
mod types;

pub mod weights;

pub type LoanOf<T> = Loan<
    <T as frame_system::Config>::AccountId,
    <T as Config>::CollectionId,
    <T as Config>::ItemId,
>;
pub type AuctionOf<T> = Auction<<T as frame_system::Config>::AccountId>;
pub type AttestationOf<T> = PriceAttestation<
    <T as Config>::CollectionId,
    <T as Config>::ItemId,
    <T as frame_system::Config>::AccountId,
    <T as Config>::Signature,
>;

#[frame_support::pallet]
pub mod pallet {

    use super::*;

    #[pallet::config]
    pub trait Config: frame_system::Config {
        type RuntimeEvent: From<Event<Self>>
            + IsType<<Self as frame_system::Config>::RuntimeEvent>;

        /// Fungible assets for pool liquidity, disbursement and bid escrow.
        type Assets: Transfer<Self::AccountId, AssetId = CurrencyId, Balance = Balance>
            + Inspect<Self::AccountId, AssetId = CurrencyId, Balance = Balance>
            + Mutate<Self::AccountId, AssetId = CurrencyId, Balance = Balance>;

        /// Collateral collection identifier.
        type CollectionId: Parameter + Copy;

        /// Collateral item identifier.
        type ItemId: Parameter + Copy + Ord;

        /// The provider holding collateral items in custody.
        type Collateral: NftInspect<
                Self::AccountId,
                CollectionId = Self::CollectionId,
                ItemId = Self::ItemId,
            > + NftTransfer<Self::AccountId>;

        /// Attestation signature type, forwarded to the valuation gate.
        type Signature: Parameter;

        /// Gate in front of every collateral-value-dependent decision.
        type Valuations: AttestedValuation<
            Self::CollectionId,
            Self::ItemId,
            Self::AccountId,
            Self::Signature,
        >;

        /// The market's module id, keeps pool liquidity, collateral custody
        /// and bid escrow.
        #[pallet::constant]
        type PalletId: Get<PalletId>;

        /// The origin which can manage rate models, collections and pools.
        type UpdateOrigin: EnsureOrigin<Self::RuntimeOrigin>;

        /// Unix time
        type UnixTime: UnixTime;

        /// Auction length in seconds, first bid to claimability. The clock
        /// never restarts.
        #[pallet::constant]
        type AuctionDuration: Get<Timestamp>;

        /// Interest checkpoint window in seconds.
        #[pallet::constant]
        type CheckpointWindow: Get<Timestamp>;

        /// First-deposit floor of an empty pool, guards the share price
        /// against near-zero-deposit manipulation.
        #[pallet::constant]
        type MinimumDeposit: Get<Balance>;

        /// Most collateral items one loan may lock.
        #[pallet::constant]
        type MaxCollateralItems: Get<u32>;

        /// Weight information for extrinsics in this pallet.
        type WeightInfo: WeightInfo;
    }

    #[pallet::error]
    pub enum Error<T> {
        /// Amount must be non-zero
        ZeroAmount,
        /// Collateral item set is empty
        EmptyItemSet,
        /// Collateral item set contains duplicates
        DuplicateItems,
        /// Collateral item set exceeds the per-loan maximum
        TooManyItems,
        /// No rate model registered for this asset
        UnsupportedAsset,
        /// No risk parameters registered for this collection
        UnsupportedCollection,
        /// Rate model parameters out of bounds
        InvalidRateModel,
        /// Caller does not own the loan
        NotLoanOwner,
        /// Caller does not own a collateral item
        NotItemOwner,
        /// Requested principal exceeds the attested value times max LTV
        InsufficientCollateral,
        /// Borrow would push utilization above the pool ceiling
        UtilizationCapExceeded,
        /// Deposit would push total assets above the supply cap
        SupplyCapExceeded,
        /// Not enough idle liquidity in the pool
        InsufficientLiquidity,
        /// Caller's shares do not cover the withdrawal
        InsufficientDeposit,
        /// Debt does not exceed the liquidation threshold
        MaxDebtNotExceeded,
        /// No loan under this id
        LoanNotFound,
        /// Loan is not in a state that permits this operation
        InvalidLoanState,
        /// Collateral item is already locked under another loan
        CollateralAlreadyLocked,
        /// Bid below the floor or not above the current max bid
        BidTooLow,
        /// Auction window has closed for new bids
        AuctionExpired,
        /// Auction window is still open
        AuctionNotFinished,
        /// Opening bid requires a fresh attestation
        AttestationRequired,
        /// Attestation covers a different collection or item set
        AttestationMismatch,
        /// Settling an auctioned loan requires debt plus auctioneer fee
        InsufficientRepay,
        /// No pool for this (collection, asset) pair
        PoolNotFound,
        /// Pool already exists
        PoolAlreadyExists,
        /// Pool is paused for new borrowing
        PoolPaused,
        /// First deposit below the minimum floor
        BelowMinimumDeposit,
        /// Reentrant call into the market
        ReentrantCall,
    }

    #[pallet::event]
    #[pallet::generate_deposit(pub (crate) fn deposit_event)]
    pub enum Event<T: Config> {
        /// Rate model registered for an asset
        /// [asset_id]
        AssetRegistered(CurrencyId),
        /// Rate model removed for an asset
        /// [asset_id]
        AssetDeregistered(CurrencyId),
        /// Collection risk parameters set
        /// [collection, max_ltv, liquidation_threshold]
        CollectionSet(T::CollectionId, Ratio, Ratio),
        /// Collection risk parameters removed
        /// [collection]
        CollectionRemoved(T::CollectionId),
        /// New pool created
        /// [collection, asset_id]
        PoolCreated(T::CollectionId, CurrencyId),
        /// Pool configuration replaced
        /// [collection, asset_id]
        PoolConfigUpdated(T::CollectionId, CurrencyId),
        /// Pool pause flag set
        /// [collection, asset_id, paused]
        PoolPausedSet(T::CollectionId, CurrencyId, bool),
        /// Liquidity deposited
        /// [sender, collection, asset_id, amount, shares_minted]
        Deposited(T::AccountId, T::CollectionId, CurrencyId, Balance, Balance),
        /// Liquidity withdrawn
        /// [sender, collection, asset_id, amount, shares_burned]
        Withdrawn(T::AccountId, T::CollectionId, CurrencyId, Balance, Balance),
        /// Loan created and funds disbursed
        /// [borrower, loan_id, collection, asset_id, amount]
        Borrowed(T::AccountId, LoanId, T::CollectionId, CurrencyId, Balance),
        /// Debt repaid
        /// [borrower, loan_id, amount_applied, remaining_debt]
        Repaid(T::AccountId, LoanId, Balance, Balance),
        /// Loan fully repaid, collateral released
        /// [borrower, loan_id]
        LoanClosed(T::AccountId, LoanId),
        /// Liquidation auction opened by its first bid
        /// [loan_id, auctioneer, bid]
        AuctionStarted(LoanId, T::AccountId, Balance),
        /// A higher bid replaced the previous one
        /// [loan_id, bidder, bid]
        BidPlaced(LoanId, T::AccountId, Balance),
        /// Auction cancelled by full settlement before claim
        /// [loan_id, auctioneer, auctioneer_fee]
        AuctionCancelled(LoanId, T::AccountId, Balance),
        /// Auction claimed, collateral to the winner
        /// [loan_id, winner, bid, surplus_to_borrower]
        Liquidated(LoanId, T::AccountId, Balance, Balance),
    }

    /// Interest rate model per supported underlying asset.
    #[pallet::storage]
    #[pallet::getter(fn rate_models)]
    pub type RateModels<T: Config> =
        StorageMap<_, Blake2_128Concat, CurrencyId, InterestRateModel, OptionQuery>;

    /// Risk parameters per collateral collection.
    #[pallet::storage]
    #[pallet::getter(fn collections)]
    pub type Collections<T: Config> =
        StorageMap<_, Blake2_128Concat, T::CollectionId, CollectionConfig, OptionQuery>;

    /// Liquidity pools, one per (collection, asset) pair.
    #[pallet::storage]
    #[pallet::getter(fn pools)]
    pub type Pools<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat,
        T::CollectionId,
        Blake2_128Concat,
        CurrencyId,
        Pool,
        OptionQuery,
    >;

    /// Pool shares held per account.
    #[pallet::storage]
    #[pallet::getter(fn pool_shares)]
    pub type PoolShares<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat,
        (T::CollectionId, CurrencyId),
        Blake2_128Concat,
        T::AccountId,
        Balance,
        ValueQuery,
    >;

    /// The loan ledger. Terminal records are retained.
    #[pallet::storage]
    #[pallet::getter(fn loans)]
    pub type Loans<T: Config> = StorageMap<_, Blake2_128Concat, LoanId, LoanOf<T>, OptionQuery>;

    /// Next loan id, monotonically increasing.
    #[pallet::storage]
    #[pallet::getter(fn next_loan_id)]
    pub type NextLoanId<T: Config> = StorageValue<_, LoanId, ValueQuery>;

    /// Which open loan holds a collateral item. An item is never locked
    /// under two loans at once.
    #[pallet::storage]
    #[pallet::getter(fn collateral_locks)]
    pub type CollateralLocks<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat,
        T::CollectionId,
        Blake2_128Concat,
        T::ItemId,
        LoanId,
        OptionQuery,
    >;

    /// Instantaneous utilization per pool, refreshed on every state change.
    #[pallet::storage]
    #[pallet::getter(fn utilization_ratio)]
    pub type UtilizationRatio<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat,
        T::CollectionId,
        Blake2_128Concat,
        CurrencyId,
        Ratio,
        ValueQuery,
    >;

    /// Instantaneous borrow rate per pool.
    #[pallet::storage]
    #[pallet::getter(fn borrow_rate)]
    pub type BorrowRate<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat,
        T::CollectionId,
        Blake2_128Concat,
        CurrencyId,
        Rate,
        ValueQuery,
    >;

    /// Instantaneous supply rate per pool.
    #[pallet::storage]
    #[pallet::getter(fn supply_rate)]
    pub type SupplyRate<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat,
        T::CollectionId,
        Blake2_128Concat,
        CurrencyId,
        Rate,
        ValueQuery,
    >;

    /// In-progress flag around every market entry point. Reentry through
    /// asset-transfer hooks aborts with `ReentrantCall`.
    #[pallet::storage]
    pub type MarketLock<T: Config> = StorageValue<_, bool, ValueQuery>;

    #[pallet::pallet]
    #[pallet::without_storage_info]
    pub struct Pallet<T>(PhantomData<T>);

    #[pallet::call]
    impl<T: Config> Pallet<T> {
        /// Register (or replace) the rate model of an underlying asset.
        ///
        /// - `asset_id`: the underlying currency
        /// - `model`: kinked rate curve parameters
        #[pallet::call_index(0)]
        #[pallet::weight(T::WeightInfo::register_asset())]
        #[transactional]
        pub fn register_asset(
            origin: OriginFor<T>,
            asset_id: CurrencyId,
            model: InterestRateModel,
        ) -> DispatchResult {
            T::UpdateOrigin::ensure_origin(origin)?;
            ensure!(model.check_model(), Error::<T>::InvalidRateModel);

            RateModels::<T>::insert(asset_id, model);
            Self::deposit_event(Event::<T>::AssetRegistered(asset_id));
            Ok(())
        }

        /// Remove an asset's rate model. Blocks new pools and new borrows
        /// in that asset; existing loans stay repayable through their rate
        /// snapshots.
        #[pallet::call_index(1)]
        #[pallet::weight(T::WeightInfo::deregister_asset())]
        #[transactional]
        pub fn deregister_asset(origin: OriginFor<T>, asset_id: CurrencyId) -> DispatchResult {
            T::UpdateOrigin::ensure_origin(origin)?;
            ensure!(
                RateModels::<T>::contains_key(asset_id),
                Error::<T>::UnsupportedAsset
            );

            RateModels::<T>::remove(asset_id);
            Self::deposit_event(Event::<T>::AssetDeregistered(asset_id));
            Ok(())
        }

        /// Set (or replace) the risk parameters of a collateral collection.
        #[pallet::call_index(2)]
        #[pallet::weight(T::WeightInfo::set_collection())]
        #[transactional]
        pub fn set_collection(
            origin: OriginFor<T>,
            collection: T::CollectionId,
            config: CollectionConfig,
        ) -> DispatchResult {
            T::UpdateOrigin::ensure_origin(origin)?;

            Collections::<T>::insert(collection, config);
            Self::deposit_event(Event::<T>::CollectionSet(
                collection,
                config.max_ltv,
                config.liquidation_threshold,
            ));
            Ok(())
        }

        /// Remove a collection's risk parameters. Blocks new borrows and
        /// new auctions against it.
        #[pallet::call_index(3)]
        #[pallet::weight(T::WeightInfo::remove_collection())]
        #[transactional]
        pub fn remove_collection(
            origin: OriginFor<T>,
            collection: T::CollectionId,
        ) -> DispatchResult {
            T::UpdateOrigin::ensure_origin(origin)?;
            ensure!(
                Collections::<T>::contains_key(collection),
                Error::<T>::UnsupportedCollection
            );

            Collections::<T>::remove(collection);
            Self::deposit_event(Event::<T>::CollectionRemoved(collection));
            Ok(())
        }

        /// Create a pool for a (collection, asset) pair. Requires a
        /// registered rate model and collection parameters.
        #[pallet::call_index(4)]
        #[pallet::weight(T::WeightInfo::create_pool())]
        #[transactional]
        pub fn create_pool(
            origin: OriginFor<T>,
            collection: T::CollectionId,
            asset_id: CurrencyId,
            config: PoolConfig,
        ) -> DispatchResult {
            T::UpdateOrigin::ensure_origin(origin)?;
            ensure!(
                RateModels::<T>::contains_key(asset_id),
                Error::<T>::UnsupportedAsset
            );
            ensure!(
                Collections::<T>::contains_key(collection),
                Error::<T>::UnsupportedCollection
            );
            ensure!(
                !Pools::<T>::contains_key(collection, asset_id),
                Error::<T>::PoolAlreadyExists
            );

            let pool = Pool::new(config);
            Pools::<T>::insert(collection, asset_id, pool);
            Self::refresh_pool_rates(collection, asset_id, &pool)?;

            Self::deposit_event(Event::<T>::PoolCreated(collection, asset_id));
            Ok(())
        }

        /// Replace a pool's configuration.
        #[pallet::call_index(5)]
        #[pallet::weight(T::WeightInfo::update_pool_config())]
        #[transactional]
        pub fn update_pool_config(
            origin: OriginFor<T>,
            collection: T::CollectionId,
            asset_id: CurrencyId,
            config: PoolConfig,
        ) -> DispatchResult {
            T::UpdateOrigin::ensure_origin(origin)?;
            Pools::<T>::try_mutate(collection, asset_id, |maybe_pool| -> DispatchResult {
                let pool = maybe_pool.as_mut().ok_or(Error::<T>::PoolNotFound)?;
                pool.config = config;
                Ok(())
            })?;

            Self::deposit_event(Event::<T>::PoolConfigUpdated(collection, asset_id));
            Ok(())
        }

        /// Pause or unpause new borrowing in a pool. Deposits, withdrawals
        /// and repayments stay open so users can always exit.
        #[pallet::call_index(6)]
        #[pallet::weight(T::WeightInfo::set_pool_paused())]
        #[transactional]
        pub fn set_pool_paused(
            origin: OriginFor<T>,
            collection: T::CollectionId,
            asset_id: CurrencyId,
            paused: bool,
        ) -> DispatchResult {
            T::UpdateOrigin::ensure_origin(origin)?;
            Pools::<T>::try_mutate(collection, asset_id, |maybe_pool| -> DispatchResult {
                let pool = maybe_pool.as_mut().ok_or(Error::<T>::PoolNotFound)?;
                pool.paused = paused;
                Ok(())
            })?;

            Self::deposit_event(Event::<T>::PoolPausedSet(collection, asset_id, paused));
            Ok(())
        }

        /// Supply liquidity to a pool in exchange for shares at the
        /// current exchange rate.
        ///
        /// - `amount`: the amount to be deposited.
        #[pallet::call_index(7)]
        #[pallet::weight(T::WeightInfo::deposit())]
        #[transactional]
        pub fn deposit(
            origin: OriginFor<T>,
            collection: T::CollectionId,
            asset_id: CurrencyId,
            amount: Balance,
        ) -> DispatchResult {
            let who = ensure_signed(origin)?;
            Self::with_market_lock(|| Self::do_deposit(&who, collection, asset_id, amount))
        }

        /// Redeem idle pool liquidity, burning shares pro rata.
        ///
        /// - `amount`: the underlying amount to be withdrawn.
        #[pallet::call_index(8)]
        #[pallet::weight(T::WeightInfo::withdraw())]
        #[transactional]
        pub fn withdraw(
            origin: OriginFor<T>,
            collection: T::CollectionId,
            asset_id: CurrencyId,
            amount: Balance,
        ) -> DispatchResult {
            let who = ensure_signed(origin)?;
            Self::with_market_lock(|| Self::do_withdraw(&who, collection, asset_id, amount))
        }

        /// Lock collateral items and draw on pool liquidity.
        ///
        /// The attestation must cover exactly `(collection, items)`, carry
        /// a non-zero nonce and be signed by a trusted signer; it is
        /// consumed here and cannot be replayed.
        #[pallet::call_index(9)]
        #[pallet::weight(T::WeightInfo::borrow())]
        #[transactional]
        pub fn borrow(
            origin: OriginFor<T>,
            collection: T::CollectionId,
            asset_id: CurrencyId,
            amount: Balance,
            items: Vec<T::ItemId>,
            attestation: AttestationOf<T>,
        ) -> DispatchResult {
            let who = ensure_signed(origin)?;
            Self::with_market_lock(|| {
                Self::do_borrow(&who, collection, asset_id, amount, items, attestation)
            })
        }

        /// Repay a loan's debt, owner only.
        ///
        /// On an `Active` loan the amount is capped at current debt; full
        /// repayment releases the collateral. On an `Auctioned` loan only
        /// full settlement of debt plus the auctioneer fee is accepted; it
        /// cancels the auction and refunds the escrowed bid.
        #[pallet::call_index(10)]
        #[pallet::weight(T::WeightInfo::repay())]
        #[transactional]
        pub fn repay(origin: OriginFor<T>, loan_id: LoanId, amount: Balance) -> DispatchResult {
            let who = ensure_signed(origin)?;
            Self::with_market_lock(|| Self::do_repay(&who, loan_id, amount))
        }

        /// Bid on a loan's liquidation.
        ///
        /// The first bid opens the auction: it requires a fresh attestation
        /// showing debt above the liquidation threshold and must cover the
        /// bid floor; the bidder becomes the auctioneer. Later bids must
        /// strictly exceed the current max bid before the window closes.
        #[pallet::call_index(11)]
        #[pallet::weight(T::WeightInfo::bid())]
        #[transactional]
        pub fn bid(
            origin: OriginFor<T>,
            loan_id: LoanId,
            amount: Balance,
            attestation: Option<AttestationOf<T>>,
        ) -> DispatchResult {
            let who = ensure_signed(origin)?;
            Self::with_market_lock(|| Self::do_bid(&who, loan_id, amount, attestation))
        }

        /// Settle a finished auction. The escrowed winning bid pays, in
        /// order: the auctioneer fee, then debt plus liquidation fee to
        /// the pool, then any surplus to the borrower; a bid that cannot
        /// cover everything shorts the later recipients. Collateral goes
        /// to the highest bidder. Any signer may call.
        #[pallet::call_index(12)]
        #[pallet::weight(T::WeightInfo::claim())]
        #[transactional]
        pub fn claim(origin: OriginFor<T>, loan_id: LoanId) -> DispatchResult {
            ensure_signed(origin)?;
            Self::with_market_lock(|| Self::do_claim(loan_id))
        }
    }
}

impl<T: Config> Pallet<T> {
    /// Custody account for pool liquidity, collateral and bid escrow.
    pub fn account_id() -> T::AccountId {
        T::PalletId::get().into_account_truncating()
    }

    /// Run `f` under the market's single-operation lock.
    fn with_market_lock(f: impl FnOnce() -> DispatchResult) -> DispatchResult {
        ensure!(!MarketLock::<T>::get(), Error::<T>::ReentrantCall);
        MarketLock::<T>::put(true);
        let result = f();
        MarketLock::<T>::kill();
        result
    }

    #[require_transactional]
    fn do_deposit(
        who: &T::AccountId,
        collection: T::CollectionId,
        asset_id: CurrencyId,
        amount: Balance,
    ) -> DispatchResult {
        ensure!(!amount.is_zero(), Error::<T>::ZeroAmount);
        let mut pool = Self::pools(collection, asset_id).ok_or(Error::<T>::PoolNotFound)?;

        let total_assets = pool.total_assets().ok_or(ArithmeticError::Overflow)?;
        let new_total_assets = total_assets
            .checked_add(amount)
            .ok_or(ArithmeticError::Overflow)?;
        ensure!(
            new_total_assets <= pool.config.supply_cap,
            Error::<T>::SupplyCapExceeded
        );

        let shares = if pool.total_shares.is_zero() {
            ensure!(
                amount >= T::MinimumDeposit::get(),
                Error::<T>::BelowMinimumDeposit
            );
            amount
        } else {
            let shares = Self::calc_shares_to_mint(amount, pool.total_shares, total_assets)?;
            // Dust that rounds to zero shares would be a donation to the
            // existing shareholders.
            ensure!(!shares.is_zero(), Error::<T>::ZeroAmount);
            shares
        };

        T::Assets::transfer(asset_id, who, &Self::account_id(), amount, false)?;

        pool.total_cash = pool
            .total_cash
            .checked_add(amount)
            .ok_or(ArithmeticError::Overflow)?;
        pool.total_shares = pool
            .total_shares
            .checked_add(shares)
            .ok_or(ArithmeticError::Overflow)?;
        PoolShares::<T>::try_mutate((collection, asset_id), who, |balance| -> DispatchResult {
            *balance = balance
                .checked_add(shares)
                .ok_or(ArithmeticError::Overflow)?;
            Ok(())
        })?;
        Pools::<T>::insert(collection, asset_id, pool);
        Self::refresh_pool_rates(collection, asset_id, &pool)?;

        log::trace!(
            target: "lending::deposit",
            "who: {:?}, asset: {:?}, amount: {:?}, shares: {:?}",
            who,
            &asset_id,
            &amount,
            &shares,
        );
        Self::deposit_event(Event::<T>::Deposited(
            who.clone(),
            collection,
            asset_id,
            amount,
            shares,
        ));
        Ok(())
    }

    #[require_transactional]
    fn do_withdraw(
        who: &T::AccountId,
        collection: T::CollectionId,
        asset_id: CurrencyId,
        amount: Balance,
    ) -> DispatchResult {
        ensure!(!amount.is_zero(), Error::<T>::ZeroAmount);
        let mut pool = Self::pools(collection, asset_id).ok_or(Error::<T>::PoolNotFound)?;
        ensure!(
            amount <= pool.total_cash,
            Error::<T>::InsufficientLiquidity
        );

        let total_assets = pool.total_assets().ok_or(ArithmeticError::Overflow)?;
        let shares = Self::calc_shares_to_burn(amount, pool.total_shares, total_assets)?;
        PoolShares::<T>::try_mutate((collection, asset_id), who, |balance| -> DispatchResult {
            *balance = balance
                .checked_sub(shares)
                .ok_or(Error::<T>::InsufficientDeposit)?;
            Ok(())
        })?;

        pool.total_cash = pool
            .total_cash
            .checked_sub(amount)
            .ok_or(ArithmeticError::Underflow)?;
        pool.total_shares = pool
            .total_shares
            .checked_sub(shares)
            .ok_or(ArithmeticError::Underflow)?;
        T::Assets::transfer(asset_id, &Self::account_id(), who, amount, false)?;
        Pools::<T>::insert(collection, asset_id, pool);
        Self::refresh_pool_rates(collection, asset_id, &pool)?;

        log::trace!(
            target: "lending::withdraw",
            "who: {:?}, asset: {:?}, amount: {:?}, shares: {:?}",
            who,
            &asset_id,
            &amount,
            &shares,
        );
        Self::deposit_event(Event::<T>::Withdrawn(
            who.clone(),
            collection,
            asset_id,
            amount,
            shares,
        ));
        Ok(())
    }

    #[require_transactional]
    fn do_borrow(
        who: &T::AccountId,
        collection: T::CollectionId,
        asset_id: CurrencyId,
        amount: Balance,
        items: Vec<T::ItemId>,
        attestation: AttestationOf<T>,
    ) -> DispatchResult {
        ensure!(!amount.is_zero(), Error::<T>::ZeroAmount);
        ensure!(!items.is_empty(), Error::<T>::EmptyItemSet);
        ensure!(
            items.len() <= T::MaxCollateralItems::get() as usize,
            Error::<T>::TooManyItems
        );
        let mut deduped = items.clone();
        deduped.sort();
        deduped.dedup();
        ensure!(deduped.len() == items.len(), Error::<T>::DuplicateItems);

        let mut pool = Self::pools(collection, asset_id).ok_or(Error::<T>::PoolNotFound)?;
        ensure!(!pool.paused, Error::<T>::PoolPaused);
        ensure!(
            RateModels::<T>::contains_key(asset_id),
            Error::<T>::UnsupportedAsset
        );
        let collection_config =
            Self::collections(collection).ok_or(Error::<T>::UnsupportedCollection)?;

        ensure!(
            attestation.collection == collection && attestation.items == items,
            Error::<T>::AttestationMismatch
        );
        let value = T::Valuations::consume_attestation(&attestation)?;
        let max_borrowable = collection_config.max_ltv.mul_floor(value);
        ensure!(amount <= max_borrowable, Error::<T>::InsufficientCollateral);

        ensure!(
            amount <= pool.total_cash,
            Error::<T>::InsufficientLiquidity
        );
        let new_cash = pool
            .total_cash
            .checked_sub(amount)
            .ok_or(ArithmeticError::Underflow)?;
        let new_borrows = pool
            .total_borrows
            .checked_add(amount)
            .ok_or(ArithmeticError::Overflow)?;
        let new_util =
            calc_utilization(new_cash, new_borrows).ok_or(ArithmeticError::Overflow)?;
        ensure!(
            new_util <= pool.config.max_utilization,
            Error::<T>::UtilizationCapExceeded
        );

        for item in items.iter() {
            ensure!(
                !CollateralLocks::<T>::contains_key(collection, item),
                Error::<T>::CollateralAlreadyLocked
            );
            ensure!(
                T::Collateral::owner(&collection, item).as_ref() == Some(who),
                Error::<T>::NotItemOwner
            );
        }
        for item in items.iter() {
            T::Collateral::transfer(&collection, item, &Self::account_id())?;
        }

        pool.total_cash = new_cash;
        pool.total_borrows = new_borrows;
        Pools::<T>::insert(collection, asset_id, pool);
        Self::refresh_pool_rates(collection, asset_id, &pool)?;

        // Snapshot reflects post-borrow utilization.
        let rate = Self::borrow_rate(collection, asset_id);
        let now = T::UnixTime::now().as_secs();
        let loan_id = NextLoanId::<T>::try_mutate(|id| -> Result<LoanId, DispatchError> {
            let current = *id;
            *id = id.checked_add(One::one()).ok_or(ArithmeticError::Overflow)?;
            Ok(current)
        })?;
        for item in items.iter() {
            CollateralLocks::<T>::insert(collection, item, loan_id);
        }
        Loans::<T>::insert(
            loan_id,
            Loan {
                borrower: who.clone(),
                collection,
                asset: asset_id,
                items,
                principal: amount,
                borrow_rate: rate,
                init_timestamp: now,
                debt_timestamp: now,
                state: LoanState::Active,
                auction: None,
            },
        );

        T::Assets::transfer(asset_id, &Self::account_id(), who, amount, false)?;

        log::trace!(
            target: "lending::borrow",
            "who: {:?}, loan: {:?}, asset: {:?}, amount: {:?}, rate: {:?}",
            who,
            &loan_id,
            &asset_id,
            &amount,
            &rate,
        );
        Self::deposit_event(Event::<T>::Borrowed(
            who.clone(),
            loan_id,
            collection,
            asset_id,
            amount,
        ));
        Ok(())
    }

    #[require_transactional]
    fn do_repay(who: &T::AccountId, loan_id: LoanId, amount: Balance) -> DispatchResult {
        ensure!(!amount.is_zero(), Error::<T>::ZeroAmount);
        let now = T::UnixTime::now().as_secs();
        Loans::<T>::try_mutate(loan_id, |maybe_loan| -> DispatchResult {
            let loan = maybe_loan.as_mut().ok_or(Error::<T>::LoanNotFound)?;
            ensure!(&loan.borrower == who, Error::<T>::NotLoanOwner);
            match loan.state {
                LoanState::Active => Self::repay_active(who, loan_id, loan, amount, now),
                LoanState::Auctioned => Self::settle_auctioned(who, loan_id, loan, amount, now),
                _ => Err(Error::<T>::InvalidLoanState.into()),
            }
        })
    }

    /// Repayment of a loan with no open auction. Due interest is folded
    /// into principal at the new checkpoint.
    fn repay_active(
        who: &T::AccountId,
        loan_id: LoanId,
        loan: &mut LoanOf<T>,
        amount: Balance,
        now: Timestamp,
    ) -> DispatchResult {
        let debt = Self::current_debt(loan, now)?;
        let applied = amount.min(debt);
        let new_principal = debt
            .checked_sub(applied)
            .ok_or(ArithmeticError::Underflow)?;

        T::Assets::transfer(loan.asset, who, &Self::account_id(), applied, false)?;
        Self::update_pool_on_repay(loan.collection, loan.asset, loan.principal, new_principal, applied)?;

        loan.principal = new_principal;
        loan.debt_timestamp = now;
        if new_principal.is_zero() {
            Self::release_collateral(loan.collection, &loan.items, who)?;
            loan.state = LoanState::Repaid;
            Self::deposit_event(Event::<T>::LoanClosed(who.clone(), loan_id));
        }

        log::trace!(
            target: "lending::repay",
            "who: {:?}, loan: {:?}, applied: {:?}, remaining: {:?}",
            who,
            &loan_id,
            &applied,
            &new_principal,
        );
        Self::deposit_event(Event::<T>::Repaid(who.clone(), loan_id, applied, new_principal));
        Ok(())
    }

    /// Full settlement of an auctioned loan before claim: debt to the
    /// pool, fee to the auctioneer, escrow back to the bidder.
    fn settle_auctioned(
        who: &T::AccountId,
        loan_id: LoanId,
        loan: &mut LoanOf<T>,
        amount: Balance,
        now: Timestamp,
    ) -> DispatchResult {
        let auction = loan.auction.clone().ok_or(Error::<T>::InvalidLoanState)?;
        let pool = Self::pools(loan.collection, loan.asset).ok_or(Error::<T>::PoolNotFound)?;

        let debt = Self::current_debt(loan, now)?;
        let auctioneer_fee = pool.config.auctioneer_fee.mul_floor(debt);
        let total_due = debt
            .checked_add(auctioneer_fee)
            .ok_or(ArithmeticError::Overflow)?;
        ensure!(amount >= total_due, Error::<T>::InsufficientRepay);

        T::Assets::transfer(loan.asset, who, &Self::account_id(), debt, false)?;
        T::Assets::transfer(loan.asset, who, &auction.auctioneer, auctioneer_fee, false)?;
        T::Assets::transfer(
            loan.asset,
            &Self::account_id(),
            &auction.bidder,
            auction.max_bid,
            false,
        )?;
        Self::update_pool_on_repay(loan.collection, loan.asset, loan.principal, 0, debt)?;
        Self::release_collateral(loan.collection, &loan.items, who)?;

        loan.principal = 0;
        loan.debt_timestamp = now;
        loan.state = LoanState::Repaid;

        log::trace!(
            target: "lending::repay",
            "who: {:?}, loan: {:?}, settled: {:?}, auctioneer_fee: {:?}",
            who,
            &loan_id,
            &debt,
            &auctioneer_fee,
        );
        Self::deposit_event(Event::<T>::AuctionCancelled(
            loan_id,
            auction.auctioneer,
            auctioneer_fee,
        ));
        Self::deposit_event(Event::<T>::Repaid(who.clone(), loan_id, debt, 0));
        Self::deposit_event(Event::<T>::LoanClosed(who.clone(), loan_id));
        Ok(())
    }

    #[require_transactional]
    fn do_bid(
        who: &T::AccountId,
        loan_id: LoanId,
        amount: Balance,
        attestation: Option<AttestationOf<T>>,
    ) -> DispatchResult {
        let now = T::UnixTime::now().as_secs();
        Loans::<T>::try_mutate(loan_id, |maybe_loan| -> DispatchResult {
            let loan = maybe_loan.as_mut().ok_or(Error::<T>::LoanNotFound)?;
            match loan.state {
                LoanState::Active => {
                    Self::open_auction(who, loan_id, loan, amount, attestation, now)
                }
                LoanState::Auctioned => Self::raise_bid(who, loan_id, loan, amount, now),
                _ => Err(Error::<T>::InvalidLoanState.into()),
            }
        })
    }

    /// First bid: proves insolvency with a fresh attestation, satisfies
    /// the bid floor and opens the auction. The bidder becomes the
    /// auctioneer and the clock starts.
    fn open_auction(
        who: &T::AccountId,
        loan_id: LoanId,
        loan: &mut LoanOf<T>,
        amount: Balance,
        attestation: Option<AttestationOf<T>>,
        now: Timestamp,
    ) -> DispatchResult {
        let attestation = attestation.ok_or(Error::<T>::AttestationRequired)?;
        ensure!(
            attestation.collection == loan.collection && attestation.items == loan.items,
            Error::<T>::AttestationMismatch
        );
        let value = T::Valuations::consume_attestation(&attestation)?;

        let collection_config =
            Self::collections(loan.collection).ok_or(Error::<T>::UnsupportedCollection)?;
        let pool = Self::pools(loan.collection, loan.asset).ok_or(Error::<T>::PoolNotFound)?;
        let debt = Self::current_debt(loan, now)?;
        ensure!(
            debt > collection_config.liquidation_threshold.mul_floor(value),
            Error::<T>::MaxDebtNotExceeded
        );

        let floor = Self::bid_floor(&pool.config, debt, value)?;
        ensure!(amount >= floor, Error::<T>::BidTooLow);

        T::Assets::transfer(loan.asset, who, &Self::account_id(), amount, false)?;
        loan.state = LoanState::Auctioned;
        loan.auction = Some(Auction {
            auctioneer: who.clone(),
            bidder: who.clone(),
            max_bid: amount,
            started_at: now,
        });

        log::trace!(
            target: "lending::bid",
            "who: {:?}, loan: {:?}, opening bid: {:?}, floor: {:?}",
            who,
            &loan_id,
            &amount,
            &floor,
        );
        Self::deposit_event(Event::<T>::AuctionStarted(loan_id, who.clone(), amount));
        Ok(())
    }

    /// Later bid: strictly above the current max bid, inside the window.
    /// Escrow swaps to the new bidder; the clock never restarts.
    fn raise_bid(
        who: &T::AccountId,
        loan_id: LoanId,
        loan: &mut LoanOf<T>,
        amount: Balance,
        now: Timestamp,
    ) -> DispatchResult {
        let asset_id = loan.asset;
        let auction = loan.auction.as_mut().ok_or(Error::<T>::InvalidLoanState)?;
        ensure!(
            now < auction.started_at.saturating_add(T::AuctionDuration::get()),
            Error::<T>::AuctionExpired
        );
        ensure!(amount > auction.max_bid, Error::<T>::BidTooLow);

        T::Assets::transfer(asset_id, who, &Self::account_id(), amount, false)?;
        T::Assets::transfer(
            asset_id,
            &Self::account_id(),
            &auction.bidder,
            auction.max_bid,
            false,
        )?;
        auction.bidder = who.clone();
        auction.max_bid = amount;

        log::trace!(
            target: "lending::bid",
            "who: {:?}, loan: {:?}, bid: {:?}",
            who,
            &loan_id,
            &amount,
        );
        Self::deposit_event(Event::<T>::BidPlaced(loan_id, who.clone(), amount));
        Ok(())
    }

    #[require_transactional]
    fn do_claim(loan_id: LoanId) -> DispatchResult {
        let now = T::UnixTime::now().as_secs();
        Loans::<T>::try_mutate(loan_id, |maybe_loan| -> DispatchResult {
            let loan = maybe_loan.as_mut().ok_or(Error::<T>::LoanNotFound)?;
            ensure!(
                loan.state == LoanState::Auctioned,
                Error::<T>::InvalidLoanState
            );
            let auction = loan.auction.clone().ok_or(Error::<T>::InvalidLoanState)?;
            ensure!(
                now >= auction.started_at.saturating_add(T::AuctionDuration::get()),
                Error::<T>::AuctionNotFinished
            );

            let pool = Self::pools(loan.collection, loan.asset).ok_or(Error::<T>::PoolNotFound)?;
            let debt = Self::current_debt(loan, now)?;
            let auctioneer_fee = pool.config.auctioneer_fee.mul_floor(debt);
            let pool_due = debt
                .checked_add(pool.config.liquidation_fee.mul_floor(debt))
                .ok_or(ArithmeticError::Overflow)?;

            // Escrow pays the auctioneer first, then the pool, then any
            // surplus back to the borrower.
            let mut remaining = auction.max_bid;
            let auctioneer_cut = auctioneer_fee.min(remaining);
            remaining = remaining.saturating_sub(auctioneer_cut);
            let pool_cut = pool_due.min(remaining);
            remaining = remaining.saturating_sub(pool_cut);

            T::Assets::transfer(
                loan.asset,
                &Self::account_id(),
                &auction.auctioneer,
                auctioneer_cut,
                false,
            )?;
            // The pool's cut already sits on the pallet account.
            Self::update_pool_on_repay(loan.collection, loan.asset, loan.principal, 0, pool_cut)?;
            if !remaining.is_zero() {
                T::Assets::transfer(
                    loan.asset,
                    &Self::account_id(),
                    &loan.borrower,
                    remaining,
                    false,
                )?;
            }
            Self::release_collateral(loan.collection, &loan.items, &auction.bidder)?;

            loan.principal = 0;
            loan.debt_timestamp = now;
            loan.state = LoanState::Liquidated;

            log::trace!(
                target: "lending::claim",
                "loan: {:?}, winner: {:?}, bid: {:?}, surplus: {:?}",
                &loan_id,
                &auction.bidder,
                &auction.max_bid,
                &remaining,
            );
            Self::deposit_event(Event::<T>::Liquidated(
                loan_id,
                auction.bidder,
                auction.max_bid,
                remaining,
            ));
            Ok(())
        })
    }

    /// Floor of an opening bid: debt plus both fees, but never further
    /// below the attested value than the configured discount.
    fn bid_floor(
        config: &PoolConfig,
        debt: Balance,
        value: Balance,
    ) -> Result<Balance, DispatchError> {
        let debt_floor = debt
            .checked_add(config.auctioneer_fee.mul_floor(debt))
            .and_then(|sum| sum.checked_add(config.liquidation_fee.mul_floor(debt)))
            .ok_or(ArithmeticError::Overflow)?;
        let discount_floor = Ratio::one()
            .saturating_sub(config.max_liquidator_discount)
            .mul_floor(value);

        Ok(debt_floor.max(discount_floor))
    }

    /// Shares minted for a deposit, floored.
    fn calc_shares_to_mint(
        amount: Balance,
        total_shares: Balance,
        total_assets: Balance,
    ) -> Result<Balance, DispatchError> {
        let shares = amount
            .checked_mul(total_shares)
            .ok_or(ArithmeticError::Overflow)?
            .checked_div(total_assets)
            .ok_or(ArithmeticError::DivisionByZero)?;
        Ok(shares)
    }

    /// Shares burned for a withdrawal, rounded up so the pool never
    /// under-collects.
    fn calc_shares_to_burn(
        amount: Balance,
        total_shares: Balance,
        total_assets: Balance,
    ) -> Result<Balance, DispatchError> {
        let numerator = amount
            .checked_mul(total_shares)
            .ok_or(ArithmeticError::Overflow)?;
        let quotient = numerator
            .checked_div(total_assets)
            .ok_or(ArithmeticError::DivisionByZero)?;
        if numerator % total_assets == 0 {
            Ok(quotient)
        } else {
            quotient.checked_add(1).ok_or_else(|| ArithmeticError::Overflow.into())
        }
    }

    /// Return collateral to `to` and clear the locks.
    fn release_collateral(
        collection: T::CollectionId,
        items: &[T::ItemId],
        to: &T::AccountId,
    ) -> DispatchResult {
        for item in items.iter() {
            T::Collateral::transfer(&collection, item, to)?;
            CollateralLocks::<T>::remove(collection, item);
        }
        Ok(())
    }
}
