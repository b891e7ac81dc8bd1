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

use codec::{Decode, Encode};
use primitives::{Balance, CurrencyId, Rate, Ratio, Timestamp};
use scale_info::TypeInfo;
use sp_runtime::RuntimeDebug;
use sp_std::vec::Vec;

/// Governance knobs of a liquidity pool.
#[derive(Encode, Decode, Eq, PartialEq, Copy, Clone, RuntimeDebug, TypeInfo)]
pub struct PoolConfig {
    /// Hard cap on `total_cash + total_borrows`.
    pub supply_cap: Balance,
    /// New borrowing must keep utilization at or below this ceiling.
    pub max_utilization: Ratio,
    /// Fee on current debt paid to whoever opened a liquidation auction.
    pub auctioneer_fee: Ratio,
    /// Fee on current debt kept by the pool when a liquidation settles.
    pub liquidation_fee: Ratio,
    /// The opening bid may not fall further than this below the attested
    /// collateral value.
    pub max_liquidator_discount: Ratio,
}

/// A share-based vault for one (collection, asset) pair.
///
/// `total_cash + total_borrows` is the pool's total asset value; shares
/// are claims on it at the current exchange rate.
#[derive(Encode, Decode, Eq, PartialEq, Copy, Clone, RuntimeDebug, TypeInfo)]
pub struct Pool {
    /// Idle liquidity held by the pallet account.
    pub total_cash: Balance,
    /// Outstanding loan principal.
    pub total_borrows: Balance,
    /// Share-token supply.
    pub total_shares: Balance,
    pub config: PoolConfig,
    /// Blocks new borrowing only; exits stay open.
    pub paused: bool,
}

impl Pool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            total_cash: 0,
            total_borrows: 0,
            total_shares: 0,
            config,
            paused: false,
        }
    }

    pub fn total_assets(&self) -> Option<Balance> {
        self.total_cash.checked_add(self.total_borrows)
    }
}

/// Risk parameters of a collateral collection.
#[derive(Encode, Decode, Eq, PartialEq, Copy, Clone, RuntimeDebug, TypeInfo)]
pub struct CollectionConfig {
    /// Principal may not exceed this fraction of the attested value.
    pub max_ltv: Ratio,
    /// Debt above this fraction of the attested value makes the loan
    /// eligible for auction.
    pub liquidation_threshold: Ratio,
}

/// Lifecycle of a loan. Terminal records are retained for audit.
#[derive(Encode, Decode, Eq, PartialEq, Copy, Clone, RuntimeDebug, TypeInfo)]
pub enum LoanState {
    Active,
    Auctioned,
    Repaid,
    Liquidated,
}

/// Open or settled liquidation auction of one loan.
///
/// The first bidder is the auctioneer; the clock never restarts.
#[derive(Encode, Decode, Eq, PartialEq, Clone, RuntimeDebug, TypeInfo)]
pub struct Auction<AccountId> {
    /// Whoever opened the auction, entitled to the auctioneer fee.
    pub auctioneer: AccountId,
    /// Current highest bidder, bid held in escrow.
    pub bidder: AccountId,
    pub max_bid: Balance,
    /// Unix seconds at auction creation.
    pub started_at: Timestamp,
}

/// Authoritative record of one loan.
#[derive(Encode, Decode, Eq, PartialEq, Clone, RuntimeDebug, TypeInfo)]
pub struct Loan<AccountId, CollectionId, ItemId> {
    pub borrower: AccountId,
    pub collection: CollectionId,
    pub asset: CurrencyId,
    /// Collateral token ids, non-empty and unique, in protocol custody
    /// for the whole `Active`/`Auctioned` lifetime.
    pub items: Vec<ItemId>,
    /// Principal plus interest folded in by past repayments.
    pub principal: Balance,
    /// Per-annum borrow rate snapshotted at creation.
    pub borrow_rate: Rate,
    pub init_timestamp: Timestamp,
    /// Last accrual checkpoint.
    pub debt_timestamp: Timestamp,
    pub state: LoanState,
    pub auction: Option<Auction<AccountId>>,
}
