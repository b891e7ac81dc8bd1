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

use crate as pallet_lending;
use crate::{CollectionConfig, InterestRateModel, PoolConfig};
use codec::Encode;
use frame_support::{
    construct_runtime, parameter_types,
    traits::{AsEnsureOriginWithArg, Everything},
    PalletId,
};
use frame_system::{EnsureRoot, EnsureSigned};
use primitives::{tokens, AttestNonce, Balance, CurrencyId, PriceAttestation, Rate, Ratio, Timestamp};
use sp_core::{sr25519, Pair, H256};
use sp_runtime::{
    testing::Header,
    traits::{BlakeTwo256, IdentifyAccount, IdentityLookup},
    AccountId32, FixedPointNumber, MultiSignature, MultiSigner,
};

pub type AccountId = AccountId32;
pub type Signature = MultiSignature;
pub type CollectionId = u32;
pub type ItemId = u32;
pub type Attestation = PriceAttestation<CollectionId, ItemId, AccountId, Signature>;

type UncheckedExtrinsic = frame_system::mocking::MockUncheckedExtrinsic<Test>;
type Block = frame_system::mocking::MockBlock<Test>;
type BlockNumber = u64;

pub const ALICE: AccountId = AccountId32::new([1u8; 32]);
pub const BOB: AccountId = AccountId32::new([2u8; 32]);
pub const CHARLIE: AccountId = AccountId32::new([3u8; 32]);
pub const EVE: AccountId = AccountId32::new([4u8; 32]);

pub const USDT: CurrencyId = tokens::USDT;
pub const PUNKS: CollectionId = 7;

pub const ATTEST_MAGIC: u16 = 0x5041;

parameter_types! {
    pub const BlockHashCount: u64 = 250;
    pub const SS58Prefix: u8 = 42;
}

impl frame_system::Config for Test {
    type BaseCallFilter = Everything;
    type BlockWeights = ();
    type BlockLength = ();
    type RuntimeOrigin = RuntimeOrigin;
    type RuntimeCall = RuntimeCall;
    type Index = u64;
    type BlockNumber = BlockNumber;
    type Hash = H256;
    type Hashing = BlakeTwo256;
    type AccountId = AccountId;
    type Lookup = IdentityLookup<Self::AccountId>;
    type Header = Header;
    type RuntimeEvent = RuntimeEvent;
    type BlockHashCount = BlockHashCount;
    type DbWeight = ();
    type Version = ();
    type PalletInfo = PalletInfo;
    type AccountData = pallet_balances::AccountData<Balance>;
    type OnNewAccount = ();
    type OnKilledAccount = ();
    type SystemWeightInfo = ();
    type SS58Prefix = SS58Prefix;
    type OnSetCode = ();
    type MaxConsumers = frame_support::traits::ConstU32<16>;
}

parameter_types! {
    pub const ExistentialDeposit: Balance = 1;
    pub const MaxLocks: u32 = 50;
}

impl pallet_balances::Config for Test {
    type MaxLocks = MaxLocks;
    type Balance = Balance;
    type RuntimeEvent = RuntimeEvent;
    type DustRemoval = ();
    type MaxReserves = ();
    type ReserveIdentifier = [u8; 8];
    type ExistentialDeposit = ExistentialDeposit;
    type AccountStore = System;
    type WeightInfo = ();
}

parameter_types! {
    pub const MinimumPeriod: u64 = 5;
}

impl pallet_timestamp::Config for Test {
    type Moment = u64;
    type OnTimestampSet = ();
    type MinimumPeriod = MinimumPeriod;
    type WeightInfo = ();
}

parameter_types! {
    pub const AssetDeposit: u64 = 1;
    pub const ApprovalDeposit: u64 = 1;
    pub const AssetAccountDeposit: u64 = 1;
    pub const StringLimit: u32 = 50;
    pub const MetadataDepositBase: u64 = 1;
    pub const MetadataDepositPerByte: u64 = 1;
}

impl pallet_assets::Config for Test {
    type RuntimeEvent = RuntimeEvent;
    type Balance = Balance;
    type AssetId = CurrencyId;
    type AssetIdParameter = codec::Compact<CurrencyId>;
    type Currency = Balances;
    type CreateOrigin = AsEnsureOriginWithArg<EnsureSigned<AccountId>>;
    type ForceOrigin = EnsureRoot<AccountId>;
    type AssetDeposit = AssetDeposit;
    type MetadataDepositBase = MetadataDepositBase;
    type MetadataDepositPerByte = MetadataDepositPerByte;
    type AssetAccountDeposit = AssetAccountDeposit;
    type ApprovalDeposit = ApprovalDeposit;
    type StringLimit = StringLimit;
    type Freezer = ();
    type WeightInfo = ();
    type Extra = ();
    type RemoveItemsLimit = frame_support::traits::ConstU32<1000>;
    type CallbackHandle = ();
    #[cfg(feature = "runtime-benchmarks")]
    type BenchmarkHelper = ();
}

parameter_types! {
    pub const CollectionDeposit: Balance = 0;
    pub const ItemDeposit: Balance = 0;
    pub const KeyLimit: u32 = 50;
    pub const ValueLimit: u32 = 50;
    pub const UniquesMetadataDepositBase: Balance = 0;
    pub const AttributeDepositBase: Balance = 0;
    pub const DepositPerByte: Balance = 0;
    pub const UniquesStringLimit: u32 = 50;
}

impl pallet_uniques::Config for Test {
    type RuntimeEvent = RuntimeEvent;
    type CollectionId = CollectionId;
    type ItemId = ItemId;
    type Currency = Balances;
    type ForceOrigin = EnsureRoot<AccountId>;
    type CreateOrigin = AsEnsureOriginWithArg<EnsureSigned<AccountId>>;
    type Locker = ();
    type CollectionDeposit = CollectionDeposit;
    type ItemDeposit = ItemDeposit;
    type MetadataDepositBase = UniquesMetadataDepositBase;
    type AttributeDepositBase = AttributeDepositBase;
    type DepositPerByte = DepositPerByte;
    type StringLimit = UniquesStringLimit;
    type KeyLimit = KeyLimit;
    type ValueLimit = ValueLimit;
    type WeightInfo = ();
}

parameter_types! {
    pub const AttestMagicNumber: u16 = ATTEST_MAGIC;
}

impl pallet_price_attest::Config for Test {
    type RuntimeEvent = RuntimeEvent;
    type Signature = Signature;
    type Signer = MultiSigner;
    type CollectionId = CollectionId;
    type ItemId = ItemId;
    type AttestMagicNumber = AttestMagicNumber;
    type UnixTime = TimestampPallet;
    type UpdateOrigin = EnsureRoot<AccountId>;
    type WeightInfo = ();
}

parameter_types! {
    pub const LendingPalletId: PalletId = PalletId(*b"pwn/lend");
    pub const AuctionDuration: Timestamp = 86_400;
    pub const CheckpointWindow: Timestamp = 60;
    pub const MinimumDeposit: Balance = 1_000;
    pub const MaxCollateralItems: u32 = 4;
}

impl pallet_lending::Config for Test {
    type RuntimeEvent = RuntimeEvent;
    type Assets = Assets;
    type CollectionId = CollectionId;
    type ItemId = ItemId;
    type Collateral = Uniques;
    type Signature = Signature;
    type Valuations = PriceAttest;
    type PalletId = LendingPalletId;
    type UpdateOrigin = EnsureRoot<AccountId>;
    type UnixTime = TimestampPallet;
    type AuctionDuration = AuctionDuration;
    type CheckpointWindow = CheckpointWindow;
    type MinimumDeposit = MinimumDeposit;
    type MaxCollateralItems = MaxCollateralItems;
    type WeightInfo = ();
}

construct_runtime!(
    pub enum Test where
        Block = Block,
        NodeBlock = Block,
        UncheckedExtrinsic = UncheckedExtrinsic,
    {
        System: frame_system::{Pallet, Call, Config, Storage, Event<T>},
        Balances: pallet_balances::{Pallet, Call, Storage, Event<T>},
        TimestampPallet: pallet_timestamp::{Pallet, Call, Storage, Inherent},
        Assets: pallet_assets::{Pallet, Call, Storage, Event<T>},
        Uniques: pallet_uniques::{Pallet, Call, Storage, Event<T>},
        PriceAttest: pallet_price_attest::{Pallet, Call, Storage, Event<T>},
        Lending: pallet_lending::{Pallet, Call, Storage, Event<T>},
    }
);

pub fn oracle_pair() -> sr25519::Pair {
    sr25519::Pair::from_seed(&[7u8; 32])
}

pub fn account_of(pair: &sr25519::Pair) -> AccountId {
    MultiSigner::from(pair.public()).into_account()
}

/// Attestation signed by `pair` over
/// `(magic, collection, items, amount, deadline, nonce)`.
pub fn sign_attestation(
    pair: &sr25519::Pair,
    collection: CollectionId,
    items: Vec<ItemId>,
    amount: Balance,
    deadline: Timestamp,
    nonce: AttestNonce,
) -> Attestation {
    let payload = (ATTEST_MAGIC, &collection, &items, amount, deadline, nonce).encode();
    let signature = MultiSignature::from(pair.sign(&payload[..]));
    Attestation {
        collection,
        items,
        amount,
        deadline,
        nonce,
        signer: account_of(pair),
        signature,
    }
}

/// Fresh oracle attestation with a unique nonce per call.
pub fn attest(items: Vec<ItemId>, amount: Balance, nonce_seed: u8) -> Attestation {
    sign_attestation(
        &oracle_pair(),
        PUNKS,
        items,
        amount,
        far_deadline(),
        [nonce_seed; 32],
    )
}

/// A deadline comfortably past every test's clock.
pub fn far_deadline() -> Timestamp {
    1_000_000_000
}

pub fn default_rate_model() -> InterestRateModel {
    InterestRateModel::new_model(
        Rate::saturating_from_rational(2, 100),
        Rate::saturating_from_rational(8, 100),
        Rate::saturating_from_rational(100, 100),
        Ratio::from_percent(80),
    )
}

pub fn default_collection_config() -> CollectionConfig {
    CollectionConfig {
        max_ltv: Ratio::from_percent(30),
        liquidation_threshold: Ratio::from_percent(50),
    }
}

pub fn default_pool_config() -> PoolConfig {
    PoolConfig {
        supply_cap: 1_000_000_000_000,
        max_utilization: Ratio::from_percent(90),
        auctioneer_fee: Ratio::from_percent(2),
        liquidation_fee: Ratio::from_percent(3),
        max_liquidator_discount: Ratio::from_percent(20),
    }
}

pub fn new_test_ext() -> sp_io::TestExternalities {
    let mut t = frame_system::GenesisConfig::default()
        .build_storage::<Test>()
        .unwrap();
    pallet_balances::GenesisConfig::<Test> {
        balances: vec![
            (ALICE, 100_000_000_000),
            (BOB, 100_000_000_000),
            (CHARLIE, 100_000_000_000),
            (EVE, 100_000_000_000),
        ],
    }
    .assimilate_storage(&mut t)
    .unwrap();

    let mut ext = sp_io::TestExternalities::new(t);
    ext.execute_with(|| {
        System::set_block_number(1);
        TimestampPallet::set_timestamp(6000);

        Assets::force_create(RuntimeOrigin::root(), USDT.into(), ALICE, true, 1).unwrap();
        for who in [ALICE, BOB, CHARLIE, EVE] {
            Assets::mint(
                RuntimeOrigin::signed(ALICE),
                USDT.into(),
                who,
                1_000_000_000_000,
            )
            .unwrap();
        }

        // PUNKS collection, items 1..=4 owned by BOB.
        Uniques::force_create(RuntimeOrigin::root(), PUNKS, ALICE, true).unwrap();
        for item in 1..=4 {
            Uniques::mint(RuntimeOrigin::signed(ALICE), PUNKS, item, BOB).unwrap();
        }

        PriceAttest::add_signer(RuntimeOrigin::root(), account_of(&oracle_pair())).unwrap();

        Lending::register_asset(RuntimeOrigin::root(), USDT, default_rate_model()).unwrap();
        Lending::set_collection(RuntimeOrigin::root(), PUNKS, default_collection_config())
            .unwrap();
        Lending::create_pool(
            RuntimeOrigin::root(),
            PUNKS,
            USDT,
            default_pool_config(),
        )
        .unwrap();
    });

    ext
}

/// Current unix seconds as the lending pallet sees them.
pub fn now_secs() -> Timestamp {
    TimestampPallet::get() / 1000
}

/// Advance the chain clock by whole seconds within the current block.
pub fn advance_secs(secs: Timestamp) {
    TimestampPallet::set_timestamp(TimestampPallet::get() + secs * 1000);
}
