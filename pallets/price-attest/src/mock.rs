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

use crate as pallet_price_attest;
use codec::Encode;
use frame_support::{construct_runtime, parameter_types, traits::Everything};
use frame_system::EnsureRoot;
use primitives::{AttestNonce, Balance, PriceAttestation, Timestamp as UnixSeconds};
use sp_core::{sr25519, Pair, H256};
use sp_runtime::{
    testing::Header,
    traits::{BlakeTwo256, IdentifyAccount, IdentityLookup},
    AccountId32, MultiSignature, MultiSigner,
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

construct_runtime!(
    pub enum Test where
        Block = Block,
        NodeBlock = Block,
        UncheckedExtrinsic = UncheckedExtrinsic,
    {
        System: frame_system::{Pallet, Call, Config, Storage, Event<T>},
        Balances: pallet_balances::{Pallet, Call, Storage, Event<T>},
        TimestampPallet: pallet_timestamp::{Pallet, Call, Storage, Inherent},
        PriceAttest: pallet_price_attest::{Pallet, Call, Storage, Event<T>},
    }
);

pub fn oracle_pair() -> sr25519::Pair {
    sr25519::Pair::from_seed(&[7u8; 32])
}

pub fn account_of(pair: &sr25519::Pair) -> AccountId {
    MultiSigner::from(pair.public()).into_account()
}

/// Build an attestation whose signature covers
/// `(magic, collection, items, amount, deadline, nonce)`.
pub fn sign_attestation(
    pair: &sr25519::Pair,
    collection: CollectionId,
    items: Vec<ItemId>,
    amount: Balance,
    deadline: UnixSeconds,
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

pub fn new_test_ext() -> sp_io::TestExternalities {
    let t = frame_system::GenesisConfig::default()
        .build_storage::<Test>()
        .unwrap();

    let mut ext = sp_io::TestExternalities::new(t);
    ext.execute_with(|| {
        System::set_block_number(1);
        // Unix time starts at 6 seconds, one block in.
        TimestampPallet::set_timestamp(6000);
    });

    ext
}
