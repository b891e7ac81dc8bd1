// This file is part of Substrate.

// Copyright (C) 2021 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: Apache-2.0

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
#![allow(unused_parens)]
#![allow(unused_imports)]
#![allow(clippy::all)]

use frame_support::weights::Weight;
use sp_std::marker::PhantomData;

/// Weight functions needed for pallet_lending
pub trait WeightInfo {
    fn register_asset() -> Weight;
    fn deregister_asset() -> Weight;
    fn set_collection() -> Weight;
    fn remove_collection() -> Weight;
    fn create_pool() -> Weight;
    fn update_pool_config() -> Weight;
    fn set_pool_paused() -> Weight;
    fn deposit() -> Weight;
    fn withdraw() -> Weight;
    fn borrow() -> Weight;
    fn repay() -> Weight;
    fn bid() -> Weight;
    fn claim() -> Weight;
}

/// Weights for lending using the Substrate node and recommended hardware.
pub struct SubstrateWeight<T>(PhantomData<T>);
impl<T: frame_system::Config> WeightInfo for SubstrateWeight<T> {
    fn register_asset() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn deregister_asset() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn set_collection() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn remove_collection() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn create_pool() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn update_pool_config() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn set_pool_paused() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn deposit() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn withdraw() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn borrow() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn repay() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn bid() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn claim() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
}

// For backwards compatibility and tests
impl WeightInfo for () {
    fn register_asset() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn deregister_asset() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn set_collection() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn remove_collection() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn create_pool() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn update_pool_config() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn set_pool_paused() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn deposit() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn withdraw() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn borrow() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn repay() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn bid() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
    fn claim() -> Weight {
        Weight::from_ref_time(10_000 as u64)
    }
}
