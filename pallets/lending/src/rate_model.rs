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
use primitives::{Balance, Rate, Ratio, Timestamp, SECONDS_PER_YEAR};
use scale_info::TypeInfo;
use sp_runtime::{
    traits::{CheckedAdd, CheckedDiv, Saturating, Zero},
    FixedPointNumber, RuntimeDebug,
};

/// Kinked interest rate model: one slope below the optimal utilization
/// point, a steeper one above it, continuous at the kink.
#[derive(Encode, Decode, Eq, PartialEq, Copy, Clone, RuntimeDebug, TypeInfo)]
pub struct InterestRateModel {
    /// The borrow rate at zero utilization.
    pub base_rate: Rate,
    /// Rate increase over the `[0, optimal]` utilization range.
    pub low_slope: Rate,
    /// Rate increase over the `(optimal, 100%]` utilization range.
    pub high_slope: Rate,
    /// The utilization point at which the slope changes.
    pub optimal_utilization: Ratio,
}

impl InterestRateModel {
    pub const MAX_BASE_RATE: Rate = Rate::from_inner(100_000_000_000_000_000); // 10%
    pub const MAX_FULL_RATE: Rate = Rate::from_inner(3_000_000_000_000_000_000); // 300%

    pub fn new_model(
        base_rate: Rate,
        low_slope: Rate,
        high_slope: Rate,
        optimal_utilization: Ratio,
    ) -> InterestRateModel {
        Self {
            base_rate,
            low_slope,
            high_slope,
            optimal_utilization,
        }
    }

    /// Check the model for sanity
    pub fn check_model(&self) -> bool {
        if self.base_rate > Self::MAX_BASE_RATE {
            return false;
        }
        // The rate at full utilization is the sum of all three parts.
        let full_rate = self
            .base_rate
            .saturating_add(self.low_slope)
            .saturating_add(self.high_slope);
        if full_rate > Self::MAX_FULL_RATE {
            return false;
        }
        if self.optimal_utilization.is_zero() || self.optimal_utilization == Ratio::one() {
            return false;
        }

        true
    }

    /// Calculates the borrow interest rate at the given utilization
    pub fn borrow_rate(&self, utilization: Ratio) -> Option<Rate> {
        if utilization <= self.optimal_utilization {
            // base_rate + low_slope * utilization / optimal_utilization
            let result = self
                .low_slope
                .saturating_mul(utilization.into())
                .checked_div(&self.optimal_utilization.into())?
                .checked_add(&self.base_rate)?;

            Some(result)
        } else {
            // base_rate + low_slope
            //     + high_slope * (utilization - optimal) / (1 - optimal)
            let excess_util = utilization.saturating_sub(self.optimal_utilization);
            let result = self
                .high_slope
                .saturating_mul(excess_util.into())
                .checked_div(&(Ratio::one().saturating_sub(self.optimal_utilization).into()))?
                .checked_add(&self.low_slope)?
                .checked_add(&self.base_rate)?;

            Some(result)
        }
    }

    /// Calculates the current supply interest rate
    pub fn supply_rate(borrow_rate: Rate, util: Ratio) -> Rate {
        borrow_rate.saturating_mul(util.into())
    }
}

/// Fraction of pool assets currently lent out. Zero cash and zero debt
/// yields zero.
pub fn calc_utilization(cash: Balance, borrows: Balance) -> Option<Ratio> {
    let total = cash.checked_add(borrows)?;
    if total.is_zero() {
        return Some(Ratio::zero());
    }

    Some(Ratio::from_rational(borrows, total))
}

pub fn accrued_interest(borrow_rate: Rate, amount: Balance, delta_time: Timestamp) -> Option<Balance> {
    borrow_rate
        .checked_mul_int(amount)?
        .checked_mul(delta_time.into())?
        .checked_div(SECONDS_PER_YEAR.into())
}

/// Elapsed time for accrual, measured to the *next* checkpoint-window
/// boundary after `now`. A `now` sitting exactly on a boundary still
/// rolls forward one full window; debt is deterministic within a window
/// regardless of exact block time.
pub fn effective_elapsed(
    last_checkpoint: Timestamp,
    now: Timestamp,
    window: Timestamp,
) -> Timestamp {
    if window.is_zero() {
        return now.saturating_sub(last_checkpoint);
    }
    let boundary = (now / window).saturating_add(1).saturating_mul(window);

    boundary.saturating_sub(last_checkpoint)
}
