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

//! Per-loan lazy accrual and pool rate maintenance.

use crate::*;

impl<T: Config> Pallet<T> {
    /// Debt of a loan at `now`: principal plus interest accrued since the
    /// last checkpoint, with elapsed time rounded to the next window
    /// boundary.
    pub fn current_debt(loan: &LoanOf<T>, now: Timestamp) -> Result<Balance, DispatchError> {
        let elapsed = effective_elapsed(loan.debt_timestamp, now, T::CheckpointWindow::get());
        let interest = accrued_interest(loan.borrow_rate, loan.principal, elapsed)
            .ok_or(ArithmeticError::Overflow)?;
        let debt = loan
            .principal
            .checked_add(interest)
            .ok_or(ArithmeticError::Overflow)?;

        Ok(debt)
    }

    /// Debt of a stored loan at the current time. Unknown ids fail with
    /// `LoanNotFound`, never a default record.
    pub fn loan_debt(loan_id: LoanId) -> Result<Balance, DispatchError> {
        let loan = Self::loans(loan_id).ok_or(Error::<T>::LoanNotFound)?;
        Self::current_debt(&loan, T::UnixTime::now().as_secs())
    }

    /// Recompute the pool's instantaneous utilization and rates. A pool
    /// whose asset was deregistered keeps its last rates; repayment and
    /// withdrawal never depend on the registry.
    pub(crate) fn refresh_pool_rates(
        collection: T::CollectionId,
        asset_id: CurrencyId,
        pool: &Pool,
    ) -> DispatchResult {
        let util = calc_utilization(pool.total_cash, pool.total_borrows)
            .ok_or(ArithmeticError::Overflow)?;
        UtilizationRatio::<T>::insert(collection, asset_id, util);

        if let Some(model) = Self::rate_models(asset_id) {
            let borrow_rate = model.borrow_rate(util).ok_or(ArithmeticError::Overflow)?;
            let supply_rate = InterestRateModel::supply_rate(borrow_rate, util);
            BorrowRate::<T>::insert(collection, asset_id, borrow_rate);
            SupplyRate::<T>::insert(collection, asset_id, supply_rate);
            log::trace!(
                target: "lending::refresh_pool_rates",
                "asset: {:?}, util: {:?}, borrow_rate: {:?}, supply_rate: {:?}",
                &asset_id,
                &util,
                &borrow_rate,
                &supply_rate,
            );
        }

        Ok(())
    }

    /// Apply a repayment (or liquidation settlement) to pool totals:
    /// `cash_in` returns to idle liquidity, outstanding principal moves
    /// from `old_principal` to `new_principal`.
    pub(crate) fn update_pool_on_repay(
        collection: T::CollectionId,
        asset_id: CurrencyId,
        old_principal: Balance,
        new_principal: Balance,
        cash_in: Balance,
    ) -> DispatchResult {
        let mut pool = Self::pools(collection, asset_id).ok_or(Error::<T>::PoolNotFound)?;
        pool.total_cash = pool
            .total_cash
            .checked_add(cash_in)
            .ok_or(ArithmeticError::Overflow)?;
        pool.total_borrows = pool
            .total_borrows
            .checked_add(new_principal)
            .ok_or(ArithmeticError::Overflow)?
            .checked_sub(old_principal)
            .ok_or(ArithmeticError::Underflow)?;
        Pools::<T>::insert(collection, asset_id, pool);
        Self::refresh_pool_rates(collection, asset_id, &pool)?;

        Ok(())
    }
}
