//! Transaction assembly helpers: balances, affordability, direct planning.

use zksw_common::{AssetMap, Output, Utxo, UtxoRef, Value};

use crate::ledger::FeeParams;
use crate::WalletError;

/// Total native-coin balance over the given UTXO set.
///
/// Balances are always recomputed from a fresh UTXO fetch, never cached
/// independently of one.
pub fn native_balance(utxos: &[Utxo]) -> Value {
    let mut total = Value::zero();
    for utxo in utxos {
        total.increase(&utxo.value.native());
    }
    total
}

/// Sum of the native-coin amounts requested across outputs.
pub fn total_requested(outputs: &[Output]) -> Value {
    let mut total = Value::zero();
    for output in outputs {
        total.increase(&output.value.native());
    }
    total
}

/// Affordability gate, evaluated before any network call: the balance must
/// cover the requested amount plus the path's reserve. Raises the
/// user-facing shortfall error; a failing spend never reaches the prover or
/// the backend.
pub fn check_affordable(
    balance: &Value,
    amount: &Value,
    reserve: &Value,
) -> Result<(), WalletError> {
    let needed = amount.plus(reserve);
    if *balance < needed {
        return Err(WalletError::InsufficientFunds {
            needed,
            available: balance.clone(),
        });
    }
    Ok(())
}

/// Client-side plan for the direct peer-to-peer mode: spend every native
/// UTXO, emit the requested outputs, return the remainder to the sender.
#[derive(Clone, Debug)]
pub struct DirectPlan {
    pub inputs: Vec<UtxoRef>,
    pub outputs: Vec<Output>,
    pub change: Output,
}

pub fn plan_direct(
    utxos: &[Utxo],
    outputs: &[Output],
    change_address: &str,
    params: &FeeParams,
) -> Result<DirectPlan, WalletError> {
    let balance = native_balance(utxos);
    let amount = total_requested(outputs);

    check_affordable(&balance, &amount, &params.fee)?;

    let spent = amount.plus(&params.fee);
    let change_amount = balance
        .checked_sub(&spent)
        .unwrap_or_default(); // gate above guarantees no underflow

    Ok(DirectPlan {
        inputs: utxos.iter().map(|u| u.reference.clone()).collect(),
        outputs: outputs.to_vec(),
        change: Output::payment(change_address, AssetMap::native_only(change_amount)),
    })
}
