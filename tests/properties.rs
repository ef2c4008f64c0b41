//! Property tests for the fixed-point helpers, the ledger and the exchange.

use flashliq::prelude::*;
use flashliq::utils::math::{flash_fee, flash_repayment, scale_decimals};
use proptest::prelude::*;

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn machine(ltv_bps: u64, price: i128) -> ProtocolStateMachine {
    machine_with_decimals(ltv_bps, price, (6, 18, 18))
}

/// `(borrow, collateral, price)` decimals
fn machine_with_decimals(ltv_bps: u64, price: i128, decimals: (u8, u8, u8)) -> ProtocolStateMachine {
    let (borrow, collateral, price_decimals) = decimals;
    let params = ProtocolParams::default()
        .with_ltv(ltv_bps)
        .with_decimals(borrow, collateral, price_decimals);
    ProtocolStateMachine::new(params, Deployment::default(), price).unwrap()
}

fn fund(sm: &mut ProtocolStateMachine, asset: AssetKind, who: Address, amount: u128, spender: Spender) {
    sm.execute_all([
        ProtocolOperation::Faucet { asset, to: who, amount },
        ProtocolOperation::Approve {
            owner: who,
            asset,
            spender,
            amount: u128::MAX,
        },
    ])
    .unwrap();
}

#[derive(Debug, Clone)]
enum LedgerAction {
    Deposit(u128),
    Borrow(u128),
    Repay(u128),
    Withdraw(u128),
}

fn ledger_action() -> impl Strategy<Value = (bool, LedgerAction)> {
    ledger_action_sized(100_000_000_000_000_000_000, 1_000_000_000_000)
}

fn ledger_action_sized(max_collateral: u128, max_debt: u128) -> impl Strategy<Value = (bool, LedgerAction)> {
    let action = prop_oneof![
        (1..max_collateral).prop_map(LedgerAction::Deposit),
        (1..max_debt).prop_map(LedgerAction::Borrow),
        (1..max_debt).prop_map(LedgerAction::Repay),
        (1..max_collateral).prop_map(LedgerAction::Withdraw),
    ];
    (any::<bool>(), action)
}

/// Runs `actions` against two funded accounts, checking solvency and debt
/// bookkeeping after each one.
fn run_ledger_actions(
    mut sm: ProtocolStateMachine,
    liquidity: u128,
    actions: Vec<(bool, LedgerAction)>,
) -> std::result::Result<(), TestCaseError> {
    let d = *sm.deployment();
    let accounts = [Address::from_label("alice"), Address::from_label("bob")];

    sm.execute(ProtocolOperation::Faucet {
        asset: AssetKind::Borrow,
        to: d.ledger,
        amount: liquidity,
    })
    .unwrap();
    for account in accounts {
        fund(&mut sm, AssetKind::Collateral, account, liquidity, Spender::Ledger);
        sm.execute(ProtocolOperation::Approve {
            owner: account,
            asset: AssetKind::Borrow,
            spender: Spender::Ledger,
            amount: u128::MAX,
        })
        .unwrap();
    }

    for (second, action) in actions {
        let caller = accounts[second as usize];
        let op = match action {
            LedgerAction::Deposit(amount) => ProtocolOperation::Deposit { caller, amount },
            LedgerAction::Borrow(amount) => ProtocolOperation::Borrow { caller, amount },
            LedgerAction::Repay(amount) => ProtocolOperation::Repay { caller, amount },
            LedgerAction::Withdraw(amount) => ProtocolOperation::Withdraw { caller, amount },
        };
        let _ = sm.execute(op);

        let state = sm.state();
        prop_assert!(state.ledger.verify_solvency(&state.oracle).unwrap());
        for account in accounts {
            let position = state.ledger.position(&account);
            prop_assert_eq!(
                state.assets.balance_of(&d.borrow_asset, &account).unwrap(),
                position.borrowed
            );
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROPERTIES
// ═══════════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn flash_fee_exceeds_three_in_997(amount in 0u128..u64::MAX as u128) {
        let fee = flash_fee(amount).unwrap();
        prop_assert!(fee * 997 > amount * 3);
        prop_assert_eq!(flash_repayment(amount).unwrap(), amount + fee);
    }

    #[test]
    fn scale_up_then_down_is_exact(
        amount in 0u128..u64::MAX as u128,
        from in 0u8..=18,
        extra in 0u8..=18,
    ) {
        let to = from + extra;
        let scaled = scale_decimals(amount, from, to).unwrap();
        prop_assert_eq!(scale_decimals(scaled, to, from).unwrap(), amount);
    }

    #[test]
    fn ledger_stays_solvent(
        ltv_bps in 1u64..=10_000,
        price in 1i128..10_000_000_000_000_000,
        actions in prop::collection::vec(ledger_action(), 1..24),
    ) {
        run_ledger_actions(machine(ltv_bps, price), 1_000_000_000_000_000_000_000_000, actions)?;
    }

    #[test]
    fn ledger_stays_solvent_with_same_precision(
        ltv_bps in 1u64..=10_000,
        price in 1i128..10_000_000_000_000_000,
        actions in prop::collection::vec(
            ledger_action_sized(100_000_000_000_000_000_000_000, 10_000_000_000_000_000_000_000_000),
            1..24,
        ),
    ) {
        // 18-decimal debt and collateral; debt values reach 1e10 units
        let sm = machine_with_decimals(ltv_bps, price, (18, 18, 18));
        run_ledger_actions(sm, 100_000_000_000_000_000_000_000_000_000, actions)?;
    }

    #[test]
    fn ledger_stays_solvent_with_downscaled_collateral(
        ltv_bps in 1u64..=10_000,
        price in 1i128..100_000_000_000_000_000,
        actions in prop::collection::vec(
            ledger_action_sized(10_000_000_000, 10_000_000_000_000_000_000_000_000),
            1..24,
        ),
    ) {
        // 18-decimal debt against 8-decimal collateral truncates on rescale
        let sm = machine_with_decimals(ltv_bps, price, (18, 8, 18));
        run_ledger_actions(sm, 100_000_000_000_000_000_000_000_000_000, actions)?;
    }

    #[test]
    fn swaps_never_shrink_the_product(
        reserve0 in 1u128..1_000_000_000_000_000_000,
        reserve1 in 1u128..1_000_000_000_000_000_000,
        trades in prop::collection::vec((any::<bool>(), 1u128..1_000_000_000_000_000_000), 1..8),
    ) {
        let mut sm = machine(10_000, 1);
        let lp = Address::from_label("lp");
        let trader = Address::from_label("trader");

        fund(&mut sm, AssetKind::Collateral, lp, reserve0, Spender::Exchange);
        fund(&mut sm, AssetKind::Borrow, lp, reserve1, Spender::Exchange);
        sm.execute(ProtocolOperation::Initialize { caller: lp, amount0: reserve0, amount1: reserve1 })
            .unwrap();

        fund(&mut sm, AssetKind::Collateral, trader, 8_000_000_000_000_000_000, Spender::Exchange);
        fund(&mut sm, AssetKind::Borrow, trader, 8_000_000_000_000_000_000, Spender::Exchange);

        let mut product = sm.state().exchange.invariant();
        for (sell_zero, amount) in trades {
            let op = if sell_zero {
                ProtocolOperation::Sell0 { caller: trader, amount }
            } else {
                ProtocolOperation::Sell1 { caller: trader, amount }
            };
            sm.execute(op).unwrap();

            let next = sm.state().exchange.invariant();
            prop_assert!(next >= product);
            product = next;
        }
    }
}
