//! Structural script provider.
//!
//! Scripts are tagged lists and their conditions are derived by matching on
//! the tag instead of by running a virtual machine. The shapes mirror the
//! real scripts closely enough that every path through the gateway (hashes,
//! required signatures, created coins, parsing) behaves as it would on the
//! ledger:
//!
//! | script      | shape                                    | emits                                             |
//! |-------------|------------------------------------------|---------------------------------------------------|
//! | standard    | `("p2" pk)`                              | `AGG_SIG_ME pk tree_hash(solution)` + solution    |
//! | tracked     | `("cat" asset_id inner)`                 | inner conditions, created coins re-wrapped        |
//! | gateway     | `("gateway")`                            | issuance + delegated requirements + conditions    |
//! | issuance    | `("tail" root_pk index_hash)`            | `AGG_SIG_UNSAFE root_pk tree_hash((index delegated))` |
//! | delegated   | `("delegated" mode gateway_hash pk?)`    | `AGG_SIG_ME pk tree_hash(conditions)` when pk set |

use chia::clvm_traits::{clvm_list, match_list};
use chia::clvm_utils::tree_hash_atom;
use clvmr::allocator::NodePtr;

use super::{GatewaySpendArgs, ScriptError, ScriptProvider};
use crate::chain::{from_program, to_program, tree_hash, tree_hash_list, Bytes32, CoinSpend, Condition, Program};
use crate::crypto::PublicKey;
use crate::wallet::keys::delegation_message;
use crate::wallet::token::GatewayMode;

const STANDARD_TAG: &str = "p2";
const TRACKED_ASSET_TAG: &str = "cat";
const GATEWAY_TAG: &str = "gateway";
const ISSUANCE_TAG: &str = "tail";
const DELEGATED_TAG: &str = "delegated";

type StandardShape = match_list!(String, PublicKey);
type TrackedShape = match_list!(String, Bytes32, Program);
type IssuanceShape = match_list!(String, PublicKey, Bytes32);
type DelegatedShape = match_list!(String, u8, Bytes32, Option<PublicKey>);
/// `(issuance_script issuance_solution conditions)`
type GatewaySolutionShape = match_list!(Program, Program, Program);
/// `(delegated_script metadata from_puzzle_hash?)`
type IssuanceSolutionShape = match_list!(Program, Program, Option<Bytes32>);

#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceScripts;

impl ReferenceScripts {
    pub fn new() -> Self {
        Self
    }

    /// Ordinary pay-to-public-key script of a wallet.
    pub fn standard_script(&self, public_key: &PublicKey) -> Result<Program, ScriptError> {
        Ok(to_program(&clvm_list!(STANDARD_TAG, public_key))?)
    }

    /// Solution of a standard script: the conditions to emit.
    pub fn standard_solution(&self, conditions: &[Condition]) -> Result<Program, ScriptError> {
        Ok(to_program(&conditions)?)
    }

    /// Solution of a tracked-asset coin around an inner solution.
    pub fn tracked_asset_solution(&self, inner_solution: &Program) -> Result<Program, ScriptError> {
        Ok(to_program(&clvm_list!(inner_solution))?)
    }

    fn run(&self, puzzle: &Program, solution: &Program) -> Result<Vec<Condition>, ScriptError> {
        match script_tag(puzzle)?.as_str() {
            STANDARD_TAG => {
                let (_, (public_key, ())) = from_program::<StandardShape>(puzzle)?;
                let mut conditions = vec![Condition::AggSigMe {
                    public_key,
                    message: tree_hash(solution)?.to_vec(),
                }];
                conditions.extend(Condition::list_from_program(solution)?);
                Ok(conditions)
            }
            TRACKED_ASSET_TAG => {
                let (_, (asset_id, (inner, ()))) = from_program::<TrackedShape>(puzzle)?;
                let (inner_solution, ()) = from_program::<match_list!(Program)>(solution)?;
                let conditions = self.run(&inner, &inner_solution)?;
                Ok(conditions
                    .into_iter()
                    .map(|condition| match condition {
                        Condition::CreateCoin {
                            puzzle_hash,
                            amount,
                            memos,
                        } => Condition::CreateCoin {
                            puzzle_hash: self.tracked_asset_script_hash(&asset_id, &puzzle_hash),
                            amount,
                            memos,
                        },
                        other => other,
                    })
                    .collect())
            }
            GATEWAY_TAG => self.run_gateway(solution),
            other => Err(malformed(format!("unknown script tag `{other}`"))),
        }
    }

    fn run_gateway(&self, solution: &Program) -> Result<Vec<Condition>, ScriptError> {
        let (issuance_script, (issuance_solution, (conditions_list, ()))) =
            from_program::<GatewaySolutionShape>(solution)?;
        let mut conditions = Condition::list_from_program(&conditions_list)?;

        let (tag, (root_public_key, (index_hash, ()))) = from_program::<IssuanceShape>(&issuance_script)?;
        if tag != ISSUANCE_TAG {
            return Err(malformed("gateway reveal is not an issuance script"));
        }
        let (delegated, _) = from_program::<IssuanceSolutionShape>(&issuance_solution)?;
        conditions.push(Condition::AggSigUnsafe {
            public_key: root_public_key,
            message: delegation_message(&index_hash, &delegated)?.to_vec(),
        });

        let (_, (_, (_, (mode_key, ())))) = from_program::<DelegatedShape>(&delegated)?;
        if let Some(public_key) = mode_key {
            conditions.push(Condition::AggSigMe {
                public_key,
                message: tree_hash(&conditions_list)?.to_vec(),
            });
        }
        Ok(conditions)
    }
}

impl ScriptProvider for ReferenceScripts {
    fn issuance_script(
        &self,
        root_public_key: &PublicKey,
        index_hash: &Bytes32,
    ) -> Result<Program, ScriptError> {
        Ok(to_program(&clvm_list!(ISSUANCE_TAG, root_public_key, index_hash))?)
    }

    fn gateway_script(&self) -> Result<Program, ScriptError> {
        Ok(to_program(&clvm_list!(GATEWAY_TAG))?)
    }

    fn delegated_script(
        &self,
        mode: GatewayMode,
        gateway_script_hash: &Bytes32,
        public_key: Option<&PublicKey>,
    ) -> Result<Program, ScriptError> {
        let key = match mode {
            GatewayMode::PermissionlessRetirement => None,
            _ => public_key,
        };
        Ok(to_program(&clvm_list!(DELEGATED_TAG, mode.to_int(), gateway_script_hash, key))?)
    }

    fn tracked_asset_script(
        &self,
        asset_id: &Bytes32,
        inner: &Program,
    ) -> Result<Program, ScriptError> {
        Ok(to_program(&clvm_list!(TRACKED_ASSET_TAG, asset_id, inner))?)
    }

    fn tracked_asset_script_hash(&self, asset_id: &Bytes32, inner_hash: &Bytes32) -> Bytes32 {
        tree_hash_list(&[
            tree_hash_atom(TRACKED_ASSET_TAG.as_bytes()),
            tree_hash_atom(asset_id.as_ref()),
            (*inner_hash).into(),
        ])
        .into()
    }

    fn match_tracked_asset(&self, script: &Program) -> Option<(Bytes32, Program)> {
        let (tag, (asset_id, (inner, ()))) = from_program::<TrackedShape>(script).ok()?;
        (tag == TRACKED_ASSET_TAG).then_some((asset_id, inner))
    }

    fn gateway_solution(&self, args: &GatewaySpendArgs) -> Result<Program, ScriptError> {
        let conditions = match (args.mode.is_mint(), args.to_puzzle_hash) {
            (true, Some(to_puzzle_hash)) => vec![Condition::CreateCoin {
                puzzle_hash: to_puzzle_hash,
                amount: args.amount,
                memos: vec![to_puzzle_hash.to_vec()],
            }],
            _ => Vec::new(),
        };
        let issuance_solution = clvm_list!(&args.delegated_script, &args.metadata, args.from_puzzle_hash);
        let inner_solution = to_program(&clvm_list!(&args.issuance_script, issuance_solution, conditions))?;
        self.tracked_asset_solution(&inner_solution)
    }

    fn parse_gateway_spend(
        &self,
        coin_spend: &CoinSpend,
        is_tracked_asset: bool,
    ) -> Result<(GatewayMode, CoinSpend), ScriptError> {
        let (inner_puzzle, inner_solution) = if is_tracked_asset {
            let (_, inner) = self
                .match_tracked_asset(&coin_spend.puzzle_reveal)
                .ok_or(ScriptError::NotAGatewaySpend)?;
            let (inner_solution, ()) = from_program::<match_list!(Program)>(&coin_spend.solution)?;
            (inner, inner_solution)
        } else {
            (coin_spend.puzzle_reveal.clone(), coin_spend.solution.clone())
        };
        if inner_puzzle != self.gateway_script()? {
            return Err(ScriptError::NotAGatewaySpend);
        }

        let (issuance_script, (issuance_solution, _)) =
            from_program::<GatewaySolutionShape>(&inner_solution)?;
        let (delegated, _) = from_program::<IssuanceSolutionShape>(&issuance_solution)?;
        let (tag, (mode, _)) = from_program::<DelegatedShape>(&delegated)?;
        if tag != DELEGATED_TAG {
            return Err(malformed("issuance solution does not start with a delegated script"));
        }
        let mode = GatewayMode::from_int(mode).ok_or_else(|| malformed("unknown gateway mode tag"))?;

        Ok((
            mode,
            CoinSpend::new(coin_spend.coin, issuance_script, issuance_solution),
        ))
    }

    fn conditions(&self, coin_spend: &CoinSpend) -> Result<Vec<Condition>, ScriptError> {
        self.run(&coin_spend.puzzle_reveal, &coin_spend.solution)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn malformed(message: impl Into<String>) -> ScriptError {
    ScriptError::Malformed(message.into())
}

fn script_tag(program: &Program) -> Result<String, ScriptError> {
    let (tag, _) = from_program::<(String, NodePtr)>(program)
        .map_err(|err| malformed(format!("script has no tag: {err}")))?;
    Ok(tag)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{nil, Coin};
    use crate::crypto::SecretKey;
    use crate::transaction::metadata_program;

    fn pk(seed: u8) -> PublicKey {
        SecretKey::from_seed(&[seed; 32]).public_key()
    }

    fn gateway_args(scripts: &ReferenceScripts, mode: GatewayMode) -> GatewaySpendArgs {
        let gateway_hash = tree_hash(&scripts.gateway_script().unwrap()).unwrap();
        let mode_key = pk(2);
        GatewaySpendArgs {
            mode,
            issuance_script: scripts.issuance_script(&pk(1), &Bytes32::new([7; 32])).unwrap(),
            delegated_script: scripts.delegated_script(mode, &gateway_hash, Some(&mode_key)).unwrap(),
            metadata: metadata_program(&[("bn".into(), b"Acme".to_vec())]).unwrap(),
            amount: 1000,
            to_puzzle_hash: mode.is_mint().then_some(Bytes32::new([8; 32])),
            from_puzzle_hash: None,
        }
    }

    fn gateway_spend(scripts: &ReferenceScripts, args: &GatewaySpendArgs) -> CoinSpend {
        let asset_id = tree_hash(&args.issuance_script).unwrap();
        let puzzle = scripts
            .tracked_asset_script(&asset_id, &scripts.gateway_script().unwrap())
            .unwrap();
        let coin = Coin::new(Bytes32::new([9; 32]), tree_hash(&puzzle).unwrap(), args.amount);
        CoinSpend::new(coin, puzzle, scripts.gateway_solution(args).unwrap())
    }

    #[test]
    fn tracked_hash_from_inner_hash_matches_full_tree_hash() {
        let scripts = ReferenceScripts::new();
        let inner = scripts.standard_script(&pk(3)).unwrap();
        let asset_id = Bytes32::new([4; 32]);
        assert_eq!(
            tree_hash(&scripts.tracked_asset_script(&asset_id, &inner).unwrap()).unwrap(),
            scripts.tracked_asset_script_hash(&asset_id, &tree_hash(&inner).unwrap())
        );
    }

    #[test]
    fn match_tracked_asset_unwraps() {
        let scripts = ReferenceScripts::new();
        let inner = scripts.gateway_script().unwrap();
        let wrapped = scripts.tracked_asset_script(&Bytes32::new([5; 32]), &inner).unwrap();
        assert_eq!(scripts.match_tracked_asset(&wrapped), Some((Bytes32::new([5; 32]), inner.clone())));
        assert_eq!(scripts.match_tracked_asset(&inner), None);
    }

    #[test]
    fn retirement_delegation_carries_no_key() {
        let scripts = ReferenceScripts::new();
        let gateway_hash = tree_hash(&scripts.gateway_script().unwrap()).unwrap();
        let with_key = scripts
            .delegated_script(GatewayMode::PermissionlessRetirement, &gateway_hash, Some(&pk(1)))
            .unwrap();
        let without = scripts
            .delegated_script(GatewayMode::PermissionlessRetirement, &gateway_hash, None)
            .unwrap();
        assert_eq!(with_key, without);
    }

    #[test]
    fn parse_gateway_spend_recovers_mode_and_issuance_layer() {
        let scripts = ReferenceScripts::new();
        for mode in GatewayMode::ALL {
            let args = gateway_args(&scripts, mode);
            let spend = gateway_spend(&scripts, &args);
            let (parsed_mode, issuance_spend) = scripts.parse_gateway_spend(&spend, true).unwrap();
            assert_eq!(parsed_mode, mode);
            assert_eq!(issuance_spend.puzzle_reveal, args.issuance_script);
            let (delegated, (metadata, _)) =
                from_program::<IssuanceSolutionShape>(&issuance_spend.solution).unwrap();
            assert_eq!(delegated, args.delegated_script);
            assert_eq!(metadata, args.metadata);
        }
    }

    #[test]
    fn parse_rejects_non_gateway_coins() {
        let scripts = ReferenceScripts::new();
        let inner = scripts.standard_script(&pk(1)).unwrap();
        let puzzle = scripts.tracked_asset_script(&Bytes32::new([1; 32]), &inner).unwrap();
        let spend = CoinSpend::new(
            Coin::new(Bytes32::new([0; 32]), tree_hash(&puzzle).unwrap(), 1),
            puzzle,
            scripts.tracked_asset_solution(&nil()).unwrap(),
        );
        assert_eq!(
            scripts.parse_gateway_spend(&spend, true).unwrap_err(),
            ScriptError::NotAGatewaySpend
        );
    }

    #[test]
    fn mint_spend_requires_root_and_mode_signatures() {
        let scripts = ReferenceScripts::new();
        let args = gateway_args(&scripts, GatewayMode::Tokenization);
        let spend = gateway_spend(&scripts, &args);
        let conditions = scripts.conditions(&spend).unwrap();

        let asset_id = tree_hash(&args.issuance_script).unwrap();
        let expected_output = scripts.tracked_asset_script_hash(&asset_id, &Bytes32::new([8; 32]));
        assert!(conditions.iter().any(|c| matches!(
            c,
            Condition::CreateCoin { puzzle_hash, amount: 1000, .. } if *puzzle_hash == expected_output
        )));

        let message = tree_hash(
            &to_program(&clvm_list!(Bytes32::new([7; 32]), &args.delegated_script)).unwrap(),
        )
        .unwrap();
        assert!(conditions.contains(&Condition::AggSigUnsafe {
            public_key: pk(1),
            message: message.to_vec(),
        }));
        assert!(conditions
            .iter()
            .any(|c| matches!(c, Condition::AggSigMe { public_key, .. } if *public_key == pk(2))));
    }

    #[test]
    fn retirement_spend_requires_only_the_root_delegation() {
        let scripts = ReferenceScripts::new();
        let args = gateway_args(&scripts, GatewayMode::PermissionlessRetirement);
        let conditions = scripts.conditions(&gateway_spend(&scripts, &args)).unwrap();
        assert_eq!(conditions.len(), 1);
        assert!(matches!(conditions[0], Condition::AggSigUnsafe { .. }));
    }

    #[test]
    fn standard_spend_signs_its_solution() {
        let scripts = ReferenceScripts::new();
        let puzzle = scripts.standard_script(&pk(6)).unwrap();
        let solution = scripts
            .standard_solution(&[Condition::ReserveFee { amount: 5 }])
            .unwrap();
        let spend = CoinSpend::new(
            Coin::new(Bytes32::new([0; 32]), tree_hash(&puzzle).unwrap(), 5),
            puzzle,
            solution.clone(),
        );
        let conditions = scripts.conditions(&spend).unwrap();
        assert_eq!(
            conditions,
            vec![
                Condition::AggSigMe { public_key: pk(6), message: tree_hash(&solution).unwrap().to_vec() },
                Condition::ReserveFee { amount: 5 },
            ]
        );
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let scripts = ReferenceScripts::new();
        let puzzle = to_program(&clvm_list!("mystery")).unwrap();
        let spend = CoinSpend::new(Coin::new(Bytes32::new([0; 32]), Bytes32::new([0; 32]), 1), puzzle, nil());
        assert!(matches!(scripts.conditions(&spend), Err(ScriptError::Malformed(_))));
    }
}
