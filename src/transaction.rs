//! Programmable transaction drafts.
//!
//! A draft is an ordered list of commands over a table of inputs. Commands
//! refer to inputs and to the outputs of earlier commands through
//! [`Argument`]s; the ledger executes them in order, all or nothing.

use crate::{
    ledger::{
        Address,
        ObjectId,
    },
    planner::{
        ConsolidationPlan,
        Remainder,
        TokenSource,
    },
};
use itertools::Itertools;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::HashSet,
    fmt,
};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Argument {
    /// The coin paying for gas, in native currency.
    GasCoin,
    Input(u16),
    Result(u16),
    NestedResult(u16, u16),
}

impl Argument {
    fn command_index(&self) -> Option<u16> {
        match self {
            Argument::Result(i) | Argument::NestedResult(i, _) => Some(*i),
            Argument::GasCoin | Argument::Input(_) => None,
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::GasCoin => write!(f, "gas"),
            Argument::Input(i) => write!(f, "input#{i}"),
            Argument::Result(i) => write!(f, "result#{i}"),
            Argument::NestedResult(i, j) => write!(f, "result#{i}.{j}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PureValue {
    U64(u64),
    Address(Address),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallArg {
    Object(ObjectId),
    Pure(PureValue),
}

/// Fully qualified `package::module::function`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveTarget {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
}

impl fmt::Display for MoveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.package, self.module, self.function)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    MoveCall {
        target: MoveTarget,
        arguments: Vec<Argument>,
    },
    SplitCoins {
        coin: Argument,
        amounts: Vec<Argument>,
    },
    MergeCoins {
        destination: Argument,
        sources: Vec<Argument>,
    },
    TransferObjects {
        objects: Vec<Argument>,
        address: Argument,
    },
}

impl Command {
    fn arguments(&self) -> Vec<Argument> {
        match self {
            Command::MoveCall { arguments, .. } => arguments.clone(),
            Command::SplitCoins { coin, amounts } => {
                std::iter::once(*coin).chain(amounts.iter().copied()).collect()
            }
            Command::MergeCoins {
                destination,
                sources,
            } => std::iter::once(*destination)
                .chain(sources.iter().copied())
                .collect(),
            Command::TransferObjects { objects, address } => objects
                .iter()
                .copied()
                .chain(std::iter::once(*address))
                .collect(),
        }
    }

    /// Arguments the ledger takes by value and that cannot be named again.
    fn moved_arguments(&self) -> &[Argument] {
        match self {
            Command::MergeCoins { sources, .. } => sources,
            Command::TransferObjects { objects, .. } => objects,
            Command::MoveCall { .. } | Command::SplitCoins { .. } => &[],
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::MoveCall { target, arguments } => {
                write!(f, "call {}({})", target.function, arguments.iter().join(", "))
            }
            Command::SplitCoins { coin, amounts } => {
                write!(f, "split {coin} by [{}]", amounts.iter().join(", "))
            }
            Command::MergeCoins {
                destination,
                sources,
            } => write!(f, "merge [{}] into {destination}", sources.iter().join(", ")),
            Command::TransferObjects { objects, address } => {
                write!(f, "transfer [{}] to {address}", objects.iter().join(", "))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("no gas budget set")]
    MissingGasBudget,
    #[error("command #{command} refers to {argument}, which does not exist yet")]
    ForwardReference { command: usize, argument: Argument },
    #[error("command #{command} refers to missing {argument}")]
    UnknownArgument { command: usize, argument: Argument },
    #[error("command #{command} uses {argument} after it was moved")]
    UseAfterMove { command: usize, argument: Argument },
    #[error("command #{command} merges {argument} into itself")]
    SelfMerge { command: usize, argument: Argument },
    #[error("command #{command} uses {argument} as a single value but it has several")]
    AmbiguousResult { command: usize, argument: Argument },
}

/// A built transaction, ready for signing. Immutable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDraft {
    sender: Address,
    gas_budget: u64,
    inputs: Vec<CallArg>,
    commands: Vec<Command>,
}

impl TransactionDraft {
    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn gas_budget(&self) -> u64 {
        self.gas_budget
    }

    pub fn inputs(&self) -> &[CallArg] {
        &self.inputs
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn input(&self, argument: Argument) -> Option<&CallArg> {
        match argument {
            Argument::Input(i) => self.inputs.get(i as usize),
            _ => None,
        }
    }

    /// Lines like `0: split gas by [input#0]`, for logs.
    pub fn describe(&self) -> String {
        self.commands
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{i}: {c}"))
            .join("\n")
    }
}

#[derive(Debug)]
pub struct TransactionBuilder {
    sender: Address,
    gas_budget: Option<u64>,
    inputs: Vec<CallArg>,
    commands: Vec<Command>,
}

impl TransactionBuilder {
    pub fn new(sender: Address) -> Self {
        Self {
            sender,
            gas_budget: None,
            inputs: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn set_gas_budget(&mut self, budget: u64) -> &mut Self {
        self.gas_budget = Some(budget);
        self
    }

    pub fn gas(&self) -> Argument {
        Argument::GasCoin
    }

    /// The same object id always maps to the same input.
    pub fn object(&mut self, id: ObjectId) -> Argument {
        let existing = self
            .inputs
            .iter()
            .position(|input| matches!(input, CallArg::Object(o) if *o == id));
        match existing {
            Some(index) => Argument::Input(index as u16),
            None => self.push_input(CallArg::Object(id)),
        }
    }

    pub fn pure_u64(&mut self, value: u64) -> Argument {
        self.push_input(CallArg::Pure(PureValue::U64(value)))
    }

    pub fn pure_address(&mut self, value: Address) -> Argument {
        self.push_input(CallArg::Pure(PureValue::Address(value)))
    }

    pub fn move_call(&mut self, target: MoveTarget, arguments: Vec<Argument>) -> Argument {
        self.push_command(Command::MoveCall { target, arguments })
    }

    pub fn split_coins(&mut self, coin: Argument, amounts: &[u64]) -> Vec<Argument> {
        let amounts: Vec<_> = amounts.iter().map(|a| self.pure_u64(*a)).collect();
        let index = self.commands.len() as u16;
        let count = amounts.len() as u16;
        self.commands.push(Command::SplitCoins { coin, amounts });
        (0..count).map(|j| Argument::NestedResult(index, j)).collect()
    }

    pub fn split_coin(&mut self, coin: Argument, amount: u64) -> Argument {
        self.split_coins(coin, &[amount])[0]
    }

    /// Merging nothing emits no command.
    pub fn merge_coins(&mut self, destination: Argument, sources: Vec<Argument>) {
        if sources.is_empty() {
            return;
        }
        self.commands.push(Command::MergeCoins {
            destination,
            sources,
        });
    }

    pub fn transfer_objects(&mut self, objects: Vec<Argument>, recipient: Address) {
        let address = self.pure_address(recipient);
        self.commands
            .push(Command::TransferObjects { objects, address });
    }

    pub fn token_argument(&mut self, source: &TokenSource) -> Argument {
        match source {
            TokenSource::Holding(holding) => self.object(holding.object_id()),
            TokenSource::Pending(pending) => pending.argument(),
        }
    }

    /// Emit the merges, the payment split and the remainder transfer a plan
    /// calls for, in that order. Returns the payment coin, if any.
    pub fn apply_plan(
        &mut self,
        plan: &ConsolidationPlan,
        owner: Address,
    ) -> Option<Argument> {
        let target = self.token_argument(plan.merge_target());
        let sources = plan
            .merge_sources()
            .iter()
            .map(|source| self.token_argument(source))
            .collect();
        self.merge_coins(target, sources);
        let payment = plan
            .payment_amount()
            .map(|amount| self.split_coin(target, amount));
        if plan.remainder() == Remainder::TransferToOwner {
            self.transfer_objects(vec![target], owner);
        }
        payment
    }

    pub fn build(self) -> Result<TransactionDraft, BuildError> {
        let gas_budget = self.gas_budget.ok_or(BuildError::MissingGasBudget)?;
        let mut moved = HashSet::new();
        for (index, command) in self.commands.iter().enumerate() {
            for argument in command.arguments() {
                self.check_argument(index, argument)?;
                if moved.contains(&argument) {
                    return Err(BuildError::UseAfterMove {
                        command: index,
                        argument,
                    });
                }
            }
            if let Command::MergeCoins {
                destination,
                sources,
            } = command
            {
                if sources.contains(destination) {
                    return Err(BuildError::SelfMerge {
                        command: index,
                        argument: *destination,
                    });
                }
            }
            for argument in command.moved_arguments() {
                if !moved.insert(*argument) {
                    return Err(BuildError::UseAfterMove {
                        command: index,
                        argument: *argument,
                    });
                }
            }
        }
        Ok(TransactionDraft {
            sender: self.sender,
            gas_budget,
            inputs: self.inputs,
            commands: self.commands,
        })
    }

    fn check_argument(&self, command: usize, argument: Argument) -> Result<(), BuildError> {
        if let Argument::Input(i) = argument {
            if i as usize >= self.inputs.len() {
                return Err(BuildError::UnknownArgument { command, argument });
            }
            return Ok(());
        }
        let Some(producer) = argument.command_index() else {
            return Ok(());
        };
        if producer as usize >= command {
            return Err(BuildError::ForwardReference { command, argument });
        }
        if let Command::SplitCoins { amounts, .. } = &self.commands[producer as usize] {
            match argument {
                Argument::Result(_) if amounts.len() != 1 => {
                    return Err(BuildError::AmbiguousResult { command, argument });
                }
                Argument::NestedResult(_, j) if j as usize >= amounts.len() => {
                    return Err(BuildError::UnknownArgument { command, argument });
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn push_input(&mut self, input: CallArg) -> Argument {
        self.inputs.push(input);
        Argument::Input((self.inputs.len() - 1) as u16)
    }

    fn push_command(&mut self, command: Command) -> Argument {
        self.commands.push(command);
        Argument::Result((self.commands.len() - 1) as u16)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::{
        locator::TokenHolding,
        ledger::ObjectRef,
        planner::{
            PendingTokenResult,
            plan,
        },
    };

    fn sender() -> Address {
        "0xa11ce".parse().unwrap()
    }

    fn target(function: &str) -> MoveTarget {
        MoveTarget {
            package: "0xb0b".parse().unwrap(),
            module: "brownie".into(),
            function: function.into(),
        }
    }

    fn holding(id: &str) -> TokenHolding {
        TokenHolding::new(ObjectRef {
            object_id: id.parse().unwrap(),
            version: 1,
            digest: "digest".into(),
            type_tag: "0x2::coin::Coin<0xb0b::brownie::BROWNIE>".into(),
        })
    }

    #[test]
    fn object__reuses_input_for_same_id() {
        let mut tx = TransactionBuilder::new(sender());
        let id: ObjectId = "0x42".parse().unwrap();

        let first = tx.object(id);
        let second = tx.object(id);

        assert_eq!(first, second);
        assert_eq!(1, tx.inputs.len());
    }

    #[test]
    fn build__fails_without_gas_budget() {
        let tx = TransactionBuilder::new(sender());

        assert_eq!(Err(BuildError::MissingGasBudget), tx.build());
    }

    #[test]
    fn build__preserves_command_order() {
        // given
        let mut tx = TransactionBuilder::new(sender());
        tx.set_gas_budget(100);
        let payment = tx.split_coin(tx.gas(), 5);
        let inc = tx.object("0x1".parse().unwrap());
        tx.move_call(target("get_baking_account"), vec![inc, payment]);

        // when
        let draft = tx.build().unwrap();

        // then
        assert_eq!(2, draft.commands().len());
        assert!(matches!(draft.commands()[0], Command::SplitCoins { .. }));
        assert!(matches!(draft.commands()[1], Command::MoveCall { .. }));
        assert_eq!(100, draft.gas_budget());
    }

    #[test]
    fn build__rejects_use_after_merge() {
        // given
        let mut tx = TransactionBuilder::new(sender());
        tx.set_gas_budget(1);
        let a = tx.object("0xa".parse().unwrap());
        let b = tx.object("0xb".parse().unwrap());
        tx.merge_coins(a, vec![b]);
        tx.split_coin(b, 1);

        // when
        let result = tx.build();

        // then
        assert_eq!(
            Err(BuildError::UseAfterMove {
                command: 1,
                argument: b
            }),
            result
        );
    }

    #[test]
    fn build__rejects_self_merge() {
        let mut tx = TransactionBuilder::new(sender());
        tx.set_gas_budget(1);
        let a = tx.object("0xa".parse().unwrap());
        tx.merge_coins(a, vec![a]);

        assert!(matches!(tx.build(), Err(BuildError::SelfMerge { .. })));
    }

    #[test]
    fn build__rejects_forward_reference() {
        let mut tx = TransactionBuilder::new(sender());
        tx.set_gas_budget(1);
        tx.move_call(target("bake_by_hand"), vec![Argument::Result(3)]);

        assert!(matches!(
            tx.build(),
            Err(BuildError::ForwardReference { command: 0, .. })
        ));
    }

    #[test]
    fn build__rejects_single_result_of_multi_split() {
        let mut tx = TransactionBuilder::new(sender());
        tx.set_gas_budget(1);
        tx.split_coins(Argument::GasCoin, &[1, 2]);
        tx.transfer_objects(vec![Argument::Result(0)], sender());

        assert!(matches!(
            tx.build(),
            Err(BuildError::AmbiguousResult { .. })
        ));
    }

    #[test]
    fn merge_coins__emits_nothing_for_empty_sources() {
        let mut tx = TransactionBuilder::new(sender());
        let a = tx.object("0xa".parse().unwrap());

        tx.merge_coins(a, vec![]);

        assert!(tx.commands.is_empty());
    }

    #[test]
    fn apply_plan__merges_then_splits_first_holding() {
        // given
        let mut tx = TransactionBuilder::new(sender());
        tx.set_gas_budget(1);
        let fresh = tx.move_call(target("claim_brownies"), vec![]);
        let plan = plan(
            vec![holding("0x1"), holding("0x2")],
            Some(PendingTokenResult::new(fresh)),
            Some(30),
        )
        .unwrap();

        // when
        let payment = tx.apply_plan(&plan, sender()).unwrap();
        let draft = tx.build().unwrap();

        // then
        let first = Argument::Input(0);
        let second = Argument::Input(1);
        assert_eq!(
            Command::MergeCoins {
                destination: first,
                sources: vec![second, fresh],
            },
            draft.commands()[1]
        );
        assert_eq!(
            Command::SplitCoins {
                coin: first,
                amounts: vec![Argument::Input(2)],
            },
            draft.commands()[2]
        );
        assert_eq!(Argument::NestedResult(2, 0), payment);
        assert_eq!(3, draft.commands().len());
    }

    #[test]
    fn apply_plan__transfers_remainder_of_fresh_result_without_holdings() {
        // given
        let mut tx = TransactionBuilder::new(sender());
        tx.set_gas_budget(1);
        let fresh = tx.move_call(target("claim_brownies"), vec![]);
        let plan = plan(vec![], Some(PendingTokenResult::new(fresh)), Some(7)).unwrap();

        // when
        tx.apply_plan(&plan, sender()).unwrap();
        let draft = tx.build().unwrap();

        // then
        assert_eq!(
            Command::TransferObjects {
                objects: vec![fresh],
                address: Argument::Input(1),
            },
            draft.commands()[2]
        );
        assert_eq!(
            Some(&CallArg::Pure(PureValue::Address(sender()))),
            draft.input(Argument::Input(1))
        );
    }

    #[test]
    fn draft__survives_json_round_trip() {
        let mut tx = TransactionBuilder::new(sender());
        tx.set_gas_budget(9);
        let coin = tx.split_coin(tx.gas(), 3);
        tx.transfer_objects(vec![coin], sender());
        let draft = tx.build().unwrap();

        let json = serde_json::to_string(&draft).unwrap();
        let back: TransactionDraft = serde_json::from_str(&json).unwrap();

        assert_eq!(draft, back);
        assert_eq!("0: split gas by [input#0]\n1: transfer [result#0.0] to input#1", draft.describe());
    }
}
