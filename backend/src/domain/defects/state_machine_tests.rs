//! Regression coverage for the defect transition table.

use std::collections::BTreeSet;

use rstest::{fixture, rstest};

use super::*;
use crate::domain::ErrorCode;

#[fixture]
fn machine() -> DefectStateMachine {
    DefectStateMachine
}

/// The current workflow, written out independently of the table constants.
fn canonical_edges() -> BTreeSet<(DefectStatus, DefectStatus)> {
    use DefectStatus::*;
    [
        (New, Diagnosing),
        (New, Cancelled),
        (Diagnosing, WaitingParts),
        (Diagnosing, Repairing),
        (Diagnosing, SentToVendor),
        (Diagnosing, Cancelled),
        (WaitingParts, Repairing),
        (WaitingParts, SentToVendor),
        (WaitingParts, Scrapped),
        (WaitingParts, Cancelled),
        (Repairing, SentToVendor),
        (Repairing, Resolved),
        (Repairing, Scrapped),
        (SentToVendor, Returned),
        (SentToVendor, Cancelled),
        (Returned, Repairing),
        (Returned, Resolved),
        (Returned, Scrapped),
        (Resolved, Closed),
    ]
    .into_iter()
    .collect()
}

#[rstest]
fn canonical_grid_matches_table(machine: DefectStateMachine) {
    let canonical = canonical_edges();
    let current = [
        DefectStatus::New,
        DefectStatus::Diagnosing,
        DefectStatus::WaitingParts,
        DefectStatus::Repairing,
        DefectStatus::SentToVendor,
        DefectStatus::Returned,
        DefectStatus::Resolved,
        DefectStatus::Closed,
        DefectStatus::Scrapped,
        DefectStatus::Cancelled,
    ];
    for from in current {
        for to in current {
            let expected = from == to || canonical.contains(&(from, to));
            let result = machine.assert_transition(from, to);
            assert_eq!(
                result.is_ok(),
                expected,
                "unexpected legality for {from} -> {to}"
            );
            if let Err(error) = result {
                assert_eq!(error.code(), ErrorCode::IllegalTransition);
            }
        }
    }
}

#[rstest]
fn full_grid_agrees_with_available_actions(machine: DefectStateMachine) {
    for &from in DefectStatus::ALL {
        let targets: BTreeSet<DefectStatus> = machine
            .available_actions(from)
            .iter()
            .map(|transition| transition.next)
            .collect();
        for &to in DefectStatus::ALL {
            let expected = from == to || targets.contains(&to);
            assert_eq!(machine.can_transition(from, to), expected, "{from} -> {to}");
            assert_eq!(machine.assert_transition(from, to).is_ok(), expected);
        }
    }
}

#[rstest]
#[case(DefectStatus::Closed)]
#[case(DefectStatus::Scrapped)]
#[case(DefectStatus::Cancelled)]
fn terminal_statuses_offer_nothing(machine: DefectStateMachine, #[case] status: DefectStatus) {
    assert!(machine.available_actions(status).is_empty());
    let error = machine
        .ensure_mutable(status)
        .expect_err("terminal records are immutable");
    assert_eq!(error.code(), ErrorCode::IllegalTransition);
}

#[rstest]
fn every_status_is_reachable_from_new_or_a_legacy_entry(machine: DefectStateMachine) {
    let mut reached = BTreeSet::from([
        DefectStatus::New,
        DefectStatus::PendingDiagnosis,
        DefectStatus::Repeated,
    ]);
    let mut frontier: Vec<DefectStatus> = reached.iter().copied().collect();
    while let Some(status) = frontier.pop() {
        for transition in machine.available_actions(status) {
            if reached.insert(transition.next) {
                frontier.push(transition.next);
            }
        }
    }
    for &status in DefectStatus::ALL {
        if status == DefectStatus::RepairedLocally {
            // Only ever written by the retired approval screens.
            continue;
        }
        assert!(reached.contains(&status), "{status} is unreachable");
    }
}

#[rstest]
#[case(DefectStatus::Diagnosing, DefectAction::SendToVendor, Some(DefectStatus::SentToVendor))]
#[case(DefectStatus::Diagnosed, DefectAction::SendToVendor, Some(DefectStatus::InVendorRepair))]
#[case(DefectStatus::SubstituteIssued, DefectAction::ReturnSubstitute, Some(DefectStatus::Repairing))]
#[case(DefectStatus::Resolved, DefectAction::Scrap, None)]
#[case(DefectStatus::New, DefectAction::Resolve, None)]
fn target_for_resolves_named_actions(
    machine: DefectStateMachine,
    #[case] status: DefectStatus,
    #[case] action: DefectAction,
    #[case] expected: Option<DefectStatus>,
) {
    assert_eq!(machine.target_for(status, action), expected);
}

#[rstest]
fn actions_keep_table_order(machine: DefectStateMachine) {
    let actions: Vec<DefectAction> = machine
        .available_actions(DefectStatus::Diagnosing)
        .iter()
        .map(|transition| transition.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            DefectAction::CompleteDiagnosis,
            DefectAction::StartRepair,
            DefectAction::SendToVendor,
            DefectAction::Cancel,
        ]
    );
}

#[rstest]
fn illegal_transition_carries_both_statuses(machine: DefectStateMachine) {
    let error = machine
        .assert_transition(DefectStatus::Scrapped, DefectStatus::Resolved)
        .expect_err("scrapped records never resolve");
    let details = error.details().expect("details attached");
    assert_eq!(details["from"], "SCRAPPED");
    assert_eq!(details["to"], "RESOLVED");
}
