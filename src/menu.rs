//! Interactive session state machine.
//!
//! The menu loop is modeled as a pure finite state machine so the
//! cancel/confirm semantics can be tested without any terminal I/O. The
//! driver in `main.rs` renders the current state, translates user input
//! into `MenuInput`, applies `transition`, and performs the returned
//! effect. Cancel always returns to the menu; leaving the session requires
//! explicit confirmation.

use crate::step::StepId;

/// Session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    /// Top-level menu, the session's resting point.
    Menu,
    /// Choosing a single step to run.
    StepSelect,
    /// A step (Some) or auto-continue pass (None) is executing.
    Running(Option<StepId>),
    /// Validation pass is executing.
    Validating,
    /// Exit requested, awaiting confirmation.
    ConfirmExit,
}

/// Translated user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuInput {
    ChooseStepSelect,
    ChooseContinue,
    ChooseValidate,
    ChooseExit,
    PickStep(StepId),
    /// Esc / empty line: back out of the current screen.
    Cancel,
    ConfirmYes,
    ConfirmNo,
    /// The running step or validation pass finished (any outcome).
    WorkFinished,
}

/// Side effect the driver must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEffect {
    RunStep(StepId),
    AutoContinue,
    RunValidation,
    ExitSession,
}

/// Apply one input to the current state. Pure: same (state, input) pair
/// always yields the same (state, effect). Inputs that make no sense in the
/// current state leave it unchanged with no effect.
pub fn transition(state: MenuState, input: MenuInput) -> (MenuState, Option<MenuEffect>) {
    match (state, input) {
        (MenuState::Menu, MenuInput::ChooseStepSelect) => (MenuState::StepSelect, None),
        (MenuState::Menu, MenuInput::ChooseContinue) => {
            (MenuState::Running(None), Some(MenuEffect::AutoContinue))
        }
        (MenuState::Menu, MenuInput::ChooseValidate) => {
            (MenuState::Validating, Some(MenuEffect::RunValidation))
        }
        (MenuState::Menu, MenuInput::ChooseExit | MenuInput::Cancel) => {
            (MenuState::ConfirmExit, None)
        }

        (MenuState::StepSelect, MenuInput::PickStep(id)) => {
            (MenuState::Running(Some(id)), Some(MenuEffect::RunStep(id)))
        }
        (MenuState::StepSelect, MenuInput::Cancel) => (MenuState::Menu, None),

        (MenuState::Running(_), MenuInput::WorkFinished) => (MenuState::Menu, None),
        (MenuState::Validating, MenuInput::WorkFinished) => (MenuState::Menu, None),

        (MenuState::ConfirmExit, MenuInput::ConfirmYes) => {
            (MenuState::Menu, Some(MenuEffect::ExitSession))
        }
        (MenuState::ConfirmExit, MenuInput::ConfirmNo | MenuInput::Cancel) => {
            (MenuState::Menu, None)
        }

        (state, _) => (state, None),
    }
}
