//! Interactive `/setup` wizard.

pub mod session;
pub mod wizard;

pub use session::{SessionStore, SetupChoices, SetupStep, SWEEP_INTERVAL};
pub use wizard::{SettingsApplier, SetupWizard, WizardInput, WizardReply};
