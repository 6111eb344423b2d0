use anyhow::Result;
use tracing::info;

use crate::error::BootstrapError;
use crate::prompt::Prompter;
use crate::repository::Repository;
use crate::ui;

/// Git user identity as stored in the global configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub name: String,
    pub email: String,
}

/// What [`ensure`] had to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityOutcome {
    pub identity: UserIdentity,
    pub prompted_name: bool,
    pub prompted_email: bool,
}

impl IdentityOutcome {
    pub fn was_configured(&self) -> bool {
        !self.prompted_name && !self.prompted_email
    }
}

/// Make sure global `user.name` and `user.email` are set.
///
/// Each missing field is asked for exactly once and written globally before
/// moving on; the two fields are handled independently. The current identity
/// is echoed only when both were already present.
pub fn ensure(repo: &Repository, prompter: &mut dyn Prompter) -> Result<IdentityOutcome> {
    let (name, prompted_name) = ensure_field(repo, prompter, "user.name", "name", "Your full name:")?;
    let (email, prompted_email) =
        ensure_field(repo, prompter, "user.email", "email", "Your email address:")?;

    let outcome = IdentityOutcome {
        identity: UserIdentity { name, email },
        prompted_name,
        prompted_email,
    };

    if outcome.was_configured() {
        ui::info(format!(
            "Using git identity {} <{}>",
            outcome.identity.name, outcome.identity.email
        ));
    }

    Ok(outcome)
}

fn ensure_field(
    repo: &Repository,
    prompter: &mut dyn Prompter,
    key: &str,
    field: &'static str,
    question: &str,
) -> Result<(String, bool)> {
    if let Some(value) = repo.global_config(key)? {
        return Ok((value, false));
    }

    let answer = prompter.ask(question)?;
    if answer.is_empty() {
        return Err(BootstrapError::EmptyIdentity { field }.into());
    }

    repo.set_global_config(key, &answer)?;
    info!(key, "stored global git identity field");
    Ok((answer, true))
}
