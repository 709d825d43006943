//! Confirmation callbacks used by the orchestrator for branch decisions.
//!
//! The library never presents anything itself: every question goes through a
//! [`Confirmer`] supplied by the caller, which answers with one of a closed
//! set of [`Choice`]s.

/// Answer to a [`Prompt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Primary,
    Secondary,
    Destructive,
    Cancel,
}

/// Questions the orchestrator may ask.
///
/// | Prompt | Primary | Secondary | Destructive |
/// |---|---|---|---|
/// | `Downgrade` | overwrite, stashing the installed version | keep both, storing the incoming one | same as Primary |
/// | `OverwriteFile` | overwrite | cancel | cancel |
/// | `UninstallSingle` | delete | cancel | delete |
/// | `UninstallMulti` | remove everything | open the version picker | remove everything |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt<'a> {
    Downgrade {
        display_name: &'a str,
        installed: &'a str,
        incoming: &'a str,
    },
    OverwriteFile {
        file_name: &'a str,
    },
    UninstallSingle {
        display_name: &'a str,
    },
    UninstallMulti {
        display_name: &'a str,
        active_version: &'a str,
        stored: &'a [String],
    },
}

impl Prompt<'_> {
    pub fn title(&self) -> &'static str {
        match self {
            Prompt::Downgrade { .. } => "Older version",
            Prompt::OverwriteFile { .. } => "File exists",
            Prompt::UninstallSingle { .. } | Prompt::UninstallMulti { .. } => "Confirm uninstall",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Prompt::Downgrade {
                display_name,
                installed,
                incoming,
            } => format!(
                "{display_name} {installed} is installed; the incoming version is older ({incoming})."
            ),
            Prompt::OverwriteFile { file_name } => {
                format!("'{file_name}' already exists in plugins. Overwrite?")
            }
            Prompt::UninstallSingle { display_name } => format!("Remove {display_name}?"),
            Prompt::UninstallMulti {
                display_name,
                active_version,
                stored,
            } => format!(
                "{display_name} {active_version} is active and {} other version(s) are stored: {}.",
                stored.len(),
                stored.join(", ")
            ),
        }
    }

    /// Labels for the choices that make sense for this prompt.
    pub fn options(&self) -> Vec<(Choice, &'static str)> {
        match self {
            Prompt::Downgrade { .. } => vec![
                (Choice::Primary, "Overwrite (downgrade)"),
                (Choice::Secondary, "Keep both"),
                (Choice::Cancel, "Cancel"),
            ],
            Prompt::OverwriteFile { .. } => {
                vec![(Choice::Primary, "Overwrite"), (Choice::Cancel, "Cancel")]
            }
            Prompt::UninstallSingle { .. } => {
                vec![(Choice::Destructive, "Remove"), (Choice::Cancel, "Cancel")]
            }
            Prompt::UninstallMulti { .. } => vec![
                (Choice::Destructive, "Remove all versions"),
                (Choice::Secondary, "Choose versions..."),
                (Choice::Cancel, "Cancel"),
            ],
        }
    }
}

/// Result of the multi-version uninstall picker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSelection {
    /// Stored versions to delete.
    pub remove: Vec<String>,
    /// Stored version to switch to before pruning.
    pub keep_as_active: Option<String>,
}

impl VersionSelection {
    /// Versions to delete, never including the one kept as active.
    pub fn effective_removals(&self) -> Vec<&str> {
        self.remove
            .iter()
            .filter(|v| {
                self.keep_as_active
                    .as_deref()
                    .map_or(true, |keep| !keep.eq_ignore_ascii_case(v))
            })
            .map(String::as_str)
            .collect()
    }
}

pub trait Confirmer {
    fn ask_choice(&mut self, prompt: &Prompt<'_>) -> Choice;

    /// Shows the per-version picker; `None` cancels.
    fn pick_versions(
        &mut self,
        display_name: &str,
        active_version: &str,
        stored: &[String],
    ) -> Option<VersionSelection>;
}

/// Answers every prompt with the same choice and never picks versions.
#[derive(Debug, Clone, Copy)]
pub struct FixedChoice(pub Choice);

impl Confirmer for FixedChoice {
    fn ask_choice(&mut self, prompt: &Prompt<'_>) -> Choice {
        tracing::debug!(prompt = prompt.title(), choice = ?self.0, "answered without asking");
        self.0
    }

    fn pick_versions(&mut self, _: &str, _: &str, _: &[String]) -> Option<VersionSelection> {
        None
    }
}
