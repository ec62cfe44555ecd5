use clap::ValueEnum;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum ConfigAction {
    /// Print the bundled default config
    Show,
    /// Install the default config in the user config directory
    User,
    /// Install the default config in /etc/provreq
    System,
}

impl ConfigAction {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            ConfigAction::Show => "show",
            ConfigAction::User => "user",
            ConfigAction::System => "system",
        }
    }
}
