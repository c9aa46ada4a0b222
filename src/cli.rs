use clap::{Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    #[command(subcommand)]
    pub(crate) command: ToolchestCommand,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum ToolchestCommand {
    /// Creates the toolchest directory layout, config and registry
    Init,
    /// Downloads, verifies and installs a tool version: <tool>@<version> (or <tool>@latest)
    Install {
        spec: String,
    },
    /// Removes an installed tool version, its files and its registry entry
    Uninstall {
        spec: String,
        /// Skip the confirmation prompt
        #[clap(short, long)]
        force: bool,
    },
    /// Activates an installed version by updating the tool's symlink
    Use {
        spec: String,
    },
    /// Lists installed tools and versions, the active one marked. With a name, only that tool
    List {
        tool: Option<String>,
        /// List versions published upstream instead of installed ones
        #[clap(long)]
        remote: bool,
    },
    /// Shows details about the active version of a tool
    Info {
        tool: String,
    },
}
