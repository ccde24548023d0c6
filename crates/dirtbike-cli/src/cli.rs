use std::path::PathBuf;

use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(
    name = "dirtbike",
    author,
    version,
    about = "Turn a Python package installed by the OS package manager back into a wheel"
)]
#[allow(clippy::struct_excessive_bools)]
pub struct DirtbikeCli {
    /// Importable name of the installed package (e.g. `six`, `pkg_resources`)
    pub package: String,
    #[arg(
        short,
        long,
        value_name = "DIR",
        help = "Write the wheel here (default: $DIRTBIKE_DIRECTORY, then the current directory)"
    )]
    pub directory: Option<PathBuf>,
    #[arg(
        long,
        value_name = "PATH",
        help = "Python interpreter whose view is converted (default: $DIRTBIKE_PYTHON, python3, python)"
    )]
    pub python: Option<PathBuf>,
    #[arg(
        long,
        value_name = "DIR",
        help = "dpkg administrative directory (default: $DIRTBIKE_DPKG_ADMINDIR or /var/lib/dpkg)"
    )]
    pub admindir: Option<PathBuf>,
    #[arg(long, help = "Do not fall back to other installed Python runtimes")]
    pub no_alternates: bool,
    #[arg(short, long, help = "Suppress human output (errors still print to stderr)")]
    pub quiet: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)")]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q")]
    pub trace: bool,
    #[arg(long, help = "Emit {status,message,details} JSON envelopes")]
    pub json: bool,
    #[arg(long, help = "Disable colored human output")]
    pub no_color: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        DirtbikeCli::command().debug_assert();
    }

    #[test]
    fn parses_flags() {
        let cli = DirtbikeCli::try_parse_from([
            "dirtbike", "-d", "/tmp/out", "--no-alternates", "-vv", "--json", "stupid",
        ])
        .expect("parse");
        assert_eq!(cli.package, "stupid");
        assert_eq!(cli.directory, Some(PathBuf::from("/tmp/out")));
        assert!(cli.no_alternates);
        assert_eq!(cli.verbose, 2);
        assert!(cli.json);
    }
}
