use argh::FromArgs;
use std::path::PathBuf;

#[derive(FromArgs, Debug)]
/// Blood pressure / ECG monitor companion
pub struct TopLevelCmd {
    /// specify config file path, creates file if it doesn't exist
    #[argh(option, short = 'c')]
    pub config_override: Option<PathBuf>,
    /// config file must exist, including "config_override" files
    #[argh(switch, short = 'r')]
    pub config_required: bool,
    /// use config file as-is (don't save over it)
    #[argh(switch, short = 'n')]
    pub no_save: bool,
    #[argh(subcommand)]
    pub subcommands: Option<SubCommands>,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
pub enum SubCommands {
    Scan(ScanCmd),
    Dummy(DummyCmd),
}

/// scan for nearby monitors and show which protocol family each one uses
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "scan")]
pub struct ScanCmd {
    /// how long to scan for, otherwise uses config's scan_seconds
    #[argh(option, short = 's')]
    pub seconds: Option<u64>,
}

/// run against a simulated monitor: decode its records, then take a measurement
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "dummy")]
pub struct DummyCmd {
    /// only list and decode stored records, skip the live measurement
    #[argh(switch)]
    pub records_only: bool,
}
