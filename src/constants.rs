pub mod network {
    pub const SSH_DEFAULT_PORT: u16 = 22;
    pub const TIMEOUT_SSH_CONNECT_MS: u64 = 10_000;
    pub const TIMEOUT_SSH_DATA_MS: u64 = 30_000;
    pub const KEEPALIVE_INTERVAL_MS: u64 = 30_000;
    pub const SETTLE_AFTER_EXECUTE_MS: u64 = 3_000;
}

pub mod buffers {
    pub const SFTP_READ_BUFFER_BYTES: usize = 16 * 1024;
}

pub mod runrep {
    pub const INIT_LINE: &str = "runrep -f empty.lst -b << EOF";
    pub const EXIT_BLOCK: &str = "exit\nEOF\n";

    pub const DEFAULT_OUTPUT_FORMAT: &str = "csv";
    pub const DYNAMIC_ACCOUNTING: &str = "Dynamic";
    pub const CLOSED_PERIOD_ACCOUNTING: &str = "ClosedPeriod";
    pub const NONE_CONSOLIDATED: &str = "-c3";

    pub const ACCOUNTING_RUN_TYPES: &[&str] = &[
        "Dynamic",
        "ClosedPeriod",
        "UnAmendedClosedPeriod",
        "Incremental",
        "NAV",
        "WouldBeAdjustments",
        "TWR",
        "Snapshot",
    ];

    pub const CONSOLIDATION_VALUES: &[&str] = &["-c1", "-c2", "-c3"];

    pub const RUN_COMMAND_NAMES: &[&str] = &["run", "runfile", "runf", "runnumber", "runquery"];
}

pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const GENEVA_FAILURE: i32 = 2;
}
