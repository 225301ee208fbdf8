use clap::Parser;

/// Drive the cooperative scheduler with a synthetic workload.
///
/// Runs on a single-threaded tokio `LocalSet`. A host job keeps ticking
/// between scheduler slices so the interleaving is visible in the report.
#[derive(Parser, Debug)]
#[command(name = "cadence", version, about)]
pub struct CliArgs {
    /// Path to a scheduler TOML config file.
    #[arg(long, env = "CADENCE_CONFIG")]
    pub config: Option<String>,

    /// Number of root tasks to enqueue.
    #[arg(long, default_value_t = 200)]
    pub tasks: usize,

    /// Work units per task; each unit spins for `--unit-micros`.
    #[arg(long, default_value_t = 20)]
    pub units: u32,

    /// Duration of one work unit in microseconds.
    #[arg(long, default_value_t = 250)]
    pub unit_micros: u64,

    /// Cancel every Nth task before it runs (0 disables).
    #[arg(long, default_value_t = 10)]
    pub cancel_every: usize,

    /// Override the frame interval with a target frame rate (1-125, 0 = config).
    #[arg(long)]
    pub frame_rate: Option<u32>,

    /// Seed for the priority mix.
    #[arg(long, default_value_t = 7)]
    pub seed: u64,

    /// Print the final metrics as JSON.
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let args = CliArgs::parse_from(["cadence"]);
        assert_eq!(args.tasks, 200);
        assert_eq!(args.units, 20);
        assert_eq!(args.cancel_every, 10);
        assert!(args.frame_rate.is_none());
        assert!(!args.json);
    }

    #[test]
    fn flags_override_defaults() {
        let args = CliArgs::parse_from([
            "cadence",
            "--tasks",
            "5",
            "--frame-rate",
            "60",
            "--cancel-every",
            "0",
            "--json",
        ]);
        assert_eq!(args.tasks, 5);
        assert_eq!(args.frame_rate, Some(60));
        assert_eq!(args.cancel_every, 0);
        assert!(args.json);
    }
}
