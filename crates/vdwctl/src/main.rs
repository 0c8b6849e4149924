use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use iomem::{BackingPool, PhysicalAddress, page_count};
use uio_vdw::{DEFAULT_PREFIX, Descriptors, DriverConfig, RegionError};

mod logger;
mod session;

use logger::Logger;
use session::{Session, SessionError};

const DEFAULT_POOL_BASE: usize = 0x4000_0000;
const DEFAULT_POOL_SIZE: usize = 0x10_0000;

#[derive(Parser)]
#[command(name = "vdwctl")]
#[command(about = "Run and reconfigure userspace I/O register windows")]
struct Args {
    /// Increase log detail (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load windows, then apply commands from a script or stdin
    Run {
        /// Windows to create at load time, as irq,addr,size[,...]
        #[arg(short, long)]
        regions: Option<String>,

        /// Device-class prefix for window names
        #[arg(long, default_value = DEFAULT_PREFIX)]
        prefix: String,

        /// Physical base of the backing pool (in hexadecimal, default 0x40000000)
        #[arg(long, value_parser = parse_hex)]
        pool_base: Option<usize>,

        /// Size of the backing pool in bytes (in hexadecimal, default 0x100000)
        #[arg(long, value_parser = parse_hex)]
        pool_size: Option<usize>,

        /// Command script; stdin when absent
        #[arg(short, long)]
        script: Option<PathBuf>,
    },
    /// Check a descriptor string without creating anything
    Parse {
        /// Descriptor string, irq,addr,size[,...]
        descriptor: String,
    },
}

fn parse_hex(text: &str) -> Result<usize, String> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    usize::from_str_radix(digits, 16).map_err(|e| format!("invalid hex value {:?}: {}", text, e))
}

/// Process status for a negative errno.
fn errno_status(errno: i32) -> u8 {
    u8::try_from(errno.unsigned_abs()).unwrap_or(1)
}

fn main() -> ExitCode {
    let args = Args::parse();
    Logger::init(args.verbose);

    match args.command {
        Command::Run {
            regions,
            prefix,
            pool_base,
            pool_size,
            script,
        } => {
            let mut config = DriverConfig::new().with_prefix(prefix);
            if let Some(regions) = regions {
                config = config.with_regions(regions);
            }
            let pool = Arc::new(BackingPool::new(
                PhysicalAddress::new(pool_base.unwrap_or(DEFAULT_POOL_BASE)),
                pool_size.unwrap_or(DEFAULT_POOL_SIZE),
            ));
            run(config, pool, script)
        }
        Command::Parse { descriptor } => parse(&descriptor),
    }
}

fn run(config: DriverConfig, pool: Arc<BackingPool>, script: Option<PathBuf>) -> ExitCode {
    log::info!(
        "backing pool {} pages at {}",
        page_count(pool.total_memory()),
        pool.window().base()
    );
    let session = Session::new(config, pool);

    let mut failure = match session.driver().load_configured() {
        Ok(created) => {
            log::info!("loaded {} instance(s)", created);
            None
        }
        Err(err) => {
            log::error!("load: {}", err);
            Some(SessionError::Region(err))
        }
    };

    let input: Box<dyn BufRead> = match script {
        Some(path) => match File::open(&path) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(err) => {
                log::error!("cannot open {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        },
        None => Box::new(io::stdin().lock()),
    };

    match session.execute_all(input, &mut io::stdout().lock()) {
        Ok(last) => failure = last.or(failure),
        Err(err) => {
            log::error!("{}", err);
            return ExitCode::FAILURE;
        }
    }

    let destroyed = session.driver().teardown();
    log::info!(
        "tore down {} instance(s), {} identities left on host",
        destroyed,
        session.host().identity_count()
    );

    failure.map_or(ExitCode::SUCCESS, |err| {
        ExitCode::from(errno_status(err.errno()))
    })
}

fn parse(descriptor: &str) -> ExitCode {
    let mut descriptors = Descriptors::new(descriptor);
    let mut parsed = 0;
    for (index, region) in descriptors.by_ref().enumerate() {
        let target = if region.allocates() {
            String::from("allocated")
        } else {
            format!("fixed {}", region.base)
        };
        println!(
            "{}: irq={} {} size={} pages={}",
            index,
            region.irq,
            target,
            region.size,
            page_count(region.size)
        );
        parsed += 1;
    }

    let rest = descriptors.remainder();
    if !rest.is_empty() {
        println!("stopped at offset {}: {:?}", descriptors.offset(), rest);
    }
    if parsed == 0 {
        let err = RegionError::Parse {
            offset: descriptors.offset(),
        };
        log::error!("no triplets in {:?}: {}", descriptor, err);
        return ExitCode::from(errno_status(err.errno()));
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let args = Args::try_parse_from(["vdwctl", "run"]).unwrap();
        let Command::Run {
            regions,
            prefix,
            pool_base,
            pool_size,
            script,
        } = args.command
        else {
            panic!("expected run");
        };
        assert_eq!(regions, None);
        assert_eq!(prefix, DEFAULT_PREFIX);
        assert_eq!(pool_base, None);
        assert_eq!(pool_size, None);
        assert_eq!(script, None);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn run_options() {
        let args = Args::try_parse_from([
            "vdwctl",
            "run",
            "-vv",
            "--regions",
            "5,0,100",
            "--pool-base",
            "80000000",
            "--pool-size",
            "0x4000",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        let Command::Run {
            regions,
            pool_base,
            pool_size,
            ..
        } = args.command
        else {
            panic!("expected run");
        };
        assert_eq!(regions.as_deref(), Some("5,0,100"));
        assert_eq!(pool_base, Some(0x8000_0000));
        assert_eq!(pool_size, Some(0x4000));
    }

    #[test]
    fn bad_hex_is_rejected() {
        assert!(Args::try_parse_from(["vdwctl", "run", "--pool-size", "zz"]).is_err());
        assert_eq!(parse_hex("0x1000"), Ok(0x1000));
        assert_eq!(parse_hex("1000"), Ok(0x1000));
    }

    #[test]
    fn exit_status_follows_errno() {
        assert_eq!(errno_status(RegionError::Usage.errno()), 22);
        assert_eq!(errno_status(-14), 14);
        assert_eq!(errno_status(-1000), 1);
    }
}
