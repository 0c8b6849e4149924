//! A driver running over the software host, and the commands that drive it.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use iomem::BackingPool;
use uio_vdw::{DriverConfig, IrqLine, RegionDriver, RegionError, SoftwareHost};

const EINVAL: i32 = 22;

/// One line of a command script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `add DESC`: runtime add of one or more triplets.
    Add(String),
    /// `rm INDEX`: runtime remove by position.
    Remove(usize),
    /// `show`: lists the live windows and the snapshot.
    Show,
    /// `count`: prints the number of live windows.
    Count,
    /// `irq LINE`: raises an interrupt on the software host.
    Irq(IrqLine),
    /// `quit`: stops reading commands.
    Quit,
}

impl Command {
    /// Parses a script line. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Result<Option<Command>, SessionError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));
        let command = match verb {
            "add" => Command::Add(String::from(rest)),
            "rm" | "remove" => Command::Remove(parse_argument(verb, rest)?),
            "irq" => Command::Irq(IrqLine::new(parse_argument(verb, rest)?)),
            "show" => Command::Show,
            "count" => Command::Count,
            "quit" | "exit" => Command::Quit,
            _ => return Err(SessionError::UnknownCommand(String::from(verb))),
        };
        Ok(Some(command))
    }
}

fn parse_argument<T: std::str::FromStr>(verb: &str, text: &str) -> Result<T, SessionError> {
    text.parse().map_err(|_| SessionError::BadArgument {
        command: String::from(verb),
        argument: String::from(text),
    })
}

/// Errors from running a command.
#[derive(Debug)]
pub enum SessionError {
    /// The driver rejected the request.
    Region(RegionError),
    UnknownCommand(String),
    BadArgument { command: String, argument: String },
    /// Reading the script or writing output failed.
    Io(io::Error),
}

impl SessionError {
    /// Returns the negative errno this error maps to.
    pub fn errno(&self) -> i32 {
        match self {
            SessionError::Region(err) => err.errno(),
            SessionError::UnknownCommand(_) | SessionError::BadArgument { .. } => -EINVAL,
            SessionError::Io(err) => err.raw_os_error().map_or(-EINVAL, |code| -code),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Region(err) => write!(f, "{} ({})", err, err.errno()),
            SessionError::UnknownCommand(verb) => write!(f, "unknown command {:?}", verb),
            SessionError::BadArgument { command, argument } => {
                write!(f, "bad argument {:?} for {}", argument, command)
            }
            SessionError::Io(err) => write!(f, "i/o error: {}", err),
        }
    }
}

impl From<RegionError> for SessionError {
    fn from(err: RegionError) -> Self {
        SessionError::Region(err)
    }
}

impl From<io::Error> for SessionError {
    fn from(err: io::Error) -> Self {
        SessionError::Io(err)
    }
}

/// Whether to keep reading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub struct Session {
    host: Arc<SoftwareHost>,
    driver: RegionDriver,
}

impl Session {
    pub fn new(config: DriverConfig, pool: Arc<BackingPool>) -> Self {
        let host = Arc::new(SoftwareHost::new());
        let driver = RegionDriver::new(config, host.clone(), pool);
        Self { host, driver }
    }

    pub fn driver(&self) -> &RegionDriver {
        &self.driver
    }

    pub fn host(&self) -> &SoftwareHost {
        &self.host
    }

    /// Runs every command in `input`, writing results to `out`.
    ///
    /// A failing command is reported and the script carries on. Returns the last such
    /// failure, if any. I/O errors end the run.
    pub fn execute_all(
        &self,
        input: impl BufRead,
        out: &mut impl Write,
    ) -> Result<Option<SessionError>, SessionError> {
        let mut last_failure = None;
        for (number, line) in input.lines().enumerate() {
            let line = line?;
            let result = Command::parse(&line).and_then(|command| match command {
                Some(command) => self.execute(command, out),
                None => Ok(Flow::Continue),
            });
            match result {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(SessionError::Io(err)) => return Err(SessionError::Io(err)),
                Err(err) => {
                    log::warn!("line {}: {}", number + 1, err);
                    writeln!(out, "error: {}", err)?;
                    last_failure = Some(err);
                }
            }
        }
        Ok(last_failure)
    }

    pub fn execute(&self, command: Command, out: &mut impl Write) -> Result<Flow, SessionError> {
        match command {
            Command::Add(regions) => {
                let created = self.driver.add(&regions)?;
                writeln!(out, "added {} ({} total)", created, self.driver.count())?;
            }
            Command::Remove(index) => {
                let removed = self.driver.remove(index)?;
                writeln!(out, "removed {} ({} left)", removed.name, self.driver.count())?;
            }
            Command::Show => self.show(out)?,
            Command::Count => writeln!(out, "{}", self.driver.count())?,
            Command::Irq(line) => {
                let handled = self.host.raise(line);
                writeln!(out, "irq {} handled by {}", line, handled)?;
            }
            Command::Quit => return Ok(Flow::Stop),
        }
        Ok(Flow::Continue)
    }

    fn show(&self, out: &mut impl Write) -> io::Result<()> {
        for (index, instance) in self.driver.instances().iter().enumerate() {
            let device = self.host.device(instance.handle);
            writeln!(
                out,
                "{}: {} irq={} start={} size={} mapped={} {} events={}",
                index,
                instance.name,
                instance.irq,
                instance.region_start,
                instance.region_size,
                instance.mapped_address,
                device.as_ref().map_or_else(String::new, |d| d.node()),
                device.as_ref().map_or(0, |d| d.events),
            )?;
        }
        writeln!(out, "regions: {}", self.driver.snapshot())
    }
}
