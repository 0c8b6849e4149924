//! Region descriptor grammar.
//!
//! A descriptor string is a comma-separated list of triplets:
//!
//! ```text
//! irq,addr,size[,irq,addr,size]...
//! ```
//!
//! `irq` is signed decimal (negative for "no interrupt"), `addr` is hexadecimal with an
//! optional `0x` prefix (`0` asks for allocated backing memory), and `size` is a decimal
//! byte count. Each field may be preceded by whitespace.

use core::fmt;

use iomem::PhysicalAddress;

use crate::IrqLine;

/// One parsed `irq,addr,size` triplet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionDescriptor {
    pub irq: IrqLine,
    /// Fixed physical start, or zero to allocate backing memory.
    pub base: PhysicalAddress,
    /// Size in bytes before rounding to the page size.
    pub size: usize,
}

impl RegionDescriptor {
    pub const fn new(irq: IrqLine, base: PhysicalAddress, size: usize) -> Self {
        Self { irq, base, size }
    }

    /// Returns true if this window is backed by allocated memory.
    pub const fn allocates(&self) -> bool {
        self.base.is_zero()
    }
}

impl fmt::Display for RegionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{:x},{}", self.irq, self.base, self.size)
    }
}

/// Incremental parser over a descriptor string.
///
/// Yields triplets until the input ends or a triplet is malformed or incomplete. Parsing
/// is lazy so callers can act on each triplet before the next is read; a bad triplet
/// later in the string never undoes work done for earlier ones.
///
/// ```
/// use uio_vdw::{Descriptors, IrqLine};
///
/// let mut descriptors = Descriptors::new("5,0,100,-1,80000000,4096,junk");
/// let parsed: Vec<_> = descriptors.by_ref().collect();
/// assert_eq!(parsed.len(), 2);
/// assert_eq!(parsed[0].irq, IrqLine::new(5));
/// assert_eq!(parsed[1].base.as_usize(), 0x8000_0000);
/// assert_eq!(descriptors.remainder(), "junk");
/// ```
pub struct Descriptors<'a> {
    input: &'a str,
    pos: usize,
    done: bool,
}

impl<'a> Descriptors<'a> {
    /// Creates a parser over `input`. Trailing whitespace is ignored.
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.trim_end(),
            pos: 0,
            done: false,
        }
    }

    /// Returns the text that was not consumed as a triplet.
    ///
    /// Empty when the whole input parsed cleanly.
    pub fn remainder(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Returns the byte offset of [`remainder`](Self::remainder) in the trimmed input.
    pub fn offset(&self) -> usize {
        self.pos
    }
}

impl Iterator for Descriptors<'_> {
    type Item = RegionDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let rest = self.remainder();
        if rest.is_empty() {
            self.done = true;
            return None;
        }

        let Some((descriptor, after)) = parse_triplet(rest) else {
            self.done = true;
            return None;
        };

        self.pos = self.input.len() - after.len();
        match after.strip_prefix(',') {
            Some(next) => self.pos = self.input.len() - next.len(),
            // Anything other than a separator ends the list after this triplet.
            None => self.done = true,
        }

        Some(descriptor)
    }
}

fn parse_triplet(s: &str) -> Option<(RegionDescriptor, &str)> {
    let (irq, s) = parse_signed(s)?;
    let s = s.strip_prefix(',')?;
    let (base, s) = parse_hex(s)?;
    let s = s.strip_prefix(',')?;
    let (size, s) = parse_unsigned(s)?;
    let descriptor = RegionDescriptor::new(IrqLine::new(irq), PhysicalAddress::new(base), size);
    Some((descriptor, s))
}

/// Splits `s` after its leading run of bytes matching `accept`.
fn take_while(s: &str, accept: impl Fn(u8) -> bool) -> (&str, &str) {
    let end = s.bytes().position(|b| !accept(b)).unwrap_or(s.len());
    s.split_at(end)
}

fn parse_signed(s: &str) -> Option<(i32, &str)> {
    let s = s.trim_start();
    let sign_len = usize::from(s.starts_with(['-', '+']));
    let (digits, rest) = take_while(&s[sign_len..], |b| b.is_ascii_digit());
    if digits.is_empty() {
        return None;
    }
    let value = s[..sign_len + digits.len()].parse().ok()?;
    Some((value, rest))
}

fn parse_unsigned(s: &str) -> Option<(usize, &str)> {
    let s = s.trim_start();
    let s = s.strip_prefix('+').unwrap_or(s);
    let (digits, rest) = take_while(s, |b| b.is_ascii_digit());
    if digits.is_empty() {
        return None;
    }
    Some((digits.parse().ok()?, rest))
}

fn parse_hex(s: &str) -> Option<(usize, &str)> {
    let s = s.trim_start();
    let s = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(stripped) if stripped.starts_with(|c: char| c.is_ascii_hexdigit()) => stripped,
        _ => s,
    };
    let (digits, rest) = take_while(s, |b| b.is_ascii_hexdigit());
    if digits.is_empty() {
        return None;
    }
    Some((usize::from_str_radix(digits, 16).ok()?, rest))
}
