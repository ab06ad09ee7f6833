use std::fmt;

#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    Malformed(Malformed),
    Export(String),
    Timeout,
    Closed,
}

#[derive(Debug, Eq, PartialEq)]
pub enum Malformed {
    Length(usize),
    Version(u8),
    Direction(u8),
    Ethertype(u16),
    Address,
    Timestamps(u64, u64),
    Extensions(usize, usize),
    Extension(u8, usize),
    Overrun(usize),
    Count(u8, usize),
}

impl From<Malformed> for Error {
    fn from(err: Malformed) -> Self {
        Error::Malformed(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Export(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Export(err.to_string())
    }
}

impl std::error::Error for Error {}

impl std::error::Error for Malformed {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Error::Malformed(m) => write!(f, "malformed record: {}", m),
            Error::Export(e)    => write!(f, "export failed: {}", e),
            Error::Timeout      => write!(f, "export timed out"),
            Error::Closed       => write!(f, "producer channel closed"),
        }
    }
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Malformed::Length(n)        => write!(f, "short buffer ({} bytes)", n),
            Malformed::Version(v)       => write!(f, "unknown layout version {}", v),
            Malformed::Direction(d)     => write!(f, "invalid direction {}", d),
            Malformed::Ethertype(t)     => write!(f, "unsupported ethertype {:#06x}", t),
            Malformed::Address          => write!(f, "ipv4 record with non-mapped address"),
            Malformed::Timestamps(a, b) => write!(f, "first seen {} after last seen {}", a, b),
            Malformed::Extensions(d, a) => write!(f, "extension length {} != remaining {}", d, a),
            Malformed::Extension(k, n)  => write!(f, "extension {} has bad length {}", k, n),
            Malformed::Overrun(n)       => write!(f, "extension at offset {} overruns buffer", n),
            Malformed::Count(d, a)      => write!(f, "extension count {} != {} present", d, a),
        }
    }
}
