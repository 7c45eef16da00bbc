use std::fmt;
use clap::ValueEnum;

/// How a job request file is encoded
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum RequestFormat {
    /// A JSON job request document
    Json,
    /// A flat `application/x-www-form-urlencoded` body
    Form,
}

impl fmt::Display for RequestFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RequestFormat::Json => write!(f, "json"),
            RequestFormat::Form => write!(f, "form"),
        }
    }
}
