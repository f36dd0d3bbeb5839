// Copyright (c) 2018 Aleksandr Bezobchuk
// Copyright (c) 2022 Alexis Sellier
//
// Licensed under the MIT license.

//! Errors returned when building or restoring filters.
use thiserror::Error;

/// Result type used throughout this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error building or restoring a filter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A bit vector was requested with a length of zero.
    #[error("invalid size: a bit vector must hold at least one bit")]
    InvalidSize,
    /// A constructor was called with parameters outside of their domain.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    /// A persisted filter state is incomplete or inconsistent.
    #[error("malformed state: {0}")]
    MalformedState(String),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameters(msg.into())
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedState(msg.into())
    }
}
