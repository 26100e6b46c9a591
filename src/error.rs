// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

/// What a history or rate collaborator reports back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unreadable page: {0}")]
    Parse(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// First history page or the exchange-rate fetch failed.
    #[error("Network error while fetching {stage}: {detail}")]
    Network { stage: String, detail: String },

    /// A page could not be decomposed into rows.
    #[error("Could not read history page {page}: {detail}")]
    Parse { page: usize, detail: String },

    #[error("Currency '{0}' is not in the exchange-rate table")]
    UnknownCurrency(String),

    /// Only surfaced by the amount parser; the driver downgrades it to a warning.
    #[error("Malformed amount '{0}'")]
    MalformedAmount(String),

    #[error("Settings store error: {0}")]
    Store(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

impl From<rusqlite::Error> for HistoryError {
    fn from(err: rusqlite::Error) -> Self {
        HistoryError::Store(err.to_string())
    }
}
