// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod aggregate;
pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod fx;
pub mod history;
pub mod models;
pub mod report;
pub mod sources;
pub mod utils;
