// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod report;
pub mod exporter;
pub mod fx;
pub mod settings;
pub mod rules;
pub mod doctor;
